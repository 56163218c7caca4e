//! Rendering of a webpack configuration tree as a CommonJS module

use serde_json::Value;

/// Render `config` as `module.exports = ...;`
pub fn render_config_module(config: &Value) -> String {
    let mut out = String::from("// Generated by jetkit. Do not edit.\nmodule.exports = ");
    render_value(config, 0, &mut out);
    out.push_str(";\n");
    out
}

fn render_value(value: &Value, indent: usize, out: &mut String) {
    match value {
        Value::Object(map) => {
            if let Some(pattern) = map.get("$regex").and_then(Value::as_str) {
                out.push_str(&render_regex(pattern));
                return;
            }
            if let Some(module) = map.get("$plugin").and_then(Value::as_str) {
                out.push_str(&format!("new (require({}))(", quote(module)));
                render_value(map.get("options").unwrap_or(&Value::Null), indent, out);
                out.push(')');
                return;
            }
            if map.is_empty() {
                out.push_str("{}");
                return;
            }

            out.push_str("{\n");
            for (i, (key, item)) in map.iter().enumerate() {
                push_indent(indent + 1, out);
                out.push_str(&quote(key));
                out.push_str(": ");
                render_value(item, indent + 1, out);
                if i + 1 < map.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            push_indent(indent, out);
            out.push('}');
        }
        Value::Array(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }

            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                push_indent(indent + 1, out);
                render_value(item, indent + 1, out);
                if i + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            push_indent(indent, out);
            out.push(']');
        }
        Value::Null => out.push_str("undefined"),
        other => out.push_str(&other.to_string()),
    }
}

fn push_indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

/// JSON string quoting is valid JavaScript.
fn quote(s: &str) -> String {
    Value::from(s).to_string()
}

fn render_regex(pattern: &str) -> String {
    // `//` would open a line comment.
    if pattern.is_empty() {
        return "/(?:)/".to_string();
    }
    format!("/{}/", pattern.replace('/', "\\/"))
}

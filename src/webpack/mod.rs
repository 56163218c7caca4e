//! Webpack configuration composition
//!
//! A common base is always extended by exactly one environment overlay
//! (development or production). Optional JSON overrides and the HTML
//! template plugin are applied on top, after which the user transform gets
//! the last word.
//!
//! The configuration is a JSON tree. Two marker objects stand in for values
//! JSON cannot express and are rendered by the bundler:
//! - `{"$regex": "..."}` for regular expressions
//! - `{"$plugin": "<module>", "options": {...}}` for plugin instances

mod context;
mod html;
mod transform;
mod typescript;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;
use crate::options::BuildType;

pub use context::BuildContext;
pub use html::render_template;
pub use transform::{apply_transform, CommandTransform, FnTransform, TransformError, WebpackTransform};
pub use typescript::reorganize_type_definitions;

/// Module path prefix of the framework's AMD libraries
const FRAMEWORK_LIBS: &str = "@oracle/oraclejet/dist/js/libs/oj";
const FRAMEWORK_CSS: &str = "node_modules/@oracle/oraclejet/dist/css";

/// A tree of bundler directives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WebpackConfig(Value);

impl WebpackConfig {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Deep-merge `overlay` over this configuration
    pub fn merge(mut self, overlay: Value) -> Self {
        deep_merge(&mut self.0, overlay);
        self
    }

    pub fn public_path(&self) -> Option<&str> {
        self.0.pointer("/output/publicPath").and_then(Value::as_str)
    }

    /// The `devServer` section, if the configuration can be served
    pub fn dev_server(&self) -> Option<&Value> {
        self.0.get("devServer").filter(|v| !v.is_null())
    }

    pub fn mode(&self) -> Option<&str> {
        self.0.get("mode").and_then(Value::as_str)
    }

    pub fn plugins(&self) -> &[Value] {
        self.0
            .get("plugins")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn push_plugin(&mut self, plugin: Value) {
        if !self.0.is_object() {
            self.0 = json!({});
        }
        let plugins = self
            .0
            .as_object_mut()
            .map(|o| o.entry("plugins").or_insert_with(|| json!([])));
        if let Some(Value::Array(list)) = plugins {
            list.push(plugin);
        }
    }
}

/// Objects merge key by key, arrays concatenate, anything else is replaced.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(base), Value::Array(overlay)) => base.extend(overlay),
        (base, overlay) => *base = overlay,
    }
}

/// `{"$regex": pattern}`
pub fn regex(pattern: &str) -> Value {
    json!({ "$regex": pattern })
}

/// `{"$plugin": module, "options": options}`
pub fn plugin(module: &str, options: Value) -> Value {
    json!({ "$plugin": module, "options": options })
}

fn path_str(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

/// Settings shared by every build
fn common(ctx: &BuildContext, config: &Config) -> Value {
    let mut output = json!({
        "path": path_str(&ctx.staging_path),
        "filename": "js/[name].js",
        "clean": true,
    });
    if let Some(public_path) = &config.build.public_path {
        output["publicPath"] = Value::from(public_path.as_str());
    }

    let mut rules = vec![
        json!({ "test": regex(r"\.css$"), "use": ["style-loader", "css-loader"] }),
        json!({ "test": regex(r"\.html$"), "exclude": regex(r"index\.html$"), "loader": "html-loader" }),
    ];
    if ctx.typescript {
        rules.push(json!({
            "test": regex(r"\.tsx?$"),
            "loader": "ts-loader",
            "exclude": regex("node_modules"),
        }));
    }

    let theme_css = format!("{}/{}", FRAMEWORK_CSS, ctx.theme.name);
    let theme_target = format!(
        "css/{}/{}/{}",
        ctx.theme.name, ctx.theme.version, ctx.theme.platform
    );

    json!({
        "context": path_str(&ctx.root),
        "entry": { "main": path_str(&ctx.entry) },
        "output": output,
        "resolve": {
            "extensions": [".js", ".ts", ".json"],
            "alias": { "@": path_str(&ctx.source_path.join("js")) },
        },
        "module": { "rules": rules },
        "plugins": [
            plugin("copy-webpack-plugin", json!({
                "patterns": [{ "from": theme_css, "to": theme_target, "noErrorOnMissing": true }],
            })),
        ],
    })
}

fn development(ctx: &BuildContext) -> Value {
    json!({
        "mode": "development",
        "devtool": "eval-source-map",
        "resolve": { "alias": { "ojs": format!("{}/debug", FRAMEWORK_LIBS) } },
        "devServer": {
            "host": ctx.host,
            "port": ctx.port,
            "hot": false,
            "liveReload": ctx.livereload(),
            "open": ctx.open,
            "static": { "directory": path_str(&ctx.staging_path) },
        },
    })
}

fn production(_ctx: &BuildContext) -> Value {
    json!({
        "mode": "production",
        "devtool": false,
        "resolve": { "alias": { "ojs": format!("{}/min", FRAMEWORK_LIBS) } },
        "optimization": { "minimize": true },
        "performance": { "hints": "warning" },
    })
}

/// Stylesheets that must be linked from the page: the theme first.
pub fn required_stylesheets(ctx: &BuildContext, config: &Config) -> Vec<String> {
    std::iter::once(ctx.theme.stylesheet())
        .chain(config.build.stylesheets.iter().cloned())
        .collect()
}

/// Common base, build type overlay and the overrides file, without the
/// HTML template plugin.
pub fn base_config(ctx: &BuildContext, config: &Config) -> Result<WebpackConfig> {
    let overlay = match ctx.build_type {
        BuildType::Release => production(ctx),
        BuildType::Debug => development(ctx),
    };
    let mut webpack = WebpackConfig::new(common(ctx, config)).merge(overlay);

    if let Some(overrides) = &config.webpack.overrides {
        let path = config.root.join(overrides);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read webpack overrides: {}", path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;
        debug!("Merging webpack overrides from {}", path.display());
        webpack = webpack.merge(value);
    }

    Ok(webpack)
}

/// Compose the webpack configuration for `ctx`.
pub fn compose(ctx: &BuildContext, config: &Config) -> Result<WebpackConfig> {
    let mut webpack = base_config(ctx, config)?;

    let template_path = config.html_template_path();
    let template = fs::read_to_string(&template_path)
        .with_context(|| format!("Failed to read HTML template: {}", template_path.display()))?;
    let html = render_template(&template, webpack.public_path(), &required_stylesheets(ctx, config));

    webpack.push_plugin(plugin(
        "html-webpack-plugin",
        json!({ "templateContent": html, "filename": "index.html", "inject": true }),
    ));

    Ok(webpack)
}

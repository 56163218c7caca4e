//! Tag and attribute level text edits

use regex::Regex;

fn attribute_pattern(attr: &str) -> Option<Regex> {
    Regex::new(&format!(
        r#"(?i)(\s{}\s*=\s*)(?:"([^"]*)"|'([^']*)')"#,
        regex::escape(attr)
    ))
    .ok()
}

/// Value of `attr` within a single tag, single or double quoted
pub fn get_attribute(tag: &str, attr: &str) -> Option<String> {
    let caps = attribute_pattern(attr)?.captures(tag)?;
    caps.get(2)
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().to_string())
}

/// Set `attr` on a single tag, appending the attribute when absent.
/// An existing value keeps its quote style unless the new value contains that quote.
pub fn set_attribute(tag: &str, attr: &str, value: &str) -> String {
    let Some(pattern) = attribute_pattern(attr) else {
        return tag.to_string();
    };

    if let Some(caps) = pattern.captures(tag) {
        let (Some(whole), Some(prefix)) = (caps.get(0), caps.get(1)) else {
            return tag.to_string();
        };
        let quote = if caps.get(3).is_some() && !value.contains('\'') {
            '\''
        } else {
            '"'
        };
        return format!(
            "{}{}{}{}{}{}",
            &tag[..whole.start()],
            prefix.as_str(),
            quote,
            value,
            quote,
            &tag[whole.end()..]
        );
    }

    let (head, tail) = if let Some(head) = tag.strip_suffix("/>") {
        (head.trim_end(), " />")
    } else if let Some(head) = tag.strip_suffix('>') {
        (head.trim_end(), ">")
    } else {
        return tag.to_string();
    };
    format!(r#"{} {}="{}"{}"#, head, attr, value, tail)
}

/// Replace the first tag matching `pattern` with `edit(tag)`.
/// Documents without a match come back unchanged.
pub fn edit_first_tag(doc: &str, pattern: &Regex, edit: impl FnOnce(&str) -> String) -> String {
    match pattern.find(doc) {
        Some(m) => {
            let mut out = String::with_capacity(doc.len() + 64);
            out.push_str(&doc[..m.start()]);
            out.push_str(&edit(m.as_str()));
            out.push_str(&doc[m.end()..]);
            out
        }
        None => doc.to_string(),
    }
}

/// Insert `snippet` before the last `closing` tag, if there is one.
pub fn insert_before_closing(doc: &str, closing: &str, snippet: &str) -> String {
    let lower = doc.to_ascii_lowercase();
    match lower.rfind(&closing.to_ascii_lowercase()) {
        Some(pos) => {
            let mut out = doc.to_string();
            out.insert_str(pos, snippet);
            out
        }
        None => doc.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_existing_attribute() {
        assert_eq!(
            set_attribute(r#"<body class="a" id="x">"#, "class", "a b"),
            r#"<body class="a b" id="x">"#
        );
    }

    #[test]
    fn test_append_missing_attribute() {
        assert_eq!(set_attribute("<body>", "class", "x"), r#"<body class="x">"#);
        assert_eq!(
            set_attribute(r#"<content src="a" />"#, "id", "main"),
            r#"<content src="a" id="main" />"#
        );
    }

    #[test]
    fn test_attribute_value_with_dollar() {
        assert_eq!(
            set_attribute(r#"<meta content="x">"#, "content", "$1 'self'"),
            r#"<meta content="$1 'self'">"#
        );
    }

    #[test]
    fn test_get_attribute_does_not_match_suffix() {
        assert_eq!(get_attribute(r#"<a data-class="y" class="x">"#, "class").as_deref(), Some("x"));
    }

    #[test]
    fn test_single_quoted_attribute_is_replaced_in_place() {
        assert_eq!(get_attribute("<body class='app'>", "class").as_deref(), Some("app"));
        assert_eq!(
            set_attribute("<body class='app' id=\"x\">", "class", "app oj-hybrid"),
            "<body class='app oj-hybrid' id=\"x\">"
        );
        assert_eq!(
            set_attribute("<meta content='default-src *'>", "content", "default-src 'self'"),
            r#"<meta content="default-src 'self'">"#
        );
    }

    #[test]
    fn test_insert_before_closing_without_tag_is_noop() {
        assert_eq!(insert_before_closing("<html>", "</body>", "<x/>"), "<html>");
        assert_eq!(insert_before_closing("<body></BODY>", "</body>", "<x/>"), "<body><x/></BODY>");
    }
}

//! `config.xml` patches

use once_cell::sync::Lazy;
use regex::Regex;

use super::markup::{edit_first_tag, insert_before_closing, set_attribute};

/// Page load timeout written into every platform's config
pub const LOAD_URL_TIMEOUT: &str = "700000";

static TIMEOUT_PREFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<preference\b[^>]*name\s*=\s*"loadUrlTimeoutValue"[^>]*>"#).unwrap()
});

static CONTENT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<content\b[^>]*>").unwrap());

/// Set `loadUrlTimeoutValue`, inserting the preference when absent
pub fn set_load_timeout(xml: &str) -> String {
    if TIMEOUT_PREFERENCE.is_match(xml) {
        return edit_first_tag(xml, &TIMEOUT_PREFERENCE, |tag| {
            set_attribute(tag, "value", LOAD_URL_TIMEOUT)
        });
    }

    let preference = format!(
        "    <preference name=\"loadUrlTimeoutValue\" value=\"{}\" />\n",
        LOAD_URL_TIMEOUT
    );
    insert_before_closing(xml, "</widget>", &preference)
}

/// Point the app's start page at `src`
pub fn set_content_src(xml: &str, src: &str) -> String {
    edit_first_tag(xml, &CONTENT_TAG, |tag| set_attribute(tag, "src", src))
}

/// Allow navigation to `href`, once
pub fn add_allow_navigation(xml: &str, href: &str) -> String {
    let tag = format!(r#"<allow-navigation href="{}" />"#, href);
    if xml.contains(&tag) {
        return xml.to_string();
    }
    insert_before_closing(xml, "</widget>", &format!("    {}\n", tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CONFIG: &str = r#"<?xml version='1.0' encoding='utf-8'?>
<widget id="org.example.app" version="1.0.0">
    <content src="index.html" />
</widget>
"#;

    #[test]
    fn test_timeout_inserted_when_absent() {
        let patched = set_load_timeout(CONFIG);
        assert!(patched.contains(r#"<preference name="loadUrlTimeoutValue" value="700000" />"#));
        assert!(patched.trim_end().ends_with("</widget>"));
    }

    #[test]
    fn test_timeout_overwritten_when_present() {
        let xml = CONFIG.replace(
            "</widget>",
            "    <preference name=\"loadUrlTimeoutValue\" value=\"60000\" />\n</widget>",
        );
        let patched = set_load_timeout(&xml);
        assert!(patched.contains(r#"value="700000""#));
        assert!(!patched.contains("60000"));
        assert_eq!(patched.matches("loadUrlTimeoutValue").count(), 1);
    }

    #[test]
    fn test_content_src_rewritten() {
        let patched = set_content_src(CONFIG, "http://10.0.2.2:8000/index.html");
        assert!(patched.contains(r#"<content src="http://10.0.2.2:8000/index.html" />"#));
    }

    #[test]
    fn test_allow_navigation_added_once() {
        let once = add_allow_navigation(CONFIG, "http://127.0.0.1:8000/*");
        let twice = add_allow_navigation(&once, "http://127.0.0.1:8000/*");
        assert_eq!(once.matches("<allow-navigation").count(), 1);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_widget_is_a_no_op() {
        assert_eq!(set_load_timeout("<nothing/>"), "<nothing/>");
    }
}

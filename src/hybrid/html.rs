//! `index.html` patches

use once_cell::sync::Lazy;
use regex::Regex;

use super::markup::{edit_first_tag, get_attribute, insert_before_closing, set_attribute};
use crate::options::Platform;

static BODY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<body\b[^>]*>").unwrap());

static CSP_META: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta\b[^>]*http-equiv\s*=\s*"Content-Security-Policy"[^>]*>"#).unwrap()
});

/// Marker classes identifying a Cordova-hosted page on `platform`
pub fn platform_classes(platform: Platform) -> Vec<String> {
    let mut classes = vec![
        "oj-hybrid".to_string(),
        "oj-platform-cordova".to_string(),
        format!("oj-platform-{}", platform),
    ];
    if platform == Platform::Ios {
        classes.push("oj-hybrid-statusbar-spacer".to_string());
    }
    classes
}

/// Add `classes` to the body tag, skipping any already present
pub fn add_body_classes(html: &str, classes: &[String]) -> String {
    edit_first_tag(html, &BODY_TAG, |tag| {
        let existing = get_attribute(tag, "class").unwrap_or_default();
        let mut merged: Vec<&str> = existing.split_whitespace().collect();
        for class in classes {
            if !merged.contains(&class.as_str()) {
                merged.push(class);
            }
        }
        set_attribute(tag, "class", &merged.join(" "))
    })
}

/// Allow `source` under `directive` in a CSP policy string.
///
/// A missing directive falls back to `default-src`; with no `default-src`
/// either the directive is unrestricted and the policy is left alone.
fn extend_directive(policy: &str, directive: &str, source: &str) -> String {
    let mut directives: Vec<String> = policy
        .split(';')
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();

    let name_of = |d: &str| d.split_whitespace().next().unwrap_or("").to_lowercase();

    if let Some(i) = directives.iter().position(|d| name_of(d) == directive) {
        let existing = &mut directives[i];
        if !existing.split_whitespace().any(|s| s == source) {
            existing.push(' ');
            existing.push_str(source);
        }
    } else if let Some(default) = directives.iter().find(|d| name_of(d) == "default-src").cloned() {
        let sources = default.split_whitespace().skip(1).collect::<Vec<_>>().join(" ");
        directives.push(format!("{} {} {}", directive, sources, source).replace("  ", " "));
    } else {
        return policy.to_string();
    }

    directives.join("; ")
}

/// Let the page load scripts from, and open sockets to, the livereload server
pub fn allow_livereload_in_csp(html: &str, host: &str, port: u16) -> String {
    edit_first_tag(html, &CSP_META, |tag| {
        let Some(policy) = get_attribute(tag, "content") else {
            return tag.to_string();
        };
        let policy = extend_directive(&policy, "script-src", &format!("http://{}:{}", host, port));
        let policy = extend_directive(&policy, "connect-src", &format!("ws://{}:{}", host, port));
        set_attribute(tag, "content", &policy)
    })
}

/// Append the livereload client script unless it is already there
pub fn add_livereload_script(html: &str, host: &str, port: u16) -> String {
    let src = format!("http://{}:{}/livereload.js", host, port);
    if html.contains(&src) {
        return html.to_string();
    }

    let script = format!(r#"<script src="{}"></script>"#, src);
    if BODY_TAG.is_match(html) && html.to_lowercase().contains("</body>") {
        insert_before_closing(html, "</body>", &script)
    } else {
        format!("{}{}", html, script)
    }
}

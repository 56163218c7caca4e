//! Stylesheet placeholder handling for the HTML template

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

static THEME_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<!--\s*injector:theme\s*-->.*?<!--\s*endinjector\s*-->").unwrap()
});

/// Resolve stylesheet placeholders in `template`.
///
/// With a `public_path` the bundler injects styles, so placeholders are
/// removed. Otherwise each placeholder becomes one `<link>` per stylesheet.
pub fn render_template(template: &str, public_path: Option<&str>, stylesheets: &[String]) -> String {
    let replacement = match public_path {
        Some(_) => String::new(),
        None => stylesheets
            .iter()
            .map(|href| format!(r#"<link rel="stylesheet" href="{}" type="text/css"/>"#, href))
            .collect::<Vec<_>>()
            .join("\n    "),
    };

    THEME_PLACEHOLDER
        .replace_all(template, NoExpand(&replacement))
        .into_owned()
}

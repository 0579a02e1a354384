//! Positional placeholder formatting
//!
//! Resolved text may contain zero-based placeholders: `"Hello, {0}!"`.
//! `{{` and `}}` produce literal braces. A placeholder whose index has no
//! argument is left in the output unchanged.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{(\d+)\}").expect("placeholder pattern is valid")
});

/// Substitute positional arguments into `template`
///
/// # Arguments
///
/// * `template` - Resolved text containing `{0}`, `{1}`, ... placeholders
/// * `args` - Values for the placeholders, by position
///
/// # Example
///
/// ```ignore
/// let text = format_positional("{0} has {1} items", &["Cart".to_string(), "3".to_string()]);
/// assert_eq!(text, "Cart has 3 items");
/// ```
pub fn format_positional(template: &str, args: &[String]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match caps.get(1) {
            Some(index) => index
                .as_str()
                .parse::<usize>()
                .ok()
                .and_then(|i| args.get(i))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string()),
            None if &caps[0] == "{{" => "{".to_string(),
            None => "}".to_string(),
        })
        .into_owned()
}

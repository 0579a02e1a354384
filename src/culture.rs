//! Culture fallback chains
//!
//! A lookup for `fr-CA` that finds nothing tries the broader `fr` next. This
//! module computes that ordered list of candidates. Culture names are
//! canonicalized through ICU so `fr-ca` and `fr-CA` hit the same rows.

use icu_locale::Locale;
use tracing::debug;

/// Root culture, never part of a fallback chain
const ROOT_LANGUAGE: &str = "und";

/// Canonicalize a culture name
///
/// Parses the name as a BCP 47 locale and renders its language identifier
/// (`language[-script][-region][-variants]`). Names ICU cannot parse are
/// returned trimmed but otherwise untouched.
///
/// # Example
///
/// ```ignore
/// assert_eq!(canonicalize_culture("fr-ca"), "fr-CA");
/// assert_eq!(canonicalize_culture("zh-hant-tw"), "zh-Hant-TW");
/// ```
pub fn canonicalize_culture(culture: &str) -> String {
    let trimmed = culture.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    match trimmed.parse::<Locale>() {
        Ok(locale) => locale.id.to_string(),
        Err(e) => {
            debug!(culture = trimmed, error = %e, "culture is not a valid BCP 47 tag");
            trimmed.to_string()
        }
    }
}

/// Compute the ordered culture candidates for a lookup
///
/// The requested culture always comes first. With `include_parents` the
/// culture is repeatedly stripped of its last subtag (`zh-Hant-TW` →
/// `zh-Hant` → `zh`) and each parent is appended. The root culture is never
/// included. Unparseable names produce a single-element chain.
///
/// # Arguments
///
/// * `culture` - Requested culture name (e.g. "fr-CA")
/// * `include_parents` - Whether to append parent cultures
///
/// # Example
///
/// ```ignore
/// assert_eq!(culture_chain("fr-CA", true), vec!["fr-CA", "fr"]);
/// assert_eq!(culture_chain("fr-CA", false), vec!["fr-CA"]);
/// ```
pub fn culture_chain(culture: &str, include_parents: bool) -> Vec<String> {
    let requested = canonicalize_culture(culture);
    let mut chain = vec![requested.clone()];

    if !include_parents || requested.parse::<Locale>().is_err() {
        return chain;
    }

    let mut current = requested.as_str();
    while let Some((parent, _)) = current.rsplit_once('-') {
        if parent.is_empty() || parent.eq_ignore_ascii_case(ROOT_LANGUAGE) {
            break;
        }
        chain.push(parent.to_string());
        current = parent;
    }

    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== Canonicalization ==========

    #[test]
    fn test_canonicalize_casing() {
        assert_eq!(canonicalize_culture("fr-ca"), "fr-CA");
        assert_eq!(canonicalize_culture("EN-us"), "en-US");
        assert_eq!(canonicalize_culture("zh-hant-tw"), "zh-Hant-TW");
    }

    #[test]
    fn test_canonicalize_keeps_invalid_names() {
        assert_eq!(canonicalize_culture("  not a culture "), "not a culture");
        assert_eq!(canonicalize_culture(""), "");
    }

    // ========== Chains ==========

    #[test]
    fn test_chain_without_parents_is_single() {
        assert_eq!(culture_chain("fr-CA", false), vec!["fr-CA"]);
        assert_eq!(culture_chain("zh-Hant-TW", false), vec!["zh-Hant-TW"]);
    }

    #[test]
    fn test_chain_two_levels() {
        assert_eq!(culture_chain("fr-CA", true), vec!["fr-CA", "fr"]);
    }

    #[test]
    fn test_chain_three_levels() {
        assert_eq!(
            culture_chain("zh-Hant-TW", true),
            vec!["zh-Hant-TW", "zh-Hant", "zh"]
        );
    }

    #[test]
    fn test_chain_neutral_culture() {
        assert_eq!(culture_chain("fr", true), vec!["fr"]);
    }

    #[test]
    fn test_chain_excludes_root() {
        assert_eq!(culture_chain("und-US", true), vec!["und-US"]);
        assert_eq!(culture_chain("und", true), vec!["und"]);
    }

    #[test]
    fn test_chain_is_canonical() {
        assert_eq!(culture_chain("fr-ca", true), vec!["fr-CA", "fr"]);
    }

    #[test]
    fn test_chain_unparseable_culture() {
        assert_eq!(culture_chain("bad culture!", true), vec!["bad culture!"]);
    }
}

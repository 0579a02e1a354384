//! Translation lookup with tenant and culture precedence
//!
//! # Precedence
//!
//! Cultures are the outer loop and tenant scope is the tie-break inside one
//! culture. For tenant `acme` requesting `fr-CA` with fallback on and default
//! culture `en-US`, candidates are tried in this order:
//!
//! 1. `fr-CA` acme, then `fr-CA` global
//! 2. `fr` acme, then `fr` global
//! 3. `en-US` acme, then `en-US` global
//!
//! A global lookup skips the tenant candidates. When nothing matches, the
//! key itself is returned with `found = false`.

use crate::culture::{canonicalize_culture, culture_chain};
use crate::format::format_positional;
use crate::model::TranslationEntry;
use crate::store::{LocalizationStore, StoreResult};
use crate::tenant::TenantScope;
use std::collections::BTreeMap;
use tracing::debug;

/// Outcome of a single lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved text, or the key itself when nothing was found
    pub value: String,
    pub found: bool,
    /// Culture the value came from
    pub culture: Option<String>,
}

impl Resolution {
    fn not_found(key: &str) -> Self {
        Self {
            value: key.to_string(),
            found: false,
            culture: None,
        }
    }
}

/// Parameters of a single lookup
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a> {
    pub key: &'a str,
    pub tenant: &'a TenantScope,
    pub culture: &'a str,
    pub enable_fallback: bool,
    pub default_culture: &'a str,
}

/// Pick the entry for one culture, preferring the tenant row over the global row
fn pick_for_culture<'e>(
    entries: &'e [TranslationEntry],
    culture: &str,
) -> Option<&'e TranslationEntry> {
    entries
        .iter()
        .filter(|e| e.culture == culture)
        .min_by_key(|e| e.tenant.is_global())
}

/// Ordered culture candidates for a lookup, default culture appended last
fn candidate_cultures(lookup: &Lookup<'_>) -> Vec<String> {
    let mut cultures = culture_chain(lookup.culture, lookup.enable_fallback);
    if lookup.enable_fallback {
        let default_culture = canonicalize_culture(lookup.default_culture);
        if !default_culture.is_empty() && !cultures.contains(&default_culture) {
            cultures.push(default_culture);
        }
    }
    cultures
}

/// Resolve one key
///
/// Missing keys are not errors: the result carries the key as its value and
/// `found = false`. Only store failures produce `Err`.
///
/// # Arguments
///
/// * `store` - Backend to query
/// * `lookup` - Key, tenant, requested culture and fallback settings
/// * `args` - Positional arguments, applied only when the key was found
///
/// # Example
///
/// ```ignore
/// let lookup = Lookup {
///     key: "Greeting",
///     tenant: &TenantScope::Global,
///     culture: "fr-CA",
///     enable_fallback: true,
///     default_culture: "en-US",
/// };
/// let resolution = resolve(&store, lookup, &["Ana".to_string()]).await?;
/// ```
pub async fn resolve(
    store: &dyn LocalizationStore,
    lookup: Lookup<'_>,
    args: &[String],
) -> StoreResult<Resolution> {
    let cultures = candidate_cultures(&lookup);
    let entries = store
        .visible_entries(Some(lookup.key), &cultures, lookup.tenant)
        .await?;

    for (position, culture) in cultures.iter().enumerate() {
        if let Some(entry) = pick_for_culture(&entries, culture) {
            if position > 0 {
                debug!(
                    key = lookup.key,
                    requested = lookup.culture,
                    used = culture.as_str(),
                    tenant = %lookup.tenant,
                    "fallback culture used"
                );
            }
            let value = if args.is_empty() {
                entry.value.clone()
            } else {
                format_positional(&entry.value, args)
            };
            return Ok(Resolution {
                value,
                found: true,
                culture: Some(culture.clone()),
            });
        }
    }

    debug!(
        key = lookup.key,
        requested = lookup.culture,
        tenant = %lookup.tenant,
        chain = cultures.join(" -> "),
        "no translation found"
    );
    Ok(Resolution::not_found(lookup.key))
}

/// Resolve every key visible in the culture chain
///
/// Rows are gathered for the whole chain at once, grouped by key, and for
/// each key the winner is the tenant row first, then the nearest culture.
/// The default culture is not consulted here.
///
/// # Returns
///
/// Key → value, ordered by key
pub async fn all_strings(
    store: &dyn LocalizationStore,
    tenant: &TenantScope,
    culture: &str,
    include_parent_cultures: bool,
) -> StoreResult<BTreeMap<String, String>> {
    let cultures = culture_chain(culture, include_parent_cultures);
    let entries = store.visible_entries(None, &cultures, tenant).await?;

    let rank = |entry: &TranslationEntry| {
        let culture_index = cultures
            .iter()
            .position(|c| c == &entry.culture)
            .unwrap_or(usize::MAX);
        (entry.tenant.is_global(), culture_index)
    };

    let mut best: BTreeMap<String, &TranslationEntry> = BTreeMap::new();
    for entry in &entries {
        match best.get(&entry.key) {
            Some(current) if rank(current) <= rank(entry) => {}
            _ => {
                best.insert(entry.key.clone(), entry);
            }
        }
    }

    Ok(best
        .into_iter()
        .map(|(key, entry)| (key, entry.value.clone()))
        .collect())
}

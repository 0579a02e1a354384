//! Stored records: keys, values and the joined view used by lookups

use crate::culture::canonicalize_culture;
use crate::tenant::TenantScope;
use serde::{Deserialize, Serialize};

/// Unique resource key that groups values across cultures and tenants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizationKey {
    pub id: i64,
    /// Resource key, unique across the store (e.g. "Order.Status")
    pub key: String,
    /// Optional context for translators
    pub description: Option<String>,
    /// Protected keys created by seeding; admin deletion needs `force`
    pub is_system: bool,
}

/// Key to be inserted; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLocalizationKey {
    pub key: String,
    pub description: Option<String>,
    pub is_system: bool,
}

impl NewLocalizationKey {
    pub fn new(key: impl Into<String>, is_system: bool) -> Self {
        Self {
            key: key.into(),
            description: None,
            is_system,
        }
    }
}

/// Text for one key in one culture and tenant scope
///
/// `(key_id, culture, tenant)` is unique. A tenant row and a global row for
/// the same key and culture coexist; the tenant row overrides the global one
/// for that tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizationValue {
    pub id: i64,
    pub key_id: i64,
    pub culture: String,
    #[serde(rename = "tenantId")]
    pub tenant: TenantScope,
    pub value: String,
}

/// Value to be inserted; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLocalizationValue {
    pub key_id: i64,
    pub culture: String,
    pub tenant: TenantScope,
    pub value: String,
}

/// A value joined with its key text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationEntry {
    /// Id of the value row
    pub id: i64,
    pub key_id: i64,
    pub key: String,
    pub culture: String,
    #[serde(rename = "tenantId")]
    pub tenant: TenantScope,
    pub value: String,
}

/// Admin listing filter
///
/// `tenant: None` lists every scope; `Some(scope)` matches that scope
/// exactly (global rows are not mixed into a tenant listing).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub tenant: Option<TenantScope>,
    pub culture: Option<String>,
    /// Substring matched against the key or the value text
    pub search: Option<String>,
}

impl EntryFilter {
    /// Filter that matches every stored value
    pub fn all() -> Self {
        Self::default()
    }

    /// Build a filter from loose inputs, treating blank strings as absent
    ///
    /// The culture is canonicalized the way stored cultures are.
    pub fn from_parts(tenant: Option<TenantScope>, culture: Option<&str>, search: Option<&str>) -> Self {
        let non_blank = |s: Option<&str>| {
            s.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            tenant,
            culture: non_blank(culture).map(|c| canonicalize_culture(&c)),
            search: non_blank(search),
        }
    }

    /// Whether an entry passes this filter
    pub fn matches(&self, entry: &TranslationEntry) -> bool {
        if let Some(tenant) = &self.tenant {
            if &entry.tenant != tenant {
                return false;
            }
        }
        if let Some(culture) = &self.culture {
            if &entry.culture != culture {
                return false;
            }
        }
        if let Some(search) = &self.search {
            if !entry.key.contains(search.as_str()) && !entry.value.contains(search.as_str()) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, culture: &str, tenant: TenantScope, value: &str) -> TranslationEntry {
        TranslationEntry {
            id: 1,
            key_id: 1,
            key: key.to_string(),
            culture: culture.to_string(),
            tenant,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_filter_all_matches_everything() {
        let filter = EntryFilter::all();
        assert!(filter.matches(&entry("A", "en-US", TenantScope::Global, "x")));
        assert!(filter.matches(&entry("A", "fr", TenantScope::Tenant("t".into()), "y")));
    }

    #[test]
    fn test_filter_tenant_is_exact() {
        let filter = EntryFilter::from_parts(Some(TenantScope::Tenant("t1".into())), None, None);
        assert!(filter.matches(&entry("A", "en-US", TenantScope::Tenant("t1".into()), "x")));
        assert!(!filter.matches(&entry("A", "en-US", TenantScope::Global, "x")));

        let global = EntryFilter::from_parts(Some(TenantScope::Global), None, None);
        assert!(!global.matches(&entry("A", "en-US", TenantScope::Tenant("t1".into()), "x")));
    }

    #[test]
    fn test_filter_search_key_or_value() {
        let filter = EntryFilter::from_parts(None, Some(" "), Some("Stat"));
        assert_eq!(filter.culture, None);
        assert!(filter.matches(&entry("Order.Status", "en-US", TenantScope::Global, "x")));
        assert!(filter.matches(&entry("Other", "en-US", TenantScope::Global, "Status")));
        assert!(!filter.matches(&entry("Other", "en-US", TenantScope::Global, "x")));
    }

    #[test]
    fn test_filter_culture_canonical() {
        let filter = EntryFilter::from_parts(None, Some("fr-ca"), None);
        assert_eq!(filter.culture.as_deref(), Some("fr-CA"));
        assert!(filter.matches(&entry("A", "fr-CA", TenantScope::Global, "x")));
        assert!(!filter.matches(&entry("A", "fr", TenantScope::Global, "x")));
    }

    #[test]
    fn test_entry_serializes_tenant_id() {
        let json = serde_json::to_value(entry("A", "en-US", TenantScope::Global, "x")).unwrap();
        assert_eq!(json["tenantId"], serde_json::Value::Null);
        assert_eq!(json["keyId"], 1);
    }
}

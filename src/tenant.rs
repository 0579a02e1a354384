//! Tenant scoping for localized values
//!
//! A stored value is either shared by every tenant (`Global`) or belongs to
//! exactly one tenant. Lookups for a tenant see both their own rows and the
//! global rows; lookups without a tenant see only global rows.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope a localized value belongs to
///
/// Ordering places `Global` before any tenant, which is the order admin
/// listings use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum TenantScope {
    /// Shared by all tenants
    #[default]
    Global,
    /// Override owned by one tenant
    Tenant(String),
}

impl TenantScope {
    /// Build a scope from an optional tenant id
    ///
    /// Ids are trimmed; `None`, empty and whitespace-only ids are global.
    ///
    /// # Example
    ///
    /// ```ignore
    /// assert_eq!(TenantScope::from_option(Some(" t1 ")), TenantScope::Tenant("t1".into()));
    /// assert_eq!(TenantScope::from_option(Some("  ")), TenantScope::Global);
    /// ```
    pub fn from_option(tenant_id: Option<&str>) -> Self {
        match tenant_id.map(str::trim) {
            Some(id) if !id.is_empty() => TenantScope::Tenant(id.to_string()),
            _ => TenantScope::Global,
        }
    }

    /// Tenant id, or `None` for the global scope
    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            TenantScope::Global => None,
            TenantScope::Tenant(id) => Some(id.as_str()),
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, TenantScope::Global)
    }

    /// Whether a row stored under `row_scope` is visible to a lookup in `self`
    pub fn can_see(&self, row_scope: &TenantScope) -> bool {
        match (self, row_scope) {
            (_, TenantScope::Global) => true,
            (TenantScope::Tenant(mine), TenantScope::Tenant(theirs)) => mine == theirs,
            (TenantScope::Global, TenantScope::Tenant(_)) => false,
        }
    }
}

impl From<Option<String>> for TenantScope {
    fn from(value: Option<String>) -> Self {
        TenantScope::from_option(value.as_deref())
    }
}

impl From<TenantScope> for Option<String> {
    fn from(value: TenantScope) -> Self {
        match value {
            TenantScope::Global => None,
            TenantScope::Tenant(id) => Some(id),
        }
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantScope::Global => write!(f, "global"),
            TenantScope::Tenant(id) => write!(f, "tenant:{}", id),
        }
    }
}

//! Persistent store for localization keys and values
//!
//! Everything above this module talks to storage through the
//! [`LocalizationStore`] trait, so lookups, seeding and the admin service work
//! the same against SQLite or the in-memory backend.
//!
//! # Example
//!
//! ```ignore
//! use tenant_l10n::store::{InMemoryStore, LocalizationStore};
//! use tenant_l10n::model::NewLocalizationKey;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::new();
//!     let key = store.insert_key(NewLocalizationKey::new("Greeting", false)).await?;
//!     assert!(store.find_key("Greeting").await?.is_some());
//!     Ok(())
//! }
//! ```

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::config::{AppConfig, ConfigError};
use crate::model::{
    EntryFilter, LocalizationKey, LocalizationValue, NewLocalizationKey, NewLocalizationValue,
    TranslationEntry,
};
use crate::tenant::TenantScope;
use crate::upsert::{BatchSummary, UpsertRequest};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Provider names accepted by [`open_store`]
pub const SUPPORTED_PROVIDERS: [&str; 2] = ["sqlite", "memory"];

/// Errors raised by store backends
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("store conflict: {0}")]
    Conflict(String),
    /// A referenced row does not exist
    #[error("store row not found: {0}")]
    NotFound(String),
    /// Engine failure
    #[error("store db error: {0}")]
    Db(String),
    /// Database was written by an incompatible schema version
    #[error("store version mismatch: {0}")]
    VersionMismatch(String),
    /// A writer panicked while holding the store lock
    #[error("store lock poisoned")]
    Poisoned,
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage backend for keys and values
///
/// Implementations enforce the data-model invariants themselves: key text is
/// unique, `(key_id, culture, tenant)` is unique, and deleting a key removes
/// its values. Violations are reported as [`StoreError::Conflict`] so callers
/// racing on the same insert can recover by re-reading.
#[async_trait]
pub trait LocalizationStore: Send + Sync {
    /// Look up a key by its text
    async fn find_key(&self, key: &str) -> StoreResult<Option<LocalizationKey>>;

    /// All keys ordered by key text
    async fn list_keys(&self) -> StoreResult<Vec<LocalizationKey>>;

    /// Insert a key; `Conflict` when the key text already exists
    async fn insert_key(&self, key: NewLocalizationKey) -> StoreResult<LocalizationKey>;

    /// Overwrite description and system flag of an existing key
    ///
    /// Returns `false` when no key has that id.
    async fn update_key(&self, key: &LocalizationKey) -> StoreResult<bool>;

    /// Delete a key and all of its values
    ///
    /// Returns `false` when no key has that id.
    async fn delete_key(&self, key_id: i64) -> StoreResult<bool>;

    /// The value stored for exactly this key, culture and scope
    ///
    /// No tenant/global fallback happens here.
    async fn find_value(
        &self,
        key_id: i64,
        culture: &str,
        tenant: &TenantScope,
    ) -> StoreResult<Option<LocalizationValue>>;

    /// Insert a value; `Conflict` when the triple already exists
    async fn insert_value(&self, value: NewLocalizationValue) -> StoreResult<LocalizationValue>;

    /// Replace the text of a value; `false` when no value has that id
    async fn update_value(&self, value_id: i64, value: &str) -> StoreResult<bool>;

    /// Delete one value; `false` when no value has that id
    async fn delete_value(&self, value_id: i64) -> StoreResult<bool>;

    /// Apply a list of upserts as one unit
    ///
    /// Each request creates its key when missing, then inserts or updates the
    /// value per [`UpsertOutcome::plan`](crate::upsert::UpsertOutcome::plan).
    /// Later requests see the writes of earlier ones. When any request fails
    /// nothing from the batch is kept.
    async fn upsert_batch(&self, requests: &[UpsertRequest]) -> StoreResult<BatchSummary>;

    /// Fetch one value joined with its key
    async fn get_entry(&self, value_id: i64) -> StoreResult<Option<TranslationEntry>>;

    /// Values a lookup in `tenant` may use, restricted to `cultures`
    ///
    /// A global lookup sees global rows only; a tenant lookup sees the
    /// tenant's rows and the global rows. `key: None` returns every key.
    /// Order is unspecified; callers apply precedence.
    async fn visible_entries(
        &self,
        key: Option<&str>,
        cultures: &[String],
        tenant: &TenantScope,
    ) -> StoreResult<Vec<TranslationEntry>>;

    /// Values matching an admin filter, ordered by culture, key, then tenant
    async fn list_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<TranslationEntry>>;
}

/// Open the store configured in `config`
///
/// The provider name is matched case-insensitively. `sqlite` opens (and if
/// needed creates) the database named by the configured connection string;
/// `memory` starts empty.
///
/// # Errors
///
/// - `ConfigError::UnsupportedProvider` for an unknown provider
/// - `ConfigError::MissingConnection` when sqlite has no connection string
/// - store errors from opening the database
pub async fn open_store(config: &AppConfig) -> crate::L10nResult<Arc<dyn LocalizationStore>> {
    let provider = config.localization.provider.trim().to_lowercase();
    match provider.as_str() {
        "sqlite" => {
            let connection = config.connection_string()?;
            let store = SqliteStore::open(connection)?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        _ => Err(ConfigError::UnsupportedProvider(format!(
            "'{}' (supported: {})",
            config.localization.provider,
            SUPPORTED_PROVIDERS.join(", ")
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::L10nError;

    fn config(provider: &str, connection: Option<&str>) -> AppConfig {
        let mut config = AppConfig::default();
        config.localization.provider = provider.to_string();
        if let Some(connection) = connection {
            config
                .connection_strings
                .insert("LocalizationDb".to_string(), connection.to_string());
        }
        config
    }

    #[tokio::test]
    async fn test_open_memory_store() {
        let store = open_store(&config("Memory", None)).await.unwrap();
        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_sqlite_store() {
        let store = open_store(&config(" SQLite ", Some(":memory:"))).await.unwrap();
        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_provider_fails_fast() {
        let result = open_store(&config("oracle", Some("x"))).await;
        match result {
            Err(L10nError::Config(ConfigError::UnsupportedProvider(msg))) => {
                assert!(msg.contains("oracle"));
                assert!(msg.contains("sqlite"));
            }
            _ => panic!("Expected UnsupportedProvider error"),
        }
    }

    #[tokio::test]
    async fn test_sqlite_without_connection_fails_fast() {
        let result = open_store(&config("sqlite", None)).await;
        assert!(matches!(
            result,
            Err(L10nError::Config(ConfigError::MissingConnection(_)))
        ));
    }
}

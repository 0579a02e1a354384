//! Race-tolerant writes
//!
//! Two callers may try to create the same key at once. The store's
//! uniqueness constraints reject the loser with `StoreError::Conflict`;
//! [`ensure_key`] treats that as "someone else wrote it" and continues from
//! the row that now exists.
//!
//! Bulk writes (seeding, import) go through
//! [`LocalizationStore::upsert_batch`], which applies every [`UpsertRequest`]
//! or none of them.

use crate::model::{LocalizationKey, NewLocalizationKey};
use crate::store::{LocalizationStore, StoreError, StoreResult};
use crate::tenant::TenantScope;
use tracing::warn;

/// What one upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

impl UpsertOutcome {
    /// Decide the write for a value given the text currently stored
    ///
    /// An existing value is replaced when `overwrite` is set or when it is
    /// blank. Nothing is written when the stored text already equals `value`.
    pub fn plan(existing: Option<&str>, value: &str, overwrite: bool) -> Self {
        match existing {
            None => Self::Inserted,
            Some(current) if current == value => Self::Unchanged,
            Some(current) if overwrite || current.trim().is_empty() => Self::Updated,
            Some(_) => Self::Unchanged,
        }
    }
}

/// One key/value write inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertRequest {
    pub key: String,
    /// System flag for the key when this request creates it
    pub is_system: bool,
    pub culture: String,
    pub tenant: TenantScope,
    pub value: String,
    pub overwrite: bool,
}

/// Counts from [`LocalizationStore::upsert_batch`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub keys_created: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl BatchSummary {
    pub fn record(&mut self, key_created: bool, outcome: UpsertOutcome) {
        if key_created {
            self.keys_created += 1;
        }
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Requests applied, whatever their outcome
    pub fn applied(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

/// Find a key, creating it when missing
///
/// # Returns
///
/// The key row and whether this call created it
pub async fn ensure_key(
    store: &dyn LocalizationStore,
    key: &str,
    is_system: bool,
) -> StoreResult<(LocalizationKey, bool)> {
    if let Some(existing) = store.find_key(key).await? {
        return Ok((existing, false));
    }
    match store.insert_key(NewLocalizationKey::new(key, is_system)).await {
        Ok(created) => Ok((created, true)),
        Err(StoreError::Conflict(reason)) => {
            warn!(key, %reason, "key created concurrently, reusing existing row");
            store
                .find_key(key)
                .await?
                .map(|existing| (existing, false))
                .ok_or(StoreError::Conflict(reason))
        }
        Err(e) => Err(e),
    }
}

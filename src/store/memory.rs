//! In-memory store
//!
//! Keeps keys and values in ordered maps behind an async `RwLock`. It enforces
//! the same uniqueness and cascade rules as the SQLite schema, which makes it
//! a drop-in backend for tests and for ephemeral deployments.

use super::{LocalizationStore, StoreError, StoreResult};
use crate::model::{
    EntryFilter, LocalizationKey, LocalizationValue, NewLocalizationKey, NewLocalizationValue,
    TranslationEntry,
};
use crate::tenant::TenantScope;
use crate::upsert::{BatchSummary, UpsertOutcome, UpsertRequest};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    keys: BTreeMap<i64, LocalizationKey>,
    values: BTreeMap<i64, LocalizationValue>,
    next_key_id: i64,
    next_value_id: i64,
}

impl Tables {
    fn entry_for(&self, value: &LocalizationValue) -> Option<TranslationEntry> {
        self.keys.get(&value.key_id).map(|key| TranslationEntry {
            id: value.id,
            key_id: value.key_id,
            key: key.key.clone(),
            culture: value.culture.clone(),
            tenant: value.tenant.clone(),
            value: value.value.clone(),
        })
    }

    fn entries(&self) -> impl Iterator<Item = TranslationEntry> + '_ {
        self.values.values().filter_map(|value| self.entry_for(value))
    }

    /// Apply one batch request; returns whether the key was created
    fn upsert(&mut self, request: &UpsertRequest) -> (bool, UpsertOutcome) {
        let existing_key = self
            .keys
            .values()
            .find(|k| k.key == request.key)
            .map(|k| k.id);
        let (key_id, key_created) = match existing_key {
            Some(id) => (id, false),
            None => {
                self.next_key_id += 1;
                let id = self.next_key_id;
                self.keys.insert(
                    id,
                    LocalizationKey {
                        id,
                        key: request.key.clone(),
                        description: None,
                        is_system: request.is_system,
                    },
                );
                (id, true)
            }
        };

        let existing = self
            .values
            .values()
            .find(|v| {
                v.key_id == key_id && v.culture == request.culture && v.tenant == request.tenant
            })
            .map(|v| (v.id, v.value.clone()));
        let outcome = UpsertOutcome::plan(
            existing.as_ref().map(|(_, value)| value.as_str()),
            &request.value,
            request.overwrite,
        );
        match (outcome, existing) {
            (UpsertOutcome::Updated, Some((id, _))) => {
                if let Some(row) = self.values.get_mut(&id) {
                    row.value = request.value.clone();
                }
            }
            (UpsertOutcome::Inserted, _) => {
                self.next_value_id += 1;
                let id = self.next_value_id;
                self.values.insert(
                    id,
                    LocalizationValue {
                        id,
                        key_id,
                        culture: request.culture.clone(),
                        tenant: request.tenant.clone(),
                        value: request.value.clone(),
                    },
                );
            }
            _ => {}
        }
        (key_created, outcome)
    }
}

/// Store backed by process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalizationStore for InMemoryStore {
    async fn find_key(&self, key: &str) -> StoreResult<Option<LocalizationKey>> {
        let tables = self.tables.read().await;
        Ok(tables.keys.values().find(|k| k.key == key).cloned())
    }

    async fn list_keys(&self) -> StoreResult<Vec<LocalizationKey>> {
        let tables = self.tables.read().await;
        let mut keys: Vec<LocalizationKey> = tables.keys.values().cloned().collect();
        keys.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(keys)
    }

    async fn insert_key(&self, key: NewLocalizationKey) -> StoreResult<LocalizationKey> {
        let mut tables = self.tables.write().await;
        if tables.keys.values().any(|k| k.key == key.key) {
            return Err(StoreError::Conflict(format!("key '{}' already exists", key.key)));
        }
        tables.next_key_id += 1;
        let stored = LocalizationKey {
            id: tables.next_key_id,
            key: key.key,
            description: key.description,
            is_system: key.is_system,
        };
        tables.keys.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_key(&self, key: &LocalizationKey) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.keys.get_mut(&key.id) {
            Some(existing) => {
                existing.description = key.description.clone();
                existing.is_system = key.is_system;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_key(&self, key_id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.keys.remove(&key_id).is_none() {
            return Ok(false);
        }
        tables.values.retain(|_, v| v.key_id != key_id);
        Ok(true)
    }

    async fn find_value(
        &self,
        key_id: i64,
        culture: &str,
        tenant: &TenantScope,
    ) -> StoreResult<Option<LocalizationValue>> {
        let tables = self.tables.read().await;
        Ok(tables
            .values
            .values()
            .find(|v| v.key_id == key_id && v.culture == culture && &v.tenant == tenant)
            .cloned())
    }

    async fn insert_value(&self, value: NewLocalizationValue) -> StoreResult<LocalizationValue> {
        let mut tables = self.tables.write().await;
        if !tables.keys.contains_key(&value.key_id) {
            return Err(StoreError::NotFound(format!("key id {}", value.key_id)));
        }
        let duplicate = tables.values.values().any(|v| {
            v.key_id == value.key_id && v.culture == value.culture && v.tenant == value.tenant
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "value for key id {} in {} ({}) already exists",
                value.key_id, value.culture, value.tenant
            )));
        }
        tables.next_value_id += 1;
        let stored = LocalizationValue {
            id: tables.next_value_id,
            key_id: value.key_id,
            culture: value.culture,
            tenant: value.tenant,
            value: value.value,
        };
        tables.values.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_value(&self, value_id: i64, value: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.values.get_mut(&value_id) {
            Some(existing) => {
                existing.value = value.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_value(&self, value_id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.values.remove(&value_id).is_some())
    }

    async fn upsert_batch(&self, requests: &[UpsertRequest]) -> StoreResult<BatchSummary> {
        let mut tables = self.tables.write().await;
        let mut summary = BatchSummary::default();
        for request in requests {
            let (key_created, outcome) = tables.upsert(request);
            summary.record(key_created, outcome);
        }
        Ok(summary)
    }

    async fn get_entry(&self, value_id: i64) -> StoreResult<Option<TranslationEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .values
            .get(&value_id)
            .and_then(|value| tables.entry_for(value)))
    }

    async fn visible_entries(
        &self,
        key: Option<&str>,
        cultures: &[String],
        tenant: &TenantScope,
    ) -> StoreResult<Vec<TranslationEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .entries()
            .filter(|e| key.is_none_or(|k| e.key == k))
            .filter(|e| cultures.iter().any(|c| c == &e.culture))
            .filter(|e| tenant.can_see(&e.tenant))
            .collect())
    }

    async fn list_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<TranslationEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<TranslationEntry> =
            tables.entries().filter(|e| filter.matches(e)).collect();
        entries.sort_by(|a, b| {
            a.culture
                .cmp(&b.culture)
                .then_with(|| a.key.cmp(&b.key))
                .then_with(|| a.tenant.cmp(&b.tenant))
        });
        Ok(entries)
    }
}

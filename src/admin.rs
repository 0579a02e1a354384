//! Administration of stored translations
//!
//! CRUD over individual values, key management, and bulk import/export in
//! the [`interchange`](crate::interchange) formats.

use crate::config::LocalizationOptions;
use crate::culture::canonicalize_culture;
use crate::error::{L10nError, L10nResult};
use crate::interchange::{self, ImportRow, TranslationRecord};
use crate::model::{EntryFilter, LocalizationKey, NewLocalizationValue, TranslationEntry};
use crate::store::{LocalizationStore, StoreError};
use crate::upsert::{UpsertRequest, ensure_key};
use std::sync::Arc;
use tracing::{debug, info};

/// Translation administration over a store
///
/// # Example
///
/// ```ignore
/// let admin = AdminService::new(store, options);
/// let csv = admin.export_csv(&EntryFilter::all()).await?;
/// let imported = admin.import_csv(&csv).await?;
/// ```
#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn LocalizationStore>,
    options: LocalizationOptions,
}

impl AdminService {
    pub fn new(store: Arc<dyn LocalizationStore>, options: LocalizationOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &LocalizationOptions {
        &self.options
    }

    // ---------- Values ----------

    /// Values matching `filter`, ordered by culture, key, then tenant
    pub async fn list(&self, filter: &EntryFilter) -> L10nResult<Vec<TranslationEntry>> {
        Ok(self.store.list_entries(filter).await?)
    }

    pub async fn get(&self, value_id: i64) -> L10nResult<TranslationEntry> {
        self.store
            .get_entry(value_id)
            .await?
            .ok_or_else(|| L10nError::NotFound(format!("translation {value_id}")))
    }

    /// Add one value, creating its key when needed
    ///
    /// # Errors
    ///
    /// - `Invalid` when the key or culture is blank
    /// - `Duplicate` when the key, culture and tenant already have a value
    pub async fn create(&self, record: TranslationRecord) -> L10nResult<TranslationEntry> {
        let row = ImportRow {
            key: Some(record.key),
            culture: Some(record.culture),
            tenant_id: record.tenant_id,
            value: Some(record.value),
        };
        let record = row
            .normalize(&self.options.default_culture)
            .ok_or_else(|| L10nError::Invalid("key and culture are required".to_string()))?;
        let tenant = record.tenant();
        let duplicate = || {
            L10nError::Duplicate(format!(
                "'{}' already has a {} value for {}",
                record.key, record.culture, tenant
            ))
        };

        let (key, _) = ensure_key(self.store.as_ref(), &record.key, false).await?;
        if self
            .store
            .find_value(key.id, &record.culture, &tenant)
            .await?
            .is_some()
        {
            return Err(duplicate());
        }
        let inserted = self
            .store
            .insert_value(NewLocalizationValue {
                key_id: key.id,
                culture: record.culture.clone(),
                tenant: tenant.clone(),
                value: record.value.clone(),
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => duplicate(),
                other => other.into(),
            })?;
        self.get(inserted.id).await
    }

    /// Replace the text of one value
    pub async fn update(&self, value_id: i64, value: &str) -> L10nResult<TranslationEntry> {
        if !self.store.update_value(value_id, value).await? {
            return Err(L10nError::NotFound(format!("translation {value_id}")));
        }
        self.get(value_id).await
    }

    pub async fn delete(&self, value_id: i64) -> L10nResult<()> {
        if !self.store.delete_value(value_id).await? {
            return Err(L10nError::NotFound(format!("translation {value_id}")));
        }
        Ok(())
    }

    // ---------- Keys ----------

    pub async fn list_keys(&self) -> L10nResult<Vec<LocalizationKey>> {
        Ok(self.store.list_keys().await?)
    }

    /// Set or clear the translator note on a key
    pub async fn describe_key(
        &self,
        key: &str,
        description: Option<&str>,
    ) -> L10nResult<LocalizationKey> {
        let mut row = self.find_key(key).await?;
        row.description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        self.store.update_key(&row).await?;
        Ok(row)
    }

    /// Delete a key and every value under it
    ///
    /// System keys are only deleted with `force`.
    pub async fn delete_key(&self, key: &str, force: bool) -> L10nResult<()> {
        let row = self.find_key(key).await?;
        if row.is_system && !force {
            return Err(L10nError::Protected(format!(
                "'{}' is a system key; deleting it requires force",
                row.key
            )));
        }
        if !self.store.delete_key(row.id).await? {
            return Err(L10nError::NotFound(format!("key '{}'", row.key)));
        }
        info!(key = row.key.as_str(), force, "key deleted");
        Ok(())
    }

    async fn find_key(&self, key: &str) -> L10nResult<LocalizationKey> {
        self.store
            .find_key(key.trim())
            .await?
            .ok_or_else(|| L10nError::NotFound(format!("key '{}'", key.trim())))
    }

    // ---------- Export ----------

    async fn records(&self, filter: &EntryFilter) -> L10nResult<Vec<TranslationRecord>> {
        let entries = self.store.list_entries(filter).await?;
        Ok(entries.iter().map(TranslationRecord::from).collect())
    }

    pub async fn export_csv(&self, filter: &EntryFilter) -> L10nResult<String> {
        interchange::write_csv(&self.records(filter).await?)
    }

    pub async fn export_json(&self, filter: &EntryFilter) -> L10nResult<String> {
        interchange::write_json(&self.records(filter).await?)
    }

    // ---------- Import ----------

    /// Records a CSV import would apply, without writing anything
    pub fn preview_csv(&self, text: &str) -> Vec<TranslationRecord> {
        self.normalize(interchange::read_csv(text))
    }

    /// Records a JSON import would apply, without writing anything
    pub fn preview_json(&self, text: &str) -> L10nResult<Vec<TranslationRecord>> {
        Ok(self.normalize(interchange::read_json(text)?))
    }

    /// Upsert every valid CSV row; returns the number of rows applied
    pub async fn import_csv(&self, text: &str) -> L10nResult<usize> {
        let records = self.preview_csv(text);
        self.apply(records, "csv").await
    }

    /// Upsert every valid JSON row; returns the number of rows applied
    pub async fn import_json(&self, text: &str) -> L10nResult<usize> {
        let records = self.preview_json(text)?;
        self.apply(records, "json").await
    }

    fn normalize(&self, rows: Vec<ImportRow>) -> Vec<TranslationRecord> {
        let total = rows.len();
        let default_culture = canonicalize_culture(&self.options.default_culture);
        let records: Vec<TranslationRecord> = rows
            .into_iter()
            .filter_map(|row| row.normalize(&default_culture))
            .collect();
        if records.len() < total {
            debug!(
                skipped = total - records.len(),
                "import rows without key or culture skipped"
            );
        }
        records
    }

    /// Write all records in one batch; a failure leaves the store untouched
    async fn apply(&self, records: Vec<TranslationRecord>, format: &str) -> L10nResult<usize> {
        let requests: Vec<UpsertRequest> = records
            .into_iter()
            .map(|record| UpsertRequest {
                tenant: record.tenant(),
                key: record.key,
                is_system: false,
                culture: record.culture,
                value: record.value,
                overwrite: true,
            })
            .collect();
        let summary = self.store.upsert_batch(&requests).await?;
        info!(
            format,
            applied = summary.applied(),
            inserted = summary.inserted,
            updated = summary.updated,
            keys_created = summary.keys_created,
            "import complete"
        );
        Ok(summary.applied())
    }
}

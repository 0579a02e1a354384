//! Seeding keys and default values from field descriptors
//!
//! Applications describe which model fields need localization with a list of
//! [`LocalizableField`] values built at startup (or loaded from JSON). The
//! [`Seeder`] makes sure every declared key exists and has a value in every
//! requested culture, and [`Seeder::sync_model`] pushes a model's current
//! field values into the store when the owning service persists it.
//!
//! # Example
//!
//! ```ignore
//! let fields = vec![
//!     LocalizableField::generated(&options, "Order", "Status")
//!         .with_display_name_key("Order.Status.Display"),
//! ];
//! let seeder = Seeder::new(store.clone());
//! let report = seeder
//!     .seed(&fields, &["en-US".to_string()], &TenantScope::Global, false)
//!     .await?;
//! println!("{} rows touched", report.touched());
//! ```

use crate::config::LocalizationOptions;
use crate::culture::canonicalize_culture;
use crate::error::L10nResult;
use crate::store::LocalizationStore;
use crate::tenant::TenantScope;
use crate::upsert::{BatchSummary, UpsertRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Last key segments too generic to be a useful default text
const GENERIC_SUFFIXES: [&str; 3] = ["Display", "Name", "Label"];

/// A model field that needs localized text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizableField {
    /// Owning model, e.g. "Order"
    pub model: String,
    /// Field identifier, e.g. "Status"
    pub field: String,
    /// Primary resource key
    pub key: String,
    /// Fixed culture; when set only this culture is seeded for the field
    #[serde(default)]
    pub culture: Option<String>,
    /// Write the key text into the field when no translation exists
    #[serde(default)]
    pub fallback_to_default: bool,
    #[serde(default)]
    pub display_name_key: Option<String>,
    #[serde(default)]
    pub display_message_key: Option<String>,
    #[serde(default)]
    pub error_message_key: Option<String>,
}

impl LocalizableField {
    pub fn new(model: impl Into<String>, field: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            field: field.into(),
            key: key.into(),
            culture: None,
            fallback_to_default: false,
            display_name_key: None,
            display_message_key: None,
            error_message_key: None,
        }
    }

    /// Descriptor whose key is generated from the model and field names
    pub fn generated(options: &LocalizationOptions, model: &str, field: &str) -> Self {
        Self::new(model, field, options.generated_key(model, field))
    }

    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        self.culture = Some(culture.into());
        self
    }

    pub fn with_fallback_to_default(mut self, fallback: bool) -> Self {
        self.fallback_to_default = fallback;
        self
    }

    pub fn with_display_name_key(mut self, key: impl Into<String>) -> Self {
        self.display_name_key = Some(key.into());
        self
    }

    pub fn with_display_message_key(mut self, key: impl Into<String>) -> Self {
        self.display_message_key = Some(key.into());
        self
    }

    pub fn with_error_message_key(mut self, key: impl Into<String>) -> Self {
        self.error_message_key = Some(key.into());
        self
    }

    /// Primary and secondary keys, trimmed, blanks and repeats dropped
    ///
    /// Keys are compared exactly, matching the store, so `Order.Status` and
    /// `order.status` are two keys.
    pub fn declared_keys(&self) -> Vec<&str> {
        let candidates = [
            Some(self.key.as_str()),
            self.display_name_key.as_deref(),
            self.display_message_key.as_deref(),
            self.error_message_key.as_deref(),
        ];
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .filter(|k| seen.insert(*k))
            .collect()
    }

    fn fixed_culture(&self) -> Option<&str> {
        self.culture
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// Parse a JSON array of field descriptors
pub fn load_descriptors(json: &str) -> serde_json::Result<Vec<LocalizableField>> {
    serde_json::from_str(json)
}

/// Human default for a generated key
///
/// Takes the last dot-delimited segment of `key`. When that segment is a
/// generic suffix (`Display`, `Name`, `Label`, any case) or empty, the field
/// name is used instead.
///
/// ```ignore
/// assert_eq!(default_value_for("Status", "Order.Status"), "Status");
/// assert_eq!(default_value_for("Status", "Order.Status.Display"), "Status");
/// ```
pub fn default_value_for(field: &str, key: &str) -> String {
    let last = key.rsplit('.').next().unwrap_or("").trim();
    if last.is_empty()
        || GENERIC_SUFFIXES
            .iter()
            .any(|suffix| suffix.eq_ignore_ascii_case(last))
    {
        field.to_string()
    } else {
        last.to_string()
    }
}

/// Models whose fields are localized
///
/// Replaces attribute scanning: the model lists its descriptors and exposes
/// its fields by name.
pub trait LocalizedModel {
    fn localizable_fields(&self) -> Vec<LocalizableField>;

    /// Current text of `field`, `None` for an unknown field
    fn field_value(&self, field: &str) -> Option<String>;

    /// Replace the text of `field`; returns `false` for an unknown field
    fn set_field_value(&mut self, field: &str, value: String) -> bool;
}

/// Counts from a seed or sync run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub keys_created: usize,
    pub values_inserted: usize,
    pub values_updated: usize,
}

impl SeedReport {
    /// Value rows inserted or changed
    pub fn touched(&self) -> usize {
        self.values_inserted + self.values_updated
    }
}

impl From<BatchSummary> for SeedReport {
    fn from(summary: BatchSummary) -> Self {
        Self {
            keys_created: summary.keys_created,
            values_inserted: summary.inserted,
            values_updated: summary.updated,
        }
    }
}

/// Trim, canonicalize and de-duplicate cultures, first spelling wins
fn normalize_cultures(cultures: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    cultures
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(canonicalize_culture)
        .filter(|c| seen.insert(c.to_lowercase()))
        .collect()
}

/// Creates keys and default values in the store
pub struct Seeder {
    store: Arc<dyn LocalizationStore>,
}

impl Seeder {
    pub fn new(store: Arc<dyn LocalizationStore>) -> Self {
        Self { store }
    }

    /// Ensure every declared key has a value in every culture
    ///
    /// Missing keys are created as system keys. Missing values get
    /// [`default_value_for`]; existing values are replaced only when
    /// `overwrite` is set or they are blank. A descriptor with a fixed
    /// culture ignores `cultures`.
    ///
    /// Running twice with `overwrite = false` changes nothing the second time.
    pub async fn seed(
        &self,
        descriptors: &[LocalizableField],
        cultures: &[String],
        tenant: &TenantScope,
        overwrite: bool,
    ) -> L10nResult<SeedReport> {
        let requested = normalize_cultures(cultures);
        let mut requests = Vec::new();

        for descriptor in descriptors {
            let targets = match descriptor.fixed_culture() {
                Some(fixed) => vec![canonicalize_culture(fixed)],
                None => requested.clone(),
            };
            for key in descriptor.declared_keys() {
                let default = default_value_for(&descriptor.field, key);
                for culture in &targets {
                    requests.push(UpsertRequest {
                        key: key.to_string(),
                        is_system: true,
                        culture: culture.clone(),
                        tenant: tenant.clone(),
                        value: default.clone(),
                        overwrite,
                    });
                }
            }
        }

        let report = SeedReport::from(self.store.upsert_batch(&requests).await?);
        info!(
            descriptors = descriptors.len(),
            keys_created = report.keys_created,
            inserted = report.values_inserted,
            updated = report.values_updated,
            %tenant,
            "seed complete"
        );
        Ok(report)
    }

    /// Push a model's current field values into the store
    ///
    /// The primary key of each field receives the field's text. Secondary
    /// keys get generated texts, written only when missing or blank so that
    /// edits made through the admin service are kept.
    pub async fn sync_model<M: LocalizedModel + ?Sized>(
        &self,
        model: &M,
        culture: &str,
        tenant: &TenantScope,
    ) -> L10nResult<SeedReport> {
        let mut requests = Vec::new();

        for descriptor in model.localizable_fields() {
            let target = canonicalize_culture(descriptor.fixed_culture().unwrap_or(culture));
            let field = descriptor.field.as_str();

            let mut writes: Vec<(&str, String, bool)> = Vec::new();
            match model.field_value(field) {
                Some(current) => writes.push((descriptor.key.as_str(), current, true)),
                None => debug!(field, "model has no value for field, skipping primary key"),
            }
            if let Some(key) = &descriptor.display_name_key {
                writes.push((key.as_str(), field.to_string(), false));
            }
            if let Some(key) = &descriptor.display_message_key {
                writes.push((key.as_str(), format!("Info about {field}"), false));
            }
            if let Some(key) = &descriptor.error_message_key {
                writes.push((key.as_str(), format!("{field} is required"), false));
            }

            let mut seen = HashSet::new();
            for (key, value, overwrite) in writes {
                let key = key.trim();
                if key.is_empty() || !seen.insert(key) {
                    continue;
                }
                requests.push(UpsertRequest {
                    key: key.to_string(),
                    is_system: true,
                    culture: target.clone(),
                    tenant: tenant.clone(),
                    value,
                    overwrite,
                });
            }
        }

        let report = SeedReport::from(self.store.upsert_batch(&requests).await?);
        debug!(
            inserted = report.values_inserted,
            updated = report.values_updated,
            "model synced"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntryFilter;
    use crate::store::InMemoryStore;

    fn store() -> Arc<dyn LocalizationStore> {
        Arc::new(InMemoryStore::new())
    }

    async fn value_of(
        store: &Arc<dyn LocalizationStore>,
        key: &str,
        culture: &str,
        tenant: &TenantScope,
    ) -> Option<String> {
        let key = store.find_key(key).await.unwrap()?;
        store
            .find_value(key.id, culture, tenant)
            .await
            .unwrap()
            .map(|v| v.value)
    }

    fn cultures(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    // ========== Default values ==========

    #[test]
    fn test_default_value_last_segment() {
        assert_eq!(default_value_for("Status", "Order.Status"), "Status");
        assert_eq!(default_value_for("Price", "Product.Cost"), "Cost");
        assert_eq!(default_value_for("Title", "Title"), "Title");
    }

    #[test]
    fn test_default_value_generic_suffix() {
        assert_eq!(default_value_for("Status", "Order.Status.Display"), "Status");
        assert_eq!(default_value_for("Name", "Product.Name.label"), "Name");
        assert_eq!(default_value_for("Title", "Product.NAME"), "Title");
        assert_eq!(default_value_for("Title", "Product."), "Title");
    }

    // ========== Descriptors ==========

    #[test]
    fn test_declared_keys_dedup() {
        let field = LocalizableField::new("Order", "Status", "Order.Status")
            .with_display_name_key(" Order.Status ")
            .with_display_message_key(" ")
            .with_error_message_key("Order.Status.Error");
        assert_eq!(field.declared_keys(), vec!["Order.Status", "Order.Status.Error"]);
    }

    #[test]
    fn test_declared_keys_case_sensitive() {
        let field = LocalizableField::new("Order", "Status", "Order.Status")
            .with_display_name_key("order.status");
        assert_eq!(field.declared_keys(), vec!["Order.Status", "order.status"]);
    }

    #[test]
    fn test_generated_key_uses_prefix() {
        let options = LocalizationOptions {
            key_prefix: Some("App.".to_string()),
            ..LocalizationOptions::default()
        };
        let field = LocalizableField::generated(&options, "Order", "Status");
        assert_eq!(field.key, "App.Order.Status");
    }

    #[test]
    fn test_load_descriptors_json() {
        let fields = load_descriptors(
            r#"[{"model":"Order","field":"Status","key":"Order.Status",
                 "displayNameKey":"Order.Status.Display","fallbackToDefault":true}]"#,
        )
        .unwrap();
        assert_eq!(fields.len(), 1);
        assert!(fields[0].fallback_to_default);
        assert_eq!(fields[0].display_name_key.as_deref(), Some("Order.Status.Display"));
        assert_eq!(fields[0].culture, None);
    }

    // ========== Seeding ==========

    #[tokio::test]
    async fn test_seed_order_status() {
        let store = store();
        let seeder = Seeder::new(store.clone());
        let fields = vec![
            LocalizableField::new("Order", "Status", "Order.Status")
                .with_display_name_key("Order.Status.Display"),
        ];

        let report = seeder
            .seed(&fields, &cultures(&["en-US"]), &TenantScope::Global, false)
            .await
            .unwrap();
        assert_eq!(report.keys_created, 2);
        assert_eq!(report.touched(), 2);

        let global = TenantScope::Global;
        assert_eq!(value_of(&store, "Order.Status", "en-US", &global).await.as_deref(), Some("Status"));
        assert_eq!(
            value_of(&store, "Order.Status.Display", "en-US", &global).await.as_deref(),
            Some("Status")
        );
        assert!(store.find_key("Order.Status").await.unwrap().unwrap().is_system);
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = store();
        let seeder = Seeder::new(store.clone());
        let fields = vec![
            LocalizableField::new("Order", "Status", "Order.Status")
                .with_error_message_key("Order.Status.Error"),
        ];
        let requested = cultures(&["en-US", "fr-FR"]);

        let first = seeder
            .seed(&fields, &requested, &TenantScope::Global, false)
            .await
            .unwrap();
        assert_eq!(first.touched(), 4);
        let rows = store.list_entries(&EntryFilter::all()).await.unwrap();

        let second = seeder
            .seed(&fields, &requested, &TenantScope::Global, false)
            .await
            .unwrap();
        assert_eq!(second, SeedReport::default());
        assert_eq!(store.list_entries(&EntryFilter::all()).await.unwrap(), rows);
    }

    #[tokio::test]
    async fn test_seed_keeps_edits_unless_overwrite() {
        let store = store();
        let seeder = Seeder::new(store.clone());
        let fields = vec![LocalizableField::new("Order", "Status", "Order.Status")];
        let global = TenantScope::Global;

        seeder.seed(&fields, &cultures(&["en-US"]), &global, false).await.unwrap();
        let key = store.find_key("Order.Status").await.unwrap().unwrap();
        let row = store.find_value(key.id, "en-US", &global).await.unwrap().unwrap();
        store.update_value(row.id, "Order state").await.unwrap();

        seeder.seed(&fields, &cultures(&["en-US"]), &global, false).await.unwrap();
        assert_eq!(value_of(&store, "Order.Status", "en-US", &global).await.as_deref(), Some("Order state"));

        let report = seeder.seed(&fields, &cultures(&["en-US"]), &global, true).await.unwrap();
        assert_eq!(report.values_updated, 1);
        assert_eq!(value_of(&store, "Order.Status", "en-US", &global).await.as_deref(), Some("Status"));
    }

    #[tokio::test]
    async fn test_seed_fixed_culture_and_dedup() {
        let store = store();
        let seeder = Seeder::new(store.clone());
        let fields = vec![
            LocalizableField::new("Order", "Status", "Order.Status").with_culture("de-DE"),
            LocalizableField::new("Order", "Total", "Order.Total"),
        ];

        let report = seeder
            .seed(&fields, &cultures(&["en-US", " en-us ", ""]), &TenantScope::Global, false)
            .await
            .unwrap();
        assert_eq!(report.touched(), 2);

        let global = TenantScope::Global;
        assert!(value_of(&store, "Order.Status", "de-DE", &global).await.is_some());
        assert!(value_of(&store, "Order.Status", "en-US", &global).await.is_none());
        assert!(value_of(&store, "Order.Total", "en-US", &global).await.is_some());
    }

    #[tokio::test]
    async fn test_seed_creates_keys_differing_in_case() {
        let store = store();
        let seeder = Seeder::new(store.clone());
        let fields = vec![
            LocalizableField::new("Order", "Status", "Order.Status")
                .with_display_name_key("order.status"),
        ];

        let report = seeder
            .seed(&fields, &cultures(&["en-US"]), &TenantScope::Global, false)
            .await
            .unwrap();
        assert_eq!(report.keys_created, 2);
        let global = TenantScope::Global;
        assert_eq!(value_of(&store, "order.status", "en-US", &global).await.as_deref(), Some("status"));
    }

    #[tokio::test]
    async fn test_seed_tenant_scope() {
        let store = store();
        let seeder = Seeder::new(store.clone());
        let fields = vec![LocalizableField::new("Order", "Status", "Order.Status")];
        let tenant = TenantScope::Tenant("acme".to_string());

        seeder.seed(&fields, &cultures(&["en-US"]), &tenant, false).await.unwrap();
        assert!(value_of(&store, "Order.Status", "en-US", &tenant).await.is_some());
        assert!(value_of(&store, "Order.Status", "en-US", &TenantScope::Global).await.is_none());
    }

    // ========== Model sync ==========

    struct Order {
        status: String,
    }

    impl LocalizedModel for Order {
        fn localizable_fields(&self) -> Vec<LocalizableField> {
            vec![
                LocalizableField::new("Order", "Status", "Order.Status")
                    .with_display_name_key("Order.Status.Display")
                    .with_display_message_key("Order.Status.Info")
                    .with_error_message_key("Order.Status.Error"),
            ]
        }

        fn field_value(&self, field: &str) -> Option<String> {
            (field == "Status").then(|| self.status.clone())
        }

        fn set_field_value(&mut self, field: &str, value: String) -> bool {
            if field == "Status" {
                self.status = value;
                true
            } else {
                false
            }
        }
    }

    #[tokio::test]
    async fn test_sync_model_writes_field_and_messages() {
        let store = store();
        let seeder = Seeder::new(store.clone());
        let global = TenantScope::Global;

        let order = Order {
            status: "Shipped".to_string(),
        };
        let report = seeder.sync_model(&order, "en-US", &global).await.unwrap();
        assert_eq!(report.keys_created, 4);
        assert_eq!(report.values_inserted, 4);

        assert_eq!(value_of(&store, "Order.Status", "en-US", &global).await.as_deref(), Some("Shipped"));
        assert_eq!(value_of(&store, "Order.Status.Display", "en-US", &global).await.as_deref(), Some("Status"));
        assert_eq!(
            value_of(&store, "Order.Status.Info", "en-US", &global).await.as_deref(),
            Some("Info about Status")
        );
        assert_eq!(
            value_of(&store, "Order.Status.Error", "en-US", &global).await.as_deref(),
            Some("Status is required")
        );
    }

    #[tokio::test]
    async fn test_sync_model_updates_primary_only() {
        let store = store();
        let seeder = Seeder::new(store.clone());
        let global = TenantScope::Global;

        let mut order = Order {
            status: "Shipped".to_string(),
        };
        seeder.sync_model(&order, "en-US", &global).await.unwrap();

        let key = store.find_key("Order.Status.Error").await.unwrap().unwrap();
        let row = store.find_value(key.id, "en-US", &global).await.unwrap().unwrap();
        store.update_value(row.id, "Please pick a status").await.unwrap();

        order.set_field_value("Status", "Delivered".to_string());
        let report = seeder.sync_model(&order, "en-US", &global).await.unwrap();
        assert_eq!(report.values_updated, 1);
        assert_eq!(report.values_inserted, 0);

        assert_eq!(value_of(&store, "Order.Status", "en-US", &global).await.as_deref(), Some("Delivered"));
        assert_eq!(
            value_of(&store, "Order.Status.Error", "en-US", &global).await.as_deref(),
            Some("Please pick a status")
        );
    }
}

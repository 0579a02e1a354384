//! Database-backed string localization with tenant overrides and culture fallback
//!
//! ```ignore
//! let config = AppConfig::load(None)?;
//! let store = open_store(&config).await?;
//! let factory = LocalizerFactory::new(store, config.localization.clone());
//!
//! let localizer = factory.create_for_culture("Orders", "fr-CA").with_tenant(Some("acme"));
//! let title = localizer.get("Order.Title").await?;
//! println!("{title}");
//! ```

use std::fmt;
use std::sync::Arc;

pub mod admin;
pub mod config;
pub mod culture;
pub mod error;
pub mod format;
pub mod interchange;
pub mod model;
pub mod resolver;
pub mod seed;
pub mod store;
pub mod tenant;
pub mod upsert;


pub use admin::AdminService;
pub use config::{AppConfig, ConfigError, LocalizationOptions};
pub use error::{L10nError, L10nResult};
pub use interchange::TranslationRecord;
pub use model::{EntryFilter, LocalizationKey, LocalizationValue, TranslationEntry};
pub use seed::{LocalizableField, LocalizedModel, SeedReport, Seeder};
pub use store::{InMemoryStore, LocalizationStore, SqliteStore, StoreError, open_store};
pub use tenant::TenantScope;

use crate::resolver::Lookup;

/// A looked-up string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedString {
    /// Key that was requested
    pub name: String,
    /// Resolved text, or the key itself when nothing was found
    pub value: String,
    pub resource_not_found: bool,
}

impl fmt::Display for LocalizedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// String lookups for one culture and tenant scope
#[derive(Clone)]
pub struct Localizer {
    store: Arc<dyn LocalizationStore>,
    options: Arc<LocalizationOptions>,
    resource_name: String,
    tenant: TenantScope,
    culture: String,
}

impl Localizer {
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn culture(&self) -> &str {
        &self.culture
    }

    pub fn tenant(&self) -> &TenantScope {
        &self.tenant
    }

    /// Look up `name` in this localizer's culture and tenant
    ///
    /// A missing key is not an error: the result holds the key text and
    /// `resource_not_found = true`.
    pub async fn get(&self, name: &str) -> L10nResult<LocalizedString> {
        self.get_with_args(name, &[]).await
    }

    /// Look up `name` and substitute `{0}`, `{1}`, ... with `args`
    pub async fn get_with_args(&self, name: &str, args: &[String]) -> L10nResult<LocalizedString> {
        self.lookup(name, &self.culture, args).await
    }

    async fn lookup(&self, name: &str, culture: &str, args: &[String]) -> L10nResult<LocalizedString> {
        let lookup = Lookup {
            key: name,
            tenant: &self.tenant,
            culture,
            enable_fallback: self.options.enable_culture_fallback,
            default_culture: &self.options.default_culture,
        };
        let resolution = resolver::resolve(self.store.as_ref(), lookup, args).await?;
        Ok(LocalizedString {
            name: name.to_string(),
            value: resolution.value,
            resource_not_found: !resolution.found,
        })
    }

    /// Every string visible to this localizer, ordered by key
    pub async fn get_all_strings(
        &self,
        include_parent_cultures: bool,
    ) -> L10nResult<Vec<LocalizedString>> {
        let strings = resolver::all_strings(
            self.store.as_ref(),
            &self.tenant,
            &self.culture,
            include_parent_cultures,
        )
        .await?;
        Ok(strings
            .into_iter()
            .map(|(name, value)| LocalizedString {
                name,
                value,
                resource_not_found: false,
            })
            .collect())
    }

    /// Same store and tenant, different culture
    pub fn with_culture(&self, culture: &str) -> Self {
        Self {
            culture: crate::culture::canonicalize_culture(culture),
            ..self.clone()
        }
    }

    /// Same store and culture, different tenant; blank means global
    pub fn with_tenant(&self, tenant_id: Option<&str>) -> Self {
        Self {
            tenant: TenantScope::from_option(tenant_id),
            ..self.clone()
        }
    }

    /// Write localized text into a model's fields
    ///
    /// A field is written when its key resolves, or when its descriptor sets
    /// `fallback_to_default` (the key text is written then). A descriptor with
    /// a fixed culture is looked up in that culture.
    ///
    /// # Returns
    ///
    /// Number of fields written
    pub async fn apply_localization<M: LocalizedModel + ?Sized>(
        &self,
        model: &mut M,
    ) -> L10nResult<usize> {
        let mut written = 0;
        for descriptor in model.localizable_fields() {
            let culture = descriptor
                .culture
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(self.culture.as_str());
            let localized = self.lookup(&descriptor.key, culture, &[]).await?;
            if (!localized.resource_not_found || descriptor.fallback_to_default)
                && model.set_field_value(&descriptor.field, localized.value)
            {
                written += 1;
            }
        }
        Ok(written)
    }
}

/// Creates [`Localizer`]s that share a store and options
#[derive(Clone)]
pub struct LocalizerFactory {
    store: Arc<dyn LocalizationStore>,
    options: Arc<LocalizationOptions>,
}

impl LocalizerFactory {
    pub fn new(store: Arc<dyn LocalizationStore>, options: LocalizationOptions) -> Self {
        Self {
            store,
            options: Arc::new(options),
        }
    }

    pub fn options(&self) -> &LocalizationOptions {
        &self.options
    }

    pub fn store(&self) -> Arc<dyn LocalizationStore> {
        self.store.clone()
    }

    /// Localizer in the default culture and the configured tenant
    pub fn create(&self, resource_name: &str) -> Localizer {
        let culture = self.options.default_culture.clone();
        self.create_for_culture(resource_name, &culture)
    }

    pub fn create_for_culture(&self, resource_name: &str, culture: &str) -> Localizer {
        Localizer {
            store: self.store.clone(),
            options: self.options.clone(),
            resource_name: resource_name.to_string(),
            tenant: TenantScope::from_option(self.options.tenant_id.as_deref()),
            culture: crate::culture::canonicalize_culture(culture),
        }
    }
}

//! CSV and JSON interchange formats for translations
//!
//! Both formats carry the same four fields per row: key, culture, tenant id
//! (empty or null for global rows) and value.
//!
//! CSV uses the header `Key,Culture,TenantId,Value` with RFC 4180 quoting.
//! Files written with the older `TenantId,Culture,Key,Value` column order
//! are still readable because columns are mapped from the header names.
//!
//! JSON is an array of `{"key", "culture", "tenantId", "value"}` objects.

use crate::culture::canonicalize_culture;
use crate::error::{L10nError, L10nResult};
use crate::model::TranslationEntry;
use crate::tenant::TenantScope;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Column names in export order
pub const CSV_HEADER: [&str; 4] = ["Key", "Culture", "TenantId", "Value"];

const BOM: char = '\u{feff}';

/// One exported or normalized imported row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRecord {
    pub key: String,
    pub culture: String,
    pub tenant_id: Option<String>,
    pub value: String,
}

impl TranslationRecord {
    pub fn tenant(&self) -> TenantScope {
        TenantScope::from_option(self.tenant_id.as_deref())
    }
}

impl From<&TranslationEntry> for TranslationRecord {
    fn from(entry: &TranslationEntry) -> Self {
        Self {
            key: entry.key.clone(),
            culture: entry.culture.clone(),
            tenant_id: entry.tenant.tenant_id().map(str::to_string),
            value: entry.value.clone(),
        }
    }
}

/// A row as read from an import document, before normalization
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    #[serde(default, alias = "Key")]
    pub key: Option<String>,
    #[serde(default, alias = "Culture")]
    pub culture: Option<String>,
    #[serde(default, alias = "TenantId")]
    pub tenant_id: Option<String>,
    #[serde(default, alias = "Value")]
    pub value: Option<String>,
}

impl ImportRow {
    /// Trim and validate a row
    ///
    /// A missing culture becomes `default_culture`. A blank culture or blank
    /// key discards the row. A blank tenant id means global, a missing value
    /// is empty text.
    pub fn normalize(self, default_culture: &str) -> Option<TranslationRecord> {
        let key = self.key.as_deref().map(str::trim).unwrap_or("");
        let culture = self
            .culture
            .as_deref()
            .unwrap_or(default_culture)
            .trim();
        if key.is_empty() || culture.is_empty() {
            return None;
        }
        Some(TranslationRecord {
            key: key.to_string(),
            culture: canonicalize_culture(culture),
            tenant_id: TenantScope::from_option(self.tenant_id.as_deref())
                .tenant_id()
                .map(str::to_string),
            value: self.value.unwrap_or_default(),
        })
    }
}

/// Render records as CSV text, header first
pub fn write_csv(records: &[TranslationRecord]) -> L10nResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(CSV_HEADER)
        .map_err(|e| L10nError::Export(e.to_string()))?;
    for record in records {
        writer
            .write_record([
                record.key.as_str(),
                record.culture.as_str(),
                record.tenant_id.as_deref().unwrap_or(""),
                record.value.as_str(),
            ])
            .map_err(|e| L10nError::Export(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| L10nError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| L10nError::Export(e.to_string()))
}

/// Column positions of key, culture, tenant id and value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    key: usize,
    culture: usize,
    tenant_id: usize,
    value: usize,
}

impl ColumnMap {
    const STANDARD: Self = Self {
        key: 0,
        culture: 1,
        tenant_id: 2,
        value: 3,
    };

    fn from_header(header: &csv::StringRecord) -> Self {
        let position = |name: &str| {
            header
                .iter()
                .position(|column| column.trim().eq_ignore_ascii_case(name))
        };
        match (
            position("Key"),
            position("Culture"),
            position("TenantId"),
            position("Value"),
        ) {
            (Some(key), Some(culture), Some(tenant_id), Some(value)) => Self {
                key,
                culture,
                tenant_id,
                value,
            },
            _ => Self::STANDARD,
        }
    }
}

/// Parse CSV text into raw rows
///
/// The first record is always the header. Records with fewer than four
/// fields, or that the reader rejects, are skipped.
pub fn read_csv(text: &str) -> Vec<ImportRow> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let columns = match records.next() {
        Some(Ok(header)) => ColumnMap::from_header(&header),
        _ => return Vec::new(),
    };

    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!(row = index + 1, error = %e, "skipping unreadable csv row");
                continue;
            }
        };
        if record.len() < 4 {
            debug!(row = index + 1, fields = record.len(), "skipping short csv row");
            continue;
        }
        let field = |i: usize| record.get(i).map(str::to_string);
        rows.push(ImportRow {
            key: field(columns.key),
            culture: field(columns.culture),
            tenant_id: field(columns.tenant_id),
            value: field(columns.value),
        });
    }
    rows
}

/// Render records as a pretty-printed JSON array
pub fn write_json(records: &[TranslationRecord]) -> L10nResult<String> {
    serde_json::to_string_pretty(records).map_err(|e| L10nError::Export(e.to_string()))
}

/// Parse a JSON array of rows
///
/// Elements that are not row objects are skipped.
///
/// # Errors
///
/// [`L10nError::Import`] when the document is not valid JSON or not an array.
pub fn read_json(text: &str) -> L10nResult<Vec<ImportRow>> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let document: serde_json::Value =
        serde_json::from_str(text).map_err(|e| L10nError::Import(e.to_string()))?;
    let serde_json::Value::Array(elements) = document else {
        return Err(L10nError::Import(
            "expected a JSON array of translations".to_string(),
        ));
    };

    Ok(elements
        .into_iter()
        .enumerate()
        .filter_map(|(index, element)| match serde_json::from_value(element) {
            Ok(row) => Some(row),
            Err(e) => {
                debug!(row = index, error = %e, "skipping malformed json row");
                None
            }
        })
        .collect())
}

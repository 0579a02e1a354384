//! SQLite store
//!
//! Schema:
//!
//! - `localization_keys(id, "key" UNIQUE, description, is_system)`
//! - `localization_values(id, localization_key_id → keys ON DELETE CASCADE,
//!   culture, tenant_id NULL = global, value)`
//!
//! Two partial unique indexes let a tenant row and a global row share a key
//! and culture: `(key_id, culture) WHERE tenant_id IS NULL` and
//! `(tenant_id, key_id, culture) WHERE tenant_id IS NOT NULL`.
//!
//! rusqlite is synchronous; each call locks the connection, runs its
//! statements and releases the lock before returning. Batches run inside one
//! `BEGIN IMMEDIATE` transaction, so other connections to the same file
//! cannot write between a batch's reads and writes.

use super::{LocalizationStore, StoreError, StoreResult};
use crate::model::{
    EntryFilter, LocalizationKey, LocalizationValue, NewLocalizationKey, NewLocalizationValue,
    TranslationEntry,
};
use crate::tenant::TenantScope;
use crate::upsert::{BatchSummary, UpsertOutcome, UpsertRequest};
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{
    Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior, params, params_from_iter,
};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Schema version recorded in `store_meta`
const SCHEMA_VERSION: i64 = 1;

/// Busy timeout for concurrent writers on a file database
const BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS localization_keys (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    "key" TEXT NOT NULL UNIQUE,
    description TEXT,
    is_system INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS localization_values (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    localization_key_id INTEGER NOT NULL
        REFERENCES localization_keys(id) ON DELETE CASCADE,
    culture TEXT NOT NULL,
    tenant_id TEXT,
    value TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS ux_localization_values_global
    ON localization_values(localization_key_id, culture)
    WHERE tenant_id IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS ux_localization_values_tenant
    ON localization_values(tenant_id, localization_key_id, culture)
    WHERE tenant_id IS NOT NULL;
CREATE INDEX IF NOT EXISTS ix_localization_values_culture
    ON localization_values(culture);
"#;

const ENTRY_SELECT: &str = r#"SELECT v.id, v.localization_key_id, k."key", v.culture, v.tenant_id, v.value
FROM localization_values v
JOIN localization_keys k ON k.id = v.localization_key_id"#;

/// Store backed by a SQLite database
pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a database by connection string
    ///
    /// `:memory:` opens a private in-memory database; anything else is a file
    /// path. The schema is created on first open.
    ///
    /// # Errors
    ///
    /// - `StoreError::Db` when the database cannot be opened or initialized
    /// - `StoreError::VersionMismatch` when the file has another schema version
    pub fn open(connection_string: &str) -> StoreResult<Self> {
        let connection = if connection_string.trim() == ":memory:" {
            Connection::open_in_memory().map_err(db_error)?
        } else {
            Connection::open(Path::new(connection_string.trim())).map_err(db_error)?
        };
        Self::from_connection(connection)
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open(":memory:")
    }

    /// Wrap an existing connection, applying pragmas and the schema
    pub fn from_connection(mut connection: Connection) -> StoreResult<Self> {
        connection
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(db_error)?;
        connection.busy_timeout(BUSY_TIMEOUT).map_err(db_error)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> StoreResult<T> {
        let connection = self.connection.lock().map_err(|_| StoreError::Poisoned)?;
        f(&connection).map_err(db_error)
    }

    /// Run `f` in a write transaction; rolled back when `f` fails
    fn with_transaction<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> StoreResult<T> {
        let mut connection = self.connection.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_error)?;
        let result = f(&tx).map_err(db_error)?;
        tx.commit().map_err(db_error)?;
        Ok(result)
    }
}

/// Create tables on a fresh database, or check the recorded schema version
fn initialize_schema(connection: &mut Connection) -> StoreResult<()> {
    let tx = connection.transaction().map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| {
            row.get(0)
        })
        .optional()
        .map_err(db_error)?;
    match version {
        None => {
            tx.execute_batch(SCHEMA).map_err(db_error)?;
            tx.execute(
                "INSERT INTO store_meta (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(db_error)?;
        }
        Some(SCHEMA_VERSION) => {}
        Some(other) => {
            return Err(StoreError::VersionMismatch(format!(
                "database has schema version {}, expected {}",
                other, SCHEMA_VERSION
            )));
        }
    }
    tx.commit().map_err(db_error)
}

/// Map engine errors, surfacing constraint violations as conflicts
fn db_error(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(
                message
                    .clone()
                    .unwrap_or_else(|| "constraint violation".to_string()),
            )
        }
        _ => StoreError::Db(err.to_string()),
    }
}

fn tenant_param(tenant: &TenantScope) -> Value {
    match tenant.tenant_id() {
        Some(id) => Value::Text(id.to_string()),
        None => Value::Null,
    }
}

fn key_from_row(row: &Row<'_>) -> rusqlite::Result<LocalizationKey> {
    Ok(LocalizationKey {
        id: row.get(0)?,
        key: row.get(1)?,
        description: row.get(2)?,
        is_system: row.get(3)?,
    })
}

fn value_from_row(row: &Row<'_>) -> rusqlite::Result<LocalizationValue> {
    let tenant: Option<String> = row.get(3)?;
    Ok(LocalizationValue {
        id: row.get(0)?,
        key_id: row.get(1)?,
        culture: row.get(2)?,
        tenant: TenantScope::from(tenant),
        value: row.get(4)?,
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<TranslationEntry> {
    let tenant: Option<String> = row.get(4)?;
    Ok(TranslationEntry {
        id: row.get(0)?,
        key_id: row.get(1)?,
        key: row.get(2)?,
        culture: row.get(3)?,
        tenant: TenantScope::from(tenant),
        value: row.get(5)?,
    })
}

/// Apply one batch request; returns whether the key was created
fn apply_upsert(
    connection: &Connection,
    request: &UpsertRequest,
) -> rusqlite::Result<(bool, UpsertOutcome)> {
    let existing_key: Option<i64> = connection
        .query_row(
            r#"SELECT id FROM localization_keys WHERE "key" = ?1"#,
            params![request.key],
            |row| row.get(0),
        )
        .optional()?;
    let (key_id, key_created) = match existing_key {
        Some(id) => (id, false),
        None => {
            connection.execute(
                r#"INSERT INTO localization_keys ("key", is_system) VALUES (?1, ?2)"#,
                params![request.key, request.is_system],
            )?;
            (connection.last_insert_rowid(), true)
        }
    };

    let tenant = tenant_param(&request.tenant);
    let existing: Option<(i64, String)> = connection
        .query_row(
            "SELECT id, value FROM localization_values
             WHERE localization_key_id = ?1 AND culture = ?2 AND tenant_id IS ?3",
            params![key_id, request.culture, tenant],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let outcome = UpsertOutcome::plan(
        existing.as_ref().map(|(_, value)| value.as_str()),
        &request.value,
        request.overwrite,
    );
    match (outcome, existing) {
        (UpsertOutcome::Inserted, _) => {
            connection.execute(
                "INSERT INTO localization_values (localization_key_id, culture, tenant_id, value)
                 VALUES (?1, ?2, ?3, ?4)",
                params![key_id, request.culture, tenant, request.value],
            )?;
        }
        (UpsertOutcome::Updated, Some((id, _))) => {
            connection.execute(
                "UPDATE localization_values SET value = ?1 WHERE id = ?2",
                params![request.value, id],
            )?;
        }
        _ => {}
    }
    Ok((key_created, outcome))
}

/// Run an entry query with positional parameters
fn query_entries(
    connection: &Connection,
    sql: &str,
    values: Vec<Value>,
) -> rusqlite::Result<Vec<TranslationEntry>> {
    let mut stmt = connection.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), entry_from_row)?;
    rows.collect()
}

#[async_trait]
impl LocalizationStore for SqliteStore {
    async fn find_key(&self, key: &str) -> StoreResult<Option<LocalizationKey>> {
        self.with_connection(|conn| {
            conn.query_row(
                r#"SELECT id, "key", description, is_system FROM localization_keys WHERE "key" = ?1"#,
                params![key],
                key_from_row,
            )
            .optional()
        })
    }

    async fn list_keys(&self) -> StoreResult<Vec<LocalizationKey>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                r#"SELECT id, "key", description, is_system FROM localization_keys ORDER BY "key""#,
            )?;
            let rows = stmt.query_map(params![], key_from_row)?;
            rows.collect()
        })
    }

    async fn insert_key(&self, key: NewLocalizationKey) -> StoreResult<LocalizationKey> {
        self.with_connection(|conn| {
            conn.execute(
                r#"INSERT INTO localization_keys ("key", description, is_system) VALUES (?1, ?2, ?3)"#,
                params![key.key, key.description, key.is_system],
            )?;
            Ok(LocalizationKey {
                id: conn.last_insert_rowid(),
                key: key.key,
                description: key.description,
                is_system: key.is_system,
            })
        })
    }

    async fn update_key(&self, key: &LocalizationKey) -> StoreResult<bool> {
        self.with_connection(|conn| {
            let changed = conn.execute(
                "UPDATE localization_keys SET description = ?1, is_system = ?2 WHERE id = ?3",
                params![key.description, key.is_system, key.id],
            )?;
            Ok(changed > 0)
        })
    }

    async fn delete_key(&self, key_id: i64) -> StoreResult<bool> {
        self.with_connection(|conn| {
            let changed =
                conn.execute("DELETE FROM localization_keys WHERE id = ?1", params![key_id])?;
            Ok(changed > 0)
        })
    }

    async fn find_value(
        &self,
        key_id: i64,
        culture: &str,
        tenant: &TenantScope,
    ) -> StoreResult<Option<LocalizationValue>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT id, localization_key_id, culture, tenant_id, value
                 FROM localization_values
                 WHERE localization_key_id = ?1 AND culture = ?2 AND tenant_id IS ?3",
                params![key_id, culture, tenant_param(tenant)],
                value_from_row,
            )
            .optional()
        })
    }

    async fn insert_value(&self, value: NewLocalizationValue) -> StoreResult<LocalizationValue> {
        let key_exists = self.with_connection(|conn| {
            conn.query_row(
                "SELECT 1 FROM localization_keys WHERE id = ?1",
                params![value.key_id],
                |_| Ok(()),
            )
            .optional()
        })?;
        if key_exists.is_none() {
            return Err(StoreError::NotFound(format!("key id {}", value.key_id)));
        }

        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO localization_values (localization_key_id, culture, tenant_id, value)
                 VALUES (?1, ?2, ?3, ?4)",
                params![value.key_id, value.culture, tenant_param(&value.tenant), value.value],
            )?;
            Ok(LocalizationValue {
                id: conn.last_insert_rowid(),
                key_id: value.key_id,
                culture: value.culture,
                tenant: value.tenant,
                value: value.value,
            })
        })
    }

    async fn update_value(&self, value_id: i64, value: &str) -> StoreResult<bool> {
        self.with_connection(|conn| {
            let changed = conn.execute(
                "UPDATE localization_values SET value = ?1 WHERE id = ?2",
                params![value, value_id],
            )?;
            Ok(changed > 0)
        })
    }

    async fn delete_value(&self, value_id: i64) -> StoreResult<bool> {
        self.with_connection(|conn| {
            let changed =
                conn.execute("DELETE FROM localization_values WHERE id = ?1", params![value_id])?;
            Ok(changed > 0)
        })
    }

    async fn upsert_batch(&self, requests: &[UpsertRequest]) -> StoreResult<BatchSummary> {
        self.with_transaction(|conn| {
            let mut summary = BatchSummary::default();
            for request in requests {
                let (key_created, outcome) = apply_upsert(conn, request)?;
                summary.record(key_created, outcome);
            }
            Ok(summary)
        })
    }

    async fn get_entry(&self, value_id: i64) -> StoreResult<Option<TranslationEntry>> {
        self.with_connection(|conn| {
            conn.query_row(
                &format!("{} WHERE v.id = ?1", ENTRY_SELECT),
                params![value_id],
                entry_from_row,
            )
            .optional()
        })
    }

    async fn visible_entries(
        &self,
        key: Option<&str>,
        cultures: &[String],
        tenant: &TenantScope,
    ) -> StoreResult<Vec<TranslationEntry>> {
        if cultures.is_empty() {
            return Ok(Vec::new());
        }

        let mut values: Vec<Value> = Vec::new();
        let mut clauses: Vec<String> = Vec::new();

        if let Some(key) = key {
            values.push(Value::Text(key.to_string()));
            clauses.push(format!(r#"k."key" = ?{}"#, values.len()));
        }

        let mut placeholders = Vec::with_capacity(cultures.len());
        for culture in cultures {
            values.push(Value::Text(culture.clone()));
            placeholders.push(format!("?{}", values.len()));
        }
        clauses.push(format!("v.culture IN ({})", placeholders.join(", ")));

        match tenant.tenant_id() {
            None => clauses.push("v.tenant_id IS NULL".to_string()),
            Some(id) => {
                values.push(Value::Text(id.to_string()));
                clauses.push(format!(
                    "(v.tenant_id = ?{} OR v.tenant_id IS NULL)",
                    values.len()
                ));
            }
        }

        let sql = format!("{} WHERE {}", ENTRY_SELECT, clauses.join(" AND "));
        self.with_connection(|conn| query_entries(conn, &sql, values))
    }

    async fn list_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<TranslationEntry>> {
        let mut values: Vec<Value> = Vec::new();
        let mut clauses: Vec<String> = Vec::new();

        if let Some(tenant) = &filter.tenant {
            values.push(tenant_param(tenant));
            clauses.push(format!("v.tenant_id IS ?{}", values.len()));
        }
        if let Some(culture) = &filter.culture {
            values.push(Value::Text(culture.clone()));
            clauses.push(format!("v.culture = ?{}", values.len()));
        }
        if let Some(search) = &filter.search {
            values.push(Value::Text(search.clone()));
            let n = values.len();
            clauses.push(format!(
                r#"(instr(k."key", ?{n}) > 0 OR instr(v.value, ?{n}) > 0)"#
            ));
        }

        let mut sql = ENTRY_SELECT.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(r#" ORDER BY v.culture, k."key", v.tenant_id"#);

        self.with_connection(|conn| query_entries(conn, &sql, values))
    }
}

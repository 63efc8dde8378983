//! SQLite persistence for tenants, language settings, translatable content and
//! source hashes.
//!
//! Content rows are stored column-wise (`content_fields`) so any registered
//! content type can be saved without a schema per type. The orchestrator only
//! ever writes the per-language columns it touched, through
//! [`Database::commit_translations`].

use crate::i18n::LanguageConfig;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    pub quota_limit: i64,
    pub quota_used: i64,
    pub is_active: bool,
    pub provider_credential: Option<String>,
}

impl Tenant {
    /// Characters still available under the quota ceiling.
    pub fn remaining(&self) -> i64 {
        (self.quota_limit - self.quota_used).max(0)
    }

    /// Provider credential, if one is configured and non-blank.
    pub fn credential(&self) -> Option<&str> {
        self.provider_credential
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// A content row: base columns hold primary-language content, per-language
/// columns are named `{field}_{lang}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentEntity {
    pub content_type: String,
    pub id: i64,
    pub fields: BTreeMap<String, String>,
}

impl ContentEntity {
    pub fn new(content_type: &str, id: i64) -> Self {
        Self {
            content_type: content_type.to_string(),
            id,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, column: &str, value: &str) -> Self {
        self.fields.insert(column.to_string(), value.to_string());
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

/// One translated column to persist, with the hash of the source it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationWrite {
    pub field: String,
    pub language: String,
    pub column: String,
    pub value: String,
    pub source_hash: String,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the database and create tables.
    ///
    /// In-memory databases (`sqlite::memory:`) get a single long-lived
    /// connection, since every new connection would see an empty database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context(format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true);

        let in_memory = database_url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context(format!("Failed to open database at {}", database_url))?;

        let db = Self { pool };
        db.create_tables().await?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create_tables(&self) -> Result<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS tenants (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                quota_limit INTEGER NOT NULL,
                quota_used INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                provider_credential TEXT,
                CHECK (quota_used <= quota_limit)
            )",
            "CREATE TABLE IF NOT EXISTS tenant_members (
                user_id INTEGER PRIMARY KEY,
                tenant_id INTEGER NOT NULL REFERENCES tenants(id)
            )",
            "CREATE TABLE IF NOT EXISTS language_settings (
                user_id INTEGER PRIMARY KEY,
                primary_language TEXT NOT NULL,
                enabled_languages TEXT NOT NULL DEFAULT '[]',
                dashboard_language TEXT,
                updated_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS content_fields (
                content_type TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                column_name TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (content_type, entity_id, column_name)
            )",
            "CREATE TABLE IF NOT EXISTS translation_hashes (
                content_type TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                field TEXT NOT NULL,
                language TEXT NOT NULL,
                source_hash TEXT NOT NULL,
                translated_at TEXT NOT NULL,
                PRIMARY KEY (content_type, entity_id, field, language)
            )",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to create tables")?;
        }
        Ok(())
    }

    // ==================== Tenants ====================

    /// Create a tenant and return its id.
    pub async fn create_tenant(
        &self,
        name: &str,
        quota_limit: i64,
        provider_credential: Option<&str>,
    ) -> sqlx::Result<i64> {
        let result = sqlx::query(
            "INSERT INTO tenants (name, quota_limit, quota_used, is_active, provider_credential)
             VALUES (?, ?, 0, 1, ?)",
        )
        .bind(name)
        .bind(quota_limit)
        .bind(provider_credential)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn set_tenant_active(&self, tenant_id: i64, is_active: bool) -> sqlx::Result<()> {
        sqlx::query("UPDATE tenants SET is_active = ? WHERE id = ?")
            .bind(is_active as i64)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Attach a user to a tenant, replacing any previous membership.
    pub async fn add_member(&self, user_id: i64, tenant_id: i64) -> sqlx::Result<()> {
        sqlx::query(
            "INSERT INTO tenant_members (user_id, tenant_id) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET tenant_id = excluded.tenant_id",
        )
        .bind(user_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn tenant(&self, tenant_id: i64) -> sqlx::Result<Option<Tenant>> {
        let row = sqlx::query(
            "SELECT id, name, quota_limit, quota_used, is_active, provider_credential
             FROM tenants WHERE id = ?",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(tenant_from_row).transpose()
    }

    /// Resolve the tenant a user acts for. `None` when the user belongs to no tenant.
    pub async fn tenant_for_user(&self, user_id: i64) -> sqlx::Result<Option<Tenant>> {
        let row = sqlx::query(
            "SELECT t.id, t.name, t.quota_limit, t.quota_used, t.is_active, t.provider_credential
             FROM tenants t
             JOIN tenant_members m ON m.tenant_id = t.id
             WHERE m.user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(tenant_from_row).transpose()
    }

    /// Atomically add `characters` to a tenant's usage if the ceiling allows it.
    ///
    /// Returns `false` (and changes nothing) when the debit would exceed the limit
    /// or the tenant does not exist.
    pub async fn try_consume_quota(&self, tenant_id: i64, characters: i64) -> sqlx::Result<bool> {
        let mut conn = self.pool.acquire().await?;
        consume_quota_in(&mut conn, tenant_id, characters).await
    }

    // ==================== Language settings ====================

    /// Load a user's language settings, creating defaults on first access.
    pub async fn language_settings(
        &self,
        user_id: i64,
        default_language: &str,
    ) -> sqlx::Result<LanguageConfig> {
        let row = sqlx::query(
            "SELECT primary_language, enabled_languages, dashboard_language
             FROM language_settings WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            let raw_enabled: String = row.try_get("enabled_languages")?;
            let enabled_languages = serde_json::from_str(&raw_enabled).unwrap_or_else(|e| {
                warn!(
                    "Unreadable enabled_languages for user {} ({}), treating as empty",
                    user_id, e
                );
                Vec::new()
            });
            return Ok(LanguageConfig {
                primary_language: row.try_get("primary_language")?,
                enabled_languages,
                dashboard_language: row.try_get("dashboard_language")?,
            });
        }

        let defaults = LanguageConfig::with_defaults(default_language);
        sqlx::query(
            "INSERT OR IGNORE INTO language_settings
             (user_id, primary_language, enabled_languages, dashboard_language, updated_at)
             VALUES (?, ?, '[]', NULL, ?)",
        )
        .bind(user_id)
        .bind(&defaults.primary_language)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        debug!("Created default language settings for user {}", user_id);

        Ok(defaults)
    }

    pub async fn save_language_settings(
        &self,
        user_id: i64,
        settings: &LanguageConfig,
    ) -> sqlx::Result<()> {
        let enabled = serde_json::to_string(&settings.enabled_languages)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        sqlx::query(
            "INSERT INTO language_settings
             (user_id, primary_language, enabled_languages, dashboard_language, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                primary_language = excluded.primary_language,
                enabled_languages = excluded.enabled_languages,
                dashboard_language = excluded.dashboard_language,
                updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(&settings.primary_language)
        .bind(enabled)
        .bind(&settings.dashboard_language)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Content ====================

    /// Full write of an entity: every column is replaced by `entity.fields`.
    pub async fn save_entity(&self, entity: &ContentEntity) -> sqlx::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM content_fields WHERE content_type = ? AND entity_id = ?")
            .bind(&entity.content_type)
            .bind(entity.id)
            .execute(&mut *tx)
            .await?;

        for (column, value) in &entity.fields {
            upsert_column(&mut tx, &entity.content_type, entity.id, column, value).await?;
        }

        tx.commit().await
    }

    pub async fn load_entity(
        &self,
        content_type: &str,
        entity_id: i64,
    ) -> sqlx::Result<Option<ContentEntity>> {
        let rows = sqlx::query(
            "SELECT column_name, value FROM content_fields
             WHERE content_type = ? AND entity_id = ?",
        )
        .bind(content_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut entity = ContentEntity::new(content_type, entity_id);
        for row in rows {
            entity
                .fields
                .insert(row.try_get("column_name")?, row.try_get("value")?);
        }
        Ok(Some(entity))
    }

    /// Update only the named columns, leaving every other column untouched.
    pub async fn partial_update(
        &self,
        content_type: &str,
        entity_id: i64,
        columns: &BTreeMap<String, String>,
    ) -> sqlx::Result<()> {
        let mut tx = self.pool.begin().await?;
        for (column, value) in columns {
            upsert_column(&mut tx, content_type, entity_id, column, value).await?;
        }
        tx.commit().await
    }

    // ==================== Translations ====================

    /// Source hashes of the last committed translation per (field, language).
    pub async fn source_hashes(
        &self,
        content_type: &str,
        entity_id: i64,
    ) -> sqlx::Result<HashMap<(String, String), String>> {
        let rows = sqlx::query(
            "SELECT field, language, source_hash FROM translation_hashes
             WHERE content_type = ? AND entity_id = ?",
        )
        .bind(content_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> sqlx::Result<((String, String), String)> {
                Ok((
                    (row.try_get("field")?, row.try_get("language")?),
                    row.try_get("source_hash")?,
                ))
            })
            .collect()
    }

    /// Persist a translated batch and debit the tenant in one transaction.
    ///
    /// Only the columns in `writes` are touched. The quota debit runs after the
    /// column writes; if it is rejected the whole transaction is rolled back and
    /// `Ok(false)` is returned.
    pub async fn commit_translations(
        &self,
        tenant_id: i64,
        content_type: &str,
        entity_id: i64,
        writes: &[TranslationWrite],
        characters: i64,
    ) -> sqlx::Result<bool> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        for write in writes {
            upsert_column(&mut tx, content_type, entity_id, &write.column, &write.value).await?;

            sqlx::query(
                "INSERT INTO translation_hashes
                 (content_type, entity_id, field, language, source_hash, translated_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(content_type, entity_id, field, language) DO UPDATE SET
                    source_hash = excluded.source_hash,
                    translated_at = excluded.translated_at",
            )
            .bind(content_type)
            .bind(entity_id)
            .bind(&write.field)
            .bind(&write.language)
            .bind(&write.source_hash)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        if !consume_quota_in(&mut tx, tenant_id, characters).await? {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }
}

fn tenant_from_row(row: &SqliteRow) -> sqlx::Result<Tenant> {
    Ok(Tenant {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        quota_limit: row.try_get("quota_limit")?,
        quota_used: row.try_get("quota_used")?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
        provider_credential: row.try_get("provider_credential")?,
    })
}

async fn upsert_column(
    conn: &mut SqliteConnection,
    content_type: &str,
    entity_id: i64,
    column: &str,
    value: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO content_fields (content_type, entity_id, column_name, value)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(content_type, entity_id, column_name) DO UPDATE SET value = excluded.value",
    )
    .bind(content_type)
    .bind(entity_id)
    .bind(column)
    .bind(value)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Single conditional increment: the ceiling check and the debit happen in one
/// statement, so concurrent debits cannot jointly overrun the limit.
async fn consume_quota_in(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    characters: i64,
) -> sqlx::Result<bool> {
    if characters < 0 {
        return Ok(false);
    }

    let result = sqlx::query(
        "UPDATE tenants SET quota_used = quota_used + ?
         WHERE id = ? AND quota_used + ? <= quota_limit",
    )
    .bind(characters)
    .bind(tenant_id)
    .bind(characters)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ==================== Helper Functions ====================

    async fn create_test_db() -> Database {
        Database::connect("sqlite::memory:")
            .await
            .expect("Failed to create database")
    }

    // ==================== Database Initialization Tests ====================

    #[tokio::test]
    async fn test_database_reopening() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let url = format!("sqlite://{}", temp_dir.path().join("test.db").display());

        let tenant_id = {
            let db = Database::connect(&url).await.expect("Failed to create database");
            db.create_tenant("Acme", 1000, Some("key")).await.unwrap()
        };

        let db = Database::connect(&url).await.expect("Failed to reopen database");
        let tenant = db.tenant(tenant_id).await.unwrap();
        assert!(tenant.is_some(), "Tenant should persist");
    }

    #[tokio::test]
    async fn test_invalid_database_path() {
        let result = Database::connect("sqlite:///non/existent/path/db.db").await;
        assert!(result.is_err());
    }

    // ==================== Tenant Tests ====================

    #[tokio::test]
    async fn test_tenant_for_user() {
        let db = create_test_db().await;
        let tenant_id = db.create_tenant("Acme", 1000, Some("secret")).await.unwrap();
        db.add_member(42, tenant_id).await.unwrap();

        let tenant = db.tenant_for_user(42).await.unwrap().expect("member has a tenant");
        assert_eq!(tenant.id, tenant_id);
        assert_eq!(tenant.quota_limit, 1000);
        assert_eq!(tenant.quota_used, 0);
        assert!(tenant.is_active);
        assert_eq!(tenant.credential(), Some("secret"));
    }

    #[tokio::test]
    async fn test_tenant_for_unknown_user_is_none() {
        let db = create_test_db().await;
        assert!(db.tenant_for_user(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blank_credential_is_none() {
        let db = create_test_db().await;
        let tenant_id = db.create_tenant("Acme", 10, Some("   ")).await.unwrap();
        let tenant = db.tenant(tenant_id).await.unwrap().unwrap();
        assert_eq!(tenant.credential(), None);
    }

    #[tokio::test]
    async fn test_set_tenant_inactive() {
        let db = create_test_db().await;
        let tenant_id = db.create_tenant("Acme", 10, None).await.unwrap();
        db.set_tenant_active(tenant_id, false).await.unwrap();
        assert!(!db.tenant(tenant_id).await.unwrap().unwrap().is_active);
    }

    // ==================== Quota Tests ====================

    #[tokio::test]
    async fn test_try_consume_within_limit() {
        let db = create_test_db().await;
        let tenant_id = db.create_tenant("Acme", 100, None).await.unwrap();

        assert!(db.try_consume_quota(tenant_id, 60).await.unwrap());
        assert!(db.try_consume_quota(tenant_id, 40).await.unwrap());

        let tenant = db.tenant(tenant_id).await.unwrap().unwrap();
        assert_eq!(tenant.quota_used, 100);
        assert_eq!(tenant.remaining(), 0);
    }

    #[tokio::test]
    async fn test_try_consume_over_limit_changes_nothing() {
        let db = create_test_db().await;
        let tenant_id = db.create_tenant("Acme", 100, None).await.unwrap();
        assert!(db.try_consume_quota(tenant_id, 90).await.unwrap());

        assert!(!db.try_consume_quota(tenant_id, 11).await.unwrap());

        let tenant = db.tenant(tenant_id).await.unwrap().unwrap();
        assert_eq!(tenant.quota_used, 90);
    }

    #[tokio::test]
    async fn test_try_consume_unknown_tenant() {
        let db = create_test_db().await;
        assert!(!db.try_consume_quota(12345, 1).await.unwrap());
    }

    // ==================== Language Settings Tests ====================

    #[tokio::test]
    async fn test_language_settings_created_lazily() {
        let db = create_test_db().await;

        let settings = db.language_settings(1, "tr").await.unwrap();
        assert_eq!(settings.primary_language, "tr");
        assert!(settings.enabled_languages.is_empty());

        // A later default does not overwrite the stored row
        let again = db.language_settings(1, "en").await.unwrap();
        assert_eq!(again.primary_language, "tr");
    }

    #[tokio::test]
    async fn test_save_language_settings_roundtrip() {
        let db = create_test_db().await;
        let settings = LanguageConfig {
            primary_language: "tr".to_string(),
            enabled_languages: vec!["en".to_string(), "de".to_string()],
            dashboard_language: Some("en".to_string()),
        };

        db.save_language_settings(7, &settings).await.unwrap();
        assert_eq!(db.language_settings(7, "en").await.unwrap(), settings);
    }

    // ==================== Content Tests ====================

    #[tokio::test]
    async fn test_save_and_load_entity() {
        let db = create_test_db().await;
        let entity = ContentEntity::new("article", 1)
            .with_field("title", "Merhaba")
            .with_field("body", "Dünya");

        db.save_entity(&entity).await.unwrap();
        assert_eq!(db.load_entity("article", 1).await.unwrap(), Some(entity));
    }

    #[tokio::test]
    async fn test_load_missing_entity() {
        let db = create_test_db().await;
        assert_eq!(db.load_entity("article", 404).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_partial_update_leaves_other_columns() {
        let db = create_test_db().await;
        let entity = ContentEntity::new("article", 1)
            .with_field("title", "Merhaba")
            .with_field("title_en", "old");
        db.save_entity(&entity).await.unwrap();

        let mut columns = BTreeMap::new();
        columns.insert("title_en".to_string(), "Hello".to_string());
        columns.insert("title_de".to_string(), "Hallo".to_string());
        db.partial_update("article", 1, &columns).await.unwrap();

        let loaded = db.load_entity("article", 1).await.unwrap().unwrap();
        assert_eq!(loaded.get("title"), Some("Merhaba"));
        assert_eq!(loaded.get("title_en"), Some("Hello"));
        assert_eq!(loaded.get("title_de"), Some("Hallo"));
    }

    // ==================== commit_translations Tests ====================

    fn write(field: &str, language: &str, value: &str) -> TranslationWrite {
        TranslationWrite {
            field: field.to_string(),
            language: language.to_string(),
            column: format!("{}_{}", field, language),
            value: value.to_string(),
            source_hash: "abc".to_string(),
        }
    }

    #[tokio::test]
    async fn test_commit_translations_persists_and_debits() {
        let db = create_test_db().await;
        let tenant_id = db.create_tenant("Acme", 100, Some("key")).await.unwrap();
        db.save_entity(&ContentEntity::new("article", 1).with_field("title", "Merhaba"))
            .await
            .unwrap();

        let committed = db
            .commit_translations(tenant_id, "article", 1, &[write("title", "en", "Hello")], 7)
            .await
            .unwrap();
        assert!(committed);

        let loaded = db.load_entity("article", 1).await.unwrap().unwrap();
        assert_eq!(loaded.get("title_en"), Some("Hello"));
        assert_eq!(db.tenant(tenant_id).await.unwrap().unwrap().quota_used, 7);

        let hashes = db.source_hashes("article", 1).await.unwrap();
        assert_eq!(
            hashes.get(&("title".to_string(), "en".to_string())),
            Some(&"abc".to_string())
        );
    }

    #[tokio::test]
    async fn test_commit_translations_rolls_back_on_quota() {
        let db = create_test_db().await;
        let tenant_id = db.create_tenant("Acme", 5, Some("key")).await.unwrap();
        db.save_entity(&ContentEntity::new("article", 1).with_field("title", "Merhaba"))
            .await
            .unwrap();

        let committed = db
            .commit_translations(tenant_id, "article", 1, &[write("title", "en", "Hello")], 7)
            .await
            .unwrap();
        assert!(!committed);

        let loaded = db.load_entity("article", 1).await.unwrap().unwrap();
        assert_eq!(loaded.get("title_en"), None);
        assert!(db.source_hashes("article", 1).await.unwrap().is_empty());
        assert_eq!(db.tenant(tenant_id).await.unwrap().unwrap().quota_used, 0);
    }
}

//! libSQL backend — async `EngineStore` implementation.
//!
//! Supports local file and in-memory databases. Timestamps are stored as
//! RFC 3339 text; enum columns are stored as their string form and decoded
//! permissively.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{
    ActionKind, AutomationRule, Campaign, DeliveryLogEntry, MatchKind, ResponseTemplate,
    TemplateKind, TenantAccount,
};
use crate::store::migrations;
use crate::store::traits::EngineStore;

/// libSQL store backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("Failed to create database directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Row helpers ─────────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn row_to_account(row: &libsql::Row) -> Result<TenantAccount, libsql::Error> {
    Ok(TenantAccount {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        page_id: row.get(2)?,
        business_account_id: row.get(3).ok(),
        access_token: row.get(4).ok(),
        refresh_token: row.get(5).ok(),
    })
}

fn row_to_rule(row: &libsql::Row) -> Result<AutomationRule, libsql::Error> {
    let match_type: String = row.get(3)?;
    Ok(AutomationRule {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        keyword: row.get(2)?,
        match_kind: MatchKind::parse(&match_type),
        action: row.get(4)?,
        template_id: row.get(5).ok(),
    })
}

fn row_to_template(row: &libsql::Row) -> Result<ResponseTemplate, libsql::Error> {
    let kind: String = row.get(2)?;
    Ok(ResponseTemplate {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        kind: TemplateKind::parse(&kind),
        text: row.get(3)?,
    })
}

fn row_to_delivery(row: &libsql::Row) -> Result<DeliveryLogEntry, libsql::Error> {
    let action: String = row.get(1)?;
    let created: String = row.get(3)?;
    Ok(DeliveryLogEntry {
        source_event_id: row.get(0)?,
        // Rows are written from a typed ActionKind, so this always parses;
        // Reply is the harmless decode fallback.
        action_taken: ActionKind::parse(&action).unwrap_or(ActionKind::Reply),
        response_text: row.get(2).ok(),
        created_at: parse_datetime(&created),
    })
}

const ACCOUNT_COLUMNS: &str =
    "id, tenant_id, page_id, business_account_id, access_token, refresh_token";

const RULE_COLUMNS: &str = "r.id, r.campaign_id, r.keyword, r.match_type, r.action, r.template_id";

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl EngineStore for LibSqlStore {
    async fn run_migrations(&self) -> Result<(), StoreError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn upsert_account(&self, account: &TenantAccount) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO accounts
                    (id, tenant_id, page_id, business_account_id, access_token, refresh_token)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    account.id.clone(),
                    account.tenant_id.clone(),
                    account.page_id.clone(),
                    opt_text(account.business_account_id.as_deref()),
                    opt_text(account.access_token.as_deref()),
                    opt_text(account.refresh_token.as_deref()),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to upsert account: {e}")))?;
        Ok(())
    }

    async fn find_account_by_page(
        &self,
        platform_page_id: &str,
    ) -> Result<Option<TenantAccount>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM accounts
                     WHERE page_id = ?1 OR business_account_id = ?1
                     LIMIT 1"
                ),
                params![platform_page_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to query account: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let account = row_to_account(&row)
                    .map_err(|e| StoreError::Query(format!("Failed to read account row: {e}")))?;
                Ok(Some(account))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("Failed to read account: {e}"))),
        }
    }

    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO campaigns (id, account_id, name, enabled) VALUES (?1, ?2, ?3, ?4)",
                params![
                    campaign.id.clone(),
                    campaign.account_id.clone(),
                    campaign.name.clone(),
                    campaign.enabled as i64,
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to insert campaign: {e}")))?;
        Ok(())
    }

    async fn rules_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<AutomationRule>, StoreError> {
        // rowid preserves true insertion order even within one timestamp
        // tick — first match wins relies on it.
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {RULE_COLUMNS} FROM rules r
                     JOIN campaigns c ON r.campaign_id = c.id
                     WHERE c.account_id = ?1 AND c.enabled = 1
                     ORDER BY r.created_at ASC, r.rowid ASC"
                ),
                params![account_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to query rules: {e}")))?;

        let mut rules = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let rule = row_to_rule(&row)
                .map_err(|e| StoreError::Query(format!("Failed to read rule row: {e}")))?;
            rules.push(rule);
        }
        Ok(rules)
    }

    async fn insert_rule(&self, rule: &AutomationRule) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO rules (id, campaign_id, keyword, match_type, action, template_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    rule.id.clone(),
                    rule.campaign_id.clone(),
                    rule.keyword.clone(),
                    rule.match_kind.as_str(),
                    rule.action.clone(),
                    opt_text(rule.template_id.as_deref()),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to insert rule: {e}")))?;
        Ok(())
    }

    async fn insert_template(&self, template: &ResponseTemplate) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO templates (id, tenant_id, kind, text) VALUES (?1, ?2, ?3, ?4)",
                params![
                    template.id.clone(),
                    template.tenant_id.clone(),
                    template.kind.as_str(),
                    template.text.clone(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to insert template: {e}")))?;
        Ok(())
    }

    async fn templates_for_tenant(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<ResponseTemplate>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, tenant_id, kind, text FROM templates
                 WHERE tenant_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
                params![tenant_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to query templates: {e}")))?;

        let mut templates = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let template = row_to_template(&row)
                .map_err(|e| StoreError::Query(format!("Failed to read template row: {e}")))?;
            templates.push(template);
        }
        Ok(templates)
    }

    async fn record_delivery(&self, entry: &DeliveryLogEntry) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT INTO delivery_log (id, source_event_id, action_taken, response_text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    entry.source_event_id.clone(),
                    entry.action_taken.as_str(),
                    opt_text(entry.response_text.as_deref()),
                    entry.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to record delivery: {e}")))?;
        Ok(())
    }

    async fn deliveries_for_event(
        &self,
        source_event_id: &str,
    ) -> Result<Vec<DeliveryLogEntry>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT source_event_id, action_taken, response_text, created_at
                 FROM delivery_log
                 WHERE source_event_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
                params![source_event_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to query delivery log: {e}")))?;

        let mut entries = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let entry = row_to_delivery(&row)
                .map_err(|e| StoreError::Query(format!("Failed to read delivery row: {e}")))?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

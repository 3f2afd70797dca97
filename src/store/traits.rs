//! `EngineStore` — single async interface for all engine persistence.
//!
//! Accounts, campaigns, rules, and templates are written by the dashboard
//! CRUD layer (out of scope); the engine reads them fresh on every webhook
//! call so rule edits apply immediately. The delivery log is the engine's
//! only write path and is append-only.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{
    AutomationRule, Campaign, DeliveryLogEntry, ResponseTemplate, TenantAccount,
};

/// Backend-agnostic store trait covering the engine's reads and the
/// delivery log.
#[async_trait]
pub trait EngineStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), StoreError>;

    // ── Accounts ────────────────────────────────────────────────────

    /// Insert or replace a tenant account.
    async fn upsert_account(&self, account: &TenantAccount) -> Result<(), StoreError>;

    /// Look up the account connected to a platform page.
    ///
    /// The event's identifier may be the page id or the business-account id
    /// depending on platform type, so the lookup matches either column.
    async fn find_account_by_page(
        &self,
        platform_page_id: &str,
    ) -> Result<Option<TenantAccount>, StoreError>;

    // ── Campaigns & rules ───────────────────────────────────────────

    /// Insert a campaign.
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), StoreError>;

    /// All rules for an account's enabled campaigns, in creation order.
    async fn rules_for_account(&self, account_id: &str)
    -> Result<Vec<AutomationRule>, StoreError>;

    /// Insert a rule. Evaluation order follows insertion order.
    async fn insert_rule(&self, rule: &AutomationRule) -> Result<(), StoreError>;

    // ── Templates ───────────────────────────────────────────────────

    /// Insert a response template.
    async fn insert_template(&self, template: &ResponseTemplate) -> Result<(), StoreError>;

    /// All templates belonging to a tenant.
    async fn templates_for_tenant(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<ResponseTemplate>, StoreError>;

    // ── Delivery log ────────────────────────────────────────────────

    /// Append a delivery record. Called only after a successful dispatch.
    async fn record_delivery(&self, entry: &DeliveryLogEntry) -> Result<(), StoreError>;

    /// Delivery records for a source event, newest first. Audit read path;
    /// also usable as a future de-duplication key.
    async fn deliveries_for_event(
        &self,
        source_event_id: &str,
    ) -> Result<Vec<DeliveryLogEntry>, StoreError>;
}

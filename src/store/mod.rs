pub mod memory;
pub mod mssql;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::db::models::{
    ClientStat, OauthAuthorization, OauthEntityId, OauthUserStatus, RedirectionUri, StatKind,
    UserAuthorization,
};

/// Storage failures the reconciliation path cares about.
///
/// `DuplicateKey` is the concurrency-safety signal: concurrent first-time
/// inserts race on a unique index and the loser re-reads instead of failing.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate key on {0}")]
    DuplicateKey(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Narrow persistence seam the core depends on: find-by-unique-key,
/// insert-with-duplicate-detection, and upsert-increment. Implemented for
/// MSSQL and for an in-memory map used in tests.
#[async_trait]
pub trait Store: Send + Sync {
    // -- redirection URIs --

    async fn find_redirection_uri(
        &self,
        client_id: &str,
        uri: &str,
    ) -> Result<Option<RedirectionUri>, StoreError>;
    async fn list_redirection_uris(
        &self,
        client_id: &str,
    ) -> Result<Vec<RedirectionUri>, StoreError>;
    async fn insert_redirection_uri(&self, uri: &RedirectionUri) -> Result<(), StoreError>;
    async fn update_redirection_uri(&self, uri: &RedirectionUri) -> Result<(), StoreError>;

    // -- authorization grants --

    async fn insert_authorization(&self, grant: &OauthAuthorization) -> Result<(), StoreError>;
    async fn find_authorization_by_code(
        &self,
        code: &str,
    ) -> Result<Option<OauthAuthorization>, StoreError>;
    async fn find_authorization_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<OauthAuthorization>, StoreError>;
    async fn mark_code_used(&self, grant_id: &str) -> Result<(), StoreError>;

    // -- user authorization ledger --

    async fn find_user_authorization(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> Result<Option<UserAuthorization>, StoreError>;
    async fn list_user_authorizations(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserAuthorization>, StoreError>;
    async fn insert_user_authorization(&self, entry: &UserAuthorization)
        -> Result<(), StoreError>;
    async fn update_user_authorization(&self, entry: &UserAuthorization)
        -> Result<(), StoreError>;
    async fn delete_user_authorization(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> Result<(), StoreError>;

    // -- entity identity mappings --

    async fn find_entity_id(
        &self,
        user_id: &str,
        client_id: &str,
        real_id: &str,
    ) -> Result<Option<OauthEntityId>, StoreError>;
    async fn insert_entity_id(&self, mapping: &OauthEntityId) -> Result<(), StoreError>;
    async fn update_entity_id(&self, mapping: &OauthEntityId) -> Result<(), StoreError>;

    // -- user statuses --

    async fn find_user_status(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> Result<Option<OauthUserStatus>, StoreError>;
    async fn insert_user_status(&self, status: &OauthUserStatus) -> Result<(), StoreError>;
    async fn update_user_status(&self, status: &OauthUserStatus) -> Result<(), StoreError>;

    // -- daily counters --

    /// Upsert-with-increment keyed by (client, day, stat). On first insert
    /// the row's baseline is set to `previous_count`; concurrent and later
    /// increments on the same day bump `count` and leave the baseline alone.
    async fn increment_client_stat(
        &self,
        client_id: &str,
        day: NaiveDate,
        stat: StatKind,
        previous_count: i64,
    ) -> Result<(), StoreError>;
    async fn find_client_stat(
        &self,
        client_id: &str,
        day: NaiveDate,
        stat: StatKind,
    ) -> Result<Option<ClientStat>, StoreError>;
}

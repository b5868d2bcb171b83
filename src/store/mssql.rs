use async_trait::async_trait;
use chrono::NaiveDate;

use crate::db::models::{
    ClientStat, OauthAuthorization, OauthEntityId, OauthUserStatus, RedirectionUri, StatKind,
    UserAuthorization,
};
use crate::db::pool::Db;
use crate::db::queries;

use super::{Store, StoreError};

/// MSSQL-backed store; each method is one short read-modify-write against
/// the pooled connection, delegating to the query layer.
#[derive(Clone)]
pub struct MssqlStore {
    pool: Db,
}

impl MssqlStore {
    pub fn new(pool: Db) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for MssqlStore {
    async fn find_redirection_uri(
        &self,
        client_id: &str,
        uri: &str,
    ) -> Result<Option<RedirectionUri>, StoreError> {
        queries::redirect_uris::find_by_client_and_uri(&self.pool, client_id, uri).await
    }

    async fn list_redirection_uris(
        &self,
        client_id: &str,
    ) -> Result<Vec<RedirectionUri>, StoreError> {
        queries::redirect_uris::list_by_client(&self.pool, client_id).await
    }

    async fn insert_redirection_uri(&self, uri: &RedirectionUri) -> Result<(), StoreError> {
        queries::redirect_uris::insert(&self.pool, uri).await
    }

    async fn update_redirection_uri(&self, uri: &RedirectionUri) -> Result<(), StoreError> {
        queries::redirect_uris::update(&self.pool, uri).await
    }

    async fn insert_authorization(&self, grant: &OauthAuthorization) -> Result<(), StoreError> {
        queries::authorizations::insert(&self.pool, grant).await
    }

    async fn find_authorization_by_code(
        &self,
        code: &str,
    ) -> Result<Option<OauthAuthorization>, StoreError> {
        queries::authorizations::find_by_code(&self.pool, code).await
    }

    async fn find_authorization_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<OauthAuthorization>, StoreError> {
        queries::authorizations::find_by_token_hash(&self.pool, token_hash).await
    }

    async fn mark_code_used(&self, grant_id: &str) -> Result<(), StoreError> {
        queries::authorizations::mark_code_used(&self.pool, grant_id).await
    }

    async fn find_user_authorization(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> Result<Option<UserAuthorization>, StoreError> {
        queries::user_authorizations::find_by_user_and_client(&self.pool, user_id, client_id).await
    }

    async fn list_user_authorizations(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserAuthorization>, StoreError> {
        queries::user_authorizations::list_by_user(&self.pool, user_id).await
    }

    async fn insert_user_authorization(
        &self,
        entry: &UserAuthorization,
    ) -> Result<(), StoreError> {
        queries::user_authorizations::insert(&self.pool, entry).await
    }

    async fn update_user_authorization(
        &self,
        entry: &UserAuthorization,
    ) -> Result<(), StoreError> {
        queries::user_authorizations::update(&self.pool, entry).await
    }

    async fn delete_user_authorization(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> Result<(), StoreError> {
        queries::user_authorizations::delete_by_user_and_client(&self.pool, user_id, client_id)
            .await
    }

    async fn find_entity_id(
        &self,
        user_id: &str,
        client_id: &str,
        real_id: &str,
    ) -> Result<Option<OauthEntityId>, StoreError> {
        queries::entity_ids::find_by_key(&self.pool, user_id, client_id, real_id).await
    }

    async fn insert_entity_id(&self, mapping: &OauthEntityId) -> Result<(), StoreError> {
        queries::entity_ids::insert(&self.pool, mapping).await
    }

    async fn update_entity_id(&self, mapping: &OauthEntityId) -> Result<(), StoreError> {
        queries::entity_ids::update_collections(&self.pool, mapping).await
    }

    async fn find_user_status(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> Result<Option<OauthUserStatus>, StoreError> {
        queries::user_statuses::find_by_user_and_client(&self.pool, user_id, client_id).await
    }

    async fn insert_user_status(&self, status: &OauthUserStatus) -> Result<(), StoreError> {
        queries::user_statuses::insert(&self.pool, status).await
    }

    async fn update_user_status(&self, status: &OauthUserStatus) -> Result<(), StoreError> {
        queries::user_statuses::update(&self.pool, status).await
    }

    async fn increment_client_stat(
        &self,
        client_id: &str,
        day: NaiveDate,
        stat: StatKind,
        previous_count: i64,
    ) -> Result<(), StoreError> {
        queries::client_stats::increment(&self.pool, client_id, day, stat, previous_count).await
    }

    async fn find_client_stat(
        &self,
        client_id: &str,
        day: NaiveDate,
        stat: StatKind,
    ) -> Result<Option<ClientStat>, StoreError> {
        queries::client_stats::find(&self.pool, client_id, day, stat).await
    }
}

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::db::models::{
    ClientStat, OauthAuthorization, OauthEntityId, OauthUserStatus, RedirectionUri, StatKind,
    UserAuthorization,
};

use super::{Store, StoreError};

/// In-memory store enforcing the same unique keys as the SQL schema.
/// Backs the integration tests; no durability.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    // key: (client_id, normalized uri)
    redirection_uris: HashMap<(String, String), RedirectionUri>,
    authorizations: Vec<OauthAuthorization>,
    // key: (user_id, client_id)
    user_authorizations: HashMap<(String, String), UserAuthorization>,
    // key: (user_id, client_id, real_id)
    entity_ids: HashMap<(String, String, String), OauthEntityId>,
    // key: (user_id, client_id)
    user_statuses: HashMap<(String, String), OauthUserStatus>,
    // key: (client_id, day, stat)
    client_stats: HashMap<(String, NaiveDate, StatKind), ClientStat>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_redirection_uri(
        &self,
        client_id: &str,
        uri: &str,
    ) -> Result<Option<RedirectionUri>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .redirection_uris
            .get(&(client_id.to_string(), uri.to_string()))
            .cloned())
    }

    async fn list_redirection_uris(
        &self,
        client_id: &str,
    ) -> Result<Vec<RedirectionUri>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .redirection_uris
            .values()
            .filter(|u| u.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn insert_redirection_uri(&self, uri: &RedirectionUri) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let key = (uri.client_id.clone(), uri.uri.clone());
        if inner.redirection_uris.contains_key(&key) {
            return Err(StoreError::DuplicateKey(
                "redirection_uris (client_id, uri)".to_string(),
            ));
        }
        inner.redirection_uris.insert(key, uri.clone());
        Ok(())
    }

    async fn update_redirection_uri(&self, uri: &RedirectionUri) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let key = (uri.client_id.clone(), uri.uri.clone());
        // A failed update must leave the stored row untouched, so check the
        // target key for another row before re-keying by id.
        if inner
            .redirection_uris
            .get(&key)
            .is_some_and(|u| u.id != uri.id)
        {
            return Err(StoreError::DuplicateKey(
                "redirection_uris (client_id, uri)".to_string(),
            ));
        }
        inner.redirection_uris.retain(|_, u| u.id != uri.id);
        inner.redirection_uris.insert(key, uri.clone());
        Ok(())
    }

    async fn insert_authorization(&self, grant: &OauthAuthorization) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.authorizations.iter().any(|g| g.id == grant.id) {
            return Err(StoreError::DuplicateKey("oauth_authorizations (id)".to_string()));
        }
        inner.authorizations.push(grant.clone());
        Ok(())
    }

    async fn find_authorization_by_code(
        &self,
        code: &str,
    ) -> Result<Option<OauthAuthorization>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .authorizations
            .iter()
            .find(|g| g.code.as_ref().is_some_and(|c| c.value == code))
            .cloned())
    }

    async fn find_authorization_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<OauthAuthorization>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .authorizations
            .iter()
            .find(|g| g.token_hash == token_hash)
            .cloned())
    }

    async fn mark_code_used(&self, grant_id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if let Some(grant) = inner.authorizations.iter_mut().find(|g| g.id == grant_id) {
            if let Some(code) = grant.code.as_mut() {
                code.used = true;
            }
        }
        Ok(())
    }

    async fn find_user_authorization(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> Result<Option<UserAuthorization>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .user_authorizations
            .get(&(user_id.to_string(), client_id.to_string()))
            .cloned())
    }

    async fn list_user_authorizations(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserAuthorization>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .user_authorizations
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_user_authorization(
        &self,
        entry: &UserAuthorization,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let key = (entry.user_id.clone(), entry.client_id.clone());
        if inner.user_authorizations.contains_key(&key) {
            return Err(StoreError::DuplicateKey(
                "user_authorizations (user_id, client_id)".to_string(),
            ));
        }
        inner.user_authorizations.insert(key, entry.clone());
        Ok(())
    }

    async fn update_user_authorization(
        &self,
        entry: &UserAuthorization,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let key = (entry.user_id.clone(), entry.client_id.clone());
        inner.user_authorizations.insert(key, entry.clone());
        Ok(())
    }

    async fn delete_user_authorization(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner
            .user_authorizations
            .remove(&(user_id.to_string(), client_id.to_string()));
        Ok(())
    }

    async fn find_entity_id(
        &self,
        user_id: &str,
        client_id: &str,
        real_id: &str,
    ) -> Result<Option<OauthEntityId>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .entity_ids
            .get(&(
                user_id.to_string(),
                client_id.to_string(),
                real_id.to_string(),
            ))
            .cloned())
    }

    async fn insert_entity_id(&self, mapping: &OauthEntityId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let key = (
            mapping.user_id.clone(),
            mapping.client_id.clone(),
            mapping.real_id.clone(),
        );
        if inner.entity_ids.contains_key(&key) {
            return Err(StoreError::DuplicateKey(
                "oauth_entity_ids (user_id, client_id, real_id)".to_string(),
            ));
        }
        inner.entity_ids.insert(key, mapping.clone());
        Ok(())
    }

    async fn update_entity_id(&self, mapping: &OauthEntityId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let key = (
            mapping.user_id.clone(),
            mapping.client_id.clone(),
            mapping.real_id.clone(),
        );
        inner.entity_ids.insert(key, mapping.clone());
        Ok(())
    }

    async fn find_user_status(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> Result<Option<OauthUserStatus>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .user_statuses
            .get(&(user_id.to_string(), client_id.to_string()))
            .cloned())
    }

    async fn insert_user_status(&self, status: &OauthUserStatus) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let key = (status.user_id.clone(), status.client_id.clone());
        if inner.user_statuses.contains_key(&key) {
            return Err(StoreError::DuplicateKey(
                "oauth_user_statuses (user_id, client_id)".to_string(),
            ));
        }
        inner.user_statuses.insert(key, status.clone());
        Ok(())
    }

    async fn update_user_status(&self, status: &OauthUserStatus) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let key = (status.user_id.clone(), status.client_id.clone());
        inner.user_statuses.insert(key, status.clone());
        Ok(())
    }

    async fn increment_client_stat(
        &self,
        client_id: &str,
        day: NaiveDate,
        stat: StatKind,
        previous_count: i64,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let key = (client_id.to_string(), day, stat);
        match inner.client_stats.get_mut(&key) {
            Some(row) => {
                // Baseline is fixed at row creation; only the counter moves.
                row.count += 1;
            }
            None => {
                inner.client_stats.insert(
                    key,
                    ClientStat {
                        client_id: client_id.to_string(),
                        day,
                        stat,
                        count: 1,
                        previous_count,
                    },
                );
            }
        }
        Ok(())
    }

    async fn find_client_stat(
        &self,
        client_id: &str,
        day: NaiveDate,
        stat: StatKind,
    ) -> Result<Option<ClientStat>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .client_stats
            .get(&(client_id.to_string(), day, stat))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::db::models::ResponseType;

    use super::*;

    fn uri(id: &str, client_id: &str, uri: &str) -> RedirectionUri {
        let now = Utc::now().naive_utc();
        RedirectionUri {
            id: id.to_string(),
            client_id: client_id.to_string(),
            uri: uri.to_string(),
            response_type: ResponseType::Code,
            scope: vec!["emails".to_string()],
            scope_flags: vec![],
            needs_client_secret: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn update_rekeys_a_changed_uri() {
        let store = MemoryStore::new();
        store
            .insert_redirection_uri(&uri("a", "client-1", "https://a.example/cb"))
            .await
            .unwrap();

        store
            .update_redirection_uri(&uri("a", "client-1", "https://a.example/cb2"))
            .await
            .unwrap();

        assert!(store
            .find_redirection_uri("client-1", "https://a.example/cb")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_redirection_uri("client-1", "https://a.example/cb2")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn colliding_update_keeps_the_row_being_updated() {
        let store = MemoryStore::new();
        store
            .insert_redirection_uri(&uri("a", "client-1", "https://a.example/cb"))
            .await
            .unwrap();
        store
            .insert_redirection_uri(&uri("b", "client-1", "https://b.example/cb"))
            .await
            .unwrap();

        // Move b onto a's key: refused, and b must survive untouched.
        let err = store
            .update_redirection_uri(&uri("b", "client-1", "https://a.example/cb"))
            .await;
        assert!(matches!(err, Err(StoreError::DuplicateKey(_))));

        let kept = store
            .find_redirection_uri("client-1", "https://b.example/cb")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.id, "b");
        let other = store
            .find_redirection_uri("client-1", "https://a.example/cb")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(other.id, "a");
    }
}

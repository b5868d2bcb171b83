use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use crate::db::models::{EntityCollection, OauthEntityId};
use crate::error::AppError;
use crate::store::{Store, StoreError};

/// Generate an opaque client-facing identifier. Random, not derived from
/// the real ID, so fake IDs cannot be correlated across clients.
pub fn generate_fake_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..16).map(|_| rng.gen()).collect();
    hex::encode(bytes)
}

/// Resolve the stable fake ID for (user, client, real entity).
///
/// Creates the mapping lazily on first exposure; after that the same triple
/// always resolves to the same fake ID. A concurrent first exposure loses
/// the insert race with a duplicate-key error and re-reads. Returns the
/// mapping and whether this call created it.
pub async fn get_or_create_fake_id(
    store: &dyn Store,
    user_id: &str,
    client_id: &str,
    real_id: &str,
    collection: EntityCollection,
    is_test_account: bool,
) -> Result<(OauthEntityId, bool), AppError> {
    if let Some(existing) = store.find_entity_id(user_id, client_id, real_id).await? {
        let merged = merge_collection_tag(store, existing, collection).await?;
        return Ok((merged, false));
    }

    let mapping = OauthEntityId {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        client_id: client_id.to_string(),
        real_id: real_id.to_string(),
        fake_id: generate_fake_id(),
        collections: vec![collection],
        is_test_account,
        created_at: Utc::now().naive_utc(),
    };

    match store.insert_entity_id(&mapping).await {
        Ok(()) => Ok((mapping, true)),
        Err(StoreError::DuplicateKey(_)) => {
            // Lost the race; the winner's row is authoritative.
            let existing = store
                .find_entity_id(user_id, client_id, real_id)
                .await?
                .ok_or_else(|| {
                    StoreError::Backend("mapping vanished after duplicate-key insert".to_string())
                })?;
            let merged = merge_collection_tag(store, existing, collection).await?;
            Ok((merged, false))
        }
        Err(e) => Err(e.into()),
    }
}

/// Add a collection tag to an existing mapping without minting a new
/// identity. A phone number may legitimately carry `unknown_phone_numbers`
/// plus its resolved subtype; any other disagreement means the mapping key
/// points at two different kinds of entity, which is corruption and must be
/// reported rather than papered over.
async fn merge_collection_tag(
    store: &dyn Store,
    mut existing: OauthEntityId,
    collection: EntityCollection,
) -> Result<OauthEntityId, AppError> {
    if existing.collections.contains(&collection) {
        return Ok(existing);
    }

    if !existing
        .collections
        .iter()
        .all(|c| c.compatible_with(&collection))
    {
        return Err(AppError::EntityMappingConflict(format!(
            "mapping for real id '{}' is tagged {:?} but was requested as {}",
            existing.real_id,
            existing
                .collections
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>(),
            collection.as_str(),
        )));
    }

    existing.collections.push(collection);
    store.update_entity_id(&existing).await?;
    Ok(existing)
}

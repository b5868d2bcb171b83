use tiberius::Row;

use crate::db::models::OauthEntityId;
use crate::db::pool::Db;
use crate::store::StoreError;

use super::{from_json, map_pool_err, map_query_err, to_json};

fn row_to_entity_id(row: &Row) -> OauthEntityId {
    OauthEntityId {
        id: row.get::<&str, _>("id").unwrap_or_default().to_string(),
        user_id: row
            .get::<&str, _>("user_id")
            .unwrap_or_default()
            .to_string(),
        client_id: row
            .get::<&str, _>("client_id")
            .unwrap_or_default()
            .to_string(),
        real_id: row
            .get::<&str, _>("real_id")
            .unwrap_or_default()
            .to_string(),
        fake_id: row
            .get::<&str, _>("fake_id")
            .unwrap_or_default()
            .to_string(),
        collections: from_json(row.get::<&str, _>("collections").unwrap_or_default()),
        is_test_account: row.get::<bool, _>("is_test_account").unwrap_or_default(),
        created_at: row
            .get::<chrono::NaiveDateTime, _>("created_at")
            .unwrap_or_default(),
    }
}

pub async fn find_by_key(
    pool: &Db,
    user_id: &str,
    client_id: &str,
    real_id: &str,
) -> Result<Option<OauthEntityId>, StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let row = conn
        .query(
            "SELECT * FROM oauth_entity_ids WHERE user_id = @P1 AND client_id = @P2 AND real_id = @P3",
            &[&user_id, &client_id, &real_id],
        )
        .await
        .map_err(map_query_err)?
        .into_row()
        .await
        .map_err(map_query_err)?;
    Ok(row.as_ref().map(row_to_entity_id))
}

pub async fn insert(pool: &Db, mapping: &OauthEntityId) -> Result<(), StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let collections = to_json(&mapping.collections);
    conn.execute(
        "INSERT INTO oauth_entity_ids (id, user_id, client_id, real_id, fake_id, collections, is_test_account, created_at) VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8)",
        &[&mapping.id.as_str(), &mapping.user_id.as_str(), &mapping.client_id.as_str(), &mapping.real_id.as_str(), &mapping.fake_id.as_str(), &collections.as_str(), &mapping.is_test_account, &mapping.created_at],
    )
    .await
    .map_err(map_query_err)?;
    Ok(())
}

/// Only the collection tags may change after creation; the fake ID is part
/// of the stability contract.
pub async fn update_collections(pool: &Db, mapping: &OauthEntityId) -> Result<(), StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let collections = to_json(&mapping.collections);
    conn.execute(
        "UPDATE oauth_entity_ids SET collections = @P1 WHERE user_id = @P2 AND client_id = @P3 AND real_id = @P4",
        &[&collections.as_str(), &mapping.user_id.as_str(), &mapping.client_id.as_str(), &mapping.real_id.as_str()],
    )
    .await
    .map_err(map_query_err)?;
    Ok(())
}

use tiberius::Row;

use crate::db::models::UserAuthorization;
use crate::db::pool::Db;
use crate::store::StoreError;

use super::{from_json, map_pool_err, map_query_err, to_json};

fn row_to_user_authorization(row: &Row) -> UserAuthorization {
    UserAuthorization {
        id: row.get::<&str, _>("id").unwrap_or_default().to_string(),
        user_id: row
            .get::<&str, _>("user_id")
            .unwrap_or_default()
            .to_string(),
        client_id: row
            .get::<&str, _>("client_id")
            .unwrap_or_default()
            .to_string(),
        scope: from_json(row.get::<&str, _>("scope").unwrap_or_default()),
        scope_flags: from_json(row.get::<&str, _>("scope_flags").unwrap_or_default()),
        entities: from_json(row.get::<&str, _>("entities").unwrap_or_default()),
        created_at: row
            .get::<chrono::NaiveDateTime, _>("created_at")
            .unwrap_or_default(),
        updated_at: row
            .get::<chrono::NaiveDateTime, _>("updated_at")
            .unwrap_or_default(),
    }
}

pub async fn find_by_user_and_client(
    pool: &Db,
    user_id: &str,
    client_id: &str,
) -> Result<Option<UserAuthorization>, StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let row = conn
        .query(
            "SELECT * FROM user_authorizations WHERE user_id = @P1 AND client_id = @P2",
            &[&user_id, &client_id],
        )
        .await
        .map_err(map_query_err)?
        .into_row()
        .await
        .map_err(map_query_err)?;
    Ok(row.as_ref().map(row_to_user_authorization))
}

pub async fn list_by_user(
    pool: &Db,
    user_id: &str,
) -> Result<Vec<UserAuthorization>, StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let rows = conn
        .query(
            "SELECT * FROM user_authorizations WHERE user_id = @P1",
            &[&user_id],
        )
        .await
        .map_err(map_query_err)?
        .into_first_result()
        .await
        .map_err(map_query_err)?;
    Ok(rows.iter().map(row_to_user_authorization).collect())
}

pub async fn insert(pool: &Db, entry: &UserAuthorization) -> Result<(), StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let scope = to_json(&entry.scope);
    let scope_flags = to_json(&entry.scope_flags);
    let entities = to_json(&entry.entities);
    conn.execute(
        "INSERT INTO user_authorizations (id, user_id, client_id, scope, scope_flags, entities, created_at, updated_at) VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8)",
        &[&entry.id.as_str(), &entry.user_id.as_str(), &entry.client_id.as_str(), &scope.as_str(), &scope_flags.as_str(), &entities.as_str(), &entry.created_at, &entry.updated_at],
    )
    .await
    .map_err(map_query_err)?;
    Ok(())
}

pub async fn update(pool: &Db, entry: &UserAuthorization) -> Result<(), StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let scope = to_json(&entry.scope);
    let scope_flags = to_json(&entry.scope_flags);
    let entities = to_json(&entry.entities);
    conn.execute(
        "UPDATE user_authorizations SET scope = @P1, scope_flags = @P2, entities = @P3, updated_at = @P4 WHERE user_id = @P5 AND client_id = @P6",
        &[&scope.as_str(), &scope_flags.as_str(), &entities.as_str(), &entry.updated_at, &entry.user_id.as_str(), &entry.client_id.as_str()],
    )
    .await
    .map_err(map_query_err)?;
    Ok(())
}

pub async fn delete_by_user_and_client(
    pool: &Db,
    user_id: &str,
    client_id: &str,
) -> Result<(), StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    conn.execute(
        "DELETE FROM user_authorizations WHERE user_id = @P1 AND client_id = @P2",
        &[&user_id, &client_id],
    )
    .await
    .map_err(map_query_err)?;
    Ok(())
}

use tiberius::Row;

use crate::db::models::{RedirectionUri, ResponseType};
use crate::db::pool::Db;
use crate::store::StoreError;

use super::{from_json, map_pool_err, map_query_err, to_json};

fn row_to_redirection_uri(row: &Row) -> RedirectionUri {
    RedirectionUri {
        id: row.get::<&str, _>("id").unwrap_or_default().to_string(),
        client_id: row
            .get::<&str, _>("client_id")
            .unwrap_or_default()
            .to_string(),
        uri: row.get::<&str, _>("uri").unwrap_or_default().to_string(),
        response_type: match row.get::<&str, _>("response_type").unwrap_or_default() {
            "token" => ResponseType::Token,
            _ => ResponseType::Code,
        },
        scope: from_json(row.get::<&str, _>("scope").unwrap_or_default()),
        scope_flags: from_json(row.get::<&str, _>("scope_flags").unwrap_or_default()),
        needs_client_secret: row.get::<bool, _>("needs_client_secret").unwrap_or_default(),
        created_at: row
            .get::<chrono::NaiveDateTime, _>("created_at")
            .unwrap_or_default(),
        updated_at: row
            .get::<chrono::NaiveDateTime, _>("updated_at")
            .unwrap_or_default(),
    }
}

pub async fn find_by_client_and_uri(
    pool: &Db,
    client_id: &str,
    uri: &str,
) -> Result<Option<RedirectionUri>, StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let row = conn
        .query(
            "SELECT * FROM redirection_uris WHERE client_id = @P1 AND uri = @P2",
            &[&client_id, &uri],
        )
        .await
        .map_err(map_query_err)?
        .into_row()
        .await
        .map_err(map_query_err)?;
    Ok(row.as_ref().map(row_to_redirection_uri))
}

pub async fn list_by_client(
    pool: &Db,
    client_id: &str,
) -> Result<Vec<RedirectionUri>, StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let rows = conn
        .query(
            "SELECT * FROM redirection_uris WHERE client_id = @P1",
            &[&client_id],
        )
        .await
        .map_err(map_query_err)?
        .into_first_result()
        .await
        .map_err(map_query_err)?;
    Ok(rows.iter().map(row_to_redirection_uri).collect())
}

pub async fn insert(pool: &Db, uri: &RedirectionUri) -> Result<(), StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let scope = to_json(&uri.scope);
    let scope_flags = to_json(&uri.scope_flags);
    conn.execute(
        "INSERT INTO redirection_uris (id, client_id, uri, response_type, scope, scope_flags, needs_client_secret, created_at, updated_at) VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8, @P9)",
        &[&uri.id.as_str(), &uri.client_id.as_str(), &uri.uri.as_str(), &uri.response_type.as_str(), &scope.as_str(), &scope_flags.as_str(), &uri.needs_client_secret, &uri.created_at, &uri.updated_at],
    )
    .await
    .map_err(map_query_err)?;
    Ok(())
}

pub async fn update(pool: &Db, uri: &RedirectionUri) -> Result<(), StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let scope = to_json(&uri.scope);
    let scope_flags = to_json(&uri.scope_flags);
    conn.execute(
        "UPDATE redirection_uris SET uri = @P1, response_type = @P2, scope = @P3, scope_flags = @P4, needs_client_secret = @P5, updated_at = @P6 WHERE id = @P7",
        &[&uri.uri.as_str(), &uri.response_type.as_str(), &scope.as_str(), &scope_flags.as_str(), &uri.needs_client_secret, &uri.updated_at, &uri.id.as_str()],
    )
    .await
    .map_err(map_query_err)?;
    Ok(())
}

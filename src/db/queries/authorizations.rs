use tiberius::Row;

use crate::db::models::{AuthorizationCode, GrantType, OauthAuthorization};
use crate::db::pool::Db;
use crate::store::StoreError;

use super::{from_json, map_pool_err, map_query_err, to_json};

fn row_to_authorization(row: &Row) -> OauthAuthorization {
    let code = row
        .get::<&str, _>("code_value")
        .map(|value| AuthorizationCode {
            value: value.to_string(),
            used: row.get::<bool, _>("code_used").unwrap_or_default(),
            expires_at: row
                .get::<chrono::NaiveDateTime, _>("code_expires_at")
                .unwrap_or_default(),
        });

    OauthAuthorization {
        id: row.get::<&str, _>("id").unwrap_or_default().to_string(),
        client_id: row
            .get::<&str, _>("client_id")
            .unwrap_or_default()
            .to_string(),
        user_id: row.get::<&str, _>("user_id").map(|s| s.to_string()),
        grant_type: match row.get::<&str, _>("grant_type").unwrap_or_default() {
            "token" => GrantType::Token,
            "password" => GrantType::Password,
            "client_credentials" => GrantType::ClientCredentials,
            _ => GrantType::AuthorizationCode,
        },
        scope: from_json(row.get::<&str, _>("scope").unwrap_or_default()),
        scope_flags: from_json(row.get::<&str, _>("scope_flags").unwrap_or_default()),
        token_hash: row
            .get::<&str, _>("token_hash")
            .unwrap_or_default()
            .to_string(),
        code,
        created_at: row
            .get::<chrono::NaiveDateTime, _>("created_at")
            .unwrap_or_default(),
    }
}

pub async fn insert(pool: &Db, grant: &OauthAuthorization) -> Result<(), StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let scope = to_json(&grant.scope);
    let scope_flags = to_json(&grant.scope_flags);
    let code_value = grant.code.as_ref().map(|c| c.value.as_str());
    let code_used = grant.code.as_ref().map(|c| c.used).unwrap_or(false);
    let code_expires_at = grant.code.as_ref().map(|c| c.expires_at);
    conn.execute(
        "INSERT INTO oauth_authorizations (id, client_id, user_id, grant_type, scope, scope_flags, token_hash, code_value, code_used, code_expires_at, created_at) VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8, @P9, @P10, @P11)",
        &[&grant.id.as_str(), &grant.client_id.as_str(), &grant.user_id.as_deref(), &grant.grant_type.as_str(), &scope.as_str(), &scope_flags.as_str(), &grant.token_hash.as_str(), &code_value, &code_used, &code_expires_at, &grant.created_at],
    )
    .await
    .map_err(map_query_err)?;
    Ok(())
}

pub async fn find_by_code(
    pool: &Db,
    code: &str,
) -> Result<Option<OauthAuthorization>, StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let row = conn
        .query(
            "SELECT * FROM oauth_authorizations WHERE code_value = @P1",
            &[&code],
        )
        .await
        .map_err(map_query_err)?
        .into_row()
        .await
        .map_err(map_query_err)?;
    Ok(row.as_ref().map(row_to_authorization))
}

pub async fn find_by_token_hash(
    pool: &Db,
    token_hash: &str,
) -> Result<Option<OauthAuthorization>, StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let row = conn
        .query(
            "SELECT * FROM oauth_authorizations WHERE token_hash = @P1",
            &[&token_hash],
        )
        .await
        .map_err(map_query_err)?
        .into_row()
        .await
        .map_err(map_query_err)?;
    Ok(row.as_ref().map(row_to_authorization))
}

pub async fn mark_code_used(pool: &Db, grant_id: &str) -> Result<(), StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    conn.execute(
        "UPDATE oauth_authorizations SET code_used = 1 WHERE id = @P1",
        &[&grant_id],
    )
    .await
    .map_err(map_query_err)?;
    Ok(())
}

use tiberius::Row;

use crate::db::models::{OauthUserStatus, UserStatusKind};
use crate::db::pool::Db;
use crate::store::StoreError;

use super::{from_json, map_pool_err, map_query_err, to_json};

fn row_to_user_status(row: &Row) -> OauthUserStatus {
    OauthUserStatus {
        id: row.get::<&str, _>("id").unwrap_or_default().to_string(),
        user_id: row
            .get::<&str, _>("user_id")
            .unwrap_or_default()
            .to_string(),
        client_id: row
            .get::<&str, _>("client_id")
            .unwrap_or_default()
            .to_string(),
        status: match row.get::<&str, _>("status").unwrap_or_default() {
            "existing_user" => UserStatusKind::ExistingUser,
            _ => UserStatusKind::NewUser,
        },
        changed_fields: from_json(row.get::<&str, _>("changed_fields").unwrap_or_default()),
        email_changes: from_json(row.get::<&str, _>("email_changes").unwrap_or_default()),
        phone_number_changes: from_json(
            row.get::<&str, _>("phone_number_changes").unwrap_or_default(),
        ),
        address_changes: from_json(row.get::<&str, _>("address_changes").unwrap_or_default()),
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
) -> Result<Option<OauthUserStatus>, StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let row = conn
        .query(
            "SELECT * FROM oauth_user_statuses WHERE user_id = @P1 AND client_id = @P2",
            &[&user_id, &client_id],
        )
        .await
        .map_err(map_query_err)?
        .into_row()
        .await
        .map_err(map_query_err)?;
    Ok(row.as_ref().map(row_to_user_status))
}

pub async fn insert(pool: &Db, status: &OauthUserStatus) -> Result<(), StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let changed_fields = to_json(&status.changed_fields);
    let email_changes = to_json(&status.email_changes);
    let phone_number_changes = to_json(&status.phone_number_changes);
    let address_changes = to_json(&status.address_changes);
    conn.execute(
        "INSERT INTO oauth_user_statuses (id, user_id, client_id, status, changed_fields, email_changes, phone_number_changes, address_changes, created_at, updated_at) VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, @P8, @P9, @P10)",
        &[&status.id.as_str(), &status.user_id.as_str(), &status.client_id.as_str(), &status.status.as_str(), &changed_fields.as_str(), &email_changes.as_str(), &phone_number_changes.as_str(), &address_changes.as_str(), &status.created_at, &status.updated_at],
    )
    .await
    .map_err(map_query_err)?;
    Ok(())
}

pub async fn update(pool: &Db, status: &OauthUserStatus) -> Result<(), StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_err)?;
    let changed_fields = to_json(&status.changed_fields);
    let email_changes = to_json(&status.email_changes);
    let phone_number_changes = to_json(&status.phone_number_changes);
    let address_changes = to_json(&status.address_changes);
    conn.execute(
        "UPDATE oauth_user_statuses SET status = @P1, changed_fields = @P2, email_changes = @P3, phone_number_changes = @P4, address_changes = @P5, updated_at = @P6 WHERE user_id = @P7 AND client_id = @P8",
        &[&status.status.as_str(), &changed_fields.as_str(), &email_changes.as_str(), &phone_number_changes.as_str(), &address_changes.as_str(), &status.updated_at, &status.user_id.as_str(), &status.client_id.as_str()],
    )
    .await
    .map_err(map_query_err)?;
    Ok(())
}

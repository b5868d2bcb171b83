use chrono::Utc;
use uuid::Uuid;

use crate::db::models::{EntityChange, OauthUserStatus, UserStatusKind};
use crate::error::AppError;
use crate::scope::ScopeCatalog;
use crate::store::{Store, StoreError};

/// The explicit diff for one profile mutation cycle, computed by the caller
/// from the old and new snapshots and passed in by value.
#[derive(Clone, Debug, Default)]
pub struct ChangeSet {
    pub fields: Vec<String>,
    pub email_changes: Vec<EntityChange>,
    pub phone_number_changes: Vec<EntityChange>,
    pub address_changes: Vec<EntityChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.email_changes.is_empty()
            && self.phone_number_changes.is_empty()
            && self.address_changes.is_empty()
    }
}

/// Make sure a status row exists for (user, client).
///
/// The first creation marks the user `new_user` for that client; every later
/// interaction flips (and keeps) `existing_user`. The transition is one-way.
pub async fn ensure_tracked(
    store: &dyn Store,
    user_id: &str,
    client_id: &str,
) -> Result<OauthUserStatus, AppError> {
    if let Some(existing) = store.find_user_status(user_id, client_id).await? {
        return mark_existing(store, existing).await;
    }

    let row = fresh_row(user_id, client_id);
    match store.insert_user_status(&row).await {
        Ok(()) => Ok(row),
        Err(StoreError::DuplicateKey(_)) => {
            // A concurrent authorization created the row; that makes this
            // the second interaction.
            let existing = store
                .find_user_status(user_id, client_id)
                .await?
                .ok_or_else(|| {
                    StoreError::Backend("status row vanished after duplicate-key insert".to_string())
                })?;
            mark_existing(store, existing).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Fetch the status row, creating it as `new_user` if absent. Unlike
/// `ensure_tracked` this never advances the state machine; recording a
/// change is not an authorization event.
async fn get_or_create(
    store: &dyn Store,
    user_id: &str,
    client_id: &str,
) -> Result<OauthUserStatus, AppError> {
    if let Some(existing) = store.find_user_status(user_id, client_id).await? {
        return Ok(existing);
    }

    let row = fresh_row(user_id, client_id);
    match store.insert_user_status(&row).await {
        Ok(()) => Ok(row),
        Err(StoreError::DuplicateKey(_)) => {
            let existing = store
                .find_user_status(user_id, client_id)
                .await?
                .ok_or_else(|| {
                    StoreError::Backend("status row vanished after duplicate-key insert".to_string())
                })?;
            Ok(existing)
        }
        Err(e) => Err(e.into()),
    }
}

fn fresh_row(user_id: &str, client_id: &str) -> OauthUserStatus {
    let now = Utc::now().naive_utc();
    OauthUserStatus {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        client_id: client_id.to_string(),
        status: UserStatusKind::NewUser,
        changed_fields: vec![],
        email_changes: vec![],
        phone_number_changes: vec![],
        address_changes: vec![],
        created_at: now,
        updated_at: now,
    }
}

async fn mark_existing(
    store: &dyn Store,
    mut row: OauthUserStatus,
) -> Result<OauthUserStatus, AppError> {
    if row.status == UserStatusKind::NewUser {
        row.status = UserStatusKind::ExistingUser;
        row.updated_at = Utc::now().naive_utc();
        store.update_user_status(&row).await?;
    }
    Ok(row)
}

/// Accumulate a mutation cycle's changes onto the (user, client) status row.
///
/// Top-level fields are filtered to the client-visible catalog; entity
/// changes are merged so repeated syncs before a webhook drain never drop a
/// change (at-least-once accumulation, delivery is someone else's problem).
pub async fn record_changes(
    store: &dyn Store,
    catalog: &ScopeCatalog,
    user_id: &str,
    client_id: &str,
    changes: ChangeSet,
) -> Result<(), AppError> {
    let mut row = get_or_create(store, user_id, client_id).await?;

    for field in changes.fields {
        if catalog.visible_fields().contains(&field) && !row.changed_fields.contains(&field) {
            row.changed_fields.push(field);
        }
    }

    merge_entity_changes(&mut row.email_changes, changes.email_changes);
    merge_entity_changes(&mut row.phone_number_changes, changes.phone_number_changes);
    merge_entity_changes(&mut row.address_changes, changes.address_changes);

    row.updated_at = Utc::now().naive_utc();
    store.update_user_status(&row).await?;
    Ok(())
}

/// Read and clear the pending changes for (user, client), returning what was
/// pending. The row itself survives so the new/existing distinction does.
pub async fn drain(
    store: &dyn Store,
    user_id: &str,
    client_id: &str,
) -> Result<Option<OauthUserStatus>, AppError> {
    let Some(row) = store.find_user_status(user_id, client_id).await? else {
        return Ok(None);
    };

    let mut cleared = row.clone();
    cleared.changed_fields.clear();
    cleared.email_changes.clear();
    cleared.phone_number_changes.clear();
    cleared.address_changes.clear();
    cleared.updated_at = Utc::now().naive_utc();
    store.update_user_status(&cleared).await?;

    Ok(Some(row))
}

fn merge_entity_changes(existing: &mut Vec<EntityChange>, incoming: Vec<EntityChange>) {
    for change in incoming {
        match existing
            .iter_mut()
            .find(|c| c.entity_id == change.entity_id && c.status == change.status)
        {
            Some(current) => {
                for field in change.changed_fields {
                    if !current.changed_fields.contains(&field) {
                        current.changed_fields.push(field);
                    }
                }
            }
            None => existing.push(change),
        }
    }
}

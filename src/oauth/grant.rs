use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::models::{
    AuthorizationCode, AuthorizedEntities, ChangeStatus, EntityChange, EntityCollection,
    GrantType, OauthAuthorization, StatKind, UserAuthorization,
};
use crate::error::AppError;
use crate::oauth::identity;
use crate::oauth::reconcile::{self, Reconciled};
use crate::oauth::redirect;
use crate::oauth::stats;
use crate::oauth::status::{self, ChangeSet};
use crate::scope::ScopeCatalog;
use crate::store::{Store, StoreError};

const AUTH_CODE_EXPIRY_MINS: i64 = 10;

/// Generate a cryptographically random authorization code.
pub fn generate_auth_code() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..64).map(|_| rng.gen()).collect();
    hex::encode(bytes)
}

/// Generate a cryptographically random access token.
pub fn generate_access_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    hex::encode(bytes)
}

/// Hash a token with SHA-256 for storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// The user's real entity IDs, grouped by what kind of record they are.
#[derive(Clone, Debug, Default)]
pub struct UserEntities {
    pub emails: Vec<String>,
    pub mobile_phone_numbers: Vec<String>,
    pub landline_phone_numbers: Vec<String>,
    pub unknown_phone_numbers: Vec<String>,
    pub addresses: Vec<String>,
}

/// Cumulative totals before this event, supplied by the statistics
/// collaborator; they seed the day-bucket baselines on first write.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatBaselines {
    pub registered: i64,
    pub active: i64,
    pub test_accounts: i64,
}

/// The authorizing user and what of theirs can be exposed.
#[derive(Clone, Debug)]
pub struct UserContext {
    pub user_id: String,
    pub entities: UserEntities,
    pub is_test_account: bool,
    pub baselines: StatBaselines,
}

#[derive(Clone, Debug)]
pub struct IssueRequest {
    pub client_id: String,
    pub grant_type: GrantType,
    /// Raw redirect URI; required for the code and implicit flows.
    pub redirect_uri: Option<String>,
    /// Requested scope for the password and client_credentials flows, which
    /// carry no redirect-URI declaration.
    pub scope: Option<Vec<String>>,
    pub scope_flags: Option<Vec<String>>,
    /// Absent only for client_credentials.
    pub user: Option<UserContext>,
}

#[derive(Clone, Debug)]
pub struct IssueOutcome {
    pub grant: OauthAuthorization,
    /// None for client_credentials grants.
    pub ledger: Option<UserAuthorization>,
    /// Raw bearer token; only its hash is persisted.
    pub token: String,
    /// Raw authorization code, for the code flow.
    pub code: Option<String>,
    /// The client-facing stand-in for the user's own ID.
    pub fake_user_id: Option<String>,
    pub first_authorization: bool,
}

/// Issue a new authorization grant.
///
/// One event writes several rows; ordering makes a partial failure
/// recoverable by retrying the whole call: ledger first, then the immutable
/// grant, then entity mappings, status and counters, all of which are
/// idempotent get-or-create/increment writes.
pub async fn issue(
    store: &dyn Store,
    catalog: &ScopeCatalog,
    req: IssueRequest,
) -> Result<IssueOutcome, AppError> {
    let (declared_scope, declared_flags) = declared_scope_for(store, catalog, &req).await?;

    if req.grant_type == GrantType::ClientCredentials {
        if req.user.is_some() {
            return Err(AppError::Contract(
                "client_credentials grants must not carry a user".to_string(),
            ));
        }
        return issue_app_grant(store, &req, declared_scope, declared_flags).await;
    }

    let user = req.user.as_ref().ok_or_else(|| {
        AppError::Contract(format!(
            "{} grants require an authorizing user",
            req.grant_type.as_str()
        ))
    })?;

    // Ledger first: reconcile against prior consent, then create or grow it.
    let prior = store
        .find_user_authorization(&user.user_id, &req.client_id)
        .await?;
    let granted = reconcile::reconcile(
        catalog,
        &declared_scope,
        &declared_flags,
        prior.as_ref(),
    )?;
    let (ledger, first_authorization) =
        write_ledger(store, &req.client_id, user, prior, &granted).await?;

    let token = generate_access_token();
    let code = match req.grant_type {
        GrantType::AuthorizationCode => Some(generate_auth_code()),
        _ => None,
    };

    let grant = OauthAuthorization {
        id: Uuid::new_v4().to_string(),
        client_id: req.client_id.clone(),
        user_id: Some(user.user_id.clone()),
        grant_type: req.grant_type,
        scope: granted.scope.clone(),
        scope_flags: granted.scope_flags.clone(),
        token_hash: hash_token(&token),
        code: code.as_ref().map(|value| AuthorizationCode {
            value: value.clone(),
            used: false,
            expires_at: (Utc::now() + Duration::minutes(AUTH_CODE_EXPIRY_MINS)).naive_utc(),
        }),
        created_at: Utc::now().naive_utc(),
    };
    store.insert_authorization(&grant).await?;

    let (fake_user_id, changes) =
        expose_entities(store, &req.client_id, user, &granted).await?;

    status::ensure_tracked(store, &user.user_id, &req.client_id).await?;
    if !changes.is_empty() {
        status::record_changes(store, catalog, &user.user_id, &req.client_id, changes).await?;
    }

    stats::bump(store, &req.client_id, StatKind::ActiveUsers, user.baselines.active).await?;
    if first_authorization {
        stats::bump(
            store,
            &req.client_id,
            StatKind::RegisteredUsers,
            user.baselines.registered,
        )
        .await?;
        if user.is_test_account {
            stats::bump(
                store,
                &req.client_id,
                StatKind::TestAccounts,
                user.baselines.test_accounts,
            )
            .await?;
        }
    }

    tracing::debug!(
        client_id = %req.client_id,
        user_id = %user.user_id,
        grant_type = req.grant_type.as_str(),
        scope = ?granted.scope,
        first_authorization,
        "issued authorization grant"
    );

    Ok(IssueOutcome {
        grant,
        ledger: Some(ledger),
        token,
        code,
        fake_user_id: Some(fake_user_id),
        first_authorization,
    })
}

/// Exchange an authorization code: single use, bound to the issuing client,
/// expiring shortly after issuance.
pub async fn exchange_code(
    store: &dyn Store,
    code: &str,
    client_id: &str,
) -> Result<OauthAuthorization, AppError> {
    let grant = store
        .find_authorization_by_code(code)
        .await?
        .ok_or(AppError::InvalidAuthorizationCode)?;

    let code_obj = grant
        .code
        .as_ref()
        .ok_or(AppError::InvalidAuthorizationCode)?;

    if code_obj.used || grant.client_id != client_id {
        return Err(AppError::InvalidAuthorizationCode);
    }
    if code_obj.expires_at < Utc::now().naive_utc() {
        return Err(AppError::AuthorizationCodeExpired);
    }

    store.mark_code_used(&grant.id).await?;
    Ok(grant)
}

/// Drop the cumulative consent record for (user, client). Grants already
/// issued stay behind as immutable history.
pub async fn deauthorize(
    store: &dyn Store,
    user_id: &str,
    client_id: &str,
) -> Result<(), AppError> {
    store
        .find_user_authorization(user_id, client_id)
        .await?
        .ok_or(AppError::AuthorizationNotFound)?;
    store.delete_user_authorization(user_id, client_id).await?;
    tracing::info!(user_id, client_id, "user de-authorized client");
    Ok(())
}

async fn declared_scope_for(
    store: &dyn Store,
    catalog: &ScopeCatalog,
    req: &IssueRequest,
) -> Result<(Vec<String>, Vec<String>), AppError> {
    match req.grant_type {
        GrantType::AuthorizationCode | GrantType::Token => {
            let raw = req
                .redirect_uri
                .as_deref()
                .ok_or(AppError::InvalidRedirectUri)?;
            let normalized = redirect::normalize(raw);
            let uri = store
                .find_redirection_uri(&req.client_id, &normalized)
                .await?
                .ok_or(AppError::RedirectUriNotFound)?;
            Ok((uri.scope, uri.scope_flags))
        }
        GrantType::Password | GrantType::ClientCredentials => {
            let scope = req.scope.clone().unwrap_or_default();
            let flags = req.scope_flags.clone().unwrap_or_default();
            catalog.validate_scope(&scope)?;
            catalog.validate_scope_flags(&flags)?;
            Ok((scope, flags))
        }
    }
}

async fn issue_app_grant(
    store: &dyn Store,
    req: &IssueRequest,
    scope: Vec<String>,
    scope_flags: Vec<String>,
) -> Result<IssueOutcome, AppError> {
    let token = generate_access_token();
    let grant = OauthAuthorization {
        id: Uuid::new_v4().to_string(),
        client_id: req.client_id.clone(),
        user_id: None,
        grant_type: GrantType::ClientCredentials,
        scope,
        scope_flags,
        token_hash: hash_token(&token),
        code: None,
        created_at: Utc::now().naive_utc(),
    };
    store.insert_authorization(&grant).await?;

    tracing::debug!(client_id = %req.client_id, "issued client_credentials grant");

    Ok(IssueOutcome {
        grant,
        ledger: None,
        token,
        code: None,
        fake_user_id: None,
        first_authorization: false,
    })
}

/// Create or grow the (user, client) consent row. A concurrent first
/// authorization loses the unique-index race and folds into the winner's
/// row instead of failing.
async fn write_ledger(
    store: &dyn Store,
    client_id: &str,
    user: &UserContext,
    prior: Option<UserAuthorization>,
    granted: &Reconciled,
) -> Result<(UserAuthorization, bool), AppError> {
    if let Some(mut entry) = prior {
        reconcile::merge_into_ledger(&mut entry, granted);
        entry.entities = authorized_entities(&user.entities, &granted.scope, &entry.entities);
        entry.updated_at = Utc::now().naive_utc();
        store.update_user_authorization(&entry).await?;
        return Ok((entry, false));
    }

    let now = Utc::now().naive_utc();
    let entry = UserAuthorization {
        id: Uuid::new_v4().to_string(),
        user_id: user.user_id.clone(),
        client_id: client_id.to_string(),
        scope: granted.scope.clone(),
        scope_flags: granted.scope_flags.clone(),
        entities: authorized_entities(
            &user.entities,
            &granted.scope,
            &AuthorizedEntities::default(),
        ),
        created_at: now,
        updated_at: now,
    };

    match store.insert_user_authorization(&entry).await {
        Ok(()) => Ok((entry, true)),
        Err(StoreError::DuplicateKey(_)) => {
            let mut winner = store
                .find_user_authorization(&user.user_id, client_id)
                .await?
                .ok_or_else(|| {
                    StoreError::Backend(
                        "ledger row vanished after duplicate-key insert".to_string(),
                    )
                })?;
            reconcile::merge_into_ledger(&mut winner, granted);
            winner.entities = authorized_entities(&user.entities, &granted.scope, &winner.entities);
            winner.updated_at = Utc::now().naive_utc();
            store.update_user_authorization(&winner).await?;
            Ok((winner, false))
        }
        Err(e) => Err(e.into()),
    }
}

fn authorized_entities(
    entities: &UserEntities,
    scope: &[String],
    current: &AuthorizedEntities,
) -> AuthorizedEntities {
    let mut out = current.clone();
    if scope.iter().any(|s| s == "emails") {
        union_into(&mut out.emails, &entities.emails);
    }
    if scope.iter().any(|s| s == "phone_numbers") {
        union_into(&mut out.phone_numbers, &entities.mobile_phone_numbers);
        union_into(&mut out.phone_numbers, &entities.landline_phone_numbers);
        union_into(&mut out.phone_numbers, &entities.unknown_phone_numbers);
    }
    if scope.iter().any(|s| s == "addresses") {
        union_into(&mut out.addresses, &entities.addresses);
    }
    out
}

fn union_into(target: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

/// Assign or reuse fake IDs for every entity the effective scope exposes,
/// collecting a `new` change entry for each first-time exposure.
async fn expose_entities(
    store: &dyn Store,
    client_id: &str,
    user: &UserContext,
    granted: &Reconciled,
) -> Result<(String, ChangeSet), AppError> {
    let mut changes = ChangeSet::default();

    let (user_mapping, _) = identity::get_or_create_fake_id(
        store,
        &user.user_id,
        client_id,
        &user.user_id,
        EntityCollection::Users,
        user.is_test_account,
    )
    .await?;

    if granted.scope.iter().any(|s| s == "emails") {
        for real_id in &user.entities.emails {
            let (_, created) = identity::get_or_create_fake_id(
                store,
                &user.user_id,
                client_id,
                real_id,
                EntityCollection::Emails,
                user.is_test_account,
            )
            .await?;
            if created {
                changes.email_changes.push(new_entity(real_id));
            }
        }
    }

    if granted.scope.iter().any(|s| s == "phone_numbers") {
        let phone_groups = [
            (
                EntityCollection::MobilePhoneNumbers,
                &user.entities.mobile_phone_numbers,
            ),
            (
                EntityCollection::LandlinePhoneNumbers,
                &user.entities.landline_phone_numbers,
            ),
            (
                EntityCollection::UnknownPhoneNumbers,
                &user.entities.unknown_phone_numbers,
            ),
        ];
        for (collection, real_ids) in phone_groups {
            for real_id in real_ids.iter() {
                let (_, created) = identity::get_or_create_fake_id(
                    store,
                    &user.user_id,
                    client_id,
                    real_id,
                    collection,
                    user.is_test_account,
                )
                .await?;
                if created {
                    changes.phone_number_changes.push(new_entity(real_id));
                }
            }
        }
    }

    if granted.scope.iter().any(|s| s == "addresses") {
        for real_id in &user.entities.addresses {
            let (_, created) = identity::get_or_create_fake_id(
                store,
                &user.user_id,
                client_id,
                real_id,
                EntityCollection::Addresses,
                user.is_test_account,
            )
            .await?;
            if created {
                changes.address_changes.push(new_entity(real_id));
            }
        }
    }

    Ok((user_mapping.fake_id, changes))
}

fn new_entity(real_id: &str) -> EntityChange {
    EntityChange {
        entity_id: real_id.to_string(),
        status: ChangeStatus::New,
        changed_fields: vec![],
    }
}

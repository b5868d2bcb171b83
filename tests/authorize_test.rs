mod common;

use chrono::{Duration, Utc};
use common::{catalog, code_flow_request, owned, register_redirect_uri, user_context};
use identity_service::db::models::{
    AuthorizationCode, GrantType, OauthAuthorization, StatKind,
};
use identity_service::error::AppError;
use identity_service::oauth::grant::{self, IssueRequest, StatBaselines, UserContext};
use identity_service::oauth::{redirect, stats};
use identity_service::store::memory::MemoryStore;
use identity_service::store::{Store, StoreError};

// ─── Grant issuance ─────────────────────────────────────────────────────────

#[tokio::test]
async fn first_authorization_creates_ledger_with_declared_scope() {
    let store = MemoryStore::new();
    register_redirect_uri(&store, common::CLIENT_ID, common::REDIRECT_URI, &["emails"]).await;

    let out = grant::issue(
        &store,
        &catalog(),
        code_flow_request(common::CLIENT_ID, common::REDIRECT_URI, user_context(common::USER_ID)),
    )
    .await
    .unwrap();

    assert!(out.first_authorization);
    let ledger = out.ledger.unwrap();
    assert_eq!(ledger.scope, owned(&["emails"]));
    assert_eq!(ledger.entities.emails, owned(&["email-1"]));
    // Addresses were not in scope, so none were exposed.
    assert!(ledger.entities.addresses.is_empty());

    let stored = store
        .find_user_authorization(common::USER_ID, common::CLIENT_ID)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.scope, owned(&["emails"]));
}

#[tokio::test]
async fn reauthorization_does_not_expand_consent() {
    let store = MemoryStore::new();
    let mut uri =
        register_redirect_uri(&store, common::CLIENT_ID, common::REDIRECT_URI, &["emails"]).await;

    grant::issue(
        &store,
        &catalog(),
        code_flow_request(common::CLIENT_ID, common::REDIRECT_URI, user_context(common::USER_ID)),
    )
    .await
    .unwrap();

    // Developer widens the declared scope after the user consented.
    uri.scope = owned(&["emails", "first_name"]);
    store.update_redirection_uri(&uri).await.unwrap();

    let out = grant::issue(
        &store,
        &catalog(),
        code_flow_request(common::CLIENT_ID, common::REDIRECT_URI, user_context(common::USER_ID)),
    )
    .await
    .unwrap();

    assert!(!out.first_authorization);
    // The user only ever consented to emails.
    assert_eq!(out.grant.scope, owned(&["emails"]));
    assert_eq!(out.ledger.unwrap().scope, owned(&["emails"]));
}

#[tokio::test]
async fn disjoint_redeclaration_rejects_the_grant() {
    let store = MemoryStore::new();
    let mut uri =
        register_redirect_uri(&store, common::CLIENT_ID, common::REDIRECT_URI, &["emails"]).await;

    grant::issue(
        &store,
        &catalog(),
        code_flow_request(common::CLIENT_ID, common::REDIRECT_URI, user_context(common::USER_ID)),
    )
    .await
    .unwrap();

    uri.scope = owned(&["addresses"]);
    store.update_redirection_uri(&uri).await.unwrap();

    let err = grant::issue(
        &store,
        &catalog(),
        code_flow_request(common::CLIENT_ID, common::REDIRECT_URI, user_context(common::USER_ID)),
    )
    .await;
    assert!(matches!(err, Err(AppError::InvalidScope)));
}

#[tokio::test]
async fn grant_scope_is_an_immutable_snapshot() {
    let store = MemoryStore::new();
    let mut uri = register_redirect_uri(
        &store,
        common::CLIENT_ID,
        common::REDIRECT_URI,
        &["emails", "addresses"],
    )
    .await;

    let first = grant::issue(
        &store,
        &catalog(),
        code_flow_request(common::CLIENT_ID, common::REDIRECT_URI, user_context(common::USER_ID)),
    )
    .await
    .unwrap();

    uri.scope = owned(&["emails"]);
    store.update_redirection_uri(&uri).await.unwrap();

    grant::issue(
        &store,
        &catalog(),
        code_flow_request(common::CLIENT_ID, common::REDIRECT_URI, user_context(common::USER_ID)),
    )
    .await
    .unwrap();

    // The earlier issuance still records what was active at its time.
    let stored = store
        .find_authorization_by_token_hash(&grant::hash_token(&first.token))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.scope, owned(&["emails", "addresses"]));
}

#[tokio::test]
async fn unregistered_redirect_uri_is_rejected() {
    let store = MemoryStore::new();
    register_redirect_uri(&store, common::CLIENT_ID, common::REDIRECT_URI, &["emails"]).await;

    let err = grant::issue(
        &store,
        &catalog(),
        code_flow_request(common::CLIENT_ID, "https://evil.example/cb", user_context(common::USER_ID)),
    )
    .await;
    assert!(matches!(err, Err(AppError::RedirectUriNotFound)));
}

#[tokio::test]
async fn redirect_uri_lookup_normalizes_first() {
    let store = MemoryStore::new();
    register_redirect_uri(
        &store,
        common::CLIENT_ID,
        "http://localhost:5200/cb",
        &["emails"],
    )
    .await;

    // Same endpoint, different port and trailing slash.
    let out = grant::issue(
        &store,
        &catalog(),
        code_flow_request(common::CLIENT_ID, "http://localhost:9999/cb/", user_context(common::USER_ID)),
    )
    .await;
    assert!(out.is_ok());
}

#[tokio::test]
async fn registered_uris_are_listed_per_client() {
    let store = MemoryStore::new();
    register_redirect_uri(&store, common::CLIENT_ID, "https://one.example/cb", &["emails"]).await;
    register_redirect_uri(&store, common::CLIENT_ID, "https://two.example/cb", &["emails"]).await;
    register_redirect_uri(&store, "client-2", "https://one.example/cb", &["emails"]).await;

    let listed = redirect::list(&store, common::CLIENT_ID).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|u| u.client_id == common::CLIENT_ID));
}

// ─── Authorization codes ────────────────────────────────────────────────────

#[tokio::test]
async fn authorization_code_is_single_use_and_client_bound() {
    let store = MemoryStore::new();
    register_redirect_uri(&store, common::CLIENT_ID, common::REDIRECT_URI, &["emails"]).await;

    let out = grant::issue(
        &store,
        &catalog(),
        code_flow_request(common::CLIENT_ID, common::REDIRECT_URI, user_context(common::USER_ID)),
    )
    .await
    .unwrap();
    let code = out.code.unwrap();

    // Wrong client cannot redeem.
    let err = grant::exchange_code(&store, &code, "client-2").await;
    assert!(matches!(err, Err(AppError::InvalidAuthorizationCode)));

    let redeemed = grant::exchange_code(&store, &code, common::CLIENT_ID)
        .await
        .unwrap();
    assert_eq!(redeemed.user_id.as_deref(), Some(common::USER_ID));

    // Second redemption fails.
    let err = grant::exchange_code(&store, &code, common::CLIENT_ID).await;
    assert!(matches!(err, Err(AppError::InvalidAuthorizationCode)));
}

#[tokio::test]
async fn expired_authorization_code_is_rejected() {
    let store = MemoryStore::new();
    let stale = OauthAuthorization {
        id: "grant-stale".to_string(),
        client_id: common::CLIENT_ID.to_string(),
        user_id: Some(common::USER_ID.to_string()),
        grant_type: GrantType::AuthorizationCode,
        scope: owned(&["emails"]),
        scope_flags: vec![],
        token_hash: grant::hash_token("stale-token"),
        code: Some(AuthorizationCode {
            value: "stale-code".to_string(),
            used: false,
            expires_at: (Utc::now() - Duration::minutes(1)).naive_utc(),
        }),
        created_at: (Utc::now() - Duration::minutes(20)).naive_utc(),
    };
    store.insert_authorization(&stale).await.unwrap();

    let err = grant::exchange_code(&store, "stale-code", common::CLIENT_ID).await;
    assert!(matches!(err, Err(AppError::AuthorizationCodeExpired)));
}

// ─── App-level grants ───────────────────────────────────────────────────────

#[tokio::test]
async fn client_credentials_has_no_user_and_no_ledger() {
    let store = MemoryStore::new();
    let out = grant::issue(
        &store,
        &catalog(),
        IssueRequest {
            client_id: common::CLIENT_ID.to_string(),
            grant_type: GrantType::ClientCredentials,
            redirect_uri: None,
            scope: Some(owned(&["app"])),
            scope_flags: None,
            user: None,
        },
    )
    .await
    .unwrap();

    assert!(out.ledger.is_none());
    assert!(out.code.is_none());
    assert!(out.grant.user_id.is_none());
    assert!(store
        .find_user_authorization(common::USER_ID, common::CLIENT_ID)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn user_flows_without_a_user_fail_loudly() {
    let store = MemoryStore::new();
    register_redirect_uri(&store, common::CLIENT_ID, common::REDIRECT_URI, &["emails"]).await;

    let err = grant::issue(
        &store,
        &catalog(),
        IssueRequest {
            client_id: common::CLIENT_ID.to_string(),
            grant_type: GrantType::AuthorizationCode,
            redirect_uri: Some(common::REDIRECT_URI.to_string()),
            scope: None,
            scope_flags: None,
            user: None,
        },
    )
    .await;
    assert!(matches!(err, Err(AppError::Contract(_))));
}

// ─── Uniqueness & de-authorization ──────────────────────────────────────────

#[tokio::test]
async fn second_ledger_insert_is_a_duplicate_key() {
    let store = MemoryStore::new();
    register_redirect_uri(&store, common::CLIENT_ID, common::REDIRECT_URI, &["emails"]).await;

    let out = grant::issue(
        &store,
        &catalog(),
        code_flow_request(common::CLIENT_ID, common::REDIRECT_URI, user_context(common::USER_ID)),
    )
    .await
    .unwrap();

    let mut duplicate = out.ledger.unwrap();
    duplicate.id = "other-id".to_string();
    let err = store.insert_user_authorization(&duplicate).await;
    assert!(matches!(err, Err(StoreError::DuplicateKey(_))));
}

#[tokio::test]
async fn deauthorize_removes_the_consent_record() {
    let store = MemoryStore::new();
    register_redirect_uri(&store, common::CLIENT_ID, common::REDIRECT_URI, &["emails"]).await;

    grant::issue(
        &store,
        &catalog(),
        code_flow_request(common::CLIENT_ID, common::REDIRECT_URI, user_context(common::USER_ID)),
    )
    .await
    .unwrap();

    grant::deauthorize(&store, common::USER_ID, common::CLIENT_ID)
        .await
        .unwrap();
    assert!(store
        .find_user_authorization(common::USER_ID, common::CLIENT_ID)
        .await
        .unwrap()
        .is_none());

    let err = grant::deauthorize(&store, common::USER_ID, common::CLIENT_ID).await;
    assert!(matches!(err, Err(AppError::AuthorizationNotFound)));
}

// ─── Daily counters ─────────────────────────────────────────────────────────

#[tokio::test]
async fn counters_bump_and_keep_their_baseline() {
    let store = MemoryStore::new();
    register_redirect_uri(&store, common::CLIENT_ID, common::REDIRECT_URI, &["emails"]).await;

    let user = UserContext {
        baselines: StatBaselines {
            registered: 41,
            active: 7,
            test_accounts: 0,
        },
        ..user_context(common::USER_ID)
    };
    grant::issue(
        &store,
        &catalog(),
        code_flow_request(common::CLIENT_ID, common::REDIRECT_URI, user.clone()),
    )
    .await
    .unwrap();

    let day = Utc::now().date_naive();
    let registered = store
        .find_client_stat(common::CLIENT_ID, day, StatKind::RegisteredUsers)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(registered.count, 1);
    assert_eq!(registered.previous_count, 41);

    // Re-authorization is activity, not a registration.
    grant::issue(
        &store,
        &catalog(),
        code_flow_request(common::CLIENT_ID, common::REDIRECT_URI, user),
    )
    .await
    .unwrap();

    let registered = store
        .find_client_stat(common::CLIENT_ID, day, StatKind::RegisteredUsers)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(registered.count, 1);

    let active = store
        .find_client_stat(common::CLIENT_ID, day, StatKind::ActiveUsers)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.count, 2);
    // Baseline is from row creation, untouched by the second bump.
    assert_eq!(active.previous_count, 7);
}

#[tokio::test]
async fn late_baseline_does_not_overwrite_the_first() {
    let store = MemoryStore::new();
    stats::bump(&store, common::CLIENT_ID, StatKind::ActiveUsers, 10)
        .await
        .unwrap();
    stats::bump(&store, common::CLIENT_ID, StatKind::ActiveUsers, 999)
        .await
        .unwrap();

    let day = Utc::now().date_naive();
    let row = store
        .find_client_stat(common::CLIENT_ID, day, StatKind::ActiveUsers)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.count, 2);
    assert_eq!(row.previous_count, 10);
}

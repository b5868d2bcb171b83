#![allow(dead_code)]

use identity_service::db::models::{GrantType, RedirectionUri, ResponseType};
use identity_service::oauth::grant::{IssueRequest, StatBaselines, UserContext, UserEntities};
use identity_service::oauth::redirect;
use identity_service::scope::ScopeCatalog;
use identity_service::store::memory::MemoryStore;

pub const CLIENT_ID: &str = "client-1";
pub const USER_ID: &str = "user-1";
pub const REDIRECT_URI: &str = "https://example.com/cb";

pub fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn catalog() -> ScopeCatalog {
    ScopeCatalog::builtin()
}

/// Register a code-flow redirect URI declaring `scope` for the client.
pub async fn register_redirect_uri(
    store: &MemoryStore,
    client_id: &str,
    raw_uri: &str,
    scope: &[&str],
) -> RedirectionUri {
    let uri = redirect::build(
        &catalog(),
        client_id,
        raw_uri,
        ResponseType::Code,
        owned(scope),
        vec![],
    )
    .expect("redirect URI should validate");
    redirect::save(store, &uri).await.expect("save should succeed");
    uri
}

pub fn entities(
    emails: &[&str],
    mobile: &[&str],
    unknown: &[&str],
    addresses: &[&str],
) -> UserEntities {
    UserEntities {
        emails: owned(emails),
        mobile_phone_numbers: owned(mobile),
        landline_phone_numbers: vec![],
        unknown_phone_numbers: owned(unknown),
        addresses: owned(addresses),
    }
}

pub fn user_context(user_id: &str) -> UserContext {
    UserContext {
        user_id: user_id.to_string(),
        entities: entities(&["email-1"], &[], &[], &["addr-1"]),
        is_test_account: false,
        baselines: StatBaselines::default(),
    }
}

pub fn code_flow_request(client_id: &str, redirect_uri: &str, user: UserContext) -> IssueRequest {
    IssueRequest {
        client_id: client_id.to_string(),
        grant_type: GrantType::AuthorizationCode,
        redirect_uri: Some(redirect_uri.to_string()),
        scope: None,
        scope_flags: None,
        user: Some(user),
    }
}

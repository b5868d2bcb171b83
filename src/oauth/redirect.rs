use chrono::Utc;
use url::Url;
use uuid::Uuid;

use crate::db::models::{RedirectionUri, ResponseType};
use crate::error::AppError;
use crate::scope::ScopeCatalog;
use crate::store::{Store, StoreError};

/// Canonicalize a redirect URI before validation and uniqueness checks:
/// drop the port when the host is exactly `localhost`, then strip any
/// trailing slashes. Idempotent.
pub fn normalize(uri: &str) -> String {
    let mut out = uri.to_string();

    if let Ok(mut parsed) = Url::parse(uri) {
        if parsed.host_str() == Some("localhost") && parsed.port().is_some() {
            let _ = parsed.set_port(None);
            out = parsed.to_string();
        }
    }

    out.trim_end_matches('/').to_string()
}

/// Whether the transport behind this URI can keep a client secret.
///
/// True only for http/https URIs pointing somewhere other than localhost;
/// native-app custom schemes, localhost and the out-of-band URNs (and
/// anything unparsable) run without one.
pub fn needs_client_secret(uri: &str) -> bool {
    match Url::parse(uri) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().is_some_and(|h| h != "localhost")
        }
        Err(_) => false,
    }
}

/// A redirection endpoint must be an absolute URI and must not carry a
/// fragment, regardless of response type.
pub fn is_valid_redirection_uri(uri: &str) -> bool {
    match Url::parse(uri) {
        Ok(parsed) => parsed.fragment().is_none(),
        Err(_) => false,
    }
}

/// Build a validated, normalized redirection URI record for a client.
pub fn build(
    catalog: &ScopeCatalog,
    client_id: &str,
    raw_uri: &str,
    response_type: ResponseType,
    scope: Vec<String>,
    scope_flags: Vec<String>,
) -> Result<RedirectionUri, AppError> {
    let uri = normalize(raw_uri);

    if !is_valid_redirection_uri(&uri) {
        return Err(AppError::InvalidRedirectUri);
    }

    // The implicit flow hands the token to the user agent in the redirect;
    // only https is acceptable for that.
    if response_type == ResponseType::Token {
        let scheme_is_https = Url::parse(&uri)
            .map(|u| u.scheme() == "https")
            .unwrap_or(false);
        if !scheme_is_https {
            return Err(AppError::validation(
                "response_type",
                "response_type 'token' requires an https redirect URI",
            ));
        }
    }

    catalog.validate_scope(&scope)?;
    catalog.validate_scope_flags(&scope_flags)?;

    let now = Utc::now().naive_utc();
    Ok(RedirectionUri {
        id: Uuid::new_v4().to_string(),
        client_id: client_id.to_string(),
        needs_client_secret: needs_client_secret(&uri),
        uri,
        response_type,
        scope,
        scope_flags,
        created_at: now,
        updated_at: now,
    })
}

/// Every redirection URI registered for a client, for the developer-facing
/// application view.
pub async fn list(store: &dyn Store, client_id: &str) -> Result<Vec<RedirectionUri>, AppError> {
    Ok(store.list_redirection_uris(client_id).await?)
}

/// Persist a redirection URI. A duplicate (client, normalized URI) pair is
/// surfaced as a per-field validation failure, not a storage fault.
pub async fn save(store: &dyn Store, uri: &RedirectionUri) -> Result<(), AppError> {
    match store.insert_redirection_uri(uri).await {
        Ok(()) => Ok(()),
        Err(StoreError::DuplicateKey(_)) => Err(AppError::validation(
            "redirect_uri",
            "this redirect URI is already registered for the client",
        )),
        Err(e) => Err(e.into()),
    }
}

pub mod authorizations;
pub mod client_stats;
pub mod entity_ids;
pub mod redirect_uris;
pub mod user_authorizations;
pub mod user_statuses;

use crate::store::StoreError;

// MSSQL signals a unique-index violation as 2601 (duplicate index key) or
// 2627 (unique constraint); everything else is a backend fault.
pub(crate) fn map_query_err(err: tiberius::error::Error) -> StoreError {
    if let tiberius::error::Error::Server(ref token) = err {
        if token.code() == 2601 || token.code() == 2627 {
            return StoreError::DuplicateKey(token.message().to_string());
        }
    }
    StoreError::Backend(err.to_string())
}

pub(crate) fn map_pool_err<E: std::fmt::Display>(err: E) -> StoreError {
    StoreError::Backend(err.to_string())
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned + Default>(raw: &str) -> T {
    serde_json::from_str(raw).unwrap_or_default()
}

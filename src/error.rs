use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid redirect URI")]
    InvalidRedirectUri,

    #[error("Invalid response type: {0}")]
    InvalidResponseType(String),

    #[error("Invalid scope")]
    InvalidScope,

    #[error("Invalid scope flags")]
    InvalidScopeFlags,

    #[error("Invalid grant type: {0}")]
    InvalidGrantType(String),

    #[error("Invalid authorization code")]
    InvalidAuthorizationCode,

    #[error("Authorization code expired")]
    AuthorizationCodeExpired,

    #[error("Redirect URI not registered for this client")]
    RedirectUriNotFound,

    #[error("Authorization not found")]
    AuthorizationNotFound,

    #[error("Entity mapping conflict: {0}")]
    EntityMappingConflict(String),

    #[error("Access denied")]
    AccessDenied,

    #[error("Validation failed on '{field}': {message}")]
    Validation { field: &'static str, message: String },

    #[error("Contract violation: {0}")]
    Contract(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            message: message.into(),
        }
    }
}

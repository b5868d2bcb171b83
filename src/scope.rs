use crate::error::AppError;

/// Scope tokens a client may request on a user's profile data.
const USER_SCOPE: &[&str] = &[
    "first_name",
    "last_name",
    "emails",
    "phone_numbers",
    "addresses",
    "picture",
    "locale",
    "timezone",
];

/// Scope tokens granted to the client application itself, not about user data.
const APP_SCOPE: &[&str] = &["app", "app_developer"];

/// Modifiers refining how a scope grant is interpreted.
const SCOPE_FLAGS: &[&str] = &[
    "mobile_phone_number",
    "landline_phone_number",
    "separate_shipping_billing_address",
];

/// Immutable catalogs of valid scope values and scope flags.
///
/// Built once at startup and passed explicitly to whatever validates or
/// reconciles scope; nothing reads these lists through global state.
#[derive(Clone, Debug)]
pub struct ScopeCatalog {
    user_scope: Vec<String>,
    app_scope: Vec<String>,
    scope_flags: Vec<String>,
}

impl ScopeCatalog {
    pub fn builtin() -> Self {
        Self::new(
            USER_SCOPE.iter().map(|s| s.to_string()).collect(),
            APP_SCOPE.iter().map(|s| s.to_string()).collect(),
            SCOPE_FLAGS.iter().map(|s| s.to_string()).collect(),
        )
    }

    pub fn new(user_scope: Vec<String>, app_scope: Vec<String>, scope_flags: Vec<String>) -> Self {
        Self {
            user_scope,
            app_scope,
            scope_flags,
        }
    }

    /// All valid scope tokens: user scope followed by app scope.
    pub fn all_scope(&self) -> impl Iterator<Item = &str> {
        self.user_scope
            .iter()
            .chain(self.app_scope.iter())
            .map(|s| s.as_str())
    }

    pub fn is_user_scope(&self, token: &str) -> bool {
        self.user_scope.iter().any(|s| s == token)
    }

    pub fn is_app_scope(&self, token: &str) -> bool {
        self.app_scope.iter().any(|s| s == token)
    }

    pub fn is_scope_flag(&self, token: &str) -> bool {
        self.scope_flags.iter().any(|s| s == token)
    }

    /// Top-level profile fields a client can see; used to filter change
    /// notifications down to what clients are able to observe.
    pub fn visible_fields(&self) -> &[String] {
        &self.user_scope
    }

    /// Every element of `candidate` must be a known scope token, and the set
    /// must be non-empty.
    pub fn validate_scope(&self, candidate: &[String]) -> Result<(), AppError> {
        if candidate.is_empty() {
            return Err(AppError::validation("scope", "scope must be set"));
        }
        for token in candidate {
            if !self.all_scope().any(|s| s == token) {
                return Err(AppError::validation(
                    "scope",
                    format!("unknown scope value: {token}"),
                ));
            }
        }
        Ok(())
    }

    /// Scope flags are an independent set and may be empty.
    pub fn validate_scope_flags(&self, candidate: &[String]) -> Result<(), AppError> {
        for token in candidate {
            if !self.is_scope_flag(token) {
                return Err(AppError::validation(
                    "scope_flags",
                    format!("unknown scope flag: {token}"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builtin_catalog_partitions_user_and_app_scope() {
        let catalog = ScopeCatalog::builtin();
        assert!(catalog.is_user_scope("emails"));
        assert!(!catalog.is_app_scope("emails"));
        assert!(catalog.is_app_scope("app"));
        assert!(catalog.is_app_scope("app_developer"));
        assert!(!catalog.is_user_scope("app"));
    }

    #[test]
    fn validate_scope_rejects_empty_and_unknown() {
        let catalog = ScopeCatalog::builtin();
        assert!(catalog.validate_scope(&[]).is_err());
        assert!(catalog.validate_scope(&owned(&["emails", "nope"])).is_err());
        assert!(catalog
            .validate_scope(&owned(&["emails", "first_name", "app"]))
            .is_ok());
    }

    #[test]
    fn validate_scope_flags_allows_empty() {
        let catalog = ScopeCatalog::builtin();
        assert!(catalog.validate_scope_flags(&[]).is_ok());
        assert!(catalog
            .validate_scope_flags(&owned(&["mobile_phone_number"]))
            .is_ok());
        assert!(catalog.validate_scope_flags(&owned(&["emails"])).is_err());
    }
}

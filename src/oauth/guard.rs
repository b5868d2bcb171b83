use serde_json::Value;

use crate::db::models::UserAuthorization;
use crate::error::AppError;

/// Everything the guard needs about the mutation, precomputed by the caller.
///
/// `granted_authorizations` must be loaded (across all of the user's
/// authorized clients) before updating an existing user; forgetting to do so
/// is a programming error, not a runtime condition.
#[derive(Clone, Debug, Default)]
pub struct MutationContext {
    pub is_new: bool,
    pub granted_authorizations: Option<Vec<UserAuthorization>>,
}

impl MutationContext {
    pub fn for_new_user() -> Self {
        Self {
            is_new: true,
            granted_authorizations: None,
        }
    }

    pub fn for_existing_user(granted: Vec<UserAuthorization>) -> Self {
        Self {
            is_new: false,
            granted_authorizations: Some(granted),
        }
    }
}

/// May `field` be set to `new_value`?
///
/// A field some authorized client's scope depends on may be changed but not
/// blanked; a field nobody depends on is unrestricted. Account creation is
/// always permitted.
pub fn can_update_field(
    ctx: &MutationContext,
    field: &str,
    new_value: &Value,
) -> Result<bool, AppError> {
    if ctx.is_new {
        return Ok(true);
    }

    let granted = ctx.granted_authorizations.as_ref().ok_or_else(|| {
        AppError::Contract(
            "granted authorizations must be loaded before updating an existing user".to_string(),
        )
    })?;

    let clients_want_field = granted
        .iter()
        .any(|auth| auth.scope.iter().any(|s| s == field));

    Ok(!clients_want_field || !is_empty_value(new_value))
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use crate::db::models::AuthorizedEntities;

    use super::*;

    fn auth_with_scope(scope: &[&str]) -> UserAuthorization {
        let now = Utc::now().naive_utc();
        UserAuthorization {
            id: "ua-1".to_string(),
            user_id: "user-1".to_string(),
            client_id: "client-1".to_string(),
            scope: scope.iter().map(|s| s.to_string()).collect(),
            scope_flags: vec![],
            entities: AuthorizedEntities::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn new_user_may_set_anything() {
        let ctx = MutationContext::for_new_user();
        assert!(can_update_field(&ctx, "first_name", &json!("")).unwrap());
        assert!(can_update_field(&ctx, "emails", &Value::Null).unwrap());
    }

    #[test]
    fn unwanted_field_may_be_blanked() {
        let ctx = MutationContext::for_existing_user(vec![auth_with_scope(&["emails"])]);
        assert!(can_update_field(&ctx, "first_name", &json!("")).unwrap());
        assert!(can_update_field(&ctx, "first_name", &Value::Null).unwrap());
    }

    #[test]
    fn wanted_field_rejects_every_empty_shape() {
        let ctx = MutationContext::for_existing_user(vec![
            auth_with_scope(&["emails"]),
            auth_with_scope(&["first_name", "addresses"]),
        ]);
        for empty in [json!(null), json!(""), json!([]), json!({})] {
            assert!(
                !can_update_field(&ctx, "first_name", &empty).unwrap(),
                "blanking should be rejected for {empty}"
            );
        }
    }

    #[test]
    fn wanted_field_accepts_replacement_values() {
        let ctx = MutationContext::for_existing_user(vec![auth_with_scope(&["first_name"])]);
        assert!(can_update_field(&ctx, "first_name", &json!("Ada")).unwrap());
        assert!(can_update_field(&ctx, "first_name", &json!(["Ada"])).unwrap());
    }

    #[test]
    fn missing_precomputation_fails_loudly() {
        let ctx = MutationContext {
            is_new: false,
            granted_authorizations: None,
        };
        assert!(matches!(
            can_update_field(&ctx, "emails", &json!("x")),
            Err(AppError::Contract(_))
        ));
    }
}

use crate::db::models::{OauthAuthorization, UserAuthorization};
use crate::error::AppError;
use crate::scope::ScopeCatalog;

/// Scope and flags actually active for a new grant.
#[derive(Clone, Debug, PartialEq)]
pub struct Reconciled {
    pub scope: Vec<String>,
    pub scope_flags: Vec<String>,
}

/// Compute the effective scope for a new grant.
///
/// First authorization: the user is consenting to exactly what the client
/// declares, so effective = declared. Re-authorization: the ledger is a
/// consent record, so the active set is the intersection of what the client
/// currently declares and what the user has already consented to; a
/// developer widening the redirect-URI scope never widens a user's grant
/// without a fresh consent. Flags are modifiers and merge instead.
pub fn reconcile(
    catalog: &ScopeCatalog,
    declared_scope: &[String],
    declared_flags: &[String],
    prior: Option<&UserAuthorization>,
) -> Result<Reconciled, AppError> {
    catalog.validate_scope(declared_scope)?;
    catalog.validate_scope_flags(declared_flags)?;

    match prior {
        None => Ok(Reconciled {
            scope: dedup(declared_scope),
            scope_flags: dedup(declared_flags),
        }),
        Some(entry) => {
            let scope: Vec<String> = declared_scope
                .iter()
                .filter(|s| entry.scope.contains(s))
                .cloned()
                .collect();
            if scope.is_empty() {
                return Err(AppError::InvalidScope);
            }

            let mut scope_flags = entry.scope_flags.clone();
            for flag in declared_flags {
                if !scope_flags.contains(flag) {
                    scope_flags.push(flag.clone());
                }
            }

            Ok(Reconciled {
                scope: dedup(&scope),
                scope_flags,
            })
        }
    }
}

/// Fold a grant's effective scope back into the ledger entry. The ledger
/// only ever grows; items the client no longer declares stay as the audit
/// trail of what was once granted.
pub fn merge_into_ledger(entry: &mut UserAuthorization, granted: &Reconciled) {
    for token in &granted.scope {
        if !entry.scope.contains(token) {
            entry.scope.push(token.clone());
        }
    }
    for flag in &granted.scope_flags {
        if !entry.scope_flags.contains(flag) {
            entry.scope_flags.push(flag.clone());
        }
    }
}

/// Whether a grant acts as the client application itself rather than on a
/// user's behalf. Calling this on a grant without a persisted identity or
/// with unset scope is a caller bug and fails loudly.
pub fn has_app_scope(
    catalog: &ScopeCatalog,
    grant: &OauthAuthorization,
) -> Result<bool, AppError> {
    if grant.id.is_empty() {
        return Err(AppError::Contract(
            "has_app_scope called on a grant without a document identity".to_string(),
        ));
    }
    if grant.scope.is_empty() {
        return Err(AppError::Contract(
            "has_app_scope called on a grant with unset scope".to_string(),
        ));
    }
    Ok(grant.scope.iter().any(|s| catalog.is_app_scope(s)))
}

fn dedup(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::db::models::{AuthorizedEntities, GrantType};

    use super::*;

    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn ledger(scope: &[&str], flags: &[&str]) -> UserAuthorization {
        let now = Utc::now().naive_utc();
        UserAuthorization {
            id: "ua-1".to_string(),
            user_id: "user-1".to_string(),
            client_id: "client-1".to_string(),
            scope: owned(scope),
            scope_flags: owned(flags),
            entities: AuthorizedEntities::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn grant(scope: &[&str]) -> OauthAuthorization {
        OauthAuthorization {
            id: "grant-1".to_string(),
            client_id: "client-1".to_string(),
            user_id: Some("user-1".to_string()),
            grant_type: GrantType::AuthorizationCode,
            scope: owned(scope),
            scope_flags: vec![],
            token_hash: "hash".to_string(),
            code: None,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn first_authorization_takes_declared_scope() {
        let catalog = ScopeCatalog::builtin();
        let out = reconcile(&catalog, &owned(&["emails", "emails"]), &[], None).unwrap();
        assert_eq!(out.scope, owned(&["emails"]));
        assert!(out.scope_flags.is_empty());
    }

    #[test]
    fn widened_declaration_does_not_expand_consent() {
        let catalog = ScopeCatalog::builtin();
        let prior = ledger(&["emails"], &[]);
        let out = reconcile(
            &catalog,
            &owned(&["emails", "first_name"]),
            &[],
            Some(&prior),
        )
        .unwrap();
        assert_eq!(out.scope, owned(&["emails"]));
    }

    #[test]
    fn narrowed_declaration_narrows_the_grant() {
        let catalog = ScopeCatalog::builtin();
        let prior = ledger(&["emails", "first_name", "addresses"], &[]);
        let out = reconcile(&catalog, &owned(&["first_name"]), &[], Some(&prior)).unwrap();
        assert_eq!(out.scope, owned(&["first_name"]));
    }

    #[test]
    fn empty_intersection_rejects_the_grant() {
        let catalog = ScopeCatalog::builtin();
        let prior = ledger(&["emails"], &[]);
        let err = reconcile(&catalog, &owned(&["addresses"]), &[], Some(&prior));
        assert!(matches!(err, Err(AppError::InvalidScope)));
    }

    #[test]
    fn flags_merge_across_authorizations() {
        let catalog = ScopeCatalog::builtin();
        let prior = ledger(&["phone_numbers"], &["mobile_phone_number"]);
        let out = reconcile(
            &catalog,
            &owned(&["phone_numbers"]),
            &owned(&["landline_phone_number"]),
            Some(&prior),
        )
        .unwrap();
        assert_eq!(
            out.scope_flags,
            owned(&["mobile_phone_number", "landline_phone_number"])
        );
    }

    #[test]
    fn ledger_merge_keeps_audit_trail() {
        let mut entry = ledger(&["emails", "addresses"], &[]);
        let granted = Reconciled {
            scope: owned(&["emails", "first_name"]),
            scope_flags: vec![],
        };
        merge_into_ledger(&mut entry, &granted);
        assert_eq!(entry.scope, owned(&["emails", "addresses", "first_name"]));
    }

    #[test]
    fn app_scope_detection() {
        let catalog = ScopeCatalog::builtin();
        assert!(!has_app_scope(&catalog, &grant(&["emails", "first_name", "last_name"])).unwrap());
        assert!(has_app_scope(&catalog, &grant(&["app"])).unwrap());
        assert!(has_app_scope(&catalog, &grant(&["emails", "app_developer"])).unwrap());
    }

    #[test]
    fn app_scope_on_unset_scope_is_a_contract_fault() {
        let catalog = ScopeCatalog::builtin();
        assert!(matches!(
            has_app_scope(&catalog, &grant(&[])),
            Err(AppError::Contract(_))
        ));

        let mut no_identity = grant(&["app"]);
        no_identity.id = String::new();
        assert!(matches!(
            has_app_scope(&catalog, &no_identity),
            Err(AppError::Contract(_))
        ));
    }
}

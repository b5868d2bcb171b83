use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Code,
    Token,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Code => "code",
            ResponseType::Token => "token",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "code" => Ok(ResponseType::Code),
            "token" => Ok(ResponseType::Token),
            other => Err(AppError::InvalidResponseType(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    Token,
    Password,
    ClientCredentials,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::Token => "token",
            GrantType::Password => "password",
            GrantType::ClientCredentials => "client_credentials",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "authorization_code" => Ok(GrantType::AuthorizationCode),
            "token" => Ok(GrantType::Token),
            "password" => Ok(GrantType::Password),
            "client_credentials" => Ok(GrantType::ClientCredentials),
            other => Err(AppError::InvalidGrantType(other.to_string())),
        }
    }
}

/// Which entity table a fake ID stands in for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCollection {
    Users,
    Emails,
    MobilePhoneNumbers,
    LandlinePhoneNumbers,
    UnknownPhoneNumbers,
    Addresses,
}

impl EntityCollection {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCollection::Users => "users",
            EntityCollection::Emails => "emails",
            EntityCollection::MobilePhoneNumbers => "mobile_phone_numbers",
            EntityCollection::LandlinePhoneNumbers => "landline_phone_numbers",
            EntityCollection::UnknownPhoneNumbers => "unknown_phone_numbers",
            EntityCollection::Addresses => "addresses",
        }
    }

    /// Phone collections may co-resolve to the same underlying entity: a
    /// number first seen with an undetermined type is tagged
    /// `unknown_phone_numbers` and later co-tagged with its real subtype.
    pub fn is_phone(&self) -> bool {
        matches!(
            self,
            EntityCollection::MobilePhoneNumbers
                | EntityCollection::LandlinePhoneNumbers
                | EntityCollection::UnknownPhoneNumbers
        )
    }

    pub fn compatible_with(&self, other: &EntityCollection) -> bool {
        self == other || (self.is_phone() && other.is_phone())
    }
}

/// A client-registered callback endpoint with its declared scope.
///
/// `uri` is stored normalized; (client_id, uri) is unique.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RedirectionUri {
    pub id: String,
    pub client_id: String,
    pub uri: String,
    pub response_type: ResponseType,
    pub scope: Vec<String>,
    pub scope_flags: Vec<String>,
    pub needs_client_secret: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// The authorization-code sub-object of a grant; present only for the
/// authorization-code flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub value: String,
    pub used: bool,
    pub expires_at: NaiveDateTime,
}

/// One token-issuance record. The scope is an immutable snapshot taken at
/// issuance time; later ledger changes never rewrite it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OauthAuthorization {
    pub id: String,
    pub client_id: String,
    /// Absent for client_credentials grants.
    pub user_id: Option<String>,
    pub grant_type: GrantType,
    pub scope: Vec<String>,
    pub scope_flags: Vec<String>,
    pub token_hash: String,
    pub code: Option<AuthorizationCode>,
    pub created_at: NaiveDateTime,
}

/// Real entity IDs a user has authorized a client to see.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizedEntities {
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub addresses: Vec<String>,
}

/// Cumulative consent record: exactly one row per (user, client), the
/// deduplicated union of everything the user ever granted that client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserAuthorization {
    pub id: String,
    pub user_id: String,
    pub client_id: String,
    pub scope: Vec<String>,
    pub scope_flags: Vec<String>,
    pub entities: AuthorizedEntities,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Mapping from a real document ID to the opaque ID a client sees.
/// Unique on (user_id, client_id, real_id) and immutable once created.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OauthEntityId {
    pub id: String,
    pub user_id: String,
    pub client_id: String,
    pub real_id: String,
    pub fake_id: String,
    pub collections: Vec<EntityCollection>,
    pub is_test_account: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatusKind {
    NewUser,
    ExistingUser,
}

impl UserStatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatusKind::NewUser => "new_user",
            UserStatusKind::ExistingUser => "existing_user",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    New,
    Updated,
    Deleted,
}

/// One pending change on a sub-entity (email, phone number or address).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityChange {
    pub entity_id: String,
    pub status: ChangeStatus,
    pub changed_fields: Vec<String>,
}

/// Per-(user, client) sync state consumed by the webhook dispatcher.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OauthUserStatus {
    pub id: String,
    pub user_id: String,
    pub client_id: String,
    pub status: UserStatusKind,
    pub changed_fields: Vec<String>,
    pub email_changes: Vec<EntityChange>,
    pub phone_number_changes: Vec<EntityChange>,
    pub address_changes: Vec<EntityChange>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    RegisteredUsers,
    ActiveUsers,
    TestAccounts,
}

impl StatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatKind::RegisteredUsers => "registered_users",
            StatKind::ActiveUsers => "active_users",
            StatKind::TestAccounts => "test_accounts",
        }
    }
}

/// Day-bucketed counter row. `previous_count` is the baseline captured when
/// the row is first created and is never overwritten by later increments.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientStat {
    pub client_id: String,
    pub day: NaiveDate,
    pub stat: StatKind,
    pub count: i64,
    pub previous_count: i64,
}

//! Session and user profile artifacts.
//!
//! A login produces a [`Session`] (the bearer token and its expiry) plus
//! companions stored under their own keys: the [`UserProfile`], the active
//! institution and the flattened authorization set.

use campus_console_core::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bearer credential issued by the backend at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque bearer token.
    access_token: String,
    /// When the backend stops honouring the token.
    expires_at: DateTime<Utc>,
    /// The user the token was issued to.
    user_id: UserId,
}

impl Session {
    /// Creates a session record.
    #[must_use]
    pub fn new(access_token: String, expires_at: DateTime<Utc>, user_id: UserId) -> Self {
        Self {
            access_token,
            expires_at,
            user_id,
        }
    }

    /// Returns the bearer token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns when the token expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns the user ID.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns true if the token has already expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Display profile of the logged-in user.
///
/// Roles are shown in the UI only. Feature gating never looks at them; it
/// uses the flattened authorization set instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl UserProfile {
    /// Name shown in the header, falling back to the email address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user_id() -> UserId {
        "u_1".parse().expect("valid id")
    }

    #[test]
    fn session_expiry() {
        let live = Session::new("tok".into(), Utc::now() + Duration::hours(1), user_id());
        assert!(!live.is_expired());

        let stale = Session::new("tok".into(), Utc::now() - Duration::seconds(1), user_id());
        assert!(stale.is_expired());
    }

    #[test]
    fn session_uses_camel_case_on_the_wire() {
        let json = r#"{"accessToken":"abc","expiresAt":"2030-01-01T00:00:00Z","userId":"u_1"}"#;
        let session: Session = serde_json::from_str(json).expect("deserialize");
        assert_eq!(session.access_token(), "abc");
        assert_eq!(session.user_id().as_str(), "u_1");
    }

    #[test]
    fn profile_roles_default_to_empty() {
        let json = r#"{"id":"u_1","name":"Awa Diop","email":"awa@example.org"}"#;
        let profile: UserProfile = serde_json::from_str(json).expect("deserialize");
        assert!(profile.roles.is_empty());
        assert_eq!(profile.display_name(), "Awa Diop");
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let profile = UserProfile {
            id: user_id(),
            name: "  ".into(),
            email: "ops@example.org".into(),
            roles: vec!["admin".into()],
        };
        assert_eq!(profile.display_name(), "ops@example.org");
    }
}

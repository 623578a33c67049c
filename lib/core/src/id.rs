//! Strongly-typed identifiers for backend entities.
//!
//! The institution backend issues its own opaque identifiers. The console
//! never generates them; it only carries them between cookies, URLs and
//! outbound calls, so each ID is a validated string newtype.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Rejects values that would break out of a backend path segment.
fn check_segment(id_type: &'static str, s: &str) -> Result<(), ParseIdError> {
    if s.is_empty() {
        return Err(ParseIdError {
            id_type,
            reason: "identifier is empty".to_string(),
        });
    }
    if let Some(c) = s
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(ParseIdError {
            id_type,
            reason: format!("unexpected character {c:?}"),
        });
    }
    if s == "." || s == ".." {
        return Err(ParseIdError {
            id_type,
            reason: "relative path segment".to_string(),
        });
    }
    Ok(())
}

/// Macro to generate an opaque backend-issued ID wrapper.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Returns the ID as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                check_segment(stringify!($name), s)?;
                Ok(Self(s.to_string()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Identifier of a console user.
    UserId
);

define_id!(
    /// Identifier of an institution (university, institute or ministry body).
    InstitutionId
);

define_id!(
    /// Identifier of a stored document.
    DocumentId
);

define_id!(
    /// Identifier of any other backend resource addressed by path.
    ResourceId
);

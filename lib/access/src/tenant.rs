//! Active institution (tenant) snapshot.
//!
//! Exactly one institution scopes what the console displays. When none is
//! known the snapshot holds a placeholder whose fields are all empty
//! strings, so readers always see the same shape.

use crate::authorization::MatchRule;
use serde::{Deserialize, Serialize};

/// Institution archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstitutionModel {
    /// A public or private university.
    University,
    /// An affiliated training institute.
    Institute,
    /// A ministry-level oversight body.
    Ministry,
}

impl InstitutionModel {
    /// Theme name applied to the shell for this archetype.
    #[must_use]
    pub fn theme(self) -> &'static str {
        match self {
            Self::University => "university",
            Self::Institute => "institute",
            Self::Ministry => "ministry",
        }
    }
}

/// An institution as described by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Institution {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<InstitutionModel>,
}

impl Institution {
    /// The placeholder used when no institution is active.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::default()
    }

    /// Returns true for the placeholder.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.id.is_empty()
    }

    /// Returns true if the institution is of the given archetype.
    #[must_use]
    pub fn is(&self, model: InstitutionModel) -> bool {
        self.model == Some(model)
    }

    /// Returns true if the institution's code or slug carries `tag`.
    ///
    /// Used for per-institution feature flags. Empty fields never match.
    #[must_use]
    pub fn carries(&self, tag: &str, rule: MatchRule) -> bool {
        [self.code.as_str(), self.slug.as_str()]
            .into_iter()
            .filter(|field| !field.is_empty())
            .any(|field| rule.matches(field, tag))
    }

    /// Theme name for the shell.
    #[must_use]
    pub fn theme(&self) -> &'static str {
        self.model.map_or("default", InstitutionModel::theme)
    }
}

/// Client-side holder of the active institution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TenantSnapshot {
    institution: Institution,
}

impl TenantSnapshot {
    /// Builds a snapshot from whatever the session store returned.
    #[must_use]
    pub fn from_stored(institution: Option<Institution>) -> Self {
        Self {
            institution: institution.unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn institution(&self) -> &Institution {
        &self.institution
    }

    /// Installs a new active institution.
    pub fn replace(&mut self, institution: Institution) {
        self.institution = institution;
    }

    /// Resets to the placeholder.
    pub fn reset(&mut self) {
        self.institution = Institution::placeholder();
    }
}

//! Capability strings and the client-side authorization snapshot.
//!
//! The backend flattens a user's permissions into opaque capability
//! strings shaped like `"<section>.<action>"` (for example
//! `"branches.edit"` or `"dashboard.branches.view"`). The console only uses
//! them to decide what to show; the backend enforces the real checks.
//!
//! # Matching
//!
//! A UI tag is granted when any capability *contains* it. The default
//! [`MatchRule::Substring`] reproduces the coarse behaviour the console has
//! always had, where one backend permission can light up several UI
//! affordances. It can false-positive when one tag is a substring of
//! another (`"level"` inside `"levels.view"`), so [`MatchRule::Segment`] is
//! available: the tag must line up with whole dot-separated segments.
//!
//! Under every rule an empty tag matches nothing.

use serde::{Deserialize, Serialize};

/// How a UI tag is tested against capability strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// The tag appears anywhere inside a capability.
    #[default]
    Substring,
    /// The tag's segments equal a contiguous run of a capability's segments.
    Segment,
}

impl MatchRule {
    /// Returns true if `capability` grants `tag` under this rule.
    #[must_use]
    pub fn matches(self, capability: &str, tag: &str) -> bool {
        if tag.is_empty() {
            return false;
        }
        match self {
            Self::Substring => capability.contains(tag),
            Self::Segment => {
                let wanted: Vec<&str> = tag.split('.').collect();
                let have: Vec<&str> = capability.split('.').collect();
                have.windows(wanted.len()).any(|w| w == wanted.as_slice())
            }
        }
    }
}

/// Ordered capability strings as issued upstream.
///
/// Duplicates are kept; order is the backend's.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorizationSet(Vec<String>);

impl AuthorizationSet {
    /// Creates an empty set (hides every gated section).
    #[must_use]
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Returns the raw capability strings.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if any capability grants `tag` under `rule`.
    #[must_use]
    pub fn grants(&self, tag: &str, rule: MatchRule) -> bool {
        self.0.iter().any(|capability| rule.matches(capability, tag))
    }

    /// Returns true if any of `tags` is granted.
    #[must_use]
    pub fn grants_any(&self, tags: &[&str], rule: MatchRule) -> bool {
        tags.iter().any(|tag| self.grants(tag, rule))
    }
}

impl From<Vec<String>> for AuthorizationSet {
    fn from(capabilities: Vec<String>) -> Self {
        Self(capabilities)
    }
}

impl<'a> FromIterator<&'a str> for AuthorizationSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

/// Console sections that can be gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Dashboard,
    Universities,
    Institutes,
    Ipes,
    Branches,
    Levels,
    Classrooms,
    Documents,
    Programs,
    Users,
    Profiles,
    Roles,
}

impl Section {
    /// All sections in catalog order.
    pub const ALL: [Section; 12] = [
        Section::Dashboard,
        Section::Universities,
        Section::Institutes,
        Section::Ipes,
        Section::Branches,
        Section::Levels,
        Section::Classrooms,
        Section::Documents,
        Section::Programs,
        Section::Users,
        Section::Profiles,
        Section::Roles,
    ];

    /// The primary tag for this section.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Universities => "universities",
            Self::Institutes => "institutes",
            Self::Ipes => "ipes",
            Self::Branches => "branches",
            Self::Levels => "levels",
            Self::Classrooms => "classrooms",
            Self::Documents => "documents",
            Self::Programs => "programs",
            Self::Users => "users",
            Self::Profiles => "profiles",
            Self::Roles => "roles",
        }
    }

    /// Tags any one of which makes the section visible.
    ///
    /// Documents are reachable through the dedicated permission or through
    /// branch management, which attaches syllabi to branches.
    #[must_use]
    pub fn required_tags(self) -> &'static [&'static str] {
        match self {
            Self::Dashboard => &["dashboard"],
            Self::Universities => &["universities"],
            Self::Institutes => &["institutes"],
            Self::Ipes => &["ipes"],
            Self::Branches => &["branches"],
            Self::Levels => &["levels"],
            Self::Classrooms => &["classrooms"],
            Self::Documents => &["documents", "branches.edit"],
            Self::Programs => &["programs"],
            Self::Users => &["users"],
            Self::Profiles => &["profiles"],
            Self::Roles => &["roles"],
        }
    }
}

/// State of the client's authorization snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthorizationSnapshot {
    /// Nothing fetched yet.
    #[default]
    Uninitialized,
    /// A set read from the session store.
    Loaded(AuthorizationSet),
    /// Explicitly reset (logout or broken session).
    Empty,
}

impl AuthorizationSnapshot {
    /// Applies the outcome of a fetch.
    ///
    /// A failed fetch yields an empty loaded set rather than an error.
    #[must_use]
    pub fn from_fetch<E: std::fmt::Display>(result: Result<AuthorizationSet, E>) -> Self {
        match result {
            Ok(set) => Self::Loaded(set),
            Err(e) => {
                tracing::warn!(error = %e, "Authorization fetch failed, hiding gated sections");
                Self::Loaded(AuthorizationSet::empty())
            }
        }
    }

    /// Returns the current set; empty unless loaded.
    #[must_use]
    pub fn set(&self) -> &AuthorizationSet {
        static EMPTY: AuthorizationSet = AuthorizationSet(Vec::new());
        match self {
            Self::Loaded(set) => set,
            Self::Uninitialized | Self::Empty => &EMPTY,
        }
    }

    /// Replaces the set with a freshly fetched one.
    pub fn replace(&mut self, set: AuthorizationSet) {
        *self = Self::Loaded(set);
    }

    /// Resets to [`AuthorizationSnapshot::Empty`].
    pub fn clear(&mut self) {
        *self = Self::Empty;
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Returns true if `tag` is granted.
    #[must_use]
    pub fn grants(&self, tag: &str, rule: MatchRule) -> bool {
        self.set().grants(tag, rule)
    }

    /// Returns true if `section` is visible.
    #[must_use]
    pub fn allows(&self, section: Section, rule: MatchRule) -> bool {
        self.set().grants_any(section.required_tags(), rule)
    }
}

//! Navigation composition.
//!
//! The sidebar is a static catalog of [`NavItem`]s filtered against the
//! authorization snapshot on every render. The catalog is small, so nothing
//! is cached between renders.

use crate::authorization::{AuthorizationSet, MatchRule, Section};
use crate::tenant::{Institution, InstitutionModel};
use serde::{Deserialize, Serialize};

/// A node of the navigation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavItem {
    pub label: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavItem>,
    /// Tags any one of which a capability must carry for a leaf to show.
    /// Groups leave it empty and are shown when a child qualifies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_tags: Vec<String>,
    /// Restricts the entry to these institution archetypes when non-empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<InstitutionModel>,
}

impl NavItem {
    /// Creates a leaf entry.
    #[must_use]
    pub fn leaf(label: &str, icon: &str, link: &str, required_tag: &str) -> Self {
        Self {
            label: label.to_string(),
            icon: icon.to_string(),
            link: Some(link.to_string()),
            children: Vec::new(),
            required_tags: vec![required_tag.to_string()],
            models: Vec::new(),
        }
    }

    /// Creates a leaf gated exactly like `section`'s pages.
    #[must_use]
    pub fn section(label: &str, icon: &str, link: &str, section: Section) -> Self {
        Self {
            required_tags: section
                .required_tags()
                .iter()
                .map(|tag| (*tag).to_string())
                .collect(),
            ..Self::leaf(label, icon, link, section.tag())
        }
    }

    /// Creates a group entry.
    #[must_use]
    pub fn group(label: &str, icon: &str, children: Vec<NavItem>) -> Self {
        Self {
            label: label.to_string(),
            icon: icon.to_string(),
            link: None,
            children,
            required_tags: Vec::new(),
            models: Vec::new(),
        }
    }

    /// Restricts the entry to the given archetypes.
    #[must_use]
    pub fn only_for(mut self, models: &[InstitutionModel]) -> Self {
        self.models = models.to_vec();
        self
    }

    #[must_use]
    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }

    fn model_allowed(&self, institution: &Institution) -> bool {
        self.models.is_empty() || self.models.iter().any(|m| institution.is(*m))
    }
}

/// Inputs to a composition pass.
#[derive(Debug, Clone, Copy)]
pub struct NavContext<'a> {
    pub authorizations: &'a AuthorizationSet,
    pub institution: &'a Institution,
    pub rule: MatchRule,
}

/// Returns the visible subset of `catalog`, preserving declaration order.
#[must_use]
pub fn compose(catalog: &[NavItem], ctx: NavContext<'_>) -> Vec<NavItem> {
    catalog
        .iter()
        .filter_map(|item| compose_item(item, ctx))
        .collect()
}

fn compose_item(item: &NavItem, ctx: NavContext<'_>) -> Option<NavItem> {
    if !item.model_allowed(ctx.institution) {
        return None;
    }

    if item.is_group() {
        let children = compose(&item.children, ctx);
        if children.is_empty() {
            return None;
        }
        return Some(NavItem {
            children,
            ..item.clone()
        });
    }

    item.required_tags
        .iter()
        .any(|tag| ctx.authorizations.grants(tag, ctx.rule))
        .then(|| item.clone())
}

/// The console's sidebar catalog.
#[must_use]
pub fn default_catalog() -> Vec<NavItem> {
    use InstitutionModel::{Institute, Ministry, University};

    let leaf = NavItem::section;

    vec![
        leaf("Tableau de bord", "home", "/", Section::Dashboard),
        NavItem::group(
            "Établissements",
            "building",
            vec![
                leaf("Universités", "landmark", "/universities", Section::Universities)
                    .only_for(&[Ministry]),
                leaf("Instituts", "school", "/institutes", Section::Institutes)
                    .only_for(&[Ministry, University]),
                leaf("IPES", "briefcase", "/ipes", Section::Ipes).only_for(&[Ministry]),
            ],
        ),
        NavItem::group(
            "Formation",
            "book",
            vec![
                leaf("Filières", "git-branch", "/branches", Section::Branches),
                leaf("Niveaux", "layers", "/levels", Section::Levels),
                leaf("Salles", "door", "/classrooms", Section::Classrooms)
                    .only_for(&[University, Institute]),
                leaf("Documents", "file", "/documents", Section::Documents),
                leaf("Comparaison", "scale", "/programs/compare", Section::Programs),
            ],
        ),
        NavItem::group(
            "Administration",
            "shield",
            vec![
                leaf("Utilisateurs", "users", "/users", Section::Users),
                leaf("Profils", "id-card", "/profiles", Section::Profiles),
                leaf("Rôles", "key", "/roles", Section::Roles),
            ],
        ),
    ]
}

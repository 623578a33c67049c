//! Identity artifacts and UI gating for campus-console.
//!
//! This crate provides:
//! - Session artifacts (`Session`, `UserProfile`)
//! - Capability matching (`AuthorizationSet`, `MatchRule`, `Section`)
//! - The authorization and tenant snapshots held by the UI
//! - Navigation composition from a static catalog
//! - The client-side reducer with fetch cancellation
//!
//! # Gating Model
//!
//! The backend flattens each user's permissions into capability strings.
//! The console uses them for visibility only:
//!
//! ```
//! use campus_console_access::{
//!     AuthorizationSet, Institution, MatchRule, NavContext, NavItem, compose,
//! };
//!
//! let catalog = vec![NavItem::group(
//!     "Formation",
//!     "book",
//!     vec![
//!         NavItem::leaf("Filières", "git-branch", "/branches", "branches"),
//!         NavItem::leaf("Niveaux", "layers", "/levels", "levels"),
//!     ],
//! )];
//! let authorizations: AuthorizationSet = ["dashboard.branches.view"].into_iter().collect();
//! let institution = Institution::placeholder();
//!
//! let visible = compose(
//!     &catalog,
//!     NavContext {
//!         authorizations: &authorizations,
//!         institution: &institution,
//!         rule: MatchRule::Substring,
//!     },
//! );
//!
//! assert_eq!(visible[0].children.len(), 1);
//! assert_eq!(visible[0].children[0].label, "Filières");
//! ```

pub mod authorization;
pub mod navigation;
pub mod profile;
pub mod store;
pub mod tenant;

// Re-export main types at crate root
pub use authorization::{AuthorizationSet, AuthorizationSnapshot, MatchRule, Section};
pub use navigation::{NavContext, NavItem, compose, default_catalog};
pub use profile::{Session, UserProfile};
pub use store::{Action, ConsoleState, FetchScope, FetchTicket, SessionSnapshot};
pub use tenant::{Institution, InstitutionModel, TenantSnapshot};

//! Core types shared across the campus-console crates.
//!
//! This crate provides the identifiers handed out by the institution
//! backend and the `Result` alias used for layered error context.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{DocumentId, InstitutionId, ParseIdError, ResourceId, UserId};

//! Core domain types and shared logic for the Courier release catalog.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Four-component version parsing and ordering
//! - Taxonomy dimension kinds and input validation
//! - Configuration types

pub mod config;
pub mod dimension;
pub mod error;
pub mod version;

pub use dimension::{DimensionKind, is_valid_app_name, is_valid_version_input};
pub use error::{Error, Result};
pub use version::Version;

/// Date format used for changelog entries (`YYYY-MM-DD`).
pub const CHANGELOG_DATE_FORMAT: &[time::format_description::FormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day]");

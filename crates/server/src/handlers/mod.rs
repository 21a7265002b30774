//! HTTP request handlers.

pub mod auth;
pub mod common;
pub mod dimensions;
pub mod queries;
pub mod releases;

pub use auth::*;
pub use common::*;
pub use dimensions::*;
pub use queries::*;
pub use releases::*;

//! Courier server library.
//!
//! HTTP surface for the release catalog: taxonomy CRUD, artifact uploads,
//! and the update-resolution queries, glued to the metadata store, object
//! storage, response cache, and notification worker.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod routes;
pub mod state;
pub mod validate;

pub use error::{ApiError, ApiResult};
pub use notify::{Notifier, ReleaseNotification};
pub use routes::create_router;
pub use state::AppState;

//! Admin user repository trait.

use crate::error::MetadataResult;
use crate::models::UserRow;
use async_trait::async_trait;

/// Repository for admin users.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Create a new user. Fails with `AlreadyExists` when the username is taken.
    async fn create_user(&self, user: &UserRow) -> MetadataResult<()>;

    /// Look up a user by username.
    async fn get_user_by_username(&self, username: &str) -> MetadataResult<Option<UserRow>>;
}

//! Lookup contracts for users, tokens and permissions.
//!
//! The pipeline never talks to a database directly. Storage engines
//! implement these traits; [`InMemoryStore`](super::memory::InMemoryStore)
//! is the reference implementation.

use async_trait::async_trait;

use crate::auth::principal::{Permissions, User, UserId};
use crate::auth::token::Scope;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find the owner of a live token with the given scope.
    ///
    /// Expired tokens and tokens of another scope must yield
    /// [`StoreError::NotFound`].
    async fn find_user_by_token(&self, scope: Scope, plaintext: &str) -> Result<User, StoreError>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn permissions_for_user(&self, user_id: UserId) -> Result<Permissions, StoreError>;
}

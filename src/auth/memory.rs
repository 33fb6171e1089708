//! In-memory user, token and permission store.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::auth::principal::{PermissionCode, Permissions, User, UserId};
use crate::auth::store::{PermissionStore, StoreError, UserStore};
use crate::auth::token::Scope;
use crate::config::FixtureUser;

/// Lifetime given to fixture tokens.
const FIXTURE_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
struct TokenRecord {
    user_id: UserId,
    expiry: SystemTime,
}

impl TokenRecord {
    fn is_live(&self) -> bool {
        self.expiry > SystemTime::now()
    }
}

/// A thread-safe store backed by concurrent maps.
///
/// Cloning shares the underlying maps.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    users: Arc<DashMap<UserId, User>>,
    tokens: Arc<DashMap<(Scope, String), TokenRecord>>,
    permissions: Arc<DashMap<UserId, Permissions>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store seeded with development fixtures.
    pub fn from_fixtures(fixtures: &[FixtureUser]) -> Self {
        let store = Self::new();
        for fixture in fixtures {
            store.insert_user(User {
                id: fixture.id,
                name: fixture.name.clone(),
                email: fixture.email.clone(),
                activated: fixture.activated,
            });
            if let Some(token) = &fixture.token {
                store.insert_token(Scope::Authentication, token, fixture.id, FIXTURE_TOKEN_TTL);
            }
            for code in &fixture.permissions {
                store.grant(fixture.id, code.as_str().into());
            }
        }
        tracing::info!(users = store.users.len(), "Loaded user fixtures");
        store
    }

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn insert_token(&self, scope: Scope, plaintext: &str, user_id: UserId, ttl: Duration) {
        let expiry = SystemTime::now() + ttl;
        self.tokens
            .insert((scope, plaintext.to_string()), TokenRecord { user_id, expiry });
    }

    /// Insert a token that is already past its expiry.
    pub fn insert_expired_token(&self, scope: Scope, plaintext: &str, user_id: UserId) {
        let expiry = SystemTime::now() - Duration::from_secs(1);
        self.tokens
            .insert((scope, plaintext.to_string()), TokenRecord { user_id, expiry });
    }

    pub fn grant(&self, user_id: UserId, code: PermissionCode) {
        self.permissions.entry(user_id).or_default().insert(code);
    }

    pub fn set_activated(&self, user_id: UserId, activated: bool) {
        if let Some(mut user) = self.users.get_mut(&user_id) {
            user.activated = activated;
        }
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_user_by_token(&self, scope: Scope, plaintext: &str) -> Result<User, StoreError> {
        let record = self
            .tokens
            .get(&(scope, plaintext.to_string()))
            .map(|r| r.value().clone())
            .ok_or(StoreError::NotFound)?;

        if !record.is_live() {
            return Err(StoreError::NotFound);
        }

        self.users
            .get(&record.user_id)
            .map(|r| r.value().clone())
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl PermissionStore for InMemoryStore {
    async fn permissions_for_user(&self, user_id: UserId) -> Result<Permissions, StoreError> {
        Ok(self
            .permissions
            .get(&user_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }
}

//! Identity and authorization subsystem.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <token>
//!     → authenticate.rs (header shape → token shape → UserStore lookup)
//!     → Principal attached to request extensions
//!     → authorize.rs (AccessGate stages per route)
//!     → Handler (extracts Principal)
//! ```
//!
//! # Design Decisions
//! - Storage is behind the `UserStore` / `PermissionStore` traits
//! - Anonymous is a normal principal, rejected only by a gate
//! - Token shape is checked before any lookup

pub mod authenticate;
pub mod authorize;
pub mod memory;
pub mod principal;
pub mod store;
pub mod token;

pub use authenticate::{authenticate_middleware, Authenticator};
pub use authorize::{AccessGate, Requirement, Stage};
pub use memory::InMemoryStore;
pub use principal::{PermissionCode, Permissions, Principal, User, UserId};
pub use store::{PermissionStore, StoreError, UserStore};
pub use token::{is_valid_token_shape, Scope};

//! Users Domain
//!
//! User management for the auth service: user records, their credentials and
//! a transactional outbox of user events.
//!
//! # Features
//!
//! - User CRUD with soft delete
//! - Password hashing with Argon2
//! - Outbox records written in the same transaction as the mutation
//! - Trace context captured on every outbox record
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Service   │  ← Validation, secret derivation, unit of work
//! └──────┬──────┘
//!        │ with_tx(handle)
//! ┌──────▼──────┐     ┌─────────────┐
//! │ Repository  │ ←── │ Transactor  │  ← begin / commit / rollback
//! └──────┬──────┘     └─────────────┘
//!        │
//! ┌──────▼──────┐
//! │  Adapters   │  ← memory (snapshots), postgres (Sea-ORM)
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_users::{memory::InMemoryStore, CreateUser, RequestContext, UserService};
//!
//! # async fn run() -> domain_users::UserResult<()> {
//! let store = InMemoryStore::new();
//! let service = UserService::new(
//!     store.clone(),
//!     store.user_info_repo(),
//!     store.user_secret_repo(),
//!     store.outbox_repo(),
//! );
//!
//! let ctx = RequestContext::new();
//! let input = CreateUser {
//!     login_id: "alice".to_string(),
//!     role: "user".to_string(),
//!     ..Default::default()
//! };
//! let user = service.create_user(&ctx, input, "s3cret").await?;
//! service.delete_user(&ctx, user.id).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod identity;
pub mod memory;
pub mod models;
pub mod outbox;
pub mod postgres;
pub mod repository;
pub mod secret;
pub mod service;
pub mod trace_context;
pub mod tx;

// Re-export commonly used types
pub use config::UsersConfig;
pub use context::RequestContext;
pub use error::{RepoError, RepoResult, UserError, UserResult};
pub use identity::{EntityId, IdentityError};
pub use models::{CreateUser, OutboxRecord, Role, UpdateUser, UserInfo, UserSecret};
pub use repository::{OutboxRepo, UserInfoRepo, UserSecretRepo};
pub use service::UserService;
pub use tx::{Transaction, Transactor, TxHandle, UnitOfWork};

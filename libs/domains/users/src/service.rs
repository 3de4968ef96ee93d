use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::config::UsersConfig;
use crate::context::RequestContext;
use crate::error::{UserError, UserResult};
use crate::identity::EntityId;
use crate::models::{CreateUser, Role, UpdateUser, UserInfo, UserSecret};
use crate::outbox::{user_event, UserEvent};
use crate::repository::{OutboxRepo, UserInfoRepo, UserSecretRepo};
use crate::secret::{Argon2SecretDeriver, SecretDeriver};
use crate::tx::{Transactor, TxHandle, UnitOfWork};

/// User service - handles business logic
///
/// Every mutation runs as one unit of work: the user row, its secret and the
/// outbox record commit together or not at all.
pub struct UserService<T, U, S, O>
where
    T: Transactor,
    U: UserInfoRepo,
    S: UserSecretRepo,
    O: OutboxRepo,
{
    transactor: Arc<T>,
    users: Arc<U>,
    secrets: Arc<S>,
    outbox: Arc<O>,
    deriver: Arc<dyn SecretDeriver>,
    config: UsersConfig,
}

impl<T, U, S, O> Clone for UserService<T, U, S, O>
where
    T: Transactor,
    U: UserInfoRepo,
    S: UserSecretRepo,
    O: OutboxRepo,
{
    fn clone(&self) -> Self {
        Self {
            transactor: Arc::clone(&self.transactor),
            users: Arc::clone(&self.users),
            secrets: Arc::clone(&self.secrets),
            outbox: Arc::clone(&self.outbox),
            deriver: Arc::clone(&self.deriver),
            config: self.config,
        }
    }
}

impl<T, U, S, O> UserService<T, U, S, O>
where
    T: Transactor,
    U: UserInfoRepo,
    S: UserSecretRepo,
    O: OutboxRepo,
{
    pub fn new(transactor: T, users: U, secrets: S, outbox: O) -> Self {
        Self {
            transactor: Arc::new(transactor),
            users: Arc::new(users),
            secrets: Arc::new(secrets),
            outbox: Arc::new(outbox),
            deriver: Arc::new(Argon2SecretDeriver::new()),
            config: UsersConfig::default(),
        }
    }

    pub fn with_secret_deriver(mut self, deriver: Arc<dyn SecretDeriver>) -> Self {
        self.deriver = deriver;
        self
    }

    pub fn with_config(mut self, config: UsersConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &UsersConfig {
        &self.config
    }

    /// List users in creation order; a `limit` of zero means the default page size
    #[instrument(skip(self, ctx))]
    pub async fn list_users(
        &self,
        ctx: &RequestContext,
        offset: u64,
        limit: u64,
    ) -> UserResult<Vec<UserInfo>> {
        ensure_live(ctx)?;

        let limit = if limit == 0 {
            self.config.default_page_size
        } else {
            limit
        };

        Ok(self.users.list(offset, limit).await?)
    }

    /// Create a user together with its secret and a `"created"` event
    #[instrument(skip(self, ctx, input, password), fields(login_id = %input.login_id))]
    pub async fn create_user(
        &self,
        ctx: &RequestContext,
        input: CreateUser,
        password: &str,
    ) -> UserResult<UserInfo> {
        input.validate()?;
        let role: Role = input.role.parse()?;
        if password.is_empty() {
            return Err(UserError::InvalidArgument("Password must not be empty".to_string()));
        }
        ensure_live(ctx)?;

        let passwd_hash = self.deriver.derive(password)?;
        let id = input.id.filter(|id| !id.is_nil()).unwrap_or_else(EntityId::new);
        let now = Utc::now();
        let user = UserInfo {
            id,
            login_id: input.login_id,
            role,
            phone: input.phone,
            email: input.email,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let secret = UserSecret::new(id, passwd_hash, now);
        let span_context = ctx.span_context();

        let created = self
            .run_in_tx(ctx, |tx| async move {
                self.secrets.with_tx(tx.clone()).create(secret).await?;
                let created = self.users.with_tx(tx.clone()).create(user).await?;

                let record = user_event(UserEvent::Created, &created, span_context)?;
                self.outbox.with_tx(tx).create(record).await?;
                Ok::<_, UserError>(created)
            })
            .await?;

        info!(user_id = %created.id, "Created user");
        Ok(created)
    }

    #[instrument(skip(self, ctx), fields(user_id = %id))]
    pub async fn get_user(&self, ctx: &RequestContext, id: EntityId) -> UserResult<UserInfo> {
        ensure_live(ctx)?;
        Ok(self.users.get(id).await?)
    }

    #[instrument(skip(self, ctx))]
    pub async fn get_user_by_login_id(
        &self,
        ctx: &RequestContext,
        login_id: &str,
    ) -> UserResult<UserInfo> {
        ensure_live(ctx)?;
        Ok(self.users.get_by_login_id(login_id).await?)
    }

    /// Replace a user's mutable fields
    ///
    /// The secret is rotated only when `password` is non-empty. An `"updated"`
    /// event is written when [`UsersConfig::emit_update_events`] is set.
    #[instrument(skip(self, ctx, input, password), fields(user_id = %input.id))]
    pub async fn update_user(
        &self,
        ctx: &RequestContext,
        input: UpdateUser,
        password: &str,
    ) -> UserResult<UserInfo> {
        input.validate()?;
        let role: Role = input.role.parse()?;
        ensure_live(ctx)?;

        let new_hash = if password.is_empty() {
            None
        } else {
            Some(self.deriver.derive(password)?)
        };
        let emit_event = self.config.emit_update_events;
        let span_context = ctx.span_context();

        let updated = self
            .run_in_tx(ctx, |tx| async move {
                let users = self.users.with_tx(tx.clone());
                let existing = users.get(input.id).await?;

                let now = Utc::now();
                let updated = users
                    .update(UserInfo {
                        id: existing.id,
                        login_id: input.login_id,
                        role,
                        phone: input.phone,
                        email: input.email,
                        created_at: existing.created_at,
                        updated_at: now,
                        deleted_at: None,
                    })
                    .await?;

                if let Some(passwd_hash) = new_hash {
                    self.secrets
                        .with_tx(tx.clone())
                        .update(UserSecret::new(existing.id, passwd_hash, now))
                        .await?;
                }

                if emit_event {
                    let record = user_event(UserEvent::Updated, &updated, span_context)?;
                    self.outbox.with_tx(tx).create(record).await?;
                }
                Ok::<_, UserError>(updated)
            })
            .await?;

        info!(user_id = %updated.id, "Updated user");
        Ok(updated)
    }

    /// Soft-delete a user and its secret, writing a `"deleted"` event
    #[instrument(skip(self, ctx), fields(user_id = %id))]
    pub async fn delete_user(&self, ctx: &RequestContext, id: EntityId) -> UserResult<()> {
        let span_context = ctx.span_context();

        self.run_in_tx(ctx, |tx| async move {
            let users = self.users.with_tx(tx.clone());
            let mut snapshot = users.get(id).await?;

            users.delete(id).await?;
            self.secrets.with_tx(tx.clone()).delete(id).await?;

            snapshot.deleted_at = Some(Utc::now());
            let record = user_event(UserEvent::Deleted, &snapshot, span_context)?;
            self.outbox.with_tx(tx).create(record).await?;
            Ok::<_, UserError>(())
        })
        .await?;

        info!(user_id = %id, "Deleted user");
        Ok(())
    }

    /// Check `password` against the stored secret of a live user
    #[instrument(skip(self, ctx, password), fields(user_id = %id))]
    pub async fn verify_password(
        &self,
        ctx: &RequestContext,
        id: EntityId,
        password: &str,
    ) -> UserResult<bool> {
        ensure_live(ctx)?;

        self.users.get(id).await?;
        let secret = self.secrets.get(id).await?;
        self.deriver.verify(password, &secret.passwd_hash)
    }

    /// Run `work` inside one transaction
    ///
    /// Commits only when `work` succeeds and the context is still live; every
    /// other outcome rolls back. A context cancelled up front never begins.
    async fn run_in_tx<R, F, Fut>(&self, ctx: &RequestContext, work: F) -> UserResult<R>
    where
        F: FnOnce(TxHandle) -> Fut,
        Fut: Future<Output = UserResult<R>>,
    {
        ensure_live(ctx)?;

        let uow = UnitOfWork::begin(self.transactor.as_ref()).await?;
        let outcome = tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(UserError::Cancelled),
            result = work(uow.handle()) => result,
        };

        match outcome {
            Ok(value) if !ctx.is_cancelled() => {
                uow.commit().await?;
                Ok(value)
            }
            Ok(_) => {
                rollback_quietly(uow).await;
                Err(UserError::Cancelled)
            }
            Err(e) => {
                rollback_quietly(uow).await;
                Err(e)
            }
        }
    }
}

fn ensure_live(ctx: &RequestContext) -> UserResult<()> {
    if ctx.is_cancelled() {
        return Err(UserError::Cancelled);
    }
    Ok(())
}

/// The caller gets the original failure; a rollback error is only logged
async fn rollback_quietly(uow: UnitOfWork) {
    if let Err(e) = uow.rollback().await {
        warn!(error = %e, "Rollback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RepoError, RepoResult};
    use crate::repository::{MockOutboxRepo, MockUserInfoRepo, MockUserSecretRepo};
    use crate::secret::MockSecretDeriver;
    use crate::trace_context::StaticSpanContext;
    use crate::tx::Transaction;
    use async_trait::async_trait;
    use mockall::predicate::eq;
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    const TX_ID: Uuid = Uuid::from_u128(0x0192_0000_0000_7000_8000_0000_0000_0001);

    #[derive(Debug, Default)]
    struct RecordingTx {
        begins: AtomicUsize,
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
    }

    impl RecordingTx {
        fn counts(&self) -> (usize, usize, usize) {
            (
                self.begins.load(Ordering::SeqCst),
                self.commits.load(Ordering::SeqCst),
                self.rollbacks.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait]
    impl Transaction for RecordingTx {
        fn id(&self) -> Uuid {
            TX_ID
        }

        async fn commit(&self) -> RepoResult<()> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn rollback(&self) -> RepoResult<()> {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Hands out the same recorded transaction on every begin
    struct RecordingTransactor(Arc<RecordingTx>);

    #[async_trait]
    impl Transactor for RecordingTransactor {
        async fn begin(&self) -> RepoResult<TxHandle> {
            self.0.begins.fetch_add(1, Ordering::SeqCst);
            Ok(self.0.clone())
        }
    }

    struct Mocks {
        users: MockUserInfoRepo,
        secrets: MockUserSecretRepo,
        outbox: MockOutboxRepo,
        config: UsersConfig,
        ctx: RequestContext,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                users: MockUserInfoRepo::new(),
                secrets: MockUserSecretRepo::new(),
                outbox: MockOutboxRepo::new(),
                config: UsersConfig::default(),
                ctx: RequestContext::new().with_span_injector(Arc::new(StaticSpanContext::new(
                    r#"{"traceparent":"00-test"}"#,
                ))),
            }
        }

        fn scoped_users(&mut self, scoped: MockUserInfoRepo) {
            self.users
                .expect_with_tx()
                .withf(|tx| tx.id() == TX_ID)
                .times(1)
                .return_once(move |_| Box::new(scoped));
        }

        fn scoped_secrets(&mut self, scoped: MockUserSecretRepo) {
            self.secrets
                .expect_with_tx()
                .withf(|tx| tx.id() == TX_ID)
                .times(1)
                .return_once(move |_| Box::new(scoped));
        }

        fn scoped_outbox(&mut self, scoped: MockOutboxRepo) {
            self.outbox
                .expect_with_tx()
                .withf(|tx| tx.id() == TX_ID)
                .times(1)
                .return_once(move |_| Box::new(scoped));
        }

        fn build(
            self,
        ) -> (
            UserService<RecordingTransactor, MockUserInfoRepo, MockUserSecretRepo, MockOutboxRepo>,
            Arc<RecordingTx>,
            RequestContext,
        ) {
            let mut deriver = MockSecretDeriver::new();
            deriver
                .expect_derive()
                .returning(|password| Ok(format!("derived:{password}")));
            deriver
                .expect_verify()
                .returning(|password, hash| Ok(hash == format!("derived:{password}")));

            let tx = Arc::new(RecordingTx::default());
            let service = UserService::new(
                RecordingTransactor(tx.clone()),
                self.users,
                self.secrets,
                self.outbox,
            )
            .with_secret_deriver(Arc::new(deriver))
            .with_config(self.config);
            (service, tx, self.ctx)
        }
    }

    fn create_input(login_id: &str, role: &str) -> CreateUser {
        CreateUser {
            id: None,
            login_id: login_id.to_string(),
            role: role.to_string(),
            phone: "01012345678".to_string(),
            email: format!("{login_id}@example.com"),
        }
    }

    fn stored_user(login_id: &str) -> UserInfo {
        let now = Utc::now();
        UserInfo {
            id: EntityId::new(),
            login_id: login_id.to_string(),
            role: Role::User,
            phone: "01012345678".to_string(),
            email: format!("{login_id}@example.com"),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_list_users_zero_limit_uses_default_page_size() {
        let mut mocks = Mocks::new();
        mocks
            .users
            .expect_list()
            .with(eq(0), eq(50))
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let (service, tx, ctx) = mocks.build();

        let users = service.list_users(&ctx, 0, 0).await.unwrap();

        assert!(users.is_empty());
        assert_eq!(tx.counts(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_list_users_passes_explicit_page() {
        let mut mocks = Mocks::new();
        mocks
            .users
            .expect_list()
            .with(eq(20), eq(10))
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let (service, _, ctx) = mocks.build();

        service.list_users(&ctx, 20, 10).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_users_configured_page_size() {
        let mut mocks = Mocks::new();
        mocks.config = UsersConfig::default().with_default_page_size(5);
        mocks
            .users
            .expect_list()
            .with(eq(0), eq(5))
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let (service, _, ctx) = mocks.build();

        service.list_users(&ctx, 0, 0).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_users_server_error() {
        let mut mocks = Mocks::new();
        mocks
            .users
            .expect_list()
            .returning(|_, _| Err(RepoError::ServerError("connection refused".into())));
        let (service, _, ctx) = mocks.build();

        let result = service.list_users(&ctx, 0, 0).await;
        assert!(matches!(result, Err(UserError::RepoServerError(_))));
    }

    #[tokio::test]
    async fn test_create_user_commits_user_secret_and_event() {
        let mut mocks = Mocks::new();

        let mut scoped_secrets = MockUserSecretRepo::new();
        scoped_secrets
            .expect_create()
            .withf(|secret| secret.passwd_hash == "derived:hunter2")
            .times(1)
            .returning(|_| Ok(()));
        mocks.scoped_secrets(scoped_secrets);

        let mut scoped_users = MockUserInfoRepo::new();
        scoped_users.expect_create().times(1).returning(Ok);
        mocks.scoped_users(scoped_users);

        let mut scoped_outbox = MockOutboxRepo::new();
        scoped_outbox
            .expect_create()
            .withf(|record| {
                let snapshot: UserInfo = serde_json::from_str(&record.payload).unwrap();
                record.event_type == "created"
                    && record.aggregate_type == "user"
                    && record.aggregate_id == snapshot.id.to_string()
                    && record.span_context == r#"{"traceparent":"00-test"}"#
            })
            .times(1)
            .returning(|_| Ok(()));
        mocks.scoped_outbox(scoped_outbox);

        let (service, tx, ctx) = mocks.build();
        let created = service
            .create_user(&ctx, create_input("alice", "admin"), "hunter2")
            .await
            .unwrap();

        assert_eq!(created.login_id, "alice");
        assert_eq!(created.role, Role::Admin);
        assert!(!created.id.is_nil());
        assert_eq!(tx.counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_create_user_keeps_caller_id() {
        let id = EntityId::parse("aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa").unwrap();
        let mut mocks = Mocks::new();

        let mut scoped_secrets = MockUserSecretRepo::new();
        scoped_secrets
            .expect_create()
            .withf(move |secret| secret.id == id)
            .returning(|_| Ok(()));
        mocks.scoped_secrets(scoped_secrets);

        let mut scoped_users = MockUserInfoRepo::new();
        scoped_users
            .expect_create()
            .withf(move |user| user.id == id)
            .returning(Ok);
        mocks.scoped_users(scoped_users);

        let mut scoped_outbox = MockOutboxRepo::new();
        scoped_outbox
            .expect_create()
            .withf(|record| record.aggregate_id == "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa")
            .returning(|_| Ok(()));
        mocks.scoped_outbox(scoped_outbox);

        let (service, _, ctx) = mocks.build();
        let input = CreateUser {
            id: Some(id),
            ..create_input("bob", "user")
        };

        assert_eq!(service.create_user(&ctx, input, "pw").await.unwrap().id, id);
    }

    #[tokio::test]
    async fn test_create_user_unknown_role_writes_nothing() {
        let (service, tx, ctx) = Mocks::new().build();

        let result = service.create_user(&ctx, create_input("carol", "superuser"), "pw").await;

        assert!(matches!(result, Err(UserError::InvalidArgument(_))));
        assert_eq!(tx.counts(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_create_user_rejects_bad_lengths_and_empty_password() {
        let (service, tx, ctx) = Mocks::new().build();

        let long_login = service
            .create_user(&ctx, create_input(&"x".repeat(21), "user"), "pw")
            .await;
        assert!(matches!(long_login, Err(UserError::InvalidArgument(_))));

        let no_password = service.create_user(&ctx, create_input("dave", "user"), "").await;
        assert!(matches!(no_password, Err(UserError::InvalidArgument(_))));

        assert_eq!(tx.counts(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_create_user_outbox_failure_rolls_back() {
        let mut mocks = Mocks::new();

        let mut scoped_secrets = MockUserSecretRepo::new();
        scoped_secrets.expect_create().returning(|_| Ok(()));
        mocks.scoped_secrets(scoped_secrets);

        let mut scoped_users = MockUserInfoRepo::new();
        scoped_users.expect_create().returning(Ok);
        mocks.scoped_users(scoped_users);

        let mut scoped_outbox = MockOutboxRepo::new();
        scoped_outbox
            .expect_create()
            .returning(|_| Err(RepoError::ServerError("disk full".into())));
        mocks.scoped_outbox(scoped_outbox);

        let (service, tx, ctx) = mocks.build();
        let result = service.create_user(&ctx, create_input("erin", "user"), "pw").await;

        assert_eq!(result, Err(UserError::RepoServerError("disk full".into())));
        assert_eq!(tx.counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_create_user_login_conflict() {
        let mut mocks = Mocks::new();

        let mut scoped_secrets = MockUserSecretRepo::new();
        scoped_secrets.expect_create().returning(|_| Ok(()));
        mocks.scoped_secrets(scoped_secrets);

        let mut scoped_users = MockUserInfoRepo::new();
        scoped_users
            .expect_create()
            .returning(|_| Err(RepoError::Conflict("login_id".into())));
        mocks.scoped_users(scoped_users);

        let (service, tx, ctx) = mocks.build();
        let result = service.create_user(&ctx, create_input("frank", "user"), "pw").await;

        assert_eq!(result, Err(UserError::RepoConflict("login_id".into())));
        assert_eq!(tx.counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let mut mocks = Mocks::new();
        mocks.users.expect_get().returning(|_| Err(RepoError::NotFound));
        let (service, _, ctx) = mocks.build();

        let result = service.get_user(&ctx, EntityId::new()).await;
        assert_eq!(result, Err(UserError::RepoNotFound));
    }

    #[tokio::test]
    async fn test_get_user_by_login_id() {
        let user = stored_user("grace");
        let expected = user.clone();
        let mut mocks = Mocks::new();
        mocks
            .users
            .expect_get_by_login_id()
            .withf(|login_id| login_id.to_string() == "grace")
            .returning(move |_| Ok(user.clone()));
        let (service, _, ctx) = mocks.build();

        assert_eq!(service.get_user_by_login_id(&ctx, "grace").await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_delete_user_writes_one_deleted_event() {
        let user = stored_user("heidi");
        let id = user.id;
        let mut mocks = Mocks::new();

        let mut scoped_users = MockUserInfoRepo::new();
        scoped_users
            .expect_get()
            .with(eq(id))
            .times(1)
            .returning(move |_| Ok(user.clone()));
        scoped_users.expect_delete().with(eq(id)).times(1).returning(|_| Ok(()));
        mocks.scoped_users(scoped_users);

        let mut scoped_secrets = MockUserSecretRepo::new();
        scoped_secrets.expect_delete().with(eq(id)).times(1).returning(|_| Ok(()));
        mocks.scoped_secrets(scoped_secrets);

        let mut scoped_outbox = MockOutboxRepo::new();
        scoped_outbox
            .expect_create()
            .withf(move |record| {
                let snapshot: UserInfo = serde_json::from_str(&record.payload).unwrap();
                record.event_type == "deleted"
                    && record.aggregate_id == id.to_string()
                    && snapshot.deleted_at.is_some()
            })
            .times(1)
            .returning(|_| Ok(()));
        mocks.scoped_outbox(scoped_outbox);

        let (service, tx, ctx) = mocks.build();
        service.delete_user(&ctx, id).await.unwrap();

        assert_eq!(tx.counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_delete_missing_user_rolls_back_without_event() {
        let mut mocks = Mocks::new();

        let mut scoped_users = MockUserInfoRepo::new();
        scoped_users.expect_get().returning(|_| Err(RepoError::NotFound));
        mocks.scoped_users(scoped_users);

        let (service, tx, ctx) = mocks.build();
        let result = service.delete_user(&ctx, EntityId::new()).await;

        assert_eq!(result, Err(UserError::RepoNotFound));
        assert_eq!(tx.counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_delete_user_outbox_failure_rolls_back() {
        let user = stored_user("ivan");
        let id = user.id;
        let mut mocks = Mocks::new();

        let mut scoped_users = MockUserInfoRepo::new();
        scoped_users.expect_get().returning(move |_| Ok(user.clone()));
        scoped_users.expect_delete().returning(|_| Ok(()));
        mocks.scoped_users(scoped_users);

        let mut scoped_secrets = MockUserSecretRepo::new();
        scoped_secrets.expect_delete().returning(|_| Ok(()));
        mocks.scoped_secrets(scoped_secrets);

        let mut scoped_outbox = MockOutboxRepo::new();
        scoped_outbox
            .expect_create()
            .returning(|_| Err(RepoError::ServerError("timeout".into())));
        mocks.scoped_outbox(scoped_outbox);

        let (service, tx, ctx) = mocks.build();
        let result = service.delete_user(&ctx, id).await;

        assert!(matches!(result, Err(UserError::RepoServerError(_))));
        assert_eq!(tx.counts(), (1, 0, 1));
    }

    fn update_input(user: &UserInfo) -> UpdateUser {
        UpdateUser {
            id: user.id,
            login_id: user.login_id.clone(),
            role: "admin".to_string(),
            phone: "01099998888".to_string(),
            email: user.email.clone(),
        }
    }

    #[tokio::test]
    async fn test_update_user_without_password_or_event() {
        let user = stored_user("judy");
        let input = update_input(&user);
        let created_at = user.created_at;
        let mut mocks = Mocks::new();

        let mut scoped_users = MockUserInfoRepo::new();
        scoped_users.expect_get().returning(move |_| Ok(user.clone()));
        scoped_users
            .expect_update()
            .withf(move |next| next.created_at == created_at && next.role == Role::Admin)
            .times(1)
            .returning(Ok);
        mocks.scoped_users(scoped_users);

        let (service, tx, ctx) = mocks.build();
        let updated = service.update_user(&ctx, input, "").await.unwrap();

        assert_eq!(updated.phone, "01099998888");
        assert_eq!(updated.created_at, created_at);
        assert_eq!(tx.counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_update_user_rotates_secret_and_emits_when_enabled() {
        let user = stored_user("ken");
        let id = user.id;
        let input = update_input(&user);
        let mut mocks = Mocks::new();
        mocks.config = UsersConfig::default().with_update_events(true);

        let mut scoped_users = MockUserInfoRepo::new();
        scoped_users.expect_get().returning(move |_| Ok(user.clone()));
        scoped_users.expect_update().returning(Ok);
        mocks.scoped_users(scoped_users);

        let mut scoped_secrets = MockUserSecretRepo::new();
        scoped_secrets
            .expect_update()
            .withf(move |secret| secret.id == id && secret.passwd_hash == "derived:new-pass")
            .times(1)
            .returning(|_| Ok(()));
        mocks.scoped_secrets(scoped_secrets);

        let mut scoped_outbox = MockOutboxRepo::new();
        scoped_outbox
            .expect_create()
            .withf(move |record| {
                record.event_type == "updated" && record.aggregate_id == id.to_string()
            })
            .times(1)
            .returning(|_| Ok(()));
        mocks.scoped_outbox(scoped_outbox);

        let (service, tx, ctx) = mocks.build();
        service.update_user(&ctx, input, "new-pass").await.unwrap();

        assert_eq!(tx.counts(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let mut mocks = Mocks::new();

        let mut scoped_users = MockUserInfoRepo::new();
        scoped_users.expect_get().returning(|_| Err(RepoError::NotFound));
        mocks.scoped_users(scoped_users);

        let (service, tx, ctx) = mocks.build();
        let result = service.update_user(&ctx, update_input(&stored_user("leo")), "").await;

        assert_eq!(result, Err(UserError::RepoNotFound));
        assert_eq!(tx.counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_cancelled_context_never_begins() {
        let (service, tx, ctx) = Mocks::new().build();
        ctx.cancellation_token().cancel();

        let create = service.create_user(&ctx, create_input("mallory", "user"), "pw").await;
        let delete = service.delete_user(&ctx, EntityId::new()).await;
        let list = service.list_users(&ctx, 0, 0).await;

        assert_eq!(create, Err(UserError::Cancelled));
        assert_eq!(delete, Err(UserError::Cancelled));
        assert!(matches!(list, Err(UserError::Cancelled)));
        assert_eq!(tx.counts(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_cancellation_during_unit_of_work_rolls_back() {
        let user = stored_user("niaj");
        let id = user.id;
        let mut mocks = Mocks::new();
        let token = mocks.ctx.cancellation_token().clone();

        let mut scoped_users = MockUserInfoRepo::new();
        scoped_users.expect_get().returning(move |_| {
            token.cancel();
            Ok(user.clone())
        });
        scoped_users.expect_delete().returning(|_| Ok(()));
        mocks.scoped_users(scoped_users);

        // The mocks finish without yielding, so the work runs to completion and
        // the cancellation is caught before commit
        let mut scoped_secrets = MockUserSecretRepo::new();
        scoped_secrets.expect_delete().returning(|_| Ok(()));
        mocks.scoped_secrets(scoped_secrets);

        let mut scoped_outbox = MockOutboxRepo::new();
        scoped_outbox.expect_create().returning(|_| Ok(()));
        mocks.scoped_outbox(scoped_outbox);

        let (service, tx, ctx) = mocks.build();
        let result = service.delete_user(&ctx, id).await;

        assert_eq!(result, Err(UserError::Cancelled));
        assert_eq!(tx.counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_verify_password() {
        let user = stored_user("olivia");
        let id = user.id;
        let mut mocks = Mocks::new();
        mocks.users.expect_get().returning(move |_| Ok(user.clone()));
        mocks
            .secrets
            .expect_get()
            .returning(move |_| Ok(UserSecret::new(id, "derived:open-sesame".into(), Utc::now())));
        let (service, tx, ctx) = mocks.build();

        assert!(service.verify_password(&ctx, id, "open-sesame").await.unwrap());
        assert!(!service.verify_password(&ctx, id, "wrong").await.unwrap());
        assert_eq!(tx.counts(), (0, 0, 0));
    }
}

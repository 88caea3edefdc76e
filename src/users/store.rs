use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use super::model::{NewUser, User, UserChanges};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique column (account, email, student_no) already holds the value.
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Read/write contract of the credential store.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: u64) -> anyhow::Result<Option<User>>;
    async fn find_by_account(&self, account: &str) -> anyhow::Result<Option<User>>;
    /// First user whose account, student number or email matches.
    async fn find_by_identity(
        &self,
        account: &str,
        student_no: &str,
        email: &str,
    ) -> anyhow::Result<Option<User>>;
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn update_last_login(&self, id: u64, at: OffsetDateTime) -> anyhow::Result<()>;

    async fn list(&self) -> anyhow::Result<Vec<User>>;
    /// `Ok(None)` when no user has this id.
    async fn update(&self, id: u64, changes: UserChanges) -> Result<Option<User>, StoreError>;
    async fn delete(&self, id: u64) -> anyhow::Result<()>;
    async fn ping(&self) -> anyhow::Result<()>;
}

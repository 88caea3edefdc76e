use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::model::{NewUser, User, UserChanges};
use super::store::{StoreError, UserStore};

/// In-process store with the same unique columns as the `users` table.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<Inner>,
    fail_last_login: bool,
    fail_ping: bool,
    blind_identity_lookup: bool,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    users: Vec<User>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose `update_last_login` always errors.
    pub fn failing_last_login() -> Self {
        Self {
            fail_last_login: true,
            ..Self::default()
        }
    }

    /// Store whose `ping` always errors.
    pub fn failing_ping() -> Self {
        Self {
            fail_ping: true,
            ..Self::default()
        }
    }

    /// Store whose `find_by_identity` never finds anything, so only the
    /// unique columns checked in `create` stop a duplicate.
    pub fn blind_identity_lookup() -> Self {
        Self {
            blind_identity_lookup: true,
            ..Self::default()
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn clashes(existing: &User, account: &str, email: &str, student_no: Option<&str>) -> bool {
    existing.account == account
        || existing.email == email
        || (student_no.is_some() && existing.student_no.as_deref() == student_no)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: u64) -> anyhow::Result<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_account(&self, account: &str) -> anyhow::Result<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.account == account).cloned())
    }

    async fn find_by_identity(
        &self,
        account: &str,
        student_no: &str,
        email: &str,
    ) -> anyhow::Result<Option<User>> {
        if self.blind_identity_lookup {
            return Ok(None);
        }
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| clashes(u, account, email, Some(student_no)))
            .cloned())
    }

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut inner = self.lock();
        if inner
            .users
            .iter()
            .any(|u| clashes(u, &new.account, &new.email, new.student_no.as_deref()))
        {
            return Err(StoreError::UniqueViolation);
        }
        inner.next_id += 1;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: inner.next_id,
            account: new.account,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            name: new.name,
            student_no: new.student_no,
            role: new.role,
            status: new.status,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn update_last_login(&self, id: u64, at: OffsetDateTime) -> anyhow::Result<()> {
        if self.fail_last_login {
            anyhow::bail!("last_login_at update refused");
        }
        if let Some(user) = self.lock().users.iter_mut().find(|u| u.id == id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.lock().users.clone())
    }

    async fn update(&self, id: u64, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let mut inner = self.lock();
        if let Some(email) = &changes.email {
            if inner.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::UniqueViolation);
            }
        }
        let Some(user) = inner.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(status) = changes.status {
            user.status = status;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: u64) -> anyhow::Result<()> {
        self.lock().users.retain(|u| u.id != id);
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        if self.fail_ping {
            anyhow::bail!("store unreachable");
        }
        Ok(())
    }
}

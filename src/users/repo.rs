use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::model::{NewUser, User, UserChanges, UserRow};
use super::store::{StoreError, UserStore};

const UNIQUE_VIOLATION: &str = "23505";

/// Postgres-backed credential store.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn classify(err: sqlx::Error, what: &'static str) -> StoreError {
    match err {
        sqlx::Error::Database(db_err)
            if db_err.code().map(|c| c.to_string()).as_deref() == Some(UNIQUE_VIOLATION) =>
        {
            StoreError::UniqueViolation
        }
        other => StoreError::Other(anyhow::Error::new(other).context(what)),
    }
}

fn to_user(row: Option<UserRow>) -> anyhow::Result<Option<User>> {
    Ok(row.map(User::try_from).transpose()?)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: u64) -> anyhow::Result<Option<User>> {
        let Ok(id) = i64::try_from(id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, account, username, email, password_hash, name, student_no,
                   role, status, last_login_at, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        to_user(row)
    }

    async fn find_by_account(&self, account: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, account, username, email, password_hash, name, student_no,
                   role, status, last_login_at, created_at, updated_at
            FROM users
            WHERE account = $1
            "#,
        )
        .bind(account)
        .fetch_optional(&self.db)
        .await
        .context("find user by account")?;
        to_user(row)
    }

    async fn find_by_identity(
        &self,
        account: &str,
        student_no: &str,
        email: &str,
    ) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, account, username, email, password_hash, name, student_no,
                   role, status, last_login_at, created_at, updated_at
            FROM users
            WHERE account = $1 OR student_no = $2 OR email = $3
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(account)
        .bind(student_no)
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by identity")?;
        to_user(row)
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (account, username, email, password_hash, name, student_no, role, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, account, username, email, password_hash, name, student_no,
                      role, status, last_login_at, created_at, updated_at
            "#,
        )
        .bind(&user.account)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.student_no.as_deref())
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| classify(e, "insert user"))?;
        Ok(User::try_from(row).map_err(anyhow::Error::from)?)
    }

    async fn update_last_login(&self, id: u64, at: OffsetDateTime) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(i64::try_from(id).context("user id out of range")?)
            .bind(at)
            .execute(&self.db)
            .await
            .context("update last_login_at")?;
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, account, username, email, password_hash, name, student_no,
                   role, status, last_login_at, created_at, updated_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn update(&self, id: u64, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let Ok(id) = i64::try_from(id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
               SET email = COALESCE($2, email),
                   password_hash = COALESCE($3, password_hash),
                   role = COALESCE($4, role),
                   status = COALESCE($5, status),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, account, username, email, password_hash, name, student_no,
                      role, status, last_login_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(changes.role.map(|r| r.as_str()))
        .bind(changes.status.map(|s| s.as_str()))
        .fetch_optional(&self.db)
        .await
        .map_err(|e| classify(e, "update user"))?;
        Ok(to_user(row)?)
    }

    async fn delete(&self, id: u64) -> anyhow::Result<()> {
        let Ok(id) = i64::try_from(id) else {
            return Ok(());
        };
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.db)
            .await
            .context("ping database")?;
        Ok(())
    }
}

//! Login, registration and current-user lookup.
//!
//! Each function is one request's whole transition; nothing is kept between
//! calls beyond what the store persists.

use lazy_static::lazy_static;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest},
        password::{Argon2Hasher, PasswordHasher},
        token::TokenKeys,
    },
    error::{AppError, AppResult},
    users::{
        model::{NewUser, Role, Status, User},
        store::{StoreError, UserStore},
    },
};

const REGISTER_CONFLICT: &str = "account, student number or email already exists";

lazy_static! {
    /// Stored-hash stand-in checked against when the account does not exist,
    /// so both login failures pay for one argon2 verify.
    static ref DUMMY_HASH: String = Argon2Hasher
        .hash("campus-auth-unknown-account")
        .unwrap_or_default();
}

/// Checks credentials and issues a token. Unknown accounts and wrong
/// passwords produce the same error.
pub async fn login(
    store: &dyn UserStore,
    hasher: &dyn PasswordHasher,
    keys: &TokenKeys,
    req: &LoginRequest,
) -> AppResult<String> {
    let Some(user) = store.find_by_account(&req.account).await? else {
        let _ = hasher.verify(&req.password, &DUMMY_HASH);
        warn!(account = %req.account, "login unknown account");
        return Err(AppError::InvalidCredentials);
    };

    match hasher.verify(&req.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            warn!(user_id = user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }
        Err(e) => {
            error!(error = %e, user_id = user.id, "stored password hash unreadable");
            return Err(AppError::InvalidCredentials);
        }
    }

    if let Err(e) = store
        .update_last_login(user.id, OffsetDateTime::now_utc())
        .await
    {
        warn!(error = %e, user_id = user.id, "failed to record last login");
    }

    info!(user_id = user.id, "user logged in");
    Ok(keys.issue(user.id))
}

/// Account is the student number; email is a placeholder derived from it.
pub fn derive_identity(student_no: &str) -> (String, String) {
    let account = student_no.to_string();
    let email = format!("{account}@local");
    (account, email)
}

pub async fn register(
    store: &dyn UserStore,
    hasher: &dyn PasswordHasher,
    req: &RegisterRequest,
) -> AppResult<User> {
    let (account, email) = derive_identity(&req.student_no);

    if store
        .find_by_identity(&account, &req.student_no, &email)
        .await?
        .is_some()
    {
        warn!(%account, "register conflict");
        return Err(AppError::Conflict(REGISTER_CONFLICT));
    }

    let password_hash = hasher.hash(&req.password)?;
    let new = NewUser {
        account,
        username: req.username.clone(),
        email,
        password_hash,
        name: req.name.clone(),
        student_no: Some(req.student_no.clone()),
        role: Role::Student,
        status: Status::Active,
    };

    match store.create(new).await {
        Ok(user) => {
            info!(user_id = user.id, account = %user.account, "user registered");
            Ok(user)
        }
        Err(StoreError::UniqueViolation) => {
            warn!(student_no = %req.student_no, "register lost uniqueness race");
            Err(AppError::Conflict(REGISTER_CONFLICT))
        }
        Err(StoreError::Other(e)) => Err(AppError::Internal(e)),
    }
}

/// Resolves an `Authorization` header value to a user id.
pub fn authenticate(keys: &TokenKeys, header: Option<&str>) -> AppResult<u64> {
    let token = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::MissingToken)?;
    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "rejected token");
        AppError::from(e)
    })?;
    Ok(claims.user_id)
}

pub async fn current_user(store: &dyn UserStore, user_id: u64) -> AppResult<User> {
    store.find_by_id(user_id).await?.ok_or_else(|| {
        warn!(user_id, "token subject no longer exists");
        AppError::UnknownUser
    })
}

pub async fn me(store: &dyn UserStore, keys: &TokenKeys, header: Option<&str>) -> AppResult<User> {
    let user_id = authenticate(keys, header)?;
    current_user(store, user_id).await
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::auth::{password::Argon2Hasher, token};
    use crate::users::memory::MemoryUserStore;

    const SECRET: &[u8] = b"flow-secret";

    fn keys() -> TokenKeys {
        TokenKeys::new(SECRET, None)
    }

    fn register_req(student_no: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Alice".into(),
            student_no: student_no.into(),
            username: "alice".into(),
            password: password.into(),
        }
    }

    fn login_req(account: &str, password: &str) -> LoginRequest {
        LoginRequest {
            account: account.into(),
            password: password.into(),
        }
    }

    /// Argon2 underneath, counting `verify` calls.
    #[derive(Default)]
    struct CountingHasher {
        verifies: AtomicUsize,
    }

    impl PasswordHasher for CountingHasher {
        fn hash(&self, plain: &str) -> anyhow::Result<String> {
            Argon2Hasher.hash(plain)
        }

        fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
            self.verifies.fetch_add(1, Ordering::SeqCst);
            Argon2Hasher.verify(plain, hash)
        }
    }

    #[tokio::test]
    async fn register_derives_identity_and_defaults() {
        let store = MemoryUserStore::new();
        let user = register(&store, &Argon2Hasher, &register_req("20230001", "hunter22"))
            .await
            .unwrap();
        assert_eq!(user.account, "20230001");
        assert_eq!(user.email, "20230001@local");
        assert_eq!(user.student_no.as_deref(), Some("20230001"));
        assert_eq!(user.role, Role::Student);
        assert_eq!(user.status, Status::Active);
        assert_ne!(user.password_hash, "hunter22");
    }

    #[tokio::test]
    async fn register_twice_is_conflict() {
        let store = MemoryUserStore::new();
        register(&store, &Argon2Hasher, &register_req("1", "hunter22")).await.unwrap();
        let err = register(&store, &Argon2Hasher, &register_req("1", "other-pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(!err.to_string().contains('1'));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_registers_with_same_student_no_yield_one_conflict() {
        let store = Arc::new(MemoryUserStore::new());
        let (a, b) = tokio::join!(
            {
                let store = store.clone();
                tokio::spawn(async move {
                    register(&*store, &Argon2Hasher, &register_req("42", "first-pw")).await
                })
            },
            {
                let store = store.clone();
                tokio::spawn(async move {
                    register(&*store, &Argon2Hasher, &register_req("42", "second-pw")).await
                })
            }
        );
        let results = [a.unwrap(), b.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(AppError::Conflict(_))))
                .count(),
            1
        );
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_that_slips_past_lookup_is_conflict_from_store() {
        let store = MemoryUserStore::blind_identity_lookup();
        register(&store, &Argon2Hasher, &register_req("42", "first-pw")).await.unwrap();
        let err = register(&store, &Argon2Hasher, &register_req("42", "second-pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(REGISTER_CONFLICT)));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn login_issues_token_for_registered_user() {
        let store = MemoryUserStore::new();
        let user = register(&store, &Argon2Hasher, &register_req("7", "hunter22")).await.unwrap();

        let token = login(&store, &Argon2Hasher, &keys(), &login_req("7", "hunter22"))
            .await
            .unwrap();
        assert_eq!(token::decode(&token, SECRET).unwrap().user_id, user.id);

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.last_login_at.is_some());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_account_look_identical() {
        let store = MemoryUserStore::new();
        register(&store, &Argon2Hasher, &register_req("7", "hunter22")).await.unwrap();

        let wrong = login(&store, &Argon2Hasher, &keys(), &login_req("7", "nope-nope"))
            .await
            .unwrap_err();
        let unknown = login(&store, &Argon2Hasher, &keys(), &login_req("8", "hunter22"))
            .await
            .unwrap_err();
        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn unknown_account_still_runs_password_verify() {
        let store = MemoryUserStore::new();
        let hasher = CountingHasher::default();
        register(&store, &hasher, &register_req("7", "hunter22")).await.unwrap();

        let err = login(&store, &hasher, &keys(), &login_req("8", "hunter22"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
        assert_eq!(hasher.verifies.load(Ordering::SeqCst), 1);

        login(&store, &hasher, &keys(), &login_req("7", "wrong-pw"))
            .await
            .unwrap_err();
        assert_eq!(hasher.verifies.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dummy_hash_is_a_parseable_argon2_hash() {
        assert!(DUMMY_HASH.starts_with("$argon2"));
        assert!(!Argon2Hasher.verify("hunter22", &DUMMY_HASH).unwrap());
    }

    #[tokio::test]
    async fn last_login_failure_does_not_fail_login() {
        let store = MemoryUserStore::failing_last_login();
        register(&store, &Argon2Hasher, &register_req("9", "hunter22")).await.unwrap();
        let token = login(&store, &Argon2Hasher, &keys(), &login_req("9", "hunter22")).await;
        assert!(token.is_ok());
    }

    #[tokio::test]
    async fn me_resolves_bearer_token() {
        let store = MemoryUserStore::new();
        let user = register(&store, &Argon2Hasher, &register_req("5", "hunter22")).await.unwrap();
        let header = format!("Bearer {}", keys().issue(user.id));
        let found = me(&store, &keys(), Some(&header)).await.unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn me_error_kinds() {
        let store = MemoryUserStore::new();
        let k = keys();

        assert!(matches!(me(&store, &k, None).await, Err(AppError::MissingToken)));
        assert!(matches!(
            me(&store, &k, Some("Basic abc")).await,
            Err(AppError::MissingToken)
        ));
        assert!(matches!(
            me(&store, &k, Some("Bearer not-base64!!")).await,
            Err(AppError::InvalidToken(token::TokenError::Malformed))
        ));

        let forged = format!("Bearer {}", token::encode(1, b"other-secret"));
        assert!(matches!(
            me(&store, &k, Some(&forged)).await,
            Err(AppError::InvalidToken(token::TokenError::BadSignature))
        ));

        let orphan = format!("Bearer {}", k.issue(999));
        assert!(matches!(
            me(&store, &k, Some(&orphan)).await,
            Err(AppError::UnknownUser)
        ));
    }
}

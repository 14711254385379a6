use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{
    db::Store,
    error::{AppError, AppResult},
    models::{user::LISTENER_IDENTITY, User},
};

/// Method prefix, laid out as werkzeug's `pbkdf2:sha256:<iterations>`
const HASH_METHOD: &str = "pbkdf2:sha256";
const HASH_ITERATIONS: u32 = 100_000;
/// Stored hashes asking for more work than this are treated as corrupt
const MAX_HASH_ITERATIONS: u32 = 1_000_000;
const SALT_BYTES: usize = 16;
const KEY_BYTES: usize = 32;

/// Shortest password accepted when changing passwords
pub const MIN_PASSWORD_LEN: usize = 6;

fn derive_key(salt: &str, password: &str, iterations: u32) -> [u8; KEY_BYTES] {
    let mut key = [0u8; KEY_BYTES];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);
    key
}

/// Hashes a password with a fresh random salt
///
/// Output format: `pbkdf2:sha256:<iterations>$<salt>$<key hex>`, which is
/// also what werkzeug writes, so existing account rows keep verifying.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = hex::encode(salt);

    format!(
        "{}:{}${}${}",
        HASH_METHOD,
        HASH_ITERATIONS,
        salt,
        hex::encode(derive_key(&salt, password, HASH_ITERATIONS))
    )
}

/// Checks a password against a stored hash; malformed hashes never verify
pub fn verify_password(stored: &str, password: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(method), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let Some(iterations) = method
        .strip_prefix(HASH_METHOD)
        .and_then(|rest| rest.strip_prefix(':'))
        .and_then(|n| n.parse::<u32>().ok())
    else {
        return false;
    };
    if iterations == 0 || iterations > MAX_HASH_ITERATIONS {
        return false;
    }

    let Ok(expected) = hex::decode(expected) else {
        return false;
    };

    derive_key(salt, password, iterations)
        .as_slice()
        .ct_eq(expected.as_slice())
        .into()
}

/// Creates an account with a generated user id
pub async fn register(
    store: &dyn Store,
    login_id: &str,
    username: &str,
    password: &str,
) -> AppResult<User> {
    if !login_id.chars().all(char::is_alphanumeric) {
        return Err(AppError::InvalidInput(
            "Login id may only contain letters and digits".to_string(),
        ));
    }

    if store.find_user_by_login(login_id).await?.is_some() {
        return Err(AppError::Conflict(
            "This login id is already in use".to_string(),
        ));
    }

    let user = User {
        userid: Uuid::new_v4().to_string(),
        username: username.to_string(),
        login_id: login_id.to_string(),
        password: hash_password(password),
        user_identity: LISTENER_IDENTITY,
    };

    store.create_user(user.clone()).await?;
    tracing::info!(user_id = %user.userid, login_id = %login_id, "User registered");

    Ok(user)
}

pub async fn login(store: &dyn Store, login_id: &str, password: &str) -> AppResult<User> {
    let user = store
        .find_user_by_login(login_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Account does not exist".to_string()))?;

    if !verify_password(&user.password, password) {
        return Err(AppError::Unauthorized("Incorrect password".to_string()));
    }

    tracing::info!(user_id = %user.userid, "User logged in");
    Ok(user)
}

pub async fn change_username(
    store: &dyn Store,
    userid: &str,
    new_username: &str,
) -> AppResult<User> {
    let new_username = new_username.trim();
    if new_username.is_empty() {
        return Err(AppError::InvalidInput(
            "Username cannot be blank".to_string(),
        ));
    }

    let user = store
        .update_username(userid, new_username)
        .await?
        .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

    tracing::info!(user_id = %userid, "Username changed");
    Ok(user)
}

pub async fn change_password(
    store: &dyn Store,
    userid: &str,
    old_password: &str,
    new_password: &str,
) -> AppResult<()> {
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidInput(format!(
            "New password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let user = store
        .find_user(userid)
        .await?
        .ok_or_else(|| AppError::NotFound("User does not exist".to_string()))?;

    if !verify_password(&user.password, old_password) {
        return Err(AppError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    if !store
        .update_password(userid, &hash_password(new_password))
        .await?
    {
        return Err(AppError::NotFound("User does not exist".to_string()));
    }

    tracing::info!(user_id = %userid, "Password changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockStore;

    fn stored_user(password: &str) -> User {
        User {
            userid: "3f1c".to_string(),
            username: "nina".to_string(),
            login_id: "nina01".to_string(),
            password: hash_password(password),
            user_identity: LISTENER_IDENTITY,
        }
    }

    #[test]
    fn test_hash_roundtrip() {
        let hash = hash_password("hunter22");
        assert!(hash.starts_with("pbkdf2:sha256:100000$"));
        assert!(verify_password(&hash, "hunter22"));
        assert!(!verify_password(&hash, "hunter23"));
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("", ""));
        assert!(!verify_password("plaintext", "plaintext"));
        assert!(!verify_password("md5$aa$bb", "x"));
        assert!(!verify_password("pbkdf2:sha256:0$aa$bb", "x"));
        assert!(!verify_password("pbkdf2:sha256:1000$aa$not-hex", "x"));
    }

    #[test]
    fn test_runaway_iteration_count_is_rejected() {
        let key = hex::encode(derive_key("salt", "pw", 1));
        let stored = format!("pbkdf2:sha256:{}$salt${}", u32::MAX, key);
        assert!(!verify_password(&stored, "pw"));
    }

    #[test]
    fn test_verifies_werkzeug_style_hash() {
        // RFC 7914 PBKDF2-HMAC-SHA256 vector: P="passwd", S="salt", c=1
        let stored = "pbkdf2:sha256:1$salt$55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc";
        assert!(verify_password(stored, "passwd"));
        assert!(!verify_password(stored, "passwd2"));
    }

    #[tokio::test]
    async fn test_register_rejects_symbols_in_login_id() {
        let store = MockStore::new();
        let err = register(&store, "nina-01", "Nina", "secret1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_register_accepts_non_latin_login_id() {
        let mut store = MockStore::new();
        store.expect_find_user_by_login().returning(|_| Ok(None));
        store
            .expect_create_user()
            .withf(|user| user.login_id == "张三")
            .times(1)
            .returning(|_| Ok(()));

        let user = register(&store, "张三", "Zhang", "secret1").await.unwrap();
        assert_eq!(user.login_id, "张三");
    }

    #[tokio::test]
    async fn test_register_rejects_taken_login_id() {
        let mut store = MockStore::new();
        store
            .expect_find_user_by_login()
            .returning(|_| Ok(Some(stored_user("secret1"))));
        store.expect_create_user().never();

        let err = register(&store, "nina01", "Nina", "secret1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let mut store = MockStore::new();
        store
            .expect_find_user_by_login()
            .returning(|_| Ok(Some(stored_user("secret1"))));

        let err = login(&store, "nina01", "secret2").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_login_unknown_account() {
        let mut store = MockStore::new();
        store.expect_find_user_by_login().returning(|_| Ok(None));

        let err = login(&store, "ghost", "secret1").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_change_password_too_short() {
        let mut store = MockStore::new();
        store.expect_find_user().never();

        let err = change_password(&store, "3f1c", "secret1", "abc")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_change_password_stores_new_hash() {
        let mut store = MockStore::new();
        store
            .expect_find_user()
            .returning(|_| Ok(Some(stored_user("secret1"))));
        store
            .expect_update_password()
            .withf(|userid, hash| userid == "3f1c" && verify_password(hash, "better-secret"))
            .times(1)
            .returning(|_, _| Ok(true));

        change_password(&store, "3f1c", "secret1", "better-secret")
            .await
            .unwrap();
    }
}

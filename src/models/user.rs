use serde::Serialize;

/// Identity level of a regular listener
pub const LISTENER_IDENTITY: i32 = 0;

/// A registered account as stored
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub userid: String,
    pub username: String,
    pub login_id: String,
    /// Salted password hash, never the plain password
    pub password: String,
    pub user_identity: i32,
}

/// The public part of a user returned to clients after login
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserProfile {
    pub userid: String,
    pub username: String,
    pub user_identity: i32,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            userid: user.userid.clone(),
            username: user.username.clone(),
            user_identity: user.user_identity,
        }
    }
}

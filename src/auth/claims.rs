use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub sub: i32, // User ID (subject)
    pub email: String,
    pub role: String,
    pub exp: i64, // Expiration time (Unix timestamp)
    pub iat: i64, // Issued at (Unix timestamp)
}

impl TokenClaims {
    pub fn new(user_id: i32, email: String, role: String, expires_in: Duration) -> Self {
        let now = Utc::now();
        Self { sub: user_id, email, role, exp: (now + expires_in).timestamp(), iat: now.timestamp() }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

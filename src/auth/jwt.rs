use crate::auth::claims::TokenClaims;
use crate::config::AuthConfig;
use crate::models::User;
use anyhow::{anyhow, Result};
use chrono::Duration;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

/// Issues and checks HS256 bearer tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expires_in: Duration,
}

impl JwtService {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let secret = config.jwt_secret.as_bytes();
        let expires_in = parse_lifetime(&config.jwt_expires_in)?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::default(),
            expires_in,
        })
    }

    pub fn token_lifetime(&self) -> Duration {
        self.expires_in
    }

    pub fn encode_token(&self, claims: &TokenClaims) -> Result<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to encode JWT: {}", e))
    }

    pub fn decode_token(&self, token: &str) -> Result<TokenClaims> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| anyhow!("Failed to decode JWT: {}", e))
    }

    pub fn create_token_for_user(&self, user_id: i32, email: String, role: String) -> Result<String> {
        let claims = TokenClaims::new(user_id, email, role, self.expires_in);
        self.encode_token(&claims)
    }

    pub fn token_for(&self, user: &User) -> Result<String> {
        self.create_token_for_user(user.id, user.email.clone(), user.role.to_string())
    }
}

/// Parses lifetimes such as `24h`, `7d`, `30m` or `45s`; a bare number means hours.
fn parse_lifetime(value: &str) -> Result<Duration> {
    let value = value.trim();
    let (amount, unit) = match value.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&value[..idx], c),
        _ => (value, 'h'),
    };

    let amount: i64 = amount
        .parse()
        .map_err(|_| anyhow!("Invalid token lifetime: {:?}", value))?;

    match unit {
        'd' => Ok(Duration::days(amount)),
        'h' => Ok(Duration::hours(amount)),
        'm' => Ok(Duration::minutes(amount)),
        's' => Ok(Duration::seconds(amount)),
        other => Err(anyhow!("Unknown token lifetime unit {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifetime_units() {
        assert_eq!(parse_lifetime("24h").unwrap(), Duration::hours(24));
        assert_eq!(parse_lifetime("7d").unwrap(), Duration::days(7));
        assert_eq!(parse_lifetime("30m").unwrap(), Duration::minutes(30));
        assert_eq!(parse_lifetime("45s").unwrap(), Duration::seconds(45));
        assert_eq!(parse_lifetime("2").unwrap(), Duration::hours(2));
    }

    #[test]
    fn test_lifetime_rejects_garbage() {
        assert!(parse_lifetime("soon").is_err());
        assert!(parse_lifetime("h").is_err());
        assert!(parse_lifetime("3w").is_err());
    }
}

use std::str::FromStr;
use std::time::{Duration, SystemTime};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use tokio::task::spawn_blocking;

/// bcrypt cost for newly hashed passwords.
pub const DEFAULT_COST: u32 = 10;

/// Identity carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub name: String,
    pub admin: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenBody {
    #[serde(flatten)]
    claims: Claims,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    Missing,
    Invalid,
}

#[derive(Debug)]
pub struct HashError;

/// The raw `authorization` header. Clients send the bare token; a
/// `Bearer ` prefix is stripped if present.
pub struct AuthHeader {
    token: String,
}

impl FromStr for AuthHeader {
    type Err = AuthError;

    fn from_str(header: &str) -> Result<Self, Self::Err> {
        let header = header.trim();
        let token = match header.split_once(' ') {
            Some(("Bearer", token)) => token.trim(),
            Some(_) => return Err(AuthError::Invalid),
            None => header,
        };

        if token.is_empty() {
            return Err(AuthError::Missing);
        }

        Ok(Self {
            token: token.into(),
        })
    }
}

impl AuthHeader {
    pub fn token(&self) -> &str {
        &self.token
    }
}

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Option<Duration>,
}

impl TokenKeys {
    /// `ttl: None` mints tokens that never expire.
    pub fn new(secret: &[u8], ttl: Option<Duration>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, claims: Claims) -> Result<String, jsonwebtoken::errors::Error> {
        let exp = self.ttl.map(|ttl| {
            SystemTime::now()
                .checked_add(ttl)
                .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(u64::MAX)
        });

        encode(
            &Header::new(Algorithm::HS256),
            &TokenBody { claims, exp },
            &self.encoding,
        )
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        if self.ttl.is_some() {
            validation.set_required_spec_claims(&["exp"]);
            validation.leeway = 0;
        } else {
            validation.required_spec_claims.clear();
            validation.validate_exp = false;
        }

        decode::<TokenBody>(token, &self.decoding, &validation)
            .map(|data| data.claims.claims)
            .map_err(|e| {
                debug!("rejecting token: {e}");
                AuthError::Invalid
            })
    }
}

pub async fn hash_password(password: String, cost: u32) -> Result<String, HashError> {
    spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| {
            error!("hashing task failed: {e:?}");
            HashError
        })?
        .map_err(|e| {
            error!("couldn't hash password: {e}");
            HashError
        })
}

/// Ok(false) is a wrong password, Err is a broken hash or backend.
pub async fn verify_password(password: String, pwhash: String) -> Result<bool, HashError> {
    spawn_blocking(move || bcrypt::verify(password, &pwhash))
        .await
        .map_err(|e| {
            error!("verification task failed: {e:?}");
            HashError
        })?
        .map_err(|e| {
            error!("couldn't verify password: {e}");
            HashError
        })
}

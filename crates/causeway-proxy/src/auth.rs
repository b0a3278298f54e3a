//! Auth provider interface consumed by the HTTPS backend (SPEC_FULL.md §10.Q).
//!
//! `Auth::get_headers` returns the header(s) to merge into the outbound
//! upstream request. `BasicAuth` is stateless; `JwtAuth` mints and caches a
//! token, re-minting only once the cached one is within its refresh buffer
//! of expiring.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use jsonwebtoken::{encode, EncodingKey, Header};
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::AuthConfig;

const JWT_LIFETIME_SECS: u64 = 30 * 60;
const JWT_REFRESH_BUFFER_SECS: u64 = 30;

pub trait Auth: Send + Sync {
    fn get_headers(&self) -> HashMap<String, String>;
}

pub struct BasicAuth {
    header_name: String,
    username: String,
    password: String,
}

impl Auth for BasicAuth {
    fn get_headers(&self) -> HashMap<String, String> {
        let credentials = format!("{}:{}", self.username, self.password);
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        HashMap::from([(self.header_name.clone(), format!("Basic {encoded}"))])
    }
}

#[derive(Serialize)]
struct JwtClaims {
    exp: u64,
    #[serde(flatten)]
    additional: HashMap<String, String>,
}

struct CachedToken {
    token: String,
    expires_at: u64,
}

pub struct JwtAuth {
    header_name: String,
    secret: String,
    algorithm: jsonwebtoken::Algorithm,
    additional_claims: HashMap<String, String>,
    cached: Mutex<Option<CachedToken>>,
}

impl JwtAuth {
    fn mint(&self) -> String {
        let now = now_secs();
        let claims = JwtClaims { exp: now + JWT_LIFETIME_SECS, additional: self.additional_claims.clone() };
        let header = Header::new(self.algorithm);
        let key = EncodingKey::from_secret(self.secret.as_bytes());
        encode(&header, &claims, &key).expect("HS256 encoding with a valid secret never fails")
    }
}

impl Auth for JwtAuth {
    fn get_headers(&self) -> HashMap<String, String> {
        let now = now_secs();
        let mut cached = self.cached.lock();
        let needs_refresh = match cached.as_ref() {
            Some(t) => now + JWT_REFRESH_BUFFER_SECS >= t.expires_at,
            None => true,
        };
        if needs_refresh {
            let token = self.mint();
            *cached = Some(CachedToken { token: token.clone(), expires_at: now + JWT_LIFETIME_SECS });
        }
        let token = cached.as_ref().expect("just populated").token.clone();
        HashMap::from([(self.header_name.clone(), format!("Bearer {token}"))])
    }
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Builds the bound `Auth` provider from an endpoint's `AuthConfig`.
/// `Config::validate` already rejected a config whose `r#type` is unknown or
/// whose required credential fields are missing, so this only needs to
/// handle the two known types.
pub fn build(config: &AuthConfig) -> Arc<dyn Auth> {
    match config.r#type.as_str() {
        "basic" => Arc::new(BasicAuth {
            header_name: config.header_name.clone(),
            username: config.username.clone().unwrap_or_default(),
            password: config.password.clone().unwrap_or_default(),
        }),
        _ => {
            let algorithm = match config.algorithm.as_deref() {
                Some("HS384") => jsonwebtoken::Algorithm::HS384,
                Some("HS512") => jsonwebtoken::Algorithm::HS512,
                _ => jsonwebtoken::Algorithm::HS256,
            };
            Arc::new(JwtAuth {
                header_name: config.header_name.clone(),
                secret: config.secret.clone().unwrap_or_default(),
                algorithm,
                additional_claims: config.additional_claims.clone(),
                cached: Mutex::new(None),
            })
        }
    }
}

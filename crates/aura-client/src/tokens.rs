//! # Token Store
//!
//! Holds the access and refresh tokens in memory and mirrors them to local
//! storage.
//!
//! ## Token Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Token Lifecycle                                  │
//! │                                                                         │
//! │  startup ──► load() ─────────► tokens from aura.accessToken /           │
//! │                                aura.refreshToken (if present)          │
//! │                                                                         │
//! │  login / register ──► set(access, refresh)                             │
//! │                                                                         │
//! │  401 ──► POST /auth/refresh ──► update(access, maybe refresh)          │
//! │                                 (old refresh token kept if none sent)  │
//! │                                                                         │
//! │  logout / refresh failure ──► clear()                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The lock is a `std::sync::RwLock` and is never held across an await.

use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::storage::{keys, Persister};

#[derive(Default)]
struct Tokens {
    access: Option<SecretString>,
    refresh: Option<SecretString>,
}

/// Shared token cache. Wrap in `Arc` to share between the API client and the
/// app context.
pub struct TokenStore {
    tokens: RwLock<Tokens>,
    persister: Persister,
}

impl TokenStore {
    /// Rehydrates tokens from storage.
    pub fn load(persister: Persister) -> Self {
        let access: Option<String> = persister.load(keys::ACCESS_TOKEN);
        let refresh: Option<String> = persister.load(keys::REFRESH_TOKEN);
        debug!(
            has_access = access.is_some(),
            has_refresh = refresh.is_some(),
            "Loaded tokens from storage"
        );
        TokenStore {
            tokens: RwLock::new(Tokens {
                access: access.map(SecretString::from),
                refresh: refresh.map(SecretString::from),
            }),
            persister,
        }
    }

    pub fn access_token(&self) -> Option<SecretString> {
        self.read(|t| t.access.clone())
    }

    pub fn refresh_token(&self) -> Option<SecretString> {
        self.read(|t| t.refresh.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.read(|t| t.access.is_some())
    }

    /// Replaces both tokens (login, register).
    pub fn set(&self, access: SecretString, refresh: Option<SecretString>) {
        self.persist(keys::ACCESS_TOKEN, Some(&access));
        self.persist(keys::REFRESH_TOKEN, refresh.as_ref());
        self.write(|t| {
            t.access = Some(access);
            t.refresh = refresh;
        });
    }

    /// Stores a refreshed access token. A missing refresh token keeps the
    /// current one.
    pub fn update(&self, access: SecretString, refresh: Option<SecretString>) {
        self.persist(keys::ACCESS_TOKEN, Some(&access));
        if refresh.is_some() {
            self.persist(keys::REFRESH_TOKEN, refresh.as_ref());
        }
        self.write(|t| {
            t.access = Some(access);
            if refresh.is_some() {
                t.refresh = refresh;
            }
        });
    }

    /// Drops both tokens from memory and storage.
    pub fn clear(&self) {
        self.write(|t| *t = Tokens::default());
        self.persister.forget(keys::ACCESS_TOKEN);
        self.persister.forget(keys::REFRESH_TOKEN);
        debug!("Cleared stored tokens");
    }

    fn persist(&self, key: &str, token: Option<&SecretString>) {
        match token {
            Some(token) => self.persister.save(key, token.expose_secret()),
            None => self.persister.forget(key),
        }
    }

    fn read<R>(&self, f: impl FnOnce(&Tokens) -> R) -> R {
        let guard = self.tokens.read().unwrap_or_else(|p| p.into_inner());
        f(&guard)
    }

    fn write(&self, f: impl FnOnce(&mut Tokens)) {
        let mut guard = self.tokens.write().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("signed_in", &self.is_signed_in())
            .finish()
    }
}

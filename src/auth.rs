//! Credential verification for the login and registration pages.
//!
//! The HTTP engine only sees the [`CredentialGate`] boundary. Every failure,
//! whether a wrong password, a taken name or an unreachable store, is a plain
//! `false`.

use std::collections::HashMap;
use std::sync::RwLock;

/// Username and password submitted through a login or registration form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// `true` for login, `false` for registration
    pub is_login: bool,
}

/// A store able to check or register users.
///
/// Implementations may block; callers on an async runtime must not invoke
/// `verify` from a reactor thread.
pub trait CredentialGate: Send + Sync {
    fn verify(&self, username: &str, password: &str, is_login: bool) -> bool;
}

/// In-process user table.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given `(username, password)` pairs.
    pub fn with_users<I, U, P>(users: I) -> Self
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: Into<String>,
    {
        let users = users
            .into_iter()
            .map(|(u, p)| (u.into(), p.into()))
            .collect();
        Self {
            users: RwLock::new(users),
        }
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialGate for MemoryCredentialStore {
    fn verify(&self, username: &str, password: &str, is_login: bool) -> bool {
        if username.is_empty() || password.is_empty() {
            return false;
        }

        if is_login {
            let Ok(users) = self.users.read() else {
                tracing::error!("credential store lock poisoned");
                return false;
            };
            let ok = users.get(username).is_some_and(|stored| stored == password);
            if !ok {
                tracing::debug!(user = username, "login rejected");
            }
            return ok;
        }

        let Ok(mut users) = self.users.write() else {
            tracing::error!("credential store lock poisoned");
            return false;
        };
        if users.contains_key(username) {
            tracing::debug!(user = username, "registration rejected, name taken");
            return false;
        }
        users.insert(username.to_string(), password.to_string());
        tracing::info!(user = username, "user registered");
        true
    }
}

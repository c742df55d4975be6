// SPDX-FileCopyrightText: 2025-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{collections::HashMap, fmt::Debug};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::{component::SecurityComponent, error::Result, identity::IdentifierCollection};

/// A credential bundle submitted for a single login attempt. Tokens are
/// consumed once and never persisted.
pub trait AuthenticationToken: Send + Sync {
    /// The identifier the caller claims (e.g. a username), if this token
    /// variant carries one.
    fn identifier(&self) -> Option<&str>;

    fn credentials(&self) -> Option<&SecretString> {
        None
    }

    /// The host the attempt originated from, if the token variant records
    /// one.
    fn host(&self) -> Option<&str> {
        None
    }

    /// Returns the remember-me view of this token if the variant supports
    /// requesting remember-me services.
    fn as_remember_me(&self) -> Option<&dyn RememberMeToken> {
        None
    }
}

pub trait RememberMeToken: AuthenticationToken {
    fn is_remember_me(&self) -> bool;
}

pub struct UsernamePasswordToken {
    username: String,
    password: SecretString,
    remember_me: bool,
    host: Option<String>,
}

impl UsernamePasswordToken {
    pub fn new<T: Into<String>>(username: T, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
            remember_me: false,
            host: None,
        }
    }

    #[must_use]
    pub fn with_remember_me(mut self) -> Self {
        self.remember_me = true;
        self
    }

    #[must_use]
    pub fn with_host<T: Into<String>>(mut self, host: T) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    /// Compares the submitted password against a stored candidate in
    /// constant time.
    pub fn password_matches(&self, candidate: &SecretString) -> bool {
        self.password
            .expose_secret()
            .as_bytes()
            .ct_eq(candidate.expose_secret().as_bytes())
            .unwrap_u8()
            == 1
    }
}

impl AuthenticationToken for UsernamePasswordToken {
    fn identifier(&self) -> Option<&str> {
        Some(&self.username)
    }

    fn credentials(&self) -> Option<&SecretString> {
        Some(&self.password)
    }

    fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    fn as_remember_me(&self) -> Option<&dyn RememberMeToken> {
        Some(self)
    }
}

impl RememberMeToken for UsernamePasswordToken {
    fn is_remember_me(&self) -> bool {
        self.remember_me
    }
}

impl Debug for UsernamePasswordToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsernamePasswordToken")
            .field("username", &self.username)
            .field("remember_me", &self.remember_me)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

/// The verified-identity result of a successful authentication attempt.
/// Owned transiently by the login flow; not persisted beyond subject
/// construction.
#[derive(Debug, Clone)]
pub struct Account {
    identifiers: IdentifierCollection,
    attributes: HashMap<String, serde_json::Value>,
}

impl Account {
    pub fn new(identifiers: IdentifierCollection) -> Self {
        Self {
            identifiers,
            attributes: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute<K: Into<String>>(mut self, key: K, value: serde_json::Value) -> Self {
        let _previous = self.attributes.insert(key.into(), value);
        self
    }

    pub fn identifiers(&self) -> &IdentifierCollection {
        &self.identifiers
    }

    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
}

#[async_trait]
pub trait Authenticator: SecurityComponent {
    async fn authenticate_account(&self, token: &dyn AuthenticationToken) -> Result<Account>;

    /// Returns the logout-aware view of this authenticator if it wants to be
    /// notified when a subject it authenticated logs out.
    fn as_logout_aware(&self) -> Option<&dyn LogoutAware> {
        None
    }
}

#[async_trait]
pub trait LogoutAware: Send + Sync {
    async fn on_logout(&self, identifiers: &IdentifierCollection);
}

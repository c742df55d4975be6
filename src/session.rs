// SPDX-FileCopyrightText: 2025-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    collections::HashMap,
    fmt,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    component::SecurityComponent,
    error::{self, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(Uuid);

impl SessionKey {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for SessionKey {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A handle to coordinator-owned session state. A subject holds one of these
/// rather than the state itself and re-resolves through the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    key: SessionKey,
    host: Option<String>,
}

impl Session {
    pub fn new(key: SessionKey, host: Option<String>) -> Self {
        Self { key, host }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}

#[derive(Debug, Default, Clone)]
pub struct SessionContext {
    host: Option<String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_host<T: Into<String>>(mut self, host: T) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}

/// Creates, resolves, and terminates sessions. Implementations own the
/// backing storage and any per-session locking.
#[async_trait]
pub trait Coordinator: SecurityComponent {
    /// Creates and returns a new active session.
    async fn start(&self, context: &SessionContext) -> Result<Session>;

    /// Resolves a session by key. `Ok(Some)` means found and active,
    /// `Ok(None)` means no record exists, and an error means a record exists
    /// but is no longer usable (expired or stopped).
    async fn get_session(&self, key: &SessionKey) -> Result<Option<Session>>;

    /// Stops the session. Stopping an unknown or already-stopped session is
    /// not an error.
    async fn stop(&self, key: &SessionKey) -> Result<()>;
}

enum State {
    Active,
    Stopped,
}

struct Record {
    session: Session,
    state: State,
    started: Instant,
}

/// An in-memory coordinator suitable for native (non-web) embedding and for
/// tests. Sessions optionally expire after a fixed lifetime.
pub struct Memory {
    sessions: RwLock<HashMap<SessionKey, Record>>,
    timeout: Option<Duration>,
}

impl Memory {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout: Some(timeout),
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityComponent for Memory {}

#[async_trait]
impl Coordinator for Memory {
    async fn start(&self, context: &SessionContext) -> Result<Session> {
        let session = Session::new(SessionKey::generate(), context.host().map(ToOwned::to_owned));

        let mut sessions = self.sessions.write().await;
        let _previous = sessions.insert(
            *session.key(),
            Record {
                session: session.clone(),
                state: State::Active,
                started: Instant::now(),
            },
        );

        Ok(session)
    }

    async fn get_session(&self, key: &SessionKey) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        match sessions.get(key) {
            None => Ok(None),
            Some(record) => match record.state {
                State::Stopped => Err(error::Session::Stopped(*key).into()),
                State::Active => {
                    if let Some(timeout) = self.timeout {
                        if record.started.elapsed() >= timeout {
                            return Err(error::Session::Expired(*key).into());
                        }
                    }

                    Ok(Some(record.session.clone()))
                }
            },
        }
    }

    async fn stop(&self, key: &SessionKey) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if let Some(record) = sessions.get_mut(key) {
            record.state = State::Stopped;
        }

        Ok(())
    }
}

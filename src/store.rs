// SPDX-FileCopyrightText: 2025-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use async_trait::async_trait;

use tokio::sync::RwLock;

use crate::{component::SecurityComponent, error::Result, subject::Subject};

/// Persists constructed subjects so they can be re-resolved on later
/// operations.
#[async_trait]
pub trait Store: SecurityComponent {
    async fn save(&self, subject: &Subject) -> Result<()>;
    async fn delete(&self, subject: &Subject) -> Result<()>;
}

/// An in-memory subject store keyed by session, falling back to the primary
/// identifier for session-less subjects. Anonymous, session-less subjects
/// have nothing to key on and are not retained.
pub struct Memory {
    subjects: RwLock<HashMap<String, Subject>>,
}

impl Memory {
    pub fn new() -> Self {
        Self {
            subjects: RwLock::new(HashMap::new()),
        }
    }

    fn key_for(subject: &Subject) -> Option<String> {
        subject
            .session()
            .map(|session| session.key().to_string())
            .or_else(|| subject.primary_identifier().map(ToOwned::to_owned))
    }

    pub async fn get(&self, key: &str) -> Option<Subject> {
        let subjects = self.subjects.read().await;
        subjects.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        let subjects = self.subjects.read().await;
        subjects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityComponent for Memory {}

#[async_trait]
impl Store for Memory {
    async fn save(&self, subject: &Subject) -> Result<()> {
        if let Some(key) = Self::key_for(subject) {
            let mut subjects = self.subjects.write().await;
            let _previous = subjects.insert(key, subject.clone());
        }

        Ok(())
    }

    async fn delete(&self, subject: &Subject) -> Result<()> {
        if let Some(key) = Self::key_for(subject) {
            let mut subjects = self.subjects.write().await;
            let _previous = subjects.remove(&key);
        }

        Ok(())
    }
}

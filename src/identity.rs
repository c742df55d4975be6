// SPDX-FileCopyrightText: 2025-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// An ordered collection of identifying attributes for a single subject, such
/// as a user id or username. The first identifier is the primary one, used
/// for display and store keying. Immutable once constructed.
///
/// An empty collection represents an anonymous subject.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierCollection {
    identifiers: Vec<String>,
}

impl IdentifierCollection {
    pub fn from_identifier<T: Into<String>>(primary: T) -> Self {
        Self {
            identifiers: vec![primary.into()],
        }
    }

    /// Builds a collection from the given identifiers, keeping the first
    /// occurrence of any duplicate. The first identifier becomes the primary.
    pub fn from_identifiers<I, T>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut collected: Vec<String> = Vec::new();
        for identifier in identifiers {
            let identifier = identifier.into();
            if !collected.contains(&identifier) {
                collected.push(identifier);
            }
        }

        Self {
            identifiers: collected,
        }
    }

    pub fn primary_identifier(&self) -> Option<&str> {
        self.identifiers.first().map(String::as_str)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.identifiers.iter().any(|known| known == identifier)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.identifiers.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

// SPDX-FileCopyrightText: 2025-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use tokio::sync::broadcast;

use crate::{component::SecurityComponent, identity::IdentifierCollection};

#[derive(Debug, Clone)]
pub enum SecurityEvent {
    LoginSuccess {
        identifiers: IdentifierCollection,
    },
    LoginFailure {
        identifier: Option<String>,
    },
    Logout {
        identifiers: Option<IdentifierCollection>,
    },
}

pub trait Bus: SecurityComponent {
    fn publish(&self, event: SecurityEvent);
}

/// The default bus, fanning events out over a tokio broadcast channel.
/// Publishing with no subscriber attached is not an error; the event is
/// simply dropped.
pub struct Broadcast {
    tx: broadcast::Sender<SecurityEvent>,
}

impl Broadcast {
    const DEFAULT_CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SecurityEvent> {
        self.tx.subscribe()
    }
}

impl Default for Broadcast {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityComponent for Broadcast {}

impl Bus for Broadcast {
    fn publish(&self, event: SecurityEvent) {
        let _receivers = self.tx.send(event);
    }
}

// SPDX-FileCopyrightText: 2025-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use crate::{cache, event};

/// Base contract for every collaborator attached to a security manager.
///
/// A component that wants a shared infrastructure reference opts in by
/// returning itself from the matching accessor; the security manager checks
/// the implementation, never attribute presence, when it propagates
/// references.
pub trait SecurityComponent: Send + Sync {
    fn as_event_consumer(&self) -> Option<&dyn EventBusConsumer> {
        None
    }

    fn as_cache_consumer(&self) -> Option<&dyn CacheManagerConsumer> {
        None
    }

    fn as_realm_consumer(&self) -> Option<&dyn RealmConsumer> {
        None
    }
}

pub trait EventBusConsumer: Send + Sync {
    fn apply_event_bus(&self, event_bus: Arc<dyn event::Bus>);
}

pub trait CacheManagerConsumer: Send + Sync {
    fn apply_cache_manager(&self, cache_manager: Arc<dyn cache::Manager>);
}

pub trait RealmConsumer: Send + Sync {
    fn apply_realms(&self, realms: &[Arc<dyn Realm>]);
}

/// An authentication or authorization data source plugged into the security
/// manager. Realms receive shared infrastructure references like any other
/// component and are forwarded to the authenticator and authorizer when
/// those opt in via [`SecurityComponent::as_realm_consumer`].
pub trait Realm: SecurityComponent {
    fn name(&self) -> &str;
}

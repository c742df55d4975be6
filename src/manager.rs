// SPDX-FileCopyrightText: 2025-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use log::{debug, info, warn};

use crate::{
    authc::{Account, AuthenticationToken, Authenticator},
    authz::Authorizer,
    cache,
    component::{CacheManagerConsumer, EventBusConsumer, Realm},
    error::{self, Error, Result},
    event::{self, SecurityEvent},
    identity::IdentifierCollection,
    remember,
    session::{self, Session, SessionContext, SessionKey},
    store,
    subject::{DefaultSubjectFactory, Subject, SubjectContext, SubjectFactory},
};

/// A complete, consistent set of attached collaborators. Reconfiguration
/// swaps whole snapshots, so a concurrent reader never observes a partially
/// updated dependency set.
struct Dependencies {
    version: u64,
    authenticator: Arc<dyn Authenticator>,
    authorizer: Arc<dyn Authorizer>,
    realms: Vec<Arc<dyn Realm>>,
    session_coordinator: Arc<dyn session::Coordinator>,
    remember_me_manager: Option<Arc<dyn remember::Manager>>,
    subject_store: Option<Arc<dyn store::Store>>,
    subject_factory: Arc<dyn SubjectFactory>,
    event_bus: Arc<dyn event::Bus>,
    cache_manager: Arc<dyn cache::Manager>,
}

impl Dependencies {
    fn bump(&self) -> Self {
        Self {
            version: self.version + 1,
            authenticator: Arc::clone(&self.authenticator),
            authorizer: Arc::clone(&self.authorizer),
            realms: self.realms.clone(),
            session_coordinator: Arc::clone(&self.session_coordinator),
            remember_me_manager: self.remember_me_manager.clone(),
            subject_store: self.subject_store.clone(),
            subject_factory: Arc::clone(&self.subject_factory),
            event_bus: Arc::clone(&self.event_bus),
            cache_manager: Arc::clone(&self.cache_manager),
        }
    }

    /// The event-bus consumers among the attached components. The event-bus
    /// slot itself is deliberately not a candidate, so the bus is never
    /// handed a reference to itself when its slot is reassigned.
    fn event_consumers(&self) -> Vec<&dyn EventBusConsumer> {
        let mut consumers: Vec<&dyn EventBusConsumer> = Vec::new();
        consumers.extend(self.authenticator.as_event_consumer());
        consumers.extend(self.authorizer.as_event_consumer());
        consumers.extend(self.session_coordinator.as_event_consumer());
        consumers.extend(self.subject_factory.as_event_consumer());
        if let Some(subject_store) = &self.subject_store {
            consumers.extend(subject_store.as_event_consumer());
        }
        for realm in &self.realms {
            consumers.extend(realm.as_event_consumer());
        }
        consumers.extend(self.cache_manager.as_event_consumer());
        consumers
    }

    /// The cache-manager consumers, excluding the cache-manager slot itself
    /// for the same reason.
    fn cache_consumers(&self) -> Vec<&dyn CacheManagerConsumer> {
        let mut consumers: Vec<&dyn CacheManagerConsumer> = Vec::new();
        consumers.extend(self.authenticator.as_cache_consumer());
        consumers.extend(self.authorizer.as_cache_consumer());
        consumers.extend(self.session_coordinator.as_cache_consumer());
        consumers.extend(self.subject_factory.as_cache_consumer());
        if let Some(subject_store) = &self.subject_store {
            consumers.extend(subject_store.as_cache_consumer());
        }
        for realm in &self.realms {
            consumers.extend(realm.as_cache_consumer());
        }
        consumers.extend(self.event_bus.as_cache_consumer());
        consumers
    }
}

/// The single entry point coordinating authentication, authorization,
/// session access, and subject lifecycle. Collaborators are attached once at
/// build time and may be swapped at runtime; cross-cutting references (event
/// bus, cache manager) are propagated to every attached component that
/// declares the corresponding capability.
///
/// The manager itself is stateless between calls and safe to share across
/// concurrent requests.
pub struct SecurityManager {
    me: Weak<SecurityManager>,
    deps: ArcSwap<Dependencies>,
}

impl SecurityManager {
    pub fn builder() -> SecurityManagerBuilder {
        SecurityManagerBuilder::new()
    }

    fn deps(&self) -> Arc<Dependencies> {
        self.deps.load_full()
    }

    /// The version of the currently attached dependency snapshot. Every
    /// reconfiguration produces a new snapshot with a higher version.
    pub fn snapshot_version(&self) -> u64 {
        self.deps.load().version
    }

    pub fn event_bus(&self) -> Arc<dyn event::Bus> {
        Arc::clone(&self.deps.load().event_bus)
    }

    pub fn cache_manager(&self) -> Arc<dyn cache::Manager> {
        Arc::clone(&self.deps.load().cache_manager)
    }

    fn reconfigure<F>(&self, mut mutate: F) -> Arc<Dependencies>
    where
        F: FnMut(&mut Dependencies),
    {
        let _previous = self.deps.rcu(|current| {
            let mut next = current.bump();
            mutate(&mut next);
            next
        });
        self.deps.load_full()
    }

    fn wire_consumers(
        deps: &Dependencies,
        event_consumer: Option<&dyn EventBusConsumer>,
        cache_consumer: Option<&dyn CacheManagerConsumer>,
    ) {
        if let Some(consumer) = event_consumer {
            consumer.apply_event_bus(Arc::clone(&deps.event_bus));
        }
        if let Some(consumer) = cache_consumer {
            consumer.apply_cache_manager(Arc::clone(&deps.cache_manager));
        }
    }

    fn apply_event_bus(deps: &Dependencies) {
        for consumer in deps.event_consumers() {
            consumer.apply_event_bus(Arc::clone(&deps.event_bus));
        }
    }

    fn apply_cache_manager(deps: &Dependencies) {
        for consumer in deps.cache_consumers() {
            consumer.apply_cache_manager(Arc::clone(&deps.cache_manager));
        }
    }

    fn forward_realms(deps: &Dependencies) {
        if let Some(consumer) = deps.authenticator.as_realm_consumer() {
            consumer.apply_realms(&deps.realms);
        }
        if let Some(consumer) = deps.authorizer.as_realm_consumer() {
            consumer.apply_realms(&deps.realms);
        }
    }

    pub fn set_authenticator(&self, authenticator: Arc<dyn Authenticator>) {
        let deps = self.reconfigure(|next| next.authenticator = Arc::clone(&authenticator));
        Self::wire_consumers(
            &deps,
            deps.authenticator.as_event_consumer(),
            deps.authenticator.as_cache_consumer(),
        );
        if let Some(consumer) = deps.authenticator.as_realm_consumer() {
            consumer.apply_realms(&deps.realms);
        }
    }

    pub fn set_authorizer(&self, authorizer: Arc<dyn Authorizer>) {
        let deps = self.reconfigure(|next| next.authorizer = Arc::clone(&authorizer));
        Self::wire_consumers(
            &deps,
            deps.authorizer.as_event_consumer(),
            deps.authorizer.as_cache_consumer(),
        );
        if let Some(consumer) = deps.authorizer.as_realm_consumer() {
            consumer.apply_realms(&deps.realms);
        }
    }

    /// Attaches the realm set and forwards it to the authenticator and
    /// authorizer when they consume realms.
    pub fn set_realms(&self, realms: Vec<Arc<dyn Realm>>) -> Result<()> {
        if realms.is_empty() {
            return Err(Error::IllegalArgument(
                "realms parameter must have at least one realm".to_owned(),
            ));
        }

        let deps = self.reconfigure(|next| next.realms = realms.clone());
        for realm in &deps.realms {
            Self::wire_consumers(&deps, realm.as_event_consumer(), realm.as_cache_consumer());
        }
        Self::forward_realms(&deps);

        Ok(())
    }

    pub fn set_session_coordinator(&self, session_coordinator: Arc<dyn session::Coordinator>) {
        let deps =
            self.reconfigure(|next| next.session_coordinator = Arc::clone(&session_coordinator));
        Self::wire_consumers(
            &deps,
            deps.session_coordinator.as_event_consumer(),
            deps.session_coordinator.as_cache_consumer(),
        );
    }

    pub fn set_remember_me_manager(&self, remember_me_manager: Arc<dyn remember::Manager>) {
        let _deps = self
            .reconfigure(|next| next.remember_me_manager = Some(Arc::clone(&remember_me_manager)));
    }

    pub fn set_subject_store(&self, subject_store: Arc<dyn store::Store>) {
        let deps = self.reconfigure(|next| next.subject_store = Some(Arc::clone(&subject_store)));
        Self::wire_consumers(
            &deps,
            subject_store.as_event_consumer(),
            subject_store.as_cache_consumer(),
        );
    }

    pub fn set_subject_factory(&self, subject_factory: Arc<dyn SubjectFactory>) {
        let deps = self.reconfigure(|next| next.subject_factory = Arc::clone(&subject_factory));
        Self::wire_consumers(
            &deps,
            deps.subject_factory.as_event_consumer(),
            deps.subject_factory.as_cache_consumer(),
        );
    }

    pub fn set_event_bus(&self, event_bus: Arc<dyn event::Bus>) {
        let deps = self.reconfigure(|next| next.event_bus = Arc::clone(&event_bus));
        Self::apply_event_bus(&deps);
    }

    pub fn set_cache_manager(&self, cache_manager: Arc<dyn cache::Manager>) {
        let deps = self.reconfigure(|next| next.cache_manager = Arc::clone(&cache_manager));
        Self::apply_cache_manager(&deps);
    }

    pub async fn authenticate_account(&self, token: &dyn AuthenticationToken) -> Result<Account> {
        self.deps().authenticator.authenticate_account(token).await
    }

    pub async fn is_permitted(
        &self,
        identifiers: &IdentifierCollection,
        permissions: &[String],
    ) -> Result<Vec<(String, bool)>> {
        self.deps()
            .authorizer
            .is_permitted(identifiers, permissions)
            .await
    }

    pub async fn is_permitted_all(
        &self,
        identifiers: &IdentifierCollection,
        permissions: &[String],
    ) -> Result<bool> {
        self.deps()
            .authorizer
            .is_permitted_all(identifiers, permissions)
            .await
    }

    pub async fn check_permission(
        &self,
        identifiers: &IdentifierCollection,
        permissions: &[String],
    ) -> Result<()> {
        self.deps()
            .authorizer
            .check_permission(identifiers, permissions)
            .await
    }

    pub async fn has_role(
        &self,
        identifiers: &IdentifierCollection,
        roles: &[String],
    ) -> Result<Vec<(String, bool)>> {
        self.deps().authorizer.has_role(identifiers, roles).await
    }

    pub async fn has_all_roles(
        &self,
        identifiers: &IdentifierCollection,
        roles: &[String],
    ) -> Result<bool> {
        self.deps()
            .authorizer
            .has_all_roles(identifiers, roles)
            .await
    }

    pub async fn check_role(
        &self,
        identifiers: &IdentifierCollection,
        roles: &[String],
    ) -> Result<()> {
        self.deps().authorizer.check_role(identifiers, roles).await
    }

    pub async fn start_session(&self, context: &SessionContext) -> Result<Session> {
        self.deps().session_coordinator.start(context).await
    }

    pub async fn get_session(&self, key: &SessionKey) -> Result<Option<Session>> {
        self.deps().session_coordinator.get_session(key).await
    }

    /// Authenticates the token and, on success, constructs, persists, and
    /// returns the newly logged-in subject.
    ///
    /// A failed authentication triggers the remember-me failed-login hook
    /// and then surfaces exactly the original authentication error; hook
    /// failures are logged, never propagated.
    pub async fn login(
        &self,
        existing: Option<&Subject>,
        token: &dyn AuthenticationToken,
    ) -> Result<Subject> {
        let deps = self.deps();

        let account = match deps.authenticator.authenticate_account(token).await {
            Ok(account) => account,
            Err(err @ Error::Authentication(_)) => {
                self.remember_me_failed_login(&deps, existing, token, &err)
                    .await;
                deps.event_bus.publish(SecurityEvent::LoginFailure {
                    identifier: token.identifier().map(ToOwned::to_owned),
                });
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let logged_in = self
            .create_subject(Some(token), Some(&account), existing, None)
            .await?;
        self.remember_me_successful_login(&deps, &logged_in, token, &account)
            .await;
        deps.event_bus.publish(SecurityEvent::LoginSuccess {
            identifiers: account.identifiers().clone(),
        });

        Ok(logged_in)
    }

    /// Constructs a fully resolved subject. When no context is supplied, a
    /// fresh one is built from the token, account, and existing subject and
    /// flagged authenticated; a supplied context is copied so resolution
    /// never mutates the caller's original.
    pub async fn create_subject(
        &self,
        token: Option<&dyn AuthenticationToken>,
        account: Option<&Account>,
        existing: Option<&Subject>,
        context: Option<&SubjectContext>,
    ) -> Result<Subject> {
        let deps = self.deps();

        let mut context = match context {
            Some(context) => context.clone(),
            None => {
                let mut context = SubjectContext::new();
                context.set_authenticated(true);
                if let Some(account) = account {
                    context.set_account(account.clone());
                }
                if let Some(existing) = existing {
                    context.set_subject(existing.clone());
                }
                if let Some(host) = token.and_then(AuthenticationToken::host) {
                    context.set_host(host);
                }
                context
            }
        };

        self.ensure_security_manager(&mut context)?;
        self.resolve_session(&deps, &mut context).await?;
        self.resolve_identifiers(&deps, &mut context).await;

        let subject = deps.subject_factory.create_subject(&context);

        // Save the subject so remembered identifiers resolved above are not
        // re-hydrated from the record on every operation.
        self.save(&deps, &subject).await?;

        Ok(subject)
    }

    /// Logs the subject out: the remembered identity is always forgotten, a
    /// logout-aware authenticator is notified, and store deletion and
    /// session stop are both attempted best-effort. Only the initial
    /// argument validation can fail this call.
    pub async fn logout(&self, subject: Option<&Subject>) -> Result<()> {
        let subject = subject.ok_or_else(|| {
            Error::IllegalArgument("subject argument cannot be absent".to_owned())
        })?;
        let deps = self.deps();

        self.remember_me_logout(&deps, subject).await;

        if let Some(identifiers) = subject.identifiers() {
            debug!(
                "Logging out subject with primary identifier {:?}",
                identifiers.primary_identifier()
            );
            if let Some(aware) = deps.authenticator.as_logout_aware() {
                aware.on_logout(identifiers).await;
            }
        }

        if let Err(err) = self.delete(&deps, subject).await {
            debug!(
                "Unable to cleanly unbind the subject from the store; ignoring and logging out: {}",
                err
            );
        }

        // Even if the delete failed, the session still gets stopped.
        if let Some(session) = subject.session() {
            if let Err(err) = deps.session_coordinator.stop(session.key()).await {
                debug!(
                    "Unable to cleanly stop the session; ignoring and logging out: {}",
                    err
                );
            }
        }

        deps.event_bus.publish(SecurityEvent::Logout {
            identifiers: subject.identifiers().cloned(),
        });

        Ok(())
    }

    fn ensure_security_manager(&self, context: &mut SubjectContext) -> Result<()> {
        if context.security_manager().is_some() {
            debug!("Subject context already contains a security manager instance; returning");
            return Ok(());
        }

        let me = self.me.upgrade().ok_or_else(|| {
            Error::IllegalArgument("security manager is no longer alive".to_owned())
        })?;
        context.set_security_manager(me);

        Ok(())
    }

    async fn resolve_session(
        &self,
        deps: &Dependencies,
        context: &mut SubjectContext,
    ) -> Result<()> {
        if context.resolve_session().is_some() {
            debug!("Context already contains a session; returning");
            return Ok(());
        }

        let Some(key) = context.session_key().copied() else {
            return Ok(());
        };

        match deps.session_coordinator.get_session(&key).await {
            Ok(Some(session)) => context.set_session(session),
            Ok(None) => debug!("No session found for key {}; continuing without one", key),
            Err(Error::Session(err)) => {
                debug!("Referenced session is invalid, so we're ignoring it and creating an anonymous (session-less) subject instead: {}", err);
            }
            Err(err) => return Err(err),
        }

        Ok(())
    }

    async fn resolve_identifiers(&self, deps: &Dependencies, context: &mut SubjectContext) {
        if context.resolve_identifiers().is_some() {
            return;
        }

        debug!("No identity found in the subject context; looking for a remembered identity");
        if let Some(identifiers) = self.get_remembered_identity(deps, context).await {
            debug!("Found a remembered identifier collection; adding it to the context for subject construction");
            context.set_identifiers(identifiers);
        } else {
            debug!("No remembered identity found; returning the original context");
        }
    }

    async fn get_remembered_identity(
        &self,
        deps: &Dependencies,
        context: &SubjectContext,
    ) -> Option<IdentifierCollection> {
        let manager = deps.remember_me_manager.as_ref()?;
        match manager.get_remembered_identifiers(context).await {
            Ok(identifiers) => identifiers,
            Err(err) => {
                warn!(
                    "Delegate remember-me manager raised an error during get_remembered_identifiers: {}",
                    err
                );
                None
            }
        }
    }

    async fn save(&self, deps: &Dependencies, subject: &Subject) -> Result<()> {
        match &deps.subject_store {
            Some(subject_store) => subject_store.save(subject).await,
            None => Err(error::Store::Save("no subject store is configured".to_owned()).into()),
        }
    }

    async fn delete(&self, deps: &Dependencies, subject: &Subject) -> Result<()> {
        match &deps.subject_store {
            Some(subject_store) => subject_store.delete(subject).await,
            None => Err(error::Store::Delete("no subject store is configured".to_owned()).into()),
        }
    }

    async fn remember_me_successful_login(
        &self,
        deps: &Dependencies,
        subject: &Subject,
        token: &dyn AuthenticationToken,
        account: &Account,
    ) {
        match &deps.remember_me_manager {
            Some(manager) => {
                if let Err(err) = manager.on_successful_login(subject, token, account).await {
                    warn!("Delegate remember-me manager raised an error during on_successful_login, so remember-me services will not be performed for account [{:?}]: {}", account.identifiers().primary_identifier(), err);
                }
            }
            None => {
                debug!("No remember-me manager is configured, so remember-me services will not be performed for account [{:?}]", account.identifiers().primary_identifier());
            }
        }
    }

    async fn remember_me_failed_login(
        &self,
        deps: &Dependencies,
        existing: Option<&Subject>,
        token: &dyn AuthenticationToken,
        error: &Error,
    ) {
        if let Some(manager) = &deps.remember_me_manager {
            let anonymous = Subject::anonymous();
            let subject = existing.unwrap_or(&anonymous);
            if let Err(err) = manager.on_failed_login(subject, token, error).await {
                info!("on_failed_login hook raised an error; logging it and propagating the original authentication error: {}", err);
            }
        }
    }

    async fn remember_me_logout(&self, deps: &Dependencies, subject: &Subject) {
        if let Some(manager) = &deps.remember_me_manager {
            if let Err(err) = manager.on_logout(subject).await {
                warn!("Delegate remember-me manager raised an error during on_logout for subject with identifiers [{:?}]: {}", subject.identifiers(), err);
            }
        }
    }
}

pub struct SecurityManagerBuilder {
    authenticator: Option<Arc<dyn Authenticator>>,
    authorizer: Option<Arc<dyn Authorizer>>,
    realms: Vec<Arc<dyn Realm>>,
    session_coordinator: Arc<dyn session::Coordinator>,
    remember_me_manager: Option<Arc<dyn remember::Manager>>,
    subject_store: Option<Arc<dyn store::Store>>,
    subject_factory: Arc<dyn SubjectFactory>,
    event_bus: Arc<dyn event::Bus>,
    cache_manager: Arc<dyn cache::Manager>,
}

impl SecurityManagerBuilder {
    fn new() -> Self {
        Self {
            authenticator: None,
            authorizer: None,
            realms: Vec::new(),
            session_coordinator: Arc::new(session::Memory::new()),
            remember_me_manager: None,
            subject_store: None,
            subject_factory: Arc::new(DefaultSubjectFactory),
            event_bus: Arc::new(event::Broadcast::new()),
            cache_manager: Arc::new(cache::Disabled),
        }
    }

    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    #[must_use]
    pub fn authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    #[must_use]
    pub fn realms(mut self, realms: Vec<Arc<dyn Realm>>) -> Self {
        self.realms = realms;
        self
    }

    #[must_use]
    pub fn session_coordinator(
        mut self,
        session_coordinator: Arc<dyn session::Coordinator>,
    ) -> Self {
        self.session_coordinator = session_coordinator;
        self
    }

    #[must_use]
    pub fn remember_me_manager(mut self, remember_me_manager: Arc<dyn remember::Manager>) -> Self {
        self.remember_me_manager = Some(remember_me_manager);
        self
    }

    #[must_use]
    pub fn subject_store(mut self, subject_store: Arc<dyn store::Store>) -> Self {
        self.subject_store = Some(subject_store);
        self
    }

    #[must_use]
    pub fn subject_factory(mut self, subject_factory: Arc<dyn SubjectFactory>) -> Self {
        self.subject_factory = subject_factory;
        self
    }

    #[must_use]
    pub fn event_bus(mut self, event_bus: Arc<dyn event::Bus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    #[must_use]
    pub fn cache_manager(mut self, cache_manager: Arc<dyn cache::Manager>) -> Self {
        self.cache_manager = cache_manager;
        self
    }

    pub fn build(self) -> Result<Arc<SecurityManager>> {
        let authenticator = self.authenticator.ok_or_else(|| {
            Error::IllegalArgument("authenticator parameter must have a value".to_owned())
        })?;
        let authorizer = self.authorizer.ok_or_else(|| {
            Error::IllegalArgument("authorizer parameter must have a value".to_owned())
        })?;

        let deps = Dependencies {
            version: 0,
            authenticator,
            authorizer,
            realms: self.realms,
            session_coordinator: self.session_coordinator,
            remember_me_manager: self.remember_me_manager,
            subject_store: self.subject_store,
            subject_factory: self.subject_factory,
            event_bus: self.event_bus,
            cache_manager: self.cache_manager,
        };

        let manager = Arc::new_cyclic(|me| SecurityManager {
            me: me.clone(),
            deps: ArcSwap::from_pointee(deps),
        });

        let deps = manager.deps();
        SecurityManager::apply_event_bus(&deps);
        SecurityManager::apply_cache_manager(&deps);
        SecurityManager::forward_realms(&deps);

        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use secrecy::{ExposeSecret, SecretString};
    use subtle::ConstantTimeEq;

    use crate::{
        authc::{LogoutAware, UsernamePasswordToken},
        component::{RealmConsumer, SecurityComponent},
        remember::{cipher::CipherKey, Store},
        session::Coordinator,
    };

    use super::*;

    struct FixedAuthenticator {
        username: String,
        password: SecretString,
        logged_out: tokio::sync::Mutex<Vec<IdentifierCollection>>,
    }

    impl FixedAuthenticator {
        fn new(username: &str, password: &str) -> Self {
            Self {
                username: username.to_owned(),
                password: SecretString::new(password.to_owned()),
                logged_out: tokio::sync::Mutex::new(Vec::new()),
            }
        }
    }

    impl SecurityComponent for FixedAuthenticator {}

    #[async_trait]
    impl Authenticator for FixedAuthenticator {
        async fn authenticate_account(&self, token: &dyn AuthenticationToken) -> Result<Account> {
            let identifier = token
                .identifier()
                .ok_or(error::Authentication::UnsupportedToken)?;
            if identifier != self.username {
                return Err(error::Authentication::UnknownAccount(identifier.to_owned()).into());
            }

            let credentials = token
                .credentials()
                .ok_or(error::Authentication::UnsupportedToken)?;
            if credentials
                .expose_secret()
                .as_bytes()
                .ct_eq(self.password.expose_secret().as_bytes())
                .unwrap_u8()
                != 1
            {
                return Err(error::Authentication::IncorrectCredentials.into());
            }

            Ok(Account::new(IdentifierCollection::from_identifier(
                identifier,
            )))
        }

        fn as_logout_aware(&self) -> Option<&dyn LogoutAware> {
            Some(self)
        }
    }

    #[async_trait]
    impl LogoutAware for FixedAuthenticator {
        async fn on_logout(&self, identifiers: &IdentifierCollection) {
            let mut logged_out = self.logged_out.lock().await;
            logged_out.push(identifiers.clone());
        }
    }

    struct SetAuthorizer {
        permissions: HashSet<String>,
        roles: HashSet<String>,
        realm_count: AtomicUsize,
    }

    impl SetAuthorizer {
        fn new<const N: usize, const M: usize>(
            permissions: [&str; N],
            roles: [&str; M],
        ) -> Self {
            Self {
                permissions: permissions.iter().map(|&p| p.to_owned()).collect(),
                roles: roles.iter().map(|&r| r.to_owned()).collect(),
                realm_count: AtomicUsize::new(0),
            }
        }
    }

    impl SecurityComponent for SetAuthorizer {
        fn as_realm_consumer(&self) -> Option<&dyn RealmConsumer> {
            Some(self)
        }
    }

    impl RealmConsumer for SetAuthorizer {
        fn apply_realms(&self, realms: &[Arc<dyn Realm>]) {
            self.realm_count.store(realms.len(), Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Authorizer for SetAuthorizer {
        async fn is_permitted(
            &self,
            _identifiers: &IdentifierCollection,
            permissions: &[String],
        ) -> Result<Vec<(String, bool)>> {
            Ok(permissions
                .iter()
                .map(|permission| (permission.clone(), self.permissions.contains(permission)))
                .collect())
        }

        async fn is_permitted_all(
            &self,
            _identifiers: &IdentifierCollection,
            permissions: &[String],
        ) -> Result<bool> {
            Ok(permissions
                .iter()
                .all(|permission| self.permissions.contains(permission)))
        }

        async fn check_permission(
            &self,
            identifiers: &IdentifierCollection,
            permissions: &[String],
        ) -> Result<()> {
            for (permission, permitted) in self.is_permitted(identifiers, permissions).await? {
                if !permitted {
                    return Err(error::Authorization::PermissionDenied(permission).into());
                }
            }
            Ok(())
        }

        async fn has_role(
            &self,
            _identifiers: &IdentifierCollection,
            roles: &[String],
        ) -> Result<Vec<(String, bool)>> {
            Ok(roles
                .iter()
                .map(|role| (role.clone(), self.roles.contains(role)))
                .collect())
        }

        async fn has_all_roles(
            &self,
            _identifiers: &IdentifierCollection,
            roles: &[String],
        ) -> Result<bool> {
            Ok(roles.iter().all(|role| self.roles.contains(role)))
        }

        async fn check_role(
            &self,
            identifiers: &IdentifierCollection,
            roles: &[String],
        ) -> Result<()> {
            for (role, held) in self.has_role(identifiers, roles).await? {
                if !held {
                    return Err(error::Authorization::RoleMissing(role).into());
                }
            }
            Ok(())
        }
    }

    struct StaticRealm(&'static str);

    impl SecurityComponent for StaticRealm {}

    impl Realm for StaticRealm {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingFactory {
        bus: Mutex<Option<Arc<dyn event::Bus>>>,
    }

    impl SecurityComponent for RecordingFactory {
        fn as_event_consumer(&self) -> Option<&dyn EventBusConsumer> {
            Some(self)
        }
    }

    impl EventBusConsumer for RecordingFactory {
        fn apply_event_bus(&self, event_bus: Arc<dyn event::Bus>) {
            *self.bus.lock().unwrap() = Some(event_bus);
        }
    }

    impl SubjectFactory for RecordingFactory {
        fn create_subject(&self, context: &SubjectContext) -> Subject {
            DefaultSubjectFactory.create_subject(context)
        }
    }

    struct Fixture {
        manager: Arc<SecurityManager>,
        authenticator: Arc<FixedAuthenticator>,
        authorizer: Arc<SetAuthorizer>,
        subject_store: Arc<store::Memory>,
        remember_store: Arc<remember::Memory>,
        event_bus: Arc<event::Broadcast>,
        session_coordinator: Arc<session::Memory>,
    }

    fn fixture() -> Result<Fixture> {
        fixture_with_coordinator(Arc::new(session::Memory::new()))
    }

    fn fixture_with_coordinator(session_coordinator: Arc<session::Memory>) -> Result<Fixture> {
        let authenticator = Arc::new(FixedAuthenticator::new("alice", "correct"));
        let authorizer = Arc::new(SetAuthorizer::new(["document:read"], ["admin"]));
        let subject_store = Arc::new(store::Memory::new());
        let remember_store = Arc::new(remember::Memory::new());
        let remember_me_manager = Arc::new(remember::StoreManager::with_cipher_key(
            Arc::clone(&remember_store) as Arc<dyn remember::Store>,
            CipherKey::random(),
        ));
        let event_bus = Arc::new(event::Broadcast::new());

        let manager = SecurityManager::builder()
            .authenticator(Arc::clone(&authenticator) as Arc<dyn Authenticator>)
            .authorizer(Arc::clone(&authorizer) as Arc<dyn Authorizer>)
            .session_coordinator(
                Arc::clone(&session_coordinator) as Arc<dyn session::Coordinator>
            )
            .remember_me_manager(remember_me_manager as Arc<dyn remember::Manager>)
            .subject_store(Arc::clone(&subject_store) as Arc<dyn store::Store>)
            .event_bus(Arc::clone(&event_bus) as Arc<dyn event::Bus>)
            .build()?;

        Ok(Fixture {
            manager,
            authenticator,
            authorizer,
            subject_store,
            remember_store,
            event_bus,
            session_coordinator,
        })
    }

    fn correct_token() -> UsernamePasswordToken {
        UsernamePasswordToken::new("alice", SecretString::new("correct".to_owned()))
    }

    async fn remembered_record(fixture: &Fixture) -> Result<Option<Vec<u8>>> {
        fixture
            .remember_store
            .get_remembered_serialized_identity(&SubjectContext::new())
            .await
    }

    #[tokio::test]
    async fn login_returns_the_subject_and_saves_it() -> Result<()> {
        let f = fixture()?;
        let mut events = f.event_bus.subscribe();

        let subject = f.manager.login(None, &correct_token()).await?;

        assert_eq!(subject.primary_identifier(), Some("alice"));
        assert!(subject.is_authenticated());
        assert!(f.subject_store.get("alice").await.is_some());

        match events.try_recv() {
            Ok(SecurityEvent::LoginSuccess { identifiers }) => {
                assert_eq!(identifiers.primary_identifier(), Some("alice"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        Ok(())
    }

    #[tokio::test]
    async fn failed_login_surfaces_the_original_error_and_saves_nothing() -> Result<()> {
        let f = fixture()?;

        // Establish a remembered identity first so we can observe it being
        // forgotten by the failed attempt.
        let remembered = f
            .manager
            .login(None, &correct_token().with_remember_me())
            .await?;
        assert!(remembered_record(&f).await?.is_some());

        let token = UsernamePasswordToken::new("alice", SecretString::new("wrong".to_owned()));
        match f.manager.login(None, &token).await {
            Err(Error::Authentication(error::Authentication::IncorrectCredentials)) => {}
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }

        assert!(remembered_record(&f).await?.is_none());
        // Only the earlier successful login's subject is in the store.
        assert_eq!(f.subject_store.len().await, 1);
        drop(remembered);

        Ok(())
    }

    #[tokio::test]
    async fn remembered_identity_resolves_into_new_subjects() -> Result<()> {
        let f = fixture()?;

        let _logged_in = f
            .manager
            .login(None, &correct_token().with_remember_me())
            .await?;

        let subject = f
            .manager
            .create_subject(None, None, None, Some(&SubjectContext::new()))
            .await?;

        assert_eq!(subject.primary_identifier(), Some("alice"));
        // A remembered identity is recognition, not authentication.
        assert!(!subject.is_authenticated());

        Ok(())
    }

    #[tokio::test]
    async fn logout_forgets_deletes_and_stops() -> Result<()> {
        let f = fixture()?;

        let logged_in = f
            .manager
            .login(None, &correct_token().with_remember_me())
            .await?;
        let session = f.manager.start_session(&SessionContext::new()).await?;

        let mut context = SubjectContext::new();
        context.set_session_key(*session.key());
        context.set_identifiers(logged_in.identifiers().cloned().unwrap());
        context.set_authenticated(true);
        let subject = f
            .manager
            .create_subject(None, None, None, Some(&context))
            .await?;
        assert_eq!(subject.session(), Some(&session));

        f.manager.logout(Some(&subject)).await?;

        assert!(remembered_record(&f).await?.is_none());
        let logged_out = f.authenticator.logged_out.lock().await;
        assert_eq!(logged_out.len(), 1);
        assert_eq!(logged_out[0].primary_identifier(), Some("alice"));
        drop(logged_out);
        assert!(f
            .subject_store
            .get(&session.key().to_string())
            .await
            .is_none());
        match f.session_coordinator.get_session(session.key()).await {
            Err(Error::Session(error::Session::Stopped(_))) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        // With the record forgotten, a fresh construction never
        // reconstructs the old identity.
        let resolved = f
            .manager
            .create_subject(None, None, None, Some(&SubjectContext::new()))
            .await?;
        assert!(resolved.is_anonymous());

        Ok(())
    }

    #[tokio::test]
    async fn logout_of_an_absent_subject_is_an_illegal_argument() -> Result<()> {
        let f = fixture()?;

        let _logged_in = f
            .manager
            .login(None, &correct_token().with_remember_me())
            .await?;

        match f.manager.logout(None).await {
            Err(Error::IllegalArgument(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        // No side effects: the remembered identity and stored subject are
        // untouched.
        assert!(remembered_record(&f).await?.is_some());
        assert!(f.subject_store.get("alice").await.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn expired_sessions_resolve_to_sessionless_subjects() -> Result<()> {
        let f = fixture_with_coordinator(Arc::new(session::Memory::with_timeout(
            Duration::ZERO,
        )))?;

        let session = f.manager.start_session(&SessionContext::new()).await?;

        let mut context = SubjectContext::new();
        context.set_session_key(*session.key());
        let subject = f
            .manager
            .create_subject(None, None, None, Some(&context))
            .await?;

        assert!(subject.session().is_none());

        Ok(())
    }

    #[tokio::test]
    async fn unknown_session_keys_resolve_to_sessionless_subjects() -> Result<()> {
        let f = fixture()?;

        let mut context = SubjectContext::new();
        context.set_session_key(SessionKey::generate());
        let subject = f
            .manager
            .create_subject(None, None, None, Some(&context))
            .await?;

        assert!(subject.session().is_none());

        Ok(())
    }

    #[tokio::test]
    async fn authorization_is_delegated() -> Result<()> {
        let f = fixture()?;
        let identifiers = IdentifierCollection::from_identifier("alice");

        let decisions = f
            .manager
            .is_permitted(
                &identifiers,
                &["document:read".to_owned(), "document:write".to_owned()],
            )
            .await?;
        assert_eq!(
            decisions,
            vec![
                ("document:read".to_owned(), true),
                ("document:write".to_owned(), false),
            ]
        );

        f.manager
            .check_permission(&identifiers, &["document:read".to_owned()])
            .await?;
        match f
            .manager
            .check_permission(&identifiers, &["document:write".to_owned()])
            .await
        {
            Err(Error::Authorization(error::Authorization::PermissionDenied(permission))) => {
                assert_eq!(permission, "document:write");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        assert!(f.manager.has_all_roles(&identifiers, &["admin".to_owned()]).await?);
        match f
            .manager
            .check_role(&identifiers, &["auditor".to_owned()])
            .await
        {
            Err(Error::Authorization(error::Authorization::RoleMissing(role))) => {
                assert_eq!(role, "auditor");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        Ok(())
    }

    #[tokio::test]
    async fn missing_subject_store_fails_saves() -> Result<()> {
        let manager = SecurityManager::builder()
            .authenticator(Arc::new(FixedAuthenticator::new("alice", "correct"))
                as Arc<dyn Authenticator>)
            .authorizer(Arc::new(SetAuthorizer::new([], [])) as Arc<dyn Authorizer>)
            .build()?;

        match manager.login(None, &correct_token()).await {
            Err(Error::Store(error::Store::Save(_))) => {}
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }

        Ok(())
    }

    #[tokio::test]
    async fn reassigning_the_event_bus_propagates_to_consumers() -> Result<()> {
        let factory = Arc::new(RecordingFactory::default());
        let manager = SecurityManager::builder()
            .authenticator(Arc::new(FixedAuthenticator::new("alice", "correct"))
                as Arc<dyn Authenticator>)
            .authorizer(Arc::new(SetAuthorizer::new([], [])) as Arc<dyn Authorizer>)
            .subject_factory(Arc::clone(&factory) as Arc<dyn SubjectFactory>)
            .build()?;

        // Building already wired the initial bus in.
        assert!(factory.bus.lock().unwrap().is_some());

        let version = manager.snapshot_version();
        let new_bus: Arc<dyn event::Bus> = Arc::new(event::Broadcast::new());
        manager.set_event_bus(Arc::clone(&new_bus));

        assert!(manager.snapshot_version() > version);
        let seen = factory.bus.lock().unwrap().clone().unwrap();
        assert!(Arc::ptr_eq(&seen, &new_bus));

        Ok(())
    }

    #[tokio::test]
    async fn realms_are_forwarded_to_consumers() -> Result<()> {
        let f = fixture()?;

        f.manager.set_realms(vec![
            Arc::new(StaticRealm("users")) as Arc<dyn Realm>,
            Arc::new(StaticRealm("services")) as Arc<dyn Realm>,
        ])?;
        assert_eq!(f.authorizer.realm_count.load(Ordering::SeqCst), 2);

        match f.manager.set_realms(Vec::new()) {
            Err(Error::IllegalArgument(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        Ok(())
    }

    #[tokio::test]
    async fn building_without_an_authenticator_is_an_illegal_argument() {
        let result = SecurityManager::builder()
            .authorizer(Arc::new(SetAuthorizer::new([], [])) as Arc<dyn Authorizer>)
            .build();

        match result {
            Err(Error::IllegalArgument(_)) => {}
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}

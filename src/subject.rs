// SPDX-FileCopyrightText: 2025-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{fmt, sync::Arc};

use crate::{
    authc::Account,
    component::SecurityComponent,
    identity::IdentifierCollection,
    manager::SecurityManager,
    session::{Session, SessionKey},
};

/// The principal an operation executes on behalf of. A subject with no
/// identifiers is anonymous; a subject with no session is session-less.
/// Owned by the caller after construction.
#[derive(Debug, Default, Clone)]
pub struct Subject {
    identifiers: Option<IdentifierCollection>,
    session: Option<Session>,
    host: Option<String>,
    authenticated: bool,
}

impl Subject {
    pub fn new(
        identifiers: Option<IdentifierCollection>,
        session: Option<Session>,
        host: Option<String>,
        authenticated: bool,
    ) -> Self {
        Self {
            identifiers,
            session,
            host,
            authenticated,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn identifiers(&self) -> Option<&IdentifierCollection> {
        self.identifiers.as_ref()
    }

    pub fn primary_identifier(&self) -> Option<&str> {
        self.identifiers
            .as_ref()
            .and_then(IdentifierCollection::primary_identifier)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn is_anonymous(&self) -> bool {
        self.identifiers
            .as_ref()
            .map_or(true, IdentifierCollection::is_empty)
    }
}

/// Request-scoped resolution hints used to construct a subject. The security
/// manager resolves sessions and remembered identity into the context so the
/// subject factory never needs to know how; the factory only reads the
/// `resolve_*` accessors.
///
/// Cloning produces the shallow copy used when a caller supplies a
/// pre-populated context that must not be mutated in place.
#[derive(Default, Clone)]
pub struct SubjectContext {
    security_manager: Option<Arc<SecurityManager>>,
    session: Option<Session>,
    session_key: Option<SessionKey>,
    identifiers: Option<IdentifierCollection>,
    host: Option<String>,
    account: Option<Account>,
    subject: Option<Subject>,
    authenticated: bool,
}

impl SubjectContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn security_manager(&self) -> Option<&Arc<SecurityManager>> {
        self.security_manager.as_ref()
    }

    /// Attaches a security manager reference. Once a reference is set it is
    /// never overwritten; later calls are ignored.
    pub fn set_security_manager(&mut self, security_manager: Arc<SecurityManager>) {
        if self.security_manager.is_none() {
            self.security_manager = Some(security_manager);
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn session_key(&self) -> Option<&SessionKey> {
        self.session_key.as_ref()
    }

    pub fn set_session_key(&mut self, session_key: SessionKey) {
        self.session_key = Some(session_key);
    }

    pub fn identifiers(&self) -> Option<&IdentifierCollection> {
        self.identifiers.as_ref()
    }

    pub fn set_identifiers(&mut self, identifiers: IdentifierCollection) {
        self.identifiers = Some(identifiers);
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn set_host<T: Into<String>>(&mut self, host: T) {
        self.host = Some(host.into());
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn set_account(&mut self, account: Account) {
        self.account = Some(account);
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    pub fn set_subject(&mut self, subject: Subject) {
        self.subject = Some(subject);
    }

    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }

    /// The identifiers to construct the subject with: explicitly provided
    /// identifiers win over the authenticated account's, which win over the
    /// existing subject's.
    pub fn resolve_identifiers(&self) -> Option<&IdentifierCollection> {
        self.identifiers
            .as_ref()
            .or_else(|| self.account.as_ref().map(Account::identifiers))
            .or_else(|| self.subject.as_ref().and_then(Subject::identifiers))
    }

    /// The session to bind, if one has already been resolved: an explicitly
    /// provided session wins over the existing subject's.
    pub fn resolve_session(&self) -> Option<&Session> {
        self.session
            .as_ref()
            .or_else(|| self.subject.as_ref().and_then(Subject::session))
    }

    pub fn resolve_host(&self) -> Option<&str> {
        self.host
            .as_deref()
            .or_else(|| self.resolve_session().and_then(Session::host))
    }

    pub fn resolve_authenticated(&self) -> bool {
        self.authenticated || self.account.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.security_manager.is_none()
            && self.session.is_none()
            && self.session_key.is_none()
            && self.identifiers.is_none()
            && self.host.is_none()
            && self.account.is_none()
            && self.subject.is_none()
            && !self.authenticated
    }
}

impl fmt::Debug for SubjectContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubjectContext")
            .field("session", &self.session)
            .field("session_key", &self.session_key)
            .field("identifiers", &self.identifiers)
            .field("host", &self.host)
            .field("authenticated", &self.authenticated)
            .finish_non_exhaustive()
    }
}

/// Constructs subjects from fully resolved contexts. Implementations should
/// not perform session lookups or remember-me decoding; the security manager
/// has already done both by the time the factory runs.
pub trait SubjectFactory: SecurityComponent {
    fn create_subject(&self, context: &SubjectContext) -> Subject;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSubjectFactory;

impl SecurityComponent for DefaultSubjectFactory {}

impl SubjectFactory for DefaultSubjectFactory {
    fn create_subject(&self, context: &SubjectContext) -> Subject {
        Subject::new(
            context.resolve_identifiers().cloned(),
            context.resolve_session().cloned(),
            context.resolve_host().map(ToOwned::to_owned),
            context.resolve_authenticated(),
        )
    }
}

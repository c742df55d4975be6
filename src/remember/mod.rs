// SPDX-FileCopyrightText: 2025-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

pub mod cipher;
pub mod codec;
mod store;

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use log::{debug, warn};

use crate::{
    authc::{Account, AuthenticationToken, RememberMeToken},
    error::{Error, Result},
    identity::IdentifierCollection,
    subject::{Subject, SubjectContext},
};

use cipher::CipherKey;

pub use store::{File, Memory, Store};

/// Determines whether remember-me services should be performed for the given
/// token. True iff the token is present, is a remember-me-capable variant,
/// and has its remember-me flag set.
pub fn is_remember_me(token: Option<&dyn AuthenticationToken>) -> bool {
    token
        .and_then(AuthenticationToken::as_remember_me)
        .map_or(false, RememberMeToken::is_remember_me)
}

/// Maintains a sealed record of who was last authenticated, independent of
/// the active session, so a returning caller can be recognized without
/// re-entering credentials.
///
/// Every operation returns a `Result` so the security manager can decide
/// whether a failure is logged and suppressed (the login/logout hooks) or
/// surfaced (direct reads).
#[async_trait]
pub trait Manager: Send + Sync {
    /// Reacts to a successful login: any previously remembered identity is
    /// always cleared first, and the new identity is remembered iff the
    /// token requests it.
    async fn on_successful_login(
        &self,
        subject: &Subject,
        token: &dyn AuthenticationToken,
        account: &Account,
    ) -> Result<()>;

    /// Reacts to a failed login by forgetting any remembered identity, in
    /// case the attempt was not executed by the expected caller.
    async fn on_failed_login(
        &self,
        subject: &Subject,
        token: &dyn AuthenticationToken,
        error: &Error,
    ) -> Result<()>;

    async fn on_logout(&self, subject: &Subject) -> Result<()>;

    /// Retrieves and unseals the remembered identity for the given
    /// construction context, or `None` if nothing is remembered.
    async fn get_remembered_identifiers(
        &self,
        context: &SubjectContext,
    ) -> Result<Option<IdentifierCollection>>;
}

/// The storage-backed manager: identity is serialized, sealed with the
/// configured cipher key, and handed to a [`Store`] backend; retrieval
/// reverses the pipeline.
pub struct StoreManager {
    store: Arc<dyn Store>,
    cipher_key: ArcSwap<CipherKey>,
    plaintext_fallback: bool,
}

impl StoreManager {
    /// Creates a manager sealing records with the well-known
    /// [`cipher::DEFAULT_CIPHER_KEY`]. Replace it before any production use.
    pub fn new(store: Arc<dyn Store>) -> Self {
        warn!("Remember-me records will be sealed with the well-known default cipher key until you configure your own with set_cipher_key");
        Self::with_cipher_key(store, cipher::DEFAULT_CIPHER_KEY.clone())
    }

    pub fn with_cipher_key(store: Arc<dyn Store>, key: CipherKey) -> Self {
        Self {
            store,
            cipher_key: ArcSwap::from_pointee(key),
            plaintext_fallback: true,
        }
    }

    /// Disables the migration fallback that retries an undecryptable record
    /// as a legacy unsealed one. With the fallback off, any record that does
    /// not unseal with the configured key is purged and the failure is
    /// surfaced.
    #[must_use]
    pub fn without_plaintext_fallback(mut self) -> Self {
        self.plaintext_fallback = false;
        self
    }

    /// Replaces the cipher key. The cipher is symmetric, so this replaces
    /// the encryption and decryption halves of the pair as one unit.
    pub fn set_cipher_key(&self, key: CipherKey) {
        self.cipher_key.store(Arc::new(key));
    }

    /// Remembers the given identifiers, deriving them from the account when
    /// none are given explicitly.
    pub async fn remember_identity(
        &self,
        subject: &Subject,
        identifiers: Option<&IdentifierCollection>,
        account: Option<&Account>,
    ) -> Result<()> {
        let identifiers = match identifiers {
            Some(identifiers) => identifiers,
            None => account.map(Account::identifiers).ok_or_else(|| {
                Error::IllegalArgument(
                    "neither identifiers nor an account were supplied to remember".to_owned(),
                )
            })?,
        };

        let serialized = codec::serialize(identifiers)?;
        let key = self.cipher_key.load_full();
        let sealed = cipher::encrypt(&key, &serialized)?;
        self.store
            .remember_serialized_identity(subject, &sealed)
            .await
    }

    fn convert_bytes_to_identifiers(&self, sealed: &[u8]) -> Result<IdentifierCollection> {
        let key = self.cipher_key.load_full();
        let serialized = match cipher::decrypt(&key, sealed) {
            Ok(serialized) => serialized,
            Err(err) if self.plaintext_fallback => {
                debug!("Record could not be unsealed, so we'll try it as a legacy unsealed record: {}", err);
                sealed.to_vec()
            }
            Err(err) => return Err(err),
        };

        codec::deserialize(&serialized)
    }

    /// Purges the unusable record, then hands the original error back for
    /// propagation. The purge is best-effort; a failure to forget never
    /// masks the original error.
    async fn on_remembered_identifiers_failure(
        &self,
        err: Error,
        context: &SubjectContext,
    ) -> Error {
        warn!("Failed to retrieve the remembered identity, possibly because of a changed cipher key or a corrupted record; it will be forgotten and not used: {}", err);

        if let Err(forget_err) = self.store.forget_context_identity(context).await {
            warn!(
                "Failed to forget the unusable remembered identity record: {}",
                forget_err
            );
        }

        err
    }
}

#[async_trait]
impl Manager for StoreManager {
    async fn on_successful_login(
        &self,
        subject: &Subject,
        token: &dyn AuthenticationToken,
        account: &Account,
    ) -> Result<()> {
        // Always clear any previously remembered identity first.
        self.store.forget_identity(subject).await?;

        if is_remember_me(Some(token)) {
            self.remember_identity(subject, None, Some(account)).await
        } else {
            debug!("The authentication token did not indicate that remember-me is requested, so nothing will be remembered for this account");
            Ok(())
        }
    }

    async fn on_failed_login(
        &self,
        subject: &Subject,
        _token: &dyn AuthenticationToken,
        _error: &Error,
    ) -> Result<()> {
        self.store.forget_identity(subject).await
    }

    async fn on_logout(&self, subject: &Subject) -> Result<()> {
        self.store.forget_identity(subject).await
    }

    async fn get_remembered_identifiers(
        &self,
        context: &SubjectContext,
    ) -> Result<Option<IdentifierCollection>> {
        let sealed = match self.store.get_remembered_serialized_identity(context).await {
            Ok(sealed) => sealed,
            Err(err) => return Err(self.on_remembered_identifiers_failure(err, context).await),
        };

        match sealed {
            None => Ok(None),
            Some(sealed) => match self.convert_bytes_to_identifiers(&sealed) {
                Ok(identifiers) => Ok(Some(identifiers)),
                Err(err) => Err(self.on_remembered_identifiers_failure(err, context).await),
            },
        }
    }
}

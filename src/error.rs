// SPDX-FileCopyrightText: 2025-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{io, result};

use thiserror::Error;

use crate::session::SessionKey;

pub type Result<T, E = Error> = result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    IllegalArgument(String),
    #[error("IO operation failed: {0}")]
    Io(#[from] io::Error),
    #[error("authentication error: {0}")]
    Authentication(#[from] Authentication),
    #[error("authorization error: {0}")]
    Authorization(#[from] Authorization),
    #[error("session error: {0}")]
    Session(#[from] Session),
    #[error("subject persistence error: {0}")]
    Store(#[from] Store),
    #[error("cipher error: {0}")]
    Crypto(#[from] Crypto),
    #[error("identity codec error: {0}")]
    Codec(#[from] Codec),
}

#[derive(Error, Debug)]
pub enum Authentication {
    #[error(r#"no account found for identifier "{}""#, .0.escape_default())]
    UnknownAccount(String),
    #[error("submitted credentials do not match the stored credentials")]
    IncorrectCredentials,
    #[error("authentication token variant is not supported by this authenticator")]
    UnsupportedToken,
}

#[derive(Error, Debug)]
pub enum Authorization {
    #[error(r#"subject is not permitted "{}""#, .0.escape_default())]
    PermissionDenied(String),
    #[error(r#"subject does not have role "{}""#, .0.escape_default())]
    RoleMissing(String),
}

/// A referenced session record exists but is no longer usable. An absent
/// record is not an error; session lookups signal it with `Ok(None)`.
#[derive(Error, Debug)]
pub enum Session {
    #[error("session {0} has expired")]
    Expired(SessionKey),
    #[error("session {0} has been stopped")]
    Stopped(SessionKey),
}

#[derive(Error, Debug)]
pub enum Store {
    #[error("cannot save subject: {0}")]
    Save(String),
    #[error("cannot delete subject: {0}")]
    Delete(String),
}

#[derive(Error, Debug)]
pub enum Crypto {
    #[error("cipher key must be {0} bytes, but got {1} bytes")]
    KeyLength(usize, usize),
    #[error("cipher key is not valid base64: {0}")]
    KeyEncoding(#[source] base64::DecodeError),
    #[error("sealed record is malformed: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("sealed record could not be authenticated")]
    MessageAuthenticationFailure,
    #[error("decrypted record has invalid padding: {0}")]
    Padding(#[from] block_padding::UnpadError),
}

#[derive(Error, Debug)]
pub enum Codec {
    #[error("identity serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("identity deserialization failed: {0}")]
    Deserialize(#[source] serde_json::Error),
}

// SPDX-FileCopyrightText: 2025-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use crate::{
    error::{self, Result},
    identity::IdentifierCollection,
};

/// Converts an identifier collection to the binary form the cipher operates
/// on.
pub fn serialize(identifiers: &IdentifierCollection) -> Result<Vec<u8>> {
    serde_json::to_vec(identifiers).map_err(|err| error::Codec::Serialize(err).into())
}

pub fn deserialize(serialized: &[u8]) -> Result<IdentifierCollection> {
    serde_json::from_slice(serialized).map_err(|err| error::Codec::Deserialize(err).into())
}

// SPDX-FileCopyrightText: 2025-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::{component::SecurityComponent, error::Result, identity::IdentifierCollection};

/// Access-control decisions over a subject's identifiers. The permission and
/// role grammars are defined by the implementation; this contract only fixes
/// how decisions are surfaced.
///
/// The `check_*` variants fail with an authorization error instead of
/// returning a decision.
#[async_trait]
pub trait Authorizer: SecurityComponent {
    /// Evaluates each permission and returns it paired with the decision.
    async fn is_permitted(
        &self,
        identifiers: &IdentifierCollection,
        permissions: &[String],
    ) -> Result<Vec<(String, bool)>>;

    async fn is_permitted_all(
        &self,
        identifiers: &IdentifierCollection,
        permissions: &[String],
    ) -> Result<bool>;

    async fn check_permission(
        &self,
        identifiers: &IdentifierCollection,
        permissions: &[String],
    ) -> Result<()>;

    /// Evaluates each role and returns it paired with the decision.
    async fn has_role(
        &self,
        identifiers: &IdentifierCollection,
        roles: &[String],
    ) -> Result<Vec<(String, bool)>>;

    async fn has_all_roles(
        &self,
        identifiers: &IdentifierCollection,
        roles: &[String],
    ) -> Result<bool>;

    async fn check_role(
        &self,
        identifiers: &IdentifierCollection,
        roles: &[String],
    ) -> Result<()>;
}

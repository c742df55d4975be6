// SPDX-FileCopyrightText: 2025-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(elided_lifetimes_in_paths)]
#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused,
    unused_lifetimes,
    unused_qualifications,
    unused_results,
    anonymous_parameters,
    deprecated_in_future,
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    keyword_idents,
    macro_use_extern_crate,
    trivial_casts,
    trivial_numeric_casts,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::unseparated_literal_suffix,
    clippy::decimal_literal_representation,
    clippy::single_char_lifetime_names,
    clippy::fallible_impl_from,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::wildcard_enum_match_arm,
    clippy::deref_by_slicing,
    clippy::default_numeric_fallback,
    clippy::shadow_reuse,
    clippy::clone_on_ref_ptr,
    clippy::todo,
    clippy::string_add,
    clippy::use_debug,
    clippy::future_not_send
)]
#![cfg_attr(not(test), warn(clippy::panic_in_result_fn))]

pub mod authc;
pub mod authz;
pub mod cache;
pub mod component;
pub mod error;
pub mod event;
pub mod identity;
pub mod manager;
pub mod remember;
mod rng;
pub mod session;
pub mod store;
pub mod subject;

pub use crate::{
    authc::{
        Account, AuthenticationToken, Authenticator, LogoutAware, RememberMeToken,
        UsernamePasswordToken,
    },
    authz::Authorizer,
    component::{Realm, SecurityComponent},
    error::{Error, Result},
    identity::IdentifierCollection,
    manager::{SecurityManager, SecurityManagerBuilder},
    subject::{Subject, SubjectContext, SubjectFactory},
};

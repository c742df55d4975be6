// SPDX-FileCopyrightText: 2025-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::cell::RefCell;

use rand::{thread_rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

thread_local! {
    // LINT: We need a working random number generator for the crate to
    // function.
    #[allow(clippy::expect_used)]
    static RNG: RefCell<ChaCha20Rng> = RefCell::new(ChaCha20Rng::from_rng(thread_rng()).expect("random number generator failed to initialize"));
}

pub(crate) fn map<F, R>(mut f: F) -> R
where
    F: FnMut(&mut ChaCha20Rng) -> R,
{
    RNG.with(|rng| f(&mut rng.borrow_mut()))
}

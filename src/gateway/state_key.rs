// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-auth0-proxy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;

/// Number of random bytes behind a state key (256 bits).
pub const STATE_KEY_BYTES: usize = 32;

/// Generates an unguessable `state` parameter for a login round trip.
///
/// The bytes come from the thread-local CSPRNG and are encoded as URL-safe
/// base64 without padding, so the key can be embedded in a query string as is.
/// Returns a 43-character string.
pub fn generate_state_key() -> String {
    let random_bytes: [u8; STATE_KEY_BYTES] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pluggable randomness for handshake key generation.
//!
//! Production uses the OS CSPRNG via `ring`. Tests inject a deterministic
//! generator; any closure `FnMut() -> u64` works, with whatever context it
//! captures.

use ring::rand::{SecureRandom, SystemRandom};
use tracing::error;

/// Source of random 64-bit words.
pub trait RandomSource: Send {
    fn next_u64(&mut self) -> u64;

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let word = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }
}

impl<F> RandomSource for F
where
    F: FnMut() -> u64 + Send,
{
    fn next_u64(&mut self) -> u64 {
        self()
    }
}

/// OS-backed secure random source.
#[derive(Clone)]
pub struct SystemRandomSource {
    rng: SystemRandom,
}

impl SystemRandomSource {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for SystemRandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SystemRandomSource {
    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    /// # Panics
    ///
    /// Panics if the OS generator fails. Inside a connection the panic is
    /// contained to the current call, which resolves to `TransportFailure`.
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        // A failing OS RNG leaves no safe way to key a handshake.
        if let Err(e) = self.rng.fill(dest) {
            error!(error = %e, "System random number generator failed");
            panic!("system random number generator failed: {e}");
        }
    }
}

impl std::fmt::Debug for SystemRandomSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SystemRandomSource")
    }
}

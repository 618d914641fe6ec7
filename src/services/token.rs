// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Random access tokens and record identifiers.

use crate::error::AppError;
use ring::rand::{SecureRandom, SystemRandom};

/// 256 bits, hex-encoded to 64 characters.
pub const TOKEN_BYTES: usize = 32;
const ID_BYTES: usize = 16;

/// Issues opaque tokens from the OS CSPRNG.
#[derive(Clone)]
pub struct TokenIssuer {
    rng: SystemRandom,
}

impl Default for TokenIssuer {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenIssuer {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }

    /// New bearer token for an access request.
    pub fn issue(&self) -> Result<String, AppError> {
        self.random_hex::<TOKEN_BYTES>()
    }

    /// New opaque record identifier.
    pub fn issue_id(&self) -> Result<String, AppError> {
        self.random_hex::<ID_BYTES>()
    }

    fn random_hex<const N: usize>(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; N];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("System random source failed")))?;
        Ok(hex::encode(bytes))
    }
}

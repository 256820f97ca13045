//! Session key generation.
//!
//! Keys are drawn from the OS CSPRNG. The short alphanumeric form matches what
//! existing clients expect (six characters by default); the secure form encodes
//! 16+ random bytes as base64url and should be preferred outside low-volume use.

use anyhow::{anyhow, Result};
use base64::Engine;

/// Shortest key any generator will produce.
pub const MIN_KEY_LEN: usize = 6;

const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
// Largest multiple of 62 that fits in a byte; values at or above it are rejected to avoid bias.
const ACCEPT_BELOW: u8 = 248;

pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> Result<String>;
}

/// Fixed-length key over `[a-zA-Z0-9]`.
#[derive(Debug, Clone)]
pub struct AlphanumericKeyGenerator {
    len: usize,
}

impl AlphanumericKeyGenerator {
    /// Lengths below `MIN_KEY_LEN` are raised to the floor.
    pub fn new(len: usize) -> Self { Self { len: len.max(MIN_KEY_LEN) } }

    pub fn len(&self) -> usize { self.len }
}

impl Default for AlphanumericKeyGenerator {
    fn default() -> Self { Self::new(MIN_KEY_LEN) }
}

impl KeyGenerator for AlphanumericKeyGenerator {
    fn generate(&self) -> Result<String> {
        let mut out = String::with_capacity(self.len);
        let mut buf = [0u8; 32];
        while out.len() < self.len {
            getrandom::getrandom(&mut buf).map_err(|e| anyhow!("entropy source failed: {e}"))?;
            for b in buf.iter().copied() {
                if b >= ACCEPT_BELOW { continue; }
                out.push(ALPHABET[(b % 62) as usize] as char);
                if out.len() == self.len { break; }
            }
        }
        Ok(out)
    }
}

/// Base64url (no padding) encoding of `bytes` random bytes.
#[derive(Debug, Clone)]
pub struct SecureKeyGenerator {
    bytes: usize,
}

impl SecureKeyGenerator {
    pub fn new(bytes: usize) -> Self { Self { bytes: bytes.max(16) } }
}

impl Default for SecureKeyGenerator {
    fn default() -> Self { Self::new(16) }
}

impl KeyGenerator for SecureKeyGenerator {
    fn generate(&self) -> Result<String> {
        let mut buf = vec![0u8; self.bytes];
        getrandom::getrandom(&mut buf).map_err(|e| anyhow!("entropy source failed: {e}"))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
    }
}

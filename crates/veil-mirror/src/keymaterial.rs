//! Key material generation for mirrored values.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Default length for generated storage keys and secrets.
pub const DEFAULT_KEY_LEN: usize = 16;

/// Generate a uniform random alphanumeric string of `len` characters.
///
/// Backed by the thread-local CSPRNG. Each call is independent; storage keys
/// and secrets are drawn separately, never derived from one another.
pub fn generate(len: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Source of key material.
///
/// Injectable at mirror construction so tests can substitute a deterministic
/// generator.
pub trait KeySource {
    /// Produce one random string of `len` alphanumeric characters.
    fn generate(&self, len: usize) -> String;
}

/// Production key source backed by the thread-local CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemKeySource;

impl KeySource for SystemKeySource {
    fn generate(&self, len: usize) -> String {
        generate(len)
    }
}

use std::fmt;

use sha2::{Digest, Sha256};

/// Cache lookup key derived from a `(model, input)` pair.
///
/// The digest is deterministic: identical model and input always produce the
/// same fingerprint, and any difference in either component (including
/// whitespace) produces a different one.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn compute(model: &str, input: &str) -> Self {
        let mut hasher = Sha256::new();
        // Length-prefix the model so ("ab", "c") and ("a", "bc") differ.
        hasher.update((model.len() as u64).to_le_bytes());
        hasher.update(model.as_bytes());
        hasher.update(input.as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", hex::encode(&self.0[..8]))
    }
}

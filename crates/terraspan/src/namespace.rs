//! Collision-free identifiers for parallel test runs.
//!
//! Every test generates one [`NamespaceToken`] and threads it into every
//! resource name it creates, so concurrently running tests sharing a cloud
//! account can never collide on names. Tokens come from the OS CSPRNG with
//! no shared counter, which keeps tests independent and parallel-safe.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;

/// Number of random bytes per token. 10 bytes is 80 bits of entropy, enough
/// to make birthday collisions across a full CI run (hundreds of tokens)
/// negligible.
const TOKEN_BYTES: usize = 10;

/// Length of the encoded token in characters.
pub const TOKEN_LEN: usize = TOKEN_BYTES * 2;

/// A unique, DNS-label-safe identifier for one test invocation.
///
/// The encoded form is 20 lowercase hex characters, short enough to leave
/// room for provider-imposed resource-name length limits when used as a
/// substring (`format!("lb-test-{token}")`).
///
/// Tokens are never recycled; dropping one simply forgets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceToken(String);

impl NamespaceToken {
    /// Generate a fresh token.
    ///
    /// Safe to call concurrently from any number of threads; there is no
    /// shared mutable state behind it.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NamespaceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NamespaceToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_token_is_dns_label_safe() {
        let token = NamespaceToken::generate();
        assert_eq!(token.as_str().len(), TOKEN_LEN);
        assert!(
            token
                .as_str()
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()),
            "token must only contain lowercase alphanumerics: {token}"
        );
    }

    #[test]
    fn test_tokens_are_unique_at_scale() {
        let tokens: HashSet<NamespaceToken> =
            (0..2000).map(|_| NamespaceToken::generate()).collect();
        assert_eq!(tokens.len(), 2000, "no two generated tokens may be equal");
    }

    #[test]
    fn test_concurrent_generation_has_no_collisions() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                thread::spawn(|| {
                    (0..250)
                        .map(|_| NamespaceToken::generate())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for token in handle.join().expect("generator thread panicked") {
                assert!(seen.insert(token), "duplicate token across threads");
            }
        }
        assert_eq!(seen.len(), 2000);
    }

    #[test]
    fn test_token_composes_into_resource_names() {
        let token = NamespaceToken::generate();
        let name = format!("lb-test-{token}");
        assert!(name.len() <= 32, "composed name should fit provider limits");
        assert!(name.starts_with("lb-test-"));
    }
}

//! Delimiter synthesis.
//!
//! A delimiter is `open + prefix + hex + close`, where `hex` is a truncated
//! SHA-256 of the cluster's texts. The same cluster always yields the same
//! delimiter. A candidate that occurs inside any document is rejected and the
//! next attempt salts the digest and lengthens it, up to `max_attempts`.

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use corpusmerge_shared::{
    Cluster, CorpusMergeError, Delimiter, DelimiterConfig, MAX_DIGEST_HEX_LEN, Result,
};

/// Hex characters added to the digest on each retry.
const HEX_GROWTH_PER_ATTEMPT: usize = 8;

/// Builds collision-free delimiters for clusters.
#[derive(Debug, Clone)]
pub struct DelimiterSynthesizer {
    config: DelimiterConfig,
}

impl DelimiterSynthesizer {
    pub fn new(config: DelimiterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Synthesize a delimiter that is not a substring of any text in `cluster`.
    pub fn synthesize(&self, cluster: &Cluster) -> Result<Delimiter> {
        let texts: Vec<&str> = cluster.texts().collect();
        self.synthesize_for(&texts)
    }

    /// Same as [`synthesize`](Self::synthesize) over raw texts.
    pub fn synthesize_for(&self, texts: &[&str]) -> Result<Delimiter> {
        let canonical = canonical_digest_input(texts);

        for attempt in 0..self.config.max_attempts {
            let hex = self.digest_hex(&canonical, attempt);
            let candidate = format!(
                "{}{}{}{}",
                self.config.open, self.config.prefix, hex, self.config.close
            );

            if texts.iter().any(|t| t.contains(&candidate)) {
                debug!(attempt, %candidate, "delimiter candidate collides with content");
                continue;
            }
            // A self-overlapping token could match across a document boundary.
            if has_border(&candidate) {
                debug!(attempt, %candidate, "delimiter candidate overlaps itself");
                continue;
            }

            return Ok(Delimiter {
                value: candidate,
                digest: hex,
                attempts: attempt + 1,
            });
        }

        warn!(
            attempts = self.config.max_attempts,
            documents = texts.len(),
            "no collision-free delimiter found"
        );
        Err(CorpusMergeError::DelimiterCollision {
            attempts: self.config.max_attempts,
        })
    }

    /// Hex digest for one attempt. Attempt 0 is unsalted.
    fn digest_hex(&self, canonical: &[u8], attempt: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(canonical);
        if attempt > 0 {
            hasher.update(b"\x00salt");
            hasher.update(attempt.to_le_bytes());
        }
        let full = format!("{:x}", hasher.finalize());

        let len = (self.config.digest_hex_len + attempt as usize * HEX_GROWTH_PER_ATTEMPT)
            .min(MAX_DIGEST_HEX_LEN);
        full[..len].to_string()
    }
}

/// Whether some proper prefix of `s` is also a suffix of it.
fn has_border(s: &str) -> bool {
    let bytes = s.as_bytes();
    (1..bytes.len()).any(|k| bytes[..k] == bytes[bytes.len() - k..])
}

/// Length-prefixed concatenation so that text boundaries are unambiguous.
fn canonical_digest_input(texts: &[&str]) -> Vec<u8> {
    let total: usize = texts.iter().map(|t| t.len() + 8).sum();
    let mut out = Vec::with_capacity(total);
    for text in texts {
        out.extend_from_slice(&(text.len() as u64).to_le_bytes());
        out.extend_from_slice(text.as_bytes());
    }
    out
}

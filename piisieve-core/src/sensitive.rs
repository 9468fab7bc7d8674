//! Helpers for keeping record values out of logs.
//!
//! Values that tripped a PII rule are, by definition, likely to be PII. Debug
//! logging goes through [`loggable`], which masks the value unless
//! `PIISIEVE_ALLOW_DEBUG_PII=true` is set in the environment.

use lazy_static::lazy_static;
use sha2::{Digest, Sha256};

lazy_static! {
    /// Read once per process.
    static ref PII_DEBUG_ALLOWED: bool = {
        std::env::var("PIISIEVE_ALLOW_DEBUG_PII")
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    };
}

/// Masks a value, keeping only a hint of its length.
pub fn redact_sensitive(s: &str) -> String {
    const MAX_LEN: usize = 8;
    if s.len() <= MAX_LEN {
        "[REDACTED]".to_string()
    } else {
        format!("[REDACTED: {} chars]", s.len())
    }
}

/// Short stable digest of a value, for correlating log lines without the value itself.
pub fn fingerprint(s: &str) -> String {
    let digest = Sha256::digest(s.as_bytes());
    hex::encode(&digest[..6])
}

/// The form of `s` that may be written to debug logs.
pub fn loggable(s: &str) -> String {
    if *PII_DEBUG_ALLOWED {
        s.to_string()
    } else {
        format!("{} #{}", redact_sensitive(s), fingerprint(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_sensitive_hides_value() {
        assert_eq!(redact_sensitive("123"), "[REDACTED]");
        assert_eq!(redact_sensitive("4111111111111111"), "[REDACTED: 16 chars]");
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(fingerprint("abc"), fingerprint("abc"));
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
        assert_eq!(fingerprint("abc").len(), 12);
    }
}

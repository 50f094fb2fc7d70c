//! HMAC-signed read URLs for videos served from local disk.
//!
//! A URL carries `st` (valid from, unix seconds), `se` (expiry, unix seconds)
//! and `sig = hex(HMAC-SHA256(secret, "{name}\n{st}\n{se}"))`.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature is malformed")]
    Malformed,
    #[error("signature does not match")]
    Mismatch,
    #[error("link is not valid yet")]
    NotYetValid,
    #[error("link has expired")]
    Expired,
}

/// Query parameters of a signed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlSignature {
    pub starts_at: i64,
    pub expires_at: i64,
    pub sig: String,
}

impl UrlSignature {
    pub fn to_query(&self) -> String {
        format!("st={}&se={}&sig={}", self.starts_at, self.expires_at, self.sig)
    }
}

#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn mac(&self, name: &str, starts_at: i64, expires_at: i64) -> HmacSha256 {
        // HMAC accepts keys of any length, so this cannot fail.
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("hmac key of any size"));
        mac.update(format!("{name}\n{starts_at}\n{expires_at}").as_bytes());
        mac
    }

    /// Sign `name` for reads between `now` and `now + ttl`.
    pub fn sign(&self, name: &str, now: DateTime<Utc>, ttl: Duration) -> UrlSignature {
        let starts_at = now.timestamp();
        let expires_at = (now + ttl).timestamp();
        let tag = self.mac(name, starts_at, expires_at).finalize().into_bytes();
        UrlSignature {
            starts_at,
            expires_at,
            sig: hex::encode(tag),
        }
    }

    /// Check a signature for `name` at time `now`.
    pub fn verify(
        &self,
        name: &str,
        signature: &UrlSignature,
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let tag = hex::decode(&signature.sig).map_err(|_| SignatureError::Malformed)?;
        self.mac(name, signature.starts_at, signature.expires_at)
            .verify_slice(&tag)
            .map_err(|_| SignatureError::Mismatch)?;

        let now = now.timestamp();
        if now < signature.starts_at {
            return Err(SignatureError::NotYetValid);
        }
        if now > signature.expires_at {
            return Err(SignatureError::Expired);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> UrlSigner {
        UrlSigner::new(b"test-secret".to_vec())
    }

    #[test]
    fn valid_for_the_whole_window() {
        let issued = Utc::now();
        let sig = signer().sign("clip.mp4", issued, Duration::hours(24));

        assert_eq!(sig.expires_at - sig.starts_at, 24 * 3600);
        for offset in [Duration::zero(), Duration::hours(12), Duration::hours(24)] {
            assert_eq!(signer().verify("clip.mp4", &sig, issued + offset), Ok(()));
        }
    }

    #[test]
    fn rejected_before_issuance() {
        let issued = Utc::now();
        let sig = signer().sign("clip.mp4", issued, Duration::hours(24));
        assert_eq!(
            signer().verify("clip.mp4", &sig, issued - Duration::minutes(5)),
            Err(SignatureError::NotYetValid)
        );
    }

    #[test]
    fn rejected_after_expiry() {
        let issued = Utc::now();
        let sig = signer().sign("clip.mp4", issued, Duration::hours(24));
        assert_eq!(
            signer().verify("clip.mp4", &sig, issued + Duration::hours(25)),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn tampering_is_detected() {
        let issued = Utc::now();
        let sig = signer().sign("clip.mp4", issued, Duration::hours(24));

        assert_eq!(
            signer().verify("other.mp4", &sig, issued),
            Err(SignatureError::Mismatch)
        );

        let extended = UrlSignature {
            expires_at: sig.expires_at + 3600,
            ..sig.clone()
        };
        assert_eq!(
            signer().verify("clip.mp4", &extended, issued),
            Err(SignatureError::Mismatch)
        );

        let other_key = UrlSigner::new(b"another".to_vec());
        assert_eq!(
            other_key.verify("clip.mp4", &sig, issued),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn garbage_signature_is_malformed() {
        let sig = UrlSignature {
            starts_at: 0,
            expires_at: i64::MAX,
            sig: "not-hex".into(),
        };
        assert_eq!(
            signer().verify("clip.mp4", &sig, Utc::now()),
            Err(SignatureError::Malformed)
        );
    }
}

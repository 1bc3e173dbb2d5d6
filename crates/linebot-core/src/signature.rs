//! Webhook signature validation.
//!
//! The platform signs each webhook body with HMAC-SHA256 keyed by the channel
//! secret and sends the base64 digest in the `X-Line-Signature` header.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Name of the header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Line-Signature";

/// Verifies webhook bodies against the channel secret.
///
/// Validation fails closed: a missing header, undecodable base64 or a digest
/// of the wrong length are all reported as invalid.
#[derive(Clone)]
pub struct SignatureValidator {
    secret: Vec<u8>,
}

impl SignatureValidator {
    /// Creates a validator for the given channel secret.
    pub fn new(channel_secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: channel_secret.as_ref().to_vec(),
        }
    }

    /// Returns `true` iff `signature` is the valid signature of `body`.
    pub fn validate(&self, body: &[u8], signature: Option<&str>) -> bool {
        let Some(signature) = signature.map(str::trim).filter(|s| !s.is_empty()) else {
            debug!("Signature header missing");
            return false;
        };

        let Ok(expected) = STANDARD.decode(signature) else {
            debug!("Signature header is not valid base64");
            return false;
        };

        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return false;
        };
        mac.update(body);
        // verify_slice compares in constant time
        mac.verify_slice(&expected).is_ok()
    }

    /// Computes the base64 signature for `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(body);
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for SignatureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureValidator")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "testsecret";
    const BODY: &[u8] = br#"{"destination":"U0","events":[]}"#;

    #[test]
    fn accepts_exact_signature() {
        let validator = SignatureValidator::new(SECRET);
        let signature = validator.sign(BODY);
        assert!(validator.validate(BODY, Some(&signature)));
    }

    #[test]
    fn rejects_mutated_body() {
        let validator = SignatureValidator::new(SECRET);
        let signature = validator.sign(BODY);
        for i in 0..BODY.len() {
            let mut body = BODY.to_vec();
            body[i] ^= 0x01;
            assert!(!validator.validate(&body, Some(&signature)), "byte {i}");
        }
    }

    #[test]
    fn rejects_mutated_signature() {
        let validator = SignatureValidator::new(SECRET);
        let signature = validator.sign(BODY);
        let mut raw = STANDARD.decode(&signature).unwrap();
        for i in 0..raw.len() {
            raw[i] ^= 0x01;
            let mutated = STANDARD.encode(&raw);
            assert!(!validator.validate(BODY, Some(&mutated)), "byte {i}");
            raw[i] ^= 0x01;
        }
    }

    #[test]
    fn rejects_wrong_secret() {
        let signature = SignatureValidator::new("other").sign(BODY);
        assert!(!SignatureValidator::new(SECRET).validate(BODY, Some(&signature)));
    }

    #[test]
    fn fails_closed_on_bad_header() {
        let validator = SignatureValidator::new(SECRET);
        assert!(!validator.validate(BODY, None));
        assert!(!validator.validate(BODY, Some("")));
        assert!(!validator.validate(BODY, Some("not base64!!")));
        assert!(!validator.validate(BODY, Some("AAAA")));
    }

    #[test]
    fn debug_hides_secret() {
        let out = format!("{:?}", SignatureValidator::new(SECRET));
        assert!(!out.contains(SECRET));
    }
}

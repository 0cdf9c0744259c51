//! Cookie MAC.
//!
//! The MAC covers, in order and without delimiters:
//! the cookie scope domain (UTF-8), the identity id as its 16 raw bytes, and the
//! decimal expiry string. The fixed-width id keeps the concatenation
//! unambiguous.

use crate::{Error, Result};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Length of a raw cookie MAC in bytes.
pub const MAC_LEN: usize = 32;

/// Signs and verifies auth cookie fields with the shared secret.
///
/// Rotating the secret invalidates every outstanding cookie.
#[derive(Clone)]
pub struct Signer {
    keyed: HmacSha256,
}

impl Signer {
    /// Build a signer from the shared secret. The secret must not be empty.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(Error::Config("secret must not be empty".to_string()));
        }
        let keyed = HmacSha256::new_from_slice(secret)
            .map_err(|e| Error::Config(format!("unusable secret: {e}")))?;
        Ok(Self { keyed })
    }

    fn mac_over(&self, domain: &str, id: &Uuid, expires: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(domain.as_bytes());
        mac.update(id.as_bytes());
        mac.update(expires.as_bytes());
        mac
    }

    /// Compute the raw MAC.
    pub fn sign(&self, domain: &str, id: &Uuid, expires: &str) -> [u8; MAC_LEN] {
        self.mac_over(domain, id, expires).finalize().into_bytes().into()
    }

    /// Compute the MAC and encode it the way it appears in the cookie.
    pub fn sign_encoded(&self, domain: &str, id: &Uuid, expires: &str) -> String {
        URL_SAFE.encode(self.sign(domain, id, expires))
    }

    /// Check `candidate` against the expected MAC in constant time.
    pub fn verify(&self, domain: &str, id: &Uuid, expires: &str, candidate: &[u8]) -> bool {
        self.mac_over(domain, id, expires)
            .verify_slice(candidate)
            .is_ok()
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

/// Decode the MAC field of a cookie.
pub fn decode_mac(field: &str) -> Result<Vec<u8>> {
    Ok(URL_SAFE.decode(field)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> Uuid {
        Uuid::parse_str("6f1c1b5e-8a49-4c5e-9d1e-0e8f2b3c4d5a").unwrap()
    }

    #[test]
    fn sign_then_verify() {
        let signer = Signer::new(b"top-secret").unwrap();
        let mac = signer.sign("example.com", &id(), "1700000000");
        assert_eq!(mac.len(), MAC_LEN);
        assert!(signer.verify("example.com", &id(), "1700000000", &mac));
    }

    #[test]
    fn every_input_is_bound() {
        let signer = Signer::new(b"top-secret").unwrap();
        let mac = signer.sign("example.com", &id(), "1700000000");
        assert!(!signer.verify("example.org", &id(), "1700000000", &mac));
        assert!(!signer.verify("example.com", &Uuid::nil(), "1700000000", &mac));
        assert!(!signer.verify("example.com", &id(), "1700000001", &mac));
        assert!(!signer.verify("example.com", &id(), "1700000000", &mac[..31]));
    }

    #[test]
    fn matches_reference_hmac_over_concatenation() {
        let signer = Signer::new(b"k").unwrap();
        let mut expected = HmacSha256::new_from_slice(b"k").unwrap();
        let mut msg = b"example.com".to_vec();
        msg.extend_from_slice(id().as_bytes());
        msg.extend_from_slice(b"42");
        expected.update(&msg);
        let expected: [u8; MAC_LEN] = expected.finalize().into_bytes().into();
        assert_eq!(signer.sign("example.com", &id(), "42"), expected);
    }

    #[test]
    fn different_secret_fails() {
        let a = Signer::new(b"secret-a").unwrap();
        let b = Signer::new(b"secret-b").unwrap();
        let mac = a.sign("example.com", &id(), "1");
        assert!(!b.verify("example.com", &id(), "1", &mac));
    }

    #[test]
    fn empty_secret_rejected() {
        assert!(matches!(Signer::new(b""), Err(Error::Config(_))));
    }

    #[test]
    fn encoded_mac_uses_url_safe_alphabet() {
        let signer = Signer::new(b"top-secret").unwrap();
        let encoded = signer.sign_encoded("example.com", &id(), "1700000000");
        assert_eq!(encoded.len(), 44);
        assert!(!encoded.contains('+') && !encoded.contains('/'));
        assert_eq!(decode_mac(&encoded).unwrap().len(), MAC_LEN);
        assert!(matches!(decode_mac("not base64!"), Err(Error::Decode(_))));
    }
}

//! Canonicalization and keyed hashing of gateway parameters.
//!
//! The outbound request and the inbound callback go through the same
//! `canonicalize`, so a field excluded on one side is excluded on the other.

use crate::domain::gateway::SIGNATURE_FIELDS;
use crate::error::{PaymentError, Result};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use subtle::ConstantTimeEq;
use url::form_urlencoded;

type HmacSha512 = Hmac<Sha512>;

/// Percent-encodes a value the way the gateway does: ASCII alphanumerics and
/// `*-._` are kept, space becomes `+`, every other UTF-8 byte becomes `%XX`.
pub fn encode_value(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Builds the signed payload: empty values and signature fields dropped,
/// keys sorted by byte value, joined as `key=encoded&key=encoded`.
pub fn canonicalize<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut fields: Vec<(K, V)> = params
        .into_iter()
        .filter(|(k, v)| !v.as_ref().is_empty() && !SIGNATURE_FIELDS.contains(&k.as_ref()))
        .collect();
    fields.sort_by(|(ka, va), (kb, vb)| {
        ka.as_ref()
            .as_bytes()
            .cmp(kb.as_ref().as_bytes())
            .then_with(|| va.as_ref().as_bytes().cmp(vb.as_ref().as_bytes()))
    });

    fields
        .iter()
        .map(|(k, v)| format!("{}={}", k.as_ref(), encode_value(v.as_ref())))
        .collect::<Vec<_>>()
        .join("&")
}

/// Signs and verifies with one shared secret. The key schedule runs once in
/// `new`; each signature starts from a copy of the keyed state.
#[derive(Clone)]
pub struct SignatureEngine {
    keyed: HmacSha512,
}

impl std::fmt::Debug for SignatureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureEngine").finish_non_exhaustive()
    }
}

impl SignatureEngine {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let keyed = HmacSha512::new_from_slice(secret.as_ref())
            .map_err(|_| PaymentError::ConfigError("invalid signing secret".to_string()))?;
        Ok(Self { keyed })
    }

    /// HMAC-SHA512 of the canonical string, as lowercase hex.
    pub fn sign(&self, canonical: &str) -> String {
        let mut mac = self.keyed.clone();
        mac.update(canonical.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn sign_params<I, K, V>(&self, params: I) -> String
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.sign(&canonicalize(params))
    }

    /// Recomputes the signature over `params` and compares it with `received`
    /// in constant time. Hex case is not significant.
    pub fn verify<I, K, V>(&self, params: I, received: &str) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let expected = self.sign_params(params);
        let received = received.trim().to_ascii_lowercase();
        expected.as_bytes().ct_eq(received.as_bytes()).into()
    }
}

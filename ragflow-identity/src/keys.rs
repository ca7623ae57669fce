use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rand::rngs::OsRng;
use rsa::pkcs8::EncodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Serialize;

/// One RSA key pair used for signing, identified by `kid`.
pub struct SigningKey {
    kid: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    n: String,
    e: String,
}

impl SigningKey {
    pub fn generate(kid: impl Into<String>) -> Self {
        let kid = kid.into();
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("failed to generate RSA-2048 key");
        let public_key = RsaPublicKey::from(&private_key);

        let pkcs8_pem = private_key
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .expect("failed to export RSA key as PKCS8 PEM");
        let encoding_key = EncodingKey::from_rsa_pem(pkcs8_pem.as_bytes())
            .expect("failed to build EncodingKey from RSA PEM");

        let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());
        let decoding_key =
            DecodingKey::from_rsa_components(&n, &e).expect("failed to build DecodingKey from RSA components");

        Self { kid, encoding_key, decoding_key, n, e }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub fn decoding_key(&self) -> DecodingKey {
        self.decoding_key.clone()
    }

    fn jwk(&self) -> JwkEntry<'_> {
        JwkEntry { kty: "RSA", alg: "RS256", r#use: "sig", kid: &self.kid, n: &self.n, e: &self.e }
    }
}

/// The current signing key plus a short window of retired keys, still usable
/// to verify tokens issued before the last rotation.
pub struct KeyRing {
    current: SigningKey,
    previous: Vec<SigningKey>,
    max_previous: usize,
}

impl KeyRing {
    pub fn new(max_previous: usize) -> Self {
        Self { current: SigningKey::generate(new_kid()), previous: Vec::new(), max_previous }
    }

    pub fn current(&self) -> &SigningKey {
        &self.current
    }

    pub fn rotate(&mut self) {
        let retired = std::mem::replace(&mut self.current, SigningKey::generate(new_kid()));
        self.previous.insert(0, retired);
        self.previous.truncate(self.max_previous);
    }

    /// Finds the decoding key for a given `kid`, checking the current key
    /// first then the retired window.
    pub fn decoding_key_for(&self, kid: &str) -> Option<DecodingKey> {
        if self.current.kid == kid {
            return Some(self.current.decoding_key());
        }
        self.previous.iter().find(|k| k.kid == kid).map(|k| k.decoding_key())
    }

    pub fn jwks_json(&self) -> JwksResponse<'_> {
        let mut keys = vec![self.current.jwk()];
        keys.extend(self.previous.iter().map(SigningKey::jwk));
        JwksResponse { keys }
    }
}

fn new_kid() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Serialize)]
pub struct JwksResponse<'a> {
    pub keys: Vec<JwkEntry<'a>>,
}

#[derive(Serialize)]
pub struct JwkEntry<'a> {
    pub kty: &'a str,
    pub alg: &'a str,
    #[serde(rename = "use")]
    pub r#use: &'a str,
    pub kid: &'a str,
    pub n: &'a str,
    pub e: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_keeps_previous_key_verifiable() {
        let mut ring = KeyRing::new(2);
        let old_kid = ring.current().kid().to_string();
        ring.rotate();
        assert_ne!(ring.current().kid(), old_kid);
        assert!(ring.decoding_key_for(&old_kid).is_some());
    }

    #[test]
    fn rotation_window_is_bounded() {
        let mut ring = KeyRing::new(1);
        let kid1 = ring.current().kid().to_string();
        ring.rotate();
        let kid2 = ring.current().kid().to_string();
        ring.rotate();
        assert!(ring.decoding_key_for(&kid1).is_none());
        assert!(ring.decoding_key_for(&kid2).is_some());
    }
}

//! Compact signed session tokens.
//!
//! Wire form is `base64url(claims JSON) "." base64url(signature)`, unpadded,
//! signed with Ed25519. Issuing requires the private half of the key pair;
//! verification needs only the public half. A token is never revocable by
//! itself: callers must re-check the session store on every authentication.

use std::fmt;
use std::path::Path;

use anyhow::Context;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

pub const SEED_LEN: usize = 32;

/// Claim set carried by a token. The session identifier is the load-bearing
/// claim; `iat` records issue time in unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "session-id")]
    pub session_id: String,
    #[serde(default)]
    pub iat: i64,
}

impl Claims {
    pub fn for_session<S: Into<String>>(session_id: S) -> Self {
        Self { session_id: session_id.into(), iat: chrono::Utc::now().timestamp() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("signature verification failed")]
    BadSignature,
    #[error("codec holds no signing key")]
    NoSigningKey,
}

/// Signs and verifies session tokens. Key material never appears in the
/// `Debug` output and must not reach logs or error payloads.
#[derive(Clone)]
pub struct TokenCodec {
    verifying: VerifyingKey,
    signing: Option<SigningKey>,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").field("issuer", &self.signing.is_some()).finish()
    }
}

impl TokenCodec {
    /// Full codec from a 32-byte seed: can both issue and verify.
    pub fn issuer(seed: &[u8; SEED_LEN]) -> Self {
        let signing = SigningKey::from_bytes(seed);
        Self { verifying: signing.verifying_key(), signing: Some(signing) }
    }

    /// Full codec with a fresh random seed. Tokens issued by a previous
    /// process instance will no longer verify.
    pub fn generate() -> anyhow::Result<Self> {
        let mut seed = [0u8; SEED_LEN];
        getrandom::getrandom(&mut seed).map_err(|e| anyhow::anyhow!("entropy source failed: {e}"))?;
        Ok(Self::issuer(&seed))
    }

    /// Verify-only codec. `issue` fails with `NoSigningKey`.
    pub fn verifier(verifying: VerifyingKey) -> Self {
        Self { verifying, signing: None }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.verifying
    }

    /// Load the seed from a base64url file, creating the file with a fresh
    /// seed when it does not exist.
    pub fn load_or_generate(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let encoded = std::fs::read_to_string(path)
                .with_context(|| format!("reading key seed {}", path.display()))?;
            let bytes = URL_SAFE_NO_PAD
                .decode(encoded.trim())
                .with_context(|| format!("decoding key seed {}", path.display()))?;
            let seed: [u8; SEED_LEN] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| anyhow::anyhow!("key seed {} is not {SEED_LEN} bytes", path.display()))?;
            Ok(Self::issuer(&seed))
        } else {
            let mut seed = [0u8; SEED_LEN];
            getrandom::getrandom(&mut seed)
                .map_err(|e| anyhow::anyhow!("entropy source failed: {e}"))?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating key directory {}", parent.display()))?;
            }
            std::fs::write(path, URL_SAFE_NO_PAD.encode(seed))
                .with_context(|| format!("writing key seed {}", path.display()))?;
            Ok(Self::issuer(&seed))
        }
    }

    /// Sign the claim set into a compact token string.
    pub fn issue(&self, claims: &Claims) -> Result<String, TokenError> {
        let signing = self.signing.as_ref().ok_or(TokenError::NoSigningKey)?;
        let payload = serde_json::to_vec(claims).map_err(|_| TokenError::Malformed)?;
        let signature = signing.sign(&payload);
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }

    /// Validate the signature with the public key only and return the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let (payload_b64, signature_b64) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| TokenError::Malformed)?;
        let signature_bytes =
            URL_SAFE_NO_PAD.decode(signature_b64).map_err(|_| TokenError::Malformed)?;
        let signature_arr: [u8; 64] =
            signature_bytes.as_slice().try_into().map_err(|_| TokenError::Malformed)?;
        let signature = Signature::from_bytes(&signature_arr);
        self.verifying
            .verify(&payload, &signature)
            .map_err(|_| TokenError::BadSignature)?;
        serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_verify_roundtrip() {
        let codec = TokenCodec::generate().unwrap();
        let claims = Claims::for_session("sid-1");
        let token = codec.issue(&claims).unwrap();
        let verified = codec.verify(&token).unwrap();
        assert_eq!(verified, claims);
    }

    #[test]
    fn verifier_half_verifies_but_cannot_issue() {
        let issuer = TokenCodec::generate().unwrap();
        let token = issuer.issue(&Claims::for_session("sid-2")).unwrap();

        let verifier = TokenCodec::verifier(issuer.verifying_key());
        assert_eq!(verifier.verify(&token).unwrap().session_id, "sid-2");
        assert_eq!(verifier.issue(&Claims::for_session("x")), Err(TokenError::NoSigningKey));
    }

    #[test]
    fn corrupted_payload_byte_fails_verification() {
        let codec = TokenCodec::generate().unwrap();
        let token = codec.issue(&Claims::for_session("sid-3")).unwrap();
        let (payload_b64, signature_b64) = token.split_once('.').unwrap();
        let mut payload = URL_SAFE_NO_PAD.decode(payload_b64).unwrap();
        payload[0] ^= 0x01;
        let tampered = format!("{}.{}", URL_SAFE_NO_PAD.encode(&payload), signature_b64);
        assert_eq!(codec.verify(&tampered), Err(TokenError::BadSignature));
    }

    #[test]
    fn garbage_tokens_are_malformed_not_panics() {
        let codec = TokenCodec::generate().unwrap();
        for garbage in ["", "garbage", "a.b", "!!!.###", "onlyonepart"] {
            match codec.verify(garbage) {
                Err(TokenError::Malformed) | Err(TokenError::BadSignature) => {}
                other => panic!("expected failure for {garbage:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn wrong_key_fails_verification() {
        let issuer = TokenCodec::generate().unwrap();
        let stranger = TokenCodec::generate().unwrap();
        let token = issuer.issue(&Claims::for_session("sid-4")).unwrap();
        assert_eq!(stranger.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn seed_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys").join("seed");
        let first = TokenCodec::load_or_generate(&path).unwrap();
        let token = first.issue(&Claims::for_session("sid-5")).unwrap();
        // Same file, same key pair: the token still verifies.
        let second = TokenCodec::load_or_generate(&path).unwrap();
        assert_eq!(second.verify(&token).unwrap().session_id, "sid-5");
    }

    #[test]
    fn debug_omits_key_material() {
        let codec = TokenCodec::generate().unwrap();
        let rendered = format!("{codec:?}");
        assert_eq!(rendered, "TokenCodec { issuer: true }");
    }
}

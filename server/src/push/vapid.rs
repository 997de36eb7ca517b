use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use p256::SecretKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use serde::{Deserialize, Serialize};

/// VAPID tokens are short-lived; push services reject anything over 24h.
const TOKEN_LIFETIME_SECS: i64 = 12 * 3600;

#[derive(Debug, Serialize, Deserialize)]
struct VapidClaims {
    aud: String,
    exp: u64,
    sub: String,
}

/// The application-server identity key pair used to authenticate push
/// submissions (RFC 8292). Constructed explicitly and passed into the
/// dispatcher; no process-global state, so tests can substitute fake keys.
pub struct VapidKeys {
    encoding_key: EncodingKey,
    /// Base64url uncompressed P-256 public point, shared with clients at
    /// subscribe time so the push service can verify origin.
    public_key: String,
    /// Contact identity for the `sub` claim, e.g. "mailto:ops@example.org".
    subject: String,
}

impl VapidKeys {
    /// Load the ES256 private key from PEM (PKCS#8 or SEC1) and derive the
    /// public application-server key from it.
    pub fn from_pem(pem: &str, subject: String) -> Result<Self, String> {
        let secret = SecretKey::from_pkcs8_pem(pem)
            .or_else(|_| SecretKey::from_sec1_pem(pem))
            .map_err(|e| format!("invalid VAPID private key: {e}"))?;

        let encoding_key = EncodingKey::from_ec_pem(pem.as_bytes())
            .map_err(|e| format!("unusable VAPID signing key: {e}"))?;

        let point = secret.public_key().to_encoded_point(false);
        let public_key = URL_SAFE_NO_PAD.encode(point.as_bytes());

        Ok(Self {
            encoding_key,
            public_key,
            subject,
        })
    }

    /// Generate a fresh key pair. Returns the keys and the private PEM so
    /// it can be persisted for reuse across restarts.
    pub fn generate(subject: String) -> Result<(Self, String), String> {
        let secret = SecretKey::random(&mut rand::rngs::OsRng);
        let pem = secret
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| format!("failed to encode VAPID key: {e}"))?;
        let keys = Self::from_pem(&pem, subject)?;
        Ok((keys, pem.to_string()))
    }

    /// The public half, as handed to subscribing clients.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Build the `Authorization: vapid t=<jwt>, k=<key>` header value for a
    /// submission to the given endpoint. The JWT audience is the endpoint's
    /// origin, per RFC 8292.
    pub fn authorization_header(&self, endpoint: &str) -> Result<String, String> {
        let url =
            reqwest::Url::parse(endpoint).map_err(|e| format!("invalid endpoint url: {e}"))?;
        let aud = url.origin().ascii_serialization();

        let claims = VapidClaims {
            aud,
            exp: (Utc::now().timestamp() + TOKEN_LIFETIME_SECS) as u64,
            sub: self.subject.clone(),
        };

        let jwt = encode(&Header::new(Algorithm::ES256), &claims, &self.encoding_key)
            .map_err(|e| format!("failed to sign VAPID token: {e}"))?;

        Ok(format!("vapid t={}, k={}", jwt, self.public_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode};
    use p256::pkcs8::EncodePublicKey;

    fn test_keys() -> (VapidKeys, String) {
        VapidKeys::generate("mailto:test@example.org".into()).unwrap()
    }

    #[test]
    fn test_public_key_is_uncompressed_point() {
        let (keys, _) = test_keys();
        let bytes = URL_SAFE_NO_PAD.decode(keys.public_key()).unwrap();
        assert_eq!(bytes.len(), 65);
        assert_eq!(bytes[0], 0x04, "SEC1 uncompressed point marker");
    }

    #[test]
    fn test_from_pem_roundtrip() {
        let (original, pem) = test_keys();
        let reloaded = VapidKeys::from_pem(&pem, "mailto:test@example.org".into()).unwrap();
        assert_eq!(original.public_key(), reloaded.public_key());
    }

    #[test]
    fn test_from_pem_rejects_garbage() {
        assert!(VapidKeys::from_pem("not a pem", "mailto:x@y".into()).is_err());
    }

    #[test]
    fn test_authorization_header_audience_is_endpoint_origin() {
        let (keys, pem) = test_keys();
        let header = keys
            .authorization_header("https://push.example.net:8443/send/abc123")
            .unwrap();

        let rest = header.strip_prefix("vapid t=").unwrap();
        let (jwt, key_part) = rest.split_once(", k=").unwrap();
        assert_eq!(key_part, keys.public_key());

        // Verify the signature against the derived public key.
        let secret = SecretKey::from_pkcs8_pem(&pem).unwrap();
        let public_pem = secret
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let mut validation = Validation::new(Algorithm::ES256);
        validation.set_audience(&["https://push.example.net:8443"]);
        let token = decode::<VapidClaims>(
            jwt,
            &DecodingKey::from_ec_pem(public_pem.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();

        assert_eq!(token.claims.aud, "https://push.example.net:8443");
        assert_eq!(token.claims.sub, "mailto:test@example.org");
    }

    #[test]
    fn test_authorization_header_rejects_bad_endpoint() {
        let (keys, _) = test_keys();
        assert!(keys.authorization_header("not a url").is_err());
    }
}

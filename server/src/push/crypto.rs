//! RFC 8291 message encryption for Web Push, using the aes128gcm content
//! coding from RFC 8188: an ephemeral P-256 ECDH agreement against the
//! subscriber's key, HKDF-SHA256 keyed with the subscriber's auth secret,
//! and a single AES-128-GCM record.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hkdf::Hkdf;
use p256::PublicKey;
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;
use sha2::Sha256;

/// RFC 8291 caps the whole record at 4096 bytes; after the 86-byte header,
/// the padding delimiter, and the 16-byte GCM tag this is what remains.
pub const MAX_PLAINTEXT: usize = 3993;

const RECORD_SIZE: u32 = 4096;

fn b64url_decode(value: &str) -> Result<Vec<u8>, String> {
    // Some clients hand back padded base64; be lenient and strip it.
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| format!("invalid base64url value: {e}"))
}

fn hkdf_expand(salt: &[u8], ikm: &[u8], info: &[u8], out: &mut [u8]) -> Result<(), String> {
    Hkdf::<Sha256>::new(Some(salt), ikm)
        .expand(info, out)
        .map_err(|e| format!("hkdf expand failed: {e}"))
}

/// Encrypt a payload for the subscription identified by its `p256dh`
/// public key and `auth` secret (both base64url, as stored by the
/// registry). Returns the complete aes128gcm body:
/// salt(16) || record-size(4) || keyid-len(1) || ephemeral-key(65) || ciphertext.
pub fn encrypt(p256dh: &str, auth: &str, plaintext: &[u8]) -> Result<Vec<u8>, String> {
    if plaintext.len() > MAX_PLAINTEXT {
        return Err(format!(
            "payload too large: {} bytes (max {MAX_PLAINTEXT})",
            plaintext.len()
        ));
    }

    let client_public_bytes = b64url_decode(p256dh)?;
    let auth_secret = b64url_decode(auth)?;
    let client_public = PublicKey::from_sec1_bytes(&client_public_bytes)
        .map_err(|e| format!("invalid subscriber public key: {e}"))?;

    let ephemeral = EphemeralSecret::random(&mut rand::rngs::OsRng);
    let ephemeral_public = ephemeral.public_key().to_encoded_point(false);
    let shared = ephemeral.diffie_hellman(&client_public);

    // IKM = HKDF(salt=auth_secret, ecdh_secret) expanded over both parties'
    // public keys (RFC 8291 §3.3).
    let mut key_info = Vec::with_capacity(14 + 65 + 65);
    key_info.extend_from_slice(b"WebPush: info\0");
    key_info.extend_from_slice(&client_public_bytes);
    key_info.extend_from_slice(ephemeral_public.as_bytes());

    let mut ikm = [0u8; 32];
    hkdf_expand(
        &auth_secret,
        shared.raw_secret_bytes().as_slice(),
        &key_info,
        &mut ikm,
    )?;

    let mut salt = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let mut cek = [0u8; 16];
    hkdf_expand(&salt, &ikm, b"Content-Encoding: aes128gcm\0", &mut cek)?;
    let mut nonce = [0u8; 12];
    hkdf_expand(&salt, &ikm, b"Content-Encoding: nonce\0", &mut nonce)?;

    // Single record: payload plus the 0x02 last-record padding delimiter.
    let mut record = Vec::with_capacity(plaintext.len() + 1);
    record.extend_from_slice(plaintext);
    record.push(0x02);

    let cipher = Aes128Gcm::new_from_slice(&cek).map_err(|e| format!("bad cek length: {e}"))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), record.as_slice())
        .map_err(|_| "aes-gcm encryption failed".to_string())?;

    let ephemeral_bytes = ephemeral_public.as_bytes();
    let mut body = Vec::with_capacity(16 + 4 + 1 + ephemeral_bytes.len() + ciphertext.len());
    body.extend_from_slice(&salt);
    body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    body.push(ephemeral_bytes.len() as u8);
    body.extend_from_slice(ephemeral_bytes);
    body.extend_from_slice(&ciphertext);

    Ok(body)
}

/// Inverse of `encrypt`, acting as the subscriber: parses the aes128gcm
/// header and decrypts with the subscriber's private key. Test-only; the
/// server never holds subscriber private keys.
#[cfg(test)]
pub fn decrypt_for_tests(
    client_secret: &p256::SecretKey,
    auth: &[u8],
    body: &[u8],
) -> Result<Vec<u8>, String> {
    let salt = &body[..16];
    let keyid_len = body[20] as usize;
    let server_public_bytes = &body[21..21 + keyid_len];
    let ciphertext = &body[21 + keyid_len..];

    let server_public = PublicKey::from_sec1_bytes(server_public_bytes)
        .map_err(|e| format!("bad server key: {e}"))?;
    let shared = p256::ecdh::diffie_hellman(
        client_secret.to_nonzero_scalar(),
        server_public.as_affine(),
    );

    let client_public_bytes = client_secret.public_key().to_encoded_point(false);
    let mut key_info = Vec::new();
    key_info.extend_from_slice(b"WebPush: info\0");
    key_info.extend_from_slice(client_public_bytes.as_bytes());
    key_info.extend_from_slice(server_public_bytes);

    let mut ikm = [0u8; 32];
    hkdf_expand(auth, shared.raw_secret_bytes().as_slice(), &key_info, &mut ikm)?;
    let mut cek = [0u8; 16];
    hkdf_expand(salt, &ikm, b"Content-Encoding: aes128gcm\0", &mut cek)?;
    let mut nonce = [0u8; 12];
    hkdf_expand(salt, &ikm, b"Content-Encoding: nonce\0", &mut nonce)?;

    let cipher = Aes128Gcm::new_from_slice(&cek).map_err(|e| format!("bad cek length: {e}"))?;
    let mut record = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext)
        .map_err(|_| "decryption failed".to_string())?;

    if record.pop() != Some(0x02) {
        return Err("missing last-record padding delimiter".to_string());
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::SecretKey;

    /// A subscriber key pair as a browser would generate it.
    fn subscriber() -> (SecretKey, String, String, Vec<u8>) {
        let secret = SecretKey::random(&mut rand::rngs::OsRng);
        let p256dh = URL_SAFE_NO_PAD.encode(
            secret
                .public_key()
                .to_encoded_point(false)
                .as_bytes(),
        );
        let mut auth = vec![0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut auth);
        let auth_b64 = URL_SAFE_NO_PAD.encode(&auth);
        (secret, p256dh, auth_b64, auth)
    }

    #[test]
    fn test_subscriber_can_decrypt() {
        let (secret, p256dh, auth_b64, auth) = subscriber();
        let payload = br#"{"title":"Hi","body":"There","url":"/x"}"#;

        let body = encrypt(&p256dh, &auth_b64, payload).unwrap();
        let decrypted = decrypt_for_tests(&secret, &auth, &body).unwrap();
        assert_eq!(decrypted, payload);
    }

    #[test]
    fn test_body_framing() {
        let (_, p256dh, auth_b64, _) = subscriber();
        let payload = b"hello";
        let body = encrypt(&p256dh, &auth_b64, payload).unwrap();

        assert_eq!(
            u32::from_be_bytes(body[16..20].try_into().unwrap()),
            RECORD_SIZE
        );
        assert_eq!(body[20], 65, "uncompressed P-256 key id");
        assert_eq!(body[21], 0x04, "SEC1 uncompressed point marker");
        // header + plaintext + delimiter + GCM tag
        assert_eq!(body.len(), 86 + payload.len() + 1 + 16);
    }

    #[test]
    fn test_each_message_uses_fresh_salt_and_key() {
        let (_, p256dh, auth_b64, _) = subscriber();
        let a = encrypt(&p256dh, &auth_b64, b"same payload").unwrap();
        let b = encrypt(&p256dh, &auth_b64, b"same payload").unwrap();
        assert_ne!(a[..16], b[..16], "salts must differ");
        assert_ne!(a[21..86], b[21..86], "ephemeral keys must differ");
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let (secret, p256dh, auth_b64, auth) = subscriber();
        let mut body = encrypt(&p256dh, &auth_b64, b"payload").unwrap();
        let last = body.len() - 1;
        body[last] ^= 0x01;
        assert!(decrypt_for_tests(&secret, &auth, &body).is_err());
    }

    #[test]
    fn test_oversize_payload_rejected() {
        let (_, p256dh, auth_b64, _) = subscriber();
        let payload = vec![0u8; MAX_PLAINTEXT + 1];
        assert!(encrypt(&p256dh, &auth_b64, &payload).is_err());
    }

    #[test]
    fn test_invalid_subscriber_key_rejected() {
        assert!(encrypt("!!!", "AAAA", b"x").is_err());
        let bad_point = URL_SAFE_NO_PAD.encode([0u8; 65]);
        assert!(encrypt(&bad_point, "AAAA", b"x").is_err());
    }
}

//! Per-kind key expansion for encrypted attachments.
//!
//! The 32-byte media secret is expanded with HKDF-SHA256 (zero salt) into
//! 112 bytes. The label selects the media kind so one secret never yields
//! the same key for two kinds.

use {
    hkdf::Hkdf,
    murmur_common::{MediaKey, MediaKind},
    sha2::Sha256,
    zeroize::{Zeroize, ZeroizeOnDrop},
};

use crate::error::{Error, Result};

/// Length of the expanded key material.
pub const DERIVED_LEN: usize = 112;

/// HKDF `info` label for a media kind.
pub fn info_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Audio => "WhatsApp Audio Keys",
        MediaKind::Image => "WhatsApp Image Keys",
        MediaKind::Video => "WhatsApp Video Keys",
        MediaKind::Document => "WhatsApp Document Keys",
    }
}

/// Expanded key material for one decrypt call. Wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeyMaterial([u8; DERIVED_LEN]);

impl DerivedKeyMaterial {
    /// AES-CBC initialisation vector, bytes `0..16`.
    pub fn iv(&self) -> &[u8] {
        &self.0[..16]
    }

    /// AES-256 key, bytes `16..48`.
    pub fn cipher_key(&self) -> &[u8] {
        &self.0[16..48]
    }

    /// MAC key, bytes `48..80`. Not consumed by the decryptor.
    pub fn mac_key(&self) -> &[u8] {
        &self.0[48..80]
    }

    pub fn as_bytes(&self) -> &[u8; DERIVED_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKeyMaterial([REDACTED])")
    }
}

/// Expand `secret` into [`DERIVED_LEN`] bytes for `kind`.
pub fn derive_keys(secret: &MediaKey, kind: MediaKind) -> Result<DerivedKeyMaterial> {
    let hk = Hkdf::<Sha256>::new(None, secret.as_bytes());
    let mut okm = DerivedKeyMaterial([0u8; DERIVED_LEN]);
    hk.expand(info_label(kind).as_bytes(), &mut okm.0)
        .map_err(|_| Error::decrypt("key expansion length out of range"))?;
    Ok(okm)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        hmac::{Hmac, Mac},
    };

    fn secret() -> MediaKey {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        MediaKey::new(bytes)
    }

    /// Explicit extract-then-expand chain with HMAC-SHA256.
    fn hmac_chain(secret: &[u8], info: &[u8]) -> Vec<u8> {
        let mut extract = Hmac::<Sha256>::new_from_slice(&[0u8; 32]).unwrap();
        extract.update(secret);
        let prk = extract.finalize().into_bytes();

        let mut out = Vec::new();
        let mut prev: Vec<u8> = Vec::new();
        for i in 1..=DERIVED_LEN.div_ceil(32) {
            let mut mac = Hmac::<Sha256>::new_from_slice(&prk).unwrap();
            mac.update(&prev);
            mac.update(info);
            mac.update(&[i as u8]);
            prev = mac.finalize().into_bytes().to_vec();
            out.extend_from_slice(&prev);
        }
        out.truncate(DERIVED_LEN);
        out
    }

    #[test]
    fn audio_vector() {
        let keys = derive_keys(&secret(), MediaKind::Audio).unwrap();
        assert_eq!(hex::encode(keys.iv()), "13f8935709c20e2e8b0680f81b0dd5fb");
        assert_eq!(
            hex::encode(keys.cipher_key()),
            "a61016c0347747b75bb8a8f6d7bcdb863ac5eb702662755054fe77db27b7c1c0"
        );
        assert_eq!(hex::encode(&keys.as_bytes()[104..]), "a2d75fcbe6b13749");
    }

    #[test]
    fn image_vector() {
        let keys = derive_keys(&secret(), MediaKind::Image).unwrap();
        assert_eq!(hex::encode(keys.iv()), "aa6a127218397cbd2383e4ccf7176a79");
        assert_eq!(
            hex::encode(keys.cipher_key()),
            "008c9aea9b7c5d81eb56b3f530f87d42dcc92d27b11ad6b5bd66f0560d0d8c46"
        );
    }

    #[test]
    fn matches_explicit_hmac_chain_for_every_kind() {
        for kind in [
            MediaKind::Audio,
            MediaKind::Image,
            MediaKind::Video,
            MediaKind::Document,
        ] {
            let keys = derive_keys(&secret(), kind).unwrap();
            let expected = hmac_chain(secret().as_bytes(), info_label(kind).as_bytes());
            assert_eq!(keys.as_bytes().as_slice(), expected.as_slice(), "{kind}");
        }
    }

    #[test]
    fn deterministic_and_separated_by_kind() {
        let a = derive_keys(&secret(), MediaKind::Video).unwrap();
        let b = derive_keys(&secret(), MediaKind::Video).unwrap();
        let c = derive_keys(&secret(), MediaKind::Document).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
        assert_eq!(hex::encode(&a.as_bytes()[104..]), "df4575de4a871856");
        assert_eq!(hex::encode(&c.as_bytes()[104..]), "87699f581b2e9b76");
    }

    #[test]
    fn debug_is_redacted() {
        let keys = derive_keys(&secret(), MediaKind::Audio).unwrap();
        assert_eq!(format!("{keys:?}"), "DerivedKeyMaterial([REDACTED])");
    }
}

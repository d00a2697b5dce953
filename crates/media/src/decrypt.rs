use {
    aes::Aes256,
    cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7},
    murmur_common::{MediaKey, MediaKind},
};

use crate::{
    error::{Error, Result},
    keys::derive_keys,
};

type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Trailing authentication tag appended to every encrypted attachment.
const MAC_TRAILER_LEN: usize = 10;

/// Decrypt a downloaded attachment.
///
/// The trailing tag is stripped but not verified. Callers treat failure as
/// non-fatal and fall back to the raw bytes.
pub fn decrypt_media(encrypted: &[u8], secret: &MediaKey, kind: MediaKind) -> Result<Vec<u8>> {
    let Some(body_len) = encrypted.len().checked_sub(MAC_TRAILER_LEN) else {
        return Err(Error::decrypt(format!(
            "input of {} bytes is shorter than the {MAC_TRAILER_LEN}-byte trailer",
            encrypted.len()
        )));
    };
    let ciphertext = &encrypted[..body_len];

    let keys = derive_keys(secret, kind)?;
    let decryptor = Aes256CbcDec::new_from_slices(keys.cipher_key(), keys.iv())
        .map_err(|e| Error::decrypt(e.to_string()))?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::decrypt("bad padding or misaligned ciphertext"))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const SECRET_B64: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";
    const AUDIO_CIPHERTEXT: &str = "23e878ca755220cdae43270ccc933dc626ac39f7f0c5572a9a3d51b3d86573e6ba5ac47760c25e739cd6";

    fn secret() -> MediaKey {
        MediaKey::from_base64(SECRET_B64).unwrap()
    }

    #[test]
    fn decrypts_known_audio_vector() {
        let encrypted = hex::decode(AUDIO_CIPHERTEXT).unwrap();
        let plain = decrypt_media(&encrypted, &secret(), MediaKind::Audio).unwrap();
        assert_eq!(plain, b"voice note: see you at noon");
    }

    #[test]
    fn wrong_kind_fails() {
        let encrypted = hex::decode(AUDIO_CIPHERTEXT).unwrap();
        // Image keys leave an invalid padding byte on this vector.
        assert!(decrypt_media(&encrypted, &secret(), MediaKind::Image).is_err());
    }

    #[test]
    fn trailer_is_ignored() {
        let mut encrypted = hex::decode(AUDIO_CIPHERTEXT).unwrap();
        let n = encrypted.len();
        encrypted[n - 10..].fill(0);
        let plain = decrypt_media(&encrypted, &secret(), MediaKind::Audio).unwrap();
        assert_eq!(plain, b"voice note: see you at noon");
    }

    #[test]
    fn short_or_misaligned_input_is_an_error() {
        assert!(matches!(
            decrypt_media(&[1, 2, 3], &secret(), MediaKind::Audio),
            Err(Error::Decrypt { .. })
        ));
        assert!(matches!(
            decrypt_media(&[0u8; 27], &secret(), MediaKind::Audio),
            Err(Error::Decrypt { .. })
        ));
    }
}

//! USM cryptographic primitives: authentication digests and privacy
//! ciphers. Key derivation (password-to-key, localization, extension)
//! lives in the [`keys`] submodule.

use cipher::block_padding::NoPadding;
use cipher::{AsyncStreamCipher, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

mod keys;

pub use keys::{
    extend_key_blumenthal, extend_key_reeder, localize_key, localized_key, localized_priv_key,
    password_caching_enabled, password_to_key, set_password_caching,
};

/// Failures inside the crypto layer. The client maps these onto its
/// encryption/decryption/key-derivation error variants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CryptoError {
    #[error("passphrase is empty")]
    EmptyPassphrase,

    #[error("no algorithm configured for this operation")]
    NoAlgorithm,

    #[error("derived key too short: need {needed} bytes, have {available}")]
    KeyTooShort { needed: usize, available: usize },

    #[error("privacy parameters have {actual} bytes, expected {expected}")]
    WrongSaltLength { expected: usize, actual: usize },

    #[error("ciphertext length {length} is not a multiple of the DES block size")]
    CiphertextNotBlockAligned { length: usize },

    #[error("cipher rejected key or IV")]
    CipherInit,
}

/// Authentication protocols (RFC 3414 and RFC 7860).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AuthProtocol {
    #[default]
    NoAuth,
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl AuthProtocol {
    pub fn is_none(self) -> bool {
        self == AuthProtocol::NoAuth
    }

    /// Truncated length of the wire digest (msgAuthenticationParameters).
    pub fn mac_len(self) -> usize {
        match self {
            AuthProtocol::NoAuth => 0,
            // RFC 3414: HMAC output truncated to 96 bits.
            AuthProtocol::Md5 | AuthProtocol::Sha1 => 12,
            // RFC 7860 truncation table.
            AuthProtocol::Sha224 => 16,
            AuthProtocol::Sha256 => 24,
            AuthProtocol::Sha384 => 32,
            AuthProtocol::Sha512 => 48,
        }
    }

    /// One-shot hash with this protocol's digest algorithm.
    pub(crate) fn hash(self, data: &[u8]) -> Vec<u8> {
        match self {
            AuthProtocol::NoAuth => Vec::new(),
            AuthProtocol::Md5 => Md5::digest(data).to_vec(),
            AuthProtocol::Sha1 => Sha1::digest(data).to_vec(),
            AuthProtocol::Sha224 => Sha224::digest(data).to_vec(),
            AuthProtocol::Sha256 => Sha256::digest(data).to_vec(),
            AuthProtocol::Sha384 => Sha384::digest(data).to_vec(),
            AuthProtocol::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// Privacy protocols. The `C` variants use the Reeder key extension for
/// vendor (Cisco) interoperability; the plain AES-192/256 variants use
/// the Blumenthal extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PrivProtocol {
    #[default]
    NoPriv,
    Des,
    Aes128,
    Aes192,
    Aes256,
    Aes192C,
    Aes256C,
}

impl PrivProtocol {
    pub fn is_none(self) -> bool {
        self == PrivProtocol::NoPriv
    }

    /// Bytes of localized key material the cipher consumes. DES needs 16:
    /// 8 for the key proper plus 8 of pre-IV.
    pub fn key_len(self) -> usize {
        match self {
            PrivProtocol::NoPriv => 0,
            PrivProtocol::Des | PrivProtocol::Aes128 => 16,
            PrivProtocol::Aes192 | PrivProtocol::Aes192C => 24,
            PrivProtocol::Aes256 | PrivProtocol::Aes256C => 32,
        }
    }

    /// Length of the wire salt (msgPrivacyParameters).
    pub fn salt_len(self) -> usize {
        match self {
            PrivProtocol::NoPriv => 0,
            _ => 8,
        }
    }

    pub fn is_aes(self) -> bool {
        !matches!(self, PrivProtocol::NoPriv | PrivProtocol::Des)
    }
}

/// Computes the truncated HMAC over a fully-serialized message whose
/// digest placeholder is zeroed.
pub fn auth_digest(
    protocol: AuthProtocol,
    key: &[u8],
    message: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    macro_rules! hmac_truncated {
        ($digest:ty) => {{
            let mut mac = <Hmac<$digest>>::new_from_slice(key)
                .map_err(|_| CryptoError::CipherInit)?;
            mac.update(message);
            let full = mac.finalize().into_bytes();
            Ok(full[..protocol.mac_len()].to_vec())
        }};
    }

    match protocol {
        AuthProtocol::NoAuth => Err(CryptoError::NoAlgorithm),
        AuthProtocol::Md5 => hmac_truncated!(Md5),
        AuthProtocol::Sha1 => hmac_truncated!(Sha1),
        AuthProtocol::Sha224 => hmac_truncated!(Sha224),
        AuthProtocol::Sha256 => hmac_truncated!(Sha256),
        AuthProtocol::Sha384 => hmac_truncated!(Sha384),
        AuthProtocol::Sha512 => hmac_truncated!(Sha512),
    }
}

type DesCbcEnc = cbc::Encryptor<des::Des>;
type DesCbcDec = cbc::Decryptor<des::Des>;

/// Encrypts a serialized scoped PDU.
///
/// For DES the IV is the pre-IV half of the key XORed with the salt; the
/// plaintext is zero-padded to the block size. For AES-CFB the IV is
/// engineBoots, engineTime and the salt, and no padding is applied.
pub fn encrypt(
    protocol: PrivProtocol,
    priv_key: &[u8],
    engine_boots: u32,
    engine_time: u32,
    priv_params: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    check_key_and_salt(protocol, priv_key, priv_params)?;
    match protocol {
        PrivProtocol::NoPriv => Err(CryptoError::NoAlgorithm),
        PrivProtocol::Des => {
            let iv = des_iv(priv_key, priv_params);
            let padded = plaintext.len().div_ceil(8) * 8;
            let mut buf = plaintext.to_vec();
            buf.resize(padded, 0);
            DesCbcEnc::new_from_slices(&priv_key[..8], &iv)
                .map_err(|_| CryptoError::CipherInit)?
                .encrypt_padded_mut::<NoPadding>(&mut buf, padded)
                .map_err(|_| CryptoError::CipherInit)?;
            Ok(buf)
        }
        _ => {
            let iv = aes_iv(engine_boots, engine_time, priv_params);
            let mut buf = plaintext.to_vec();
            let key = &priv_key[..protocol.key_len()];
            match protocol.key_len() {
                16 => cfb_mode::Encryptor::<aes::Aes128>::new_from_slices(key, &iv)
                    .map_err(|_| CryptoError::CipherInit)?
                    .encrypt(&mut buf),
                24 => cfb_mode::Encryptor::<aes::Aes192>::new_from_slices(key, &iv)
                    .map_err(|_| CryptoError::CipherInit)?
                    .encrypt(&mut buf),
                _ => cfb_mode::Encryptor::<aes::Aes256>::new_from_slices(key, &iv)
                    .map_err(|_| CryptoError::CipherInit)?
                    .encrypt(&mut buf),
            }
            Ok(buf)
        }
    }
}

/// Decrypts a scoped PDU. DES demands block-aligned ciphertext; the
/// zero padding is left in place for the BER reader to step over.
pub fn decrypt(
    protocol: PrivProtocol,
    priv_key: &[u8],
    engine_boots: u32,
    engine_time: u32,
    priv_params: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    check_key_and_salt(protocol, priv_key, priv_params)?;
    match protocol {
        PrivProtocol::NoPriv => Err(CryptoError::NoAlgorithm),
        PrivProtocol::Des => {
            if ciphertext.is_empty() || ciphertext.len() % 8 != 0 {
                return Err(CryptoError::CiphertextNotBlockAligned {
                    length: ciphertext.len(),
                });
            }
            let iv = des_iv(priv_key, priv_params);
            let mut buf = ciphertext.to_vec();
            DesCbcDec::new_from_slices(&priv_key[..8], &iv)
                .map_err(|_| CryptoError::CipherInit)?
                .decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|_| CryptoError::CipherInit)?;
            Ok(buf)
        }
        _ => {
            let iv = aes_iv(engine_boots, engine_time, priv_params);
            let mut buf = ciphertext.to_vec();
            let key = &priv_key[..protocol.key_len()];
            match protocol.key_len() {
                16 => cfb_mode::Decryptor::<aes::Aes128>::new_from_slices(key, &iv)
                    .map_err(|_| CryptoError::CipherInit)?
                    .decrypt(&mut buf),
                24 => cfb_mode::Decryptor::<aes::Aes192>::new_from_slices(key, &iv)
                    .map_err(|_| CryptoError::CipherInit)?
                    .decrypt(&mut buf),
                _ => cfb_mode::Decryptor::<aes::Aes256>::new_from_slices(key, &iv)
                    .map_err(|_| CryptoError::CipherInit)?
                    .decrypt(&mut buf),
            }
            Ok(buf)
        }
    }
}

fn check_key_and_salt(
    protocol: PrivProtocol,
    priv_key: &[u8],
    priv_params: &[u8],
) -> Result<(), CryptoError> {
    if priv_key.len() < protocol.key_len() {
        return Err(CryptoError::KeyTooShort {
            needed: protocol.key_len(),
            available: priv_key.len(),
        });
    }
    if priv_params.len() != protocol.salt_len() {
        return Err(CryptoError::WrongSaltLength {
            expected: protocol.salt_len(),
            actual: priv_params.len(),
        });
    }
    Ok(())
}

/// DES IV: pre-IV (bytes 8..16 of the localized key) XOR salt.
fn des_iv(priv_key: &[u8], salt: &[u8]) -> [u8; 8] {
    let mut iv = [0u8; 8];
    for (i, b) in iv.iter_mut().enumerate() {
        *b = priv_key[8 + i] ^ salt[i];
    }
    iv
}

/// AES-CFB IV: engineBoots || engineTime || salt, all big-endian.
fn aes_iv(engine_boots: u32, engine_time: u32, salt: &[u8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
    iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
    iv[8..16].copy_from_slice(salt);
    iv
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn mac_lengths_follow_the_rfc_tables() {
        assert_eq!(AuthProtocol::Md5.mac_len(), 12);
        assert_eq!(AuthProtocol::Sha1.mac_len(), 12);
        assert_eq!(AuthProtocol::Sha224.mac_len(), 16);
        assert_eq!(AuthProtocol::Sha256.mac_len(), 24);
        assert_eq!(AuthProtocol::Sha384.mac_len(), 32);
        assert_eq!(AuthProtocol::Sha512.mac_len(), 48);
    }

    #[test]
    fn des_round_trip_pads_with_zeros() {
        let key: Vec<u8> = (0u8..16).collect();
        let salt = [9u8; 8];
        let plaintext = b"not a block multiple";
        let ct = encrypt(PrivProtocol::Des, &key, 1, 2, &salt, plaintext).unwrap();
        assert_eq!(ct.len() % 8, 0);
        let pt = decrypt(PrivProtocol::Des, &key, 1, 2, &salt, &ct).unwrap();
        assert_eq!(&pt[..plaintext.len()], plaintext);
        assert!(pt[plaintext.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn des_rejects_ragged_ciphertext() {
        let key: Vec<u8> = (0u8..16).collect();
        let salt = [0u8; 8];
        let err = decrypt(PrivProtocol::Des, &key, 0, 0, &salt, &[0u8; 9]).unwrap_err();
        assert_eq!(err, CryptoError::CiphertextNotBlockAligned { length: 9 });
    }

    #[test]
    fn aes_round_trip_all_widths() {
        let key: Vec<u8> = (0u8..32).collect();
        let salt = [3u8; 8];
        let plaintext = b"attack at dawn";
        for protocol in [
            PrivProtocol::Aes128,
            PrivProtocol::Aes192,
            PrivProtocol::Aes256,
            PrivProtocol::Aes192C,
            PrivProtocol::Aes256C,
        ] {
            let ct = encrypt(protocol, &key, 7, 1000, &salt, plaintext).unwrap();
            // CFB is length-preserving.
            assert_eq!(ct.len(), plaintext.len());
            assert_ne!(&ct[..], plaintext);
            let pt = decrypt(protocol, &key, 7, 1000, &salt, &ct).unwrap();
            assert_eq!(&pt[..], plaintext);
        }
    }

    #[test]
    fn aes_iv_binds_boots_and_time() {
        let key: Vec<u8> = (0u8..16).collect();
        let salt = [3u8; 8];
        let ct1 = encrypt(PrivProtocol::Aes128, &key, 1, 1, &salt, b"payload").unwrap();
        let ct2 = encrypt(PrivProtocol::Aes128, &key, 1, 2, &salt, b"payload").unwrap();
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn salt_length_is_enforced() {
        let key: Vec<u8> = (0u8..16).collect();
        let err = encrypt(PrivProtocol::Aes128, &key, 0, 0, &[1, 2, 3], b"x").unwrap_err();
        assert_eq!(
            err,
            CryptoError::WrongSaltLength {
                expected: 8,
                actual: 3
            }
        );
    }
}

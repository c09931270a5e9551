//! RFC 3414 key derivation: password-to-key expansion, key localization,
//! the AES key extensions and the process-wide password cache.

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use super::{AuthProtocol, CryptoError, PrivProtocol};

/// Total octets hashed by the RFC 3414 §A.2 expansion.
const EXPANSION_OCTETS: usize = 1_048_576;

/// The cache key must carry the hash algorithm so the same passphrase
/// derived under MD5 and SHA-1 cannot cross-contaminate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    protocol: AuthProtocol,
    passphrase: Vec<u8>,
}

/// Process-wide map from (protocol, passphrase) to the expanded key `Ku`.
///
/// Disabling drops the whole map; enabling installs a fresh one. The map
/// is swapped as a unit under the write lock so readers never observe a
/// half-cleared state.
static PASSWORD_KEY_CACHE: LazyLock<RwLock<Option<HashMap<CacheKey, Vec<u8>>>>> =
    LazyLock::new(|| RwLock::new(Some(HashMap::new())));

/// Turns the million-octet password hash cache on or off.
///
/// Turning it off clears every cached key; turning it back on starts
/// empty. Whether the cache is enabled never changes any derived key,
/// only how often the expensive expansion runs.
pub fn set_password_caching(enabled: bool) {
    let mut guard = PASSWORD_KEY_CACHE
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = if enabled {
        Some(guard.take().unwrap_or_default())
    } else {
        None
    };
}

pub fn password_caching_enabled() -> bool {
    PASSWORD_KEY_CACHE
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .is_some()
}

fn cache_lookup(protocol: AuthProtocol, passphrase: &[u8]) -> Option<Vec<u8>> {
    let guard = PASSWORD_KEY_CACHE
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.as_ref()?.get(&CacheKey {
        protocol,
        passphrase: passphrase.to_vec(),
    })
    .cloned()
}

fn cache_store(protocol: AuthProtocol, passphrase: &[u8], ku: &[u8]) {
    let mut guard = PASSWORD_KEY_CACHE
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(map) = guard.as_mut() {
        map.insert(
            CacheKey {
                protocol,
                passphrase: passphrase.to_vec(),
            },
            ku.to_vec(),
        );
    }
}

/// Feeds the passphrase, repeated cyclically, into the digest in 64-byte
/// chunks until 2^20 octets have been hashed.
fn expand_passphrase<D: Digest>(passphrase: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    let mut chunk = [0u8; 64];
    let mut index = 0usize;
    let mut hashed = 0usize;
    while hashed < EXPANSION_OCTETS {
        for slot in chunk.iter_mut() {
            *slot = passphrase[index];
            index = (index + 1) % passphrase.len();
        }
        hasher.update(chunk);
        hashed += chunk.len();
    }
    hasher.finalize().to_vec()
}

/// RFC 3414 §A.2 password-to-key: the universal key `Ku` for a
/// passphrase under the given hash algorithm, served from the cache when
/// possible. Cache failures are impossible by construction; a miss just
/// recomputes, so no error is ever swallowed here.
pub fn password_to_key(
    protocol: AuthProtocol,
    passphrase: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if passphrase.is_empty() {
        return Err(CryptoError::EmptyPassphrase);
    }
    if let Some(ku) = cache_lookup(protocol, passphrase) {
        return Ok(ku);
    }
    let ku = match protocol {
        AuthProtocol::NoAuth => return Err(CryptoError::NoAlgorithm),
        AuthProtocol::Md5 => expand_passphrase::<Md5>(passphrase),
        AuthProtocol::Sha1 => expand_passphrase::<Sha1>(passphrase),
        AuthProtocol::Sha224 => expand_passphrase::<Sha224>(passphrase),
        AuthProtocol::Sha256 => expand_passphrase::<Sha256>(passphrase),
        AuthProtocol::Sha384 => expand_passphrase::<Sha384>(passphrase),
        AuthProtocol::Sha512 => expand_passphrase::<Sha512>(passphrase),
    };
    cache_store(protocol, passphrase, &ku);
    Ok(ku)
}

/// RFC 3414 §2.6 localization: `KuL = H(Ku || engineID || Ku)`.
pub fn localize_key(protocol: AuthProtocol, ku: &[u8], engine_id: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(ku.len() * 2 + engine_id.len());
    input.extend_from_slice(ku);
    input.extend_from_slice(engine_id);
    input.extend_from_slice(ku);
    protocol.hash(&input)
}

/// Full passphrase-to-localized-key derivation.
pub fn localized_key(
    protocol: AuthProtocol,
    passphrase: &[u8],
    engine_id: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let ku = password_to_key(protocol, passphrase)?;
    Ok(localize_key(protocol, &ku, engine_id))
}

/// Blumenthal extension: `KuL || H(KuL)`, truncated by the caller.
pub fn extend_key_blumenthal(protocol: AuthProtocol, localized: &[u8]) -> Vec<u8> {
    let mut extended = localized.to_vec();
    extended.extend_from_slice(&protocol.hash(localized));
    extended
}

/// Reeder extension: `KuL || localize(password_to_key(KuL))`, i.e. the
/// whole password-to-key localization applied a second time with the
/// localized key standing in as the passphrase.
pub fn extend_key_reeder(
    protocol: AuthProtocol,
    localized: &[u8],
    engine_id: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let mut extended = localized.to_vec();
    extended.extend_from_slice(&localized_key(protocol, localized, engine_id)?);
    Ok(extended)
}

/// Derives the localized privacy key for a privacy protocol: the plain
/// localization of the privacy passphrase under the session's auth hash,
/// stretched with the protocol's key extension when the hash is shorter
/// than the cipher key, and truncated to the cipher's key length.
pub fn localized_priv_key(
    priv_protocol: PrivProtocol,
    auth_protocol: AuthProtocol,
    priv_passphrase: &[u8],
    engine_id: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if priv_protocol.is_none() {
        return Ok(Vec::new());
    }
    let localized = localized_key(auth_protocol, priv_passphrase, engine_id)?;
    let needed = priv_protocol.key_len();
    let extended = match priv_protocol {
        PrivProtocol::NoPriv => unreachable!("handled above"),
        PrivProtocol::Des => localized,
        PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
            extend_key_blumenthal(auth_protocol, &localized)
        }
        PrivProtocol::Aes128 | PrivProtocol::Aes192C | PrivProtocol::Aes256C => {
            extend_key_reeder(auth_protocol, &localized, engine_id)?
        }
    };
    if extended.len() < needed {
        return Err(CryptoError::KeyTooShort {
            needed,
            available: extended.len(),
        });
    }
    Ok(extended[..needed].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use pretty_assertions::assert_eq;

    const ENGINE_ID: [u8; 12] = hex!("00 00 00 00 00 00 00 00 00 00 00 02");

    #[test]
    fn rfc3414_md5_vector() {
        let key = localized_key(AuthProtocol::Md5, b"maplesyrup", &ENGINE_ID).unwrap();
        assert_eq!(
            key,
            hex!("52 6f 5e ed 9f cc e2 6f 89 64 c2 93 07 87 d8 2b")
        );
    }

    #[test]
    fn rfc3414_sha1_vector() {
        let key = localized_key(AuthProtocol::Sha1, b"maplesyrup", &ENGINE_ID).unwrap();
        assert_eq!(
            key,
            hex!("66 95 fe bc 92 88 e3 62 82 23 5f c7 15 1f 12 84 97 b3 8f 3f")
        );
    }

    #[test]
    fn cache_is_transparent() {
        let with_cache = localized_key(AuthProtocol::Sha1, b"maplesyrup", &ENGINE_ID).unwrap();

        set_password_caching(false);
        assert!(!password_caching_enabled());
        let without_cache = localized_key(AuthProtocol::Sha1, b"maplesyrup", &ENGINE_ID).unwrap();

        set_password_caching(true);
        assert!(password_caching_enabled());
        let fresh_cache = localized_key(AuthProtocol::Sha1, b"maplesyrup", &ENGINE_ID).unwrap();

        assert_eq!(with_cache, without_cache);
        assert_eq!(with_cache, fresh_cache);
    }

    #[test]
    fn cache_distinguishes_hash_algorithms() {
        let md5 = password_to_key(AuthProtocol::Md5, b"maplesyrup").unwrap();
        let sha1 = password_to_key(AuthProtocol::Sha1, b"maplesyrup").unwrap();
        assert_ne!(md5, sha1);
        // Repeat lookups hit the cache and must return the same keys.
        assert_eq!(password_to_key(AuthProtocol::Md5, b"maplesyrup").unwrap(), md5);
        assert_eq!(password_to_key(AuthProtocol::Sha1, b"maplesyrup").unwrap(), sha1);
    }

    #[test]
    fn empty_passphrase_is_refused() {
        assert_eq!(
            password_to_key(AuthProtocol::Md5, b"").unwrap_err(),
            CryptoError::EmptyPassphrase
        );
    }

    #[test]
    fn priv_keys_match_cipher_widths() {
        for (protocol, expected) in [
            (PrivProtocol::Des, 16),
            (PrivProtocol::Aes128, 16),
            (PrivProtocol::Aes192, 24),
            (PrivProtocol::Aes256, 32),
            (PrivProtocol::Aes192C, 24),
            (PrivProtocol::Aes256C, 32),
        ] {
            let key = localized_priv_key(protocol, AuthProtocol::Md5, b"maplesyrup", &ENGINE_ID)
                .unwrap();
            assert_eq!(key.len(), expected, "{protocol:?}");
        }
    }

    #[test]
    fn blumenthal_and_reeder_extensions_differ() {
        let aes256_b =
            localized_priv_key(PrivProtocol::Aes256, AuthProtocol::Sha1, b"maplesyrup", &ENGINE_ID)
                .unwrap();
        let aes256_r =
            localized_priv_key(PrivProtocol::Aes256C, AuthProtocol::Sha1, b"maplesyrup", &ENGINE_ID)
                .unwrap();
        // Both start with the localized key proper and diverge in the
        // extension tail (SHA-1 localizes to 20 bytes).
        assert_eq!(aes256_b[..20], aes256_r[..20]);
        assert_ne!(aes256_b[20..], aes256_r[20..]);
    }
}

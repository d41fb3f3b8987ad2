//! "Office Binary Document RC4 CryptoAPI Encryption" ([MS-OFFCRYPTO] 2.3.5).
//!
//! The CryptoAPI variant carries a full `EncryptionHeader`/`EncryptionVerifier`
//! pair inside the FilePass record. Only the RC4 cipher is supported here:
//! AES combinations are recognized and rejected (no known-in-the-wild `.xls`
//! files use them, and the block layout differs).
//!
//! Unlike ECMA-376 "Standard" encryption this scheme has no spin count: the
//! password hash is a single `H(salt || UTF16LE(password))`.

use md5::Md5;
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::rc4::Rc4;
use crate::{CryptoApiHeader, OffcryptoError, PAYLOAD_BLOCK_SIZE};

/// Hash algorithms valid for CryptoAPI FilePass headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Md5,
}

impl HashAlgorithm {
    pub(crate) fn digest(self, parts: &[&[u8]]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha1 => {
                let mut h = Sha1::new();
                for p in parts {
                    h.update(p);
                }
                h.finalize().to_vec()
            }
            HashAlgorithm::Md5 => {
                let mut h = Md5::new();
                for p in parts {
                    h.update(p);
                }
                h.finalize().to_vec()
            }
        }
    }
}

/// Resolve the hash algorithm from `AlgIDHash` and `Flags.fExternal`
/// ([MS-OFFCRYPTO] 2.3.2). In practice this is always SHA-1.
pub fn hash_algorithm(header: &CryptoApiHeader) -> Result<HashAlgorithm, OffcryptoError> {
    match (header.header.alg_id_hash, header.header.flags.f_external) {
        (0x0000, false) | (0x8004, false) => Ok(HashAlgorithm::Sha1),
        (0x8003, false) => Ok(HashAlgorithm::Md5),
        (alg, ext) => Err(OffcryptoError::UnsupportedEncryption(format!(
            "unknown AlgIDHash/fExternal combination: {alg:#06x}/{ext}"
        ))),
    }
}

/// Resolve the cipher from the header flags and `AlgID`. Anything other than
/// RC4 (notably the AES-128/192/256 combinations) is unsupported.
pub fn require_rc4(header: &CryptoApiHeader) -> Result<(), OffcryptoError> {
    let flags = &header.header.flags;
    match (flags.f_crypto_api, flags.f_aes, flags.f_external, header.header.alg_id) {
        (true, false, false, 0x0000) | (true, false, false, 0x6801) => Ok(()),
        (true, true, false, 0x0000) | (true, true, false, 0x660E) => Err(
            OffcryptoError::UnsupportedEncryption("AES-128 CryptoAPI".into()),
        ),
        (true, true, false, 0x660F) => Err(OffcryptoError::UnsupportedEncryption(
            "AES-192 CryptoAPI".into(),
        )),
        (true, true, false, 0x6610) => Err(OffcryptoError::UnsupportedEncryption(
            "AES-256 CryptoAPI".into(),
        )),
        (_, _, true, _) => Err(OffcryptoError::UnsupportedEncryption(
            "extensible (external) encryption".into(),
        )),
        (_, _, _, alg_id) => Err(OffcryptoError::UnsupportedEncryption(format!(
            "unknown Flags/AlgID combination: {alg_id:#06x}"
        ))),
    }
}

/// Derive the RC4 key for a 1024-byte block ([MS-OFFCRYPTO] 2.3.5.2).
///
/// ```text
/// H0     = H(salt || UTF16LE(password))
/// Hn     = H(H0 || LE32(block))
/// key(n) = Hn[0..keySize], zero-padded to 16 bytes when keySize < 16
/// ```
pub fn derive_key(
    password: &str,
    salt: &[u8],
    block: u32,
    key_size_bytes: usize,
    alg: HashAlgorithm,
) -> Result<Zeroizing<Vec<u8>>, OffcryptoError> {
    if key_size_bytes == 0 || key_size_bytes > alg.digest(&[]).len() {
        return Err(OffcryptoError::UnsupportedEncryption(format!(
            "invalid CryptoAPI key size: {} bytes",
            key_size_bytes
        )));
    }

    let mut pw16 = Zeroizing::new(Vec::with_capacity(password.len() * 2));
    for unit in password.encode_utf16() {
        pw16.extend_from_slice(&unit.to_le_bytes());
    }

    let h0 = Zeroizing::new(alg.digest(&[salt, &pw16]));
    let h = Zeroizing::new(alg.digest(&[&h0, &block.to_le_bytes()]));

    let mut key = Zeroizing::new(h[..key_size_bytes].to_vec());
    if key_size_bytes < 16 {
        key.resize(16, 0);
    }
    Ok(key)
}

/// Password verification ([MS-OFFCRYPTO] 2.3.5.6).
pub fn password_matches(
    password: &str,
    header: &CryptoApiHeader,
    alg: HashAlgorithm,
) -> Result<bool, OffcryptoError> {
    let key_size_bytes = header.key_size_bytes()?;
    let verifier = &header.verifier;
    let key = derive_key(password, &verifier.salt, 0, key_size_bytes, alg)?;

    let mut rc4 = Rc4::new(key.as_slice());
    let mut decrypted_verifier = verifier.encrypted_verifier;
    rc4.apply_keystream(&mut decrypted_verifier);
    let mut decrypted_hash = verifier.encrypted_verifier_hash.clone();
    rc4.apply_keystream(&mut decrypted_hash);

    let hash_size = verifier.verifier_hash_size as usize;
    if hash_size > decrypted_hash.len() {
        return Err(OffcryptoError::InvalidFilePass(
            "VerifierHashSize exceeds EncryptedVerifierHash",
        ));
    }

    let hashed = alg.digest(&[&decrypted_verifier]);
    if hash_size > hashed.len() {
        return Err(OffcryptoError::InvalidFilePass(
            "VerifierHashSize exceeds digest size",
        ));
    }
    Ok(hashed[..hash_size]
        .ct_eq(&decrypted_hash[..hash_size])
        .into())
}

/// Decrypt the whole Workbook stream with per-1024-byte-block re-keying.
pub fn decrypt_stream(
    raw: &[u8],
    password: &str,
    header: &CryptoApiHeader,
) -> Result<Vec<u8>, OffcryptoError> {
    require_rc4(header)?;
    let alg = hash_algorithm(header)?;
    if !password_matches(password, header, alg)? {
        return Err(OffcryptoError::WrongPassword);
    }

    let key_size_bytes = header.key_size_bytes()?;
    let mut out = raw.to_vec();
    for (block, chunk) in out.chunks_mut(PAYLOAD_BLOCK_SIZE).enumerate() {
        let key = derive_key(password, &header.verifier.salt, block as u32, key_size_bytes, alg)?;
        Rc4::new(key.as_slice()).apply_keystream(chunk);
    }
    Ok(out)
}

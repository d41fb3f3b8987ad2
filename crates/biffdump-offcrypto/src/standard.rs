//! "Office Binary Document RC4 Encryption" ([MS-OFFCRYPTO] 2.3.6).
//!
//! This is the older of the two RC4 schemes carried by a FilePass record:
//! MD5-based key derivation, 40-bit effective key strength, and whole-stream
//! encryption re-keyed every 1024 bytes.

use md5::{Digest, Md5};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::rc4::Rc4;
use crate::{Rc4Header, OffcryptoError, PAYLOAD_BLOCK_SIZE};

fn password_utf16le(password: &str) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(Vec::with_capacity(password.len() * 2));
    for unit in password.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// Derive the 16-byte RC4 key for a 1024-byte block ([MS-OFFCRYPTO] 2.3.6.2).
///
/// ```text
/// H0        = MD5(UTF16LE(password))
/// H1        = MD5((H0[0..5] || salt) * 16)
/// key(n)    = MD5(H1[0..5] || LE32(n))
/// ```
pub fn derive_key(password: &str, salt: &[u8; 16], block: u32) -> Zeroizing<[u8; 16]> {
    let h0 = Md5::digest(password_utf16le(password).as_slice());

    let mut buffer = Zeroizing::new(Vec::with_capacity((5 + 16) * 16));
    for _ in 0..16 {
        buffer.extend_from_slice(&h0[..5]);
        buffer.extend_from_slice(salt);
    }
    let h1 = Md5::digest(buffer.as_slice());

    let mut hfin = Zeroizing::new([0u8; 9]);
    hfin[..5].copy_from_slice(&h1[..5]);
    hfin[5..].copy_from_slice(&block.to_le_bytes());

    let mut key = Zeroizing::new([0u8; 16]);
    key.copy_from_slice(&Md5::digest(hfin.as_slice()));
    key
}

/// Password verification ([MS-OFFCRYPTO] 2.3.6.4): decrypt the verifier and
/// its hash with the block-0 key and compare `MD5(verifier)` against the
/// decrypted hash.
pub fn password_matches(password: &str, header: &Rc4Header) -> bool {
    let key = derive_key(password, &header.salt, 0);
    let mut rc4 = Rc4::new(key.as_slice());

    let mut verifier = header.encrypted_verifier;
    rc4.apply_keystream(&mut verifier);
    let mut verifier_hash = header.encrypted_verifier_hash;
    rc4.apply_keystream(&mut verifier_hash);

    let hashed = Md5::digest(verifier);
    hashed.as_slice().ct_eq(&verifier_hash).into()
}

/// Decrypt the whole Workbook stream: 1024-byte blocks from offset 0, a
/// fresh RC4 state per block. The caller re-patches the regions that were
/// never encrypted (record headers, BOF, FilePass, ...).
pub fn decrypt_stream(
    raw: &[u8],
    password: &str,
    header: &Rc4Header,
) -> Result<Vec<u8>, OffcryptoError> {
    if !password_matches(password, header) {
        return Err(OffcryptoError::WrongPassword);
    }

    let mut out = raw.to_vec();
    for (block, chunk) in out.chunks_mut(PAYLOAD_BLOCK_SIZE).enumerate() {
        let key = derive_key(password, &header.salt, block as u32);
        Rc4::new(key.as_slice()).apply_keystream(chunk);
    }
    Ok(out)
}

//! Decryption of legacy Excel `Workbook` streams ([MS-OFFCRYPTO] 2.3.5-2.3.7).
//!
//! A BIFF8 workbook announces encryption with a `FilePass` record near the
//! start of the stream. Three schemes exist:
//!
//! * XOR obfuscation (`wEncryptionType = 0x0000`) — a 16-byte rolling pad
//!   applied per record payload,
//! * RC4 "Standard" (`0x0001`, header version 1.1) — MD5 key derivation,
//! * RC4 CryptoAPI (`0x0001`, header versions 2..4) — SHA-1 key derivation
//!   with a full `EncryptionHeader`.
//!
//! RC4 variants encrypt the stream as one contiguous byte sequence re-keyed
//! every 1024 bytes, *except* for a fixed set of regions the writer leaves
//! in plaintext (record headers, `BOF`, `FilePass`, the `lbPlyPos` field of
//! `BoundSheet8`, and a few revision/locking records). After whole-stream
//! decryption those regions are re-patched from the original bytes.
//!
//! Files saved without a password prompt are still encrypted under the
//! well-known default password `VelvetSweatshop`.

use thiserror::Error;

pub mod cryptoapi;
pub mod rc4;
pub mod standard;
pub mod xor;

/// Password applied when the caller does not supply one.
pub const DEFAULT_PASSWORD: &str = "VelvetSweatshop";

/// RC4 re-keying interval for FilePass-encrypted workbook streams.
///
/// This differs from ECMA-376 standard encryption, which re-keys every 512
/// bytes.
pub const PAYLOAD_BLOCK_SIZE: usize = 1024;

const RECORD_HEADER_LEN: usize = 4;

// Record ids this crate needs to recognize. The full id table lives in the
// decoder crate; only detection and the plaintext re-patch need ids here.
const RECORD_EOF: u16 = 0x000A;
const RECORD_FILEPASS: u16 = 0x002F;
const RECORD_WRITEACCESS: u16 = 0x005C;
const RECORD_CODEPAGE: u16 = 0x0042;
const RECORD_BOUNDSHEET8: u16 = 0x0085;
const RECORD_INTERFACEHDR: u16 = 0x00E1;
const RECORD_RRDHEAD: u16 = 0x0138;
const RECORD_USREXCL: u16 = 0x0194;
const RECORD_FILELOCK: u16 = 0x0195;
const RECORD_RRDINFO: u16 = 0x0196;
const RECORD_BOF_BIFF8: u16 = 0x0809;

#[derive(Debug, Error)]
pub enum OffcryptoError {
    /// The FilePass scheme (or header combination) is recognized but not
    /// decryptable by this crate. Fatal: the record stream beyond the
    /// FilePass cannot be read.
    #[error("unsupported encryption: {0}")]
    UnsupportedEncryption(String),

    /// The password (supplied or default) failed verifier validation.
    #[error("password does not match the stream verifier")]
    WrongPassword,

    /// The FilePass record payload does not match any known layout.
    #[error("invalid FilePass record: {0}")]
    InvalidFilePass(&'static str),
}

/// XOR obfuscation FilePass body ([MS-XLS] 2.4.117, XORObfuscation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XorObfuscation {
    /// `key` — the 16-bit XOR key (stored, not used for decryption).
    pub key: u16,
    /// `verificationBytes` — output of password verifier Method 1.
    pub verification_bytes: u16,
}

/// RC4 "Standard" encryption header ([MS-OFFCRYPTO] 2.3.6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rc4Header {
    pub salt: [u8; 16],
    pub encrypted_verifier: [u8; 16],
    pub encrypted_verifier_hash: [u8; 16],
}

/// `EncryptionHeaderFlags` ([MS-OFFCRYPTO] 2.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionHeaderFlags {
    pub f_crypto_api: bool,
    pub f_doc_props: bool,
    pub f_external: bool,
    pub f_aes: bool,
    pub raw: u32,
}

impl EncryptionHeaderFlags {
    fn from_raw(raw: u32) -> Self {
        EncryptionHeaderFlags {
            f_crypto_api: raw & (1 << 2) != 0,
            f_doc_props: raw & (1 << 3) != 0,
            f_external: raw & (1 << 4) != 0,
            f_aes: raw & (1 << 5) != 0,
            raw,
        }
    }
}

/// `EncryptionHeader` ([MS-OFFCRYPTO] 2.3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionHeader {
    pub flags: EncryptionHeaderFlags,
    pub size_extra: u32,
    pub alg_id: u32,
    pub alg_id_hash: u32,
    /// Key length in bits. Zero means 40-bit RC4.
    pub key_size: u32,
    pub provider_type: u32,
    pub csp_name: String,
}

/// `EncryptionVerifier` ([MS-OFFCRYPTO] 2.3.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionVerifier {
    pub salt_size: u32,
    pub salt: [u8; 16],
    pub encrypted_verifier: [u8; 16],
    pub verifier_hash_size: u32,
    pub encrypted_verifier_hash: Vec<u8>,
}

/// RC4 CryptoAPI FilePass body ([MS-OFFCRYPTO] 2.3.5.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoApiHeader {
    pub version_major: u16,
    pub version_minor: u16,
    /// Copy of the header flags stored ahead of `EncryptionHeaderSize`.
    pub stream_flags: EncryptionHeaderFlags,
    pub header: EncryptionHeader,
    pub verifier: EncryptionVerifier,
}

impl CryptoApiHeader {
    /// Effective key length in bytes. `KeySize = 0` means 40-bit RC4.
    pub fn key_size_bytes(&self) -> Result<usize, OffcryptoError> {
        let bits = if self.header.key_size == 0 {
            40
        } else {
            self.header.key_size
        };
        if bits % 8 != 0 || bits < 40 || bits > 128 {
            return Err(OffcryptoError::UnsupportedEncryption(format!(
                "invalid CryptoAPI key size: {bits} bits"
            )));
        }
        Ok((bits / 8) as usize)
    }
}

/// Parsed FilePass record payload.
#[derive(Debug, Clone, PartialEq)]
pub enum FilePass {
    Xor(XorObfuscation),
    Rc4(Rc4Header),
    CryptoApi(CryptoApiHeader),
}

impl FilePass {
    pub fn scheme_name(&self) -> &'static str {
        match self {
            FilePass::Xor(_) => "XOR",
            FilePass::Rc4(_) => "RC4",
            FilePass::CryptoApi(_) => "CryptoAPI",
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], OffcryptoError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.buf.len())
            .ok_or(OffcryptoError::InvalidFilePass("truncated FilePass payload"))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, OffcryptoError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, OffcryptoError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn bytes16(&mut self) -> Result<[u8; 16], OffcryptoError> {
        let mut out = [0u8; 16];
        out.copy_from_slice(self.take(16)?);
        Ok(out)
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

/// Decode a zero-terminated UTF-16LE string (the `CSPName` field).
fn utf16z_to_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

/// Parse a FilePass record payload ([MS-XLS] 2.4.117).
pub fn parse_file_pass(payload: &[u8]) -> Result<FilePass, OffcryptoError> {
    let mut rd = Reader::new(payload);
    let encryption_type = rd.u16()?;
    match encryption_type {
        0x0000 => {
            let key = rd.u16()?;
            let verification_bytes = rd.u16()?;
            Ok(FilePass::Xor(XorObfuscation {
                key,
                verification_bytes,
            }))
        }
        0x0001 => {
            let v_major = rd.u16()?;
            let v_minor = rd.u16()?;
            match v_major {
                0x0001 => {
                    if v_minor != 0x0001 {
                        return Err(OffcryptoError::InvalidFilePass(
                            "RC4 header version minor must be 1",
                        ));
                    }
                    Ok(FilePass::Rc4(Rc4Header {
                        salt: rd.bytes16()?,
                        encrypted_verifier: rd.bytes16()?,
                        encrypted_verifier_hash: rd.bytes16()?,
                    }))
                }
                0x0002..=0x0004 => parse_cryptoapi_body(&mut rd, v_major, v_minor),
                other => Err(OffcryptoError::UnsupportedEncryption(format!(
                    "unknown RC4 encryption header version: {other:#06x}"
                ))),
            }
        }
        other => Err(OffcryptoError::UnsupportedEncryption(format!(
            "unknown wEncryptionType: {other:#06x}"
        ))),
    }
}

fn parse_cryptoapi_body(
    rd: &mut Reader<'_>,
    version_major: u16,
    version_minor: u16,
) -> Result<FilePass, OffcryptoError> {
    let stream_flags = EncryptionHeaderFlags::from_raw(rd.u32()?);
    let header_size = rd.u32()? as usize;
    if header_size < 32 || header_size > rd.remaining() {
        return Err(OffcryptoError::InvalidFilePass(
            "EncryptionHeaderSize out of range",
        ));
    }

    let header_bytes = rd.take(header_size)?;
    let mut hr = Reader::new(header_bytes);
    let header = EncryptionHeader {
        flags: EncryptionHeaderFlags::from_raw(hr.u32()?),
        size_extra: hr.u32()?,
        alg_id: hr.u32()?,
        alg_id_hash: hr.u32()?,
        key_size: hr.u32()?,
        provider_type: hr.u32()?,
        csp_name: {
            hr.u32()?; // Reserved1
            hr.u32()?; // Reserved2
            utf16z_to_string(&header_bytes[hr.pos..])
        },
    };

    let salt_size = rd.u32()?;
    if salt_size != 16 {
        return Err(OffcryptoError::InvalidFilePass("SaltSize must be 16"));
    }
    let salt = rd.bytes16()?;
    let encrypted_verifier = rd.bytes16()?;
    let verifier_hash_size = rd.u32()?;
    let encrypted_verifier_hash = rd.take(rd.remaining())?.to_vec();

    Ok(FilePass::CryptoApi(CryptoApiHeader {
        version_major,
        version_minor,
        stream_flags,
        header,
        verifier: EncryptionVerifier {
            salt_size,
            salt,
            encrypted_verifier,
            verifier_hash_size,
            encrypted_verifier_hash,
        },
    }))
}

/// Scan the stream for a FilePass record.
///
/// Returns `None` when one of the first mandatory records that follow an
/// (optional) FilePass — `InterfaceHdr`, `WriteAccess` or `CodePage` — is
/// seen first: the stream is plaintext.
pub fn probe_file_pass(raw: &[u8]) -> Result<Option<FilePass>, OffcryptoError> {
    let mut offset = 0usize;
    while offset + RECORD_HEADER_LEN <= raw.len() {
        let id = u16::from_le_bytes([raw[offset], raw[offset + 1]]);
        let size = u16::from_le_bytes([raw[offset + 2], raw[offset + 3]]) as usize;
        let data_start = offset + RECORD_HEADER_LEN;
        let data_end = data_start + size;
        if data_end > raw.len() {
            break;
        }

        match id {
            RECORD_FILEPASS => {
                return parse_file_pass(&raw[data_start..data_end]).map(Some);
            }
            RECORD_INTERFACEHDR | RECORD_WRITEACCESS | RECORD_CODEPAGE => return Ok(None),
            RECORD_EOF => return Ok(None),
            _ => {}
        }
        offset = data_end;
    }
    Ok(None)
}

/// Restore the byte regions the writer never encrypts ([MS-XLS] 2.2.10):
/// every record header; the whole payload of `BOF`, `FilePass`, `UsrExcl`,
/// `FileLock`, `InterfaceHdr`, `RRDInfo` and `RRDHead`; and the first four
/// payload bytes (`lbPlyPos`) of each `BoundSheet8`.
///
/// `original` is the untouched ciphertext stream (whose headers are already
/// plaintext); `decrypted` is the whole-stream decryption output.
pub fn restore_plaintext_regions(original: &[u8], decrypted: &mut [u8]) {
    debug_assert_eq!(original.len(), decrypted.len());

    let mut offset = 0usize;
    while offset + RECORD_HEADER_LEN <= original.len() {
        let id = u16::from_le_bytes([original[offset], original[offset + 1]]);
        let size = u16::from_le_bytes([original[offset + 2], original[offset + 3]]) as usize;
        let data_start = offset + RECORD_HEADER_LEN;
        let data_end = (data_start + size).min(original.len());

        decrypted[offset..data_start].copy_from_slice(&original[offset..data_start]);

        match id {
            RECORD_BOF_BIFF8 | RECORD_FILEPASS | RECORD_USREXCL | RECORD_FILELOCK
            | RECORD_INTERFACEHDR | RECORD_RRDINFO | RECORD_RRDHEAD => {
                decrypted[data_start..data_end].copy_from_slice(&original[data_start..data_end]);
            }
            RECORD_BOUNDSHEET8 => {
                let end = (data_start + 4).min(data_end);
                decrypted[data_start..end].copy_from_slice(&original[data_start..end]);
            }
            _ => {}
        }

        offset = data_start + size;
    }
}

fn decrypt_xor_stream(
    raw: &[u8],
    password: &str,
    fp: &XorObfuscation,
) -> Result<Vec<u8>, OffcryptoError> {
    if !xor::password_matches(password, fp.verification_bytes) {
        return Err(OffcryptoError::WrongPassword);
    }
    let array = xor::create_xor_array_method1(password)?;

    let mut out = raw.to_vec();
    let mut offset = 0usize;
    while offset + RECORD_HEADER_LEN <= out.len() {
        let size = u16::from_le_bytes([out[offset + 2], out[offset + 3]]) as usize;
        let data_start = offset + RECORD_HEADER_LEN;
        let data_end = data_start + size;
        if data_end > out.len() {
            break;
        }
        xor::decrypt_record_payload(&mut out[data_start..data_end], offset, &array);
        offset = data_end;
    }
    Ok(out)
}

/// Decrypt a Workbook stream if it carries a FilePass record.
///
/// Returns `Ok(None)` for plaintext streams. `password` falls back to
/// [`DEFAULT_PASSWORD`] — Excel silently encrypts under `VelvetSweatshop`
/// for some save paths, so absence of a user password does not mean absence
/// of encryption.
pub fn decrypt_workbook_stream(
    raw: &[u8],
    password: Option<&str>,
) -> Result<Option<Vec<u8>>, OffcryptoError> {
    let Some(file_pass) = probe_file_pass(raw)? else {
        return Ok(None);
    };
    let password = password.unwrap_or(DEFAULT_PASSWORD);
    log::debug!(
        "workbook stream is encrypted ({})",
        file_pass.scheme_name()
    );

    let mut decrypted = match &file_pass {
        FilePass::Xor(fp) => decrypt_xor_stream(raw, password, fp)?,
        FilePass::Rc4(header) => standard::decrypt_stream(raw, password, header)?,
        FilePass::CryptoApi(header) => cryptoapi::decrypt_stream(raw, password, header)?,
    };
    restore_plaintext_regions(raw, &mut decrypted);
    Ok(Some(decrypted))
}

//! Binary-document XOR obfuscation ([MS-OFFCRYPTO] 2.3.7, "Method 1").
//!
//! XOR obfuscation is not encryption in any meaningful sense: a 16-byte
//! array derived from the password is XORed (with a rotation) over record
//! payloads. Record headers are never obfuscated, and the array index for a
//! payload byte depends only on the containing record's offset and size.

use crate::OffcryptoError;

pub(crate) const XOR_PAD: [u8; 15] = [
    0xBB, 0xFF, 0xFF, 0xBA, 0xFF, 0xFF, 0xB9, 0x80, 0x00, 0xBE, 0x0F, 0x00, 0xBF, 0x0F, 0x00,
];

const XOR_INITIAL_CODE: [u16; 15] = [
    0xE1F0, 0x1D0F, 0xCC9C, 0x84C0, 0x110C, 0x0E10, 0xF1CE, 0x313E, 0x1872, 0xE139, 0xD40F,
    0x84F9, 0x280C, 0xA96A, 0x4EC3,
];

const XOR_MATRIX: [u16; 105] = [
    0xAEFC, 0x4DD9, 0x9BB2, 0x2745, 0x4E8A, 0x9D14, 0x2A09, 0x7B61, 0xF6C2, 0xFDA5, 0xEB6B,
    0xC6F7, 0x9DCF, 0x2BBF, 0x4563, 0x8AC6, 0x05AD, 0x0B5A, 0x16B4, 0x2D68, 0x5AD0, 0x0375,
    0x06EA, 0x0DD4, 0x1BA8, 0x3750, 0x6EA0, 0xDD40, 0xD849, 0xA0B3, 0x5147, 0xA28E, 0x553D,
    0xAA7A, 0x44D5, 0x6F45, 0xDE8A, 0xAD35, 0x4A4B, 0x9496, 0x390D, 0x721A, 0xEB23, 0xC667,
    0x9CEF, 0x29FF, 0x53FE, 0xA7FC, 0x5FD9, 0x47D3, 0x8FA6, 0x0F6D, 0x1EDA, 0x3DB4, 0x7B68,
    0xF6D0, 0xB861, 0x60E3, 0xC1C6, 0x93AD, 0x377B, 0x6EF6, 0xDDEC, 0x45A0, 0x8B40, 0x06A1,
    0x0D42, 0x1A84, 0x3508, 0x6A10, 0xAA51, 0x4483, 0x8906, 0x022D, 0x045A, 0x08B4, 0x1168,
    0x76B4, 0xED68, 0xCAF1, 0x85C3, 0x1BA7, 0x374E, 0x6E9C, 0x3730, 0x6E60, 0xDCC0, 0xA9A1,
    0x4363, 0x86C6, 0x1DAD, 0x3331, 0x6662, 0xCCC4, 0x89A9, 0x0373, 0x06E6, 0x0DCC, 0x1021,
    0x2042, 0x4084, 0x8108, 0x1231, 0x2462, 0x48C4,
];

/// Convert a password to the "ANSI" byte form used by the XOR derivation
/// ([MS-OFFCRYPTO] 2.3.7.4): for each UTF-16 code unit take the low byte
/// unless it is zero, in which case take the high byte.
///
/// XOR-obfuscated documents only support 1..=15 character passwords; anything
/// outside that range cannot match and is reported as a wrong password.
fn password_to_ansi(password: &str) -> Result<Vec<u8>, OffcryptoError> {
    let units: Vec<u16> = password.encode_utf16().collect();
    if units.is_empty() || units.len() > 15 {
        return Err(OffcryptoError::WrongPassword);
    }
    Ok(units
        .iter()
        .map(|&c| {
            let low = (c & 0xFF) as u8;
            if low == 0 {
                (c >> 8) as u8
            } else {
                low
            }
        })
        .collect())
}

fn xor_ror(b1: u8, b2: u8) -> u8 {
    (b1 ^ b2).rotate_right(1)
}

/// `CreateXorKey_Method1` ([MS-OFFCRYPTO] 2.3.7.2).
pub fn create_xor_key_method1(password: &str) -> Result<u16, OffcryptoError> {
    let ansi = password_to_ansi(password)?;

    let mut xor_key = XOR_INITIAL_CODE[ansi.len() - 1];
    let mut current_element: usize = 0x68;

    for &byte in ansi.iter().rev() {
        let mut c = byte;
        for _ in 0..7 {
            if c & 0x40 != 0 {
                xor_key ^= XOR_MATRIX[current_element];
            }
            c <<= 1;
            current_element = current_element.wrapping_sub(1);
        }
    }

    Ok(xor_key)
}

/// `CreateXorArray_Method1` ([MS-OFFCRYPTO] 2.3.7.2): the 16-byte
/// obfuscation array applied to record payloads.
pub fn create_xor_array_method1(password: &str) -> Result<[u8; 16], OffcryptoError> {
    let ansi = password_to_ansi(password)?;
    let xor_key = create_xor_key_method1(password)?;
    let key_high = (xor_key >> 8) as u8;
    let key_low = (xor_key & 0xFF) as u8;

    let mut array = [0u8; 16];
    let mut index = ansi.len();

    if index & 1 == 1 {
        array[index] = xor_ror(XOR_PAD[0], key_high);
        index -= 1;
        array[index] = xor_ror(ansi[ansi.len() - 1], key_low);
    }

    while index > 0 {
        index -= 1;
        array[index] = xor_ror(ansi[index], key_high);
        index -= 1;
        array[index] = xor_ror(ansi[index], key_low);
    }

    index = 15;
    let mut pad_index = 15 - ansi.len() as isize;
    while pad_index > 0 {
        array[index] = xor_ror(XOR_PAD[pad_index as usize], key_high);
        index -= 1;
        pad_index -= 1;
        array[index] = xor_ror(XOR_PAD[pad_index as usize], key_low);
        index = index.wrapping_sub(1);
        pad_index -= 1;
    }

    Ok(array)
}

/// `CreatePasswordVerifier_Method1` ([MS-OFFCRYPTO] 2.3.7.1): the 16-bit
/// verifier stored in the FilePass record.
pub fn password_verifier_method1(password: &str) -> Result<u16, OffcryptoError> {
    let ansi = password_to_ansi(password)?;

    let mut verifier: u16 = 0;
    for &b in ansi.iter().rev().chain(std::iter::once(&(ansi.len() as u8))) {
        let int1 = if verifier & 0x4000 == 0 { 0 } else { 1 };
        let int2 = (verifier << 1) & 0x7FFF;
        verifier = (int1 | int2) ^ u16::from(b);
    }

    Ok(verifier ^ 0xCE4B)
}

/// Check a password against the `verificationBytes` field of an XOR FilePass.
pub fn password_matches(password: &str, verification_bytes: u16) -> bool {
    password_verifier_method1(password)
        .map(|v| v == verification_bytes)
        .unwrap_or(false)
}

/// Decrypt the payload of one record in place.
///
/// `record_offset` is the stream offset of the record *header*. The array
/// index for payload byte `i` is `(offset + 4 + size + i) mod 16` — the
/// writer's "file offset at the end of the record data", so decryption of a
/// record never depends on its neighbors.
pub fn decrypt_record_payload(payload: &mut [u8], record_offset: usize, array: &[u8; 16]) {
    let size = payload.len();
    for (i, byte) in payload.iter_mut().enumerate() {
        let idx = (record_offset + 4 + size + i) & 0xF;
        *byte = (*byte ^ array[idx]).rotate_left(3);
    }
}

/// Obfuscate the payload of one record in place (inverse of
/// [`decrypt_record_payload`]; used by round-trip tests and kept symmetric
/// with the decrypt path).
pub fn encrypt_record_payload(payload: &mut [u8], record_offset: usize, array: &[u8; 16]) {
    let size = payload.len();
    for (i, byte) in payload.iter_mut().enumerate() {
        let idx = (record_offset + 4 + size + i) & 0xF;
        *byte = byte.rotate_right(3) ^ array[idx];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ansi_conversion_takes_low_byte_unless_zero() {
        assert_eq!(password_to_ansi("abc").unwrap(), b"abc");
        // U+0100 has a zero low byte, so the high byte (0x01) is used.
        assert_eq!(password_to_ansi("\u{0100}b").unwrap(), [0x01, b'b']);
    }

    #[test]
    fn rejects_empty_and_oversized_passwords() {
        assert!(matches!(
            password_to_ansi(""),
            Err(OffcryptoError::WrongPassword)
        ));
        assert!(matches!(
            password_to_ansi("0123456789abcdef"),
            Err(OffcryptoError::WrongPassword)
        ));
    }

    #[test]
    fn verifier_is_length_and_content_sensitive() {
        let a = password_verifier_method1("Password").unwrap();
        let b = password_verifier_method1("Passwore").unwrap();
        let c = password_verifier_method1("Passwor").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert!(password_matches("Password", a));
        assert!(!password_matches("Password", b));
    }

    #[test]
    fn record_payload_round_trips_at_any_offset() {
        let array = create_xor_array_method1("VelvetSweatshop").unwrap();
        for offset in [0usize, 1, 7, 16, 1021] {
            let plain: Vec<u8> = (0u8..37).collect();
            let mut buf = plain.clone();
            encrypt_record_payload(&mut buf, offset, &array);
            assert_ne!(buf, plain);
            decrypt_record_payload(&mut buf, offset, &array);
            assert_eq!(buf, plain);
        }
    }

    #[test]
    fn array_index_depends_on_record_geometry_only() {
        let array = create_xor_array_method1("abc").unwrap();
        let mut one = vec![0x11u8; 8];
        let mut two = vec![0x11u8; 8];
        encrypt_record_payload(&mut one, 32, &array);
        encrypt_record_payload(&mut two, 48, &array);
        // Offsets congruent mod 16 with equal sizes produce equal ciphertext.
        assert_eq!(one, two);
    }
}

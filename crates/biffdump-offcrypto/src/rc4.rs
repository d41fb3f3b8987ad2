//! Minimal RC4 stream cipher used by the legacy workbook encryption schemes.
//!
//! RC4 is obsolete and must not be used for new encryption; it is implemented
//! here solely to read existing documents.

/// RC4 keystream state.
pub struct Rc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    /// Key-schedule a new cipher state. `key` must be 1..=256 bytes.
    pub fn new(key: &[u8]) -> Self {
        debug_assert!(!key.is_empty() && key.len() <= 256);
        let mut s = [0u8; 256];
        for (idx, slot) in s.iter_mut().enumerate() {
            *slot = idx as u8;
        }
        let mut j: u8 = 0;
        for i in 0..256 {
            j = j
                .wrapping_add(s[i])
                .wrapping_add(key[i % key.len()]);
            s.swap(i, j as usize);
        }
        Rc4 { s, i: 0, j: 0 }
    }

    /// XOR the keystream into `buf` in place (encryption and decryption are
    /// the same operation).
    pub fn apply_keystream(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.s[self.i as usize]);
            self.s.swap(self.i as usize, self.j as usize);
            let k = self.s[(self.s[self.i as usize]
                .wrapping_add(self.s[self.j as usize])) as usize];
            *byte ^= k;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 6229 test vector: key 0x0102030405, first keystream bytes.
    #[test]
    fn rfc6229_40_bit_key() {
        let mut rc4 = Rc4::new(&[0x01, 0x02, 0x03, 0x04, 0x05]);
        let mut buf = [0u8; 16];
        rc4.apply_keystream(&mut buf);
        assert_eq!(
            buf,
            [
                0xb2, 0x39, 0x63, 0x05, 0xf0, 0x3d, 0xc0, 0x27, 0xcc, 0xc3, 0x52, 0x4a, 0x0a,
                0x11, 0x18, 0xa8
            ]
        );
    }

    #[test]
    fn keystream_is_symmetric() {
        let key = b"workbook key";
        let plain = b"record payload bytes".to_vec();
        let mut buf = plain.clone();
        Rc4::new(key).apply_keystream(&mut buf);
        assert_ne!(buf, plain);
        Rc4::new(key).apply_keystream(&mut buf);
        assert_eq!(buf, plain);
    }
}

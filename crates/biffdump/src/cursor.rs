//! Typed reads over a logical record's payload fragments.
//!
//! Scalars and raw byte runs read straight across fragment boundaries.
//! Unicode *character data* is different: when a string is split by a
//! continuation record, the continuation restates a one-byte encoding flags
//! field before the remaining characters ([MS-XLS] 2.5.268), and the
//! compressed/wide choice can flip between fragments. The string readers
//! here handle that; format runs and ExtRst data continue without a fresh
//! flags byte.

use encoding_rs::Encoding;
use log::warn;
use std::sync::{Mutex, OnceLock};

use crate::error::{BiffError, Result};

/// A character formatting run: first formatted character index and font index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatRun {
    pub ich: u16,
    pub ifnt: u16,
}

/// A decoded `XLUnicodeRichExtendedString`.
#[derive(Debug, Clone, PartialEq)]
pub struct RichString {
    pub text: String,
    pub runs: Vec<FormatRun>,
    /// Raw ExtRst payload (phonetic data), kept undecoded.
    pub ext: Option<Vec<u8>>,
}

/// Map a CodePage record value to an `encoding_rs` encoding. Unknown code
/// pages fall back to windows-1252 with a once-per-value warning.
pub fn encoding_for_codepage(cv: u16) -> &'static Encoding {
    let label: &str = match cv {
        437 => "ibm866", // closest single-byte OEM coverage encoding_rs has
        708 | 720 | 1256 => "windows-1256",
        737 | 869 | 1253 => "windows-1253",
        775 | 1257 => "windows-1257",
        850 | 852 | 1250 => "windows-1250",
        855 | 866 | 1251 => "windows-1251",
        857 | 1254 => "windows-1254",
        858 | 860 | 861 | 863 | 865 | 1252 => "windows-1252",
        862 | 1255 => "windows-1255",
        864 => "windows-1256",
        874 => "windows-874",
        932 => "shift_jis",
        936 => "gbk",
        949 => "euc-kr",
        950 => "big5",
        1258 => "windows-1258",
        10000 => "macintosh",
        28591 => "iso-8859-1",
        65001 => "utf-8",
        _ => {
            warn_unknown_codepage(cv);
            "windows-1252"
        }
    };
    // All labels above are valid encoding_rs labels.
    Encoding::for_label(label.as_bytes()).unwrap_or(encoding_rs::WINDOWS_1252)
}

/// Drain whichever pending character buffer is in use onto `text`. At most
/// one of the two buffers is non-empty at a time.
fn flush_chars(text: &mut String, narrow: &mut Vec<u8>, wide: &mut Vec<u16>, codepage: u16) {
    if !narrow.is_empty() {
        let (s, _, _) = encoding_for_codepage(codepage).decode(narrow);
        text.push_str(&s);
        narrow.clear();
    }
    if !wide.is_empty() {
        text.push_str(&String::from_utf16_lossy(wide));
        wide.clear();
    }
}

fn warn_unknown_codepage(cv: u16) {
    static SEEN: OnceLock<Mutex<std::collections::BTreeSet<u16>>> = OnceLock::new();
    let seen = SEEN.get_or_init(|| Mutex::new(std::collections::BTreeSet::new()));
    if let Ok(mut seen) = seen.lock() {
        if seen.insert(cv) {
            warn!("unknown code page {cv}, decoding 8-bit strings as windows-1252");
        }
    }
}

/// Reader over the fragments of one logical record.
pub struct Cursor<'a> {
    fragments: Vec<&'a [u8]>,
    frag: usize,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(fragments: &[&'a [u8]]) -> Self {
        Cursor {
            fragments: fragments.to_vec(),
            frag: 0,
            pos: 0,
        }
    }

    /// A cursor over one contiguous byte run.
    pub fn new_single(data: &'a [u8]) -> Self {
        Cursor {
            fragments: vec![data],
            frag: 0,
            pos: 0,
        }
    }

    /// Total unread bytes across all remaining fragments.
    pub fn remaining(&self) -> usize {
        if self.frag >= self.fragments.len() {
            return 0;
        }
        let head = self.fragments[self.frag].len() - self.pos;
        head + self.fragments[self.frag + 1..]
            .iter()
            .map(|f| f.len())
            .sum::<usize>()
    }

    pub fn at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// Whether the cursor sits exactly on a fragment boundary with data ahead.
    fn at_fragment_boundary(&mut self) -> bool {
        self.settle();
        self.pos == 0 && self.frag > 0 && self.frag < self.fragments.len()
    }

    /// Advance past exhausted fragments (empty fragments included).
    fn settle(&mut self) {
        while self.frag < self.fragments.len() && self.pos >= self.fragments[self.frag].len() {
            self.frag += 1;
            self.pos = 0;
        }
    }

    fn next_byte(&mut self, what: &'static str) -> Result<u8> {
        self.settle();
        if self.frag >= self.fragments.len() {
            return Err(BiffError::Truncated(what));
        }
        let b = self.fragments[self.frag][self.pos];
        self.pos += 1;
        Ok(b)
    }

    pub fn u8(&mut self, what: &'static str) -> Result<u8> {
        self.next_byte(what)
    }

    pub fn u16(&mut self, what: &'static str) -> Result<u16> {
        let lo = self.next_byte(what)?;
        let hi = self.next_byte(what)?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    pub fn i16(&mut self, what: &'static str) -> Result<i16> {
        Ok(self.u16(what)? as i16)
    }

    pub fn u32(&mut self, what: &'static str) -> Result<u32> {
        let mut bytes = [0u8; 4];
        for b in &mut bytes {
            *b = self.next_byte(what)?;
        }
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn i32(&mut self, what: &'static str) -> Result<i32> {
        Ok(self.u32(what)? as i32)
    }

    pub fn u64(&mut self, what: &'static str) -> Result<u64> {
        let mut bytes = [0u8; 8];
        for b in &mut bytes {
            *b = self.next_byte(what)?;
        }
        Ok(u64::from_le_bytes(bytes))
    }

    /// An 8-byte IEEE 754 `Xnum`.
    pub fn f64(&mut self, what: &'static str) -> Result<f64> {
        Ok(f64::from_bits(self.u64(what)?))
    }

    /// Read `n` raw bytes, crossing fragment boundaries as needed.
    pub fn bytes(&mut self, n: usize, what: &'static str) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.next_byte(what)?);
        }
        Ok(out)
    }

    pub fn skip(&mut self, n: usize, what: &'static str) -> Result<()> {
        for _ in 0..n {
            self.next_byte(what)?;
        }
        Ok(())
    }

    /// Consume and return whatever remains.
    pub fn rest(&mut self) -> Vec<u8> {
        let n = self.remaining();
        // Cannot fail: n bytes are known to remain.
        self.bytes(n, "rest").unwrap_or_default()
    }

    /// `cch` UTF-16LE code units, no flags byte (LPWideString and
    /// zero-terminated hyperlink strings).
    pub fn utf16_units(&mut self, cch: usize, what: &'static str) -> Result<String> {
        let mut units = Vec::with_capacity(cch);
        for _ in 0..cch {
            units.push(self.u16(what)?);
        }
        Ok(String::from_utf16_lossy(&units))
    }

    /// UTF-16LE code units up to and including a 0x0000 terminator; the
    /// terminator is consumed and not included.
    pub fn utf16z(&mut self, what: &'static str) -> Result<String> {
        let mut units = Vec::new();
        loop {
            let unit = self.u16(what)?;
            if unit == 0 {
                break;
            }
            units.push(unit);
        }
        Ok(String::from_utf16_lossy(&units))
    }

    /// Character data of `cch` code units starting in wide (`high_byte`) or
    /// compressed form, honoring the restated flags byte at each fragment
    /// boundary inside the character run.
    fn unicode_chars(
        &mut self,
        cch: usize,
        mut high_byte: bool,
        codepage: u16,
        what: &'static str,
    ) -> Result<String> {
        let mut text = String::with_capacity(cch);
        let mut narrow = Vec::new();
        let mut wide = Vec::new();
        let mut read = 0usize;
        while read < cch {
            // The flags byte is restated at every fragment boundary inside
            // the character run, including one sitting right before the
            // first character.
            if self.at_fragment_boundary() {
                let flags = self.next_byte(what)?;
                let next_high_byte = flags & 0x01 != 0;
                if next_high_byte != high_byte {
                    flush_chars(&mut text, &mut narrow, &mut wide, codepage);
                }
                high_byte = next_high_byte;
            }
            if high_byte {
                // Units stay buffered so surrogate pairs decode whole, even
                // across a fragment boundary.
                wide.push(self.u16(what)?);
            } else {
                narrow.push(self.next_byte(what)?);
            }
            read += 1;
        }
        flush_chars(&mut text, &mut narrow, &mut wide, codepage);
        Ok(text)
    }

    /// String body shared by all `XLUnicodeString` variants: flags byte, then
    /// optional run/ExtRst counts, then characters, runs and ExtRst.
    fn unicode_body(&mut self, cch: usize, codepage: u16, what: &'static str) -> Result<RichString> {
        let flags = self.next_byte(what)?;
        let high_byte = flags & 0x01 != 0;
        let rich = flags & 0x08 != 0;
        let ext = flags & 0x04 != 0;

        let c_run = if rich { self.u16(what)? as usize } else { 0 };
        let cb_ext = if ext {
            let cb = self.i32(what)?;
            if cb < 0 {
                return Err(BiffError::Malformed(format!(
                    "negative ExtRst size {cb} in {what}"
                )));
            }
            cb as usize
        } else {
            0
        };

        let text = self.unicode_chars(cch, high_byte, codepage, what)?;

        let mut runs = Vec::with_capacity(c_run);
        for _ in 0..c_run {
            runs.push(FormatRun {
                ich: self.u16(what)?,
                ifnt: self.u16(what)?,
            });
        }
        let ext = if ext {
            Some(self.bytes(cb_ext, what)?)
        } else {
            None
        };

        Ok(RichString { text, runs, ext })
    }

    /// `ShortXLUnicodeString`: cch as one byte.
    pub fn short_unicode_string(&mut self, codepage: u16, what: &'static str) -> Result<String> {
        let cch = self.u8(what)? as usize;
        Ok(self.unicode_body(cch, codepage, what)?.text)
    }

    /// `XLUnicodeString`: cch as two bytes.
    pub fn unicode_string(&mut self, codepage: u16, what: &'static str) -> Result<String> {
        let cch = self.u16(what)? as usize;
        Ok(self.unicode_body(cch, codepage, what)?.text)
    }

    /// `XLUnicodeStringNoCch`: the character count comes from elsewhere in
    /// the record.
    pub fn unicode_string_no_cch(
        &mut self,
        cch: usize,
        codepage: u16,
        what: &'static str,
    ) -> Result<String> {
        Ok(self.unicode_body(cch, codepage, what)?.text)
    }

    /// `XLUnicodeRichExtendedString` (the SST element type).
    pub fn rich_extended_string(&mut self, codepage: u16, what: &'static str) -> Result<RichString> {
        let cch = self.u16(what)? as usize;
        self.unicode_body(cch, codepage, what)
    }

    /// `LPWideString`: cch as two bytes, always UTF-16, no flags byte.
    pub fn lp_wide_string(&mut self, what: &'static str) -> Result<String> {
        let cch = self.u16(what)? as usize;
        self.utf16_units(cch, what)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CP1252: u16 = 1252;

    #[test]
    fn scalars_read_across_fragments() {
        let a: &[u8] = &[0x01, 0x02, 0x03];
        let b: &[u8] = &[0x04, 0x40, 0x09, 0x21];
        let mut c = Cursor::new(&[a, b]);
        assert_eq!(c.remaining(), 7);
        assert_eq!(c.u32("dword").unwrap(), 0x04030201);
        assert_eq!(c.u8("byte").unwrap(), 0x40);
        assert_eq!(c.u16("word").unwrap(), 0x2109);
        assert!(c.at_end());
        assert!(matches!(c.u8("past end"), Err(BiffError::Truncated(_))));
    }

    #[test]
    fn xnum_reads() {
        let bytes = 1.5f64.to_le_bytes();
        let frags: &[&[u8]] = &[&bytes];
        let mut c = Cursor::new(frags);
        assert_eq!(c.f64("num").unwrap(), 1.5);
    }

    #[test]
    fn compressed_string_decodes_through_codepage() {
        // cch=4, flags=0 (compressed), "caf\xE9" in windows-1252.
        let frag: &[u8] = &[0x04, 0x00, 0x00, b'c', b'a', b'f', 0xE9];
        let mut c = Cursor::new(&[frag]);
        assert_eq!(c.unicode_string(CP1252, "s").unwrap(), "café");
    }

    #[test]
    fn wide_string_decodes_utf16() {
        // cch=2, flags=1, "Дa".
        let frag: &[u8] = &[0x02, 0x00, 0x01, 0x14, 0x04, b'a', 0x00];
        let mut c = Cursor::new(&[frag]);
        assert_eq!(c.unicode_string(CP1252, "s").unwrap(), "Дa");
    }

    #[test]
    fn continued_string_restates_flags_per_fragment() {
        // cch=5, first two chars compressed in the base fragment; the
        // continuation switches to wide for the remaining three.
        let base: &[u8] = &[0x05, 0x00, 0x00, b'a', b'b'];
        let cont: &[u8] = &[0x01, b'c', 0x00, b'd', 0x00, 0x14, 0x04];
        let mut c = Cursor::new(&[base, cont]);
        assert_eq!(c.unicode_string(CP1252, "s").unwrap(), "abcdД");
    }

    #[test]
    fn string_survives_a_split_at_every_character() {
        // split == 0 puts the restated flags byte first in the continuation,
        // with the whole character run behind it.
        let chars = b"biff8!";
        for split in 0..chars.len() {
            let mut base = vec![0x06, 0x00, 0x00];
            base.extend(&chars[..split]);
            let mut cont = vec![0x00];
            cont.extend(&chars[split..]);
            let mut c = Cursor::new(&[&base[..], &cont[..]]);
            assert_eq!(c.unicode_string(CP1252, "s").unwrap(), "biff8!");
        }
    }

    #[test]
    fn surrogate_pairs_decode_as_one_character() {
        // U+1F600 is two UTF-16 units but one character.
        let data = [0x02, 0x00, 0x01, 0x3D, 0xD8, 0x00, 0xDE];
        let mut c = Cursor::new_single(&data);
        assert_eq!(c.unicode_string(CP1252, "s").unwrap(), "😀");
    }

    #[test]
    fn surrogate_pair_survives_a_fragment_split() {
        // The pair straddles the boundary; the continuation restates wide.
        let base = [0x02, 0x00, 0x01, 0x3D, 0xD8];
        let cont = [0x01, 0x00, 0xDE];
        let mut c = Cursor::new(&[&base[..], &cont[..]]);
        assert_eq!(c.unicode_string(CP1252, "s").unwrap(), "😀");
    }

    #[test]
    fn continuation_can_drop_back_to_compressed() {
        let base: &[u8] = &[0x03, 0x00, 0x01, 0x14, 0x04];
        let cont: &[u8] = &[0x00, b'x', b'y'];
        let mut c = Cursor::new(&[base, cont]);
        assert_eq!(c.unicode_string(CP1252, "s").unwrap(), "Дxy");
    }

    #[test]
    fn rich_string_reads_runs_after_characters() {
        // cch=2, fRichSt, cRun=1, chars "hi", run {ich:1, ifnt:7}.
        let frag: &[u8] = &[0x02, 0x00, 0x08, 0x01, 0x00, b'h', b'i', 0x01, 0x00, 0x07, 0x00];
        let mut c = Cursor::new(&[frag]);
        let s = c.rich_extended_string(CP1252, "sst").unwrap();
        assert_eq!(s.text, "hi");
        assert_eq!(s.runs, vec![FormatRun { ich: 1, ifnt: 7 }]);
        assert_eq!(s.ext, None);
    }

    #[test]
    fn ext_string_carries_raw_extrst() {
        // cch=1, fExtSt, cbExtRst=3.
        let frag: &[u8] = &[0x01, 0x00, 0x04, 0x03, 0x00, 0x00, 0x00, b'q', 0xDE, 0xAD, 0xBE];
        let mut c = Cursor::new(&[frag]);
        let s = c.rich_extended_string(CP1252, "sst").unwrap();
        assert_eq!(s.text, "q");
        assert_eq!(s.ext, Some(vec![0xDE, 0xAD, 0xBE]));
    }

    #[test]
    fn format_runs_continue_without_flags_byte() {
        // cch=1 rich string whose run table starts in the continuation: no
        // flags byte is restated there.
        let base: &[u8] = &[0x01, 0x00, 0x08, 0x01, 0x00, b'z'];
        let cont: &[u8] = &[0x00, 0x00, 0x05, 0x00];
        let mut c = Cursor::new(&[base, cont]);
        let s = c.rich_extended_string(CP1252, "sst").unwrap();
        assert_eq!(s.text, "z");
        assert_eq!(s.runs, vec![FormatRun { ich: 0, ifnt: 5 }]);
    }

    #[test]
    fn utf16z_stops_at_terminator() {
        let frag: &[u8] = &[b'o', 0x00, b'k', 0x00, 0x00, 0x00, 0xFF, 0xFF];
        let mut c = Cursor::new(&[frag]);
        assert_eq!(c.utf16z("tooltip").unwrap(), "ok");
        assert_eq!(c.remaining(), 2);
    }

    #[test]
    fn short_string_uses_one_byte_count() {
        let frag: &[u8] = &[0x03, 0x00, b'X', b'Y', b'Z'];
        let mut c = Cursor::new(&[frag]);
        assert_eq!(c.short_unicode_string(CP1252, "name").unwrap(), "XYZ");
    }

    #[test]
    fn known_codepages_resolve() {
        assert_eq!(encoding_for_codepage(1251).name(), "windows-1251");
        assert_eq!(encoding_for_codepage(932).name(), "Shift_JIS");
        assert_eq!(encoding_for_codepage(0xFFFF).name(), "windows-1252");
    }
}

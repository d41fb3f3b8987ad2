//! Decoder for the BIFF8 `Workbook` stream of legacy Excel (`.xls`) files.
//!
//! The stream is a sequence of records, each a 4-byte header (id, payload
//! size, both u16 LE) followed by the payload. Payloads longer than a
//! record can carry are split across Continue records; this crate merges
//! those back into logical records before decoding. Encrypted streams
//! (XOR obfuscation, RC4 Standard, RC4 CryptoAPI) are decrypted through
//! the `biffdump-offcrypto` crate first, trying Excel's default password
//! when none is supplied.
//!
//! Decoding produces [`value::Value`] trees per record: raw wire codes are
//! kept, and symbolic interpretations sit alongside them under `<name>_d`
//! keys. [`workbook::parse_workbook_stream`] assembles the records into
//! BOF..EOF substreams and builds a coordinate index over the cell-bearing
//! ones.
//!
//! ```no_run
//! use biffdump::{read_workbook_stream_from_xls, ParseOptions};
//!
//! # fn main() -> Result<(), biffdump::BiffError> {
//! let stream = read_workbook_stream_from_xls("report.xls")?;
//! let workbook = biffdump::parse_workbook_stream(&stream, &ParseOptions::default())?;
//! for substream in &workbook.substreams {
//!     println!("{:?}: {} record kinds", substream.kind(), substream.records.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod bits;
pub mod cursor;
pub mod decode;
pub mod error;
pub mod index;
pub mod records;
pub mod value;
pub mod workbook;

use std::path::Path;

pub use error::{BiffError, Result};
pub use index::{AddressIndex, Locator, ValueDimensions};
pub use value::{Fields, Value};
pub use workbook::{parse_workbook_stream, ParseOptions, Substream, Workbook};

/// Stream names the Workbook stream goes by inside the compound file.
/// Excel 5/95 wrote `Book`; BIFF8 writes `Workbook`.
const WORKBOOK_STREAM_NAMES: [&str; 2] = ["Workbook", "Book"];

/// Extracts the raw Workbook stream bytes from a `.xls` compound file.
pub fn read_workbook_stream_from_xls(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    use std::io::Read;

    let mut comp = cfb::open(path.as_ref())?;
    for name in WORKBOOK_STREAM_NAMES {
        if comp.exists(name) {
            let mut stream = comp.open_stream(name)?;
            let mut bytes = Vec::new();
            stream.read_to_end(&mut bytes)?;
            return Ok(bytes);
        }
    }
    Err(BiffError::UnsupportedFormat(
        "compound file has no Workbook or Book stream".into(),
    ))
}

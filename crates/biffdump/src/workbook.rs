//! Workbook assembly: decrypt, iterate logical records, decode, index.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::{Mutex, OnceLock};

use biffdump_offcrypto as offcrypto;

use crate::decode::{decode_record, DecodeCtx};
use crate::error::{BiffError, Result};
use crate::index::AddressIndex;
use crate::records::{record_name, LogicalRecordIter, RECORD_BOF_BIFF8};
use crate::value::{Fields, Value};

/// Options for [`parse_workbook_stream`].
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Password for encrypted workbooks. When `None`, the writer's default
    /// password is tried, which covers the common "protected but not
    /// secret" files Excel produces.
    pub password: Option<String>,
}

/// One BOF..EOF unit. Decoded records live in per-name collections; serial
/// records append while singleton records keep only the latest instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substream {
    pub records: BTreeMap<&'static str, Vec<Fields>>,
}

impl Substream {
    /// First (for singletons, only) decoded record of the given name.
    pub fn get(&self, name: &str) -> Option<&Fields> {
        self.records.get(name).and_then(|v| v.first())
    }

    pub fn all(&self, name: &str) -> &[Fields] {
        self.records.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The dt_d label of this substream's BOF, e.g. `globals` or
    /// `dialog_or_work_sheet`.
    pub fn kind(&self) -> Option<&'static str> {
        match self.get("BOF")?.get("dt_d")? {
            Value::Sym(label) => Some(label),
            _ => None,
        }
    }
}

/// A fully assembled workbook stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    /// Substreams in stream order. Position 0 is the globals substream;
    /// sheet substreams follow in BoundSheet8 order.
    pub substreams: Vec<Substream>,
    pub index: AddressIndex,
}

fn warn_unknown_record(id: u16) {
    static SEEN: OnceLock<Mutex<BTreeSet<u16>>> = OnceLock::new();
    let seen = SEEN.get_or_init(|| Mutex::new(BTreeSet::new()));
    if let Ok(mut seen) = seen.lock() {
        if seen.insert(id) {
            log::warn!("skipping unknown record id 0x{id:04X}");
        }
    }
}

/// Rejects anything that does not open with a BIFF8 BOF, naming the BIFF
/// version when an older one is recognized.
fn check_biff8(stream: &[u8]) -> Result<()> {
    if stream.len() < 8 {
        return Err(BiffError::Truncated("workbook stream header"));
    }
    let id = u16::from_le_bytes([stream[0], stream[1]]);
    let legacy = match id {
        0x0009 => Some("BIFF2"),
        0x0209 => Some("BIFF3"),
        0x0409 => Some("BIFF4"),
        _ => None,
    };
    if let Some(version) = legacy {
        return Err(BiffError::UnsupportedFormat(format!(
            "{version} workbook streams are not supported"
        )));
    }
    if id != RECORD_BOF_BIFF8 {
        return Err(BiffError::UnsupportedFormat(
            "stream does not start with a BOF record".into(),
        ));
    }
    let vers = u16::from_le_bytes([stream[4], stream[5]]);
    match vers {
        0x0600 => Ok(()),
        0x0000 | 0x0500 => Err(BiffError::UnsupportedFormat(
            "BIFF5 workbook streams are not supported".into(),
        )),
        other => Err(BiffError::UnsupportedFormat(format!(
            "unrecognized BOF version 0x{other:04X}"
        ))),
    }
}

fn record_header(
    id: u16,
    name: &'static str,
    offset: usize,
    size: usize,
    serial: Option<usize>,
) -> Fields {
    let mut h = Fields::new();
    h.push("id", id);
    h.push("name", Value::Sym(name));
    h.push("offset", offset as u64);
    h.push("size", size as u64);
    if let Some(index) = serial {
        h.push("index", index as u64);
    }
    h
}

fn with_header(header: Fields, decoded: Fields) -> Fields {
    let mut out = Fields::new();
    out.push("_record", header);
    for (name, value) in decoded.iter() {
        out.push(name, value.clone());
    }
    out
}

/// Parses a decrypted-or-plaintext Workbook stream into substreams plus the
/// address index.
pub fn parse_workbook_stream(raw: &[u8], options: &ParseOptions) -> Result<Workbook> {
    let decrypted = offcrypto::decrypt_workbook_stream(raw, options.password.as_deref())?;
    let stream: &[u8] = decrypted.as_deref().unwrap_or(raw);
    check_biff8(stream)?;

    let mut workbook = Workbook::default();
    let mut ctx = DecodeCtx::default();

    for logical in LogicalRecordIter::new(stream) {
        let logical = logical?;
        let Some(name) = record_name(logical.id) else {
            warn_unknown_record(logical.id);
            continue;
        };

        if logical.id == RECORD_BOF_BIFF8 {
            workbook.substreams.push(Substream::default());
        }
        let sheet = match workbook.substreams.len().checked_sub(1) {
            Some(sheet) => sheet,
            // Records between an EOF and the next BOF are stray; skip them.
            None => continue,
        };

        let collection_len = workbook
            .substreams[sheet]
            .records
            .get(name)
            .map(Vec::len)
            .unwrap_or(0);
        ctx.serial_index = collection_len;

        let Some(decoded) = decode_record(name, &logical, &ctx)? else {
            continue;
        };

        match name {
            "CodePage" => {
                if let Some(Value::Uint(cv)) = decoded.fields.get("cv") {
                    if let Ok(cv) = u16::try_from(*cv) {
                        ctx.codepage = cv;
                    }
                }
            }
            "TableStyle" => ctx.last_table_style = Some(collection_len),
            _ => {}
        }

        let serial = decoded.serial.then_some(collection_len);
        let fields = with_header(
            record_header(logical.id, name, logical.offset, logical.size, serial),
            decoded.fields,
        );

        if decoded.serial {
            workbook.index.observe(sheet, name, collection_len, &fields);
            workbook.substreams[sheet]
                .records
                .entry(name)
                .or_default()
                .push(fields);
        } else {
            let slot = workbook.substreams[sheet].records.entry(name).or_default();
            slot.clear();
            slot.push(fields);
        }
    }

    Ok(workbook)
}

//! Record decoders.
//!
//! Each decoder consumes a logical record payload through a [`Cursor`] and
//! produces an ordered [`Fields`] tree. Numeric codes that have a symbolic
//! meaning are emitted twice, once raw and once as a `<name>_d` label, so
//! callers keep both the wire value and a readable interpretation.

mod globals;
mod oshared;
mod sheet;
mod structs;

use crate::cursor::{Cursor, RichString};
use crate::error::Result;
use crate::records::LogicalRecord;
use crate::value::{Fields, Value};

/// Ambient decoding state threaded through individual record decoders.
///
/// The workbook assembler owns one of these per parse and updates it as
/// records are consumed: `codepage` after a CodePage record, `serial_index`
/// before each serially indexed record, `last_table_style` after each
/// TableStyle so its elements can point back at it.
#[derive(Debug, Clone)]
pub struct DecodeCtx {
    /// Code page used for compressed (8-bit) string payloads.
    pub codepage: u16,
    /// Position of the record being decoded within its serial collection.
    pub serial_index: usize,
    /// Serial index of the most recent TableStyle record.
    pub last_table_style: Option<usize>,
}

impl Default for DecodeCtx {
    fn default() -> Self {
        DecodeCtx {
            codepage: 1252,
            serial_index: 0,
            last_table_style: None,
        }
    }
}

/// A decoded record payload plus its collection discipline.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub fields: Fields,
    /// Serial records accumulate in an ordered collection keyed by their
    /// position; non-serial records are singletons within their substream.
    pub serial: bool,
}

/// Flattens a rich SST entry to a plain string when it carries no
/// formatting runs and no extended data.
pub(crate) fn rich_string_value(s: RichString) -> Value {
    if s.runs.is_empty() && s.ext.is_none() {
        return Value::Str(s.text);
    }
    let mut f = Fields::new();
    f.push("text", s.text);
    let runs: Vec<Value> = s
        .runs
        .into_iter()
        .map(|run| {
            let mut r = Fields::new();
            r.push("ich", run.ich);
            r.push("ifnt", run.ifnt);
            Value::Map(r)
        })
        .collect();
    f.push("rgRun", runs);
    if let Some(ext) = s.ext {
        f.push("extRst", ext_rst_value(&ext));
    }
    Value::Map(f)
}

/// Splits the ExtRst header off the phonetic-string payload. Payloads too
/// short to carry the header are kept as raw bytes.
fn ext_rst_value(ext: &[u8]) -> Value {
    if ext.len() < 4 {
        return Value::Bytes(ext.to_vec());
    }
    let mut f = Fields::new();
    f.push("reserved", u16::from_le_bytes([ext[0], ext[1]]));
    f.push("cb", u16::from_le_bytes([ext[2], ext[3]]));
    f.push("phs", ext[4..].to_vec());
    Value::Map(f)
}

type Decoder = fn(&mut Cursor<'_>, &DecodeCtx) -> Result<Fields>;

/// EOF carries no payload but still closes its substream as a record.
fn empty(_c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    Ok(Fields::new())
}

fn decoder_for(name: &str) -> Option<(Decoder, bool)> {
    let entry: (Decoder, bool) = match name {
        // Workbook globals.
        "BOF" => (globals::bof, false),
        "BoundSheet8" => (globals::boundsheet8, true),
        "CalcPrecision" => (globals::calc_precision, false),
        "CodePage" => (globals::codepage, false),
        "Country" => (globals::country, false),
        "Date1904" => (globals::date1904, false),
        "EOF" => (empty, false),
        "FilePass" => (globals::file_pass, false),
        "Font" => (globals::font, true),
        "Format" => (globals::format, true),
        "InterfaceHdr" => (globals::interface_hdr, false),
        "Palette" => (globals::palette, false),
        "SST" => (globals::sst, false),
        "Style" => (globals::style, true),
        "StyleExt" => (globals::style_ext, true),
        "TableStyle" => (globals::table_style, true),
        "TableStyleElement" => (globals::table_style_element, true),
        "TableStyles" => (globals::table_styles, false),
        "WriteAccess" => (globals::write_access, false),
        "XF" => (globals::xf, true),
        // Worksheet records.
        "Blank" => (sheet::blank, true),
        "BoolErr" => (sheet::bool_err, true),
        "ColInfo" => (sheet::col_info, true),
        "Dimensions" => (sheet::dimensions, false),
        "Formula" => (sheet::formula, true),
        "HLink" => (sheet::hlink, true),
        "HLinkTooltip" => (sheet::hlink_tooltip, true),
        "LabelSst" => (sheet::label_sst, true),
        "MergeCells" => (sheet::merge_cells, true),
        "MulBlank" => (sheet::mul_blank, true),
        "MulRk" => (sheet::mul_rk, true),
        "Note" => (sheet::note, true),
        "Number" => (sheet::number, true),
        "Obj" => (sheet::obj, true),
        "RK" => (sheet::rk, true),
        "Row" => (sheet::row, true),
        "String" => (sheet::string, true),
        "WsBool" => (sheet::ws_bool, false),
        _ => return None,
    };
    Some(entry)
}

/// Whether records named `name` accumulate serially instead of overwriting.
pub fn is_serial(name: &str) -> bool {
    decoder_for(name).map(|(_, serial)| serial).unwrap_or(false)
}

/// Decodes a logical record by name. Returns `Ok(None)` for record types
/// that have no decoder; their headers are still tracked by the assembler.
pub fn decode_record(
    name: &str,
    record: &LogicalRecord<'_>,
    ctx: &DecodeCtx,
) -> Result<Option<Decoded>> {
    let Some((decoder, serial)) = decoder_for(name) else {
        return Ok(None);
    };
    let mut cursor = Cursor::new(&record.fragments);
    let fields = decoder(&mut cursor, ctx)?;
    Ok(Some(Decoded { fields, serial }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::FormatRun;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_rich_string_flattens() {
        let s = RichString {
            text: "abc".into(),
            runs: Vec::new(),
            ext: None,
        };
        assert_eq!(rich_string_value(s), Value::Str("abc".into()));
    }

    #[test]
    fn formatted_rich_string_keeps_runs() {
        let s = RichString {
            text: "abc".into(),
            runs: vec![FormatRun { ich: 1, ifnt: 4 }],
            ext: None,
        };
        let v = rich_string_value(s);
        let f = v.as_map().unwrap();
        assert_eq!(f.get("text"), Some(&Value::Str("abc".into())));
        let runs = f.get("rgRun").unwrap().as_list().unwrap();
        assert_eq!(runs[0].as_map().unwrap().get("ifnt"), Some(&Value::Uint(4)));
    }

    #[test]
    fn unknown_record_names_are_skipped() {
        let rec = LogicalRecord {
            id: 0x00FF,
            offset: 0,
            size: 0,
            fragments: Vec::new(),
        };
        assert_eq!(decode_record("ExtSst", &rec, &DecodeCtx::default()).unwrap(), None);
    }

    #[test]
    fn serial_discipline_per_name() {
        assert!(is_serial("XF"));
        assert!(is_serial("RK"));
        assert!(!is_serial("BOF"));
        assert!(!is_serial("SST"));
        assert!(!is_serial("Dimensions"));
    }
}

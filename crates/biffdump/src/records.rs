//! Physical and logical BIFF record iteration.
//!
//! A record is a 4-byte header (`id: u16`, `size: u16`, both little-endian)
//! followed by `size` payload bytes. Payloads longer than a record allows are
//! carried in continuation records (`Continue` and the FRT variants) directly
//! following the base record; a base record plus its continuations form one
//! *logical* record. Continuation payloads are kept as separate fragments
//! rather than concatenated: continued strings restate their encoding flags
//! byte at every fragment boundary, so the boundaries are semantically
//! meaningful.

use crate::error::{BiffError, Result};

/// Record header length: id (2 bytes) + size (2 bytes).
pub const RECORD_HEADER_LEN: usize = 4;

// Record type ids ([MS-XLS] 2.3). Only ids the decoder touches by value get
// constants; everything else goes through `record_name`.
pub const RECORD_FORMULA: u16 = 0x0006;
pub const RECORD_EOF: u16 = 0x000A;
pub const RECORD_NOTE: u16 = 0x001C;
pub const RECORD_FILEPASS: u16 = 0x002F;
pub const RECORD_CONTINUE: u16 = 0x003C;
pub const RECORD_CODEPAGE: u16 = 0x0042;
pub const RECORD_OBJ: u16 = 0x005D;
pub const RECORD_BOUNDSHEET8: u16 = 0x0085;
pub const RECORD_MULRK: u16 = 0x00BD;
pub const RECORD_MULBLANK: u16 = 0x00BE;
pub const RECORD_SST: u16 = 0x00FC;
pub const RECORD_LABELSST: u16 = 0x00FD;
pub const RECORD_CONTINUEBIGNAME: u16 = 0x043C;
pub const RECORD_HLINKTOOLTIP: u16 = 0x0800;
pub const RECORD_BOF_BIFF8: u16 = 0x0809;
pub const RECORD_BOF_BIFF5: u16 = 0x0009;
pub const RECORD_CONTINUEFRT: u16 = 0x0812;
pub const RECORD_CONTINUEFRT11: u16 = 0x0875;
pub const RECORD_CONTINUEFRT12: u16 = 0x087F;

/// Whether `id` is a continuation record type ([MS-XLS] 2.1.4).
pub fn is_continuation(id: u16) -> bool {
    matches!(
        id,
        RECORD_CONTINUE
            | RECORD_CONTINUEFRT
            | RECORD_CONTINUEFRT11
            | RECORD_CONTINUEFRT12
            | RECORD_CONTINUEBIGNAME
    )
}

/// Symbolic name for a record id, for every record this crate knows about —
/// decoded or not. Unknown ids return `None` and are skipped with a warning.
pub fn record_name(id: u16) -> Option<&'static str> {
    let name = match id {
        0x0006 => "Formula",
        0x000A => "EOF",
        0x000C => "CalcCount",
        0x000D => "CalcMode",
        0x000E => "CalcPrecision",
        0x000F => "CalcRefMode",
        0x0010 => "CalcDelta",
        0x0011 => "CalcIter",
        0x0012 => "Protect",
        0x0013 => "Password",
        0x0014 => "Header",
        0x0015 => "Footer",
        0x0017 => "ExternSheet",
        0x0018 => "Lbl",
        0x0019 => "WinProtect",
        0x001A => "VerticalPageBreaks",
        0x001B => "HorizontalPageBreaks",
        0x001C => "Note",
        0x001D => "Selection",
        0x0022 => "Date1904",
        0x0023 => "ExternName",
        0x0026 => "LeftMargin",
        0x0027 => "RightMargin",
        0x0028 => "TopMargin",
        0x0029 => "BottomMargin",
        0x002A => "PrintRowCol",
        0x002B => "PrintGrid",
        0x002F => "FilePass",
        0x0031 => "Font",
        0x003C => "Continue",
        0x003D => "Window1",
        0x0040 => "Backup",
        0x0041 => "Pane",
        0x0042 => "CodePage",
        0x004D => "Pls",
        0x0055 => "DefColWidth",
        0x0059 => "XCT",
        0x005A => "CRN",
        0x005B => "FileSharing",
        0x005C => "WriteAccess",
        0x005D => "Obj",
        0x005E => "Uncalced",
        0x005F => "SaveRecalc",
        0x0063 => "ObjProtect",
        0x007D => "ColInfo",
        0x0080 => "Guts",
        0x0081 => "WsBool",
        0x0082 => "GridSet",
        0x0083 => "HCenter",
        0x0084 => "VCenter",
        0x0085 => "BoundSheet8",
        0x0086 => "WriteProtect",
        0x008C => "Country",
        0x008D => "HideObj",
        0x0090 => "Sort",
        0x0092 => "Palette",
        0x009B => "FilterMode",
        0x009C => "BuiltInFnGroupCount",
        0x009D => "AutoFilterInfo",
        0x009E => "AutoFilter",
        0x00A0 => "Scl",
        0x00A1 => "Setup",
        0x00B0 => "SxView",
        0x00BD => "MulRk",
        0x00BE => "MulBlank",
        0x00C1 => "Mms",
        0x00D7 => "DBCell",
        0x00DA => "BookBool",
        0x00DD => "ScenarioProtect",
        0x00E0 => "XF",
        0x00E1 => "InterfaceHdr",
        0x00E2 => "InterfaceEnd",
        0x00E5 => "MergeCells",
        0x00EB => "MsoDrawingGroup",
        0x00EC => "MsoDrawing",
        0x00ED => "MsoDrawingSelection",
        0x00EF => "PhoneticInfo",
        0x00FC => "SST",
        0x00FD => "LabelSst",
        0x00FF => "ExtSST",
        0x013D => "RRTabId",
        0x0138 => "RRDHead",
        0x0160 => "UsesELFs",
        0x0161 => "DSF",
        0x0194 => "UsrExcl",
        0x0195 => "FileLock",
        0x0196 => "RRDInfo",
        0x01AE => "SupBook",
        0x01AF => "Prot4Rev",
        0x01B0 => "CondFmt",
        0x01B1 => "CF",
        0x01B2 => "DVal",
        0x01B6 => "TxO",
        0x01B7 => "RefreshAll",
        0x01B8 => "HLink",
        0x01BA => "CodeName",
        0x01BC => "Prot4RevPass",
        0x01BE => "DV",
        0x01C0 => "Excel9File",
        0x01C1 => "RecalcId",
        0x0200 => "Dimensions",
        0x0201 => "Blank",
        0x0203 => "Number",
        0x0204 => "Label",
        0x0205 => "BoolErr",
        0x0207 => "String",
        0x0208 => "Row",
        0x020B => "Index",
        0x0221 => "Array",
        0x0225 => "DefaultRowHeight",
        0x0236 => "Table",
        0x023E => "Window2",
        0x027E => "RK",
        0x0293 => "Style",
        0x041E => "Format",
        0x043C => "ContinueBigName",
        0x04BC => "ShrFmla",
        0x0800 => "HLinkTooltip",
        0x0809 => "BOF",
        0x0810 => "SXViewEx9",
        0x0812 => "ContinueFrt",
        0x0862 => "SheetExt",
        0x0863 => "BookExt",
        0x0864 => "SXAddl",
        0x0867 => "FeatHdr",
        0x0868 => "Feat",
        0x086C => "CellWatch",
        0x0871 => "FeatHdr11",
        0x0872 => "Feature11",
        0x0874 => "DropDownObjIds",
        0x0875 => "ContinueFrt11",
        0x0876 => "DConn",
        0x0877 => "List12",
        0x0878 => "Feature12",
        0x0879 => "CondFmt12",
        0x087A => "CF12",
        0x087B => "CFEx",
        0x087C => "XFCRC",
        0x087D => "XFExt",
        0x087E => "AutoFilter12",
        0x087F => "ContinueFrt12",
        0x088B => "PLV",
        0x088C => "Compat12",
        0x088D => "DXF",
        0x088E => "TableStyles",
        0x088F => "TableStyle",
        0x0890 => "TableStyleElement",
        0x0892 => "StyleExt",
        0x0894 => "NameCmt",
        0x0895 => "SortData",
        0x0896 => "Theme",
        0x0897 => "GUIDTypeLib",
        0x089A => "MTRSettings",
        0x089B => "CompressPictures",
        0x089C => "HeaderFooter",
        0x08A3 => "ForceFullCalculation",
        _ => return None,
    };
    Some(name)
}

// Defensive caps: a hostile stream can chain continuations indefinitely.
#[cfg(not(test))]
pub(crate) const MAX_LOGICAL_RECORD_BYTES: usize = 16 * 1024 * 1024;
#[cfg(test)]
pub(crate) const MAX_LOGICAL_RECORD_BYTES: usize = 1024;

#[cfg(not(test))]
pub(crate) const MAX_LOGICAL_RECORD_FRAGMENTS: usize = 4096;
#[cfg(test)]
pub(crate) const MAX_LOGICAL_RECORD_FRAGMENTS: usize = 64;

/// One physical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    pub id: u16,
    /// Stream offset of the record header.
    pub offset: usize,
    pub data: &'a [u8],
}

/// Iterator over physical records.
///
/// Stops at the end of the stream, and also at a zero record id once an EOF
/// record has been seen: RC4-encrypted streams are zero-padded to the cipher
/// block size.
pub struct RecordIter<'a> {
    stream: &'a [u8],
    offset: usize,
    seen_eof: bool,
    failed: bool,
}

impl<'a> RecordIter<'a> {
    pub fn new(stream: &'a [u8]) -> Self {
        RecordIter {
            stream,
            offset: 0,
            seen_eof: false,
            failed: false,
        }
    }

    /// Peek the id of the next record without consuming it.
    fn peek_id(&self) -> Option<u16> {
        if self.offset + RECORD_HEADER_LEN > self.stream.len() {
            return None;
        }
        Some(u16::from_le_bytes([
            self.stream[self.offset],
            self.stream[self.offset + 1],
        ]))
    }
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<RawRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.stream.len() {
            return None;
        }
        if self.offset + RECORD_HEADER_LEN > self.stream.len() {
            self.failed = true;
            return Some(Err(BiffError::Truncated("record header")));
        }

        let id = u16::from_le_bytes([self.stream[self.offset], self.stream[self.offset + 1]]);
        if id == 0 && self.seen_eof {
            // Zero padding after the last EOF.
            return None;
        }
        let size =
            u16::from_le_bytes([self.stream[self.offset + 2], self.stream[self.offset + 3]])
                as usize;
        let data_start = self.offset + RECORD_HEADER_LEN;
        let data_end = data_start + size;
        if data_end > self.stream.len() {
            self.failed = true;
            return Some(Err(BiffError::Truncated("record payload")));
        }

        if id == RECORD_EOF {
            self.seen_eof = true;
        }
        let record = RawRecord {
            id,
            offset: self.offset,
            data: &self.stream[data_start..data_end],
        };
        self.offset = data_end;
        Some(Ok(record))
    }
}

/// A base record merged with its continuation records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalRecord<'a> {
    pub id: u16,
    /// Stream offset of the base record's header.
    pub offset: usize,
    /// Payload size of the base record alone.
    pub size: usize,
    /// Base payload followed by the continuation payloads, in stream order.
    pub fragments: Vec<&'a [u8]>,
}

impl<'a> LogicalRecord<'a> {
    pub fn name(&self) -> Option<&'static str> {
        record_name(self.id)
    }

    pub fn total_len(&self) -> usize {
        self.fragments.iter().map(|f| f.len()).sum()
    }
}

/// Iterator over logical records.
pub struct LogicalRecordIter<'a> {
    inner: RecordIter<'a>,
}

impl<'a> LogicalRecordIter<'a> {
    pub fn new(stream: &'a [u8]) -> Self {
        LogicalRecordIter {
            inner: RecordIter::new(stream),
        }
    }
}

impl<'a> Iterator for LogicalRecordIter<'a> {
    type Item = Result<LogicalRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let base = match self.inner.next()? {
            Ok(r) => r,
            Err(e) => return Some(Err(e)),
        };

        let mut record = LogicalRecord {
            id: base.id,
            offset: base.offset,
            size: base.data.len(),
            fragments: vec![base.data],
        };
        let mut total = base.data.len();

        while self.inner.peek_id().map(is_continuation) == Some(true) {
            let next = match self.inner.next()? {
                Ok(r) => r,
                Err(e) => return Some(Err(e)),
            };
            total += next.data.len();
            if total > MAX_LOGICAL_RECORD_BYTES {
                return Some(Err(BiffError::Malformed(format!(
                    "logical record {:#06x} at offset {} exceeds {} bytes",
                    record.id, record.offset, MAX_LOGICAL_RECORD_BYTES
                ))));
            }
            record.fragments.push(next.data);
            if record.fragments.len() > MAX_LOGICAL_RECORD_FRAGMENTS {
                return Some(Err(BiffError::Malformed(format!(
                    "logical record {:#06x} at offset {} exceeds {} continuation fragments",
                    record.id, record.offset, MAX_LOGICAL_RECORD_FRAGMENTS
                ))));
            }
        }

        Some(Ok(record))
    }
}

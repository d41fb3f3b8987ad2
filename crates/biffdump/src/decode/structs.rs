//! Shared wire structures used by several record decoders.

use crate::bits::Bits;
use crate::cursor::Cursor;
use crate::error::Result;
use crate::value::{Fields, Value};

/// BErr error codes ([MS-XLS] 2.5.97).
pub fn berr(code: u8) -> Option<&'static str> {
    let label = match code {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => return None,
    };
    Some(label)
}

/// Cell structure: row, column, cell XF index ([MS-XLS] 2.5.19).
pub fn cell(c: &mut Cursor<'_>) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("rw", c.u16("cell.rw")?);
    f.push("col", c.u16("cell.col")?);
    f.push("ixfe", c.u16("cell.ixfe")?);
    Ok(f)
}

/// Bes: a boolean or an error value ([MS-XLS] 2.5.10).
pub fn bes(c: &mut Cursor<'_>) -> Result<Fields> {
    let b_bool_err = c.u8("bes.bBoolErr")?;
    let f_error = c.u8("bes.fError")?;

    let mut f = Fields::new();
    f.push("bBoolErr", b_bool_err);
    let label = if f_error == 0 {
        match b_bool_err {
            0x00 => Some("False"),
            0x01 => Some("True"),
            _ => None,
        }
    } else {
        berr(b_bool_err)
    };
    if let Some(label) = label {
        f.push("bBoolErr_d", Value::Sym(label));
    }
    f.push("fError", f_error);
    Ok(f)
}

/// Rk packed number ([MS-XLS] 2.5.217): bit 0 divides the result by 100,
/// bit 1 selects integer form. Clearing the low two bits leaves either a
/// signed 32-bit integer or the high half of an IEEE double.
pub fn rk_number(raw: u32) -> Value {
    let bits = Bits::from(raw);
    let div100 = bits.set_at(0);
    let is_int = bits.set_at(1);
    let cleared = raw & !0b11;

    if is_int {
        let n = cleared as i32;
        if div100 {
            Value::Float(f64::from(n) / 100.0)
        } else {
            Value::Int(i64::from(n))
        }
    } else {
        let num = f64::from_bits(u64::from(cleared) << 32);
        Value::Float(if div100 { num / 100.0 } else { num })
    }
}

/// RkRec: cell XF index plus an Rk number ([MS-XLS] 2.5.218).
pub fn rk_rec(c: &mut Cursor<'_>) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("ixfe", c.u16("rkrec.ixfe")?);
    f.push("RK", rk_number(c.u32("rkrec.RK")?));
    Ok(f)
}

/// Ref8/Ref8U cell range ([MS-XLS] 2.5.208, 2.5.209). Row 0 with rwLast
/// 0xFFFF spans every row; columns work the same way.
pub fn ref8(c: &mut Cursor<'_>) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("rwFirst", c.u16("ref8.rwFirst")?);
    f.push("rwLast", c.u16("ref8.rwLast")?);
    f.push("colFirst", c.u16("ref8.colFirst")?);
    f.push("colLast", c.u16("ref8.colLast")?);
    Ok(f)
}

/// FrtHeader: record type echo, flags, 8 reserved bytes ([MS-XLS] 2.5.135).
pub fn frt_header(c: &mut Cursor<'_>) -> Result<Fields> {
    let rt = c.u16("frtHeader.rt")?;
    let grbit = Bits::from(c.u16("frtHeader.grbitFrt")?);
    c.skip(8, "frtHeader.reserved")?;

    let mut flags = Fields::new();
    flags.push("fFrtRef", grbit.set_at(0));
    flags.push("fFrtAlert", grbit.set_at(1));

    let mut f = Fields::new();
    f.push("rt", rt);
    f.push("grBitFrt", flags);
    Ok(f)
}

/// FrtRefHeaderNoGrbit: record type echo plus a cell range ([MS-XLS] 2.5.138).
pub fn frt_ref_header_no_grbit(c: &mut Cursor<'_>) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("rt", c.u16("frtRefHeaderNoGrbit.rt")?);
    f.push("ref8", ref8(c)?);
    Ok(f)
}

/// FormulaValue ([MS-XLS] 2.5.133): an Xnum unless the two trailing bytes
/// are 0xFFFF, in which case the first byte selects a string/boolean/error/
/// blank variant.
pub fn formula_value(c: &mut Cursor<'_>) -> Result<Fields> {
    let raw = c.bytes(8, "FormulaValue")?;
    let mut f = Fields::new();

    if raw[6..8] != [0xFF, 0xFF] {
        let mut le = [0u8; 8];
        le.copy_from_slice(&raw);
        f.push("_value", f64::from_le_bytes(le));
        f.push("_type", Value::Sym("float"));
        return Ok(f);
    }

    match raw[0] {
        0 => {
            // Value lives in the String record that follows the Formula.
            f.push("_type", Value::Sym("string"));
        }
        1 => {
            f.push("_value", raw[2] != 0);
            f.push("_type", Value::Sym("boolean"));
        }
        2 => {
            match berr(raw[2]) {
                Some(label) => f.push("_value", Value::Sym(label)),
                None => f.push("_value", raw[2]),
            }
            f.push("_type", Value::Sym("error"));
        }
        3 => {
            f.push("_value", String::new());
            f.push("_type", Value::Sym("blank_string"));
        }
        other => {
            f.push("_value", other);
            f.push("_type", Value::Unsupported);
        }
    }
    Ok(f)
}

/// NoteSh: comment placement and author ([MS-XLS] 2.5.186).
pub fn note_sh(c: &mut Cursor<'_>, codepage: u16) -> Result<Fields> {
    let rw = c.u16("NoteSh.row")?;
    let col = c.u16("NoteSh.col")?;
    let attrs = Bits::from(c.u16("NoteSh.flags")?);
    let id_obj = c.u16("NoteSh.idObj")?;

    let mut f = Fields::new();
    f.push("rw", rw);
    f.push("col", col);
    f.push("fShow", attrs.set_at(1));
    f.push("fRwHidden", attrs.set_at(7));
    f.push("fColHidden", attrs.set_at(8));
    f.push("idObj", id_obj);
    f.push("stAuthor", c.unicode_string(codepage, "NoteSh.stAuthor")?);
    // unused2 trailing byte
    Ok(f)
}

/// BuiltInStyle ([MS-XLS] 2.5.16). Outline styles get the level appended to
/// the name, so the label is an owned string.
pub fn built_in_style(c: &mut Cursor<'_>) -> Result<Fields> {
    let isty = c.u8("BuiltInStyle.istyBuiltIn")?;
    let i_level = c.u8("BuiltInStyle.iLevel")?;

    let base = builtin_style_name(isty);
    let mut f = Fields::new();
    f.push("istyBuiltIn", isty);
    f.push("iLevel", i_level);
    match (isty, base) {
        (1..=2, Some(base)) => {
            f.push("istyBuiltIn_d", format!("{}{}", base, i_level + 1));
        }
        (_, Some(base)) => f.push("istyBuiltIn_d", Value::Sym(base)),
        (_, None) => {}
    }
    Ok(f)
}

fn builtin_style_name(isty: u8) -> Option<&'static str> {
    let name = match isty {
        0x00 => "Normal",
        0x01 => "RowLevel_",
        0x02 => "ColLevel_",
        0x03 => "Comma",
        0x04 => "Currency",
        0x05 => "Percent",
        0x06 => "Comma [0]",
        0x07 => "Currency [0]",
        0x08 => "Hyperlink",
        0x09 => "Followed Hyperlink",
        0x0A => "Note",
        0x0B => "Warning Text",
        0x0D => "Title",
        0x0E => "Heading 1",
        0x0F => "Heading 2",
        0x10 => "Heading 3",
        0x11 => "Heading 4",
        0x12 => "Input",
        0x13 => "Output",
        0x14 => "Calculation",
        0x15 => "Check Cell",
        0x16 => "Linked Cell",
        0x17 => "Total",
        0x18 => "Good",
        0x19 => "Bad",
        0x1A => "Neutral",
        _ => return None,
    };
    Some(name)
}

pub fn border_style(id: u64) -> Option<&'static str> {
    let label = match id {
        0x0 => "NONE",
        0x1 => "THIN",
        0x2 => "MEDIUM",
        0x3 => "DASHED",
        0x4 => "DOTTED",
        0x5 => "THICK",
        0x6 => "DOUBLE",
        0x7 => "HAIR",
        0x8 => "MEDIUMDASHED",
        0x9 => "DASHDOT",
        0xA => "MEDIUMDASHDOT",
        0xB => "DASHDOTDOT",
        0xC => "MEDIUMDASHDOTDOT",
        0xD => "SLANTEDDASHDOTDOT",
        _ => return None,
    };
    Some(label)
}

pub fn fill_pattern(id: u64) -> Option<&'static str> {
    let label = match id {
        0x00 => "FLSNULL",
        0x01 => "FLSSOLID",
        0x02 => "FLSMEDGRAY",
        0x03 => "FLSDKGRAY",
        0x04 => "FLSLTGRAY",
        0x05 => "FLSDKHOR",
        0x06 => "FLSDKVER",
        0x07 => "FLSDKDOWN",
        0x08 => "FLSDKUP",
        0x09 => "FLSDKGRID",
        0x0A => "FLSDKTRELLIS",
        0x0B => "FLSLTHOR",
        0x0C => "FLSLTVER",
        0x0D => "FLSLTDOWN",
        0x0E => "FLSLTUP",
        0x0F => "FLSLTGRID",
        0x10 => "FLSLTTRELLIS",
        0x11 => "FLSGRAY125",
        0x12 => "FLSGRAY0625",
        _ => return None,
    };
    Some(label)
}

pub fn horiz_align(id: u64) -> Option<&'static str> {
    let label = match id {
        0x0 => "ALCGEN",
        0x1 => "ALCLEFT",
        0x2 => "ALCCTR",
        0x3 => "ALCRIGHT",
        0x4 => "ALCFILL",
        0x5 => "ALCJUST",
        0x6 => "ALCCONTCTR",
        0x7 => "ALCDIST",
        0xFF => "ALCNIL",
        _ => return None,
    };
    Some(label)
}

pub fn vert_align(id: u64) -> Option<&'static str> {
    let label = match id {
        0x0 => "ALCVTOP",
        0x1 => "ALCVCTR",
        0x2 => "ALCVBOT",
        0x3 => "ALCVJUST",
        0x4 => "ALCVDIST",
        _ => return None,
    };
    Some(label)
}

pub fn reading_order(id: u64) -> Option<&'static str> {
    let label = match id {
        0x0 => "READING_ORDER_CONTEXT",
        0x1 => "READING_ORDER_LTR",
        0x2 => "READING_ORDER_RTL",
        _ => return None,
    };
    Some(label)
}

/// XFALC alignment dword shared by CellXF and StyleXF ([MS-XLS] 2.5.20).
/// `is_cell` keeps the attribute-inheritance bits that only cell XFs carry.
pub fn xf_alignment(c: &mut Cursor<'_>, f: &mut Fields, is_cell: bool) -> Result<()> {
    let attrs = Bits::from(c.u32("XF.alignment")?);

    let alc = attrs.value_at(0, 2);
    f.push_coded("alc", alc, "alc_d", horiz_align(alc));
    f.push("fWrap", attrs.set_at(3));
    let alcv = attrs.value_at(4, 6);
    f.push_coded("alcV", alcv, "alcV_d", vert_align(alcv));
    f.push("fJustLast", attrs.set_at(7));
    f.push("trot", attrs.value_at(8, 15));
    f.push("cIndent", attrs.value_at(16, 19));
    f.push("fShrinkToFit", attrs.set_at(20));
    // Bit 21 is fMergeCell in DXFALC only; reserved here.
    let order = attrs.value_at(22, 23);
    f.push_coded("iReadingOrder", order, "iReadingOrder_d", reading_order(order));

    if is_cell {
        f.push("fAtrNum", attrs.set_at(26));
        f.push("fAtrFnt", attrs.set_at(27));
        f.push("fAtrAlc", attrs.set_at(28));
        f.push("fAtrBdr", attrs.set_at(29));
        f.push("fAtrPat", attrs.set_at(30));
        f.push("fAtrProt", attrs.set_at(31));
    }
    Ok(())
}

/// XFBDR border/fill dwords shared by CellXF and StyleXF ([MS-XLS] 2.5.20).
pub fn xf_border(c: &mut Cursor<'_>, f: &mut Fields) -> Result<()> {
    let attrs = Bits::from(c.u32("XF.border1")?);
    for (lo, name, label) in [
        (0, "dgLeft", "dgLeft_d"),
        (4, "dgRight", "dgRight_d"),
        (8, "dgTop", "dgTop_d"),
        (12, "dgBottom", "dgBottom_d"),
    ] {
        let dg = attrs.value_at(lo, lo + 3);
        f.push_coded(name, dg, label, border_style(dg));
    }
    f.push("icvLeft", attrs.value_at(16, 22));
    f.push("icvRight", attrs.value_at(23, 29));
    let grbit_diag = attrs.value_at(30, 31);
    let diag_label = match grbit_diag {
        0 => Some("No diagonal border"),
        1 => Some("Diagonal-down border"),
        2 => Some("Diagonal-up border"),
        3 => Some("Both diagonal-down and diagonal-up"),
        _ => None,
    };
    f.push_coded("grbitDiag", grbit_diag, "grbitDiag_d", diag_label);

    let attrs = Bits::from(c.u32("XF.border2")?);
    f.push("icvTop", attrs.value_at(0, 6));
    f.push("icvBottom", attrs.value_at(7, 13));
    f.push("icvDiag", attrs.value_at(14, 20));
    let dg_diag = attrs.value_at(21, 24);
    f.push_coded("dgDiag", dg_diag, "dgDiag_d", border_style(dg_diag));
    f.push("fHasXFExt", attrs.set_at(25));
    let fls = attrs.value_at(26, 31);
    f.push_coded("fls", fls, "fls_d", fill_pattern(fls));
    Ok(())
}

/// Trailing fill-color word of CellXF; StyleXF omits fsxButton.
pub fn xf_fill(c: &mut Cursor<'_>, f: &mut Fields, is_cell: bool) -> Result<()> {
    let attrs = Bits::from(c.u16("XF.fill")?);
    f.push("icvFore", attrs.value_at(0, 6));
    f.push("icvBack", attrs.value_at(7, 13));
    if is_cell {
        f.push("fsxButton", attrs.set_at(14));
    }
    Ok(())
}

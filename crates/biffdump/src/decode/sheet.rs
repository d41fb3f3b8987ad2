//! Decoders for records of the worksheet substreams.

use crate::bits::Bits;
use crate::cursor::Cursor;
use crate::error::{BiffError, Result};
use crate::value::{Fields, Value};

use super::oshared;
use super::structs::{bes, cell, formula_value, frt_ref_header_no_grbit, note_sh, ref8, rk_rec};
use super::DecodeCtx;

pub(super) fn blank(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    cell(c)
}

pub(super) fn bool_err(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = cell(c)?;
    f.push("bes", bes(c)?);
    Ok(f)
}

pub(super) fn col_info(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("colFirst", c.u16("ColInfo.colFirst")?);
    f.push("colLast", c.u16("ColInfo.colLast")?);
    f.push("coldx", c.u16("ColInfo.coldx")?);
    f.push("ixfe", c.u16("ColInfo.ixfe")?);
    let attrs = Bits::from(c.u16("ColInfo.attrs")?);
    f.push("fHidden", attrs.set_at(0));
    f.push("fUserSet", attrs.set_at(1));
    f.push("fBestFit", attrs.set_at(2));
    f.push("fPhonetic", attrs.set_at(3));
    f.push("iOutLevel", attrs.value_at(8, 10));
    f.push("fCollapsed", attrs.set_at(12));
    // unused2 trailing word
    Ok(f)
}

pub(super) fn dimensions(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("rwMic", c.u32("Dimensions.rwMic")?);
    f.push("rwMac", c.u32("Dimensions.rwMac")?);
    f.push("colMic", c.u16("Dimensions.colMic")?);
    f.push("colMac", c.u16("Dimensions.colMac")?);
    Ok(f)
}

pub(super) fn formula(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = cell(c)?;
    for (name, value) in formula_value(c)?.iter() {
        f.push(name, value.clone());
    }

    let attrs = Bits::from(c.u16("Formula.attrs")?);
    c.skip(4, "Formula.chn")?;
    f.push("fAlwaysCalc", attrs.set_at(0));
    f.push("fFill", attrs.set_at(2));
    f.push("fShrFmla", attrs.set_at(3));
    f.push("fClearErrors", attrs.set_at(5));
    // The parsed-expression byte code is preserved but not interpreted.
    f.push("chn", Value::Unsupported);
    f.push("formula", Value::Unsupported);
    c.rest();
    Ok(f)
}

pub(super) fn hlink(c: &mut Cursor<'_>, ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = ref8(c)?;
    f.push("hlinkClsid", oshared::guid(&c.bytes(16, "HLink.hlinkClsid")?));
    f.push("hyperlink", oshared::hyperlink(c, ctx.codepage)?);
    Ok(f)
}

pub(super) fn hlink_tooltip(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("frtRefHeaderNoGrbit", frt_ref_header_no_grbit(c)?);
    f.push("wzTooltip", c.utf16z("HLinkTooltip.wzTooltip")?);
    Ok(f)
}

pub(super) fn label_sst(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = cell(c)?;
    f.push("isst", c.u32("LabelSst.isst")?);
    Ok(f)
}

pub(super) fn merge_cells(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let cmcs = c.u16("MergeCells.cmcs")?;
    let mut ranges = Vec::with_capacity(cmcs as usize);
    for _ in 0..cmcs {
        ranges.push(Value::Map(ref8(c)?));
    }

    let mut f = Fields::new();
    f.push("cmcs", cmcs);
    f.push("rgref", ranges);
    Ok(f)
}

/// The trailing colLast word comes after a variable-length array, so the
/// array length is derived from the remaining payload size.
fn trailing_array_len(c: &Cursor<'_>, elem: usize, what: &'static str) -> Result<usize> {
    let remaining = c.remaining();
    if remaining < 2 || (remaining - 2) % elem != 0 {
        return Err(BiffError::Malformed(format!(
            "{what}: bad payload remainder {remaining}"
        )));
    }
    Ok((remaining - 2) / elem)
}

pub(super) fn mul_blank(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let rw = c.u16("MulBlank.rw")?;
    let col_first = c.u16("MulBlank.colFirst")?;
    let count = trailing_array_len(c, 2, "MulBlank.rgixfe")?;
    let mut rgixfe = Vec::with_capacity(count);
    for _ in 0..count {
        rgixfe.push(Value::from(c.u16("MulBlank.rgixfe")?));
    }

    let mut f = Fields::new();
    f.push("rw", rw);
    f.push("colFirst", col_first);
    f.push("colLast", c.u16("MulBlank.colLast")?);
    f.push("rgixfe", rgixfe);
    Ok(f)
}

pub(super) fn mul_rk(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let rw = c.u16("MulRk.rw")?;
    let col_first = c.u16("MulRk.colFirst")?;
    let count = trailing_array_len(c, 6, "MulRk.rgrkrec")?;
    let mut rgrkrec = Vec::with_capacity(count);
    for _ in 0..count {
        rgrkrec.push(Value::Map(rk_rec(c)?));
    }

    let mut f = Fields::new();
    f.push("rw", rw);
    f.push("colFirst", col_first);
    f.push("colLast", c.u16("MulRk.colLast")?);
    f.push("rgrkrec", rgrkrec);
    Ok(f)
}

pub(super) fn note(c: &mut Cursor<'_>, ctx: &DecodeCtx) -> Result<Fields> {
    note_sh(c, ctx.codepage)
}

pub(super) fn number(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = cell(c)?;
    f.push("num", c.f64("Number.num")?);
    Ok(f)
}

fn object_type_label(ot: u16) -> Option<&'static str> {
    let label = match ot {
        0x00 => "Group",
        0x01 => "Line",
        0x02 => "Rectangle",
        0x03 => "Oval",
        0x04 => "Arc",
        0x05 => "Chart",
        0x06 => "Text",
        0x07 => "Button",
        0x08 => "Picture",
        0x09 => "Polygon",
        0x0B => "Checkbox",
        0x0C => "Radio button",
        0x0D => "Edit box",
        0x0E => "Label",
        0x0F => "Dialog box",
        0x10 => "Spin control",
        0x11 => "Scrollbar",
        0x12 => "List",
        0x13 => "Group box",
        0x14 => "Dropdown list",
        0x19 => "Note",
        0x1E => "OfficeArt object",
        _ => return None,
    };
    Some(label)
}

pub(super) fn obj(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let ft = c.u16("Obj.cmo.ft")?;
    let cb = c.u16("Obj.cmo.cb")?;
    let ot = c.u16("Obj.cmo.ot")?;
    let id = c.u16("Obj.cmo.id")?;
    let attrs = Bits::from(c.u16("Obj.cmo.attrs")?);
    c.skip(12, "Obj.cmo.unused")?;

    let mut cmo = Fields::new();
    cmo.push("ft", ft);
    cmo.push("cb", cb);
    cmo.push_coded("ot", ot, "ot_d", object_type_label(ot));
    cmo.push("id", id);
    cmo.push("fLocked", attrs.set_at(0));
    cmo.push("fDefaultSize", attrs.set_at(2));
    cmo.push("fPublished", attrs.set_at(3));
    cmo.push("fPrint", attrs.set_at(4));
    cmo.push("fDisabled", attrs.set_at(7));
    cmo.push("fUIObj", attrs.set_at(8));
    cmo.push("fRecalcObj", attrs.set_at(9));
    cmo.push("fRecalcObjAlways", attrs.set_at(12));

    let mut f = Fields::new();
    f.push("cmo", cmo);
    // The object-type specific FtXxx blocks that follow are not decoded.
    f.push("_other_fields", Value::Unsupported);
    c.rest();
    Ok(f)
}

pub(super) fn rk(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("rw", c.u16("RK.rw")?);
    f.push("col", c.u16("RK.col")?);
    for (name, value) in rk_rec(c)?.iter() {
        f.push(name, value.clone());
    }
    Ok(f)
}

pub(super) fn row(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("rw", c.u16("Row.rw")?);
    f.push("colMic", c.u16("Row.colMic")?);
    f.push("colMac", c.u16("Row.colMac")?);
    f.push("miyRw", c.u16("Row.miyRw")?);
    c.skip(4, "Row.reserved")?;
    let attrs = Bits::from(c.u32("Row.attrs")?);
    f.push("iOutLevel", attrs.value_at(0, 2));
    f.push("fCollapsed", attrs.set_at(4));
    f.push("fDyZero", attrs.set_at(5));
    f.push("fUnsynced", attrs.set_at(6));
    f.push("fGhostDirty", attrs.set_at(7));
    f.push("ixfe", attrs.value_at(16, 27));
    f.push("fExAsc", attrs.set_at(28));
    f.push("fExDes", attrs.set_at(29));
    f.push("fPhonetic", attrs.set_at(30));
    Ok(f)
}

pub(super) fn string(c: &mut Cursor<'_>, ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("string", c.unicode_string(ctx.codepage, "String.string")?);
    Ok(f)
}

pub(super) fn ws_bool(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let attrs = Bits::from(c.u16("WsBool.attrs")?);
    let mut f = Fields::new();
    f.push("fShowAutoBreaks", attrs.set_at(0));
    f.push("fDialog", attrs.set_at(4));
    f.push("fApplyStyles", attrs.set_at(5));
    f.push("fRowSumsBelow", attrs.set_at(6));
    f.push("fColSumsRight", attrs.set_at(7));
    f.push("fFitToPage", attrs.set_at(8));
    f.push("fSyncHoriz", attrs.set_at(12));
    f.push("fSyncVert", attrs.set_at(13));
    f.push("fAltExprEval", attrs.set_at(14));
    f.push("fFormulaEntry", attrs.set_at(15));
    Ok(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx() -> DecodeCtx {
        DecodeCtx::default()
    }

    fn cell_bytes(rw: u16, col: u16, ixfe: u16) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(rw.to_le_bytes());
        out.extend(col.to_le_bytes());
        out.extend(ixfe.to_le_bytes());
        out
    }

    #[test]
    fn number_reads_cell_and_xnum() {
        let mut data = cell_bytes(7, 1, 15);
        data.extend(1.2345f64.to_le_bytes());
        let f = number(&mut Cursor::new(&[&data[..]]), &ctx()).unwrap();
        assert_eq!(f.get("rw"), Some(&Value::Uint(7)));
        assert_eq!(f.get("col"), Some(&Value::Uint(1)));
        assert_eq!(f.get("num"), Some(&Value::Float(1.2345)));
    }

    #[test]
    fn rk_merges_rkrec_fields() {
        let mut data = Vec::new();
        data.extend(10u16.to_le_bytes());
        data.extend(3u16.to_le_bytes());
        data.extend(15u16.to_le_bytes());
        let raw = ((-1.0f64).to_bits() >> 32) as u32;
        data.extend(raw.to_le_bytes());
        let f = rk(&mut Cursor::new(&[&data[..]]), &ctx()).unwrap();
        assert_eq!(f.get("ixfe"), Some(&Value::Uint(15)));
        assert_eq!(f.get("RK"), Some(&Value::Float(-1.0)));
    }

    #[test]
    fn mulrk_fans_out_trailing_array() {
        let mut data = Vec::new();
        data.extend(16u16.to_le_bytes());
        data.extend(1u16.to_le_bytes()); // colFirst
        for i in 0..3u32 {
            data.extend(15u16.to_le_bytes());
            data.extend(((i << 4) | 0b10).to_le_bytes()); // small ints
        }
        data.extend(3u16.to_le_bytes()); // colLast

        let f = mul_rk(&mut Cursor::new(&[&data[..]]), &ctx()).unwrap();
        assert_eq!(f.get("colLast"), Some(&Value::Uint(3)));
        let recs = f.get("rgrkrec").unwrap().as_list().unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[1].as_map().unwrap().get("RK"), Some(&Value::Int(16)));
    }

    #[test]
    fn mulblank_rejects_ragged_payload() {
        let mut data = Vec::new();
        data.extend(1u16.to_le_bytes());
        data.extend(1u16.to_le_bytes());
        data.extend([0u8; 3]); // not a whole number of ixfe words
        let err = mul_blank(&mut Cursor::new(&[&data[..]]), &ctx()).unwrap_err();
        assert!(matches!(err, BiffError::Malformed(_)));
    }

    #[test]
    fn formula_cached_value_and_flags() {
        let mut data = cell_bytes(2, 4, 15);
        data.extend([1, 0, 1, 0, 0, 0, 0xFF, 0xFF]); // boolean true
        data.extend(0x0009u16.to_le_bytes()); // fAlwaysCalc | fShrFmla
        data.extend([0u8; 4]); // chn
        data.extend([0xAA, 0xBB]); // unparsed rgce

        let f = formula(&mut Cursor::new(&[&data[..]]), &ctx()).unwrap();
        assert_eq!(f.get("_value"), Some(&Value::Bool(true)));
        assert_eq!(f.get("fAlwaysCalc"), Some(&Value::Bool(true)));
        assert_eq!(f.get("fShrFmla"), Some(&Value::Bool(true)));
        assert_eq!(f.get("fFill"), Some(&Value::Bool(false)));
        assert_eq!(f.get("formula"), Some(&Value::Unsupported));
    }

    #[test]
    fn merge_cells_reads_ranges() {
        let mut data = Vec::new();
        data.extend(1u16.to_le_bytes());
        for v in [0u16, 2, 1, 3] {
            data.extend(v.to_le_bytes());
        }
        let f = merge_cells(&mut Cursor::new(&[&data[..]]), &ctx()).unwrap();
        let ranges = f.get("rgref").unwrap().as_list().unwrap();
        let r = ranges[0].as_map().unwrap();
        assert_eq!(r.get("rwLast"), Some(&Value::Uint(2)));
        assert_eq!(r.get("colLast"), Some(&Value::Uint(3)));
    }

    #[test]
    fn tooltip_carries_range_and_text() {
        let mut data = Vec::new();
        data.extend(0x0800u16.to_le_bytes()); // rt
        for v in [1u16, 1, 2, 2] {
            data.extend(v.to_le_bytes());
        }
        for unit in "hint\0".encode_utf16() {
            data.extend(unit.to_le_bytes());
        }
        let f = hlink_tooltip(&mut Cursor::new(&[&data[..]]), &ctx()).unwrap();
        assert_eq!(f.get("wzTooltip"), Some(&Value::Str("hint".into())));
        let hdr = f.get("frtRefHeaderNoGrbit").unwrap().as_map().unwrap();
        assert_eq!(hdr.get("ref8").unwrap().as_map().unwrap().get("rwFirst"), Some(&Value::Uint(1)));
    }

    #[test]
    fn note_flags() {
        let mut data = Vec::new();
        data.extend(5u16.to_le_bytes());
        data.extend(2u16.to_le_bytes());
        data.extend(0x0002u16.to_le_bytes()); // fShow
        data.extend(1u16.to_le_bytes()); // idObj
        data.extend([0x03, 0x00, 0x00]); // author cch=3, compressed
        data.extend(b"Bob");
        data.push(0x00); // unused

        let f = note(&mut Cursor::new(&[&data[..]]), &ctx()).unwrap();
        assert_eq!(f.get("fShow"), Some(&Value::Bool(true)));
        assert_eq!(f.get("stAuthor"), Some(&Value::Str("Bob".into())));
        assert_eq!(f.get("idObj"), Some(&Value::Uint(1)));
    }

    #[test]
    fn row_packs_format_bits() {
        let mut data = Vec::new();
        data.extend(3u16.to_le_bytes());
        data.extend(0u16.to_le_bytes());
        data.extend(5u16.to_le_bytes());
        data.extend(255u16.to_le_bytes());
        data.extend([0u8; 4]);
        let attrs: u32 = 0b0010_0000 | (15 << 16) | (1 << 30); // fDyZero, ixfe=15, fPhonetic
        data.extend(attrs.to_le_bytes());

        let f = row(&mut Cursor::new(&[&data[..]]), &ctx()).unwrap();
        assert_eq!(f.get("fDyZero"), Some(&Value::Bool(true)));
        assert_eq!(f.get("ixfe"), Some(&Value::Uint(15)));
        assert_eq!(f.get("fPhonetic"), Some(&Value::Bool(true)));
    }

    #[test]
    fn obj_common_object_data() {
        let mut data = Vec::new();
        data.extend(0x15u16.to_le_bytes());
        data.extend(0x12u16.to_le_bytes());
        data.extend(0x19u16.to_le_bytes()); // Note
        data.extend(7u16.to_le_bytes());
        data.extend(0x0011u16.to_le_bytes()); // fLocked | fPrint
        data.extend([0u8; 12]);
        data.extend([0xFF; 6]); // following FtXxx blocks

        let f = obj(&mut Cursor::new(&[&data[..]]), &ctx()).unwrap();
        let cmo = f.get("cmo").unwrap().as_map().unwrap();
        assert_eq!(cmo.get("ot_d"), Some(&Value::Sym("Note")));
        assert_eq!(cmo.get("fLocked"), Some(&Value::Bool(true)));
        assert_eq!(cmo.get("fPrint"), Some(&Value::Bool(true)));
        assert_eq!(f.get("_other_fields"), Some(&Value::Unsupported));
    }

    #[test]
    fn wsbool_dialog_flag() {
        let data = 0x0010u16.to_le_bytes();
        let f = ws_bool(&mut Cursor::new(&[&data[..]]), &ctx()).unwrap();
        assert_eq!(f.get("fDialog"), Some(&Value::Bool(true)));
        assert_eq!(f.get("fShowAutoBreaks"), Some(&Value::Bool(false)));
    }
}

//! Decoders for records of the workbook globals substream.

use crate::bits::Bits;
use crate::cursor::Cursor;
use crate::error::Result;
use crate::value::{Fields, Value};

use super::structs::{built_in_style, frt_header, xf_alignment, xf_border, xf_fill};
use super::DecodeCtx;

fn biff_version(vers: u16) -> Option<&'static str> {
    let label = match vers {
        0x0000 | 0x0500 => "BIFF5",
        0x0200 => "BIFF2",
        0x0300 => "BIFF3",
        0x0400 => "BIFF4",
        0x0600 => "BIFF8",
        _ => return None,
    };
    Some(label)
}

fn substream_type(dt: u16) -> Option<&'static str> {
    let label = match dt {
        0x0005 => "globals",
        0x0006 => "vb_module",
        0x0010 => "dialog_or_work_sheet",
        0x0020 => "chart",
        0x0040 => "macro",
        0x0100 => "workspace",
        _ => return None,
    };
    Some(label)
}

fn excel_version(id: u64) -> Option<&'static str> {
    let label = match id {
        0x0 => "Excel 97",
        0x1 => "Excel 2000",
        0x2 => "Excel 2002",
        0x3 => "Excel 2003",
        0x4 => "Excel 2007",
        0x6 => "Excel 2010",
        0x7 => "Excel 2013",
        _ => return None,
    };
    Some(label)
}

pub(super) fn bof(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let vers = c.u16("BOF.vers")?;
    let dt = c.u16("BOF.dt")?;

    let mut f = Fields::new();
    f.push("vers", vers);
    f.push("dt", dt);
    f.push("rupBuild", c.u16("BOF.rupBuild")?);
    f.push("rupYear", c.u16("BOF.rupYear")?);
    if let Some(label) = biff_version(vers) {
        f.push("vers_d", Value::Sym(label));
    }
    if let Some(label) = substream_type(dt) {
        f.push("dt_d", Value::Sym(label));
    }

    let attrs = Bits::from(c.u32("BOF.flags")?);
    f.push("fWin", attrs.set_at(0));
    f.push("fRisc", attrs.set_at(1));
    f.push("fBeta", attrs.set_at(2));
    f.push("fWinAny", attrs.set_at(3));
    f.push("fMacAny", attrs.set_at(4));
    f.push("fBetaAny", attrs.set_at(5));
    f.push("fRiscAny", attrs.set_at(8));
    f.push("fOOM", attrs.set_at(9));
    f.push("fGlJmp", attrs.set_at(10));
    f.push("fFontLimit", attrs.set_at(13));
    let ver_high = attrs.value_at(14, 17);
    f.push_coded("verXLHigh", ver_high, "verXLHigh_d", excel_version(ver_high));

    let attrs = Bits::from(c.u32("BOF.history")?);
    f.push("verLowestBiff", attrs.value_at(0, 7));
    let ver_saved = attrs.value_at(8, 11);
    f.push_coded(
        "verLastXLSaved",
        ver_saved,
        "verLastXLSaved_d",
        excel_version(ver_saved),
    );
    Ok(f)
}

pub(super) fn boundsheet8(c: &mut Cursor<'_>, ctx: &DecodeCtx) -> Result<Fields> {
    let lb_ply_pos = c.u32("BoundSheet8.lbPlyPos")?;
    let hs_state = Bits::from(c.u8("BoundSheet8.hsState")?).value_at(0, 1);
    let dt = c.u8("BoundSheet8.dt")?;

    let mut f = Fields::new();
    f.push("lbPlyPos", lb_ply_pos);
    let visibility = match hs_state {
        0 => Some("visible"),
        1 => Some("hidden"),
        2 => Some("very_hidden"),
        _ => None,
    };
    f.push_coded("hsState", hs_state, "hsState_d", visibility);
    let sheet_type = match dt {
        0 => Some("dialog_or_work_sheet"),
        1 => Some("macro"),
        2 => Some("chart"),
        6 => Some("vb_module"),
        _ => None,
    };
    f.push_coded("dt", dt, "dt_d", sheet_type);
    f.push(
        "stName",
        c.short_unicode_string(ctx.codepage, "BoundSheet8.stName")?,
    );
    Ok(f)
}

pub(super) fn calc_precision(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = Fields::new();
    // 0 selects precision-as-displayed mode.
    f.push("fFullPrec", c.u16("CalcPrecision.fFullPrec")? == 0);
    Ok(f)
}

fn codepage_label(cv: u16) -> Option<&'static str> {
    let label = match cv {
        437 => "IBM PC (437)",
        874 => "windows-874",
        932 => "shift_jis",
        936 => "gbk",
        949 => "euc-kr",
        950 => "big5",
        1200 => "utf-16le",
        1250 => "windows-1250",
        1251 => "windows-1251",
        1252 => "windows-1252",
        1253 => "windows-1253",
        1254 => "windows-1254",
        1255 => "windows-1255",
        1256 => "windows-1256",
        1257 => "windows-1257",
        1258 => "windows-1258",
        10000 => "macintosh",
        28591 => "iso-8859-1",
        65001 => "utf-8",
        _ => return None,
    };
    Some(label)
}

pub(super) fn codepage(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let cv = c.u16("CodePage.cv")?;
    let mut f = Fields::new();
    f.push_coded("cv", cv, "cv_d", codepage_label(cv));
    Ok(f)
}

fn country_label(id: u16) -> Option<&'static str> {
    let label = match id {
        1 => "United States",
        2 => "Canada",
        7 => "Russia",
        30 => "Greece",
        31 => "Netherlands",
        32 => "Belgium",
        33 => "France",
        34 => "Spain",
        39 => "Italy",
        41 => "Switzerland",
        43 => "Austria",
        44 => "United Kingdom",
        45 => "Denmark",
        46 => "Sweden",
        47 => "Norway",
        48 => "Poland",
        49 => "Germany",
        55 => "Brazil",
        61 => "Australia",
        64 => "New Zealand",
        81 => "Japan",
        82 => "South Korea",
        86 => "China",
        90 => "Turkey",
        91 => "India",
        351 => "Portugal",
        358 => "Finland",
        420 => "Czech Republic",
        972 => "Israel",
        _ => return None,
    };
    Some(label)
}

pub(super) fn country(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let def = c.u16("Country.iCountryDef")?;
    let win_ini = c.u16("Country.iCountryWinIni")?;
    let mut f = Fields::new();
    f.push_coded("iCountryDef", def, "iCountryDef_d", country_label(def));
    f.push_coded(
        "iCountryWinIni",
        win_ini,
        "iCountryWinIni_d",
        country_label(win_ini),
    );
    Ok(f)
}

pub(super) fn date1904(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("f1904DateSystem", c.u16("Date1904.f1904DateSystem")? == 1);
    Ok(f)
}

pub(super) fn file_pass(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let w_type = c.u16("FilePass.wEncryptionType")?;
    let mut f = Fields::new();
    f.push("wEncryptionType", w_type);
    let scheme = match w_type {
        0x0000 => Some("XOR"),
        0x0001 => match c.u16("FilePass.vMajor")? {
            0x0001 => Some("RC4"),
            0x0002..=0x0004 => Some("CryptoAPI"),
            _ => None,
        },
        _ => None,
    };
    if let Some(scheme) = scheme {
        f.push("_type", Value::Sym(scheme));
    }
    Ok(f)
}

fn charset_label(id: u8) -> Option<&'static str> {
    let label = match id {
        0x00 => "ANSI_CHARSET",
        0x01 => "DEFAULT_CHARSET",
        0x02 => "SYMBOL_CHARSET",
        0x4D => "MAC_CHARSET",
        0x80 => "SHIFTJIS_CHARSET",
        0x81 => "HANGUL_CHARSET",
        0x82 => "JOHAB_CHARSET",
        0x86 => "GB2312_CHARSET",
        0x88 => "CHINESEBIG5_CHARSET",
        0xA1 => "GREEK_CHARSET",
        0xA2 => "TURKISH_CHARSET",
        0xA3 => "VIETNAMESE_CHARSET",
        0xB1 => "HEBREW_CHARSET",
        0xB2 => "ARABIC_CHARSET",
        0xBA => "BALTIC_CHARSET",
        0xCC => "RUSSIAN_CHARSET",
        0xDE => "THAI_CHARSET",
        0xEE => "EASTEUROPE_CHARSET",
        0xFF => "OEM_CHARSET",
        _ => return None,
    };
    Some(label)
}

pub(super) fn font(c: &mut Cursor<'_>, ctx: &DecodeCtx) -> Result<Fields> {
    let dy_height = c.u16("Font.dyHeight")?;
    let attrs = Bits::from(c.u16("Font.attrs")?);
    let icv = c.u16("Font.icv")?;
    let bls = c.u16("Font.bls")?;
    let sss = c.u16("Font.sss")?;
    let uls = c.u8("Font.uls")?;
    let b_family = c.u8("Font.bFamily")?;
    let b_char_set = c.u8("Font.bCharSet")?;
    c.skip(1, "Font.unused")?;

    let mut f = Fields::new();
    f.push("dyHeight", dy_height);
    f.push("fItalic", attrs.set_at(1));
    f.push("fStrikeOut", attrs.set_at(3));
    f.push("icv", icv);
    let bls_label = match bls {
        0x0190 => Some("BLSNORMAL"),
        0x02BC => Some("BLSBOLD"),
        0xFFFF => Some("ignored"),
        _ => None,
    };
    f.push_coded("bls", bls, "bls_d", bls_label);
    let sss_label = match sss {
        0x00 => Some("SSSNONE"),
        0x01 => Some("SSSSUPER"),
        0x02 => Some("SSSSUB"),
        0xFF => Some("ignored"),
        _ => None,
    };
    f.push_coded("sss", sss, "sss_d", sss_label);
    let uls_label = match uls {
        0x00 => Some("ULSNONE"),
        0x01 => Some("ULSSINGLE"),
        0x02 => Some("ULSDOUBLE"),
        0x21 => Some("ULSSINGLEACCOUNTANT"),
        0x22 => Some("ULSDOUBLEACCOUNTANT"),
        0xFF => Some("ignored"),
        _ => None,
    };
    f.push_coded("uls", uls, "uls_d", uls_label);
    let family_label = match b_family {
        0x00 => Some("Not applicable"),
        0x01 => Some("Roman"),
        0x02 => Some("Swiss"),
        0x03 => Some("Modern"),
        0x04 => Some("Script"),
        0x05 => Some("Decorative"),
        _ => None,
    };
    f.push_coded("bFamily", b_family, "bFamily_d", family_label);
    f.push_coded("bCharSet", b_char_set, "bCharSet_d", charset_label(b_char_set));
    f.push(
        "fontName",
        c.short_unicode_string(ctx.codepage, "Font.fontName")?,
    );
    Ok(f)
}

pub(super) fn format(c: &mut Cursor<'_>, ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("ifmt", c.u16("Format.ifmt")?);
    f.push("stFormat", c.unicode_string(ctx.codepage, "Format.stFormat")?);
    Ok(f)
}

pub(super) fn interface_hdr(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = Fields::new();
    if c.remaining() >= 2 {
        f.push("codePage", c.u16("InterfaceHdr.codePage")?);
    }
    Ok(f)
}

pub(super) fn write_access(c: &mut Cursor<'_>, ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = Fields::new();
    f.push(
        "userName",
        c.unicode_string(ctx.codepage, "WriteAccess.userName")?,
    );
    // The rest of the 112-byte field is space padding.
    c.rest();
    Ok(f)
}

fn long_rgba(c: &mut Cursor<'_>) -> Result<String> {
    let bytes = c.bytes(4, "LongRGBA")?;
    Ok(bytes.iter().map(|b| format!("{b:02X}")).collect())
}

pub(super) fn palette(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let ccv = c.i16("Palette.ccv")?;
    let mut colors = Vec::with_capacity(ccv.max(0) as usize);
    for _ in 0..ccv.max(0) {
        colors.push(Value::Str(long_rgba(c)?));
    }

    let mut f = Fields::new();
    f.push("ccv", ccv);
    f.push("rgColor", colors);
    Ok(f)
}

pub(super) fn sst(c: &mut Cursor<'_>, ctx: &DecodeCtx) -> Result<Fields> {
    let cst_total = c.i32("SST.cstTotal")?;
    let cst_unique = c.i32("SST.cstUnique")?;

    let mut rgb = Vec::with_capacity(cst_unique.max(0) as usize);
    for _ in 0..cst_unique.max(0) {
        let s = c.rich_extended_string(ctx.codepage, "SST.rgb")?;
        rgb.push(super::rich_string_value(s));
    }

    let mut f = Fields::new();
    f.push("cstTotal", cst_total);
    f.push("cstUnique", cst_unique);
    f.push("rgb", rgb);
    Ok(f)
}

pub(super) fn style(c: &mut Cursor<'_>, ctx: &DecodeCtx) -> Result<Fields> {
    let attrs = Bits::from(c.u16("Style.attrs")?);
    let f_built_in = attrs.set_at(15);

    let mut f = Fields::new();
    f.push("ixfe", attrs.value_at(0, 11));
    f.push("fBuiltIn", f_built_in);
    if f_built_in {
        f.push("builtInData", built_in_style(c)?);
    } else {
        f.push("user", c.unicode_string(ctx.codepage, "Style.user")?);
    }
    Ok(f)
}

pub(super) fn style_ext(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("frtHeader", frt_header(c)?);

    let attrs = Bits::from(c.u8("StyleExt.attrs")?);
    let f_built_in = attrs.set_at(0);
    let i_category = c.u8("StyleExt.iCategory")?;

    f.push("fBuiltIn", f_built_in);
    f.push("fHidden", attrs.set_at(1));
    f.push("fCustom", attrs.set_at(2));
    let category = match i_category {
        0x00 => Some("Custom style"),
        0x01 => Some("Good, bad, neutral style"),
        0x02 => Some("Data model style"),
        0x03 => Some("Title and heading style"),
        0x04 => Some("Themed cell style"),
        0x05 => Some("Number format style"),
        _ => None,
    };
    f.push_coded("iCategory", i_category, "iCategory_d", category);

    // builtInData is 0xFFFF filler when fBuiltIn is clear.
    let built_in_data = c.bytes(2, "StyleExt.builtInData")?;
    if f_built_in {
        f.push(
            "builtInData",
            built_in_style(&mut Cursor::new_single(&built_in_data))?,
        );
    }
    f.push("stName", c.lp_wide_string("StyleExt.stName")?);
    // xfProps would require the full XFProp taxonomy; kept undecoded.
    f.push("xfProps", Value::Unsupported);
    c.rest();
    Ok(f)
}

pub(super) fn table_style(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("frtHeader", frt_header(c)?);
    let attrs = Bits::from(c.u16("TableStyle.attrs")?);
    f.push("fIsPivot", attrs.set_at(1));
    f.push("fIsTable", attrs.set_at(2));
    f.push("ctse", c.u32("TableStyle.ctse")?);
    let cch_name = c.u16("TableStyle.cchName")?;
    f.push("cchName", cch_name);
    f.push(
        "rgchName",
        c.utf16_units(cch_name as usize, "TableStyle.rgchName")?,
    );
    Ok(f)
}

fn tse_type_label(value: u32) -> Option<&'static str> {
    let label = match value {
        0x00 => "whole_table",
        0x01 => "header_row",
        0x02 => "total_row",
        0x03 => "first_column",
        0x04 => "last_column",
        0x05 => "row_stripe_1",
        0x06 => "row_stripe_2",
        0x07 => "column_stripe_1",
        0x08 => "column_stripe_2",
        0x09 => "first_cell_header",
        0x0A => "last_cell_header",
        0x0B => "first_cell_total",
        0x0C => "last_cell_total",
        0x0D => "pt_outermost_subtotal_columns",
        0x0E => "pt_alternating_even_subtotal_columns",
        0x0F => "pt_alternating_odd_subtotal_columns",
        0x10 => "pt_outermost_subtotal_rows",
        0x11 => "pt_alternating_even_subtotal_rows",
        0x12 => "pt_alternating_odd_subtotal_rows",
        0x13 => "pt_empty_rows_after_each_subtotal_row",
        0x14 => "pt_outermost_column_subheadings",
        0x15 => "pt_alternating_even_column_subheadings",
        0x16 => "pt_alternating_odd_column_subheadings",
        0x17 => "pt_outermost_row_subheadings",
        0x18 => "pt_alternating_even_row_subheadings",
        0x19 => "pt_alternating_odd_row_subheadings",
        0x1A => "pt_page_field_captions",
        0x1B => "pt_page_item_captions",
        _ => return None,
    };
    Some(label)
}

pub(super) fn table_style_element(c: &mut Cursor<'_>, ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("frtHeader", frt_header(c)?);
    let tse_type = c.u32("TableStyleElement.tseType")?;
    f.push_coded("tseType", tse_type, "tseType_d", tse_type_label(tse_type));
    f.push("size", c.u32("TableStyleElement.size")?);
    f.push("index", c.u32("TableStyleElement.index")?);
    if let Some(tsi) = ctx.last_table_style {
        f.push("_tsi", tsi as u64);
    }
    Ok(f)
}

pub(super) fn table_styles(c: &mut Cursor<'_>, _ctx: &DecodeCtx) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("frtHeader", frt_header(c)?);
    f.push("cts", c.u32("TableStyles.cts")?);
    let cch_table = c.u16("TableStyles.cchDefTableStyle")?;
    let cch_pivot = c.u16("TableStyles.cchDefPivotStyle")?;
    f.push("cchDefTableStyle", cch_table);
    f.push("cchDefPivotStyle", cch_pivot);
    f.push(
        "rgchDefTableStyle",
        c.utf16_units(cch_table as usize, "TableStyles.rgchDefTableStyle")?,
    );
    f.push(
        "rgchDefPivotStyle",
        c.utf16_units(cch_pivot as usize, "TableStyles.rgchDefPivotStyle")?,
    );
    Ok(f)
}

/// Fixed positions of the first 16 XF records ([MS-XLS] 2.5.282).
fn builtin_xf_description(index: usize) -> Option<&'static str> {
    let label = match index {
        0 => "Normal style",
        1 => "Row outline level 1",
        2 => "Row outline level 2",
        3 => "Row outline level 3",
        4 => "Row outline level 4",
        5 => "Row outline level 5",
        6 => "Row outline level 6",
        7 => "Row outline level 7",
        8 => "Column outline level 1",
        9 => "Column outline level 2",
        10 => "Column outline level 3",
        11 => "Column outline level 4",
        12 => "Column outline level 5",
        13 => "Column outline level 6",
        14 => "Column outline level 7",
        15 => "Default cell format",
        _ => return None,
    };
    Some(label)
}

pub(super) fn xf(c: &mut Cursor<'_>, ctx: &DecodeCtx) -> Result<Fields> {
    let ifnt = c.u16("XF.ifnt")?;
    let ifmt = c.u16("XF.ifmt")?;
    let attrs = Bits::from(c.u16("XF.attrs")?);
    let f_style = attrs.set_at(2);

    let mut f = Fields::new();
    f.push("ifnt", ifnt);
    f.push("ifmt", ifmt);
    f.push("fLocked", attrs.set_at(0));
    f.push("fHidden", attrs.set_at(1));
    f.push("fStyle", f_style);
    f.push("f123Prefix", attrs.set_at(3));
    f.push("ixfParent", attrs.value_at(4, 15));
    if let Some(desc) = builtin_xf_description(ctx.serial_index) {
        f.push("_description", Value::Sym(desc));
    }
    f.push("_type", Value::Sym(if f_style { "stylexf" } else { "cellxf" }));

    xf_alignment(c, &mut f, !f_style)?;
    xf_border(c, &mut f)?;
    xf_fill(c, &mut f, !f_style)?;
    Ok(f)
}

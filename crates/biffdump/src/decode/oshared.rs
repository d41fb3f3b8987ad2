//! Hyperlink Object and moniker structures ([MS-OSHARED] 2.3.7), plus the
//! [MS-DTYP] GUID and FILETIME types they embed.

use crate::bits::Bits;
use crate::cursor::Cursor;
use crate::error::{BiffError, Result};
use crate::value::{Fields, Value};

const CLSID_URL_MONIKER: u32 = 0x79EAC9E0;
const CLSID_FILE_MONIKER: u32 = 0x0000_0303;
const CLSID_ITEM_MONIKER: u32 = 0x0000_0304;
const CLSID_ANTI_MONIKER: u32 = 0x0000_0305;
const CLSID_COMPOSITE_MONIKER: u32 = 0x0000_0309;

/// Format a 16-byte GUID; the first three fields are stored little-endian.
pub fn guid(bytes: &[u8]) -> String {
    debug_assert_eq!(bytes.len(), 16);
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[3], bytes[2], bytes[1], bytes[0],
        bytes[5], bytes[4],
        bytes[7], bytes[6],
        bytes[8], bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    )
}

/// FILETIME: 100-nanosecond intervals since 1601-01-01 UTC. Kept as the raw
/// interval count plus the equivalent Unix timestamp in seconds.
pub fn filetime(c: &mut Cursor<'_>) -> Result<Fields> {
    let intervals = c.u64("FILETIME")?;
    const UNIX_EPOCH_INTERVALS: u64 = 116_444_736_000_000_000;

    let mut f = Fields::new();
    f.push("intervals", intervals);
    f.push(
        "unixTime",
        (intervals as f64 - UNIX_EPOCH_INTERVALS as f64) / 10_000_000.0,
    );
    Ok(f)
}

/// HyperlinkString: a 4-byte character count (terminator included) followed
/// by a zero-terminated UTF-16 string.
fn hyperlink_string(c: &mut Cursor<'_>) -> Result<String> {
    c.u32("HyperlinkString.length")?;
    c.utf16z("HyperlinkString.string")
}

/// Hyperlink Object ([MS-OSHARED] 2.3.7.1): a stream version, option flags,
/// then a flag-dependent sequence of strings, monikers and metadata.
pub fn hyperlink(c: &mut Cursor<'_>, codepage: u16) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("streamVersion", c.u32("hyperlink.streamVersion")?);

    let attrs = Bits::from(c.u32("hyperlink.flags")?);
    let has_moniker = attrs.set_at(0);
    let has_location = attrs.set_at(3);
    let has_display_name = attrs.set_at(4);
    let has_guid = attrs.set_at(5);
    let has_creation_time = attrs.set_at(6);
    let has_frame_name = attrs.set_at(7);
    let moniker_as_str = attrs.set_at(8);

    f.push("hlstmfHasMoniker", has_moniker);
    f.push("hlstmfIsAbsolute", attrs.set_at(1));
    f.push("hlstmfSiteGaveDisplayName", attrs.set_at(2));
    f.push("hlstmfHasLocationStr", has_location);
    f.push("hlstmfHasDisplayName", has_display_name);
    f.push("hlstmfHasGUID", has_guid);
    f.push("hlstmfHasCreationTime", has_creation_time);
    f.push("hlstmfHasFrameName", has_frame_name);
    f.push("hlstmfMonikerSavedAsStr", moniker_as_str);
    f.push("hlstmfAbsFromGetdataRel", attrs.set_at(9));

    if has_display_name {
        f.push("displayName", hyperlink_string(c)?);
    }
    if has_frame_name {
        f.push("targetFrameName", hyperlink_string(c)?);
    }
    if has_moniker && moniker_as_str {
        f.push("moniker", hyperlink_string(c)?);
    }
    if has_moniker && !moniker_as_str {
        f.push("oleMoniker", hyperlink_moniker(c, codepage)?);
    }
    if has_location {
        f.push("location", hyperlink_string(c)?);
    }
    if has_guid {
        f.push("guid", guid(&c.bytes(16, "hyperlink.guid")?));
    }
    if has_creation_time {
        f.push("fileTime", filetime(c)?);
    }
    Ok(f)
}

/// HyperlinkMoniker ([MS-OSHARED] 2.3.7.2): a CLSID selecting the moniker
/// layout that follows.
fn hyperlink_moniker(c: &mut Cursor<'_>, codepage: u16) -> Result<Fields> {
    let clsid = c.bytes(16, "moniker.clsid")?;
    let id = u32::from_le_bytes([clsid[0], clsid[1], clsid[2], clsid[3]]);

    let kind = match id {
        CLSID_URL_MONIKER => Some("URLMoniker"),
        CLSID_FILE_MONIKER => Some("FileMoniker"),
        CLSID_COMPOSITE_MONIKER => Some("CompositeMoniker"),
        CLSID_ANTI_MONIKER => Some("AntiMoniker"),
        CLSID_ITEM_MONIKER => Some("ItemMoniker"),
        _ => None,
    };

    let mut f = Fields::new();
    f.push("monikerClsid", guid(&clsid));
    if let Some(kind) = kind {
        f.push("monikerClsid_d", Value::Sym(kind));
    }

    match id {
        CLSID_URL_MONIKER => f.push("data", url_moniker(c)?),
        CLSID_FILE_MONIKER => f.push("data", file_moniker(c, codepage)?),
        CLSID_ANTI_MONIKER => {
            let mut data = Fields::new();
            data.push("count", c.u32("AntiMoniker.count")?);
            f.push("data", data);
        }
        // Composite and item monikers embed arbitrary nested monikers with
        // no forward size; nothing in the wild writes them into cells.
        _ => f.push("data", Value::Unsupported),
    }
    Ok(f)
}

/// URLMoniker ([MS-OSHARED] 2.3.7.6).
fn url_moniker(c: &mut Cursor<'_>) -> Result<Fields> {
    let length = c.u32("URLMoniker.length")? as usize;
    let data = c.bytes(length, "URLMoniker.data")?;
    let mut inner = Cursor::new_single(&data);

    let mut f = Fields::new();
    f.push("length", length as u32);
    f.push("url", inner.utf16z("URLMoniker.url")?);
    if inner.remaining() >= 24 {
        f.push("serialGUID", guid(&inner.bytes(16, "URLMoniker.serialGUID")?));
        f.push("serialVersion", inner.u32("URLMoniker.serialVersion")?);
        f.push("uriFlags", inner.u32("URLMoniker.uriFlags")?);
    }
    Ok(f)
}

/// FileMoniker ([MS-OSHARED] 2.3.7.8).
fn file_moniker(c: &mut Cursor<'_>, codepage: u16) -> Result<Fields> {
    let mut f = Fields::new();
    f.push("cAnti", c.u16("FileMoniker.cAnti")?);

    let ansi_length = c.u32("FileMoniker.ansiLength")? as usize;
    let ansi = c.bytes(ansi_length, "FileMoniker.ansiPath")?;
    let end = ansi.iter().position(|&b| b == 0).unwrap_or(ansi.len());
    let (path, _, _) = crate::cursor::encoding_for_codepage(codepage).decode(&ansi[..end]);
    f.push("ansiLength", ansi_length as u32);
    f.push("ansiPath", path.into_owned());

    let end_server = c.u16("FileMoniker.endServer")?;
    if end_server != 0xFFFF {
        f.push("endServer", end_server);
    }
    f.push("versionNumber", c.u16("FileMoniker.versionNumber")?);
    c.skip(20, "FileMoniker.reserved")?;

    let cb_unicode = c.u32("FileMoniker.cbUnicodePathSize")?;
    f.push("cbUnicodePathSize", cb_unicode);
    if cb_unicode == 0 {
        return Ok(f);
    }

    let cb_bytes = c.u32("FileMoniker.cbUnicodePathBytes")? as usize;
    if cb_bytes % 2 != 0 {
        return Err(BiffError::Malformed(format!(
            "odd FileMoniker unicode path size: {cb_bytes}"
        )));
    }
    c.u16("FileMoniker.usKeyValue")?;
    f.push("cbUnicodePathBytes", cb_bytes as u32);
    f.push(
        "unicodePath",
        c.utf16_units(cb_bytes / 2, "FileMoniker.unicodePath")?,
    );
    Ok(f)
}

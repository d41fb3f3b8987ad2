//! End-to-end assembly of fixture Workbook streams, plaintext and encrypted.

use biffdump::{parse_workbook_stream, BiffError, ParseOptions, Value};
use biffdump_offcrypto::{
    restore_plaintext_regions, standard, xor, OffcryptoError, Rc4Header, DEFAULT_PASSWORD,
    PAYLOAD_BLOCK_SIZE,
};
use md5::{Digest, Md5};
use pretty_assertions::assert_eq;

fn record(id: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend(id.to_le_bytes());
    out.extend((payload.len() as u16).to_le_bytes());
    out.extend(payload);
    out
}

fn bof(dt: u16) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend(0x0600u16.to_le_bytes());
    p.extend(dt.to_le_bytes());
    p.extend(0x0DBBu16.to_le_bytes());
    p.extend(1997u16.to_le_bytes());
    p.extend(0x000000C9u32.to_le_bytes());
    p.extend(0x00000206u32.to_le_bytes());
    record(0x0809, &p)
}

fn eof() -> Vec<u8> {
    record(0x000A, &[])
}

fn codepage(cv: u16) -> Vec<u8> {
    record(0x0042, &cv.to_le_bytes())
}

fn boundsheet8(lb_ply_pos: u32, name: &str) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend(lb_ply_pos.to_le_bytes());
    p.extend([0x00, 0x00]); // visible worksheet
    p.push(name.len() as u8);
    p.push(0x00); // compressed
    p.extend(name.as_bytes());
    record(0x0085, &p)
}

fn number_cell(rw: u16, col: u16, num: f64) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend(rw.to_le_bytes());
    p.extend(col.to_le_bytes());
    p.extend(15u16.to_le_bytes());
    p.extend(num.to_le_bytes());
    record(0x0203, &p)
}

fn label_sst(rw: u16, col: u16, isst: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend(rw.to_le_bytes());
    p.extend(col.to_le_bytes());
    p.extend(15u16.to_le_bytes());
    p.extend(isst.to_le_bytes());
    record(0x00FD, &p)
}

/// SST with two compressed strings, the second one split across a Continue
/// record that restates the flags byte.
fn split_sst() -> Vec<u8> {
    let mut p = Vec::new();
    p.extend(2i32.to_le_bytes()); // cstTotal
    p.extend(2i32.to_le_bytes()); // cstUnique
    p.extend(5u16.to_le_bytes());
    p.push(0x00);
    p.extend(b"alpha");
    p.extend(6u16.to_le_bytes());
    p.push(0x00);
    p.extend(b"be"); // first 2 of 6 units

    let mut cont = vec![0x00]; // restated flags byte
    cont.extend(b"tas!");

    let mut out = record(0x00FC, &p);
    out.extend(record(0x003C, &cont));
    out
}

fn fixture_stream() -> Vec<u8> {
    let mut stream = Vec::new();
    stream.extend(bof(0x0005));
    stream.extend(codepage(1252));
    stream.extend(boundsheet8(0, "Data"));
    stream.extend(split_sst());
    stream.extend(eof());
    stream.extend(bof(0x0010));
    stream.extend(number_cell(0, 0, 36.6));
    stream.extend(label_sst(0, 1, 1));
    stream.extend(number_cell(1, 0, -1.25));
    stream.extend(eof());
    stream
}

fn assert_fixture_contents(stream: &[u8], options: &ParseOptions) {
    let wb = parse_workbook_stream(stream, options).unwrap();
    assert_eq!(wb.substreams.len(), 2);
    assert_eq!(wb.substreams[0].kind(), Some("globals"));

    let sst = wb.substreams[0].get("SST").unwrap();
    let rgb = sst.get("rgb").unwrap().as_list().unwrap();
    assert_eq!(rgb[0], Value::Str("alpha".into()));
    assert_eq!(rgb[1], Value::Str("betas!".into()));

    let sheets = wb.substreams[0].all("BoundSheet8");
    assert_eq!(sheets[0].get("stName"), Some(&Value::Str("Data".into())));

    let numbers = wb.substreams[1].all("Number");
    assert_eq!(numbers[0].get("num"), Some(&Value::Float(36.6)));
    assert_eq!(numbers[1].get("num"), Some(&Value::Float(-1.25)));
    assert_eq!(
        wb.substreams[1].get("LabelSst").unwrap().get("isst"),
        Some(&Value::Uint(1))
    );

    let loc = wb.index.cells.get(&(1, 0, 1)).unwrap();
    assert_eq!(loc.record, "LabelSst");
    let dims = wb.index.dimensions.get(&1).unwrap();
    assert_eq!((dims.row_min, dims.row_max), (0, 1));
    assert_eq!((dims.col_min, dims.col_max), (0, 1));
}

#[test]
fn plaintext_stream_assembles() {
    assert_fixture_contents(&fixture_stream(), &ParseOptions::default());
}

fn xor_file_pass(password: &str) -> Vec<u8> {
    let key = xor::create_xor_key_method1(password).unwrap();
    let verifier = xor::password_verifier_method1(password).unwrap();
    let mut p = vec![0x00, 0x00];
    p.extend(key.to_le_bytes());
    p.extend(verifier.to_le_bytes());
    record(0x002F, &p)
}

/// Writer view of XOR obfuscation: every record payload through the rolling
/// pad, then the never-encrypted regions copied back.
fn xor_encrypt_stream(plain: &[u8], password: &str) -> Vec<u8> {
    let array = xor::create_xor_array_method1(password).unwrap();
    let mut cipher = plain.to_vec();
    let mut offset = 0;
    while offset + 4 <= cipher.len() {
        let size = u16::from_le_bytes([cipher[offset + 2], cipher[offset + 3]]) as usize;
        xor::encrypt_record_payload(&mut cipher[offset + 4..offset + 4 + size], offset, &array);
        offset += 4 + size;
    }
    restore_plaintext_regions(plain, &mut cipher);
    cipher
}

fn with_file_pass(file_pass: Vec<u8>) -> Vec<u8> {
    let stream = fixture_stream();
    let bof_len = bof(0x0005).len();
    let mut out = stream[..bof_len].to_vec();
    out.extend(file_pass);
    out.extend(&stream[bof_len..]);
    out
}

#[test]
fn xor_obfuscated_stream_round_trips() {
    let password = "open sesame";
    let plain = with_file_pass(xor_file_pass(password));
    let cipher = xor_encrypt_stream(&plain, password);
    assert_ne!(cipher, plain);

    let options = ParseOptions {
        password: Some(password.into()),
    };
    assert_fixture_contents(&cipher, &options);

    let wb = parse_workbook_stream(&cipher, &options).unwrap();
    let fp = wb.substreams[0].get("FilePass").unwrap();
    assert_eq!(fp.get("_type"), Some(&Value::Sym("XOR")));
}

fn rc4_header(password: &str, salt: [u8; 16], verifier: [u8; 16]) -> Rc4Header {
    let key = standard::derive_key(password, &salt, 0);
    let mut rc4 = biffdump_offcrypto::rc4::Rc4::new(key.as_slice());

    let mut encrypted_verifier = verifier;
    rc4.apply_keystream(&mut encrypted_verifier);
    let mut encrypted_verifier_hash = [0u8; 16];
    encrypted_verifier_hash.copy_from_slice(&Md5::digest(verifier));
    rc4.apply_keystream(&mut encrypted_verifier_hash);

    Rc4Header {
        salt,
        encrypted_verifier,
        encrypted_verifier_hash,
    }
}

fn rc4_file_pass(header: &Rc4Header) -> Vec<u8> {
    let mut p = vec![0x01, 0x00, 0x01, 0x00, 0x01, 0x00];
    p.extend(header.salt);
    p.extend(header.encrypted_verifier);
    p.extend(header.encrypted_verifier_hash);
    record(0x002F, &p)
}

/// Writer view of RC4 Standard: the whole stream as one byte sequence,
/// re-keyed every 1024 bytes, then the plaintext regions copied back.
fn rc4_encrypt_stream(plain: &[u8], password: &str, salt: &[u8; 16]) -> Vec<u8> {
    let mut cipher = plain.to_vec();
    for (block, chunk) in cipher.chunks_mut(PAYLOAD_BLOCK_SIZE).enumerate() {
        let key = standard::derive_key(password, salt, block as u32);
        biffdump_offcrypto::rc4::Rc4::new(key.as_slice()).apply_keystream(chunk);
    }
    restore_plaintext_regions(plain, &mut cipher);
    cipher
}

#[test]
fn rc4_standard_stream_round_trips_under_default_password() {
    let salt = [0x5Au8; 16];
    let header = rc4_header(DEFAULT_PASSWORD, salt, [0x24; 16]);
    let plain = with_file_pass(rc4_file_pass(&header));
    let cipher = rc4_encrypt_stream(&plain, DEFAULT_PASSWORD, &salt);
    assert_ne!(cipher, plain);

    // No password supplied: the default one must be tried.
    assert_fixture_contents(&cipher, &ParseOptions::default());

    let wb = parse_workbook_stream(&cipher, &ParseOptions::default()).unwrap();
    let fp = wb.substreams[0].get("FilePass").unwrap();
    assert_eq!(fp.get("_type"), Some(&Value::Sym("RC4")));
}

#[test]
fn wrong_password_is_reported_distinctly() {
    let salt = [0x13u8; 16];
    let header = rc4_header("correct", salt, [0x77; 16]);
    let plain = with_file_pass(rc4_file_pass(&header));
    let cipher = rc4_encrypt_stream(&plain, "correct", &salt);

    let options = ParseOptions {
        password: Some("incorrect".into()),
    };
    let err = parse_workbook_stream(&cipher, &options).unwrap_err();
    assert!(matches!(
        err,
        BiffError::Decrypt(OffcryptoError::WrongPassword)
    ));
}

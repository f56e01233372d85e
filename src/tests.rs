use super::*;

fn prologue(records: u32, header_len: u16, record_len: u16, codepage: u8) -> Vec<u8> {
    let mut bytes = vec![0u8; HEADER_PROLOGUE_LEN];
    bytes[0] = 0x30;
    bytes[1] = 120; // 2020
    bytes[2] = 2;
    bytes[3] = 29;
    bytes[4..8].copy_from_slice(&records.to_le_bytes());
    bytes[8..10].copy_from_slice(&header_len.to_le_bytes());
    bytes[10..12].copy_from_slice(&record_len.to_le_bytes());
    bytes[29] = codepage;
    bytes
}

#[test]
fn test_parse_header() {
    let bytes = prologue(42, 97, 18, 3);
    let header = Header::parse(&bytes).unwrap();

    assert_eq!(header.db_type, DBFType::VisualFoxPro);
    assert_eq!(header.last_update, Some(NaiveDate::from_ymd(2020, 2, 29)));
    assert_eq!(header.records_count, 42);
    assert_eq!(header.header_len, 97);
    assert_eq!(header.record_len, 18);
    assert_eq!(header.codepage, 3);
}

#[test]
fn test_parse_header_is_deterministic() {
    let bytes = prologue(7, 65, 11, 201);
    assert_eq!(Header::parse(&bytes).unwrap(), Header::parse(&bytes).unwrap());
}

#[test]
fn test_parse_header_too_short() {
    let bytes = prologue(1, 65, 10, 3);
    assert_eq!(
        Header::parse(&bytes[..31]),
        Err(DbfError::MalformedHeader("block is shorter than the header prologue"))
    );
}

#[test]
fn test_parse_header_zero_record_len() {
    let bytes = prologue(1, 65, 0, 3);
    assert_eq!(
        Header::parse(&bytes),
        Err(DbfError::MalformedHeader("record length is zero"))
    );
}

#[test]
fn test_parse_header_len_below_prologue() {
    let bytes = prologue(1, 31, 10, 3);
    assert_eq!(
        Header::parse(&bytes),
        Err(DbfError::MalformedHeader("stored header length is shorter than the prologue"))
    );
}

#[test]
fn test_parse_header_tolerates_impossible_update_date() {
    let mut bytes = prologue(1, 65, 10, 3);
    bytes[2] = 13;
    let header = Header::parse(&bytes).unwrap();
    assert_eq!(header.last_update, None);
}

#[test]
fn test_parse_type_unknown_flag() {
    assert_eq!(DBFType::parse_type(0x03), DBFType::DBaseIIIPlus);
    assert_eq!(DBFType::parse_type(0xf5), DBFType::FoxProMemos);
    assert_eq!(DBFType::parse_type(0x77), DBFType::Undefined);
}

#[test]
fn test_codepage_encoding() {
    assert_eq!(codepage_encoding(3), Some(encoding_rs::WINDOWS_1252));
    assert_eq!(codepage_encoding(124), Some(encoding_rs::WINDOWS_874));
    assert_eq!(codepage_encoding(201), Some(encoding_rs::WINDOWS_1251));
    assert_eq!(codepage_encoding(0), None);
    assert_eq!(codepage_encoding(255), None);
}

#[test]
fn test_resolve_encoding_falls_back() {
    // cp437 has no Encoding Standard equivalent
    assert_eq!(resolve_encoding(1), encoding_rs::WINDOWS_1252);
    assert_eq!(resolve_encoding(123), encoding_rs::SHIFT_JIS);
}

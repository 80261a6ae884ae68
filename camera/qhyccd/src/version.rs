/// Format the `GetQHYCCDFWVersion` buffer as `20YY_MM_DD`.
///
/// The year is the high nibble of the first byte. Nibbles below 10 are
/// read as 0x10 plus the nibble: 0x0 gives 2016, 0xB gives 2011.
pub fn decode_firmware_version(buf: &[u8]) -> String {
    let b0 = buf.first().copied().unwrap_or(0);
    let b1 = buf.get(1).copied().unwrap_or(0);
    let mut year = b0 >> 4;
    if year < 10 {
        year += 0x10;
    }
    let month = b0 & 0x0f;
    format!("20{year:02}_{month:02}_{b1:02}")
}

/// Format `[year, month, day, subday]` from `GetQHYCCDSDKVersion`.
pub fn format_sdk_version(version: [u32; 4]) -> String {
    let [year, month, day, subday] = version;
    format!("20{year:02}{month:02}{day:02}_{subday}")
}

use crate::encoding::Encoding;

pub const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
pub const UTF16LE_BOM: [u8; 2] = [0xFF, 0xFE];
pub const UTF16BE_BOM: [u8; 2] = [0xFE, 0xFF];

/// Result of BOM detection containing the detected encoding and BOM length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BomDetectionResult {
    pub encoding: Encoding,
    pub bom_length: usize,
}

/// Outcome of looking for a BOM at the start of a possibly incomplete stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BomScan {
    /// A complete BOM is present.
    Found(BomDetectionResult),
    /// The bytes seen so far are a strict prefix of some BOM; more input is needed.
    NeedMore,
    /// The stream does not start with a BOM.
    Absent,
}

/// Detect Byte Order Mark (BOM) in the given byte slice.
pub fn detect_bom(bytes: &[u8]) -> Option<BomDetectionResult> {
    match scan_bom(bytes, true) {
        BomScan::Found(result) => Some(result),
        BomScan::NeedMore | BomScan::Absent => None,
    }
}

/// Look for a BOM at the start of `bytes`.
///
/// When `complete` is false the caller may still supply more bytes, so a
/// strict prefix of a BOM (`EF`, `EF BB`, `FF`, `FE`) yields `NeedMore`
/// instead of `Absent`.
pub fn scan_bom(bytes: &[u8], complete: bool) -> BomScan {
    if bytes.starts_with(&UTF8_BOM) {
        return BomScan::Found(BomDetectionResult { encoding: Encoding::Utf8Bom, bom_length: 3 });
    }
    if bytes.starts_with(&UTF16LE_BOM) {
        return BomScan::Found(BomDetectionResult { encoding: Encoding::Utf16Le, bom_length: 2 });
    }
    if bytes.starts_with(&UTF16BE_BOM) {
        return BomScan::Found(BomDetectionResult { encoding: Encoding::Utf16Be, bom_length: 2 });
    }

    // The empty slice is a prefix of every BOM.
    let partial = UTF8_BOM.starts_with(bytes)
        || UTF16LE_BOM.starts_with(bytes)
        || UTF16BE_BOM.starts_with(bytes);
    if partial && !complete {
        BomScan::NeedMore
    } else {
        BomScan::Absent
    }
}

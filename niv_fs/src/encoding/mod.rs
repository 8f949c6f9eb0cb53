use std::fmt;
use std::str::FromStr;

pub mod codec;
pub mod latin;
pub mod utf16;
pub mod utf8;

pub use codec::{Decoder, Encoder};
pub use utf8::{has_utf8_cookie, is_valid_utf8};

/// External byte encoding of a file.
///
/// `Utf8Bom` and `Utf8Cookie` are kept apart from plain `Utf8` so that a
/// save reproduces exactly what was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    /// Raw 8-bit bytes, mapped one-to-one onto U+0000..=U+00FF.
    EightBit,
    /// UTF-8 without a byte-order mark.
    #[default]
    Utf8,
    /// UTF-8 preceded by `EF BB BF`.
    Utf8Bom,
    /// UTF-8 without a BOM, declared by a `coding: utf-8` cookie.
    Utf8Cookie,
    Utf16Le,
    Utf16Be,
}

impl Encoding {
    pub const ALL: [Encoding; 6] = [
        Encoding::EightBit,
        Encoding::Utf8,
        Encoding::Utf8Bom,
        Encoding::Utf8Cookie,
        Encoding::Utf16Le,
        Encoding::Utf16Be,
    ];

    /// Byte-order mark written at the start of a stream in this encoding.
    pub fn bom(self) -> &'static [u8] {
        match self {
            Encoding::Utf8Bom => &crate::bom::UTF8_BOM,
            Encoding::Utf16Le => &crate::bom::UTF16LE_BOM,
            Encoding::Utf16Be => &crate::bom::UTF16BE_BOM,
            Encoding::EightBit | Encoding::Utf8 | Encoding::Utf8Cookie => &[],
        }
    }

    pub fn has_bom(self) -> bool {
        !self.bom().is_empty()
    }

    pub fn is_utf8(self) -> bool {
        matches!(self, Encoding::Utf8 | Encoding::Utf8Bom | Encoding::Utf8Cookie)
    }

    pub fn is_utf16(self) -> bool {
        matches!(self, Encoding::Utf16Le | Encoding::Utf16Be)
    }

    /// Stable label used in configuration files and on the command line.
    pub fn label(self) -> &'static str {
        match self {
            Encoding::EightBit => "8bit",
            Encoding::Utf8 => "utf-8",
            Encoding::Utf8Bom => "utf-8-bom",
            Encoding::Utf8Cookie => "utf-8-cookie",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Utf16Be => "utf-16be",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when an encoding label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown encoding '{0}'")]
pub struct UnknownEncoding(pub String);

impl FromStr for Encoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        let encoding = match normalized.as_str() {
            "8bit" | "8-bit" | "latin1" | "latin-1" | "iso-8859-1" | "binary" => Encoding::EightBit,
            "utf8" | "utf-8" => Encoding::Utf8,
            "utf8-bom" | "utf-8-bom" | "utf-8-sig" => Encoding::Utf8Bom,
            "utf8-cookie" | "utf-8-cookie" => Encoding::Utf8Cookie,
            "utf16le" | "utf-16le" | "utf-16-le" | "ucs-2le" => Encoding::Utf16Le,
            "utf16be" | "utf-16be" | "utf-16-be" | "ucs-2be" => Encoding::Utf16Be,
            _ => return Err(UnknownEncoding(s.to_string())),
        };
        Ok(encoding)
    }
}

/// Confidence level for encoding detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DetectionConfidence {
    High = 3,
    Medium = 2,
    Low = 1,
    Unknown = 0,
}

/// Encoding detection result with confidence information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingDetectionResult {
    pub encoding: Encoding,
    pub confidence: DetectionConfidence,
    /// Sample looks like binary data rather than text.
    pub binary: bool,
}

/// Configuration for encoding detection heuristics
#[derive(Debug, Clone, Copy)]
pub struct DetectionConfig {
    pub max_null_ratio: f64,
    pub max_control_ratio: f64,
    /// Number of leading bytes examined. Independent of the read chunk size
    /// so that detection does not depend on how a file is streamed.
    pub sample_size: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            max_null_ratio: 0.1,
            max_control_ratio: 0.3,
            sample_size: 8192,
        }
    }
}

/// Pick the declared encoding for a stream from its leading bytes.
///
/// Strategy:
/// 1) BOM
/// 2) `coding: utf-8` cookie in the first two lines
/// 3) UTF-8 validity (a sequence cut off by the end of the sample is allowed)
/// 4) 8-bit
///
/// A sample with no bytes above 0x7F says nothing either way and yields
/// `fallback` with `Unknown` confidence.
pub fn detect_encoding(
    sample: &[u8],
    fallback: Encoding,
    config: &DetectionConfig,
) -> EncodingDetectionResult {
    let sample = &sample[..sample.len().min(config.sample_size)];

    if let Some(bom) = crate::bom::detect_bom(sample) {
        return EncodingDetectionResult {
            encoding: bom.encoding,
            confidence: DetectionConfidence::High,
            binary: false,
        };
    }

    let binary = is_binary_sample(sample, config);

    if has_utf8_cookie(sample) {
        return EncodingDetectionResult {
            encoding: Encoding::Utf8Cookie,
            confidence: DetectionConfidence::High,
            binary,
        };
    }

    if sample.is_ascii() {
        return EncodingDetectionResult {
            encoding: fallback,
            confidence: DetectionConfidence::Unknown,
            binary,
        };
    }

    if is_valid_utf8(sample, true) {
        return EncodingDetectionResult {
            encoding: Encoding::Utf8,
            confidence: DetectionConfidence::Medium,
            binary,
        };
    }

    EncodingDetectionResult {
        encoding: Encoding::EightBit,
        confidence: if binary { DetectionConfidence::Medium } else { DetectionConfidence::Low },
        binary,
    }
}

/// Binary if the sample has too many NUL bytes or control characters.
fn is_binary_sample(sample: &[u8], config: &DetectionConfig) -> bool {
    if sample.len() < 512 {
        return false; // Too small to determine
    }

    let mut null_count = 0usize;
    let mut control_count = 0usize;
    for &b in sample {
        if b == 0 {
            null_count += 1;
        } else if b < 32 && b != 9 && b != 10 && b != 13 {
            control_count += 1;
        }
    }

    let null_ratio = null_count as f64 / sample.len() as f64;
    let control_ratio = control_count as f64 / sample.len() as f64;
    null_ratio > config.max_null_ratio || control_ratio > config.max_control_ratio
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(bytes: &[u8]) -> EncodingDetectionResult {
        detect_encoding(bytes, Encoding::Utf8, &DetectionConfig::default())
    }

    #[test]
    fn test_bom_wins() {
        let result = detect(&[0xEF, 0xBB, 0xBF, b'x']);
        assert_eq!(result.encoding, Encoding::Utf8Bom);
        assert_eq!(result.confidence, DetectionConfidence::High);
    }

    #[test]
    fn test_cookie_detected() {
        let result = detect(b"#!/usr/bin/env python\n# -*- coding: utf-8 -*-\nprint()\n");
        assert_eq!(result.encoding, Encoding::Utf8Cookie);
    }

    #[test]
    fn test_ascii_uses_fallback() {
        let result = detect_encoding(b"hello", Encoding::EightBit, &DetectionConfig::default());
        assert_eq!(result.encoding, Encoding::EightBit);
        assert_eq!(result.confidence, DetectionConfidence::Unknown);
    }

    #[test]
    fn test_utf8_and_eight_bit() {
        assert_eq!(detect("caf\u{e9} \u{2014} ok".as_bytes()).encoding, Encoding::Utf8);
        assert_eq!(detect(&[b'c', b'a', b'f', 0xE9, b' ']).encoding, Encoding::EightBit);
    }

    #[test]
    fn test_truncated_sequence_at_sample_end_is_utf8() {
        let text = "ab\u{20ac}".as_bytes();
        let config = DetectionConfig { sample_size: text.len() - 1, ..Default::default() };
        let result = detect_encoding(text, Encoding::EightBit, &config);
        assert_eq!(result.encoding, Encoding::Utf8);
    }

    #[test]
    fn test_binary_flag() {
        let result = detect(&vec![0u8; 1024]);
        assert!(result.binary);
        assert!(!detect(&vec![b'a'; 1024]).binary);
    }

    #[test]
    fn test_labels_round_trip() {
        for encoding in Encoding::ALL {
            assert_eq!(encoding.label().parse::<Encoding>().unwrap(), encoding);
        }
        assert_eq!("UTF_16LE".parse::<Encoding>().unwrap(), Encoding::Utf16Le);
        assert!("ebcdic".parse::<Encoding>().is_err());
    }
}

//! End-of-line detection.

use std::fmt;

/// Represents the detected end-of-line type in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EolType {
    /// Line Feed (Unix/Linux/macOS) - \n
    #[default]
    Lf,
    /// Carriage Return + Line Feed (Windows) - \r\n
    Crlf,
    /// Carriage Return (old macOS) - \r
    Cr,
    /// More than one kind present
    Mixed,
}

impl EolType {
    pub fn label(self) -> &'static str {
        match self {
            EolType::Lf => "LF",
            EolType::Crlf => "CRLF",
            EolType::Cr => "CR",
            EolType::Mixed => "mixed",
        }
    }
}

impl fmt::Display for EolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Detect the predominant end-of-line type in decoded text.
///
/// Text with no line endings reports `Lf`. When at least two kinds occur
/// equally often the result is `Mixed`.
pub fn detect_eol(text: &str) -> EolType {
    let bytes = text.as_bytes();
    let mut lf_count = 0u64;
    let mut crlf_count = 0u64;
    let mut cr_count = 0u64;

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                if bytes.get(i + 1) == Some(&b'\n') {
                    crlf_count += 1;
                    i += 2;
                } else {
                    cr_count += 1;
                    i += 1;
                }
            }
            b'\n' => {
                lf_count += 1;
                i += 1;
            }
            _ => i += 1,
        }
    }

    let max = lf_count.max(crlf_count).max(cr_count);
    if max == 0 {
        return EolType::Lf;
    }
    let tied = [lf_count, crlf_count, cr_count].iter().filter(|&&c| c == max).count();
    if tied > 1 {
        EolType::Mixed
    } else if crlf_count == max {
        EolType::Crlf
    } else if lf_count == max {
        EolType::Lf
    } else {
        EolType::Cr
    }
}

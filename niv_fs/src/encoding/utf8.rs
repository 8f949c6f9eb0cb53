/// Check if a byte slice contains valid UTF-8 sequences.
///
/// With `allow_truncated`, an incomplete sequence at the very end is accepted;
/// a sample cut out of a larger file may end mid-character.
pub fn is_valid_utf8(bytes: &[u8], allow_truncated: bool) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(_) => true,
        Err(err) => allow_truncated && err.error_len().is_none(),
    }
}

/// Look for an explicit UTF-8 declaration such as `coding: utf-8` or
/// `coding=utf8` within the first two lines.
pub fn has_utf8_cookie(bytes: &[u8]) -> bool {
    bytes
        .split(|&b| b == b'\n' || b == b'\r')
        .filter(|line| !line.is_empty())
        .take(2)
        .any(line_has_cookie)
}

fn line_has_cookie(line: &[u8]) -> bool {
    const KEY: &[u8] = b"coding";
    let lower = line.to_ascii_lowercase();
    let mut rest = lower.as_slice();
    while let Some(pos) = find(rest, KEY) {
        let after = &rest[pos + KEY.len()..];
        if let Some((&sep, value)) = after.split_first() {
            if sep == b':' || sep == b'=' {
                let value = trim_start(value);
                if value.starts_with(b"utf-8") || value.starts_with(b"utf8") {
                    return true;
                }
            }
        }
        rest = after;
    }
    false
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn trim_start(bytes: &[u8]) -> &[u8] {
    let skip = bytes.iter().take_while(|b| b.is_ascii_whitespace()).count();
    &bytes[skip..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_and_truncated() {
        let euro = "\u{20ac}".as_bytes();
        assert!(is_valid_utf8(euro, false));
        assert!(!is_valid_utf8(&euro[..2], false));
        assert!(is_valid_utf8(&euro[..2], true));
        assert!(!is_valid_utf8(&[0xC3, 0x28], true));
    }

    #[test]
    fn test_cookie_forms() {
        assert!(has_utf8_cookie(b"# -*- coding: utf-8 -*-\n"));
        assert!(has_utf8_cookie(b"#!/bin/sh\n# vim: set fileencoding=utf8 :\n"));
        assert!(has_utf8_cookie(b"<?xml?>\r\n<!-- Coding: UTF-8 -->"));
        assert!(!has_utf8_cookie(b"line one\nline two\n# coding: utf-8\n"));
        assert!(!has_utf8_cookie(b"# coding: latin-1\n"));
    }
}

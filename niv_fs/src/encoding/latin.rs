//! 8-bit passthrough: every byte maps to the code point of the same value.

/// Decode 8-bit bytes, appending one character per byte.
pub fn decode_eight_bit(bytes: &[u8], out: &mut String) {
    out.reserve(bytes.len());
    out.extend(bytes.iter().map(|&b| char::from(b)));
}

/// Encode text as 8-bit bytes.
///
/// Characters above U+00FF have no byte; they are written as `?` and
/// counted in the returned value.
pub fn encode_eight_bit(text: &str, out: &mut Vec<u8>) -> usize {
    let mut unrepresentable = 0;
    out.reserve(text.len());
    for ch in text.chars() {
        match u8::try_from(u32::from(ch)) {
            Ok(byte) => out.push(byte),
            Err(_) => {
                out.push(b'?');
                unrepresentable += 1;
            }
        }
    }
    unrepresentable
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_byte_round_trips() {
        let bytes: Vec<u8> = (0..=255u8).collect();
        let mut text = String::new();
        decode_eight_bit(&bytes, &mut text);
        assert_eq!(text.chars().count(), 256);

        let mut back = Vec::new();
        assert_eq!(encode_eight_bit(&text, &mut back), 0);
        assert_eq!(back, bytes);
    }

    #[test]
    fn test_unrepresentable_counted() {
        let mut out = Vec::new();
        assert_eq!(encode_eight_bit("a\u{20ac}b", &mut out), 1);
        assert_eq!(out, b"a?b");
    }
}

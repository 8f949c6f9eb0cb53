//! Streaming conversion between external byte encodings and `String` text.
//!
//! The decoder can be fed arbitrary chunks: incomplete UTF-8 sequences, odd
//! UTF-16 bytes, unpaired high surrogates and undecided BOM prefixes are
//! carried over to the next call. Feeding any chunking of a stream gives the
//! same text as feeding the whole stream at once.

use super::Encoding;
use super::latin::{decode_eight_bit, encode_eight_bit};
use super::utf16::{
    combine_surrogates, encode_utf16, is_high_surrogate, is_low_surrogate, unit_from_bytes,
};
use crate::bom::{BomScan, scan_bom};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BomState {
    Undecided,
    Seen,
    Absent,
}

/// Stateful decoder for one byte stream.
#[derive(Debug, Clone)]
pub struct Decoder {
    encoding: Encoding,
    bom: BomState,
    /// Leading bytes held back until it is known whether they form a BOM.
    head: Vec<u8>,
    /// Incomplete UTF-8 sequence or odd UTF-16 byte from the previous chunk.
    pending: Vec<u8>,
    high_surrogate: Option<u16>,
    substitutions: usize,
}

impl Decoder {
    /// Create a decoder for a stream declared to be in `declared`.
    ///
    /// A BOM at the start of the stream overrides the declaration.
    pub fn new(declared: Encoding) -> Self {
        Self {
            encoding: declared,
            bom: BomState::Undecided,
            head: Vec::new(),
            pending: Vec::new(),
            high_surrogate: None,
            substitutions: 0,
        }
    }

    /// Encoding in effect; final once the first bytes have been seen.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Whether the stream started with a byte-order mark.
    pub fn bom_seen(&self) -> bool {
        self.bom == BomState::Seen
    }

    /// Number of U+FFFD substitutions made for malformed or truncated input.
    pub fn substitutions(&self) -> usize {
        self.substitutions
    }

    /// Decode `chunk` and return the text it completes.
    ///
    /// An empty chunk marks the end of the stream and flushes retained state.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut out = String::new();
        self.decode_to(chunk, &mut out);
        out
    }

    /// Like [`Decoder::decode`], appending to `out`.
    pub fn decode_to(&mut self, chunk: &[u8], out: &mut String) {
        if chunk.is_empty() {
            self.finish(out);
            return;
        }

        if self.bom == BomState::Undecided {
            self.head.extend_from_slice(chunk);
            let skip = match scan_bom(&self.head, false) {
                BomScan::NeedMore => return,
                BomScan::Found(found) => {
                    self.encoding = found.encoding;
                    self.bom = BomState::Seen;
                    found.bom_length
                }
                BomScan::Absent => {
                    self.bom = BomState::Absent;
                    0
                }
            };
            let head = std::mem::take(&mut self.head);
            self.decode_body(&head[skip..], out);
            return;
        }

        self.decode_body(chunk, out);
    }

    /// Flush everything retained at end of stream.
    pub fn finish(&mut self, out: &mut String) {
        if self.bom == BomState::Undecided {
            self.bom = BomState::Absent;
            let head = std::mem::take(&mut self.head);
            self.decode_body(&head, out);
        }

        if self.high_surrogate.take().is_some() {
            self.substitute(out);
        }
        if !self.pending.is_empty() {
            self.pending.clear();
            self.substitute(out);
        }
    }

    fn decode_body(&mut self, bytes: &[u8], out: &mut String) {
        if bytes.is_empty() {
            return;
        }
        match self.encoding {
            Encoding::EightBit => decode_eight_bit(bytes, out),
            Encoding::Utf8 | Encoding::Utf8Bom | Encoding::Utf8Cookie => self.decode_utf8(bytes, out),
            Encoding::Utf16Le | Encoding::Utf16Be => self.decode_utf16(bytes, out),
        }
    }

    fn decode_utf8(&mut self, chunk: &[u8], out: &mut String) {
        let joined: Vec<u8>;
        let mut bytes = if self.pending.is_empty() {
            chunk
        } else {
            let mut carried = std::mem::take(&mut self.pending);
            carried.extend_from_slice(chunk);
            joined = carried;
            joined.as_slice()
        };

        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    out.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, rest) = bytes.split_at(err.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        out.push_str(text);
                    }
                    match err.error_len() {
                        Some(len) => {
                            self.substitute(out);
                            bytes = &rest[len..];
                        }
                        None => {
                            // Truncated sequence: wait for the rest of it.
                            self.pending.extend_from_slice(rest);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn decode_utf16(&mut self, chunk: &[u8], out: &mut String) {
        let mut bytes = chunk;
        if let Some(&carried) = self.pending.first() {
            if let Some((&next, rest)) = bytes.split_first() {
                self.pending.clear();
                self.push_unit(unit_from_bytes([carried, next], self.encoding), out);
                bytes = rest;
            }
        }

        let mut pairs = bytes.chunks_exact(2);
        for pair in &mut pairs {
            self.push_unit(unit_from_bytes([pair[0], pair[1]], self.encoding), out);
        }
        self.pending.extend_from_slice(pairs.remainder());
    }

    fn push_unit(&mut self, unit: u16, out: &mut String) {
        if let Some(high) = self.high_surrogate.take() {
            if is_low_surrogate(unit) {
                out.push(combine_surrogates(high, unit));
                return;
            }
            self.substitute(out);
        }

        if is_high_surrogate(unit) {
            self.high_surrogate = Some(unit);
        } else if is_low_surrogate(unit) {
            self.substitute(out);
        } else {
            out.push(char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
    }

    fn substitute(&mut self, out: &mut String) {
        out.push(char::REPLACEMENT_CHARACTER);
        self.substitutions += 1;
    }
}

/// Stateful encoder for one output stream.
#[derive(Debug, Clone)]
pub struct Encoder {
    encoding: Encoding,
    started: bool,
    unrepresentable: usize,
}

impl Encoder {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding, started: false, unrepresentable: 0 }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Characters that had no representation and were written as `?`.
    pub fn unrepresentable(&self) -> usize {
        self.unrepresentable
    }

    /// Begin the stream, writing the BOM if the encoding has one.
    ///
    /// Only the first call writes anything.
    pub fn start(&mut self, out: &mut Vec<u8>) {
        if !self.started {
            out.extend_from_slice(self.encoding.bom());
            self.started = true;
        }
    }

    /// Encode `text`, starting the stream first if needed.
    pub fn encode(&mut self, text: &str, out: &mut Vec<u8>) {
        self.start(out);
        match self.encoding {
            Encoding::EightBit => self.unrepresentable += encode_eight_bit(text, out),
            Encoding::Utf8 | Encoding::Utf8Bom | Encoding::Utf8Cookie => {
                out.extend_from_slice(text.as_bytes())
            }
            Encoding::Utf16Le | Encoding::Utf16Be => encode_utf16(text, self.encoding, out),
        }
    }
}

/// Decode a complete byte stream.
pub fn decode_all(bytes: &[u8], declared: Encoding) -> (String, Encoding) {
    let mut decoder = Decoder::new(declared);
    let mut text = String::with_capacity(bytes.len());
    if !bytes.is_empty() {
        decoder.decode_to(bytes, &mut text);
    }
    decoder.finish(&mut text);
    (text, decoder.encoding())
}

/// Encode a complete text, BOM included.
pub fn encode_all(text: &str, encoding: Encoding) -> Vec<u8> {
    let mut encoder = Encoder::new(encoding);
    let mut out = Vec::with_capacity(text.len() + 3);
    encoder.encode(text, &mut out);
    out
}

/// Split `text` into pieces of at most `max_bytes`, never inside a character.
///
/// A piece may exceed `max_bytes` only when a single character is wider.
pub fn text_chunks(text: &str, max_bytes: usize) -> impl Iterator<Item = &str> {
    let max_bytes = max_bytes.max(1);
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let mut end = rest.len().min(max_bytes);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let (piece, tail) = rest.split_at(end);
        rest = tail;
        Some(piece)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_chunked(bytes: &[u8], declared: Encoding, sizes: &[usize]) -> (String, Encoding) {
        let mut decoder = Decoder::new(declared);
        let mut out = String::new();
        let mut rest = bytes;
        let mut i = 0;
        while !rest.is_empty() {
            let take = sizes[i % sizes.len()].min(rest.len()).max(1);
            let (chunk, tail) = rest.split_at(take);
            decoder.decode_to(chunk, &mut out);
            rest = tail;
            i += 1;
        }
        decoder.decode_to(&[], &mut out);
        (out, decoder.encoding())
    }

    fn samples() -> Vec<(Vec<u8>, Encoding)> {
        let text = "a\u{e9}\u{20ac}\u{1F30D}z\r\n";
        vec![
            (encode_all(text, Encoding::Utf8Bom), Encoding::Utf8),
            (encode_all(text, Encoding::Utf8), Encoding::Utf8),
            (encode_all(text, Encoding::Utf16Le), Encoding::EightBit),
            (encode_all(text, Encoding::Utf16Be), Encoding::Utf8),
            (vec![0x61, 0xE2, 0x82, 0x41, 0xF0, 0x9F, 0xFF, 0xC3], Encoding::Utf8),
            (vec![0x3D, 0xD8, 0x41, 0x00, 0x00, 0xDC, 0x3D], Encoding::Utf16Le),
            ((0..=255u8).collect(), Encoding::EightBit),
            (vec![0xEF, 0xBB], Encoding::Utf8),
        ]
    }

    #[test]
    fn test_any_two_way_split_matches_whole() {
        for (bytes, declared) in samples() {
            let whole = decode_all(&bytes, declared);
            for split in 1..bytes.len() {
                let (head, tail) = bytes.split_at(split);
                let mut decoder = Decoder::new(declared);
                let mut out = decoder.decode(head);
                out.push_str(&decoder.decode(tail));
                out.push_str(&decoder.decode(&[]));
                assert_eq!((out, decoder.encoding()), whole, "split at {split} of {bytes:?}");
            }
        }
    }

    #[test]
    fn test_uneven_chunkings_match_whole() {
        for (bytes, declared) in samples() {
            let whole = decode_all(&bytes, declared);
            for sizes in [&[1][..], &[2, 3], &[3, 1, 4], &[5, 7]] {
                assert_eq!(decode_chunked(&bytes, declared, sizes), whole);
            }
        }
    }

    #[test]
    fn test_round_trip_preserves_bom_choice() {
        for encoding in Encoding::ALL {
            let text = match encoding {
                Encoding::EightBit => "l\u{ef}ne\n",
                _ => "l\u{ef}ne \u{1F30D}\n",
            };
            let bytes = encode_all(text, encoding);
            assert!(bytes.starts_with(encoding.bom()));
            assert_eq!(crate::bom::detect_bom(&bytes).is_some(), encoding.has_bom());

            let (decoded, detected) = decode_all(&bytes, encoding);
            assert_eq!(decoded, text, "{encoding}");
            assert_eq!(detected, encoding);
        }
    }

    #[test]
    fn test_bom_overrides_declaration() {
        let (text, encoding) = decode_all(&[0xFF, 0xFE, b'h', 0, b'i', 0], Encoding::Utf8);
        assert_eq!(text, "hi");
        assert_eq!(encoding, Encoding::Utf16Le);
    }

    #[test]
    fn test_declared_utf16_without_bom() {
        let (text, encoding) = decode_all(&[0, b'o', 0, b'k'], Encoding::Utf16Be);
        assert_eq!(text, "ok");
        assert_eq!(encoding, Encoding::Utf16Be);
    }

    #[test]
    fn test_truncated_tail_substituted_on_flush() {
        let mut decoder = Decoder::new(Encoding::Utf8);
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.decode(&[]), "\u{FFFD}");
        assert_eq!(decoder.substitutions(), 1);
    }

    #[test]
    fn test_split_surrogate_pair() {
        let bytes = encode_all("\u{1F30D}", Encoding::Utf16Le);
        let mut decoder = Decoder::new(Encoding::Utf16Le);
        let mut out = decoder.decode(&bytes[..3]);
        assert!(decoder.bom_seen());
        out.push_str(&decoder.decode(&bytes[3..5]));
        assert_eq!(out, "");
        out.push_str(&decoder.decode(&bytes[5..]));
        out.push_str(&decoder.decode(&[]));
        assert_eq!(out, "\u{1F30D}");
        assert_eq!(decoder.substitutions(), 0);
    }

    #[test]
    fn test_bom_written_once() {
        let mut encoder = Encoder::new(Encoding::Utf8Bom);
        let mut out = Vec::new();
        encoder.start(&mut out);
        encoder.encode("a", &mut out);
        encoder.encode("b", &mut out);
        assert_eq!(out, [0xEF, 0xBB, 0xBF, b'a', b'b']);
    }

    #[test]
    fn test_text_chunks_respect_char_boundaries() {
        let text = "a\u{20ac}b\u{1F30D}";
        let pieces: Vec<&str> = text_chunks(text, 2).collect();
        assert_eq!(pieces.concat(), text);
        assert!(pieces.iter().all(|p| !p.is_empty()));
        assert_eq!(pieces[0], "a");
        assert_eq!(text_chunks("", 4).count(), 0);
    }
}

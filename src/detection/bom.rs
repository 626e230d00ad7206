//! Byte-order-mark sniffing.

use crate::Encoding;

/// Signatures in match order. The UTF-32LE mark begins with the UTF-16LE
/// mark, so it must be tried first.
const SIGNATURES: [(Encoding, &[u8]); 5] = [
    (Encoding::UTF32LE, &[0xFF, 0xFE, 0x00, 0x00]),
    (Encoding::UTF32BE, &[0x00, 0x00, 0xFE, 0xFF]),
    (Encoding::UTF8, &[0xEF, 0xBB, 0xBF]),
    (Encoding::UTF16LE, &[0xFF, 0xFE]),
    (Encoding::UTF16BE, &[0xFE, 0xFF]),
];

/// The encoding announced by a leading BOM and the BOM's length.
pub(crate) fn sniff(data: &[u8]) -> Option<(Encoding, usize)> {
    SIGNATURES
        .iter()
        .find(|(_, signature)| data.starts_with(signature))
        .map(|&(encoding, signature)| (encoding, signature.len()))
}

/// Length of `encoding`'s BOM at the start of `data`, or 0.
pub(crate) fn bom_len(data: &[u8], encoding: Encoding) -> usize {
    match encoding.bom() {
        Some(bom) if data.starts_with(bom) => bom.len(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_bom() {
        assert_eq!(sniff(&[0xEF, 0xBB, 0xBF, b'a']), Some((Encoding::UTF8, 3)));
        assert_eq!(sniff(&[0xFE, 0xFF, 0x00, 0x41]), Some((Encoding::UTF16BE, 2)));
        assert_eq!(sniff(&[0xFF, 0xFE, 0x41, 0x00]), Some((Encoding::UTF16LE, 2)));
        assert_eq!(sniff(&[0x00, 0x00, 0xFE, 0xFF]), Some((Encoding::UTF32BE, 4)));
        assert_eq!(sniff(b"plain"), None);
        assert_eq!(sniff(&[0xEF, 0xBB]), None);
    }

    #[test]
    fn test_utf32le_wins_over_utf16le() {
        assert_eq!(
            sniff(&[0xFF, 0xFE, 0x00, 0x00, 0x41, 0, 0, 0]),
            Some((Encoding::UTF32LE, 4))
        );
    }

    #[test]
    fn test_bom_len_for_resolved_encoding() {
        assert_eq!(bom_len(b"\xEF\xBB\xBFhi", Encoding::UTF8), 3);
        assert_eq!(bom_len(b"\xEF\xBB\xBFhi", Encoding::UTF16LE), 0);
        assert_eq!(bom_len(b"hi", Encoding::UTF8), 0);
    }
}

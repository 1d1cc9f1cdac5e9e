//! Magic-byte format detection.
//!
//! Only the leading bytes are inspected; file names and declared content
//! types play no part.

use bulwark_common::DetectedMime;
use bulwark_common::constants::SNIFF_WINDOW;

/// Bytes expected at a fixed offset
struct Pattern {
    offset: usize,
    bytes: &'static [u8],
}

/// Every pattern must match for the signature to apply
struct Signature {
    mime: DetectedMime,
    patterns: &'static [Pattern],
}

const SIGNATURES: &[Signature] = &[
    Signature {
        mime: DetectedMime::Jpeg,
        patterns: &[Pattern {
            offset: 0,
            bytes: &[0xFF, 0xD8, 0xFF],
        }],
    },
    Signature {
        mime: DetectedMime::Png,
        patterns: &[Pattern {
            offset: 0,
            bytes: &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
        }],
    },
    Signature {
        mime: DetectedMime::Gif,
        patterns: &[Pattern {
            offset: 0,
            bytes: b"GIF87a",
        }],
    },
    Signature {
        mime: DetectedMime::Gif,
        patterns: &[Pattern {
            offset: 0,
            bytes: b"GIF89a",
        }],
    },
    Signature {
        mime: DetectedMime::WebP,
        patterns: &[
            Pattern {
                offset: 0,
                bytes: b"RIFF",
            },
            Pattern {
                offset: 8,
                bytes: b"WEBP",
            },
        ],
    },
    Signature {
        mime: DetectedMime::Ico,
        patterns: &[Pattern {
            offset: 0,
            bytes: &[0x00, 0x00, 0x01, 0x00],
        }],
    },
    Signature {
        mime: DetectedMime::Avif,
        patterns: &[Pattern {
            offset: 4,
            bytes: b"ftypavif",
        }],
    },
    Signature {
        mime: DetectedMime::Avif,
        patterns: &[Pattern {
            offset: 4,
            bytes: b"ftypavis",
        }],
    },
];

/// Classify `bytes` by signature, or `None` when nothing matches
pub fn sniff(bytes: &[u8]) -> Option<DetectedMime> {
    let head = &bytes[..bytes.len().min(SNIFF_WINDOW)];

    SIGNATURES
        .iter()
        .find(|sig| sig.patterns.iter().all(|p| matches_at(head, p)))
        .map(|sig| sig.mime)
}

fn matches_at(head: &[u8], pattern: &Pattern) -> bool {
    head.get(pattern.offset..pattern.offset + pattern.bytes.len())
        .is_some_and(|window| window == pattern.bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_signature() {
        assert_eq!(sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]), Some(DetectedMime::Jpeg));
    }

    #[test]
    fn test_png_signature() {
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0u8; 32]);
        assert_eq!(sniff(&bytes), Some(DetectedMime::Png));
    }

    #[test]
    fn test_gif_variants() {
        assert_eq!(sniff(b"GIF87a\x01\x00"), Some(DetectedMime::Gif));
        assert_eq!(sniff(b"GIF89a\x01\x00"), Some(DetectedMime::Gif));
        assert_eq!(sniff(b"GIF90a\x01\x00"), None);
    }

    #[test]
    fn test_webp_requires_both_parts() {
        assert_eq!(sniff(b"RIFF\x24\x00\x00\x00WEBPVP8 "), Some(DetectedMime::WebP));
        // A WAV file is RIFF too
        assert_eq!(sniff(b"RIFF\x24\x00\x00\x00WAVEfmt "), None);
    }

    #[test]
    fn test_ico_and_avif() {
        assert_eq!(sniff(&[0, 0, 1, 0, 1, 0, 16, 16]), Some(DetectedMime::Ico));
        assert_eq!(
            sniff(b"\x00\x00\x00\x1cftypavif\x00\x00\x00\x00"),
            Some(DetectedMime::Avif)
        );
        assert_eq!(
            sniff(b"\x00\x00\x00\x1cftypavis\x00\x00\x00\x00"),
            Some(DetectedMime::Avif)
        );
    }

    #[test]
    fn test_unrecognized_payloads() {
        assert_eq!(sniff(b""), None);
        assert_eq!(sniff(b"<svg xmlns=\"http://www.w3.org/2000/svg\">"), None);
        assert_eq!(sniff(b"%PDF-1.7"), None);
        // Truncated signature
        assert_eq!(sniff(&[0xFF, 0xD8]), None);
    }

    #[test]
    fn test_signature_beyond_window_is_ignored() {
        let mut bytes = vec![0u8; SNIFF_WINDOW];
        bytes.extend_from_slice(&[0xFF, 0xD8, 0xFF]);
        assert_eq!(sniff(&bytes), None);
    }
}

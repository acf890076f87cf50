//! Text decoding and delimiter detection for delimited files.

use encoding_rs::{Encoding, WINDOWS_1252};
use unicode_normalization::UnicodeNormalization;

/// Candidate delimiters, in order of preference on equal score.
const DELIMITERS: [u8; 3] = [b';', b',', b'\t'];

/// Lines inspected when scoring delimiters.
const SAMPLE_LINES: usize = 10;

/// Decode file bytes to NFC text.
///
/// A byte order mark selects the encoding (and is stripped). Without one the
/// bytes are read as UTF-8, falling back to Windows-1252 for legacy exports.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> String {
    let decoded = if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        text.into_owned()
    } else {
        match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(e) => {
                tracing::debug!(
                    "Invalid UTF-8 at byte {}, decoding as Windows-1252",
                    e.valid_up_to()
                );
                let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
                text.into_owned()
            }
        }
    };

    decoded.nfc().collect()
}

/// Pick the delimiter that splits the first lines most consistently.
///
/// Score is the delimiter count on the first line times the number of sampled
/// lines sharing that count. Falls back to `,` when nothing scores.
#[must_use]
pub fn detect_delimiter(text: &str) -> u8 {
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SAMPLE_LINES)
        .collect();

    let mut best = b',';
    let mut best_score = 0usize;
    for delimiter in DELIMITERS {
        let score = score_delimiter(&lines, delimiter);
        if score > best_score {
            best_score = score;
            best = delimiter;
        }
    }
    best
}

fn score_delimiter(lines: &[&str], delimiter: u8) -> usize {
    let counts: Vec<usize> = lines
        .iter()
        .map(|line| line.bytes().filter(|b| *b == delimiter).count())
        .collect();

    let Some(&first) = counts.first() else {
        return 0;
    };
    if first == 0 {
        return 0;
    }
    first * counts.iter().filter(|&&c| c == first).count()
}

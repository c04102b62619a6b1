//! Font metrics for the two standard Type1 faces the book is set in.
//!
//! The base-14 fonts are never embedded, so the widths below (from the
//! Adobe AFM files, in 1/1000 em) are all the compositor knows about them.
//! Text is encoded with WinAnsiEncoding: printable ASCII, the Latin-1
//! supplement and a handful of typographic punctuation marks. Anything else
//! has no glyph and cannot be shown.

/// The faces used in the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    /// PostScript name of the base font.
    pub fn base_font(self) -> &'static [u8] {
        match self {
            Font::Regular => b"Helvetica",
            Font::Bold => b"Helvetica-Bold",
        }
    }

    /// Resource name used inside page content streams.
    pub fn resource_name(self) -> &'static [u8] {
        match self {
            Font::Regular => b"F1",
            Font::Bold => b"F2",
        }
    }

    fn ascii_widths(self) -> &'static [u16; 95] {
        match self {
            Font::Regular => &HELVETICA,
            Font::Bold => &HELVETICA_BOLD,
        }
    }
}

// ── Encoding ─────────────────────────────────────────────────────────────────

/// WinAnsi code for `c`, if the encoding has one.
pub fn encode_char(c: char) -> Option<u8> {
    match c {
        ' '..='~' => Some(c as u8),
        '\u{00A0}'..='\u{00FF}' => Some(c as u32 as u8),
        '€' => Some(0x80),
        '‚' => Some(0x82),
        'ƒ' => Some(0x83),
        '„' => Some(0x84),
        '…' => Some(0x85),
        '†' => Some(0x86),
        '‡' => Some(0x87),
        'ˆ' => Some(0x88),
        '‰' => Some(0x89),
        'Š' => Some(0x8A),
        '‹' => Some(0x8B),
        'Œ' => Some(0x8C),
        'Ž' => Some(0x8E),
        '‘' => Some(0x91),
        '’' => Some(0x92),
        '“' => Some(0x93),
        '”' => Some(0x94),
        '•' => Some(0x95),
        '–' => Some(0x96),
        '—' => Some(0x97),
        '˜' => Some(0x98),
        '™' => Some(0x99),
        'š' => Some(0x9A),
        '›' => Some(0x9B),
        'œ' => Some(0x9C),
        'ž' => Some(0x9E),
        'Ÿ' => Some(0x9F),
        _ => None,
    }
}

/// Encode a whole string; `None` if any character has no WinAnsi code.
pub fn encode(text: &str) -> Option<Vec<u8>> {
    text.chars().map(encode_char).collect()
}

/// Encode a string, dropping characters that have no WinAnsi code.
pub fn encode_lossy(text: &str) -> (String, Vec<u8>) {
    let mut kept = String::with_capacity(text.len());
    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        if let Some(b) = encode_char(c) {
            kept.push(c);
            bytes.push(b);
        }
    }
    (kept, bytes)
}

// ── Measurement ──────────────────────────────────────────────────────────────

/// Advance width of one encoded byte, in 1/1000 em.
pub fn glyph_width(font: Font, code: u8) -> u16 {
    match code {
        0x20..=0x7E => font.ascii_widths()[(code - 0x20) as usize],
        0x80 | 0x83 | 0x86 | 0x87 | 0x96 => 556,
        0x85 | 0x89 | 0x8C | 0x97 | 0x99 => 1000,
        0x88 | 0x8B | 0x98 | 0x9B => 333,
        0x8A | 0x9F => 667,
        0x8E => 611,
        0x9C => 944,
        0x9E => 500,
        0x82 | 0x91 | 0x92 => match font {
            Font::Regular => 222,
            Font::Bold => 278,
        },
        0x84 | 0x93 | 0x94 => match font {
            Font::Regular => 333,
            Font::Bold => 500,
        },
        0x9A => match font {
            Font::Regular => 500,
            Font::Bold => 556,
        },
        0x95 => 350,
        0xA0 | 0xB7 => 278,
        _ => 556,
    }
}

/// Width of encoded text set at `size` points.
pub fn text_width(font: Font, encoded: &[u8], size: f32) -> f32 {
    let units: u32 = encoded.iter().map(|&b| glyph_width(font, b) as u32).sum();
    units as f32 * size / 1000.0
}

#[rustfmt::skip]
static HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
static HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_and_latin1_encode_to_themselves() {
        assert_eq!(encode("Hi!").unwrap(), b"Hi!".to_vec());
        assert_eq!(encode("café").unwrap(), vec![b'c', b'a', b'f', 0xE9]);
    }

    #[test]
    fn typographic_punctuation_maps_to_winansi() {
        assert_eq!(encode("“ok”—…").unwrap(), vec![0x93, b'o', b'k', 0x94, 0x97, 0x85]);
        assert_eq!(encode_char('·'), Some(0xB7));
    }

    #[test]
    fn whole_winansi_high_block_is_encodable() {
        assert_eq!(
            encode("Œuvre™ Šárka œ ‚a„ †‡ ‹›").unwrap(),
            vec![
                0x8C, b'u', b'v', b'r', b'e', 0x99, b' ', 0x8A, 0xE1, b'r', b'k', b'a', b' ',
                0x9C, b' ', 0x82, b'a', 0x84, b' ', 0x86, 0x87, b' ', 0x8B, 0x9B,
            ]
        );
        assert_eq!(encode_char('Ÿ'), Some(0x9F));
        assert_eq!(encode_char('ž'), Some(0x9E));
        // Codes with no glyph in WinAnsi stay unencodable.
        assert_eq!(encode_char('\u{0081}'), None);
    }

    #[test]
    fn high_block_widths_match_afm() {
        assert_eq!(glyph_width(Font::Regular, 0x99), 1000);
        assert_eq!(glyph_width(Font::Regular, 0x8C), 1000);
        assert_eq!(glyph_width(Font::Regular, 0x9C), 944);
        assert_eq!(glyph_width(Font::Regular, 0x9A), 500);
        assert_eq!(glyph_width(Font::Bold, 0x9A), 556);
        assert_eq!(glyph_width(Font::Regular, 0x82), 222);
        assert_eq!(glyph_width(Font::Bold, 0x84), 500);
        assert_eq!(glyph_width(Font::Regular, 0x8B), 333);
    }

    #[test]
    fn unsupported_characters_are_rejected() {
        assert!(encode("狐").is_none());
        assert!(encode("fox 🦊").is_none());
        assert_eq!(encode_lossy("fox 🦊!"), ("fox !".to_string(), b"fox !".to_vec()));
    }

    #[test]
    fn widths_match_afm() {
        assert_eq!(glyph_width(Font::Regular, b' '), 278);
        assert_eq!(glyph_width(Font::Regular, b'W'), 944);
        assert_eq!(glyph_width(Font::Regular, b'i'), 222);
        assert_eq!(glyph_width(Font::Bold, b'i'), 278);
        assert_eq!(glyph_width(Font::Regular, b'~'), 584);
        assert_eq!(glyph_width(Font::Bold, b'@'), 975);
    }

    #[test]
    fn text_width_scales_with_size() {
        // "aa" = 2 × 556 units
        assert!((text_width(Font::Regular, b"aa", 10.0) - 11.12).abs() < 1e-4);
        assert!((text_width(Font::Regular, b"aa", 20.0) - 22.24).abs() < 1e-4);
        assert!(text_width(Font::Bold, b"Title", 12.0) > text_width(Font::Regular, b"Title", 12.0));
    }
}

//! Text helpers for the standard Helvetica fonts
//!
//! The report only uses the 14 standard fonts, so every string is converted
//! to WinAnsi bytes and line breaking works from an average glyph width.

/// Average Helvetica glyph width as a fraction of the font size
const AVG_GLYPH_WIDTH: f32 = 0.5;

pub const PT_PER_MM: f32 = 72.0 / 25.4;

pub fn mm_to_pt(mm: f32) -> f32 {
    mm * PT_PER_MM
}

/// Replace anything outside printable ASCII with `?`
pub fn printable_ascii(text: &str) -> String {
    text.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
        .collect()
}

/// Encode text for a WinAnsi font
///
/// Typographic quotes and dashes fold to ASCII, arrows become `->` with single
/// spaces around them, and unmappable characters become `?`.
pub fn to_win_ansi(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut skip_space = false;

    for c in text.chars() {
        if skip_space && c.is_whitespace() {
            continue;
        }
        skip_space = false;

        match c {
            '→' => {
                while out.last() == Some(&b' ') {
                    out.pop();
                }
                if !out.is_empty() {
                    out.push(b' ');
                }
                out.extend_from_slice(b"-> ");
                skip_space = true;
            }
            '•' => out.push(0x95),
            '€' => out.push(0x80),
            '“' | '”' | '„' => out.push(b'"'),
            '‘' | '’' | '‚' => out.push(b'\''),
            '–' | '—' | '‐' => out.push(b'-'),
            '…' => out.extend_from_slice(b"..."),
            '\t' => out.push(b' '),
            ' '..='~' => out.push(c as u8),
            '\u{a0}'..='\u{ff}' => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }

    out
}

/// Characters per line for a width in millimetres
pub fn chars_per_line(width_mm: f32, font_size: f32) -> usize {
    let glyph = font_size * AVG_GLYPH_WIDTH;
    ((mm_to_pt(width_mm) / glyph).floor() as usize).max(1)
}

/// Greedy word wrap; words longer than a line are split
pub fn wrap_text(text: &str, width_mm: f32, font_size: f32) -> Vec<String> {
    let limit = chars_per_line(width_mm, font_size);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > limit {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(limit);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > limit && current_len > 0 {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += word.len();
        current.extend(word);
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_ascii() {
        assert_eq!(printable_ascii("Résumé v2.pdf"), "R?sum? v2.pdf");
        assert_eq!(printable_ascii("plain.pdf"), "plain.pdf");
    }

    #[test]
    fn test_win_ansi_folding() {
        assert_eq!(to_win_ansi("“quoted” – it’s…"), b"\"quoted\" - it's...".to_vec());
        assert_eq!(to_win_ansi("• item"), vec![0x95, b' ', b'i', b't', b'e', b'm']);
        assert_eq!(to_win_ansi("$10→  $12"), b"$10 -> $12".to_vec());
        assert_eq!(to_win_ansi("café 中"), vec![b'c', b'a', b'f', 0xE9, b' ', b'?']);
    }

    #[test]
    fn test_wrap_text() {
        // 20mm at 10pt: 56.69pt / 5pt = 11 chars
        assert_eq!(chars_per_line(20.0, 10.0), 11);
        assert_eq!(
            wrap_text("the quick brown fox jumps", 20.0, 10.0),
            vec!["the quick", "brown fox", "jumps"]
        );
        assert_eq!(
            wrap_text("abcdefghijklmnopqrstuvwxyz", 20.0, 10.0),
            vec!["abcdefghijk", "lmnopqrstuv", "wxyz"]
        );
        assert!(wrap_text("   ", 20.0, 10.0).is_empty());
    }
}

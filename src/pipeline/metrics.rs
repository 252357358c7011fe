//! Text measurement and line wrapping for the base-14 Helvetica fonts.
//!
//! Widths are the standard Adobe AFM advance widths in 1/1000 em. Only
//! printable ASCII is tabulated; Latin-1 letters are measured as their base
//! letter, which matches the AFM values for every accented glyph except the
//! dotless-i family.

/// Points per millimetre.
pub const PT_PER_MM: f32 = 72.0 / 25.4;

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    // ' '  !    "    #    $    %    &    '    (    )    *    +    ,    -    .    /
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    // 0-9
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    // :    ;    <    =    >    ?    @
    278, 278, 584, 584, 584, 556, 1015,
    // A-Z
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    // [    \    ]    ^    _    `
    278, 278, 278, 469, 556, 333,
    // a-z
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    // {    |    }    ~
    334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

/// Advance width of one character in 1/1000 em.
pub fn char_width(c: char, bold: bool) -> u16 {
    let table = if bold { &HELVETICA_BOLD } else { &HELVETICA };
    let ascii = |c: char| table[(c as usize) - 0x20];
    match c {
        ' '..='~' => ascii(c),
        '\u{A0}' => ascii(' '),
        'ì'..='ï' => 278,
        '¡' => ascii('!'),
        '¿' => ascii('?'),
        '—' => 1000,
        '–' => 556,
        _ => match fold_latin1(c) {
            Some(base) => ascii(base),
            None => 556,
        },
    }
}

fn fold_latin1(c: char) -> Option<char> {
    let base = match c {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ð' => 'D',
        'Ñ' => 'N',
        'Ò'..='Ö' | 'Ø' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' => 'Y',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ñ' => 'n',
        'ò'..='ö' | 'ø' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        _ => return None,
    };
    Some(base)
}

/// Width of `text` in millimetres when set at `size_pt`.
pub fn text_width_mm(text: &str, size_pt: f32, bold: bool) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(char_width(c, bold))).sum();
    units_to_mm(units, size_pt)
}

fn units_to_mm(units: u32, size_pt: f32) -> f32 {
    units as f32 / 1000.0 * size_pt / PT_PER_MM
}

/// Greedy word wrap to `max_width_mm`.
///
/// `\n` is a hard break and an empty source line yields an empty output
/// line. Words wider than the line are split at character boundaries. Every
/// returned line fits, except a single character wider than the whole line,
/// which is emitted on its own.
pub fn wrap_text(text: &str, size_pt: f32, bold: bool, max_width_mm: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for source_line in text.split('\n') {
        wrap_line(source_line, size_pt, bold, max_width_mm, &mut lines);
    }
    lines
}

fn wrap_line(line: &str, size_pt: f32, bold: bool, max_width_mm: f32, out: &mut Vec<String>) {
    let space = text_width_mm(" ", size_pt, bold);
    let mut current = String::new();
    let mut current_width = 0.0_f32;
    let mut emitted = false;

    for word in line.split(' ').filter(|w| !w.is_empty()) {
        let width = text_width_mm(word, size_pt, bold);

        if width > max_width_mm {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
                emitted = true;
            }
            let mut chunks = split_word(word, size_pt, bold, max_width_mm);
            // The tail of a split word keeps filling the next line.
            let tail = chunks.pop().unwrap_or_default();
            emitted |= !chunks.is_empty();
            out.extend(chunks);
            current_width = text_width_mm(&tail, size_pt, bold);
            current = tail;
            continue;
        }

        if current.is_empty() {
            current.push_str(word);
            current_width = width;
        } else if current_width + space + width <= max_width_mm {
            current.push(' ');
            current.push_str(word);
            current_width += space + width;
        } else {
            out.push(std::mem::replace(&mut current, word.to_string()));
            emitted = true;
            current_width = width;
        }
    }

    if !current.is_empty() || !emitted {
        out.push(current);
    }
}

fn split_word(word: &str, size_pt: f32, bold: bool, max_width_mm: f32) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut chunk = String::new();
    let mut units = 0_u32;
    for c in word.chars() {
        let w = u32::from(char_width(c, bold));
        if !chunk.is_empty() && units_to_mm(units + w, size_pt) > max_width_mm {
            chunks.push(std::mem::take(&mut chunk));
            units = 0;
        }
        chunk.push(c);
        units += w;
    }
    if !chunk.is_empty() {
        chunks.push(chunk);
    }
    chunks
}

/// Encode text for a WinAnsi (CP-1252) font.
///
/// Latin-1 maps byte for byte; the dashes and bullet use their CP-1252
/// slots. Anything else becomes `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '—' => 0x97,
            '–' => 0x96,
            '•' => 0x95,
            '€' => 0x80,
            ' '..='~' | '\u{A0}'..='\u{FF}' => c as u8,
            _ => b'?',
        })
        .collect()
}

use crate::types::Pt;

pub const ELLIPSIS: char = '\u{2026}';
pub const PLACEHOLDER: &str = "\u{2014}";

// Standard 14 advance widths (1/1000 em) for printable ASCII 0x20..=0x7E.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, //
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, //
    278, 278, 584, 584, 584, 556, 1015, //
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722,
    667, 611, 722, 667, 944, 667, 667, 611, //
    278, 278, 278, 469, 556, 333, //
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333,
    500, 278, 556, 500, 722, 500, 500, 500, //
    334, 260, 334, 584,
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, //
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, //
    333, 333, 584, 584, 584, 611, 975, //
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778, 722,
    667, 611, 722, 667, 944, 667, 667, 611, //
    333, 278, 333, 584, 556, 333, //
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, 611, 611, 389,
    556, 333, 611, 556, 778, 556, 556, 500, //
    389, 280, 389, 584,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Face {
    Helvetica,
    HelveticaBold,
}

impl Face {
    pub fn base_font(&self) -> &'static str {
        match self {
            Face::Helvetica => "Helvetica",
            Face::HelveticaBold => "Helvetica-Bold",
        }
    }

    pub fn resource_name(&self) -> &'static str {
        match self {
            Face::Helvetica => "CrHelv",
            Face::HelveticaBold => "CrHelvB",
        }
    }

    pub fn from_resource_name(name: &str) -> Option<Face> {
        match name {
            "CrHelv" => Some(Face::Helvetica),
            "CrHelvB" => Some(Face::HelveticaBold),
            _ => None,
        }
    }

    fn advance(&self, ch: char) -> u16 {
        let table = match self {
            Face::Helvetica => &HELVETICA_WIDTHS,
            Face::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
        };
        match ch {
            ' '..='~' => table[(ch as u32 - 0x20) as usize],
            ELLIPSIS | '\u{2014}' => 1000,
            _ => 556,
        }
    }
}

pub trait TextMeasure {
    fn measure(&self, text: &str) -> Pt;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec {
    pub face: Face,
    pub size: Pt,
}

impl FontSpec {
    pub fn regular(size: f32) -> Self {
        Self {
            face: Face::Helvetica,
            size: Pt::from_f32(size),
        }
    }

    pub fn bold(size: f32) -> Self {
        Self {
            face: Face::HelveticaBold,
            size: Pt::from_f32(size),
        }
    }

    pub fn line_height(&self) -> Pt {
        self.size.mul_ratio(6, 5)
    }
}

impl TextMeasure for FontSpec {
    fn measure(&self, text: &str) -> Pt {
        let units: i32 = text
            .chars()
            .map(|ch| self.face.advance(ch) as i32)
            .fold(0i32, |acc, w| acc.saturating_add(w));
        self.size.mul_ratio(units, 1000)
    }
}

/// Maps subscript digits to ASCII and every other non-ASCII code point to `?`.
/// Newlines survive so callers can still split pre-broken text.
pub fn sanitize_ascii(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\u{2080}'..='\u{2089}' => {
                let digit = (ch as u32 - 0x2080) as u8;
                out.push((b'0' + digit) as char);
            }
            '\n' => out.push('\n'),
            '\t' => out.push(' '),
            '\r' => {}
            ' '..='~' => out.push(ch),
            _ => out.push('?'),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fitted {
    pub text: String,
    pub truncated: bool,
}

/// Trims trailing characters until `text` fits `max_width`, appending an
/// ellipsis whenever anything was removed.
pub fn clamp_to_width(text: &str, max_width: Pt, measure: &impl TextMeasure) -> Fitted {
    if measure.measure(text) <= max_width {
        return Fitted {
            text: text.to_string(),
            truncated: false,
        };
    }
    let mut chars: Vec<char> = text.chars().collect();
    loop {
        chars.pop();
        while chars.last().is_some_and(|ch| ch.is_whitespace()) {
            chars.pop();
        }
        let mut candidate: String = chars.iter().collect();
        candidate.push(ELLIPSIS);
        if measure.measure(&candidate) <= max_width {
            return Fitted {
                text: candidate,
                truncated: true,
            };
        }
        if chars.is_empty() {
            return Fitted {
                text: String::new(),
                truncated: true,
            };
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wrapped {
    pub lines: Vec<String>,
    pub dropped_lines: usize,
    pub clamped_words: usize,
}

impl Wrapped {
    pub fn is_lossy(&self) -> bool {
        self.dropped_lines > 0 || self.clamped_words > 0
    }
}

/// Greedy word wrap. Existing newlines start new lines and blank input lines
/// stay blank; lines past `max_lines` are dropped and only the non-blank ones
/// counted.
pub fn wrap_text(
    text: &str,
    max_width: Pt,
    measure: &impl TextMeasure,
    max_lines: usize,
) -> Wrapped {
    let mut lines: Vec<String> = Vec::new();
    let mut clamped_words = 0usize;
    for paragraph in text.split('\n') {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if measure.measure(&candidate) <= max_width {
                line = candidate;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            let fitted = clamp_to_width(word, max_width, measure);
            if fitted.truncated {
                clamped_words += 1;
                lines.push(fitted.text);
            } else {
                line = fitted.text;
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    let dropped_lines = lines
        .iter()
        .skip(max_lines)
        .filter(|line| !line.is_empty())
        .count();
    lines.truncate(max_lines);
    Wrapped {
        lines,
        dropped_lines,
        clamped_words,
    }
}

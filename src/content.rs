use crate::canvas::{Command, Page};
use crate::text::Face;
use crate::types::{Color, Pt};
use std::collections::BTreeSet;

/// Resources a serialized page refers to. Callers register these on the
/// Form XObject that wraps the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsedResources {
    pub fonts: BTreeSet<Face>,
    pub images: BTreeSet<String>,
}

pub struct PageContent {
    pub bytes: Vec<u8>,
    pub resources: UsedResources,
    pub replaced_chars: usize,
}

/// Serializes one overlay page. Coordinates are already PDF user space.
pub fn render_page(page: &Page) -> PageContent {
    let mut out = String::new();
    let mut resources = UsedResources::default();
    let mut replaced_chars = 0usize;
    let mut font: Option<(Face, Pt)> = None;

    for cmd in &page.commands {
        match cmd {
            Command::Meta { .. } => {}
            Command::SaveState => out.push_str("q\n"),
            Command::RestoreState => out.push_str("Q\n"),
            Command::SetFillColor(color) => out.push_str(&color_fill(*color)),
            Command::SetStrokeColor(color) => out.push_str(&color_stroke(*color)),
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetFont { face, size } => font = Some((*face, *size)),
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(*y)));
            }
            Command::LineTo { x, y } => {
                out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(*y)));
            }
            Command::Fill => out.push_str("f\n"),
            Command::Stroke => out.push_str("S\n"),
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re\n",
                    fmt_pt(*x),
                    fmt_pt(*y),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::DrawString { x, y, text } => {
                let (face, size) = font.unwrap_or((Face::Helvetica, Pt::from_i32(10)));
                resources.fonts.insert(face);
                let encoded = encode_winansi_pdf_string(text);
                replaced_chars += encoded.replaced;
                out.push_str("BT\n");
                out.push_str(&format!("/{} {} Tf\n", face.resource_name(), fmt_pt(size)));
                out.push_str(&format!("{} {} Td\n", fmt_pt(*x), fmt_pt(*y)));
                out.push_str(&format!("({}) Tj\n", encoded.text));
                out.push_str("ET\n");
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                resources.images.insert(resource_id.clone());
                out.push_str("q\n");
                out.push_str(&format!(
                    "{} 0 0 {} {} {} cm\n",
                    fmt_pt(*width),
                    fmt_pt(*height),
                    fmt_pt(*x),
                    fmt_pt(*y)
                ));
                out.push_str(&format!("/{} Do\n", resource_id));
                out.push_str("Q\n");
            }
        }
    }

    PageContent {
        bytes: out.into_bytes(),
        resources,
        replaced_chars,
    }
}

fn color_fill(color: Color) -> String {
    format!("{} {} {} rg\n", fmt(color.r), fmt(color.g), fmt(color.b))
}

fn color_stroke(color: Color) -> String {
    format!("{} {} {} RG\n", fmt(color.r), fmt(color.g), fmt(color.b))
}

pub(crate) struct WinAnsiEncoded {
    pub text: String,
    pub replaced: usize,
}

/// Encodes to a WinAnsi literal string body (without the surrounding parens).
pub(crate) fn encode_winansi_pdf_string(input: &str) -> WinAnsiEncoded {
    let mut out = String::new();
    let mut replaced = 0usize;
    for ch in input.chars() {
        let byte = match ch {
            '\u{0000}'..='\u{007F}' => ch as u8,
            '\u{00A0}'..='\u{00FF}' => ch as u8,
            '\u{20AC}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            _ => {
                replaced += 1;
                b'?'
            }
        };
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if b < 0x20 || b >= 0x7f => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }
    WinAnsiEncoded {
        text: out,
        replaced,
    }
}

pub(crate) fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    format_milli(Pt::from_f32(value).to_milli_i64())
}

pub(crate) fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        return format!("{}{}", sign, int_part);
    }
    let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
    while s.ends_with('0') {
        s.pop();
    }
    s
}

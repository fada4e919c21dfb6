use crate::canvas::Canvas;
use crate::field::{FieldMap, ValueFormat, resolve_as};
use crate::text::{FontSpec, PLACEHOLDER, clamp_to_width, sanitize_ascii, wrap_text};
use crate::types::{Color, Pt, Rect};
use certrender_report::{CompletenessReport, FieldOutcome};

/// Where one domain key is drawn on a plain page. `y` is the first baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub key: &'static str,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub font_size: f32,
    pub max_lines: Option<usize>,
    pub bold: bool,
    pub format: ValueFormat,
}

impl Coord {
    pub const fn new(key: &'static str, x: f32, y: f32, width: f32) -> Self {
        Self {
            key,
            x,
            y,
            width,
            font_size: 9.0,
            max_lines: None,
            bold: false,
            format: ValueFormat::Plain,
        }
    }

    pub const fn lines(mut self, max_lines: usize) -> Self {
        self.max_lines = Some(max_lines);
        self
    }

    pub const fn size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }

    pub const fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub const fn yes_no(mut self) -> Self {
        self.format = ValueFormat::YesNo;
        self
    }

    fn font(&self) -> FontSpec {
        if self.bold {
            FontSpec::bold(self.font_size)
        } else {
            FontSpec::regular(self.font_size)
        }
    }
}

/// Static page furniture, drawn once per page before any value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChromeItem {
    Title { text: &'static str, x: f32, y: f32, size: f32 },
    Label { text: &'static str, x: f32, y: f32 },
    Rule { x0: f32, x1: f32, y: f32 },
    Outline { x: f32, y: f32, width: f32, height: f32 },
    Band { x: f32, y: f32, width: f32, height: f32 },
}

pub fn draw_chrome(canvas: &mut Canvas, items: &[ChromeItem]) {
    for item in items {
        match *item {
            ChromeItem::Title { text, x, y, size } => {
                canvas.set_fill_color(Color::BLACK);
                canvas.draw_text(
                    FontSpec::bold(size),
                    Pt::from_f32(x),
                    Pt::from_f32(y),
                    text,
                );
            }
            ChromeItem::Label { text, x, y } => {
                canvas.set_fill_color(Color::LABEL);
                canvas.draw_text(FontSpec::regular(7.5), Pt::from_f32(x), Pt::from_f32(y), text);
                canvas.set_fill_color(Color::BLACK);
            }
            ChromeItem::Rule { x0, x1, y } => {
                canvas.set_stroke_color(Color::RULE);
                canvas.set_line_width(Pt::from_f32(0.5));
                canvas.hline(Pt::from_f32(x0), Pt::from_f32(x1), Pt::from_f32(y));
                canvas.set_stroke_color(Color::BLACK);
            }
            ChromeItem::Outline {
                x,
                y,
                width,
                height,
            } => {
                canvas.set_stroke_color(Color::RULE);
                canvas.set_line_width(Pt::from_f32(0.75));
                canvas.stroke_rect(Rect::new(x, y, width, height));
                canvas.set_stroke_color(Color::BLACK);
            }
            ChromeItem::Band {
                x,
                y,
                width,
                height,
            } => canvas.fill_rect(Rect::new(x, y, width, height), Color::BAND),
        }
    }
}

/// Sanitizes, fits and draws `text` at `coord`. Single-line coordinates clamp
/// with an ellipsis; multi-line ones wrap and drop overflow lines.
pub fn draw_text_at(canvas: &mut Canvas, coord: &Coord, text: &str, preview: bool) -> FieldOutcome {
    let font = coord.font();
    let x = Pt::from_f32(coord.x);
    let y = Pt::from_f32(coord.y);
    let width = Pt::from_f32(coord.width);
    let clean = sanitize_ascii(text);
    if clean.trim().is_empty() {
        if preview {
            canvas.draw_text(font, x, y, PLACEHOLDER);
            return FieldOutcome::Placeholder;
        }
        return FieldOutcome::LeftBlank;
    }
    match coord.max_lines {
        Some(max_lines) if max_lines > 1 => {
            let wrapped = wrap_text(&clean, width, &font, max_lines);
            let line_height = font.line_height();
            for (idx, line) in wrapped.lines.iter().enumerate() {
                if !line.is_empty() {
                    canvas.draw_text(font, x, y - line_height * idx as i32, line.as_str());
                }
            }
            if wrapped.is_lossy() {
                FieldOutcome::Truncated
            } else {
                FieldOutcome::Written
            }
        }
        _ => {
            let line = clean
                .split('\n')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            let fitted = clamp_to_width(&line, width, &font);
            canvas.draw_text(font, x, y, fitted.text);
            if fitted.truncated {
                FieldOutcome::Truncated
            } else {
                FieldOutcome::Written
            }
        }
    }
}

/// Draws every coordinate-table entry on the canvas's current page.
pub fn draw_coordinates(
    canvas: &mut Canvas,
    table: &[Coord],
    fields: &FieldMap,
    preview: bool,
    report: &mut CompletenessReport,
) {
    for coord in table {
        let text = resolve_as(fields.get(coord.key), 1, coord.format)
            .into_iter()
            .next()
            .unwrap_or_default();
        let outcome = draw_text_at(canvas, coord, &text, preview);
        report.record_field(coord.key, format!("@{},{}", coord.x, coord.y), outcome);
    }
}

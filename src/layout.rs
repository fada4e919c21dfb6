use crate::canvas::Canvas;
use crate::field::{FieldMap, ValueFormat, resolve_as};
use crate::text::{FontSpec, PLACEHOLDER, clamp_to_width, sanitize_ascii};
use crate::types::{Color, Margins, Pt, Rect, Size};
use certrender_report::{CompletenessReport, FieldOutcome};

const LABEL_SIZE: f32 = 7.5;
const VALUE_SIZE: f32 = 9.5;
const HEADING_SIZE: f32 = 11.0;
const BOX_PADDING: f32 = 3.0;
const ROW_GAP: f32 = 8.0;

/// One labelled box in a row.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxEntry {
    pub label: String,
    pub value: String,
    pub width: Pt,
    pub height: Pt,
}

impl BoxEntry {
    pub fn new(label: impl Into<String>, value: impl Into<String>, width: f32, height: f32) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            width: Pt::from_f32(width),
            height: Pt::from_f32(height),
        }
    }
}

/// Top-down flow cursor over PDF user space. `y` is the top edge of the next
/// block; it only decreases until a page break resets it.
pub struct Layout {
    page_size: Size,
    margins: Margins,
    spacing: Pt,
    preview: bool,
    y: Pt,
    label_font: FontSpec,
    value_font: FontSpec,
}

impl Layout {
    pub fn new(page_size: Size, margins: Margins, preview: bool) -> Self {
        Self {
            page_size,
            margins,
            spacing: Pt::from_f32(6.0),
            preview,
            y: page_size.height - margins.top,
            label_font: FontSpec::regular(LABEL_SIZE),
            value_font: FontSpec::regular(VALUE_SIZE),
        }
    }

    pub fn cursor_y(&self) -> Pt {
        self.y
    }

    pub fn left(&self) -> Pt {
        self.margins.left
    }

    pub fn content_width(&self) -> Pt {
        self.page_size.width - self.margins.left - self.margins.right
    }

    pub fn bottom(&self) -> Pt {
        self.margins.bottom
    }

    fn label_band(&self) -> Pt {
        self.label_font.line_height() + Pt::from_f32(1.5)
    }

    fn advance(&mut self, by: Pt) {
        self.y -= by.max(Pt::from_f32(0.001));
    }

    /// Breaks to a fresh page when the cursor has dropped below `min_y`.
    pub fn ensure_space(
        &mut self,
        canvas: &mut Canvas,
        min_y: Pt,
        on_break: Option<&mut dyn FnMut(&mut Layout, &mut Canvas)>,
    ) -> bool {
        if self.y >= min_y {
            return false;
        }
        canvas.show_page();
        self.y = self.page_size.height - self.margins.top;
        if let Some(callback) = on_break {
            callback(self, canvas);
        }
        true
    }

    /// Same as `ensure_space` with the threshold expressed as needed height.
    pub fn ensure_room(
        &mut self,
        canvas: &mut Canvas,
        height: Pt,
        on_break: Option<&mut dyn FnMut(&mut Layout, &mut Canvas)>,
    ) -> bool {
        let min_y = self.margins.bottom + height;
        self.ensure_space(canvas, min_y, on_break)
    }

    pub fn heading(&mut self, canvas: &mut Canvas, text: &str) {
        let font = FontSpec::bold(HEADING_SIZE);
        let baseline = self.y - font.size;
        canvas.draw_text(font, self.margins.left, baseline, sanitize_ascii(text));
        let rule_y = baseline - Pt::from_f32(3.0);
        canvas.set_stroke_color(Color::RULE);
        canvas.set_line_width(Pt::from_f32(0.75));
        canvas.hline(self.margins.left, self.margins.left + self.content_width(), rule_y);
        canvas.set_stroke_color(Color::BLACK);
        self.advance(font.line_height() + Pt::from_f32(3.0) + self.spacing);
    }

    pub fn field_box(&mut self, canvas: &mut Canvas, entry: &BoxEntry) -> FieldOutcome {
        let outcome = self.draw_box(canvas, self.margins.left, entry);
        self.advance(self.label_band() + entry.height + self.spacing);
        outcome
    }

    /// Lays entries left to right on one baseline and advances once by the
    /// tallest entry.
    pub fn field_row(&mut self, canvas: &mut Canvas, entries: &[BoxEntry]) -> Vec<FieldOutcome> {
        let mut x = self.margins.left;
        let mut tallest = Pt::ZERO;
        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            outcomes.push(self.draw_box(canvas, x, entry));
            x += entry.width + Pt::from_f32(ROW_GAP);
            tallest = tallest.max(entry.height);
        }
        if !entries.is_empty() {
            self.advance(self.label_band() + tallest + self.spacing);
        }
        outcomes
    }

    fn draw_box(&self, canvas: &mut Canvas, x: Pt, entry: &BoxEntry) -> FieldOutcome {
        let label_baseline = self.y - self.label_font.size;
        canvas.set_fill_color(Color::LABEL);
        canvas.draw_text(self.label_font, x, label_baseline, sanitize_ascii(&entry.label));
        canvas.set_fill_color(Color::BLACK);

        let top = self.y - self.label_band();
        let rect = Rect {
            x,
            y: top - entry.height,
            width: entry.width,
            height: entry.height,
        };
        canvas.set_stroke_color(Color::RULE);
        canvas.set_line_width(Pt::from_f32(0.5));
        canvas.stroke_rect(rect);
        canvas.set_stroke_color(Color::BLACK);

        let padding = Pt::from_f32(BOX_PADDING);
        let inner = entry.width - padding * 2;
        let baseline = top - padding - self.value_font.size;
        let text = single_line(&entry.value);
        if text.is_empty() {
            if self.preview {
                canvas.draw_text(self.value_font, x + padding, baseline, PLACEHOLDER);
                return FieldOutcome::Placeholder;
            }
            return FieldOutcome::LeftBlank;
        }
        let fitted = clamp_to_width(&text, inner, &self.value_font);
        canvas.draw_text(self.value_font, x + padding, baseline, fitted.text);
        if fitted.truncated {
            FieldOutcome::Truncated
        } else {
            FieldOutcome::Written
        }
    }

    /// Bordered block of fixed height. Existing lines are drawn top-down with no
    /// re-wrapping; lines past the box capacity are dropped.
    pub fn paragraph_box(
        &mut self,
        canvas: &mut Canvas,
        label: &str,
        text: &str,
        height: Pt,
    ) -> FieldOutcome {
        let x = self.margins.left;
        let width = self.content_width();
        canvas.set_fill_color(Color::LABEL);
        canvas.draw_text(
            self.label_font,
            x,
            self.y - self.label_font.size,
            sanitize_ascii(label),
        );
        canvas.set_fill_color(Color::BLACK);
        let top = self.y - self.label_band();
        canvas.set_stroke_color(Color::RULE);
        canvas.set_line_width(Pt::from_f32(0.5));
        canvas.stroke_rect(Rect {
            x,
            y: top - height,
            width,
            height,
        });
        canvas.set_stroke_color(Color::BLACK);

        let padding = Pt::from_f32(BOX_PADDING);
        let line_height = self.value_font.line_height();
        let capacity = {
            let usable = (height - padding * 2).to_milli_i64().max(0);
            (usable / line_height.to_milli_i64().max(1)) as usize
        };
        let clean = sanitize_ascii(text);
        let lines: Vec<&str> = clean
            .split('\n')
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .collect();

        let outcome = if lines.is_empty() {
            if self.preview {
                canvas.draw_text(
                    self.value_font,
                    x + padding,
                    top - padding - self.value_font.size,
                    PLACEHOLDER,
                );
                FieldOutcome::Placeholder
            } else {
                FieldOutcome::LeftBlank
            }
        } else {
            let mut truncated = lines.len() > capacity;
            for (idx, line) in lines.iter().take(capacity).enumerate() {
                let baseline = top - padding - self.value_font.size - line_height * idx as i32;
                let fitted = clamp_to_width(line, width - padding * 2, &self.value_font);
                truncated |= fitted.truncated;
                canvas.draw_text(self.value_font, x + padding, baseline, fitted.text);
            }
            if truncated {
                FieldOutcome::Truncated
            } else {
                FieldOutcome::Written
            }
        };
        self.advance(self.label_band() + height + self.spacing);
        outcome
    }

    /// Reserves an outlined area for later content (signatures, images) and
    /// returns it with the page it landed on.
    pub fn reserve_box(
        &mut self,
        canvas: &mut Canvas,
        label: &str,
        x_offset: Pt,
        width: Pt,
        height: Pt,
        advance: bool,
    ) -> (usize, Rect) {
        let x = self.margins.left + x_offset;
        canvas.set_fill_color(Color::LABEL);
        canvas.draw_text(
            self.label_font,
            x,
            self.y - self.label_font.size,
            sanitize_ascii(label),
        );
        canvas.set_fill_color(Color::BLACK);
        let top = self.y - self.label_band();
        let rect = Rect {
            x,
            y: top - height,
            width,
            height,
        };
        canvas.set_stroke_color(Color::RULE);
        canvas.set_line_width(Pt::from_f32(0.5));
        canvas.stroke_rect(rect);
        canvas.set_stroke_color(Color::BLACK);
        if advance {
            self.advance(self.label_band() + height + self.spacing);
        }
        (canvas.page_index(), rect)
    }

    pub fn box_height_with_label(&self, height: Pt) -> Pt {
        self.label_band() + height + self.spacing
    }
}

fn single_line(text: &str) -> String {
    sanitize_ascii(text)
        .split('\n')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Declarative field box inside a flow row.
#[derive(Debug, Clone, Copy)]
pub struct BoxSpec {
    pub label: &'static str,
    pub key: &'static str,
    pub width: f32,
    pub height: f32,
    pub format: ValueFormat,
}

impl BoxSpec {
    pub const fn new(label: &'static str, key: &'static str, width: f32) -> Self {
        Self {
            label,
            key,
            width,
            height: 16.0,
            format: ValueFormat::Plain,
        }
    }

    pub const fn yes_no(mut self) -> Self {
        self.format = ValueFormat::YesNo;
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AreaSpec {
    pub slot: &'static str,
    pub key: &'static str,
    pub label: &'static str,
    pub x_offset: f32,
    pub width: f32,
    pub height: f32,
}

/// Flow recipe for templateless documents.
#[derive(Debug, Clone, Copy)]
pub enum FlowItem {
    Heading(&'static str),
    Row(&'static [BoxSpec]),
    Paragraph {
        label: &'static str,
        key: &'static str,
        height: f32,
    },
    /// Outlined areas sharing one band, filled after the table.
    Areas(&'static [AreaSpec]),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReservedArea {
    pub slot: &'static str,
    pub key: &'static str,
    pub page: usize,
    pub rect: Rect,
}

/// Draws `items` top-down, breaking pages as needed and repeating
/// `continuation` as a heading on every new page.
pub fn draw_flow(
    layout: &mut Layout,
    canvas: &mut Canvas,
    items: &[FlowItem],
    fields: &FieldMap,
    continuation: &str,
    report: &mut CompletenessReport,
) -> Vec<ReservedArea> {
    let mut reserved = Vec::new();
    let mut on_break = |layout: &mut Layout, canvas: &mut Canvas| {
        layout.heading(canvas, continuation);
    };
    for item in items {
        match item {
            FlowItem::Heading(text) => {
                // A section heading opening a page stands in for the
                // continuation heading.
                let needed = Pt::from_f32(HEADING_SIZE * 4.0);
                layout.ensure_room(canvas, needed, None);
                layout.heading(canvas, text);
            }
            FlowItem::Row(specs) => {
                let tallest = specs.iter().map(|s| s.height).fold(0.0f32, f32::max);
                let needed = layout.box_height_with_label(Pt::from_f32(tallest));
                layout.ensure_room(canvas, needed, Some(&mut on_break));
                let entries: Vec<BoxEntry> = specs
                    .iter()
                    .map(|spec| {
                        let value = resolve_as(fields.get(spec.key), 1, spec.format)
                            .into_iter()
                            .next()
                            .unwrap_or_default();
                        BoxEntry::new(spec.label, value, spec.width, spec.height)
                    })
                    .collect();
                let outcomes = layout.field_row(canvas, &entries);
                for (spec, outcome) in specs.iter().zip(outcomes) {
                    report.record_field(spec.key, spec.key, outcome);
                }
            }
            FlowItem::Paragraph { label, key, height } => {
                let height = Pt::from_f32(*height);
                let needed = layout.box_height_with_label(height);
                layout.ensure_room(canvas, needed, Some(&mut on_break));
                let text = fields.get(key).display();
                let outcome = layout.paragraph_box(canvas, label, &text, height);
                report.record_field(*key, *key, outcome);
            }
            FlowItem::Areas(areas) => {
                let tallest = areas.iter().map(|a| a.height).fold(0.0f32, f32::max);
                let needed = layout.box_height_with_label(Pt::from_f32(tallest));
                layout.ensure_room(canvas, needed, Some(&mut on_break));
                for (idx, area) in areas.iter().enumerate() {
                    let last = idx + 1 == areas.len();
                    let (page, rect) = layout.reserve_box(
                        canvas,
                        area.label,
                        Pt::from_f32(area.x_offset),
                        Pt::from_f32(area.width),
                        Pt::from_f32(area.height),
                        false,
                    );
                    reserved.push(ReservedArea {
                        slot: area.slot,
                        key: area.key,
                        page,
                        rect,
                    });
                    if last {
                        layout.advance(layout.box_height_with_label(Pt::from_f32(tallest)));
                    }
                }
            }
        }
    }
    reserved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(preview: bool) -> (Layout, Canvas) {
        (
            Layout::new(Size::a4(), Margins::all(36.0), preview),
            Canvas::new(Size::a4()),
        )
    }

    #[test]
    fn field_box_advances_cursor_by_box_and_spacing() {
        let (mut layout, mut canvas) = layout(false);
        let start = layout.cursor_y();
        let outcome = layout.field_box(&mut canvas, &BoxEntry::new("Name", "Priya", 200.0, 18.0));
        assert_eq!(outcome, FieldOutcome::Written);
        assert!(layout.cursor_y() < start);
        assert_eq!(
            start - layout.cursor_y(),
            layout.box_height_with_label(Pt::from_f32(18.0))
        );
    }

    #[test]
    fn empty_value_shows_placeholder_only_in_preview() {
        let (mut preview, mut canvas) = layout(true);
        let outcome = preview.field_box(&mut canvas, &BoxEntry::new("Name", "", 200.0, 18.0));
        assert_eq!(outcome, FieldOutcome::Placeholder);
        assert!(canvas.finish().pages[0].texts().any(|t| t == PLACEHOLDER));

        let (mut final_layout, mut canvas) = layout(false);
        let outcome = final_layout.field_box(&mut canvas, &BoxEntry::new("Name", "", 200.0, 18.0));
        assert_eq!(outcome, FieldOutcome::LeftBlank);
        assert!(!canvas.finish().pages[0].texts().any(|t| t == PLACEHOLDER));
    }

    #[test]
    fn field_row_advances_once_by_tallest_entry() {
        let (mut layout, mut canvas) = layout(false);
        let start = layout.cursor_y();
        layout.field_row(
            &mut canvas,
            &[
                BoxEntry::new("A", "1", 100.0, 16.0),
                BoxEntry::new("B", "2", 100.0, 30.0),
            ],
        );
        assert_eq!(
            start - layout.cursor_y(),
            layout.box_height_with_label(Pt::from_f32(30.0))
        );
    }

    #[test]
    fn paragraph_drops_lines_past_capacity() {
        let (mut layout, mut canvas) = layout(false);
        let outcome = layout.paragraph_box(
            &mut canvas,
            "Notes",
            "one\ntwo\nthree\nfour\nfive",
            Pt::from_f32(30.0),
        );
        assert_eq!(outcome, FieldOutcome::Truncated);
        let doc = canvas.finish();
        let texts: Vec<&str> = doc.pages[0].texts().collect();
        assert!(texts.contains(&"one"));
        assert!(!texts.contains(&"five"));
    }

    #[test]
    fn ensure_space_breaks_and_runs_continuation() {
        let (mut layout, mut canvas) = layout(false);
        let mut calls = 0;
        let mut on_break = |layout: &mut Layout, canvas: &mut Canvas| {
            calls += 1;
            layout.heading(canvas, "Continued");
        };
        assert!(!layout.ensure_space(&mut canvas, Pt::from_f32(100.0), Some(&mut on_break)));
        let tall = Pt::from_f32(2000.0);
        assert!(layout.ensure_room(&mut canvas, tall, Some(&mut on_break)));
        assert_eq!(canvas.page_index(), 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn cursor_strictly_decreases_within_a_page() {
        let (mut layout, mut canvas) = layout(false);
        let mut last = layout.cursor_y();
        for _ in 0..5 {
            layout.field_box(&mut canvas, &BoxEntry::new("L", "", 100.0, 0.0));
            assert!(layout.cursor_y() < last);
            last = layout.cursor_y();
        }
    }

    #[test]
    fn heading_that_breaks_the_page_replaces_continuation_heading() {
        const ITEMS: &[FlowItem] = &[
            FlowItem::Paragraph {
                label: "Notes",
                key: "notes",
                height: 740.0,
            },
            FlowItem::Heading("Sign-off"),
        ];
        let (mut layout, mut canvas) = layout(false);
        let mut report = CompletenessReport::new("job_sheet", "flow");
        draw_flow(
            &mut layout,
            &mut canvas,
            ITEMS,
            &FieldMap::new(),
            "Job Sheet (continued)",
            &mut report,
        );
        let doc = canvas.finish();
        assert_eq!(doc.pages.len(), 2);
        let second: Vec<&str> = doc.pages[1].texts().collect();
        assert_eq!(second, vec!["Sign-off"]);
    }
}

use crate::acroform::{FormIndex, WidgetKind, clone_page_with_widgets, mirror_values};
use crate::canvas::Canvas;
use crate::error::RenderError;
use crate::field::{FieldMap, FieldValue, FilledSet, ValueFormat, resolve_as};
use crate::form::write_field;
use crate::freehand::{ChromeItem, draw_chrome};
use crate::text::{FontSpec, PLACEHOLDER, clamp_to_width, sanitize_ascii};
use crate::types::{Color, Pt, Rect};
use certrender_report::{CompletenessReport, FieldOutcome, TableSummary};
use chrono::NaiveDate;
use lopdf::{Document as LoDocument, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Range;

pub trait TableRow {
    fn cell(&self, key: &str) -> FieldValue;
}

impl TableRow for FieldMap {
    fn cell(&self, key: &str) -> FieldValue {
        self.get(key).clone()
    }
}

/// One inspected appliance. Rows render in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplianceRow {
    pub location: Option<String>,
    pub appliance_type: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub owned_by_landlord: Option<bool>,
    pub inspected: Option<bool>,
    pub flue_type: Option<String>,
    pub operating_pressure: Option<String>,
    pub heat_input: Option<String>,
    pub co_reading: Option<String>,
    pub co2_ratio: Option<String>,
    pub safety_device_ok: Option<bool>,
    pub ventilation_ok: Option<bool>,
    pub flue_ok: Option<bool>,
    pub safe_to_use: Option<bool>,
    pub serviced_on: Option<NaiveDate>,
}

impl ApplianceRow {
    pub fn from_json_list(raw: &str) -> Result<Vec<ApplianceRow>, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl TableRow for ApplianceRow {
    fn cell(&self, key: &str) -> FieldValue {
        match key {
            "location" => self.location.clone().into(),
            "appliance_type" => self.appliance_type.clone().into(),
            "make" => self.make.clone().into(),
            "model" => self.model.clone().into(),
            "make_model" => {
                let joined = [self.make.as_deref(), self.model.as_deref()]
                    .into_iter()
                    .flatten()
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                FieldValue::text(joined)
            }
            "owned_by_landlord" => self.owned_by_landlord.into(),
            "inspected" => self.inspected.into(),
            "flue_type" => self.flue_type.clone().into(),
            "operating_pressure" => self.operating_pressure.clone().into(),
            "heat_input" => self.heat_input.clone().into(),
            "co_reading" => self.co_reading.clone().into(),
            "co2_ratio" => self.co2_ratio.clone().into(),
            "safety_device_ok" => self.safety_device_ok.into(),
            "ventilation_ok" => self.ventilation_ok.into(),
            "flue_ok" => self.flue_ok.into(),
            "safe_to_use" => self.safe_to_use.into(),
            "serviced_on" => self.serviced_on.into(),
            _ => FieldValue::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub key: &'static str,
    pub header: &'static str,
    /// Widget name with `{n}` standing for the 1-based row slot.
    pub field: &'static str,
    pub x: f32,
    pub width: f32,
    pub format: ValueFormat,
}

impl Column {
    pub const fn new(
        key: &'static str,
        header: &'static str,
        field: &'static str,
        x: f32,
        width: f32,
    ) -> Self {
        Self {
            key,
            header,
            field,
            x,
            width,
            format: ValueFormat::Plain,
        }
    }

    pub const fn yes_no(mut self) -> Self {
        self.format = ValueFormat::YesNo;
        self
    }

    pub fn field_name(&self, slot: usize, suffix: &str) -> String {
        format!("{}{}", self.field.replace("{n}", &slot.to_string()), suffix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableSpec {
    pub columns: &'static [Column],
    pub rows_per_page: usize,
    /// Top edge of the header band on the first table page (freehand).
    pub first_top: f32,
    /// Top edge of the header band on continuation pages (freehand).
    pub continuation_top: f32,
    pub row_height: f32,
    pub font_size: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStrategy {
    FormField,
    Freehand,
}

impl TableStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStrategy::FormField => "form_field",
            TableStrategy::Freehand => "freehand",
        }
    }
}

/// Splits `rows` into consecutive page chunks of at most `per_page`. Every
/// index lands in exactly one chunk.
pub fn paginate(rows: usize, per_page: usize) -> Vec<Range<usize>> {
    let per_page = per_page.max(1);
    (0..rows)
        .step_by(per_page)
        .map(|start| start..(start + per_page).min(rows))
        .collect()
}

/// Form-field rows when the first row's widgets exist on the template,
/// freehand grid otherwise.
pub fn select_strategy(spec: &TableSpec, index: Option<&FormIndex>) -> TableStrategy {
    let Some(index) = index else {
        return TableStrategy::Freehand;
    };
    let has_first_row = spec
        .columns
        .iter()
        .any(|column| !matches!(index.kind(&column.field_name(1, "")), WidgetKind::Missing));
    if has_first_row {
        TableStrategy::FormField
    } else {
        TableStrategy::Freehand
    }
}

fn cell_text(row: &dyn TableRow, column: &Column) -> String {
    resolve_as(&row.cell(column.key), 1, column.format)
        .into_iter()
        .next()
        .unwrap_or_default()
}

fn summary(strategy: TableStrategy, chunks: &[Range<usize>]) -> TableSummary {
    TableSummary {
        strategy: strategy.as_str().to_string(),
        rows_rendered: chunks.iter().map(|chunk| chunk.len()).sum(),
        pages_used: chunks.len().max(1),
        rows_per_page: chunks.iter().map(|chunk| chunk.len()).collect(),
    }
}

pub fn continuation_suffix(page_number: usize) -> String {
    format!("_p{}", page_number)
}

/// Populates row widgets, cloning `table_page` for each continuation chunk.
/// Non-row fields on a clone receive the values already written on the
/// original page.
///
/// In preview, blank cells of present rows join `placeholders`, and so does
/// every clone of a widget already in it. Unused row slots stay empty.
#[allow(clippy::too_many_arguments)]
pub fn fill_form_table<R: TableRow>(
    doc: &mut LoDocument,
    index: &mut FormIndex,
    table_page: ObjectId,
    spec: &TableSpec,
    rows: &[R],
    preview: bool,
    filled: &mut FilledSet,
    placeholders: &mut BTreeSet<String>,
    report: &mut CompletenessReport,
) -> Result<TableSummary, RenderError> {
    let chunks = paginate(rows.len(), spec.rows_per_page);
    let row_fields: BTreeSet<String> = (1..=spec.rows_per_page.max(1))
        .flat_map(|slot| spec.columns.iter().map(move |column| column.field_name(slot, "")))
        .collect();
    let header_placeholders: Vec<String> = placeholders
        .iter()
        .filter(|name| !row_fields.contains(name.as_str()))
        .cloned()
        .collect();

    let mut anchor = table_page;
    for (chunk_no, chunk) in chunks.iter().enumerate() {
        let suffix = if chunk_no == 0 {
            String::new()
        } else {
            let suffix = continuation_suffix(chunk_no + 1);
            anchor = clone_page_with_widgets(doc, index, table_page, anchor, &suffix)?;
            *index = FormIndex::build(doc);
            mirror_values(doc, index, &suffix, |base| row_fields.contains(base))?;
            for base in &header_placeholders {
                let twin = format!("{base}{suffix}");
                if matches!(index.kind(&twin), WidgetKind::Text { .. }) {
                    placeholders.insert(twin);
                }
            }
            suffix
        };
        for (slot_idx, row_idx) in chunk.clone().enumerate() {
            let row = &rows[row_idx];
            for column in spec.columns {
                let name = column.field_name(slot_idx + 1, &suffix);
                let text = cell_text(row, column);
                let key = format!("row{}.{}", row_idx + 1, column.key);
                let mut outcome = write_field(doc, index, &name, &text, filled);
                if preview
                    && outcome == FieldOutcome::LeftBlank
                    && !filled.is_filled(&name)
                    && matches!(index.kind(&name), WidgetKind::Text { .. })
                {
                    placeholders.insert(name.clone());
                    outcome = FieldOutcome::Placeholder;
                }
                report.record_field(key, name, outcome);
            }
        }
    }
    Ok(summary(TableStrategy::FormField, &chunks))
}

/// Draws a ruled grid with per-cell text. The first chunk goes on
/// `first_page`; continuation chunks use consecutive pages starting at
/// `continuation_start`, each with `chrome` redrawn first. Blank cells show
/// the placeholder in preview.
#[allow(clippy::too_many_arguments)]
pub fn draw_freehand_table<R: TableRow>(
    canvas: &mut Canvas,
    spec: &TableSpec,
    rows: &[R],
    first_page: usize,
    continuation_start: usize,
    chrome: &[ChromeItem],
    preview: bool,
    report: &mut CompletenessReport,
) -> TableSummary {
    let chunks = paginate(rows.len(), spec.rows_per_page);
    if chunks.is_empty() {
        canvas.goto_page(first_page);
        draw_grid(canvas, spec, spec.first_top, 0);
    }
    for (chunk_no, chunk) in chunks.iter().enumerate() {
        let top = if chunk_no == 0 {
            canvas.goto_page(first_page);
            spec.first_top
        } else {
            canvas.goto_page(continuation_start + chunk_no - 1);
            draw_chrome(canvas, chrome);
            spec.continuation_top
        };
        canvas.meta("table.chunk", chunk_no.to_string());
        draw_grid(canvas, spec, top, chunk.len());

        let font = FontSpec::regular(spec.font_size);
        let header_height = Pt::from_f32(spec.row_height);
        let row_height = Pt::from_f32(spec.row_height);
        for (slot_idx, row_idx) in chunk.clone().enumerate() {
            let row_top = Pt::from_f32(top) - header_height - row_height * slot_idx as i32;
            let baseline = row_top - row_height + (row_height - font.size) / 2
                + font.size.mul_ratio(1, 5);
            for column in spec.columns {
                let key = format!("row{}.{}", row_idx + 1, column.key);
                let destination = format!("p{}r{}.{}", chunk_no + 1, slot_idx + 1, column.key);
                let text = sanitize_ascii(&cell_text(&rows[row_idx], column)).replace('\n', " ");
                let x = Pt::from_f32(column.x + 2.0);
                if text.trim().is_empty() {
                    let outcome = if preview {
                        canvas.draw_text(font, x, baseline, PLACEHOLDER);
                        FieldOutcome::Placeholder
                    } else {
                        FieldOutcome::LeftBlank
                    };
                    report.record_field(key, destination, outcome);
                    continue;
                }
                let inner = Pt::from_f32(column.width - 4.0);
                let fitted = clamp_to_width(&text, inner, &font);
                canvas.draw_text(font, x, baseline, fitted.text);
                let outcome = if fitted.truncated {
                    FieldOutcome::Truncated
                } else {
                    FieldOutcome::Written
                };
                report.record_field(key, destination, outcome);
            }
        }
    }
    summary(TableStrategy::Freehand, &chunks)
}

fn draw_grid(canvas: &mut Canvas, spec: &TableSpec, top: f32, rows: usize) {
    let (Some(first), Some(last)) = (spec.columns.first(), spec.columns.last()) else {
        return;
    };
    let left = Pt::from_f32(first.x);
    let right = Pt::from_f32(last.x + last.width);
    let row_height = Pt::from_f32(spec.row_height);
    let top = Pt::from_f32(top);
    let band = Rect {
        x: left,
        y: top - row_height,
        width: right - left,
        height: row_height,
    };
    canvas.fill_rect(band, Color::BAND);

    let header_font = FontSpec::bold(spec.font_size.min(8.0));
    for column in spec.columns {
        let label = clamp_to_width(column.header, Pt::from_f32(column.width - 4.0), &header_font);
        canvas.draw_text(
            header_font,
            Pt::from_f32(column.x + 2.0),
            top - row_height + (row_height - header_font.size) / 2,
            label.text,
        );
    }

    let bottom = top - row_height * (rows as i32 + 1);
    canvas.set_stroke_color(Color::RULE);
    canvas.set_line_width(Pt::from_f32(0.5));
    for line in 0..=rows + 1 {
        canvas.hline(left, right, top - row_height * line as i32);
    }
    for column in spec.columns {
        canvas.vline(Pt::from_f32(column.x), bottom, top);
    }
    canvas.vline(right, bottom, top);
    canvas.set_stroke_color(Color::BLACK);
}

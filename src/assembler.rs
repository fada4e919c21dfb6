use crate::acroform::{FormIndex, encode_text_string};
use crate::canvas::Canvas;
use crate::error::RenderError;
use crate::field::{FieldMap, FilledSet};
use crate::form::populate;
use crate::freehand::{draw_chrome, draw_coordinates};
use crate::kinds::{DocumentKind, KindSpec, QR_IMAGE_KEY};
use crate::layout::{Layout, ReservedArea, draw_flow};
use crate::overlay::{append_blank_page, new_document, page_ids, page_size, stamp_overlay};
use crate::signature::{ImageFetcher, ImageRegistry, Placement, embed_signature, place_image_bytes};
use crate::table::{
    ApplianceRow, TableStrategy, draw_freehand_table, fill_form_table, select_strategy,
};
use crate::template::TemplateCache;
use crate::text::PLACEHOLDER;
use crate::trace::{RenderTrace, TraceScope};
use crate::types::Rect;
use certrender_report::{CompletenessReport, FieldOutcome, ImageOutcome};
use chrono::NaiveDateTime;
use lopdf::{Document as LoDocument, Object, ObjectId, dictionary};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

pub const PRODUCER: &str = "certrender";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RenderStage {
    Initializing,
    ResolvingFields,
    StrategySelection,
    DrawingStaticLayout,
    DrawingDynamicFields,
    DrawingTable,
    EmbeddingSignatures,
    Finalizing,
    Saved,
}

impl RenderStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStage::Initializing => "initializing",
            RenderStage::ResolvingFields => "resolving_fields",
            RenderStage::StrategySelection => "strategy_selection",
            RenderStage::DrawingStaticLayout => "drawing_static_layout",
            RenderStage::DrawingDynamicFields => "drawing_dynamic_fields",
            RenderStage::DrawingTable => "drawing_table",
            RenderStage::EmbeddingSignatures => "embedding_signatures",
            RenderStage::Finalizing => "finalizing",
            RenderStage::Saved => "saved",
        }
    }
}

/// How the non-tabular content of a document is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStrategy {
    FormField,
    Freehand,
    /// Templateless pages composed with the layout primitives.
    Flow,
}

impl DocumentStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStrategy::FormField => "form_field",
            DocumentStrategy::Freehand => "freehand",
            DocumentStrategy::Flow => "flow",
        }
    }
}

/// Form fields when the template carries widgets (or there is no coordinate
/// table to fall back on), coordinates otherwise.
pub fn select_document_strategy(spec: &KindSpec, index: &FormIndex) -> DocumentStrategy {
    if spec.template_asset().is_none() {
        return DocumentStrategy::Flow;
    }
    let has_mappings = !spec.mappings.is_empty();
    if has_mappings && (!index.is_empty() || spec.coordinates.is_empty()) {
        DocumentStrategy::FormField
    } else {
        DocumentStrategy::Freehand
    }
}

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub fields: FieldMap,
    pub appliances: Vec<ApplianceRow>,
    pub issued_at: NaiveDateTime,
    pub record_id: String,
    /// `None` defers to the renderer's configured default.
    pub preview: Option<bool>,
    /// Raster consumed verbatim by kinds with a QR area.
    pub qr_image: Option<Vec<u8>>,
}

impl RenderRequest {
    pub fn new(record_id: impl Into<String>, issued_at: NaiveDateTime) -> Self {
        Self {
            fields: FieldMap::new(),
            appliances: Vec::new(),
            issued_at,
            record_id: record_id.into(),
            preview: None,
            qr_image: None,
        }
    }

    pub fn fields(mut self, fields: FieldMap) -> Self {
        self.fields = fields;
        self
    }

    pub fn appliances(mut self, appliances: Vec<ApplianceRow>) -> Self {
        self.appliances = appliances;
        self
    }

    pub fn preview(mut self, preview: bool) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn qr_image(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.qr_image = Some(bytes.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct RenderResult {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub title: String,
    pub kind: DocumentKind,
    pub metadata: BTreeMap<String, String>,
    pub report: CompletenessReport,
}

/// Collaborators shared by every render of one renderer.
pub(crate) struct RenderContext<'a> {
    pub templates: &'a TemplateCache,
    pub fetcher: &'a dyn ImageFetcher,
    pub trace: &'a RenderTrace,
    pub row_cap: Option<usize>,
    pub preview_default: bool,
}

struct StageClock<'a> {
    trace: TraceScope<'a>,
    stage: RenderStage,
    started: Instant,
}

impl<'a> StageClock<'a> {
    fn new(trace: TraceScope<'a>) -> Self {
        Self {
            trace,
            stage: RenderStage::Initializing,
            started: Instant::now(),
        }
    }

    fn enter(&mut self, next: RenderStage) {
        debug_assert!(next > self.stage, "{:?} after {:?}", next, self.stage);
        let ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.trace.stage(self.stage.as_str(), ms);
        self.stage = next;
        self.started = Instant::now();
    }
}

struct ImageTarget {
    slot: &'static str,
    key: &'static str,
    page: usize,
    rect: Rect,
}

pub(crate) fn render(
    kind: DocumentKind,
    request: &RenderRequest,
    ctx: &RenderContext<'_>,
) -> Result<RenderResult, RenderError> {
    let spec = kind.spec();
    let preview = request.preview.unwrap_or(ctx.preview_default);
    let mut clock = StageClock::new(ctx.trace.scope(kind.as_str(), &request.record_id));

    let mut template = match spec.template_asset() {
        Some(asset) => Some(ctx.templates.open(asset)?),
        None => None,
    };
    let template_pages = template.as_ref().map(page_ids).unwrap_or_default();
    if let Some(asset) = spec.template_asset() {
        check_template_pages(spec, asset, template_pages.len())?;
    }

    clock.enter(RenderStage::ResolvingFields);
    let fields = resolved_fields(request);
    let mut index = template.as_ref().map(FormIndex::build).unwrap_or_default();

    clock.enter(RenderStage::StrategySelection);
    let strategy = select_document_strategy(spec, &index);
    let table_strategy = spec.table.as_ref().map(|table| {
        if strategy == DocumentStrategy::FormField {
            select_strategy(table, Some(&index))
        } else {
            TableStrategy::Freehand
        }
    });
    let mut report = CompletenessReport::new(kind.as_str(), strategy.as_str());

    clock.enter(RenderStage::DrawingStaticLayout);
    let size = match (&template, spec.blank_geometry()) {
        (Some(doc), _) => page_size(doc, template_pages[0]),
        (None, Some((size, _))) => size,
        (None, None) => {
            return Err(RenderError::InvalidConfiguration(format!(
                "{kind} has neither a template nor blank page geometry"
            )));
        }
    };
    let mut canvas = Canvas::new(size);
    let mut layout = spec
        .blank_geometry()
        .map(|(size, margins)| Layout::new(size, margins, preview));
    if strategy == DocumentStrategy::Freehand {
        canvas.goto_page(0);
        draw_chrome(&mut canvas, spec.chrome);
    }

    clock.enter(RenderStage::DrawingDynamicFields);
    let mut filled = FilledSet::default();
    let mut placeholders = BTreeSet::new();
    let mut reserved: Vec<ReservedArea> = Vec::new();
    match strategy {
        DocumentStrategy::FormField => {
            if let Some(doc) = template.as_mut() {
                placeholders = populate(
                    doc,
                    &index,
                    spec.mappings,
                    &fields,
                    preview,
                    &mut filled,
                    &mut report,
                );
            }
        }
        DocumentStrategy::Freehand => {
            canvas.goto_page(0);
            draw_coordinates(&mut canvas, spec.coordinates, &fields, preview, &mut report);
        }
        DocumentStrategy::Flow => {
            if let Some(layout) = layout.as_mut() {
                reserved = draw_flow(
                    layout,
                    &mut canvas,
                    spec.flow,
                    &fields,
                    spec.continuation_heading,
                    &mut report,
                );
            }
        }
    }

    clock.enter(RenderStage::DrawingTable);
    if let (Some(mut table), Some(table_strategy)) = (spec.table, table_strategy) {
        if let Some(cap) = ctx.row_cap {
            table.rows_per_page = cap.clamp(1, table.rows_per_page);
        }
        let summary = match (table_strategy, template.as_mut()) {
            (TableStrategy::FormField, Some(doc)) => fill_form_table(
                doc,
                &mut index,
                template_pages[spec.table_page],
                &table,
                &request.appliances,
                preview,
                &mut filled,
                &mut placeholders,
                &mut report,
            )?,
            _ => {
                let continuation_start = canvas.page_count().max(template_pages.len());
                draw_freehand_table(
                    &mut canvas,
                    &table,
                    &request.appliances,
                    spec.table_page,
                    continuation_start,
                    spec.continuation_chrome,
                    preview,
                    &mut report,
                )
            }
        };
        for (chunk, rows) in summary.rows_per_page.iter().enumerate().skip(1) {
            clock.trace.table_page_break(chunk + 1, *rows);
        }
        report.table = Some(summary);
    }

    clock.enter(RenderStage::EmbeddingSignatures);
    let mut registry = ImageRegistry::default();
    let targets = image_targets(spec, &template_pages, template.as_ref(), &reserved);
    for target in targets {
        canvas.goto_page(target.page);
        let placement = if target.key == QR_IMAGE_KEY {
            match &request.qr_image {
                Some(bytes) => place_image_bytes(&mut canvas, &mut registry, target.rect, bytes, None),
                None => Placement {
                    outcome: ImageOutcome::Absent,
                    detail: None,
                },
            }
        } else {
            let source = fields.get(target.key).display();
            embed_signature(&mut canvas, &mut registry, ctx.fetcher, target.rect, &source)
        };
        if matches!(
            placement.outcome,
            ImageOutcome::FetchFailed | ImageOutcome::DecodeFailed
        ) {
            clock
                .trace
                .signature_failed(target.slot, placement.detail.as_deref().unwrap_or(""));
        }
        report.record_image(target.slot, placement.outcome, placement.detail);
    }

    clock.enter(RenderStage::Finalizing);
    let overlay = canvas.finish();
    let mut doc = match template {
        Some(doc) => doc,
        None => new_document(size, overlay.pages.len())?,
    };
    while page_ids(&doc).len() < overlay.pages.len() {
        append_blank_page(&mut doc, size)?;
    }
    if strategy == DocumentStrategy::FormField && !index.is_empty() {
        index.regenerate_appearances(&mut doc, &placeholders, PLACEHOLDER)?;
    }
    stamp_overlay(&mut doc, &overlay, &registry.into_map())?;
    write_info(&mut doc, spec.title, request)?;
    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();
    report.page_count = page_ids(&doc).len();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    report.seal(&bytes);
    trace_outcomes(&mut clock.trace, &report);

    clock.enter(RenderStage::Saved);
    clock.trace.finish();

    let metadata = metadata(request, preview, strategy, report.page_count);
    Ok(RenderResult {
        bytes,
        filename: filename(spec, request, preview),
        title: spec.title.to_string(),
        kind,
        metadata,
        report,
    })
}

fn check_template_pages(spec: &KindSpec, asset: &str, pages: usize) -> Result<(), RenderError> {
    let needed = spec
        .signatures
        .iter()
        .map(|slot| slot.page)
        .chain(spec.table.map(|_| spec.table_page))
        .max()
        .unwrap_or(0);
    if needed >= pages {
        return Err(RenderError::TemplateCorrupt {
            asset: asset.to_string(),
            message: format!("expected at least {} pages, found {}", needed + 1, pages),
        });
    }
    Ok(())
}

/// The caller's map plus the request-level values layouts may print.
fn resolved_fields(request: &RenderRequest) -> FieldMap {
    let mut fields = request.fields.clone();
    if !fields.contains("record_id") {
        fields.insert("record_id", request.record_id.clone());
    }
    if !fields.contains("issued_date") {
        fields.insert(
            "issued_date",
            request.issued_at.format("%d/%m/%Y").to_string(),
        );
    }
    fields
}

/// Signature areas on template pages follow their page through table
/// continuation inserts; flow areas use the page they were reserved on.
fn image_targets(
    spec: &KindSpec,
    template_pages: &[ObjectId],
    template: Option<&LoDocument>,
    reserved: &[ReservedArea],
) -> Vec<ImageTarget> {
    let Some(doc) = template else {
        return reserved
            .iter()
            .map(|area| ImageTarget {
                slot: area.slot,
                key: area.key,
                page: area.page,
                rect: area.rect,
            })
            .collect();
    };
    let current = page_ids(doc);
    spec.signatures
        .iter()
        .map(|slot| {
            let page = template_pages
                .get(slot.page)
                .and_then(|id| current.iter().position(|p| p == id))
                .unwrap_or(slot.page);
            let [x, y, width, height] = slot.rect;
            ImageTarget {
                slot: slot.slot,
                key: slot.key,
                page,
                rect: Rect::new(x, y, width, height),
            }
        })
        .collect()
}

fn pdf_date(at: &NaiveDateTime) -> String {
    at.format("D:%Y%m%d%H%M%S").to_string()
}

fn write_info(doc: &mut LoDocument, title: &str, request: &RenderRequest) -> Result<(), RenderError> {
    let stamp = pdf_date(&request.issued_at);
    let info = dictionary! {
        "Title" => encode_text_string(title),
        "Subject" => encode_text_string(&request.record_id),
        "Producer" => Object::string_literal(PRODUCER),
        "CreationDate" => Object::string_literal(stamp.as_str()),
        "ModDate" => Object::string_literal(stamp.as_str()),
    };
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);
    Ok(())
}

fn trace_outcomes(trace: &mut TraceScope<'_>, report: &CompletenessReport) {
    if !trace.is_enabled() {
        return;
    }
    for record in &report.fields {
        match record.outcome {
            FieldOutcome::Truncated => trace.field_truncated(&record.key, &record.destination),
            FieldOutcome::WidgetMissing
            | FieldOutcome::AlreadyFilled
            | FieldOutcome::Unsupported => {
                trace.field_skipped(&record.key, &record.destination, record.outcome.as_str())
            }
            _ => {}
        }
    }
}

fn filename_component(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "draft".to_string()
    } else {
        cleaned
    }
}

fn filename(spec: &KindSpec, request: &RenderRequest, preview: bool) -> String {
    format!(
        "{}-{}-{}{}.pdf",
        spec.filename_stem,
        filename_component(&request.record_id),
        request.issued_at.format("%Y%m%d"),
        if preview { "-preview" } else { "" }
    )
}

fn metadata(
    request: &RenderRequest,
    preview: bool,
    strategy: DocumentStrategy,
    page_count: usize,
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    out.insert(
        "issued_at".to_string(),
        request.issued_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
    );
    out.insert(
        "issued_date".to_string(),
        request.issued_at.format("%d/%m/%Y").to_string(),
    );
    out.insert("record_id".to_string(), request.record_id.clone());
    out.insert("preview".to_string(), preview.to_string());
    out.insert("strategy".to_string(), strategy.as_str().to_string());
    out.insert("page_count".to_string(), page_count.to_string());
    out
}

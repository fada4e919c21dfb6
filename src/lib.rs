mod acroform;
mod assembler;
mod canvas;
mod content;
mod error;
mod field;
mod form;
mod freehand;
mod kinds;
mod layout;
mod overlay;
mod pdfinspect;
mod signature;
mod table;
mod template;
mod text;
mod trace;
mod types;

pub use acroform::{FormField, FormIndex, WidgetKind};
pub use assembler::{
    DocumentStrategy, PRODUCER, RenderRequest, RenderResult, RenderStage, select_document_strategy,
};
pub use canvas::{Canvas, Command, Document, Page};
pub use certrender_report::{
    CompletenessReport, FieldOutcome, FieldRecord, ImageOutcome, ImageRecord, TableSummary,
};
pub use error::RenderError;
pub use field::{FieldMap, FieldValue, FilledSet, ValueFormat, is_truthy, resolve, resolve_as};
pub use form::{Destination, FieldMapping, populate};
pub use freehand::{ChromeItem, Coord, draw_chrome, draw_coordinates, draw_text_at};
pub use kinds::{DocumentKind, KindSpec, PageSource, QR_IMAGE_KEY, SignatureSlot};
pub use layout::{AreaSpec, BoxEntry, BoxSpec, FlowItem, Layout, ReservedArea, draw_flow};
pub use pdfinspect::{
    PdfInspectError, PdfInspectErrorCode, PdfInspectReport, inspect_pdf_bytes,
    require_template_compatibility,
};
pub use signature::{
    DEFAULT_FETCH_TIMEOUT, FetchedImage, HttpImageFetcher, ImageFetcher, SignatureError,
    embed_signature, fit_rect,
};
pub use table::{ApplianceRow, Column, TableRow, TableSpec, TableStrategy, paginate};
pub use template::{FsTemplateStore, MemoryTemplateStore, TemplateCache, TemplateStore};
pub use text::{ELLIPSIS, PLACEHOLDER, clamp_to_width, sanitize_ascii, wrap_text};
pub use trace::{RenderTrace, TraceScope};
pub use types::{Color, Margins, Pt, Rect, Size};

use assembler::RenderContext;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Renders certificates. One renderer is shared by concurrent renders; each
/// call owns its own document and field state.
pub struct CertRenderer {
    templates: Arc<TemplateCache>,
    fetcher: Arc<dyn ImageFetcher>,
    trace: RenderTrace,
    preview_default: bool,
    row_caps: BTreeMap<DocumentKind, usize>,
}

pub struct CertRendererBuilder {
    template_dir: Option<PathBuf>,
    template_store: Option<Box<dyn TemplateStore>>,
    fingerprints: BTreeMap<String, String>,
    fetcher: Option<Arc<dyn ImageFetcher>>,
    fetch_timeout: Duration,
    trace_path: Option<PathBuf>,
    trace: Option<RenderTrace>,
    preview_default: bool,
    row_caps: BTreeMap<DocumentKind, usize>,
}

impl CertRenderer {
    pub fn builder() -> CertRendererBuilder {
        CertRendererBuilder::new()
    }

    /// Renders `kind` from `request`. Only template load failures and final
    /// serialization errors are returned; everything else degrades into the
    /// completeness report.
    pub fn render(
        &self,
        kind: DocumentKind,
        request: &RenderRequest,
    ) -> Result<RenderResult, RenderError> {
        let ctx = RenderContext {
            templates: &self.templates,
            fetcher: self.fetcher.as_ref(),
            trace: &self.trace,
            row_cap: self.row_caps.get(&kind).copied(),
            preview_default: self.preview_default,
        };
        assembler::render(kind, request, &ctx)
    }

    pub fn templates(&self) -> &TemplateCache {
        &self.templates
    }
}

impl Default for CertRendererBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CertRendererBuilder {
    pub fn new() -> Self {
        Self {
            template_dir: None,
            template_store: None,
            fingerprints: BTreeMap::new(),
            fetcher: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            trace_path: None,
            trace: None,
            preview_default: false,
            row_caps: BTreeMap::new(),
        }
    }

    // Directory holding one template asset per kind (e.g. gas_safety_record.pdf).
    pub fn template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    pub fn template_store(mut self, store: impl TemplateStore + 'static) -> Self {
        self.template_store = Some(Box::new(store));
        self
    }

    // Pins an asset to a sha256 hex digest; loads of any other bytes fail.
    pub fn template_fingerprint(
        mut self,
        asset: impl Into<String>,
        sha256_hex: impl Into<String>,
    ) -> Self {
        self.fingerprints.insert(asset.into(), sha256_hex.into());
        self
    }

    pub fn image_fetcher(mut self, fetcher: impl ImageFetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    // Ignored when a custom fetcher is set.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    // JSONL render trace: stage timings, skipped fields, failed signatures.
    pub fn trace_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.trace_path = Some(path.into());
        self
    }

    pub fn trace(mut self, trace: RenderTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn preview_default(mut self, enabled: bool) -> Self {
        self.preview_default = enabled;
        self
    }

    // Lowers the table page cap for one kind. Caps above the kind's own
    // limit are clamped to it.
    pub fn rows_per_page(mut self, kind: DocumentKind, rows: usize) -> Self {
        self.row_caps.insert(kind, rows);
        self
    }

    pub fn build(self) -> Result<CertRenderer, RenderError> {
        if self.template_dir.is_some() && self.template_store.is_some() {
            return Err(RenderError::InvalidConfiguration(
                "template_dir and template_store are mutually exclusive".to_string(),
            ));
        }
        if self.trace_path.is_some() && self.trace.is_some() {
            return Err(RenderError::InvalidConfiguration(
                "trace_log and trace are mutually exclusive".to_string(),
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(RenderError::InvalidConfiguration(
                "fetch_timeout must be > 0".to_string(),
            ));
        }
        if let Some((kind, _)) = self.row_caps.iter().find(|(_, rows)| **rows == 0) {
            return Err(RenderError::InvalidConfiguration(format!(
                "rows_per_page for {kind} must be > 0"
            )));
        }
        for (asset, digest) in &self.fingerprints {
            if digest.len() != 64 || !digest.chars().all(|ch| ch.is_ascii_hexdigit()) {
                return Err(RenderError::InvalidConfiguration(format!(
                    "fingerprint for {asset} is not a sha256 hex digest"
                )));
            }
        }

        let store: Box<dyn TemplateStore> = match (self.template_store, self.template_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Box::new(FsTemplateStore::new(dir)),
            (None, None) => Box::new(FsTemplateStore::new("templates")),
        };
        let mut cache = TemplateCache::new(store);
        for (asset, digest) in self.fingerprints {
            cache = cache.with_fingerprint(asset, digest);
        }
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpImageFetcher::new(self.fetch_timeout)),
        };
        let trace = match (self.trace, self.trace_path) {
            (Some(trace), _) => trace,
            (None, Some(path)) => RenderTrace::to_file(path)?,
            (None, None) => RenderTrace::disabled(),
        };
        Ok(CertRenderer {
            templates: Arc::new(cache),
            fetcher,
            trace,
            preview_default: self.preview_default,
            row_caps: self.row_caps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acroform::fixtures::{Spec, fillable};
    use crate::overlay::new_document;
    use crate::signature::tests::png_bytes;
    use crate::trace::tests::SharedBuf;
    use certrender_report::hex_sha256;
    use chrono::{NaiveDate, NaiveDateTime};
    use lopdf::{Document as LoDocument, Object};
    use std::sync::{Mutex, mpsc};

    const GAS_ROW_COLUMNS: [&str; 3] = ["location", "make_model", "safe"];

    struct StubFetcher;

    impl ImageFetcher for StubFetcher {
        fn fetch(&self, source: &str) -> Result<FetchedImage, SignatureError> {
            match source {
                "sig://ok" => Ok(FetchedImage {
                    bytes: png_bytes(40, 20, 255),
                    content_type: Some("image/png".to_string()),
                }),
                "sig://garbage" => Ok(FetchedImage {
                    bytes: b"<html>not found</html>".to_vec(),
                    content_type: Some("text/html".to_string()),
                }),
                _ => Err(SignatureError::Fetch(format!("unreachable: {source}"))),
            }
        }
    }

    fn issued() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 17)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .expect("date")
    }

    fn save(mut doc: LoDocument) -> Vec<u8> {
        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save");
        out
    }

    fn gas_template() -> Vec<u8> {
        let row_names: Vec<(String, f32, f32)> = (1..=6)
            .flat_map(|slot| {
                let y = 456.0 - (slot - 1) as f32 * 14.0;
                GAS_ROW_COLUMNS
                    .iter()
                    .enumerate()
                    .map(move |(col, column)| (format!("app{slot}_{column}"), 36.0 + col as f32 * 90.0, y))
            })
            .collect();
        let mut specs = vec![
            Spec::Text("certificate_no", [400.0, 800.0, 559.0, 816.0]),
            Spec::Text("landlord_name", [36.0, 760.0, 280.0, 776.0]),
            Spec::Text("landlord_address_1", [36.0, 740.0, 280.0, 756.0]),
            Spec::Text("landlord_address_2", [36.0, 720.0, 280.0, 736.0]),
            Spec::Text("landlord_address_3", [36.0, 700.0, 280.0, 716.0]),
            Spec::Text("tenant_name", [300.0, 760.0, 559.0, 776.0]),
            Spec::Text("engineer_name", [300.0, 740.0, 559.0, 756.0]),
            Spec::Checkbox("co_alarm", [300.0, 700.0, 312.0, 712.0]),
            Spec::Multiline("defects_notes", [36.0, 560.0, 559.0, 640.0]),
        ];
        for (name, x, y) in &row_names {
            specs.push(Spec::Text(name.as_str(), [*x, *y, *x + 88.0, *y + 14.0]));
        }
        save(fillable(1, &specs))
    }

    fn plain_template() -> Vec<u8> {
        save(new_document(Size::a4(), 1).expect("doc"))
    }

    fn store() -> MemoryTemplateStore {
        MemoryTemplateStore::new()
            .with("gas_safety_record.pdf", gas_template())
            .with("service_record.pdf", plain_template())
    }

    fn renderer() -> CertRenderer {
        CertRenderer::builder()
            .template_store(store())
            .image_fetcher(StubFetcher)
            .build()
            .expect("renderer")
    }

    fn appliances(count: usize) -> Vec<ApplianceRow> {
        (1..=count)
            .map(|n| ApplianceRow {
                location: Some(format!("Room {n}")),
                make: Some("Vaillant".to_string()),
                model: Some(format!("ecoTEC {n}")),
                safe_to_use: Some(n % 3 != 0),
                ..ApplianceRow::default()
            })
            .collect()
    }

    fn gas_request(rows: usize) -> RenderRequest {
        RenderRequest::new("CP12-0042", issued())
            .fields(
                FieldMap::new()
                    .with("landlord_name", "Priya Patel")
                    .with("landlord_address", "1 High St, Leeds, LS1 1AA")
                    .with("tenant_name", "Sam Jones")
                    .with("engineer_name", "Alex Reid")
                    .with("co_alarm_fitted", "Y")
                    .with("defects", "None found")
                    .with("engineer_signature_url", "sig://ok")
                    .with("customer_email", "tenant@example.com"),
            )
            .appliances(appliances(rows))
    }

    fn reopen(bytes: &[u8]) -> (LoDocument, FormIndex) {
        let doc = LoDocument::load_mem(bytes).expect("reload");
        let index = FormIndex::build(&doc);
        (doc, index)
    }

    #[test]
    fn missing_template_is_the_only_fatal_error() {
        let renderer = CertRenderer::builder()
            .template_store(MemoryTemplateStore::new())
            .image_fetcher(StubFetcher)
            .build()
            .expect("renderer");
        let err = renderer
            .render(DocumentKind::GasSafetyRecord, &gas_request(2))
            .expect_err("missing");
        assert!(matches!(err, RenderError::TemplateMissing(_)));

        let sheet = renderer
            .render(
                DocumentKind::JobSheet,
                &RenderRequest::new("JS-1", issued()),
            )
            .expect("templateless kinds need no asset");
        assert!(sheet.bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn missing_optional_keys_never_fail() {
        let renderer = renderer();
        for kind in [
            DocumentKind::GasSafetyRecord,
            DocumentKind::ServiceRecord,
            DocumentKind::JobSheet,
        ] {
            let result = renderer
                .render(kind, &RenderRequest::new("EMPTY-1", issued()))
                .expect("render");
            assert_eq!(result.kind, kind);
            assert!(result.report.page_count >= 1);
        }
    }

    #[test]
    fn repeated_renders_are_byte_identical() {
        let renderer = renderer();
        let first = renderer
            .render(DocumentKind::GasSafetyRecord, &gas_request(13))
            .expect("first");
        let second = renderer
            .render(DocumentKind::GasSafetyRecord, &gas_request(13))
            .expect("second");
        assert_eq!(first.bytes, second.bytes);
        assert_eq!(first.report.output_sha256, hex_sha256(&first.bytes));
        assert_eq!(first.filename, "gas-safety-record-CP12-0042-20240517.pdf");
        assert_eq!(first.metadata.get("issued_at").map(String::as_str), Some("2024-05-17T09:30:00"));
    }

    #[test]
    fn concurrent_renders_are_independent() {
        let renderer = renderer();
        let baseline = renderer
            .render(DocumentKind::ServiceRecord, &gas_request(9))
            .expect("baseline");
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..3)
                .map(|_| {
                    scope.spawn(|| {
                        renderer
                            .render(DocumentKind::ServiceRecord, &gas_request(9))
                            .expect("render")
                    })
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().expect("join").bytes, baseline.bytes);
            }
        });
    }

    #[test]
    fn widget_values_round_trip_through_the_output() {
        let result = renderer()
            .render(DocumentKind::GasSafetyRecord, &gas_request(2))
            .expect("render");
        let (doc, index) = reopen(&result.bytes);
        let read = |name: &str| index.read_value(&doc, name);
        assert_eq!(read("landlord_name").as_deref(), Some("Priya Patel"));
        assert_eq!(read("tenant_name").as_deref(), Some("Sam Jones"));
        assert_eq!(read("certificate_no").as_deref(), Some("CP12-0042"));
        assert_eq!(read("landlord_address_1").as_deref(), Some("1 High St"));
        assert_eq!(read("landlord_address_2").as_deref(), Some("Leeds"));
        assert_eq!(read("landlord_address_3").as_deref(), Some("LS1 1AA"));
        assert_eq!(read("co_alarm").as_deref(), Some("Yes"));
        assert_eq!(read("app2_make_model").as_deref(), Some("Vaillant ecoTEC 2"));
        assert_eq!(
            result.report.outcome_for("gas_safe_reg"),
            Some(FieldOutcome::LeftBlank)
        );
    }

    #[test]
    fn thirteen_rows_paginate_to_three_pages() {
        let result = renderer()
            .render(DocumentKind::GasSafetyRecord, &gas_request(13))
            .expect("render");
        let table = result.report.table.clone().expect("table");
        assert_eq!(table.strategy, "form_field");
        assert_eq!(table.rows_per_page, vec![6, 6, 1]);
        assert_eq!(result.report.page_count, 3);
        let (doc, index) = reopen(&result.bytes);
        assert_eq!(doc.get_pages().len(), 3);
        assert_eq!(
            index.read_value(&doc, "app1_location_p3").as_deref(),
            Some("Room 13")
        );
        assert_eq!(
            index.read_value(&doc, "landlord_name_p3").as_deref(),
            Some("Priya Patel")
        );
    }

    #[test]
    fn freehand_table_paginates_and_honours_row_cap() {
        let result = renderer()
            .render(DocumentKind::ServiceRecord, &gas_request(13))
            .expect("render");
        let table = result.report.table.clone().expect("table");
        assert_eq!(table.strategy, "freehand");
        assert_eq!(table.rows_per_page, vec![8, 5]);
        assert_eq!(result.report.page_count, 2);

        let capped = CertRenderer::builder()
            .template_store(store())
            .image_fetcher(StubFetcher)
            .rows_per_page(DocumentKind::ServiceRecord, 6)
            .build()
            .expect("renderer")
            .render(DocumentKind::ServiceRecord, &gas_request(13))
            .expect("render");
        assert_eq!(
            capped.report.table.expect("table").rows_per_page,
            vec![6, 6, 1]
        );
        assert_eq!(capped.report.page_count, 3);
    }

    #[test]
    fn preview_and_final_differ_only_by_placeholders() {
        let renderer = renderer();
        let request = RenderRequest::new("JS-9", issued())
            .fields(FieldMap::new().with("customer_name", "Dana Cole"));
        let final_doc = renderer
            .render(DocumentKind::JobSheet, &request.clone().preview(false))
            .expect("final");
        let preview_doc = renderer
            .render(DocumentKind::JobSheet, &request.preview(true))
            .expect("preview");
        assert_ne!(final_doc.bytes, preview_doc.bytes);
        assert_eq!(final_doc.report.count(FieldOutcome::Placeholder), 0);
        assert!(preview_doc.report.count(FieldOutcome::Placeholder) > 0);
        assert_eq!(
            final_doc.report.count(FieldOutcome::LeftBlank),
            preview_doc.report.count(FieldOutcome::Placeholder)
        );
        assert!(preview_doc.filename.ends_with("-preview.pdf"));
    }

    #[test]
    fn preview_paints_placeholders_into_blank_widgets() {
        let renderer = renderer();
        let request = RenderRequest::new("CP12-0043", issued())
            .fields(FieldMap::new().with("landlord_name", "Priya Patel"));
        let final_doc = renderer
            .render(DocumentKind::GasSafetyRecord, &request.clone().preview(false))
            .expect("final");
        let preview_doc = renderer
            .render(DocumentKind::GasSafetyRecord, &request.preview(true))
            .expect("preview");
        assert_ne!(final_doc.bytes, preview_doc.bytes);
        assert_eq!(
            final_doc.report.outcome_for("tenant_name"),
            Some(FieldOutcome::LeftBlank)
        );
        assert_eq!(
            preview_doc.report.outcome_for("tenant_name"),
            Some(FieldOutcome::Placeholder)
        );
        let (doc, index) = reopen(&preview_doc.bytes);
        assert_eq!(index.read_value(&doc, "tenant_name"), None);
    }

    #[test]
    fn broken_signature_sources_leave_the_area_blank() {
        let request = gas_request(1);
        let mut fields = request.fields.clone();
        fields.insert("engineer_signature_url", "https://unreachable.invalid/sig.png");
        fields.insert("customer_signature_url", "sig://garbage");
        let result = renderer()
            .render(DocumentKind::GasSafetyRecord, &request.fields(fields))
            .expect("render must complete");
        let outcomes: Vec<_> = result
            .report
            .images
            .iter()
            .map(|image| (image.slot.as_str(), image.outcome))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                ("engineer", ImageOutcome::FetchFailed),
                ("customer", ImageOutcome::DecodeFailed),
            ]
        );
        assert!(!result.report.is_complete());
    }

    #[test]
    fn job_sheet_embeds_signature_and_qr() {
        let request = RenderRequest::new("JS-3", issued())
            .fields(
                FieldMap::new()
                    .with("engineer_signature_url", "sig://ok")
                    .with("job_description", "Boiler losing pressure\nCheck PRV"),
            )
            .qr_image(png_bytes(16, 16, 255));
        let result = renderer()
            .render(DocumentKind::JobSheet, &request)
            .expect("render");
        let images: BTreeMap<_, _> = result
            .report
            .images
            .iter()
            .map(|image| (image.slot.clone(), image.outcome))
            .collect();
        assert_eq!(images.get("engineer"), Some(&ImageOutcome::Embedded));
        assert_eq!(images.get("customer"), Some(&ImageOutcome::Absent));
        assert_eq!(images.get("qr"), Some(&ImageOutcome::Embedded));
        assert_eq!(result.report.strategy, "flow");
        assert!(result.report.is_complete());
    }

    #[test]
    fn trace_records_every_stage_and_a_summary() {
        let buf = SharedBuf::default();
        let renderer = CertRenderer::builder()
            .template_store(store())
            .image_fetcher(StubFetcher)
            .trace(RenderTrace::to_writer(buf.clone()))
            .build()
            .expect("renderer");
        let mut request = gas_request(7);
        request.fields.insert("customer_signature_url", "sig://down");
        renderer
            .render(DocumentKind::GasSafetyRecord, &request)
            .expect("render");
        let lines = buf.lines();
        let stages: Vec<_> = lines
            .iter()
            .filter(|line| line["type"] == "render.stage")
            .map(|line| line["stage"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(stages.len(), 8);
        assert_eq!(stages.first().map(String::as_str), Some("initializing"));
        assert_eq!(stages.last().map(String::as_str), Some("finalizing"));
        assert!(lines.iter().any(|line| line["type"] == "table.page_break"));
        assert!(lines.iter().any(|line| line["type"] == "signature.failed"));
        let summary = lines.last().expect("summary");
        assert_eq!(summary["type"], "render.summary");
        assert_eq!(summary["record_id"], "CP12-0042");
        assert_eq!(summary["counts"]["signature.failed"], 1);
    }

    // Holds the fetch of `sig://gate` until released, so a second render can
    // run to completion in between.
    struct GateFetcher {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl ImageFetcher for GateFetcher {
        fn fetch(&self, source: &str) -> Result<FetchedImage, SignatureError> {
            if source == "sig://gate" {
                if let Ok(entered) = self.entered.lock() {
                    let _ = entered.send(());
                }
                if let Ok(release) = self.release.lock() {
                    let _ = release.recv();
                }
                return StubFetcher.fetch("sig://ok");
            }
            StubFetcher.fetch(source)
        }
    }

    #[test]
    fn overlapping_renders_keep_separate_trace_summaries() {
        let buf = SharedBuf::default();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let renderer = CertRenderer::builder()
            .template_store(store())
            .image_fetcher(GateFetcher {
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            })
            .trace(RenderTrace::to_writer(buf.clone()))
            .build()
            .expect("renderer");

        let mut long = gas_request(13);
        long.fields.insert("engineer_signature_url", "sig://gate");
        let mut short = gas_request(1);
        short.record_id = "CP12-0099".to_string();

        std::thread::scope(|scope| {
            let held = scope.spawn(|| {
                renderer
                    .render(DocumentKind::GasSafetyRecord, &long)
                    .expect("long render")
            });
            entered_rx.recv().expect("long render reached its signature");
            let quick = renderer
                .render(DocumentKind::GasSafetyRecord, &short)
                .expect("short render");
            assert_eq!(quick.report.table.expect("table").pages_used, 1);
            release_tx.send(()).expect("release");
            let slow = held.join().expect("join");
            assert_eq!(slow.report.table.expect("table").pages_used, 3);
        });

        let lines = buf.lines();
        assert!(lines.iter().all(|line| line["record_id"].is_string()));
        let summary_of = |id: &str| {
            lines
                .iter()
                .find(|line| line["type"] == "render.summary" && line["record_id"] == id)
                .cloned()
                .expect("summary")
        };
        let short_summary = summary_of("CP12-0099");
        let long_summary = summary_of("CP12-0042");
        assert!(short_summary["counts"].get("table.page_break").is_none());
        assert_eq!(long_summary["counts"]["table.page_break"], 2);
        assert_eq!(short_summary["stage_ms"].as_object().expect("obj").len(), 8);
        assert_eq!(long_summary["stage_ms"].as_object().expect("obj").len(), 8);
        let long_breaks = lines
            .iter()
            .filter(|line| line["type"] == "table.page_break" && line["record_id"] == "CP12-0042")
            .count();
        assert_eq!(long_breaks, 2);
    }

    #[test]
    fn preview_placeholders_reach_continuation_pages() {
        let renderer = renderer();
        let mut request = gas_request(13);
        request.fields = FieldMap::new().with("landlord_name", "Priya Patel");
        let final_doc = renderer
            .render(DocumentKind::GasSafetyRecord, &request.clone().preview(false))
            .expect("final");
        let preview_doc = renderer
            .render(DocumentKind::GasSafetyRecord, &request.preview(true))
            .expect("preview");

        let appearance_of = |bytes: &[u8], name: &str| {
            let (doc, index) = reopen(bytes);
            let widget = index.field(name).expect("field").widgets()[0];
            let ap = doc
                .get_dictionary(widget)
                .and_then(|w| w.get(b"AP"))
                .and_then(Object::as_dict)
                .and_then(|ap| ap.get(b"N"))
                .and_then(Object::as_reference)
                .expect("ap");
            let stream = doc.get_object(ap).and_then(Object::as_stream).expect("stream");
            let content = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            String::from_utf8_lossy(&content).into_owned()
        };
        for name in ["tenant_name", "tenant_name_p2", "tenant_name_p3"] {
            let preview_text = appearance_of(&preview_doc.bytes, name);
            assert!(preview_text.contains("(\\227) Tj"), "{name}: {preview_text}");
            assert!(!appearance_of(&final_doc.bytes, name).contains("Tj"), "{name}");
        }
        assert_eq!(
            appearance_of(&preview_doc.bytes, "landlord_name_p2"),
            appearance_of(&final_doc.bytes, "landlord_name_p2")
        );
    }

    #[test]
    fn builder_rejects_inconsistent_configuration() {
        assert!(matches!(
            CertRenderer::builder()
                .template_dir("templates")
                .template_store(MemoryTemplateStore::new())
                .build(),
            Err(RenderError::InvalidConfiguration(_))
        ));
        assert!(
            CertRenderer::builder()
                .rows_per_page(DocumentKind::GasSafetyRecord, 0)
                .build()
                .is_err()
        );
        assert!(
            CertRenderer::builder()
                .template_fingerprint("gas_safety_record.pdf", "abc")
                .build()
                .is_err()
        );
    }

    #[test]
    fn pinned_fingerprints_guard_template_revisions() {
        let good = hex_sha256(&gas_template());
        let renderer = CertRenderer::builder()
            .template_store(store())
            .image_fetcher(StubFetcher)
            .template_fingerprint("gas_safety_record.pdf", good)
            .template_fingerprint("service_record.pdf", "0".repeat(64))
            .build()
            .expect("renderer");
        assert!(
            renderer
                .render(DocumentKind::GasSafetyRecord, &gas_request(1))
                .is_ok()
        );
        let err = renderer
            .render(DocumentKind::ServiceRecord, &gas_request(1))
            .expect_err("mismatch");
        assert!(err.is_template_failure());
        assert!(!renderer.templates().is_cached("service_record.pdf"));
    }
}

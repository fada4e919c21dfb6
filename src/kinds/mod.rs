//! Per-kind layout recipes. Everything here is data: adding a certificate
//! kind means authoring a new `KindSpec`, not new drawing code.

mod gas_safety;
mod job_sheet;
mod service_record;
mod warning_notice;

use crate::form::FieldMapping;
use crate::freehand::{ChromeItem, Coord};
use crate::layout::FlowItem;
use crate::table::TableSpec;
use crate::types::{Margins, Size};

/// Key of the reserved area filled with the request's QR raster instead of a
/// fetched signature.
pub const QR_IMAGE_KEY: &str = "qr_image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentKind {
    GasSafetyRecord,
    WarningNotice,
    ServiceRecord,
    JobSheet,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::GasSafetyRecord,
        DocumentKind::WarningNotice,
        DocumentKind::ServiceRecord,
        DocumentKind::JobSheet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::GasSafetyRecord => "gas_safety_record",
            DocumentKind::WarningNotice => "warning_notice",
            DocumentKind::ServiceRecord => "service_record",
            DocumentKind::JobSheet => "job_sheet",
        }
    }

    pub fn parse(raw: &str) -> Option<DocumentKind> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }

    pub fn spec(&self) -> &'static KindSpec {
        match self {
            DocumentKind::GasSafetyRecord => &gas_safety::SPEC,
            DocumentKind::WarningNotice => &warning_notice::SPEC,
            DocumentKind::ServiceRecord => &service_record::SPEC,
            DocumentKind::JobSheet => &job_sheet::SPEC,
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageSource {
    /// Pages come from a template asset loaded through the template cache.
    Template { asset: &'static str },
    /// Pages are created on demand and filled by the flow layout.
    Blank { width: f32, height: f32, margin: f32 },
}

/// Image area on a template page. `page` is the zero-based template page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignatureSlot {
    pub slot: &'static str,
    pub key: &'static str,
    pub page: usize,
    pub rect: [f32; 4],
}

#[derive(Debug, Clone, Copy)]
pub struct KindSpec {
    pub kind: DocumentKind,
    pub title: &'static str,
    pub filename_stem: &'static str,
    pub source: PageSource,
    pub mappings: &'static [FieldMapping],
    pub coordinates: &'static [Coord],
    pub chrome: &'static [ChromeItem],
    pub continuation_chrome: &'static [ChromeItem],
    pub flow: &'static [FlowItem],
    pub continuation_heading: &'static str,
    pub table: Option<TableSpec>,
    /// Zero-based template page holding the first table chunk.
    pub table_page: usize,
    pub signatures: &'static [SignatureSlot],
}

impl KindSpec {
    pub fn template_asset(&self) -> Option<&'static str> {
        match self.source {
            PageSource::Template { asset } => Some(asset),
            PageSource::Blank { .. } => None,
        }
    }

    /// Page geometry for blank kinds. Template kinds take theirs from the asset.
    pub fn blank_geometry(&self) -> Option<(Size, Margins)> {
        match self.source {
            PageSource::Template { .. } => None,
            PageSource::Blank {
                width,
                height,
                margin,
            } => Some((Size::new(width, height), Margins::all(margin))),
        }
    }
}

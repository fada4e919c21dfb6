use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const REPORT_SCHEMA: &str = "certrender.completeness_report";
pub const REPORT_VERSION: &str = "1";

/// What happened to one physical destination (widget, coordinate slot or box).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOutcome {
    Written,
    LeftBlank,
    Placeholder,
    Truncated,
    WidgetMissing,
    AlreadyFilled,
    Unsupported,
}

impl FieldOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldOutcome::Written => "written",
            FieldOutcome::LeftBlank => "left_blank",
            FieldOutcome::Placeholder => "placeholder",
            FieldOutcome::Truncated => "truncated",
            FieldOutcome::WidgetMissing => "widget_missing",
            FieldOutcome::AlreadyFilled => "already_filled",
            FieldOutcome::Unsupported => "unsupported",
        }
    }

    /// True when the intended value did not reach the page in full.
    pub fn is_loss(&self) -> bool {
        matches!(
            self,
            FieldOutcome::Truncated | FieldOutcome::WidgetMissing | FieldOutcome::Unsupported
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub key: String,
    pub destination: String,
    pub outcome: FieldOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageOutcome {
    Embedded,
    Absent,
    FetchFailed,
    DecodeFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub slot: String,
    pub outcome: ImageOutcome,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub strategy: String,
    pub rows_rendered: usize,
    pub pages_used: usize,
    pub rows_per_page: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub schema: String,
    pub version: String,
    pub kind: String,
    pub strategy: String,
    pub page_count: usize,
    pub fields: Vec<FieldRecord>,
    pub images: Vec<ImageRecord>,
    pub table: Option<TableSummary>,
    pub output_sha256: String,
}

impl CompletenessReport {
    pub fn new(kind: impl Into<String>, strategy: impl Into<String>) -> Self {
        Self {
            schema: REPORT_SCHEMA.to_string(),
            version: REPORT_VERSION.to_string(),
            kind: kind.into(),
            strategy: strategy.into(),
            ..Self::default()
        }
    }

    pub fn record_field(
        &mut self,
        key: impl Into<String>,
        destination: impl Into<String>,
        outcome: FieldOutcome,
    ) {
        self.fields.push(FieldRecord {
            key: key.into(),
            destination: destination.into(),
            outcome,
        });
    }

    pub fn record_image(
        &mut self,
        slot: impl Into<String>,
        outcome: ImageOutcome,
        detail: Option<String>,
    ) {
        self.images.push(ImageRecord {
            slot: slot.into(),
            outcome,
            detail,
        });
    }

    pub fn seal(&mut self, output: &[u8]) {
        self.output_sha256 = hex_sha256(output);
    }

    pub fn outcome_for(&self, destination: &str) -> Option<FieldOutcome> {
        self.fields
            .iter()
            .find(|record| record.destination == destination)
            .map(|record| record.outcome)
    }

    pub fn losses(&self) -> impl Iterator<Item = &FieldRecord> {
        self.fields.iter().filter(|record| record.outcome.is_loss())
    }

    /// A render is complete when no value was lost and every supplied image landed.
    pub fn is_complete(&self) -> bool {
        self.losses().next().is_none()
            && self.images.iter().all(|image| {
                matches!(image.outcome, ImageOutcome::Embedded | ImageOutcome::Absent)
            })
    }

    pub fn count(&self, outcome: FieldOutcome) -> usize {
        self.fields
            .iter()
            .filter(|record| record.outcome == outcome)
            .count()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

pub fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

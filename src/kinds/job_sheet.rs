use super::{DocumentKind, KindSpec, PageSource, QR_IMAGE_KEY};
use crate::layout::{AreaSpec, BoxSpec, FlowItem};

const JOB_ROW: &[BoxSpec] = &[
    BoxSpec::new("Job no.", "record_id", 120.0),
    BoxSpec::new("Date", "issued_date", 100.0),
    BoxSpec::new("Job type", "job_type", 170.0),
    BoxSpec::new("Priority", "priority", 109.0),
];

const CUSTOMER_ROW: &[BoxSpec] = &[
    BoxSpec::new("Customer", "customer_name", 260.0),
    BoxSpec::new("Phone", "customer_phone", 120.0),
    BoxSpec::new("Email", "customer_email", 119.0),
];

const SITE_ROW: &[BoxSpec] = &[BoxSpec::new("Site address", "property_address", 523.0)];

const ENGINEER_ROW: &[BoxSpec] = &[
    BoxSpec::new("Engineer", "engineer_name", 260.0),
    BoxSpec::new("Gas Safe reg.", "gas_safe_number", 120.0),
    BoxSpec::new("Vehicle", "vehicle_reg", 119.0),
];

const TIME_ROW: &[BoxSpec] = &[
    BoxSpec::new("Arrived", "time_on_site", 100.0),
    BoxSpec::new("Left", "time_off_site", 100.0),
    BoxSpec::new("Job complete", "job_complete", 100.0).yes_no(),
    BoxSpec::new("Follow-up needed", "follow_up_required", 100.0).yes_no(),
    BoxSpec::new("Invoice ref.", "invoice_ref", 75.0),
];

const SIGNATURE_AREAS: &[AreaSpec] = &[
    AreaSpec {
        slot: "engineer",
        key: "engineer_signature_url",
        label: "Engineer signature",
        x_offset: 0.0,
        width: 250.0,
        height: 60.0,
    },
    AreaSpec {
        slot: "customer",
        key: "customer_signature_url",
        label: "Customer signature",
        x_offset: 273.0,
        width: 250.0,
        height: 60.0,
    },
];

const QR_AREA: &[AreaSpec] = &[AreaSpec {
    slot: "qr",
    key: QR_IMAGE_KEY,
    label: "Scan to view job",
    x_offset: 0.0,
    width: 90.0,
    height: 90.0,
}];

const FLOW: &[FlowItem] = &[
    FlowItem::Heading("Job Sheet"),
    FlowItem::Row(JOB_ROW),
    FlowItem::Heading("Customer"),
    FlowItem::Row(CUSTOMER_ROW),
    FlowItem::Row(SITE_ROW),
    FlowItem::Heading("Engineer"),
    FlowItem::Row(ENGINEER_ROW),
    FlowItem::Heading("Work"),
    FlowItem::Paragraph {
        label: "Reported fault / job description",
        key: "job_description",
        height: 90.0,
    },
    FlowItem::Paragraph {
        label: "Work carried out",
        key: "work_carried_out",
        height: 140.0,
    },
    FlowItem::Paragraph {
        label: "Materials used",
        key: "materials_used",
        height: 70.0,
    },
    FlowItem::Row(TIME_ROW),
    FlowItem::Heading("Sign-off"),
    FlowItem::Areas(SIGNATURE_AREAS),
    FlowItem::Areas(QR_AREA),
];

pub(super) static SPEC: KindSpec = KindSpec {
    kind: DocumentKind::JobSheet,
    title: "Job Sheet",
    filename_stem: "job-sheet",
    source: PageSource::Blank {
        width: 595.28,
        height: 841.89,
        margin: 36.0,
    },
    mappings: &[],
    coordinates: &[],
    chrome: &[],
    continuation_chrome: &[],
    flow: FLOW,
    continuation_heading: "Job Sheet (continued)",
    table: None,
    table_page: 0,
    signatures: &[],
};

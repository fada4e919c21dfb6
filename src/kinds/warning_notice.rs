use super::{DocumentKind, KindSpec, PageSource, SignatureSlot};
use crate::form::FieldMapping;

const SITE_ADDRESS: &[&str] = &["site_address_1", "site_address_2"];

const MAPPINGS: &[FieldMapping] = &[
    FieldMapping::single("record_id", "notice_no"),
    FieldMapping::single("issued_date", "notice_date"),
    FieldMapping::single("company_name", "company_name"),
    FieldMapping::single("engineer_name", "engineer_name"),
    FieldMapping::single("gas_safe_number", "gas_safe_reg"),
    FieldMapping::single("responsible_person", "responsible_person"),
    FieldMapping::slots("property_address", SITE_ADDRESS),
    FieldMapping::single("appliance_location", "appliance_location"),
    FieldMapping::single("appliance_description", "appliance_description"),
    FieldMapping::single("fault_details", "fault_details"),
    FieldMapping::single("action_taken", "action_taken"),
    FieldMapping::single("immediately_dangerous", "class_id").yes_no(),
    FieldMapping::single("at_risk", "class_ar").yes_no(),
    FieldMapping::single("not_to_current_standards", "class_ncs").yes_no(),
    FieldMapping::single("gas_supply_isolated", "supply_isolated").yes_no(),
    FieldMapping::single("warning_label_attached", "label_attached").yes_no(),
    FieldMapping::single("customer_refused_isolation", "isolation_refused").yes_no(),
    FieldMapping::single("riddor_reportable", "riddor").yes_no(),
    FieldMapping::info("customer_email"),
];

const SIGNATURES: &[SignatureSlot] = &[
    SignatureSlot {
        slot: "engineer",
        key: "engineer_signature_url",
        page: 0,
        rect: [36.0, 70.0, 240.0, 44.0],
    },
    SignatureSlot {
        slot: "responsible_person",
        key: "responsible_person_signature_url",
        page: 0,
        rect: [319.0, 70.0, 240.0, 44.0],
    },
];

pub(super) static SPEC: KindSpec = KindSpec {
    kind: DocumentKind::WarningNotice,
    title: "Gas Warning Notice",
    filename_stem: "warning-notice",
    source: PageSource::Template {
        asset: "warning_notice.pdf",
    },
    mappings: MAPPINGS,
    coordinates: &[],
    chrome: &[],
    continuation_chrome: &[],
    flow: &[],
    continuation_heading: "",
    table: None,
    table_page: 0,
    signatures: SIGNATURES,
};

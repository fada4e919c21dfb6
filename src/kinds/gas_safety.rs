use super::{DocumentKind, KindSpec, PageSource, SignatureSlot};
use crate::form::FieldMapping;
use crate::freehand::ChromeItem;
use crate::table::{Column, TableSpec};

const LANDLORD_ADDRESS: &[&str] = &[
    "landlord_address_1",
    "landlord_address_2",
    "landlord_address_3",
];

const SITE_ADDRESS: &[&str] = &["site_address_1", "site_address_2", "site_address_3"];

const MAPPINGS: &[FieldMapping] = &[
    FieldMapping::single("record_id", "certificate_no"),
    FieldMapping::single("company_name", "company_name"),
    FieldMapping::single("company_phone", "company_phone"),
    FieldMapping::single("engineer_name", "engineer_name"),
    FieldMapping::single("gas_safe_number", "gas_safe_reg"),
    FieldMapping::single("engineer_id_card", "id_card_no"),
    FieldMapping::single("landlord_name", "landlord_name"),
    FieldMapping::slots("landlord_address", LANDLORD_ADDRESS),
    // Older field maps carried the postcode separately; it lands in the last
    // address box only when the address itself left that box empty.
    FieldMapping::single("landlord_postcode", "landlord_address_3"),
    FieldMapping::single("tenant_name", "tenant_name"),
    FieldMapping::slots("property_address", SITE_ADDRESS),
    FieldMapping::single("inspection_date", "inspection_date"),
    FieldMapping::single("next_inspection_due", "next_due_date"),
    FieldMapping::single("co_alarm_fitted", "co_alarm").yes_no(),
    FieldMapping::single("co_alarm_tested", "co_alarm_tested").yes_no(),
    FieldMapping::single("gas_tightness_pass", "tightness_pass").yes_no(),
    FieldMapping::single("ecv_accessible", "ecv_access").yes_no(),
    FieldMapping::single("bonding_satisfactory", "bonding_ok").yes_no(),
    FieldMapping::single("defects", "defects_notes"),
    FieldMapping::single("remedial_action", "remedial_notes"),
    FieldMapping::info("customer_email"),
    FieldMapping::info("job_id"),
];

const COLUMNS: &[Column] = &[
    Column::new("location", "Location", "app{n}_location", 36.0, 56.0),
    Column::new("appliance_type", "Type", "app{n}_type", 92.0, 40.0),
    Column::new("make_model", "Make / model", "app{n}_make_model", 132.0, 64.0),
    Column::new("owned_by_landlord", "LL owned", "app{n}_owned", 196.0, 26.0).yes_no(),
    Column::new("inspected", "Insp.", "app{n}_inspected", 222.0, 28.0).yes_no(),
    Column::new("flue_type", "Flue", "app{n}_flue", 250.0, 30.0),
    Column::new("operating_pressure", "mbar", "app{n}_pressure", 280.0, 34.0),
    Column::new("heat_input", "kW", "app{n}_heat_input", 314.0, 34.0),
    Column::new("co_reading", "CO ppm", "app{n}_co", 348.0, 32.0),
    Column::new("co2_ratio", "Ratio", "app{n}_ratio", 380.0, 34.0),
    Column::new("safety_device_ok", "Safety dev.", "app{n}_safety_device", 414.0, 30.0).yes_no(),
    Column::new("ventilation_ok", "Vent.", "app{n}_ventilation", 444.0, 30.0).yes_no(),
    Column::new("flue_ok", "Flue ok", "app{n}_flue_ok", 474.0, 30.0).yes_no(),
    Column::new("safe_to_use", "Safe", "app{n}_safe", 504.0, 35.0).yes_no(),
];

const CONTINUATION: &[ChromeItem] = &[
    ChromeItem::Title {
        text: "Landlord Gas Safety Record (continued)",
        x: 36.0,
        y: 800.0,
        size: 13.0,
    },
    ChromeItem::Rule {
        x0: 36.0,
        x1: 559.0,
        y: 792.0,
    },
];

const SIGNATURES: &[SignatureSlot] = &[
    SignatureSlot {
        slot: "engineer",
        key: "engineer_signature_url",
        page: 0,
        rect: [36.0, 60.0, 240.0, 48.0],
    },
    SignatureSlot {
        slot: "customer",
        key: "customer_signature_url",
        page: 0,
        rect: [319.0, 60.0, 240.0, 48.0],
    },
];

pub(super) static SPEC: KindSpec = KindSpec {
    kind: DocumentKind::GasSafetyRecord,
    title: "Landlord Gas Safety Record",
    filename_stem: "gas-safety-record",
    source: PageSource::Template {
        asset: "gas_safety_record.pdf",
    },
    mappings: MAPPINGS,
    coordinates: &[],
    chrome: &[],
    continuation_chrome: CONTINUATION,
    flow: &[],
    continuation_heading: "",
    table: Some(TableSpec {
        columns: COLUMNS,
        rows_per_page: 6,
        first_top: 470.0,
        continuation_top: 770.0,
        row_height: 14.0,
        font_size: 6.5,
    }),
    table_page: 0,
    signatures: SIGNATURES,
};

use super::{DocumentKind, KindSpec, PageSource, SignatureSlot};
use crate::freehand::{ChromeItem, Coord};
use crate::table::{Column, TableSpec};

const COORDINATES: &[Coord] = &[
    Coord::new("record_id", 430.0, 803.0, 125.0).bold(),
    Coord::new("customer_name", 40.0, 750.0, 260.0),
    Coord::new("property_address", 40.0, 722.0, 260.0).lines(3),
    Coord::new("engineer_name", 320.0, 750.0, 235.0),
    Coord::new("gas_safe_number", 320.0, 722.0, 235.0),
    Coord::new("service_date", 320.0, 694.0, 110.0),
    Coord::new("next_service_due", 445.0, 694.0, 110.0),
    Coord::new("boiler_make", 40.0, 652.0, 160.0),
    Coord::new("boiler_model", 210.0, 652.0, 160.0),
    Coord::new("boiler_location", 380.0, 652.0, 175.0),
    Coord::new("burner_pressure", 40.0, 612.0, 120.0),
    Coord::new("co_reading", 170.0, 612.0, 120.0),
    Coord::new("co2_ratio", 300.0, 612.0, 120.0),
    Coord::new("flue_check_ok", 430.0, 612.0, 125.0).yes_no(),
    Coord::new("parts_used", 40.0, 572.0, 515.0).lines(2),
    Coord::new("work_carried_out", 40.0, 350.0, 515.0).lines(4),
];

const CHROME: &[ChromeItem] = &[
    ChromeItem::Title {
        text: "Gas Service Record",
        x: 40.0,
        y: 800.0,
        size: 16.0,
    },
    ChromeItem::Label { text: "Record no.", x: 380.0, y: 803.0 },
    ChromeItem::Rule {
        x0: 40.0,
        x1: 555.0,
        y: 790.0,
    },
    ChromeItem::Label { text: "Customer", x: 40.0, y: 762.0 },
    ChromeItem::Label { text: "Property address", x: 40.0, y: 734.0 },
    ChromeItem::Label { text: "Engineer", x: 320.0, y: 762.0 },
    ChromeItem::Label { text: "Gas Safe reg.", x: 320.0, y: 734.0 },
    ChromeItem::Label { text: "Service date", x: 320.0, y: 706.0 },
    ChromeItem::Label { text: "Next service due", x: 445.0, y: 706.0 },
    ChromeItem::Label { text: "Boiler make", x: 40.0, y: 664.0 },
    ChromeItem::Label { text: "Model", x: 210.0, y: 664.0 },
    ChromeItem::Label { text: "Location", x: 380.0, y: 664.0 },
    ChromeItem::Label { text: "Burner pressure", x: 40.0, y: 624.0 },
    ChromeItem::Label { text: "CO ppm", x: 170.0, y: 624.0 },
    ChromeItem::Label { text: "CO/CO2 ratio", x: 300.0, y: 624.0 },
    ChromeItem::Label { text: "Flue checks ok", x: 430.0, y: 624.0 },
    ChromeItem::Label { text: "Parts used", x: 40.0, y: 584.0 },
    ChromeItem::Label { text: "Work carried out", x: 40.0, y: 362.0 },
    ChromeItem::Outline {
        x: 36.0,
        y: 300.0,
        width: 523.0,
        height: 72.0,
    },
    ChromeItem::Label { text: "Engineer signature", x: 40.0, y: 146.0 },
    ChromeItem::Outline {
        x: 40.0,
        y: 80.0,
        width: 240.0,
        height: 60.0,
    },
    ChromeItem::Label { text: "Customer signature", x: 315.0, y: 146.0 },
    ChromeItem::Outline {
        x: 315.0,
        y: 80.0,
        width: 240.0,
        height: 60.0,
    },
];

const CONTINUATION: &[ChromeItem] = &[
    ChromeItem::Title {
        text: "Gas Service Record (continued)",
        x: 40.0,
        y: 800.0,
        size: 13.0,
    },
    ChromeItem::Rule {
        x0: 40.0,
        x1: 555.0,
        y: 790.0,
    },
];

const COLUMNS: &[Column] = &[
    Column::new("location", "Location", "svc{n}_location", 40.0, 90.0),
    Column::new("appliance_type", "Appliance", "svc{n}_type", 130.0, 80.0),
    Column::new("make_model", "Make / model", "svc{n}_make_model", 210.0, 120.0),
    Column::new("co_reading", "CO ppm", "svc{n}_co", 330.0, 50.0),
    Column::new("co2_ratio", "Ratio", "svc{n}_ratio", 380.0, 50.0),
    Column::new("safe_to_use", "Safe", "svc{n}_safe", 430.0, 45.0).yes_no(),
    Column::new("serviced_on", "Serviced", "svc{n}_date", 475.0, 80.0),
];

const SIGNATURES: &[SignatureSlot] = &[
    SignatureSlot {
        slot: "engineer",
        key: "engineer_signature_url",
        page: 0,
        rect: [42.0, 82.0, 236.0, 56.0],
    },
    SignatureSlot {
        slot: "customer",
        key: "customer_signature_url",
        page: 0,
        rect: [317.0, 82.0, 236.0, 56.0],
    },
];

pub(super) static SPEC: KindSpec = KindSpec {
    kind: DocumentKind::ServiceRecord,
    title: "Gas Service Record",
    filename_stem: "service-record",
    source: PageSource::Template {
        asset: "service_record.pdf",
    },
    mappings: &[],
    coordinates: COORDINATES,
    chrome: CHROME,
    continuation_chrome: CONTINUATION,
    flow: &[],
    continuation_heading: "",
    table: Some(TableSpec {
        columns: COLUMNS,
        rows_per_page: 8,
        first_top: 530.0,
        continuation_top: 770.0,
        row_height: 16.0,
        font_size: 8.0,
    }),
    table_page: 0,
    signatures: SIGNATURES,
};

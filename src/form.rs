use crate::acroform::{FormIndex, WidgetKind};
use crate::field::{FieldMap, FilledSet, ValueFormat, is_truthy, resolve_as};
use certrender_report::{CompletenessReport, FieldOutcome};
use lopdf::Document as LoDocument;
use std::collections::BTreeSet;

/// Physical widget name(s) a domain key is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Informational key with no widget.
    None,
    Single(&'static str),
    /// Adjacent boxes that share one long value, in reading order.
    Slots(&'static [&'static str]),
}

impl Destination {
    pub fn names(&self) -> &[&'static str] {
        match self {
            Destination::None => &[],
            Destination::Single(name) => std::slice::from_ref(name),
            Destination::Slots(names) => names,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub key: &'static str,
    pub dest: Destination,
    pub format: ValueFormat,
}

impl FieldMapping {
    pub const fn single(key: &'static str, name: &'static str) -> Self {
        Self {
            key,
            dest: Destination::Single(name),
            format: ValueFormat::Plain,
        }
    }

    pub const fn slots(key: &'static str, names: &'static [&'static str]) -> Self {
        Self {
            key,
            dest: Destination::Slots(names),
            format: ValueFormat::Plain,
        }
    }

    pub const fn info(key: &'static str) -> Self {
        Self {
            key,
            dest: Destination::None,
            format: ValueFormat::Plain,
        }
    }

    pub const fn yes_no(mut self) -> Self {
        self.format = ValueFormat::YesNo;
        self
    }
}

/// Writes one resolved line to a named widget. Empty lines never claim the
/// widget so a later key may still fill it.
pub(crate) fn write_field(
    doc: &mut LoDocument,
    index: &FormIndex,
    name: &str,
    text: &str,
    filled: &mut FilledSet,
) -> FieldOutcome {
    if text.is_empty() {
        return FieldOutcome::LeftBlank;
    }
    if filled.is_filled(name) {
        return FieldOutcome::AlreadyFilled;
    }
    let outcome = match index.kind(name) {
        WidgetKind::Text { .. } => match index.set_text(doc, name, text) {
            Ok(true) => FieldOutcome::Truncated,
            Ok(false) => FieldOutcome::Written,
            Err(_) => return FieldOutcome::Unsupported,
        },
        WidgetKind::Checkbox { .. } => match index.set_checkbox(doc, name, is_truthy(text)) {
            Ok(()) => FieldOutcome::Written,
            Err(_) => return FieldOutcome::Unsupported,
        },
        WidgetKind::Unsupported => return FieldOutcome::Unsupported,
        WidgetKind::Missing => return FieldOutcome::WidgetMissing,
    };
    filled.claim(name);
    outcome
}

/// Writes every mapped key into the template's widgets.
///
/// Returns the text widgets that should show the preview placeholder: those
/// left empty by every key that targets them. Outside preview the set is
/// always empty.
pub fn populate(
    doc: &mut LoDocument,
    index: &FormIndex,
    mappings: &[FieldMapping],
    fields: &FieldMap,
    preview: bool,
    filled: &mut FilledSet,
    report: &mut CompletenessReport,
) -> BTreeSet<String> {
    let mut records = Vec::new();
    for mapping in mappings {
        let names = mapping.dest.names();
        if names.is_empty() {
            continue;
        }
        let lines = resolve_as(fields.get(mapping.key), names.len(), mapping.format);
        for (name, line) in names.iter().zip(lines) {
            let outcome = write_field(doc, index, name, &line, filled);
            records.push((mapping.key, *name, outcome));
        }
    }

    let placeholders: BTreeSet<String> = if preview {
        records
            .iter()
            .filter(|(_, name, outcome)| {
                *outcome == FieldOutcome::LeftBlank
                    && !filled.is_filled(name)
                    && matches!(index.kind(name), WidgetKind::Text { .. })
            })
            .map(|(_, name, _)| name.to_string())
            .collect()
    } else {
        BTreeSet::new()
    };

    for (key, name, outcome) in records {
        let outcome = if outcome == FieldOutcome::LeftBlank && placeholders.contains(name) {
            FieldOutcome::Placeholder
        } else {
            outcome
        };
        report.record_field(key, name, outcome);
    }
    placeholders
}

use crate::content::{encode_winansi_pdf_string, fmt_pt};
use crate::error::RenderError;
use crate::overlay::{insert_page_after, page_resources, page_size};
use crate::text::{FontSpec, TextMeasure, clamp_to_width, sanitize_ascii, wrap_text};
use crate::types::{Pt, Rect};
use lopdf::{Dictionary, Document as LoDocument, Object, ObjectId, Stream, StringFormat, dictionary};
use std::collections::{BTreeMap, BTreeSet};

const FLAG_MULTILINE: i64 = 1 << 12;
const FLAG_RADIO: i64 = 1 << 15;
const FLAG_PUSHBUTTON: i64 = 1 << 16;
const MAX_FIELD_DEPTH: usize = 32;
const AUTO_SIZE_MAX: f32 = 12.0;
const AUTO_SIZE_MIN: f32 = 6.0;
const APPEARANCE_FONT: &str = "Helv";

/// Writable shape of a named widget, resolved once when the index is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetKind {
    Text { multiline: bool },
    Checkbox { on_state: String },
    /// Radio groups, push buttons, signature fields.
    Unsupported,
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub kind: WidgetKind,
    field_id: ObjectId,
    widgets: Vec<ObjectId>,
    da: Option<String>,
    quadding: i64,
    flags: i64,
}

impl FormField {
    pub fn widget_count(&self) -> usize {
        self.widgets.len()
    }

    pub fn widgets(&self) -> &[ObjectId] {
        &self.widgets
    }
}

#[derive(Clone, Default)]
struct Inherited {
    ft: Option<Vec<u8>>,
    flags: i64,
    da: Option<String>,
    quadding: i64,
}

/// Every terminal field of a template's AcroForm by fully qualified name.
#[derive(Debug, Clone, Default)]
pub struct FormIndex {
    fields: BTreeMap<String, FormField>,
    widget_owner: BTreeMap<ObjectId, String>,
}

impl FormIndex {
    pub fn build(doc: &LoDocument) -> Self {
        let mut index = FormIndex::default();
        let Some(acroform) = acroform_dict(doc) else {
            return index;
        };
        let roots = acroform
            .get(b"Fields")
            .ok()
            .map(|obj| resolve_array(doc, obj))
            .unwrap_or_default();
        let base = Inherited {
            da: acroform
                .get(b"DA")
                .and_then(Object::as_str)
                .ok()
                .map(decode_text_string),
            ..Inherited::default()
        };
        for root in roots {
            if let Ok(id) = root.as_reference() {
                index.walk(doc, id, None, &base, 0);
            }
        }
        index
    }

    fn walk(
        &mut self,
        doc: &LoDocument,
        id: ObjectId,
        parent: Option<&str>,
        inherited: &Inherited,
        depth: usize,
    ) {
        if depth > MAX_FIELD_DEPTH {
            return;
        }
        let Ok(dict) = doc.get_dictionary(id) else {
            return;
        };
        let partial = dict
            .get(b"T")
            .and_then(Object::as_str)
            .ok()
            .map(decode_text_string);
        let name = match (parent, partial) {
            (Some(parent), Some(partial)) => format!("{parent}.{partial}"),
            (None, Some(partial)) => partial,
            (Some(parent), None) => parent.to_string(),
            (None, None) => return,
        };
        let here = Inherited {
            ft: dict
                .get(b"FT")
                .and_then(Object::as_name)
                .ok()
                .map(<[u8]>::to_vec)
                .or_else(|| inherited.ft.clone()),
            flags: dict
                .get(b"Ff")
                .and_then(Object::as_i64)
                .unwrap_or(inherited.flags),
            da: dict
                .get(b"DA")
                .and_then(Object::as_str)
                .ok()
                .map(decode_text_string)
                .or_else(|| inherited.da.clone()),
            quadding: dict
                .get(b"Q")
                .and_then(Object::as_i64)
                .unwrap_or(inherited.quadding),
        };

        let kids = dict
            .get(b"Kids")
            .ok()
            .map(|obj| resolve_array(doc, obj))
            .unwrap_or_default();
        let mut widgets = Vec::new();
        if kids.is_empty() {
            widgets.push(id);
        }
        for kid in kids {
            let Ok(kid_id) = kid.as_reference() else {
                continue;
            };
            let is_field = doc
                .get_dictionary(kid_id)
                .map(|kid| kid.has(b"T"))
                .unwrap_or(false);
            if is_field {
                self.walk(doc, kid_id, Some(&name), &here, depth + 1);
            } else {
                widgets.push(kid_id);
            }
        }
        if widgets.is_empty() {
            return;
        }

        let kind = classify(doc, &here, &widgets);
        for widget in &widgets {
            self.widget_owner.insert(*widget, name.clone());
        }
        match self.fields.get_mut(&name) {
            Some(existing) => existing.widgets.extend(widgets),
            None => {
                self.fields.insert(
                    name.clone(),
                    FormField {
                        name,
                        kind,
                        field_id: id,
                        widgets,
                        da: here.da,
                        quadding: here.quadding,
                        flags: here.flags,
                    },
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.get(name)
    }

    pub fn kind(&self, name: &str) -> WidgetKind {
        self.fields
            .get(name)
            .map(|field| field.kind.clone())
            .unwrap_or(WidgetKind::Missing)
    }

    /// Writes `/V` on a text field. Returns true when the value will not fit
    /// the widget's appearance in full.
    pub fn set_text(
        &self,
        doc: &mut LoDocument,
        name: &str,
        value: &str,
    ) -> Result<bool, RenderError> {
        let field = self.require(name)?;
        if !matches!(field.kind, WidgetKind::Text { .. }) {
            return Err(RenderError::Pdf(format!("{name} is not a text field")));
        }
        doc.get_object_mut(field.field_id)?
            .as_dict_mut()?
            .set("V", encode_text_string(value));
        let truncated = field.widgets.iter().any(|widget| {
            widget_rect(doc, *widget)
                .map(|rect| layout_appearance(field, rect, &sanitize_ascii(value)).truncated)
                .unwrap_or(false)
        });
        Ok(truncated)
    }

    pub fn set_checkbox(
        &self,
        doc: &mut LoDocument,
        name: &str,
        checked: bool,
    ) -> Result<(), RenderError> {
        let field = self.require(name)?;
        let WidgetKind::Checkbox { on_state } = &field.kind else {
            return Err(RenderError::Pdf(format!("{name} is not a checkbox")));
        };
        let state = if checked { on_state.as_str() } else { "Off" };
        doc.get_object_mut(field.field_id)?
            .as_dict_mut()?
            .set("V", Object::Name(state.as_bytes().to_vec()));
        for widget in &field.widgets {
            let widget_state = if checked && widget_has_state(doc, *widget, state) {
                state
            } else {
                "Off"
            };
            doc.get_object_mut(*widget)?
                .as_dict_mut()?
                .set("AS", Object::Name(widget_state.as_bytes().to_vec()));
        }
        Ok(())
    }

    /// Current `/V` as text; checkbox states come back as their state name.
    pub fn read_value(&self, doc: &LoDocument, name: &str) -> Option<String> {
        let field = self.fields.get(name)?;
        let value = doc.get_dictionary(field.field_id).ok()?.get(b"V").ok()?;
        match value {
            Object::String(bytes, _) => Some(decode_text_string(bytes)),
            Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }

    /// Rebuilds the normal appearance of every widget from its current value so
    /// viewers never show a stale cached appearance. Empty text fields listed
    /// in `placeholders` are painted with `placeholder`.
    pub fn regenerate_appearances(
        &self,
        doc: &mut LoDocument,
        placeholders: &BTreeSet<String>,
        placeholder: &str,
    ) -> Result<usize, RenderError> {
        let font_id = ensure_default_resources(doc)?;
        let mut rebuilt = 0usize;
        for field in self.fields.values() {
            match &field.kind {
                WidgetKind::Text { .. } => {
                    let value = self.read_value(doc, &field.name).unwrap_or_default();
                    let (display, verbatim) =
                        if value.trim().is_empty() && placeholders.contains(&field.name) {
                            (placeholder.to_string(), true)
                        } else {
                            (sanitize_ascii(&value), false)
                        };
                    for widget in &field.widgets {
                        let Some(rect) = widget_rect(doc, *widget) else {
                            continue;
                        };
                        let layout = if verbatim {
                            TextLayout::single(field, rect, display.clone())
                        } else {
                            layout_appearance(field, rect, &display)
                        };
                        let stream = text_appearance(rect, &layout, font_id);
                        let stream_id = doc.add_object(stream);
                        doc.get_object_mut(*widget)?
                            .as_dict_mut()?
                            .set("AP", dictionary! { "N" => stream_id });
                        rebuilt += 1;
                    }
                }
                WidgetKind::Checkbox { on_state } => {
                    let checked = self.read_value(doc, &field.name).as_deref()
                        == Some(on_state.as_str());
                    for widget in &field.widgets {
                        if !widget_has_state(doc, *widget, on_state) {
                            let Some(rect) = widget_rect(doc, *widget) else {
                                continue;
                            };
                            let on_id = doc.add_object(checkbox_appearance(rect, true));
                            let off_id = doc.add_object(checkbox_appearance(rect, false));
                            let mut normal = Dictionary::new();
                            normal.set(on_state.as_bytes().to_vec(), on_id);
                            normal.set("Off", off_id);
                            doc.get_object_mut(*widget)?
                                .as_dict_mut()?
                                .set("AP", dictionary! { "N" => normal });
                        }
                        let state = if checked { on_state.as_str() } else { "Off" };
                        doc.get_object_mut(*widget)?
                            .as_dict_mut()?
                            .set("AS", Object::Name(state.as_bytes().to_vec()));
                        rebuilt += 1;
                    }
                }
                WidgetKind::Unsupported | WidgetKind::Missing => {}
            }
        }
        update_acroform(doc, |acroform| {
            acroform.set("NeedAppearances", false);
        })?;
        Ok(rebuilt)
    }

    /// Names of fields with a widget on `page_id`, in annotation order.
    pub fn fields_on_page(&self, doc: &LoDocument, page_id: ObjectId) -> Vec<String> {
        let mut seen = BTreeSet::new();
        page_annotations(doc, page_id)
            .into_iter()
            .filter_map(|id| self.widget_owner.get(&id).cloned())
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    fn require(&self, name: &str) -> Result<&FormField, RenderError> {
        self.fields
            .get(name)
            .ok_or_else(|| RenderError::Pdf(format!("no form field named {name}")))
    }
}

fn classify(doc: &LoDocument, inherited: &Inherited, widgets: &[ObjectId]) -> WidgetKind {
    match inherited.ft.as_deref() {
        Some(b"Tx") | Some(b"Ch") => WidgetKind::Text {
            multiline: inherited.flags & FLAG_MULTILINE != 0,
        },
        Some(b"Btn") if inherited.flags & (FLAG_RADIO | FLAG_PUSHBUTTON) == 0 => {
            let on_state = widgets
                .iter()
                .find_map(|widget| on_state_of(doc, *widget))
                .unwrap_or_else(|| "Yes".to_string());
            WidgetKind::Checkbox { on_state }
        }
        _ => WidgetKind::Unsupported,
    }
}

fn normal_appearance_dict(doc: &LoDocument, widget: ObjectId) -> Option<Dictionary> {
    let ap = doc.get_dictionary(widget).ok()?.get(b"AP").ok()?;
    let ap = resolve_dict(doc, ap)?;
    resolve_dict(doc, ap.get(b"N").ok()?)
}

fn on_state_of(doc: &LoDocument, widget: ObjectId) -> Option<String> {
    normal_appearance_dict(doc, widget)?
        .iter()
        .map(|(key, _)| String::from_utf8_lossy(key).into_owned())
        .find(|key| key != "Off")
}

fn widget_has_state(doc: &LoDocument, widget: ObjectId, state: &str) -> bool {
    normal_appearance_dict(doc, widget)
        .map(|normal| normal.has(state.as_bytes()))
        .unwrap_or(false)
}

fn widget_rect(doc: &LoDocument, widget: ObjectId) -> Option<Rect> {
    let dict = doc.get_dictionary(widget).ok()?;
    let nums: Vec<f32> = resolve_array(doc, dict.get(b"Rect").ok()?)
        .iter()
        .filter_map(|obj| obj.as_float().ok())
        .collect();
    match nums.as_slice() {
        [x0, y0, x1, y1] => Some(Rect::from_corners(*x0, *y0, *x1, *y1)),
        _ => None,
    }
}

fn resolve_array(doc: &LoDocument, obj: &Object) -> Vec<Object> {
    match obj {
        Object::Array(items) => items.clone(),
        Object::Reference(id) => doc
            .get_object(*id)
            .and_then(Object::as_array)
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn resolve_dict(doc: &LoDocument, obj: &Object) -> Option<Dictionary> {
    match obj {
        Object::Dictionary(dict) => Some(dict.clone()),
        Object::Reference(id) => doc.get_dictionary(*id).ok().cloned(),
        _ => None,
    }
}

fn catalog_id(doc: &LoDocument) -> Result<ObjectId, RenderError> {
    Ok(doc.trailer.get(b"Root")?.as_reference()?)
}

fn acroform_dict(doc: &LoDocument) -> Option<Dictionary> {
    let catalog = doc.get_dictionary(catalog_id(doc).ok()?).ok()?;
    resolve_dict(doc, catalog.get(b"AcroForm").ok()?)
}

fn update_acroform(
    doc: &mut LoDocument,
    apply: impl FnOnce(&mut Dictionary),
) -> Result<(), RenderError> {
    let catalog = catalog_id(doc)?;
    let reference = doc
        .get_dictionary(catalog)?
        .get(b"AcroForm")
        .and_then(Object::as_reference)
        .ok();
    match reference {
        Some(id) => apply(doc.get_object_mut(id)?.as_dict_mut()?),
        None => {
            let catalog = doc.get_object_mut(catalog)?.as_dict_mut()?;
            let mut acroform = catalog
                .get(b"AcroForm")
                .and_then(Object::as_dict)
                .cloned()
                .unwrap_or_else(|_| dictionary! { "Fields" => Vec::<Object>::new() });
            apply(&mut acroform);
            catalog.set("AcroForm", acroform);
        }
    }
    Ok(())
}

/// Registers a WinAnsi Helvetica under `/DR /Font /Helv` and returns its id.
fn ensure_default_resources(doc: &mut LoDocument) -> Result<ObjectId, RenderError> {
    let existing = acroform_dict(doc).and_then(|acroform| {
        let dr = resolve_dict(doc, acroform.get(b"DR").ok()?)?;
        let fonts = resolve_dict(doc, dr.get(b"Font").ok()?)?;
        fonts.get(APPEARANCE_FONT.as_bytes()).and_then(Object::as_reference).ok()
    });
    if let Some(id) = existing {
        return Ok(id);
    }
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let mut dr = acroform_dict(doc)
        .and_then(|acroform| resolve_dict(doc, acroform.get(b"DR").ok()?))
        .unwrap_or_default();
    let mut fonts = dr
        .get(b"Font")
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
        .unwrap_or_default();
    fonts.set(APPEARANCE_FONT, font_id);
    dr.set("Font", fonts);
    update_acroform(doc, |acroform| {
        acroform.set("DR", dr);
        if !acroform.has(b"DA") {
            acroform.set("DA", Object::string_literal("/Helv 0 Tf 0 g"));
        }
    })?;
    Ok(font_id)
}

pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|b| *b as char).collect()
}

pub fn encode_text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn da_font_size(da: Option<&str>) -> Option<f32> {
    let tokens: Vec<&str> = da?.split_whitespace().collect();
    let at = tokens.iter().position(|token| *token == "Tf")?;
    tokens.get(at.checked_sub(1)?)?.parse().ok()
}

struct TextLayout {
    size: Pt,
    lines: Vec<String>,
    truncated: bool,
    quadding: i64,
}

impl TextLayout {
    fn single(field: &FormField, rect: Rect, text: String) -> Self {
        let inner_h = (rect.height - Pt::from_i32(2)).to_f32();
        let size = da_font_size(field.da.as_deref())
            .filter(|size| *size > 0.0)
            .unwrap_or_else(|| (inner_h / 1.2).clamp(AUTO_SIZE_MIN, AUTO_SIZE_MAX));
        Self {
            size: Pt::from_f32(size),
            lines: vec![text],
            truncated: false,
            quadding: field.quadding,
        }
    }
}

fn layout_appearance(field: &FormField, rect: Rect, text: &str) -> TextLayout {
    let inner_w = rect.width - Pt::from_i32(4);
    let inner_h = (rect.height - Pt::from_i32(2)).to_f32();
    let fixed = da_font_size(field.da.as_deref()).filter(|size| *size > 0.0);
    let multiline = matches!(field.kind, WidgetKind::Text { multiline: true });

    if multiline {
        let size = fixed.unwrap_or_else(|| (inner_h / 1.2).clamp(AUTO_SIZE_MIN, 10.0));
        let font = FontSpec::regular(size);
        let max_lines = ((inner_h / font.line_height().to_f32()).floor() as usize).max(1);
        let wrapped = wrap_text(text, inner_w, &font, max_lines);
        return TextLayout {
            size: font.size,
            truncated: wrapped.is_lossy(),
            lines: wrapped.lines,
            quadding: field.quadding,
        };
    }

    let line = text
        .split('\n')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    let mut size = fixed.unwrap_or_else(|| (inner_h / 1.2).clamp(AUTO_SIZE_MIN, AUTO_SIZE_MAX));
    if fixed.is_none() {
        while size > AUTO_SIZE_MIN && FontSpec::regular(size).measure(&line) > inner_w {
            size -= 0.5;
        }
    }
    let font = FontSpec::regular(size);
    let fitted = clamp_to_width(&line, inner_w, &font);
    TextLayout {
        size: font.size,
        lines: vec![fitted.text],
        truncated: fitted.truncated,
        quadding: field.quadding,
    }
}

fn text_appearance(rect: Rect, layout: &TextLayout, font_id: ObjectId) -> Stream {
    let font = FontSpec {
        size: layout.size,
        ..FontSpec::regular(0.0)
    };
    let mut out = String::from("/Tx BMC\n");
    let lines: Vec<&String> = layout.lines.iter().filter(|l| !l.is_empty()).collect();
    if !lines.is_empty() {
        let line_height = font.line_height();
        let first_baseline = if layout.lines.len() > 1 {
            rect.height - Pt::from_i32(2) - layout.size
        } else {
            (rect.height - layout.size) / 2 + layout.size.mul_ratio(1, 5)
        };
        out.push_str("q\nBT\n");
        out.push_str(&format!("/{} {} Tf\n0 g\n", APPEARANCE_FONT, fmt_pt(layout.size)));
        for (idx, line) in layout.lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let width = font.measure(line);
            let x = match layout.quadding {
                1 => (rect.width - width) / 2,
                2 => rect.width - Pt::from_i32(2) - width,
                _ => Pt::from_i32(2),
            };
            let y = first_baseline - line_height * idx as i32;
            out.push_str(&format!("1 0 0 1 {} {} Tm\n", fmt_pt(x), fmt_pt(y)));
            out.push_str(&format!("({}) Tj\n", encode_winansi_pdf_string(line).text));
        }
        out.push_str("ET\nQ\n");
    }
    out.push_str("EMC\n");
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), Object::Real(rect.width.to_f32()), Object::Real(rect.height.to_f32())],
            "Resources" => dictionary! {
                "Font" => dictionary! { APPEARANCE_FONT => font_id },
            },
        },
        out.into_bytes(),
    )
}

fn checkbox_appearance(rect: Rect, on: bool) -> Stream {
    let inset = Pt::from_f32(2.5);
    let content = if on {
        let (x0, y0) = (inset, inset);
        let (x1, y1) = (rect.width - inset, rect.height - inset);
        format!(
            "q\n0 g\n1.2 w\n{x0} {y0} m\n{x1} {y1} l\nS\n{x0} {y1} m\n{x1} {y0} l\nS\nQ\n",
            x0 = fmt_pt(x0),
            y0 = fmt_pt(y0),
            x1 = fmt_pt(x1),
            y1 = fmt_pt(y1),
        )
    } else {
        String::new()
    };
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), Object::Real(rect.width.to_f32()), Object::Real(rect.height.to_f32())],
        },
        content.into_bytes(),
    )
}

fn page_annotations(doc: &LoDocument, page_id: ObjectId) -> Vec<ObjectId> {
    doc.get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .map(|annots| resolve_array(doc, annots))
        .unwrap_or_default()
        .iter()
        .filter_map(|obj| obj.as_reference().ok())
        .collect()
}

/// Copies `source` into a new page inserted after `anchor`. Every widget on
/// the source page becomes a standalone terminal field named `{name}{suffix}`
/// with no value; other annotations are not copied.
pub fn clone_page_with_widgets(
    doc: &mut LoDocument,
    index: &FormIndex,
    source: ObjectId,
    anchor: ObjectId,
    suffix: &str,
) -> Result<ObjectId, RenderError> {
    let mut page = doc.get_dictionary(source)?.clone();
    page.remove(b"Annots");
    page.remove(b"Parent");
    let size = page_size(doc, source);
    page.set("MediaBox", crate::overlay::media_box(size));
    page.set("Resources", page_resources(doc, source));
    let page_id = insert_page_after(doc, anchor, page)?;

    let mut annots = Vec::new();
    for widget_id in page_annotations(doc, source) {
        let Some(owner) = index.widget_owner.get(&widget_id) else {
            continue;
        };
        let Some(field) = index.fields.get(owner) else {
            continue;
        };
        let mut widget = doc.get_dictionary(widget_id)?.clone();
        for key in [b"Parent".as_slice(), b"Kids".as_slice(), b"V".as_slice(), b"P".as_slice()] {
            widget.remove(key);
        }
        widget.set("T", encode_text_string(&format!("{}{}", field.name, suffix)));
        widget.set("P", page_id);
        let ft: &str = match field.kind {
            WidgetKind::Text { .. } => "Tx",
            WidgetKind::Checkbox { .. } => {
                widget.set("AS", Object::Name(b"Off".to_vec()));
                "Btn"
            }
            WidgetKind::Unsupported | WidgetKind::Missing => continue,
        };
        widget.set("FT", Object::Name(ft.as_bytes().to_vec()));
        widget.set("Ff", field.flags);
        if let Some(da) = &field.da {
            widget.set("DA", Object::string_literal(da.as_str()));
        }
        if field.quadding != 0 {
            widget.set("Q", field.quadding);
        }
        annots.push(Object::Reference(doc.add_object(widget)));
    }

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Annots", annots.clone());
    update_acroform(doc, |acroform| {
        let mut fields = acroform
            .get(b"Fields")
            .and_then(Object::as_array)
            .cloned()
            .unwrap_or_default();
        fields.extend(annots);
        acroform.set("Fields", fields);
    })?;
    Ok(page_id)
}

/// Copies the value of every `base` field that has a `{base}{suffix}` twin.
pub fn mirror_values(
    doc: &mut LoDocument,
    index: &FormIndex,
    suffix: &str,
    skip: impl Fn(&str) -> bool,
) -> Result<usize, RenderError> {
    let mut copied = 0usize;
    for name in index.names() {
        let Some(base) = name.strip_suffix(suffix) else {
            continue;
        };
        if skip(base) {
            continue;
        }
        let Some(value) = index.read_value(doc, base) else {
            continue;
        };
        match index.kind(name) {
            WidgetKind::Text { .. } if !value.is_empty() => {
                index.set_text(doc, name, &value)?;
                copied += 1;
            }
            WidgetKind::Checkbox { on_state } if value == on_state => {
                index.set_checkbox(doc, name, true)?;
                copied += 1;
            }
            _ => {}
        }
    }
    Ok(copied)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::overlay::{new_document, page_ids};
    use crate::types::Size;

    pub(crate) enum Spec<'a> {
        Text(&'a str, [f32; 4]),
        Multiline(&'a str, [f32; 4]),
        Checkbox(&'a str, [f32; 4]),
        Radio(&'a str, [f32; 4]),
    }

    fn rect_obj(r: [f32; 4]) -> Object {
        Object::Array(r.iter().map(|v| Object::Real(*v)).collect())
    }

    /// Builds a fillable template with the given widgets on page one.
    pub(crate) fn fillable(pages: usize, specs: &[Spec<'_>]) -> LoDocument {
        let mut doc = new_document(Size::a4(), pages).expect("doc");
        let page = page_ids(&doc)[0];
        let mut refs = Vec::new();
        for spec in specs {
            let dict = match spec {
                Spec::Text(name, r) => dictionary! {
                    "Type" => "Annot", "Subtype" => "Widget", "FT" => "Tx",
                    "T" => Object::string_literal(*name), "Rect" => rect_obj(*r),
                    "DA" => Object::string_literal("/Helv 0 Tf 0 g"), "P" => page,
                },
                Spec::Multiline(name, r) => dictionary! {
                    "Type" => "Annot", "Subtype" => "Widget", "FT" => "Tx",
                    "Ff" => FLAG_MULTILINE,
                    "T" => Object::string_literal(*name), "Rect" => rect_obj(*r),
                    "DA" => Object::string_literal("/Helv 9 Tf 0 g"), "P" => page,
                },
                Spec::Checkbox(name, r) => dictionary! {
                    "Type" => "Annot", "Subtype" => "Widget", "FT" => "Btn",
                    "T" => Object::string_literal(*name), "Rect" => rect_obj(*r),
                    "AS" => "Off", "P" => page,
                },
                Spec::Radio(name, r) => dictionary! {
                    "Type" => "Annot", "Subtype" => "Widget", "FT" => "Btn",
                    "Ff" => FLAG_RADIO,
                    "T" => Object::string_literal(*name), "Rect" => rect_obj(*r), "P" => page,
                },
            };
            refs.push(Object::Reference(doc.add_object(dict)));
        }
        doc.get_object_mut(page)
            .and_then(Object::as_dict_mut)
            .expect("page")
            .set("Annots", refs.clone());
        let acroform = doc.add_object(dictionary! { "Fields" => refs });
        let root = doc
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .expect("root");
        doc.get_object_mut(root)
            .and_then(Object::as_dict_mut)
            .expect("catalog")
            .set("AcroForm", acroform);
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{Spec, fillable};
    use super::*;
    use crate::overlay::page_ids;
    use crate::text::PLACEHOLDER;

    #[test]
    fn index_classifies_widgets_once() {
        let doc = fillable(
            1,
            &[
                Spec::Text("landlord_name", [50.0, 700.0, 250.0, 716.0]),
                Spec::Checkbox("co_alarm_fitted", [50.0, 650.0, 62.0, 662.0]),
                Spec::Radio("gas_type", [80.0, 650.0, 92.0, 662.0]),
            ],
        );
        let index = FormIndex::build(&doc);
        assert_eq!(index.len(), 3);
        assert_eq!(
            index.kind("landlord_name"),
            WidgetKind::Text { multiline: false }
        );
        assert_eq!(
            index.kind("co_alarm_fitted"),
            WidgetKind::Checkbox {
                on_state: "Yes".to_string()
            }
        );
        assert_eq!(index.kind("gas_type"), WidgetKind::Unsupported);
        assert_eq!(index.kind("does_not_exist"), WidgetKind::Missing);
    }

    #[test]
    fn hierarchical_names_are_joined_with_dots() {
        let mut doc = fillable(1, &[]);
        let page = page_ids(&doc)[0];
        let widget = doc.add_object(dictionary! {
            "Type" => "Annot", "Subtype" => "Widget",
            "Rect" => vec![0.into(), 0.into(), 100.into(), 20.into()], "P" => page,
        });
        let child = doc.add_object(dictionary! {
            "T" => Object::string_literal("name"), "Kids" => vec![Object::Reference(widget)],
        });
        let parent = doc.add_object(dictionary! {
            "T" => Object::string_literal("landlord"), "FT" => "Tx",
            "Kids" => vec![Object::Reference(child)],
        });
        update_acroform(&mut doc, |acroform| {
            acroform.set("Fields", vec![Object::Reference(parent)]);
        })
        .expect("acroform");
        let index = FormIndex::build(&doc);
        assert_eq!(
            index.kind("landlord.name"),
            WidgetKind::Text { multiline: false }
        );
    }

    #[test]
    fn text_value_round_trips() {
        let mut doc = fillable(1, &[Spec::Text("landlord_name", [50.0, 700.0, 250.0, 716.0])]);
        let index = FormIndex::build(&doc);
        let truncated = index
            .set_text(&mut doc, "landlord_name", "Priya Patel")
            .expect("write");
        assert!(!truncated);
        assert_eq!(
            index.read_value(&doc, "landlord_name").as_deref(),
            Some("Priya Patel")
        );
    }

    #[test]
    fn non_ascii_values_are_stored_as_utf16() {
        let mut doc = fillable(1, &[Spec::Text("notes", [50.0, 700.0, 250.0, 716.0])]);
        let index = FormIndex::build(&doc);
        index.set_text(&mut doc, "notes", "caf\u{e9} \u{2082}").expect("write");
        assert_eq!(
            index.read_value(&doc, "notes").as_deref(),
            Some("caf\u{e9} \u{2082}")
        );
    }

    #[test]
    fn overlong_text_reports_truncation() {
        let mut doc = fillable(1, &[Spec::Text("model", [50.0, 700.0, 90.0, 712.0])]);
        let index = FormIndex::build(&doc);
        let truncated = index
            .set_text(&mut doc, "model", "Worcester Bosch Greenstar 30i ErP combi")
            .expect("write");
        assert!(truncated);
    }

    #[test]
    fn checkbox_writes_state_and_rejects_text() {
        let mut doc = fillable(1, &[Spec::Checkbox("safe", [50.0, 650.0, 62.0, 662.0])]);
        let index = FormIndex::build(&doc);
        assert!(index.set_text(&mut doc, "safe", "Yes").is_err());
        index.set_checkbox(&mut doc, "safe", true).expect("check");
        index
            .regenerate_appearances(&mut doc, &BTreeSet::new(), PLACEHOLDER)
            .expect("regen");
        assert_eq!(index.read_value(&doc, "safe").as_deref(), Some("Yes"));
        let widget = index.field("safe").expect("field").widgets[0];
        let state = doc
            .get_dictionary(widget)
            .and_then(|w| w.get(b"AS"))
            .and_then(Object::as_name)
            .expect("as");
        assert_eq!(state, b"Yes");
    }

    #[test]
    fn regeneration_paints_placeholder_only_when_requested() {
        let mut doc = fillable(
            1,
            &[
                Spec::Text("a", [50.0, 700.0, 250.0, 716.0]),
                Spec::Text("b", [50.0, 650.0, 250.0, 666.0]),
            ],
        );
        let index = FormIndex::build(&doc);
        let placeholders: BTreeSet<String> = ["a".to_string()].into_iter().collect();
        let rebuilt = index
            .regenerate_appearances(&mut doc, &placeholders, PLACEHOLDER)
            .expect("regen");
        assert_eq!(rebuilt, 2);
        let appearance = |name: &str| {
            let widget = index.field(name).expect("field").widgets[0];
            let ap = doc
                .get_dictionary(widget)
                .and_then(|w| w.get(b"AP"))
                .and_then(Object::as_dict)
                .and_then(|ap| ap.get(b"N"))
                .and_then(Object::as_reference)
                .expect("ap");
            let stream = doc.get_object(ap).and_then(Object::as_stream).expect("stream");
            String::from_utf8_lossy(&stream.content).into_owned()
        };
        assert!(appearance("a").contains("(\\227) Tj"));
        assert!(!appearance("b").contains("Tj"));
        assert_eq!(index.read_value(&doc, "a"), None);
    }

    #[test]
    fn multiline_fields_wrap_into_several_lines() {
        let mut doc = fillable(1, &[Spec::Multiline("defects", [50.0, 600.0, 200.0, 660.0])]);
        let index = FormIndex::build(&doc);
        let truncated = index
            .set_text(
                &mut doc,
                "defects",
                "Flue terminal too close to opening window and no CO alarm in boiler room",
            )
            .expect("write");
        assert!(!truncated);
        index
            .regenerate_appearances(&mut doc, &BTreeSet::new(), PLACEHOLDER)
            .expect("regen");
        let widget = index.field("defects").expect("field").widgets[0];
        let ap = doc
            .get_dictionary(widget)
            .and_then(|w| w.get(b"AP"))
            .and_then(Object::as_dict)
            .and_then(|ap| ap.get(b"N"))
            .and_then(Object::as_reference)
            .expect("ap");
        let stream = doc.get_object(ap).and_then(Object::as_stream).expect("stream");
        let content = String::from_utf8_lossy(&stream.content);
        assert!(content.matches(" Tj").count() > 1);
    }

    #[test]
    fn cloned_page_gets_suffixed_blank_fields() {
        let mut doc = fillable(
            1,
            &[
                Spec::Text("app1_location", [50.0, 500.0, 150.0, 512.0]),
                Spec::Text("landlord_name", [50.0, 700.0, 250.0, 716.0]),
            ],
        );
        let index = FormIndex::build(&doc);
        index
            .set_text(&mut doc, "landlord_name", "Priya Patel")
            .expect("write");
        let source = page_ids(&doc)[0];
        let clone = clone_page_with_widgets(&mut doc, &index, source, source, "_p2")
            .expect("clone");
        assert_eq!(page_ids(&doc), vec![source, clone]);

        let index = FormIndex::build(&doc);
        assert!(matches!(index.kind("app1_location_p2"), WidgetKind::Text { .. }));
        assert_eq!(index.read_value(&doc, "app1_location_p2"), None);
        assert_eq!(
            index.fields_on_page(&doc, clone),
            vec!["app1_location_p2".to_string(), "landlord_name_p2".to_string()]
        );

        let copied = mirror_values(&mut doc, &index, "_p2", |base| base.starts_with("app"))
            .expect("mirror");
        assert_eq!(copied, 1);
        assert_eq!(
            index.read_value(&doc, "landlord_name_p2").as_deref(),
            Some("Priya Patel")
        );
    }

    #[test]
    fn da_font_size_reads_operand_before_tf() {
        assert_eq!(da_font_size(Some("/Helv 9 Tf 0 g")), Some(9.0));
        assert_eq!(da_font_size(Some("0 g")), None);
        assert_eq!(da_font_size(None), None);
    }
}

use crate::canvas::Document;
use crate::content::render_page;
use crate::error::RenderError;
use crate::signature::ImageData;
use crate::text::Face;
use crate::types::Size;
use lopdf::{Dictionary, Document as LoDocument, Object, ObjectId, Stream, dictionary};
use std::collections::BTreeMap;

const MAX_INHERIT_DEPTH: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StampSummary {
    pub pages_stamped: usize,
    pub replaced_chars: usize,
}

fn pdf_err(message: impl Into<String>) -> RenderError {
    RenderError::Pdf(message.into())
}

/// Empty single-tree document with `pages` blank pages of `size`.
pub fn new_document(size: Size, pages: usize) -> Result<LoDocument, RenderError> {
    let mut doc = LoDocument::with_version("1.7");
    let pages_id = doc.new_object_id();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    for _ in 0..pages.max(1) {
        append_blank_page(&mut doc, size)?;
    }
    Ok(doc)
}

pub fn media_box(size: Size) -> Vec<Object> {
    vec![
        0.into(),
        0.into(),
        Object::Real(size.width.to_f32()),
        Object::Real(size.height.to_f32()),
    ]
}

pub fn page_ids(doc: &LoDocument) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

fn root_pages_id(doc: &LoDocument) -> Result<ObjectId, RenderError> {
    let root = doc.trailer.get(b"Root")?.as_reference()?;
    let catalog = doc.get_dictionary(root)?;
    Ok(catalog.get(b"Pages")?.as_reference()?)
}

pub fn append_blank_page(doc: &mut LoDocument, size: Size) -> Result<ObjectId, RenderError> {
    let pages_id = root_pages_id(doc)?;
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => media_box(size),
        "Resources" => Dictionary::new(),
    });
    let pages = doc.get_object_mut(pages_id)?.as_dict_mut()?;
    let mut kids = pages.get(b"Kids").and_then(Object::as_array).cloned().unwrap_or_default();
    kids.push(Object::Reference(page_id));
    pages.set("Kids", kids);
    bump_count(doc, pages_id)?;
    Ok(page_id)
}

/// Adds `page` to the tree directly after `anchor`, sharing its parent node.
pub fn insert_page_after(
    doc: &mut LoDocument,
    anchor: ObjectId,
    mut page: Dictionary,
) -> Result<ObjectId, RenderError> {
    let parent_id = doc.get_dictionary(anchor)?.get(b"Parent")?.as_reference()?;
    page.set("Parent", parent_id);
    let page_id = doc.add_object(page);
    let parent = doc.get_object_mut(parent_id)?.as_dict_mut()?;
    let mut kids = parent.get(b"Kids").and_then(Object::as_array).cloned().unwrap_or_default();
    let at = kids
        .iter()
        .position(|kid| kid.as_reference().ok() == Some(anchor))
        .map(|idx| idx + 1)
        .unwrap_or(kids.len());
    kids.insert(at, Object::Reference(page_id));
    parent.set("Kids", kids);
    bump_count(doc, parent_id)?;
    Ok(page_id)
}

fn bump_count(doc: &mut LoDocument, start: ObjectId) -> Result<(), RenderError> {
    let mut node = Some(start);
    let mut depth = 0;
    while let Some(id) = node {
        if depth > MAX_INHERIT_DEPTH {
            return Err(pdf_err("page tree is too deep"));
        }
        let dict = doc.get_object_mut(id)?.as_dict_mut()?;
        let count = dict.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
        dict.set("Count", count + 1);
        node = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
    Ok(())
}

/// Looks `key` up on the page, then up its Parent chain.
pub fn inherited_attribute(doc: &LoDocument, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node = Some(page_id);
    let mut depth = 0;
    while let Some(id) = node {
        if depth > MAX_INHERIT_DEPTH {
            return None;
        }
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        node = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
    None
}

fn resolve_dict(doc: &LoDocument, obj: Option<Object>) -> Dictionary {
    match obj {
        Some(Object::Dictionary(dict)) => dict,
        Some(Object::Reference(id)) => doc.get_dictionary(id).cloned().unwrap_or_default(),
        _ => Dictionary::new(),
    }
}

fn page_box(doc: &LoDocument, page_id: ObjectId) -> Vec<Object> {
    for key in [b"CropBox".as_slice(), b"MediaBox".as_slice()] {
        match inherited_attribute(doc, page_id, key) {
            Some(Object::Array(arr)) => return arr,
            Some(Object::Reference(id)) => {
                if let Ok(arr) = doc.get_object(id).and_then(Object::as_array) {
                    return arr.clone();
                }
            }
            _ => {}
        }
    }
    media_box(Size::a4())
}

pub fn page_size(doc: &LoDocument, page_id: ObjectId) -> Size {
    let nums: Vec<f32> = page_box(doc, page_id)
        .iter()
        .filter_map(|obj| obj.as_float().ok())
        .collect();
    match nums.as_slice() {
        [x0, y0, x1, y1] => Size::new((x1 - x0).abs(), (y1 - y0).abs()),
        _ => Size::a4(),
    }
}

pub fn page_resources(doc: &LoDocument, page_id: ObjectId) -> Dictionary {
    resolve_dict(doc, inherited_attribute(doc, page_id, b"Resources"))
}

/// Stamps every non-empty overlay page onto the matching page of `doc` as a
/// Form XObject drawn after the existing content.
pub fn stamp_overlay(
    doc: &mut LoDocument,
    overlay: &Document,
    images: &BTreeMap<String, ImageData>,
) -> Result<StampSummary, RenderError> {
    let targets = page_ids(doc);
    if overlay.pages.len() > targets.len() {
        return Err(pdf_err(format!(
            "overlay has {} pages but document has {}",
            overlay.pages.len(),
            targets.len()
        )));
    }

    let mut font_ids: BTreeMap<Face, ObjectId> = BTreeMap::new();
    let mut image_ids: BTreeMap<String, ObjectId> = BTreeMap::new();
    let mut summary = StampSummary::default();

    for (idx, page) in overlay.pages.iter().enumerate() {
        if page.is_empty() {
            continue;
        }
        let target = targets[idx];
        let content = render_page(page);
        summary.replaced_chars += content.replaced_chars;

        let mut fonts = Dictionary::new();
        for face in &content.resources.fonts {
            let id = match font_ids.get(face) {
                Some(id) => *id,
                None => {
                    let id = doc.add_object(dictionary! {
                        "Type" => "Font",
                        "Subtype" => "Type1",
                        "BaseFont" => face.base_font(),
                        "Encoding" => "WinAnsiEncoding",
                    });
                    font_ids.insert(*face, id);
                    id
                }
            };
            fonts.set(face.resource_name(), id);
        }

        let mut xobjects = Dictionary::new();
        for resource_id in &content.resources.images {
            let id = match image_ids.get(resource_id) {
                Some(id) => *id,
                None => {
                    let image = images.get(resource_id).ok_or_else(|| {
                        pdf_err(format!("image resource {resource_id} was never registered"))
                    })?;
                    let id = image.add_to(doc);
                    image_ids.insert(resource_id.clone(), id);
                    id
                }
            };
            xobjects.set(resource_id.as_bytes().to_vec(), id);
        }

        let mut form = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "FormType" => 1,
                "BBox" => page_box(doc, target),
                "Resources" => dictionary! {
                    "Font" => fonts,
                    "XObject" => xobjects,
                },
            },
            content.bytes,
        );
        let _ = form.compress();
        let form_id = doc.add_object(form);
        let form_name = format!("CR_OVL_{}", idx + 1);

        let mut resources = page_resources(doc, target);
        let mut page_xobjects = resolve_dict(doc, resources.get(b"XObject").ok().cloned());
        page_xobjects.set(form_name.as_bytes().to_vec(), form_id);
        resources.set("XObject", page_xobjects);
        doc.get_object_mut(target)?
            .as_dict_mut()?
            .set("Resources", resources);

        let invoke = format!("q /{} Do Q\n", form_name).into_bytes();
        doc.add_page_contents(target, invoke)?;
        summary.pages_stamped += 1;
    }

    Ok(summary)
}

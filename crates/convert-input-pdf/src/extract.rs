//! Embedded image extraction.
//!
//! Walks pages in order, collects every image XObject reachable from each
//! page's resources (including images drawn through Form XObjects), then
//! decodes them in parallel. Output order is page order, then resource
//! dictionary order within the page.

use std::collections::HashSet;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use rayon::prelude::*;

use convert_core::document::{ExtractedImage, SourceImages};
use convert_core::error::{ConvertError, Result};
use convert_core::options::ConversionOptions;

use crate::colorspace::{color_model, ColorModel};
use crate::decode::RawImage;
use crate::filters::{FilterSpec, PredictorParams};

/// Where an image came from, for error messages.
#[derive(Debug, Clone, Copy)]
struct ImageLocation {
    page: u32,
    index_on_page: usize,
    object: ObjectId,
}

/// Extract and decode every embedded image of the PDF at `path`.
pub fn extract_images(path: &Path, _options: &ConversionOptions) -> Result<SourceImages> {
    let doc = Document::load(path)
        .map_err(|e| ConvertError::Pdf(format!("Failed to load PDF: {}", e)))?;

    let pages = doc.get_pages();
    log::info!("PDF has {} pages", pages.len());

    // Copy what decoding needs out of the object graph.
    let mut raw_images: Vec<(ImageLocation, RawImage)> = Vec::new();
    for (&page_num, &page_id) in &pages {
        let Some(resources) = page_resources(&doc, page_id) else {
            log::warn!("Page {}: no readable /Resources", page_num);
            continue;
        };
        let mut ids = Vec::new();
        collect_images(&doc, resources, &mut HashSet::new(), &mut ids);
        log::debug!("Page {}: {} images", page_num, ids.len());

        for (index_on_page, &id) in ids.iter().enumerate() {
            let location = ImageLocation {
                page: page_num,
                index_on_page,
                object: id,
            };
            let stream = doc
                .get_object(id)
                .and_then(Object::as_stream)
                .map_err(|e| ConvertError::Pdf(format!("Image object {:?} unreadable: {}", id, e)))?;
            let raw = raw_image(&doc, &stream.dict, &stream.content)
                .map_err(|e| located(e, &location))?;
            raw_images.push((location, raw));
        }
    }

    log::info!("Decoding {} embedded images", raw_images.len());

    let decoded: Vec<Result<ExtractedImage>> = raw_images
        .par_iter()
        .map(|(location, raw)| {
            raw.decode()
                .map(|image| ExtractedImage::new(location.page, location.index_on_page, image))
                .map_err(|e| located(e, location))
        })
        .collect();

    let images = decoded.into_iter().collect::<Result<Vec<_>>>()?;
    Ok(SourceImages { images })
}

fn located(err: ConvertError, location: &ImageLocation) -> ConvertError {
    match err {
        ConvertError::Image(msg) => ConvertError::Image(format!(
            "page {} image {} (object {} {}): {}",
            location.page,
            location.index_on_page + 1,
            location.object.0,
            location.object.1,
            msg
        )),
        other => other,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn dict_entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    dict.get(key)
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
}

/// The `/Resources` in effect for a page: its own, or the nearest ancestor's.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut visited = HashSet::new();
    let mut node_id = page_id;
    while visited.insert(node_id) {
        let node = doc.get_dictionary(node_id).ok()?;
        if node.has(b"Resources") {
            return dict_entry(doc, node, b"Resources");
        }
        node_id = node.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

/// Image XObjects reachable from `resources`, in dictionary order.
///
/// Form XObjects are entered where they appear; `seen` keeps each object to
/// one entry per page and stops self-referencing forms.
fn collect_images(
    doc: &Document,
    resources: &Dictionary,
    seen: &mut HashSet<ObjectId>,
    out: &mut Vec<ObjectId>,
) {
    let Some(xobjects) = dict_entry(doc, resources, b"XObject") else {
        return;
    };
    for (_, value) in xobjects.iter() {
        let Ok(id) = value.as_reference() else {
            continue;
        };
        if !seen.insert(id) {
            continue;
        }
        let Ok(stream) = doc.get_object(id).and_then(Object::as_stream) else {
            log::warn!("XObject {} {} is not a stream", id.0, id.1);
            continue;
        };
        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => out.push(id),
            Ok(b"Form") => {
                // A form without its own resources uses the page's, already scanned.
                if let Some(inner) = dict_entry(doc, &stream.dict, b"Resources") {
                    collect_images(doc, inner, seen, out);
                }
            }
            _ => {}
        }
    }
}

fn dimension(doc: &Document, dict: &Dictionary, key: &[u8]) -> Result<u32> {
    let value = dict
        .get(key)
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_i64().ok())
        .ok_or_else(|| {
            ConvertError::Image(format!("Missing /{}", String::from_utf8_lossy(key)))
        })?;
    u32::try_from(value)
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| {
            ConvertError::Image(format!(
                "Invalid /{} {}",
                String::from_utf8_lossy(key),
                value
            ))
        })
}

fn raw_image(doc: &Document, dict: &Dictionary, content: &[u8]) -> Result<RawImage> {
    let width = dimension(doc, dict, b"Width")?;
    let height = dimension(doc, dict, b"Height")?;

    let filters = filter_chain(doc, dict);
    let is_jpeg = filters
        .last()
        .is_some_and(|f| f.name == "DCTDecode" || f.name == "DCT");
    let is_mask = dict
        .get(b"ImageMask")
        .and_then(Object::as_bool)
        .unwrap_or(false);

    let bits_per_component = if is_mask {
        1
    } else {
        dict.get(b"BitsPerComponent")
            .and_then(Object::as_i64)
            .unwrap_or(8) as u8
    };

    let color = if is_mask {
        Some(ColorModel::Gray)
    } else {
        match dict.get(b"ColorSpace") {
            Ok(cs) => Some(color_model(doc, cs)?),
            // JPEG streams carry their own colour model.
            Err(_) if is_jpeg => None,
            Err(_) => return Err(ConvertError::Image("Missing /ColorSpace".to_string())),
        }
    };

    Ok(RawImage {
        width,
        height,
        bits_per_component,
        color,
        invert: decode_inverted(dict),
        filters,
        data: content.to_vec(),
    })
}

/// `/Decode [1 0]`: the first component is stored inverted.
fn decode_inverted(dict: &Dictionary) -> bool {
    let Ok(array) = dict.get(b"Decode").and_then(Object::as_array) else {
        return false;
    };
    let values: Vec<f32> = array.iter().filter_map(|v| v.as_float().ok()).collect();
    values.len() == 2 && values[0] > values[1]
}

fn filter_chain(doc: &Document, dict: &Dictionary) -> Vec<FilterSpec> {
    let deref = |obj: &Object| -> Option<Object> {
        match obj {
            Object::Reference(id) => doc.get_object(*id).ok().cloned(),
            other => Some(other.clone()),
        }
    };

    let names: Vec<String> = match dict.get(b"Filter").ok().and_then(deref) {
        Some(Object::Name(name)) => vec![String::from_utf8_lossy(&name).to_string()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string())
            .collect(),
        _ => Vec::new(),
    };

    let params: Vec<Option<Object>> = match dict.get(b"DecodeParms").ok().and_then(deref) {
        Some(Object::Array(items)) => items.iter().map(deref).collect(),
        Some(single) => vec![Some(single)],
        None => Vec::new(),
    };

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let mut spec = FilterSpec::new(name);
            if let Some(Some(Object::Dictionary(p))) = params.get(i) {
                spec.params = predictor_params(p);
            }
            spec
        })
        .collect()
}

fn predictor_params(dict: &Dictionary) -> PredictorParams {
    let int = |key: &[u8], default: i64| {
        dict.get(key)
            .and_then(Object::as_i64)
            .unwrap_or(default)
    };
    PredictorParams {
        predictor: int(b"Predictor", 1),
        colors: int(b"Colors", 1).max(1) as usize,
        bits_per_component: int(b"BitsPerComponent", 8).max(1) as usize,
        columns: int(b"Columns", 1).max(1) as usize,
    }
}

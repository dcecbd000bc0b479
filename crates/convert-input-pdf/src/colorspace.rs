//! Resolution of an image's `/ColorSpace` entry into a pixel model.

use lopdf::{Document, Object};

use convert_core::error::{ConvertError, Result};

use crate::filters::{apply_filters, FilterSpec, Payload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorModel {
    Gray,
    Rgb,
    Cmyk,
    /// Palette of `base` colours; `lookup` holds `hival + 1` entries.
    Indexed {
        base: Box<ColorModel>,
        hival: usize,
        lookup: Vec<u8>,
    },
}

impl ColorModel {
    /// Samples per pixel in the image data.
    pub fn components(&self) -> usize {
        match self {
            ColorModel::Gray | ColorModel::Indexed { .. } => 1,
            ColorModel::Rgb => 3,
            ColorModel::Cmyk => 4,
        }
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    match obj {
        Object::Reference(id) => doc
            .get_object(*id)
            .map_err(|e| ConvertError::Pdf(format!("Broken reference {:?}: {}", id, e))),
        other => Ok(other),
    }
}

fn name_of(obj: &Object) -> Option<String> {
    obj.as_name()
        .ok()
        .map(|n| String::from_utf8_lossy(n).to_string())
}

fn device_model(name: &str) -> Option<ColorModel> {
    match name {
        "DeviceGray" | "G" | "CalGray" => Some(ColorModel::Gray),
        "DeviceRGB" | "RGB" | "CalRGB" => Some(ColorModel::Rgb),
        "DeviceCMYK" | "CMYK" => Some(ColorModel::Cmyk),
        _ => None,
    }
}

/// Resolve a colour space object (name, array or reference to either).
pub fn color_model(doc: &Document, obj: &Object) -> Result<ColorModel> {
    let obj = resolve(doc, obj)?;

    if let Some(name) = name_of(obj) {
        return device_model(&name)
            .ok_or_else(|| ConvertError::Image(format!("Unsupported colour space: {}", name)));
    }

    let array = obj
        .as_array()
        .map_err(|_| ConvertError::Image(format!("Malformed colour space: {:?}", obj)))?;
    let family = array
        .first()
        .and_then(name_of)
        .ok_or_else(|| ConvertError::Image("Empty colour space array".to_string()))?;

    if let Some(model) = device_model(&family) {
        return Ok(model);
    }

    match family.as_str() {
        "ICCBased" => {
            let profile = array
                .get(1)
                .ok_or_else(|| ConvertError::Image("ICCBased without profile".to_string()))?;
            let stream = resolve(doc, profile)?
                .as_stream()
                .map_err(|_| ConvertError::Image("ICCBased profile is not a stream".to_string()))?;
            match stream.dict.get(b"N").and_then(Object::as_i64) {
                Ok(1) => Ok(ColorModel::Gray),
                Ok(3) => Ok(ColorModel::Rgb),
                Ok(4) => Ok(ColorModel::Cmyk),
                other => Err(ConvertError::Image(format!(
                    "ICCBased profile with unsupported /N {:?}",
                    other.ok()
                ))),
            }
        }
        "Indexed" | "I" => indexed_model(doc, array),
        other => Err(ConvertError::Image(format!(
            "Unsupported colour space: {}",
            other
        ))),
    }
}

fn indexed_model(doc: &Document, array: &[Object]) -> Result<ColorModel> {
    if array.len() < 4 {
        return Err(ConvertError::Image(
            "Indexed colour space needs base, hival and lookup".to_string(),
        ));
    }

    let base = color_model(doc, &array[1])?;
    if matches!(base, ColorModel::Indexed { .. }) {
        return Err(ConvertError::Image("Nested Indexed colour space".to_string()));
    }
    let hival = resolve(doc, &array[2])?
        .as_i64()
        .map_err(|_| ConvertError::Image("Indexed hival is not an integer".to_string()))?
        .clamp(0, 255) as usize;

    let lookup = match resolve(doc, &array[3])? {
        Object::String(bytes, _) => bytes.clone(),
        Object::Stream(stream) => {
            let filters = stream_filters(&stream.dict);
            match apply_filters(&stream.content, &filters)? {
                (data, Payload::Samples) => data,
                (_, Payload::Jpeg) => {
                    return Err(ConvertError::Image(
                        "JPEG-encoded palette is not supported".to_string(),
                    ))
                }
            }
        }
        other => {
            return Err(ConvertError::Image(format!(
                "Unsupported Indexed lookup: {:?}",
                other
            )))
        }
    };

    let needed = (hival + 1) * base.components();
    if lookup.len() < needed {
        return Err(ConvertError::Image(format!(
            "Indexed lookup has {} bytes, expected {}",
            lookup.len(),
            needed
        )));
    }

    Ok(ColorModel::Indexed {
        base: Box::new(base),
        hival,
        lookup,
    })
}

/// Filter chain of a palette stream. Predictors are not expected here.
fn stream_filters(dict: &lopdf::Dictionary) -> Vec<FilterSpec> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![FilterSpec::new(String::from_utf8_lossy(name))],
        Ok(Object::Array(names)) => names
            .iter()
            .filter_map(name_of)
            .map(FilterSpec::new)
            .collect(),
        _ => Vec::new(),
    }
}

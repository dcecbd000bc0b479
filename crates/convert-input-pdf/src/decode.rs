//! Turns the bytes of one image XObject into pixels.
//!
//! Everything needed from the PDF object graph is copied into [`RawImage`]
//! first so decoding can run off the `Document` on a rayon worker.

use image::{DynamicImage, GrayImage, RgbImage};

use convert_core::error::{ConvertError, Result};

use crate::colorspace::ColorModel;
use crate::filters::{apply_filters, FilterSpec, Payload};

#[derive(Debug, Clone)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    /// `None` for JPEG streams, where the decoder reads the colour model itself.
    pub color: Option<ColorModel>,
    /// `/Decode [1 0]` on a single-component image.
    pub invert: bool,
    pub filters: Vec<FilterSpec>,
    pub data: Vec<u8>,
}

impl RawImage {
    pub fn decode(&self) -> Result<DynamicImage> {
        let (payload, kind) = apply_filters(&self.data, &self.filters)?;
        match kind {
            Payload::Jpeg => image::load_from_memory_with_format(&payload, image::ImageFormat::Jpeg)
                .map_err(|e| ConvertError::Image(format!("JPEG decode failed: {}", e))),
            Payload::Samples => self.decode_samples(&payload),
        }
    }

    fn decode_samples(&self, payload: &[u8]) -> Result<DynamicImage> {
        let color = self
            .color
            .as_ref()
            .ok_or_else(|| ConvertError::Image("Image has no colour space".to_string()))?;
        let samples = unpack_samples(
            payload,
            self.width as usize,
            self.height as usize,
            color.components(),
            self.bits_per_component,
        )?;

        let max = max_sample(self.bits_per_component);
        let scale = |v: u8| -> u8 {
            if self.bits_per_component >= 8 {
                v
            } else {
                (v as u32 * 255 / max) as u8
            }
        };

        match color {
            ColorModel::Gray => {
                let pixels: Vec<u8> = samples
                    .iter()
                    .map(|&v| {
                        let g = scale(v);
                        if self.invert {
                            255 - g
                        } else {
                            g
                        }
                    })
                    .collect();
                self.gray(pixels)
            }
            ColorModel::Rgb => {
                let pixels: Vec<u8> = samples.iter().map(|&v| scale(v)).collect();
                self.rgb(pixels)
            }
            ColorModel::Cmyk => {
                let pixels: Vec<u8> = samples
                    .chunks_exact(4)
                    .flat_map(|px| {
                        let [c, m, y, k] = [scale(px[0]), scale(px[1]), scale(px[2]), scale(px[3])];
                        cmyk_to_rgb(c, m, y, k)
                    })
                    .collect();
                self.rgb(pixels)
            }
            ColorModel::Indexed {
                base,
                hival,
                lookup,
            } => {
                let n = base.components();
                let mut pixels = Vec::with_capacity(samples.len() * 3);
                for &index in &samples {
                    let i = (index as usize).min(*hival) * n;
                    let entry = &lookup[i..i + n];
                    match base.as_ref() {
                        ColorModel::Gray => pixels.extend_from_slice(&[entry[0]; 3]),
                        ColorModel::Rgb => pixels.extend_from_slice(entry),
                        ColorModel::Cmyk => pixels
                            .extend_from_slice(&cmyk_to_rgb(entry[0], entry[1], entry[2], entry[3])),
                        ColorModel::Indexed { .. } => {
                            return Err(ConvertError::Image(
                                "Nested Indexed colour space".to_string(),
                            ))
                        }
                    }
                }
                self.rgb(pixels)
            }
        }
    }

    fn gray(&self, pixels: Vec<u8>) -> Result<DynamicImage> {
        GrayImage::from_raw(self.width, self.height, pixels)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| self.size_mismatch())
    }

    fn rgb(&self, pixels: Vec<u8>) -> Result<DynamicImage> {
        RgbImage::from_raw(self.width, self.height, pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| self.size_mismatch())
    }

    fn size_mismatch(&self) -> ConvertError {
        ConvertError::Image(format!(
            "Sample data does not fill a {}x{} image",
            self.width, self.height
        ))
    }
}

fn max_sample(bits: u8) -> u32 {
    (1u32 << bits.min(8)) - 1
}

fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let k = 255 - k as u32;
    [
        ((255 - c as u32) * k / 255) as u8,
        ((255 - m as u32) * k / 255) as u8,
        ((255 - y as u32) * k / 255) as u8,
    ]
}

/// Split packed rows into one byte per sample.
///
/// Rows are padded to a byte boundary. 16-bit samples keep their high byte.
fn unpack_samples(
    data: &[u8],
    width: usize,
    height: usize,
    components: usize,
    bits: u8,
) -> Result<Vec<u8>> {
    let per_row = width * components;
    let row_bytes = (per_row * bits as usize).div_ceil(8);
    let needed = row_bytes * height;
    if data.len() < needed {
        return Err(ConvertError::Image(format!(
            "Image data is {} bytes, expected {}",
            data.len(),
            needed
        )));
    }

    let mut samples = Vec::with_capacity(per_row * height);
    for row in data.chunks(row_bytes).take(height) {
        match bits {
            8 => samples.extend_from_slice(&row[..per_row]),
            16 => samples.extend(row.chunks_exact(2).take(per_row).map(|pair| pair[0])),
            1 | 2 | 4 => {
                let mask = max_sample(bits) as u8;
                let per_byte = 8 / bits as usize;
                for i in 0..per_row {
                    let byte = row[i / per_byte];
                    let shift = 8 - bits as usize * (i % per_byte + 1);
                    samples.push((byte >> shift) & mask);
                }
            }
            other => {
                return Err(ConvertError::Image(format!(
                    "Unsupported bits per component: {}",
                    other
                )))
            }
        }
    }
    Ok(samples)
}

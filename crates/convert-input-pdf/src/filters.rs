//! Stream filters for image XObjects.
//!
//! Only the lossless transport filters are undone here. `DCTDecode` is left
//! for the JPEG decoder and must be the last filter in the chain; every other
//! image codec is rejected.

use std::io::Read;

use convert_core::error::{ConvertError, Result};

/// `/DecodeParms` entries relevant to Flate/LZW predictors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorParams {
    pub predictor: i64,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

impl PredictorParams {
    fn bytes_per_pixel(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }

    fn row_bytes(&self) -> usize {
        (self.colors * self.bits_per_component * self.columns).div_ceil(8)
    }
}

/// One entry of a stream's `/Filter` chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub name: String,
    pub params: PredictorParams,
}

impl FilterSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: PredictorParams::default(),
        }
    }
}

/// What the bytes are once the transport filters have been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Uncompressed samples, row by row.
    Samples,
    /// A complete JPEG file.
    Jpeg,
}

/// Undo the filter chain, returning the payload bytes and their kind.
pub fn apply_filters(data: &[u8], filters: &[FilterSpec]) -> Result<(Vec<u8>, Payload)> {
    let mut current = data.to_vec();

    for (i, filter) in filters.iter().enumerate() {
        let is_last = i + 1 == filters.len();
        current = match filter.name.as_str() {
            "FlateDecode" | "Fl" => unpredict(&inflate(&current)?, &filter.params)?,
            "LZWDecode" | "LZW" => unpredict(&decode_lzw(&current)?, &filter.params)?,
            "DCTDecode" | "DCT" if is_last => return Ok((current, Payload::Jpeg)),
            other => {
                return Err(ConvertError::Image(format!(
                    "Unsupported image encoding: {}",
                    other
                )))
            }
        };
    }

    Ok((current, Payload::Samples))
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut output = Vec::new();
    match decoder.read_to_end(&mut output) {
        Ok(_) => Ok(output),
        // Truncated streams are common; keep what was recovered.
        Err(e) if !output.is_empty() => {
            log::warn!(
                "FlateDecode stopped after {} bytes: {}",
                output.len(),
                e
            );
            Ok(output)
        }
        Err(e) => Err(ConvertError::Image(format!("FlateDecode failed: {}", e))),
    }
}

fn decode_lzw(data: &[u8]) -> Result<Vec<u8>> {
    weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
        .decode(data)
        .map_err(|e| ConvertError::Image(format!("LZWDecode failed: {:?}", e)))
}

/// Reverse a TIFF (2) or PNG (10-15) predictor.
fn unpredict(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => unpredict_tiff(data, params),
        10..=15 => unpredict_png(data, params),
        other => Err(ConvertError::Image(format!("Unknown predictor {}", other))),
    }
}

fn unpredict_tiff(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(ConvertError::Image(format!(
            "TIFF predictor with {} bits per component is not supported",
            params.bits_per_component
        )));
    }
    let row_bytes = params.row_bytes();
    let bpp = params.bytes_per_pixel();
    let mut output = data.to_vec();
    for row in output.chunks_mut(row_bytes) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    Ok(output)
}

fn unpredict_png(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    let row_bytes = params.row_bytes();
    let bpp = params.bytes_per_pixel();
    let stride = row_bytes + 1;

    let mut output: Vec<u8> = Vec::with_capacity(data.len() / stride * row_bytes);
    let mut prev = vec![0u8; row_bytes];

    for encoded in data.chunks(stride) {
        if encoded.len() < stride {
            log::warn!("Dropping short predictor row ({} bytes)", encoded.len());
            break;
        }
        let tag = encoded[0];
        let mut row = encoded[1..].to_vec();

        for i in 0..row_bytes {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => {
                    return Err(ConvertError::Image(format!(
                        "Invalid PNG predictor tag {}",
                        other
                    )))
                }
            };
            row[i] = row[i].wrapping_add(predicted);
        }

        output.extend_from_slice(&row);
        prev = row;
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_no_filters_is_raw_samples() {
        let (data, payload) = apply_filters(&[1, 2, 3], &[]).unwrap();
        assert_eq!(data, vec![1, 2, 3]);
        assert_eq!(payload, Payload::Samples);
    }

    #[test]
    fn test_flate() {
        let raw: Vec<u8> = (0..=255).collect();
        let (data, payload) =
            apply_filters(&zlib(&raw), &[FilterSpec::new("FlateDecode")]).unwrap();
        assert_eq!(data, raw);
        assert_eq!(payload, Payload::Samples);
    }

    #[test]
    fn test_dct_passthrough_only_when_last() {
        let (data, payload) = apply_filters(b"jpeg", &[FilterSpec::new("DCTDecode")]).unwrap();
        assert_eq!(data, b"jpeg");
        assert_eq!(payload, Payload::Jpeg);

        let chained = [FilterSpec::new("DCTDecode"), FilterSpec::new("FlateDecode")];
        assert!(apply_filters(b"jpeg", &chained).is_err());
    }

    #[test]
    fn test_unsupported_codecs() {
        for name in ["JPXDecode", "CCITTFaxDecode", "JBIG2Decode"] {
            let err = apply_filters(b"x", &[FilterSpec::new(name)]).unwrap_err();
            assert!(err.to_string().contains(name));
        }
    }

    #[test]
    fn test_png_up_predictor() {
        // Two rows of 3 gray pixels; second row encoded with "Up" (tag 2).
        let encoded = [0u8, 10, 20, 30, 2, 1, 1, 1];
        let params = PredictorParams {
            predictor: 12,
            colors: 1,
            bits_per_component: 8,
            columns: 3,
        };
        let decoded = unpredict(&encoded, &params).unwrap();
        assert_eq!(decoded, vec![10, 20, 30, 11, 21, 31]);
    }

    #[test]
    fn test_png_sub_and_paeth() {
        let params = PredictorParams {
            predictor: 15,
            colors: 1,
            bits_per_component: 8,
            columns: 3,
        };
        // Row 1: Sub → 5, 7, 9. Row 2: Paeth with all deltas 0 copies row 1.
        let encoded = [1u8, 5, 2, 2, 4, 0, 0, 0];
        let decoded = unpredict(&encoded, &params).unwrap();
        assert_eq!(decoded, vec![5, 7, 9, 5, 7, 9]);
    }

    #[test]
    fn test_tiff_predictor() {
        let params = PredictorParams {
            predictor: 2,
            colors: 1,
            bits_per_component: 8,
            columns: 4,
        };
        let decoded = unpredict(&[10, 1, 1, 1], &params).unwrap();
        assert_eq!(decoded, vec![10, 11, 12, 13]);
    }
}

//! WASM bindings for figure extraction.
//!
//! This crate provides WebAssembly bindings for use in browsers and Node.js.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use figcap_core::figure::{parse_crop_tags, CropTag};
use figcap_core::{
    DecodedImage, FigcapConfig, FigurePipeline, MemoryBlobStore, SequentialKeys, TagReport,
};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TagJs {
    index: usize,
    ymin: f64,
    xmin: f64,
    ymax: f64,
    xmax: f64,
    caption: String,
    full_tag: String,
}

impl From<&CropTag> for TagJs {
    fn from(tag: &CropTag) -> Self {
        Self {
            index: tag.index,
            ymin: tag.rect.ymin,
            xmin: tag.rect.xmin,
            ymax: tag.rect.ymax,
            xmax: tag.rect.xmax,
            caption: tag.rect.desc.clone(),
            full_tag: tag.rect.full_tag.clone(),
        }
    }
}

/// Parse `[CROP: ...]` tags from annotated text.
#[wasm_bindgen(js_name = parseCropTags)]
pub fn parse_crop_tags_js(text: &str) -> Result<JsValue, JsValue> {
    let tags: Vec<TagJs> = parse_crop_tags(text).iter().map(TagJs::from).collect();
    serde_wasm_bindgen::to_value(&tags).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FigureJs {
    image_id: String,
    caption: String,
    #[serde(serialize_with = "as_uint8_array")]
    bytes: Vec<u8>,
}

#[derive(Serialize)]
struct ProcessResultJs {
    text: String,
    figures: Vec<FigureJs>,
    tags: Vec<TagReport>,
}

// serde-wasm-bindgen maps byte buffers to `Uint8Array`.
fn as_uint8_array<S: serde::Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_bytes(bytes)
}

/// Figure extraction pipeline for browser use.
#[wasm_bindgen]
pub struct FigureProcessor {
    pipeline: FigurePipeline,
    keys: SequentialKeys,
}

#[wasm_bindgen]
impl FigureProcessor {
    /// Create a processor with default settings.
    ///
    /// Image ids are `<prefix>_1`, `<prefix>_2`, ... across calls.
    #[wasm_bindgen(constructor)]
    pub fn new(prefix: Option<String>) -> Self {
        let config = FigcapConfig::default();
        let prefix = prefix.unwrap_or_else(|| config.storage.key_prefix.clone());
        Self {
            pipeline: FigurePipeline::from_config(&config),
            keys: SequentialKeys::new(prefix),
        }
    }

    /// Create a processor from a JSON configuration.
    #[wasm_bindgen(js_name = fromConfig)]
    pub fn from_config(config_json: &str) -> Result<FigureProcessor, JsValue> {
        let config: FigcapConfig =
            serde_json::from_str(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(Self {
            pipeline: FigurePipeline::from_config(&config),
            keys: SequentialKeys::new(config.storage.key_prefix.clone()),
        })
    }

    /// Process one page: annotated OCR text plus the encoded page image.
    ///
    /// Returns `{ text, figures: [{ imageId, caption, bytes }], tags }`.
    #[wasm_bindgen]
    pub fn process(&mut self, text: &str, image_bytes: &[u8]) -> Result<JsValue, JsValue> {
        let raster =
            DecodedImage::from_bytes(image_bytes).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let mut store = MemoryBlobStore::new();

        let outcome = self
            .pipeline
            .process(text, &raster, &mut store, &mut self.keys)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let figures = outcome
            .figures
            .into_iter()
            .filter_map(|f| {
                store.take(&f.image_id).map(|bytes| FigureJs {
                    image_id: f.image_id,
                    caption: f.caption,
                    bytes,
                })
            })
            .collect();

        let result = ProcessResultJs {
            text: outcome.text,
            figures,
            tags: outcome.tags,
        };

        serde_wasm_bindgen::to_value(&result).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

impl Default for FigureProcessor {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_version() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
    }

    #[wasm_bindgen_test]
    fn test_tag_conversion() {
        let tags = parse_crop_tags("[CROP: 10, 20, 300, 400 | Chart]");
        let js = TagJs::from(&tags[0]);
        assert_eq!(js.caption, "Chart");
        assert_eq!(js.xmax, 400.0);
    }

    #[wasm_bindgen_test]
    fn test_processor_rejects_undecodable_image() {
        let mut processor = FigureProcessor::new(None);
        // Undecodable bytes fail before any tag handling
        assert!(processor.process("plain text", b"nope").is_err());
    }
}

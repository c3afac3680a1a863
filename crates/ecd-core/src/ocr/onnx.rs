//! Pure Rust recognizer backed by `pure-onnx-ocr`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::DynamicImage;
use tracing::{debug, info};

use crate::error::RecognitionError;

use super::recognition::{LanguageSet, RecognitionMode, RecognitionService};

/// Recognition model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Script {
    Latin,
    Cyrillic,
}

impl Script {
    /// Cyrillic models cover Latin digits and capitals as well, so any
    /// Cyrillic language in the set selects them.
    fn for_languages(languages: &LanguageSet) -> Self {
        const CYRILLIC: [&str; 5] = ["mkd", "srp", "rus", "bul", "ukr"];
        if languages.codes().iter().any(|c| CYRILLIC.contains(&c.as_str())) {
            Script::Cyrillic
        } else {
            Script::Latin
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Script::Latin => "latin",
            Script::Cyrillic => "cyrillic",
        }
    }
}

/// Recognizer that loads `det.onnx` plus `<script>_rec.onnx` and
/// `<script>_dict.txt` from a model directory.
pub struct OnnxRecognizer {
    model_dir: PathBuf,
    engines: Mutex<HashMap<Script, pure_onnx_ocr::engine::OcrEngine>>,
}

impl OnnxRecognizer {
    pub fn from_dir(model_dir: &Path) -> Self {
        Self {
            model_dir: model_dir.to_path_buf(),
            engines: Mutex::new(HashMap::new()),
        }
    }

    fn load(&self, script: Script) -> Result<pure_onnx_ocr::engine::OcrEngine, RecognitionError> {
        let det_path = self.model_dir.join("det.onnx");
        let rec_path = self.model_dir.join(format!("{}_rec.onnx", script.prefix()));
        let dict_path = self.model_dir.join(format!("{}_dict.txt", script.prefix()));

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(RecognitionError::Unavailable(format!(
                    "model file missing: {}",
                    path.display()
                )));
            }
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| RecognitionError::Unavailable(format!("pure-onnx-ocr: {}", e)))?;

        info!(
            "Loaded {} recognition models from {}",
            script.prefix(),
            self.model_dir.display()
        );
        Ok(engine)
    }
}

impl RecognitionService for OnnxRecognizer {
    fn recognize(
        &self,
        image: &DynamicImage,
        languages: &LanguageSet,
        mode: RecognitionMode,
        allow_list: Option<&str>,
    ) -> Result<String, RecognitionError> {
        let script = Script::for_languages(languages);
        debug!("ONNX recognizer ignores segmentation mode {:?}", mode);

        let mut engines = self
            .engines
            .lock()
            .map_err(|_| RecognitionError::Engine("model cache poisoned".to_string()))?;
        if !engines.contains_key(&script) {
            let engine = self.load(script)?;
            engines.insert(script, engine);
        }
        let engine = engines
            .get(&script)
            .ok_or_else(|| RecognitionError::Engine("model cache miss".to_string()))?;

        let results = engine
            .run_from_image(image)
            .map_err(|e| RecognitionError::Engine(format!("pure-onnx-ocr: {}", e)))?;

        let mut regions: Vec<(f64, f64, String)> = results
            .iter()
            .map(|r| {
                let (x, y) = top_left(&r.bounding_box);
                (x, y, r.text.replace("[UNK]", " "))
            })
            .collect();

        // Reading order: rows of 20px, then left to right.
        regions.sort_by(|a, b| {
            let row_a = (a.1 / 20.0) as i64;
            let row_b = (b.1 / 20.0) as i64;
            row_a
                .cmp(&row_b)
                .then(a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        });

        let text = regions
            .into_iter()
            .map(|(_, _, text)| match allow_list {
                Some(allowed) => text.chars().filter(|c| allowed.contains(*c)).collect(),
                None => text,
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(text)
    }
}

fn top_left(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f64, f64) {
    polygon
        .exterior()
        .coords()
        .fold((f64::INFINITY, f64::INFINITY), |(x, y), c| (x.min(c.x), y.min(c.y)))
}

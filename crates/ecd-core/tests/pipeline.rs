//! End-to-end document runs against a scripted recognizer.

use std::io::Cursor;
use std::sync::Arc;

use ecd_core::error::{PipelineError, RecognitionError};
use ecd_core::ocr::{LanguageSet, RecognitionMode};
use ecd_core::{DocumentPipeline, EcdConfig, EcdError, PageState, RecognitionService};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use pretty_assertions::assert_eq;

const DESCRIPTIONS: [&str; 5] = [
    "МАСИ ДРВЕНИ ЗА ГРАДИНА",
    "СТОЛИЦИ ОД МЕТАЛ ЦРНИ",
    "КАБЕЛ БАКАРЕН ИЗОЛИРАН",
    "ЛАМБИ ЗА ОСВЕТЛУВАЊЕ",
    "ПЛОЧКИ КЕРАМИЧКИ ПОДНИ",
];

/// Returns the text scripted for a page, keyed by image width.
struct ScriptedPages {
    pages: Vec<(u32, String)>,
}

impl RecognitionService for ScriptedPages {
    fn recognize(
        &self,
        image: &DynamicImage,
        _languages: &LanguageSet,
        _mode: RecognitionMode,
        _allow_list: Option<&str>,
    ) -> Result<String, RecognitionError> {
        self.pages
            .iter()
            .find(|(width, _)| *width == image.width())
            .map(|(_, text)| text.clone())
            .ok_or_else(|| RecognitionError::Engine(format!("no script for {}", image.width())))
    }
}

fn png(width: u32) -> Vec<u8> {
    let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(width, 12, Luma([255])));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

fn goods_page(description: &str) -> String {
    format!("84253100\n2 CT\n{}", description)
}

fn five_pages(with_date: bool) -> ScriptedPages {
    let pages = DESCRIPTIONS
        .iter()
        .enumerate()
        .map(|(i, description)| {
            let mut text = goods_page(description);
            if i == 0 && with_date {
                text = format!("Датум 15/03/2024\n{}", text);
            }
            (100 + i as u32, text)
        })
        .collect();
    ScriptedPages { pages }
}

fn descriptions(result: &ecd_core::DocumentResult) -> Vec<&str> {
    result
        .declaration
        .goods
        .iter()
        .filter_map(|item| item.description.as_deref())
        .collect()
}

#[tokio::test]
async fn test_invalid_page_does_not_stop_the_document() {
    let service = five_pages(true);
    let full_chars: usize = service
        .pages
        .iter()
        .map(|(_, text)| text.chars().count())
        .sum();

    let pipeline = DocumentPipeline::new(&EcdConfig::default(), Arc::new(service));
    let pages = vec![
        png(100),
        png(101),
        b"%PDF-garbage".to_vec(),
        png(103),
        png(104),
    ];
    let result = pipeline.process(pages).await.unwrap();

    assert_eq!(
        descriptions(&result),
        vec![DESCRIPTIONS[0], DESCRIPTIONS[1], DESCRIPTIONS[3], DESCRIPTIONS[4]]
    );
    let numbers: Vec<&str> = result
        .declaration
        .goods
        .iter()
        .map(|item| item.item_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["1", "2", "3", "4"]);

    assert_eq!(result.confidence.failed_pages, vec![3]);
    assert!(result.confidence.character_count < full_chars);
    assert!(result.confidence.character_count > 0);
    assert_eq!(result.pages[2].state, PageState::Failed);
    assert_eq!(
        result.declaration.header.declaration_date.as_deref(),
        Some("2024-03-15")
    );
}

#[tokio::test]
async fn test_missing_date_serializes_as_null() {
    let pipeline = DocumentPipeline::new(&EcdConfig::default(), Arc::new(five_pages(false)));
    let result = pipeline.process(vec![png(100), png(101)]).await.unwrap();

    let json = serde_json::to_value(result.output(false)).unwrap();
    assert!(json["HEAHEA"]["DecDatHEA383"].is_null());
    assert_eq!(json["GOOITEGDS"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["confidence"]["fields"]["HEAHEA.DecDatHEA383"], false);
}

#[tokio::test]
async fn test_single_worker_matches_parallel_run() {
    let pages = || (100..105).map(png).collect::<Vec<_>>();

    let mut config = EcdConfig::default();
    config.pipeline.workers = 1;
    let serial = DocumentPipeline::new(&config, Arc::new(five_pages(true)))
        .process(pages())
        .await
        .unwrap();

    config.pipeline.workers = 4;
    let parallel = DocumentPipeline::new(&config, Arc::new(five_pages(true)))
        .process(pages())
        .await
        .unwrap();

    assert_eq!(serial.declaration, parallel.declaration);
    assert_eq!(serial.text, parallel.text);
    assert_eq!(descriptions(&serial), DESCRIPTIONS.to_vec());
}

#[tokio::test]
async fn test_unreadable_document_fails() {
    let pipeline = DocumentPipeline::new(&EcdConfig::default(), Arc::new(five_pages(true)));
    let err = pipeline
        .process(vec![b"a".to_vec(), b"b".to_vec()])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EcdError::Pipeline(PipelineError::AllPagesFailed(2))
    ));
}

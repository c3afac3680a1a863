//! Page orchestration: per-page state machine, bounded worker pool,
//! cancellation and document aggregation.
//!
//! Every page moves through
//! `Pending -> Preprocessed -> Recognized -> Selected -> Corrected -> Extracted -> Done`,
//! or ends in `Failed` when its image cannot be decoded. Pages never share
//! mutable state; the document result is assembled once every page task
//! has finished.

use std::collections::BTreeSet;
use std::sync::Arc;

use image::DynamicImage;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::correction::TextCorrector;
use crate::declaration::rules::DeclarationFormat;
use crate::declaration::{validate, DeclarationParser, EcdParser, ExtractionResult};
use crate::error::{EcdError, PipelineError, Result};
use crate::models::config::EcdConfig;
use crate::models::declaration::{Declaration, FieldIssue};
use crate::ocr::{
    create_recognizer, AttemptConfig, AttemptRecord, AttemptSummary, ImagePreprocessor,
    RecognitionAttemptRunner, RecognitionService, ResultSelector,
};
use crate::quality::{ConfidenceReport, QualityEvaluator};

/// Processing stage of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    Pending,
    Preprocessed,
    Recognized,
    Selected,
    Corrected,
    Extracted,
    Done,
    Failed,
}

/// One page of a document and everything produced for it.
#[derive(Debug)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    pub state: PageState,
    /// Normalized image, kept only when diagnostics are retained.
    pub image: Option<Arc<DynamicImage>>,
    pub attempts: Vec<AttemptRecord>,
    pub selected_text: String,
    pub corrected_text: String,
    pub extraction: Option<ExtractionResult>,
    pub failure: Option<EcdError>,
}

impl Page {
    fn new(number: usize) -> Self {
        Self {
            number,
            state: PageState::Pending,
            image: None,
            attempts: Vec::new(),
            selected_text: String::new(),
            corrected_text: String::new(),
            extraction: None,
            failure: None,
        }
    }

    fn fail(mut self, error: EcdError) -> Self {
        self.state = PageState::Failed;
        self.failure = Some(error);
        self
    }

    /// True when the page contributed recognized text.
    pub fn has_text(&self) -> bool {
        !self.corrected_text.trim().is_empty()
    }

    pub fn summary(&self) -> PageSummary {
        PageSummary {
            number: self.number,
            state: self.state,
            char_count: self.corrected_text.trim().chars().count(),
            attempts: self.attempts.iter().map(AttemptRecord::summary).collect(),
            failure: self.failure.as_ref().map(ToString::to_string),
        }
    }
}

/// Serializable page report.
#[derive(Debug, Clone, Serialize)]
pub struct PageSummary {
    pub number: usize,
    pub state: PageState,
    pub char_count: usize,
    pub attempts: Vec<AttemptSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Cancels a running document.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

/// Observes a [`CancelHandle`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    pub fn new() -> (Self, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, CancelToken { rx })
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves if the
    /// handle is dropped without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Aggregated result of one document run.
#[derive(Debug)]
pub struct DocumentResult {
    pub declaration: Declaration,
    pub confidence: ConfidenceReport,
    /// Corrected text of every page, in page order.
    pub text: String,
    pub pages: Vec<Page>,
    pub issues: Vec<FieldIssue>,
    pub format: DeclarationFormat,
}

/// JSON view of a document result: the declaration schema keys plus
/// reporting fields.
#[derive(Debug, Serialize)]
pub struct DocumentOutput<'a> {
    #[serde(flatten)]
    pub declaration: &'a Declaration,
    pub format: DeclarationFormat,
    pub confidence: &'a ConfidenceReport,
    pub issues: &'a [FieldIssue],
    pub pages: Vec<PageSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'a str>,
}

impl DocumentResult {
    pub fn output(&self, include_text: bool) -> DocumentOutput<'_> {
        DocumentOutput {
            declaration: &self.declaration,
            format: self.format,
            confidence: &self.confidence,
            issues: &self.issues,
            pages: self.pages.iter().map(Page::summary).collect(),
            text: include_text.then_some(self.text.as_str()),
        }
    }
}

struct PageContext {
    preprocessor: ImagePreprocessor,
    runner: RecognitionAttemptRunner,
    selector: ResultSelector,
    corrector: TextCorrector,
    parser: EcdParser,
    attempts: Vec<AttemptConfig>,
    auto_correct: bool,
    retain_images: bool,
}

/// Runs documents through the full page pipeline.
pub struct DocumentPipeline {
    ctx: Arc<PageContext>,
    workers: usize,
    evaluator: QualityEvaluator,
    tin_digits: usize,
}

impl DocumentPipeline {
    /// Build a pipeline around an existing recognizer.
    pub fn new(config: &EcdConfig, service: Arc<dyn RecognitionService>) -> Self {
        let extraction = &config.extraction;
        let ctx = PageContext {
            preprocessor: ImagePreprocessor::new().with_options(config.preprocess.clone()),
            runner: RecognitionAttemptRunner::new(service)
                .with_timeout(config.attempt_timeout())
                .with_allow_list(config.recognition.allow_list.clone()),
            selector: ResultSelector::new(),
            corrector: TextCorrector::with_tin_digits(extraction.tin_digits),
            parser: EcdParser::new()
                .with_tin_digits(extraction.tin_digits)
                .with_header_window(extraction.header_window_lines),
            attempts: config.recognition.attempts.clone(),
            auto_correct: extraction.auto_correct,
            retain_images: config.pipeline.retain_diagnostics,
        };

        Self {
            ctx: Arc::new(ctx),
            workers: config.pipeline.workers.max(1),
            evaluator: QualityEvaluator::new(extraction.required_fields.clone()),
            tin_digits: extraction.tin_digits,
        }
    }

    /// Build a pipeline with the recognizer selected in the configuration.
    pub fn from_config(config: &EcdConfig) -> Result<Self> {
        let service = create_recognizer(&config.recognition, config.pdf.render_dpi)?;
        Ok(Self::new(config, service))
    }

    /// Set the number of pages processed concurrently.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Process encoded page images in page order.
    pub async fn process(&self, pages: Vec<Vec<u8>>) -> Result<DocumentResult> {
        let (_handle, token) = CancelHandle::new();
        self.process_with_cancel(pages, token).await
    }

    /// Process pages until done or until `cancel` fires.
    ///
    /// Cancellation aborts every in-flight page and returns
    /// [`PipelineError::DocumentCancelled`] without partial output.
    pub async fn process_with_cancel(
        &self,
        pages: Vec<Vec<u8>>,
        mut cancel: CancelToken,
    ) -> Result<DocumentResult> {
        if pages.is_empty() {
            return Err(PipelineError::NoPages.into());
        }

        let total = pages.len();
        info!("Processing {} pages with {} workers", total, self.workers);

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        for (index, bytes) in pages.into_iter().enumerate() {
            let ctx = Arc::clone(&self.ctx);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                run_page(ctx, index + 1, bytes).await
            });
        }

        let mut finished: Vec<Page> = Vec::with_capacity(total);
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    info!("Document cancelled with {} of {} pages finished", finished.len(), total);
                    return Err(PipelineError::DocumentCancelled.into());
                }

                joined = tasks.join_next() => match joined {
                    Some(Ok(page)) => {
                        debug!("Page {} finished in state {:?}", page.number, page.state);
                        finished.push(page);
                    }
                    Some(Err(e)) => warn!("Page worker failed: {}", e),
                    None => break,
                }
            }
        }

        // Pages whose worker panicked never reported back.
        let reported: BTreeSet<usize> = finished.iter().map(|p| p.number).collect();
        for number in (1..=total).filter(|n| !reported.contains(n)) {
            finished.push(
                Page::new(number).fail(PipelineError::Worker(format!("page {} worker failed", number)).into()),
            );
        }

        self.aggregate(finished)
    }

    fn aggregate(&self, mut pages: Vec<Page>) -> Result<DocumentResult> {
        pages.sort_by_key(|p| p.number);

        let failed_pages: Vec<usize> = pages
            .iter()
            .filter(|p| !p.has_text())
            .map(|p| p.number)
            .collect();
        if failed_pages.len() == pages.len() {
            return Err(PipelineError::AllPagesFailed(pages.len()).into());
        }

        let text = pages
            .iter()
            .filter(|p| p.has_text())
            .map(|p| p.corrected_text.trim())
            .collect::<Vec<_>>()
            .join("\n\n");
        let character_count = pages
            .iter()
            .map(|p| p.corrected_text.trim().chars().count())
            .sum();

        let mut declaration = Declaration::default();
        let mut format = DeclarationFormat::Unknown;
        for extraction in pages.iter().filter_map(|p| p.extraction.as_ref()) {
            declaration.merge(extraction.declaration.clone());
            if format == DeclarationFormat::Unknown {
                format = extraction.format;
            }
        }

        let issues = validate(&declaration, self.tin_digits);
        let confidence =
            self.evaluator
                .evaluate(&declaration, &issues, character_count, failed_pages);

        info!(
            "Document done: {} goods items, score {:.2}, {} failed pages",
            declaration.goods.len(),
            confidence.score,
            confidence.failed_pages.len()
        );

        Ok(DocumentResult {
            declaration,
            confidence,
            text,
            pages,
            issues,
            format,
        })
    }
}

async fn run_page(ctx: Arc<PageContext>, number: usize, bytes: Vec<u8>) -> Page {
    let page = Page::new(number);

    let worker = Arc::clone(&ctx);
    let normalized =
        tokio::task::spawn_blocking(move || worker.preprocessor.process_bytes(&bytes)).await;
    let image = match normalized {
        Ok(Ok(image)) => Arc::new(image),
        Ok(Err(e)) => {
            warn!("Page {} failed preprocessing: {}", number, e);
            return page.fail(e.into());
        }
        Err(e) => return page.fail(PipelineError::Worker(e.to_string()).into()),
    };
    let mut page = page;
    page.state = PageState::Preprocessed;

    let set = ctx.runner.recognize(Arc::clone(&image), &ctx.attempts).await;
    page.state = PageState::Recognized;
    if set.all_failed() {
        let error = PipelineError::AllAttemptsFailed {
            page: number,
            attempts: ctx.attempts.len(),
        };
        warn!("{}", error);
        page.failure = Some(error.into());
    }

    page.selected_text = ctx.selector.select_text(set.attempts());
    page.attempts = set.into_records();
    page.state = PageState::Selected;

    page.corrected_text = if ctx.auto_correct {
        ctx.corrector.correct(&page.selected_text)
    } else {
        page.selected_text.clone()
    };
    page.state = PageState::Corrected;

    if page.has_text() {
        match ctx.parser.parse(&page.corrected_text) {
            Ok(result) => page.extraction = Some(result),
            Err(e) => warn!("Page {} extraction failed: {}", number, e),
        }
    }
    page.state = PageState::Extracted;

    if ctx.retain_images {
        page.image = Some(image);
    }
    page.state = PageState::Done;
    page
}

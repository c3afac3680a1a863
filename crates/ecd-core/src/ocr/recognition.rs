//! Recognition attempts with language and engine fallback.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::RecognitionError;

/// Ordered set of recognizer language codes, written `mkd+eng`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageSet(Vec<String>);

impl LanguageSet {
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(codes.into_iter().map(Into::into).collect())
    }

    pub fn codes(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.iter().any(|c| c == code)
    }
}

impl fmt::Display for LanguageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("+"))
    }
}

impl FromStr for LanguageSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let codes: Vec<String> = s
            .split('+')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect();
        if codes.is_empty() {
            return Err(format!("empty language set: {:?}", s));
        }
        Ok(Self(codes))
    }
}

impl TryFrom<String> for LanguageSet {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LanguageSet> for String {
    fn from(value: LanguageSet) -> Self {
        value.to_string()
    }
}

/// Page segmentation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segmentation {
    /// Treat the page as one uniform block of text.
    #[default]
    UniformBlock,
    /// Single column of variable-size text.
    SingleColumn,
    /// Let the engine find the layout.
    Auto,
}

/// Recognition engine generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    Legacy,
    #[default]
    Neural,
}

/// Segmentation and engine selection for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionMode {
    pub segmentation: Segmentation,
    pub engine: EngineMode,
}

/// One entry of the ordered attempt list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptConfig {
    pub languages: LanguageSet,
    #[serde(default)]
    pub mode: RecognitionMode,
}

impl AttemptConfig {
    pub fn new(languages: LanguageSet, mode: RecognitionMode) -> Self {
        Self { languages, mode }
    }
}

impl fmt::Display for AttemptConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}/{:?})",
            self.languages, self.mode.segmentation, self.mode.engine
        )
    }
}

/// External recognizer boundary: image, languages and mode in, text out.
///
/// Implementations block; the attempt runner moves each call onto the
/// blocking pool and enforces the time budget.
pub trait RecognitionService: Send + Sync {
    fn recognize(
        &self,
        image: &DynamicImage,
        languages: &LanguageSet,
        mode: RecognitionMode,
        allow_list: Option<&str>,
    ) -> Result<String, RecognitionError>;
}

/// Text produced by one successful attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionAttempt {
    pub languages: LanguageSet,
    pub mode: RecognitionMode,
    pub text: String,
    /// Unicode scalar values in the trimmed text.
    pub char_count: usize,
}

impl RecognitionAttempt {
    pub fn new(config: &AttemptConfig, text: String) -> Self {
        let char_count = text.trim().chars().count();
        Self {
            languages: config.languages.clone(),
            mode: config.mode,
            text,
            char_count,
        }
    }
}

/// What happened to one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(RecognitionAttempt),
    TimedOut,
    Failed(RecognitionError),
}

/// Attempt descriptor with its outcome.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub config: AttemptConfig,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

/// Serializable view of an attempt record.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptSummary {
    pub languages: String,
    pub mode: RecognitionMode,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl AttemptRecord {
    pub fn summary(&self) -> AttemptSummary {
        let (status, char_count, error) = match &self.outcome {
            AttemptOutcome::Success(a) => ("success", Some(a.char_count), None),
            AttemptOutcome::TimedOut => ("timeout", None, None),
            AttemptOutcome::Failed(e) => ("error", None, Some(e.to_string())),
        };
        AttemptSummary {
            languages: self.config.languages.to_string(),
            mode: self.config.mode,
            status,
            char_count,
            error,
            elapsed_ms: self.elapsed_ms,
        }
    }
}

/// All attempt records for one page, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct AttemptSet {
    records: Vec<AttemptRecord>,
}

impl AttemptSet {
    pub fn records(&self) -> &[AttemptRecord] {
        &self.records
    }

    /// Successful attempts in configuration order.
    pub fn attempts(&self) -> Vec<&RecognitionAttempt> {
        self.records
            .iter()
            .filter_map(|r| match &r.outcome {
                AttemptOutcome::Success(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    pub fn all_failed(&self) -> bool {
        self.attempts().is_empty()
    }

    pub fn into_records(self) -> Vec<AttemptRecord> {
        self.records
    }
}

/// Runs the configured attempts against a recognition service.
pub struct RecognitionAttemptRunner {
    service: Arc<dyn RecognitionService>,
    timeout: Duration,
    allow_list: Option<String>,
}

impl RecognitionAttemptRunner {
    pub fn new(service: Arc<dyn RecognitionService>) -> Self {
        Self {
            service,
            timeout: Duration::from_secs(120),
            allow_list: None,
        }
    }

    /// Set the per-attempt time budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Restrict recognized characters.
    pub fn with_allow_list(mut self, allow_list: Option<String>) -> Self {
        self.allow_list = allow_list;
        self
    }

    /// Run every configuration once, in order.
    ///
    /// A failing or timed-out configuration only skips itself. The returned
    /// set is empty of successes when every configuration failed.
    pub async fn recognize(&self, image: Arc<DynamicImage>, configs: &[AttemptConfig]) -> AttemptSet {
        let mut records = Vec::with_capacity(configs.len());

        for config in configs {
            let start = Instant::now();
            let service = Arc::clone(&self.service);
            let image = Arc::clone(&image);
            let languages = config.languages.clone();
            let mode = config.mode;
            let allow_list = self.allow_list.clone();

            let task = tokio::task::spawn_blocking(move || {
                service.recognize(&image, &languages, mode, allow_list.as_deref())
            });

            let outcome = match tokio::time::timeout(self.timeout, task).await {
                Ok(Ok(Ok(text))) => {
                    let attempt = RecognitionAttempt::new(config, text);
                    debug!("Attempt {} produced {} characters", config, attempt.char_count);
                    AttemptOutcome::Success(attempt)
                }
                Ok(Ok(Err(RecognitionError::Timeout(ms)))) => {
                    warn!("Attempt {} killed after {}ms", config, ms);
                    AttemptOutcome::TimedOut
                }
                Ok(Ok(Err(e))) => {
                    warn!("Attempt {} failed: {}", config, e);
                    AttemptOutcome::Failed(e)
                }
                Ok(Err(join_error)) => {
                    warn!("Attempt {} worker failed: {}", config, join_error);
                    AttemptOutcome::Failed(RecognitionError::Engine(join_error.to_string()))
                }
                Err(_) => {
                    warn!(
                        "Attempt {} timed out after {}ms",
                        config,
                        self.timeout.as_millis()
                    );
                    AttemptOutcome::TimedOut
                }
            };

            records.push(AttemptRecord {
                config: config.clone(),
                outcome,
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        }

        let set = AttemptSet { records };
        info!(
            "{} of {} recognition attempts succeeded",
            set.attempts().len(),
            configs.len()
        );
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    struct ScriptedService;

    impl RecognitionService for ScriptedService {
        fn recognize(
            &self,
            _image: &DynamicImage,
            languages: &LanguageSet,
            _mode: RecognitionMode,
            allow_list: Option<&str>,
        ) -> Result<String, RecognitionError> {
            if languages.contains("srp") {
                return Err(RecognitionError::Unavailable("srp.traineddata".to_string()));
            }
            if languages.contains("deu") {
                std::thread::sleep(Duration::from_millis(300));
                return Ok("late".to_string());
            }
            if languages.contains("ell") {
                return Err(RecognitionError::Timeout(40));
            }
            if languages.contains("xxx") {
                panic!("engine crashed");
            }
            let text = format!("text for {}", languages);
            Ok(match allow_list {
                Some(allowed) => text.chars().filter(|c| allowed.contains(*c)).collect(),
                None => text,
            })
        }
    }

    fn config(langs: &str) -> AttemptConfig {
        AttemptConfig::new(langs.parse().unwrap(), RecognitionMode::default())
    }

    fn blank() -> Arc<DynamicImage> {
        Arc::new(DynamicImage::ImageLuma8(GrayImage::new(4, 4)))
    }

    #[test]
    fn test_language_set_round_trip() {
        let set: LanguageSet = "mkd + srp+eng".parse().unwrap();
        assert_eq!(set.codes(), &["mkd", "srp", "eng"]);
        assert_eq!(set.to_string(), "mkd+srp+eng");
        assert!("+".parse::<LanguageSet>().is_err());
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_later_attempts() {
        let runner = RecognitionAttemptRunner::new(Arc::new(ScriptedService))
            .with_timeout(Duration::from_millis(50));
        let configs = vec![
            config("srp+eng"),
            config("deu"),
            config("xxx"),
            config("mkd+eng"),
        ];

        let set = runner.recognize(blank(), &configs).await;
        let records = set.records();

        assert_eq!(records.len(), 4);
        assert!(matches!(
            records[0].outcome,
            AttemptOutcome::Failed(RecognitionError::Unavailable(_))
        ));
        assert_eq!(records[1].outcome, AttemptOutcome::TimedOut);
        assert!(matches!(records[2].outcome, AttemptOutcome::Failed(_)));
        assert_eq!(set.attempts().len(), 1);
        assert_eq!(set.attempts()[0].text, "text for mkd+eng");
        assert_eq!(records[1].summary().status, "timeout");
    }

    #[tokio::test]
    async fn test_engine_deadline_counts_as_timeout() {
        let runner = RecognitionAttemptRunner::new(Arc::new(ScriptedService));
        let set = runner.recognize(blank(), &[config("ell"), config("mkd")]).await;
        let records = set.records();

        assert_eq!(records[0].outcome, AttemptOutcome::TimedOut);
        assert_eq!(records[0].summary().status, "timeout");
        assert_eq!(set.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_all_failed() {
        let runner = RecognitionAttemptRunner::new(Arc::new(ScriptedService));
        let set = runner.recognize(blank(), &[config("srp")]).await;
        assert!(set.all_failed());
        assert!(set.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_allow_list_is_forwarded() {
        let runner = RecognitionAttemptRunner::new(Arc::new(ScriptedService))
            .with_allow_list(Some("tex ".to_string()));
        let set = runner.recognize(blank(), &[config("eng")]).await;
        assert_eq!(set.attempts()[0].text, "text  e");
    }

    #[test]
    fn test_char_count_ignores_surrounding_whitespace() {
        let attempt = RecognitionAttempt::new(&config("mkd"), "  Скопје\n".to_string());
        assert_eq!(attempt.char_count, 6);
    }
}

//! Recognition through the external `tesseract` binary.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageFormat};
use tracing::{debug, warn};

use crate::error::RecognitionError;

use super::recognition::{EngineMode, LanguageSet, RecognitionMode, RecognitionService, Segmentation};

/// How often a running child is checked against its deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Runs `tesseract <image> stdout -l <langs> --oem <n> --psm <n>`.
///
/// With a timeout set, a child still running at the deadline is killed and
/// the call fails with [`RecognitionError::Timeout`].
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
    dpi: Option<u32>,
    timeout: Option<Duration>,
}

impl TesseractCli {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            dpi: None,
            timeout: None,
        }
    }

    /// Use a specific executable.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Tell the engine the resolution pages were rendered at.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = Some(dpi);
        self
    }

    /// Kill the child once it has run this long.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn build_command(
        &self,
        input: &Path,
        languages: &LanguageSet,
        mode: RecognitionMode,
        allow_list: Option<&str>,
    ) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg(input)
            .arg("stdout")
            .arg("-l")
            .arg(languages.to_string())
            .arg("--oem")
            .arg(oem(mode.engine).to_string())
            .arg("--psm")
            .arg(psm(mode.segmentation).to_string());
        if let Some(dpi) = self.dpi {
            command.arg("--dpi").arg(dpi.to_string());
        }
        if let Some(allowed) = allow_list {
            command
                .arg("-c")
                .arg(format!("tessedit_char_whitelist={}", allowed));
        }
        command
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Page segmentation mode number.
pub fn psm(segmentation: Segmentation) -> u8 {
    match segmentation {
        Segmentation::UniformBlock => 6,
        Segmentation::SingleColumn => 4,
        Segmentation::Auto => 3,
    }
}

/// OCR engine mode number.
pub fn oem(engine: EngineMode) -> u8 {
    match engine {
        EngineMode::Legacy => 0,
        EngineMode::Neural => 1,
    }
}

impl RecognitionService for TesseractCli {
    fn recognize(
        &self,
        image: &DynamicImage,
        languages: &LanguageSet,
        mode: RecognitionMode,
        allow_list: Option<&str>,
    ) -> Result<String, RecognitionError> {
        let workdir = tempfile::Builder::new()
            .prefix("ecd-page-")
            .tempdir()
            .map_err(|e| RecognitionError::Engine(format!("failed to stage image: {}", e)))?;
        let input = workdir.path().join("page.png");
        image
            .save_with_format(&input, ImageFormat::Png)
            .map_err(|e| RecognitionError::Engine(format!("failed to stage image: {}", e)))?;

        let stdout_path = workdir.path().join("stdout.txt");
        let stderr_path = workdir.path().join("stderr.txt");
        let stdout = File::create(&stdout_path).map_err(|e| RecognitionError::Engine(e.to_string()))?;
        let stderr = File::create(&stderr_path).map_err(|e| RecognitionError::Engine(e.to_string()))?;

        let mut command = self.build_command(&input, languages, mode, allow_list);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));
        debug!("Running {:?}", command);

        let mut child = command.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => RecognitionError::Unavailable(format!(
                "{} not found",
                self.binary.display()
            )),
            _ => RecognitionError::Engine(e.to_string()),
        })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| RecognitionError::Engine(e.to_string()))?
            {
                break status;
            }
            if let Some(limit) = self.timeout.filter(|limit| started.elapsed() >= *limit) {
                warn!("Killing {} after {}ms", self.binary.display(), limit.as_millis());
                let _ = child.kill();
                let _ = child.wait();
                return Err(RecognitionError::Timeout(limit.as_millis() as u64));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stderr = read_lossy(&stderr_path)?;
        if !status.success() {
            return Err(classify_failure(stderr.trim()));
        }
        // Tesseract can exit 0 after failing to load one of several languages.
        if stderr.contains("Failed loading language") {
            return Err(classify_failure(stderr.trim()));
        }

        read_lossy(&stdout_path)
    }
}

fn read_lossy(path: &Path) -> Result<String, RecognitionError> {
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .map_err(|e| RecognitionError::Engine(e.to_string()))
}

fn classify_failure(stderr: &str) -> RecognitionError {
    if stderr.contains("Failed loading language") || stderr.contains("Error opening data file") {
        RecognitionError::Unavailable(stderr.to_string())
    } else {
        RecognitionError::Engine(stderr.to_string())
    }
}

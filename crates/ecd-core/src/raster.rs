//! PDF page rasterization through an external renderer.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::RasterError;

/// Turns a document on disk into one encoded image per page.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, input: &Path) -> Result<Vec<Vec<u8>>, RasterError>;
}

/// Renders pages with `pdftoppm -r <dpi> -png`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    binary: PathBuf,
    dpi: u32,
    max_pages: usize,
}

impl PdftoppmRasterizer {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("pdftoppm"),
            dpi: 300,
            max_pages: 0,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Render at most `max_pages` pages (0 = all).
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    fn build_command(&self, input: &Path, prefix: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg("-r").arg(self.dpi.to_string()).arg("-png");
        if self.max_pages > 0 {
            command.arg("-l").arg(self.max_pages.to_string());
        }
        command.arg(input).arg(prefix);
        command
    }
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn rasterize(&self, input: &Path) -> Result<Vec<Vec<u8>>, RasterError> {
        let workdir = tempfile::tempdir()?;
        let prefix = workdir.path().join("page");

        let mut command = self.build_command(input, &prefix);
        debug!("Running {:?}", command);

        let output = command.output().map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                RasterError::ToolMissing(format!("{} not found", self.binary.display()))
            }
            _ => RasterError::Io(e),
        })?;

        if !output.status.success() {
            return Err(RasterError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let mut pages: Vec<(u32, PathBuf)> = std::fs::read_dir(workdir.path())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|path| page_number(&path).map(|n| (n, path)))
            .collect();
        pages.sort_by_key(|(n, _)| *n);

        if pages.is_empty() {
            return Err(RasterError::NoPages);
        }

        let images = pages
            .iter()
            .map(|(_, path)| std::fs::read(path))
            .collect::<Result<Vec<_>, _>>()?;

        info!("Rendered {} pages from {}", images.len(), input.display());
        Ok(images)
    }
}

/// Page number from a `page-<n>.png` file name. The renderer zero-pads `n`
/// to the width of the page count, so names do not sort numerically.
fn page_number(path: &Path) -> Option<u32> {
    if path.extension().and_then(|e| e.to_str()) != Some("png") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.rsplit_once('-')?.1.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_command_arguments() {
        let rasterizer = PdftoppmRasterizer::new().with_dpi(200).with_max_pages(3);
        let command = rasterizer.build_command(Path::new("in.pdf"), Path::new("/tmp/x/page"));
        assert_eq!(
            args(&command),
            vec!["-r", "200", "-png", "-l", "3", "in.pdf", "/tmp/x/page"]
        );
    }

    #[test]
    fn test_page_number() {
        assert_eq!(page_number(Path::new("/t/page-07.png")), Some(7));
        assert_eq!(page_number(Path::new("/t/page-12.png")), Some(12));
        assert_eq!(page_number(Path::new("/t/page-1.ppm")), None);
        assert_eq!(page_number(Path::new("/t/notes.png")), None);
    }

    #[test]
    fn test_missing_binary() {
        let rasterizer = PdftoppmRasterizer::new().with_binary("/nonexistent/pdftoppm-ecd");
        let err = rasterizer.rasterize(Path::new("in.pdf")).unwrap_err();
        assert!(matches!(err, RasterError::ToolMissing(_)));
    }
}

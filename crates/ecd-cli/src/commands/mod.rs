//! Subcommands and the input handling they share.

pub mod batch;
pub mod config;
pub mod extract;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use ecd_core::models::config::EcdConfig;
use ecd_core::raster::{PageRasterizer, PdftoppmRasterizer};

/// Image formats accepted directly as single-page documents.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ecd")
        .join("config.json")
}

/// Load the config given with `-c`, else the default file, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<EcdConfig> {
    if let Some(path) = config_path {
        return Ok(EcdConfig::from_file(Path::new(path))?);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using configuration from {}", default_path.display());
        Ok(EcdConfig::from_file(&default_path)?)
    } else {
        Ok(EcdConfig::default())
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// True for files the extract command can read.
pub fn is_supported(path: &Path) -> bool {
    let ext = extension(path);
    ext == "pdf" || IMAGE_EXTENSIONS.contains(&ext.as_str())
}

/// Read a document into encoded page images.
pub async fn load_pages(path: &Path, config: &EcdConfig) -> anyhow::Result<Vec<Vec<u8>>> {
    let ext = extension(path);
    match ext.as_str() {
        "pdf" => {
            let rasterizer = PdftoppmRasterizer::new()
                .with_binary(&config.pdf.rasterizer_path)
                .with_dpi(config.pdf.render_dpi)
                .with_max_pages(config.pdf.max_pages);
            let input = path.to_path_buf();
            let pages =
                tokio::task::spawn_blocking(move || rasterizer.rasterize(&input)).await??;
            Ok(pages)
        }
        other if IMAGE_EXTENSIONS.contains(&other) => Ok(vec![fs::read(path)?]),
        _ => anyhow::bail!("Unsupported file format: {}", ext),
    }
}

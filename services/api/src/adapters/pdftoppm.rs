//! services/api/src/adapters/pdftoppm.rs
//!
//! This module contains the rasterizer adapter, which shells out to poppler's
//! `pdftoppm`. It implements the `Rasterizer` port from the `core` crate.
//!
//! `pdftoppm` must be installed; its location is configurable.

use async_trait::async_trait;
use image::RgbaImage;
use pdf_editor_core::ports::{PortError, PortResult, Rasterizer};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct PdftoppmRasterizer {
    binary: PathBuf,
    /// Where the single-page PNG is written before it is decoded.
    temp_dir: PathBuf,
}

impl PdftoppmRasterizer {
    pub fn new(binary: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            temp_dir: temp_dir.into(),
        }
    }

    /// Checks that the configured binary can be started.
    pub async fn is_available(&self) -> bool {
        let result = Command::new(&self.binary)
            .arg("-v")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        result.is_ok()
    }
}

//=========================================================================================
// `Rasterizer` Trait Implementation
//=========================================================================================

#[async_trait]
impl Rasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, document: &Path, page: u32, dpi: u32) -> PortResult<RgbaImage> {
        let prefix = self.temp_dir.join(format!("render_{}", Uuid::new_v4().simple()));
        let page_arg = page.to_string();

        let output = Command::new(&self.binary)
            .arg("-f")
            .arg(&page_arg)
            .arg("-l")
            .arg(&page_arg)
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-png")
            .arg("-singlefile")
            .arg(document)
            .arg(&prefix)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PortError::Unexpected(format!("failed to run pdftoppm: {e}")))?;

        let png_path = prefix.with_extension("png");
        if !output.status.success() {
            let _ = tokio::fs::remove_file(&png_path).await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(page, dpi, "pdftoppm failed: {}", stderr.trim());
            return Err(PortError::Unexpected(format!(
                "pdftoppm exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let png = tokio::fs::read(&png_path).await;
        let _ = tokio::fs::remove_file(&png_path).await;
        let png = png.map_err(|e| PortError::Unexpected(format!("pdftoppm produced no image: {e}")))?;

        let bitmap = image::load_from_memory(&png)
            .map_err(|e| PortError::Unexpected(format!("unreadable pdftoppm output: {e}")))?
            .to_rgba8();
        debug!(page, dpi, width = bitmap.width(), height = bitmap.height(), "Rasterized page");
        Ok(bitmap)
    }
}

//! crates/pdf_editor_core/src/workspace.rs
//!
//! The two local directories the editor works in: one for uploads and generated
//! outputs, one for transient work files. Also owns the atomic replace step of the
//! read-modify-replace protocol.

use chrono::Utc;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use uuid::Uuid;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("static regex is valid"));

/// Upload/output and temp directories.
#[derive(Debug, Clone)]
pub struct Workspace {
    upload_dir: PathBuf,
    temp_dir: PathBuf,
}

impl Workspace {
    pub fn new(upload_dir: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            temp_dir: temp_dir.into(),
        }
    }

    /// Creates both directories if they do not exist yet.
    pub async fn prepare(&self) -> io::Result<()> {
        fs::create_dir_all(&self.upload_dir).await?;
        fs::create_dir_all(&self.temp_dir).await
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// A fresh, collision-free path in the temp directory.
    pub fn temp_file(&self, prefix: &str, extension: &str) -> PathBuf {
        self.temp_dir
            .join(format!("{prefix}_{}.{extension}", Uuid::new_v4().simple()))
    }

    /// Writes `bytes` to a temp file and renames it over `target`, so readers observe
    /// either the old or the new document and never a partial one.
    pub async fn replace_atomically(&self, target: &Path, bytes: &[u8]) -> io::Result<()> {
        let staging = self.temp_file("temp", "pdf");
        fs::write(&staging, bytes).await?;
        if let Err(e) = fs::rename(&staging, target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e);
        }
        Ok(())
    }

    /// Persists a generated document in the upload directory.
    pub async fn write_output(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.upload_dir.join(filename);
        fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Resolves a previously generated output by name. Names that do not survive
    /// sanitization unchanged are refused.
    pub fn output_path(&self, filename: &str) -> Option<PathBuf> {
        if filename.is_empty() || sanitize_filename(filename) != filename {
            return None;
        }
        Some(self.upload_dir.join(filename))
    }
}

/// Reduces a client-supplied filename to a safe ASCII name without directories.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = UNSAFE_CHARS.replace_all(&joined, "");
    cleaned.trim_start_matches(['.', '_']).to_string()
}

/// True when the filename carries a `.pdf` extension (case-insensitive).
pub fn has_pdf_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Second-resolution timestamp used to prefix generated names.
pub fn timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

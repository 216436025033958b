//! Upload inputs, validation, and batch reporting.
//!
//! Validation mirrors what the admin upload form enforces before anything
//! leaves the machine: a size ceiling and a MIME allow-list. Rejected files
//! never reach the [`PersistenceAdapter`](crate::adapter::PersistenceAdapter);
//! they show up in the [`UploadReport`] next to transport failures so the
//! user can retry exactly those inputs.

use crate::config::UploadConfig;
use crate::crop::raster;
use crate::types::ImageRecord;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// One file to upload, already read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Original file name, used for the stored extension and in reports.
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, sniffing its MIME type from the content.
    ///
    /// Unrecognized content gets `application/octet-stream`, which the
    /// default allow-list rejects.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        let mime_type = raster::sniff_mime(&bytes)
            .unwrap_or("application/octet-stream")
            .to_string();
        Ok(Self::new(name, mime_type, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lower-cased extension of [`name`](Self::name), `jpg` when absent.
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "jpg".to_string())
    }
}

/// Why a file was refused before upload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("File size exceeds {} limit. Current size: {}", size_label(.limit), size_label(.size))]
    TooLarge { size: u64, limit: u64 },
    #[error("Unsupported file type: {mime_type}. Allowed types: {allowed}")]
    UnsupportedType { mime_type: String, allowed: String },
}

/// Render a byte count as `5.00MB` / `12.5 KB` the way the admin UI does.
pub fn format_size(bytes: u64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MB {
        format!("{:.2}MB", bytes as f64 / MB)
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

fn size_label(bytes: &u64) -> String {
    format_size(*bytes)
}

/// Check a file against the configured limits.
pub fn validate(file: &UploadFile, rules: &UploadConfig) -> Result<(), UploadRejection> {
    if file.size() > rules.max_file_size {
        return Err(UploadRejection::TooLarge {
            size: file.size(),
            limit: rules.max_file_size,
        });
    }
    let mime = file.mime_type.to_ascii_lowercase();
    if !rules.allowed_types.iter().any(|t| t.eq_ignore_ascii_case(&mime)) {
        return Err(UploadRejection::UnsupportedType {
            mime_type: file.mime_type.clone(),
            allowed: rules.allowed_types.join(", "),
        });
    }
    Ok(())
}

/// A single failed input of an upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
    /// Position of the input in the submitted batch.
    pub index: usize,
    pub name: String,
    pub reason: String,
}

impl fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}: {}", self.index + 1, self.name, self.reason)
    }
}

/// Outcome of an upload batch.
///
/// Committed records and failures are independent: one bad input never
/// discards its siblings' results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub uploaded: Vec<ImageRecord>,
    pub failed: Vec<UploadFailure>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turn a report with failures into [`StoreError::PartialUpload`].
    ///
    /// [`StoreError::PartialUpload`]: crate::store::StoreError::PartialUpload
    pub fn into_result(self) -> Result<Vec<ImageRecord>, crate::store::StoreError> {
        if self.failed.is_empty() {
            Ok(self.uploaded)
        } else {
            Err(crate::store::StoreError::PartialUpload {
                uploaded: self.uploaded.len(),
                failed: self.failed,
            })
        }
    }
}

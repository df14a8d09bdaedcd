use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Display name shown for a transfer before any filename is known.
pub const PENDING_NAME: &str = "Uploading…";

/// One row per in-flight or just-completed upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveTransfer {
    pub id: Uuid,
    /// Best-effort filename; `PENDING_NAME` until known.
    pub display_name: String,
    /// Declared size from the request's Content-Length; 0 if unknown.
    pub total_bytes: u64,
    /// Fraction in [0.0, 1.0]; non-decreasing while in flight.
    pub progress: f32,
    /// Final storage location, set only on terminal per-file entries.
    pub saved_path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
}

impl ActiveTransfer {
    pub fn new(display_name: Option<String>, total_bytes: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.unwrap_or_else(|| PENDING_NAME.to_string()),
            total_bytes,
            progress: 0.0,
            saved_path: None,
            started_at: Utc::now(),
        }
    }

    /// Terminal entry for one saved file; replaces the in-flight placeholder.
    pub fn saved(display_name: String, total_bytes: u64, saved_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name,
            total_bytes,
            progress: 1.0,
            saved_path: Some(saved_path),
            started_at: Utc::now(),
        }
    }

    /// Monotonic progress update; never moves backwards, never exceeds 1.0.
    pub fn update_progress(&mut self, progress: f32) {
        let clamped = progress.clamp(0.0, 1.0);
        if clamped > self.progress {
            self.progress = clamped;
        }
    }
}

//! Local durable artifacts: the downloaded audio and the normalized
//! transcript text, both addressed by the same stem.
//!
//! File names are derived from the originating chat and message ids, so
//! concurrent submissions never write the same file and no locking is needed.

use std::io;
use std::path::{Path, PathBuf};

use grader_core::config::StorageConfig;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    uploads_dir: PathBuf,
    transcripts_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(uploads_dir: impl Into<PathBuf>, transcripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            transcripts_dir: transcripts_dir.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.uploads_dir, &config.transcripts_dir)
    }

    /// `<chat_id>_<message_id>_<file_name>` with path-hostile characters
    /// replaced by `_`.
    pub fn artifact_name(chat_id: i64, message_id: i64, file_name: &str) -> String {
        let safe: String = file_name
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let safe = safe.trim_start_matches('.');
        let safe = if safe.is_empty() { "audio" } else { safe };
        format!("{}_{}_{}", chat_id, message_id, safe)
    }

    pub async fn save_audio(&self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.uploads_dir).await?;
        let path = self.uploads_dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Write `text` to `<transcripts_dir>/<audio stem>.txt`.
    pub async fn save_transcript(&self, audio_path: &Path, text: &str) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.transcripts_dir).await?;
        let path = self.transcript_path(audio_path);
        tokio::fs::write(&path, text.as_bytes()).await?;
        Ok(path)
    }

    pub fn transcript_path(&self, audio_path: &Path) -> PathBuf {
        let stem = audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "transcript".to_string());
        self.transcripts_dir.join(format!("{}.txt", stem))
    }
}

//! Artifact assembly
//!
//! The artifact is the immutable result of one recording: every buffered
//! chunk concatenated in production order, tagged with the negotiated
//! media type.

use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};

use crate::profile::EncodingProfile;

/// The final concatenated recording, ready for download or playback.
#[derive(Debug, Clone)]
pub struct Artifact {
    data: Bytes,
    media_type: String,
    extension: String,
    created_at: DateTime<Utc>,
}

impl Artifact {
    /// Concatenate ordered chunks into one artifact. An empty chunk list
    /// yields an empty artifact.
    pub fn from_chunks(chunks: &[Bytes], profile: &EncodingProfile) -> Self {
        let total: usize = chunks.iter().map(Bytes::len).sum();
        let mut data = BytesMut::with_capacity(total);
        for chunk in chunks {
            data.extend_from_slice(chunk);
        }

        Self {
            data: data.freeze(),
            media_type: profile.media_type.clone(),
            extension: profile.extension.clone(),
            created_at: Utc::now(),
        }
    }

    /// The concatenated recording bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Total size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the recording contains no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Media type negotiated for this recording.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// When the recording was finalized.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Default download filename, `recording-<unix-millis>.<ext>`.
    pub fn suggested_filename(&self) -> String {
        format!(
            "recording-{}.{}",
            self.created_at.timestamp_millis(),
            self.extension
        )
    }

    /// Write the artifact into `dir` under its suggested filename and
    /// return the full path.
    pub async fn write_to(&self, dir: impl AsRef<Path>) -> std::io::Result<PathBuf> {
        let path = dir.as_ref().join(self.suggested_filename());
        tokio::fs::write(&path, &self.data).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webm() -> EncodingProfile {
        EncodingProfile::new("video/webm", "webm")
    }

    #[test]
    fn concatenates_chunks_in_order() {
        let chunks = vec![
            Bytes::from_static(b"aaa"),
            Bytes::from_static(b"bb"),
            Bytes::from_static(b"cccc"),
        ];
        let artifact = Artifact::from_chunks(&chunks, &webm());
        assert_eq!(artifact.len(), 9);
        assert_eq!(artifact.data().as_ref(), b"aaabbcccc");
        assert_eq!(artifact.media_type(), "video/webm");
    }

    #[test]
    fn zero_chunks_yield_an_empty_artifact() {
        let artifact = Artifact::from_chunks(&[], &webm());
        assert!(artifact.is_empty());
        assert_eq!(artifact.len(), 0);
    }

    #[test]
    fn suggested_filename_carries_timestamp_and_extension() {
        let artifact = Artifact::from_chunks(&[], &webm());
        let name = artifact.suggested_filename();
        assert!(name.starts_with("recording-"));
        assert!(name.ends_with(".webm"));

        let millis: i64 = name
            .strip_prefix("recording-")
            .and_then(|rest| rest.strip_suffix(".webm"))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(millis, artifact.created_at().timestamp_millis());
    }
}

//! Encoding profile negotiation
//!
//! A profile is a media-type/container combination the capture backend may
//! or may not be able to encode. `begin` probes an ordered preference list
//! and takes the first supported entry, falling back to the backend's
//! generic default when nothing on the list is.

use crate::capture::CaptureBackend;
use crate::error::RecorderError;

/// A codec/container combination attempted during negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingProfile {
    /// IANA media type of the encoded stream, codec parameters included
    pub media_type: String,
    /// File extension used for artifacts in this profile
    pub extension: String,
}

impl EncodingProfile {
    /// Create a profile from a media type and artifact extension.
    pub fn new(media_type: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            extension: extension.into(),
        }
    }
}

/// Ordered preference list probed at `begin`, best first.
pub fn default_preference() -> Vec<EncodingProfile> {
    vec![
        EncodingProfile::new("video/webm;codecs=vp9,opus", "webm"),
        EncodingProfile::new("video/webm;codecs=vp8,opus", "webm"),
        EncodingProfile::new("video/webm", "webm"),
        EncodingProfile::new("video/mp4", "mp4"),
    ]
}

/// Pick the first profile in `preference` the backend supports, or its
/// generic default when none is.
pub fn negotiate(
    backend: &dyn CaptureBackend,
    preference: &[EncodingProfile],
) -> Result<EncodingProfile, RecorderError> {
    for profile in preference {
        if backend.supports_profile(profile) {
            tracing::debug!(media_type = %profile.media_type, "encoding profile negotiated");
            return Ok(profile.clone());
        }
    }

    match backend.fallback_profile() {
        Some(profile) => {
            tracing::debug!(media_type = %profile.media_type, "using backend fallback profile");
            Ok(profile)
        }
        None => Err(RecorderError::NoSupportedProfile {
            attempted: preference.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureConstraints, MediaStream, SourceKind};
    use crate::error::CaptureError;
    use async_trait::async_trait;

    /// Backend that encodes exactly one media type.
    struct SingleFormat {
        media_type: &'static str,
        fallback: Option<EncodingProfile>,
    }

    #[async_trait]
    impl CaptureBackend for SingleFormat {
        async fn acquire(
            &self,
            _source: SourceKind,
            _constraints: &CaptureConstraints,
        ) -> Result<MediaStream, CaptureError> {
            Err(CaptureError::Backend {
                reason: "not used in negotiation tests".to_string(),
            })
        }

        fn supports_profile(&self, profile: &EncodingProfile) -> bool {
            profile.media_type == self.media_type
        }

        fn fallback_profile(&self) -> Option<EncodingProfile> {
            self.fallback.clone()
        }
    }

    #[test]
    fn picks_first_supported_profile() {
        let backend = SingleFormat {
            media_type: "video/mp4",
            fallback: None,
        };
        let profile = negotiate(&backend, &default_preference()).unwrap();
        assert_eq!(profile.media_type, "video/mp4");
        assert_eq!(profile.extension, "mp4");
    }

    #[test]
    fn falls_back_to_backend_default() {
        let backend = SingleFormat {
            media_type: "video/x-exotic",
            fallback: Some(EncodingProfile::new("video/x-exotic", "bin")),
        };
        let profile = negotiate(&backend, &default_preference()).unwrap();
        assert_eq!(profile.media_type, "video/x-exotic");
    }

    #[test]
    fn errors_when_nothing_is_supported() {
        let backend = SingleFormat {
            media_type: "video/x-exotic",
            fallback: None,
        };
        let err = negotiate(&backend, &default_preference()).unwrap_err();
        match err {
            RecorderError::NoSupportedProfile { attempted } => assert_eq!(attempted, 4),
            other => panic!("expected NoSupportedProfile, got {other:?}"),
        }
    }
}

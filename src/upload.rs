//! Uploaded payloads and the metadata-only format gate applied before any decoding.

use std::path::Path;

use thiserror::Error;

/// Extensions accepted for upload, lowercase with the leading dot.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".wav", ".mp3", ".webm", ".m4a", ".ogg"];

/// Raw audio handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct UploadedAudio {
    bytes: Vec<u8>,
    filename: Option<String>,
    declared_len: u64,
}

impl UploadedAudio {
    /// Wrap a fully received payload; the declared length is the buffer length.
    pub fn new(filename: Option<String>, bytes: Vec<u8>) -> Self {
        let declared_len = bytes.len() as u64;
        Self {
            bytes,
            filename,
            declared_len,
        }
    }

    /// Override the length announced by the transport (e.g. a `Content-Length` header).
    pub fn with_declared_len(mut self, declared_len: u64) -> Self {
        self.declared_len = declared_len;
        self
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length used for validation: the larger of the declared and received sizes.
    pub fn payload_len(&self) -> u64 {
        self.declared_len.max(self.bytes.len() as u64)
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Reasons an upload is refused before touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No filename provided")]
    MissingFilename,
    #[error("Unsupported file type. Allowed: {}", ALLOWED_EXTENSIONS.join(", "))]
    UnsupportedType { extension: Option<String> },
    #[error("Uploaded file is empty")]
    Empty,
    #[error("File too large. Maximum size: {}MB", .max_bytes / (1024 * 1024))]
    TooLarge { size: u64, max_bytes: u64 },
}

/// Extension and size gate for uploads.
#[derive(Debug, Clone, Copy)]
pub struct FormatValidator {
    max_bytes: u64,
}

impl FormatValidator {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Accept the upload or explain why not. Returns the normalized extension.
    pub fn validate(
        &self,
        filename: Option<&str>,
        payload_len: u64,
    ) -> Result<&'static str, ValidationError> {
        let filename = filename
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(ValidationError::MissingFilename)?;
        let extension = allowed_extension(filename).ok_or_else(|| {
            ValidationError::UnsupportedType {
                extension: lowercase_extension(filename),
            }
        })?;
        if payload_len == 0 {
            return Err(ValidationError::Empty);
        }
        if payload_len > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size: payload_len,
                max_bytes: self.max_bytes,
            });
        }
        Ok(extension)
    }

    /// Validate a received upload. An empty body is rejected whatever length was declared.
    pub fn validate_upload(
        &self,
        upload: &UploadedAudio,
    ) -> Result<&'static str, ValidationError> {
        let len = if upload.bytes().is_empty() {
            0
        } else {
            upload.payload_len()
        };
        self.validate(upload.filename(), len)
    }
}

/// Match the filename's extension against the allow-list, case-insensitively.
///
/// The returned value is the allow-list entry, never caller-controlled text.
pub fn allowed_extension(filename: &str) -> Option<&'static str> {
    let ext = lowercase_extension(filename)?;
    ALLOWED_EXTENSIONS
        .iter()
        .copied()
        .find(|allowed| allowed.trim_start_matches('.') == ext.trim_start_matches('.'))
}

fn lowercase_extension(filename: &str) -> Option<String> {
    // Uploads from Windows clients may carry backslash separators.
    let base = filename.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(filename);
    Path::new(base)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_UPLOAD_BYTES;

    fn validator() -> FormatValidator {
        FormatValidator::new(DEFAULT_MAX_UPLOAD_BYTES)
    }

    #[test]
    fn accepts_every_allowed_extension_in_any_case() {
        for name in ["a.wav", "b.MP3", "c.WebM", "d.m4a", "e.Ogg"] {
            assert!(validator().validate(Some(name), 10).is_ok(), "{name}");
        }
        assert_eq!(validator().validate(Some("x.MP3"), 1), Ok(".mp3"));
    }

    #[test]
    fn missing_or_blank_filename_is_rejected() {
        assert_eq!(
            validator().validate(None, 10),
            Err(ValidationError::MissingFilename)
        );
        assert_eq!(
            validator().validate(Some("   "), 10),
            Err(ValidationError::MissingFilename)
        );
    }

    #[test]
    fn unsupported_extension_is_rejected_before_size_checks() {
        let err = validator().validate(Some("clip.txt"), 0).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedType {
                extension: Some(".txt".to_string())
            }
        );
        assert!(err.to_string().starts_with("Unsupported file type"));
        assert!(err.to_string().contains(".wav, .mp3, .webm, .m4a, .ogg"));

        let err = validator().validate(Some("noext"), 10).unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedType { extension: None });
    }

    #[test]
    fn extension_is_taken_from_the_last_path_segment() {
        assert_eq!(
            validator().validate(Some("..\\evil.wav\\clip.txt"), 5),
            Err(ValidationError::UnsupportedType {
                extension: Some(".txt".to_string())
            })
        );
        assert_eq!(validator().validate(Some("dir.mp3/clip.ogg"), 5), Ok(".ogg"));
    }

    #[test]
    fn empty_payload_is_rejected() {
        let err = validator().validate(Some("clip.wav"), 0).unwrap_err();
        assert_eq!(err, ValidationError::Empty);
        assert_eq!(err.to_string(), "Uploaded file is empty");
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let size = DEFAULT_MAX_UPLOAD_BYTES + 1;
        let err = validator().validate(Some("clip.mp3"), size).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TooLarge {
                size,
                max_bytes: DEFAULT_MAX_UPLOAD_BYTES
            }
        );
        assert_eq!(err.to_string(), "File too large. Maximum size: 50MB");
        assert!(
            validator()
                .validate(Some("clip.mp3"), DEFAULT_MAX_UPLOAD_BYTES)
                .is_ok()
        );
    }

    #[test]
    fn empty_body_is_rejected_despite_a_declared_length() {
        let upload =
            UploadedAudio::new(Some("clip.wav".into()), Vec::new()).with_declared_len(1_000);
        assert_eq!(
            validator().validate_upload(&upload),
            Err(ValidationError::Empty)
        );
        let huge = UploadedAudio::new(Some("clip.wav".into()), Vec::new())
            .with_declared_len(DEFAULT_MAX_UPLOAD_BYTES * 2);
        assert_eq!(validator().validate_upload(&huge), Err(ValidationError::Empty));
        let unnamed = UploadedAudio::new(None, Vec::new()).with_declared_len(10);
        assert_eq!(
            validator().validate_upload(&unnamed),
            Err(ValidationError::MissingFilename)
        );
    }

    #[test]
    fn declared_length_counts_towards_the_limit() {
        let upload = UploadedAudio::new(Some("clip.wav".into()), vec![1, 2, 3])
            .with_declared_len(DEFAULT_MAX_UPLOAD_BYTES * 2);
        assert!(matches!(
            validator().validate_upload(&upload),
            Err(ValidationError::TooLarge { .. })
        ));
    }
}

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("not a Tox21 assay: {0}")]
    AssayNotFound(String),

    #[error("Tripod request failed: {0}")]
    TripodHttp(String),

    #[error("Tripod returned status {status}: {message}")]
    TripodStatus { status: u16, message: String },

    #[error("malformed assay archive: {0}")]
    ArchiveFormat(String),

    #[error("label column already present in fused table: {0}")]
    FusionConflict(String),

    #[error("assay {assay}: {source}")]
    Assay {
        assay: String,
        #[source]
        source: Box<KiraError>,
    },

    #[error("run cancelled")]
    Cancelled,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to write output: {0}")]
    Output(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl KiraError {
    pub fn for_assay(self, assay: &str) -> Self {
        match self {
            KiraError::Assay { .. } => self,
            other => KiraError::Assay {
                assay: assay.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Innermost error, skipping the per-assay context wrapper.
    pub fn root(&self) -> &KiraError {
        match self {
            KiraError::Assay { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            KiraError::TripodHttp(_) | KiraError::TripodStatus { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn assay_context_is_not_nested() {
        let err = KiraError::ArchiveFormat("no member".to_string())
            .for_assay("tox21-ahr-p1")
            .for_assay("tox21-pxr-p1");
        assert_matches!(&err, KiraError::Assay { assay, .. } if assay == "tox21-ahr-p1");
        assert_matches!(err.root(), KiraError::ArchiveFormat(_));
        assert_eq!(
            err.to_string(),
            "assay tox21-ahr-p1: malformed assay archive: no member"
        );
    }

    #[test]
    fn only_retrieval_errors_are_retryable() {
        let status = KiraError::TripodStatus {
            status: 503,
            message: "busy".to_string(),
        }
        .for_assay("tox21-ahr-p1");
        assert!(status.is_retryable());
        assert!(!KiraError::AssayNotFound("x".to_string()).is_retryable());
        assert!(!KiraError::FusionConflict("ahr-p1".to_string()).is_retryable());
    }
}

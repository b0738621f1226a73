use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("wordlist: could not read {path:?}: {source}")]
    Wordlist {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("wordlist: {path:?} is empty")]
    EmptyWordlist { path: PathBuf },
    #[error("output_dir: could not create {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("transport: {url}: {source}")]
    Transport { url: String, source: reqwest::Error },
    #[error("http_status: {status} for {url}")]
    Status { url: String, status: StatusCode },
    #[error("malformed_body: {url}: {reason}")]
    MalformedBody {
        url: String,
        reason: String,
        preview: String,
    },
    #[error("render: {0}")]
    Render(String),
    #[error("io: {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl HarvestError {
    /// Only startup failures end a run; everything else is logged by the
    /// stage that hit it and the pipeline moves on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HarvestError::Wordlist { .. }
                | HarvestError::EmptyWordlist { .. }
                | HarvestError::OutputDir { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub words_searched: usize,
    pub pages_found: usize,
    pub pages_processed: usize,
    pub pages_failed: usize,
    pub pdfs_written: usize,
    pub attachments_saved: usize,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_startup_errors_are_fatal() {
        let wordlist = HarvestError::EmptyWordlist {
            path: PathBuf::from("wordlist.txt"),
        };
        assert!(wordlist.is_fatal());

        let status = HarvestError::Status {
            url: "http://host:8090/pages/view/1".into(),
            status: StatusCode::NOT_FOUND,
        };
        assert!(!status.is_fatal());
        assert!(!HarvestError::Render("no browser".into()).is_fatal());
    }

    #[test]
    fn status_error_message() {
        let e = HarvestError::Status {
            url: "http://host:8090/x".into(),
            status: StatusCode::FORBIDDEN,
        };
        assert_eq!(e.to_string(), "http_status: 403 Forbidden for http://host:8090/x");
    }
}

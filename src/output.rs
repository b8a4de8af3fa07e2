//! Serialization of snapshots and error records, and where they are written.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DecodeError, FetchError, LoadError};
use crate::snapshot::Snapshot;

/// The `{"error": ...}` document emitted instead of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error: String,
}

/// Exactly one output document: either a snapshot or an error record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Report {
    Snapshot(Snapshot),
    Error(ErrorReport),
}

impl Report {
    pub fn error(message: impl Into<String>) -> Self {
        Report::Error(ErrorReport {
            error: message.into(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Report::Error(_))
    }
}

impl From<Snapshot> for Report {
    fn from(snapshot: Snapshot) -> Self {
        Report::Snapshot(snapshot)
    }
}

impl From<FetchError> for Report {
    fn from(err: FetchError) -> Self {
        Report::error(err.to_string())
    }
}

impl From<DecodeError> for Report {
    fn from(err: DecodeError) -> Self {
        Report::error(format!("Erreur lors du décodage du flux GTFS-RT : {err}"))
    }
}

impl From<LoadError> for Report {
    fn from(err: LoadError) -> Self {
        Report::error(format!("Erreur lors du chargement des arrêts : {err}"))
    }
}

/// Serializes `report` as JSON. Non-ASCII text is written as-is.
pub fn render(report: &Report, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    Ok(text)
}

/// Destination of the rendered documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    /// One document per line.
    Stdout,
    /// Replaced with each new document.
    File(PathBuf),
}

impl OutputSink {
    pub fn write(&self, report: &Report, pretty: bool) -> Result<()> {
        let text = render(report, pretty)?;
        match self {
            OutputSink::Stdout => {
                let mut out = std::io::stdout().lock();
                writeln!(out, "{text}")?;
                out.flush()?;
            }
            OutputSink::File(path) => {
                fs::write(path, text.as_bytes())
                    .with_context(|| format!("writing {}", path.display()))?;
                debug!(path = %path.display(), bytes = text.len(), "Report written");
            }
        }
        Ok(())
    }
}

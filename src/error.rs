//! Error taxonomy for the snapshot pipeline.
//!
//! Join misses are not errors: they are handled as sentinel values in
//! [`crate::snapshot`].

use std::path::PathBuf;

/// The static stop table could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("impossible de lire {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("table des arrêts invalide: {0}")]
    Csv(#[from] csv::Error),
    #[error("colonne obligatoire absente: {0}")]
    MissingColumn(&'static str),
}

/// The feed could not be retrieved.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("Erreur {status_code} lors de la récupération des données")]
    Status { status_code: u16 },
    /// DNS, connection, timeout or body read failure.
    #[error("Erreur réseau lors de la récupération des données : {0}")]
    Network(#[source] reqwest::Error),
    #[error("URL du flux invalide ({url}) : {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Erreur de lecture de {} : {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// HTTP status of the failed response, when the server answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Status { status_code } => Some(*status_code),
            FetchError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// The payload is not a valid GTFS-RT `FeedMessage`.
#[derive(Debug, thiserror::Error)]
#[error("flux GTFS-RT illisible ({len} octets): {source}")]
pub struct DecodeError {
    pub len: usize,
    #[source]
    pub source: prost::DecodeError,
}

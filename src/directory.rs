//! Static stop metadata, keyed by GTFS `stop_id`.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::LoadError;
use crate::snapshot::{UNAVAILABLE, UNKNOWN};

/// One row of the stop table. Placeholders for absent cells are applied at
/// load time, so every field is a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopRecord {
    pub stop_id: String,
    pub stop_name: String,
    pub stop_desc: String,
    pub geom: String,
}

/// Read-only lookup from stop id to [`StopRecord`].
#[derive(Debug, Default, Clone)]
pub struct StopDirectory {
    stops: HashMap<String, StopRecord>,
}

/// Column positions resolved from the header row.
struct Columns {
    stop_id: usize,
    stop_name: Option<usize>,
    stop_desc: Option<usize>,
    geom: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self, LoadError> {
        let find = |name: &str| headers.iter().position(|h| h == name);

        let columns = Columns {
            stop_id: find("stop_id").ok_or(LoadError::MissingColumn("stop_id"))?,
            stop_name: find("stop_name"),
            stop_desc: find("stop_desc"),
            geom: find("geom"),
        };

        for column in columns.missing_optional() {
            warn!(column, "Stop table has no such column, using placeholder");
        }

        Ok(columns)
    }

    /// Optional columns absent from the header row.
    fn missing_optional(&self) -> Vec<&'static str> {
        [
            ("stop_name", self.stop_name),
            ("stop_desc", self.stop_desc),
            ("geom", self.geom),
        ]
        .into_iter()
        .filter(|(_, idx)| idx.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}

fn cell(record: &StringRecord, idx: Option<usize>, fallback: &str) -> String {
    idx.and_then(|i| record.get(i))
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

impl StopDirectory {
    /// Loads a CSV stop table from `path` using `delimiter` as separator.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened, is not valid CSV, or has no
    /// `stop_id` column.
    #[tracing::instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>, delimiter: u8) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let directory = Self::from_reader(file, delimiter)?;
        info!(stops = directory.len(), "Stop table loaded");
        Ok(directory)
    }

    /// Builds a directory from any CSV source. Every field is kept as text.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self, LoadError> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        let columns = Columns::resolve(rdr.headers()?)?;

        let mut stops = HashMap::new();
        let mut skipped = 0usize;
        let mut duplicates = 0usize;

        for result in rdr.records() {
            let record = result?;
            let stop_id = record.get(columns.stop_id).unwrap_or("").to_string();
            if stop_id.is_empty() {
                skipped += 1;
                continue;
            }

            let stop = StopRecord {
                stop_name: cell(&record, columns.stop_name, UNKNOWN),
                stop_desc: cell(&record, columns.stop_desc, UNAVAILABLE),
                geom: cell(&record, columns.geom, UNAVAILABLE),
                stop_id: stop_id.clone(),
            };

            if stops.insert(stop_id, stop).is_some() {
                duplicates += 1;
            }
        }

        if skipped > 0 {
            warn!(skipped, "Skipped stop records with empty stop_id");
        }
        if duplicates > 0 {
            debug!(duplicates, "Duplicate stop_id rows, keeping the last one");
        }

        Ok(Self { stops })
    }

    /// Returns the record for `stop_id`, if the table has one.
    pub fn lookup(&self, stop_id: &str) -> Option<&StopRecord> {
        self.stops.get(stop_id)
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

impl FromIterator<StopRecord> for StopDirectory {
    fn from_iter<I: IntoIterator<Item = StopRecord>>(iter: I) -> Self {
        Self {
            stops: iter
                .into_iter()
                .map(|s| (s.stop_id.clone(), s))
                .collect(),
        }
    }
}

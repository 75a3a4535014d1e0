//! Tabular dataset preview for CSV, JSON, and Parquet files.
//!
//! A dataset belongs to a session: it is loaded from a file, reported as
//! `Rows N, columns M.`, and individual rows are read back as JSON objects.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::ErrorCode;

/// File extensions [`Dataset::load`] accepts, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = [".csv", ".json", ".parquet"];

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error(
        "unsupported dataset file extension: '{extension}'. Supported extensions: {}",
        SUPPORTED_EXTENSIONS.join(", ")
    )]
    Unsupported { extension: String },

    #[error("cannot read dataset {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {} as {format}: {message}", path.display())]
    Parse {
        path: PathBuf,
        format: DatasetFormat,
        message: String,
    },

    #[error("row {row} is out of range for a dataset of {rows} rows")]
    RowOutOfRange { row: usize, rows: usize },
}

impl DatasetError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unsupported { .. } => ErrorCode::UnsupportedDataset,
            Self::Read { .. } | Self::Parse { .. } => ErrorCode::DatasetUnreadable,
            Self::RowOutOfRange { .. } => ErrorCode::RowOutOfRange,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    Csv,
    Json,
    Parquet,
}

impl DatasetFormat {
    /// Format implied by the extension of `path`.
    ///
    /// # Errors
    ///
    /// [`DatasetError::Unsupported`] for any extension outside
    /// [`SUPPORTED_EXTENSIONS`], including none at all.
    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        match extension.to_lowercase().as_str() {
            ".csv" => Ok(Self::Csv),
            ".json" => Ok(Self::Json),
            ".parquet" => Ok(Self::Parquet),
            _ => Err(DatasetError::Unsupported { extension }),
        }
    }
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Csv => "CSV",
            Self::Json => "JSON",
            Self::Parquet => "Parquet",
        })
    }
}

/// A loaded data frame plus where it came from.
#[derive(Debug, Clone)]
pub struct Dataset {
    path: PathBuf,
    format: DatasetFormat,
    frame: DataFrame,
}

impl Dataset {
    /// Load `path`, choosing the reader from its extension.
    ///
    /// A zero-byte file loads as an empty dataset. CSV rows that fail to
    /// parse are skipped rather than failing the load.
    ///
    /// # Errors
    ///
    /// Returns an error for an unsupported extension, an unreadable file, or
    /// content the reader rejects.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let format = DatasetFormat::from_path(path)?;
        let read_error = |source| DatasetError::Read {
            path: path.to_path_buf(),
            source,
        };
        let size = std::fs::metadata(path).map_err(read_error)?.len();

        let frame = if size == 0 {
            DataFrame::empty()
        } else {
            read_frame(path, format).map_err(|err| DatasetError::Parse {
                path: path.to_path_buf(),
                format,
                message: err.to_string(),
            })?
        };
        info!(
            path = %path.display(),
            %format,
            rows = frame.height(),
            columns = frame.width(),
            "loaded data frame"
        );
        Ok(Self {
            path: path.to_path_buf(),
            format,
            frame,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn format(&self) -> DatasetFormat {
        self.format
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.frame.height()
    }

    #[must_use]
    pub fn columns(&self) -> usize {
        self.frame.width()
    }

    /// No rows to preview.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    /// `Rows N, columns M.`
    #[must_use]
    pub fn shape_label(&self) -> String {
        format!("Rows {}, columns {}.", self.rows(), self.columns())
    }

    /// The first `limit` rows, for display.
    #[must_use]
    pub fn head(&self, limit: usize) -> DataFrame {
        self.frame.head(Some(limit))
    }

    /// Row `index` as a JSON object keyed by column name.
    ///
    /// # Errors
    ///
    /// [`DatasetError::RowOutOfRange`] if `index >= rows()`.
    pub fn row(&self, index: usize) -> Result<Map<String, Value>, DatasetError> {
        let values = self
            .frame
            .get(index)
            .ok_or(DatasetError::RowOutOfRange {
                row: index,
                rows: self.rows(),
            })?;
        debug!(row = index, "selected dataset row");
        Ok(self
            .column_names()
            .into_iter()
            .zip(values.iter().map(json_value))
            .collect())
    }

    /// Up to `limit` leading rows as JSON objects.
    ///
    /// # Errors
    ///
    /// Never fails for in-range rows; propagates [`Dataset::row`] otherwise.
    pub fn rows_as_json(&self, limit: usize) -> Result<Vec<Map<String, Value>>, DatasetError> {
        (0..self.rows().min(limit)).map(|i| self.row(i)).collect()
    }
}

fn read_frame(path: &Path, format: DatasetFormat) -> PolarsResult<DataFrame> {
    match format {
        DatasetFormat::Csv => {
            let reader = CsvReadOptions::default()
                .with_has_header(true)
                .with_ignore_errors(true)
                .try_into_reader_with_file_path(Some(path.to_path_buf()))?;
            reader.finish()
        }
        DatasetFormat::Json => JsonReader::new(File::open(path)?).finish(),
        DatasetFormat::Parquet => ParquetReader::new(File::open(path)?).finish(),
    }
}

fn float(value: f64) -> Value {
    serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn json_value(value: &AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::String(s) => Value::from(*s),
        AnyValue::StringOwned(s) => Value::from(s.as_str()),
        AnyValue::Int32(v) => Value::from(*v),
        AnyValue::Int64(v) => Value::from(*v),
        AnyValue::UInt32(v) => Value::from(*v),
        AnyValue::UInt64(v) => Value::from(*v),
        AnyValue::Float32(v) => float(f64::from(*v)),
        AnyValue::Float64(v) => float(*v),
        other => Value::String(other.to_string()),
    }
}

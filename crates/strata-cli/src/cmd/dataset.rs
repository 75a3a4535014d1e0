//! `strata dataset`: load a CSV, JSON, or Parquet file and preview it.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use serde_json::{Map, Value};
use strata_core::Dataset;
use strata_core::dataset::{DatasetError, DatasetFormat};
use strata_core::format::pretty_json;

use crate::output::{OutputMode, fail, pretty_kv, pretty_section, render_mode_to};

#[derive(Args, Debug)]
pub struct DatasetArgs {
    /// File to load (.csv, .json, or .parquet).
    pub file: PathBuf,

    /// Show this row (0-based) as JSON.
    #[arg(long)]
    pub row: Option<usize>,

    /// Rows to include in the preview.
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct SelectedRow {
    pub index: usize,
    pub values: Map<String, Value>,
}

/// What the dataset view shows: shape, preview, and the selected row.
#[derive(Debug, Serialize)]
pub struct DatasetReport {
    pub path: String,
    pub format: DatasetFormat,
    pub rows: usize,
    pub columns: usize,
    pub column_names: Vec<String>,
    pub shape: String,
    pub preview: Vec<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<SelectedRow>,
    #[serde(skip)]
    table: String,
}

impl DatasetReport {
    /// # Errors
    ///
    /// [`DatasetError::RowOutOfRange`] if `row` is past the last row.
    pub fn new(dataset: &Dataset, limit: usize, row: Option<usize>) -> Result<Self, DatasetError> {
        let row = row
            .map(|index| {
                dataset
                    .row(index)
                    .map(|values| SelectedRow { index, values })
            })
            .transpose()?;
        Ok(Self {
            path: dataset.path().display().to_string(),
            format: dataset.format(),
            rows: dataset.rows(),
            columns: dataset.columns(),
            column_names: dataset.column_names(),
            shape: dataset.shape_label(),
            preview: dataset.rows_as_json(limit)?,
            row,
            table: dataset.head(limit).to_string(),
        })
    }
}

fn text_report(report: &DatasetReport, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "path\t{}", report.path)?;
    writeln!(w, "rows\t{}", report.rows)?;
    writeln!(w, "columns\t{}", report.columns)?;
    if let Some(row) = &report.row {
        writeln!(w, "row.{}\t{}", row.index, Value::Object(row.values.clone()))?;
    }
    Ok(())
}

fn pretty_report(report: &DatasetReport, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Dataset")?;
    pretty_kv(w, "file", &report.path)?;
    pretty_kv(w, "format", report.format.to_string())?;
    writeln!(w, "{}", report.shape)?;
    writeln!(w)?;
    if report.rows == 0 {
        writeln!(w, "(empty dataset)")?;
    } else {
        writeln!(w, "{}", report.table)?;
    }
    if let Some(row) = &report.row {
        writeln!(w)?;
        pretty_section(w, &format!("Selected row {}", row.index))?;
        let rendered = pretty_json(&row.values).map_err(std::io::Error::other)?;
        writeln!(w, "{rendered}")?;
    }
    Ok(())
}

pub fn render_report(w: &mut dyn Write, mode: OutputMode, report: &DatasetReport) -> Result<()> {
    render_mode_to(w, mode, report, text_report, pretty_report)
}

pub fn run_dataset(args: &DatasetArgs, output: OutputMode) -> Result<()> {
    let report = Dataset::load(&args.file)
        .and_then(|dataset| DatasetReport::new(&dataset, args.limit, args.row))
        .map_err(|err| fail(output, err.code(), err.to_string()))?;
    let stdout = std::io::stdout();
    render_report(&mut stdout.lock(), output, &report)
}

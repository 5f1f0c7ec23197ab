//! Catalog file loading

use crate::error::{ExomapError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Loads catalog exports into polars frames.
///
/// CSV and TSV are read with every column typed as text; numeric coercion is
/// left to harmonization so that a stray token never fails the whole read.
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    comment_prefix: Option<String>,
}

impl Default for CatalogLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogLoader {
    /// Loader that skips `#` comment lines (NASA Exoplanet Archive headers)
    pub fn new() -> Self {
        Self {
            comment_prefix: Some("#".to_string()),
        }
    }

    pub fn with_comment_prefix(mut self, prefix: Option<&str>) -> Self {
        self.comment_prefix = prefix.map(str::to_string);
        self
    }

    /// Detect format from extension and load
    pub fn load(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let mut df = match ext.as_str() {
            "xls" | "xlsx" => {
                return Err(ExomapError::UnsupportedFormat {
                    path: path.display().to_string(),
                    reason: "spreadsheet input is not supported, export the sheet to CSV".to_string(),
                })
            }
            "parquet" | "pq" => self.load_parquet(path)?,
            "tsv" | "tab" => self.load_delimited(path, b'\t')?,
            _ => self.load_delimited(path, b',')?,
        };

        trim_column_names(&mut df)?;
        info!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            "Loaded catalog"
        );
        Ok(df)
    }

    fn load_delimited(&self, path: &Path, separator: u8) -> Result<DataFrame> {
        let file = open(path)?;
        let parse_opts = CsvParseOptions::default()
            .with_separator(separator)
            .with_comment_prefix(self.comment_prefix.as_deref());

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| ExomapError::DataError(format!("{}: {e}", path.display())))
    }

    fn load_parquet(&self, path: &Path) -> Result<DataFrame> {
        let file = open(path)?;
        ParquetReader::new(file)
            .finish()
            .map_err(|e| ExomapError::DataError(format!("{}: {e}", path.display())))
    }

    /// Row, column and null counts for a loaded frame
    pub fn summarize(df: &DataFrame) -> FrameSummary {
        let columns = df
            .get_columns()
            .iter()
            .map(|col| ColumnSummary {
                name: col.name().to_string(),
                dtype: col.dtype().to_string(),
                null_count: col.null_count(),
            })
            .collect();

        FrameSummary {
            n_rows: df.height(),
            n_cols: df.width(),
            columns,
        }
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        ExomapError::IoError(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })
}

fn trim_column_names(df: &mut DataFrame) -> Result<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    for name in names {
        let trimmed = name.trim();
        if trimmed != name {
            debug!(from = %name, to = %trimmed, "Trimmed column name");
            df.rename(&name, trimmed.into())?;
        }
    }
    Ok(())
}

/// Overview of a loaded catalog
#[derive(Debug, Clone)]
pub struct FrameSummary {
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<ColumnSummary>,
}

#[derive(Debug, Clone)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
}

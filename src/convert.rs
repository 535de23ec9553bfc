//! Conversion of pairwise similarity CSVs into the scores file read by the
//! clustering tool.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use log::info;
use thiserror::Error;

/// Errors raised while converting a similarity CSV.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("file not found: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("empty file or no header: {}", .0.display())]
    NoHeader(PathBuf),
    #[error("no rows with at least three columns in {}", .0.display())]
    NoRecords(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Final component of a `/`-separated path. A trailing slash yields `""`.
fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Convert `csv_path` into `<basename>,<score>,<path>` lines at `output`.
///
/// The first row is always treated as a header. Rows with fewer than three
/// columns are dropped. Fields are written as-is, so a field containing a
/// comma will shift the columns of its line.
///
/// Returns the number of lines written; zero lines is reported as
/// [`ConvertError::NoRecords`] after the (empty) output has been written.
pub fn convert(csv_path: &Path, output: &Path) -> Result<usize, ConvertError> {
    if !csv_path.exists() {
        return Err(ConvertError::MissingInput(csv_path.to_path_buf()));
    }
    let csv_err = |source: csv::Error| ConvertError::Csv {
        path: csv_path.to_path_buf(),
        source,
    };
    let io_err = |source: io::Error| ConvertError::Io {
        path: output.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(csv_path)
        .map_err(csv_err)?;
    let mut writer = BufWriter::new(File::create(output).map_err(io_err)?);

    let mut records = reader.records();
    if records.next().transpose().map_err(csv_err)?.is_none() {
        return Err(ConvertError::NoHeader(csv_path.to_path_buf()));
    }

    let mut count = 0;
    for record in records {
        let record = record.map_err(csv_err)?;
        if let (Some(file), Some(score)) = (record.get(0), record.get(2)) {
            writeln!(writer, "{},{},{}", basename(file), score, file).map_err(io_err)?;
            count += 1;
        }
    }
    writer.flush().map_err(io_err)?;

    info!(
        "Converted {} to {} ({} entries)",
        csv_path.display(),
        output.display(),
        count
    );
    if count == 0 {
        return Err(ConvertError::NoRecords(csv_path.to_path_buf()));
    }
    Ok(count)
}

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use tracing::{debug, info};

use crate::csv_codec::records_from_frame;
use crate::domain::TMError;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
pub struct FileInfo {
    pub path: PathBuf,
    pub file_size: u64,
    pub file_type: FileType,
}

/// Expands `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf, TMError> {
    let expanded =
        shellexpand::full(raw.trim()).map_err(|e| TMError::PathExpansion(e.to_string()))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

pub fn detect_file_type(path: &Path) -> Result<FileType, TMError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(TMError::UnknownFileType),
    }
}

pub fn get_file_info(path: PathBuf) -> Result<FileInfo, TMError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TMError::FileNotFound,
        ErrorKind::PermissionDenied => TMError::PermissionDenied,
        _ => TMError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(TMError::LoadingFailed("Not a file!".into()));
    }

    let file_type = detect_file_type(&path)?;
    Ok(FileInfo {
        path,
        file_size: metadata.len(),
        file_type,
    })
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}

/// Loads the startup data set. Record ids are the 1-based positions of the non-blank rows.
pub fn load_seed(path: PathBuf) -> Result<Vec<Record>, TMError> {
    let file_info = get_file_info(path)?;
    debug!(
        "Loading {:?} ({:?}, {} bytes)",
        file_info.path, file_info.file_type, file_info.file_size
    );
    let frame = match file_info.file_type {
        FileType::CSV => load_csv(&file_info.path)?,
        FileType::PARQUET => load_parquet(&file_info.path)?,
        FileType::ARROW => load_arrow(&file_info.path)?,
    };

    let start_time = Instant::now();
    let df = frame.collect()?;
    let records = records_from_frame(&df, |row| (row + 1).to_string())?;
    info!(
        "Loading {} records took {}ms ...",
        records.len(),
        start_time.elapsed().as_millis()
    );
    Ok(records)
}

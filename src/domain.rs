use std::path::PathBuf;
use std::string::FromUtf8Error;
use std::time::Duration;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::preferences::Theme;

#[derive(Debug, Error)]
pub enum TMError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("csv error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("preferences error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("invalid utf-8: {0}")]
    Utf8Error(#[from] FromUtf8Error),
    #[error("Please select a CSV file")]
    NotCsvFile(PathBuf),
    #[error("Failed to parse CSV file. Please check the format.")]
    ImportFormat(String),
    #[error("Import did not finish within {0:?}")]
    ImportTimedOut(Duration),
    #[error("Import was canceled")]
    ImportCanceled,
    #[error("Loading failed: {0}")]
    LoadingFailed(String),
    #[error("Could not expand path: {0}")]
    PathExpansion(String),
    #[error("File not found")]
    FileNotFound,
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Unknown file type")]
    UnknownFileType,
}

impl TMError {
    /// Errors that are shown to the user as an inline import message.
    pub fn is_import_error(&self) -> bool {
        matches!(
            self,
            TMError::NotCsvFile(_)
                | TMError::ImportFormat(_)
                | TMError::ImportTimedOut(_)
                | TMError::ImportCanceled
                | TMError::IoError(_)
                | TMError::Utf8Error(_)
        )
    }
}

/// Runtime configuration, assembled from the command line in `main`.
#[derive(Debug, Clone, Setters)]
pub struct Config {
    pub event_poll_time: u64,
    pub page_size: usize,
    pub import_timeout: Duration,
    pub export_dir: PathBuf,
    pub theme: Option<Theme>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            page_size: 10,
            import_timeout: Duration::from_secs(30),
            export_dir: PathBuf::from("."),
            theme: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Search,
    ImportPath,
    AddColumn,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PrevPage,
    LargerPages,
    SmallerPages,
    FirstPage,
    LastPage,
    Sort,
    ClearSort,
    Search,
    Edit,
    Delete,
    Confirm,
    Import,
    Export,
    ManageColumns,
    ToggleColumn,
    AddColumn,
    MoveColumnUp,
    MoveColumnDown,
    ResetColumns,
    ToggleTheme,
    CopyCell,
    CopyRow,
    Help,
    Exit,
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
Table
  j/k, Up/Down      select row
  h/l, Left/Right   select column
  n/p, PgDn/PgUp    next / previous page
  g/G               first / last page
  + / -             more / fewer rows per page
  s                 sort by selected column (again to flip)
  S                 clear sort
  /                 search all fields
  e, Enter          edit selected row
  d, Del            delete selected row
  c                 manage columns
  i                 import CSV file
  x                 export filtered rows as CSV
  y / Y             copy cell / row to clipboard
  t                 toggle theme
  Esc               dismiss message, cancel import
  ?                 this help
  q                 quit

Columns
  j/k               select column
  Space, Enter      toggle visibility
  J/K               move column down / up
  a                 add column
  r                 reset columns
  Esc               close

Edit form
  Tab/Shift-Tab     next / previous field
  Enter             save
  Esc               cancel
";

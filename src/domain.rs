use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use std::io::Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VitalsError {
    #[error("I/O error: {0}")]
    IoError(#[from] Error),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Loading failed: {0}")]
    LoadingFailed(String),
    #[error("File not found")]
    FileNotFound,
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Unknown file type")]
    UnknownFileType,
    #[error("Renderer Error: no renderer registered as \"{0}\"")]
    RendererNotFound(String),
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Filter,
    EditCell,
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
    FirstPage,
    LastPage,
    CyclePageSize,
    SortAscending,
    SortDescending,
    ClearSort,
    Filter,
    ToggleRowSelection,
    ToggleAllRowsSelection,
    DeleteSelected,
    AddPatient,
    EditCell,
    CopyCell,
    CopyRow,
    Help,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
Navigation
  ←↓↑→ / hjkl     move the cell cursor
  ] / PgDn        next page
  [ / PgUp        previous page
  g / Home        first page
  G / End         last page
  p               cycle page size (5, 10, 25, all)

Data
  s / S           sort focused column ascending / descending
  u               clear sorting
  /               filter rows (Esc clears the filter)
  Enter / e       edit focused cell (Enter commits, Esc reverts)
  Space           toggle row selection
  a               toggle selection of all rows
  d               delete selected rows
  n               add a generated patient
  c / C           copy cell / row to the clipboard

  ?               show this help (Esc closes)
  q               quit";

use polars::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::columns::{ColumnDescriptor, extend_with_fields};
use crate::domain::VitalsError;
use crate::record::{LAST_CONTACT_DATE, Row, Value};

#[derive(Debug, PartialEq)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

fn detect_file_type(path: &Path) -> Result<FileType, VitalsError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(VitalsError::UnknownFileType),
    }
}

fn get_file_info(path: PathBuf) -> Result<FileInfo, VitalsError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => VitalsError::FileNotFound,
        ErrorKind::PermissionDenied => VitalsError::PermissionDenied,
        _ => VitalsError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(VitalsError::LoadingFailed("Not a file!".into()));
    }

    Ok(FileInfo {
        file_size: metadata.len(),
        file_type: detect_file_type(&path)?,
        path,
    })
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
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

fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Converts one frame column into cell values, using the descriptor of the
/// same name to decide how text is interpreted.
fn load_column(
    df: &DataFrame,
    name: &str,
    descriptor: Option<&ColumnDescriptor>,
) -> Result<Vec<Value>, PolarsError> {
    let column = df.column(name)?;
    if is_numeric_type(column.dtype()) {
        let col = column.cast(&DataType::Float64)?;
        return Ok(col
            .f64()?
            .into_iter()
            .map(|v| v.map_or(Value::Missing, Value::Number))
            .collect());
    }

    let is_tags = descriptor.is_some_and(|d| d.tags);
    let is_date = name == LAST_CONTACT_DATE;
    let col = column.cast(&DataType::String)?;
    Ok(col
        .str()?
        .into_iter()
        .map(|v| match v {
            None => Value::Missing,
            Some(s) if is_tags => Value::parse_tags(s),
            Some(s) if is_date => Value::parse_date(s),
            Some(s) => Value::Text(s.to_string()),
        })
        .collect())
}

/// Turns a frame into rows. Columns are converted in parallel.
pub fn frame_to_rows(
    df: &DataFrame,
    columns: &mut Vec<ColumnDescriptor>,
) -> Result<Vec<Row>, VitalsError> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    extend_with_fields(columns, names.iter().map(String::as_str));

    let descriptors: &[ColumnDescriptor] = columns;
    let converted: Result<Vec<(String, Vec<Value>)>, PolarsError> = names
        .par_iter()
        .map(|name| {
            let descriptor = descriptors.iter().find(|d| &d.id == name);
            load_column(df, name, descriptor).map(|values| (name.clone(), values))
        })
        .collect();
    let converted = converted?;

    let mut rows = vec![Row::new(); df.height()];
    for (name, values) in converted {
        for (row, value) in rows.iter_mut().zip(values) {
            row.set(name.clone(), value);
        }
    }
    Ok(rows)
}

#[instrument(skip(columns))]
pub fn load_data_file(
    path: PathBuf,
    columns: &mut Vec<ColumnDescriptor>,
) -> Result<Vec<Row>, VitalsError> {
    let file_info = get_file_info(path)?;
    debug!("Loading {:?}", file_info);
    let frame = match file_info.file_type {
        FileType::CSV => load_csv(&file_info.path)?,
        FileType::PARQUET => load_parquet(&file_info.path)?,
        FileType::ARROW => load_arrow(&file_info.path)?,
    };

    let start_time = Instant::now();
    let df = frame.collect()?;
    let rows = frame_to_rows(&df, columns)?;
    info!(
        "Loaded {} rows ({} bytes) in {}ms",
        rows.len(),
        file_info.file_size,
        start_time.elapsed().as_millis()
    );
    Ok(rows)
}

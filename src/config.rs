use clap::{ArgAction, Parser};
use derive_setters::Setters;
use std::path::PathBuf;

use crate::domain::VitalsError;
use crate::logging::LogConfig;

#[derive(Parser, Debug)]
#[command(name = "vitals", version, about = "A terminal grid of patient vitals.")]
pub struct Args {
    /// CSV, Parquet or Arrow file with patient rows. Generates patients when omitted.
    pub file: Option<String>,

    /// Number of generated patients
    #[arg(short = 'n', long, default_value_t = 20)]
    pub rows: usize,

    /// Number of generated sub records per patient
    #[arg(long, default_value_t = 0)]
    pub sub_rows: usize,

    /// Seed of the patient generator
    #[arg(long)]
    pub seed: Option<u64>,

    /// Rows per page, 0 shows all rows
    #[arg(short, long, default_value_t = 10)]
    pub page_size: usize,

    #[arg(long, default_value_t = 40)]
    pub max_column_width: usize,

    /// Write logs to this file
    #[arg(long)]
    pub log_file: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Allow patient values in log output
    #[arg(long)]
    pub log_data: bool,
}

pub fn expand_path(path: &str) -> Result<PathBuf, VitalsError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| VitalsError::LoadingFailed(e.to_string()))
}

impl Args {
    pub fn log_config(&self) -> Result<LogConfig, VitalsError> {
        let mut config = LogConfig::from_verbosity(self.verbose);
        config.log_file = self.log_file.as_deref().map(expand_path).transpose()?;
        config.log_data = self.log_data;
        Ok(config)
    }

    pub fn grid_config(&self) -> GridConfig {
        GridConfig::default()
            .with_page_size(self.page_size)
            .with_max_column_width(self.max_column_width.max(4))
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct GridConfig {
    pub event_poll_time: u64,
    pub page_size: usize,
    /// Page sizes cycled through; `0` stands for all rows.
    pub page_size_options: Vec<usize>,
    pub max_column_width: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            page_size: 10,
            page_size_options: vec![5, 10, 25, 0],
            max_column_width: 40,
        }
    }
}

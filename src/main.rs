use chrono::Local;
use clap::Parser;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info};

mod classifier;
mod columns;
mod config;
mod controller;
mod domain;
mod editor;
mod inputter;
mod loader;
mod logging;
mod mockdata;
mod model;
mod record;
mod renderer;
mod ui;

use columns::patient_columns;
use config::{Args, expand_path};
use controller::Controller;
use domain::VitalsError;
use logging::init_logging;
use mockdata::MockGenerator;
use model::{Model, Status};
use ui::TableUI;

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(args: &Args) -> Result<(), VitalsError> {
    init_logging(&args.log_config()?)?;

    let seed = args.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    });
    let mut generator = MockGenerator::new(seed);
    let mut columns = patient_columns();

    let (name, rows) = match &args.file {
        Some(file) => {
            let path = expand_path(file)?;
            let name = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("???")
                .to_string();
            (name, loader::load_data_file(path, &mut columns)?)
        }
        None => {
            info!("Generating {} patients with seed {seed}", args.rows);
            let lens = if args.sub_rows > 0 {
                vec![args.rows, args.sub_rows]
            } else {
                vec![args.rows]
            };
            let now = Local::now().naive_local();
            ("Patients".to_string(), generator.make_data(&lens, now))
        }
    };

    let cfg = args.grid_config();
    let mut model = Model::init(&cfg, name, columns, rows, generator);
    let mut ui = TableUI::new();
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    let result = (|| -> Result<(), VitalsError> {
        while model.status != Status::QUITTING {
            // Render the current view
            terminal.draw(|f| ui.draw(&model, f))?;

            // Handle events and map to a Message
            let message = controller.handle_event(&model)?;
            model.update(message);
        }
        Ok(())
    })();
    ratatui::restore();
    info!("Closing with {} patients", model.dataset().len());
    result
}

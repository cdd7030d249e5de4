use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

mod columns;
mod controller;
mod csv_codec;
mod domain;
mod editor;
mod import;
mod inputter;
mod loader;
mod logging;
mod model;
mod pipeline;
mod preferences;
mod record;
mod store;
mod ui;
mod validation;

use controller::Controller;
use domain::{Config, TMError};
use model::{Model, Status};
use preferences::{PreferencesStorage, Theme};
use ui::TableUI;

/// A tui based tabular data manager.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Data file to start with (csv, parquet or arrow). Without it a small sample table is shown.
    path: Option<String>,

    /// Rows per page
    #[arg(long, default_value_t = 10)]
    page_size: usize,

    /// Seconds an import may take before it is abandoned
    #[arg(long, default_value_t = 30)]
    import_timeout: u64,

    /// Directory exports are written to
    #[arg(long, default_value = ".")]
    export_dir: String,

    /// Directory holding preferences and logs
    #[arg(long)]
    config_dir: Option<String>,

    /// Color theme, overrides the stored preference
    #[arg(long, value_enum)]
    theme: Option<Theme>,

    /// Event poll time in milliseconds
    #[arg(long, default_value_t = 100)]
    poll: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(args: Args) -> Result<(), TMError> {
    let config_dir = match &args.config_dir {
        Some(dir) => loader::expand_path(dir)?,
        None => preferences::config_dir()
            .ok_or_else(|| TMError::LoadingFailed("no config directory".into()))?,
    };
    let _log_guard = logging::init(&logging::logs_dir(&config_dir))?;
    info!("Starting tabman with {:?}", args);

    let cfg = Config::default()
        .event_poll_time(args.poll)
        .page_size(args.page_size.max(1))
        .import_timeout(Duration::from_secs(args.import_timeout))
        .export_dir(loader::expand_path(&args.export_dir)?)
        .theme(args.theme);

    let seed = match &args.path {
        Some(path) => loader::load_seed(loader::expand_path(path)?)?,
        None => record::seed_records(),
    };
    let storage = PreferencesStorage::in_dir(&config_dir);

    let mut model = Model::init(&cfg, seed, Some(storage));
    let mut ui = TableUI::new();
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut model, &mut ui, &controller);
    ratatui::restore();
    if let Err(e) = &result {
        error!("Stopped with error: {e:?}");
    }
    info!(
        "Bye, leaving {} records behind",
        model.store().state().table.records.len()
    );
    result
}

fn event_loop(
    terminal: &mut ratatui::DefaultTerminal,
    model: &mut Model,
    ui: &mut TableUI,
    controller: &Controller,
) -> Result<(), TMError> {
    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(model, f))?;

        // Handle events and map to a Message. Runs without a message too, so a
        // running import is polled.
        let message = controller.handle_event(model)?;
        model.update(message);
    }
    Ok(())
}

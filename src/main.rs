use acidentes::chart_export::ChartExport;
use acidentes::error_display::user_message_from_report;
use acidentes::export::{write_points_csv, write_rows_csv};
use acidentes::{
    AppConfig, Args, ConfigManager, Dashboard, DashboardOptions, IngestOptions, LoadCache,
};
use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,acidentes=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        let result = match &args.config {
            Some(path) => write_config_template(path, args.force),
            None => ConfigManager::new(acidentes::APP_NAME)
                .and_then(|manager| manager.write_default_config(args.force)),
        };
        match result {
            Ok(path) => {
                println!("Configuration written to {}", path.display());
                return Ok(Some(()));
            }
            Err(e) => {
                eprintln!("Error writing configuration: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(None)
}

/// `--generate-config --config PATH` writes the template to PATH itself.
fn write_config_template(path: &Path, force: bool) -> Result<PathBuf> {
    if path.exists() && !force {
        return Err(eyre!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        ));
    }
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let manager = ConfigManager::with_dir(dir);
    manager.ensure_config_dir()?;
    std::fs::write(path, manager.generate_default_config()?)?;
    Ok(path.to_path_buf())
}

fn load_config(args: &Args) -> Result<AppConfig> {
    match &args.config {
        Some(path) if !path.exists() => Err(eyre!("Config file not found: {}", path.display())),
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(acidentes::APP_NAME),
    }
}

fn ingest_options(args: &Args, config: &AppConfig) -> IngestOptions {
    let chunk_size = args.chunk_size.unwrap_or(config.ingest.chunk_size);
    let mut opts = IngestOptions::new().with_chunk_size(chunk_size);
    if let Some(delimiter) = args.delimiter.or(config.source.delimiter) {
        opts = opts.with_delimiter(delimiter);
    }
    opts
}

fn log_export(path: &Path, result: Result<()>) {
    match result {
        Ok(()) => tracing::info!(path = %path.display(), "written"),
        Err(e) => eprintln!("Export failed: {}", user_message_from_report(&e, Some(path))),
    }
}

fn write_artifacts(args: &Args, config: &AppConfig, dashboard: &Dashboard) {
    let delimiter = args.delimiter.or(config.source.delimiter).unwrap_or(b',');
    let size = (config.chart.width, config.chart.height);

    if let Some(path) = &args.export_csv {
        log_export(path, write_rows_csv(path, &dashboard.filtered, delimiter));
    }
    if let Some(path) = &args.points_csv {
        log_export(path, write_points_csv(path, &dashboard.map_points()));
    }
    if let Some(path) = &args.cause_chart {
        let chart = ChartExport::cause_ranking(&dashboard.causes, args.top);
        log_export(path, chart.write(path, size));
    }
    if let Some(path) = &args.monthly_chart {
        let chart = ChartExport::monthly_series(&dashboard.monthly);
        log_export(path, chart.write(path, size));
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    let config = load_config(&args)?;
    let path = args
        .path
        .clone()
        .or_else(|| config.source.path.as_ref().map(PathBuf::from))
        .ok_or_else(|| {
            eyre!("No input file. Pass a PATH or set source.path in the config file.")
        })?;

    let mut cache = LoadCache::new();
    let table = cache.load_or_empty(
        &path,
        &ingest_options(&args, &config),
        &mut std::io::stderr().lock(),
    );
    let options = DashboardOptions::resolve(&args, &config, &table)?;
    let dashboard = Dashboard::build(&table, &options);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    dashboard.write_text(&mut out, args.top)?;
    out.flush()?;

    write_artifacts(&args, &config, &dashboard);
    Ok(())
}

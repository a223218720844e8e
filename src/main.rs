//! Exercise form coach: replays recorded pose frames and reports form scores,
//! repetitions and alerts.

use anyhow::{Context, Result};
use clap::Parser;
use form_coach::{
    app::{AlertMode, AppConfig, ReplayApp, StreamTarget},
    config::Config,
    exercise::Exercise,
};
use log::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON-lines frame file to replay ('-' for stdin)
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Score every frame as this exercise (standing, plank, pushup, squat, lunge)
    #[arg(short, long)]
    exercise: Option<String>,

    /// Device id alerts are addressed to
    #[arg(long)]
    device_id: Option<String>,

    /// Write per-frame results as JSON lines to this file ('-' for stdout)
    #[arg(short, long)]
    output: Option<String>,

    /// Alert delivery (log, none, stdout)
    #[arg(short, long, default_value = "log")]
    alerts: String,

    /// Only print the final session report
    #[arg(long)]
    summary_only: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Form Coach");

    // Load configuration if provided
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path);
        match Config::from_file(config_path).and_then(|cfg| cfg.validate().map(|()| cfg)) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Failed to load config file: {}. Using defaults.", e);
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    if let Some(device_id) = args.device_id {
        config.alerts.device_id = device_id;
    }

    if args.print_config {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    // Build application configuration
    let app_config = AppConfig {
        input: args.input.parse::<StreamTarget>()?,
        output: args.output.as_deref().map(str::parse::<StreamTarget>).transpose()?,
        alert_mode: args.alerts.parse::<AlertMode>()?,
        exercise_override: args.exercise.as_deref().map(str::parse::<Exercise>).transpose()?,
        summary_only: args.summary_only,
        config,
    };

    // Create and run application
    let mut app = ReplayApp::new(app_config)?;
    let report = app.run().context("Replay failed")?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

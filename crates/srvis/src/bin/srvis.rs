//! Command-line front end: inspect, render and export localisation files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use serde::Serialize;

use srvis::core::{init_with_level, level_from_verbosity, ColumnSummary};
use srvis::{
    parse_filter_arg, pipeline, FilterRange, LocalisationFormat, RenderConfig, Session, Variant,
};

#[derive(Parser)]
#[command(name = "srvis", version)]
#[command(about = "Inspect, filter and render super-resolution localisation data")]
struct Cli {
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// More log output, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log through tracing as JSON lines
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarise a localisation file
    Info {
        #[command(flatten)]
        input: InputArgs,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a JSON render config and write its report
    Render {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Write x, y, frame in nanometres
    Export {
        #[command(flatten)]
        input: InputArgs,

        #[arg(short, long)]
        output: PathBuf,

        /// Data variant, e.g. `grouped`; the preferred one when omitted
        #[arg(long)]
        view: Option<Variant>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Dialect {
    Rapidstorm,
    Xyt,
}

#[derive(Args)]
struct InputArgs {
    /// Localisation file
    input: PathBuf,

    #[arg(long, value_enum, default_value_t = Dialect::Rapidstorm)]
    format: Dialect,

    /// Nanometres per pixel
    #[arg(long, default_value_t = 1.0)]
    pixel_size: f64,

    /// Camera counts per photon (rapidstorm only)
    #[arg(long, default_value_t = 1.0)]
    photon_conversion: f64,

    /// `column=min:max`, repeatable. Bounds may be empty or `auto`; a
    /// trailing `%` reads a bound as a percentage of the column maximum
    #[arg(short, long = "filter", value_parser = parse_filter_arg)]
    filters: Vec<(String, FilterRange)>,
}

impl InputArgs {
    fn format(&self) -> LocalisationFormat {
        match self.format {
            Dialect::Rapidstorm => LocalisationFormat::RapidStorm {
                photon_conversion: self.photon_conversion,
                pixel_size: self.pixel_size,
            },
            Dialect::Xyt => LocalisationFormat::Xyt {
                pixel_size: self.pixel_size,
            },
        }
    }

    fn open(&self) -> Result<Session, Box<dyn std::error::Error>> {
        let mut session = Session::open(&self.input, self.format())?;
        if !self.filters.is_empty() {
            session.filter(self.filters.clone(), false)?;
        }
        Ok(session)
    }
}

#[derive(Serialize)]
struct InfoReport {
    input_path: String,
    view: String,
    num_localisations: usize,
    num_unfiltered: usize,
    frames: Option<[f64; 2]>,
    columns: BTreeMap<String, ColumnSummary>,
}

fn info_report(input: &InputArgs, session: &Session) -> InfoReport {
    let store = session.store();
    let current = store.current();
    let frames = current
        .frame()
        .first()
        .zip(current.frame().last())
        .map(|(&a, &b)| [a, b]);
    let columns = current
        .column_names()
        .iter()
        .filter_map(|c| Some((c.clone(), session.column_summary(c)?)))
        .collect();
    InfoReport {
        input_path: input.input.to_string_lossy().into_owned(),
        view: store.view_name(None, true),
        num_localisations: current.len(),
        num_unfiltered: store.current_view(None, false).map_or(0, |t| t.len()),
        frames,
        columns,
    }
}

fn print_info(report: &InfoReport) {
    println!("file: {}", report.input_path);
    println!("view: {}", report.view);
    println!(
        "localisations: {} (of {})",
        report.num_localisations, report.num_unfiltered
    );
    if let Some([first, last]) = report.frames {
        println!("frames: {first} .. {last}");
    }
    println!("{:<16} {:>12} {:>12} {:>12}", "column", "median", "mean", "std");
    for (name, s) in &report.columns {
        println!(
            "{:<16} {:>12.4} {:>12.4} {:>12.4}",
            name, s.median, s.mean, s.std
        );
    }
}

/// Stderr logger at the `-q` / `-v` level; with the `tracing` feature a
/// tracing subscriber instead when `RUST_LOG` or `--log-json` is given.
fn init_logging(cli: &Cli) -> Result<(), log::SetLoggerError> {
    #[cfg(feature = "tracing")]
    {
        if cli.log_json || std::env::var_os("RUST_LOG").is_some() {
            let _ = tracing_log::LogTracer::init();
            srvis::core::init_tracing(cli.log_json);
            return Ok(());
        }
    }
    init_with_level(level_from_verbosity(cli.quiet, cli.verbose))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    match &cli.command {
        Command::Info { input, json } => {
            let session = input.open()?;
            let report = info_report(input, &session);
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_info(&report);
            }
        }
        Command::Render { config } => {
            let cfg = RenderConfig::load_json(config)?;
            let report = pipeline::run(&cfg, config);
            let output_path = cfg.output_path();
            report.write_json(&output_path)?;
            info!("wrote report JSON to {}", output_path.display());
            if let Some(err) = report.error {
                return Err(err.into());
            }
        }
        Command::Export {
            input,
            output,
            view,
        } => {
            let session = input.open()?;
            let rows = session.save(output, *view)?;
            println!("{rows} localisations written to {}", output.display());
        }
    }
    Ok(())
}

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use refinery_model::{ParameterOverrides, Parameters, RefineryData, RefineryModel, RefineryReport};
use refinery_solver::Solver;
use tracing::debug;

mod logging;
mod render;

use logging::LogFormat;

#[derive(Parser)]
#[command(name = "refinery", version)]
#[command(about = "Profit-maximizing product mix for an oil refinery", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the problem data and the parameters in effect
    Data {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Print the assembled linear program
    Formulation {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Validate the data and build the model without solving
    Check {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Solve for the most profitable product mix
    Solve {
        #[command(flatten)]
        input: InputArgs,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Stop the solver after this many seconds
        #[arg(long, value_name = "SECONDS", value_parser = parse_time_limit)]
        time_limit: Option<Duration>,
        /// Leave out the bar chart
        #[arg(long)]
        no_chart: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Args)]
struct InputArgs {
    /// Refinery data file (JSON); the bundled data set when omitted
    #[arg(short, long)]
    data: Option<PathBuf>,
    /// TOML file overriding the parameter defaults
    #[arg(short, long)]
    params: Option<PathBuf>,
    /// Crude availability in barrels/day, e.g. CrudeOil1=25000 (repeatable)
    #[arg(long = "max-crude", value_name = "CRUDE=BARRELS", value_parser = parse_crude_cap)]
    max_crude: Vec<(String, f64)>,
    /// Minimum lube oil production
    #[arg(long)]
    min_lube_oil: Option<f64>,
    /// Maximum lube oil production
    #[arg(long)]
    max_lube_oil: Option<f64>,
    /// Distillation capacity in barrels/day
    #[arg(long)]
    max_distillation: Option<f64>,
    /// Naphtha reforming capacity in barrels/day
    #[arg(long)]
    max_reforming: Option<f64>,
    /// Oil cracking capacity in barrels/day
    #[arg(long)]
    max_cracking: Option<f64>,
}

impl InputArgs {
    fn flag_overrides(&self) -> ParameterOverrides {
        ParameterOverrides {
            max_crude: self.max_crude.iter().cloned().collect(),
            min_lube_oil: self.min_lube_oil,
            max_lube_oil: self.max_lube_oil,
            max_distillation: self.max_distillation,
            max_reforming: self.max_reforming,
            max_cracking: self.max_cracking,
        }
    }

    /// Data file first, then the parameter file, then flags
    fn load(&self) -> Result<(RefineryData, Parameters)> {
        let data = match &self.data {
            Some(path) => RefineryData::load_file(path)?,
            None => RefineryData::bundled().context("bundled refinery data is invalid")?,
        };

        let file_overrides = match &self.params {
            Some(path) => ParameterOverrides::load_file(path)
                .with_context(|| format!("reading parameters from {}", path.display()))?,
            None => ParameterOverrides::default(),
        };
        let overrides = file_overrides.merge(self.flag_overrides());
        debug!(?overrides, "parameter overrides");

        let mut params = data.limits.clone();
        params.apply(&overrides)?;
        params.validate(&data.raw_materials)?;
        Ok((data, params))
    }
}

fn parse_crude_cap(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected CRUDE=BARRELS, got '{}'", s))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid barrels for {}: {}", name, e))?;
    Ok((name.trim().to_string(), value))
}

fn parse_time_limit(s: &str) -> Result<Duration, String> {
    let seconds: f64 = s.trim().parse().map_err(|e| format!("invalid seconds: {}", e))?;
    if seconds <= 0.0 {
        return Err("time limit must be positive".to_string());
    }
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid time limit {}: {}", s, e))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format);

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Data { input } => {
            let (data, params) = input.load()?;
            print!("{}", render::data_tables(&data, &params));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Formulation { input } => {
            let (data, params) = input.load()?;
            let model = RefineryModel::build(&data, &params)?;
            println!("{}", model.lp_problem);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { input } => {
            let (data, params) = input.load()?;
            let model = RefineryModel::build(&data, &params)?;

            match &input.data {
                Some(path) => println!("✓ {} is valid", path.display()),
                None => println!("✓ bundled data is valid"),
            }
            println!("  {} materials", model.materials.len());
            println!("  {} streams", model.streams.len());
            println!("  {} variables", model.lp_problem.num_variables());
            println!("  {} constraints", model.lp_problem.num_constraints());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Solve {
            input,
            format,
            time_limit,
            no_chart,
        } => {
            let (data, params) = input.load()?;
            let model = RefineryModel::build(&data, &params)?;

            let mut solver = Solver::new();
            if let Some(limit) = time_limit {
                solver = solver.with_time_limit(limit);
            }

            let solution = model.solve(&solver);
            let report = RefineryReport::new(&data, &model, &solution);

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Table => print!("{}", render::report(&report, !no_chart)),
            }

            Ok(if report.is_optimal() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

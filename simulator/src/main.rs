use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use lib::config::SimConfig;
use lib::engine::run_and_write_results;

#[derive(Parser)]
#[clap(
    name = "sim",
    version = "1.0",
    about = "Discrete-event simulator for a heterogeneous task-scheduling platform.
    Loads a DAG-set workload and a server-type configuration, runs the
    coupled DAG-manager/event-queue simulation, and writes out.csv plus
    per-run trace files."
)]
struct ArgParser {
    /// Path to the YAML simulation config file.
    #[clap(short = 'c', long = "config", required = true)]
    config_path: PathBuf,
    /// Directory to write out.csv and trace files into.
    #[clap(short = 'o', long = "output-dir", default_value = ".")]
    output_dir: PathBuf,
    /// Name of the scheduling policy to run.
    #[clap(short = 'p', long = "policy", default_value = "first_fit")]
    policy: String,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = ArgParser::parse();

    let config = match SimConfig::load(&args.config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fatal: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = run_and_write_results(&config, &args.policy, &args.output_dir) {
        eprintln!("fatal: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

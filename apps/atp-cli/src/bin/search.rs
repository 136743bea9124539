use std::process::ExitCode;

use anyhow::Result;
use atp_cli::args::SearchArgs;
use atp_cli::startup::{build_pipeline, init_tracing};
use atp_core::config::Config;
use atp_search::format_results;
use clap::Parser;

fn run(args: SearchArgs) -> Result<()> {
    let config = Config::load()?;
    let settings = config.settings()?;
    let base = std::env::current_dir()?;

    let pipeline = build_pipeline(&settings, &base)?;
    let request = args.to_request(pipeline.limits());
    let results = pipeline.retrieve(&request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results.to_columns())?);
    } else {
        println!("{}", format_results(&results));
    }
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let args = SearchArgs::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

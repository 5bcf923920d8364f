use std::path::Path;

use clap::{CommandFactory, Parser};
use serde::Serialize;
use tracing::debug;

use crate::cli::{Cli, DecompileCommand, DecompileModeCli, TopLevel};

mod cli;

/// Logs go to stderr, and only when `RUST_LOG` is set.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {msg}");
    std::process::exit(1);
}

fn read_input(path: &Path) -> Vec<u8> {
    match std::fs::read(path) {
        Ok(bytes) => {
            debug!(path = %path.display(), len = bytes.len(), "read input");
            bytes
        }
        Err(e) => fail(format_args!("failed to read {path:?}: {e}")),
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => fail(e),
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Some(TopLevel::Decompile { command }) => match command {
            DecompileCommand::File { path, mode } => {
                let mode = match mode {
                    DecompileModeCli::Source => degds_lib::DecompileMode::Source,
                    DecompileModeCli::Tokens => degds_lib::DecompileMode::Tokens,
                };
                let bytes = read_input(&path);
                match degds_lib::decompile_with_options(&bytes, degds_lib::DecompileOptions { mode }) {
                    Ok(out) => print!("{out}"),
                    Err(e) => fail(format_args!("decompile error: {e}")),
                }
            }
        },
        Some(TopLevel::Test { path, json }) => {
            let report = degds_lib::test_bytecode_report(&read_input(&path));
            if json {
                print_json(&report);
            } else {
                let rev = degds_lib::REVISION;
                println!(
                    "{:?} (revision {}, engine {}; enum checks: {}, builtin calls: {})",
                    report.result, rev.commit, rev.engine_versions, report.enum_checks, report.builtin_calls
                );
            }
        }
        Some(TopLevel::Dump { path }) => match degds_lib::parse(&read_input(&path)) {
            Ok(bc) => print_json(&bc),
            Err(e) => fail(format_args!("parse error: {e}")),
        },
        Some(TopLevel::Completion { shell }) => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        }
        None => {
            if let Err(e) = Cli::command().print_help() {
                fail(e);
            }
        }
    }
}

//! `draco-validate` command-line tool.
//!
//! ```text
//! draco-validate compare original.glb roundtrip.glb -q 14 -t 10
//! draco-validate inspect model.glb --format json
//! ```
//!
//! Exit status: 0 when every verifiable mesh matches, 1 when geometry
//! diverges, 2 when an input could not be loaded or parsed, 3 when the
//! report could not be written.

mod cli;

use std::io;
use std::process;

use clap::Parser;

use cli::{Cli, CliError};

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let stdout = io::stdout();
    let code = match cli::run(&cli, &mut stdout.lock()) {
        Ok(code) => code,
        Err(e) => {
            match &e {
                CliError::Input(inner) => eprintln!("error: could not load input: {}", inner),
                _ => eprintln!("error: {}", e),
            }
            e.exit_code()
        }
    };
    process::exit(code);
}

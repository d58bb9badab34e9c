mod cmd_shader_compile;
mod cmd_shader_report;
mod error;
mod shader_args;

use std::env;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use crate::error::{Result, XtaskError};

fn print_help() {
    println!(
        "\
Developer commands for the D3D9 shader compiler.

Usage:
  cargo xtask <command> [args...]

Commands:
  shader-compile   Compile one shader and print the generated WGSL.
  shader-report    Print a stable reflection report for one or more shaders.

Run `cargo xtask <command> --help` for command options.
"
    );
}

fn run(mut args: Vec<String>) -> Result<()> {
    if args.is_empty() {
        print_help();
        return Ok(());
    }
    let command = args.remove(0);
    match command.as_str() {
        "-h" | "--help" | "help" => {
            print_help();
            Ok(())
        }
        "shader-compile" => cmd_shader_compile::cmd(args),
        "shader-report" => cmd_shader_report::cmd(args),
        other => Err(XtaskError::Message(format!(
            "unknown command `{other}` (run `cargo xtask --help`)"
        ))),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

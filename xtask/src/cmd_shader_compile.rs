use aero_d3d9_shader::{compile, compile_unsized, CompileOptions};

use crate::error::{Result, XtaskError};
use crate::shader_args::{parse_option, read_shader, OPTIONS_HELP};

pub fn print_help() {
    println!(
        "\
Compile a D3D9 shader token stream and print the generated WGSL.

Usage:
  cargo xtask shader-compile [options] <file>

Input:
  A raw D3D9 token stream (little-endian u32 words, starting with the version token).

Output:
  The generated WGSL on stdout. Diagnostics go to stderr, one per line, and make the command
  exit non-zero.

Options:
{OPTIONS_HELP}
  --unsized
      Treat the file length as an upper bound; decoding stops at the end token.
"
    );
}

pub fn cmd(args: Vec<String>) -> Result<()> {
    if args.is_empty() || args.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return Ok(());
    }

    let mut options = CompileOptions::default();
    let mut unsized_input = false;
    let mut file = None;
    let mut i = 0;
    while i < args.len() {
        if parse_option(&args, &mut i, &mut options)? {
            i += 1;
            continue;
        }
        match args[i].as_str() {
            "--unsized" => unsized_input = true,
            other if other.starts_with('-') => {
                return Err(XtaskError::Message(format!(
                    "unknown flag for `shader-compile`: `{other}`"
                )))
            }
            other => {
                if file.replace(other.to_string()).is_some() {
                    return Err(XtaskError::Message(
                        "shader-compile takes exactly one file".to_string(),
                    ));
                }
            }
        }
        i += 1;
    }
    let Some(path) = file else {
        return Err(XtaskError::Message(
            "usage: cargo xtask shader-compile [options] <file>".to_string(),
        ));
    };

    let bytes = read_shader(&path)?;
    let result = if unsized_input {
        compile_unsized(&bytes, &options)
    } else {
        compile(&bytes, &options)
    };
    tracing::debug!(
        path = %path,
        diagnostics = result.diagnostics.len(),
        "compiled shader"
    );

    if !result.source.is_empty() {
        print!("{}", result.source);
    }
    for diagnostic in &result.diagnostics {
        eprintln!("{path}: {diagnostic}");
    }
    if result.is_ok() {
        Ok(())
    } else {
        Err(XtaskError::Message(format!(
            "{} diagnostic(s) in {path}",
            result.diagnostics.len()
        )))
    }
}

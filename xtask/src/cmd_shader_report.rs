use aero_d3d9_shader::{compile, CompileOptions, CompileResult, LiteralValue, ShaderError};

use crate::error::{Result, XtaskError};
use crate::shader_args::{parse_option, read_shader, OPTIONS_HELP};

pub fn print_help() {
    println!(
        "\
Report what D3D9 shaders need from a renderer (for CI artifacts).

Usage:
  cargo xtask shader-report [options] [--deny-diagnostics] <files...>

Input:
  Raw D3D9 token streams (little-endian u32 words).

Output:
  Stable text report containing, per file:
    - shader model, entry point and estimated instruction slots
    - uniform arrays, samplers, literal constants and constant-table symbols
    - vertex attributes / varyings and outputs
    - diagnostics

Options:
{OPTIONS_HELP}
  --deny-diagnostics
      Exit non-zero if any file produced a diagnostic.
"
    );
}

pub fn cmd(args: Vec<String>) -> Result<()> {
    if args.is_empty() || args.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return Ok(());
    }

    let mut options = CompileOptions::default();
    let mut deny_diagnostics = false;
    let mut files = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if parse_option(&args, &mut i, &mut options)? {
            i += 1;
            continue;
        }
        match args[i].as_str() {
            "--deny-diagnostics" => deny_diagnostics = true,
            other if other.starts_with('-') => {
                return Err(XtaskError::Message(format!(
                    "unknown flag for `shader-report`: `{other}`"
                )))
            }
            other => files.push(other.to_string()),
        }
        i += 1;
    }

    if files.is_empty() {
        return Err(XtaskError::Message(
            "usage: cargo xtask shader-report [options] [--deny-diagnostics] <files...>"
                .to_string(),
        ));
    }

    // Sort paths so output is stable regardless of shell glob ordering.
    files.sort();

    println!("shader-report v1");
    println!("files: {}", files.len());
    println!("deny_diagnostics: {deny_diagnostics}");
    println!();

    let mut files_ok = 0u64;
    let mut files_failed = 0u64;
    let mut total_slots = 0u64;
    let mut any_unreadable = false;

    for path in &files {
        println!("file: {path}");
        match read_shader(path) {
            Ok(bytes) => {
                let result = compile(&bytes, &options);
                if result.is_ok() {
                    files_ok += 1;
                } else {
                    files_failed += 1;
                }
                total_slots += u64::from(result.instruction_count);
                print_report(&result);
            }
            Err(err) => {
                files_failed += 1;
                any_unreadable = true;
                println!("  error: {err}");
            }
        }
        println!();
    }

    println!("aggregate:");
    println!("  files_ok: {files_ok}");
    println!("  files_failed: {files_failed}");
    println!("  instruction_slots: {total_slots}");

    if any_unreadable {
        return Err(XtaskError::Message(
            "one or more shaders could not be read".to_string(),
        ));
    }
    if deny_diagnostics && files_failed > 0 {
        return Err(XtaskError::Message("shader diagnostics found".to_string()));
    }
    Ok(())
}

fn print_report(result: &CompileResult) {
    match result.version {
        Some(version) => println!("  shader: {version}"),
        None => println!("  shader: <unknown>"),
    }
    println!("  entry_point: {}", or_none(result.entry_point));
    println!("  instruction_slots: {}", result.instruction_count);

    println!("  uniforms:");
    if result.uniforms.is_empty() {
        println!("    <none>");
    }
    for u in &result.uniforms {
        println!(
            "    {} binding={} count={} registers={:?}",
            u.name, u.binding, u.array_count, u.registers
        );
    }

    println!("  samplers:");
    if result.samplers.is_empty() {
        println!("    <none>");
    }
    for s in &result.samplers {
        let mut flags = Vec::new();
        if s.texbem {
            flags.push("texbem");
        }
        if s.shadow {
            flags.push("shadow");
        }
        println!(
            "    {} {} group={} binding={}{}{}",
            s.name,
            s.texture_type.name(),
            s.group,
            s.binding,
            if flags.is_empty() { "" } else { " " },
            flags.join(",")
        );
    }

    println!("  constants:");
    if result.constants.is_empty() {
        println!("    <none>");
    }
    for c in &result.constants {
        println!("    {} = {}", c.name, format_literal(&c.value));
    }

    println!("  symbols:");
    if result.symbols.is_empty() {
        println!("    <none>");
    }
    for s in &result.symbols {
        println!(
            "    {} {:?} index={} count={}",
            s.name, s.register_set, s.register_index, s.register_count
        );
    }

    for (label, list) in [("attributes", &result.attributes), ("outputs", &result.outputs)] {
        println!("  {label}:");
        if list.is_empty() {
            println!("    <none>");
        }
        for a in list {
            println!("    {} {}{}", a.name, a.usage.name(), a.index);
        }
    }

    println!("  diagnostics:");
    if result.diagnostics.is_empty() {
        println!("    <none>");
    }
    for d in &result.diagnostics {
        println!("    [{}] {d}", category_name(&d.error));
    }
}

fn or_none(s: &str) -> &str {
    if s.is_empty() {
        "<none>"
    } else {
        s
    }
}

fn format_literal(value: &LiteralValue) -> String {
    match value {
        LiteralValue::Float(v) => format!("({}, {}, {}, {})", v[0], v[1], v[2], v[3]),
        LiteralValue::Int(v) => format!("({}, {}, {}, {})", v[0], v[1], v[2], v[3]),
        LiteralValue::Bool(b) => b.to_string(),
    }
}

fn category_name(error: &ShaderError) -> &'static str {
    match error.category() {
        aero_d3d9_shader::ErrorCategory::Malformed => "malformed",
        aero_d3d9_shader::ErrorCategory::Illegal => "illegal",
        aero_d3d9_shader::ErrorCategory::Unsupported => "unsupported",
    }
}

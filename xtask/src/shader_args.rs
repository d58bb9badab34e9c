//! Compile-option flags shared by the shader commands.

use std::fs;

use aero_d3d9_shader::{CompileOptions, TextureType};

use crate::error::{Result, XtaskError};

pub const OPTIONS_HELP: &str = "\
  --sampler <n>=<2d|cube|volume>
      Force the texture shape bound to sampler n.
  --shadow <n>
      Sample through sampler n with depth comparison.
  --half-pixel
      Shift vertex positions to the D3D9 pixel-center convention.";

/// Consumes a compile-option flag at `args[*i]`. Returns `false` if the argument is not one.
pub fn parse_option(args: &[String], i: &mut usize, options: &mut CompileOptions) -> Result<bool> {
    let arg = args[*i].as_str();
    match arg {
        "--half-pixel" => options.half_pixel_center = true,
        "--sampler" => {
            let value = take_value(args, i, arg)?;
            let (index, shape) = value.split_once('=').ok_or_else(|| {
                XtaskError::Message(format!("--sampler expects <n>=<shape>, got `{value}`"))
            })?;
            let index = parse_sampler_index(index)?;
            let shape = match shape {
                "2d" => TextureType::Texture2D,
                "cube" => TextureType::TextureCube,
                "volume" | "3d" => TextureType::Texture3D,
                other => {
                    return Err(XtaskError::Message(format!(
                        "unknown sampler shape `{other}` (expected: 2d|cube|volume)"
                    )))
                }
            };
            options.sampler_map.insert(index, shape);
        }
        "--shadow" => {
            let value = take_value(args, i, arg)?;
            let index = parse_sampler_index(&value)?;
            options.shadow_samplers |= 1 << index;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn take_value(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    *i += 1;
    match args.get(*i) {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => Err(XtaskError::Message(format!("{flag} requires a value"))),
    }
}

fn parse_sampler_index(s: &str) -> Result<u32> {
    match s.parse::<u32>() {
        Ok(n) if n < 16 => Ok(n),
        _ => Err(XtaskError::Message(format!(
            "invalid sampler index `{s}` (expected 0-15)"
        ))),
    }
}

pub fn read_shader(path: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| XtaskError::Message(format!("read {path:?}: {e}")))
}

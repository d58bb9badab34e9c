//! Compile driver: byte-level checks, the decode/validate/emit loop, end-of-program checks and
//! result assembly.

use tracing::debug;

use crate::context::Context;
use crate::diagnostics::{DiagnosticPosition, Diagnostics, ShaderError};
use crate::emit::wgsl::WgslEmitter;
use crate::emit::{Emitter, Profile};
use crate::limits::{MAX_SHADER_BYTECODE_BYTES, MAX_SHADER_MAJOR};
use crate::reflect::{reflect, Reflection};
use crate::token::{decode_unit, decode_version, TokenStream, Unit};
use crate::types::{Register, RegisterKind, ShaderStage, ShaderVersion};
use crate::validate::validate;
use crate::{CompileOptions, CompileResult};

/// Compiles a buffer whose length is exactly the shader's length. Bytes after the end token are
/// an error.
pub fn compile(bytes: &[u8], options: &CompileOptions) -> CompileResult {
    run(bytes, options, true)
}

/// Compiles a buffer of unknown length: decoding stops at the end token and never looks past it.
pub fn compile_unsized(bytes: &[u8], options: &CompileOptions) -> CompileResult {
    run(bytes, options, false)
}

fn emitter_for(profile: Profile) -> Box<dyn Emitter> {
    match profile {
        Profile::Wgsl => Box::new(WgslEmitter::new()),
    }
}

/// Shader models this compiler accepts.
fn version_supported(version: &ShaderVersion) -> bool {
    if version.major > MAX_SHADER_MAJOR {
        return false;
    }
    let pair = (version.major, version.minor);
    match version.stage {
        ShaderStage::Vertex => matches!(pair, (1, 0 | 1) | (2, 0 | 1) | (3, 0)),
        ShaderStage::Pixel => matches!(pair, (1, 0..=4) | (2, 0 | 1) | (3, 0)),
    }
}

/// Returns the slice of `bytes` to decode.
fn checked_bytes(bytes: &[u8], bounded: bool) -> Result<&[u8], ShaderError> {
    if bytes.is_empty() {
        return Err(ShaderError::Empty);
    }
    if bounded {
        if bytes.len() > MAX_SHADER_BYTECODE_BYTES {
            return Err(ShaderError::TooLarge {
                len: bytes.len(),
                max: MAX_SHADER_BYTECODE_BYTES,
            });
        }
        if bytes.len() % 4 != 0 {
            return Err(ShaderError::UnalignedLength(bytes.len()));
        }
        return Ok(bytes);
    }
    // The end token decides the real length; only whole words inside the cap are visible.
    let len = bytes.len().min(MAX_SHADER_BYTECODE_BYTES) & !3;
    if len == 0 {
        return Err(ShaderError::Truncated);
    }
    Ok(&bytes[..len])
}

fn run(bytes: &[u8], options: &CompileOptions, bounded: bool) -> CompileResult {
    debug!(
        len = bytes.len(),
        bounded,
        profile = options.profile.name(),
        "compiling shader"
    );
    let mut emitter = emitter_for(options.profile);
    let mut diagnostics = Diagnostics::new();

    let bytes = match checked_bytes(bytes, bounded) {
        Ok(bytes) => bytes,
        Err(err) => {
            diagnostics.push(err, DiagnosticPosition::BeforeParse);
            return CompileResult::rejected(emitter.profile(), diagnostics);
        }
    };
    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect();
    let mut stream = TokenStream::new(&words, bounded);

    let version = match stream.next().and_then(decode_version) {
        Ok(version) => version,
        Err(err) => {
            diagnostics.push(err, DiagnosticPosition::BeforeParse);
            return CompileResult::rejected(emitter.profile(), diagnostics);
        }
    };
    debug!(
        stage = ?version.stage,
        %version,
        len = bytes.len(),
        "decoded version token"
    );

    let mut ctx = Context::new(version, options, diagnostics);
    if version_supported(&version) {
        emitter.start(&mut ctx);
    } else {
        ctx.error(ShaderError::UnsupportedVersion {
            major: version.major,
            minor: version.minor,
        });
    }

    loop {
        if stream.peek().is_none() {
            ctx.error_at(
                ShaderError::MissingEnd,
                DiagnosticPosition::Offset(stream.byte_offset()),
            );
            break;
        }
        match decode_unit(&mut ctx, &mut stream) {
            Ok(Unit::End) => {
                if stream.is_bounded() && stream.remaining() > 0 {
                    ctx.error(ShaderError::TrailingData);
                }
                stream.cap_here();
                break;
            }
            Ok(Unit::Comment | Unit::Skipped) => {}
            Ok(Unit::Phase) => phase(&mut ctx, emitter.as_mut()),
            Ok(Unit::Instruction(mut inst)) => {
                validate(&mut ctx, &mut inst);
                if !ctx.failed() {
                    emitter.emit(&mut ctx, &inst);
                }
            }
            Err(err) => {
                ctx.error(err);
                break;
            }
        }
    }

    check_program(&mut ctx);
    ctx.finalize_constants();
    if !ctx.failed() {
        emitter.finish(&mut ctx);
    }

    let source = ctx.out.assemble();
    let reflection = if ctx.failed() {
        Reflection::default()
    } else {
        reflect(&ctx)
    };
    debug!(
        instructions = ctx.instruction_count,
        diagnostics = ctx.diagnostics.len(),
        source_len = source.len(),
        "shader compiled"
    );

    let Reflection {
        constants,
        uniforms,
        samplers,
        attributes,
        outputs,
    } = reflection;
    CompileResult {
        version: Some(version),
        profile: emitter.profile(),
        entry_point: emitter.entry_point(version.stage),
        source,
        instruction_count: ctx.instruction_count,
        constants,
        uniforms,
        samplers,
        attributes,
        outputs,
        symbols: ctx.symbols,
        diagnostics: ctx.diagnostics.into_vec(),
    }
}

fn phase(ctx: &mut Context, emitter: &mut dyn Emitter) {
    let version = ctx.version;
    if !(version.is_pixel() && version.major == 1 && version.minor == 4) {
        ctx.illegal(format!("phase is not allowed in {version}"));
        return;
    }
    if ctx.phase_seen {
        ctx.illegal("phase may only appear once");
        return;
    }
    ctx.phase_seen = true;
    if !ctx.failed() {
        emitter.phase(ctx);
    }
}

/// Checks that only make sense once the whole stream has been seen.
fn check_program(ctx: &mut Context) {
    let post = DiagnosticPosition::PostProcess;
    let nesting = ctx.nesting;
    for (open, count, close) in [
        ("loop", nesting.loops, "endloop"),
        ("rep", nesting.reps, "endrep"),
        ("if", nesting.ifs, "endif"),
    ] {
        if count > 0 {
            ctx.error_at(ShaderError::Unbalanced { open, close }, post);
        }
    }

    let undefined: Vec<u32> = ctx
        .labels
        .iter()
        .filter(|(_, l)| !l.defined)
        .map(|(i, _)| *i)
        .collect();
    for index in undefined {
        ctx.error_at(ShaderError::UndefinedLabel(index), post);
    }

    let version = ctx.version;
    if version.is_legacy_pixel() && !ctx.was_written(Register::new(RegisterKind::Temp, 0)) {
        ctx.error_at(ShaderError::ColorOutputNeverWritten, post);
    }

    let undeclared: Vec<Register> = ctx
        .registers
        .keys()
        .filter(|r| needs_declaration(&version, **r) && ctx.declaration(**r).is_none())
        .copied()
        .collect();
    for reg in undeclared {
        ctx.error_at(
            ShaderError::Illegal(format!("{reg} is used but never declared")),
            post,
        );
    }
}

/// Legacy pixel shaders bind `v#`, `t#` and samplers implicitly; everything else is declared.
fn needs_declaration(version: &ShaderVersion, reg: Register) -> bool {
    match reg.kind {
        RegisterKind::Input => !version.is_legacy_pixel(),
        RegisterKind::Texture => version.is_pixel() && version.major >= 2,
        RegisterKind::Output | RegisterKind::MiscType => true,
        RegisterKind::Sampler => version.major >= 2,
        _ => false,
    }
}

//! Direct3D 9 shader bytecode compiler.
//!
//! Translates vertex and pixel shader token streams for shader models 1.x through 3.0 into WGSL
//! source, together with the reflection data a renderer needs to bind the result: literal
//! constants, uniform arrays, samplers, and semantically tagged inputs and outputs.
//!
//! Compilation never aborts early. Every problem is appended to [`CompileResult::diagnostics`];
//! the generated source must not be used unless [`CompileResult::is_ok`] returns `true`.

mod buffer;
mod compile;
mod context;
mod ctab;
mod diagnostics;
mod emit;
mod limits;
mod opcode;
mod reflect;
mod token;
pub mod types;
mod validate;

use std::collections::BTreeMap;

pub use buffer::DEFAULT_BLOCK_SIZE;
pub use compile::{compile, compile_unsized};
pub use ctab::{RegisterSet, Symbol};
pub use diagnostics::{Diagnostic, DiagnosticPosition, ErrorCategory, ShaderError};
pub use emit::Profile;
pub use reflect::{AttributeInfo, ConstantInfo, SamplerInfo, UniformInfo};
pub use types::{
    LiteralValue, Register, RegisterKind, ShaderStage, ShaderVersion, TextureType, Usage,
};

/// Knobs for one compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub profile: Profile,
    /// Texture shapes forced per sampler index, taking precedence over `dcl` declarations.
    pub sampler_map: BTreeMap<u32, TextureType>,
    /// Bit `n` set makes sampler `n` emit depth-comparison sampling.
    pub shadow_samplers: u32,
    /// Shift clip-space positions by half a pixel to emulate the D3D9 rasterization rules.
    pub half_pixel_center: bool,
    pub buffer_block_size: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            sampler_map: BTreeMap::new(),
            shadow_samplers: 0,
            half_pixel_center: false,
            buffer_block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompileResult {
    /// `None` when the stream was rejected before a version token could be read.
    pub version: Option<ShaderVersion>,
    pub profile: Profile,
    /// Empty when no version token was decoded.
    pub entry_point: &'static str,
    pub source: String,
    /// Estimated instruction slots.
    pub instruction_count: u32,
    pub constants: Vec<ConstantInfo>,
    pub uniforms: Vec<UniformInfo>,
    pub samplers: Vec<SamplerInfo>,
    pub attributes: Vec<AttributeInfo>,
    pub outputs: Vec<AttributeInfo>,
    /// Entries of an embedded `CTAB` constant table.
    pub symbols: Vec<Symbol>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileResult {
    /// Result for a stream rejected before its version token was decoded.
    pub(crate) fn rejected(profile: Profile, diagnostics: diagnostics::Diagnostics) -> Self {
        Self {
            version: None,
            profile,
            entry_point: "",
            source: String::new(),
            instruction_count: 0,
            constants: Vec::new(),
            uniforms: Vec::new(),
            samplers: Vec::new(),
            attributes: Vec::new(),
            outputs: Vec::new(),
            symbols: Vec::new(),
            diagnostics: diagnostics.into_vec(),
        }
    }

    /// `true` when no diagnostic was recorded.
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    pub fn stage(&self) -> Option<ShaderStage> {
        self.version.map(|v| v.stage)
    }
}

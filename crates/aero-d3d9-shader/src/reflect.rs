//! Reflection builder.
//!
//! Runs after emission and walks the context's register bookkeeping to describe the program's
//! external contract: literal constants, uniform arrays, samplers, and the semantically tagged
//! inputs and outputs.

use std::collections::BTreeSet;

use crate::context::Context;
use crate::emit::wgsl;
use crate::types::{
    Declaration, LiteralValue, Register, RegisterKind, TextureType, Usage, MISCTYPE_FACE,
    MISCTYPE_POSITION, RASTOUT_FOG, RASTOUT_POSITION,
};

/// A literal defined by `def`, `defi` or `defb`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantInfo {
    pub register: Register,
    pub name: String,
    pub value: LiteralValue,
}

/// One uniform array per constant kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformInfo {
    pub kind: RegisterKind,
    pub name: String,
    pub binding: u32,
    pub array_count: u32,
    /// Register indices read from the array; literal-backed registers are not listed.
    pub registers: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerInfo {
    pub index: u32,
    pub name: String,
    pub texture_type: TextureType,
    pub group: u32,
    pub binding: u32,
    /// Target of `texbem`, `texbeml` or `bem`.
    pub texbem: bool,
    pub shadow: bool,
}

/// A vertex attribute, an inter-stage varying, or a render-target output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub register: Register,
    pub name: String,
    pub usage: Usage,
    pub index: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reflection {
    pub constants: Vec<ConstantInfo>,
    pub uniforms: Vec<UniformInfo>,
    pub samplers: Vec<SamplerInfo>,
    pub attributes: Vec<AttributeInfo>,
    pub outputs: Vec<AttributeInfo>,
}

pub fn reflect(ctx: &Context) -> Reflection {
    let stage = ctx.version.stage;

    let constants = ctx
        .literals
        .iter()
        .map(|l| {
            let register = Register::new(l.value.kind(), l.index);
            ConstantInfo {
                register,
                name: register.to_string(),
                value: l.value,
            }
        })
        .collect();

    let mut uniforms = Vec::new();
    for (kind, letter) in [
        (RegisterKind::Const, "c"),
        (RegisterKind::ConstInt, "i"),
        (RegisterKind::ConstBool, "b"),
    ] {
        let array_count = ctx.uniform_array_size(kind);
        if array_count == 0 {
            continue;
        }
        let registers = ctx
            .used_of_kind(kind)
            .map(|(r, _)| r.index)
            .filter(|i| !ctx.literals.contains(kind, *i))
            .collect();
        uniforms.push(UniformInfo {
            kind,
            name: letter.to_owned(),
            binding: wgsl::uniform_binding(stage, kind),
            array_count,
            registers,
        });
    }

    let samplers = used_samplers(ctx)
        .into_iter()
        .map(|index| SamplerInfo {
            index,
            name: format!("s{index}"),
            texture_type: sampler_texture_type(ctx, index),
            group: wgsl::sampler_group(stage),
            binding: 2 * index,
            texbem: ctx.texbem_samplers.contains(&index),
            shadow: is_shadow_sampler(ctx, index),
        })
        .collect();

    let mut attributes = Vec::new();
    let mut outputs = Vec::new();
    for reg in ctx.registers.keys() {
        if let Some((usage, index)) = input_semantic(ctx, *reg) {
            attributes.push(AttributeInfo {
                register: *reg,
                name: reg.to_string(),
                usage,
                index,
            });
        } else if let Some((usage, index)) = output_semantic(ctx, *reg) {
            outputs.push(AttributeInfo {
                register: *reg,
                name: reg.to_string(),
                usage,
                index,
            });
        }
    }

    Reflection {
        constants,
        uniforms,
        samplers,
        attributes,
        outputs,
    }
}

/// Semantic of an input register: its declaration, or the implicit color/texcoord meaning `v#`
/// and `t#` carry in pixel shaders below 3.0.
pub(crate) fn input_semantic(ctx: &Context, reg: Register) -> Option<(Usage, u32)> {
    let version = ctx.version;
    match reg.kind {
        RegisterKind::Input => match ctx.declaration(reg).map(|d| d.declaration) {
            Some(Declaration::Usage { usage, index }) => Some((usage, index)),
            _ if version.is_pixel() && version.major < 3 => Some((Usage::Color, reg.index)),
            _ => None,
        },
        RegisterKind::Texture if version.is_pixel() => Some((Usage::TexCoord, reg.index)),
        _ => None,
    }
}

pub(crate) fn output_semantic(ctx: &Context, reg: Register) -> Option<(Usage, u32)> {
    let version = ctx.version;
    match reg.kind {
        RegisterKind::RastOut => Some(match reg.index {
            RASTOUT_POSITION => (Usage::Position, 0),
            RASTOUT_FOG => (Usage::Fog, 0),
            _ => (Usage::PointSize, 0),
        }),
        RegisterKind::AttrOut => Some((Usage::Color, reg.index)),
        RegisterKind::TexCrdOut => Some((Usage::TexCoord, reg.index)),
        RegisterKind::Output => match ctx.declaration(reg).map(|d| d.declaration) {
            Some(Declaration::Usage { usage, index }) => Some((usage, index)),
            _ => None,
        },
        RegisterKind::ColorOut => Some((Usage::Color, reg.index)),
        RegisterKind::DepthOut => Some((Usage::Depth, 0)),
        RegisterKind::Temp if version.is_legacy_pixel() && reg.index == 0 => {
            Some((Usage::Color, 0))
        }
        _ => None,
    }
}

/// `vPos` and `vFace` are system values rather than varyings.
pub(crate) fn is_system_value(reg: Register) -> bool {
    reg.kind == RegisterKind::MiscType
        && (reg.index == MISCTYPE_POSITION || reg.index == MISCTYPE_FACE)
}

/// Samplers referenced by an instruction or declared.
pub(crate) fn used_samplers(ctx: &Context) -> BTreeSet<u32> {
    let mut samplers: BTreeSet<u32> = ctx
        .used_of_kind(RegisterKind::Sampler)
        .map(|(r, _)| r.index)
        .collect();
    samplers.extend(
        ctx.declarations
            .keys()
            .filter(|r| r.kind == RegisterKind::Sampler)
            .map(|r| r.index),
    );
    samplers
}

/// Shape forced by the options, else the declared shape, else 2-D.
pub(crate) fn sampler_texture_type(ctx: &Context, index: u32) -> TextureType {
    if let Some(ty) = ctx.options.sampler_map.get(&index) {
        return *ty;
    }
    match ctx
        .declaration(Register::new(RegisterKind::Sampler, index))
        .map(|d| d.declaration)
    {
        Some(Declaration::Sampler(ty)) => ty,
        _ => TextureType::Texture2D,
    }
}

/// Depth-comparison sampling only applies to flat textures.
pub(crate) fn is_shadow_sampler(ctx: &Context, index: u32) -> bool {
    index < 32
        && ctx.options.shadow_samplers & (1 << index) != 0
        && matches!(
            sampler_texture_type(ctx, index),
            TextureType::Texture1D | TextureType::Texture2D
        )
}

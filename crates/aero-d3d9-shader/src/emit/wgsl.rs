//! WGSL backend.
//!
//! Every D3D register becomes a module-scope `var<private>` named `{vs|ps}_{register}` so that
//! subroutines, which lower to free functions, can share them with the entry point. Declarations
//! are written once the whole stream has been seen, because only then is the set of used
//! registers known.

use std::collections::{BTreeMap, BTreeSet};

use crate::context::{Context, PadRow};
use crate::diagnostics::ShaderError;
use crate::emit::{wl, Emitter, Profile, Scope, Section};
use crate::opcode::Opcode;
use crate::reflect::{
    input_semantic, is_shadow_sampler, is_system_value, output_semantic, sampler_texture_type,
    used_samplers,
};
use crate::token::{Fused, Instruction};
use crate::types::{
    Comparison, DstOperand, LiteralValue, Register, RegisterKind, RelativeAddress, ShaderStage,
    SrcModifier, SrcOperand, TextureType, Usage, WriteMask, MISCTYPE_POSITION, RASTOUT_POSITION,
};

/// WebGPU's guaranteed minimum for both vertex attributes and inter-stage locations.
const MAX_LOCATIONS: u32 = 16;

/// `vs_3_0` output registers `o0..o11`, backed by one array so they can be relatively addressed.
const VS3_OUTPUT_COUNT: u32 = 12;

const BUMPENV_BINDING: u32 = 6;
const HALF_PIXEL_GROUP: u32 = 3;

/// Binding slot of a stage's uniform constant array in group 0.
pub(crate) fn uniform_binding(stage: ShaderStage, kind: RegisterKind) -> u32 {
    let base = match stage {
        ShaderStage::Vertex => 0,
        ShaderStage::Pixel => 3,
    };
    base + match kind {
        RegisterKind::ConstInt => 1,
        RegisterKind::ConstBool => 2,
        _ => 0,
    }
}

/// Bind group holding a stage's texture/sampler pairs.
pub(crate) fn sampler_group(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => 1,
        ShaderStage::Pixel => 2,
    }
}

/// WGSL value type a register kind is stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueTy {
    Float,
    Int,
    /// `aL`.
    IntScalar,
    Bool,
    BoolScalar,
}

fn value_ty(kind: RegisterKind) -> ValueTy {
    match kind {
        RegisterKind::Address | RegisterKind::ConstInt => ValueTy::Int,
        RegisterKind::Loop => ValueTy::IntScalar,
        RegisterKind::Predicate => ValueTy::Bool,
        RegisterKind::ConstBool => ValueTy::BoolScalar,
        _ => ValueTy::Float,
    }
}

fn register_name(p: &str, reg: Register) -> String {
    match reg.kind {
        RegisterKind::Loop => "aL".to_owned(),
        RegisterKind::Output => format!("{p}_o[{}]", reg.index),
        _ => format!("{p}_{reg}"),
    }
}

/// Formats an `f32` so WGSL reads back the same value. Non-finite values have no WGSL literal
/// and are clamped.
fn format_f32(v: f32) -> String {
    let v = if v.is_nan() {
        0.0
    } else {
        v.clamp(f32::MIN, f32::MAX)
    };
    format!("{v:?}")
}

/// `@location` assigned to a varying semantic.
fn varying_location(usage: Usage, index: u32) -> u32 {
    match usage {
        Usage::Color => index,
        Usage::TexCoord => 4 + index,
        Usage::Fog => 12,
        _ => 13 + index,
    }
}

fn relative_index(p: &str, index: u32, rel: &RelativeAddress) -> String {
    match rel.reg.kind {
        RegisterKind::Loop => format!("{index} + aL"),
        _ => format!(
            "{index} + {}.{}",
            register_name(p, rel.reg),
            rel.component.as_char()
        ),
    }
}

/// Unswizzled, unmodified operand expression.
fn base(ctx: &mut Context, src: &SrcOperand) -> String {
    let p = ctx.version.stage.prefix();
    let reg = src.reg;
    let literal = ctx.literals.contains(reg.kind, reg.index);
    if let Some(rel) = &src.relative {
        let index = relative_index(p, reg.index, rel);
        let letter = match reg.kind {
            RegisterKind::Const => "c",
            RegisterKind::ConstInt => "i",
            _ => {
                ctx.unsupported(format!(
                    "relative addressing of {reg} has no WGSL mapping"
                ));
                return register_name(p, reg);
            }
        };
        return if ctx.literals.of_kind(reg.kind).next().is_some() {
            format!("{p}_{letter}_array[{index}]")
        } else {
            format!("{p}_{letter}[{index}]")
        };
    }
    match reg.kind {
        RegisterKind::Const if !literal => format!("{p}_c[{}]", reg.index),
        RegisterKind::ConstInt if !literal => format!("{p}_i[{}]", reg.index),
        RegisterKind::ConstBool if !literal => format!("({p}_b[{}].x != 0u)", reg.index),
        _ => register_name(p, reg),
    }
}

fn swizzled(ctx: &mut Context, src: &SrcOperand) -> (String, ValueTy) {
    let ty = value_ty(src.reg.kind);
    let mut expr = base(ctx, src);
    if matches!(ty, ValueTy::Float | ValueTy::Int | ValueTy::Bool) {
        expr.push_str(&src.swizzle.suffix());
    }
    (expr, ty)
}

fn apply_modifier(v: String, modifier: SrcModifier) -> String {
    match modifier {
        SrcModifier::None | SrcModifier::Not => v,
        SrcModifier::Negate => format!("-{v}"),
        SrcModifier::Bias => format!("({v} - 0.5)"),
        SrcModifier::BiasNegate => format!("(0.5 - {v})"),
        SrcModifier::Sign => format!("({v} * 2.0 - 1.0)"),
        SrcModifier::SignNegate => format!("(1.0 - {v} * 2.0)"),
        SrcModifier::Complement => format!("(1.0 - {v})"),
        SrcModifier::X2 => format!("({v} * 2.0)"),
        SrcModifier::X2Negate => format!("({v} * -2.0)"),
        SrcModifier::DivideByZ => format!("({v} / {v}.z)"),
        SrcModifier::DivideByW => format!("({v} / {v}.w)"),
        SrcModifier::Abs => format!("abs({v})"),
        SrcModifier::AbsNegate => format!("-abs({v})"),
    }
}

/// Source operand as a `vec4<f32>` expression with swizzle and modifier applied.
fn float4(ctx: &mut Context, src: &SrcOperand) -> String {
    let (expr, ty) = swizzled(ctx, src);
    let value = match ty {
        ValueTy::Float => expr,
        ValueTy::Int => format!("vec4<f32>({expr})"),
        ValueTy::IntScalar => format!("vec4<f32>(f32({expr}))"),
        ValueTy::Bool | ValueTy::BoolScalar => {
            let cond = if src.modifier == SrcModifier::Not {
                format!("!{expr}")
            } else {
                expr
            };
            format!("select(vec4<f32>(0.0), vec4<f32>(1.0), {cond})")
        }
    };
    apply_modifier(value, src.modifier)
}

/// Lane 0 of the operand as an `f32`.
fn scalar(ctx: &mut Context, src: &SrcOperand) -> String {
    if src.modifier == SrcModifier::None && value_ty(src.reg.kind) == ValueTy::Float {
        format!("{}.{}", base(ctx, src), src.scalar_component().as_char())
    } else {
        format!("{}.x", float4(ctx, src))
    }
}

/// Boolean condition of `if`, `callnz` and `breakp`.
fn condition(ctx: &mut Context, src: &SrcOperand) -> String {
    let cond = match value_ty(src.reg.kind) {
        ValueTy::BoolScalar => base(ctx, src),
        ValueTy::Bool => format!("{}.{}", base(ctx, src), src.scalar_component().as_char()),
        _ => return format!("({} != 0.0)", scalar(ctx, src)),
    };
    if src.modifier == SrcModifier::Not {
        format!("!{cond}")
    } else {
        cond
    }
}

fn comparison(ctx: &mut Context, inst: &Instruction) -> String {
    let op = Comparison::from_raw(inst.control).map_or("==", Comparison::operator);
    let a = scalar(ctx, &inst.src[0]);
    let b = scalar(ctx, &inst.src[1]);
    format!("({a} {op} {b})")
}

/// Per-lane predicate mask used to select between the old and new destination value.
fn predicate_mask(p: &str, pred: &SrcOperand) -> String {
    let mask = format!("{}{}", register_name(p, pred.reg), pred.swizzle.suffix());
    if pred.modifier == SrcModifier::Not {
        format!("!{mask}")
    } else {
        mask
    }
}

fn predicate_condition(p: &str, pred: &SrcOperand) -> String {
    let cond = format!(
        "{}.{}",
        register_name(p, pred.reg),
        pred.scalar_component().as_char()
    );
    if pred.modifier == SrcModifier::Not {
        format!("!{cond}")
    } else {
        cond
    }
}

/// `dot(t#.xyz, src.xyz)` for one legacy texture-matrix row.
fn row_dot(ctx: &mut Context, texcoord: u32, src: &SrcOperand) -> String {
    let p = ctx.version.stage.prefix();
    let t = register_name(p, Register::new(RegisterKind::Texture, texcoord));
    format!("dot({t}.xyz, {}.xyz)", float4(ctx, src))
}

fn texture_decl(ty: TextureType, shadow: bool) -> &'static str {
    if shadow {
        return "texture_depth_2d";
    }
    match ty {
        TextureType::Texture1D | TextureType::Texture2D => "texture_2d<f32>",
        TextureType::TextureCube => "texture_cube<f32>",
        TextureType::Texture3D => "texture_3d<f32>",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Helper {
    Lit,
    Reflect,
    Bump,
}

impl Helper {
    fn source(self) -> &'static str {
        match self {
            Helper::Lit => {
                "fn d3d9_lit(s: vec4<f32>) -> vec4<f32> {
    var specular = 0.0;
    if (s.x > 0.0 && s.y > 0.0) {
        specular = pow(s.y, clamp(s.w, -127.9961, 127.9961));
    }
    return vec4<f32>(1.0, max(s.x, 0.0), specular, 1.0);
}
"
            }
            Helper::Reflect => {
                "fn d3d9_reflect(n: vec3<f32>, e: vec3<f32>) -> vec3<f32> {
    return 2.0 * dot(n, e) / dot(n, n) * n - e;
}
"
            }
            Helper::Bump => {
                "fn d3d9_bump(coord: vec2<f32>, perturb: vec2<f32>, m: vec4<f32>) -> vec2<f32> {
    return coord + mat2x2<f32>(m.xy, m.zw) * perturb;
}
"
            }
        }
    }
}

/// Level-of-detail selection for a texture fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Lod {
    Implicit,
    Bias(String),
    Level(String),
    Grad(String, String),
}

#[derive(Debug)]
enum Frame {
    /// `loop aL, i#`: the step expression is written in the `continuing` block.
    Loop { step: String },
    Rep,
    If,
}

impl Frame {
    fn name(&self) -> &'static str {
        match self {
            Frame::Loop { .. } => "LOOP",
            Frame::Rep => "REP",
            Frame::If => "IF",
        }
    }
}

#[derive(Debug)]
struct Varying {
    location: u32,
    field: String,
    register: Register,
    centroid: bool,
}

/// Entry-point interface derived from the used registers.
#[derive(Debug, Default)]
struct Interface {
    inputs: Vec<Varying>,
    system_values: Vec<Register>,
    outputs: Vec<Varying>,
    position: Option<Register>,
    depth: bool,
}

#[derive(Debug, Default)]
pub struct WgslEmitter {
    frames: Vec<Frame>,
    /// Scope to restore when the open subroutine ends.
    subroutine: Option<Scope>,
    /// Labels whose body went to [`Section::Discard`].
    discarded: BTreeSet<u32>,
    helpers: BTreeSet<Helper>,
    /// Set after a `texkill`; implicit-derivative sampling is no longer in uniform control flow.
    demoted: bool,
}

impl WgslEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn uniform_flow(&self) -> bool {
        self.frames.is_empty() && self.subroutine.is_none() && !self.demoted
    }

    fn require_helper(&mut self, ctx: &mut Context, helper: Helper) {
        if !self.helpers.insert(helper) {
            return;
        }
        let mut out = ctx.out.redirect(Section::Helpers, 0);
        for line in helper.source().lines() {
            wl!(out, "{line}");
        }
        wl!(out, "");
    }

    fn sample(&mut self, ctx: &mut Context, sampler: u32, coord: &str, lod: Lod) -> String {
        let p = ctx.version.stage.prefix();
        let tex = format!("{p}_tex{sampler}");
        let samp = format!("{p}_samp{sampler}");
        let lanes = match sampler_texture_type(ctx, sampler) {
            TextureType::Texture1D | TextureType::Texture2D => ".xy",
            TextureType::TextureCube | TextureType::Texture3D => ".xyz",
        };
        let uv = format!("{coord}{lanes}");
        let implicit = ctx.version.is_pixel() && self.uniform_flow();

        if is_shadow_sampler(ctx, sampler) {
            let depth = format!("{coord}.z");
            return match lod {
                Lod::Implicit | Lod::Bias(_) if implicit => {
                    format!("vec4<f32>(textureSampleCompare({tex}, {samp}, {uv}, {depth}))")
                }
                _ => format!("vec4<f32>(textureSampleCompareLevel({tex}, {samp}, {uv}, {depth}))"),
            };
        }
        match lod {
            Lod::Implicit if implicit => format!("textureSample({tex}, {samp}, {uv})"),
            Lod::Bias(bias) if implicit => {
                format!("textureSampleBias({tex}, {samp}, {uv}, {bias})")
            }
            Lod::Level(level) => format!("textureSampleLevel({tex}, {samp}, {uv}, {level})"),
            Lod::Grad(dx, dy) => {
                format!("textureSampleGrad({tex}, {samp}, {uv}, {dx}{lanes}, {dy}{lanes})")
            }
            // Derivatives are undefined outside uniform control flow.
            Lod::Implicit | Lod::Bias(_) => {
                format!("textureSampleLevel({tex}, {samp}, {uv}, 0.0)")
            }
        }
    }

    /// Writes a `vec4<f32>` value to the destination, applying the result modifiers.
    fn store(&mut self, ctx: &mut Context, inst: &Instruction, value: String) {
        let Some(dst) = inst.dst else {
            return;
        };
        let value = match value_ty(dst.reg.kind) {
            ValueTy::Float => {
                let mut v = value;
                if let Some(factor) = dst.shift.factor() {
                    v = format!("({v} * {factor})");
                }
                if dst.saturate {
                    v = format!("saturate({v})");
                }
                v
            }
            ValueTy::Int => {
                let round = if inst.opcode == Opcode::Mova {
                    "round"
                } else {
                    "floor"
                };
                format!("vec4<i32>({round}({value}))")
            }
            _ => value,
        };
        self.assign(ctx, &dst, inst.predicate.as_ref(), value);
    }

    fn assign(
        &mut self,
        ctx: &mut Context,
        dst: &DstOperand,
        predicate: Option<&SrcOperand>,
        value: String,
    ) {
        let p = ctx.version.stage.prefix();
        let name = match &dst.relative {
            Some(rel) if dst.reg.kind == RegisterKind::Output => {
                format!("{p}_o[{}]", relative_index(p, dst.reg.index, rel))
            }
            _ => register_name(p, dst.reg),
        };
        let value = match predicate {
            Some(pred) => format!("select({name}, {value}, {})", predicate_mask(p, pred)),
            None => value,
        };

        if dst.mask == WriteMask::XYZW {
            wl!(ctx.out, "{name} = {value};");
            return;
        }
        let lanes: Vec<char> = dst.mask.lanes().map(|c| c.as_char()).collect();
        if let [c] = lanes[..] {
            wl!(ctx.out, "{name}.{c} = ({value}).{c};");
            return;
        }
        // WGSL has no multi-lane swizzle assignment.
        let mut line = format!("{{ let tmp = {value};");
        for c in lanes {
            line.push_str(&format!(" {name}.{c} = tmp.{c};"));
        }
        line.push_str(" }");
        wl!(ctx.out, "{line}");
    }

    fn write_depth(&mut self, ctx: &mut Context, z: &str, w: &str) {
        let p = ctx.version.stage.prefix();
        wl!(ctx.out, "{{");
        ctx.out.indent();
        wl!(ctx.out, "let depth_z = {z};");
        wl!(ctx.out, "let depth_w = {w};");
        wl!(
            ctx.out,
            "{p}_oDepth.x = select(depth_z / depth_w, 1.0, depth_w == 0.0);"
        );
        ctx.out.dedent();
        wl!(ctx.out, "}}");
    }

    /// `vec3` of the three `texm3x3` row products.
    fn m3x3_rows(ctx: &mut Context, inst: &Instruction, first: &PadRow, second: &PadRow) -> String {
        let d = inst.dst.map_or(0, |d| d.reg.index);
        let a = row_dot(ctx, first.texcoord, &first.src);
        let b = row_dot(ctx, second.texcoord, &second.src);
        let c = row_dot(ctx, d, &inst.src[0]);
        format!("vec3<f32>({a}, {b}, {c})")
    }

    fn matrix(&mut self, ctx: &mut Context, inst: &Instruction, rows: u32, columns: u32) {
        let a = float4(ctx, &inst.src[0]);
        let mut lanes = Vec::with_capacity(4);
        for k in 0..rows {
            let mut row = inst.src[1];
            row.reg.index += k;
            let r = float4(ctx, &row);
            lanes.push(if columns == 4 {
                format!("dot({a}, {r})")
            } else {
                format!("dot({a}.xyz, {r}.xyz)")
            });
        }
        while lanes.len() < 4 {
            lanes.push("0.0".to_owned());
        }
        self.store(ctx, inst, format!("vec4<f32>({})", lanes.join(", ")));
    }

    fn close_subroutine(&mut self, ctx: &mut Context, saved: Scope) {
        ctx.out.dedent();
        wl!(ctx.out, "}}");
        wl!(ctx.out, "");
        ctx.out.pop(saved);
    }

    fn open_block(&mut self, ctx: &mut Context, header: String, frame: Frame) {
        wl!(ctx.out, "{header}");
        ctx.out.indent();
        self.frames.push(frame);
    }

    /// Closes the innermost frame when `closer` matches it; a mismatch is recorded and the frame
    /// stays open.
    fn close_block(&mut self, ctx: &mut Context, closer: Opcode) {
        let matches = matches!(
            (self.frames.last(), closer),
            (Some(Frame::Loop { .. }), Opcode::EndLoop)
                | (Some(Frame::Rep), Opcode::EndRep)
                | (Some(Frame::If), Opcode::EndIf | Opcode::Else)
        );
        if !matches {
            let open = self.frames.last().map_or("nothing", Frame::name);
            let close = match closer {
                Opcode::EndLoop => "ENDLOOP",
                Opcode::EndRep => "ENDREP",
                Opcode::EndIf => "ENDIF",
                _ => "ELSE",
            };
            ctx.error(ShaderError::MismatchedBlock { close, open });
            return;
        }
        if closer == Opcode::Else {
            ctx.out.dedent();
            wl!(ctx.out, "}} else {{");
            ctx.out.indent();
        } else if let Some(frame) = self.frames.pop() {
            self.write_close(ctx, frame);
        }
    }

    fn write_close(&mut self, ctx: &mut Context, frame: Frame) {
        match frame {
            Frame::Loop { step } => {
                wl!(ctx.out, "continuing {{");
                ctx.out.indent();
                wl!(ctx.out, "aL = aL + {step};");
                wl!(ctx.out, "loop_iteration = loop_iteration + 1;");
                ctx.out.dedent();
                wl!(ctx.out, "}}");
                ctx.out.dedent();
                wl!(ctx.out, "}}");
                ctx.out.dedent();
                wl!(ctx.out, "}}");
            }
            Frame::Rep | Frame::If => {
                ctx.out.dedent();
                wl!(ctx.out, "}}");
            }
        }
    }

    fn emit_op(&mut self, ctx: &mut Context, inst: &Instruction) {
        let version = ctx.version;
        let p = version.stage.prefix();
        let d = inst.dst.map_or(0, |d| d.reg.index);
        let t = |index: u32| register_name(p, Register::new(RegisterKind::Texture, index));

        match inst.opcode {
            Opcode::Nop | Opcode::Def | Opcode::DefI | Opcode::DefB | Opcode::Dcl => {}
            // The pad rows are folded into their terminating instruction.
            Opcode::TexM3x2Pad | Opcode::TexM3x3Pad => {}
            Opcode::Mov | Opcode::Mova => {
                let a = float4(ctx, &inst.src[0]);
                self.store(ctx, inst, a);
            }
            Opcode::Add | Opcode::Sub | Opcode::Mul => {
                let a = float4(ctx, &inst.src[0]);
                let b = float4(ctx, &inst.src[1]);
                let op = match inst.opcode {
                    Opcode::Add => "+",
                    Opcode::Sub => "-",
                    _ => "*",
                };
                self.store(ctx, inst, format!("({a} {op} {b})"));
            }
            Opcode::Mad => {
                let a = float4(ctx, &inst.src[0]);
                let b = float4(ctx, &inst.src[1]);
                let c = float4(ctx, &inst.src[2]);
                self.store(ctx, inst, format!("({a} * {b} + {c})"));
            }
            Opcode::Rcp => {
                let a = scalar(ctx, &inst.src[0]);
                self.store(ctx, inst, format!("vec4<f32>(1.0 / {a})"));
            }
            Opcode::Rsq => {
                let a = scalar(ctx, &inst.src[0]);
                self.store(ctx, inst, format!("vec4<f32>(inverseSqrt(abs({a})))"));
            }
            Opcode::Dp3 => {
                let a = float4(ctx, &inst.src[0]);
                let b = float4(ctx, &inst.src[1]);
                self.store(ctx, inst, format!("vec4<f32>(dot({a}.xyz, {b}.xyz))"));
            }
            Opcode::Dp4 => {
                let a = float4(ctx, &inst.src[0]);
                let b = float4(ctx, &inst.src[1]);
                self.store(ctx, inst, format!("vec4<f32>(dot({a}, {b}))"));
            }
            Opcode::Min | Opcode::Max => {
                let a = float4(ctx, &inst.src[0]);
                let b = float4(ctx, &inst.src[1]);
                let f = if inst.opcode == Opcode::Min { "min" } else { "max" };
                self.store(ctx, inst, format!("{f}({a}, {b})"));
            }
            Opcode::Slt | Opcode::Sge => {
                let a = float4(ctx, &inst.src[0]);
                let b = float4(ctx, &inst.src[1]);
                let op = if inst.opcode == Opcode::Slt { "<" } else { ">=" };
                self.store(
                    ctx,
                    inst,
                    format!("select(vec4<f32>(0.0), vec4<f32>(1.0), {a} {op} {b})"),
                );
            }
            Opcode::ExpP if version.is_vertex() && version.major < 2 => {
                let a = scalar(ctx, &inst.src[0]);
                self.store(
                    ctx,
                    inst,
                    format!("vec4<f32>(exp2(floor({a})), fract({a}), exp2({a}), 1.0)"),
                );
            }
            Opcode::Exp | Opcode::ExpP => {
                let a = scalar(ctx, &inst.src[0]);
                self.store(ctx, inst, format!("vec4<f32>(exp2({a}))"));
            }
            Opcode::Log | Opcode::LogP => {
                let a = scalar(ctx, &inst.src[0]);
                self.store(ctx, inst, format!("vec4<f32>(log2(abs({a})))"));
            }
            Opcode::Pow => {
                let a = scalar(ctx, &inst.src[0]);
                let b = scalar(ctx, &inst.src[1]);
                self.store(ctx, inst, format!("vec4<f32>(pow(abs({a}), {b}))"));
            }
            Opcode::Lit => {
                self.require_helper(ctx, Helper::Lit);
                let a = float4(ctx, &inst.src[0]);
                self.store(ctx, inst, format!("d3d9_lit({a})"));
            }
            Opcode::Dst => {
                let a = float4(ctx, &inst.src[0]);
                let b = float4(ctx, &inst.src[1]);
                self.store(
                    ctx,
                    inst,
                    format!("vec4<f32>(1.0, {a}.y * {b}.y, {a}.z, {b}.w)"),
                );
            }
            Opcode::Lrp => {
                let a = float4(ctx, &inst.src[0]);
                let b = float4(ctx, &inst.src[1]);
                let c = float4(ctx, &inst.src[2]);
                self.store(ctx, inst, format!("mix({c}, {b}, {a})"));
            }
            Opcode::Frc | Opcode::Sgn | Opcode::Abs => {
                let a = float4(ctx, &inst.src[0]);
                let f = match inst.opcode {
                    Opcode::Frc => "fract",
                    Opcode::Sgn => "sign",
                    _ => "abs",
                };
                self.store(ctx, inst, format!("{f}({a})"));
            }
            Opcode::Nrm => {
                let a = float4(ctx, &inst.src[0]);
                self.store(
                    ctx,
                    inst,
                    format!("({a} * inverseSqrt(dot({a}.xyz, {a}.xyz)))"),
                );
            }
            Opcode::SinCos => {
                let a = scalar(ctx, &inst.src[0]);
                self.store(ctx, inst, format!("vec4<f32>(cos({a}), sin({a}), 0.0, 0.0)"));
            }
            Opcode::Crs => {
                let a = float4(ctx, &inst.src[0]);
                let b = float4(ctx, &inst.src[1]);
                self.store(ctx, inst, format!("vec4<f32>(cross({a}.xyz, {b}.xyz), 0.0)"));
            }
            Opcode::M4x4 => self.matrix(ctx, inst, 4, 4),
            Opcode::M4x3 => self.matrix(ctx, inst, 3, 4),
            Opcode::M3x4 => self.matrix(ctx, inst, 4, 3),
            Opcode::M3x3 => self.matrix(ctx, inst, 3, 3),
            Opcode::M3x2 => self.matrix(ctx, inst, 2, 3),
            Opcode::Dp2Add => {
                let a = float4(ctx, &inst.src[0]);
                let b = float4(ctx, &inst.src[1]);
                let c = scalar(ctx, &inst.src[2]);
                self.store(
                    ctx,
                    inst,
                    format!("vec4<f32>(dot({a}.xy, {b}.xy) + {c})"),
                );
            }
            Opcode::Cmp => {
                let a = float4(ctx, &inst.src[0]);
                let b = float4(ctx, &inst.src[1]);
                let c = float4(ctx, &inst.src[2]);
                self.store(ctx, inst, format!("select({c}, {b}, {a} >= vec4<f32>(0.0))"));
            }
            Opcode::Cnd => {
                let a = float4(ctx, &inst.src[0]);
                let b = float4(ctx, &inst.src[1]);
                let c = float4(ctx, &inst.src[2]);
                self.store(ctx, inst, format!("select({c}, {b}, {a} > vec4<f32>(0.5))"));
            }
            Opcode::Setp => {
                let a = float4(ctx, &inst.src[0]);
                let b = float4(ctx, &inst.src[1]);
                let op = Comparison::from_raw(inst.control).map_or("==", Comparison::operator);
                self.store(ctx, inst, format!("({a} {op} {b})"));
            }
            Opcode::Dsx | Opcode::Dsy => {
                if !self.uniform_flow() {
                    ctx.unsupported(format!(
                        "{} outside uniform control flow has no WGSL mapping",
                        inst.opcode.name()
                    ));
                    return;
                }
                let a = float4(ctx, &inst.src[0]);
                let f = if inst.opcode == Opcode::Dsx { "dpdx" } else { "dpdy" };
                self.store(ctx, inst, format!("{f}({a})"));
            }

            Opcode::Call | Opcode::CallNz => {
                let index = inst.src[0].reg.index;
                if self.discarded.contains(&index) {
                    ctx.unsupported(format!(
                        "call to subroutine l{index} after its uncalled body was discarded"
                    ));
                }
                let in_loop = ctx.labels.get(&index).and_then(|l| l.called_in_loop);
                let args = if in_loop == Some(true) { "aL" } else { "" };
                if inst.opcode == Opcode::CallNz {
                    let cond = condition(ctx, &inst.src[1]);
                    wl!(ctx.out, "if ({cond}) {{");
                    ctx.out.indent();
                    wl!(ctx.out, "{p}_l{index}({args});");
                    ctx.out.dedent();
                    wl!(ctx.out, "}}");
                } else {
                    wl!(ctx.out, "{p}_l{index}({args});");
                }
            }
            Opcode::Label => {
                if let Some(saved) = self.subroutine.take() {
                    self.close_subroutine(ctx, saved);
                }
                let index = inst.src[0].reg.index;
                let called_in_loop = ctx.labels.get(&index).and_then(|l| l.called_in_loop);
                let section = if called_in_loop.is_some() {
                    Section::Subroutines
                } else {
                    self.discarded.insert(index);
                    Section::Discard
                };
                let params = if called_in_loop == Some(true) {
                    "aL: i32"
                } else {
                    ""
                };
                let saved = ctx.out.push(section, 0);
                wl!(ctx.out, "fn {p}_l{index}({params}) {{");
                ctx.out.indent();
                self.subroutine = Some(saved);
                self.demoted = false;
            }
            Opcode::Ret => {
                if let Some(saved) = self.subroutine.take() {
                    self.close_subroutine(ctx, saved);
                }
            }
            Opcode::Loop => {
                let i = base(ctx, &inst.src[1]);
                wl!(ctx.out, "{{");
                ctx.out.indent();
                wl!(ctx.out, "var aL: i32 = {i}.y;");
                wl!(ctx.out, "var loop_iteration: i32 = 0;");
                wl!(ctx.out, "loop {{");
                ctx.out.indent();
                wl!(ctx.out, "if (loop_iteration >= {i}.x) {{");
                ctx.out.indent();
                wl!(ctx.out, "break;");
                ctx.out.dedent();
                wl!(ctx.out, "}}");
                self.frames.push(Frame::Loop {
                    step: format!("{i}.z"),
                });
            }
            Opcode::Rep => {
                let i = base(ctx, &inst.src[0]);
                self.open_block(
                    ctx,
                    format!(
                        "for (var rep_iteration: i32 = 0; rep_iteration < {i}.x; rep_iteration++) {{"
                    ),
                    Frame::Rep,
                );
            }
            Opcode::If => {
                let cond = condition(ctx, &inst.src[0]);
                self.open_block(ctx, format!("if ({cond}) {{"), Frame::If);
            }
            Opcode::Ifc => {
                let cond = comparison(ctx, inst);
                self.open_block(ctx, format!("if {cond} {{"), Frame::If);
            }
            Opcode::Else | Opcode::EndLoop | Opcode::EndRep | Opcode::EndIf => {
                self.close_block(ctx, inst.opcode)
            }
            Opcode::Break => wl!(ctx.out, "break;"),
            Opcode::BreakC => {
                let cond = comparison(ctx, inst);
                wl!(ctx.out, "if {cond} {{ break; }}");
            }
            Opcode::BreakP => {
                let cond = condition(ctx, &inst.src[0]);
                wl!(ctx.out, "if ({cond}) {{ break; }}");
            }

            Opcode::Tex if version.is_legacy_pixel() => {
                let coord = if version.at_least(1, 4) {
                    float4(ctx, &inst.src[0])
                } else {
                    t(d)
                };
                let v = self.sample(ctx, d, &coord, Lod::Implicit);
                self.store(ctx, inst, v);
            }
            Opcode::Tex => {
                let c = float4(ctx, &inst.src[0]);
                let s = inst.src[1].reg.index;
                let v = match inst.control {
                    1 => self.sample(ctx, s, &format!("({c} / {c}.w)"), Lod::Implicit),
                    2 => self.sample(ctx, s, &c, Lod::Bias(format!("{c}.w"))),
                    _ => self.sample(ctx, s, &c, Lod::Implicit),
                };
                self.store(ctx, inst, v);
            }
            Opcode::TexLdl => {
                let c = float4(ctx, &inst.src[0]);
                let s = inst.src[1].reg.index;
                let v = self.sample(ctx, s, &c, Lod::Level(format!("{c}.w")));
                self.store(ctx, inst, v);
            }
            Opcode::TexLdd => {
                let c = float4(ctx, &inst.src[0]);
                let s = inst.src[1].reg.index;
                let dx = float4(ctx, &inst.src[2]);
                let dy = float4(ctx, &inst.src[3]);
                let v = self.sample(ctx, s, &c, Lod::Grad(dx, dy));
                self.store(ctx, inst, v);
            }
            Opcode::TexCoord if version.at_least(1, 4) => {
                let a = float4(ctx, &inst.src[0]);
                self.store(ctx, inst, a);
            }
            Opcode::TexCoord => {
                let tc = t(d);
                self.store(ctx, inst, format!("vec4<f32>(saturate({tc}.xyz), 1.0)"));
            }
            Opcode::TexKill => {
                let Some(dst) = inst.dst else {
                    return;
                };
                let name = register_name(p, dst.reg);
                let test = if version.major < 2 {
                    format!("any({name}.xyz < vec3<f32>(0.0))")
                } else {
                    let lanes: String = dst.mask.lanes().map(|c| c.as_char()).collect();
                    match lanes.len() {
                        4 => format!("any({name} < vec4<f32>(0.0))"),
                        1 => format!("{name}.{lanes} < 0.0"),
                        n => format!("any({name}.{lanes} < vec{n}<f32>(0.0))"),
                    }
                };
                wl!(ctx.out, "if ({test}) {{");
                ctx.out.indent();
                wl!(ctx.out, "discard;");
                ctx.out.dedent();
                wl!(ctx.out, "}}");
                self.demoted = true;
            }
            Opcode::TexBem | Opcode::TexBemL => {
                self.require_helper(ctx, Helper::Bump);
                let s = t(inst.src[0].reg.index);
                let coord = format!(
                    "vec4<f32>(d3d9_bump({}.xy, {s}.xy, {p}_bumpenv[{}]), 0.0, 0.0)",
                    t(d),
                    2 * d
                );
                let mut v = self.sample(ctx, d, &coord, Lod::Implicit);
                if inst.opcode == Opcode::TexBemL {
                    let l = format!("{p}_bumpenv[{}]", 2 * d + 1);
                    v = format!(
                        "({v} * vec4<f32>(vec3<f32>(saturate({s}.z * {l}.x + {l}.y)), 1.0))"
                    );
                }
                self.store(ctx, inst, v);
            }
            Opcode::Bem => {
                self.require_helper(ctx, Helper::Bump);
                let a = float4(ctx, &inst.src[0]);
                let b = float4(ctx, &inst.src[1]);
                self.store(
                    ctx,
                    inst,
                    format!(
                        "vec4<f32>(d3d9_bump({a}.xy, {b}.xy, {p}_bumpenv[{}]), 0.0, 0.0)",
                        2 * d
                    ),
                );
            }
            Opcode::TexReg2Ar | Opcode::TexReg2Gb | Opcode::TexReg2Rgb => {
                let s = t(inst.src[0].reg.index);
                let coord = match inst.opcode {
                    Opcode::TexReg2Ar => format!("vec4<f32>({s}.w, {s}.x, 0.0, 0.0)"),
                    Opcode::TexReg2Gb => format!("vec4<f32>({s}.y, {s}.z, 0.0, 0.0)"),
                    _ => format!("vec4<f32>({s}.xyz, 0.0)"),
                };
                let v = self.sample(ctx, d, &coord, Lod::Implicit);
                self.store(ctx, inst, v);
            }
            Opcode::TexDp3Tex => {
                let u = row_dot(ctx, d, &inst.src[0]);
                let v = self.sample(
                    ctx,
                    d,
                    &format!("vec4<f32>({u}, 0.0, 0.0, 1.0)"),
                    Lod::Implicit,
                );
                self.store(ctx, inst, v);
            }
            Opcode::TexDp3 => {
                let u = row_dot(ctx, d, &inst.src[0]);
                self.store(ctx, inst, format!("vec4<f32>({u})"));
            }
            Opcode::TexM3x2Tex | Opcode::TexM3x2Depth => {
                let Fused::M3x2(row) = inst.fused else {
                    return;
                };
                let u = row_dot(ctx, row.texcoord, &row.src);
                let v = row_dot(ctx, d, &inst.src[0]);
                if inst.opcode == Opcode::TexM3x2Depth {
                    self.write_depth(ctx, &u, &v);
                } else {
                    let s = self.sample(
                        ctx,
                        d,
                        &format!("vec4<f32>({u}, {v}, 0.0, 0.0)"),
                        Lod::Implicit,
                    );
                    self.store(ctx, inst, s);
                }
            }
            Opcode::TexM3x3 | Opcode::TexM3x3Tex => {
                let Fused::M3x3(first, second) = inst.fused else {
                    return;
                };
                let n = Self::m3x3_rows(ctx, inst, &first, &second);
                let v = if inst.opcode == Opcode::TexM3x3 {
                    format!("vec4<f32>({n}, 1.0)")
                } else {
                    self.sample(ctx, d, &format!("vec4<f32>({n}, 0.0)"), Lod::Implicit)
                };
                self.store(ctx, inst, v);
            }
            Opcode::TexM3x3Spec | Opcode::TexM3x3VSpec => {
                let Fused::M3x3(first, second) = inst.fused else {
                    return;
                };
                self.require_helper(ctx, Helper::Reflect);
                let n = Self::m3x3_rows(ctx, inst, &first, &second);
                let eye = if inst.opcode == Opcode::TexM3x3Spec {
                    format!("{}.xyz", float4(ctx, &inst.src[1]))
                } else {
                    format!(
                        "vec3<f32>({}.w, {}.w, {}.w)",
                        t(first.texcoord),
                        t(second.texcoord),
                        t(d)
                    )
                };
                let v = self.sample(
                    ctx,
                    d,
                    &format!("vec4<f32>(d3d9_reflect({n}, {eye}), 0.0)"),
                    Lod::Implicit,
                );
                self.store(ctx, inst, v);
            }
            Opcode::TexDepth => {
                let r = register_name(p, Register::new(RegisterKind::Temp, d));
                self.write_depth(ctx, &format!("{r}.x"), &format!("{r}.y"));
            }
        }
    }

    fn interface(&self, ctx: &mut Context) -> Interface {
        let version = ctx.version;
        let mut io = Interface::default();
        let registers: Vec<Register> = ctx.registers.keys().copied().collect();

        if version.is_vertex() {
            for reg in &registers {
                if reg.kind == RegisterKind::Input {
                    if reg.index >= MAX_LOCATIONS {
                        ctx.unsupported(format!(
                            "vertex input {reg} exceeds the {MAX_LOCATIONS} attribute locations"
                        ));
                        continue;
                    }
                    io.inputs.push(Varying {
                        location: reg.index,
                        field: format!("v{}", reg.index),
                        register: *reg,
                        centroid: false,
                    });
                } else if reg.kind.is_output() {
                    match output_semantic(ctx, *reg) {
                        Some((Usage::Position, 0)) if io.position.is_none() => {
                            io.position = Some(*reg)
                        }
                        Some((usage, index)) => io.outputs.push(Varying {
                            location: varying_location(usage, index),
                            field: format!("{}{index}", usage.name()),
                            register: *reg,
                            centroid: false,
                        }),
                        None => {}
                    }
                }
            }
            if version.major < 3 {
                io.position = Some(Register::new(RegisterKind::RastOut, RASTOUT_POSITION));
            }
        } else {
            for reg in &registers {
                if is_system_value(*reg) {
                    io.system_values.push(*reg);
                } else if let Some((usage, index)) = input_semantic(ctx, *reg) {
                    io.inputs.push(Varying {
                        location: varying_location(usage, index),
                        field: format!("{}{index}", usage.name()),
                        register: *reg,
                        centroid: ctx.declaration(*reg).is_some_and(|d| d.centroid),
                    });
                }
            }
            let mut colors: BTreeSet<u32> = ctx
                .used_of_kind(RegisterKind::ColorOut)
                .map(|(r, _)| r.index)
                .collect();
            if version.major >= 2 {
                colors.insert(0);
            }
            let color_reg = |index| {
                if version.is_legacy_pixel() {
                    Register::new(RegisterKind::Temp, 0)
                } else {
                    Register::new(RegisterKind::ColorOut, index)
                }
            };
            if version.is_legacy_pixel() {
                colors.insert(0);
            }
            for index in colors {
                io.outputs.push(Varying {
                    location: index,
                    field: format!("oC{index}"),
                    register: color_reg(index),
                    centroid: false,
                });
            }
            io.depth = ctx.is_used(Register::new(RegisterKind::DepthOut, 0));
        }

        check_locations(ctx, &io.inputs, "input");
        check_locations(ctx, &io.outputs, "output");
        io
    }

    fn write_globals(&self, ctx: &mut Context, io: &Interface) {
        let version = ctx.version;
        let stage = version.stage;
        let p = stage.prefix();
        let half_pixel = version.is_vertex() && ctx.options.half_pixel_center;
        let mut lines: Vec<String> = Vec::new();

        if half_pixel {
            lines.push("struct HalfPixel {".into());
            lines.push("    inv_viewport: vec2<f32>,".into());
            lines.push("    _pad: vec2<f32>,".into());
            lines.push("};".into());
            lines.push(String::new());
        }

        let (in_struct, out_struct) = match stage {
            ShaderStage::Vertex => ("VsIn", "VsOut"),
            ShaderStage::Pixel => ("FsIn", "FsOut"),
        };
        if !io.inputs.is_empty() || !io.system_values.is_empty() {
            lines.push(format!("struct {in_struct} {{"));
            for reg in &io.system_values {
                if reg.index == MISCTYPE_POSITION {
                    lines.push("    @builtin(position) frag_position: vec4<f32>,".into());
                } else {
                    lines.push("    @builtin(front_facing) front_facing: bool,".into());
                }
            }
            for v in &io.inputs {
                let interpolate = if v.centroid {
                    " @interpolate(perspective, centroid)"
                } else {
                    ""
                };
                lines.push(format!(
                    "    @location({}){interpolate} {}: vec4<f32>,",
                    v.location, v.field
                ));
            }
            lines.push("};".into());
            lines.push(String::new());
        }
        lines.push(format!("struct {out_struct} {{"));
        if version.is_vertex() {
            lines.push("    @builtin(position) position: vec4<f32>,".into());
        }
        for v in &io.outputs {
            lines.push(format!("    @location({}) {}: vec4<f32>,", v.location, v.field));
        }
        if io.depth {
            lines.push("    @builtin(frag_depth) depth: f32,".into());
        }
        lines.push("};".into());
        lines.push(String::new());

        let mut bindings = Vec::new();
        for (kind, letter, elem) in [
            (RegisterKind::Const, "c", "vec4<f32>"),
            (RegisterKind::ConstInt, "i", "vec4<i32>"),
            (RegisterKind::ConstBool, "b", "vec4<u32>"),
        ] {
            let size = ctx.uniform_array_size(kind);
            if size > 0 {
                bindings.push(format!(
                    "@group(0) @binding({}) var<uniform> {p}_{letter}: array<{elem}, {size}>;",
                    uniform_binding(stage, kind)
                ));
            }
        }
        if version.is_pixel() && !ctx.texbem_samplers.is_empty() {
            bindings.push(format!(
                "@group(0) @binding({BUMPENV_BINDING}) var<uniform> {p}_bumpenv: array<vec4<f32>, 32>;"
            ));
        }
        let group = sampler_group(stage);
        for s in used_samplers(ctx) {
            let shadow = is_shadow_sampler(ctx, s);
            let texture = texture_decl(sampler_texture_type(ctx, s), shadow);
            let sampler = if shadow { "sampler_comparison" } else { "sampler" };
            bindings.push(format!(
                "@group({group}) @binding({}) var {p}_tex{s}: {texture};",
                2 * s
            ));
            bindings.push(format!(
                "@group({group}) @binding({}) var {p}_samp{s}: {sampler};",
                2 * s + 1
            ));
        }
        if half_pixel {
            bindings.push(format!(
                "@group({HALF_PIXEL_GROUP}) @binding(0) var<uniform> half_pixel: HalfPixel;"
            ));
        }
        if !bindings.is_empty() {
            lines.extend(bindings);
            lines.push(String::new());
        }

        let mut consts = Vec::new();
        for l in ctx.literals.iter() {
            consts.push(match l.value {
                LiteralValue::Float(v) => format!(
                    "const {p}_c{}: vec4<f32> = vec4<f32>({});",
                    l.index,
                    v.map(format_f32).join(", ")
                ),
                LiteralValue::Int(v) => format!(
                    "const {p}_i{}: vec4<i32> = vec4<i32>({}, {}, {}, {});",
                    l.index, v[0], v[1], v[2], v[3]
                ),
                LiteralValue::Bool(b) => format!("const {p}_b{}: bool = {b};", l.index),
            });
        }
        if !consts.is_empty() {
            lines.extend(consts);
            lines.push(String::new());
        }

        for (kind, letter, elem) in [
            (RegisterKind::Const, "c", "vec4<f32>"),
            (RegisterKind::ConstInt, "i", "vec4<i32>"),
        ] {
            if patched_array(ctx, kind) {
                lines.push(format!(
                    "var<private> {p}_{letter}_array: array<{elem}, {}>;",
                    ctx.uniform_array_size(kind)
                ));
            }
        }
        for reg in private_registers(ctx) {
            let ty = match value_ty(reg.kind) {
                ValueTy::Int => "vec4<i32>",
                ValueTy::Bool => "vec4<bool>",
                _ => "vec4<f32>",
            };
            lines.push(format!("var<private> {}: {ty};", register_name(p, reg)));
        }
        if ctx.used_of_kind(RegisterKind::Output).next().is_some() {
            lines.push(format!(
                "var<private> {p}_o: array<vec4<f32>, {VS3_OUTPUT_COUNT}>;"
            ));
        }
        lines.push(String::new());

        let saved = ctx.out.push(Section::Globals, 0);
        for line in &lines {
            wl!(ctx.out, "{line}");
        }
        ctx.out.pop(saved);
    }

    fn write_prologue(&self, ctx: &mut Context, io: &Interface) {
        let version = ctx.version;
        let p = version.stage.prefix();
        let mut lines: Vec<String> = Vec::new();

        let has_inputs = !io.inputs.is_empty() || !io.system_values.is_empty();
        let (attr, entry, in_struct, out_struct) = match version.stage {
            ShaderStage::Vertex => ("@vertex", "vs_main", "VsIn", "VsOut"),
            ShaderStage::Pixel => ("@fragment", "fs_main", "FsIn", "FsOut"),
        };
        lines.push(attr.to_owned());
        if has_inputs {
            lines.push(format!("fn {entry}(input: {in_struct}) -> {out_struct} {{"));
        } else {
            lines.push(format!("fn {entry}() -> {out_struct} {{"));
        }
        for v in &io.inputs {
            lines.push(format!(
                "    {} = input.{};",
                register_name(p, v.register),
                v.field
            ));
        }
        for reg in &io.system_values {
            let name = register_name(p, *reg);
            if reg.index == MISCTYPE_POSITION {
                lines.push(format!(
                    "    {name} = vec4<f32>(floor(input.frag_position.xy), 0.0, 1.0);"
                ));
            } else {
                lines.push(format!(
                    "    {name} = vec4<f32>(select(-1.0, 1.0, input.front_facing));"
                ));
            }
        }
        for (kind, letter) in [(RegisterKind::Const, "c"), (RegisterKind::ConstInt, "i")] {
            if !patched_array(ctx, kind) {
                continue;
            }
            let size = ctx.uniform_array_size(kind);
            lines.push(format!("    {p}_{letter}_array = {p}_{letter};"));
            for l in ctx.literals.of_kind(kind).filter(|l| l.index < size) {
                lines.push(format!(
                    "    {p}_{letter}_array[{i}] = {p}_{letter}{i};",
                    i = l.index
                ));
            }
        }

        let saved = ctx.out.push(Section::Prologue, 0);
        for line in &lines {
            wl!(ctx.out, "{line}");
        }
        ctx.out.pop(saved);
    }

    fn write_epilogue(&self, ctx: &mut Context, io: &Interface) {
        let version = ctx.version;
        let p = version.stage.prefix();
        let saved = ctx.out.push(Section::Body, 1);
        if version.is_vertex() {
            wl!(ctx.out, "var out: VsOut;");
            match io.position {
                Some(reg) => wl!(ctx.out, "out.position = {};", register_name(p, reg)),
                None => wl!(ctx.out, "out.position = vec4<f32>(0.0, 0.0, 0.0, 1.0);"),
            }
            for v in &io.outputs {
                wl!(ctx.out, "out.{} = {};", v.field, register_name(p, v.register));
            }
            if ctx.options.half_pixel_center {
                wl!(
                    ctx.out,
                    "out.position.x = out.position.x - half_pixel.inv_viewport.x * out.position.w;"
                );
                wl!(
                    ctx.out,
                    "out.position.y = out.position.y + half_pixel.inv_viewport.y * out.position.w;"
                );
            }
        } else {
            wl!(ctx.out, "var out: FsOut;");
            for v in &io.outputs {
                wl!(ctx.out, "out.{} = {};", v.field, register_name(p, v.register));
            }
            if io.depth {
                wl!(ctx.out, "out.depth = {p}_oDepth.x;");
            }
        }
        wl!(ctx.out, "return out;");
        ctx.out.dedent();
        wl!(ctx.out, "}}");
        ctx.out.pop(saved);
    }
}

/// A relatively read constant kind that also has literals needs a private copy with the literals
/// patched in.
fn patched_array(ctx: &Context, kind: RegisterKind) -> bool {
    ctx.relative_kinds.contains(&kind) && ctx.literals.of_kind(kind).next().is_some()
}

/// Registers stored as module-scope privates.
fn private_registers(ctx: &Context) -> BTreeSet<Register> {
    let version = ctx.version;
    let mut regs: BTreeSet<Register> = ctx
        .registers
        .keys()
        .filter(|r| {
            matches!(
                r.kind,
                RegisterKind::Temp
                    | RegisterKind::Input
                    | RegisterKind::Address
                    | RegisterKind::Texture
                    | RegisterKind::RastOut
                    | RegisterKind::AttrOut
                    | RegisterKind::TexCrdOut
                    | RegisterKind::ColorOut
                    | RegisterKind::DepthOut
                    | RegisterKind::MiscType
                    | RegisterKind::Predicate
            )
        })
        .copied()
        .collect();
    if version.is_vertex() && version.major < 3 {
        regs.insert(Register::new(RegisterKind::RastOut, RASTOUT_POSITION));
    }
    if version.is_pixel() {
        if version.major >= 2 {
            regs.insert(Register::new(RegisterKind::ColorOut, 0));
        } else {
            regs.insert(Register::new(RegisterKind::Temp, 0));
        }
    }
    regs
}

fn check_locations(ctx: &mut Context, varyings: &[Varying], what: &str) {
    let mut taken: BTreeMap<u32, &str> = BTreeMap::new();
    for v in varyings {
        if v.location >= MAX_LOCATIONS {
            ctx.unsupported(format!(
                "{what} {} needs @location({}), beyond the {MAX_LOCATIONS} available",
                v.field, v.location
            ));
        } else if let Some(prev) = taken.insert(v.location, &v.field) {
            ctx.unsupported(format!(
                "{what}s {prev} and {} both map to @location({})",
                v.field, v.location
            ));
        }
    }
}

impl Emitter for WgslEmitter {
    fn profile(&self) -> Profile {
        Profile::Wgsl
    }

    fn entry_point(&self, stage: ShaderStage) -> &'static str {
        match stage {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Pixel => "fs_main",
        }
    }

    fn start(&mut self, ctx: &mut Context) {
        let version = ctx.version;
        let entry = self.entry_point(version.stage);
        let mut out = ctx.out.redirect(Section::Preamble, 0);
        wl!(out, "// {version} ({entry})");
        wl!(out, "");
    }

    fn emit(&mut self, ctx: &mut Context, inst: &Instruction) {
        if inst.fused == Fused::Skip {
            return;
        }
        let shape = inst.opcode.shape(&ctx.version);
        if inst.src.len() < shape.src_count() || (shape.has_dst() && inst.dst.is_none()) {
            return;
        }

        let guarded = matches!(
            inst.opcode,
            Opcode::TexKill
                | Opcode::Call
                | Opcode::CallNz
                | Opcode::Break
                | Opcode::BreakC
                | Opcode::BreakP
        );
        let guard = if guarded { inst.predicate } else { None };
        if let Some(pred) = &guard {
            let cond = predicate_condition(ctx.version.stage.prefix(), pred);
            wl!(ctx.out, "if ({cond}) {{");
            ctx.out.indent();
        }
        self.emit_op(ctx, inst);
        if guard.is_some() {
            ctx.out.dedent();
            wl!(ctx.out, "}}");
        }
    }

    fn phase(&mut self, ctx: &mut Context) {
        wl!(ctx.out, "// phase");
    }

    fn finish(&mut self, ctx: &mut Context) {
        if let Some(saved) = self.subroutine.take() {
            self.close_subroutine(ctx, saved);
        }
        while let Some(frame) = self.frames.pop() {
            self.write_close(ctx, frame);
        }
        let io = self.interface(ctx);
        self.write_epilogue(ctx, &io);
        self.write_globals(ctx, &io);
        self.write_prologue(ctx, &io);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::types::{Component, ResultShift, ShaderVersion, Swizzle};
    use crate::CompileOptions;
    use pretty_assertions::assert_eq;

    fn ctx(stage: ShaderStage, major: u8, minor: u8) -> Context {
        Context::new(
            ShaderVersion::new(stage, major, minor),
            &CompileOptions::default(),
            Diagnostics::new(),
        )
    }

    fn src(kind: RegisterKind, index: u32) -> SrcOperand {
        SrcOperand {
            reg: Register::new(kind, index),
            swizzle: Swizzle::IDENTITY,
            modifier: SrcModifier::None,
            relative: None,
        }
    }

    fn dst(kind: RegisterKind, index: u32, mask: WriteMask) -> DstOperand {
        DstOperand {
            reg: Register::new(kind, index),
            mask,
            saturate: false,
            partial_precision: false,
            centroid: false,
            shift: ResultShift::None,
            relative: None,
        }
    }

    fn inst(opcode: Opcode, d: Option<DstOperand>, s: Vec<SrcOperand>) -> Instruction {
        Instruction {
            opcode,
            control: 0,
            coissue: false,
            predicate: None,
            dst: d,
            src: s,
            declaration: None,
            literal: [0; 4],
            offset: 0,
            fused: Fused::None,
        }
    }

    fn body(ctx: &Context) -> String {
        ctx.out.section_text(Section::Body)
    }

    #[test]
    fn float_literals_round_trip() {
        assert_eq!(format_f32(1.0), "1.0");
        assert_eq!(format_f32(-0.25), "-0.25");
        assert_eq!(format_f32(f32::NAN), "0.0");
        assert_eq!(format_f32(f32::INFINITY), format!("{:?}", f32::MAX));
    }

    #[test]
    fn varying_locations() {
        assert_eq!(varying_location(Usage::Color, 1), 1);
        assert_eq!(varying_location(Usage::TexCoord, 3), 7);
        assert_eq!(varying_location(Usage::Fog, 0), 12);
        assert_eq!(varying_location(Usage::PointSize, 0), 13);
    }

    #[test]
    fn source_modifiers_and_constants() {
        let mut ctx = ctx(ShaderStage::Pixel, 1, 4);
        ctx.literals.define(2, LiteralValue::Float([0.5; 4]));

        let mut s = src(RegisterKind::Temp, 1);
        s.modifier = SrcModifier::Sign;
        s.swizzle = Swizzle::replicate(Component::W);
        assert_eq!(float4(&mut ctx, &s), "(ps_r1.wwww * 2.0 - 1.0)");
        assert_eq!(scalar(&mut ctx, &s), "(ps_r1.wwww * 2.0 - 1.0).x");

        assert_eq!(float4(&mut ctx, &src(RegisterKind::Const, 2)), "ps_c2");
        assert_eq!(float4(&mut ctx, &src(RegisterKind::Const, 3)), "ps_c[3]");
        assert!(!ctx.failed());
    }

    #[test]
    fn relative_constants_use_the_patched_copy_when_literals_exist() {
        let mut ctx = ctx(ShaderStage::Vertex, 2, 0);
        let mut s = src(RegisterKind::Const, 4);
        s.relative = Some(RelativeAddress {
            reg: Register::new(RegisterKind::Address, 0),
            component: Component::Y,
        });
        assert_eq!(float4(&mut ctx, &s), "vs_c[4 + vs_a0.y]");
        ctx.literals.define(0, LiteralValue::Float([1.0; 4]));
        assert_eq!(float4(&mut ctx, &s), "vs_c_array[4 + vs_a0.y]");
    }

    #[test]
    fn masked_stores() {
        let mut ctx = ctx(ShaderStage::Vertex, 2, 0);
        let mut emitter = WgslEmitter::new();
        let mov = |mask| {
            inst(
                Opcode::Mov,
                Some(dst(RegisterKind::Temp, 0, mask)),
                vec![src(RegisterKind::Temp, 1)],
            )
        };
        emitter.emit(&mut ctx, &mov(WriteMask::XYZW));
        emitter.emit(&mut ctx, &mov(WriteMask::Y));
        emitter.emit(&mut ctx, &mov(WriteMask::X | WriteMask::W));
        assert_eq!(
            body(&ctx),
            "    vs_r0 = vs_r1;\n\
             \x20   vs_r0.y = (vs_r1).y;\n\
             \x20   { let tmp = vs_r1; vs_r0.x = tmp.x; vs_r0.w = tmp.w; }\n"
        );
    }

    #[test]
    fn predicated_store_selects_per_lane() {
        let mut ctx = ctx(ShaderStage::Vertex, 2, 1);
        let mut emitter = WgslEmitter::new();
        let mut add = inst(
            Opcode::Add,
            Some(dst(RegisterKind::Temp, 0, WriteMask::XYZW)),
            vec![src(RegisterKind::Temp, 1), src(RegisterKind::Temp, 2)],
        );
        let mut pred = src(RegisterKind::Predicate, 0);
        pred.modifier = SrcModifier::Not;
        add.predicate = Some(pred);
        emitter.emit(&mut ctx, &add);
        assert_eq!(
            body(&ctx),
            "    vs_r0 = select(vs_r0, (vs_r1 + vs_r2), !vs_p0);\n"
        );
    }

    #[test]
    fn rep_and_loop_blocks_balance() {
        let mut ctx = ctx(ShaderStage::Vertex, 3, 0);
        let mut emitter = WgslEmitter::new();
        emitter.emit(
            &mut ctx,
            &inst(Opcode::Rep, None, vec![src(RegisterKind::ConstInt, 0)]),
        );
        emitter.emit(
            &mut ctx,
            &inst(
                Opcode::Loop,
                None,
                vec![src(RegisterKind::Loop, 0), src(RegisterKind::ConstInt, 1)],
            ),
        );
        emitter.emit(&mut ctx, &inst(Opcode::Break, None, vec![]));
        emitter.emit(&mut ctx, &inst(Opcode::EndLoop, None, vec![]));
        emitter.emit(&mut ctx, &inst(Opcode::EndRep, None, vec![]));
        assert!(emitter.frames.is_empty());
        assert_eq!(ctx.out.scope().indent, 1);

        let text = body(&ctx);
        assert!(text.contains("rep_iteration < vs_i[0].x"));
        assert!(text.contains("var aL: i32 = vs_i[1].y;"));
        assert!(text.contains("aL = aL + vs_i[1].z;"));
    }

    #[test]
    fn else_inside_loop_is_not_written() {
        let mut ctx = ctx(ShaderStage::Vertex, 3, 0);
        let mut emitter = WgslEmitter::new();
        emitter.emit(
            &mut ctx,
            &inst(Opcode::If, None, vec![src(RegisterKind::ConstBool, 0)]),
        );
        emitter.emit(
            &mut ctx,
            &inst(
                Opcode::Loop,
                None,
                vec![src(RegisterKind::Loop, 0), src(RegisterKind::ConstInt, 0)],
            ),
        );
        emitter.emit(&mut ctx, &inst(Opcode::Else, None, vec![]));

        assert_eq!(emitter.frames.len(), 2);
        assert!(!body(&ctx).contains("else"));
        let errors: Vec<_> = ctx.diagnostics.iter().map(|d| d.error.clone()).collect();
        assert_eq!(
            errors,
            vec![ShaderError::MismatchedBlock {
                close: "ELSE",
                open: "LOOP"
            }]
        );
    }

    #[test]
    fn uncalled_label_goes_to_discard() {
        let mut ctx = ctx(ShaderStage::Vertex, 2, 0);
        let mut emitter = WgslEmitter::new();
        emitter.emit(
            &mut ctx,
            &inst(Opcode::Label, None, vec![src(RegisterKind::Label, 3)]),
        );
        emitter.emit(&mut ctx, &inst(Opcode::Ret, None, vec![]));
        assert_eq!(ctx.out.section_text(Section::Subroutines), "");
        assert!(ctx
            .out
            .section_text(Section::Discard)
            .starts_with("fn vs_l3() {"));
        assert_eq!(ctx.out.scope().section, Section::Body);
    }

    #[test]
    fn sampling_inside_control_flow_uses_level_zero() {
        let mut ctx = ctx(ShaderStage::Pixel, 2, 1);
        let mut emitter = WgslEmitter::new();
        let texld = inst(
            Opcode::Tex,
            Some(dst(RegisterKind::Temp, 0, WriteMask::XYZW)),
            vec![src(RegisterKind::Texture, 0), src(RegisterKind::Sampler, 1)],
        );
        emitter.emit(&mut ctx, &texld);
        emitter.emit(
            &mut ctx,
            &inst(Opcode::If, None, vec![src(RegisterKind::ConstBool, 0)]),
        );
        emitter.emit(&mut ctx, &texld);
        let text = body(&ctx);
        assert!(text.contains("ps_r0 = textureSample(ps_tex1, ps_samp1, ps_t0.xy);"));
        assert!(text.contains("if ((ps_b[0].x != 0u)) {"));
        assert!(text.contains("textureSampleLevel(ps_tex1, ps_samp1, ps_t0.xy, 0.0)"));
    }
}

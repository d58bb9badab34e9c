//! Token-stream decoder.
//!
//! Decodes one syntactic unit at a time from a little-endian `u32` stream. Structural problems
//! (reserved bits, unknown register types, bad modifiers) are recorded on the [`Context`] and
//! decoding continues with a best-effort value; only running out of tokens stops a unit.

use tracing::trace;

use crate::context::{Context, PadRow};
use crate::ctab::{self, CTAB_FOURCC};
use crate::diagnostics::ShaderError;
use crate::limits::{
    CONST_BANK_OFFSETS, MAX_CONST_REGISTER_INDEX, MAX_LABEL_INDEX, MAX_REGISTER_INDEX,
    MAX_SAMPLER_INDEX,
};
use crate::opcode::{Opcode, OperandShape, END_TOKEN, OPCODE_COMMENT, OPCODE_PHASE};
use crate::types::{
    Component, Declaration, DstOperand, Register, RegisterKind, RelativeAddress, ResultShift,
    ShaderStage, ShaderVersion, SrcModifier, SrcOperand, Swizzle, TextureType, Usage, WriteMask,
};

const OPCODE_MASK: u32 = 0x0000_FFFF;
const CONTROL_SHIFT: u32 = 16;
const LENGTH_SHIFT: u32 = 24;
const LENGTH_MASK: u32 = 0xF;
const PREDICATED: u32 = 0x1000_0000;
const INSTRUCTION_RESERVED: u32 = 0x2000_0000;
const COISSUE: u32 = 0x4000_0000;
const PARAM_BIT: u32 = 0x8000_0000;

const COMMENT_LENGTH_SHIFT: u32 = 16;
const COMMENT_LENGTH_MASK: u32 = 0x7FFF;

const REGNUM_MASK: u32 = 0x0000_07FF;
const REGTYPE_MASK: u32 = 0x7000_0000;
const REGTYPE_SHIFT: u32 = 28;
const REGTYPE_MASK2: u32 = 0x0000_1800;
const REGTYPE_SHIFT2: u32 = 8;
const RELATIVE: u32 = 0x0000_2000;
const PARAM_RESERVED: u32 = 0x0000_C000;

const WRITEMASK_SHIFT: u32 = 16;
const RESULT_MOD_SHIFT: u32 = 20;
const RESULT_SATURATE: u32 = 0x1;
const RESULT_PARTIAL_PRECISION: u32 = 0x2;
const RESULT_CENTROID: u32 = 0x4;
const SHIFT_SCALE_SHIFT: u32 = 24;

const SWIZZLE_SHIFT: u32 = 16;
const SRCMOD_SHIFT: u32 = 24;

const DCL_USAGE_MASK: u32 = 0x1F;
const DCL_INDEX_SHIFT: u32 = 16;
const DCL_INDEX_MASK: u32 = 0xF;
const DCL_TEXTURE_SHIFT: u32 = 27;
const DCL_TEXTURE_MASK: u32 = 0xF;
const DCL_RESERVED: u32 = 0x07F0_FFE0;

/// Cursor over the token words.
#[derive(Debug)]
pub struct TokenStream<'a> {
    words: &'a [u32],
    pos: usize,
    limit: usize,
    bounded: bool,
}

impl<'a> TokenStream<'a> {
    /// `bounded` is `false` when the caller does not know the buffer length and the end token is
    /// the only terminator.
    pub fn new(words: &'a [u32], bounded: bool) -> Self {
        Self {
            words,
            pos: 0,
            limit: words.len(),
            bounded,
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn byte_offset(&self) -> usize {
        self.pos * 4
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.pos
    }

    pub fn is_bounded(&self) -> bool {
        self.bounded
    }

    pub fn next(&mut self) -> Result<u32, ShaderError> {
        let word = self.peek().ok_or(ShaderError::Truncated)?;
        self.pos += 1;
        Ok(word)
    }

    pub fn peek(&self) -> Option<u32> {
        if self.pos < self.limit {
            self.words.get(self.pos).copied()
        } else {
            None
        }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u32], ShaderError> {
        if self.remaining() < count {
            return Err(ShaderError::Truncated);
        }
        let words = &self.words[self.pos..self.pos + count];
        self.pos += count;
        Ok(words)
    }

    fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.limit);
    }

    /// Nothing past the end token may be read once it has been seen.
    pub fn cap_here(&mut self) {
        self.limit = self.pos;
    }
}

/// Side data the validator attaches to an instruction before emission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Fused {
    #[default]
    None,
    /// The instruction has no effect; its pad predecessors were never seen.
    Skip,
    M3x2(PadRow),
    M3x3(PadRow, PadRow),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub control: u8,
    pub coissue: bool,
    pub predicate: Option<SrcOperand>,
    pub dst: Option<DstOperand>,
    pub src: Vec<SrcOperand>,
    pub declaration: Option<Declaration>,
    /// Raw literal words of `def`/`defi`/`defb`.
    pub literal: [u32; 4],
    /// Byte offset of the instruction token.
    pub offset: usize,
    pub fused: Fused,
}

impl Instruction {
    pub fn dst(&self) -> Option<&DstOperand> {
        self.dst.as_ref()
    }

    pub fn src(&self, i: usize) -> Option<&SrcOperand> {
        self.src.get(i)
    }

    pub fn name(&self, version: &ShaderVersion) -> &'static str {
        self.opcode.display_name(version, self.control)
    }
}

#[derive(Debug)]
pub enum Unit {
    Comment,
    End,
    Phase,
    Instruction(Instruction),
    /// An instruction that could not be decoded; the stream has been resynchronized past it.
    Skipped,
}

pub fn decode_version(token: u32) -> Result<ShaderVersion, ShaderError> {
    let stage = match token >> 16 {
        0xFFFE => ShaderStage::Vertex,
        0xFFFF => ShaderStage::Pixel,
        other => return Err(ShaderError::UnsupportedShaderType(other as u16)),
    };
    let major = ((token >> 8) & 0xFF) as u8;
    let minor = (token & 0xFF) as u8;
    Ok(ShaderVersion::new(stage, major, minor))
}

/// Decodes one unit. `Err` means the stream ended mid-unit and decoding cannot continue.
pub fn decode_unit(ctx: &mut Context, stream: &mut TokenStream<'_>) -> Result<Unit, ShaderError> {
    let start = stream.pos();
    ctx.offset = stream.byte_offset();
    let token = stream.next()?;

    if token == END_TOKEN {
        return Ok(Unit::End);
    }
    if token & OPCODE_MASK == OPCODE_COMMENT {
        if token & PARAM_BIT != 0 {
            ctx.malformed("reserved bit in comment token must be zero");
        }
        let len = ((token >> COMMENT_LENGTH_SHIFT) & COMMENT_LENGTH_MASK) as usize;
        let payload = stream.take(len)?;
        decode_comment(ctx, payload);
        return Ok(Unit::Comment);
    }
    if token == OPCODE_PHASE {
        return Ok(Unit::Phase);
    }

    let raw = token & OPCODE_MASK;
    let declared_len = ((token >> LENGTH_SHIFT) & LENGTH_MASK) as usize;
    let checks_length = ctx.version.major >= 2;

    let Some(opcode) = Opcode::from_raw(raw) else {
        ctx.error(ShaderError::UnknownOpcode(raw as u16));
        resync(stream, start, declared_len, checks_length);
        return Ok(Unit::Skipped);
    };

    if token & PARAM_BIT != 0 {
        ctx.malformed(format!("reserved bit #31 set in {} instruction token", opcode.name()));
    }
    if token & INSTRUCTION_RESERVED != 0 {
        ctx.malformed(format!("reserved bit #29 set in {} instruction token", opcode.name()));
    }

    let mut inst = Instruction {
        opcode,
        control: ((token >> CONTROL_SHIFT) & 0xFF) as u8,
        coissue: token & COISSUE != 0,
        predicate: None,
        dst: None,
        src: Vec::new(),
        declaration: None,
        literal: [0; 4],
        offset: ctx.offset,
        fused: Fused::None,
    };
    let predicated = token & PREDICATED != 0;

    let shape = opcode.shape(&ctx.version);
    match shape {
        OperandShape::Dcl => {
            let decl_token = stream.next()?;
            let dst = decode_dst(ctx, stream, RegRole::Dst, true)?;
            inst.declaration = Some(decode_declaration(ctx, decl_token, &dst));
            inst.dst = Some(dst);
        }
        OperandShape::Def | OperandShape::DefB => {
            inst.dst = Some(decode_dst(ctx, stream, RegRole::Dst, false)?);
            let count = if shape == OperandShape::Def { 4 } else { 1 };
            for (slot, word) in inst.literal.iter_mut().zip(stream.take(count)?) {
                *slot = *word;
            }
        }
        _ => {
            if shape.has_dst() {
                let role = if opcode == Opcode::Mova {
                    RegRole::Address
                } else {
                    RegRole::Dst
                };
                inst.dst = Some(decode_dst(ctx, stream, role, false)?);
            }
            if predicated {
                inst.predicate = Some(decode_predicate(ctx, stream)?);
            }
            for _ in 0..shape.src_count() {
                let src = decode_src(ctx, stream)?;
                inst.src.push(src);
            }
        }
    }
    if predicated && matches!(shape, OperandShape::Dcl | OperandShape::Def | OperandShape::DefB) {
        ctx.illegal(format!("{} cannot be predicated", opcode.name()));
    }

    let consumed = stream.pos() - start - 1;
    if checks_length && consumed != declared_len {
        ctx.error(ShaderError::TokenCountMismatch {
            opcode: opcode.name(),
            declared: declared_len,
            consumed,
        });
        stream.seek(start + 1 + declared_len);
    }

    trace!(
        offset = inst.offset,
        opcode = opcode.name(),
        control = inst.control,
        "decoded instruction"
    );
    Ok(Unit::Instruction(inst))
}

/// Skips an undecodable instruction. Shader model 2+ carries its length; older streams are
/// scanned forward to the next token that is not a parameter.
fn resync(stream: &mut TokenStream<'_>, start: usize, declared_len: usize, checks_length: bool) {
    if checks_length {
        stream.seek(start + 1 + declared_len);
        return;
    }
    while let Some(word) = stream.peek() {
        if word & PARAM_BIT == 0 {
            break;
        }
        stream.seek(stream.pos() + 1);
    }
}

fn decode_comment(ctx: &mut Context, payload: &[u32]) {
    let Some((&fourcc, rest)) = payload.split_first() else {
        return;
    };
    if fourcc != CTAB_FOURCC {
        return;
    }
    let bytes: Vec<u8> = rest.iter().flat_map(|w| w.to_le_bytes()).collect();
    match ctab::parse_ctab(&bytes) {
        Ok(symbols) => ctx.symbols.extend(symbols),
        Err(err) => ctx.malformed(err.to_string()),
    }
}

/// How a register token is being interpreted; decides the type-3 alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegRole {
    Src,
    Dst,
    /// Relative-addressing tokens and the `mova` destination.
    Address,
}

fn decode_register(ctx: &mut Context, token: u32, role: RegRole) -> Register {
    let raw = ((token & REGTYPE_MASK) >> REGTYPE_SHIFT) | ((token & REGTYPE_MASK2) >> REGTYPE_SHIFT2);
    let mut index = token & REGNUM_MASK;
    let version = ctx.version;
    let kind = match raw {
        0 => RegisterKind::Temp,
        1 => RegisterKind::Input,
        2 => RegisterKind::Const,
        3 if role == RegRole::Address || version.is_vertex() => RegisterKind::Address,
        3 => RegisterKind::Texture,
        4 => RegisterKind::RastOut,
        5 => RegisterKind::AttrOut,
        6 if version.is_vertex() && version.major >= 3 => RegisterKind::Output,
        6 => RegisterKind::TexCrdOut,
        7 => RegisterKind::ConstInt,
        8 => RegisterKind::ColorOut,
        9 => RegisterKind::DepthOut,
        10 => RegisterKind::Sampler,
        11..=13 => {
            index += CONST_BANK_OFFSETS[(raw - 11) as usize];
            RegisterKind::Const
        }
        14 => RegisterKind::ConstBool,
        15 => RegisterKind::Loop,
        17 => RegisterKind::MiscType,
        18 => RegisterKind::Label,
        19 => RegisterKind::Predicate,
        other => {
            ctx.malformed(format!("unknown register type {other}"));
            RegisterKind::Temp
        }
    };

    let max = match kind {
        RegisterKind::Const => MAX_CONST_REGISTER_INDEX,
        RegisterKind::Sampler => MAX_SAMPLER_INDEX,
        RegisterKind::Label => MAX_LABEL_INDEX,
        RegisterKind::RastOut => 2,
        RegisterKind::MiscType => 1,
        RegisterKind::DepthOut | RegisterKind::Loop => 0,
        _ => MAX_REGISTER_INDEX,
    };
    if index > max {
        ctx.illegal(format!("register {} out of range", kind.asm_name(index)));
    }
    Register::new(kind, index)
}

fn check_param_bits(ctx: &mut Context, token: u32, what: &str) {
    if token & PARAM_RESERVED != 0 {
        ctx.malformed(format!("reserved bits #1 in {what} token must be zero"));
    }
    if token & PARAM_BIT == 0 {
        ctx.malformed(format!("reserved bit #2 in {what} token must be one"));
    }
}

fn decode_relative(
    ctx: &mut Context,
    stream: &mut TokenStream<'_>,
) -> Result<RelativeAddress, ShaderError> {
    // vs_1_x has no relative token; a0.x is implied.
    if ctx.version.major < 2 {
        return Ok(RelativeAddress {
            reg: Register::new(RegisterKind::Address, 0),
            component: Component::X,
        });
    }
    let token = stream.next()?;
    check_param_bits(ctx, token, "relative address");
    if token & RELATIVE != 0 {
        ctx.malformed("nested relative addressing");
    }
    let reg = decode_register(ctx, token, RegRole::Address);
    if !matches!(reg.kind, RegisterKind::Address | RegisterKind::Loop) {
        ctx.illegal(format!(
            "relative addressing through {reg}; only a0 and aL are allowed"
        ));
    }
    let swizzle = Swizzle::from_bits(token >> SWIZZLE_SHIFT);
    Ok(RelativeAddress {
        reg,
        component: swizzle.0[0],
    })
}

fn decode_dst(
    ctx: &mut Context,
    stream: &mut TokenStream<'_>,
    role: RegRole,
    in_dcl: bool,
) -> Result<DstOperand, ShaderError> {
    let token = stream.next()?;
    check_param_bits(ctx, token, "destination");
    let reg = decode_register(ctx, token, role);

    let relative = if token & RELATIVE != 0 {
        let rel = decode_relative(ctx, stream)?;
        if !(ctx.version.is_vertex() && ctx.version.major >= 3 && reg.kind == RegisterKind::Output)
        {
            ctx.illegal(format!("relative addressing on destination {reg}"));
        }
        Some(rel)
    } else {
        None
    };

    let mut mask = WriteMask::from_bits_truncate(((token >> WRITEMASK_SHIFT) & 0xF) as u8);
    if mask.is_empty() {
        mask = WriteMask::XYZW;
    }
    if reg.kind.is_scalar(ctx.version.stage, reg.index) {
        mask = WriteMask::X;
    }

    let modifiers = (token >> RESULT_MOD_SHIFT) & 0xF;
    if modifiers & !(RESULT_SATURATE | RESULT_PARTIAL_PRECISION | RESULT_CENTROID) != 0 {
        ctx.malformed("unknown destination result modifier");
    }
    let saturate = modifiers & RESULT_SATURATE != 0;
    let partial_precision = modifiers & RESULT_PARTIAL_PRECISION != 0;
    let centroid = modifiers & RESULT_CENTROID != 0;

    let shift = match ResultShift::from_raw(token >> SHIFT_SCALE_SHIFT) {
        Some(shift) => shift,
        None => {
            ctx.malformed("unknown result shift scale");
            ResultShift::None
        }
    };

    let version = ctx.version;
    if shift != ResultShift::None && !version.is_legacy_pixel() {
        ctx.illegal("result shift scale is only allowed in pixel shaders below 2.0");
    }
    if saturate && version.is_vertex() && version.major < 3 {
        ctx.illegal("saturate modifier requires vertex shader 3.0");
    }
    if partial_precision && version.is_vertex() {
        ctx.illegal("partial precision modifier in vertex shader");
    }
    if centroid && !in_dcl && !version.is_pixel() {
        ctx.illegal("centroid modifier is only allowed on pixel shader declarations");
    }

    Ok(DstOperand {
        reg,
        mask,
        saturate,
        partial_precision,
        centroid,
        shift,
        relative,
    })
}

fn decode_src(ctx: &mut Context, stream: &mut TokenStream<'_>) -> Result<SrcOperand, ShaderError> {
    let token = stream.next()?;
    check_param_bits(ctx, token, "source");
    let reg = decode_register(ctx, token, RegRole::Src);

    let relative = if token & RELATIVE != 0 {
        Some(decode_relative(ctx, stream)?)
    } else {
        None
    };

    let mut swizzle = Swizzle::from_bits(token >> SWIZZLE_SHIFT);
    if reg.kind.is_scalar(ctx.version.stage, reg.index) {
        swizzle = Swizzle::replicate(Component::X);
    }

    let raw_mod = (token >> SRCMOD_SHIFT) & 0xF;
    let modifier = match SrcModifier::from_raw(raw_mod) {
        Some(m) => m,
        None => {
            ctx.malformed(format!("unknown source modifier {raw_mod}"));
            SrcModifier::None
        }
    };
    check_src_modifier(ctx, modifier, reg);

    Ok(SrcOperand {
        reg,
        swizzle,
        modifier,
        relative,
    })
}

fn check_src_modifier(ctx: &mut Context, modifier: SrcModifier, reg: Register) {
    let version = ctx.version;
    let allowed = match modifier {
        SrcModifier::None | SrcModifier::Negate => true,
        SrcModifier::Not => matches!(reg.kind, RegisterKind::ConstBool | RegisterKind::Predicate),
        SrcModifier::Abs | SrcModifier::AbsNegate => {
            if version.is_vertex() {
                version.major >= 3
            } else {
                version.major >= 2
            }
        }
        SrcModifier::X2 | SrcModifier::X2Negate | SrcModifier::DivideByZ | SrcModifier::DivideByW => {
            version.is_legacy_pixel() && version.at_least(1, 4)
        }
        _ => version.is_legacy_pixel(),
    };
    if !allowed {
        ctx.illegal(format!(
            "source modifier '{}' is not allowed in {version}",
            modifier.name()
        ));
    }
}

fn decode_predicate(
    ctx: &mut Context,
    stream: &mut TokenStream<'_>,
) -> Result<SrcOperand, ShaderError> {
    // Scalar registers come back from `decode_src` replicated, so check the encoded swizzle.
    let raw_swizzle = stream.peek().map(|token| Swizzle::from_bits(token >> SWIZZLE_SHIFT));
    let pred = decode_src(ctx, stream)?;
    if pred.reg.kind != RegisterKind::Predicate {
        ctx.illegal(format!("predicate operand must be p0, not {}", pred.reg));
    }
    if !matches!(pred.modifier, SrcModifier::None | SrcModifier::Not) {
        ctx.illegal("predicate operand only allows the not modifier");
    }
    let swizzle = raw_swizzle.unwrap_or(pred.swizzle);
    if !swizzle.is_identity() && !swizzle.is_replicated() {
        ctx.illegal("predicate swizzle must be identity or replicated");
    }
    if pred.relative.is_some() {
        ctx.illegal("predicate operand cannot be relatively addressed");
    }
    Ok(pred)
}

fn decode_declaration(ctx: &mut Context, token: u32, dst: &DstOperand) -> Declaration {
    if token & PARAM_BIT == 0 {
        ctx.malformed("reserved bit #31 in declaration token must be one");
    }
    if token & DCL_RESERVED != 0 {
        ctx.malformed("reserved bits in declaration token must be zero");
    }
    match dst.reg.kind {
        RegisterKind::Sampler => {
            let raw = (token >> DCL_TEXTURE_SHIFT) & DCL_TEXTURE_MASK;
            match TextureType::from_raw(raw) {
                Some(ty) => Declaration::Sampler(ty),
                None => {
                    ctx.illegal(format!("unknown sampler texture type {raw}"));
                    Declaration::Sampler(TextureType::Texture2D)
                }
            }
        }
        RegisterKind::Input | RegisterKind::Output
            if ctx.version.is_vertex() || ctx.version.major >= 3 =>
        {
            let raw = token & DCL_USAGE_MASK;
            let index = (token >> DCL_INDEX_SHIFT) & DCL_INDEX_MASK;
            match Usage::from_raw(raw) {
                Some(usage) => Declaration::Usage { usage, index },
                None => {
                    ctx.illegal(format!("unknown declaration usage {raw}"));
                    Declaration::Plain
                }
            }
        }
        _ => Declaration::Plain,
    }
}

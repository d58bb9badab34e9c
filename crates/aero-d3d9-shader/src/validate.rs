//! Per-opcode legality rules and context state updates.
//!
//! [`validate`] runs once per decoded instruction before the backend sees it. Rules never abort;
//! they record diagnostics and leave the context in a state that lets later independent errors
//! surface.

use crate::context::{Block, Context, PadRow, PadState};
use crate::diagnostics::ShaderError;
use crate::limits::MAX_CONTROL_FLOW_NESTING;
use crate::opcode::Opcode;
use crate::token::{Fused, Instruction};
use crate::types::{
    Comparison, Declaration, LiteralValue, Register, RegisterKind, SrcModifier, SrcOperand,
    WriteMask,
};

pub fn validate(ctx: &mut Context, inst: &mut Instruction) {
    let op = inst.opcode;
    let version = ctx.version;
    let name = inst.name(&version);

    if !op.allowed_in(&version) {
        ctx.error(ShaderError::OpcodeNotAllowed {
            opcode: name,
            target: version.to_string(),
        });
    }
    if inst.coissue && !(version.is_legacy_pixel() && inst.predicate.is_none()) {
        ctx.illegal("co-issue is only allowed in non-predicated pixel shaders below 2.0");
    }
    if inst.predicate.is_some() && version.major < 2 {
        ctx.illegal("predication requires shader model 2.0 or newer");
    }
    if !uses_control(op) && inst.control != 0 {
        ctx.malformed(format!("{name} has unexpected control bits 0x{:02x}", inst.control));
    }

    match op {
        Opcode::Def | Opcode::DefI | Opcode::DefB => {
            define_literal(ctx, inst);
            return;
        }
        Opcode::Dcl => {
            declare(ctx, inst);
            return;
        }
        _ => {}
    }

    if !op.is_declarative() {
        ctx.instructions_started = true;
    }

    check_operand_kinds(ctx, inst);

    match op {
        Opcode::Nop
        | Opcode::Add
        | Opcode::Sub
        | Opcode::Mad
        | Opcode::Mul
        | Opcode::Dp3
        | Opcode::Dp4
        | Opcode::Min
        | Opcode::Max
        | Opcode::Slt
        | Opcode::Sge
        | Opcode::Lit
        | Opcode::Dst
        | Opcode::Lrp
        | Opcode::Frc
        | Opcode::Sgn
        | Opcode::Abs
        | Opcode::Nrm
        | Opcode::Cmp
        | Opcode::Dsx
        | Opcode::Dsy => {}
        Opcode::Mov => {
            if version.is_vertex()
                && version.major >= 2
                && inst.dst().is_some_and(|d| d.reg.kind == RegisterKind::Address)
            {
                ctx.illegal("the address register must be written with MOVA in shader model 2.0+");
            }
        }
        Opcode::Mova => {
            if inst.dst().is_some_and(|d| d.reg.kind != RegisterKind::Address) {
                ctx.illegal("MOVA must write the address register");
            }
        }
        Opcode::Rcp
        | Opcode::Rsq
        | Opcode::Exp
        | Opcode::Log
        | Opcode::ExpP
        | Opcode::LogP => require_replicate(ctx, inst, name, 0),
        Opcode::Pow => {
            require_replicate(ctx, inst, name, 0);
            require_replicate(ctx, inst, name, 1);
        }
        Opcode::Dp2Add => require_replicate(ctx, inst, name, 2),
        Opcode::M4x4 | Opcode::M3x4 => require_mask(ctx, inst, name, WriteMask::XYZW, ".xyzw"),
        Opcode::M4x3 | Opcode::M3x3 => require_mask(ctx, inst, name, WriteMask::XYZ, ".xyz"),
        Opcode::M3x2 => require_mask(ctx, inst, name, WriteMask::XY, ".xy"),
        Opcode::SinCos => {
            let mask = inst.dst().map(|d| d.mask).unwrap_or(WriteMask::X);
            if mask != WriteMask::X && mask != WriteMask::Y && mask != WriteMask::XY {
                ctx.error(ShaderError::WriteMask {
                    opcode: name,
                    expected: ".x, .y or .xy",
                });
            }
            require_replicate(ctx, inst, name, 0);
        }
        Opcode::Crs => {
            if inst.dst().is_some_and(|d| d.mask.contains(WriteMask::W)) {
                ctx.error(ShaderError::WriteMask {
                    opcode: name,
                    expected: "a subset of .xyz",
                });
            }
        }
        Opcode::Cnd => {
            if !version.at_least(1, 4) {
                let ok = inst.src(0).is_some_and(|s| {
                    s.reg == Register::new(RegisterKind::Temp, 0)
                        && s.swizzle.is_replicated()
                        && s.scalar_component() == crate::types::Component::W
                });
                if !ok {
                    ctx.illegal("CND src0 must be r0.a below pixel shader 1.4");
                }
            }
        }
        Opcode::Call => call(ctx, inst),
        Opcode::CallNz => {
            call(ctx, inst);
            require_condition(ctx, inst, name, 1);
        }
        Opcode::Label => label(ctx, inst),
        Opcode::Ret => {
            if ctx.nesting.total() > 0 {
                ctx.illegal("RET inside an open control-flow block");
            }
            if ctx.subroutine.take().is_none() {
                ctx.main_returned = true;
            }
        }
        Opcode::Loop => {
            require_src_kind(ctx, inst, name, 0, &[RegisterKind::Loop]);
            require_src_kind(ctx, inst, name, 1, &[RegisterKind::ConstInt]);
            open_block(ctx, Block::Loop);
        }
        Opcode::EndLoop => close_block(ctx, "ENDLOOP", "LOOP"),
        Opcode::Rep => {
            require_src_kind(ctx, inst, name, 0, &[RegisterKind::ConstInt]);
            open_block(ctx, Block::Rep);
        }
        Opcode::EndRep => close_block(ctx, "ENDREP", "REP"),
        Opcode::If => {
            require_condition(ctx, inst, name, 0);
            open_block(ctx, Block::If { else_seen: false });
        }
        Opcode::Ifc => {
            require_comparison(ctx, inst, name);
            open_block(ctx, Block::If { else_seen: false });
        }
        Opcode::Else => match ctx.blocks.last().copied() {
            None => ctx.error(ShaderError::Unbalanced {
                open: "ELSE",
                close: "IF",
            }),
            Some(Block::If { else_seen: true }) => ctx.illegal("ELSE follows another ELSE"),
            Some(Block::If { else_seen: false }) => {
                if let Some(top) = ctx.blocks.last_mut() {
                    *top = Block::If { else_seen: true };
                }
            }
            Some(open) => ctx.error(ShaderError::MismatchedBlock {
                close: "ELSE",
                open: open.name(),
            }),
        },
        Opcode::EndIf => close_block(ctx, "ENDIF", "IF"),
        Opcode::Break => require_breakable(ctx),
        Opcode::BreakC => {
            require_comparison(ctx, inst, name);
            require_breakable(ctx);
        }
        Opcode::BreakP => {
            require_src_kind(ctx, inst, name, 0, &[RegisterKind::Predicate]);
            require_replicate(ctx, inst, name, 0);
            require_breakable(ctx);
        }
        Opcode::Setp => {
            require_comparison(ctx, inst, name);
            if inst.dst().is_some_and(|d| d.reg.kind != RegisterKind::Predicate) {
                ctx.illegal("SETP must write a predicate register");
            }
        }
        Opcode::Tex => texld(ctx, inst, name),
        Opcode::TexLdl | Opcode::TexLdd => {
            require_src_kind(ctx, inst, name, 1, &[RegisterKind::Sampler]);
        }
        Opcode::TexKill => {
            if inst
                .dst()
                .is_some_and(|d| !matches!(d.reg.kind, RegisterKind::Temp | RegisterKind::Texture))
            {
                ctx.illegal("TEXKILL operand must be a temp or texture register");
            }
        }
        Opcode::TexCoord => {
            if version.at_least(1, 4) {
                require_dst_kind(ctx, inst, name, RegisterKind::Temp);
                require_src_kind(ctx, inst, name, 0, &[RegisterKind::Texture]);
            } else {
                require_dst_kind(ctx, inst, name, RegisterKind::Texture);
            }
        }
        Opcode::TexBem
        | Opcode::TexBemL
        | Opcode::TexReg2Ar
        | Opcode::TexReg2Gb
        | Opcode::TexReg2Rgb
        | Opcode::TexDp3
        | Opcode::TexDp3Tex => {
            legacy_texture_operands(ctx, inst, name);
            if matches!(op, Opcode::TexBem | Opcode::TexBemL) {
                if let Some(d) = inst.dst() {
                    ctx.texbem_samplers.insert(d.reg.index);
                }
            }
        }
        Opcode::TexM3x2Pad => {
            legacy_texture_operands(ctx, inst, name);
            if let Some(row) = pad_row(inst) {
                ctx.pad = PadState::M3x2(row);
            }
        }
        Opcode::TexM3x3Pad => {
            legacy_texture_operands(ctx, inst, name);
            if let Some(row) = pad_row(inst) {
                ctx.pad = match ctx.pad {
                    PadState::M3x3First(first) => PadState::M3x3Second(first, row),
                    _ => PadState::M3x3First(row),
                };
            }
        }
        Opcode::TexM3x2Tex | Opcode::TexM3x2Depth => {
            legacy_texture_operands(ctx, inst, name);
            inst.fused = match std::mem::take(&mut ctx.pad) {
                PadState::M3x2(row) => {
                    check_pad_chain(ctx, inst, name, &[row]);
                    Fused::M3x2(row)
                }
                _ => Fused::Skip,
            };
        }
        Opcode::TexM3x3Tex | Opcode::TexM3x3Spec | Opcode::TexM3x3VSpec | Opcode::TexM3x3 => {
            legacy_texture_operands(ctx, inst, name);
            inst.fused = match std::mem::take(&mut ctx.pad) {
                PadState::M3x3Second(first, second) => {
                    check_pad_chain(ctx, inst, name, &[first, second]);
                    Fused::M3x3(first, second)
                }
                _ => Fused::Skip,
            };
        }
        Opcode::TexDepth => require_dst_kind(ctx, inst, name, RegisterKind::Temp),
        Opcode::Bem => {
            require_dst_kind(ctx, inst, name, RegisterKind::Temp);
            require_mask(ctx, inst, name, WriteMask::XY, ".xy");
            if let Some(d) = inst.dst() {
                ctx.texbem_samplers.insert(d.reg.index);
            }
        }
        Opcode::Def | Opcode::DefI | Opcode::DefB | Opcode::Dcl => {}
    }

    if inst.fused != Fused::Skip {
        record_usage(ctx, inst);
        ctx.instruction_count += op.info().slots;
    }
}

fn uses_control(op: Opcode) -> bool {
    matches!(
        op,
        Opcode::Tex | Opcode::Ifc | Opcode::BreakC | Opcode::Setp
    )
}

fn define_literal(ctx: &mut Context, inst: &Instruction) {
    let op = inst.opcode;
    let Some(dst) = inst.dst else {
        return;
    };
    if ctx.instructions_started {
        ctx.error(ShaderError::LiteralAfterInstruction { opcode: op.name() });
        return;
    }
    let (kind, value) = match op {
        Opcode::Def => (
            RegisterKind::Const,
            LiteralValue::Float(inst.literal.map(f32::from_bits)),
        ),
        Opcode::DefI => (
            RegisterKind::ConstInt,
            LiteralValue::Int(inst.literal.map(|w| w as i32)),
        ),
        _ => (RegisterKind::ConstBool, LiteralValue::Bool(inst.literal[0] != 0)),
    };
    if dst.reg.kind != kind {
        ctx.illegal(format!(
            "{} must target a {} register, not {}",
            op.name(),
            kind.asm_name(0).trim_end_matches('0'),
            dst.reg
        ));
        return;
    }
    ctx.literals.define(dst.reg.index, value);
}

fn declare(ctx: &mut Context, inst: &Instruction) {
    let (Some(dst), Some(declaration)) = (inst.dst, inst.declaration) else {
        return;
    };
    let version = ctx.version;
    let reg = dst.reg;
    let legal = match reg.kind {
        RegisterKind::Input => true,
        RegisterKind::Output => version.is_vertex() && version.major >= 3,
        RegisterKind::Sampler => version.is_pixel() || version.major >= 3,
        RegisterKind::Texture => version.is_pixel() && version.major < 3,
        RegisterKind::MiscType => version.is_pixel() && version.major >= 3,
        _ => false,
    };
    if !legal {
        ctx.illegal(format!("cannot declare {reg} in {version}"));
        return;
    }
    if ctx.declarations.contains_key(&reg) {
        ctx.illegal(format!("{reg} declared more than once"));
        return;
    }
    if let Declaration::Usage { usage, index } = declaration {
        let clash = ctx.declarations.iter().any(|(r, d)| {
            r.kind == reg.kind
                && matches!(d.declaration, Declaration::Usage { usage: u, index: i } if u == usage && i == index)
        });
        if clash {
            ctx.illegal(format!(
                "{reg}: usage {}{index} declared more than once",
                usage.name()
            ));
        }
    }
    ctx.declarations.insert(
        reg,
        crate::context::DeclaredRegister {
            declaration,
            centroid: dst.centroid,
        },
    );
    ctx.use_register(reg);
}

fn check_operand_kinds(ctx: &mut Context, inst: &Instruction) {
    let op = inst.opcode;
    let version = ctx.version;
    let reads_dst = matches!(
        op,
        Opcode::TexKill | Opcode::TexM3x2Pad | Opcode::TexM3x3Pad
    );
    if let Some(dst) = inst.dst() {
        let writable = match dst.reg.kind {
            RegisterKind::Temp
            | RegisterKind::Address
            | RegisterKind::RastOut
            | RegisterKind::AttrOut
            | RegisterKind::TexCrdOut
            | RegisterKind::Output
            | RegisterKind::ColorOut
            | RegisterKind::DepthOut
            | RegisterKind::Predicate => true,
            RegisterKind::Texture => version.is_legacy_pixel(),
            _ => false,
        };
        if !writable && !reads_dst {
            ctx.illegal(format!("cannot write to {}", dst.reg));
        }
    }
    let takes_sampler = matches!(op, Opcode::Tex | Opcode::TexLdl | Opcode::TexLdd);
    let takes_label = matches!(op, Opcode::Call | Opcode::CallNz | Opcode::Label);
    for (i, src) in inst.src.iter().enumerate() {
        let ok = match src.reg.kind {
            RegisterKind::Sampler => takes_sampler && i == 1,
            RegisterKind::Label => takes_label && i == 0,
            k if k.is_output() => false,
            _ => true,
        };
        if !ok {
            ctx.illegal(format!("{} cannot be used as a source here", src.reg));
        }
    }
}

fn require_replicate(ctx: &mut Context, inst: &Instruction, name: &'static str, operand: usize) {
    if inst.src(operand).is_some_and(|s| !s.swizzle.is_replicated()) {
        ctx.error(ShaderError::ReplicateSwizzle {
            opcode: name,
            operand,
        });
    }
}

fn require_mask(
    ctx: &mut Context,
    inst: &Instruction,
    name: &'static str,
    mask: WriteMask,
    expected: &'static str,
) {
    if inst.dst().is_some_and(|d| d.mask != mask) {
        ctx.error(ShaderError::WriteMask {
            opcode: name,
            expected,
        });
    }
}

fn require_dst_kind(ctx: &mut Context, inst: &Instruction, name: &str, kind: RegisterKind) {
    if let Some(d) = inst.dst() {
        if d.reg.kind != kind {
            ctx.illegal(format!(
                "{name} destination must be a {} register, not {}",
                kind.asm_name(0).trim_end_matches('0'),
                d.reg
            ));
        }
    }
}

fn require_src_kind(
    ctx: &mut Context,
    inst: &Instruction,
    name: &str,
    operand: usize,
    kinds: &[RegisterKind],
) {
    if let Some(s) = inst.src(operand) {
        if !kinds.contains(&s.reg.kind) {
            ctx.illegal(format!("{name} source {operand} cannot be {}", s.reg));
        }
    }
}

/// `if`/`callnz` conditions: a bool constant or a replicated predicate.
fn require_condition(ctx: &mut Context, inst: &Instruction, name: &'static str, operand: usize) {
    require_src_kind(
        ctx,
        inst,
        name,
        operand,
        &[RegisterKind::ConstBool, RegisterKind::Predicate],
    );
    if inst
        .src(operand)
        .is_some_and(|s| s.reg.kind == RegisterKind::Predicate)
    {
        require_replicate(ctx, inst, name, operand);
    }
}

fn require_comparison(ctx: &mut Context, inst: &Instruction, name: &str) {
    if Comparison::from_raw(inst.control).is_none() {
        ctx.illegal(format!("{name} has unknown comparison {}", inst.control));
    }
}

fn require_breakable(ctx: &mut Context) {
    if !ctx.nesting.in_loop_or_rep() {
        ctx.illegal("BREAK outside LOOP/ENDLOOP or REP/ENDREP");
    }
}

fn open_block(ctx: &mut Context, block: Block) {
    if ctx.nesting.total() >= MAX_CONTROL_FLOW_NESTING {
        ctx.illegal(format!(
            "control flow nested deeper than {MAX_CONTROL_FLOW_NESTING}"
        ));
    }
    match block {
        Block::Loop => ctx.nesting.loops += 1,
        Block::Rep => ctx.nesting.reps += 1,
        Block::If { .. } => ctx.nesting.ifs += 1,
    }
    ctx.blocks.push(block);
}

/// Closes the innermost block if it was opened by `opener`. A block of another kind stays open.
fn close_block(ctx: &mut Context, closer: &'static str, opener: &'static str) {
    let Some(top) = ctx.blocks.last().copied() else {
        ctx.error(ShaderError::Unbalanced {
            open: closer,
            close: opener,
        });
        return;
    };
    if top.name() != opener {
        ctx.error(ShaderError::MismatchedBlock {
            close: closer,
            open: top.name(),
        });
        return;
    }
    ctx.blocks.pop();
    match top {
        Block::Loop => ctx.nesting.loops -= 1,
        Block::Rep => ctx.nesting.reps -= 1,
        Block::If { .. } => ctx.nesting.ifs -= 1,
    }
}

/// `aL` is visible at a call site inside a `loop`, or inside a subroutine that itself receives it.
pub(crate) fn loop_counter_in_scope(ctx: &Context) -> bool {
    ctx.nesting.loops > 0
        || ctx
            .subroutine
            .and_then(|l| ctx.labels.get(&l))
            .and_then(|info| info.called_in_loop)
            .unwrap_or(false)
}

fn label_index(ctx: &mut Context, inst: &Instruction, name: &str) -> Option<u32> {
    let src = inst.src(0)?;
    if src.reg.kind != RegisterKind::Label {
        ctx.illegal(format!("{name} target must be a label, not {}", src.reg));
        return None;
    }
    Some(src.reg.index)
}

fn call(ctx: &mut Context, inst: &Instruction) {
    let name = inst.opcode.name();
    let Some(index) = label_index(ctx, inst, name) else {
        return;
    };
    let in_loop = loop_counter_in_scope(ctx);
    let entry = ctx.labels.entry(index).or_default();
    match entry.called_in_loop {
        None => entry.called_in_loop = Some(in_loop),
        Some(prev) if prev != in_loop => {
            let message = if prev {
                "CALL to this label must be wrapped in LOOP/ENDLOOP"
            } else {
                "CALL to this label must not be wrapped in LOOP/ENDLOOP"
            };
            ctx.illegal(message);
        }
        Some(_) => {}
    }
}

fn label(ctx: &mut Context, inst: &Instruction) {
    let Some(index) = label_index(ctx, inst, "LABEL") else {
        return;
    };
    if ctx.nesting.total() > 0 {
        ctx.illegal("LABEL inside an open control-flow block");
    }
    if !ctx.main_returned {
        ctx.illegal("LABEL must follow the RET ending the main program");
    }
    if let Some(open) = ctx.subroutine {
        ctx.illegal(format!("LABEL l{index} before RET of subroutine l{open}"));
    }
    if ctx.labels.get(&index).is_some_and(|l| l.defined) {
        ctx.illegal(format!("label l{index} defined more than once"));
    }
    ctx.labels.entry(index).or_default().defined = true;
    ctx.subroutine = Some(index);
    ctx.pad = PadState::Idle;
}

fn texld(ctx: &mut Context, inst: &Instruction, name: &str) {
    let version = ctx.version;
    if version.is_legacy_pixel() {
        if inst.control != 0 {
            ctx.illegal(format!("{name} takes no control bits below pixel shader 2.0"));
        }
        if version.at_least(1, 4) {
            require_dst_kind(ctx, inst, name, RegisterKind::Temp);
            let kinds: &[RegisterKind] = if ctx.phase_seen {
                &[RegisterKind::Texture, RegisterKind::Temp]
            } else {
                &[RegisterKind::Texture]
            };
            require_src_kind(ctx, inst, name, 0, kinds);
        } else {
            require_dst_kind(ctx, inst, name, RegisterKind::Texture);
        }
        return;
    }
    if inst.control > 2 {
        ctx.illegal(format!("{name} has unknown control {}", inst.control));
    }
    require_src_kind(ctx, inst, name, 1, &[RegisterKind::Sampler]);
}

/// `texbem t1, t0` style operands: both texture registers, source before destination.
fn legacy_texture_operands(ctx: &mut Context, inst: &Instruction, name: &str) {
    require_dst_kind(ctx, inst, name, RegisterKind::Texture);
    let (Some(dst), Some(src)) = (inst.dst(), inst.src(0)) else {
        return;
    };
    if src.reg.kind != RegisterKind::Texture {
        ctx.illegal(format!("{name} source must be a texture register, not {}", src.reg));
    } else if src.reg.index >= dst.reg.index {
        ctx.illegal(format!(
            "{name} source {} must come before destination {}",
            src.reg, dst.reg
        ));
    }
}

fn pad_row(inst: &Instruction) -> Option<PadRow> {
    Some(PadRow {
        texcoord: inst.dst()?.reg.index,
        src: *inst.src(0)?,
    })
}

fn check_pad_chain(ctx: &mut Context, inst: &Instruction, name: &str, rows: &[PadRow]) {
    let (Some(dst), Some(src)) = (inst.dst(), inst.src(0)) else {
        return;
    };
    for (i, row) in rows.iter().enumerate() {
        let expected = dst.reg.index.checked_sub((rows.len() - i) as u32);
        if expected != Some(row.texcoord) {
            ctx.illegal(format!(
                "{name} destination t{} must directly follow its pad rows",
                dst.reg.index
            ));
            return;
        }
        if row.src.reg != src.reg {
            ctx.illegal(format!("{name} must use the same source as its pad rows"));
            return;
        }
    }
}

fn record_source(ctx: &mut Context, src: &SrcOperand) {
    ctx.mark_read(src.reg);
    if let Some(rel) = src.relative {
        ctx.mark_read(rel.reg);
        if src.reg.kind.is_constant() {
            ctx.relative_kinds.insert(src.reg.kind);
            ctx.finalize_constants();
        }
    }
}

fn record_usage(ctx: &mut Context, inst: &Instruction) {
    let op = inst.opcode;
    let version = ctx.version;

    match op {
        Opcode::Call | Opcode::Label => return,
        Opcode::CallNz => {
            if let Some(cond) = inst.src(1) {
                record_source(ctx, cond);
            }
            return;
        }
        _ => {}
    }

    if let Some(pred) = &inst.predicate {
        ctx.mark_read(pred.reg);
    }
    for src in &inst.src {
        record_source(ctx, src);
    }

    // Matrix instructions read consecutive rows starting at src1.
    let rows = match op {
        Opcode::M4x4 | Opcode::M3x4 => 4,
        Opcode::M4x3 | Opcode::M3x3 => 3,
        Opcode::M3x2 => 2,
        _ => 0,
    };
    if let Some(matrix) = inst.src(1) {
        for row in 1..rows {
            ctx.mark_read(Register::new(matrix.reg.kind, matrix.reg.index + row));
        }
    }

    if let Some(dst) = inst.dst() {
        if let Some(rel) = dst.relative {
            ctx.mark_read(rel.reg);
        }
        match op {
            Opcode::TexKill | Opcode::TexM3x2Pad | Opcode::TexM3x3Pad => ctx.mark_read(dst.reg),
            Opcode::TexCoord if !version.at_least(1, 4) => {
                ctx.mark_read(dst.reg);
                ctx.mark_written(dst.reg);
            }
            _ => ctx.mark_written(dst.reg),
        }

        let implicit_sampler = match op {
            Opcode::Tex => version.is_legacy_pixel(),
            Opcode::TexBem
            | Opcode::TexBemL
            | Opcode::TexReg2Ar
            | Opcode::TexReg2Gb
            | Opcode::TexReg2Rgb
            | Opcode::TexDp3Tex
            | Opcode::TexM3x2Tex
            | Opcode::TexM3x3Tex
            | Opcode::TexM3x3Spec
            | Opcode::TexM3x3VSpec => true,
            _ => false,
        };
        if implicit_sampler {
            ctx.mark_read(Register::new(RegisterKind::Sampler, dst.reg.index));
        }
        if matches!(op, Opcode::TexM3x2Depth | Opcode::TexDepth) {
            ctx.mark_written(Register::new(RegisterKind::DepthOut, 0));
        }
        if matches!(op, Opcode::TexM3x2Tex | Opcode::TexM3x2Depth) {
            // The pad row's texcoord register is read when the idiom resolves.
            if let Fused::M3x2(row) = inst.fused {
                ctx.mark_read(Register::new(RegisterKind::Texture, row.texcoord));
            }
        }
    }

    if matches!(op, Opcode::Tex | Opcode::TexLdl | Opcode::TexLdd)
        && inst
            .src(0)
            .is_some_and(|s| matches!(s.modifier, SrcModifier::DivideByZ | SrcModifier::DivideByW))
        && !version.is_legacy_pixel()
    {
        ctx.illegal("projective source modifiers are only allowed in pixel shader 1.4");
    }
}

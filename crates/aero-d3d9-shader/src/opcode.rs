//! Static instruction table.
//!
//! Every opcode the encoding defines maps to a mnemonic, an operand shape, a slot estimate and the
//! version ranges in which each stage accepts it. The validator and the backends match on
//! [`Opcode`] exhaustively, so adding a variant here fails to build until both handle it.

use crate::types::{ShaderStage, ShaderVersion};

pub(crate) const OPCODE_COMMENT: u32 = 0xFFFE;
pub(crate) const OPCODE_PHASE: u32 = 0xFFFD;
pub(crate) const END_TOKEN: u32 = 0x0000_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Opcode {
    Nop,
    Mov,
    Add,
    Sub,
    Mad,
    Mul,
    Rcp,
    Rsq,
    Dp3,
    Dp4,
    Min,
    Max,
    Slt,
    Sge,
    Exp,
    Log,
    Lit,
    Dst,
    Lrp,
    Frc,
    M4x4,
    M4x3,
    M3x4,
    M3x3,
    M3x2,
    Call,
    CallNz,
    Loop,
    Ret,
    EndLoop,
    Label,
    Dcl,
    Pow,
    Crs,
    Sgn,
    Abs,
    Nrm,
    SinCos,
    Rep,
    EndRep,
    If,
    Ifc,
    Else,
    EndIf,
    Break,
    BreakC,
    Mova,
    DefB,
    DefI,
    TexCoord,
    TexKill,
    Tex,
    TexBem,
    TexBemL,
    TexReg2Ar,
    TexReg2Gb,
    TexM3x2Pad,
    TexM3x2Tex,
    TexM3x3Pad,
    TexM3x3Tex,
    TexM3x3Spec,
    TexM3x3VSpec,
    ExpP,
    LogP,
    Cnd,
    Def,
    TexReg2Rgb,
    TexDp3Tex,
    TexM3x2Depth,
    TexDp3,
    TexM3x3,
    TexDepth,
    Cmp,
    Bem,
    Dp2Add,
    Dsx,
    Dsy,
    TexLdd,
    Setp,
    TexLdl,
    BreakP,
}

/// How the operand tokens following an instruction token are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    None,
    /// One destination.
    D,
    /// One source.
    S,
    SS,
    DS,
    DSS,
    DSSS,
    DSSSS,
    /// Declaration token followed by a destination.
    Dcl,
    /// Destination followed by four literal words.
    Def,
    /// Destination followed by one literal word.
    DefB,
}

impl OperandShape {
    pub fn has_dst(self) -> bool {
        matches!(
            self,
            OperandShape::D
                | OperandShape::DS
                | OperandShape::DSS
                | OperandShape::DSSS
                | OperandShape::DSSSS
                | OperandShape::Dcl
                | OperandShape::Def
                | OperandShape::DefB
        )
    }

    pub fn src_count(self) -> usize {
        match self {
            OperandShape::S | OperandShape::DS => 1,
            OperandShape::SS | OperandShape::DSS => 2,
            OperandShape::DSSS => 3,
            OperandShape::DSSSS => 4,
            _ => 0,
        }
    }
}

/// Inclusive `(major, minor)` version range in which a stage accepts an opcode.
pub type VersionRange = ((u8, u8), (u8, u8));

const ALL: Option<VersionRange> = Some(((1, 0), (3, 0)));
const SM2: Option<VersionRange> = Some(((2, 0), (3, 0)));
const SM2X: Option<VersionRange> = Some(((2, 1), (3, 0)));
const SM3: Option<VersionRange> = Some(((3, 0), (3, 0)));
const PS12: Option<VersionRange> = Some(((1, 2), (3, 0)));
const PS1: Option<VersionRange> = Some(((1, 0), (1, 4)));
const PS13: Option<VersionRange> = Some(((1, 0), (1, 3)));
const PS12_13: Option<VersionRange> = Some(((1, 2), (1, 3)));
const PS14: Option<VersionRange> = Some(((1, 4), (1, 4)));
const NEVER: Option<VersionRange> = None;

#[derive(Debug, Clone, Copy)]
pub struct InstructionInfo {
    pub mnemonic: &'static str,
    pub shape: OperandShape,
    /// Estimated instruction slots consumed.
    pub slots: u32,
    pub vertex: Option<VersionRange>,
    pub pixel: Option<VersionRange>,
}

const fn info(
    mnemonic: &'static str,
    shape: OperandShape,
    slots: u32,
    vertex: Option<VersionRange>,
    pixel: Option<VersionRange>,
) -> InstructionInfo {
    InstructionInfo {
        mnemonic,
        shape,
        slots,
        vertex,
        pixel,
    }
}

impl Opcode {
    pub fn from_raw(raw: u32) -> Option<Self> {
        use Opcode::*;
        Some(match raw {
            0 => Nop,
            1 => Mov,
            2 => Add,
            3 => Sub,
            4 => Mad,
            5 => Mul,
            6 => Rcp,
            7 => Rsq,
            8 => Dp3,
            9 => Dp4,
            10 => Min,
            11 => Max,
            12 => Slt,
            13 => Sge,
            14 => Exp,
            15 => Log,
            16 => Lit,
            17 => Dst,
            18 => Lrp,
            19 => Frc,
            20 => M4x4,
            21 => M4x3,
            22 => M3x4,
            23 => M3x3,
            24 => M3x2,
            25 => Call,
            26 => CallNz,
            27 => Loop,
            28 => Ret,
            29 => EndLoop,
            30 => Label,
            31 => Dcl,
            32 => Pow,
            33 => Crs,
            34 => Sgn,
            35 => Abs,
            36 => Nrm,
            37 => SinCos,
            38 => Rep,
            39 => EndRep,
            40 => If,
            41 => Ifc,
            42 => Else,
            43 => EndIf,
            44 => Break,
            45 => BreakC,
            46 => Mova,
            47 => DefB,
            48 => DefI,
            64 => TexCoord,
            65 => TexKill,
            66 => Tex,
            67 => TexBem,
            68 => TexBemL,
            69 => TexReg2Ar,
            70 => TexReg2Gb,
            71 => TexM3x2Pad,
            72 => TexM3x2Tex,
            73 => TexM3x3Pad,
            74 => TexM3x3Tex,
            76 => TexM3x3Spec,
            77 => TexM3x3VSpec,
            78 => ExpP,
            79 => LogP,
            80 => Cnd,
            81 => Def,
            82 => TexReg2Rgb,
            83 => TexDp3Tex,
            84 => TexM3x2Depth,
            85 => TexDp3,
            86 => TexM3x3,
            87 => TexDepth,
            88 => Cmp,
            89 => Bem,
            90 => Dp2Add,
            91 => Dsx,
            92 => Dsy,
            93 => TexLdd,
            94 => Setp,
            95 => TexLdl,
            96 => BreakP,
            _ => return None,
        })
    }

    pub fn info(self) -> InstructionInfo {
        use OperandShape as S;
        match self {
            Opcode::Nop => info("nop", S::None, 0, ALL, ALL),
            Opcode::Mov => info("mov", S::DS, 1, ALL, ALL),
            Opcode::Add => info("add", S::DSS, 1, ALL, ALL),
            Opcode::Sub => info("sub", S::DSS, 1, ALL, ALL),
            Opcode::Mad => info("mad", S::DSSS, 1, ALL, ALL),
            Opcode::Mul => info("mul", S::DSS, 1, ALL, ALL),
            Opcode::Rcp => info("rcp", S::DS, 1, ALL, SM2),
            Opcode::Rsq => info("rsq", S::DS, 1, ALL, SM2),
            Opcode::Dp3 => info("dp3", S::DSS, 1, ALL, ALL),
            Opcode::Dp4 => info("dp4", S::DSS, 1, ALL, PS12),
            Opcode::Min => info("min", S::DSS, 1, ALL, SM2),
            Opcode::Max => info("max", S::DSS, 1, ALL, SM2),
            Opcode::Slt => info("slt", S::DSS, 1, ALL, NEVER),
            Opcode::Sge => info("sge", S::DSS, 1, ALL, NEVER),
            Opcode::Exp => info("exp", S::DS, 10, ALL, SM2),
            Opcode::Log => info("log", S::DS, 10, ALL, SM2),
            Opcode::Lit => info("lit", S::DS, 3, ALL, NEVER),
            Opcode::Dst => info("dst", S::DSS, 1, ALL, SM2),
            Opcode::Lrp => info("lrp", S::DSSS, 2, SM2, ALL),
            Opcode::Frc => info("frc", S::DS, 3, ALL, SM2),
            Opcode::M4x4 => info("m4x4", S::DSS, 4, ALL, SM2),
            Opcode::M4x3 => info("m4x3", S::DSS, 3, ALL, SM2),
            Opcode::M3x4 => info("m3x4", S::DSS, 4, ALL, SM2),
            Opcode::M3x3 => info("m3x3", S::DSS, 3, ALL, SM2),
            Opcode::M3x2 => info("m3x2", S::DSS, 2, ALL, SM2),
            Opcode::Call => info("call", S::S, 2, SM2, SM2X),
            Opcode::CallNz => info("callnz", S::SS, 3, SM2, SM2X),
            Opcode::Loop => info("loop", S::SS, 3, SM2, SM3),
            Opcode::Ret => info("ret", S::None, 1, SM2, SM2X),
            Opcode::EndLoop => info("endloop", S::None, 2, SM2, SM3),
            Opcode::Label => info("label", S::S, 0, SM2, SM2X),
            Opcode::Dcl => info("dcl", S::Dcl, 0, ALL, SM2),
            Opcode::Pow => info("pow", S::DSS, 3, SM2, SM2),
            Opcode::Crs => info("crs", S::DSS, 2, SM2, SM2),
            Opcode::Sgn => info("sgn", S::DSSS, 3, SM2, NEVER),
            Opcode::Abs => info("abs", S::DS, 1, SM2, SM2),
            Opcode::Nrm => info("nrm", S::DS, 3, SM2, SM2),
            Opcode::SinCos => info("sincos", S::DSSS, 8, SM2, SM2),
            Opcode::Rep => info("rep", S::S, 3, SM2, SM2X),
            Opcode::EndRep => info("endrep", S::None, 2, SM2, SM2X),
            Opcode::If => info("if", S::S, 3, SM2, SM2X),
            Opcode::Ifc => info("ifc", S::SS, 3, SM2X, SM2X),
            Opcode::Else => info("else", S::None, 1, SM2, SM2X),
            Opcode::EndIf => info("endif", S::None, 1, SM2, SM2X),
            Opcode::Break => info("break", S::None, 1, SM2X, SM2X),
            Opcode::BreakC => info("breakc", S::SS, 3, SM2X, SM2X),
            Opcode::Mova => info("mova", S::DS, 1, SM2, NEVER),
            Opcode::DefB => info("defb", S::DefB, 0, SM2, SM2),
            Opcode::DefI => info("defi", S::Def, 0, SM2, SM2),
            Opcode::TexCoord => info("texcoord", S::D, 1, NEVER, PS1),
            Opcode::TexKill => info("texkill", S::D, 2, NEVER, ALL),
            Opcode::Tex => info("tex", S::D, 1, NEVER, ALL),
            Opcode::TexBem => info("texbem", S::DS, 2, NEVER, PS13),
            Opcode::TexBemL => info("texbeml", S::DS, 2, NEVER, PS13),
            Opcode::TexReg2Ar => info("texreg2ar", S::DS, 1, NEVER, PS13),
            Opcode::TexReg2Gb => info("texreg2gb", S::DS, 1, NEVER, PS13),
            Opcode::TexM3x2Pad => info("texm3x2pad", S::DS, 1, NEVER, PS13),
            Opcode::TexM3x2Tex => info("texm3x2tex", S::DS, 1, NEVER, PS13),
            Opcode::TexM3x3Pad => info("texm3x3pad", S::DS, 1, NEVER, PS13),
            Opcode::TexM3x3Tex => info("texm3x3tex", S::DS, 1, NEVER, PS13),
            Opcode::TexM3x3Spec => info("texm3x3spec", S::DSS, 1, NEVER, PS13),
            Opcode::TexM3x3VSpec => info("texm3x3vspec", S::DS, 1, NEVER, PS13),
            Opcode::ExpP => info("expp", S::DS, 1, ALL, NEVER),
            Opcode::LogP => info("logp", S::DS, 1, ALL, NEVER),
            Opcode::Cnd => info("cnd", S::DSSS, 1, NEVER, PS1),
            Opcode::Def => info("def", S::Def, 0, ALL, ALL),
            Opcode::TexReg2Rgb => info("texreg2rgb", S::DS, 1, NEVER, PS12_13),
            Opcode::TexDp3Tex => info("texdp3tex", S::DS, 1, NEVER, PS12_13),
            Opcode::TexM3x2Depth => info("texm3x2depth", S::DS, 1, NEVER, PS12_13),
            Opcode::TexDp3 => info("texdp3", S::DS, 1, NEVER, PS12_13),
            Opcode::TexM3x3 => info("texm3x3", S::DS, 1, NEVER, PS12_13),
            Opcode::TexDepth => info("texdepth", S::D, 1, NEVER, PS14),
            Opcode::Cmp => info("cmp", S::DSSS, 1, NEVER, PS12),
            Opcode::Bem => info("bem", S::DSS, 2, NEVER, PS14),
            Opcode::Dp2Add => info("dp2add", S::DSSS, 2, NEVER, SM2),
            Opcode::Dsx => info("dsx", S::DS, 2, NEVER, SM2X),
            Opcode::Dsy => info("dsy", S::DS, 2, NEVER, SM2X),
            Opcode::TexLdd => info("texldd", S::DSSSS, 3, NEVER, SM2X),
            Opcode::Setp => info("setp", S::DSS, 1, SM2X, SM2X),
            Opcode::TexLdl => info("texldl", S::DSS, 2, SM3, SM3),
            Opcode::BreakP => info("breakp", S::S, 3, SM2X, SM2X),
        }
    }

    pub fn name(self) -> &'static str {
        self.info().mnemonic
    }

    /// Operand layout for this opcode in `version`. A few instructions changed shape between
    /// shader models.
    pub fn shape(self, version: &ShaderVersion) -> OperandShape {
        match self {
            Opcode::SinCos if version.major >= 3 => OperandShape::DS,
            Opcode::Tex if version.is_legacy_pixel() => {
                if version.at_least(1, 4) {
                    OperandShape::DS
                } else {
                    OperandShape::D
                }
            }
            Opcode::Tex => OperandShape::DSS,
            Opcode::TexCoord if version.at_least(1, 4) => OperandShape::DS,
            _ => self.info().shape,
        }
    }

    /// `texld` family spelling, which depends on both model and control bits.
    pub fn display_name(self, version: &ShaderVersion, control: u8) -> &'static str {
        match self {
            Opcode::Tex if version.at_least(1, 4) => match control {
                1 => "texldp",
                2 => "texldb",
                _ => "texld",
            },
            Opcode::TexCoord if version.at_least(1, 4) => "texcrd",
            _ => self.name(),
        }
    }

    /// Literal definitions and declarations; they do not end the definition prologue.
    pub fn is_declarative(self) -> bool {
        matches!(
            self,
            Opcode::Def | Opcode::DefI | Opcode::DefB | Opcode::Dcl | Opcode::Nop
        )
    }

    pub fn allowed_in(self, version: &ShaderVersion) -> bool {
        let info = self.info();
        let range = match version.stage {
            ShaderStage::Vertex => info.vertex,
            ShaderStage::Pixel => info.pixel,
        };
        match range {
            Some((lo, hi)) => {
                let v = (version.major, version.minor);
                v >= lo && v <= hi
            }
            None => false,
        }
    }
}

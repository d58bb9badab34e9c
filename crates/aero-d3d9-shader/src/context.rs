//! Per-compile mutable state.

use std::collections::{BTreeMap, BTreeSet};

use crate::ctab::Symbol;
use crate::diagnostics::{DiagnosticPosition, Diagnostics, ShaderError};
use crate::emit::Output;
use crate::types::{
    Declaration, LiteralValue, Register, RegisterKind, ShaderVersion, SrcOperand,
};
use crate::CompileOptions;

/// What the compile has observed about one register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterUse {
    pub read: bool,
    pub written: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclaredRegister {
    pub declaration: Declaration,
    pub centroid: bool,
}

/// A literal constant defined by `def`, `defi` or `defb`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Literal {
    pub index: u32,
    pub value: LiteralValue,
}

/// Literal-constant table.
///
/// Entries are kept in definition order until [`LiteralTable::finalize`] sorts them by
/// `(kind, index)`; sorting happens at most once.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LiteralTable {
    entries: Vec<Literal>,
    sorted: bool,
}

impl LiteralTable {
    /// Inserts a literal. Redefining an index replaces the earlier value.
    pub fn define(&mut self, index: u32, value: LiteralValue) {
        let kind = value.kind();
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|l| l.index == index && l.value.kind() == kind)
        {
            existing.value = value;
            return;
        }
        self.entries.push(Literal { index, value });
        self.sorted = false;
    }

    pub fn get(&self, kind: RegisterKind, index: u32) -> Option<&Literal> {
        self.entries
            .iter()
            .find(|l| l.index == index && l.value.kind() == kind)
    }

    pub fn contains(&self, kind: RegisterKind, index: u32) -> bool {
        self.get(kind, index).is_some()
    }

    pub fn finalize(&mut self) {
        if self.sorted {
            return;
        }
        self.entries
            .sort_by_key(|l| (l.value.kind(), l.index));
        self.sorted = true;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Literal> {
        self.entries.iter()
    }

    pub fn of_kind(&self, kind: RegisterKind) -> impl Iterator<Item = &Literal> {
        self.entries.iter().filter(move |l| l.value.kind() == kind)
    }
}

/// One `texm*pad` row: the texture-coordinate register it owns and the vector it dots with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadRow {
    pub texcoord: u32,
    pub src: SrcOperand,
}

/// Progress through the legacy `texm3x2*`/`texm3x3*` pad sequences.
///
/// Resets when a terminating instruction consumes it or when a new subroutine starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PadState {
    #[default]
    Idle,
    M3x2(PadRow),
    M3x3First(PadRow),
    M3x3Second(PadRow, PadRow),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelInfo {
    /// Set by the first call site: whether it sat inside a `loop`.
    pub called_in_loop: Option<bool>,
    pub defined: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Nesting {
    pub loops: u32,
    pub reps: u32,
    pub ifs: u32,
}

/// An open `loop`, `rep` or `if` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Loop,
    Rep,
    If { else_seen: bool },
}

impl Block {
    pub fn name(self) -> &'static str {
        match self {
            Block::Loop => "LOOP",
            Block::Rep => "REP",
            Block::If { .. } => "IF",
        }
    }
}

impl Nesting {
    pub fn total(&self) -> u32 {
        self.loops + self.reps + self.ifs
    }

    pub fn in_loop_or_rep(&self) -> bool {
        self.loops + self.reps > 0
    }
}

pub struct Context {
    pub version: ShaderVersion,
    pub options: CompileOptions,
    pub diagnostics: Diagnostics,
    /// Byte offset of the unit being processed.
    pub offset: usize,
    pub registers: BTreeMap<Register, RegisterUse>,
    pub declarations: BTreeMap<Register, DeclaredRegister>,
    pub literals: LiteralTable,
    /// Constant kinds read through relative addressing.
    pub relative_kinds: BTreeSet<RegisterKind>,
    pub nesting: Nesting,
    /// Open blocks, innermost last. Kept in step with `nesting`.
    pub blocks: Vec<Block>,
    pub labels: BTreeMap<u32, LabelInfo>,
    /// Label of the subroutine currently being parsed.
    pub subroutine: Option<u32>,
    /// Set by the first instruction that is not a definition or declaration.
    pub instructions_started: bool,
    /// Set by a mainline `ret`.
    pub main_returned: bool,
    pub pad: PadState,
    pub phase_seen: bool,
    pub instruction_count: u32,
    /// Samplers used by `texbem`/`texbeml`/`bem`.
    pub texbem_samplers: BTreeSet<u32>,
    pub symbols: Vec<Symbol>,
    pub out: Output,
}

impl Context {
    pub fn new(version: ShaderVersion, options: &CompileOptions, diagnostics: Diagnostics) -> Self {
        Self {
            version,
            options: options.clone(),
            diagnostics,
            offset: 0,
            registers: BTreeMap::new(),
            declarations: BTreeMap::new(),
            literals: LiteralTable::default(),
            relative_kinds: BTreeSet::new(),
            nesting: Nesting::default(),
            blocks: Vec::new(),
            labels: BTreeMap::new(),
            subroutine: None,
            instructions_started: false,
            main_returned: false,
            pad: PadState::Idle,
            phase_seen: false,
            instruction_count: 0,
            texbem_samplers: BTreeSet::new(),
            symbols: Vec::new(),
            out: Output::new(options.buffer_block_size),
        }
    }

    pub fn failed(&self) -> bool {
        self.diagnostics.has_failed()
    }

    /// Records an error at the current unit.
    pub fn error(&mut self, error: ShaderError) {
        let position = DiagnosticPosition::Offset(self.offset);
        self.diagnostics.push(error, position);
    }

    pub fn error_at(&mut self, error: ShaderError, position: DiagnosticPosition) {
        self.diagnostics.push(error, position);
    }

    pub fn illegal(&mut self, message: impl Into<String>) {
        self.error(ShaderError::Illegal(message.into()));
    }

    pub fn malformed(&mut self, message: impl Into<String>) {
        self.error(ShaderError::Malformed(message.into()));
    }

    pub fn unsupported(&mut self, message: impl Into<String>) {
        self.error(ShaderError::Unsupported(message.into()));
    }

    /// Single entry point into the used-register map: inserts if absent, else returns the
    /// existing entry.
    pub fn use_register(&mut self, reg: Register) -> &mut RegisterUse {
        self.registers.entry(reg).or_default()
    }

    pub fn mark_read(&mut self, reg: Register) {
        self.use_register(reg).read = true;
    }

    pub fn mark_written(&mut self, reg: Register) {
        self.use_register(reg).written = true;
    }

    pub fn is_used(&self, reg: Register) -> bool {
        self.registers.contains_key(&reg)
    }

    pub fn was_written(&self, reg: Register) -> bool {
        self.registers.get(&reg).is_some_and(|u| u.written)
    }

    pub fn declaration(&self, reg: Register) -> Option<&DeclaredRegister> {
        self.declarations.get(&reg)
    }

    pub fn used_of_kind(&self, kind: RegisterKind) -> impl Iterator<Item = (Register, RegisterUse)> + '_ {
        self.registers
            .range(Register::new(kind, 0)..=Register::new(kind, u32::MAX))
            .map(|(r, u)| (*r, *u))
    }

    /// Sorts the literal table; the first relative constant read and end-of-compile both call
    /// this, and repeated calls are no-ops.
    pub fn finalize_constants(&mut self) {
        self.literals.finalize();
    }

    /// Highest index referenced for a constant kind, ignoring literal-backed registers.
    pub fn uniform_array_size(&self, kind: RegisterKind) -> u32 {
        if self.relative_kinds.contains(&kind) {
            let forced = crate::limits::relative_array_size(&self.version, kind);
            let highest = self
                .used_of_kind(kind)
                .map(|(r, _)| r.index + 1)
                .max()
                .unwrap_or(0);
            return forced.max(highest);
        }
        self.used_of_kind(kind)
            .filter(|(r, _)| !self.literals.contains(kind, r.index))
            .map(|(r, _)| r.index + 1)
            .max()
            .unwrap_or(0)
    }
}

//! Backend contract and the named output sections backends write into.

pub mod wgsl;

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::buffer::OutputBuffer;
use crate::context::Context;
use crate::token::Instruction;
use crate::types::ShaderStage;

/// Target shading languages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Profile {
    #[default]
    Wgsl,
}

impl Profile {
    pub fn name(self) -> &'static str {
        match self {
            Profile::Wgsl => "wgsl",
        }
    }
}

/// A code-generation backend.
///
/// The driver calls [`Emitter::start`] once after the version token, [`Emitter::emit`] for every
/// validated instruction while the compile has not failed, and [`Emitter::finish`] once at the
/// end to write declarations and close the entry point.
pub trait Emitter {
    fn profile(&self) -> Profile;

    fn entry_point(&self, stage: ShaderStage) -> &'static str;

    fn start(&mut self, ctx: &mut Context);

    fn emit(&mut self, ctx: &mut Context, inst: &Instruction);

    /// The ps_1_4 phase marker.
    fn phase(&mut self, ctx: &mut Context);

    fn finish(&mut self, ctx: &mut Context);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Preamble,
    Globals,
    Helpers,
    Subroutines,
    Prologue,
    Body,
    /// Text of uncalled subroutines; never part of the output.
    Discard,
}

impl Section {
    /// Concatenation order of the final source.
    pub const ORDER: [Section; 6] = [
        Section::Preamble,
        Section::Globals,
        Section::Helpers,
        Section::Subroutines,
        Section::Prologue,
        Section::Body,
    ];

    fn slot(self) -> usize {
        match self {
            Section::Preamble => 0,
            Section::Globals => 1,
            Section::Helpers => 2,
            Section::Subroutines => 3,
            Section::Prologue => 4,
            Section::Body => 5,
            Section::Discard => 6,
        }
    }
}

/// Active section plus indentation depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub section: Section,
    pub indent: usize,
}

/// The lazily allocated sections and the currently active scope.
#[derive(Debug)]
pub struct Output {
    block_size: usize,
    sections: [Option<OutputBuffer>; 7],
    current: Scope,
}

impl Output {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            sections: Default::default(),
            current: Scope {
                section: Section::Body,
                indent: 1,
            },
        }
    }

    #[cfg(test)]
    pub fn scope(&self) -> Scope {
        self.current
    }

    /// Switches to `section` at `indent`, returning the scope to restore with [`Output::pop`].
    pub fn push(&mut self, section: Section, indent: usize) -> Scope {
        std::mem::replace(&mut self.current, Scope { section, indent })
    }

    pub fn pop(&mut self, saved: Scope) {
        self.current = saved;
    }

    /// Scoped form of [`Output::push`]; the previous scope comes back when the guard drops.
    pub fn redirect(&mut self, section: Section, indent: usize) -> Redirect<'_> {
        let saved = self.push(section, indent);
        Redirect { out: self, saved }
    }

    pub fn indent(&mut self) {
        self.current.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.current.indent = self.current.indent.saturating_sub(1);
    }

    fn buffer(&mut self, section: Section) -> &mut OutputBuffer {
        let block_size = self.block_size;
        self.sections[section.slot()].get_or_insert_with(|| OutputBuffer::new(block_size))
    }

    /// Writes one indented line into the active section.
    pub fn line(&mut self, args: fmt::Arguments<'_>) {
        let Scope { section, indent } = self.current;
        let buf = self.buffer(section);
        for _ in 0..indent {
            buf.push_str("    ");
        }
        match args.as_str() {
            Some(text) => buf.push_str(text),
            None => buf.push_str(&fmt::format(args)),
        }
        buf.push_str("\n");
    }

    #[cfg(test)]
    pub fn section_text(&self, section: Section) -> String {
        self.sections[section.slot()]
            .as_ref()
            .map(OutputBuffer::flatten)
            .unwrap_or_default()
    }

    /// Concatenates the output sections in [`Section::ORDER`].
    pub fn assemble(&self) -> String {
        OutputBuffer::concat(
            Section::ORDER
                .iter()
                .filter_map(|s| self.sections[s.slot()].as_ref()),
        )
    }
}

/// Guard returned by [`Output::redirect`].
pub struct Redirect<'a> {
    out: &'a mut Output,
    saved: Scope,
}

impl Deref for Redirect<'_> {
    type Target = Output;

    fn deref(&self) -> &Output {
        self.out
    }
}

impl DerefMut for Redirect<'_> {
    fn deref_mut(&mut self) -> &mut Output {
        self.out
    }
}

impl Drop for Redirect<'_> {
    fn drop(&mut self) {
        self.out.pop(self.saved);
    }
}

/// `line!`-style helper: `wl!(out, "{a} = {b};")`.
macro_rules! wl {
    ($out:expr, $($arg:tt)*) => {
        $out.line(format_args!($($arg)*))
    };
}
pub(crate) use wl;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_restores_previous_scope() {
        let mut out = Output::new(16);
        wl!(out, "a = 1;");
        {
            let mut globals = out.redirect(Section::Globals, 0);
            wl!(globals, "var<private> a: f32;");
            {
                let mut helpers = globals.redirect(Section::Helpers, 0);
                wl!(helpers, "fn h() {{}}");
            }
            wl!(globals, "var<private> b: f32;");
        }
        wl!(out, "b = 2;");

        assert_eq!(out.scope().section, Section::Body);
        assert_eq!(
            out.assemble(),
            "var<private> a: f32;\nvar<private> b: f32;\nfn h() {}\n    a = 1;\n    b = 2;\n"
        );
    }

    #[test]
    fn line_formats_arguments_at_the_current_indent() {
        let mut out = Output::new(4);
        out.indent();
        wl!(out, "let r{} = vec4<f32>({:?});", 3, 0.5);
        wl!(out, "}}");
        assert_eq!(
            out.section_text(Section::Body),
            "        let r3 = vec4<f32>(0.5);\n        }\n"
        );
    }

    #[test]
    fn discard_is_not_assembled() {
        let mut out = Output::new(16);
        let saved = out.push(Section::Discard, 0);
        wl!(out, "fn unused() {{}}");
        out.pop(saved);
        assert_eq!(out.assemble(), "");
        assert_eq!(out.section_text(Section::Discard), "fn unused() {}\n");
    }
}

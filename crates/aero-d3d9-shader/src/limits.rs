//! Centralized limits for D3D9 shader compilation.
//!
//! Bytecode is untrusted input. These limits bound memory usage and the size of generated
//! declarations, and encode the constant-array sizes a relatively addressed access may reach.

use crate::types::{RegisterKind, ShaderVersion};

/// Maximum accepted bytecode length in bytes.
pub(crate) const MAX_SHADER_BYTECODE_BYTES: usize = 256 * 1024; // 256 KiB

/// Largest register index the encoding can express once the float-constant banks are folded.
pub(crate) const MAX_CONST_REGISTER_INDEX: u32 = 8191;

/// Maximum tolerated index for non-constant register files.
pub(crate) const MAX_REGISTER_INDEX: u32 = 255;

pub(crate) const MAX_SAMPLER_INDEX: u32 = 15;
pub(crate) const MAX_LABEL_INDEX: u32 = 2047;

/// Nesting bound for `if`/`loop`/`rep` combined. Hostile inputs would otherwise make generated
/// code indentation (and the backend's frame stacks) grow without limit.
pub(crate) const MAX_CONTROL_FLOW_NESTING: u32 = 64;

/// Offsets applied to `c#` registers encoded in the `CONST2`..`CONST4` banks.
pub(crate) const CONST_BANK_OFFSETS: [u32; 3] = [2048, 4096, 6144];

/// Size forced onto a constant array once relative addressing touches it.
pub(crate) fn relative_array_size(version: &ShaderVersion, kind: RegisterKind) -> u32 {
    match kind {
        RegisterKind::ConstInt | RegisterKind::ConstBool => 16,
        _ if version.is_vertex() => {
            if version.major >= 2 {
                256
            } else {
                96
            }
        }
        _ => match version.major {
            0 | 1 => 8,
            2 => 32,
            _ => 224,
        },
    }
}

/// Highest shader model major version this crate compiles.
pub(crate) const MAX_SHADER_MAJOR: u8 = 3;

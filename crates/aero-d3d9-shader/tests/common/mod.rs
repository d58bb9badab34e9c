#![allow(dead_code)]

use aero_d3d9_shader::{compile, CompileOptions, CompileResult, ShaderError, ShaderStage};

pub const END: u32 = 0x0000_FFFF;
pub const PHASE: u32 = 0x0000_FFFD;

// Register type numbers as they appear in parameter tokens.
pub const TEMP: u8 = 0;
pub const INPUT: u8 = 1;
pub const CONST: u8 = 2;
pub const ADDR: u8 = 3;
pub const TEXTURE: u8 = 3;
pub const RASTOUT: u8 = 4;
pub const ATTROUT: u8 = 5;
pub const TEXCRDOUT: u8 = 6;
pub const OUTPUT: u8 = 6;
pub const CONSTINT: u8 = 7;
pub const COLOROUT: u8 = 8;
pub const DEPTHOUT: u8 = 9;
pub const SAMPLER: u8 = 10;
pub const CONSTBOOL: u8 = 14;
pub const LOOP: u8 = 15;
pub const MISCTYPE: u8 = 17;
pub const LABEL: u8 = 18;
pub const PREDICATE: u8 = 19;

pub const IDENTITY: u8 = 0xE4;
pub const XXXX: u8 = 0x00;
pub const WWWW: u8 = 0xFF;

pub const PREDICATED: u32 = 0x1000_0000;
pub const COISSUE: u32 = 0x4000_0000;
pub const RELATIVE: u32 = 0x0000_2000;
pub const CENTROID: u32 = 0x4 << 20;

pub fn version_token(stage: ShaderStage, major: u8, minor: u8) -> u32 {
    let prefix = match stage {
        ShaderStage::Vertex => 0xFFFE_0000,
        ShaderStage::Pixel => 0xFFFF_0000,
    };
    prefix | ((major as u32) << 8) | (minor as u32)
}

/// Instruction token; the length field counts the operand tokens that follow.
pub fn opcode_token(op: u16, operand_count: u8) -> u32 {
    (op as u32) | ((operand_count as u32) << 24)
}

pub fn opcode_control(op: u16, control: u8, operand_count: u8) -> u32 {
    opcode_token(op, operand_count) | ((control as u32) << 16)
}

pub fn reg_token(regtype: u8, index: u32) -> u32 {
    let low3 = (regtype as u32) & 0x7;
    let high2 = (regtype as u32) & 0x18;
    0x8000_0000 | (low3 << 28) | (high2 << 8) | (index & 0x7FF)
}

pub fn dst_token(regtype: u8, index: u32, mask: u8) -> u32 {
    reg_token(regtype, index) | ((mask as u32) << 16)
}

pub fn src_token(regtype: u8, index: u32, swizzle: u8, srcmod: u8) -> u32 {
    reg_token(regtype, index) | ((swizzle as u32) << 16) | ((srcmod as u32) << 24)
}

/// Usage half of a `dcl` for inputs and outputs.
pub fn dcl_usage(usage: u32, index: u32) -> u32 {
    0x8000_0000 | usage | (index << 16)
}

/// Texture-type half of a sampler `dcl`: 1 = 1-D, 2 = 2-D, 3 = cube, 4 = volume.
pub fn dcl_sampler(texture_type: u32) -> u32 {
    0x8000_0000 | (texture_type << 27)
}

pub fn to_bytes(tokens: &[u32]) -> Vec<u8> {
    tokens.iter().flat_map(|t| t.to_le_bytes()).collect()
}

pub fn compile_tokens(tokens: &[u32]) -> CompileResult {
    compile(&to_bytes(tokens), &CompileOptions::default())
}

pub fn compile_tokens_with(tokens: &[u32], options: &CompileOptions) -> CompileResult {
    compile(&to_bytes(tokens), options)
}

pub fn errors(result: &CompileResult) -> Vec<ShaderError> {
    result.diagnostics.iter().map(|d| d.error.clone()).collect()
}

/// Asserts a clean compile and runs the generated WGSL through naga's parser and validator.
pub fn compile_valid(tokens: &[u32], options: &CompileOptions) -> CompileResult {
    let result = compile_tokens_with(tokens, options);
    assert!(
        result.is_ok(),
        "unexpected diagnostics: {:?}\n{}",
        result.diagnostics,
        result.source
    );
    validate_wgsl(&result.source);
    result
}

pub fn validate_wgsl(wgsl: &str) -> naga::Module {
    let module = match naga::front::wgsl::parse_str(wgsl) {
        Ok(module) => module,
        Err(err) => panic!("wgsl parse: {}\n{wgsl}", err.emit_to_string(wgsl)),
    };
    if let Err(err) = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    {
        panic!("wgsl validate: {err:?}\n{wgsl}");
    }
    module
}

/// `CTAB` comment unit describing `(name, register_set, index, count)` entries.
pub fn ctab_comment(entries: &[(&str, u16, u16, u16)]) -> Vec<u32> {
    const HEADER_LEN: usize = 28;
    const INFO_LEN: usize = 20;
    let info_offset = HEADER_LEN;
    let mut names_offset = info_offset + entries.len() * INFO_LEN;

    let mut table = Vec::new();
    table.extend_from_slice(&(HEADER_LEN as u32).to_le_bytes());
    table.extend_from_slice(&0u32.to_le_bytes()); // creator
    table.extend_from_slice(&0u32.to_le_bytes()); // version
    table.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    table.extend_from_slice(&(info_offset as u32).to_le_bytes());
    table.extend_from_slice(&0u32.to_le_bytes()); // flags
    table.extend_from_slice(&0u32.to_le_bytes()); // target
    let mut names = Vec::new();
    for (name, set, index, count) in entries {
        table.extend_from_slice(&(names_offset as u32).to_le_bytes());
        table.extend_from_slice(&set.to_le_bytes());
        table.extend_from_slice(&index.to_le_bytes());
        table.extend_from_slice(&count.to_le_bytes());
        table.extend_from_slice(&0u16.to_le_bytes()); // reserved
        table.extend_from_slice(&0u32.to_le_bytes()); // type info
        table.extend_from_slice(&0u32.to_le_bytes()); // default value
        names.extend_from_slice(name.as_bytes());
        names.push(0);
        names_offset += name.len() + 1;
    }
    table.extend_from_slice(&names);
    while table.len() % 4 != 0 {
        table.push(0);
    }

    let mut words = vec![0, u32::from_le_bytes(*b"CTAB")];
    words.extend(
        table
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]])),
    );
    words[0] = 0xFFFE | (((words.len() - 1) as u32) << 16);
    words
}

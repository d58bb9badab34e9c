mod common;

use aero_d3d9_shader::{CompileOptions, ShaderStage, TextureType};
use common::*;

fn defaults() -> CompileOptions {
    CompileOptions::default()
}

#[test]
fn vs20_transform_and_texcoord_passthrough() {
    // vs_2_0:
    //   dcl_position v0
    //   dcl_texcoord v1
    //   m4x4 oPos, v0, c0
    //   mov oT0, v1
    let tokens = [
        version_token(ShaderStage::Vertex, 2, 0),
        opcode_token(31, 2),
        dcl_usage(0, 0),
        dst_token(INPUT, 0, 0xF),
        opcode_token(31, 2),
        dcl_usage(5, 0),
        dst_token(INPUT, 1, 0xF),
        opcode_token(20, 3),
        dst_token(RASTOUT, 0, 0xF),
        src_token(INPUT, 0, IDENTITY, 0),
        src_token(CONST, 0, IDENTITY, 0),
        opcode_token(1, 2),
        dst_token(TEXCRDOUT, 0, 0xF),
        src_token(INPUT, 1, IDENTITY, 0),
        END,
    ];
    let result = compile_valid(&tokens, &defaults());
    let wgsl = &result.source;

    assert!(wgsl.contains("@vertex"), "{wgsl}");
    assert!(wgsl.contains("@location(1) v1: vec4<f32>"), "{wgsl}");
    assert!(wgsl.contains("@location(4) texcoord0: vec4<f32>"), "{wgsl}");
    assert!(
        wgsl.contains("var<uniform> vs_c: array<vec4<f32>, 4>;"),
        "{wgsl}"
    );
    assert!(
        wgsl.contains("vs_oPos = vec4<f32>(dot(vs_v0, vs_c[0]), dot(vs_v0, vs_c[1]), dot(vs_v0, vs_c[2]), dot(vs_v0, vs_c[3]));"),
        "{wgsl}"
    );
    assert!(wgsl.contains("out.position = vs_oPos;"), "{wgsl}");
    assert!(wgsl.contains("out.texcoord0 = vs_oT0;"), "{wgsl}");
}

#[test]
fn vs11_without_position_write_still_outputs_a_position() {
    // vs_1_1:
    //   dcl_color v0
    //   mov oD0, v0
    let tokens = [
        version_token(ShaderStage::Vertex, 1, 1),
        opcode_token(31, 2),
        dcl_usage(10, 0),
        dst_token(INPUT, 0, 0xF),
        opcode_token(1, 2),
        dst_token(ATTROUT, 0, 0xF),
        src_token(INPUT, 0, IDENTITY, 0),
        END,
    ];
    let result = compile_valid(&tokens, &defaults());
    let wgsl = &result.source;

    assert!(wgsl.contains("out.position = vs_oPos;"), "{wgsl}");
    assert!(wgsl.contains("@location(0) color0: vec4<f32>"), "{wgsl}");
}

#[test]
fn ps20_texld_from_declared_sampler() {
    // ps_2_0:
    //   dcl t0
    //   dcl_2d s0
    //   texld r0, t0, s0
    //   mov oC0, r0
    let tokens = [
        version_token(ShaderStage::Pixel, 2, 0),
        opcode_token(31, 2),
        0x8000_0000,
        dst_token(TEXTURE, 0, 0xF),
        opcode_token(31, 2),
        dcl_sampler(2),
        dst_token(SAMPLER, 0, 0xF),
        opcode_token(66, 3),
        dst_token(TEMP, 0, 0xF),
        src_token(TEXTURE, 0, IDENTITY, 0),
        src_token(SAMPLER, 0, IDENTITY, 0),
        opcode_token(1, 2),
        dst_token(COLOROUT, 0, 0xF),
        src_token(TEMP, 0, IDENTITY, 0),
        END,
    ];
    let result = compile_valid(&tokens, &defaults());
    let wgsl = &result.source;

    assert!(
        wgsl.contains("@group(2) @binding(0) var ps_tex0: texture_2d<f32>;"),
        "{wgsl}"
    );
    assert!(
        wgsl.contains("@group(2) @binding(1) var ps_samp0: sampler;"),
        "{wgsl}"
    );
    assert!(
        wgsl.contains("ps_r0 = textureSample(ps_tex0, ps_samp0, ps_t0.xy);"),
        "{wgsl}"
    );
    assert!(wgsl.contains("out.oC0 = ps_oC0;"), "{wgsl}");
}

#[test]
fn sampler_map_and_shadow_options_change_the_binding_types() {
    // ps_2_0:
    //   dcl t0
    //   texld r0, t0, s0
    //   texld r1, t0, s1
    //   add oC0, r0, r1
    let tokens = [
        version_token(ShaderStage::Pixel, 2, 0),
        opcode_token(31, 2),
        0x8000_0000,
        dst_token(TEXTURE, 0, 0xF),
        opcode_token(31, 2),
        dcl_sampler(2),
        dst_token(SAMPLER, 0, 0xF),
        opcode_token(31, 2),
        dcl_sampler(2),
        dst_token(SAMPLER, 1, 0xF),
        opcode_token(66, 3),
        dst_token(TEMP, 0, 0xF),
        src_token(TEXTURE, 0, IDENTITY, 0),
        src_token(SAMPLER, 0, IDENTITY, 0),
        opcode_token(66, 3),
        dst_token(TEMP, 1, 0xF),
        src_token(TEXTURE, 0, IDENTITY, 0),
        src_token(SAMPLER, 1, IDENTITY, 0),
        opcode_token(2, 3),
        dst_token(COLOROUT, 0, 0xF),
        src_token(TEMP, 0, IDENTITY, 0),
        src_token(TEMP, 1, IDENTITY, 0),
        END,
    ];
    let mut options = defaults();
    options.shadow_samplers = 0b01;
    options.sampler_map.insert(1, TextureType::TextureCube);
    let result = compile_valid(&tokens, &options);
    let wgsl = &result.source;

    assert!(wgsl.contains("var ps_tex0: texture_depth_2d;"), "{wgsl}");
    assert!(wgsl.contains("var ps_samp0: sampler_comparison;"), "{wgsl}");
    assert!(
        wgsl.contains("textureSampleCompare(ps_tex0, ps_samp0, ps_t0.xy, ps_t0.z)"),
        "{wgsl}"
    );
    assert!(wgsl.contains("var ps_tex1: texture_cube<f32>;"), "{wgsl}");
    assert!(
        wgsl.contains("textureSample(ps_tex1, ps_samp1, ps_t0.xyz)"),
        "{wgsl}"
    );
}

#[test]
fn ps30_system_values_and_centroid_inputs() {
    // ps_3_0:
    //   dcl vPos.xy
    //   dcl vFace
    //   dcl_texcoord0_centroid v0
    //   add r0, v0, vPos
    //   mul oC0, r0, vFace.x
    let tokens = [
        version_token(ShaderStage::Pixel, 3, 0),
        opcode_token(31, 2),
        0x8000_0000,
        dst_token(MISCTYPE, 0, 0x3),
        opcode_token(31, 2),
        0x8000_0000,
        dst_token(MISCTYPE, 1, 0xF),
        opcode_token(31, 2),
        dcl_usage(5, 0),
        dst_token(INPUT, 0, 0xF) | CENTROID,
        opcode_token(2, 3),
        dst_token(TEMP, 0, 0xF),
        src_token(INPUT, 0, IDENTITY, 0),
        src_token(MISCTYPE, 0, IDENTITY, 0),
        opcode_token(5, 3),
        dst_token(COLOROUT, 0, 0xF),
        src_token(TEMP, 0, IDENTITY, 0),
        src_token(MISCTYPE, 1, XXXX, 0),
        END,
    ];
    let result = compile_valid(&tokens, &defaults());
    let wgsl = &result.source;

    assert!(wgsl.contains("@builtin(position) frag_position"), "{wgsl}");
    assert!(wgsl.contains("@builtin(front_facing) front_facing"), "{wgsl}");
    assert!(
        wgsl.contains("@location(4) @interpolate(perspective, centroid) texcoord0"),
        "{wgsl}"
    );
    assert!(
        wgsl.contains("ps_vPos = vec4<f32>(floor(input.frag_position.xy), 0.0, 1.0);"),
        "{wgsl}"
    );
    // System values are not varyings.
    assert_eq!(result.attributes.len(), 1);
}

#[test]
fn vs30_loop_calls_subroutine_with_loop_counter() {
    // vs_3_0:
    //   dcl_position v0
    //   dcl_position o0
    //   defi i0, 3, 0, 1, 0
    //   mov r0, v0
    //   loop aL, i0
    //     call l1
    //   endloop
    //   mov o0, r0
    //   ret
    //   label l1
    //   add r0, r0, c0[aL]
    //   ret
    let tokens = [
        version_token(ShaderStage::Vertex, 3, 0),
        opcode_token(31, 2),
        dcl_usage(0, 0),
        dst_token(INPUT, 0, 0xF),
        opcode_token(31, 2),
        dcl_usage(0, 0),
        dst_token(OUTPUT, 0, 0xF),
        opcode_token(48, 5),
        dst_token(CONSTINT, 0, 0xF),
        3,
        0,
        1,
        0,
        opcode_token(1, 2),
        dst_token(TEMP, 0, 0xF),
        src_token(INPUT, 0, IDENTITY, 0),
        opcode_token(27, 2),
        src_token(LOOP, 0, IDENTITY, 0),
        src_token(CONSTINT, 0, IDENTITY, 0),
        opcode_token(25, 1),
        src_token(LABEL, 1, IDENTITY, 0),
        opcode_token(29, 0),
        opcode_token(1, 2),
        dst_token(OUTPUT, 0, 0xF),
        src_token(TEMP, 0, IDENTITY, 0),
        opcode_token(28, 0),
        opcode_token(30, 1),
        src_token(LABEL, 1, IDENTITY, 0),
        opcode_token(2, 4),
        dst_token(TEMP, 0, 0xF),
        src_token(TEMP, 0, IDENTITY, 0),
        src_token(CONST, 0, IDENTITY, 0) | RELATIVE,
        src_token(LOOP, 0, XXXX, 0),
        opcode_token(28, 0),
        END,
    ];
    let result = compile_valid(&tokens, &defaults());
    let wgsl = &result.source;

    assert!(wgsl.contains("fn vs_l1(aL: i32) {"), "{wgsl}");
    assert!(wgsl.contains("vs_l1(aL);"), "{wgsl}");
    assert!(wgsl.contains("var aL: i32 = vs_i0.y;"), "{wgsl}");
    assert!(wgsl.contains("vs_r0 = (vs_r0 + vs_c[0 + aL]);"), "{wgsl}");
    assert!(wgsl.contains("const vs_i0: vec4<i32> = vec4<i32>(3, 0, 1, 0);"), "{wgsl}");
    assert!(wgsl.contains("out.position = vs_o[0];"), "{wgsl}");
    // Relative reads size the array to the full register file.
    assert!(wgsl.contains("array<vec4<f32>, 256>"), "{wgsl}");
}

#[test]
fn vs21_rep_with_conditional_break() {
    // vs_2_x:
    //   defi i0, 4, 0, 0, 0
    //   dcl_position v0
    //   mov r0, v0
    //   rep i0
    //     add r0, r0, c0
    //     breakc_gt r0.x, c1.x
    //   endrep
    //   mov oPos, r0
    let tokens = [
        version_token(ShaderStage::Vertex, 2, 1),
        opcode_token(48, 5),
        dst_token(CONSTINT, 0, 0xF),
        4,
        0,
        0,
        0,
        opcode_token(31, 2),
        dcl_usage(0, 0),
        dst_token(INPUT, 0, 0xF),
        opcode_token(1, 2),
        dst_token(TEMP, 0, 0xF),
        src_token(INPUT, 0, IDENTITY, 0),
        opcode_token(38, 1),
        src_token(CONSTINT, 0, IDENTITY, 0),
        opcode_token(2, 3),
        dst_token(TEMP, 0, 0xF),
        src_token(TEMP, 0, IDENTITY, 0),
        src_token(CONST, 0, IDENTITY, 0),
        opcode_control(45, 1, 2),
        src_token(TEMP, 0, XXXX, 0),
        src_token(CONST, 1, XXXX, 0),
        opcode_token(39, 0),
        opcode_token(1, 2),
        dst_token(RASTOUT, 0, 0xF),
        src_token(TEMP, 0, IDENTITY, 0),
        END,
    ];
    let result = compile_valid(&tokens, &defaults());
    let wgsl = &result.source;

    assert!(
        wgsl.contains(
            "for (var rep_iteration: i32 = 0; rep_iteration < vs_i0.x; rep_iteration++) {"
        ),
        "{wgsl}"
    );
    assert!(
        wgsl.contains("if (vs_r0.x > vs_c[1].x) { break; }"),
        "{wgsl}"
    );
}

#[test]
fn ps30_static_if_else_samples_at_level_zero() {
    // ps_3_0:
    //   defb b0, true
    //   dcl_texcoord0 v0
    //   dcl_2d s0
    //   if b0
    //     texld r0, v0, s0
    //   else
    //     mov r0, v0
    //   endif
    //   mov oC0, r0
    let tokens = [
        version_token(ShaderStage::Pixel, 3, 0),
        opcode_token(47, 2),
        dst_token(CONSTBOOL, 0, 0xF),
        1,
        opcode_token(31, 2),
        dcl_usage(5, 0),
        dst_token(INPUT, 0, 0xF),
        opcode_token(31, 2),
        dcl_sampler(2),
        dst_token(SAMPLER, 0, 0xF),
        opcode_token(40, 1),
        src_token(CONSTBOOL, 0, IDENTITY, 0),
        opcode_token(66, 3),
        dst_token(TEMP, 0, 0xF),
        src_token(INPUT, 0, IDENTITY, 0),
        src_token(SAMPLER, 0, IDENTITY, 0),
        opcode_token(42, 0),
        opcode_token(1, 2),
        dst_token(TEMP, 0, 0xF),
        src_token(INPUT, 0, IDENTITY, 0),
        opcode_token(43, 0),
        opcode_token(1, 2),
        dst_token(COLOROUT, 0, 0xF),
        src_token(TEMP, 0, IDENTITY, 0),
        END,
    ];
    let result = compile_valid(&tokens, &defaults());
    let wgsl = &result.source;

    assert!(wgsl.contains("const ps_b0: bool = true;"), "{wgsl}");
    assert!(wgsl.contains("if (ps_b0) {"), "{wgsl}");
    assert!(wgsl.contains("} else {"), "{wgsl}");
    assert!(
        wgsl.contains("textureSampleLevel(ps_tex0, ps_samp0, ps_v0.xy, 0.0)"),
        "{wgsl}"
    );
}

#[test]
fn ps2x_predicated_move() {
    // ps_2_x:
    //   def c0, 0.5, 0.5, 0.5, 0.5
    //   dcl t0
    //   setp_gt p0, t0, c0
    //   (p0) mov r0, t0
    //   mov oC0, r0
    let half = 0.5f32.to_bits();
    let tokens = [
        version_token(ShaderStage::Pixel, 2, 1),
        opcode_token(81, 5),
        dst_token(CONST, 0, 0xF),
        half,
        half,
        half,
        half,
        opcode_token(31, 2),
        0x8000_0000,
        dst_token(TEXTURE, 0, 0xF),
        opcode_control(94, 1, 3),
        dst_token(PREDICATE, 0, 0xF),
        src_token(TEXTURE, 0, IDENTITY, 0),
        src_token(CONST, 0, IDENTITY, 0),
        opcode_token(1, 3) | PREDICATED,
        dst_token(TEMP, 0, 0xF),
        src_token(PREDICATE, 0, IDENTITY, 0),
        src_token(TEXTURE, 0, IDENTITY, 0),
        opcode_token(1, 2),
        dst_token(COLOROUT, 0, 0xF),
        src_token(TEMP, 0, IDENTITY, 0),
        END,
    ];
    let result = compile_valid(&tokens, &defaults());
    let wgsl = &result.source;

    assert!(wgsl.contains("var<private> ps_p0: vec4<bool>;"), "{wgsl}");
    assert!(wgsl.contains("ps_r0 = select(ps_r0, ps_t0, ps_p0.xxxx);"), "{wgsl}");
    // Only literal constants are read, so no uniform array is bound.
    assert!(result.uniforms.is_empty());
}

#[test]
fn relative_constants_read_the_patched_copy() {
    // vs_2_0:
    //   def c2, 1, 2, 3, 4
    //   dcl_position v0
    //   mova a0.x, v0.x
    //   mov oPos, c0[a0.x]
    let tokens = [
        version_token(ShaderStage::Vertex, 2, 0),
        opcode_token(81, 5),
        dst_token(CONST, 2, 0xF),
        1.0f32.to_bits(),
        2.0f32.to_bits(),
        3.0f32.to_bits(),
        4.0f32.to_bits(),
        opcode_token(31, 2),
        dcl_usage(0, 0),
        dst_token(INPUT, 0, 0xF),
        opcode_token(46, 2),
        dst_token(ADDR, 0, 0x1),
        src_token(INPUT, 0, XXXX, 0),
        opcode_token(1, 3),
        dst_token(RASTOUT, 0, 0xF),
        src_token(CONST, 0, IDENTITY, 0) | RELATIVE,
        src_token(ADDR, 0, XXXX, 0),
        END,
    ];
    let result = compile_valid(&tokens, &defaults());
    let wgsl = &result.source;

    assert!(wgsl.contains("var<private> vs_c_array: array<vec4<f32>, 256>;"), "{wgsl}");
    assert!(wgsl.contains("vs_c_array = vs_c;"), "{wgsl}");
    assert!(wgsl.contains("vs_c_array[2] = vs_c2;"), "{wgsl}");
    assert!(wgsl.contains("vs_a0.x = (vec4<i32>(round(vs_v0.xxxx))).x;"), "{wgsl}");
    assert!(wgsl.contains("vs_oPos = vs_c_array[0 + vs_a0.x];"), "{wgsl}");
}

#[test]
fn vs30_texldl_samples_an_explicit_level() {
    // vs_3_0:
    //   dcl_position v0
    //   dcl_position o0
    //   dcl_2d s0
    //   texldl r0, v0, s0
    //   mov o0, r0
    let tokens = [
        version_token(ShaderStage::Vertex, 3, 0),
        opcode_token(31, 2),
        dcl_usage(0, 0),
        dst_token(INPUT, 0, 0xF),
        opcode_token(31, 2),
        dcl_usage(0, 0),
        dst_token(OUTPUT, 0, 0xF),
        opcode_token(31, 2),
        dcl_sampler(2),
        dst_token(SAMPLER, 0, 0xF),
        opcode_token(95, 3),
        dst_token(TEMP, 0, 0xF),
        src_token(INPUT, 0, IDENTITY, 0),
        src_token(SAMPLER, 0, IDENTITY, 0),
        opcode_token(1, 2),
        dst_token(OUTPUT, 0, 0xF),
        src_token(TEMP, 0, IDENTITY, 0),
        END,
    ];
    let result = compile_valid(&tokens, &defaults());
    let wgsl = &result.source;

    assert!(wgsl.contains("@group(1) @binding(0) var vs_tex0"), "{wgsl}");
    assert!(
        wgsl.contains("vs_r0 = textureSampleLevel(vs_tex0, vs_samp0, vs_v0.xy, vs_v0.w);"),
        "{wgsl}"
    );
}

#[test]
fn half_pixel_offset_adjusts_the_position() {
    let tokens = [
        version_token(ShaderStage::Vertex, 2, 0),
        opcode_token(31, 2),
        dcl_usage(0, 0),
        dst_token(INPUT, 0, 0xF),
        opcode_token(1, 2),
        dst_token(RASTOUT, 0, 0xF),
        src_token(INPUT, 0, IDENTITY, 0),
        END,
    ];
    let mut options = defaults();
    options.half_pixel_center = true;
    let result = compile_valid(&tokens, &options);
    let wgsl = &result.source;

    assert!(wgsl.contains("struct HalfPixel {"), "{wgsl}");
    assert!(
        wgsl.contains("var<uniform> half_pixel: HalfPixel;"),
        "{wgsl}"
    );
    assert!(
        wgsl.contains("out.position.x = out.position.x - half_pixel.inv_viewport.x * out.position.w;"),
        "{wgsl}"
    );

    let plain = compile_valid(&tokens, &defaults());
    assert!(!plain.source.contains("half_pixel"), "{}", plain.source);
}

#[test]
fn ps11_texture_matrix_idiom_fuses_into_one_sample() {
    // ps_1_1:
    //   tex t0
    //   texm3x2pad t1, t0
    //   texm3x2tex t2, t0
    //   mul r0, t0, t2
    let tokens = [
        version_token(ShaderStage::Pixel, 1, 1),
        opcode_token(66, 0),
        dst_token(TEXTURE, 0, 0xF),
        opcode_token(71, 0),
        dst_token(TEXTURE, 1, 0xF),
        src_token(TEXTURE, 0, IDENTITY, 0),
        opcode_token(72, 0),
        dst_token(TEXTURE, 2, 0xF),
        src_token(TEXTURE, 0, IDENTITY, 0),
        opcode_token(5, 0),
        dst_token(TEMP, 0, 0xF),
        src_token(TEXTURE, 0, IDENTITY, 0),
        src_token(TEXTURE, 2, IDENTITY, 0),
        END,
    ];
    let result = compile_valid(&tokens, &defaults());
    let wgsl = &result.source;

    assert!(
        wgsl.contains("ps_t0 = textureSample(ps_tex0, ps_samp0, ps_t0.xy);"),
        "{wgsl}"
    );
    assert!(
        wgsl.contains("ps_t2 = textureSample(ps_tex2, ps_samp2, vec4<f32>(dot(ps_t1.xyz, ps_t0.xyz), dot(ps_t2.xyz, ps_t0.xyz), 0.0, 0.0).xy);"),
        "{wgsl}"
    );
    // The pad row emits nothing of its own and its sampler stays unbound.
    assert!(!wgsl.contains("ps_tex1"), "{wgsl}");
    assert!(wgsl.contains("out.oC0 = ps_r0;"), "{wgsl}");
}

/// ps_1_1 `tex t0; texm3x3pad t1, t0; texm3x3pad t2, t0; <op> t3, t0 [, extra]; mov r0, t3`.
fn ps11_texm3x3_chain(op: u16, pads: u32, extra: Option<u32>) -> Vec<u32> {
    let mut tokens = vec![
        version_token(ShaderStage::Pixel, 1, 1),
        opcode_token(66, 0),
        dst_token(TEXTURE, 0, 0xF),
    ];
    for row in 3 - pads..3 {
        tokens.extend([
            opcode_token(73, 0),
            dst_token(TEXTURE, row, 0xF),
            src_token(TEXTURE, 0, IDENTITY, 0),
        ]);
    }
    tokens.extend([
        opcode_token(op, 0),
        dst_token(TEXTURE, 3, 0xF),
        src_token(TEXTURE, 0, IDENTITY, 0),
    ]);
    tokens.extend(extra);
    tokens.extend([
        opcode_token(1, 0),
        dst_token(TEMP, 0, 0xF),
        src_token(TEXTURE, 0, IDENTITY, 0),
        END,
    ]);
    tokens
}

const M3X3_ROWS: &str =
    "vec3<f32>(dot(ps_t1.xyz, ps_t0.xyz), dot(ps_t2.xyz, ps_t0.xyz), dot(ps_t3.xyz, ps_t0.xyz))";

#[test]
fn ps11_texm3x3tex_samples_the_three_row_products() {
    let result = compile_valid(&ps11_texm3x3_chain(74, 2, None), &defaults());
    let wgsl = &result.source;

    assert!(
        wgsl.contains(&format!(
            "ps_t3 = textureSample(ps_tex3, ps_samp3, vec4<f32>({M3X3_ROWS}, 0.0).xy);"
        )),
        "{wgsl}"
    );
    assert!(!wgsl.contains("ps_tex1"), "{wgsl}");
    assert!(!wgsl.contains("ps_tex2"), "{wgsl}");
    assert!(!wgsl.contains("d3d9_reflect"), "{wgsl}");
}

#[test]
fn ps11_texm3x3spec_reflects_the_constant_eye() {
    let eye = src_token(CONST, 0, IDENTITY, 0);
    let result = compile_valid(&ps11_texm3x3_chain(76, 2, Some(eye)), &defaults());
    let wgsl = &result.source;

    assert!(wgsl.contains("fn d3d9_reflect("), "{wgsl}");
    assert!(
        wgsl.contains(&format!("d3d9_reflect({M3X3_ROWS}, ps_c[0].xyz)")),
        "{wgsl}"
    );
    assert!(wgsl.contains("ps_t3 = textureSample(ps_tex3, ps_samp3,"), "{wgsl}");
}

#[test]
fn ps11_texm3x3vspec_takes_the_eye_from_the_w_lanes() {
    let result = compile_valid(&ps11_texm3x3_chain(77, 2, None), &defaults());
    let wgsl = &result.source;

    assert!(
        wgsl.contains(&format!(
            "d3d9_reflect({M3X3_ROWS}, vec3<f32>(ps_t1.w, ps_t2.w, ps_t3.w))"
        )),
        "{wgsl}"
    );
    assert!(wgsl.contains("ps_t3 = textureSample(ps_tex3, ps_samp3,"), "{wgsl}");
}

#[test]
fn ps11_texm3x3tex_after_a_single_pad_row_emits_nothing() {
    let result = compile_valid(&ps11_texm3x3_chain(74, 1, None), &defaults());
    let wgsl = &result.source;

    assert!(!wgsl.contains("ps_tex3"), "{wgsl}");
    assert!(!wgsl.contains("ps_t3 ="), "{wgsl}");
    assert!(!wgsl.contains("dot(ps_t2.xyz"), "{wgsl}");
    assert!(wgsl.contains("out.oC0 = ps_r0;"), "{wgsl}");
}

#[test]
fn ps11_texbem_binds_the_bump_matrix() {
    // ps_1_1:
    //   tex t0
    //   texbem t1, t0
    //   mov r0, t1
    let tokens = [
        version_token(ShaderStage::Pixel, 1, 1),
        opcode_token(66, 0),
        dst_token(TEXTURE, 0, 0xF),
        opcode_token(67, 0),
        dst_token(TEXTURE, 1, 0xF),
        src_token(TEXTURE, 0, IDENTITY, 0),
        opcode_token(1, 0),
        dst_token(TEMP, 0, 0xF),
        src_token(TEXTURE, 1, IDENTITY, 0),
        END,
    ];
    let result = compile_valid(&tokens, &defaults());
    let wgsl = &result.source;

    assert!(wgsl.contains("fn d3d9_bump("), "{wgsl}");
    assert!(wgsl.contains("var<uniform> ps_bumpenv: array<vec4<f32>, 32>;"), "{wgsl}");
    assert!(wgsl.contains("d3d9_bump(ps_t1.xy, ps_t0.xy, ps_bumpenv[2])"), "{wgsl}");
}

#[test]
fn ps11_texkill_and_cnd() {
    // ps_1_1:
    //   tex t0
    //   texkill t1
    //   mov r0, c1
    //   cnd r0, r0.a, t0, c0
    let tokens = [
        version_token(ShaderStage::Pixel, 1, 1),
        opcode_token(66, 0),
        dst_token(TEXTURE, 0, 0xF),
        opcode_token(65, 0),
        dst_token(TEXTURE, 1, 0xF),
        opcode_token(1, 0),
        dst_token(TEMP, 0, 0xF),
        src_token(CONST, 1, IDENTITY, 0),
        opcode_token(80, 0),
        dst_token(TEMP, 0, 0xF),
        src_token(TEMP, 0, WWWW, 0),
        src_token(TEXTURE, 0, IDENTITY, 0),
        src_token(CONST, 0, IDENTITY, 0),
        END,
    ];
    let result = compile_valid(&tokens, &defaults());
    let wgsl = &result.source;

    assert!(wgsl.contains("if (any(ps_t1.xyz < vec3<f32>(0.0))) {"), "{wgsl}");
    assert!(wgsl.contains("discard;"), "{wgsl}");
    assert!(
        wgsl.contains("ps_r0 = select(ps_c[0], ps_t0, ps_r0.wwww > vec4<f32>(0.5));"),
        "{wgsl}"
    );
}

#[test]
fn ps14_phase_marker_and_texcrd() {
    // ps_1_4:
    //   texld r0, t0
    //   phase
    //   texcrd r1, t1
    //   add r0, r0, r1
    let tokens = [
        version_token(ShaderStage::Pixel, 1, 4),
        opcode_token(66, 0),
        dst_token(TEMP, 0, 0xF),
        src_token(TEXTURE, 0, IDENTITY, 0),
        PHASE,
        opcode_token(64, 0),
        dst_token(TEMP, 1, 0xF),
        src_token(TEXTURE, 1, IDENTITY, 0),
        opcode_token(2, 0),
        dst_token(TEMP, 0, 0xF),
        src_token(TEMP, 0, IDENTITY, 0),
        src_token(TEMP, 1, IDENTITY, 0),
        END,
    ];
    let result = compile_valid(&tokens, &defaults());
    let wgsl = &result.source;

    assert!(
        wgsl.contains("ps_r0 = textureSample(ps_tex0, ps_samp0, ps_t0.xy);"),
        "{wgsl}"
    );
    assert!(wgsl.contains("// phase"), "{wgsl}");
    assert!(wgsl.contains("ps_r1 = ps_t1;"), "{wgsl}");
}

#[test]
fn uncalled_subroutine_is_dropped_from_the_module() {
    // vs_2_0:
    //   mov oPos, c0
    //   ret
    //   label l3
    //   mov r0, c1
    //   ret
    let tokens = [
        version_token(ShaderStage::Vertex, 2, 0),
        opcode_token(1, 2),
        dst_token(RASTOUT, 0, 0xF),
        src_token(CONST, 0, IDENTITY, 0),
        opcode_token(28, 0),
        opcode_token(30, 1),
        src_token(LABEL, 3, IDENTITY, 0),
        opcode_token(1, 2),
        dst_token(TEMP, 0, 0xF),
        src_token(CONST, 1, IDENTITY, 0),
        opcode_token(28, 0),
        END,
    ];
    let result = compile_valid(&tokens, &defaults());
    assert!(!result.source.contains("vs_l3"), "{}", result.source);
}

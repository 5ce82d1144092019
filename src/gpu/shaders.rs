// ============================================================================
// GPU SHADERS — all WGSL code kept inline for containment
// ============================================================================

// ============================================================================
// BRUSH STAMP SHADER
// ============================================================================
//
// One billboard quad per stamp, sized to the stamp's full reach.  The
// fragment shader reproduces the CPU rasterizer's radial alpha profile:
// opaque core to radius−0.5, linear fade to radius+0.5, weak fringe to
// radius+1.5.
//
// Pen and eraser share this shader; only the pipeline blend state differs
// (SRC_ALPHA/ONE_MINUS_SRC_ALPHA vs ZERO/ONE_MINUS_SRC_ALPHA), so there is
// exactly one definition of what a stamp looks like on the GPU.
pub const BRUSH_STAMP_SHADER: &str = r#"
struct StampUniforms {
    center: vec2<f32>,      // stamp center in canvas pixels
    radius: f32,
    _pad0: f32,
    color: vec4<f32>,       // straight (non-premultiplied) RGBA
    canvas_size: vec2<f32>, // target texture dimensions in pixels
    _pad1: vec2<f32>,
};

@group(0) @binding(0) var<uniform> u: StampUniforms;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) px: vec2<f32>,   // fragment position in canvas pixels
};

@vertex
fn vs_stamp(@builtin(vertex_index) vi: u32) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>( 1.0,  1.0),
    );
    let reach = u.radius + 1.5;
    let px = u.center + corners[vi] * reach;

    // Canvas pixels → NDC, Y flipped for wgpu conventions.
    let ndc = vec2<f32>(
        px.x / u.canvas_size.x * 2.0 - 1.0,
        1.0 - px.y / u.canvas_size.y * 2.0
    );

    var out: VertexOutput;
    out.position = vec4<f32>(ndc, 0.0, 1.0);
    out.px = px;
    return out;
}

@fragment
fn fs_stamp(in: VertexOutput) -> @location(0) vec4<f32> {
    let d = distance(in.px, u.center);
    if (d <= u.radius - 0.5) {
        return vec4<f32>(u.color.rgb, u.color.a);
    }
    let core   = clamp(u.radius + 0.5 - d, 0.0, 1.0);
    let fringe = clamp(0.3 * (u.radius + 1.5 - d), 0.0, 0.3);
    return vec4<f32>(u.color.rgb, max(core, fringe) * u.color.a);
}
"#;

// ============================================================================
// LAYER BLEND SHADER (ping-pong compositor)
// ============================================================================
//
// Hardware blending cannot express multiply/screen, so it is disabled and
// the fragment shader does all the math: it samples BOTH the background
// accumulator (premultiplied, from the previous ping-pong pass) and the
// foreground layer (straight alpha, as uploaded from the CPU buffer),
// applies the selected blend mode, and writes the premultiplied result.
//
// Blend mode IDs match `BlendMode::to_u8()`:
//   0 = Normal, 1 = Multiply, 2 = Screen, 3 = Additive
pub const LAYER_BLEND_SHADER: &str = r#"
struct BlendUniforms {
    opacity:    f32,
    blend_mode: u32,
    _pad0:      f32,
    _pad1:      f32,
};

@group(0) @binding(0) var<uniform> u: BlendUniforms;

// Foreground layer (straight alpha)
@group(1) @binding(0) var fg_tex: texture_2d<f32>;
@group(1) @binding(1) var fg_samp: sampler;

// Background accumulator (premultiplied)
@group(2) @binding(0) var bg_tex: texture_2d<f32>;
@group(2) @binding(1) var bg_samp: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_blend(@builtin(vertex_index) vi: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(1.0, 1.0),
    );
    let pos = positions[vi];
    var out: VertexOutput;
    out.position = vec4<f32>(pos.x * 2.0 - 1.0, 1.0 - pos.y * 2.0, 0.0, 1.0);
    out.uv = pos;
    return out;
}

@fragment
fn fs_blend(in: VertexOutput) -> @location(0) vec4<f32> {
    let fg = textureSample(fg_tex, fg_samp, in.uv);
    let bg = textureSample(bg_tex, bg_samp, in.uv);

    // Layer opacity scales the foreground's alpha.
    let fg_a = fg.a * u.opacity;
    if (fg_a <= 0.0) {
        return bg;
    }

    // Un-premultiply the accumulator for the blend-mode math.
    var base = vec3<f32>(0.0);
    if (bg.a > 0.0) {
        base = bg.rgb / bg.a;
    }

    var blended: vec3<f32>;
    switch (u.blend_mode) {
        // Multiply
        case 1u: {
            blended = base * fg.rgb;
        }
        // Screen
        case 2u: {
            blended = vec3<f32>(1.0) - (vec3<f32>(1.0) - base) * (vec3<f32>(1.0) - fg.rgb);
        }
        // Additive
        case 3u: {
            blended = min(base + fg.rgb, vec3<f32>(1.0));
        }
        // Normal
        default: {
            blended = fg.rgb;
        }
    }

    let out_a = fg_a + bg.a * (1.0 - fg_a);
    let premul = clamp(blended * fg_a + bg.rgb * (1.0 - fg_a), vec3<f32>(0.0), vec3<f32>(1.0));
    return vec4<f32>(premul, out_a);
}
"#;

use crate::renderer::gl;

const VERTEX_SHADER: &str = r#"#version 300 es
layout(location = 0) in vec3 POSITION;
layout(location = 1) in vec3 NORMAL;
layout(location = 2) in vec2 TEXCOORD_0;
layout(location = 3) in vec3 TANGENT;
layout(location = 4) in vec3 BITANGENT;

uniform mat4 uModelViewProjMatrix;
uniform mat4 uModelViewMatrix;
uniform mat4 uNormalMatrix;

out vec3 vViewSpacePosition;
out vec3 vViewSpaceNormal;
out vec3 vViewSpaceTangent;
out vec3 vViewSpaceBitangent;
out vec2 vTexCoords;

void main() {
    vViewSpacePosition = vec3(uModelViewMatrix * vec4(POSITION, 1.0));
    vViewSpaceNormal = normalize(vec3(uNormalMatrix * vec4(NORMAL, 0.0)));
    vViewSpaceTangent = vec3(uNormalMatrix * vec4(TANGENT, 0.0));
    vViewSpaceBitangent = vec3(uNormalMatrix * vec4(BITANGENT, 0.0));
    vTexCoords = TEXCOORD_0;
    gl_Position = uModelViewProjMatrix * vec4(POSITION, 1.0);
}
"#;

const FRAGMENT_SHADER: &str = r#"#version 300 es
precision highp float;

in vec3 vViewSpacePosition;
in vec3 vViewSpaceNormal;
in vec3 vViewSpaceTangent;
in vec3 vViewSpaceBitangent;
in vec2 vTexCoords;

uniform vec3 uLightDirection;
uniform vec3 uLightIntensity;

uniform vec4 uBaseColorFactor;
uniform sampler2D uBaseColorTexture;
uniform float uMetallicFactor;
uniform float uRoughnessFactor;
uniform sampler2D uMetallicRoughnessTexture;
uniform vec3 uEmissiveFactor;
uniform sampler2D uEmissiveTexture;
uniform float uOcclusionStrength;
uniform sampler2D uOcclusionTexture;
uniform bool uApplyOcclusion;
uniform sampler2D uNormalTexture;
uniform bool uHasNormalMap;
uniform bool uApplyNormalMapping;

out vec4 FRAG_COLOR;

void main() {
    vec3 N = normalize(vViewSpaceNormal);
    if (uApplyNormalMapping && uHasNormalMap) {
        mat3 tbn = mat3(
            normalize(vViewSpaceTangent),
            normalize(vViewSpaceBitangent),
            N);
        vec3 sampled = texture(uNormalTexture, vTexCoords).rgb * 2.0 - 1.0;
        N = normalize(tbn * sampled);
    }
    vec3 L = uLightDirection;
    vec3 V = normalize(-vViewSpacePosition);
    vec3 H = normalize(L + V);

    vec4 baseColor = uBaseColorFactor * texture(uBaseColorTexture, vTexCoords);
    vec4 mr = texture(uMetallicRoughnessTexture, vTexCoords);
    float metallic = uMetallicFactor * mr.b;
    float roughness = uRoughnessFactor * mr.g;

    float NdotL = max(dot(N, L), 0.0);
    vec3 diffuse = baseColor.rgb * (1.0 - metallic);
    float shininess = mix(64.0, 4.0, roughness);
    float specular = pow(max(dot(N, H), 0.0), shininess) * mix(0.04, 1.0, metallic);
    vec3 color = uLightIntensity * NdotL * (diffuse + specular * baseColor.rgb);

    if (uApplyOcclusion) {
        float occlusion = texture(uOcclusionTexture, vTexCoords).r;
        color = mix(color, color * occlusion, uOcclusionStrength);
    }
    color += uEmissiveFactor * texture(uEmissiveTexture, vTexCoords).rgb;

    // The framebuffer is not SRGB, so transform the linear color to
    // close-enough-to-srgb.
    FRAG_COLOR = vec4(pow(color, vec3(1.0 / 2.2)), baseColor.a);
}
"#;

/// The compiled scene shader with every uniform location resolved up front.
/// Locations the driver optimized out come back as -1; uploads to -1 are
/// silent no-ops, so binding code never has to branch on presence.
pub struct ShaderProgram {
    pub program: gl::types::GLuint,

    pub model_matrix: gl::types::GLint,
    pub model_view_matrix: gl::types::GLint,
    pub model_view_proj_matrix: gl::types::GLint,
    pub normal_matrix: gl::types::GLint,

    pub light_direction: gl::types::GLint,
    pub light_intensity: gl::types::GLint,

    pub base_color_factor: gl::types::GLint,
    pub base_color_texture: gl::types::GLint,
    pub metallic_factor: gl::types::GLint,
    pub roughness_factor: gl::types::GLint,
    pub metallic_roughness_texture: gl::types::GLint,
    pub emissive_factor: gl::types::GLint,
    pub emissive_texture: gl::types::GLint,
    pub occlusion_strength: gl::types::GLint,
    pub occlusion_texture: gl::types::GLint,
    pub apply_occlusion: gl::types::GLint,
    pub normal_texture: gl::types::GLint,
    pub has_normal_map: gl::types::GLint,
    pub apply_normal_mapping: gl::types::GLint,
}

/// Compiles and links the scene shader program.
pub fn create_program() -> ShaderProgram {
    let vertex_shader = gl::create_shader(gl::VERTEX_SHADER, VERTEX_SHADER);
    let fragment_shader = gl::create_shader(gl::FRAGMENT_SHADER, FRAGMENT_SHADER);
    let program = gl::create_program(&[vertex_shader, fragment_shader]);
    gl::call!(gl::DeleteShader(vertex_shader));
    gl::call!(gl::DeleteShader(fragment_shader));
    gl::call!(gl::UseProgram(program));

    let uniform = |name| gl::get_uniform_location(program, name);
    ShaderProgram {
        program,
        model_matrix: uniform("uModelMatrix"),
        model_view_matrix: uniform("uModelViewMatrix"),
        model_view_proj_matrix: uniform("uModelViewProjMatrix"),
        normal_matrix: uniform("uNormalMatrix"),
        light_direction: uniform("uLightDirection"),
        light_intensity: uniform("uLightIntensity"),
        base_color_factor: uniform("uBaseColorFactor"),
        base_color_texture: uniform("uBaseColorTexture"),
        metallic_factor: uniform("uMetallicFactor"),
        roughness_factor: uniform("uRoughnessFactor"),
        metallic_roughness_texture: uniform("uMetallicRoughnessTexture"),
        emissive_factor: uniform("uEmissiveFactor"),
        emissive_texture: uniform("uEmissiveTexture"),
        occlusion_strength: uniform("uOcclusionStrength"),
        occlusion_texture: uniform("uOcclusionTexture"),
        apply_occlusion: uniform("uApplyOcclusion"),
        normal_texture: uniform("uNormalTexture"),
        has_normal_map: uniform("uHasNormalMap"),
        apply_normal_mapping: uniform("uApplyNormalMapping"),
    }
}

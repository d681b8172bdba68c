use std::ffi::c_void;

use anyhow::{ensure, Result};
use glam::{Mat4, Vec3};
use sdl2::video::Window;
use sdl2::VideoSubsystem;

use crate::camera::Camera;

pub mod document;
mod draw_calls;
pub(crate) mod gl;
pub mod loader;
mod program;
mod tangents;
mod upload;

use document::Document;
use draw_calls::{DrawCall, VaoRange};
use program::ShaderProgram;

const FOV_Y_DEGREES: f32 = 70.0;

/// Texture units for the five material channels. Fixed and distinct so the
/// shader's samplers never alias.
const UNIT_BASE_COLOR: u32 = 0;
const UNIT_METALLIC_ROUGHNESS: u32 = 1;
const UNIT_EMISSIVE: u32 = 2;
const UNIT_OCCLUSION: u32 = 3;
const UNIT_NORMAL: u32 = 4;

/// Frame-global lighting and feature toggles, pushed as uniforms before
/// traversal begins.
pub struct FrameSettings {
    /// World-space direction towards the light.
    pub light_direction: Vec3,
    pub light_intensity: Vec3,
    pub apply_occlusion: bool,
    pub apply_normal_mapping: bool,
}

/// Owns the scene description and every device resource built from it:
/// buffer objects 1:1 with scene buffers, texture objects 1:1 with scene
/// textures, and vertex-array objects flattened across all mesh primitives.
/// Everything is created before the render loop starts and released in Drop.
pub struct Renderer {
    document: Document,
    program: ShaderProgram,
    gl_buffers: Vec<gl::types::GLuint>,
    gl_textures: Vec<gl::types::GLuint>,
    gl_vaos: Vec<gl::types::GLuint>,
    synthesized_buffers: Vec<gl::types::GLuint>,
    vao_ranges: Vec<VaoRange>,
    draw_calls: Vec<DrawCall>,
    white_texture: gl::types::GLuint,
    viewport: (i32, i32),
    z_near: f32,
    z_far: f32,
}

impl Renderer {
    pub fn new(video: &VideoSubsystem, window: &Window, document: Document) -> Result<Renderer> {
        gl::load_with(|s| video.gl_get_proc_address(s) as *const core::ffi::c_void);
        if let Err(err) = video.gl_set_swap_interval(1) {
            log::warn!("vsync not available: {err}");
        }
        let (w, h) = window.drawable_size();
        gl::call!(gl::Viewport(0, 0, w as i32, h as i32));
        gl::call!(gl::Enable(gl::DEPTH_TEST));
        gl::call!(gl::ClearColor(0.05, 0.05, 0.05, 1.0));

        let gl_buffers = upload::build_buffers(&document)?;
        let vertex_arrays = upload::build_vertex_arrays(&document, &gl_buffers)?;
        let gl_textures = upload::build_textures(&document);
        let white_texture = upload::create_white_texture();

        let program = program::create_program();
        for (location, unit) in [
            (program.base_color_texture, UNIT_BASE_COLOR),
            (program.metallic_roughness_texture, UNIT_METALLIC_ROUGHNESS),
            (program.emissive_texture, UNIT_EMISSIVE),
            (program.occlusion_texture, UNIT_OCCLUSION),
            (program.normal_texture, UNIT_NORMAL),
        ] {
            gl::call!(gl::Uniform1i(location, unit as i32));
        }

        Ok(Renderer {
            document,
            program,
            gl_buffers,
            gl_textures,
            gl_vaos: vertex_arrays.vaos,
            synthesized_buffers: vertex_arrays.synthesized_buffers,
            vao_ranges: vertex_arrays.ranges,
            draw_calls: vertex_arrays.draw_calls,
            white_texture,
            viewport: (w as i32, h as i32),
            z_near: 0.1,
            z_far: 1000.0,
        })
    }

    /// Projection depth range derived from how far the camera can plausibly
    /// be from the scene.
    pub fn set_scene_depth(&mut self, max_distance: f32) {
        self.z_near = 0.001 * max_distance;
        self.z_far = 1.5 * max_distance;
    }

    pub fn resize(&mut self, width: i32, height: i32) {
        self.viewport = (width.max(1), height.max(1));
        gl::call!(gl::Viewport(0, 0, self.viewport.0, self.viewport.1));
    }

    fn projection_matrix(&self) -> Mat4 {
        let aspect = self.viewport.0 as f32 / self.viewport.1 as f32;
        Mat4::perspective_rh_gl(
            FOV_Y_DEGREES.to_radians(),
            aspect,
            self.z_near,
            self.z_far,
        )
    }

    /// Draws one frame of the default scene: frame-global uniforms first,
    /// then a depth-first traversal of the node forest emitting one draw per
    /// primitive with its material bound.
    pub fn draw_frame(&self, camera: &Camera, frame: &FrameSettings) {
        gl::call!(gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT));
        let Some(scene_index) = self.document.default_scene else {
            return;
        };

        gl::call!(gl::UseProgram(self.program.program));
        let view_matrix = camera.view_matrix();
        let projection_matrix = self.projection_matrix();

        let light_direction = (view_matrix * frame.light_direction.extend(0.0))
            .truncate()
            .normalize_or_zero();
        uniform_vec3(self.program.light_direction, light_direction);
        uniform_vec3(self.program.light_intensity, frame.light_intensity);
        uniform_bool(self.program.apply_occlusion, frame.apply_occlusion);
        uniform_bool(self.program.apply_normal_mapping, frame.apply_normal_mapping);

        self.document.visit_drawables(scene_index, |mesh_index, world_matrix| {
            let model_view = view_matrix * world_matrix;
            let model_view_proj = projection_matrix * model_view;
            let normal_matrix = model_view.inverse().transpose();
            uniform_mat4(self.program.model_matrix, &world_matrix);
            uniform_mat4(self.program.model_view_matrix, &model_view);
            uniform_mat4(self.program.model_view_proj_matrix, &model_view_proj);
            uniform_mat4(self.program.normal_matrix, &normal_matrix);

            let range = self.vao_ranges[mesh_index];
            for draw_call in &self.draw_calls[range.begin..range.begin + range.count] {
                self.bind_material(draw_call.material);
                gl::call!(gl::BindVertexArray(draw_call.vao));
                match draw_call.indices {
                    Some(indices) => {
                        gl::call!(gl::DrawElements(
                            draw_call.mode,
                            indices.count,
                            indices.component_type,
                            indices.byte_offset as *const c_void,
                        ));
                    }
                    None => {
                        gl::call!(gl::DrawArrays(draw_call.mode, 0, draw_call.vertex_count));
                    }
                }
            }
        });
        gl::call!(gl::BindVertexArray(0));
    }

    /// Uploads one material's factors and binds its five texture units.
    /// Absent material and unresolvable texture references both fall back
    /// per channel, never leaving a stale binding on a unit.
    fn bind_material(&self, material_index: Option<usize>) {
        let resolved = resolve_material(&self.document, material_index);
        let program = &self.program;

        gl::call!(gl::Uniform4fv(
            program.base_color_factor,
            1,
            resolved.base_color_factor.as_ptr(),
        ));
        gl::call!(gl::Uniform1f(program.metallic_factor, resolved.metallic_factor));
        gl::call!(gl::Uniform1f(program.roughness_factor, resolved.roughness_factor));
        gl::call!(gl::Uniform3fv(
            program.emissive_factor,
            1,
            resolved.emissive_factor.as_ptr(),
        ));
        gl::call!(gl::Uniform1f(
            program.occlusion_strength,
            resolved.occlusion_strength,
        ));
        uniform_bool(program.has_normal_map, resolved.has_normal_map);

        for (unit, binding) in [
            (UNIT_BASE_COLOR, resolved.base_color),
            (UNIT_METALLIC_ROUGHNESS, resolved.metallic_roughness),
            (UNIT_EMISSIVE, resolved.emissive),
            (UNIT_OCCLUSION, resolved.occlusion),
            (UNIT_NORMAL, resolved.normal),
        ] {
            let handle = match binding {
                TextureBinding::Scene(index) => self.gl_textures[index],
                TextureBinding::White => self.white_texture,
                TextureBinding::Unbound => 0,
            };
            gl::call!(gl::ActiveTexture(gl::TEXTURE0 + unit));
            gl::call!(gl::BindTexture(gl::TEXTURE_2D, handle));
        }
    }

    /// Renders a single still frame into an off-screen framebuffer and reads
    /// it back as tightly packed RGB rows, bottom row flipped to the top for
    /// image output.
    pub fn render_to_image(
        &mut self,
        width: u32,
        height: u32,
        camera: &Camera,
        frame: &FrameSettings,
    ) -> Result<Vec<u8>> {
        let mut framebuffer = 0;
        let mut renderbuffers = [0; 2];
        gl::call!(gl::GenFramebuffers(1, &mut framebuffer));
        gl::call!(gl::GenRenderbuffers(2, renderbuffers.as_mut_ptr()));
        gl::call!(gl::BindRenderbuffer(gl::RENDERBUFFER, renderbuffers[0]));
        gl::call!(gl::RenderbufferStorage(
            gl::RENDERBUFFER,
            gl::RGBA8,
            width as i32,
            height as i32,
        ));
        gl::call!(gl::BindRenderbuffer(gl::RENDERBUFFER, renderbuffers[1]));
        gl::call!(gl::RenderbufferStorage(
            gl::RENDERBUFFER,
            gl::DEPTH_COMPONENT24,
            width as i32,
            height as i32,
        ));
        gl::call!(gl::BindFramebuffer(gl::FRAMEBUFFER, framebuffer));
        gl::call!(gl::FramebufferRenderbuffer(
            gl::FRAMEBUFFER,
            gl::COLOR_ATTACHMENT0,
            gl::RENDERBUFFER,
            renderbuffers[0],
        ));
        gl::call!(gl::FramebufferRenderbuffer(
            gl::FRAMEBUFFER,
            gl::DEPTH_ATTACHMENT,
            gl::RENDERBUFFER,
            renderbuffers[1],
        ));
        let status = gl::call!(gl::CheckFramebufferStatus(gl::FRAMEBUFFER));
        ensure!(
            status == gl::FRAMEBUFFER_COMPLETE,
            "export framebuffer incomplete (status {status:#x})",
        );

        let previous_viewport = self.viewport;
        self.viewport = (width as i32, height as i32);
        gl::call!(gl::Viewport(0, 0, width as i32, height as i32));
        self.draw_frame(camera, frame);

        let mut rgba = vec![0u8; width as usize * height as usize * 4];
        gl::call!(gl::ReadPixels(
            0,
            0,
            width as i32,
            height as i32,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            rgba.as_mut_ptr() as *mut c_void,
        ));

        gl::call!(gl::BindFramebuffer(gl::FRAMEBUFFER, 0));
        gl::call!(gl::DeleteFramebuffers(1, &framebuffer));
        gl::call!(gl::DeleteRenderbuffers(2, renderbuffers.as_ptr()));
        self.viewport = previous_viewport;
        gl::call!(gl::Viewport(0, 0, previous_viewport.0, previous_viewport.1));

        let mut rgb = rgba_to_rgb(&rgba);
        flip_rows(&mut rgb, width as usize, height as usize, 3);
        Ok(rgb)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        gl::call!(gl::DeleteVertexArrays(
            self.gl_vaos.len() as i32,
            self.gl_vaos.as_ptr(),
        ));
        gl::call!(gl::DeleteBuffers(
            self.gl_buffers.len() as i32,
            self.gl_buffers.as_ptr(),
        ));
        gl::call!(gl::DeleteBuffers(
            self.synthesized_buffers.len() as i32,
            self.synthesized_buffers.as_ptr(),
        ));
        gl::call!(gl::DeleteTextures(
            self.gl_textures.len() as i32,
            self.gl_textures.as_ptr(),
        ));
        gl::call!(gl::DeleteTextures(1, &self.white_texture));
        gl::call!(gl::DeleteProgram(self.program.program));
    }
}

/// Where a material channel's texture unit points for one draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TextureBinding {
    /// Index into the scene texture table (resolvable by construction).
    Scene(usize),
    /// The 1x1 fallback white texture.
    White,
    /// Texture name 0, explicitly clearing the unit.
    Unbound,
}

struct ResolvedMaterial {
    base_color_factor: [f32; 4],
    metallic_factor: f32,
    roughness_factor: f32,
    emissive_factor: [f32; 3],
    occlusion_strength: f32,
    has_normal_map: bool,
    base_color: TextureBinding,
    metallic_roughness: TextureBinding,
    emissive: TextureBinding,
    occlusion: TextureBinding,
    normal: TextureBinding,
}

/// The material binding contract, computed without touching the device.
/// An absent material index yields the implicit default: opaque white, no
/// maps. A texture reference whose image never resolved takes the channel's
/// fallback instead.
fn resolve_material(document: &Document, material_index: Option<usize>) -> ResolvedMaterial {
    let Some(material) = material_index.map(|index| &document.materials[index]) else {
        return ResolvedMaterial {
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            emissive_factor: [0.0, 0.0, 0.0],
            occlusion_strength: 0.0,
            has_normal_map: false,
            base_color: TextureBinding::White,
            metallic_roughness: TextureBinding::White,
            emissive: TextureBinding::Unbound,
            occlusion: TextureBinding::Unbound,
            normal: TextureBinding::Unbound,
        };
    };

    let resolve = |texture_index: Option<usize>, fallback: TextureBinding| {
        match texture_index {
            Some(index) if texture_resolves(document, index) => TextureBinding::Scene(index),
            _ => fallback,
        }
    };
    let normal = resolve(material.normal_texture, TextureBinding::Unbound);
    ResolvedMaterial {
        base_color_factor: material.base_color_factor,
        metallic_factor: material.metallic_factor,
        roughness_factor: material.roughness_factor,
        emissive_factor: material.emissive_factor,
        occlusion_strength: material.occlusion_strength,
        has_normal_map: matches!(normal, TextureBinding::Scene(_)),
        base_color: resolve(material.base_color_texture, TextureBinding::White),
        metallic_roughness: resolve(material.metallic_roughness_texture, TextureBinding::White),
        emissive: resolve(material.emissive_texture, TextureBinding::Unbound),
        occlusion: resolve(material.occlusion_texture, TextureBinding::White),
        normal,
    }
}

fn texture_resolves(document: &Document, texture_index: usize) -> bool {
    document.textures[texture_index]
        .source
        .map(|source| !document.images[source].pixels.is_empty())
        .unwrap_or(false)
}

fn uniform_mat4(location: gl::types::GLint, matrix: &Mat4) {
    let values = matrix.to_cols_array();
    gl::call!(gl::UniformMatrix4fv(location, 1, gl::FALSE, values.as_ptr()));
}

fn uniform_vec3(location: gl::types::GLint, value: Vec3) {
    gl::call!(gl::Uniform3f(location, value.x, value.y, value.z));
}

fn uniform_bool(location: gl::types::GLint, value: bool) {
    gl::call!(gl::Uniform1i(location, value as i32));
}

/// Flips pixel rows in place, converting between top-left and bottom-left
/// origin.
fn flip_rows(pixels: &mut [u8], width: usize, height: usize, bytes_per_pixel: usize) {
    let row_length = width * bytes_per_pixel;
    for row in 0..height / 2 {
        let opposite = height - 1 - row;
        let (top, bottom) = pixels.split_at_mut(opposite * row_length);
        top[row * row_length..(row + 1) * row_length]
            .swap_with_slice(&mut bottom[..row_length]);
    }
}

fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .flat_map(|pixel| [pixel[0], pixel[1], pixel[2]])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use document::{Image, Material, Texture};

    fn document_with_materials(materials: Vec<Material>) -> Document {
        Document {
            buffers: Vec::new(),
            buffer_views: Vec::new(),
            accessors: Vec::new(),
            images: vec![
                Image {
                    pixels: vec![255; 4],
                    width: 1,
                    height: 1,
                },
                Image {
                    pixels: Vec::new(),
                    width: 0,
                    height: 0,
                },
            ],
            samplers: Vec::new(),
            textures: vec![
                Texture {
                    source: Some(0),
                    sampler: None,
                },
                Texture {
                    source: Some(1),
                    sampler: None,
                },
                Texture {
                    source: None,
                    sampler: None,
                },
            ],
            materials,
            meshes: Vec::new(),
            nodes: Vec::new(),
            scenes: Vec::new(),
            default_scene: None,
        }
    }

    fn plain_material() -> Material {
        Material {
            base_color_factor: [0.2, 0.4, 0.6, 1.0],
            base_color_texture: None,
            metallic_factor: 0.3,
            roughness_factor: 0.7,
            metallic_roughness_texture: None,
            emissive_factor: [0.1, 0.0, 0.0],
            emissive_texture: None,
            normal_texture: None,
            occlusion_texture: None,
            occlusion_strength: 0.5,
        }
    }

    #[test]
    fn absent_material_binds_the_implicit_default() {
        let document = document_with_materials(Vec::new());
        let resolved = resolve_material(&document, None);
        assert_eq!(resolved.base_color_factor, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(resolved.metallic_factor, 1.0);
        assert_eq!(resolved.roughness_factor, 1.0);
        assert_eq!(resolved.emissive_factor, [0.0, 0.0, 0.0]);
        assert_eq!(resolved.occlusion_strength, 0.0);
        assert_eq!(resolved.base_color, TextureBinding::White);
        assert_eq!(resolved.occlusion, TextureBinding::Unbound);
        assert_eq!(resolved.normal, TextureBinding::Unbound);
        assert!(!resolved.has_normal_map);
    }

    #[test]
    fn material_factors_pass_through_with_per_channel_fallbacks() {
        let document = document_with_materials(vec![plain_material()]);
        let resolved = resolve_material(&document, Some(0));
        assert_eq!(resolved.base_color_factor, [0.2, 0.4, 0.6, 1.0]);
        assert_eq!(resolved.metallic_factor, 0.3);
        assert_eq!(resolved.roughness_factor, 0.7);
        assert_eq!(resolved.occlusion_strength, 0.5);
        assert_eq!(resolved.base_color, TextureBinding::White);
        assert_eq!(resolved.metallic_roughness, TextureBinding::White);
        assert_eq!(resolved.emissive, TextureBinding::Unbound);
        assert_eq!(resolved.occlusion, TextureBinding::White);
        assert!(!resolved.has_normal_map);
    }

    #[test]
    fn resolvable_textures_bind_and_set_the_normal_map_flag() {
        let mut material = plain_material();
        material.base_color_texture = Some(0);
        material.normal_texture = Some(0);
        let document = document_with_materials(vec![material]);
        let resolved = resolve_material(&document, Some(0));
        assert_eq!(resolved.base_color, TextureBinding::Scene(0));
        assert_eq!(resolved.normal, TextureBinding::Scene(0));
        assert!(resolved.has_normal_map);
    }

    #[test]
    fn unresolvable_textures_take_the_channel_fallback() {
        let mut material = plain_material();
        // Texture 1 has an empty image, texture 2 has no source at all.
        material.base_color_texture = Some(1);
        material.emissive_texture = Some(1);
        material.normal_texture = Some(2);
        let document = document_with_materials(vec![material]);
        let resolved = resolve_material(&document, Some(0));
        assert_eq!(resolved.base_color, TextureBinding::White);
        assert_eq!(resolved.emissive, TextureBinding::Unbound);
        assert_eq!(resolved.normal, TextureBinding::Unbound);
        assert!(!resolved.has_normal_map);
    }

    #[test]
    fn flipping_rows_twice_is_the_identity() {
        let mut pixels: Vec<u8> = (0..36).collect();
        let unflipped = pixels.clone();
        flip_rows(&mut pixels, 4, 3, 3);
        assert_ne!(pixels, unflipped);
        flip_rows(&mut pixels, 4, 3, 3);
        assert_eq!(pixels, unflipped);
    }

    #[test]
    fn flipped_rows_swap_top_and_bottom() {
        let mut pixels = vec![
            1, 1, 1, 1, //
            2, 2, 2, 2, //
            3, 3, 3, 3, //
        ];
        flip_rows(&mut pixels, 4, 3, 1);
        assert_eq!(pixels, vec![3, 3, 3, 3, 2, 2, 2, 2, 1, 1, 1, 1]);
    }

    #[test]
    fn rgba_strips_to_rgb() {
        let rgba = [10, 20, 30, 255, 40, 50, 60, 128];
        assert_eq!(rgba_to_rgb(&rgba), vec![10, 20, 30, 40, 50, 60]);
    }
}

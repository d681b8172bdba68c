use std::ffi::c_void;

use anyhow::{anyhow, ensure, Result};

use crate::renderer::document::{Document, Primitive, Sampler};
use crate::renderer::draw_calls::{vao_ranges, DrawCall, IndexedDraw, VaoRange};
use crate::renderer::gl;
use crate::renderer::tangents;

pub const ATTR_LOC_POSITION: gl::types::GLuint = 0;
pub const ATTR_LOC_NORMAL: gl::types::GLuint = 1;
pub const ATTR_LOC_TEXCOORD_0: gl::types::GLuint = 2;
pub const ATTR_LOC_TANGENT: gl::types::GLuint = 3;
pub const ATTR_LOC_BITANGENT: gl::types::GLuint = 4;

const GL_TRIANGLES_MODE: u32 = 4;

/// One immutable device buffer per document buffer, uploaded verbatim.
/// Device buffer creation failure is fatal to the run.
pub fn build_buffers(document: &Document) -> Result<Vec<gl::types::GLuint>> {
    let mut gl_buffers = vec![0; document.buffers.len()];
    gl::call!(gl::GenBuffers(
        gl_buffers.len() as i32,
        gl_buffers.as_mut_ptr(),
    ));
    for (buffer, &gl_buffer) in document.buffers.iter().zip(&gl_buffers) {
        ensure!(gl_buffer != 0, "device buffer creation failed");
        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, gl_buffer));
        gl::buffer_data(gl::ARRAY_BUFFER, &buffer.data, gl::STATIC_DRAW);
    }
    gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, 0));
    Ok(gl_buffers)
}

pub struct VertexArrays {
    /// One VAO per primitive, flattened mesh-major; addressed via `ranges`.
    pub vaos: Vec<gl::types::GLuint>,
    pub ranges: Vec<VaoRange>,
    pub draw_calls: Vec<DrawCall>,
    /// Buffers created for synthesized tangent/bitangent data, kept only so
    /// they can be deleted at teardown.
    pub synthesized_buffers: Vec<gl::types::GLuint>,
}

pub fn build_vertex_arrays(
    document: &Document,
    gl_buffers: &[gl::types::GLuint],
) -> Result<VertexArrays> {
    let ranges = vao_ranges(document.meshes.iter().map(|mesh| mesh.primitives.len()));
    let primitive_count = ranges.last().map(|r| r.begin + r.count).unwrap_or(0);

    let mut vaos = vec![0; primitive_count];
    if primitive_count > 0 {
        gl::call!(gl::GenVertexArrays(vaos.len() as i32, vaos.as_mut_ptr()));
    }
    let mut draw_calls = Vec::with_capacity(primitive_count);
    let mut synthesized_buffers = Vec::new();

    let mut flat_index = 0;
    for mesh in &document.meshes {
        for primitive in &mesh.primitives {
            let vao = vaos[flat_index];
            ensure!(vao != 0, "vertex array creation failed");
            flat_index += 1;
            gl::call!(gl::BindVertexArray(vao));

            for (semantic, location) in [
                ("POSITION", ATTR_LOC_POSITION),
                ("NORMAL", ATTR_LOC_NORMAL),
                ("TEXCOORD_0", ATTR_LOC_TEXCOORD_0),
            ] {
                // Absent semantics leave the slot unconfigured; the shader
                // sees default attribute data for it.
                let Some(accessor_index) = primitive.attribute(semantic) else {
                    continue;
                };
                configure_attribute(document, gl_buffers, accessor_index, location);
            }

            synthesize_tangent_basis(document, primitive, &mut synthesized_buffers);

            let vertex_count_accessor = primitive
                .attribute("POSITION")
                .or_else(|| primitive.attributes.values().next().copied())
                .ok_or_else(|| anyhow!("primitive has no vertex attributes"))?;
            let vertex_count = document.accessors[vertex_count_accessor].count as i32;

            let indices = match primitive.indices {
                Some(accessor_index) => {
                    let accessor = &document.accessors[accessor_index];
                    let view_index = accessor
                        .buffer_view
                        .ok_or_else(|| anyhow!("index accessor has no buffer view"))?;
                    let view = &document.buffer_views[view_index];
                    gl::call!(gl::BindBuffer(
                        gl::ELEMENT_ARRAY_BUFFER,
                        gl_buffers[view.buffer],
                    ));
                    Some(IndexedDraw {
                        count: accessor.count as i32,
                        component_type: accessor.component_type.gl_code(),
                        byte_offset: view.byte_offset + accessor.byte_offset,
                    })
                }
                None => None,
            };

            draw_calls.push(DrawCall {
                vao,
                mode: primitive.mode,
                material: primitive.material,
                vertex_count,
                indices,
            });
        }
    }
    gl::call!(gl::BindVertexArray(0));
    gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, 0));

    Ok(VertexArrays {
        vaos,
        ranges,
        draw_calls,
        synthesized_buffers,
    })
}

fn configure_attribute(
    document: &Document,
    gl_buffers: &[gl::types::GLuint],
    accessor_index: usize,
    location: gl::types::GLuint,
) {
    let accessor = &document.accessors[accessor_index];
    let Some(view_index) = accessor.buffer_view else {
        return;
    };
    let view = &document.buffer_views[view_index];
    gl::call!(gl::EnableVertexAttribArray(location));
    gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, gl_buffers[view.buffer]));
    let byte_offset = view.byte_offset + accessor.byte_offset;
    gl::call!(gl::VertexAttribPointer(
        location,
        accessor.element_type.component_count() as i32,
        accessor.component_type.gl_code(),
        if accessor.normalized { gl::TRUE } else { gl::FALSE },
        // 0 means tightly packed, matching the accessor's element size.
        view.byte_stride.unwrap_or(0) as i32,
        byte_offset as *const c_void,
    ));
}

/// Uploads flat tangent/bitangent attribute buffers for a triangle primitive
/// that has positions and texcoords. A primitive that can't be synthesized
/// (non-triangles, missing or non-float attributes, unsupported index
/// component type) renders without tangent data.
fn synthesize_tangent_basis(
    document: &Document,
    primitive: &Primitive,
    synthesized_buffers: &mut Vec<gl::types::GLuint>,
) {
    if primitive.mode != GL_TRIANGLES_MODE {
        return;
    }
    let (Some(position_accessor), Some(texcoord_accessor)) = (
        primitive.attribute("POSITION"),
        primitive.attribute("TEXCOORD_0"),
    ) else {
        return;
    };
    let positions = match document.read_vec3_f32(position_accessor) {
        Ok(positions) => positions,
        Err(err) => {
            log::warn!("skipping tangent synthesis: {err}");
            return;
        }
    };
    let texcoords = match document.read_vec2_f32(texcoord_accessor) {
        Ok(texcoords) => texcoords,
        Err(err) => {
            log::warn!("skipping tangent synthesis: {err}");
            return;
        }
    };
    let indices = match primitive.indices {
        Some(accessor_index) => match document.read_indices(accessor_index) {
            Ok(indices) => Some(indices),
            Err(err) => {
                log::warn!("skipping tangent synthesis: {err}");
                return;
            }
        },
        None => None,
    };

    let basis = tangents::generate(&positions, &texcoords, indices.as_deref());
    for (data, location) in [
        (&basis.tangents, ATTR_LOC_TANGENT),
        (&basis.bitangents, ATTR_LOC_BITANGENT),
    ] {
        let mut buffer = 0;
        gl::call!(gl::GenBuffers(1, &mut buffer));
        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, buffer));
        gl::buffer_data(gl::ARRAY_BUFFER, bytemuck::cast_slice(data), gl::STATIC_DRAW);
        gl::call!(gl::EnableVertexAttribArray(location));
        gl::call!(gl::VertexAttribPointer(
            location,
            3,
            gl::FLOAT,
            gl::FALSE,
            0,
            std::ptr::null(),
        ));
        synthesized_buffers.push(buffer);
    }
}

/// One table entry per document texture, 1:1. Textures without a resolvable
/// source image stay name 0 and are never bound; the material binder
/// substitutes the unit's fallback instead.
pub fn build_textures(document: &Document) -> Vec<gl::types::GLuint> {
    let mut gl_textures = Vec::with_capacity(document.textures.len());
    for (i, texture) in document.textures.iter().enumerate() {
        let image = texture.source.map(|source| &document.images[source]);
        let Some(image) = image.filter(|image| !image.pixels.is_empty()) else {
            log::warn!("texture {i} has no resolvable source image");
            gl_textures.push(0);
            continue;
        };

        let mut gl_texture = 0;
        gl::call!(gl::GenTextures(1, &mut gl_texture));
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, gl_texture));
        gl::call!(gl::TexImage2D(
            gl::TEXTURE_2D,
            0,
            gl::RGBA8 as i32,
            image.width as i32,
            image.height as i32,
            0,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            image.pixels.as_ptr() as *const c_void,
        ));

        let sampler = texture.sampler.map(|sampler| document.samplers[sampler]);
        let resolved = ResolvedSampler::from(sampler);
        gl::call!(gl::TexParameteri(
            gl::TEXTURE_2D,
            gl::TEXTURE_WRAP_S,
            resolved.wrap_s as i32,
        ));
        gl::call!(gl::TexParameteri(
            gl::TEXTURE_2D,
            gl::TEXTURE_WRAP_T,
            resolved.wrap_t as i32,
        ));
        gl::call!(gl::TexParameteri(
            gl::TEXTURE_2D,
            gl::TEXTURE_WRAP_R,
            gl::REPEAT as i32,
        ));
        gl::call!(gl::TexParameteri(
            gl::TEXTURE_2D,
            gl::TEXTURE_MIN_FILTER,
            resolved.min_filter as i32,
        ));
        gl::call!(gl::TexParameteri(
            gl::TEXTURE_2D,
            gl::TEXTURE_MAG_FILTER,
            resolved.mag_filter as i32,
        ));
        if resolved.needs_mipmaps() {
            gl::call!(gl::GenerateMipmap(gl::TEXTURE_2D));
        }
        gl_textures.push(gl_texture);
    }
    gl::call!(gl::BindTexture(gl::TEXTURE_2D, 0));
    gl_textures
}

/// 1x1 opaque white texture bound wherever a material has no map so the
/// shader's factor-times-sample formulation stays uniform.
pub fn create_white_texture() -> gl::types::GLuint {
    let mut gl_texture = 0;
    gl::call!(gl::GenTextures(1, &mut gl_texture));
    gl::call!(gl::BindTexture(gl::TEXTURE_2D, gl_texture));
    let white = [255u8; 4];
    gl::call!(gl::TexImage2D(
        gl::TEXTURE_2D,
        0,
        gl::RGBA8 as i32,
        1,
        1,
        0,
        gl::RGBA,
        gl::UNSIGNED_BYTE,
        white.as_ptr() as *const c_void,
    ));
    gl::call!(gl::TexParameteri(
        gl::TEXTURE_2D,
        gl::TEXTURE_MIN_FILTER,
        gl::NEAREST as i32,
    ));
    gl::call!(gl::TexParameteri(
        gl::TEXTURE_2D,
        gl::TEXTURE_MAG_FILTER,
        gl::NEAREST as i32,
    ));
    gl::call!(gl::BindTexture(gl::TEXTURE_2D, 0));
    gl_texture
}

/// Sampler state with the glTF defaults applied: repeat wrapping and linear
/// filtering when unset.
struct ResolvedSampler {
    wrap_s: u32,
    wrap_t: u32,
    min_filter: u32,
    mag_filter: u32,
}

impl ResolvedSampler {
    fn from(sampler: Option<Sampler>) -> ResolvedSampler {
        let sampler = sampler.unwrap_or_default();
        ResolvedSampler {
            wrap_s: sampler.wrap_s.unwrap_or(gl::REPEAT),
            wrap_t: sampler.wrap_t.unwrap_or(gl::REPEAT),
            min_filter: sampler.min_filter.unwrap_or(gl::LINEAR),
            mag_filter: sampler.mag_filter.unwrap_or(gl::LINEAR),
        }
    }

    /// Mipmaps are generated only for the four mipmapped minification
    /// filters.
    fn needs_mipmaps(&self) -> bool {
        matches!(
            self.min_filter,
            gl::NEAREST_MIPMAP_NEAREST
                | gl::LINEAR_MIPMAP_NEAREST
                | gl::NEAREST_MIPMAP_LINEAR
                | gl::LINEAR_MIPMAP_LINEAR
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sampler_is_repeat_and_linear() {
        let resolved = ResolvedSampler::from(None);
        assert_eq!(resolved.wrap_s, gl::REPEAT);
        assert_eq!(resolved.wrap_t, gl::REPEAT);
        assert_eq!(resolved.min_filter, gl::LINEAR);
        assert_eq!(resolved.mag_filter, gl::LINEAR);
        assert!(!resolved.needs_mipmaps());
    }

    #[test]
    fn mipmaps_only_for_mipmapped_min_filters() {
        for min_filter in [
            gl::NEAREST_MIPMAP_NEAREST,
            gl::LINEAR_MIPMAP_NEAREST,
            gl::NEAREST_MIPMAP_LINEAR,
            gl::LINEAR_MIPMAP_LINEAR,
        ] {
            let resolved = ResolvedSampler::from(Some(Sampler {
                min_filter: Some(min_filter),
                ..Sampler::default()
            }));
            assert!(resolved.needs_mipmaps());
        }
        let trilinear_mag_only = ResolvedSampler::from(Some(Sampler {
            mag_filter: Some(gl::LINEAR),
            ..Sampler::default()
        }));
        assert!(!trilinear_mag_only.needs_mipmaps());
    }
}

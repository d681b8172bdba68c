use std::collections::HashMap;

use anyhow::{anyhow, bail, ensure, Result};
use glam::{Mat4, Vec2, Vec3};

/// Immutable in-memory description of a glTF asset. Indices between the
/// tables follow the glTF convention: every cross-reference is a position
/// into one of these vectors, resolved at load time.
pub struct Document {
    pub buffers: Vec<Buffer>,
    pub buffer_views: Vec<BufferView>,
    pub accessors: Vec<Accessor>,
    pub images: Vec<Image>,
    pub samplers: Vec<Sampler>,
    pub textures: Vec<Texture>,
    pub materials: Vec<Material>,
    pub meshes: Vec<Mesh>,
    pub nodes: Vec<Node>,
    pub scenes: Vec<Scene>,
    pub default_scene: Option<usize>,
}

pub struct Buffer {
    pub data: Vec<u8>,
}

pub struct BufferView {
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    /// None means tightly packed for whatever accessor reads through this
    /// view.
    pub byte_stride: Option<usize>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    UnsignedInt,
    Float,
}

impl ComponentType {
    pub fn from_code(code: u32) -> Result<ComponentType> {
        Ok(match code {
            5120 => ComponentType::Byte,
            5121 => ComponentType::UnsignedByte,
            5122 => ComponentType::Short,
            5123 => ComponentType::UnsignedShort,
            5125 => ComponentType::UnsignedInt,
            5126 => ComponentType::Float,
            code => bail!("unrecognized accessor component type {code}"),
        })
    }

    /// The GL enum value, which glTF component type codes are defined to
    /// match.
    pub fn gl_code(self) -> u32 {
        match self {
            ComponentType::Byte => 5120,
            ComponentType::UnsignedByte => 5121,
            ComponentType::Short => 5122,
            ComponentType::UnsignedShort => 5123,
            ComponentType::UnsignedInt => 5125,
            ComponentType::Float => 5126,
        }
    }

    pub fn byte_size(self) -> usize {
        match self {
            ComponentType::Byte | ComponentType::UnsignedByte => 1,
            ComponentType::Short | ComponentType::UnsignedShort => 2,
            ComponentType::UnsignedInt | ComponentType::Float => 4,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ElementType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
}

impl ElementType {
    pub fn from_name(name: &str) -> Result<ElementType> {
        Ok(match name {
            "SCALAR" => ElementType::Scalar,
            "VEC2" => ElementType::Vec2,
            "VEC3" => ElementType::Vec3,
            "VEC4" => ElementType::Vec4,
            name => bail!("unsupported accessor element type \"{name}\""),
        })
    }

    pub fn component_count(self) -> usize {
        match self {
            ElementType::Scalar => 1,
            ElementType::Vec2 => 2,
            ElementType::Vec3 => 3,
            ElementType::Vec4 => 4,
        }
    }
}

/// A typed, strided view into a buffer.
pub struct Accessor {
    pub buffer_view: Option<usize>,
    pub byte_offset: usize,
    pub component_type: ComponentType,
    pub element_type: ElementType,
    pub count: usize,
    pub normalized: bool,
}

impl Accessor {
    pub fn element_size(&self) -> usize {
        self.component_type.byte_size() * self.element_type.component_count()
    }
}

/// Decoded pixel source, always RGBA8.
pub struct Image {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Wrap and filter codes as glTF/GL enums; None falls back to repeat wrap
/// and linear filtering at upload time.
#[derive(Default, Clone, Copy)]
pub struct Sampler {
    pub wrap_s: Option<u32>,
    pub wrap_t: Option<u32>,
    pub min_filter: Option<u32>,
    pub mag_filter: Option<u32>,
}

pub struct Texture {
    pub source: Option<usize>,
    pub sampler: Option<usize>,
}

pub struct Material {
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<usize>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub metallic_roughness_texture: Option<usize>,
    pub emissive_factor: [f32; 3],
    pub emissive_texture: Option<usize>,
    pub normal_texture: Option<usize>,
    pub occlusion_texture: Option<usize>,
    pub occlusion_strength: f32,
}

pub struct Mesh {
    pub primitives: Vec<Primitive>,
}

pub struct Primitive {
    /// Semantic name ("POSITION", "NORMAL", "TEXCOORD_0", ...) to accessor
    /// index.
    pub attributes: HashMap<String, usize>,
    pub indices: Option<usize>,
    /// Topology as a GL enum; glTF defaults to 4 (TRIANGLES).
    pub mode: u32,
    pub material: Option<usize>,
}

impl Primitive {
    pub fn attribute(&self, semantic: &str) -> Option<usize> {
        self.attributes.get(semantic).copied()
    }
}

pub struct Node {
    /// TRS or explicit matrix, collapsed to one local transform at load.
    pub local_matrix: Mat4,
    pub mesh: Option<usize>,
    pub children: Vec<usize>,
}

pub struct Scene {
    pub nodes: Vec<usize>,
}

impl Document {
    /// Explicit buffer-view stride, or the accessor's tightly packed element
    /// size when the view leaves it unset.
    pub fn effective_stride(&self, accessor_index: usize) -> usize {
        let accessor = &self.accessors[accessor_index];
        accessor
            .buffer_view
            .and_then(|view| self.buffer_views[view].byte_stride)
            .unwrap_or_else(|| accessor.element_size())
    }

    /// Checks that every buffer view lies within its buffer and every
    /// element of every buffer-backed accessor stays within the buffer. Run
    /// once after load; the byte readers rely on it.
    pub fn validate(&self) -> Result<()> {
        for (i, view) in self.buffer_views.iter().enumerate() {
            let buffer = self
                .buffers
                .get(view.buffer)
                .ok_or_else(|| anyhow!("buffer view {i} references buffer {}", view.buffer))?;
            ensure!(
                view.byte_offset + view.byte_length <= buffer.data.len(),
                "buffer view {i} reads past the end of buffer {}",
                view.buffer,
            );
        }
        for (i, accessor) in self.accessors.iter().enumerate() {
            let Some(view_index) = accessor.buffer_view else {
                continue;
            };
            let view = self
                .buffer_views
                .get(view_index)
                .ok_or_else(|| anyhow!("accessor {i} references buffer view {view_index}"))?;
            let buffer = self
                .buffers
                .get(view.buffer)
                .ok_or_else(|| anyhow!("buffer view {view_index} references buffer {}", view.buffer))?;
            if accessor.count == 0 {
                continue;
            }
            let stride = self.effective_stride(i);
            let start = view.byte_offset + accessor.byte_offset;
            let end = start + stride * (accessor.count - 1) + accessor.element_size();
            ensure!(
                end <= buffer.data.len(),
                "accessor {i} reads past the end of buffer {} ({end} > {})",
                view.buffer,
                buffer.data.len(),
            );
        }
        Ok(())
    }

    fn accessor_base(&self, accessor_index: usize) -> Result<(&[u8], usize, usize)> {
        let accessor = &self.accessors[accessor_index];
        let view_index = accessor
            .buffer_view
            .ok_or_else(|| anyhow!("accessor {accessor_index} has no buffer view"))?;
        let view = &self.buffer_views[view_index];
        let base = view.byte_offset + accessor.byte_offset;
        let stride = self.effective_stride(accessor_index);
        Ok((&self.buffers[view.buffer].data, base, stride))
    }

    pub fn read_vec3_f32(&self, accessor_index: usize) -> Result<Vec<Vec3>> {
        let accessor = &self.accessors[accessor_index];
        ensure!(
            accessor.component_type == ComponentType::Float
                && accessor.element_type == ElementType::Vec3,
            "accessor {accessor_index} is not a float vec3",
        );
        let (data, base, stride) = self.accessor_base(accessor_index)?;
        let mut out = Vec::with_capacity(accessor.count);
        for i in 0..accessor.count {
            let offset = base + stride * i;
            out.push(Vec3::new(
                f32_at(data, offset),
                f32_at(data, offset + 4),
                f32_at(data, offset + 8),
            ));
        }
        Ok(out)
    }

    pub fn read_vec2_f32(&self, accessor_index: usize) -> Result<Vec<Vec2>> {
        let accessor = &self.accessors[accessor_index];
        ensure!(
            accessor.component_type == ComponentType::Float
                && accessor.element_type == ElementType::Vec2,
            "accessor {accessor_index} is not a float vec2",
        );
        let (data, base, stride) = self.accessor_base(accessor_index)?;
        let mut out = Vec::with_capacity(accessor.count);
        for i in 0..accessor.count {
            let offset = base + stride * i;
            out.push(Vec2::new(f32_at(data, offset), f32_at(data, offset + 4)));
        }
        Ok(out)
    }

    /// Decodes an index accessor to u32, little-endian. Only the three
    /// unsigned integer widths are valid index component types.
    pub fn read_indices(&self, accessor_index: usize) -> Result<Vec<u32>> {
        let accessor = &self.accessors[accessor_index];
        let component_type = accessor.component_type;
        let (data, base, stride) = self.accessor_base(accessor_index)?;
        let mut out = Vec::with_capacity(accessor.count);
        for i in 0..accessor.count {
            let offset = base + stride * i;
            out.push(match component_type {
                ComponentType::UnsignedByte => data[offset] as u32,
                ComponentType::UnsignedShort => {
                    u16::from_le_bytes([data[offset], data[offset + 1]]) as u32
                }
                ComponentType::UnsignedInt => u32::from_le_bytes([
                    data[offset],
                    data[offset + 1],
                    data[offset + 2],
                    data[offset + 3],
                ]),
                other => bail!(
                    "index accessor {accessor_index} has non-index component type {other:?}"
                ),
            });
        }
        Ok(out)
    }

    /// Walks the node forest of a scene depth-first with an explicit
    /// worklist, accumulating parent-to-child transforms, and calls `visit`
    /// for every node that references a mesh. Children are visited in listed
    /// order. Acyclicity of the forest is assumed, not verified.
    pub fn visit_drawables(&self, scene_index: usize, mut visit: impl FnMut(usize, Mat4)) {
        let scene = &self.scenes[scene_index];
        let mut worklist: Vec<(usize, Mat4)> = scene
            .nodes
            .iter()
            .rev()
            .map(|&node| (node, Mat4::IDENTITY))
            .collect();
        while let Some((node_index, parent_matrix)) = worklist.pop() {
            let node = &self.nodes[node_index];
            let world_matrix = parent_matrix * node.local_matrix;
            if let Some(mesh_index) = node.mesh {
                visit(mesh_index, world_matrix);
            }
            for &child in node.children.iter().rev() {
                worklist.push((child, world_matrix));
            }
        }
    }

    /// World-space bounding box of all POSITION data reachable from the
    /// scene's roots. None when the scene has no readable positions.
    pub fn scene_bounds(&self, scene_index: usize) -> Option<(Vec3, Vec3)> {
        let mut bounds: Option<(Vec3, Vec3)> = None;
        self.visit_drawables(scene_index, |mesh_index, world_matrix| {
            for primitive in &self.meshes[mesh_index].primitives {
                let Some(position_accessor) = primitive.attribute("POSITION") else {
                    continue;
                };
                let positions = match self.read_vec3_f32(position_accessor) {
                    Ok(positions) => positions,
                    Err(err) => {
                        log::debug!("skipping primitive while computing bounds: {err}");
                        continue;
                    }
                };
                for position in positions {
                    let world = world_matrix.transform_point3(position);
                    bounds = Some(match bounds {
                        None => (world, world),
                        Some((min, max)) => (min.min(world), max.max(world)),
                    });
                }
            }
        });
        bounds
    }
}

fn f32_at(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, ensure, Context, Result};
use glam::{Mat4, Quat, Vec3};
use tinyjson::JsonValue;

use crate::renderer::document::{
    Accessor, Buffer, BufferView, ComponentType, Document, ElementType, Image, Material, Mesh,
    Node, Primitive, Sampler, Scene, Texture,
};

/// Reads a .gltf document and its sibling resources (buffer payloads,
/// images) into a [`Document`]. GLB containers and data: URIs are not
/// supported; buffers referencing them are errors, images degrade to an
/// unresolvable source.
pub fn load(path: &Path) -> Result<Document> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let root: JsonValue = text
        .parse()
        .map_err(|err| anyhow!("malformed glTF document {}: {err:?}", path.display()))?;
    let root: &HashMap<String, JsonValue> = root
        .get()
        .ok_or_else(|| anyhow!("glTF root is not an object"))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut buffers = Vec::new();
    for buffer in array(root, "buffers")? {
        let buffer: &HashMap<String, JsonValue> = object(buffer)?;
        let byte_length = take_usize(member(buffer, "byteLength")?)?;
        let uri = take_str(member(buffer, "uri").context("GLB-style buffers without a uri are not supported")?)?;
        ensure!(
            !uri.starts_with("data:"),
            "data: buffer URIs are not supported",
        );
        let data = fs::read(base_dir.join(uri))
            .with_context(|| format!("failed to read buffer payload {uri}"))?;
        ensure!(
            data.len() >= byte_length,
            "buffer payload {uri} is shorter than its declared byteLength",
        );
        buffers.push(Buffer { data });
    }

    let mut buffer_views = Vec::new();
    for view in array(root, "bufferViews")? {
        let view: &HashMap<String, JsonValue> = object(view)?;
        buffer_views.push(BufferView {
            buffer: take_usize(member(view, "buffer")?)?,
            byte_offset: optional_usize(view, "byteOffset")?.unwrap_or(0),
            byte_length: take_usize(member(view, "byteLength")?)?,
            byte_stride: optional_usize(view, "byteStride")?,
        });
    }

    let mut accessors = Vec::new();
    for accessor in array(root, "accessors")? {
        let accessor: &HashMap<String, JsonValue> = object(accessor)?;
        accessors.push(Accessor {
            buffer_view: optional_usize(accessor, "bufferView")?,
            byte_offset: optional_usize(accessor, "byteOffset")?.unwrap_or(0),
            component_type: ComponentType::from_code(
                take_usize(member(accessor, "componentType")?)? as u32,
            )?,
            element_type: ElementType::from_name(take_str(member(accessor, "type")?)?)?,
            count: take_usize(member(accessor, "count")?)?,
            normalized: accessor
                .get("normalized")
                .map(|v| v.get::<bool>().copied().unwrap_or(false))
                .unwrap_or(false),
        });
    }

    let mut images = Vec::new();
    for image in array(root, "images")? {
        let image: &HashMap<String, JsonValue> = object(image)?;
        images.push(load_image(base_dir, image));
    }

    let mut samplers = Vec::new();
    for sampler in array(root, "samplers")? {
        let sampler: &HashMap<String, JsonValue> = object(sampler)?;
        samplers.push(Sampler {
            wrap_s: optional_usize(sampler, "wrapS")?.map(|v| v as u32),
            wrap_t: optional_usize(sampler, "wrapT")?.map(|v| v as u32),
            min_filter: optional_usize(sampler, "minFilter")?.map(|v| v as u32),
            mag_filter: optional_usize(sampler, "magFilter")?.map(|v| v as u32),
        });
    }

    let mut textures = Vec::new();
    for texture in array(root, "textures")? {
        let texture: &HashMap<String, JsonValue> = object(texture)?;
        textures.push(Texture {
            source: optional_usize(texture, "source")?,
            sampler: optional_usize(texture, "sampler")?,
        });
    }

    let mut materials = Vec::new();
    for material in array(root, "materials")? {
        let material: &HashMap<String, JsonValue> = object(material)?;
        materials.push(load_material(material)?);
    }

    let mut meshes = Vec::new();
    for mesh in array(root, "meshes")? {
        let mesh: &HashMap<String, JsonValue> = object(mesh)?;
        let mut primitives = Vec::new();
        for primitive in member(mesh, "primitives")?
            .get::<Vec<JsonValue>>()
            .ok_or_else(|| anyhow!("mesh primitives is not an array"))?
        {
            let primitive: &HashMap<String, JsonValue> = object(primitive)?;
            let attributes_json: &HashMap<String, JsonValue> =
                object(member(primitive, "attributes")?)?;
            let mut attributes = HashMap::new();
            for (semantic, accessor) in attributes_json {
                attributes.insert(semantic.clone(), take_usize(accessor)?);
            }
            primitives.push(Primitive {
                attributes,
                indices: optional_usize(primitive, "indices")?,
                mode: optional_usize(primitive, "mode")?.unwrap_or(4) as u32,
                material: optional_usize(primitive, "material")?,
            });
        }
        meshes.push(Mesh { primitives });
    }

    let mut nodes = Vec::new();
    for node in array(root, "nodes")? {
        let node: &HashMap<String, JsonValue> = object(node)?;
        let local_matrix = if let Some(matrix) = node.get("matrix") {
            ensure!(
                !node.contains_key("translation")
                    && !node.contains_key("rotation")
                    && !node.contains_key("scale"),
                "node mixes matrix and TRS transforms",
            );
            take_mat4(matrix)?
        } else {
            let translation = node
                .get("translation")
                .map(take_vec3)
                .transpose()?
                .unwrap_or(Vec3::ZERO);
            let rotation = node
                .get("rotation")
                .map(take_quat)
                .transpose()?
                .unwrap_or(Quat::IDENTITY);
            let scale = node
                .get("scale")
                .map(take_vec3)
                .transpose()?
                .unwrap_or(Vec3::ONE);
            Mat4::from_scale_rotation_translation(scale, rotation, translation)
        };
        let children = match node.get("children") {
            Some(children) => children
                .get::<Vec<JsonValue>>()
                .ok_or_else(|| anyhow!("node children is not an array"))?
                .iter()
                .map(take_usize)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        nodes.push(Node {
            local_matrix,
            mesh: optional_usize(node, "mesh")?,
            children,
        });
    }

    let mut scenes = Vec::new();
    for scene in array(root, "scenes")? {
        let scene: &HashMap<String, JsonValue> = object(scene)?;
        let node_indices = match scene.get("nodes") {
            Some(node_indices) => node_indices
                .get::<Vec<JsonValue>>()
                .ok_or_else(|| anyhow!("scene nodes is not an array"))?
                .iter()
                .map(take_usize)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        scenes.push(Scene {
            nodes: node_indices,
        });
    }

    let document = Document {
        buffers,
        buffer_views,
        accessors,
        images,
        samplers,
        textures,
        materials,
        meshes,
        nodes,
        scenes,
        default_scene: optional_usize(root, "scene")?,
    };
    document.validate()?;
    Ok(document)
}

/// Image decode failures are not fatal: the texture stays unresolvable and
/// the material binder substitutes the unit's fallback later.
fn load_image(base_dir: &Path, image: &HashMap<String, JsonValue>) -> Image {
    let unresolved = Image {
        pixels: Vec::new(),
        width: 0,
        height: 0,
    };
    let Some(uri) = image.get("uri").and_then(|v| v.get::<String>()) else {
        log::warn!("image without a file uri (GLB buffer views are not supported)");
        return unresolved;
    };
    if uri.starts_with("data:") {
        log::warn!("data: image URIs are not supported");
        return unresolved;
    }
    match image::open(base_dir.join(uri)) {
        Ok(decoded) => {
            let decoded = decoded.to_rgba8();
            let (width, height) = decoded.dimensions();
            Image {
                pixels: decoded.into_raw(),
                width,
                height,
            }
        }
        Err(err) => {
            log::warn!("failed to decode image {uri}: {err}");
            unresolved
        }
    }
}

fn load_material(material: &HashMap<String, JsonValue>) -> Result<Material> {
    let pbr: Option<&HashMap<String, JsonValue>> = material
        .get("pbrMetallicRoughness")
        .map(object)
        .transpose()?;
    let base_color_factor = match pbr.and_then(|pbr| pbr.get("baseColorFactor")) {
        Some(factor) => take_f32_array::<4>(factor)?,
        None => [1.0, 1.0, 1.0, 1.0],
    };
    let emissive_factor = match material.get("emissiveFactor") {
        Some(factor) => take_f32_array::<3>(factor)?,
        None => [0.0, 0.0, 0.0],
    };
    let occlusion = material.get("occlusionTexture").map(object).transpose()?;
    Ok(Material {
        base_color_factor,
        base_color_texture: pbr
            .and_then(|pbr| pbr.get("baseColorTexture"))
            .map(texture_index)
            .transpose()?,
        metallic_factor: match pbr.and_then(|pbr| pbr.get("metallicFactor")) {
            Some(factor) => take_f32(factor)?,
            None => 1.0,
        },
        roughness_factor: match pbr.and_then(|pbr| pbr.get("roughnessFactor")) {
            Some(factor) => take_f32(factor)?,
            None => 1.0,
        },
        metallic_roughness_texture: pbr
            .and_then(|pbr| pbr.get("metallicRoughnessTexture"))
            .map(texture_index)
            .transpose()?,
        emissive_factor,
        emissive_texture: material
            .get("emissiveTexture")
            .map(texture_index)
            .transpose()?,
        normal_texture: material
            .get("normalTexture")
            .map(texture_index)
            .transpose()?,
        occlusion_texture: occlusion
            .map(|occlusion| take_usize(member(occlusion, "index")?))
            .transpose()?,
        occlusion_strength: match occlusion.and_then(|occlusion| occlusion.get("strength")) {
            Some(strength) => take_f32(strength)?,
            None => 1.0,
        },
    })
}

fn texture_index(reference: &JsonValue) -> Result<usize> {
    let reference: &HashMap<String, JsonValue> = object(reference)?;
    take_usize(member(reference, "index")?)
}

fn member<'a>(object: &'a HashMap<String, JsonValue>, key: &str) -> Result<&'a JsonValue> {
    object
        .get(key)
        .ok_or_else(|| anyhow!("missing required glTF member \"{key}\""))
}

/// Top-level glTF arrays are all optional; absence reads as empty.
fn array<'a>(root: &'a HashMap<String, JsonValue>, key: &str) -> Result<&'a [JsonValue]> {
    match root.get(key) {
        Some(value) => value
            .get::<Vec<JsonValue>>()
            .map(Vec::as_slice)
            .ok_or_else(|| anyhow!("glTF member \"{key}\" is not an array")),
        None => Ok(&[]),
    }
}

fn object(value: &JsonValue) -> Result<&HashMap<String, JsonValue>> {
    value
        .get()
        .ok_or_else(|| anyhow!("expected a JSON object"))
}

fn take_usize(value: &JsonValue) -> Result<usize> {
    let number: &f64 = value
        .get()
        .ok_or_else(|| anyhow!("expected a JSON number"))?;
    Ok(*number as usize)
}

fn optional_usize(object: &HashMap<String, JsonValue>, key: &str) -> Result<Option<usize>> {
    object.get(key).map(take_usize).transpose()
}

fn take_f32(value: &JsonValue) -> Result<f32> {
    let number: &f64 = value
        .get()
        .ok_or_else(|| anyhow!("expected a JSON number"))?;
    Ok(*number as f32)
}

fn take_str(value: &JsonValue) -> Result<&str> {
    value
        .get::<String>()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("expected a JSON string"))
}

fn take_f32_array<const N: usize>(value: &JsonValue) -> Result<[f32; N]> {
    let values: &Vec<JsonValue> = value
        .get()
        .ok_or_else(|| anyhow!("expected a JSON array"))?;
    ensure!(values.len() == N, "expected an array of {N} numbers");
    let mut out = [0.0; N];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = take_f32(value)?;
    }
    Ok(out)
}

fn take_vec3(value: &JsonValue) -> Result<Vec3> {
    let [x, y, z] = take_f32_array::<3>(value)?;
    Ok(Vec3::new(x, y, z))
}

fn take_quat(value: &JsonValue) -> Result<Quat> {
    let [x, y, z, w] = take_f32_array::<4>(value)?;
    Ok(Quat::from_xyzw(x, y, z, w))
}

fn take_mat4(value: &JsonValue) -> Result<Mat4> {
    let values = take_f32_array::<16>(value)?;
    Ok(Mat4::from_cols_slice(&values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::document::ComponentType;
    use std::io::Write;

    const TRIANGLE_GLTF: &str = r#"{
        "scene": 0,
        "scenes": [{"nodes": [0]}],
        "nodes": [{"mesh": 0, "translation": [0.0, 2.0, 0.0]}],
        "meshes": [{"primitives": [{
            "attributes": {"POSITION": 0, "TEXCOORD_0": 1},
            "indices": 2,
            "material": 0
        }]}],
        "materials": [{
            "pbrMetallicRoughness": {
                "baseColorFactor": [1.0, 0.5, 0.25, 1.0],
                "baseColorTexture": {"index": 0},
                "roughnessFactor": 0.5
            },
            "occlusionTexture": {"index": 0, "strength": 0.75}
        }],
        "textures": [{"source": 0}],
        "images": [{"uri": "white.png"}],
        "accessors": [
            {"bufferView": 0, "componentType": 5126, "type": "VEC3", "count": 3},
            {"bufferView": 1, "componentType": 5126, "type": "VEC2", "count": 3},
            {"bufferView": 2, "componentType": 5123, "type": "SCALAR", "count": 3}
        ],
        "bufferViews": [
            {"buffer": 0, "byteOffset": 0, "byteLength": 36},
            {"buffer": 0, "byteOffset": 36, "byteLength": 24},
            {"buffer": 0, "byteOffset": 60, "byteLength": 6}
        ],
        "buffers": [{"uri": "triangle.bin", "byteLength": 66}]
    }"#;

    fn write_triangle_asset(dir: &Path) -> std::path::PathBuf {
        let mut payload = Vec::new();
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let texcoords: [f32; 6] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        for value in positions.iter().chain(&texcoords) {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        for index in [0u16, 1, 2] {
            payload.extend_from_slice(&index.to_le_bytes());
        }
        fs::write(dir.join("triangle.bin"), payload).unwrap();
        image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 255, 255, 255]))
            .save(dir.join("white.png"))
            .unwrap();
        let gltf_path = dir.join("triangle.gltf");
        let mut file = fs::File::create(&gltf_path).unwrap();
        file.write_all(TRIANGLE_GLTF.as_bytes()).unwrap();
        gltf_path
    }

    #[test]
    fn loads_a_minimal_triangle_document() {
        let dir = tempfile::tempdir().unwrap();
        let document = load(&write_triangle_asset(dir.path())).unwrap();

        assert_eq!(document.default_scene, Some(0));
        assert_eq!(document.meshes.len(), 1);
        let primitive = &document.meshes[0].primitives[0];
        assert_eq!(primitive.attribute("POSITION"), Some(0));
        assert_eq!(primitive.indices, Some(2));
        assert_eq!(primitive.mode, 4);

        let indices = document.read_indices(2).unwrap();
        assert_eq!(indices, vec![0, 1, 2]);
        let positions = document.read_vec3_f32(0).unwrap();
        assert_eq!(positions.len(), 3);
        assert!(positions[1].abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));

        let material = &document.materials[0];
        assert_eq!(material.base_color_factor, [1.0, 0.5, 0.25, 1.0]);
        assert_eq!(material.metallic_factor, 1.0);
        assert_eq!(material.roughness_factor, 0.5);
        assert_eq!(material.occlusion_strength, 0.75);
        assert_eq!(material.base_color_texture, Some(0));
        assert_eq!(material.emissive_texture, None);

        assert_eq!(document.images[0].width, 2);
        assert_eq!(
            document.accessors[2].component_type,
            ComponentType::UnsignedShort,
        );

        let bounds = document.scene_bounds(0).unwrap();
        assert!(bounds.0.abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-6));
        assert!(bounds.1.abs_diff_eq(Vec3::new(1.0, 3.0, 0.0), 1e-6));
    }

    #[test]
    fn missing_image_degrades_to_unresolved_source() {
        let dir = tempfile::tempdir().unwrap();
        let gltf_path = write_triangle_asset(dir.path());
        fs::remove_file(dir.path().join("white.png")).unwrap();
        let document = load(&gltf_path).unwrap();
        assert_eq!(document.images[0].width, 0);
        assert!(document.images[0].pixels.is_empty());
    }

    #[test]
    fn malformed_json_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.gltf");
        fs::write(&path, "{\"scenes\": [").unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn accessor_past_buffer_end_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let gltf_path = write_triangle_asset(dir.path());
        let truncated = TRIANGLE_GLTF.replace("\"count\": 3},", "\"count\": 4},");
        fs::write(&gltf_path, truncated).unwrap();
        assert!(load(&gltf_path).is_err());
    }
}

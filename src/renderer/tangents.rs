use glam::{Vec2, Vec3};

/// Per-vertex tangent and bitangent vectors synthesized from triangle
/// position and UV deltas. Flat, non-smoothed: every triangle writes its own
/// basis to all three of its vertices, so vertices shared between triangles
/// keep the last writer's basis.
pub struct TangentBasis {
    pub tangents: Vec<Vec3>,
    pub bitangents: Vec<Vec3>,
}

/// Computes a flat tangent basis for a triangle list. `indices` of None
/// means the positions are already laid out as sequential triples. Triangles
/// whose UV deltas are degenerate (zero determinant) are skipped and their
/// vertices keep whatever was written before, zero if nothing was.
pub fn generate(
    positions: &[Vec3],
    texcoords: &[Vec2],
    indices: Option<&[u32]>,
) -> TangentBasis {
    let mut tangents = vec![Vec3::ZERO; positions.len()];
    let mut bitangents = vec![Vec3::ZERO; positions.len()];

    let vertex_at = |triangle: usize, corner: usize| match indices {
        Some(indices) => indices[triangle * 3 + corner] as usize,
        None => triangle * 3 + corner,
    };
    let triangle_count = match indices {
        Some(indices) => indices.len() / 3,
        None => positions.len() / 3,
    };

    for triangle in 0..triangle_count {
        let i0 = vertex_at(triangle, 0);
        let i1 = vertex_at(triangle, 1);
        let i2 = vertex_at(triangle, 2);

        let e1 = positions[i1] - positions[i0];
        let e2 = positions[i2] - positions[i0];
        let d1 = texcoords[i1] - texcoords[i0];
        let d2 = texcoords[i2] - texcoords[i0];

        let determinant = d1.x * d2.y - d2.x * d1.y;
        if determinant == 0.0 {
            continue;
        }
        let f = 1.0 / determinant;
        let tangent = f * (d2.y * e1 - d1.y * e2);
        let bitangent = f * (-d2.x * e1 + d1.x * e2);

        for i in [i0, i1, i2] {
            tangents[i] = tangent;
            bitangents[i] = bitangent;
        }
    }

    TangentBasis {
        tangents,
        bitangents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT_TRIANGLE: [Vec3; 3] = [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
    ];
    const UNIT_UVS: [Vec2; 3] = [
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(0.0, 1.0),
    ];

    #[test]
    fn axis_aligned_uv_square_maps_to_identity_basis() {
        let basis = generate(&UNIT_TRIANGLE, &UNIT_UVS, None);
        for corner in 0..3 {
            assert!(basis.tangents[corner].abs_diff_eq(Vec3::X, 1e-6));
            assert!(basis.bitangents[corner].abs_diff_eq(Vec3::Y, 1e-6));
        }
    }

    #[test]
    fn indexed_triangles_replicate_per_corner() {
        let basis = generate(&UNIT_TRIANGLE, &UNIT_UVS, Some(&[2, 0, 1]));
        // Same winding relative to the UVs regardless of where the fan
        // starts: the basis is still computed from edge/UV deltas.
        for corner in 0..3 {
            assert!(!basis.tangents[corner].abs_diff_eq(Vec3::ZERO, 1e-6));
        }
    }

    #[test]
    fn degenerate_uvs_are_skipped_not_propagated() {
        let uvs = [Vec2::ZERO, Vec2::ZERO, Vec2::ZERO];
        let basis = generate(&UNIT_TRIANGLE, &uvs, None);
        for corner in 0..3 {
            assert!(basis.tangents[corner].is_finite());
            assert_eq!(basis.tangents[corner], Vec3::ZERO);
            assert_eq!(basis.bitangents[corner], Vec3::ZERO);
        }
    }

    #[test]
    fn trailing_partial_triangle_is_ignored() {
        let positions = [
            UNIT_TRIANGLE[0],
            UNIT_TRIANGLE[1],
            UNIT_TRIANGLE[2],
            Vec3::new(5.0, 5.0, 5.0),
        ];
        let uvs = [UNIT_UVS[0], UNIT_UVS[1], UNIT_UVS[2], Vec2::new(0.5, 0.5)];
        let basis = generate(&positions, &uvs, None);
        assert_eq!(basis.tangents[3], Vec3::ZERO);
        assert!(basis.tangents[0].abs_diff_eq(Vec3::X, 1e-6));
    }
}

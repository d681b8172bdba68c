use crate::renderer::gl;

/// Everything needed to issue one primitive's draw after its VAO and
/// material are bound. Built once at load time, flattened mesh-major so a
/// mesh's primitives occupy `[range.begin, range.begin + range.count)`.
#[derive(Clone)]
pub struct DrawCall {
    pub vao: gl::types::GLuint,
    pub mode: gl::types::GLenum,
    pub material: Option<usize>,
    /// Vertex count for the non-indexed path (glDrawArrays semantics).
    pub vertex_count: i32,
    pub indices: Option<IndexedDraw>,
}

/// Index accessor parameters for the glDrawElements path. The index buffer
/// itself is recorded in the VAO's ELEMENT_ARRAY_BUFFER binding.
#[derive(Clone, Copy)]
pub struct IndexedDraw {
    pub count: i32,
    pub component_type: gl::types::GLenum,
    pub byte_offset: usize,
}

/// Maps a mesh index to its contiguous range of VAO handles, one per
/// primitive in mesh order. Established at load time, immutable after.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VaoRange {
    pub begin: usize,
    pub count: usize,
}

/// One range per mesh; together the ranges partition
/// `[0, total_primitive_count)` in mesh order.
pub fn vao_ranges(primitive_counts: impl IntoIterator<Item = usize>) -> Vec<VaoRange> {
    let mut begin = 0;
    primitive_counts
        .into_iter()
        .map(|count| {
            let range = VaoRange { begin, count };
            begin += count;
            range
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_partition_the_primitive_table() {
        let counts = [2usize, 1, 0, 3];
        let ranges = vao_ranges(counts);
        assert_eq!(ranges.len(), counts.len());

        let total: usize = counts.iter().sum();
        let mut next = 0;
        for (range, &count) in ranges.iter().zip(&counts) {
            assert_eq!(range.begin, next, "no gap or overlap between meshes");
            assert_eq!(range.count, count);
            next = range.begin + range.count;
        }
        assert_eq!(next, total, "ranges exactly cover the table");
    }

    #[test]
    fn empty_mesh_list_yields_no_ranges() {
        assert!(vao_ranges([]).is_empty());
    }
}

//! Scratch geometry storage a task writes into while building a section.

use cgmath::Point3;

use crate::meshing::vertex::SectionVertex;
use crate::section::RenderLayer;

/// Vertices and indices accumulated for one render layer.
#[derive(Debug, Default)]
pub struct LayerBuilder {
    pub vertices: Vec<SectionVertex>,
    /// Only filled for layers that carry their own index order.
    pub indices: Vec<u32>,
}

impl LayerBuilder {
    fn with_capacity(vertices: usize, indices: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(indices),
        }
    }

    /// Appends the four corners of a quad in lower-left, lower-right,
    /// upper-left, upper-right order.
    pub fn push_quad(&mut self, corners: [SectionVertex; 4]) {
        self.vertices.extend_from_slice(&corners);
    }

    pub fn quad_count(&self) -> usize {
        self.vertices.len() / 4
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Centroid of quad `quad`.
    pub fn quad_centroid(&self, quad: usize) -> Point3<f32> {
        let corners = &self.vertices[quad * 4..quad * 4 + 4];
        let sum = corners.iter().fold([0.0f32; 3], |acc, vertex| {
            let p = vertex.position();
            [acc[0] + p.x, acc[1] + p.y, acc[2] + p.z]
        });
        Point3::new(sum[0] / 4.0, sum[1] / 4.0, sum[2] / 4.0)
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// One pool entry: a builder per render layer.
///
/// The capacities are per layer and only a starting point; builders grow as
/// needed during a build and `reset` shrinks them back.
#[derive(Debug)]
pub struct SectionBuffers {
    id: usize,
    layers: [LayerBuilder; RenderLayer::COUNT],
    vertex_capacity: usize,
    index_capacity: usize,
}

impl SectionBuffers {
    pub fn new(id: usize, vertex_capacity: usize, index_capacity: usize) -> Self {
        Self {
            id,
            layers: Self::fresh_layers(vertex_capacity, index_capacity),
            vertex_capacity,
            index_capacity,
        }
    }

    fn fresh_layers(vertices: usize, indices: usize) -> [LayerBuilder; RenderLayer::COUNT] {
        [
            LayerBuilder::with_capacity(vertices, indices),
            LayerBuilder::with_capacity(vertices, indices),
            LayerBuilder::with_capacity(vertices, indices),
        ]
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn layer(&self, layer: RenderLayer) -> &LayerBuilder {
        &self.layers[layer.index()]
    }

    pub fn layer_mut(&mut self, layer: RenderLayer) -> &mut LayerBuilder {
        &mut self.layers[layer.index()]
    }

    /// True when no layer holds any geometry.
    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(LayerBuilder::is_empty)
    }

    /// Forgets the accumulated geometry, keeping the allocations. Used after a
    /// successful task.
    pub fn clear(&mut self) {
        for layer in self.layers.iter_mut() {
            layer.vertices.clear();
            layer.indices.clear();
        }
    }

    /// Drops the accumulated geometry and its allocations, returning to the
    /// initial capacities. Used after a cancelled or failed task, whose
    /// buffers may have grown arbitrarily.
    pub fn reset(&mut self) {
        self.layers = Self::fresh_layers(self.vertex_capacity, self.index_capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(y: f32) -> [SectionVertex; 4] {
        [
            SectionVertex::new(Point3::new(0.0, y, 0.0), 0, 0.0, 0.0),
            SectionVertex::new(Point3::new(1.0, y, 0.0), 0, 1.0, 0.0),
            SectionVertex::new(Point3::new(0.0, y, 1.0), 0, 0.0, 1.0),
            SectionVertex::new(Point3::new(1.0, y, 1.0), 0, 1.0, 1.0),
        ]
    }

    #[test]
    fn centroid_averages_corners() {
        let mut layer = LayerBuilder::default();
        layer.push_quad(quad(0.0));
        layer.push_quad(quad(4.0));

        assert_eq!(layer.quad_count(), 2);
        assert_eq!(layer.quad_centroid(1), Point3::new(0.5, 4.0, 0.5));
        assert_eq!(layer.vertex_bytes().len(), 8 * 24);
    }

    #[test]
    fn clear_keeps_capacity_and_reset_restores_it() {
        let mut buffers = SectionBuffers::new(0, 8, 12);
        for y in 0..64 {
            buffers.layer_mut(RenderLayer::Solid).push_quad(quad(y as f32));
        }
        let grown = buffers.layer(RenderLayer::Solid).vertices.capacity();

        buffers.clear();
        assert!(buffers.is_empty());
        assert_eq!(buffers.layer(RenderLayer::Solid).vertices.capacity(), grown);

        buffers.reset();
        assert!(buffers.is_empty());
        assert!(buffers.layer(RenderLayer::Solid).vertices.capacity() < grown);
    }
}

//! Back-to-front ordering of translucent quads.

use cgmath::{MetricSpace, Point3};

/// Per-quad centroids of a section's translucent layer, kept so the index
/// order can be recomputed for a new camera position without rebuilding the
/// geometry. Quad `q` owns vertices `4q..4q+4`.
#[derive(Clone, Debug, PartialEq)]
pub struct SortState {
    centroids: Vec<Point3<f32>>,
}

impl SortState {
    pub fn new(centroids: Vec<Point3<f32>>) -> Self {
        Self { centroids }
    }

    pub fn quad_count(&self) -> usize {
        self.centroids.len()
    }

    /// Writes indices for every quad into `out`, farthest from `origin` first.
    /// `origin` is the camera position relative to the section's minimum corner.
    /// Returns the number of indices written.
    pub fn sort_into(&self, origin: Point3<f32>, out: &mut Vec<u32>) -> usize {
        let mut order: Vec<(u32, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(quad, centroid)| (quad as u32, centroid.distance2(origin)))
            .collect();
        order.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        out.clear();
        out.reserve(order.len() * 6);
        for (quad, _) in order {
            out.extend_from_slice(&quad_indices(quad));
        }
        out.len()
    }
}

/// Two triangles covering quad `quad`.
pub fn quad_indices(quad: u32) -> [u32; 6] {
    let base = quad * 4;
    [base, base + 1, base + 3, base, base + 3, base + 2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn farthest_quad_comes_first() {
        let state = SortState::new(vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(5.0, 0.0, 0.0),
        ]);
        let mut out = Vec::new();

        let written = state.sort_into(Point3::new(0.0, 0.0, 0.0), &mut out);

        assert_eq!(written, 18);
        assert_eq!(&out[0..6], &quad_indices(1));
        assert_eq!(&out[6..12], &quad_indices(2));
        assert_eq!(&out[12..18], &quad_indices(0));
    }

    #[test]
    fn moving_the_origin_reverses_order() {
        let state = SortState::new(vec![Point3::new(0.0, 0.0, 0.0), Point3::new(16.0, 0.0, 0.0)]);
        let mut out = Vec::new();

        state.sort_into(Point3::new(-5.0, 0.0, 0.0), &mut out);
        assert_eq!(out[0], 4);

        state.sort_into(Point3::new(21.0, 0.0, 0.0), &mut out);
        assert_eq!(out[0], 0);
    }

    #[test]
    fn empty_state_writes_nothing() {
        let mut out = vec![1, 2, 3];
        assert_eq!(SortState::new(Vec::new()).sort_into(Point3::new(0.0, 0.0, 0.0), &mut out), 0);
        assert!(out.is_empty());
    }
}

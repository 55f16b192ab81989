use cgmath::Point3;

use super::SectionKey;

/// Coarse position of the camera relative to a section: per axis, whether the
/// camera's section lies below (-1), level with (0) or above (+1) it.
///
/// Translucent geometry only needs re-sorting when this changes, or while the
/// camera is level with the section on some axis, where fine movement changes
/// the back-to-front order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RelativeSortPos {
    x: i8,
    y: i8,
    z: i8,
}

impl RelativeSortPos {
    pub fn new(x: i8, y: i8, z: i8) -> Self {
        Self {
            x: x.signum(),
            y: y.signum(),
            z: z.signum(),
        }
    }

    pub fn of(camera: Point3<f64>, section: SectionKey) -> Self {
        let camera_section = SectionKey::containing(camera);
        Self {
            x: (camera_section.x() - section.x()).signum() as i8,
            y: (camera_section.y() - section.y()).signum() as i8,
            z: (camera_section.z() - section.z()).signum() as i8,
        }
    }

    pub fn is_on_camera_axis(&self) -> bool {
        self.x == 0 || self.y == 0 || self.z == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_inside_section_is_on_axis() {
        let pos = RelativeSortPos::of(Point3::new(8.0, 8.0, 8.0), SectionKey::new(0, 0, 0));
        assert_eq!(pos, RelativeSortPos::new(0, 0, 0));
        assert!(pos.is_on_camera_axis());
    }

    #[test]
    fn diagonal_camera_is_off_axis() {
        let pos = RelativeSortPos::of(Point3::new(100.0, -40.0, 70.0), SectionKey::new(1, 1, 1));
        assert_eq!(pos, RelativeSortPos::new(1, -1, 1));
        assert!(!pos.is_on_camera_axis());
    }

    #[test]
    fn movement_within_an_octant_keeps_position() {
        let section = SectionKey::new(0, 0, 0);
        let near = RelativeSortPos::of(Point3::new(40.0, 40.0, 40.0), section);
        let far = RelativeSortPos::of(Point3::new(400.0, 90.0, 33.0), section);
        assert_eq!(near, far);
    }
}

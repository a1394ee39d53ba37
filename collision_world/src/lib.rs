//! Static obstacle geometry, validation, and nearest-hit ray probing.
#![forbid(unsafe_code)]

mod bvh;
mod probe;

pub use bvh::{build_bounds_bvh, BoundsBvh, BoundsBvhNode, LeafRange};
pub use probe::{check_ray_direction, probe, probe_linear, AimTarget};

use rapier3d::math::{Point, Vector};
use rapier3d::parry::bounding_volume::Aabb;
use rapier3d::prelude::Real;
use serde::Deserialize;

const OBSTACLE_SET_VERSION: u32 = 1;
const DEFAULT_MAX_BOXES: usize = 4_096;
const DEFAULT_MATERIAL_PALETTE: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

/// Axis-aligned box; identity is its index in the owning [`ObstacleGeometry`].
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct ObstacleBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
    #[serde(default)]
    pub material: u32,
}

impl ObstacleBox {
    pub fn new(min: [f32; 3], max: [f32; 3], material: u32) -> Self {
        Self { min, max, material }
    }

    pub fn from_center_half_extent(center: [f32; 3], half_extent: [f32; 3], material: u32) -> Self {
        Self {
            min: [
                center[0] - half_extent[0],
                center[1] - half_extent[1],
                center[2] - half_extent[2],
            ],
            max: [
                center[0] + half_extent[0],
                center[1] + half_extent[1],
                center[2] + half_extent[2],
            ],
            material,
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            min: self.min,
            max: self.max,
        }
    }

    pub fn center(&self) -> [f32; 3] {
        self.bounds().center()
    }

    pub fn half_extent(&self) -> [f32; 3] {
        [
            (self.max[0] - self.min[0]) * 0.5,
            (self.max[1] - self.min[1]) * 0.5,
            (self.max[2] - self.min[2]) * 0.5,
        ]
    }
}

impl Bounds {
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: [
                self.min[0].min(other.min[0]),
                self.min[1].min(other.min[1]),
                self.min[2].min(other.min[2]),
            ],
            max: [
                self.max[0].max(other.max[0]),
                self.max[1].max(other.max[1]),
                self.max[2].max(other.max[2]),
            ],
        }
    }

    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    pub fn contains_point(&self, point: Vector<Real>) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }

    pub(crate) fn to_aabb(self) -> Aabb {
        Aabb::new(
            Point::new(self.min[0], self.min[1], self.min[2]),
            Point::new(self.max[0], self.max[1], self.max[2]),
        )
    }

    fn is_valid(&self) -> bool {
        self.min.iter().all(|value| value.is_finite())
            && self.max.iter().all(|value| value.is_finite())
            && self.min[0] <= self.max[0]
            && self.min[1] <= self.max[1]
            && self.min[2] <= self.max[2]
    }
}

#[derive(Clone, Debug, Default)]
pub struct GeometryValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl GeometryValidation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GeometryValidationConfig {
    pub max_boxes: usize,
    pub material_palette: u32,
}

impl Default for GeometryValidationConfig {
    fn default() -> Self {
        Self {
            max_boxes: DEFAULT_MAX_BOXES,
            material_palette: DEFAULT_MATERIAL_PALETTE,
        }
    }
}

/// On-disk form of a level's obstacles.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ObstacleSet {
    pub version: u32,
    #[serde(default)]
    pub boxes: Vec<ObstacleBox>,
}

impl ObstacleSet {
    pub fn new(boxes: Vec<ObstacleBox>) -> Self {
        Self {
            version: OBSTACLE_SET_VERSION,
            boxes,
        }
    }

    pub fn parse_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|err| err.to_string())
    }

    pub fn validate(&self, config: GeometryValidationConfig) -> GeometryValidation {
        let mut validation = GeometryValidation::default();
        if self.version != OBSTACLE_SET_VERSION {
            validation
                .errors
                .push(format!("unsupported version {}", self.version));
        }
        if self.boxes.is_empty() {
            validation
                .warnings
                .push("obstacle set contains no boxes".to_string());
        }
        if self.boxes.len() > config.max_boxes {
            validation.warnings.push(format!(
                "box count {} exceeds budget {}",
                self.boxes.len(),
                config.max_boxes
            ));
        }
        for (index, obstacle) in self.boxes.iter().enumerate() {
            if !obstacle.bounds().is_valid() {
                validation.errors.push(format!(
                    "box {} must be finite with min <= max (min={:?} max={:?})",
                    index, obstacle.min, obstacle.max
                ));
            }
            if obstacle.material >= config.material_palette {
                validation.warnings.push(format!(
                    "box {} material {} is outside the palette of {}",
                    index, obstacle.material, config.material_palette
                ));
            }
        }
        validation
    }
}

/// Immutable per-level obstacle collection plus its bounds hierarchy.
///
/// Read-only after construction, so it can be shared with a render thread.
#[derive(Clone, Debug)]
pub struct ObstacleGeometry {
    boxes: Vec<ObstacleBox>,
    bvh: BoundsBvh,
}

impl ObstacleGeometry {
    pub fn new(boxes: Vec<ObstacleBox>) -> Result<Self, String> {
        let set = ObstacleSet::new(boxes);
        Self::from_set(set, GeometryValidationConfig::default())
    }

    pub fn from_set(set: ObstacleSet, config: GeometryValidationConfig) -> Result<Self, String> {
        let validation = set.validate(config);
        if !validation.is_ok() {
            return Err(validation.errors.join("; "));
        }
        let bvh = build_bounds_bvh(&set.boxes);
        Ok(Self {
            boxes: set.boxes,
            bvh,
        })
    }

    pub fn parse_toml(text: &str) -> Result<Self, String> {
        Self::from_set(ObstacleSet::parse_toml(text)?, GeometryValidationConfig::default())
    }

    pub fn boxes(&self) -> &[ObstacleBox] {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn bvh(&self) -> &BoundsBvh {
        &self.bvh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_half_extent_matches_corners() {
        let obstacle = ObstacleBox::from_center_half_extent([1.5, 0.5, 1.5], [0.5, 0.5, 0.5], 3);
        assert_eq!(obstacle.min, [1.0, 0.0, 1.0]);
        assert_eq!(obstacle.max, [2.0, 1.0, 2.0]);
        assert_eq!(obstacle.half_extent(), [0.5, 0.5, 0.5]);
        assert_eq!(obstacle.center(), [1.5, 0.5, 1.5]);
    }

    #[test]
    fn validation_rejects_inverted_box() {
        let set = ObstacleSet::new(vec![ObstacleBox::new([1.0, 0.0, 0.0], [0.0, 1.0, 1.0], 0)]);
        let validation = set.validate(GeometryValidationConfig::default());
        assert!(!validation.is_ok());
        assert!(ObstacleGeometry::new(set.boxes).is_err());
    }

    #[test]
    fn validation_warns_on_material_outside_palette() {
        let set = ObstacleSet::new(vec![ObstacleBox::new([0.0; 3], [1.0; 3], 99)]);
        let validation = set.validate(GeometryValidationConfig::default());
        assert!(validation.is_ok());
        assert_eq!(validation.warnings.len(), 1);
    }

    #[test]
    fn parses_toml_obstacle_set() {
        let text = r#"
            version = 1

            [[boxes]]
            min = [0.0, 0.0, 0.0]
            max = [4.0, 1.0, 4.0]
            material = 2

            [[boxes]]
            min = [10.0, 0.0, 10.0]
            max = [11.0, 8.0, 11.0]
        "#;
        let geometry = ObstacleGeometry::parse_toml(text).expect("parse");
        assert_eq!(geometry.len(), 2);
        assert_eq!(geometry.boxes()[0].material, 2);
        assert_eq!(geometry.boxes()[1].material, 0);
    }

    #[test]
    fn rejects_unknown_version() {
        let text = "version = 7\nboxes = []\n";
        assert!(ObstacleGeometry::parse_toml(text).is_err());
    }
}

use std::cell::Cell;

use engine_core::observability::invariant_violation;
use rapier3d::math::{Point, Vector};
use rapier3d::parry::query::{Ray, RayCast};
use rapier3d::prelude::Real;

use crate::ObstacleGeometry;

const MIN_DIRECTION_NORM_SQ: Real = 1.0e-12;

/// Per-frame result of probing along the look direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AimTarget {
    pub hit: bool,
    pub point: Vector<Real>,
    pub distance: Real,
    pub obstacle: Option<usize>,
}

impl AimTarget {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Vector::zeros(),
            distance: Real::INFINITY,
            obstacle: None,
        }
    }

    fn from_hit(ray: &Ray, distance: Real, index: u32) -> Self {
        Self {
            hit: true,
            point: ray.point_at(distance).coords,
            distance,
            obstacle: Some(index as usize),
        }
    }
}

impl Default for AimTarget {
    fn default() -> Self {
        Self::miss()
    }
}

pub fn check_ray_direction(direction: Vector<Real>) -> Result<(), String> {
    let norm_sq = direction.norm_squared();
    if !norm_sq.is_finite() || norm_sq <= MIN_DIRECTION_NORM_SQ {
        return Err(format!(
            "ray direction must be finite and non-zero (got {:?})",
            [direction.x, direction.y, direction.z]
        ));
    }
    Ok(())
}

#[track_caller]
fn build_ray(origin: Vector<Real>, direction: Vector<Real>) -> Ray {
    if let Err(err) = check_ray_direction(direction) {
        invariant_violation("probe", err);
    }
    Ray::new(Point::from(origin), direction.normalize())
}

/// Nearest obstacle hit strictly closer than `max_distance`.
///
/// Equal distances resolve to the lowest obstacle index. A ray starting inside a
/// box reports a hit at distance zero. Panics on a zero or non-finite direction.
#[track_caller]
pub fn probe(
    origin: Vector<Real>,
    direction: Vector<Real>,
    max_distance: Real,
    geometry: &ObstacleGeometry,
) -> AimTarget {
    let ray = build_ray(origin, direction);
    if !(max_distance > 0.0) {
        return AimTarget::miss();
    }
    let boxes = geometry.boxes();
    let best: Cell<Option<(Real, u32)>> = Cell::new(None);
    geometry.bvh().visit_ray_candidates(
        &ray,
        max_distance,
        |entry| match best.get() {
            Some((best_distance, _)) => entry <= best_distance,
            None => true,
        },
        |index| {
            let Some(obstacle) = boxes.get(index as usize) else {
                return;
            };
            let Some(distance) = obstacle
                .bounds()
                .to_aabb()
                .cast_local_ray(&ray, max_distance, true)
            else {
                return;
            };
            if distance >= max_distance {
                return;
            }
            let closer = match best.get() {
                Some((best_distance, best_index)) => {
                    distance < best_distance || (distance == best_distance && index < best_index)
                }
                None => true,
            };
            if closer {
                best.set(Some((distance, index)));
            }
        },
    );
    match best.get() {
        Some((distance, index)) => AimTarget::from_hit(&ray, distance, index),
        None => AimTarget::miss(),
    }
}

/// Reference scan over every box in index order; [`probe`] must agree with it.
#[track_caller]
pub fn probe_linear(
    origin: Vector<Real>,
    direction: Vector<Real>,
    max_distance: Real,
    geometry: &ObstacleGeometry,
) -> AimTarget {
    let ray = build_ray(origin, direction);
    let mut result = AimTarget::miss();
    if !(max_distance > 0.0) {
        return result;
    }
    for (index, obstacle) in geometry.boxes().iter().enumerate() {
        let Some(distance) = obstacle
            .bounds()
            .to_aabb()
            .cast_local_ray(&ray, max_distance, true)
        else {
            continue;
        };
        if distance < max_distance && distance < result.distance {
            result = AimTarget::from_hit(&ray, distance, index as u32);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObstacleBox;

    fn single_box() -> ObstacleGeometry {
        ObstacleGeometry::new(vec![ObstacleBox::new([1.0, 0.0, 1.0], [2.0, 1.0, 2.0], 0)])
            .expect("geometry")
    }

    #[test]
    fn hits_near_face_of_box() {
        let geometry = single_box();
        let aim = probe(
            Vector::new(0.0, 0.5, 1.5),
            Vector::new(1.0, 0.0, 0.0),
            10.0,
            &geometry,
        );
        assert!(aim.hit);
        assert_eq!(aim.point.x, 1.0);
        assert_eq!(aim.obstacle, Some(0));
        assert!((aim.distance - 1.0).abs() < 1.0e-6);
    }

    #[test]
    fn misses_when_box_is_beyond_range() {
        let geometry = single_box();
        let aim = probe(
            Vector::new(0.0, 0.5, 1.5),
            Vector::new(1.0, 0.0, 0.0),
            0.5,
            &geometry,
        );
        assert!(!aim.hit);
        assert_eq!(aim, AimTarget::miss());
    }

    #[test]
    fn hit_exactly_at_range_is_rejected() {
        let geometry = single_box();
        let aim = probe(
            Vector::new(0.0, 0.5, 1.5),
            Vector::new(1.0, 0.0, 0.0),
            1.0,
            &geometry,
        );
        assert!(!aim.hit);
    }

    #[test]
    fn returns_nearest_of_several_boxes() {
        let geometry = ObstacleGeometry::new(vec![
            ObstacleBox::new([8.0, 0.0, -1.0], [9.0, 2.0, 1.0], 0),
            ObstacleBox::new([3.0, 0.0, -1.0], [4.0, 2.0, 1.0], 1),
            ObstacleBox::new([5.0, 0.0, -1.0], [6.0, 2.0, 1.0], 2),
        ])
        .expect("geometry");
        let aim = probe(Vector::new(0.0, 1.0, 0.0), Vector::x(), 50.0, &geometry);
        assert_eq!(aim.obstacle, Some(1));
        assert!((aim.point.x - 3.0).abs() < 1.0e-6);
    }

    #[test]
    fn equal_distance_resolves_to_first_box() {
        let geometry = ObstacleGeometry::new(vec![
            ObstacleBox::new([5.0, 0.0, -1.0], [6.0, 2.0, 0.5], 0),
            ObstacleBox::new([5.0, 0.0, -0.5], [7.0, 2.0, 1.0], 1),
        ])
        .expect("geometry");
        let aim = probe(Vector::new(0.0, 1.0, 0.0), Vector::x(), 50.0, &geometry);
        assert_eq!(aim.obstacle, Some(0));
        assert_eq!(probe_linear(Vector::new(0.0, 1.0, 0.0), Vector::x(), 50.0, &geometry), aim);
    }

    #[test]
    fn empty_geometry_never_hits() {
        let geometry = ObstacleGeometry::new(Vec::new()).expect("geometry");
        let aim = probe(Vector::zeros(), Vector::x(), 100.0, &geometry);
        assert!(!aim.hit);
    }

    #[test]
    fn origin_inside_box_hits_at_zero() {
        let geometry = single_box();
        let aim = probe(Vector::new(1.5, 0.5, 1.5), Vector::y(), 10.0, &geometry);
        assert!(aim.hit);
        assert_eq!(aim.distance, 0.0);
    }

    #[test]
    fn non_unit_direction_reports_true_distance() {
        let geometry = single_box();
        let aim = probe(
            Vector::new(0.0, 0.5, 1.5),
            Vector::new(4.0, 0.0, 0.0),
            10.0,
            &geometry,
        );
        assert!((aim.distance - 1.0).abs() < 1.0e-6);
    }

    #[test]
    fn bvh_probe_agrees_with_linear_scan() {
        let mut boxes = Vec::new();
        for ix in 0..6 {
            for iz in 0..6 {
                let x = ix as f32 * 4.0 - 10.0;
                let z = iz as f32 * 4.0 - 10.0;
                let height = 1.0 + ((ix * 7 + iz * 3) % 5) as f32;
                boxes.push(ObstacleBox::new([x, 0.0, z], [x + 1.5, height, z + 1.5], 0));
            }
        }
        let geometry = ObstacleGeometry::new(boxes).expect("geometry");
        let origin = Vector::new(0.3, 2.5, 0.7);
        for step in 0..72 {
            let yaw = step as f32 * std::f32::consts::TAU / 72.0;
            for pitch in [-0.6_f32, -0.2, 0.0, 0.3] {
                let dir =
                    Vector::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos());
                let fast = probe(origin, dir, 30.0, &geometry);
                let slow = probe_linear(origin, dir, 30.0, &geometry);
                assert_eq!(fast.hit, slow.hit);
                assert_eq!(fast.obstacle, slow.obstacle);
                if fast.hit {
                    assert_eq!(fast.distance, slow.distance);
                }
            }
        }
    }

    #[test]
    fn check_ray_direction_rejects_degenerate_input() {
        assert!(check_ray_direction(Vector::x()).is_ok());
        assert!(check_ray_direction(Vector::zeros()).is_err());
        assert!(check_ray_direction(Vector::new(Real::NAN, 0.0, 0.0)).is_err());
    }

    #[test]
    #[should_panic(expected = "ray direction must be finite and non-zero")]
    fn probe_panics_on_zero_direction() {
        let geometry = single_box();
        probe(Vector::zeros(), Vector::zeros(), 10.0, &geometry);
    }
}

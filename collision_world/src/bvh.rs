use rapier3d::parry::query::{Ray, RayCast};
use rapier3d::prelude::Real;

use crate::{Bounds, ObstacleBox};

const MAX_LEAF_BOXES: usize = 4;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoundsBvh {
    pub root: u32,
    pub nodes: Vec<BoundsBvhNode>,
    pub leaf_indices: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoundsBvhNode {
    pub bounds: Bounds,
    pub left: Option<u32>,
    pub right: Option<u32>,
    pub leaf: Option<LeafRange>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeafRange {
    pub first: u32,
    pub count: u32,
}

impl BoundsBvh {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Calls `hit` for every box index whose ancestors all pass the ray test.
    ///
    /// Node entry distances are passed to `prune`, which returns false to skip
    /// the subtree once a closer hit is already known.
    pub(crate) fn visit_ray_candidates(
        &self,
        ray: &Ray,
        max_distance: Real,
        mut prune: impl FnMut(Real) -> bool,
        mut hit: impl FnMut(u32),
    ) {
        self.visit_leaves(
            |node| match node.bounds.to_aabb().cast_local_ray(ray, max_distance, true) {
                Some(entry) => prune(entry),
                None => false,
            },
            |index| hit(index),
        );
    }

    fn visit_leaves(
        &self,
        mut descend: impl FnMut(&BoundsBvhNode) -> bool,
        mut leaf: impl FnMut(u32),
    ) {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack = vec![self.root];
        while let Some(node_index) = stack.pop() {
            let node = match self.nodes.get(node_index as usize) {
                Some(node) => node,
                None => continue,
            };
            if !descend(node) {
                continue;
            }
            if let Some(range) = node.leaf {
                let start = range.first as usize;
                let end = start.saturating_add(range.count as usize);
                if end > self.leaf_indices.len() {
                    continue;
                }
                for &index in &self.leaf_indices[start..end] {
                    leaf(index);
                }
            } else {
                if let Some(right) = node.right {
                    stack.push(right);
                }
                if let Some(left) = node.left {
                    stack.push(left);
                }
            }
        }
    }
}

pub fn build_bounds_bvh(boxes: &[ObstacleBox]) -> BoundsBvh {
    if boxes.is_empty() {
        return BoundsBvh::default();
    }
    let mut nodes = Vec::new();
    let mut leaf_indices = Vec::new();
    let indices: Vec<u32> = (0..boxes.len())
        .map(|index| u32::try_from(index).unwrap_or(u32::MAX))
        .collect();
    let root = build_node(boxes, &indices, &mut nodes, &mut leaf_indices);
    BoundsBvh {
        root,
        nodes,
        leaf_indices,
    }
}

fn build_node(
    boxes: &[ObstacleBox],
    indices: &[u32],
    nodes: &mut Vec<BoundsBvhNode>,
    leaf_indices: &mut Vec<u32>,
) -> u32 {
    let bounds = union_bounds(boxes, indices);
    if indices.len() <= MAX_LEAF_BOXES {
        let first = leaf_indices.len();
        leaf_indices.extend(indices.iter().copied());
        nodes.push(BoundsBvhNode {
            bounds,
            left: None,
            right: None,
            leaf: Some(LeafRange {
                first: u32::try_from(first).unwrap_or(u32::MAX),
                count: u32::try_from(indices.len()).unwrap_or(u32::MAX),
            }),
        });
        return (nodes.len() - 1) as u32;
    }

    let axis = longest_axis(bounds);
    let mut sorted: Vec<(u32, f32)> = indices
        .iter()
        .map(|index| (*index, boxes[*index as usize].center()[axis]))
        .collect();
    sorted.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    let mid = sorted.len() / 2;
    let (left_indices, right_indices) = sorted.split_at(mid);
    let left_indices: Vec<u32> = left_indices.iter().map(|pair| pair.0).collect();
    let right_indices: Vec<u32> = right_indices.iter().map(|pair| pair.0).collect();

    let left = build_node(boxes, &left_indices, nodes, leaf_indices);
    let right = build_node(boxes, &right_indices, nodes, leaf_indices);
    nodes.push(BoundsBvhNode {
        bounds,
        left: Some(left),
        right: Some(right),
        leaf: None,
    });
    (nodes.len() - 1) as u32
}

fn union_bounds(boxes: &[ObstacleBox], indices: &[u32]) -> Bounds {
    let mut iter = indices.iter();
    let first = iter
        .next()
        .map(|index| boxes[*index as usize].bounds())
        .unwrap_or(Bounds {
            min: [0.0; 3],
            max: [0.0; 3],
        });
    iter.fold(first, |acc, index| acc.union(&boxes[*index as usize].bounds()))
}

fn longest_axis(bounds: Bounds) -> usize {
    let extent = [
        bounds.max[0] - bounds.min[0],
        bounds.max[1] - bounds.min[1],
        bounds.max[2] - bounds.min[2],
    ];
    if extent[0] >= extent[1] && extent[0] >= extent[2] {
        0
    } else if extent[1] >= extent[2] {
        1
    } else {
        2
    }
}

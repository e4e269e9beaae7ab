//! Nearest-neighbor index for facility points
//!
//! Points are projected onto a sphere of radius 6371 km and stored in a
//! 3-D k-d tree. Euclidean (chord) distance between projected points is a
//! close surrogate for great-circle distance at the sub-kilometre scale the
//! deduplicator works at.
//!
//! The tree is arena-backed (`Vec<Node>` with index links). A bulk build is
//! balanced; later inserts descend to a leaf without rebalancing.

use registry_common::GeoPoint;

/// Mean Earth radius used for the projection
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Project a WGS84 point to cartesian km
pub fn cartesian(point: GeoPoint) -> [f64; 3] {
    let lat = point.lat.to_radians();
    let lon = point.lon.to_radians();
    [
        EARTH_RADIUS_KM * lat.cos() * lon.cos(),
        EARTH_RADIUS_KM * lat.cos() * lon.sin(),
        EARTH_RADIUS_KM * lat.sin(),
    ]
}

#[derive(Debug, Clone)]
struct Node {
    point: [f64; 3],
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// 3-D k-d tree
#[derive(Debug, Clone, Default)]
pub struct KdTree {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl KdTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balanced tree over `points` (median split per level)
    pub fn build(mut points: Vec<[f64; 3]>) -> Self {
        let mut tree = Self {
            nodes: Vec::with_capacity(points.len()),
            root: None,
        };
        tree.root = tree.build_subtree(&mut points, 0);
        tree
    }

    fn build_subtree(&mut self, points: &mut [[f64; 3]], depth: usize) -> Option<usize> {
        if points.is_empty() {
            return None;
        }

        let axis = depth % 3;
        let median = points.len() / 2;
        points.select_nth_unstable_by(median, |a, b| a[axis].total_cmp(&b[axis]));

        let index = self.nodes.len();
        self.nodes.push(Node {
            point: points[median],
            axis,
            left: None,
            right: None,
        });

        let (lower, rest) = points.split_at_mut(median);
        let upper = &mut rest[1..];
        let left = self.build_subtree(lower, depth + 1);
        let right = self.build_subtree(upper, depth + 1);
        self.nodes[index].left = left;
        self.nodes[index].right = right;
        Some(index)
    }

    /// Add one point below the current leaves
    pub fn insert(&mut self, point: [f64; 3]) {
        let index = self.nodes.len();
        let Some(mut current) = self.root else {
            self.nodes.push(Node {
                point,
                axis: 0,
                left: None,
                right: None,
            });
            self.root = Some(index);
            return;
        };

        loop {
            let node = &self.nodes[current];
            let go_left = point[node.axis] < node.point[node.axis];
            let axis = (node.axis + 1) % 3;
            let next = if go_left { node.left } else { node.right };

            match next {
                Some(child) => current = child,
                None => {
                    self.nodes.push(Node {
                        point,
                        axis,
                        left: None,
                        right: None,
                    });
                    let parent = &mut self.nodes[current];
                    if go_left {
                        parent.left = Some(index);
                    } else {
                        parent.right = Some(index);
                    }
                    return;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Distances to the `k` nearest stored points, ascending
    ///
    /// A stored point equal to `target` counts (distance 0).
    pub fn nearest(&self, target: [f64; 3], k: usize) -> Vec<f64> {
        if k == 0 {
            return Vec::new();
        }

        // Squared distances, kept sorted, at most k long
        let mut best: Vec<f64> = Vec::with_capacity(k + 1);
        // (node, lower bound on squared distance to anything below it)
        let mut stack: Vec<(usize, f64)> = self.root.map(|root| (root, 0.0)).into_iter().collect();

        while let Some((index, bound)) = stack.pop() {
            if best.len() == k && bound >= best[k - 1] {
                continue;
            }

            let node = &self.nodes[index];
            let dist = squared_distance(node.point, target);
            if best.len() < k || dist < best[k - 1] {
                let at = best.partition_point(|d| *d <= dist);
                best.insert(at, dist);
                best.truncate(k);
            }

            let diff = target[node.axis] - node.point[node.axis];
            let (near, far) = if diff < 0.0 {
                (node.left, node.right)
            } else {
                (node.right, node.left)
            };
            if let Some(far) = far {
                stack.push((far, diff * diff));
            }
            if let Some(near) = near {
                stack.push((near, 0.0));
            }
        }

        best.into_iter().map(f64::sqrt).collect()
    }
}

fn squared_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

use crate::domain::Point;

use smallvec::SmallVec;
use std::collections::HashMap;

/// A vertex of a linearized field: its physical location and the two field values sampled there
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearVertex {
    pub x: f64,
    pub y: f64,
    pub xval: f64,
    pub yval: f64,
}

impl LinearVertex {
    pub const fn new(x: f64, y: f64, xval: f64, yval: f64) -> Self {
        Self { x, y, xval, yval }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Euclidean norm of the two field values
    pub fn magnitude(&self) -> f64 {
        self.magnitude_sq().sqrt()
    }

    pub fn magnitude_sq(&self) -> f64 {
        self.xval * self.xval + self.yval * self.yval
    }

    /// Straight interpolation of position and values halfway to `other`
    pub fn midpoint(&self, other: &Self) -> Self {
        Self {
            x: (self.x + other.x) * 0.5,
            y: (self.y + other.y) * 0.5,
            xval: (self.xval + other.xval) * 0.5,
            yval: (self.yval + other.yval) * 0.5,
        }
    }
}

fn values_match(a: f64, b: f64, tolerance: f64) -> bool {
    a == b || ((a - b) / a).abs() < tolerance
}

/// Vertex storage with deduplication of edge midpoints
///
/// Midpoints are keyed by the unordered pair of vertices they split. A pair can own several midpoints:
/// where the field is discontinuous, the two sides of an edge request different values and each gets
/// its own vertex.
#[derive(Clone, Debug)]
pub struct VertexTable {
    vertices: Vec<LinearVertex>,
    chains: HashMap<(usize, usize), SmallVec<[usize; 2]>>,
    dedup_tolerance: f64,
}

impl VertexTable {
    pub fn new(dedup_tolerance: f64) -> Self {
        Self::with_capacity(0, dedup_tolerance)
    }

    pub fn with_capacity(capacity: usize, dedup_tolerance: f64) -> Self {
        Self {
            vertices: Vec::with_capacity(capacity),
            chains: HashMap::with_capacity(capacity),
            dedup_tolerance,
        }
    }

    pub fn vertices(&self) -> &[LinearVertex] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex(&self, index: usize) -> LinearVertex {
        self.vertices[index]
    }

    /// Add a vertex that doesn't belong to any edge (an element corner)
    pub fn create_vertex(&mut self, x: f64, y: f64, xval: f64, yval: f64) -> usize {
        self.vertices.push(LinearVertex::new(x, y, xval, yval));
        self.vertices.len() - 1
    }

    /// Retrieve the midpoint of `p1` and `p2` carrying (within the dedup tolerance) the given values,
    /// creating it if there isn't one yet
    pub fn get_vertex(&mut self, p1: usize, p2: usize, x: f64, y: f64, xval: f64, yval: f64) -> usize {
        let key = (p1.min(p2), p1.max(p2));

        if let Some(chain) = self.chains.get(&key) {
            let found = chain.iter().rev().find(|i| {
                let v = &self.vertices[**i];
                values_match(xval, v.xval, self.dedup_tolerance) && values_match(yval, v.yval, self.dedup_tolerance)
            });
            if let Some(i) = found {
                return *i;
            }
        }

        let index = self.create_vertex(x, y, xval, yval);
        self.chains.entry(key).or_default().push(index);
        index
    }

    /// The most recently created midpoint of `p1` and `p2`, if any (values are not compared)
    pub fn peek_vertex(&self, p1: usize, p2: usize) -> Option<usize> {
        self.chains
            .get(&(p1.min(p2), p1.max(p2)))
            .and_then(|chain| chain.last().copied())
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.chains.clear();
    }

    /// Free the midpoint chains; the vertices stay, but no further midpoints will be shared
    pub fn release_chains(&mut self) {
        self.chains = HashMap::new();
    }
}

/// A bold edge between two vertices along with its boundary marker (0 for interior edges)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinearEdge {
    pub vertices: [usize; 2],
    pub marker: u32,
}

/// The piecewise linear rendition of a pair of fields
#[derive(Clone, Debug)]
pub struct Linearization {
    table: VertexTable,
    triangles: Vec<[usize; 3]>,
    edges: Vec<LinearEdge>,
    dashes: Vec<[usize; 2]>,
    value_range: (f64, f64),
}

impl Linearization {
    pub fn new(dedup_tolerance: f64) -> Self {
        Self::with_capacity([0; 3], dedup_tolerance)
    }

    /// Reserve space for `[vertices, triangles, edges]`; dashes get as much space as edges
    pub fn with_capacity([num_verts, num_tris, num_edges]: [usize; 3], dedup_tolerance: f64) -> Self {
        Self {
            table: VertexTable::with_capacity(num_verts, dedup_tolerance),
            triangles: Vec::with_capacity(num_tris),
            edges: Vec::with_capacity(num_edges),
            dashes: Vec::with_capacity(num_edges),
            value_range: (0.0, 0.0),
        }
    }

    pub fn vertices(&self) -> &[LinearVertex] {
        self.table.vertices()
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    pub fn edges(&self) -> &[LinearEdge] {
        &self.edges
    }

    pub fn dashes(&self) -> &[[usize; 2]] {
        &self.dashes
    }

    /// Smallest and largest finite vertex magnitude
    pub fn value_range(&self) -> (f64, f64) {
        self.value_range
    }

    pub fn table(&self) -> &VertexTable {
        &self.table
    }

    pub(crate) fn table_mut(&mut self) -> &mut VertexTable {
        &mut self.table
    }

    /// Bounding box `[min, max]` of the vertex positions
    pub fn aabb(&self) -> Option<[Point; 2]> {
        let first = self.table.vertices().first()?;
        let init = [first.position(), first.position()];

        Some(self.table.vertices().iter().fold(init, |[min, max], v| {
            [
                Point::new(min.x.min(v.x), min.y.min(v.y)),
                Point::new(max.x.max(v.x), max.y.max(v.y)),
            ]
        }))
    }

    pub(crate) fn add_triangle(&mut self, tri: [usize; 3]) {
        self.triangles.push(tri);
    }

    /// Add a bold edge, split at every midpoint created along it
    pub(crate) fn process_edge(&mut self, iv1: usize, iv2: usize, marker: u32) {
        match self.table.peek_vertex(iv1, iv2) {
            Some(mid) => {
                self.process_edge(iv1, mid, marker);
                self.process_edge(mid, iv2, marker);
            }
            None => self.edges.push(LinearEdge {
                vertices: [iv1, iv2],
                marker,
            }),
        }
    }

    /// Add a dashed edge, split at every midpoint created along it
    pub(crate) fn process_dash(&mut self, iv1: usize, iv2: usize) {
        match self.table.peek_vertex(iv1, iv2) {
            Some(mid) => {
                self.process_dash(iv1, mid);
                self.process_dash(mid, iv2);
            }
            None => self.dashes.push([iv1, iv2]),
        }
    }

    /// Drop the dedup state of a finished run and trim the buffers to size
    pub(crate) fn release_dedup(&mut self) {
        self.table.release_chains();
        self.table.vertices.shrink_to_fit();
        self.triangles.shrink_to_fit();
        self.edges.shrink_to_fit();
        self.dashes.shrink_to_fit();
    }

    /// Recompute the value range; returns `false` if no vertex carries a finite magnitude
    pub(crate) fn find_min_max(&mut self) -> bool {
        let range = self
            .table
            .vertices()
            .iter()
            .map(|v| v.magnitude_sq())
            .filter(|mag| mag.is_finite())
            .fold(None, |range, mag| match range {
                None => Some((mag, mag)),
                Some((min, max)) => Some((mag.min(min), mag.max(max))),
            });

        match range {
            Some((min, max)) => {
                self.value_range = (min.sqrt(), max.sqrt());
                true
            }
            None => {
                self.value_range = (0.0, 0.0);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_dedup() {
        let mut table = VertexTable::new(1e-4);
        let a = table.create_vertex(0.0, 0.0, 1.0, 1.0);
        let b = table.create_vertex(1.0, 0.0, 3.0, 1.0);

        let mid = table.get_vertex(a, b, 0.5, 0.0, 2.0, 1.0);
        assert_eq!(mid, 2);
        // same pair in the other order, values within the relative tolerance
        assert_eq!(table.get_vertex(b, a, 0.5, 0.0, 2.00001, 1.0), mid);
        assert_eq!(table.len(), 3);

        // a discontinuity: same pair, different value
        let other = table.get_vertex(a, b, 0.5, 0.0, 2.1, 1.0);
        assert_ne!(other, mid);
        assert_eq!(table.len(), 4);

        // both midpoints are still found by value; peeking yields the most recent one
        assert_eq!(table.get_vertex(a, b, 0.5, 0.0, 2.0, 1.0), mid);
        assert_eq!(table.peek_vertex(b, a), Some(other));
        assert_eq!(table.peek_vertex(a, mid), None);
    }

    #[test]
    fn zero_values_match() {
        let mut table = VertexTable::new(1e-4);
        let a = table.create_vertex(0.0, 0.0, 0.0, 0.0);
        let b = table.create_vertex(0.0, 1.0, 0.0, 0.0);

        let mid = table.get_vertex(a, b, 0.0, 0.5, 0.0, 0.0);
        assert_eq!(table.get_vertex(a, b, 0.0, 0.5, 0.0, 0.0), mid);

        // non-finite values never match
        let nan_mid = table.get_vertex(a, b, 0.0, 0.5, f64::NAN, 0.0);
        assert_ne!(table.get_vertex(a, b, 0.0, 0.5, f64::NAN, 0.0), nan_mid);
    }

    #[test]
    fn edges_follow_midpoints() {
        let mut lin = Linearization::new(1e-4);
        let a = lin.table_mut().create_vertex(0.0, 0.0, 1.0, 0.0);
        let b = lin.table_mut().create_vertex(2.0, 0.0, 1.0, 0.0);
        let m = lin.table_mut().get_vertex(a, b, 1.0, 0.0, 1.0, 0.0);
        let q = lin.table_mut().get_vertex(m, b, 1.5, 0.0, 1.0, 0.0);

        lin.process_edge(a, b, 3);
        assert_eq!(
            lin.edges(),
            &[
                LinearEdge { vertices: [a, m], marker: 3 },
                LinearEdge { vertices: [m, q], marker: 3 },
                LinearEdge { vertices: [q, b], marker: 3 },
            ]
        );

        lin.process_dash(b, a);
        assert_eq!(lin.dashes(), &[[b, q], [q, m], [m, a]]);
    }

    #[test]
    fn released_chains_stop_dedup() {
        let mut lin = Linearization::new(1e-4);
        let a = lin.table_mut().create_vertex(0.0, 0.0, 1.0, 0.0);
        let b = lin.table_mut().create_vertex(1.0, 0.0, 1.0, 0.0);
        let m = lin.table_mut().get_vertex(a, b, 0.5, 0.0, 1.0, 0.0);
        lin.add_triangle([a, b, m]);

        lin.release_dedup();
        assert_eq!(lin.vertices().len(), 3);
        assert_eq!(lin.triangles(), &[[a, b, m]]);
        assert_eq!(lin.table().peek_vertex(a, b), None);
    }

    #[test]
    fn range_and_bounds() {
        let mut lin = Linearization::new(1e-4);
        assert!(lin.aabb().is_none());
        assert!(!lin.find_min_max());

        lin.table_mut().create_vertex(-1.0, 2.0, 3.0, 4.0);
        lin.table_mut().create_vertex(0.5, -0.5, 0.0, 1.0);
        lin.table_mut().create_vertex(0.0, 0.0, f64::INFINITY, 0.0);

        assert!(lin.find_min_max());
        assert_eq!(lin.value_range(), (1.0, 5.0));

        let [min, max] = lin.aabb().unwrap();
        assert_eq!((min.x, min.y, max.x, max.y), (-1.0, -0.5, 0.5, 2.0));
    }
}

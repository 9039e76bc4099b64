use super::linear::{LinearVertex, Linearization};
use crate::domain::{ElemMode, PairTraversal, Point, Transform, TraversalState, V2D};
use crate::error::LinearizerError;
use crate::fields::{Item, MeshFunction};
use crate::integration::quad::{
    LIN_QUAD_INDICES, LIN_QUAD_INTERIOR_CHECKS, LIN_TRI_INDICES, LIN_TRI_INTERIOR_CHECKS,
};
use crate::integration::{LinQuad2D, Quad2D};

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Tuning of the adaptive linearization
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearizerConfig {
    /// Recursion depth at which sub-elements are emitted without checking the error
    pub max_level: usize,
    /// Relative deviation of curved geometry from its straight interpolation that forces a split
    pub curvature_tolerance: f64,
    /// Relative difference below which two midpoint values are considered equal
    pub dedup_tolerance: f64,
}

impl Default for LinearizerConfig {
    fn default() -> Self {
        Self {
            max_level: 6,
            curvature_tolerance: 2.5e-4,
            dedup_tolerance: 1e-4,
        }
    }
}

/// Adaptive linearization of a vector field given by two [MeshFunction]s (one per component)
///
/// Each element of the union of the two meshes is split recursively until linear interpolation of
/// the corner values reproduces the field's magnitude within the requested tolerance.
pub struct Vectorizer {
    config: LinearizerConfig,
    data: Mutex<Linearization>,
}

impl Vectorizer {
    pub fn new() -> Self {
        Self::with_config(LinearizerConfig::default())
    }

    pub fn with_config(config: LinearizerConfig) -> Self {
        Self {
            config,
            data: Mutex::new(Linearization::new(config.dedup_tolerance)),
        }
    }

    pub fn config(&self) -> &LinearizerConfig {
        &self.config
    }

    /// Lock the scratch state; blocks while a run is in progress and is empty between runs
    pub fn lock_data(&self) -> Result<MutexGuard<'_, Linearization>, LinearizerError> {
        self.data.lock().map_err(|_| LinearizerError::LockPoisoned)
    }

    /// Linearize the fields `xsln` (item `xitem`) and `ysln` (item `yitem`)
    ///
    /// With `eps < 1`, sub-elements are split while the summed error of the linearized magnitude exceeds
    /// `eps` times the largest magnitude seen so far. With `eps >= 1`, every element is split to a fixed
    /// depth of `eps` levels instead.
    #[tracing::instrument(skip_all, name = "Vectorizer::process_solution")]
    pub fn process_solution(
        &self,
        xsln: &dyn MeshFunction,
        ysln: &dyn MeshFunction,
        xitem: u32,
        yitem: u32,
        eps: f64,
    ) -> Result<Linearization, LinearizerError> {
        let items = [Item::from_bits(xitem)?, Item::from_bits(yitem)?];
        xsln.check_item(items[0])?;
        ysln.check_item(items[1])?;

        let mut data = self.lock_data()?;
        let start = Instant::now();

        // the linearization is expected to be about four times finer than the meshes
        let nn = xsln.mesh().elems.len() + ysln.mesh().elems.len();
        *data = Linearization::with_capacity(
            [(32 * nn).max(10000), (64 * nn).max(20000), (24 * nn).max(7500)],
            self.config.dedup_tolerance,
        );

        let mut run = LinearizerRun {
            fields: [xsln, ysln],
            items,
            eps,
            config: &self.config,
            out: &mut *data,
            max: 0.0,
            curved: false,
        };

        let traversal = || PairTraversal::new(xsln.mesh(), ysln.mesh()).ok_or(LinearizerError::IncompatibleMeshes);

        for state in traversal()? {
            run.seed_max(&state)?;
        }
        for state in traversal()? {
            run.process_state(&state)?;
        }

        if !data.find_min_max() {
            tracing::warn!("linearized fields have no finite values");
        }
        tracing::debug!(
            vertices = data.vertices().len(),
            triangles = data.triangles().len(),
            elapsed = ?start.elapsed(),
            "linearization finished"
        );

        let mut result = std::mem::replace(&mut *data, Linearization::new(self.config.dedup_tolerance));
        result.release_dedup();
        Ok(result)
    }
}

impl Default for Vectorizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Field samples over one sub-element at the order 1 linearization points
struct Samples {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Physical locations of the points (curved elements only)
    phys: Option<Vec<Point>>,
}

impl Samples {
    fn magnitude(&self, i: usize) -> f64 {
        self.x[i].hypot(self.y[i])
    }

    fn value(&self, i: usize) -> [f64; 2] {
        [self.x[i], self.y[i]]
    }
}

/// State of a single [Vectorizer::process_solution] call
struct LinearizerRun<'a> {
    fields: [&'a dyn MeshFunction; 2],
    items: [Item; 2],
    eps: f64,
    config: &'a LinearizerConfig,
    out: &'a mut Linearization,
    /// Largest finite magnitude seen so far
    max: f64,
    curved: bool,
}

/// The active element of each field under the current traversal state
#[derive(Clone, Copy)]
struct ActiveElems {
    mode: ElemMode,
    ids: [usize; 2],
}

impl<'a> LinearizerRun<'a> {
    fn sample_corners(&self, state: &TraversalState) -> Result<[Vec<f64>; 2], LinearizerError> {
        let corners: Vec<V2D> = LinQuad2D
            .points(0, state.mode)
            .iter()
            .map(|[x, y, _]| V2D::from([*x, *y]))
            .collect();

        Ok([
            self.fields[0].values(state.elems[0], &state.ctm[0], &corners, self.items[0])?,
            self.fields[1].values(state.elems[1], &state.ctm[1], &corners, self.items[1])?,
        ])
    }

    fn update_max(&mut self, x: &[f64], y: &[f64]) {
        for (fx, fy) in x.iter().zip(y.iter()) {
            let m = fx.hypot(*fy);
            if m.is_finite() && m > self.max {
                self.max = m;
            }
        }
    }

    fn seed_max(&mut self, state: &TraversalState) -> Result<(), LinearizerError> {
        let [x, y] = self.sample_corners(state)?;
        self.update_max(&x, &y);
        Ok(())
    }

    fn process_state(&mut self, state: &TraversalState) -> Result<(), LinearizerError> {
        let [xval, yval] = self.sample_corners(state)?;
        let xsln = self.fields[0];
        let mesh = xsln.mesh();
        let refmap = mesh.refmap(state.elems[0]);
        let nv = state.mode.num_vertices();

        let mut iv = [0; 4];
        for i in 0..nv {
            let p = refmap.phys(state.ctm[0].apply(state.mode.ref_vertex(i)));
            iv[i] = self.out.table_mut().create_vertex(p.x, p.y, xval[i], yval[i]);
        }

        self.curved = mesh.is_curved(state.elems[0]);
        let elems = ActiveElems {
            mode: state.mode,
            ids: state.elems,
        };

        match state.mode {
            ElemMode::Triangle => self.process_triangle([iv[0], iv[1], iv[2]], 0, &elems, state.ctm, None)?,
            ElemMode::Quad => self.process_quad(iv, 0, &elems, state.ctm, None)?,
        }

        self.process_edges(state, &iv[..nv]);
        Ok(())
    }

    // bold where the edge lies on an element edge in both meshes, dashed otherwise
    fn process_edges(&mut self, state: &TraversalState, iv: &[usize]) {
        let [xsln, ysln] = self.fields;
        let meshes = [xsln.mesh(), ysln.mesh()];
        let on_elem_edge = |side: usize, edge: usize| -> Option<(bool, u32)> {
            let elem = &meshes[side].elems[state.elems[side]];
            state.ctm[side]
                .edge_on_ref_edge(state.mode, edge)
                .map(|k| (elem.boundary[k], elem.edge_markers[k]))
        };

        for i in 0..iv.len() {
            let j = state.mode.next_vertex(i);
            let sides = [on_elem_edge(0, i), on_elem_edge(1, i)];
            let bold = sides.iter().all(|s| s.is_some());
            let boundary = sides.iter().all(|s| matches!(s, Some((true, _))));
            let marker = sides[0].map_or(0, |(_, marker)| marker);

            let (vi, vj) = (self.out.table().vertex(iv[i]), self.out.table().vertex(iv[j]));
            if boundary || vi.y < vj.y || (vi.y == vj.y && vi.x < vj.x) {
                if bold {
                    self.out.process_edge(iv[i], iv[j], marker);
                } else {
                    self.out.process_dash(iv[i], iv[j]);
                }
            }
        }
    }

    /// Sample both fields (and the geometry of curved elements) at the order 1 points of a sub-element
    fn sample(&mut self, elems: &ActiveElems, trf: &[Transform; 2]) -> Result<Samples, LinearizerError> {
        let points: Vec<V2D> = LinQuad2D
            .points(1, elems.mode)
            .iter()
            .map(|[x, y, _]| V2D::from([*x, *y]))
            .collect();

        let x = self.fields[0].values(elems.ids[0], &trf[0], &points, self.items[0])?;
        let y = self.fields[1].values(elems.ids[1], &trf[1], &points, self.items[1])?;
        self.update_max(&x, &y);

        let phys = if self.curved {
            let xsln = self.fields[0];
            let refmap = xsln.mesh().refmap(elems.ids[0]);
            Some(points.iter().map(|p| refmap.phys(trf[0].apply(*p))).collect())
        } else {
            None
        };

        Ok(Samples { x, y, phys })
    }

    fn push_son(trf: &[Transform; 2], mode: ElemMode, son: usize) -> [Transform; 2] {
        [trf[0].push_son(mode, son), trf[1].push_son(mode, son)]
    }

    /// Summed deviation of the sampled magnitudes from the linearized midpoint magnitudes
    fn linearization_error(samples: &Samples, idx: &[usize], midval: &[LinearVertex]) -> f64 {
        idx.iter()
            .zip(midval.iter())
            .map(|(i, mid)| (samples.magnitude(*i) - mid.magnitude()).abs())
            .sum()
    }

    /// Deviation of curved geometry from the straight midpoints, and the matching normalization
    fn curvature_error(samples: &Samples, idx: &[usize], midval: &[LinearVertex]) -> (f64, f64) {
        match &samples.phys {
            Some(phys) => idx
                .iter()
                .zip(midval.iter())
                .fold((0.0, 0.0), |(cerr, cden), (i, mid)| {
                    let p = phys[*i];
                    (
                        cerr + (p.x - mid.x).abs() + (p.y - mid.y).abs(),
                        cden + p.x.abs() + p.y.abs(),
                    )
                }),
            None => (0.0, 0.0),
        }
    }

    /// Compare interior points against the average of the two linearized midpoints they lie between
    fn interior_error(samples: &Samples, checks: &[(usize, [usize; 2])], midval: &[LinearVertex]) -> f64 {
        checks
            .iter()
            .map(|(p, [a, b])| (samples.magnitude(*p) - 0.5 * (midval[*a].magnitude() + midval[*b].magnitude())).abs())
            .sum()
    }

    fn should_split(
        &self,
        level: usize,
        samples: &Samples,
        idx: &[usize],
        midval: &[LinearVertex],
        checks: &[(usize, [usize; 2])],
        [edge_factor, interior_factor]: [f64; 2],
    ) -> bool {
        if self.eps >= 1.0 {
            return (level as f64) < self.eps;
        }

        let err = Self::linearization_error(samples, idx, midval);
        let mut split = !err.is_finite() || err > self.max * edge_factor * self.eps;

        if self.curved && !split {
            let (cerr, cden) = Self::curvature_error(samples, idx, midval);
            split = cerr > cden * self.config.curvature_tolerance;
        }

        // catches fields that vanish at the edge midpoints without being linear
        if level == 0 && !split {
            let err = Self::interior_error(samples, checks, midval);
            split = !err.is_finite() || err > self.max * interior_factor * self.eps;
        }

        split
    }

    fn midpoint_vertex(&mut self, p1: usize, p2: usize, mid: &LinearVertex, samples: &Samples, i: usize) -> usize {
        let (x, y) = match &samples.phys {
            Some(phys) => (phys[i].x, phys[i].y),
            None => (mid.x, mid.y),
        };
        let [xval, yval] = samples.value(i);
        self.out.table_mut().get_vertex(p1, p2, x, y, xval, yval)
    }

    fn process_triangle(
        &mut self,
        [iv0, iv1, iv2]: [usize; 3],
        level: usize,
        elems: &ActiveElems,
        trf: [Transform; 2],
        parent: Option<(&Samples, usize)>,
    ) -> Result<(), LinearizerError> {
        if level < self.config.max_level {
            let fresh;
            let (samples, idx) = if level % 2 == 0 {
                fresh = self.sample(elems, &trf)?;
                (&fresh, &LIN_TRI_INDICES[0])
            } else {
                match parent {
                    Some((samples, row)) => (samples, &LIN_TRI_INDICES[row]),
                    None => unreachable!("odd linearization levels always inherit their parent's samples"),
                }
            };

            let v = [iv0, iv1, iv2].map(|i| self.out.table().vertex(i));
            let midval = [v[0].midpoint(&v[1]), v[1].midpoint(&v[2]), v[2].midpoint(&v[0])];

            if self.should_split(level, samples, idx, &midval, &LIN_TRI_INTERIOR_CHECKS, [3.0, 3.0]) {
                let mid0 = self.midpoint_vertex(iv0, iv1, &midval[0], samples, idx[0]);
                let mid1 = self.midpoint_vertex(iv1, iv2, &midval[1], samples, idx[1]);
                let mid2 = self.midpoint_vertex(iv2, iv0, &midval[2], samples, idx[2]);

                let sons = [[iv0, mid0, mid2], [mid0, iv1, mid1], [mid2, mid1, iv2], [mid1, mid2, mid0]];
                for (son, son_verts) in sons.into_iter().enumerate() {
                    self.process_triangle(
                        son_verts,
                        level + 1,
                        elems,
                        Self::push_son(&trf, ElemMode::Triangle, son),
                        Some((samples, son + 1)),
                    )?;
                }
                return Ok(());
            }
        }

        self.out.add_triangle([iv0, iv1, iv2]);
        Ok(())
    }

    fn process_quad(
        &mut self,
        [iv0, iv1, iv2, iv3]: [usize; 4],
        level: usize,
        elems: &ActiveElems,
        trf: [Transform; 2],
        parent: Option<(&Samples, usize)>,
    ) -> Result<(), LinearizerError> {
        let v = [iv0, iv1, iv2, iv3].map(|i| self.out.table().vertex(i));

        // keep the diagonal away from the corner with the largest magnitude
        let largest = (1..4).fold(0, |a, i| if v[i].magnitude_sq() > v[a].magnitude_sq() { i } else { a });
        let flip = largest % 2 == 1;

        if level < self.config.max_level {
            let fresh;
            let (samples, idx) = if level % 2 == 0 {
                fresh = self.sample(elems, &trf)?;
                (&fresh, &LIN_QUAD_INDICES[0])
            } else {
                match parent {
                    Some((samples, row)) => (samples, &LIN_QUAD_INDICES[row]),
                    None => unreachable!("odd linearization levels always inherit their parent's samples"),
                }
            };

            let mids = [
                v[0].midpoint(&v[1]),
                v[1].midpoint(&v[2]),
                v[2].midpoint(&v[3]),
                v[3].midpoint(&v[0]),
            ];
            // the center's value follows the diagonal the quad would be cut along
            let center_value = if flip { v[0].midpoint(&v[2]) } else { v[1].midpoint(&v[3]) };
            let center = mids[0].midpoint(&mids[2]);
            let midval = [
                mids[0],
                mids[1],
                mids[2],
                mids[3],
                LinearVertex::new(center.x, center.y, center_value.xval, center_value.yval),
            ];

            if self.should_split(level, samples, idx, &midval, &LIN_QUAD_INTERIOR_CHECKS, [4.0, 2.0]) {
                let mid0 = self.midpoint_vertex(iv0, iv1, &midval[0], samples, idx[0]);
                let mid1 = self.midpoint_vertex(iv1, iv2, &midval[1], samples, idx[1]);
                let mid2 = self.midpoint_vertex(iv2, iv3, &midval[2], samples, idx[2]);
                let mid3 = self.midpoint_vertex(iv3, iv0, &midval[3], samples, idx[3]);
                let mid4 = self.midpoint_vertex(mid0, mid2, &midval[4], samples, idx[4]);

                let sons = [
                    [iv0, mid0, mid4, mid3],
                    [mid0, iv1, mid1, mid4],
                    [mid4, mid1, iv2, mid2],
                    [mid3, mid4, mid2, iv3],
                ];
                for (son, son_verts) in sons.into_iter().enumerate() {
                    self.process_quad(
                        son_verts,
                        level + 1,
                        elems,
                        Self::push_son(&trf, ElemMode::Quad, son),
                        Some((samples, son + 1)),
                    )?;
                }
                return Ok(());
            }
        }

        if flip {
            self.out.add_triangle([iv0, iv1, iv2]);
            self.out.add_triangle([iv2, iv3, iv0]);
        } else {
            self.out.add_triangle([iv3, iv0, iv1]);
            self.out.add_triangle([iv1, iv2, iv3]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::H1Lobatto;
    use crate::domain::Mesh;
    use crate::fields::{ExactSolution, Solution};

    fn single_triangle() -> Mesh {
        Mesh::new(
            vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(0.0, 1.0)],
            vec![vec![0, 1, 2]],
        )
        .unwrap()
    }

    fn unit_square() -> Mesh {
        Mesh::rect_quads([0.0, 1.0], [0.0, 1.0], [1, 1]).unwrap()
    }

    fn linearize<F: Fn(Point) -> [f64; 2]>(
        vectorizer: &Vectorizer,
        mesh: &Mesh,
        f: F,
        eps: f64,
    ) -> Linearization {
        let field = ExactSolution::vector(mesh, f);
        vectorizer
            .process_solution(&field, &field, Item::VALUE_0, Item::VALUE_1, eps)
            .unwrap()
    }

    #[test]
    fn linear_field_is_not_split() {
        let vectorizer = Vectorizer::new();
        let linear = |p: Point| {
            let g = 1.0 + p.x + 2.0 * p.y;
            [g, 0.5 * g]
        };

        let lin = linearize(&vectorizer, &unit_square(), linear, 0.01);
        assert_eq!(lin.vertices().len(), 4);
        assert_eq!(lin.triangles().len(), 2);

        let lin = linearize(&vectorizer, &single_triangle(), linear, 0.01);
        assert_eq!(lin.vertices().len(), 3);
        assert_eq!(lin.triangles(), &[[0, 1, 2]]);

        let (min, max) = lin.value_range();
        assert!((min - 1.25_f64.sqrt()).abs() < 1e-12);
        assert!((max - 3.0 * 1.25_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn fixed_depth() {
        let vectorizer = Vectorizer::new();
        let smooth = |p: Point| [p.x.sin(), p.y.cos()];

        assert_eq!(linearize(&vectorizer, &unit_square(), smooth, 2.0).triangles().len(), 32);
        assert_eq!(linearize(&vectorizer, &single_triangle(), smooth, 2.0).triangles().len(), 16);
        assert_eq!(linearize(&vectorizer, &unit_square(), smooth, 1.0).triangles().len(), 8);
    }

    #[test]
    fn quad_diagonal_avoids_largest_corner() {
        let vectorizer = Vectorizer::new();
        let mesh = unit_square();

        // largest magnitude at v1 or v3: cut along v0-v2
        for f in [|p: Point| [2.0 + p.x - p.y, 0.0], |p: Point| [2.0 - p.x + p.y, 0.0]] {
            let lin = linearize(&vectorizer, &mesh, f, 0.01);
            assert_eq!(lin.triangles(), &[[0, 1, 2], [2, 3, 0]]);
        }

        // largest magnitude at v0 or v2: cut along v1-v3
        for f in [|p: Point| [3.0 - p.x - p.y, 0.0], |p: Point| [1.0 + p.x + p.y, 0.0]] {
            let lin = linearize(&vectorizer, &mesh, f, 0.01);
            assert_eq!(lin.triangles(), &[[3, 0, 1], [1, 2, 3]]);
        }

        // a large v1 must win even when v2 beats v3
        let lin = linearize(&vectorizer, &mesh, |p: Point| [2.0 + 3.0 * p.x - 1.5 * p.y, 0.0], 0.01);
        assert_eq!(lin.triangles(), &[[0, 1, 2], [2, 3, 0]]);
    }

    #[test]
    fn vanishing_midpoints_still_split() {
        // sin(2 pi x) is zero at every corner, edge midpoint and the center of the unit square
        let wave = |p: Point| [(2.0 * std::f64::consts::PI * p.x).sin(), 0.0];
        let points = LinQuad2D.points(1, ElemMode::Quad);
        let samples = Samples {
            x: points.iter().map(|[u, _, _]| wave(Point::new((u + 1.0) / 2.0, 0.0))[0]).collect(),
            y: vec![0.0; points.len()],
            phys: None,
        };
        let midval = [LinearVertex::new(0.0, 0.0, 0.0, 0.0); 5];

        let edge_err = LinearizerRun::linearization_error(&samples, &LIN_QUAD_INDICES[0], &midval);
        let interior_err = LinearizerRun::interior_error(&samples, &LIN_QUAD_INTERIOR_CHECKS, &midval);
        assert!(edge_err < 1e-12);
        assert!(interior_err > 1.0);

        let lin = linearize(&Vectorizer::new(), &unit_square(), wave, 0.01);
        assert!(lin.triangles().len() > 2);
        let (_, max) = lin.value_range();
        assert!(max > 0.9);
    }

    #[test]
    fn non_finite_fields_terminate() {
        let vectorizer = Vectorizer::with_config(LinearizerConfig {
            max_level: 3,
            ..Default::default()
        });

        let lin = linearize(&vectorizer, &unit_square(), |_| [f64::NAN, 0.0], 0.01);
        assert_eq!(lin.triangles().len(), 2 * 4_usize.pow(3));
        assert_eq!(lin.value_range(), (0.0, 0.0));

        let lin = linearize(&vectorizer, &single_triangle(), |_| [f64::INFINITY, 1.0], 0.01);
        assert_eq!(lin.triangles().len(), 4_usize.pow(3));
    }

    #[test]
    fn sharp_features_are_refined() {
        let vectorizer = Vectorizer::new();
        let mesh = Mesh::rect_quads([0.0, 1.0], [0.0, 1.0], [2, 2]).unwrap();
        let peak = |p: Point| {
            let r2 = (p.x - 0.3).powi(2) + (p.y - 0.6).powi(2);
            [(-r2 / 0.005).exp(), 0.0]
        };

        let fine = linearize(&vectorizer, &mesh, peak, 0.001);
        let coarse = linearize(&vectorizer, &mesh, peak, 0.5);
        assert!(fine.triangles().len() > coarse.triangles().len());

        // vertices are shared between neighboring sub-elements
        assert!(fine.vertices().len() < 3 * fine.triangles().len());
        for tri in fine.triangles() {
            assert!(tri.iter().all(|v| *v < fine.vertices().len()));
        }
    }

    #[test]
    fn bold_edges_and_dashes() {
        let vectorizer = Vectorizer::new();
        let mut fine = unit_square();
        fine.refine_all().unwrap();
        let coarse = unit_square();

        let xsln = ExactSolution::scalar(&fine, |_: Point| [1.0, 0.0]);
        let ysln = ExactSolution::scalar(&coarse, |_: Point| [2.0, 0.0]);
        let lin = vectorizer
            .process_solution(&xsln, &ysln, Item::VALUE_0, Item::VALUE_0, 0.5)
            .unwrap();

        assert_eq!(lin.triangles().len(), 8);
        assert_eq!(lin.edges().len(), 8);
        assert!(lin.edges().iter().all(|e| e.marker == 1));
        assert_eq!(lin.dashes().len(), 4);

        let [min, max] = lin.aabb().unwrap();
        assert_eq!((min.x, min.y, max.x, max.y), (0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn split_edges_are_flattened() {
        let vectorizer = Vectorizer::new();
        let lin = linearize(&vectorizer, &unit_square(), |p: Point| [p.x, 1.0], 1.0);

        // each boundary edge is split once
        assert_eq!(lin.edges().len(), 8);
        assert!(lin.dashes().is_empty());
        assert_eq!(lin.vertices().len(), 9);
    }

    #[test]
    fn curved_elements_follow_geometry() {
        let vectorizer = Vectorizer::new();
        let mesh = Mesh::from_file("./test_input/quarter_annulus.json").unwrap();
        let lin = linearize(&vectorizer, &mesh, |_| [1.0, 0.0], 0.01);

        assert!(lin.triangles().len() > 4);
        for v in lin.vertices() {
            let r = v.position().as_v2d().norm();
            assert!(r > 1.0 - 1e-9 && r < 2.0 + 1e-9);
        }
    }

    #[test]
    fn solution_fields() {
        let mesh = Mesh::rect_triangles([0.0, 1.0], [0.0, 1.0], [2, 2]).unwrap();
        let quadratic = Solution::project_local(&mesh, H1Lobatto::new(), 2, |p: Point| [p.x * p.x + p.y, 0.0]).unwrap();
        let linear = Solution::project_local(&mesh, H1Lobatto::new(), 1, |p: Point| [1.0 + p.x, 0.0]).unwrap();

        let vectorizer = Vectorizer::new();
        let curved_lin = vectorizer
            .process_solution(&quadratic, &linear, Item::VALUE_0, Item::VALUE_0, 0.001)
            .unwrap();
        assert!(curved_lin.triangles().len() > mesh.elems.len());

        let grad = vectorizer
            .process_solution(&linear, &linear, Item::DX_0, Item::DY_0, 0.01)
            .unwrap();
        assert_eq!(grad.triangles().len(), mesh.elems.len());
        let (min, max) = grad.value_range();
        assert!((min - 1.0).abs() < 1e-9 && (max - 1.0).abs() < 1e-9);

        assert!(vectorizer.lock_data().unwrap().vertices().is_empty());
    }

    #[test]
    fn scratch_state_is_released() {
        let vectorizer = Vectorizer::new();
        let lin = linearize(&vectorizer, &unit_square(), |p: Point| [(5.0 * p.x).sin(), p.y], 0.001);
        assert!(lin.triangles().len() > 2);

        // the result owns the only copy of the vertices; its midpoint chains are gone
        assert_eq!(lin.table().peek_vertex(0, 1), None);
        let scratch = vectorizer.lock_data().unwrap();
        assert!(scratch.vertices().is_empty());
        assert!(scratch.triangles().is_empty());
        assert_eq!(scratch.table().peek_vertex(0, 1), None);
    }

    #[test]
    fn invalid_requests() {
        let vectorizer = Vectorizer::new();
        let mesh = unit_square();
        let other = Mesh::rect_quads([0.0, 2.0], [0.0, 1.0], [1, 1]).unwrap();
        let f = ExactSolution::vector(&mesh, |_: Point| [1.0, 1.0]);
        let g = ExactSolution::vector(&other, |_: Point| [1.0, 1.0]);

        assert!(matches!(
            vectorizer.process_solution(&f, &g, Item::VALUE_0, Item::VALUE_1, 0.1),
            Err(LinearizerError::IncompatibleMeshes)
        ));
        assert!(matches!(
            vectorizer.process_solution(&f, &f, 0x3, Item::VALUE_1, 0.1),
            Err(LinearizerError::InvalidItem(0x3))
        ));
        assert!(matches!(
            vectorizer.process_solution(&f, &f, Item::DX_0, Item::VALUE_1, 0.1),
            Err(LinearizerError::Field(_))
        ));
    }
}

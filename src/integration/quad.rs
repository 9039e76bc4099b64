use super::glq::{gauss_quadrature_points, points_for_order};
use crate::domain::{ElemMode, V2D};

/// A quadrature point on a reference domain: `[x, y, weight]`
pub type QuadPoint = [f64; 3];

/// Tables of 2D quadrature points on the reference triangle and quad
///
/// Tables `0..=max_order` hold the element points of each order. They are followed by one table per
/// order and edge holding points along that edge (see [Quad2D::edge_table_index]).
pub trait Quad2D {
    fn max_order(&self, mode: ElemMode) -> usize;

    fn num_tables(&self, mode: ElemMode) -> usize;

    /// Retrieve a table by its raw index
    fn table(&self, index: usize, mode: ElemMode) -> &[QuadPoint];

    /// Element points integrating polynomials of degree `order` exactly
    fn points(&self, order: usize, mode: ElemMode) -> &[QuadPoint] {
        assert!(
            order <= self.max_order(mode),
            "Order {} exceeds the maximum quadrature order ({}) on {:?}s!",
            order,
            self.max_order(mode),
            mode
        );
        self.table(order, mode)
    }

    fn num_points(&self, order: usize, mode: ElemMode) -> usize {
        self.points(order, mode).len()
    }

    /// Index of the table holding the points of a given order along an edge
    fn edge_table_index(&self, edge: usize, order: usize, mode: ElemMode) -> usize {
        self.max_order(mode) + 1 + mode.num_vertices() * order + edge
    }

    fn edge_points(&self, edge: usize, order: usize, mode: ElemMode) -> &[QuadPoint] {
        self.table(self.edge_table_index(edge, order, mode), mode)
    }

    fn ref_vertex(&self, vertex: usize, mode: ElemMode) -> V2D {
        mode.ref_vertex(vertex)
    }
}

/// Gauss quadrature: tensor product rules on quads, collapsed (Duffy) rules on triangles
#[derive(Clone, Debug)]
pub struct GaussQuad2D {
    max_order: usize,
    tables: [Vec<Vec<QuadPoint>>; 2],
}

impl GaussQuad2D {
    pub fn new(max_order: usize) -> Self {
        let mut tables = [Vec::new(), Vec::new()];

        for mode in [ElemMode::Triangle, ElemMode::Quad] {
            let mode_tables = &mut tables[mode.index()];
            for order in 0..=max_order {
                mode_tables.push(match mode {
                    ElemMode::Triangle => collapsed_triangle_points(order),
                    ElemMode::Quad => tensor_quad_points(order),
                });
            }
            for order in 0..=max_order {
                for edge in 0..mode.num_vertices() {
                    mode_tables.push(edge_points(mode, edge, order));
                }
            }
        }

        Self { max_order, tables }
    }
}

impl Quad2D for GaussQuad2D {
    fn max_order(&self, _: ElemMode) -> usize {
        self.max_order
    }

    fn num_tables(&self, mode: ElemMode) -> usize {
        self.tables[mode.index()].len()
    }

    fn table(&self, index: usize, mode: ElemMode) -> &[QuadPoint] {
        &self.tables[mode.index()][index]
    }
}

fn tensor_quad_points(order: usize) -> Vec<QuadPoint> {
    let (points, weights) = gauss_quadrature_points(points_for_order(order));

    points
        .iter()
        .zip(weights.iter())
        .flat_map(|(y, w_y)| {
            points
                .iter()
                .zip(weights.iter())
                .map(move |(x, w_x)| [*x, *y, w_x * w_y])
        })
        .collect()
}

// the square [-1, 1]^2 collapsed onto the reference triangle along its top edge
fn collapsed_triangle_points(order: usize) -> Vec<QuadPoint> {
    let (xi, w_xi) = gauss_quadrature_points(points_for_order(order));
    let (eta, w_eta) = gauss_quadrature_points(points_for_order(order + 1));

    eta.iter()
        .zip(w_eta.iter())
        .flat_map(|(eta, w_eta)| {
            let shrink = (1.0 - eta) / 2.0;
            xi.iter()
                .zip(w_xi.iter())
                .map(move |(xi, w_xi)| [(1.0 + xi) * shrink - 1.0, *eta, w_xi * w_eta * shrink])
        })
        .collect()
}

// 1D gauss points along an edge; weights are taken w.r.t. the edge parameter in [-1, 1]
fn edge_points(mode: ElemMode, edge: usize, order: usize) -> Vec<QuadPoint> {
    let (points, weights) = gauss_quadrature_points(points_for_order(order));
    let a = mode.ref_vertex(edge);
    let b = mode.ref_vertex(mode.next_vertex(edge));

    points
        .iter()
        .zip(weights.iter())
        .map(|(t, w)| {
            let p = a + (b - a) * ((t + 1.0) / 2.0);
            [p[0], p[1], *w]
        })
        .collect()
}

/// Linearization points of the triangle at order 0 (vertices)
const LIN_TRI_0: [QuadPoint; 3] = [[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [-1.0, 1.0, 1.0]];

/// Linearization points of the triangle at order 1: edge midpoints of the element and of its 4 sons
const LIN_TRI_1: [QuadPoint; 12] = [
    [0.0, -1.0, 1.0],
    [0.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [-0.5, -1.0, 1.0],
    [-0.5, -0.5, 1.0],
    [-1.0, -0.5, 1.0],
    [0.5, -1.0, 1.0],
    [0.5, -0.5, 1.0],
    [0.0, -0.5, 1.0],
    [-0.5, 0.0, 1.0],
    [-0.5, 0.5, 1.0],
    [-1.0, 0.5, 1.0],
];

/// Linearization points of the quad at order 0 (vertices)
const LIN_QUAD_0: [QuadPoint; 4] = [
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

/// Linearization points of the quad at order 1: edge midpoints and centers of the element and of its 4 sons
const LIN_QUAD_1: [QuadPoint; 21] = [
    [0.0, -1.0, 1.0],
    [1.0, 0.0, 1.0],
    [0.0, 1.0, 1.0],
    [-1.0, 0.0, 1.0],
    [0.0, 0.0, 1.0],
    [-0.5, -1.0, 1.0],
    [0.0, -0.5, 1.0],
    [-0.5, 0.0, 1.0],
    [-1.0, -0.5, 1.0],
    [-0.5, -0.5, 1.0],
    [0.5, -1.0, 1.0],
    [1.0, -0.5, 1.0],
    [0.5, 0.0, 1.0],
    [0.5, -0.5, 1.0],
    [1.0, 0.5, 1.0],
    [0.5, 1.0, 1.0],
    [0.0, 0.5, 1.0],
    [0.5, 0.5, 1.0],
    [-0.5, 1.0, 1.0],
    [-1.0, 0.5, 1.0],
    [-0.5, 0.5, 1.0],
];

/// Rows into [LIN_TRI_1]: the element's own edge midpoints, then the edge midpoints of each son
pub static LIN_TRI_INDICES: [[usize; 3]; 5] = [[0, 1, 2], [3, 4, 5], [6, 7, 8], [9, 10, 11], [9, 4, 8]];

/// Rows into [LIN_QUAD_1]: the element's own edge midpoints and center, then those of each son
pub static LIN_QUAD_INDICES: [[usize; 5]; 5] = [
    [0, 1, 2, 3, 4],
    [5, 6, 7, 8, 9],
    [10, 11, 12, 6, 13],
    [12, 14, 15, 16, 17],
    [7, 16, 18, 19, 20],
];

/// Interior points of [LIN_TRI_1] checked at level 0, with the two element edge midpoints they lie between
pub const LIN_TRI_INTERIOR_CHECKS: [(usize, [usize; 2]); 3] = [(8, [0, 1]), (9, [1, 2]), (4, [2, 0])];

/// Interior points of [LIN_QUAD_1] checked at level 0, with the two element edge midpoints they lie between
pub const LIN_QUAD_INTERIOR_CHECKS: [(usize, [usize; 2]); 4] =
    [(13, [0, 1]), (17, [1, 2]), (20, [2, 3]), (9, [3, 0])];

/// The point tables used by the linearizer
///
/// Order 0 holds the vertices. Order 1 holds the midpoints needed to evaluate an element and its sons in
/// one pass, so odd recursion levels can reuse their parent's samples through [LIN_TRI_INDICES] / [LIN_QUAD_INDICES].
#[derive(Clone, Copy, Debug, Default)]
pub struct LinQuad2D;

impl Quad2D for LinQuad2D {
    fn max_order(&self, _: ElemMode) -> usize {
        1
    }

    fn num_tables(&self, _: ElemMode) -> usize {
        2
    }

    fn table(&self, index: usize, mode: ElemMode) -> &[QuadPoint] {
        match (mode, index) {
            (ElemMode::Triangle, 0) => &LIN_TRI_0,
            (ElemMode::Triangle, 1) => &LIN_TRI_1,
            (ElemMode::Quad, 0) => &LIN_QUAD_0,
            (ElemMode::Quad, 1) => &LIN_QUAD_1,
            _ => panic!("Linearization quadrature has no table {} on {:?}s!", index, mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD_ACCURACY: f64 = 1e-12;

    fn integrate<F: Fn(f64, f64) -> f64>(points: &[QuadPoint], f: F) -> f64 {
        points.iter().map(|[x, y, w]| f(*x, *y) * w).sum()
    }

    #[test]
    fn gauss_quad_exactness() {
        let quad = GaussQuad2D::new(8);

        for order in 0..=8 {
            let quad_pts = quad.points(order, ElemMode::Quad);
            let tri_pts = quad.points(order, ElemMode::Triangle);

            assert!((integrate(quad_pts, |_, _| 1.0) - 4.0).abs() < QUAD_ACCURACY);
            assert!((integrate(tri_pts, |_, _| 1.0) - 2.0).abs() < QUAD_ACCURACY);

            // x^order over the reference triangle: int_{-1}^{1} int_{-1}^{-y} x^n dx dy
            let n = order as i32;
            let tri_exact = {
                let (pts, wts) = gauss_quadrature_points(20);
                pts.iter()
                    .zip(wts.iter())
                    .map(|(y, w)| w * ((-y).powi(n + 1) - (-1.0_f64).powi(n + 1)) / (n as f64 + 1.0))
                    .sum::<f64>()
            };
            assert!((integrate(tri_pts, |x, _| x.powi(n)) - tri_exact).abs() < 1e-10);
        }
    }

    #[test]
    fn edge_tables() {
        let quad = GaussQuad2D::new(4);

        assert_eq!(quad.num_tables(ElemMode::Quad), 5 + 4 * 5);
        assert_eq!(quad.num_tables(ElemMode::Triangle), 5 + 3 * 5);
        assert_eq!(quad.edge_table_index(1, 2, ElemMode::Triangle), 5 + 3 * 2 + 1);

        // the hypotenuse of the triangle: x + y = 0
        for [x, y, _] in quad.edge_points(1, 3, ElemMode::Triangle) {
            assert!((x + y).abs() < QUAD_ACCURACY);
        }
        for [_, y, _] in quad.edge_points(2, 3, ElemMode::Quad) {
            assert!((y - 1.0).abs() < QUAD_ACCURACY);
        }
    }

    #[test]
    fn linearization_son_indices() {
        let lin = LinQuad2D;

        // the midpoints of each son's edges match the rows of the index tables
        for mode in [ElemMode::Triangle, ElemMode::Quad] {
            let pts = lin.points(1, mode);
            let verts = lin.points(0, mode);
            let nv = mode.num_vertices();

            for son in 0..4 {
                let trf = crate::domain::Transform::son(mode, son);
                for edge in 0..nv {
                    let a = trf.apply(V2D::from([verts[edge][0], verts[edge][1]]));
                    let b_v = verts[mode.next_vertex(edge)];
                    let b = trf.apply(V2D::from([b_v[0], b_v[1]]));
                    let mid = (a + b) / 2.0;

                    let idx = match mode {
                        ElemMode::Triangle => LIN_TRI_INDICES[son + 1][edge],
                        ElemMode::Quad => LIN_QUAD_INDICES[son + 1][edge],
                    };
                    assert_eq!(V2D::from([pts[idx][0], pts[idx][1]]), mid);
                }

                if mode == ElemMode::Quad {
                    let center = LIN_QUAD_INDICES[son + 1][4];
                    assert_eq!(V2D::from([pts[center][0], pts[center][1]]), trf.apply(V2D::from([0.0, 0.0])));
                }
            }
            if mode == ElemMode::Quad {
                assert_eq!(V2D::from([pts[LIN_QUAD_INDICES[0][4]][0], pts[LIN_QUAD_INDICES[0][4]][1]]), V2D::from([0.0, 0.0]));
            }
        }
    }
}

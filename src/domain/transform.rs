use super::mesh::elem::ElemMode;
use super::space::V2D;

/// Son transforms of a triangle (`[m_x, m_y, t_x, t_y]`), matching the son layout produced by h-refinement
const TRI_SON_TRF: [[f64; 4]; 4] = [
    [0.5, 0.5, -0.5, -0.5],
    [0.5, 0.5, 0.5, -0.5],
    [0.5, 0.5, -0.5, 0.5],
    [-0.5, -0.5, -0.5, -0.5],
];

/// Son transforms of a quad (`[m_x, m_y, t_x, t_y]`), counter-clockwise from the lower-left quadrant
const QUAD_SON_TRF: [[f64; 4]; 4] = [
    [0.5, 0.5, -0.5, -0.5],
    [0.5, 0.5, 0.5, -0.5],
    [0.5, 0.5, 0.5, 0.5],
    [0.5, 0.5, -0.5, 0.5],
];

/// Diagonal affine map between reference domains: `p' = m * p + t`
///
/// Every sub-element reached through h-refinement (or through the recursion of the vectorizer) is described
/// by one of these relative to its ancestor. Composition is exact for the dyadic coefficients used here,
/// which is what lets [Transform::edge_on_ref_edge] compare coordinates exactly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub m: [f64; 2],
    pub t: [f64; 2],
}

impl Transform {
    pub const IDENTITY: Self = Self {
        m: [1.0, 1.0],
        t: [0.0, 0.0],
    };

    /// The transform taking a son's reference domain into its parent's
    pub fn son(mode: ElemMode, son: usize) -> Self {
        assert!(son < 4, "Elements only have 4 sons; cannot build transform for son {}!", son);
        let [mx, my, tx, ty] = match mode {
            ElemMode::Triangle => TRI_SON_TRF[son],
            ElemMode::Quad => QUAD_SON_TRF[son],
        };
        Self {
            m: [mx, my],
            t: [tx, ty],
        }
    }

    /// `self ∘ inner`: apply `inner` first, then `self`
    pub fn compose(&self, inner: &Self) -> Self {
        Self {
            m: [self.m[0] * inner.m[0], self.m[1] * inner.m[1]],
            t: [
                self.m[0] * inner.t[0] + self.t[0],
                self.m[1] * inner.t[1] + self.t[1],
            ],
        }
    }

    /// Descend into a son of the sub-element described by this transform
    pub fn push_son(&self, mode: ElemMode, son: usize) -> Self {
        self.compose(&Self::son(mode, son))
    }

    #[inline]
    pub fn apply(&self, p: V2D) -> V2D {
        V2D::from([self.m[0] * p[0] + self.t[0], self.m[1] * p[1] + self.t[1]])
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// If edge `edge` of the transformed reference domain lies on an edge of the target reference domain, returns that edge's index.
    ///
    /// The comparison is exact.
    pub fn edge_on_ref_edge(&self, mode: ElemMode, edge: usize) -> Option<usize> {
        let a = self.apply(mode.ref_vertex(edge));
        let b = self.apply(mode.ref_vertex(mode.next_vertex(edge)));

        (0..mode.num_vertices())
            .find(|target| lies_on_ref_edge(mode, *target, a) && lies_on_ref_edge(mode, *target, b))
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

fn lies_on_ref_edge(mode: ElemMode, edge: usize, p: V2D) -> bool {
    match (mode, edge) {
        (_, 0) => p[1] == -1.0,
        (ElemMode::Triangle, 1) => p[0] + p[1] == 0.0,
        (ElemMode::Triangle, 2) => p[0] == -1.0,
        (ElemMode::Quad, 1) => p[0] == 1.0,
        (ElemMode::Quad, 2) => p[1] == 1.0,
        (ElemMode::Quad, 3) => p[0] == -1.0,
        _ => panic!("{:?} has no edge {}; cannot check reference edge!", mode, edge),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_sons_tile_the_parent() {
        let mode = ElemMode::Triangle;
        // son 3 is the flipped center triangle: (m1, m2, m0)
        let son_3 = Transform::son(mode, 3);
        assert_eq!(son_3.apply(mode.ref_vertex(0)), V2D::from([0.0, 0.0]));
        assert_eq!(son_3.apply(mode.ref_vertex(1)), V2D::from([-1.0, 0.0]));
        assert_eq!(son_3.apply(mode.ref_vertex(2)), V2D::from([0.0, -1.0]));

        let son_1 = Transform::son(mode, 1);
        assert_eq!(son_1.apply(mode.ref_vertex(1)), mode.ref_vertex(1));
    }

    #[test]
    fn composition_order() {
        let mode = ElemMode::Quad;
        let trf = Transform::IDENTITY.push_son(mode, 2).push_son(mode, 0);
        // lower-left quadrant of the upper-right quadrant
        assert_eq!(trf.apply(V2D::from([-1.0, -1.0])), V2D::from([0.0, 0.0]));
        assert_eq!(trf.apply(V2D::from([1.0, 1.0])), V2D::from([0.5, 0.5]));
    }

    #[test]
    fn edges_on_parent_edges() {
        let quad = ElemMode::Quad;
        let son_0 = Transform::son(quad, 0);
        assert_eq!(son_0.edge_on_ref_edge(quad, 0), Some(0));
        assert_eq!(son_0.edge_on_ref_edge(quad, 1), None);
        assert_eq!(son_0.edge_on_ref_edge(quad, 2), None);
        assert_eq!(son_0.edge_on_ref_edge(quad, 3), Some(3));

        let tri = ElemMode::Triangle;
        let son_3 = Transform::son(tri, 3);
        assert!((0..3).all(|e| son_3.edge_on_ref_edge(tri, e).is_none()));

        let son_2 = Transform::son(tri, 2);
        assert_eq!(son_2.edge_on_ref_edge(tri, 1), Some(1));
        assert_eq!(son_2.edge_on_ref_edge(tri, 2), Some(2));
    }
}

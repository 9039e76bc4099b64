use super::super::space::{Point, V2D};
use super::elem::ElemMode;
use smallvec::SmallVec;

/// A circular arc replacing a straight element edge
///
/// The arc passes through both end nodes and subtends `angle` degrees. Positive angles bulge
/// to the right of the edge direction (out of a counter-clockwise element), negative angles to the left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeArc {
    pub angle: f64,
}

impl EdgeArc {
    /// Only arcs strictly between 0 and 180 degrees (in magnitude) are supported
    pub fn is_valid_angle(angle: f64) -> bool {
        angle.is_finite() && angle != 0.0 && angle.abs() < 180.0
    }

    /// Offset of the arc from the straight edge `a -> b` at edge parameter `t` in `[-1, 1]`
    pub fn deviation(&self, a: &Point, b: &Point, t: f64) -> V2D {
        let chord = *b - *a;
        let length = chord.norm();
        let dir = chord / length;
        let normal = V2D::from([dir[1], -dir[0]]);

        let half_theta = self.angle.to_radians() / 2.0;
        let radius = length / (2.0 * half_theta.sin());
        let mid = Point::between(a, b).as_v2d();
        let center = mid - normal * (radius * half_theta.cos());

        let phi = t * half_theta;
        let on_arc = center + (dir * phi.sin() + normal * phi.cos()) * radius;
        let on_chord = mid + dir * (t * length / 2.0);

        on_arc - on_chord
    }
}

/// Curvature description of a base element: an optional arc on each edge
#[derive(Clone, Debug, Default)]
pub struct CurvMap {
    pub arcs: SmallVec<[Option<EdgeArc>; 4]>,
}

impl CurvMap {
    pub fn new(num_edges: usize) -> Self {
        Self {
            arcs: SmallVec::from_elem(None, num_edges),
        }
    }

    pub fn is_curved(&self) -> bool {
        self.arcs.iter().any(|arc| arc.is_some())
    }

    /// Transfinite blending of the edge deviations at reference point `p`
    ///
    /// Each edge's deviation vanishes at its end nodes, so the blended offset is exact along every edge.
    pub fn offset(&self, mode: ElemMode, corners: &[Point], p: V2D) -> V2D {
        let mut offset = V2D::default();

        for (edge, arc) in self.arcs.iter().enumerate() {
            if let Some(arc) = arc {
                if let Some((t, blend)) = edge_parameter(mode, edge, p) {
                    let a = &corners[edge];
                    let b = &corners[mode.next_vertex(edge)];
                    offset = offset + arc.deviation(a, b, t) * blend;
                }
            }
        }

        offset
    }
}

/// Edge parameter (`-1` at the edge's first vertex, `+1` at its second) and blending weight of point `p`
fn edge_parameter(mode: ElemMode, edge: usize, p: V2D) -> Option<(f64, f64)> {
    let [x, y] = [p[0], p[1]];
    match mode {
        ElemMode::Quad => Some(match edge {
            0 => (x, (1.0 - y) / 2.0),
            1 => (y, (1.0 + x) / 2.0),
            2 => (-x, (1.0 + y) / 2.0),
            3 => (-y, (1.0 - x) / 2.0),
            _ => unreachable!(),
        }),
        ElemMode::Triangle => {
            let lambda = [-(x + y) / 2.0, (1.0 + x) / 2.0, (1.0 + y) / 2.0];
            let l_a = lambda[edge];
            let l_b = lambda[mode.next_vertex(edge)];
            let s = l_a + l_b;
            if s < 1e-14 {
                None
            } else {
                Some(((l_b - l_a) / s, s))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arc_deviation_vanishes_at_nodes() {
        let arc = EdgeArc { angle: 90.0 };
        let a = Point::new(1.0, 0.0);
        let b = Point::new(0.0, 1.0);

        assert!(arc.deviation(&a, &b, -1.0).norm() < 1e-14);
        assert!(arc.deviation(&a, &b, 1.0).norm() < 1e-14);

        // quarter circle around the origin: the midpoint of the arc lies at radius 1
        let mid = Point::between(&a, &b) + arc.deviation(&a, &b, 0.0);
        assert!((mid.as_v2d().norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn blended_offset_is_exact_on_edges() {
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        let mut curv = CurvMap::new(4);
        curv.arcs[1] = Some(EdgeArc { angle: -60.0 });

        // the offset on the opposite edge must vanish
        for t in [-1.0, -0.3, 0.0, 0.6, 1.0] {
            let off = curv.offset(ElemMode::Quad, &corners, V2D::from([-1.0, t]));
            assert!(off.norm() < 1e-14);
        }

        let on_edge = curv.offset(ElemMode::Quad, &corners, V2D::from([1.0, 0.2]));
        let expected = EdgeArc { angle: -60.0 }.deviation(&corners[1], &corners[2], 0.2);
        assert!((on_edge - expected).norm() < 1e-14);
    }
}

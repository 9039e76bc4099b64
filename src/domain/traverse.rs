use super::mesh::{elem::ElemMode, Mesh};
use super::transform::Transform;

/// One element of the union of two meshes that share a base mesh
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraversalState {
    pub base: usize,
    pub mode: ElemMode,
    /// The active element of each mesh that contains this union element
    pub elems: [usize; 2],
    /// Maps the union element's reference domain into each active element's reference domain
    pub ctm: [Transform; 2],
    /// Maps the union element's reference domain into the base element's
    pub sub: Transform,
}

/// Walks two meshes in lock-step, yielding the elements of their union
///
/// Where one mesh is refined more deeply than the other, the coarser side stays on its active
/// element and accumulates the son transforms in its `ctm` instead.
pub struct PairTraversal<'m> {
    meshes: [&'m Mesh; 2],
    stack: Vec<([usize; 2], [Transform; 2], Transform)>,
}

impl<'m> PairTraversal<'m> {
    /// Returns `None` if the meshes weren't built from the same base mesh
    pub fn new(a: &'m Mesh, b: &'m Mesh) -> Option<Self> {
        if !a.shares_base_with(b) {
            return None;
        }

        let stack = (0..a.num_base_elems())
            .rev()
            .map(|base| ([base, base], [Transform::IDENTITY; 2], Transform::IDENTITY))
            .collect();

        Some(Self {
            meshes: [a, b],
            stack,
        })
    }
}

impl<'m> Iterator for PairTraversal<'m> {
    type Item = TraversalState;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (ids, ctm, sub) = self.stack.pop()?;
            let elems = [&self.meshes[0].elems[ids[0]], &self.meshes[1].elems[ids[1]]];
            let mode = elems[0].mode;

            if elems[0].is_active() && elems[1].is_active() {
                return Some(TraversalState {
                    base: elems[0].base,
                    mode,
                    elems: ids,
                    ctm,
                    sub,
                });
            }

            // son 0 ends up on top of the stack
            for son in (0..4).rev() {
                let mut son_ids = ids;
                let mut son_ctm = ctm;
                for side in 0..2 {
                    match elems[side].sons() {
                        Some(sons) => son_ids[side] = sons[son],
                        None => son_ctm[side] = ctm[side].push_son(mode, son),
                    }
                }
                self.stack.push((son_ids, son_ctm, sub.push_son(mode, son)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::space::V2D;

    #[test]
    fn union_of_differently_refined_meshes() {
        let coarse = Mesh::rect_quads([0.0, 1.0], [0.0, 1.0], [2, 1]).unwrap();
        let mut fine = coarse.clone();
        let sons = fine.refine_element(0).unwrap();
        fine.refine_element(sons[1]).unwrap();

        let states: Vec<TraversalState> = PairTraversal::new(&coarse, &fine).unwrap().collect();
        // 3 sons + 4 grandsons on base 0, base 1 untouched
        assert_eq!(states.len(), 8);
        assert!(states[..7].iter().all(|s| s.elems[0] == 0 && s.base == 0));
        assert_eq!(states[7].elems, [1, 1]);
        assert!(states[7].ctm[0].is_identity());

        // the fine side is always evaluated on its own leaf
        for state in states.iter() {
            assert!(state.ctm[1].is_identity());
            assert_eq!(state.ctm[0], state.sub);
        }

        // a grandson covers 1/16 of its base element
        let grandson = states[1];
        let corner = grandson.sub.apply(V2D::from([1.0, 1.0]));
        let origin = grandson.sub.apply(V2D::from([-1.0, -1.0]));
        assert!(((corner[0] - origin[0]) - 0.5).abs() < 1e-14);
    }

    #[test]
    fn incompatible_meshes() {
        let a = Mesh::rect_quads([0.0, 1.0], [0.0, 1.0], [2, 1]).unwrap();
        let b = Mesh::rect_triangles([0.0, 1.0], [0.0, 1.0], [2, 1]).unwrap();
        assert!(PairTraversal::new(&a, &b).is_none());
    }
}

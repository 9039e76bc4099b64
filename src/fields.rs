use crate::basis::{ShapeFamily, ShapeIndex, Shapeset, ValueKind};
use crate::domain::{Mesh, Point, Transform, V2D};
use crate::error::{FieldError, LinearizerError};
use crate::integration::{GaussQuad2D, Quad2D};
use crate::linalg::spd_solve;

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use std::collections::HashMap;

/// Number of bits each component occupies in an item mask
const ITEM_BITS_PER_COMPONENT: u32 = 6;

/// A single quantity of a single field component, as selected by an item bitmask
///
/// Bits `0..6` address component 0 (value, dx, dy, dxx, dyy, dxy); bits `6..12` address component 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Item {
    pub component: usize,
    pub kind: ValueKind,
}

impl Item {
    pub const VALUE_0: u32 = 0x0001;
    pub const DX_0: u32 = 0x0002;
    pub const DY_0: u32 = 0x0004;
    pub const VALUE_1: u32 = Self::VALUE_0 << ITEM_BITS_PER_COMPONENT;
    pub const DX_1: u32 = Self::DX_0 << ITEM_BITS_PER_COMPONENT;
    pub const DY_1: u32 = Self::DY_0 << ITEM_BITS_PER_COMPONENT;

    pub const fn new(component: usize, kind: ValueKind) -> Self {
        Self { component, kind }
    }

    /// Decode an item mask; exactly one bit must be set
    pub fn from_bits(bits: u32) -> Result<Self, LinearizerError> {
        if bits.count_ones() != 1 || bits >= 1 << (2 * ITEM_BITS_PER_COMPONENT) {
            return Err(LinearizerError::InvalidItem(bits));
        }

        let position = bits.trailing_zeros();
        let kind = match position % ITEM_BITS_PER_COMPONENT {
            0 => ValueKind::Value,
            1 => ValueKind::Dx,
            2 => ValueKind::Dy,
            _ => return Err(LinearizerError::UnsupportedItem(bits)),
        };

        Ok(Self {
            component: (position / ITEM_BITS_PER_COMPONENT) as usize,
            kind,
        })
    }
}

/// A field defined piecewise over the active elements of a [Mesh]
pub trait MeshFunction {
    fn mesh(&self) -> &Mesh;

    fn num_components(&self) -> usize;

    fn supports(&self, kind: ValueKind) -> bool;

    /// Evaluate `item` at reference points of a sub-element of `elem_id`
    ///
    /// `trf` maps the sub-element's reference domain into the element's.
    fn values(&self, elem_id: usize, trf: &Transform, points: &[V2D], item: Item) -> Result<Vec<f64>, FieldError>;

    /// Check that `item` can be evaluated by this field
    fn check_item(&self, item: Item) -> Result<(), FieldError> {
        if item.component >= self.num_components() {
            Err(FieldError::NoSuchComponent {
                requested: item.component,
                available: self.num_components(),
            })
        } else if !self.supports(item.kind) {
            Err(FieldError::UnsupportedKind(item.kind))
        } else {
            Ok(())
        }
    }
}

fn check_active(mesh: &Mesh, elem_id: usize) -> Result<(), FieldError> {
    match mesh.elems.get(elem_id) {
        Some(elem) if elem.is_active() => Ok(()),
        _ => Err(FieldError::NoSuchElem(elem_id)),
    }
}

// ----------------------------------------------------------------------------------------------------
// Exact Functions
// ----------------------------------------------------------------------------------------------------

/// A field given by a closure of the physical coordinates (values only)
pub struct ExactSolution<'m, F>
where
    F: Fn(Point) -> [f64; 2],
{
    mesh: &'m Mesh,
    num_components: usize,
    function: F,
}

impl<'m, F> ExactSolution<'m, F>
where
    F: Fn(Point) -> [f64; 2],
{
    /// A scalar field; the second entry returned by `function` is ignored
    pub fn scalar(mesh: &'m Mesh, function: F) -> Self {
        Self {
            mesh,
            num_components: 1,
            function,
        }
    }

    pub fn vector(mesh: &'m Mesh, function: F) -> Self {
        Self {
            mesh,
            num_components: 2,
            function,
        }
    }
}

impl<'m, F> MeshFunction for ExactSolution<'m, F>
where
    F: Fn(Point) -> [f64; 2],
{
    fn mesh(&self) -> &Mesh {
        self.mesh
    }

    fn num_components(&self) -> usize {
        self.num_components
    }

    fn supports(&self, kind: ValueKind) -> bool {
        kind == ValueKind::Value
    }

    fn values(&self, elem_id: usize, trf: &Transform, points: &[V2D], item: Item) -> Result<Vec<f64>, FieldError> {
        check_active(self.mesh, elem_id)?;
        self.check_item(item)?;

        let refmap = self.mesh.refmap(elem_id);
        Ok(points
            .iter()
            .map(|p| (self.function)(refmap.phys(trf.apply(*p)))[item.component])
            .collect())
    }
}

// ----------------------------------------------------------------------------------------------------
// Finite Element Solutions
// ----------------------------------------------------------------------------------------------------

/// A piecewise polynomial field: a list of shape functions and coefficients on each active element
///
/// Shape function values are used as field components directly (no Piola mapping); derivatives are
/// mapped into physical space through the inverse transpose of the element's Jacobian.
pub struct Solution<'m, F: ShapeFamily> {
    mesh: &'m Mesh,
    shapeset: Shapeset<F>,
    coefficients: HashMap<usize, Vec<(ShapeIndex, f64)>>,
}

impl<'m, F: ShapeFamily> Solution<'m, F> {
    /// A solution that is zero on every element
    pub fn new(mesh: &'m Mesh, shapeset: Shapeset<F>) -> Self {
        Self {
            mesh,
            shapeset,
            coefficients: HashMap::new(),
        }
    }

    pub fn shapeset(&self) -> &Shapeset<F> {
        &self.shapeset
    }

    /// Replace the expansion on an active element
    pub fn set_elem_coefficients(
        &mut self,
        elem_id: usize,
        coefficients: Vec<(ShapeIndex, f64)>,
    ) -> Result<(), FieldError> {
        check_active(self.mesh, elem_id)?;
        self.coefficients.insert(elem_id, coefficients);
        Ok(())
    }

    pub fn elem_coefficients(&self, elem_id: usize) -> &[(ShapeIndex, f64)] {
        self.coefficients
            .get(&elem_id)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// L2-project `function` onto the regular shape functions up to `order` on each active element
    ///
    /// The elements are independent, so the local systems are assembled and solved in parallel over the
    /// Rayon global threadpool.
    pub fn project_local<G>(mesh: &'m Mesh, family: F, order: usize, function: G) -> Result<Self, FieldError>
    where
        G: Fn(Point) -> [f64; 2] + Sync,
    {
        let quad = GaussQuad2D::new(2 * order.min(family.max_order()) + 2);
        let num_components = family.num_components();

        let active_ids: Vec<usize> = mesh
            .elems
            .iter()
            .filter(|elem| elem.is_active())
            .map(|elem| elem.id)
            .collect();

        let local_expansions = active_ids
            .par_iter()
            .map(|elem_id| {
                project_elem(mesh, &family, &quad, *elem_id, order, num_components, &function)
                    .map(|coefficients| (*elem_id, coefficients))
            })
            .collect::<Result<Vec<_>, FieldError>>()?;

        let mut solution = Self::new(mesh, Shapeset::new(family));
        solution.coefficients.extend(local_expansions);
        Ok(solution)
    }
}

fn project_elem<F, G>(
    mesh: &Mesh,
    family: &F,
    quad: &GaussQuad2D,
    elem_id: usize,
    order: usize,
    num_components: usize,
    function: &G,
) -> Result<Vec<(ShapeIndex, f64)>, FieldError>
where
    F: ShapeFamily,
    G: Fn(Point) -> [f64; 2],
{
    let mode = mesh.elems[elem_id].mode;
    let refmap = mesh.refmap(elem_id);
    let indices = family.indices_up_to(mode, order);
    let n = indices.len();

    let mut a = DMatrix::zeros(n, n);
    let mut b = DVector::zeros(n);

    for [u, v, w] in quad.points(quad.max_order(mode), mode) {
        let p = V2D::from([*u, *v]);
        let weight = w * refmap.jacobian(p).det().abs();
        let target = function(refmap.phys(p));

        for component in 0..num_components {
            let samples: Vec<f64> = indices
                .iter()
                .map(|idx| family.sample(mode, *idx, *u, *v, component).map_or(0.0, |s| s.val))
                .collect();

            for i in 0..n {
                b[i] += weight * target[component] * samples[i];
                for j in 0..n {
                    a[(i, j)] += weight * samples[i] * samples[j];
                }
            }
        }
    }

    let x = spd_solve(a, b).map_err(|err| FieldError::Projection(elem_id, err))?;
    Ok(indices
        .into_iter()
        .map(ShapeIndex::Regular)
        .zip(x.iter().cloned())
        .collect())
}

impl<'m, F: ShapeFamily> MeshFunction for Solution<'m, F> {
    fn mesh(&self) -> &Mesh {
        self.mesh
    }

    fn num_components(&self) -> usize {
        self.shapeset.num_components()
    }

    fn supports(&self, _: ValueKind) -> bool {
        true
    }

    fn values(&self, elem_id: usize, trf: &Transform, points: &[V2D], item: Item) -> Result<Vec<f64>, FieldError> {
        check_active(self.mesh, elem_id)?;
        self.check_item(item)?;

        let mode = self.mesh.elems[elem_id].mode;
        let refmap = self.mesh.refmap(elem_id);
        let expansion = self.elem_coefficients(elem_id);

        points
            .iter()
            .map(|p| -> Result<f64, FieldError> {
                let q = trf.apply(*p);
                let mut sum = [0.0; 3];
                for (index, coefficient) in expansion {
                    let s = self.shapeset.sample(mode, *index, q[0], q[1], item.component)?;
                    sum[0] += coefficient * s.val;
                    sum[1] += coefficient * s.dx;
                    sum[2] += coefficient * s.dy;
                }

                Ok(match item.kind {
                    ValueKind::Value => sum[0],
                    kind => {
                        let grad = refmap.jacobian(q).transpose().inverse() * V2D::from([sum[1], sum[2]]);
                        if kind == ValueKind::Dx {
                            grad[0]
                        } else {
                            grad[1]
                        }
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{H1Lobatto, HCurlLegendre};
    use crate::domain::ElemMode;

    const FIELD_ACCURACY: f64 = 1e-10;

    #[test]
    fn item_masks() {
        assert_eq!(Item::from_bits(Item::VALUE_0).unwrap(), Item::new(0, ValueKind::Value));
        assert_eq!(Item::from_bits(Item::DX_0).unwrap(), Item::new(0, ValueKind::Dx));
        assert_eq!(Item::from_bits(Item::VALUE_1).unwrap(), Item::new(1, ValueKind::Value));
        assert_eq!(Item::from_bits(Item::DY_1).unwrap(), Item::new(1, ValueKind::Dy));

        assert!(matches!(Item::from_bits(0), Err(LinearizerError::InvalidItem(0))));
        assert!(matches!(
            Item::from_bits(Item::VALUE_0 | Item::DX_0),
            Err(LinearizerError::InvalidItem(_))
        ));
        assert!(matches!(Item::from_bits(0x1000), Err(LinearizerError::InvalidItem(_))));
        assert!(matches!(Item::from_bits(0x08), Err(LinearizerError::UnsupportedItem(0x08))));
        assert!(matches!(Item::from_bits(0x20 << 6), Err(LinearizerError::UnsupportedItem(_))));
    }

    #[test]
    fn exact_solution_values() {
        let mesh = Mesh::rect_quads([0.0, 2.0], [0.0, 1.0], [2, 1]).unwrap();
        let f = ExactSolution::vector(&mesh, |p: Point| [p.x + 2.0 * p.y, p.x * p.y]);

        // element 1 covers [1, 2] x [0, 1]; its upper right son covers [1.5, 2] x [0.5, 1]
        let son = Transform::son(ElemMode::Quad, 2);
        let values = f
            .values(1, &son, &[V2D::from([-1.0, -1.0]), V2D::from([1.0, 1.0])], Item::new(1, ValueKind::Value))
            .unwrap();
        assert!((values[0] - 0.75).abs() < FIELD_ACCURACY);
        assert!((values[1] - 2.0).abs() < FIELD_ACCURACY);

        assert!(matches!(
            f.values(0, &Transform::IDENTITY, &[], Item::new(0, ValueKind::Dx)),
            Err(FieldError::UnsupportedKind(ValueKind::Dx))
        ));
        assert!(matches!(
            f.values(0, &Transform::IDENTITY, &[], Item::new(2, ValueKind::Value)),
            Err(FieldError::NoSuchComponent { requested: 2, available: 2 })
        ));
        assert!(matches!(
            f.values(7, &Transform::IDENTITY, &[], Item::new(0, ValueKind::Value)),
            Err(FieldError::NoSuchElem(7))
        ));
    }

    #[test]
    fn projection_reproduces_polynomials() {
        let mesh = Mesh::rect_triangles([0.0, 1.0], [0.0, 1.0], [2, 2]).unwrap();
        let f = |p: Point| [p.x * p.x - 3.0 * p.x * p.y + 0.5, 0.0];
        let solution = Solution::project_local(&mesh, H1Lobatto::new(), 3, f).unwrap();

        let points = [V2D::from([-0.5, -0.5]), V2D::from([0.1, -0.8]), V2D::from([-0.9, 0.3])];
        for elem in mesh.active_elems() {
            let refmap = mesh.refmap(elem.id);
            let values = solution
                .values(elem.id, &Transform::IDENTITY, &points, Item::new(0, ValueKind::Value))
                .unwrap();
            let dx = solution
                .values(elem.id, &Transform::IDENTITY, &points, Item::new(0, ValueKind::Dx))
                .unwrap();
            let dy = solution
                .values(elem.id, &Transform::IDENTITY, &points, Item::new(0, ValueKind::Dy))
                .unwrap();

            for (i, p) in points.iter().enumerate() {
                let phys = refmap.phys(*p);
                assert!((values[i] - f(phys)[0]).abs() < 1e-9);
                assert!((dx[i] - (2.0 * phys.x - 3.0 * phys.y)).abs() < 1e-8);
                assert!((dy[i] + 3.0 * phys.x).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn vector_projection() {
        let mesh = Mesh::rect_quads([0.0, 1.0], [0.0, 1.0], [1, 1]).unwrap();
        let solution = Solution::project_local(&mesh, HCurlLegendre::new(), 2, |p: Point| [p.y, 1.0 - p.x]).unwrap();
        assert_eq!(solution.num_components(), 2);

        let p = [V2D::from([0.2, -0.4])];
        let phys = mesh.refmap(0).phys(p[0]);
        let x = solution.values(0, &Transform::IDENTITY, &p, Item::new(0, ValueKind::Value)).unwrap();
        let y = solution.values(0, &Transform::IDENTITY, &p, Item::new(1, ValueKind::Value)).unwrap();
        assert!((x[0] - phys.y).abs() < 1e-9);
        assert!((y[0] - (1.0 - phys.x)).abs() < 1e-9);
    }

    #[test]
    fn constrained_expansion() {
        // an order-3 constrained function on edge 0 evaluated directly and through a solution
        let mesh = Mesh::rect_quads([0.0, 1.0], [0.0, 1.0], [1, 1]).unwrap();
        let mut solution = Solution::new(&mesh, Shapeset::new(H1Lobatto::new()));
        let index = solution
            .shapeset()
            .constrained_edge_index(ElemMode::Quad, 0, 3, 0, 1)
            .unwrap();
        solution.set_elem_coefficients(0, vec![(index, 2.0)]).unwrap();

        let p = V2D::from([0.4, -1.0]);
        let expected = 2.0
            * solution
                .shapeset()
                .get_value(ValueKind::Value, ElemMode::Quad, index, p[0], p[1], 0)
                .unwrap();
        let value = solution
            .values(0, &Transform::IDENTITY, &[p], Item::new(0, ValueKind::Value))
            .unwrap();
        assert!((value[0] - expected).abs() < FIELD_ACCURACY);
        assert_eq!(solution.shapeset().combinations_computed(), 1);
    }
}

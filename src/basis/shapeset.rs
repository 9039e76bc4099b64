use super::family::ShapeFamily;
use super::index::{ConstrainedEdge, ShapeIndex};
use super::shape_fns::Sampled;
use super::ValueKind;
use crate::domain::ElemMode;
use crate::error::ShapesetError;
use crate::linalg::lu_solve;

use nalgebra::{DMatrix, DVector};
use std::cell::{Cell, RefCell};
use std::f64::consts::PI;
use std::rc::Rc;

/// Number of slots the combination table starts with
pub const INITIAL_COMBINATION_SLOTS: usize = 1024;

/// The combination table won't grow past this many slots
const MAX_COMBINATION_SLOTS: usize = 1 << 24;

/// A sub-interval `[lo, hi]` of a parent edge's parameter range `[-1, 1]`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeInterval {
    pub lo: f64,
    pub hi: f64,
}

impl EdgeInterval {
    pub const FULL: Self = Self { lo: -1.0, hi: 1.0 };

    /// The sub-interval addressed by `part` in the binary subdivision of the edge
    ///
    /// Parts `0, 1` are the halves, `2..6` the quarters, `6..14` the eighths etc. Within a level,
    /// parts are numbered from the `+1` end of the parameter range.
    pub fn of_part(part: usize) -> Self {
        let mut part = part;
        let mut n = 2;
        while n <= part {
            part -= n;
            n *= 2;
        }

        let width = 2.0 / n as f64;
        Self {
            lo: -((part + 1) as f64 * width - 1.0),
            hi: -(part as f64 * width - 1.0),
        }
    }
}

/// A [ShapeFamily] extended with constrained edge functions for hanging-node meshes
///
/// A constrained edge function is the restriction of a parent edge's function to one of its sub-intervals,
/// expressed in the edge functions of the smaller element. The coefficients of these combinations are
/// synthesized on first use and cached for the lifetime of the shapeset.
pub struct Shapeset<F: ShapeFamily> {
    family: F,
    combinations: RefCell<Vec<Option<Rc<[f64]>>>>,
    combinations_computed: Cell<usize>,
}

impl<F: ShapeFamily> Shapeset<F> {
    pub fn new(family: F) -> Self {
        Self {
            family,
            combinations: RefCell::new(vec![None; INITIAL_COMBINATION_SLOTS]),
            combinations_computed: Cell::new(0),
        }
    }

    pub fn family(&self) -> &F {
        &self.family
    }

    pub fn edge_bias(&self) -> usize {
        self.family.edge_bias()
    }

    pub fn max_order(&self) -> usize {
        self.family.max_order()
    }

    pub fn num_components(&self) -> usize {
        self.family.num_components()
    }

    /// How many combinations have been synthesized (cache misses)
    pub fn combinations_computed(&self) -> usize {
        self.combinations_computed.get()
    }

    /// Current number of slots in the combination table
    pub fn combination_slots(&self) -> usize {
        self.combinations.borrow().len()
    }

    // ----------------------------------------------------------------------------------------------------
    // Constrained Combinations
    // ----------------------------------------------------------------------------------------------------

    /// Retrieve (synthesizing on first use) the coefficients of a constrained edge function
    ///
    /// The result has `order + 1 - edge_bias` entries. Repeated calls return the same allocation.
    pub fn get_combination(&self, order: usize, part: usize, ori: u8) -> Result<Rc<[f64]>, ShapesetError> {
        self.check_edge_order(order)?;
        if ori > 1 {
            return Err(ShapesetError::InvalidOrientation(ori));
        }

        let key = self.combination_key(order, part, ori)?;
        if let Some(Some(comb)) = self.combinations.borrow().get(key) {
            return Ok(Rc::clone(comb));
        }

        let comb: Rc<[f64]> = self
            .calculate_combination(order, EdgeInterval::of_part(part), ori)?
            .into();
        self.combinations_computed.set(self.combinations_computed.get() + 1);

        let mut table = self.combinations.borrow_mut();
        if key >= table.len() {
            let mut new_size = table.len().max(INITIAL_COMBINATION_SLOTS);
            while key >= new_size {
                new_size *= 2;
            }
            tracing::debug!(old_size = table.len(), new_size, "growing constrained combination table");
            table.resize(new_size, None);
        }
        table[key] = Some(Rc::clone(&comb));

        Ok(comb)
    }

    /// Synthesize the coefficients of a constrained edge function on an explicit sub-interval (uncached)
    ///
    /// Samples the parent's order-`order` edge-0 function over `interval` at Chebyshev points and fits it
    /// with the full set of edge-0 functions. H1-type families remove the function's linear part over the
    /// interval first; vector-type families scale it by the interval's half length.
    #[tracing::instrument(skip_all, name = "Shapeset::calculate_combination")]
    pub fn calculate_combination(
        &self,
        order: usize,
        interval: EdgeInterval,
        ori: u8,
    ) -> Result<Vec<f64>, ShapesetError> {
        self.check_edge_order(order)?;
        if ori > 1 {
            return Err(ShapesetError::InvalidOrientation(ori));
        }

        let bias = self.family.edge_bias();
        let component = self.family.trace_component();
        let flipped = 1 - ori;
        let mode = ElemMode::Quad;

        let edge_fn = |o: usize, t: f64| -> Result<f64, ShapesetError> {
            let index = self
                .family
                .edge_index(mode, 0, flipped, o)
                .ok_or(ShapesetError::OrderOutOfRange {
                    order: o,
                    min: bias,
                    max: self.family.max_order(),
                })?;
            self.family
                .sample(mode, index, t, -1.0, component)
                .map(|s| s.val)
                .ok_or(ShapesetError::InvalidIndex(index))
        };

        let EdgeInterval { lo, hi } = interval;
        let (scale, f_lo, f_hi) = if self.family.is_vector_type() {
            ((hi - lo) / 2.0, 0.0, 0.0)
        } else {
            (1.0, edge_fn(order, lo)?, edge_fn(order, hi)?)
        };

        let n = order + 1 - bias;
        let cheb_divisor = if bias == 0 { order + 1 } else { order } as f64;

        let mut a = DMatrix::zeros(n, n);
        let mut b = DVector::zeros(n);
        for i in 0..n {
            let p = ((i + 1) as f64 * PI / cheb_divisor).cos();
            let r = (p + 1.0) / 2.0;
            let s = 1.0 - r;

            for j in 0..n {
                a[(i, j)] = edge_fn(j + bias, p)?;
            }
            b[i] = scale * edge_fn(order, lo * s + hi * r)? - f_lo * s - f_hi * r;
        }

        Ok(lu_solve(a, b)?.iter().cloned().collect())
    }

    fn combination_key(&self, order: usize, part: usize, ori: u8) -> Result<usize, ShapesetError> {
        let bias = self.family.edge_bias();
        let num_orders = self.family.max_order() + 1 - bias;

        num_orders
            .checked_mul(part)
            .and_then(|k| k.checked_add(order - bias))
            .and_then(|k| k.checked_mul(2))
            .map(|k| k + ori as usize)
            .filter(|key| *key < MAX_COMBINATION_SLOTS)
            .ok_or(ShapesetError::PartOutOfRange(part))
    }

    fn check_edge_order(&self, order: usize) -> Result<(), ShapesetError> {
        let (min, max) = (self.family.edge_bias(), self.family.max_order());
        if order < min || order > max {
            Err(ShapesetError::OrderOutOfRange { order, min, max })
        } else {
            Ok(())
        }
    }

    // ----------------------------------------------------------------------------------------------------
    // Evaluation
    // ----------------------------------------------------------------------------------------------------

    /// Value and first derivatives of a shape function at a reference point
    pub fn sample(
        &self,
        mode: ElemMode,
        index: ShapeIndex,
        x: f64,
        y: f64,
        component: usize,
    ) -> Result<Sampled, ShapesetError> {
        match index {
            ShapeIndex::Regular(idx) => self
                .family
                .sample(mode, idx, x, y, component)
                .ok_or(ShapesetError::InvalidIndex(idx)),
            ShapeIndex::Constrained(c) => self.evaluate_constrained(mode, &c, x, y, component),
        }
    }

    pub fn get_value(
        &self,
        kind: ValueKind,
        mode: ElemMode,
        index: ShapeIndex,
        x: f64,
        y: f64,
        component: usize,
    ) -> Result<f64, ShapesetError> {
        self.sample(mode, index, x, y, component)
            .map(|s| kind.select(&s))
    }

    /// Weighted sum of an edge's regular functions, using the cached combination of the constrained function
    pub fn evaluate_constrained(
        &self,
        mode: ElemMode,
        constrained: &ConstrainedEdge,
        x: f64,
        y: f64,
        component: usize,
    ) -> Result<Sampled, ShapesetError> {
        let edge = constrained.edge();
        if edge >= mode.num_vertices() {
            return Err(ShapesetError::InvalidEdge(edge));
        }

        let bias = self.family.edge_bias();
        let comb = self.get_combination(constrained.order(), constrained.part(), constrained.ori())?;

        let mut sum = Sampled::ZERO;
        for (i, c) in comb.iter().enumerate() {
            let index = self
                .family
                .edge_index(mode, edge, constrained.ori(), i + bias)
                .ok_or(ShapesetError::InvalidEdge(edge))?;
            let s = self
                .family
                .sample(mode, index, x, y, component)
                .ok_or(ShapesetError::InvalidIndex(index))?;
            sum = sum + s * *c;
        }
        Ok(sum)
    }

    // ----------------------------------------------------------------------------------------------------
    // Index Queries
    // ----------------------------------------------------------------------------------------------------

    pub fn vertex_index(&self, mode: ElemMode, vertex: usize) -> Option<ShapeIndex> {
        self.family.vertex_index(mode, vertex).map(ShapeIndex::Regular)
    }

    pub fn edge_index(&self, mode: ElemMode, edge: usize, ori: u8, order: usize) -> Option<ShapeIndex> {
        self.family
            .edge_index(mode, edge, ori, order)
            .map(ShapeIndex::Regular)
    }

    pub fn bubble_indices(&self, mode: ElemMode, order: usize) -> Vec<ShapeIndex> {
        self.family
            .bubble_indices(mode, order)
            .into_iter()
            .map(ShapeIndex::Regular)
            .collect()
    }

    pub fn constrained_edge_index(
        &self,
        mode: ElemMode,
        edge: usize,
        order: usize,
        ori: u8,
        part: usize,
    ) -> Result<ShapeIndex, ShapesetError> {
        if edge >= mode.num_vertices() {
            return Err(ShapesetError::InvalidEdge(edge));
        }
        self.check_edge_order(order)?;
        Ok(ConstrainedEdge::new(part, order, edge, ori)?.into())
    }

    /// Polynomial order of a shape function (for constrained functions, the order of the parent edge function)
    pub fn get_order(&self, mode: ElemMode, index: ShapeIndex) -> Option<usize> {
        match index {
            ShapeIndex::Regular(idx) => self.family.index_order(mode, idx),
            ShapeIndex::Constrained(c) => Some(c.order()),
        }
    }
}

use super::shape_fns::{legendre, lobatto, lobatto_kernel, Sampled};
use crate::domain::ElemMode;

/// First index used by bubble functions; vertex and edge indices sit below it
fn bubble_start(max_order: usize) -> u32 {
    (4 + 8 * (max_order + 1)) as u32
}

/// Decoded regular shape function index
///
/// Indices are shared between element types for vertex and edge functions. Bubble indices point into a
/// per-type list, so the same bubble index denotes different functions on triangles and quads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeSlot {
    Vertex(usize),
    Edge { edge: usize, ori: u8, order: usize },
    Bubble(usize),
}

impl ShapeSlot {
    pub fn encode(self, max_order: usize) -> u32 {
        match self {
            Self::Vertex(v) => v as u32,
            Self::Edge { edge, ori, order } => {
                (4 + (edge * 2 + ori as usize) * (max_order + 1) + order) as u32
            }
            Self::Bubble(b) => bubble_start(max_order) + b as u32,
        }
    }

    pub fn decode(index: u32, max_order: usize) -> Self {
        if index < 4 {
            Self::Vertex(index as usize)
        } else if index < bubble_start(max_order) {
            let rel = index as usize - 4;
            let slot = rel / (max_order + 1);
            Self::Edge {
                edge: slot / 2,
                ori: (slot % 2) as u8,
                order: rel % (max_order + 1),
            }
        } else {
            Self::Bubble((index - bubble_start(max_order)) as usize)
        }
    }
}

/// Bubble function description: component and the two polynomial indices
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BubbleFn {
    component: usize,
    i: usize,
    j: usize,
    order: usize,
}

/// A family of hierarchical shape functions on the reference triangle and quad
///
/// Edge function `order` runs from [ShapeFamily::edge_bias] to [ShapeFamily::max_order]. Orientation 1
/// reverses the edge parameter, so an edge function with orientation 1 matches the neighbor's function
/// with orientation 0 along a shared edge.
pub trait ShapeFamily: Send + Sync {
    /// Lowest edge function order: 2 for H1-type (the linear part belongs to the vertices), 0 for vector-type families
    fn edge_bias(&self) -> usize;

    fn max_order(&self) -> usize;

    fn num_components(&self) -> usize;

    /// Component whose edge-0 trace is matched by constrained edge functions
    fn trace_component(&self) -> usize {
        0
    }

    /// Whether constrained combinations are rescaled by the sub-interval length (vector-type) rather than
    /// stripped of their endpoint values (H1-type)
    fn is_vector_type(&self) -> bool {
        self.edge_bias() == 0
    }

    /// Sample a regular shape function; `None` if the index doesn't exist on this element type
    fn sample(&self, mode: ElemMode, index: u32, x: f64, y: f64, component: usize) -> Option<Sampled>;

    fn vertex_index(&self, mode: ElemMode, vertex: usize) -> Option<u32>;

    fn edge_index(&self, mode: ElemMode, edge: usize, ori: u8, order: usize) -> Option<u32> {
        if edge < mode.num_vertices() && ori <= 1 && order >= self.edge_bias() && order <= self.max_order() {
            Some(ShapeSlot::Edge { edge, ori, order }.encode(self.max_order()))
        } else {
            None
        }
    }

    /// Indices of all bubble functions up to (and including) `order`
    fn bubble_indices(&self, mode: ElemMode, order: usize) -> Vec<u32>;

    /// Polynomial order of a regular shape function
    fn index_order(&self, mode: ElemMode, index: u32) -> Option<usize>;

    /// All regular shape function indices up to (and including) `order` on an element type
    fn indices_up_to(&self, mode: ElemMode, order: usize) -> Vec<u32> {
        let mut indices: Vec<u32> = (0..mode.num_vertices())
            .filter_map(|v| self.vertex_index(mode, v))
            .collect();
        for edge in 0..mode.num_vertices() {
            for o in self.edge_bias()..=order.min(self.max_order()) {
                if let Some(index) = self.edge_index(mode, edge, 0, o) {
                    indices.push(index);
                }
            }
        }
        indices.extend(self.bubble_indices(mode, order));
        indices
    }
}

// reference coordinates and barycentric coordinates of the triangle as sampled affine functions
fn coords(x: f64, y: f64) -> (Sampled, Sampled) {
    (Sampled::new(x, 1.0, 0.0), Sampled::new(y, 0.0, 1.0))
}

fn barycentric(x: f64, y: f64) -> [Sampled; 3] {
    [
        Sampled::new(-(x + y) / 2.0, -0.5, -0.5),
        Sampled::new((1.0 + x) / 2.0, 0.5, 0.0),
        Sampled::new((1.0 + y) / 2.0, 0.0, 0.5),
    ]
}

// edge parameter of the quad edges (in the direction of the edge) and the coordinate blending it inwards
fn quad_edge_coords(edge: usize, x: &Sampled, y: &Sampled) -> (Sampled, Sampled) {
    let one = Sampled::constant(1.0);
    match edge {
        0 => (*x, (one - *y) * 0.5),
        1 => (*y, (one + *x) * 0.5),
        2 => (*x * -1.0, (one + *y) * 0.5),
        3 => (*y * -1.0, (one - *x) * 0.5),
        _ => unreachable!(),
    }
}

fn orientation_sign(ori: u8) -> f64 {
    if ori == 0 {
        1.0
    } else {
        -1.0
    }
}

fn bubble_order(bubbles: &[BubbleFn], order: usize) -> Vec<u32> {
    bubbles
        .iter()
        .enumerate()
        .filter(|(_, b)| b.order <= order)
        .map(|(i, _)| i as u32)
        .collect()
}

/// H1-conforming Lobatto shape functions (scalar)
#[derive(Clone, Debug)]
pub struct H1Lobatto {
    max_order: usize,
    bubbles: [Vec<BubbleFn>; 2],
}

impl H1Lobatto {
    pub const MAX_ORDER: usize = 10;

    pub fn new() -> Self {
        Self::with_max_order(Self::MAX_ORDER)
    }

    pub fn with_max_order(max_order: usize) -> Self {
        assert!(
            (2..=15).contains(&max_order),
            "H1 Lobatto shape functions support orders 2 to 15 (got {})!",
            max_order
        );
        // l0 l1 l2 P_i P_j
        let mut tri = Vec::new();
        if max_order >= 3 {
            for i in 0..=max_order - 3 {
                for j in 0..=max_order - 3 - i {
                    tri.push(BubbleFn {
                        component: 0,
                        i,
                        j,
                        order: i + j + 3,
                    });
                }
            }
        }
        let quad = (2..=max_order)
            .flat_map(|i| (2..=max_order).map(move |j| (i, j)))
            .map(|(i, j)| BubbleFn {
                component: 0,
                i,
                j,
                order: i.max(j),
            })
            .collect();

        Self {
            max_order,
            bubbles: [tri, quad],
        }
    }

    fn edge_fn(&self, mode: ElemMode, edge: usize, ori: u8, order: usize, x: f64, y: f64) -> Sampled {
        let s = orientation_sign(ori);
        match mode {
            ElemMode::Quad => {
                let (x, y) = coords(x, y);
                let (t, blend) = quad_edge_coords(edge, &x, &y);
                Sampled::compose(lobatto(order, s * t.val), &(t * s)) * blend
            }
            ElemMode::Triangle => {
                let l = barycentric(x, y);
                let (l_a, l_b) = (l[edge], l[mode.next_vertex(edge)]);
                let t = (l_b - l_a) * s;
                l_a * l_b * Sampled::compose(lobatto_kernel(order, t.val), &t)
            }
        }
    }

    fn bubble_fn(&self, mode: ElemMode, b: &BubbleFn, x: f64, y: f64) -> Sampled {
        match mode {
            ElemMode::Quad => {
                let (xs, ys) = coords(x, y);
                Sampled::compose(lobatto(b.i, x), &xs) * Sampled::compose(lobatto(b.j, y), &ys)
            }
            ElemMode::Triangle => {
                let l = barycentric(x, y);
                let a = l[1] - l[0];
                let c = l[2] - l[0];
                let p_i = legendre(b.i, a.val);
                let p_j = legendre(b.j, c.val);
                l[0] * l[1] * l[2]
                    * Sampled::compose([p_i[0], p_i[1]], &a)
                    * Sampled::compose([p_j[0], p_j[1]], &c)
            }
        }
    }
}

impl Default for H1Lobatto {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeFamily for H1Lobatto {
    fn edge_bias(&self) -> usize {
        2
    }

    fn max_order(&self) -> usize {
        self.max_order
    }

    fn num_components(&self) -> usize {
        1
    }

    fn sample(&self, mode: ElemMode, index: u32, x: f64, y: f64, component: usize) -> Option<Sampled> {
        if component != 0 {
            return None;
        }
        match ShapeSlot::decode(index, self.max_order) {
            ShapeSlot::Vertex(v) if v < mode.num_vertices() => Some(match mode {
                ElemMode::Triangle => barycentric(x, y)[v],
                ElemMode::Quad => {
                    let (xs, ys) = coords(x, y);
                    let (ix, iy) = [(0, 0), (1, 0), (1, 1), (0, 1)][v];
                    Sampled::compose(lobatto(ix, x), &xs) * Sampled::compose(lobatto(iy, y), &ys)
                }
            }),
            ShapeSlot::Edge { edge, ori, order }
                if edge < mode.num_vertices() && order >= 2 && order <= self.max_order =>
            {
                Some(self.edge_fn(mode, edge, ori, order, x, y))
            }
            ShapeSlot::Bubble(b) => self.bubbles[mode.index()]
                .get(b)
                .map(|bubble| self.bubble_fn(mode, bubble, x, y)),
            _ => None,
        }
    }

    fn vertex_index(&self, mode: ElemMode, vertex: usize) -> Option<u32> {
        if vertex < mode.num_vertices() {
            Some(ShapeSlot::Vertex(vertex).encode(self.max_order))
        } else {
            None
        }
    }

    fn bubble_indices(&self, mode: ElemMode, order: usize) -> Vec<u32> {
        bubble_order(&self.bubbles[mode.index()], order)
            .into_iter()
            .map(|b| ShapeSlot::Bubble(b as usize).encode(self.max_order))
            .collect()
    }

    fn index_order(&self, mode: ElemMode, index: u32) -> Option<usize> {
        match ShapeSlot::decode(index, self.max_order) {
            ShapeSlot::Vertex(v) if v < mode.num_vertices() => Some(1),
            ShapeSlot::Edge { edge, order, .. }
                if edge < mode.num_vertices() && order >= 2 && order <= self.max_order =>
            {
                Some(order)
            }
            ShapeSlot::Bubble(b) => self.bubbles[mode.index()].get(b).map(|b| b.order),
            _ => None,
        }
    }
}

/// H(curl)-conforming Legendre shape functions (2 components, tangentially continuous)
///
/// Edge functions of order `k` carry the tangential trace `L_k` along their edge; bubbles have no tangential
/// trace on any edge.
#[derive(Clone, Debug)]
pub struct HCurlLegendre {
    max_order: usize,
    bubbles: [Vec<BubbleFn>; 2],
}

impl HCurlLegendre {
    pub const MAX_ORDER: usize = 10;

    pub fn new() -> Self {
        Self::with_max_order(Self::MAX_ORDER)
    }

    pub fn with_max_order(max_order: usize) -> Self {
        assert!(
            max_order <= 15,
            "H(curl) Legendre shape functions support orders up to 15 (got {})!",
            max_order
        );

        let mut tri = Vec::new();
        if max_order >= 2 {
            for component in 0..2 {
                for i in 0..=max_order - 2 {
                    for j in 0..=max_order - 2 - i {
                        tri.push(BubbleFn {
                            component,
                            i,
                            j,
                            order: i + j + 2,
                        });
                    }
                }
            }
        }

        // [L_i(x) l_j(y), 0] and [0, l_j(x) L_i(y)]
        let mut quad = Vec::new();
        if max_order >= 1 {
            for component in 0..2 {
                for i in 0..max_order {
                    for j in 2..=max_order {
                        quad.push(BubbleFn {
                            component,
                            i,
                            j,
                            order: (i + 1).max(j),
                        });
                    }
                }
            }
        }

        Self {
            max_order,
            bubbles: [tri, quad],
        }
    }

    fn edge_fn(&self, mode: ElemMode, edge: usize, ori: u8, order: usize, x: f64, y: f64, component: usize) -> Sampled {
        let s = orientation_sign(ori);
        match mode {
            ElemMode::Quad => {
                let (xs, ys) = coords(x, y);
                let (t, blend) = quad_edge_coords(edge, &xs, &ys);
                let p = legendre(order, s * t.val);
                let along = Sampled::compose([p[0], p[1]], &(t * s)) * blend * s;

                // edges 0 and 2 run along x, edges 1 and 3 along y; 2 and 3 point in the negative direction
                let (tangent_component, direction) = [(0, 1.0), (1, 1.0), (0, -1.0), (1, -1.0)][edge];
                if component == tangent_component {
                    along * direction
                } else {
                    Sampled::ZERO
                }
            }
            ElemMode::Triangle => {
                let l = barycentric(x, y);
                let (l_a, l_b) = (l[edge], l[mode.next_vertex(edge)]);
                let t = (l_b - l_a) * s;
                let p = legendre(order, t.val);

                // 2 (l_a grad(l_b) - l_b grad(l_a)) has a unit tangential trace in reference edge-0 scaling
                let grad = |l: &Sampled| if component == 0 { l.dx } else { l.dy };
                let whitney = (l_a * grad(&l_b) - l_b * grad(&l_a)) * 2.0;
                whitney * Sampled::compose([p[0], p[1]], &t) * s
            }
        }
    }

    fn bubble_fn(&self, mode: ElemMode, b: &BubbleFn, x: f64, y: f64, component: usize) -> Sampled {
        if component != b.component {
            return Sampled::ZERO;
        }
        match mode {
            ElemMode::Quad => {
                let (xs, ys) = coords(x, y);
                // the Legendre factor runs along the component's direction
                let (along, across, a_s, c_s) = if b.component == 0 {
                    (x, y, xs, ys)
                } else {
                    (y, x, ys, xs)
                };
                let p = legendre(b.i, along);
                Sampled::compose([p[0], p[1]], &a_s) * Sampled::compose(lobatto(b.j, across), &c_s)
            }
            ElemMode::Triangle => {
                let l = barycentric(x, y);
                let a = l[1] - l[0];
                let c = l[2] - l[0];
                let p_i = legendre(b.i, a.val);
                let p_j = legendre(b.j, c.val);
                // vanishes on the edges the component is tangent to: y = -1 (x-component), x = -1 (y-component)
                let vanishing = if b.component == 0 { l[2] } else { l[1] };
                l[0] * vanishing
                    * Sampled::compose([p_i[0], p_i[1]], &a)
                    * Sampled::compose([p_j[0], p_j[1]], &c)
            }
        }
    }
}

impl Default for HCurlLegendre {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeFamily for HCurlLegendre {
    fn edge_bias(&self) -> usize {
        0
    }

    fn max_order(&self) -> usize {
        self.max_order
    }

    fn num_components(&self) -> usize {
        2
    }

    fn sample(&self, mode: ElemMode, index: u32, x: f64, y: f64, component: usize) -> Option<Sampled> {
        if component > 1 {
            return None;
        }
        match ShapeSlot::decode(index, self.max_order) {
            ShapeSlot::Edge { edge, ori, order } if edge < mode.num_vertices() && order <= self.max_order => {
                Some(self.edge_fn(mode, edge, ori, order, x, y, component))
            }
            ShapeSlot::Bubble(b) => self.bubbles[mode.index()]
                .get(b)
                .map(|bubble| self.bubble_fn(mode, bubble, x, y, component)),
            _ => None,
        }
    }

    fn vertex_index(&self, _: ElemMode, _: usize) -> Option<u32> {
        None
    }

    fn bubble_indices(&self, mode: ElemMode, order: usize) -> Vec<u32> {
        bubble_order(&self.bubbles[mode.index()], order)
            .into_iter()
            .map(|b| ShapeSlot::Bubble(b as usize).encode(self.max_order))
            .collect()
    }

    fn index_order(&self, mode: ElemMode, index: u32) -> Option<usize> {
        match ShapeSlot::decode(index, self.max_order) {
            ShapeSlot::Edge { edge, order, .. } if edge < mode.num_vertices() && order <= self.max_order => {
                Some(order)
            }
            ShapeSlot::Bubble(b) => self.bubbles[mode.index()].get(b).map(|b| b.order),
            _ => None,
        }
    }
}

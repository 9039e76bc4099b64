use super::super::space::V2D;
use super::super::transform::Transform;
use json::{object, JsonValue};
use smallvec::SmallVec;

/// Reference vertices of the triangle `(-1,-1), (1,-1), (-1,1)`
const TRI_REF_VERTS: [[f64; 2]; 3] = [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0]];

/// Reference vertices of the quad `[-1, 1]^2` (counter-clockwise)
const QUAD_REF_VERTS: [[f64; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

/// Shape of an element's reference domain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElemMode {
    Triangle,
    Quad,
}

impl ElemMode {
    pub fn from_num_vertices(n: usize) -> Option<Self> {
        match n {
            3 => Some(Self::Triangle),
            4 => Some(Self::Quad),
            _ => None,
        }
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        match self {
            Self::Triangle => 3,
            Self::Quad => 4,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        match self {
            Self::Triangle => 0,
            Self::Quad => 1,
        }
    }

    pub fn ref_vertex(&self, vertex: usize) -> V2D {
        match self {
            Self::Triangle => V2D::from(TRI_REF_VERTS[vertex]),
            Self::Quad => V2D::from(QUAD_REF_VERTS[vertex]),
        }
    }

    #[inline]
    pub fn next_vertex(&self, vertex: usize) -> usize {
        (vertex + 1) % self.num_vertices()
    }

    #[inline]
    pub fn prev_vertex(&self, vertex: usize) -> usize {
        (vertex + self.num_vertices() - 1) % self.num_vertices()
    }
}

/// An element of a [Mesh](super::Mesh); either a base element or a son produced by h-refinement
///
/// Edge `i` connects vertex `i` to vertex `i + 1` (cyclically). Sons keep a [Transform] relative
/// to their base element, so all geometry is evaluated through the base element's reference map.
#[derive(Debug, Clone)]
pub struct Elem {
    pub id: usize,
    pub mode: ElemMode,
    /// Vertex node IDs (counter-clockwise)
    pub nodes: SmallVec<[usize; 4]>,
    /// Whether each edge lies on the domain boundary
    pub boundary: SmallVec<[bool; 4]>,
    /// Boundary markers of each edge (0 for interior edges)
    pub edge_markers: SmallVec<[u32; 4]>,
    /// Material / region marker
    pub marker: u32,
    /// The base element this element descends from (itself for base elements)
    pub base: usize,
    /// Map from this element's reference domain into the base element's
    pub trf: Transform,
    pub level: u8,
    parent: Option<usize>,
    sons: Option<[usize; 4]>,
}

impl Elem {
    pub(crate) fn new_base(
        id: usize,
        nodes: SmallVec<[usize; 4]>,
        boundary: SmallVec<[bool; 4]>,
        edge_markers: SmallVec<[u32; 4]>,
        marker: u32,
    ) -> Self {
        let mode = ElemMode::from_num_vertices(nodes.len())
            .expect("Elements must have 3 or 4 vertices; cannot construct Elem!");

        Self {
            id,
            mode,
            nodes,
            boundary,
            edge_markers,
            marker,
            base: id,
            trf: Transform::IDENTITY,
            level: 0,
            parent: None,
            sons: None,
        }
    }

    /// Build son `son` of `parent` over the given nodes; boundary information is inherited along the parent's edges
    pub(crate) fn new_son(id: usize, parent: &Elem, son: usize, nodes: SmallVec<[usize; 4]>) -> Self {
        let son_trf = Transform::son(parent.mode, son);
        let mut boundary = SmallVec::new();
        let mut edge_markers = SmallVec::new();

        for edge in 0..parent.mode.num_vertices() {
            match son_trf.edge_on_ref_edge(parent.mode, edge) {
                Some(parent_edge) => {
                    boundary.push(parent.boundary[parent_edge]);
                    edge_markers.push(parent.edge_markers[parent_edge]);
                }
                None => {
                    boundary.push(false);
                    edge_markers.push(0);
                }
            }
        }

        Self {
            id,
            mode: parent.mode,
            nodes,
            boundary,
            edge_markers,
            marker: parent.marker,
            base: parent.base,
            trf: parent.trf.compose(&son_trf),
            level: parent.level + 1,
            parent: Some(parent.id),
            sons: None,
        }
    }

    #[inline]
    pub fn is_triangle(&self) -> bool {
        self.mode == ElemMode::Triangle
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.mode.num_vertices()
    }

    /// Active elements have not been h-refined
    #[inline]
    pub fn is_active(&self) -> bool {
        self.sons.is_none()
    }

    pub fn sons(&self) -> Option<[usize; 4]> {
        self.sons
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub(crate) fn set_sons(&mut self, sons: [usize; 4]) {
        assert!(
            self.sons.is_none(),
            "Elem {} already has sons; cannot set them again!",
            self.id
        );
        self.sons = Some(sons);
    }

    pub fn to_json(&self) -> JsonValue {
        let parent = match self.parent {
            Some(parent_id) => JsonValue::from(parent_id),
            None => JsonValue::Null,
        };

        object! {
            "id": self.id,
            "node_ids": JsonValue::from(self.nodes.to_vec()),
            "boundary": JsonValue::from(self.boundary.to_vec()),
            "edge_markers": JsonValue::from(self.edge_markers.to_vec()),
            "marker": self.marker,
            "level": self.level,
            "parent": parent,
        }
    }
}

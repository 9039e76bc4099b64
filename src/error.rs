use thiserror::Error;

/// Failures while building, loading or refining a [Mesh](crate::domain::mesh::Mesh)
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("unable to read mesh file: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to parse mesh file as JSON: {0}")]
    Json(#[from] json::Error),
    #[error("invalid mesh description: {0}")]
    Format(String),
    #[error("Elem {0} doesn't exist")]
    NoSuchElem(usize),
    #[error("Elem {0} has already been h-refined")]
    AlreadyRefined(usize),
    #[error("Elem {0} is degenerate or its vertices are not counter-clockwise")]
    BadOrientation(usize),
    #[error("no Elem has an edge between nodes {0} and {1}")]
    NoSuchEdge(usize, usize),
    #[error("edge between nodes {0} and {1} is not on the boundary")]
    NotOnBoundary(usize, usize),
    #[error("edge between nodes {0} and {1} is shared by more than two Elems")]
    NonManifold(usize, usize),
    #[error("arc angle {0} is invalid; must be non-zero with a magnitude below 180 degrees")]
    InvalidArc(f64),
}

#[derive(Debug, Error)]
pub enum LinalgError {
    #[error("system matrix is singular")]
    Singular,
    #[error("cannot solve a {rows}x{cols} system with a right hand side of length {rhs}")]
    DimensionMismatch { rows: usize, cols: usize, rhs: usize },
}

/// Failures of shape function lookup and constrained combination synthesis
#[derive(Debug, Error)]
pub enum ShapesetError {
    #[error("edge order {order} is outside of the supported range [{min}, {max}]")]
    OrderOutOfRange { order: usize, min: usize, max: usize },
    #[error("edge orientation must be 0 or 1 (got {0})")]
    InvalidOrientation(u8),
    #[error("edge {0} doesn't exist on this element type")]
    InvalidEdge(usize),
    #[error("constrained part {0} is too large to be encoded")]
    PartOutOfRange(usize),
    #[error("shape function index {0} doesn't exist")]
    InvalidIndex(u32),
    #[error("regular shape function index {0} is too large for the signed raw encoding")]
    RawIndexOverflow(u32),
    #[error("unable to synthesize constrained combination: {0}")]
    Linalg(#[from] LinalgError),
}

/// Failures while evaluating a field over the mesh
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("Elem {0} doesn't exist or isn't active in this field's mesh")]
    NoSuchElem(usize),
    #[error("field has {available} component(s); component {requested} was requested")]
    NoSuchComponent { requested: usize, available: usize },
    #[error("field can't evaluate {0:?}")]
    UnsupportedKind(crate::basis::ValueKind),
    #[error("projection system of Elem {0} couldn't be solved: {1}")]
    Projection(usize, LinalgError),
    #[error(transparent)]
    Shapeset(#[from] ShapesetError),
}

/// Failures of the adaptive linearizer
#[derive(Debug, Error)]
pub enum LinearizerError {
    #[error("item {0:#x} doesn't select a single component and value kind")]
    InvalidItem(u32),
    #[error("item {0:#x} requests a derivative the linearizer doesn't support")]
    UnsupportedItem(u32),
    #[error("the two fields are not defined over meshes with the same base mesh")]
    IncompatibleMeshes,
    #[error("linearizer data lock is poisoned")]
    LockPoisoned,
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// The internal geometric structure of a Domain
pub mod mesh;
/// Points, vectors and Jacobians
pub mod space;
/// Affine maps between sub-element reference domains
pub mod transform;
/// Lock-step traversal of meshes sharing a base mesh
pub mod traverse;

pub use mesh::{elem::Elem, elem::ElemMode, Mesh, RefMap};
pub use space::{Point, M2D, V2D};
pub use transform::Transform;
pub use traverse::{PairTraversal, TraversalState};

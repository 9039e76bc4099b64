/// Vertex, triangle and edge buffers of a linearized field
pub mod linear;
/// Adaptive linearization of two-component fields
pub mod vectorizer;

pub use linear::{LinearEdge, LinearVertex, Linearization, VertexTable};
pub use vectorizer::{LinearizerConfig, Vectorizer};

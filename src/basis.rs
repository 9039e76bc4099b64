/// Hierarchical shape function families on the reference triangle and quad
pub mod family;
/// Signed shape function indices, including packed constrained edge functions
pub mod index;
/// Legendre and Lobatto polynomials
pub mod shape_fns;
/// Shape function families extended with cached constrained edge combinations
pub mod shapeset;

pub use family::{H1Lobatto, HCurlLegendre, ShapeFamily};
pub use index::{ConstrainedEdge, ShapeIndex};
pub use shape_fns::Sampled;
pub use shapeset::{EdgeInterval, Shapeset};

/// Which quantity of a shape function or field to evaluate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Value,
    Dx,
    Dy,
}

impl ValueKind {
    pub fn select(&self, sampled: &Sampled) -> f64 {
        match self {
            Self::Value => sampled.val,
            Self::Dx => sampled.dx,
            Self::Dy => sampled.dy,
        }
    }
}

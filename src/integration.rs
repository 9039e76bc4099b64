/// Gauss-Legendre-Quadrature points and weights
pub mod glq;
/// Quadrature tables over the reference triangle and quad
pub mod quad;

pub use quad::{GaussQuad2D, LinQuad2D, Quad2D, QuadPoint};

//! Constrained hierarchical shape functions and adaptive field linearization for 2D hp-FEM
//!
//! The [basis] module provides H1 and H(curl) shape function families on triangles and quads, extended with
//! constrained edge functions for meshes with hanging nodes. The [views] module turns a pair of fields
//! defined over such meshes into a flat triangulation suited for plotting.
//!
//! ```
//! use hp_fem_2d::{domain::{Mesh, Point}, fields::{ExactSolution, Item}, views::Vectorizer};
//!
//! let mesh = Mesh::rect_quads([0.0, 1.0], [0.0, 1.0], [2, 2]).unwrap();
//! let field = ExactSolution::vector(&mesh, |p: Point| [p.x * p.y, 1.0 - p.x]);
//!
//! let lin = Vectorizer::new()
//!     .process_solution(&field, &field, Item::VALUE_0, Item::VALUE_1, 0.01)
//!     .unwrap();
//! assert!(lin.triangles().len() >= 8);
//! ```

/// Shape function families, constrained edge functions and their indices
pub mod basis;
/// Meshes, reference maps and traversal
pub mod domain;
/// Error types
pub mod error;
/// Fields defined piecewise over a mesh
pub mod fields;
/// Quadrature rules
pub mod integration;
/// Dense linear solves
pub mod linalg;
/// Linearization of fields for visualization
pub mod views;

pub use basis::{ShapeIndex, Shapeset, ValueKind};
pub use domain::{Elem, Mesh, Point, M2D, V2D};
pub use fields::{Item, MeshFunction};
pub use views::{Linearization, Vectorizer};

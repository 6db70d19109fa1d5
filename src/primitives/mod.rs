//! Core compute primitives (Vector, Matrix).
//!
//! These types carry feature rows and label columns through encoding,
//! training, and inference.

mod matrix;
mod vector;

pub use matrix::Matrix;
pub use vector::Vector;

//! Structs defined here mirror the .tsx specification mostly 1:1.
//! Validation and animation-chain normalization happen later, when the
//! raw output is converted into a runtime [`Tileset`](crate::Tileset).
mod tileset;

pub use tileset::*;

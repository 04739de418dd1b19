//! Runtime support for Tiled `.tsx` tileset descriptors: an immutable
//! per-tile metadata table (collision flags, animation chains) plus a
//! deterministic animation scheduler for the host's render loop.

mod animation;
mod tileset;
mod util;

pub use animation::*;
pub use tileset::*;
pub use util::*;

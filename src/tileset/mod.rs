mod tile;
mod tileset;
mod tsx;
pub mod parse;

pub use tile::*;
pub use tileset::*;
pub use tsx::*;

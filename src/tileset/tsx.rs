use std::num::{ParseFloatError, ParseIntError};

use derive_more::*;

use super::TileId;

/// Failure to read the XML surface of a .tsx document.
#[derive(Error, Display, From, Debug)]
pub enum TsxParseError {
    XmlError(roxmltree::Error),
    #[display(fmt = "{_0}")]
    ParseIntError(ParseIntError),
    #[display(fmt = "{_0}")]
    ParseFloatError(ParseFloatError),
    #[display(fmt = "Unexpected value {value}")]
    #[from(ignore)]
    InvalidAttributeValue { value: String },
    #[display(fmt = "Missing attribute '{attribute_name}'")]
    #[from(ignore)]
    MissingAttribute { attribute_name: String },
}

/// Semantic defect in an otherwise well-formed descriptor.
/// Fatal at load time: no table is built from a descriptor carrying any of these.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
pub enum MalformedDescriptor {
    #[display(fmt = "tile {tile_id} declares a non-positive frame duration of {duration}")]
    BadFrameDuration { tile_id: TileId, duration: i64 },
    #[display(fmt = "tile {tile_id} references frame {frame_id} outside of the tileset")]
    DanglingFrame { tile_id: TileId, frame_id: i64 },
    #[display(fmt = "animation chain starting at tile {head} never returns to its head")]
    InconsistentChain { head: TileId },
    #[display(fmt = "tile {tile_id} is annotated but lies outside of the declared tile count")]
    UndeclaredTile { tile_id: TileId },
    #[display(fmt = "tile {tile_id} declares unknown direction '{value}'")]
    InvalidDirection { tile_id: TileId, value: String },
    #[display(fmt = "tileset declares no columns")]
    MissingColumns,
}

/// A tile id outside of the declared `[0, tile_count)` range was queried.
/// Recoverable: callers decide whether to treat it as "no properties" or propagate.
#[derive(Error, Display, Debug, Clone, Copy, PartialEq, Eq)]
#[display(fmt = "tile id {id} is outside of the declared range 0..{tile_count}")]
pub struct OutOfRange {
    pub id: TileId,
    pub tile_count: u32,
}

/// Any failure while loading a descriptor end to end.
#[derive(Error, Display, From, Debug)]
pub enum TilesetError {
    #[display(fmt = "{_0}")]
    Parse(TsxParseError),
    #[display(fmt = "{_0}")]
    Malformed(MalformedDescriptor),
    #[display(fmt = "{_0}")]
    OutOfRange(OutOfRange),
}

use roxmltree::{Document, Node};

use crate::tileset::TsxParseError;
use crate::HashMap;

/// A mostly 1:1 mapping of the TSX <tileset> specification.
#[derive(Clone, Default, Debug)]
pub struct Tileset {
    pub name: String,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_count: u32,
    pub columns: u32,
    pub image: Option<Image>,
    pub tiles: Vec<Tile>,
}

impl Tileset {
    pub fn parse_doc(doc: Document) -> Result<Self, TsxParseError> {
        let mut tileset = Tileset::default();
        let root = doc.root();
        for node in root.children() {
            match node.tag_name().name() {
                "tileset" => tileset.parse(node)?,
                _ => {}
            }
        }
        Ok(tileset)
    }

    pub fn parse(&mut self, tileset_node: Node) -> Result<(), TsxParseError> {
        // Parses attributes
        for attribute in tileset_node.attributes() {
            let name = attribute.name();
            let value = attribute.value();
            match name {
                "name" => self.name = String::from(value),
                "tilewidth" => self.tile_width = value.parse()?,
                "tileheight" => self.tile_height = value.parse()?,
                "tilecount" => self.tile_count = value.parse()?,
                "columns" => self.columns = value.parse()?,
                _ => {}
            }
        }

        // Parses children
        for child in tileset_node.children() {
            let tag = child.tag_name().name();
            match tag {
                "image" => self.image = Some(Image::parse(child)?),
                "tile" => self.tiles.push(Tile::parse(child)?),
                _ => {}
            }
        }
        Ok(())
    }
}

/// Reference to the atlas image backing a tileset.
/// The image itself is loaded and sliced by the rendering collaborator.
#[derive(Clone, Eq, PartialEq, Default, Debug)]
pub struct Image {
    pub source: String,
    pub trans: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Image {
    pub fn parse(image_node: Node) -> Result<Image, TsxParseError> {
        let mut image = Image::default();
        for attribute in image_node.attributes() {
            let name = attribute.name();
            let value = attribute.value();
            match name {
                "source" => image.source = String::from(value),
                "trans" => image.trans = Some(String::from(value)),
                "width" => image.width = Some(value.parse()?),
                "height" => image.height = Some(value.parse()?),
                _ => {}
            }
        }
        Ok(image)
    }
}

/// A single annotated <tile> entry.
#[derive(Clone, Default, Debug)]
pub struct Tile {
    /// ID of tile local to its tileset.
    pub id: u32,
    pub properties: Properties,
    /// Explicit-form animation frames, in declared order. Empty when the
    /// tile uses the chained-pointer form or is not animated at all.
    pub animation: Vec<Frame>,
}

impl Tile {
    pub fn parse(tile_node: Node) -> Result<Tile, TsxParseError> {
        let mut tile = Tile::default();
        for attribute in tile_node.attributes() {
            match attribute.name() {
                "id" => tile.id = attribute.value().parse()?,
                _ => {}
            }
        }
        for child in tile_node.children() {
            match child.tag_name().name() {
                "properties" => tile.properties = Properties::parse(child)?,
                "animation" => tile.animation = Frame::parse_list(child)?,
                _ => {}
            }
        }
        Ok(tile)
    }
}

/// One <frame> of an explicit <animation> element.
/// Duration stays signed here so that non-positive values survive parsing
/// and get rejected with a proper error during table construction.
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
pub struct Frame {
    pub tile_id: u32,
    pub duration: i64,
}

impl Frame {
    fn parse_list(animation_node: Node) -> Result<Vec<Frame>, TsxParseError> {
        let mut frames = Vec::new();
        for child in animation_node.children() {
            if child.tag_name().name() != "frame" {
                continue;
            }
            let mut frame = Frame::default();
            for attribute in child.attributes() {
                match attribute.name() {
                    "tileid" => frame.tile_id = attribute.value().parse()?,
                    "duration" => frame.duration = attribute.value().parse()?,
                    _ => {}
                }
            }
            frames.push(frame);
        }
        Ok(frames)
    }
}

/// Typed property bag of a <properties> element.
#[derive(Clone, Default, Debug)]
pub struct Properties(pub HashMap<String, PropertyValue>);

#[derive(Clone, PartialEq, Debug)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Properties {
    pub fn parse(properties_node: Node) -> Result<Self, TsxParseError> {
        let mut properties = Properties::default();
        for child in properties_node.children() {
            if child.tag_name().name() != "property" {
                continue;
            }
            let mut name = None;
            let mut kind = "string";
            let mut value = None;
            for attribute in child.attributes() {
                match attribute.name() {
                    "name" => name = Some(attribute.value()),
                    "type" => kind = attribute.value(),
                    "value" => value = Some(attribute.value()),
                    _ => {}
                }
            }
            let name = name.ok_or(TsxParseError::MissingAttribute {
                attribute_name: String::from("name"),
            })?;
            let value = value.ok_or(TsxParseError::MissingAttribute {
                attribute_name: String::from("value"),
            })?;
            let value = match kind {
                "bool" => match value {
                    "true" => PropertyValue::Bool(true),
                    "false" => PropertyValue::Bool(false),
                    _ => {
                        return Err(TsxParseError::InvalidAttributeValue {
                            value: String::from(value),
                        })
                    }
                },
                "int" => PropertyValue::Int(value.parse()?),
                "float" => PropertyValue::Float(value.parse()?),
                _ => PropertyValue::String(String::from(value)),
            };
            properties.0.insert(String::from(name), value);
        }
        Ok(properties)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.0.get(name) {
            Some(PropertyValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.0.get(name) {
            Some(PropertyValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(PropertyValue::String(value)) => Some(value),
            _ => None,
        }
    }
}

use log::debug;
use roxmltree::Document;
use smallvec::SmallVec;

use super::parse;
use super::{
    AnimationSpec, Direction, Frame, MalformedDescriptor, OutOfRange, TileId, TileProperties,
    TilesetError, TsxParseError,
};
use crate::{HashSet, IntMap, URect};

static DEFAULT_PROPERTIES: TileProperties = TileProperties {
    collision: false,
    allow_direction: None,
    animation: None,
};

/// A processed version of [`parse::Tileset`]: the immutable per-tile metadata
/// table. Built once at load time, then shared read-only by the host.
///
/// Both animation authoring forms are normalized here into one canonical
/// [`AnimationSpec`] per chain head, so queries never re-walk pointer chains.
#[derive(Clone, Default, Debug)]
pub struct Tileset {
    pub name: String,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_count: u32,
    pub columns: u32,
    pub image: Option<parse::Image>,
    tiles: IntMap<u32, TileProperties>,
}

impl Tileset {
    /// Parses and validates a complete .tsx descriptor.
    pub fn parse_str(xml_source: &str) -> Result<Self, TilesetError> {
        let xml_doc = Document::parse(xml_source).map_err(TsxParseError::from)?;
        let parsed_tileset = parse::Tileset::parse_doc(xml_doc)?;
        Ok(Self::from_parsed(parsed_tileset)?)
    }

    /// Builds the metadata table from raw parse output.
    /// Fails atomically: a malformed descriptor never yields a table.
    pub fn from_parsed(parsed: parse::Tileset) -> Result<Self, MalformedDescriptor> {
        if parsed.columns == 0 {
            return Err(MalformedDescriptor::MissingColumns);
        }
        let tile_count = parsed.tile_count;
        let mut tiles: IntMap<u32, TileProperties> = IntMap::default();

        // Static properties.
        for tile in &parsed.tiles {
            if tile.id >= tile_count {
                return Err(MalformedDescriptor::UndeclaredTile {
                    tile_id: TileId(tile.id),
                });
            }
            let mut properties = TileProperties::default();
            properties.collision = tile.properties.get_bool("collision").unwrap_or(false);
            if let Some(value) = tile.properties.get_str("allow_direction") {
                let direction = Direction::from_str(value).ok_or_else(|| {
                    MalformedDescriptor::InvalidDirection {
                        tile_id: TileId(tile.id),
                        value: String::from(value),
                    }
                })?;
                properties.allow_direction = Some(direction);
            }
            tiles.insert(tile.id, properties);
        }

        // Explicit-form chains. Their members are recorded so that the
        // chained-pointer pass below treats them as descriptive, not as
        // independent heads.
        let mut covered: HashSet<u32> = HashSet::default();
        let mut explicit_chains = 0usize;
        for tile in &parsed.tiles {
            if tile.animation.is_empty() {
                continue;
            }
            let tile_id = TileId(tile.id);
            let mut frames: SmallVec<[Frame; 8]> = SmallVec::new();
            for raw in &tile.animation {
                let duration_ms = checked_duration(tile_id, raw.duration)?;
                let frame_id = checked_frame_id(tile_id, raw.tile_id as i64, tile_count)?;
                frames.push(Frame {
                    tile_id: TileId(frame_id),
                    duration_ms,
                });
            }
            for frame in &frames {
                covered.insert(frame.tile_id.0);
            }
            covered.insert(tile.id);
            tiles.entry(tile.id).or_default().animation = Some(AnimationSpec::new(frames));
            explicit_chains += 1;
        }

        // Chained-pointer form: tiles carrying a (frame offset, next frame) pair.
        let mut pointers: IntMap<u32, (i64, i64)> = IntMap::default();
        for tile in &parsed.tiles {
            let offset = tile.properties.get_int("animation_frame_offset");
            let next = tile.properties.get_int("animation_next_frame");
            if let (Some(offset), Some(next)) = (offset, next) {
                pointers.insert(tile.id, (offset, next));
            }
        }

        // Pointer tiles not reached by any explicit chain head their own chains.
        // The smallest id wins as the canonical head, keeping loads deterministic.
        let mut implicit_heads: Vec<u32> = pointers
            .keys()
            .copied()
            .filter(|id| !covered.contains(id))
            .collect();
        implicit_heads.sort_unstable();
        let mut implicit_chains = 0usize;
        for head in implicit_heads {
            if covered.contains(&head) {
                continue;
            }
            let frames = walk_chain(head, &pointers, tile_count)?;
            for frame in &frames {
                covered.insert(frame.tile_id.0);
            }
            tiles.entry(head).or_default().animation = Some(AnimationSpec::new(frames));
            implicit_chains += 1;
        }

        debug!(
            "loaded tileset '{}': {} annotated tiles, {} explicit + {} implicit animation chains",
            parsed.name,
            tiles.len(),
            explicit_chains,
            implicit_chains,
        );

        Ok(Self {
            name: parsed.name,
            tile_width: parsed.tile_width,
            tile_height: parsed.tile_height,
            tile_count,
            columns: parsed.columns,
            image: parsed.image,
            tiles,
        })
    }

    /// Looks up the static properties of `id`.
    /// Total over `[0, tile_count)`; in-range ids the descriptor left
    /// unannotated resolve to the defaults. Out-of-range ids fail rather than
    /// fabricating another tile's properties.
    pub fn lookup(&self, id: TileId) -> Result<&TileProperties, OutOfRange> {
        if id.0 >= self.tile_count {
            return Err(OutOfRange {
                id,
                tile_count: self.tile_count,
            });
        }
        Ok(self.tiles.get(&id.0).unwrap_or(&DEFAULT_PROPERTIES))
    }

    /// Canonical animation chain declared at `head`, if any.
    pub fn animation(&self, head: TileId) -> Option<&AnimationSpec> {
        self.tiles.get(&head.0).and_then(|properties| properties.animation.as_ref())
    }

    /// Source rectangle of `id` in the atlas image, for the rendering
    /// collaborator to blit from.
    pub fn tile_rect(&self, id: TileId) -> Result<URect, OutOfRange> {
        if id.0 >= self.tile_count {
            return Err(OutOfRange {
                id,
                tile_count: self.tile_count,
            });
        }
        let col = id.0 % self.columns;
        let row = id.0 / self.columns;
        Ok(URect::new(
            col * self.tile_width,
            row * self.tile_height,
            self.tile_width,
            self.tile_height,
        ))
    }

    /// Iterates over all tiles the descriptor explicitly annotated.
    pub fn annotated_tiles(&self) -> impl Iterator<Item = (TileId, &TileProperties)> {
        self.tiles.iter().map(|(id, properties)| (TileId(*id), properties))
    }
}

fn checked_duration(tile_id: TileId, duration: i64) -> Result<u32, MalformedDescriptor> {
    u32::try_from(duration)
        .ok()
        .filter(|ms| *ms > 0)
        .ok_or(MalformedDescriptor::BadFrameDuration { tile_id, duration })
}

fn checked_frame_id(
    tile_id: TileId,
    frame_id: i64,
    tile_count: u32,
) -> Result<u32, MalformedDescriptor> {
    u32::try_from(frame_id)
        .ok()
        .filter(|id| *id < tile_count)
        .ok_or(MalformedDescriptor::DanglingFrame { tile_id, frame_id })
}

/// Materializes a chained-pointer animation into a flat frame list by
/// following next-frame pointers until the walk returns to `head`.
fn walk_chain(
    head: u32,
    pointers: &IntMap<u32, (i64, i64)>,
    tile_count: u32,
) -> Result<SmallVec<[Frame; 8]>, MalformedDescriptor> {
    let mut frames: SmallVec<[Frame; 8]> = SmallVec::new();
    let mut visited: HashSet<u32> = HashSet::default();
    let mut current = head;
    loop {
        // Loop guard: a consistent chain visits each tile at most once.
        if !visited.insert(current) || visited.len() > tile_count as usize {
            return Err(MalformedDescriptor::InconsistentChain {
                head: TileId(head),
            });
        }
        let (duration, next) = pointers.get(&current).copied().ok_or(
            MalformedDescriptor::InconsistentChain {
                head: TileId(head),
            },
        )?;
        let duration_ms = checked_duration(TileId(current), duration)?;
        let next = checked_frame_id(TileId(current), next, tile_count)?;
        frames.push(Frame {
            tile_id: TileId(current),
            duration_ms,
        });
        if next == head {
            break;
        }
        current = next;
    }
    Ok(frames)
}

#[cfg(test)]
mod test {
    use super::*;

    const COLLISION_IDS: [u32; 21] = [
        3, 4, 5, 9, 10, 11, 12, 13, 30, 32, 33, 35, 64, 90, 91, 92, 120, 121, 123, 124, 125,
    ];

    fn pointer_tile(id: u32, offset: i64, next: i64) -> String {
        format!(
            r#"
 <tile id="{id}">
  <properties>
   <property name="animation_frame_offset" type="int" value="{offset}"/>
   <property name="animation_next_frame" type="int" value="{next}"/>
  </properties>
 </tile>"#
        )
    }

    fn collision_tile(id: u32) -> String {
        format!(
            r#"
 <tile id="{id}">
  <properties>
   <property name="collision" type="bool" value="true"/>
  </properties>
 </tile>"#
        )
    }

    /// The reference descriptor: the water chain authored in both forms at
    /// once (explicit list on the head, pointers on the tail tiles), plus
    /// the full set of collision annotations.
    fn decorate_descriptor() -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<tileset version="1.10" name="decorate" tilewidth="16" tileheight="16" tilecount="900" columns="30">
 <image source="decorate.png" trans="000000" width="480" height="480"/>
 <tile id="0">
  <properties>
   <property name="animation_frame_offset" type="int" value="300"/>
   <property name="animation_next_frame" type="int" value="6"/>
  </properties>
  <animation>
   <frame tileid="0" duration="300"/>
   <frame tileid="6" duration="300"/>
   <frame tileid="7" duration="300"/>
   <frame tileid="8" duration="300"/>
  </animation>
 </tile>"#,
        );
        xml.push_str(&pointer_tile(6, 300, 7));
        xml.push_str(&pointer_tile(7, 300, 8));
        xml.push_str(&pointer_tile(8, 300, 0));
        for id in COLLISION_IDS {
            xml.push_str(&collision_tile(id));
        }
        xml.push_str("\n</tileset>");
        xml
    }

    fn reference_frames() -> Vec<Frame> {
        [(0, 300), (6, 300), (7, 300), (8, 300)]
            .into_iter()
            .map(|(id, duration_ms)| Frame {
                tile_id: TileId(id),
                duration_ms,
            })
            .collect()
    }

    #[test]
    fn loads_reference_descriptor() {
        let _ = env_logger::builder().is_test(true).try_init();
        let tileset = Tileset::parse_str(&decorate_descriptor()).unwrap();
        assert_eq!(tileset.name, "decorate");
        assert_eq!(tileset.tile_count, 900);
        assert_eq!(tileset.columns, 30);
        assert_eq!(tileset.tile_width, 16);
        assert_eq!(tileset.image.as_ref().unwrap().source, "decorate.png");
    }

    #[test]
    fn collision_flags_resolve() {
        let tileset = Tileset::parse_str(&decorate_descriptor()).unwrap();
        for id in COLLISION_IDS {
            assert!(tileset.lookup(TileId(id)).unwrap().collision, "tile {id}");
        }
        assert!(!tileset.lookup(TileId(0)).unwrap().collision);
        assert!(!tileset.lookup(TileId(50)).unwrap().collision);
        assert!(!tileset.lookup(TileId(899)).unwrap().collision);
    }

    #[test]
    fn unannotated_tiles_resolve_to_defaults() {
        let tileset = Tileset::parse_str(&decorate_descriptor()).unwrap();
        let properties = tileset.lookup(TileId(500)).unwrap();
        assert_eq!(*properties, TileProperties::default());
        assert!(properties.animation.is_none());
    }

    #[test]
    fn explicit_chain_normalizes() {
        let tileset = Tileset::parse_str(&decorate_descriptor()).unwrap();
        let spec = tileset.animation(TileId(0)).unwrap();
        assert_eq!(spec.frames(), reference_frames().as_slice());
        assert_eq!(spec.period_ms(), 1200);
        // Tail tiles describe the shared chain. They are not heads themselves.
        for id in [6, 7, 8] {
            assert!(tileset.animation(TileId(id)).is_none(), "tile {id}");
        }
    }

    #[test]
    fn implicit_chain_normalizes_like_explicit() {
        let mut xml = String::from(
            r#"<tileset name="water" tilewidth="16" tileheight="16" tilecount="9" columns="3">"#,
        );
        xml.push_str(&pointer_tile(0, 300, 6));
        xml.push_str(&pointer_tile(6, 300, 7));
        xml.push_str(&pointer_tile(7, 300, 8));
        xml.push_str(&pointer_tile(8, 300, 0));
        xml.push_str("\n</tileset>");
        let tileset = Tileset::parse_str(&xml).unwrap();
        let spec = tileset.animation(TileId(0)).unwrap();
        assert_eq!(spec.frames(), reference_frames().as_slice());
        for id in [6, 7, 8] {
            assert!(tileset.animation(TileId(id)).is_none(), "tile {id}");
        }
    }

    #[test]
    fn lookup_out_of_range_fails() {
        let tileset = Tileset::parse_str(&decorate_descriptor()).unwrap();
        let err = tileset.lookup(TileId(900)).unwrap_err();
        assert_eq!(
            err,
            OutOfRange {
                id: TileId(900),
                tile_count: 900
            }
        );
        assert!(tileset.lookup(TileId(899)).is_ok());
    }

    #[test]
    fn zero_duration_rejected() {
        let xml = r#"<tileset name="bad" tilewidth="16" tileheight="16" tilecount="4" columns="2">
 <tile id="0">
  <animation>
   <frame tileid="0" duration="0"/>
   <frame tileid="1" duration="300"/>
  </animation>
 </tile>
</tileset>"#;
        match Tileset::parse_str(xml) {
            Err(TilesetError::Malformed(MalformedDescriptor::BadFrameDuration {
                tile_id,
                duration,
            })) => {
                assert_eq!(tile_id, TileId(0));
                assert_eq!(duration, 0);
            }
            other => panic!("expected BadFrameDuration, got {other:?}"),
        }
    }

    #[test]
    fn dangling_frame_rejected() {
        let xml = r#"<tileset name="bad" tilewidth="16" tileheight="16" tilecount="4" columns="2">
 <tile id="0">
  <animation>
   <frame tileid="99" duration="300"/>
  </animation>
 </tile>
</tileset>"#;
        match Tileset::parse_str(xml) {
            Err(TilesetError::Malformed(MalformedDescriptor::DanglingFrame {
                tile_id,
                frame_id,
            })) => {
                assert_eq!(tile_id, TileId(0));
                assert_eq!(frame_id, 99);
            }
            other => panic!("expected DanglingFrame, got {other:?}"),
        }
    }

    #[test]
    fn dangling_pointer_rejected() {
        let mut xml = String::from(
            r#"<tileset name="bad" tilewidth="16" tileheight="16" tilecount="4" columns="2">"#,
        );
        xml.push_str(&pointer_tile(0, 300, 99));
        xml.push_str("\n</tileset>");
        assert!(matches!(
            Tileset::parse_str(&xml),
            Err(TilesetError::Malformed(MalformedDescriptor::DanglingFrame { .. }))
        ));
    }

    #[test]
    fn chain_that_never_returns_to_head_rejected() {
        // 0 -> 1 -> 2 -> 1: cycles without revisiting the head.
        let mut xml = String::from(
            r#"<tileset name="bad" tilewidth="16" tileheight="16" tilecount="4" columns="2">"#,
        );
        xml.push_str(&pointer_tile(0, 300, 1));
        xml.push_str(&pointer_tile(1, 300, 2));
        xml.push_str(&pointer_tile(2, 300, 1));
        xml.push_str("\n</tileset>");
        match Tileset::parse_str(&xml) {
            Err(TilesetError::Malformed(MalformedDescriptor::InconsistentChain { head })) => {
                assert_eq!(head, TileId(0));
            }
            other => panic!("expected InconsistentChain, got {other:?}"),
        }
    }

    #[test]
    fn chain_into_unannotated_tile_rejected() {
        // Tile 3 exists in the atlas but carries no pointer pair, so the
        // walk cannot continue.
        let mut xml = String::from(
            r#"<tileset name="bad" tilewidth="16" tileheight="16" tilecount="4" columns="2">"#,
        );
        xml.push_str(&pointer_tile(0, 300, 3));
        xml.push_str("\n</tileset>");
        assert!(matches!(
            Tileset::parse_str(&xml),
            Err(TilesetError::Malformed(MalformedDescriptor::InconsistentChain { .. }))
        ));
    }

    #[test]
    fn annotated_tile_outside_count_rejected() {
        let mut xml = String::from(
            r#"<tileset name="bad" tilewidth="16" tileheight="16" tilecount="4" columns="2">"#,
        );
        xml.push_str(&collision_tile(5));
        xml.push_str("\n</tileset>");
        assert!(matches!(
            Tileset::parse_str(&xml),
            Err(TilesetError::Malformed(MalformedDescriptor::UndeclaredTile { .. }))
        ));
    }

    #[test]
    fn tile_rect_maps_id_to_atlas_cell() {
        let tileset = Tileset::parse_str(&decorate_descriptor()).unwrap();
        assert_eq!(tileset.tile_rect(TileId(0)).unwrap(), URect::new(0, 0, 16, 16));
        // Second row, second column.
        assert_eq!(tileset.tile_rect(TileId(31)).unwrap(), URect::new(16, 16, 16, 16));
        assert_eq!(tileset.tile_rect(TileId(899)).unwrap(), URect::new(29 * 16, 29 * 16, 16, 16));
        assert!(tileset.tile_rect(TileId(900)).is_err());
    }

    #[test]
    fn directional_passage() {
        let xml = r#"<tileset name="ledge" tilewidth="16" tileheight="16" tilecount="4" columns="2">
 <tile id="1">
  <properties>
   <property name="allow_direction" value="down"/>
  </properties>
 </tile>
 <tile id="2">
  <properties>
   <property name="collision" type="bool" value="true"/>
  </properties>
 </tile>
</tileset>"#;
        let tileset = Tileset::parse_str(xml).unwrap();
        let ledge = tileset.lookup(TileId(1)).unwrap();
        assert_eq!(ledge.allow_direction, Some(Direction::Down));
        assert!(!ledge.blocks(Some(Direction::Up)));
        assert!(ledge.blocks(Some(Direction::Down)));
        assert!(ledge.blocks(Some(Direction::Left)));
        assert!(ledge.blocks(None));
        let wall = tileset.lookup(TileId(2)).unwrap();
        assert!(wall.blocks(None));
        assert!(wall.blocks(Some(Direction::Up)));
        let floor = tileset.lookup(TileId(0)).unwrap();
        assert!(!floor.blocks(None));
    }

    #[test]
    fn unknown_direction_rejected() {
        let xml = r#"<tileset name="bad" tilewidth="16" tileheight="16" tilecount="4" columns="2">
 <tile id="1">
  <properties>
   <property name="allow_direction" value="sideways"/>
  </properties>
 </tile>
</tileset>"#;
        assert!(matches!(
            Tileset::parse_str(xml),
            Err(TilesetError::Malformed(MalformedDescriptor::InvalidDirection { .. }))
        ));
    }

    #[test]
    fn zero_columns_rejected() {
        let xml = r#"<tileset name="bad" tilewidth="16" tileheight="16" tilecount="4" columns="0"/>"#;
        assert!(matches!(
            Tileset::parse_str(xml),
            Err(TilesetError::Malformed(MalformedDescriptor::MissingColumns))
        ));
    }
}

use derive_more::*;
use smallvec::SmallVec;

/// Id of a tile local to its tileset.
/// Doubles as the index of the tile's cell in the atlas image.
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug, Display, Hash, Ord, PartialOrd)]
pub struct TileId(pub u32);

impl TileId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Cardinal movement direction used by directional-passage tiles.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn from_str(str: &str) -> Option<Self> {
        match str {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Static gameplay properties of a single tile.
/// Tiles the descriptor leaves unannotated resolve to [`TileProperties::default`].
#[derive(Clone, PartialEq, Default, Debug)]
pub struct TileProperties {
    /// True when the tile blocks movement and occupancy.
    pub collision: bool,
    /// Ledge-style override: when set, the tile is passable only when
    /// moving opposite to the declared direction.
    pub allow_direction: Option<Direction>,
    /// Present only on tiles that head an animation chain.
    pub animation: Option<AnimationSpec>,
}

impl TileProperties {
    /// Whether the tile blocks an entity moving in `moving`.
    /// Pass `None` when no movement direction applies (plain occupancy checks).
    pub fn blocks(&self, moving: Option<Direction>) -> bool {
        if self.collision {
            return true;
        }
        match (self.allow_direction, moving) {
            (Some(allowed), Some(moving)) => moving != allowed.opposite(),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

/// One step of an animation chain.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Frame {
    pub tile_id: TileId,
    pub duration_ms: u32,
}

/// Canonical frame sequence of an animation chain, attached to its head tile.
/// Both authoring forms (explicit frame list, chained next-frame pointers)
/// normalize into this shape at load time.
#[derive(Clone, PartialEq, Debug)]
pub struct AnimationSpec {
    frames: SmallVec<[Frame; 8]>,
    period_ms: u64,
}

impl AnimationSpec {
    /// Invariant upheld by the loader: `frames` is non-empty and every
    /// duration is positive, so `period_ms` is never 0.
    pub(crate) fn new(frames: SmallVec<[Frame; 8]>) -> Self {
        let period_ms = frames.iter().map(|frame| frame.duration_ms as u64).sum();
        Self { frames, period_ms }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Sum of all frame durations. One full cycle of the chain.
    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Frame index and time elapsed within it, `offset_ms` into the cycle.
    /// Callers keep `offset_ms < period_ms`.
    pub(crate) fn frame_at(&self, offset_ms: u64) -> (usize, u64) {
        let mut remaining = offset_ms;
        for (index, frame) in self.frames.iter().enumerate() {
            let duration = frame.duration_ms as u64;
            if remaining < duration {
                return (index, remaining);
            }
            remaining -= duration;
        }
        (0, 0)
    }

    /// Offset into the cycle of a position given as frame index + elapsed time.
    pub(crate) fn offset_of(&self, frame_index: usize, elapsed_ms: u64) -> u64 {
        let before: u64 = self.frames[..frame_index]
            .iter()
            .map(|frame| frame.duration_ms as u64)
            .sum();
        before + elapsed_ms
    }
}

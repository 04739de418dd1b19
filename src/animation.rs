use log::warn;
use slotmap::SlotMap;

use crate::{AnimationSpec, TileId, Tileset};

slotmap::new_key_type! {
    /// Handle to a tracked animation instance in an [`Animations`] arena.
    pub struct AnimationKey;
}

/// Playback state of one animated tile instance: which frame of its chain is
/// displayed and how long it has been displayed.
///
/// Purely a function of total accumulated time modulo the chain period, so
/// advancing by `a` then `b` always lands on the same frame as advancing once
/// by `a + b`, and identical delta sequences replay identically.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct AnimationState {
    head: TileId,
    frame_index: usize,
    elapsed_ms: u64,
    current: TileId,
}

impl AnimationState {
    /// Starts playback at frame 0 of the chain declared at `head`.
    pub fn new(head: TileId, spec: &AnimationSpec) -> Self {
        Self {
            head,
            frame_index: 0,
            elapsed_ms: 0,
            current: spec.frames()[0].tile_id,
        }
    }

    /// Head tile id of the chain this instance plays.
    pub fn head(&self) -> TileId {
        self.head
    }

    /// Tile id currently displayed. Pure query.
    pub fn current_frame(&self) -> TileId {
        self.current
    }

    /// Index of the displayed frame within the chain.
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Advances playback by `delta_ms`, wrapping around the chain as many
    /// times as the delta requires. `spec` must be the chain this state was
    /// created from.
    pub fn advance(&mut self, spec: &AnimationSpec, delta_ms: u64) {
        let offset =
            (spec.offset_of(self.frame_index, self.elapsed_ms) + delta_ms) % spec.period_ms();
        let (frame_index, elapsed_ms) = spec.frame_at(offset);
        self.frame_index = frame_index;
        self.elapsed_ms = elapsed_ms;
        self.current = spec.frames()[frame_index].tile_id;
    }

    /// Returns to frame 0 with no accumulated time.
    pub fn reset(&mut self, spec: &AnimationSpec) {
        self.frame_index = 0;
        self.elapsed_ms = 0;
        self.current = spec.frames()[0].tile_id;
    }
}

/// Arena of animation instances playing against one shared read-only
/// [`Tileset`].
///
/// Each instance keeps its own phase, so a host may track one instance per
/// chain, or several per chain to desynchronize visually identical tiles.
#[derive(Default)]
pub struct Animations {
    states: SlotMap<AnimationKey, AnimationState>,
}

impl Animations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins tracking an instance of the chain declared at `head`,
    /// starting at frame 0. Returns `None` when `head` carries no animation.
    pub fn spawn(&mut self, tileset: &Tileset, head: TileId) -> Option<AnimationKey> {
        let spec = tileset.animation(head)?;
        Some(self.states.insert(AnimationState::new(head, spec)))
    }

    /// Stops tracking an instance, returning its final state.
    pub fn despawn(&mut self, key: AnimationKey) -> Option<AnimationState> {
        self.states.remove(key)
    }

    pub fn get(&self, key: AnimationKey) -> Option<&AnimationState> {
        self.states.get(key)
    }

    /// Tile id currently displayed by a tracked instance.
    pub fn current_frame(&self, key: AnimationKey) -> Option<TileId> {
        self.states.get(key).map(|state| state.current_frame())
    }

    /// Advances a single instance by `delta_ms`.
    pub fn advance(&mut self, tileset: &Tileset, key: AnimationKey, delta_ms: u64) {
        if let Some(state) = self.states.get_mut(key) {
            match tileset.animation(state.head()) {
                Some(spec) => state.advance(spec, delta_ms),
                None => warn!("tracked instance references tile {} with no chain", state.head()),
            }
        }
    }

    /// Advances every tracked instance by `delta_ms`. Called once per host
    /// frame tick.
    pub fn advance_all(&mut self, tileset: &Tileset, delta_ms: u64) {
        for (_, state) in self.states.iter_mut() {
            match tileset.animation(state.head()) {
                Some(spec) => state.advance(spec, delta_ms),
                None => warn!("tracked instance references tile {} with no chain", state.head()),
            }
        }
    }

    /// Resets a tracked instance to frame 0.
    pub fn reset(&mut self, tileset: &Tileset, key: AnimationKey) {
        if let Some(state) = self.states.get_mut(key) {
            if let Some(spec) = tileset.animation(state.head()) {
                state.reset(spec);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

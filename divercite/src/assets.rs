use std::collections::BTreeMap;

/// Tracks which assets can be drawn, and holds back draws of assets that are still loading.
///
/// Each queued draw is handed out exactly once, when its asset becomes ready.
#[derive(Debug)]
pub struct AssetRegistry<A, D> {
    assets: BTreeMap<A, AssetState<D>>,
}

#[derive(Debug)]
enum AssetState<D> {
    Loading { deferred: Vec<D> },
    Ready,
}

impl<A: Ord + Copy, D: PartialEq> AssetRegistry<A, D> {
    pub fn new() -> Self {
        Self {
            assets: BTreeMap::new(),
        }
    }

    /// Starts tracking `asset` as loading. Does nothing if it is already known.
    pub fn register(&mut self, asset: A) {
        self.assets.entry(asset).or_insert(AssetState::Loading {
            deferred: Vec::new(),
        });
    }

    pub fn is_ready(&self, asset: A) -> bool {
        matches!(self.assets.get(&asset), Some(AssetState::Ready))
    }

    pub fn all_ready(&self) -> bool {
        self.assets
            .values()
            .all(|state| matches!(state, AssetState::Ready))
    }

    /// Returns `draw` if it can happen right away. Otherwise it is kept
    /// until [`Self::mark_ready()`] is called for `asset`.
    ///
    /// Unknown assets count as loading.
    pub fn submit(&mut self, asset: A, draw: D) -> Option<D> {
        match self.assets.entry(asset).or_insert(AssetState::Loading {
            deferred: Vec::new(),
        }) {
            AssetState::Ready => Some(draw),
            AssetState::Loading { deferred } => {
                if !deferred.contains(&draw) {
                    deferred.push(draw);
                }
                None
            }
        }
    }

    /// Records that `asset` finished loading and returns the draws that waited for it.
    ///
    /// Only the first call for an asset returns anything.
    pub fn mark_ready(&mut self, asset: A) -> Vec<D> {
        match self.assets.insert(asset, AssetState::Ready) {
            Some(AssetState::Loading { deferred }) => deferred,
            Some(AssetState::Ready) | None => Vec::new(),
        }
    }

    /// Forgets all deferred draws, e.g. because a full redraw replaces them.
    pub fn discard_deferred(&mut self) {
        for state in self.assets.values_mut() {
            if let AssetState::Loading { deferred } = state {
                deferred.clear();
            }
        }
    }
}

impl<A: Ord + Copy, D: PartialEq> Default for AssetRegistry<A, D> {
    fn default() -> Self {
        Self::new()
    }
}

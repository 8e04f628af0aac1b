use crate::feed::FeedItem;
use crate::video::{MediaFactory, MediaHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState {
    pub muted: bool,
    pub minting: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            muted: true,
            minting: false,
        }
    }
}

/// Keeps exactly one item audible and playing: the one at the current index.
pub struct Controller {
    factory: Option<Box<dyn MediaFactory>>,
    handles: Vec<Box<dyn MediaHandle>>,
}

impl Controller {
    pub fn new(factory: Option<Box<dyn MediaFactory>>) -> Self {
        Self {
            factory,
            handles: Vec::new(),
        }
    }

    /// Bookkeeping only; no media elements are driven.
    pub fn headless() -> Self {
        Self::new(None)
    }

    pub fn attach(&mut self, items: &[FeedItem]) {
        self.handles = match &self.factory {
            Some(factory) => items.iter().map(|item| factory.create(&item.video)).collect(),
            None => Vec::new(),
        };
    }

    /// Recomputes the whole mute vector from `current` and starts that item.
    pub fn sync(&mut self, items: &mut [FeedItem], current: Option<usize>) {
        let Some(current) = current.filter(|index| *index < items.len()) else {
            return;
        };

        for (index, item) in items.iter_mut().enumerate() {
            if index == current {
                continue;
            }
            item.playback.muted = true;
            if let Some(handle) = self.handles.get_mut(index) {
                if let Err(err) = handle.set_muted(true) {
                    tracing::debug!(index, "mute failed: {err:#}");
                }
            }
        }

        items[current].playback.muted = false;
        if let Some(handle) = self.handles.get_mut(current) {
            if let Err(err) = handle.set_muted(false) {
                tracing::debug!(index = current, "unmute failed: {err:#}");
            }
            // Rejected playback leaves the mute bookkeeping as it is.
            if let Err(err) = handle.play() {
                tracing::debug!(index = current, "play rejected: {err:#}");
            }
        }
    }

    /// Flips one item's mute flag on explicit request. Returns the new state.
    pub fn toggle_mute(&mut self, items: &mut [FeedItem], index: usize) -> Option<bool> {
        let item = items.get_mut(index)?;
        item.playback.muted = !item.playback.muted;
        let muted = item.playback.muted;
        if let Some(handle) = self.handles.get_mut(index) {
            if let Err(err) = handle.set_muted(muted) {
                tracing::debug!(index, "mute toggle failed: {err:#}");
            }
        }
        Some(muted)
    }
}

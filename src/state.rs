/// Type-safe handle to a texture owned by the backend.
///
/// Ids are allocated from a monotonic counter and never reused, so
/// comparing ids for draw-state changes can never alias a freed texture
/// with a later one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) u64);

/// The GPU state a batch of vertices will be drawn with.
///
/// Every vertex in a single batch shares one `DrawState`; switching state
/// flushes the pending batch first so no submission mixes states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DrawState {
    /// Solid vertex color, sampler blend factor 0.
    #[default]
    Solid,
    /// Sample the bound texture, sampler blend factor 1.
    Textured(TextureId),
}

impl DrawState {
    /// Whether moving to `next` requires the pending batch to be flushed.
    pub fn requires_flush(self, next: DrawState) -> bool {
        self != next
    }
}

//! Vertex batching for the immediate-mode draw path.
//!
//! Draw calls accumulate interleaved vertices into one client-side batch.
//! The batch is handed to a [`DrawSink`] (one GPU submission per flush)
//! whenever the draw state changes, the batch reaches capacity, or the
//! frame ends. Keeping the flush policy behind the sink seam means the
//! whole batching engine runs without a GPU device in tests.

use crate::state::{DrawState, TextureId};
use crate::types::{Color, Rect};
use crate::vertex::{VERTEX_Z, Vertex};

/// Capacity bound of a single batch, in vertices.
///
/// Reaching this bound triggers an implicit flush before the next append,
/// so a single GPU submission never covers more than `MAX_VERTICES`.
pub const MAX_VERTICES: usize = 1024;

/// Receiver for a completed batch: exactly one draw submission per call.
///
/// The production sink uploads the slice into the vertex ring and records
/// one draw; tests substitute a recording sink.
pub trait DrawSink {
    fn submit(&mut self, vertices: &[Vertex], state: DrawState);
}

/// Accumulates per-primitive vertices and decides when to flush.
///
/// Vertices are appended with the toolkit's top-left-origin coordinates
/// already flipped into device space (`device_y = viewport_height - y`)
/// and the current draw color normalized per-vertex.
pub struct Batcher {
    vertices: Vec<Vertex>,
    capacity: usize,
    color: Color,
    state: DrawState,
    viewport_height: f32,
}

impl Batcher {
    pub fn new(capacity: usize) -> Self {
        // Round the bound down to a whole number of triangles: the
        // implicit capacity flush must never split a triangle across
        // two submissions.
        let capacity = capacity - capacity % 3;
        Self {
            // Pre-allocated to the bound: no growth, no per-frame churn.
            vertices: Vec::with_capacity(capacity),
            capacity,
            color: Color::WHITE,
            state: DrawState::Solid,
            viewport_height: 0.0,
        }
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn state(&self) -> DrawState {
        self.state
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height;
    }

    pub fn pending(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Append one vertex, flushing first if the batch is at capacity.
    pub fn add_vertex<S: DrawSink>(&mut self, x: f32, y: f32, u: f32, v: f32, sink: &mut S) {
        if self.vertices.len() >= self.capacity {
            self.flush(sink);
        }

        self.vertices.push(Vertex {
            position: [x, self.viewport_height - y, VERTEX_Z],
            color: self.color.normalized(),
            uv: [u, v],
        });
    }

    /// Hand the pending batch to the sink and reset. No-op when empty.
    pub fn flush<S: DrawSink>(&mut self, sink: &mut S) {
        if self.vertices.is_empty() {
            return;
        }

        sink.submit(&self.vertices, self.state);
        self.vertices.clear();
    }

    /// Queue a solid-color rectangle, leaving texturing disabled.
    pub fn filled_rect<S: DrawSink>(&mut self, rect: Rect, sink: &mut S) {
        if self.state.requires_flush(DrawState::Solid) {
            self.flush(sink);
            self.state = DrawState::Solid;
        }

        self.rect_vertices(rect, (0.0, 0.0, 0.0, 0.0), sink);
    }

    /// Queue a textured rectangle with the supplied UV corners, binding
    /// `id` (via a flush) if it is not already the active texture.
    pub fn textured_rect<S: DrawSink>(
        &mut self,
        id: TextureId,
        rect: Rect,
        uv: (f32, f32, f32, f32),
        sink: &mut S,
    ) {
        let next = DrawState::Textured(id);
        if self.state.requires_flush(next) {
            self.flush(sink);
            self.state = next;
        }

        self.rect_vertices(rect, uv, sink);
    }

    /// Two triangles covering the rect: TL, TR, BL, TR, BR, BL.
    fn rect_vertices<S: DrawSink>(
        &mut self,
        rect: Rect,
        (u1, v1, u2, v2): (f32, f32, f32, f32),
        sink: &mut S,
    ) {
        let (x, y) = (rect.x as f32, rect.y as f32);
        let (w, h) = (rect.w as f32, rect.h as f32);

        self.add_vertex(x, y, u1, v1, sink);
        self.add_vertex(x + w, y, u2, v1, sink);
        self.add_vertex(x, y + h, u1, v2, sink);
        self.add_vertex(x + w, y, u2, v1, sink);
        self.add_vertex(x + w, y + h, u2, v2, sink);
        self.add_vertex(x, y + h, u1, v2, sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        submissions: Vec<(Vec<Vertex>, DrawState)>,
    }

    impl DrawSink for Recorder {
        fn submit(&mut self, vertices: &[Vertex], state: DrawState) {
            self.submissions.push((vertices.to_vec(), state));
        }
    }

    fn batcher() -> Batcher {
        let mut b = Batcher::new(MAX_VERTICES);
        b.set_viewport_height(240.0);
        b
    }

    #[test]
    fn appends_below_capacity_never_flush() {
        let mut b = batcher();
        let mut sink = Recorder::default();

        for i in 0..100 {
            b.add_vertex(i as f32, 0.0, 0.0, 0.0, &mut sink);
            assert_eq!(b.pending(), i + 1);
        }
        assert!(sink.submissions.is_empty());
    }

    // The largest whole number of triangles that fits the bound.
    const ALIGNED_CAPACITY: usize = MAX_VERTICES - MAX_VERTICES % 3;

    #[test]
    fn append_at_capacity_flushes_exactly_once_first() {
        let mut b = batcher();
        let mut sink = Recorder::default();

        for _ in 0..ALIGNED_CAPACITY {
            b.add_vertex(1.0, 1.0, 0.0, 0.0, &mut sink);
        }
        assert!(sink.submissions.is_empty());
        assert_eq!(b.pending(), ALIGNED_CAPACITY);

        b.add_vertex(7.0, 7.0, 0.0, 0.0, &mut sink);

        assert_eq!(sink.submissions.len(), 1);
        assert_eq!(sink.submissions[0].0.len(), ALIGNED_CAPACITY);
        // Only the vertex that triggered the flush is still pending.
        assert_eq!(b.pending(), 1);
    }

    #[test]
    fn capacity_flush_never_splits_a_triangle() {
        let mut b = batcher();
        let mut sink = Recorder::default();

        // Enough quads to overflow the batch twice over.
        for i in 0..400 {
            b.filled_rect(Rect::new(i, 0, 4, 4), &mut sink);
        }
        b.flush(&mut sink);

        assert!(sink.submissions.len() >= 3);
        let mut total = 0;
        for (verts, _) in &sink.submissions {
            assert_eq!(verts.len() % 3, 0);
            total += verts.len();
        }
        // Every appended vertex still reaches the sink exactly once.
        assert_eq!(total, 400 * 6);
    }

    #[test]
    fn filled_rect_corners_and_color() {
        let mut b = batcher();
        let mut sink = Recorder::default();
        b.set_color(Color::rgba(255, 0, 0, 255));

        b.filled_rect(Rect::new(0, 0, 10, 20), &mut sink);
        b.flush(&mut sink);

        let (verts, state) = &sink.submissions[0];
        assert_eq!(*state, DrawState::Solid);
        assert_eq!(verts.len(), 6);

        // Corner order TL, TR, BL, TR, BR, BL in toolkit coordinates,
        // recovered by undoing the device y flip.
        let corners: Vec<(f32, f32)> = verts
            .iter()
            .map(|v| (v.position[0], 240.0 - v.position[1]))
            .collect();
        assert_eq!(
            corners,
            vec![
                (0.0, 0.0),
                (10.0, 0.0),
                (0.0, 20.0),
                (10.0, 0.0),
                (10.0, 20.0),
                (0.0, 20.0),
            ]
        );

        for v in verts {
            assert_eq!(v.color, [1.0, 0.0, 0.0, 1.0]);
            assert_eq!(v.position[2], VERTEX_Z);
        }
    }

    #[test]
    fn batch_length_is_a_multiple_of_three_per_rect() {
        let mut b = batcher();
        let mut sink = Recorder::default();

        for i in 0..5 {
            b.filled_rect(Rect::new(i, i, 4, 4), &mut sink);
            assert_eq!(b.pending() % 3, 0);
        }
    }

    #[test]
    fn texture_switch_flushes_once_same_texture_flushes_zero() {
        let mut b = batcher();
        let mut sink = Recorder::default();
        let (a, c) = (TextureId(1), TextureId(2));
        let uv = (0.0, 0.0, 1.0, 1.0);

        b.textured_rect(a, Rect::new(0, 0, 8, 8), uv, &mut sink);
        // Nothing pending before the first textured draw, so binding A
        // submits nothing.
        assert!(sink.submissions.is_empty());

        b.textured_rect(a, Rect::new(8, 0, 8, 8), uv, &mut sink);
        assert!(sink.submissions.is_empty());
        assert_eq!(b.pending(), 12);

        b.textured_rect(c, Rect::new(16, 0, 8, 8), uv, &mut sink);
        assert_eq!(sink.submissions.len(), 1);
        assert_eq!(sink.submissions[0].1, DrawState::Textured(a));
        assert_eq!(sink.submissions[0].0.len(), 12);
        assert_eq!(b.pending(), 6);
    }

    #[test]
    fn solid_after_textured_flushes_with_textured_state() {
        let mut b = batcher();
        let mut sink = Recorder::default();
        let uv = (0.0, 0.0, 1.0, 1.0);

        b.textured_rect(TextureId(3), Rect::new(0, 0, 8, 8), uv, &mut sink);
        b.filled_rect(Rect::new(0, 0, 4, 4), &mut sink);

        assert_eq!(sink.submissions.len(), 1);
        assert_eq!(sink.submissions[0].1, DrawState::Textured(TextureId(3)));
        assert_eq!(b.state(), DrawState::Solid);
    }

    #[test]
    fn textured_rect_carries_supplied_uv_corners() {
        let mut b = batcher();
        let mut sink = Recorder::default();

        b.textured_rect(
            TextureId(1),
            Rect::new(0, 0, 8, 8),
            (0.25, 0.5, 0.75, 1.0),
            &mut sink,
        );
        b.flush(&mut sink);

        let uvs: Vec<[f32; 2]> = sink.submissions[0].0.iter().map(|v| v.uv).collect();
        assert_eq!(
            uvs,
            vec![
                [0.25, 0.5],
                [0.75, 0.5],
                [0.25, 1.0],
                [0.75, 0.5],
                [0.75, 1.0],
                [0.25, 1.0],
            ]
        );
    }

    #[test]
    fn flush_on_empty_batch_submits_nothing() {
        let mut b = batcher();
        let mut sink = Recorder::default();
        b.flush(&mut sink);
        assert!(sink.submissions.is_empty());
    }
}

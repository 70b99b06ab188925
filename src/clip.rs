//! Clip-rectangle coordinate conversion for scissor testing.
//!
//! The toolkit hands clip rects in top-left-origin logical coordinates.
//! GL-style devices scissor from the bottom-left, so the canonical device
//! form flips y against the viewport height; wgpu's scissor shares the
//! toolkit's top-left origin, so the call site uses the framebuffer form.
//! Both apply the device pixel scale and clamp to the viewport, since
//! out-of-bounds scissor rects fail wgpu validation.

use crate::types::Rect;

/// A scissor rectangle in physical pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scissor {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Scissor {
    /// The full-viewport scissor, equivalent to disabling the test.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            w: width,
            h: height,
        }
    }
}

/// Convert a toolkit clip rect to bottom-left-origin device coordinates,
/// scaled by the device pixel scale and clamped to the viewport.
pub fn device_scissor(rect: Rect, viewport_w: u32, viewport_h: u32, scale: f32) -> Scissor {
    let flipped = Rect {
        y: viewport_h as i32 - (rect.y + rect.h),
        ..rect
    };
    scale_and_clamp(flipped, viewport_w, viewport_h, scale)
}

/// Convert a toolkit clip rect to top-left-origin framebuffer coordinates,
/// the form `wgpu::RenderPass::set_scissor_rect` expects.
pub fn framebuffer_scissor(rect: Rect, viewport_w: u32, viewport_h: u32, scale: f32) -> Scissor {
    scale_and_clamp(rect, viewport_w, viewport_h, scale)
}

fn scale_and_clamp(rect: Rect, viewport_w: u32, viewport_h: u32, scale: f32) -> Scissor {
    let scaled_w = (viewport_w as f32 * scale) as i64;
    let scaled_h = (viewport_h as f32 * scale) as i64;

    let x0 = ((rect.x as f32 * scale) as i64).clamp(0, scaled_w);
    let y0 = ((rect.y as f32 * scale) as i64).clamp(0, scaled_h);
    let x1 = (((rect.x + rect.w) as f32 * scale) as i64).clamp(x0, scaled_w);
    let y1 = (((rect.y + rect.h) as f32 * scale) as i64).clamp(y0, scaled_h);

    Scissor {
        x: x0 as u32,
        y: y0 as u32,
        w: (x1 - x0) as u32,
        h: (y1 - y0) as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scissor_covers_the_framebuffer() {
        assert_eq!(Scissor::full(640, 480), Scissor { x: 0, y: 0, w: 640, h: 480 });
    }

    #[test]
    fn device_scissor_flips_y_against_viewport() {
        let s = device_scissor(Rect::new(10, 20, 100, 50), 640, 480, 1.0);
        // 480 - (20 + 50) = 410
        assert_eq!(s, Scissor { x: 10, y: 410, w: 100, h: 50 });
    }

    #[test]
    fn framebuffer_scissor_keeps_top_left_origin() {
        let s = framebuffer_scissor(Rect::new(10, 20, 100, 50), 640, 480, 1.0);
        assert_eq!(s, Scissor { x: 10, y: 20, w: 100, h: 50 });
    }

    #[test]
    fn device_and_framebuffer_forms_are_mirror_images() {
        let rect = Rect::new(8, 32, 64, 16);
        let dev = device_scissor(rect, 320, 240, 1.0);
        let fb = framebuffer_scissor(rect, 320, 240, 1.0);
        assert_eq!(dev.y, 240 - (fb.y + fb.h));
        assert_eq!((dev.x, dev.w, dev.h), (fb.x, fb.w, fb.h));
    }

    #[test]
    fn scale_applies_to_all_four_scalars() {
        let s = framebuffer_scissor(Rect::new(10, 20, 100, 50), 640, 480, 2.0);
        assert_eq!(s, Scissor { x: 20, y: 40, w: 200, h: 100 });
    }

    #[test]
    fn scissor_is_clamped_to_the_viewport() {
        let s = framebuffer_scissor(Rect::new(-20, 400, 1000, 1000), 640, 480, 1.0);
        assert_eq!(s, Scissor { x: 0, y: 400, w: 640, h: 80 });
    }

    #[test]
    fn fully_outside_rect_collapses_to_empty() {
        let s = framebuffer_scissor(Rect::new(700, 500, 10, 10), 640, 480, 1.0);
        assert_eq!(s.w, 0);
        assert_eq!(s.h, 0);
    }
}

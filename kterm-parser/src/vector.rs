//! Vector drawing primitives shared by the ReGIS and Tektronix decoders
//!
//! Decoders emit [`Segment`]s in their own canvas coordinates; the consumer
//! maps them into unit UV space through a [`Letterbox`] matching the
//! viewport aspect ratio.

use kterm_core::Rgb;

/// How a primitive combines with what is already drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Draw on top (ReGIS `V`)
    #[default]
    Overlay,
    /// Replace the pattern cell (`R`)
    Replace,
    /// Draw in the background color (`E`)
    Erase,
    /// XOR with existing pixels (`C`)
    Complement,
}

/// Fixed drawing surface of a graphics protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    /// Origin in the bottom-left corner (Tektronix) instead of top-left
    pub y_up: bool,
}

impl Canvas {
    /// 800x480 ReGIS screen, origin top-left
    pub const REGIS: Canvas = Canvas {
        width: 800,
        height: 480,
        y_up: false,
    };

    /// 4096x3120 Tektronix 4014 addressable space, origin bottom-left
    pub const TEKTRONIX: Canvas = Canvas {
        width: 4096,
        height: 3120,
        y_up: true,
    };

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Clamp a point into the canvas
    pub fn clamp(&self, x: i32, y: i32) -> (i32, i32) {
        (
            x.clamp(0, self.width as i32 - 1),
            y.clamp(0, self.height as i32 - 1),
        )
    }
}

/// A line between two canvas points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
    pub color: Rgb,
    pub mode: WriteMode,
}

/// A line in UV space handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorLine {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    /// 0xRRGGBBAA
    pub color_rgba: u32,
    pub mode: WriteMode,
}

/// Aspect-preserving canvas to UV transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Viewport width / height
    pub viewport_aspect: f32,
}

impl Letterbox {
    pub fn new(viewport_aspect: f32) -> Self {
        let viewport_aspect = if viewport_aspect.is_finite() && viewport_aspect > 0.0 {
            viewport_aspect
        } else {
            Canvas::REGIS.aspect()
        };
        Self { viewport_aspect }
    }

    /// Map a canvas point to UV, centering the canvas with bars on the long axis
    pub fn map(&self, canvas: &Canvas, x: i32, y: i32) -> (f32, f32) {
        let (x, y) = canvas.clamp(x, y);
        let mut u = x as f32 / (canvas.width - 1) as f32;
        let mut v = y as f32 / (canvas.height - 1) as f32;
        if canvas.y_up {
            v = 1.0 - v;
        }
        let canvas_aspect = canvas.aspect();
        if self.viewport_aspect > canvas_aspect {
            let scale = canvas_aspect / self.viewport_aspect;
            u = (1.0 - scale) / 2.0 + u * scale;
        } else if self.viewport_aspect < canvas_aspect {
            let scale = self.viewport_aspect / canvas_aspect;
            v = (1.0 - scale) / 2.0 + v * scale;
        }
        (u, v)
    }

    pub fn line(&self, canvas: &Canvas, seg: &Segment) -> VectorLine {
        let (x0, y0) = self.map(canvas, seg.x0, seg.y0);
        let (x1, y1) = self.map(canvas, seg.x1, seg.y1);
        VectorLine {
            x0,
            y0,
            x1,
            y1,
            color_rgba: seg.color.packed(),
            mode: seg.mode,
        }
    }
}

impl Default for Letterbox {
    fn default() -> Self {
        Self::new(Canvas::REGIS.aspect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_when_aspect_matches() {
        let lb = Letterbox::default();
        assert_eq!(lb.map(&Canvas::REGIS, 0, 0), (0.0, 0.0));
        assert_eq!(lb.map(&Canvas::REGIS, 799, 479), (1.0, 1.0));
    }

    #[test]
    fn test_pillarbox_on_wide_viewport() {
        let lb = Letterbox::new(Canvas::REGIS.aspect() * 2.0);
        let (u0, _) = lb.map(&Canvas::REGIS, 0, 0);
        let (u1, _) = lb.map(&Canvas::REGIS, 799, 0);
        assert!((u0 - 0.25).abs() < 1e-5);
        assert!((u1 - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_tektronix_y_flipped() {
        let lb = Letterbox::new(Canvas::TEKTRONIX.aspect());
        let (_, v) = lb.map(&Canvas::TEKTRONIX, 0, 0);
        assert_eq!(v, 1.0);
    }

    #[test]
    fn test_points_clamped() {
        let lb = Letterbox::default();
        assert_eq!(lb.map(&Canvas::REGIS, -50, 9000), (0.0, 1.0));
    }
}

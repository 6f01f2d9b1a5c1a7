//! Graphics produced by a session
//!
//! ReGIS, Tektronix and sixel output is collected per kind into an outbox.
//! The terminal routes each outbox to the session currently targeted for
//! that kind (normally the producing session) where it lands in the
//! [`GraphicsLayer`] a renderer reads.

use kterm_parser::{Canvas, Letterbox, RegisOutput, Segment, SixelImage, TekEvent, VectorLine};
use serde::Serialize;

/// Graphics sub-protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GraphicsKind {
    Regis,
    Tektronix,
    Sixel,
}

impl GraphicsKind {
    pub const ALL: [GraphicsKind; 3] = [GraphicsKind::Regis, GraphicsKind::Tektronix, GraphicsKind::Sixel];

    fn index(self) -> usize {
        self as usize
    }
}

/// Text drawn by a vector protocol, positioned in UV space
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorText {
    pub x: f32,
    pub y: f32,
    pub text: String,
    /// 0xRRGGBBAA
    pub color_rgba: u32,
    pub size: u8,
}

/// A decoded sixel image anchored at the cursor cell it was received at
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedSixel {
    pub col: usize,
    pub row: usize,
    pub image: SixelImage,
}

/// Lines and text of one vector protocol
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorLayer {
    pub lines: Vec<VectorLine>,
    pub texts: Vec<VectorText>,
}

impl VectorLayer {
    pub fn clear(&mut self) {
        self.lines.clear();
        self.texts.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.texts.is_empty()
    }
}

/// Output of one kind not yet delivered to its target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphicsBatch {
    /// The target layer is erased before the rest is applied
    pub cleared: bool,
    pub lines: Vec<VectorLine>,
    pub texts: Vec<VectorText>,
    pub images: Vec<PlacedSixel>,
}

impl GraphicsBatch {
    pub fn is_empty(&self) -> bool {
        !self.cleared && self.lines.is_empty() && self.texts.is_empty() && self.images.is_empty()
    }

    fn clear_target(&mut self) {
        self.cleared = true;
        self.lines.clear();
        self.texts.clear();
        self.images.clear();
    }
}

/// Everything a renderer draws on top of the cell grid
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphicsLayer {
    pub regis: VectorLayer,
    pub tektronix: VectorLayer,
    pub sixels: Vec<PlacedSixel>,
}

impl GraphicsLayer {
    /// Apply a routed batch
    pub fn apply(&mut self, kind: GraphicsKind, batch: GraphicsBatch) {
        match kind {
            GraphicsKind::Regis | GraphicsKind::Tektronix => {
                let layer = if kind == GraphicsKind::Regis {
                    &mut self.regis
                } else {
                    &mut self.tektronix
                };
                if batch.cleared {
                    layer.clear();
                }
                layer.lines.extend(batch.lines);
                layer.texts.extend(batch.texts);
            }
            GraphicsKind::Sixel => {
                if batch.cleared {
                    self.sixels.clear();
                }
                self.sixels.extend(batch.images);
            }
        }
    }

    pub fn clear(&mut self, kind: GraphicsKind) {
        match kind {
            GraphicsKind::Regis => self.regis.clear(),
            GraphicsKind::Tektronix => self.tektronix.clear(),
            GraphicsKind::Sixel => self.sixels.clear(),
        }
    }

    pub fn clear_all(&mut self) {
        for kind in GraphicsKind::ALL {
            self.clear(kind);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.regis.is_empty() && self.tektronix.is_empty() && self.sixels.is_empty()
    }
}

/// Outbox plus the transform into UV space
#[derive(Debug, Clone)]
pub struct GraphicsState {
    letterbox: Letterbox,
    outbox: [GraphicsBatch; 3],
    pub layer: GraphicsLayer,
}

impl GraphicsState {
    pub fn new(viewport_aspect: f32) -> Self {
        Self {
            letterbox: Letterbox::new(viewport_aspect),
            outbox: Default::default(),
            layer: GraphicsLayer::default(),
        }
    }

    pub fn set_viewport_aspect(&mut self, aspect: f32) {
        self.letterbox = Letterbox::new(aspect);
    }

    fn batch(&mut self, kind: GraphicsKind) -> &mut GraphicsBatch {
        &mut self.outbox[kind.index()]
    }

    fn push_segment(&mut self, kind: GraphicsKind, canvas: &Canvas, seg: &Segment) {
        let line = self.letterbox.line(canvas, seg);
        self.batch(kind).lines.push(line);
    }

    /// Queue the primitives of one ReGIS payload
    pub fn push_regis(&mut self, output: &RegisOutput) {
        let canvas = Canvas::REGIS;
        if output.erase {
            self.batch(GraphicsKind::Regis).clear_target();
        }
        for seg in &output.segments {
            self.push_segment(GraphicsKind::Regis, &canvas, seg);
        }
        for text in &output.texts {
            let (x, y) = self.letterbox.map(&canvas, text.x, text.y);
            self.batch(GraphicsKind::Regis).texts.push(VectorText {
                x,
                y,
                text: text.text.clone(),
                color_rgba: text.color.packed(),
                size: text.size,
            });
        }
    }

    /// Queue one Tektronix event
    pub fn push_tek(&mut self, event: &TekEvent) {
        let canvas = Canvas::TEKTRONIX;
        match event {
            TekEvent::Line(seg) => self.push_segment(GraphicsKind::Tektronix, &canvas, seg),
            TekEvent::Text { ch, x, y } => {
                let (u, v) = self.letterbox.map(&canvas, *x, *y);
                self.batch(GraphicsKind::Tektronix).texts.push(VectorText {
                    x: u,
                    y: v,
                    text: ch.to_string(),
                    color_rgba: kterm_core::Rgb::new(0, 255, 0).packed(),
                    size: 1,
                });
            }
            TekEvent::Clear => self.batch(GraphicsKind::Tektronix).clear_target(),
        }
    }

    pub fn push_sixel(&mut self, col: usize, row: usize, image: SixelImage) {
        self.batch(GraphicsKind::Sixel)
            .images
            .push(PlacedSixel { col, row, image });
    }

    /// Queue an erase of the target layer
    pub fn push_clear(&mut self, kind: GraphicsKind) {
        self.batch(kind).clear_target();
    }

    /// Take the undelivered output of one kind
    pub fn take_outbox(&mut self, kind: GraphicsKind) -> GraphicsBatch {
        std::mem::take(self.batch(kind))
    }

    pub fn has_outbox(&self) -> bool {
        self.outbox.iter().any(|b| !b.is_empty())
    }

    /// Deliver every outbox to this session's own layer
    pub fn deliver_local(&mut self) {
        for kind in GraphicsKind::ALL {
            let batch = self.take_outbox(kind);
            if !batch.is_empty() {
                self.layer.apply(kind, batch);
            }
        }
    }

    /// Drop everything, queued or delivered
    pub fn reset(&mut self) {
        self.outbox = Default::default();
        self.layer.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kterm_parser::RegisInterpreter;

    #[test]
    fn test_regis_lines_are_letterboxed() {
        let mut state = GraphicsState::new(Canvas::REGIS.aspect());
        let mut regis = RegisInterpreter::new();
        state.push_regis(&regis.execute(b"P[0,0]V[799,479]"));
        state.deliver_local();
        assert_eq!(state.layer.regis.lines.len(), 1);
        let line = state.layer.regis.lines[0];
        assert_eq!((line.x0, line.y0), (0.0, 0.0));
        assert_eq!((line.x1, line.y1), (1.0, 1.0));
    }

    #[test]
    fn test_clear_batch_erases_before_applying() {
        let mut state = GraphicsState::new(1.0);
        let mut regis = RegisInterpreter::new();
        state.push_regis(&regis.execute(b"P[0,0]V[10,0]"));
        state.deliver_local();
        state.push_regis(&regis.execute(b"S(E)V[20,0]"));
        state.deliver_local();
        assert_eq!(state.layer.regis.lines.len(), 1);
    }

    #[test]
    fn test_tek_clear_and_text() {
        let mut state = GraphicsState::new(1.0);
        state.push_tek(&TekEvent::Text { ch: 'A', x: 0, y: 0 });
        state.deliver_local();
        assert_eq!(state.layer.tektronix.texts.len(), 1);
        state.push_tek(&TekEvent::Clear);
        assert!(state.has_outbox());
        state.deliver_local();
        assert!(state.layer.tektronix.is_empty());
    }

    #[test]
    fn test_outbox_can_be_routed_elsewhere() {
        let mut producer = GraphicsState::new(1.0);
        let mut consumer = GraphicsLayer::default();
        producer.push_tek(&TekEvent::Text { ch: 'x', x: 10, y: 10 });
        let batch = producer.take_outbox(GraphicsKind::Tektronix);
        consumer.apply(GraphicsKind::Tektronix, batch);
        producer.deliver_local();
        assert!(producer.layer.is_empty());
        assert_eq!(consumer.tektronix.texts[0].text, "x");
    }
}

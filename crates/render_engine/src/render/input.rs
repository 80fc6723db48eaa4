//! Pointer-drag and key-toggle state read by the uniform path
//!
//! Cursor positions are normalized against the shorter framebuffer side so a
//! drag across the full square maps to a delta of 2.0.

use super::lighting::LightingFeatures;

/// Which accumulator a mouse button drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    /// Left button: moves the model
    Translate,
    /// Right button: spins the model
    Rotate,
}

/// Accumulated drag deltas and lighting toggles
#[derive(Debug, Clone, PartialEq)]
pub struct InputState {
    translate: [f32; 2],
    rotate: [f32; 2],
    last_translate: [f32; 2],
    last_rotate: [f32; 2],
    features: LightingFeatures,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            translate: [0.0; 2],
            rotate: [0.0; 2],
            last_translate: [0.0; 2],
            last_rotate: [0.0; 2],
            features: LightingFeatures::all(),
        }
    }
}

impl InputState {
    /// Map a cursor position to the centered [-1, 1] square
    pub fn normalize_cursor(x: f64, y: f64, framebuffer: (u32, u32)) -> [f32; 2] {
        let size = f64::from(framebuffer.0.min(framebuffer.1).max(1));
        [((2.0 * x - size) / size) as f32, ((size - 2.0 * y) / size) as f32]
    }

    /// A drag button went down at `cursor` (normalized)
    pub fn press(&mut self, kind: DragKind, cursor: [f32; 2]) {
        match kind {
            DragKind::Translate => self.last_translate = cursor,
            DragKind::Rotate => self.last_rotate = cursor,
        }
    }

    /// A drag button came up at `cursor`; the delta since the press is accumulated
    pub fn release(&mut self, kind: DragKind, cursor: [f32; 2]) {
        let (total, last) = match kind {
            DragKind::Translate => (&mut self.translate, &mut self.last_translate),
            DragKind::Rotate => (&mut self.rotate, &mut self.last_rotate),
        };
        total[0] += cursor[0] - last[0];
        total[1] += cursor[1] - last[1];
        *last = cursor;
    }

    /// Flip one lighting term
    pub fn toggle(&mut self, feature: LightingFeatures) {
        self.features.toggle(feature);
        log::debug!("Lighting features now {:?}", self.features);
    }

    /// Accumulated translate delta (x, y)
    pub fn translation(&self) -> [f32; 2] {
        self.translate
    }

    /// Accumulated rotate delta (x, y)
    pub fn rotation(&self) -> [f32; 2] {
        self.rotate
    }

    /// Currently enabled lighting terms
    pub fn features(&self) -> LightingFeatures {
        self.features
    }
}

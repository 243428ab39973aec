use std::collections::VecDeque;

use crate::canvas::{LayerKind, MaskLayer, RasterSurface};

/// Number of undo steps kept per layer.
pub const UNDO_CAPACITY: usize = 10;

// ============================================================================
// LAYER SNAPSHOT
// ============================================================================

/// Immutable copy of one mask layer at a point in time.
///
/// Cheap to take: `MaskLayer` chunks are shared copy-on-write, so only the
/// chunks touched after the capture end up duplicated.
pub struct LayerSnapshot {
    layer: LayerKind,
    pixels: MaskLayer,
}

impl LayerSnapshot {
    pub fn capture(surface: &RasterSurface, layer: LayerKind) -> Self {
        Self {
            layer,
            pixels: surface.export_mask(layer),
        }
    }

    pub fn layer(&self) -> LayerKind {
        self.layer
    }

    pub fn pixels(&self) -> &MaskLayer {
        &self.pixels
    }

    /// Put the captured pixels back. Consumes the snapshot.
    pub fn restore(self, surface: &mut RasterSurface) {
        surface.load_mask(self.layer, self.pixels);
    }
}

// ============================================================================
// UNDO STACK
// ============================================================================

/// Bounded LIFO of snapshots. Pushing past capacity evicts the oldest entry.
/// There is no redo: popped snapshots are gone.
pub struct UndoStack {
    entries: VecDeque<LayerSnapshot>,
    capacity: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(UNDO_CAPACITY)
    }
}

impl UndoStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, snapshot: LayerSnapshot) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    pub fn pop(&mut self) -> Option<LayerSnapshot> {
        self.entries.pop_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// HISTORY MANAGER – one stack per layer
// ============================================================================

/// Undo history of an open orthoframe. Each layer keeps its own stack so that
/// switching paint mode never interleaves the two histories.
#[derive(Default)]
pub struct HistoryManager {
    defect: UndoStack,
    mask: UndoStack,
}

impl HistoryManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            defect: UndoStack::new(capacity),
            mask: UndoStack::new(capacity),
        }
    }

    pub fn stack(&self, layer: LayerKind) -> &UndoStack {
        match layer {
            LayerKind::Defect => &self.defect,
            LayerKind::Mask => &self.mask,
        }
    }

    fn stack_mut(&mut self, layer: LayerKind) -> &mut UndoStack {
        match layer {
            LayerKind::Defect => &mut self.defect,
            LayerKind::Mask => &mut self.mask,
        }
    }

    /// File a snapshot under the layer it was taken from.
    pub fn push(&mut self, snapshot: LayerSnapshot) {
        self.stack_mut(snapshot.layer()).push(snapshot);
    }

    /// Restore the most recent snapshot of `layer`. Returns false when its
    /// history is empty.
    pub fn undo(&mut self, layer: LayerKind, surface: &mut RasterSurface) -> bool {
        match self.stack_mut(layer).pop() {
            Some(snapshot) => {
                snapshot.restore(surface);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self, layer: LayerKind) -> bool {
        !self.stack(layer).is_empty()
    }

    pub fn undo_count(&self, layer: LayerKind) -> usize {
        self.stack(layer).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{MARK_COLOR_DEFECT, MARK_COLOR_MASK};
    use image::RgbaImage;

    /// Paints pixel (i, 0) after snapshotting, so snapshot `i` holds `i` painted pixels.
    fn painted_history(pushes: u32) -> (RasterSurface, UndoStack) {
        let mut surface = RasterSurface::new(RgbaImage::new(32, 1));
        let mut stack = UndoStack::default();
        for i in 0..pushes {
            stack.push(LayerSnapshot::capture(&surface, LayerKind::Defect));
            surface.set_pixel(LayerKind::Defect, i, 0, MARK_COLOR_DEFECT);
        }
        (surface, stack)
    }

    #[test]
    fn pops_in_reverse_push_order() {
        let (_, mut stack) = painted_history(7);
        for expected in (0..7).rev() {
            let snap = stack.pop().unwrap();
            assert_eq!(snap.pixels().painted_count(), expected);
        }
        assert!(stack.pop().is_none());
    }

    #[test]
    fn only_the_last_ten_survive() {
        let (_, mut stack) = painted_history(13);
        assert_eq!(stack.len(), UNDO_CAPACITY);
        let mut counts = Vec::new();
        while let Some(snap) = stack.pop() {
            counts.push(snap.pixels().painted_count());
        }
        assert_eq!(counts, (3..13).rev().collect::<Vec<_>>());
    }

    #[test]
    fn empty_pop_is_a_no_op() {
        let mut stack = UndoStack::default();
        assert!(stack.pop().is_none());
        let mut history = HistoryManager::default();
        let mut surface = RasterSurface::new(RgbaImage::new(2, 2));
        assert!(!history.undo(LayerKind::Mask, &mut surface));
    }

    #[test]
    fn histories_are_kept_per_layer() {
        let mut surface = RasterSurface::new(RgbaImage::new(4, 4));
        let mut history = HistoryManager::default();

        history.push(LayerSnapshot::capture(&surface, LayerKind::Defect));
        surface.set_pixel(LayerKind::Defect, 0, 0, MARK_COLOR_DEFECT);
        history.push(LayerSnapshot::capture(&surface, LayerKind::Mask));
        surface.set_pixel(LayerKind::Mask, 1, 1, MARK_COLOR_MASK);

        assert!(history.undo(LayerKind::Defect, &mut surface));
        assert!(!surface.layer(LayerKind::Defect).is_painted(0, 0));
        assert!(surface.layer(LayerKind::Mask).is_painted(1, 1));
        assert!(!history.can_undo(LayerKind::Defect));
        assert_eq!(history.undo_count(LayerKind::Mask), 1);
    }
}

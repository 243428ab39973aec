use std::sync::Arc;
use eframe::egui;
use egui::Pos2;
use image::{GrayImage, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::view::ViewTransform;

// ============================================================================
// PAINT COLORS
// ============================================================================

/// Paved-area corrections (red, semi-transparent).
pub const MARK_COLOR_MASK: Rgba<u8> = Rgba([255, 0, 0, 99]);
/// Defect annotations (blue, semi-transparent).
pub const MARK_COLOR_DEFECT: Rgba<u8> = Rgba([0, 0, 255, 99]);
/// Value of an unpainted mask pixel.
pub const UNPAINTED: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// The two annotation layers stacked over the base orthoframe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Pavement defects (drawn on top).
    Defect,
    /// Paved-area corrections.
    Mask,
}

impl LayerKind {
    pub fn all() -> [LayerKind; 2] {
        [LayerKind::Defect, LayerKind::Mask]
    }

    /// Fixed paint color of the layer.
    pub fn color(self) -> Rgba<u8> {
        match self {
            LayerKind::Defect => MARK_COLOR_DEFECT,
            LayerKind::Mask => MARK_COLOR_MASK,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LayerKind::Defect => "defect",
            LayerKind::Mask => "mask",
        }
    }
}

// ============================================================================
// MASK LAYER – sparse 64×64 chunk storage
// ============================================================================

pub const CHUNK_SIZE: u32 = 64;

/// Sparse tiled RGBA layer backed by a flat `Vec<Option<Arc<RgbaImage>>>`.
/// Chunk coordinates are mapped to a flat index via `cy * chunks_per_row + cx`.
///
/// Chunks are wrapped in `Arc` for copy-on-write semantics: `clone()` only
/// bumps reference counts, and `put_pixel` uses `Arc::make_mut` to clone only
/// the touched chunk. Undo snapshots are plain clones of a layer.
#[derive(Clone)]
pub struct MaskLayer {
    width: u32,
    height: u32,
    chunks_per_row: u32,
    chunks: Vec<Option<Arc<RgbaImage>>>,
}

impl MaskLayer {
    // ---- construction -------------------------------------------------------

    /// Create a blank (fully unpainted) layer.
    pub fn new(width: u32, height: u32) -> Self {
        let chunks_per_row = width.div_ceil(CHUNK_SIZE);
        let chunks_per_col = height.div_ceil(CHUNK_SIZE);
        let total = (chunks_per_row * chunks_per_col) as usize;
        Self {
            width,
            height,
            chunks_per_row,
            chunks: vec![None; total],
        }
    }

    /// Build a layer from a grayscale mask: every pixel for which `painted`
    /// returns true gets `color`. Chunk conversion is parallelised with rayon.
    pub fn from_gray<F>(src: &GrayImage, color: Rgba<u8>, painted: F) -> Self
    where
        F: Fn(u8) -> bool + Sync,
    {
        let width = src.width();
        let height = src.height();
        let mut layer = Self::new(width, height);

        let chunks_x = layer.chunks_per_row as usize;
        let total_chunks = layer.chunks.len();
        let src_raw = src.as_raw();

        let chunk_results: Vec<(usize, Option<Arc<RgbaImage>>)> = (0..total_chunks)
            .into_par_iter()
            .map(|flat| {
                let base_x = (flat % chunks_x) as u32 * CHUNK_SIZE;
                let base_y = (flat / chunks_x) as u32 * CHUNK_SIZE;
                let cw = CHUNK_SIZE.min(width - base_x);
                let ch = CHUNK_SIZE.min(height - base_y);

                let mut chunk = RgbaImage::new(CHUNK_SIZE, CHUNK_SIZE);
                let mut has_content = false;
                for ly in 0..ch {
                    let row = ((base_y + ly) * width + base_x) as usize;
                    for lx in 0..cw {
                        if painted(src_raw[row + lx as usize]) {
                            chunk.put_pixel(lx, ly, color);
                            has_content = true;
                        }
                    }
                }
                (flat, has_content.then(|| Arc::new(chunk)))
            })
            .collect();

        for (idx, chunk) in chunk_results {
            layer.chunks[idx] = chunk;
        }
        layer
    }

    // ---- indexing helpers ----------------------------------------------------

    #[inline(always)]
    fn flat_index(&self, x: u32, y: u32) -> usize {
        ((y / CHUNK_SIZE) * self.chunks_per_row + x / CHUNK_SIZE) as usize
    }

    #[inline(always)]
    fn local(x: u32, y: u32) -> (u32, u32) {
        (x % CHUNK_SIZE, y % CHUNK_SIZE)
    }

    // ---- pixel access -------------------------------------------------------

    /// Read a pixel. Out-of-range coordinates and missing chunks read as unpainted.
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        if x >= self.width || y >= self.height {
            return UNPAINTED;
        }
        let (lx, ly) = Self::local(x, y);
        self.chunks[self.flat_index(x, y)]
            .as_ref()
            .map(|c| *c.get_pixel(lx, ly))
            .unwrap_or(UNPAINTED)
    }

    /// Write a pixel. Returns `true` when the stored value changed.
    /// Out-of-range writes are ignored.
    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) -> bool {
        if x >= self.width || y >= self.height || self.get_pixel(x, y) == pixel {
            return false;
        }
        let (lx, ly) = Self::local(x, y);
        let idx = self.flat_index(x, y);
        let arc = self.chunks[idx]
            .get_or_insert_with(|| Arc::new(RgbaImage::new(CHUNK_SIZE, CHUNK_SIZE)));
        Arc::make_mut(arc).put_pixel(lx, ly, pixel);
        true
    }

    #[inline]
    pub fn is_painted(&self, x: u32, y: u32) -> bool {
        self.get_pixel(x, y)[3] != 0
    }

    /// Number of painted pixels.
    pub fn painted_count(&self) -> usize {
        self.chunks
            .par_iter()
            .filter_map(|slot| slot.as_ref())
            .map(|c| c.pixels().filter(|p| p[3] != 0).count())
            .sum()
    }

    /// Grayscale export: `on` where painted, `off` elsewhere.
    pub fn to_gray(&self, on: u8, off: u8) -> GrayImage {
        let width = self.width as usize;
        let mut out = GrayImage::from_pixel(self.width, self.height, image::Luma([off]));
        if width == 0 {
            return out;
        }
        out.as_mut()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, value) in row.iter_mut().enumerate() {
                    if self.is_painted(x as u32, y as u32) {
                        *value = on;
                    }
                }
            });
        out
    }

    pub fn width(&self) -> u32 { self.width }

    pub fn height(&self) -> u32 { self.height }
}

// ============================================================================
// RASTER SURFACE
// ============================================================================

/// Base orthoframe plus the defect and paved-area layers painted over it.
///
/// Every layer mutation bumps that layer's generation counter; the renderer
/// re-uploads the overlay when the sum changes.
pub struct RasterSurface {
    base: RgbaImage,
    defect: MaskLayer,
    mask: MaskLayer,
    defect_generation: u64,
    mask_generation: u64,
}

impl RasterSurface {
    /// New surface with blank layers sized to `base`.
    pub fn new(base: RgbaImage) -> Self {
        let (w, h) = base.dimensions();
        Self {
            base,
            defect: MaskLayer::new(w, h),
            mask: MaskLayer::new(w, h),
            defect_generation: 0,
            mask_generation: 0,
        }
    }

    pub fn width(&self) -> u32 { self.base.width() }

    pub fn height(&self) -> u32 { self.base.height() }

    pub fn base(&self) -> &RgbaImage {
        &self.base
    }

    pub fn layer(&self, kind: LayerKind) -> &MaskLayer {
        match kind {
            LayerKind::Defect => &self.defect,
            LayerKind::Mask => &self.mask,
        }
    }

    fn layer_mut(&mut self, kind: LayerKind) -> &mut MaskLayer {
        match kind {
            LayerKind::Defect => &mut self.defect,
            LayerKind::Mask => &mut self.mask,
        }
    }

    fn bump(&mut self, kind: LayerKind) {
        match kind {
            LayerKind::Defect => self.defect_generation += 1,
            LayerKind::Mask => self.mask_generation += 1,
        }
    }

    pub fn generation(&self, kind: LayerKind) -> u64 {
        match kind {
            LayerKind::Defect => self.defect_generation,
            LayerKind::Mask => self.mask_generation,
        }
    }

    /// Combined generation of both layers (for texture invalidation).
    pub fn overlay_generation(&self) -> u64 {
        self.defect_generation + self.mask_generation
    }

    #[inline]
    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width() as i64 && y < self.height() as i64
    }

    pub fn get_pixel(&self, kind: LayerKind, x: u32, y: u32) -> Rgba<u8> {
        self.layer(kind).get_pixel(x, y)
    }

    /// Write one pixel; silently clipped outside the image. Returns whether it changed.
    pub fn set_pixel(&mut self, kind: LayerKind, x: u32, y: u32, color: Rgba<u8>) -> bool {
        let changed = self.layer_mut(kind).put_pixel(x, y, color);
        if changed {
            self.bump(kind);
        }
        changed
    }

    /// Clear every layer at (x, y). Returns whether any layer changed.
    pub fn erase_all(&mut self, x: u32, y: u32) -> bool {
        let mut changed = false;
        for kind in LayerKind::all() {
            changed |= self.set_pixel(kind, x, y, UNPAINTED);
        }
        changed
    }

    /// Replace a layer wholesale. Layers of the wrong size are rejected.
    pub fn load_mask(&mut self, kind: LayerKind, layer: MaskLayer) -> bool {
        if layer.width() != self.width() || layer.height() != self.height() {
            crate::log_warn!(
                "Rejected {} layer of {}x{} for a {}x{} image",
                kind.label(),
                layer.width(),
                layer.height(),
                self.width(),
                self.height()
            );
            return false;
        }
        *self.layer_mut(kind) = layer;
        self.bump(kind);
        true
    }

    /// Copy of a layer's current pixels (copy-on-write, cheap).
    pub fn export_mask(&self, kind: LayerKind) -> MaskLayer {
        self.layer(kind).clone()
    }

    /// Flatten both layers (defect over mask) into one RGBA overlay.
    pub fn composite_overlay(&self) -> RgbaImage {
        let width = self.width() as usize;
        let mut out = RgbaImage::new(self.width(), self.height());
        if width == 0 {
            return out;
        }
        out.as_mut()
            .par_chunks_mut(width * 4)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let (x, y) = (x as u32, y as u32);
                    let top = self.defect.get_pixel(x, y);
                    let value = if top[3] != 0 { top } else { self.mask.get_pixel(x, y) };
                    px.copy_from_slice(&value.0);
                }
            });
        out
    }
}

// ============================================================================
// CANVAS – surface + view
// ============================================================================

/// What the annotator draws on: the pixels and the way they are looked at.
pub struct Canvas {
    pub surface: RasterSurface,
    pub view: ViewTransform,
}

impl Canvas {
    pub fn new(surface: RasterSurface) -> Self {
        let view = ViewTransform::new(surface.width(), surface.height());
        Self { surface, view }
    }

    /// Viewport point to fractional image coordinates (may lie outside the image).
    pub fn to_image(&self, viewport: Pos2) -> Pos2 {
        self.view.to_image(viewport)
    }

    /// Viewport point to the integer pixel under it, if inside the image.
    pub fn pixel_at(&self, viewport: Pos2) -> Option<(u32, u32)> {
        let p = self.view.to_image(viewport);
        let (x, y) = (p.x.floor() as i64, p.y.floor() as i64);
        self.surface
            .in_bounds(x, y)
            .then_some((x as u32, y as u32))
    }
}

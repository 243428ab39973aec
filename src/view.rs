use eframe::egui;
use egui::{Pos2, Rect, Vec2};

/// Largest magnification (image pixels rendered this many viewport pixels wide).
pub const MAX_ZOOM: f32 = 64.0;
/// Zoom step applied per scroll-up notch.
pub const ZOOM_STEP: f32 = 1.25;

/// Zoom level and pan offset of the annotation viewport.
///
/// Mapping: `viewport = image * zoom + pan`. The pan offset is the viewport
/// position of the image origin. The smallest zoom is the fit-to-window level.
#[derive(Clone, Debug)]
pub struct ViewTransform {
    zoom: f32,
    pan: Vec2,
    viewport: Vec2,
    image_size: Vec2,
}

impl ViewTransform {
    pub fn new(image_width: u32, image_height: u32) -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
            viewport: Vec2::ZERO,
            image_size: Vec2::new(image_width as f32, image_height as f32),
        }
    }

    pub fn zoom_level(&self) -> f32 {
        self.zoom
    }

    pub fn pan_offset(&self) -> Vec2 {
        self.pan
    }

    /// Zoom at which the whole image fits the viewport (aspect preserved).
    pub fn fit_zoom(&self) -> f32 {
        if self.viewport.x <= 0.0 || self.viewport.y <= 0.0 {
            return 1.0;
        }
        let w = self.image_size.x.max(1.0);
        let h = self.image_size.y.max(1.0);
        (self.viewport.x / w).min(self.viewport.y / h)
    }

    fn max_zoom(&self) -> f32 {
        MAX_ZOOM.max(self.fit_zoom())
    }

    /// True once zoomed past the fit level; panning only applies then.
    pub fn is_zoomed_in(&self) -> bool {
        self.zoom > self.fit_zoom() * (1.0 + 1e-4)
    }

    /// Track the widget size. Stays at fit if it was at fit, otherwise keeps
    /// the zoom and re-clamps the pan.
    pub fn set_viewport_size(&mut self, size: Vec2) {
        if size == self.viewport {
            return;
        }
        let was_fit = !self.is_zoomed_in();
        self.viewport = size;
        if was_fit {
            self.reset_to_fit();
        } else {
            self.zoom = self.zoom.max(self.fit_zoom());
            self.clamp_pan();
        }
    }

    /// Show the entire image, centred.
    pub fn reset_to_fit(&mut self) {
        self.zoom = self.fit_zoom();
        self.pan = (self.viewport - self.image_size * self.zoom) * 0.5;
    }

    pub fn to_image(&self, viewport: Pos2) -> Pos2 {
        ((viewport.to_vec2() - self.pan) / self.zoom).to_pos2()
    }

    pub fn to_viewport(&self, image: Pos2) -> Pos2 {
        (image.to_vec2() * self.zoom + self.pan).to_pos2()
    }

    /// Multiply the zoom by `factor` keeping the image point under `anchor`
    /// (a viewport point) fixed.
    pub fn zoom(&mut self, factor: f32, anchor: Pos2) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let old = self.zoom;
        self.zoom = (self.zoom * factor).clamp(self.fit_zoom(), self.max_zoom());
        let actual = self.zoom / old;
        self.pan = anchor.to_vec2() - (anchor.to_vec2() - self.pan) * actual;
        if !self.is_zoomed_in() {
            self.reset_to_fit();
        }
    }

    /// Zoom so that `rect` (image coordinates) fills the viewport, centred.
    pub fn zoom_to_rect(&mut self, rect: Rect) {
        let rect = rect.intersect(Rect::from_min_size(Pos2::ZERO, self.image_size));
        if rect.width() < 1.0 || rect.height() < 1.0 || self.viewport.x <= 0.0 || self.viewport.y <= 0.0 {
            return;
        }
        let zoom = (self.viewport.x / rect.width()).min(self.viewport.y / rect.height());
        self.zoom = zoom.clamp(self.fit_zoom(), self.max_zoom());
        self.pan = self.viewport * 0.5 - rect.center().to_vec2() * self.zoom;
        self.clamp_pan();
    }

    /// Move the image by a viewport-space delta. No-op at fit scale.
    pub fn pan(&mut self, delta: Vec2) {
        if !self.is_zoomed_in() {
            return;
        }
        self.pan += delta;
        self.clamp_pan();
    }

    /// Keep the image covering the viewport on axes where it is larger,
    /// centred on axes where it is smaller.
    fn clamp_pan(&mut self) {
        let scaled = self.image_size * self.zoom;
        self.pan.x = clamp_axis(self.pan.x, scaled.x, self.viewport.x);
        self.pan.y = clamp_axis(self.pan.y, scaled.y, self.viewport.y);
    }

    /// Where the image lands in the viewport.
    pub fn image_rect_in_viewport(&self) -> Rect {
        Rect::from_min_size(self.pan.to_pos2(), self.image_size * self.zoom)
    }
}

fn clamp_axis(pan: f32, scaled: f32, viewport: f32) -> f32 {
    if scaled >= viewport {
        pan.clamp(viewport - scaled, 0.0)
    } else {
        (viewport - scaled) * 0.5
    }
}

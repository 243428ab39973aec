use crate::canvas::{LayerKind, RasterSurface};
use crate::components::history::LayerSnapshot;
use crate::input::{InputEvent, Key, Modifiers, PointerButton};
use crate::ops::fill::flood_fill;
use crate::project::{NavDirection, Project};
use crate::view::ZOOM_STEP;
use eframe::egui;
use egui::{Pos2, Rect};
use image::Rgba;

pub const MIN_BRUSH_RADIUS: u32 = 1;
pub const MAX_BRUSH_RADIUS: u32 = 250;
pub const DEFAULT_BRUSH_RADIUS: u32 = 25;

/// Smallest rubber-band rectangle (viewport pixels) that triggers zoom-to-rect.
const MIN_ZOOM_SELECTION: f32 = 4.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Freehand,
    Line,
    Fill,
    Erase,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Freehand => "Freehand",
            Tool::Line => "Line",
            Tool::Fill => "Fill",
            Tool::Erase => "Erase",
        }
    }
}

/// Which layer the brush paints into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PaintMode {
    #[default]
    Defect,
    MaskCorrection,
}

impl PaintMode {
    pub fn layer(self) -> LayerKind {
        match self {
            PaintMode::Defect => LayerKind::Defect,
            PaintMode::MaskCorrection => LayerKind::Mask,
        }
    }

    pub fn color(self) -> Rgba<u8> {
        self.layer().color()
    }

    pub fn toggled(self) -> Self {
        match self {
            PaintMode::Defect => PaintMode::MaskCorrection,
            PaintMode::MaskCorrection => PaintMode::Defect,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PaintMode::Defect => "Mode [Marking defects]",
            PaintMode::MaskCorrection => "Mode [Marking mask]",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BrushAction {
    #[default]
    Paint,
    Erase,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BrushState {
    pub radius: u32,
    pub mode: PaintMode,
    pub action: BrushAction,
}

impl Default for BrushState {
    fn default() -> Self {
        Self {
            radius: DEFAULT_BRUSH_RADIUS,
            mode: PaintMode::Defect,
            action: BrushAction::Paint,
        }
    }
}

/// Image-space points of one drag gesture, in order.
#[derive(Clone, Debug, Default)]
pub struct Stroke {
    points: Vec<Pos2>,
}

impl Stroke {
    pub fn push(&mut self, p: Pos2) {
        self.points.push(p);
    }

    pub fn points(&self) -> &[Pos2] {
        &self.points
    }

    pub fn last(&self) -> Option<Pos2> {
        self.points.last().copied()
    }
}

// ============================================================================
// BRUSH ENGINE
// ============================================================================

/// Circular-brush rasterisation. Stateless; all geometry is integer pixel
/// centres obtained by flooring image coordinates.
pub struct BrushEngine;

impl BrushEngine {
    /// Pixels of a disc: every (x, y) with `(x-cx)² + (y-cy)² <= r²`. Unclipped.
    pub fn circle(cx: i64, cy: i64, radius: u32) -> impl Iterator<Item = (i64, i64)> {
        let r = radius as i64;
        let r2 = r * r;
        (-r..=r).flat_map(move |dy| {
            (-r..=r).filter_map(move |dx| {
                (dx * dx + dy * dy <= r2).then_some((cx + dx, cy + dy))
            })
        })
    }

    /// Stamp centres along a polyline: every unit step of every segment, so
    /// sparse pointer samples still produce a gap-free stroke.
    pub fn stamp_centers(points: &[Pos2]) -> Vec<(i64, i64)> {
        let floor = |p: Pos2| (p.x.floor() as i64, p.y.floor() as i64);
        let mut centers: Vec<(i64, i64)> = Vec::new();
        let mut push = |c: (i64, i64)| {
            if centers.last() != Some(&c) {
                centers.push(c);
            }
        };

        match points {
            [] => {}
            [single] => push(floor(*single)),
            _ => {
                for pair in points.windows(2) {
                    let (a, b) = (pair[0], pair[1]);
                    let distance = (b - a).length();
                    let steps = distance.ceil().max(1.0) as usize;
                    for i in 0..=steps {
                        let t = i as f32 / steps as f32;
                        push(floor(a + (b - a) * t));
                    }
                }
            }
        }
        centers
    }

    /// Distinct in-bounds pixels covered by a stroke of `radius` along `points`.
    pub fn footprint(points: &[Pos2], radius: u32, width: u32, height: u32) -> Vec<(u32, u32)> {
        let centers = Self::stamp_centers(points);
        if centers.is_empty() || width == 0 || height == 0 {
            return Vec::new();
        }

        // Local visited bitmap over the clipped bounding box of the stroke.
        let r = radius as i64;
        let min_x = centers.iter().map(|c| c.0).min().unwrap_or(0).saturating_sub(r).max(0);
        let min_y = centers.iter().map(|c| c.1).min().unwrap_or(0).saturating_sub(r).max(0);
        let max_x = (centers.iter().map(|c| c.0).max().unwrap_or(0) + r).min(width as i64 - 1);
        let max_y = (centers.iter().map(|c| c.1).max().unwrap_or(0) + r).min(height as i64 - 1);
        if min_x > max_x || min_y > max_y {
            return Vec::new();
        }
        let bw = (max_x - min_x + 1) as usize;
        let bh = (max_y - min_y + 1) as usize;
        let mut seen = vec![false; bw * bh];

        let mut pixels = Vec::new();
        for &(cx, cy) in &centers {
            for (x, y) in Self::circle(cx, cy, radius) {
                if x < min_x || y < min_y || x > max_x || y > max_y {
                    continue;
                }
                let idx = (y - min_y) as usize * bw + (x - min_x) as usize;
                if !seen[idx] {
                    seen[idx] = true;
                    pixels.push((x as u32, y as u32));
                }
            }
        }
        pixels
    }

    /// Paint `color` into `layer` along the stroke. Returns the pixels that changed.
    pub fn stroke(
        surface: &mut RasterSurface,
        layer: LayerKind,
        points: &[Pos2],
        radius: u32,
        color: Rgba<u8>,
    ) -> Vec<(u32, u32)> {
        Self::footprint(points, radius, surface.width(), surface.height())
            .into_iter()
            .filter(|&(x, y)| surface.set_pixel(layer, x, y, color))
            .collect()
    }

    /// Erase along the stroke: every layer is cleared under the brush, whatever
    /// the current paint mode. Returns the pixels that changed.
    pub fn erase(surface: &mut RasterSurface, points: &[Pos2], radius: u32) -> Vec<(u32, u32)> {
        Self::footprint(points, radius, surface.width(), surface.height())
            .into_iter()
            .filter(|&(x, y)| surface.erase_all(x, y))
            .collect()
    }
}

// ============================================================================
// PAINT TOOL CONTROLLER
// ============================================================================

/// What an event did, so the shell knows whether to redraw or navigate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    Ignored,
    ViewChanged,
    Painted { pixels: usize },
    StrokeCommitted,
    Undone(LayerKind),
    ModeChanged(PaintMode),
    BrushResized(u32),
    Navigate(NavDirection),
}

/// Stroke in progress between press and release.
struct ActiveStroke {
    tool: Tool,
    stroke: Stroke,
    /// Target fixed at press; a mode change mid-drag does not retarget the stroke.
    action: BrushAction,
    layer: LayerKind,
    color: Rgba<u8>,
    /// Snapshots captured at press time with the layer generation they saw.
    before: Vec<(LayerSnapshot, u64)>,
}

/// Turns input events into brush, fill, undo and view operations on the open project.
#[derive(Default)]
pub struct PaintToolController {
    brush: BrushState,
    tool: Tool,
    active: Option<ActiveStroke>,
    anchor: Option<Pos2>,
    zoom_drag_start: Option<Pos2>,
    pan_last: Option<Pos2>,
}

impl PaintToolController {
    pub fn new(radius: u32) -> Self {
        let mut controller = Self::default();
        controller.set_brush_radius(radius);
        controller
    }

    pub fn brush(&self) -> BrushState {
        self.brush
    }

    pub fn mode(&self) -> PaintMode {
        self.brush.mode
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn is_stroking(&self) -> bool {
        self.active.is_some()
    }

    /// Line anchor in image coordinates.
    pub fn anchor(&self) -> Option<Pos2> {
        self.anchor
    }

    /// Start corner (viewport) of a rubber-band zoom in progress.
    pub fn zoom_selection_start(&self) -> Option<Pos2> {
        self.zoom_drag_start
    }

    pub fn set_brush_radius(&mut self, radius: u32) -> u32 {
        self.brush.radius = radius.clamp(MIN_BRUSH_RADIUS, MAX_BRUSH_RADIUS);
        self.brush.radius
    }

    pub fn set_mode(&mut self, mode: PaintMode) {
        self.brush.mode = mode;
    }

    pub fn toggle_mode(&mut self) -> PaintMode {
        self.brush.mode = self.brush.mode.toggled();
        self.brush.mode
    }

    /// Back to Defect mode and the Freehand tool, dropping per-image gesture state.
    /// The brush radius is kept.
    pub fn reset_for_new_image(&mut self) {
        self.brush.mode = PaintMode::Defect;
        self.brush.action = BrushAction::Paint;
        self.tool = Tool::Freehand;
        self.active = None;
        self.anchor = None;
        self.zoom_drag_start = None;
        self.pan_last = None;
    }

    /// Undo the last change of the current mode's layer.
    pub fn undo(&mut self, project: &mut Project) -> EventOutcome {
        if self.active.is_some() {
            return EventOutcome::Ignored;
        }
        let layer = self.brush.mode.layer();
        if project.history.undo(layer, &mut project.canvas.surface) {
            crate::log_info!("Undo on {} layer", layer.label());
            EventOutcome::Undone(layer)
        } else {
            EventOutcome::Ignored
        }
    }

    pub fn handle_event(&mut self, project: Option<&mut Project>, event: InputEvent) -> EventOutcome {
        // Events that do not touch the image.
        match event {
            InputEvent::KeyPress { key: Key::M, .. } => {
                return EventOutcome::ModeChanged(self.toggle_mode());
            }
            InputEvent::KeyPress { key: Key::P, .. } => {
                return EventOutcome::Navigate(NavDirection::Prev);
            }
            InputEvent::KeyPress { key: Key::N, .. } => {
                return EventOutcome::Navigate(NavDirection::Next);
            }
            InputEvent::KeyPress { key: Key::R, .. } => {
                crate::log_warn!("Clear all annotations is not implemented");
                return EventOutcome::Ignored;
            }
            InputEvent::ScrollWheel { notches, modifiers, .. } if modifiers.ctrl => {
                return self.resize_brush(notches);
            }
            _ => {}
        }

        let Some(project) = project else {
            return EventOutcome::Ignored;
        };

        match event {
            InputEvent::PointerDown { pos, button, modifiers, double_click } => match button {
                PointerButton::Primary => self.primary_down(project, pos, modifiers),
                PointerButton::Secondary => {
                    if double_click {
                        self.zoom_drag_start = None;
                        project.canvas.view.reset_to_fit();
                        EventOutcome::ViewChanged
                    } else {
                        self.zoom_drag_start = Some(pos);
                        EventOutcome::Ignored
                    }
                }
                PointerButton::Middle => {
                    self.pan_last = Some(pos);
                    EventOutcome::Ignored
                }
            },
            InputEvent::PointerDrag { pos, button, .. } => match button {
                PointerButton::Primary => self.primary_drag(project, pos),
                PointerButton::Middle => match self.pan_last.replace(pos) {
                    Some(last) => {
                        project.canvas.view.pan(pos - last);
                        EventOutcome::ViewChanged
                    }
                    None => EventOutcome::Ignored,
                },
                PointerButton::Secondary => EventOutcome::Ignored,
            },
            InputEvent::PointerUp { pos, button, .. } => match button {
                PointerButton::Primary => self.primary_up(project),
                PointerButton::Middle => {
                    self.pan_last = None;
                    EventOutcome::Ignored
                }
                PointerButton::Secondary => self.finish_zoom_selection(project, pos),
            },
            InputEvent::KeyPress { key: Key::F, hover, .. } => match hover {
                Some(pos) => self.fill_at(project, pos),
                None => EventOutcome::Ignored,
            },
            InputEvent::KeyPress { key: Key::Z, modifiers, .. } if modifiers.ctrl => {
                self.undo(project)
            }
            InputEvent::ScrollWheel { pos, notches, .. } => {
                if notches > 0.0 {
                    project.canvas.view.zoom(ZOOM_STEP.powf(notches), pos);
                } else if notches < 0.0 {
                    // Zooming out always goes straight back to the whole image.
                    project.canvas.view.reset_to_fit();
                } else {
                    return EventOutcome::Ignored;
                }
                EventOutcome::ViewChanged
            }
            InputEvent::KeyPress { .. } => EventOutcome::Ignored,
        }
    }

    fn resize_brush(&mut self, notches: f32) -> EventOutcome {
        if notches == 0.0 {
            return EventOutcome::Ignored;
        }
        let step = (self.brush.radius / 10).max(1) as i64;
        let delta = if notches > 0.0 { step } else { -step };
        let radius = (self.brush.radius as i64 + delta).max(0) as u32;
        EventOutcome::BrushResized(self.set_brush_radius(radius))
    }

    fn primary_down(&mut self, project: &mut Project, pos: Pos2, modifiers: Modifiers) -> EventOutcome {
        let p = project.canvas.to_image(pos);

        if modifiers.ctrl {
            return self.begin_stroke(project, Tool::Erase, p);
        }
        if modifiers.shift {
            return match self.anchor {
                Some(anchor) => self.commit_line(project, anchor, p),
                None => {
                    self.anchor = Some(p);
                    self.tool = Tool::Line;
                    EventOutcome::Ignored
                }
            };
        }
        self.begin_stroke(project, Tool::Freehand, p)
    }

    fn begin_stroke(&mut self, project: &mut Project, tool: Tool, p: Pos2) -> EventOutcome {
        let surface = &mut project.canvas.surface;
        let layers = match tool {
            Tool::Erase => LayerKind::all().to_vec(),
            _ => vec![self.brush.mode.layer()],
        };
        let before = layers
            .into_iter()
            .map(|layer| (LayerSnapshot::capture(surface, layer), surface.generation(layer)))
            .collect();

        self.tool = tool;
        self.brush.action = if tool == Tool::Erase { BrushAction::Erase } else { BrushAction::Paint };
        let mut stroke = Stroke::default();
        stroke.push(p);
        let active = ActiveStroke {
            tool,
            stroke,
            action: self.brush.action,
            layer: self.brush.mode.layer(),
            color: self.brush.mode.color(),
            before,
        };
        let pixels = active.apply(surface, &[p], self.brush.radius);

        self.active = Some(active);
        self.anchor = Some(p);
        EventOutcome::Painted { pixels }
    }

    fn primary_drag(&mut self, project: &mut Project, pos: Pos2) -> EventOutcome {
        let p = project.canvas.to_image(pos);
        let radius = self.brush.radius;
        let Some(active) = self.active.as_mut() else {
            return EventOutcome::Ignored;
        };
        let Some(last) = active.stroke.last() else {
            return EventOutcome::Ignored;
        };
        let pixels = active.apply(&mut project.canvas.surface, &[last, p], radius);
        active.stroke.push(p);
        self.anchor = Some(p);
        EventOutcome::Painted { pixels }
    }

    fn primary_up(&mut self, project: &mut Project) -> EventOutcome {
        let Some(active) = self.active.take() else {
            return EventOutcome::Ignored;
        };
        self.brush.action = BrushAction::Paint;

        let mut committed = false;
        for (snapshot, generation) in active.before {
            if project.canvas.surface.generation(snapshot.layer()) != generation {
                project.history.push(snapshot);
                committed = true;
            }
        }
        if committed {
            crate::log_info!(
                "{} stroke of {} points committed",
                active.tool.label(),
                active.stroke.points().len()
            );
            EventOutcome::StrokeCommitted
        } else {
            EventOutcome::Ignored
        }
    }

    fn commit_line(&mut self, project: &mut Project, anchor: Pos2, p: Pos2) -> EventOutcome {
        let layer = self.brush.mode.layer();
        let surface = &mut project.canvas.surface;
        let snapshot = LayerSnapshot::capture(surface, layer);

        let pixels = BrushEngine::stroke(surface, layer, &[anchor, p], self.brush.radius, self.brush.mode.color());
        if !pixels.is_empty() {
            project.history.push(snapshot);
        }
        self.tool = Tool::Line;
        self.anchor = Some(p);
        EventOutcome::Painted { pixels: pixels.len() }
    }

    fn fill_at(&mut self, project: &mut Project, pos: Pos2) -> EventOutcome {
        if self.active.is_some() {
            return EventOutcome::Ignored;
        }
        let Some((x, y)) = project.canvas.pixel_at(pos) else {
            return EventOutcome::Ignored;
        };
        let layer = self.brush.mode.layer();
        let snapshot = LayerSnapshot::capture(&project.canvas.surface, layer);

        self.tool = Tool::Fill;
        let count = flood_fill(&mut project.canvas.surface, layer, x, y, self.brush.mode.color());
        if count > 0 {
            project.history.push(snapshot);
            crate::log_info!("Filled {} pixels at ({}, {})", count, x, y);
        }
        EventOutcome::Painted { pixels: count }
    }

    fn finish_zoom_selection(&mut self, project: &mut Project, pos: Pos2) -> EventOutcome {
        let Some(start) = self.zoom_drag_start.take() else {
            return EventOutcome::Ignored;
        };
        let rect = Rect::from_two_pos(start, pos);
        if rect.width() < MIN_ZOOM_SELECTION || rect.height() < MIN_ZOOM_SELECTION {
            return EventOutcome::Ignored;
        }
        let view = &mut project.canvas.view;
        let image_rect = Rect::from_two_pos(view.to_image(rect.min), view.to_image(rect.max));
        view.zoom_to_rect(image_rect);
        EventOutcome::ViewChanged
    }
}

impl ActiveStroke {
    /// Paint or erase along `points` with the target captured at press.
    fn apply(&self, surface: &mut RasterSurface, points: &[Pos2], radius: u32) -> usize {
        match self.action {
            BrushAction::Paint => {
                BrushEngine::stroke(surface, self.layer, points, radius, self.color).len()
            }
            BrushAction::Erase => BrushEngine::erase(surface, points, radius).len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{MARK_COLOR_DEFECT, MARK_COLOR_MASK};
    use egui::Vec2;
    use image::RgbaImage;

    /// Project whose viewport maps 1:1 onto the image (zoom 1, no pan).
    fn project(w: u32, h: u32) -> Project {
        let mut p = Project::new("test", RasterSurface::new(RgbaImage::new(w, h)));
        p.canvas.view.set_viewport_size(Vec2::new(w as f32, h as f32));
        p
    }

    /// Viewport position at the centre of image pixel (x, y).
    fn at(x: u32, y: u32) -> Pos2 {
        Pos2::new(x as f32 + 0.5, y as f32 + 0.5)
    }

    fn down(pos: Pos2, modifiers: Modifiers) -> InputEvent {
        InputEvent::PointerDown { pos, button: PointerButton::Primary, modifiers, double_click: false }
    }

    fn drag(pos: Pos2) -> InputEvent {
        InputEvent::PointerDrag { pos, button: PointerButton::Primary, modifiers: Modifiers::NONE }
    }

    fn up(pos: Pos2) -> InputEvent {
        InputEvent::PointerUp { pos, button: PointerButton::Primary, modifiers: Modifiers::NONE }
    }

    fn key(key: Key, modifiers: Modifiers, hover: Option<Pos2>) -> InputEvent {
        InputEvent::KeyPress { key, modifiers, hover }
    }

    fn painted(p: &Project, layer: LayerKind) -> usize {
        p.canvas.surface.layer(layer).painted_count()
    }

    #[test]
    fn stamp_covers_exactly_the_disc() {
        let radius = 4u32;
        let (cx, cy) = (10i64, 12i64);
        let pixels = BrushEngine::footprint(&[Pos2::new(10.3, 12.9)], radius, 40, 40);
        for y in 0..40i64 {
            for x in 0..40i64 {
                let inside = (x - cx).pow(2) + (y - cy).pow(2) <= (radius as i64).pow(2);
                assert_eq!(pixels.contains(&(x as u32, y as u32)), inside, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn stamp_is_clipped_at_edges() {
        let pixels = BrushEngine::footprint(&[Pos2::new(0.0, 0.0)], 2, 10, 10);
        // Quarter disc of radius 2 including the axes: (0..=2, 0..=2) minus (2,1),(1,2),(2,2).
        assert_eq!(pixels.len(), 6);
        assert!(pixels.iter().all(|&(x, y)| x < 10 && y < 10));
        assert!(BrushEngine::footprint(&[Pos2::new(-50.0, -50.0)], 5, 10, 10).is_empty());
    }

    #[test]
    fn sparse_samples_leave_no_gaps() {
        let centers = BrushEngine::stamp_centers(&[Pos2::new(0.5, 0.5), Pos2::new(30.5, 0.5)]);
        assert_eq!(centers.len(), 31);
        assert!(centers.windows(2).all(|w| (w[1].0 - w[0].0).abs() <= 1));
    }

    #[test]
    fn freehand_sausage_then_undo() {
        let mut p = project(100, 100);
        let mut c = PaintToolController::new(5);

        c.handle_event(Some(&mut p), down(at(10, 10), Modifiers::NONE));
        c.handle_event(Some(&mut p), drag(at(10, 15)));
        c.handle_event(Some(&mut p), drag(at(10, 20)));
        assert_eq!(c.handle_event(Some(&mut p), up(at(10, 20))), EventOutcome::StrokeCommitted);

        let layer = p.canvas.surface.layer(LayerKind::Defect);
        for y in 5..=25 {
            assert!(layer.is_painted(10, y), "spine pixel y={y}");
        }
        for x in 5..=15 {
            assert!(layer.is_painted(x, 15), "cross-section pixel x={x}");
        }
        assert!(!layer.is_painted(4, 15));
        assert!(!layer.is_painted(16, 15));
        assert!(!layer.is_painted(10, 4));
        assert!(!layer.is_painted(10, 26));
        assert_eq!(painted(&p, LayerKind::Mask), 0);

        let undo = c.handle_event(Some(&mut p), key(Key::Z, Modifiers::CTRL, None));
        assert_eq!(undo, EventOutcome::Undone(LayerKind::Defect));
        assert_eq!(painted(&p, LayerKind::Defect), 0);
    }

    #[test]
    fn line_tool_joins_anchor_and_shift_click() {
        let mut p = project(60, 60);
        let mut c = PaintToolController::new(1);

        c.handle_event(Some(&mut p), down(at(5, 5), Modifiers::NONE));
        c.handle_event(Some(&mut p), up(at(5, 5)));
        let outcome = c.handle_event(Some(&mut p), down(at(45, 5), Modifiers::SHIFT));
        assert!(matches!(outcome, EventOutcome::Painted { pixels } if pixels > 0));
        assert_eq!(c.tool(), Tool::Line);
        c.handle_event(Some(&mut p), up(at(45, 5)));

        let layer = p.canvas.surface.layer(LayerKind::Defect);
        assert!((5..=45).all(|x| layer.is_painted(x, 5)));
        assert_eq!(p.history.undo_count(LayerKind::Defect), 2);
    }

    #[test]
    fn shift_click_without_anchor_only_records_it() {
        let mut p = project(20, 20);
        let mut c = PaintToolController::new(2);
        let outcome = c.handle_event(Some(&mut p), down(at(3, 3), Modifiers::SHIFT));
        assert_eq!(outcome, EventOutcome::Ignored);
        assert_eq!(painted(&p, LayerKind::Defect), 0);
        assert!(c.anchor().is_some());
    }

    #[test]
    fn erase_clears_both_layers_in_any_mode() {
        let mut p = project(30, 30);
        let mut c = PaintToolController::new(3);

        c.set_mode(PaintMode::MaskCorrection);
        c.handle_event(Some(&mut p), down(at(10, 10), Modifiers::NONE));
        c.handle_event(Some(&mut p), up(at(10, 10)));
        c.set_mode(PaintMode::Defect);
        c.handle_event(Some(&mut p), down(at(20, 20), Modifiers::NONE));
        c.handle_event(Some(&mut p), up(at(20, 20)));

        c.handle_event(Some(&mut p), down(at(10, 10), Modifiers::CTRL));
        assert_eq!(c.brush().action, BrushAction::Erase);
        c.handle_event(Some(&mut p), drag(at(20, 20)));
        c.handle_event(Some(&mut p), up(at(20, 20)));

        assert_eq!(painted(&p, LayerKind::Mask), 0);
        assert_eq!(painted(&p, LayerKind::Defect), 0);
        assert_eq!(p.history.undo_count(LayerKind::Defect), 2);
        assert_eq!(p.history.undo_count(LayerKind::Mask), 2);

        // Undo in defect mode restores the defect layer only.
        c.undo(&mut p);
        assert!(painted(&p, LayerKind::Defect) > 0);
        assert_eq!(painted(&p, LayerKind::Mask), 0);
    }

    fn fully_painted(w: u32, h: u32) -> Project {
        let mut p = project(w, h);
        for y in 0..h {
            for x in 0..w {
                p.canvas.surface.set_pixel(LayerKind::Defect, x, y, MARK_COLOR_DEFECT);
                p.canvas.surface.set_pixel(LayerKind::Mask, x, y, MARK_COLOR_MASK);
            }
        }
        p
    }

    #[test]
    fn erase_does_not_depend_on_drag_sampling() {
        let erase_along = |samples: &[u32]| {
            let mut p = fully_painted(60, 60);
            let mut c = PaintToolController::new(5);
            c.handle_event(Some(&mut p), down(at(10, 30), Modifiers::CTRL));
            for &x in samples {
                c.handle_event(Some(&mut p), drag(at(x, 30)));
            }
            c.handle_event(Some(&mut p), up(at(40, 30)));
            (painted(&p, LayerKind::Defect), painted(&p, LayerKind::Mask))
        };

        let single = erase_along(&[40]);
        let dense: Vec<u32> = (11..=40).collect();
        assert_eq!(erase_along(&dense), single);

        let covered = BrushEngine::footprint(&[at(10, 30), at(40, 30)], 5, 60, 60).len();
        assert_eq!(single, (3600 - covered, 3600 - covered));
    }

    #[test]
    fn mode_change_mid_stroke_keeps_the_stroke_layer() {
        let mut p = project(60, 30);
        let mut c = PaintToolController::new(3);

        c.handle_event(Some(&mut p), down(at(10, 10), Modifiers::NONE));
        let toggled = c.handle_event(Some(&mut p), key(Key::M, Modifiers::NONE, None));
        assert_eq!(toggled, EventOutcome::ModeChanged(PaintMode::MaskCorrection));
        c.handle_event(Some(&mut p), drag(at(40, 10)));
        assert_eq!(c.handle_event(Some(&mut p), up(at(40, 10))), EventOutcome::StrokeCommitted);

        assert_eq!(painted(&p, LayerKind::Mask), 0);
        assert!(painted(&p, LayerKind::Defect) > 0);
        assert_eq!(p.history.undo_count(LayerKind::Defect), 1);
        assert_eq!(p.history.undo_count(LayerKind::Mask), 0);

        // Undo follows the mode, so the defect stroke is reached after toggling back.
        assert_eq!(c.undo(&mut p), EventOutcome::Ignored);
        c.handle_event(Some(&mut p), key(Key::M, Modifiers::NONE, None));
        assert_eq!(c.undo(&mut p), EventOutcome::Undone(LayerKind::Defect));
        assert_eq!(painted(&p, LayerKind::Defect), 0);
    }

    #[test]
    fn fill_key_uses_hover_position_and_mode_color() {
        let mut p = project(20, 20);
        let mut c = PaintToolController::new(1);
        c.set_mode(PaintMode::MaskCorrection);

        let outcome = c.handle_event(Some(&mut p), key(Key::F, Modifiers::NONE, Some(at(4, 4))));
        assert_eq!(outcome, EventOutcome::Painted { pixels: 400 });
        assert_eq!(c.tool(), Tool::Fill);
        assert_eq!(p.canvas.surface.get_pixel(LayerKind::Mask, 19, 19), MARK_COLOR_MASK);

        let again = c.handle_event(Some(&mut p), key(Key::F, Modifiers::NONE, Some(at(4, 4))));
        assert_eq!(again, EventOutcome::Painted { pixels: 0 });
        assert_eq!(p.history.undo_count(LayerKind::Mask), 1);
        assert_eq!(c.handle_event(Some(&mut p), key(Key::F, Modifiers::NONE, None)), EventOutcome::Ignored);
    }

    #[test]
    fn mode_toggle_keeps_histories() {
        let mut p = project(20, 20);
        let mut c = PaintToolController::new(2);
        c.handle_event(Some(&mut p), down(at(5, 5), Modifiers::NONE));
        c.handle_event(Some(&mut p), up(at(5, 5)));

        let outcome = c.handle_event(Some(&mut p), key(Key::M, Modifiers::NONE, None));
        assert_eq!(outcome, EventOutcome::ModeChanged(PaintMode::MaskCorrection));
        assert_eq!(p.history.undo_count(LayerKind::Defect), 1);
        // Mask layer has no history, so undo does nothing.
        assert_eq!(c.handle_event(Some(&mut p), key(Key::Z, Modifiers::CTRL, None)), EventOutcome::Ignored);
        assert_eq!(p.canvas.surface.get_pixel(LayerKind::Defect, 5, 5), MARK_COLOR_DEFECT);
    }

    #[test]
    fn events_without_project_are_no_ops() {
        let mut c = PaintToolController::default();
        assert_eq!(c.handle_event(None, down(at(1, 1), Modifiers::NONE)), EventOutcome::Ignored);
        assert_eq!(c.handle_event(None, key(Key::F, Modifiers::NONE, Some(at(1, 1)))), EventOutcome::Ignored);
        assert!(!c.is_stroking());
        assert_eq!(c.handle_event(None, key(Key::N, Modifiers::NONE, None)), EventOutcome::Navigate(NavDirection::Next));
        assert_eq!(c.handle_event(None, key(Key::R, Modifiers::NONE, None)), EventOutcome::Ignored);
    }

    #[test]
    fn ctrl_scroll_resizes_within_bounds() {
        let mut c = PaintToolController::new(DEFAULT_BRUSH_RADIUS);
        let scroll = |notches| InputEvent::ScrollWheel { pos: Pos2::ZERO, notches, modifiers: Modifiers::CTRL };
        assert_eq!(c.handle_event(None, scroll(1.0)), EventOutcome::BrushResized(27));
        assert_eq!(c.set_brush_radius(MAX_BRUSH_RADIUS + 100), MAX_BRUSH_RADIUS);
        assert_eq!(c.handle_event(None, scroll(1.0)), EventOutcome::BrushResized(MAX_BRUSH_RADIUS));
        c.set_brush_radius(1);
        assert_eq!(c.handle_event(None, scroll(-1.0)), EventOutcome::BrushResized(MIN_BRUSH_RADIUS));
    }

    #[test]
    fn scroll_down_returns_to_fit() {
        let mut p = project(100, 100);
        let mut c = PaintToolController::default();
        let scroll = |notches| InputEvent::ScrollWheel { pos: Pos2::new(30.0, 40.0), notches, modifiers: Modifiers::NONE };
        c.handle_event(Some(&mut p), scroll(2.0));
        assert!(p.canvas.view.is_zoomed_in());
        assert_eq!(c.handle_event(Some(&mut p), scroll(-1.0)), EventOutcome::ViewChanged);
        assert!(!p.canvas.view.is_zoomed_in());
    }

    #[test]
    fn secondary_drag_zooms_into_selection() {
        let mut p = project(100, 100);
        let mut c = PaintToolController::default();
        let sec = |pos, double_click| InputEvent::PointerDown {
            pos,
            button: PointerButton::Secondary,
            modifiers: Modifiers::NONE,
            double_click,
        };
        c.handle_event(Some(&mut p), sec(Pos2::new(20.0, 20.0), false));
        let outcome = c.handle_event(
            Some(&mut p),
            InputEvent::PointerUp { pos: Pos2::new(45.0, 45.0), button: PointerButton::Secondary, modifiers: Modifiers::NONE },
        );
        assert_eq!(outcome, EventOutcome::ViewChanged);
        assert_eq!(p.canvas.view.zoom_level(), 4.0);

        c.handle_event(Some(&mut p), sec(Pos2::new(1.0, 1.0), true));
        assert_eq!(p.canvas.view.zoom_level(), 1.0);
    }
}

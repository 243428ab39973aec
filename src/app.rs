use std::path::Path;

use eframe::egui;
use egui::{Color32, ColorImage, Pos2, RichText, TextureHandle, TextureOptions, Vec2};

use crate::canvas::RasterSurface;
use crate::components::tools::{
    EventOutcome, MAX_BRUSH_RADIUS, MIN_BRUSH_RADIUS, PaintMode, PaintToolController,
};
use crate::input::{InputEvent, Key, Modifiers, PointerButton};
use crate::io::AnnotError;
use crate::project::{NavDirection, NavOutcome, Session};
use crate::settings::AppSettings;

/// Scroll distance (points) egui reports per mouse-wheel notch.
const POINTS_PER_NOTCH: f32 = 50.0;
/// egui turns Ctrl+wheel into `zoom_delta = exp(points / 200)`; this maps its log back to notches.
const ZOOM_LOG_PER_NOTCH: f32 = POINTS_PER_NOTCH / 200.0;

const BUTTONS: [(egui::PointerButton, PointerButton); 3] = [
    (egui::PointerButton::Primary, PointerButton::Primary),
    (egui::PointerButton::Secondary, PointerButton::Secondary),
    (egui::PointerButton::Middle, PointerButton::Middle),
];

fn mode_color(mode: PaintMode) -> Color32 {
    let c = mode.color();
    Color32::from_rgb(c[0], c[1], c[2])
}

// ============================================================================
// POINTER TRACKER – raw egui input to typed canvas events
// ============================================================================

#[derive(Default)]
struct PointerTracker {
    /// Buttons whose press started on the canvas.
    held: [bool; 3],
    scroll_accum: f32,
    resize_accum: f32,
}

impl PointerTracker {
    fn collect(&mut self, ctx: &egui::Context, response: &egui::Response) -> Vec<InputEvent> {
        let origin = response.rect.min.to_vec2();
        let hovered = response.hovered();
        let mut events = Vec::new();

        ctx.input(|i| {
            let modifiers = Modifiers::from(i.modifiers);
            let pointer = &i.pointer;
            let Some(pos) = pointer.interact_pos().or(pointer.latest_pos()).map(|p| p - origin) else {
                return;
            };

            for (slot, &(egui_button, button)) in BUTTONS.iter().enumerate() {
                if hovered && pointer.button_pressed(egui_button) {
                    self.held[slot] = true;
                    events.push(InputEvent::PointerDown {
                        pos,
                        button,
                        modifiers,
                        double_click: pointer.button_double_clicked(egui_button),
                    });
                } else if self.held[slot] && pointer.button_down(egui_button) && pointer.delta() != Vec2::ZERO {
                    events.push(InputEvent::PointerDrag { pos, button, modifiers });
                }
                if self.held[slot] && pointer.button_released(egui_button) {
                    self.held[slot] = false;
                    events.push(InputEvent::PointerUp { pos, button, modifiers });
                }
            }

            if !hovered {
                self.scroll_accum = 0.0;
                self.resize_accum = 0.0;
                return;
            }
            let zoom = i.zoom_delta();
            if modifiers.ctrl && zoom != 1.0 {
                self.resize_accum += zoom.ln() / ZOOM_LOG_PER_NOTCH;
            } else {
                self.scroll_accum += i.scroll_delta.y / POINTS_PER_NOTCH;
            }
            for (accum, ctrl) in [(&mut self.scroll_accum, false), (&mut self.resize_accum, true)] {
                let notches = accum.trunc();
                if notches != 0.0 {
                    *accum -= notches;
                    let modifiers = Modifiers { ctrl, ..modifiers };
                    events.push(InputEvent::ScrollWheel { pos, notches, modifiers });
                }
            }
        });
        events
    }
}

// ============================================================================
// CANVAS TEXTURES
// ============================================================================

#[derive(Default)]
struct CanvasTextures {
    base: Option<TextureHandle>,
    overlay: Option<TextureHandle>,
    overlay_generation: Option<u64>,
}

impl CanvasTextures {
    fn clear(&mut self) {
        *self = Self::default();
    }

    /// Upload the base once per image and the overlay whenever a mask changed.
    fn sync(&mut self, ctx: &egui::Context, surface: &RasterSurface) {
        let size = [surface.width() as usize, surface.height() as usize];
        if self.base.is_none() {
            let image = ColorImage::from_rgba_unmultiplied(size, surface.base().as_raw());
            self.base = Some(ctx.load_texture("orthoframe", image, TextureOptions::NEAREST));
        }

        let generation = surface.overlay_generation();
        if self.overlay_generation != Some(generation) {
            let overlay = surface.composite_overlay();
            let image = ColorImage::from_rgba_unmultiplied(size, overlay.as_raw());
            match &mut self.overlay {
                Some(texture) => texture.set(image, TextureOptions::NEAREST),
                None => {
                    self.overlay = Some(ctx.load_texture("annotations", image, TextureOptions::NEAREST));
                }
            }
            self.overlay_generation = Some(generation);
        }
    }
}

// ============================================================================
// APP
// ============================================================================

pub struct DatmantApp {
    settings: AppSettings,
    /// Settings as last written to disk.
    saved_settings: AppSettings,
    session: Session,
    controller: PaintToolController,
    pointer: PointerTracker,
    textures: CanvasTextures,
    status: String,
    /// Set when navigation hit the first/last image; shown as a modal.
    end_of_folder: Option<NavDirection>,
    error_message: Option<String>,
    first_frame: bool,
}

impl DatmantApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let settings = AppSettings::load();
        let mut app = Self {
            session: Session::new(settings.load_marked_image),
            controller: PaintToolController::new(settings.brush_radius),
            pointer: PointerTracker::default(),
            textures: CanvasTextures::default(),
            status: "Ready".to_string(),
            end_of_folder: None,
            error_message: None,
            first_frame: true,
            saved_settings: settings.clone(),
            settings,
        };
        if let Some(dir) = app.settings.image_dir() {
            app.open_folder(&dir);
        }
        app
    }

    fn open_folder(&mut self, dir: &Path) {
        self.status = format!("Loading {}...", dir.display());
        match self.session.open_folder(dir) {
            Ok(count) => {
                self.settings.image_directory = dir.display().to_string();
                self.settings.save_if_changed(&mut self.saved_settings);
                self.status = format!("Opened {} ({} orthoframes)", dir.display(), count);
                self.on_image_changed();
            }
            Err(e) => self.report_error("Could not open folder", e),
        }
    }

    fn browse_folder(&mut self) {
        let mut dialog = rfd::FileDialog::new().set_title("Select orthoframe folder");
        if let Some(dir) = self.settings.image_dir() {
            dialog = dialog.set_directory(dir);
        }
        if let Some(dir) = dialog.pick_folder() {
            self.open_folder(&dir);
        }
    }

    fn navigate(&mut self, dir: NavDirection) {
        let report = self.session.navigate(dir);
        match report.outcome {
            NavOutcome::Moved(_) => {
                self.status = "Ready".to_string();
                self.on_image_changed();
            }
            NavOutcome::EndOfFolder(d) => self.end_of_folder = Some(d),
            NavOutcome::Empty => {}
        }
        for e in report.errors {
            self.report_error("Could not switch image cleanly", e);
        }
    }

    fn on_image_changed(&mut self) {
        self.controller.reset_for_new_image();
        self.textures.clear();
        self.pointer = PointerTracker::default();
        if let Some(project) = &self.session.project {
            crate::log_info!("Opened {} ({})", project.name, project.status.label());
        }
    }

    fn report_error(&mut self, context: &str, e: AnnotError) {
        crate::log_err!("{}: {}", context, e);
        self.status = format!("{}: {}", context, e);
        self.error_message = Some(format!("{}:\n{}", context, e));
    }

    fn toggle_mode(&mut self) {
        let mode = self.controller.toggle_mode();
        crate::log_info!("{}", mode.label());
    }

    fn set_brush_radius(&mut self, radius: u32) {
        self.settings.brush_radius = self.controller.set_brush_radius(radius);
    }

    fn apply_outcome(&mut self, outcome: EventOutcome) {
        match outcome {
            EventOutcome::Navigate(dir) => self.navigate(dir),
            EventOutcome::BrushResized(radius) => self.set_brush_radius(radius),
            EventOutcome::ModeChanged(mode) => {
                crate::log_info!("{}", mode.label());
            }
            EventOutcome::Undone(layer) => self.status = format!("Undid last {} change", layer.label()),
            EventOutcome::Ignored
            | EventOutcome::ViewChanged
            | EventOutcome::Painted { .. }
            | EventOutcome::StrokeCommitted => {}
        }
    }

    /// Keys go to the controller unless a text field has focus.
    fn keyboard_events(&self, ctx: &egui::Context, hover: Option<Pos2>) -> Vec<InputEvent> {
        if ctx.wants_keyboard_input() {
            return Vec::new();
        }
        ctx.input(|i| {
            let modifiers = Modifiers::from(i.modifiers);
            Key::all()
                .iter()
                .filter(|k| i.key_pressed(k.to_egui()))
                .map(|&key| InputEvent::KeyPress { key, modifiers, hover })
                .collect()
        })
    }

    // ========================================================================
    // PANELS
    // ========================================================================

    fn top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Browse...").clicked() {
                    self.browse_folder();
                }
                let folder = self
                    .session
                    .workspace
                    .as_ref()
                    .map(|w| w.dir().display().to_string())
                    .unwrap_or_else(|| "No folder".to_string());
                ui.label(RichText::new(folder).monospace());

                ui.separator();
                let has_folder = self.session.workspace.is_some();
                if ui.add_enabled(has_folder, egui::Button::new("< Prev [P]")).clicked() {
                    self.navigate(NavDirection::Prev);
                }
                if ui.add_enabled(has_folder, egui::Button::new("Next [N] >")).clicked() {
                    self.navigate(NavDirection::Next);
                }

                ui.separator();
                let mode = self.controller.mode();
                let mode_button = egui::Button::new(RichText::new(mode.label()).color(Color32::WHITE))
                    .fill(mode_color(mode));
                if ui.add(mode_button).on_hover_text("Toggle with [M]").clicked() {
                    self.toggle_mode();
                }
                let has_project = self.session.project.is_some();
                if ui.add_enabled(has_project, egui::Button::new("Undo")).clicked()
                    && let Some(project) = self.session.project.as_mut()
                {
                    let outcome = self.controller.undo(project);
                    self.apply_outcome(outcome);
                }

                ui.separator();
                let mut radius = self.controller.brush().radius;
                let slider = egui::Slider::new(&mut radius, MIN_BRUSH_RADIUS..=MAX_BRUSH_RADIUS).text("Brush");
                let response = ui.add(slider);
                if response.changed() {
                    self.set_brush_radius(radius);
                }
                // Written once the drag settles; wheel resizes are written on exit.
                if response.drag_released() || (response.changed() && !response.dragged()) {
                    self.settings.save_if_changed(&mut self.saved_settings);
                }

                ui.separator();
                if ui.checkbox(&mut self.settings.load_marked_image, "Load marked image").changed() {
                    self.session.load_marked = self.settings.load_marked_image;
                    self.settings.save_if_changed(&mut self.saved_settings);
                }
                if ui.checkbox(&mut self.settings.show_log, "Show log").changed() {
                    self.settings.save_if_changed(&mut self.saved_settings);
                }
            });
        });
    }

    fn status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status);
                if let (Some(workspace), Some(project)) = (&self.session.workspace, &self.session.project) {
                    ui.separator();
                    ui.label(format!(
                        "{} ({}/{}) - {}",
                        project.display_title(),
                        workspace.index() + 1,
                        workspace.len(),
                        project.status.label()
                    ));
                    ui.separator();
                    ui.label(format!("Zoom {:.0}%", project.canvas.view.zoom_level() * 100.0));
                    ui.separator();
                    ui.label(format!("Tool: {}", self.controller.tool().label()));
                }
            });
        });
    }

    fn log_panel(&self, ctx: &egui::Context) {
        if !self.settings.show_log {
            return;
        }
        egui::TopBottomPanel::bottom("log_panel")
            .resizable(true)
            .default_height(140.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if ui.small_button("Clear").clicked() {
                        crate::logger::clear_recent();
                    }
                    if let Some(path) = crate::logger::log_path() {
                        ui.label(RichText::new(path.display().to_string()).small().weak());
                    }
                });
                egui::ScrollArea::vertical()
                    .stick_to_bottom(true)
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        for line in crate::logger::recent_lines() {
                            ui.label(RichText::new(line).monospace().small());
                        }
                    });
            });
    }

    fn dialogs(&mut self, ctx: &egui::Context) {
        if let Some(dir) = self.end_of_folder {
            let text = match dir {
                NavDirection::Next => "This is the last image in the folder. Your masks have been saved.",
                NavDirection::Prev => "This is the first image in the folder. Your masks have been saved.",
            };
            let mut close = false;
            egui::Window::new("End of folder")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(text);
                    ui.add_space(8.0);
                    if ui.button("OK").clicked() {
                        close = true;
                    }
                });
            if close {
                self.end_of_folder = None;
            }
        }

        if let Some(message) = self.error_message.clone() {
            let mut close = false;
            egui::Window::new("Error")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(message);
                    ui.add_space(8.0);
                    if ui.button("OK").clicked() {
                        close = true;
                    }
                });
            if close {
                self.error_message = None;
            }
        }
    }

    /// Draw the image with its annotations and route canvas input. Returns
    /// outcomes that need app-level handling.
    fn canvas_ui(&mut self, ui: &mut egui::Ui) -> Vec<EventOutcome> {
        let ctx = ui.ctx().clone();
        let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let rect = response.rect;
        let origin = rect.min.to_vec2();

        let hover = ctx
            .input(|i| i.pointer.hover_pos())
            .filter(|p| rect.contains(*p))
            .map(|p| p - origin);
        let modal_open = self.end_of_folder.is_some() || self.error_message.is_some();
        let mut events = if modal_open { Vec::new() } else { self.pointer.collect(&ctx, &response) };
        if !modal_open {
            events.extend(self.keyboard_events(&ctx, hover));
        }

        let Self { session, controller, textures, .. } = self;
        let Some(project) = session.project.as_mut() else {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "Browse to a folder of orthoframes",
                egui::FontId::proportional(18.0),
                Color32::GRAY,
            );
            return events.into_iter().map(|e| controller.handle_event(None, e)).collect();
        };

        project.canvas.view.set_viewport_size(rect.size());
        let outcomes: Vec<EventOutcome> = events
            .into_iter()
            .map(|e| controller.handle_event(Some(&mut *project), e))
            .collect();

        textures.sync(&ctx, &project.canvas.surface);
        let image_rect = project.canvas.view.image_rect_in_viewport().translate(origin);
        let uv = egui::Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
        for texture in [&textures.base, &textures.overlay].into_iter().flatten() {
            painter.image(texture.id(), image_rect, uv, Color32::WHITE);
        }

        let mode = controller.mode();
        if let Some(start) = controller.zoom_selection_start()
            && let Some(end) = hover
        {
            let selection = egui::Rect::from_two_pos(start + origin, end + origin);
            painter.rect_stroke(selection, 0.0, egui::Stroke::new(1.0, Color32::YELLOW));
        }
        if let Some(pos) = hover {
            let radius = controller.brush().radius as f32 * project.canvas.view.zoom_level();
            painter.circle_stroke(pos + origin, radius, egui::Stroke::new(1.0, mode_color(mode)));
        }
        if hover.is_some() {
            ctx.set_cursor_icon(egui::CursorIcon::Crosshair);
        }

        outcomes
    }
}

impl eframe::App for DatmantApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // --- Window title: "DATMant - <image>[*]" ---
        {
            let title = match &self.session.project {
                Some(project) => format!("DATMant - {}", project.display_title()),
                None => "DATMant".to_string(),
            };
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(title));
        }

        if self.first_frame {
            self.first_frame = false;
            crate::log_info!("{}", self.controller.mode().label());
        }

        // --- Save masks and settings when the window closes ---
        if ctx.input(|i| i.viewport().close_requested()) {
            if let Err(e) = self.session.save_current() {
                crate::log_err!("Could not save masks on exit: {}", e);
            }
            self.settings.save_if_changed(&mut self.saved_settings);
        }

        self.top_bar(ctx);
        self.status_bar(ctx);
        self.log_panel(ctx);

        let outcomes = egui::CentralPanel::default()
            .frame(egui::Frame {
                fill: Color32::from_gray(30),
                ..Default::default()
            })
            .show(ctx, |ui| self.canvas_ui(ui))
            .inner;
        for outcome in outcomes {
            self.apply_outcome(outcome);
        }

        self.dialogs(ctx);
    }
}

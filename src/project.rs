use std::path::{Path, PathBuf};

use crate::canvas::{Canvas, RasterSurface};
use crate::components::history::{HistoryManager, UNDO_CAPACITY};
use crate::io::{self, AnnotError, CompanionFiles, ImageStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavDirection {
    Prev,
    Next,
}

/// Single open orthoframe.
pub struct Project {
    pub canvas: Canvas,
    pub history: HistoryManager,
    /// `None` for in-memory images that have no folder behind them.
    pub files: Option<CompanionFiles>,
    /// Display name (orthoframe base name).
    pub name: String,
    /// Annotation status at the time the image was opened.
    pub status: ImageStatus,
    saved_generation: u64,
}

impl Project {
    pub fn new(name: impl Into<String>, surface: RasterSurface) -> Self {
        let saved_generation = surface.overlay_generation();
        Self {
            canvas: Canvas::new(surface),
            history: HistoryManager::new(UNDO_CAPACITY),
            files: None,
            name: name.into(),
            status: ImageStatus::New,
            saved_generation,
        }
    }

    pub fn open(files: CompanionFiles, use_marked: bool) -> Result<Self, AnnotError> {
        let status = files.status();
        let surface = io::load_orthoframe(&files, use_marked)?;
        let mut project = Self::new(files.name(), surface);
        project.status = status;
        project.files = Some(files);
        Ok(project)
    }

    /// True when a mask changed since load or the last save.
    pub fn is_dirty(&self) -> bool {
        self.canvas.surface.overlay_generation() != self.saved_generation
    }

    pub fn mark_clean(&mut self) {
        self.saved_generation = self.canvas.surface.overlay_generation();
    }

    /// Write both output masks next to the image. No-op for in-memory projects.
    pub fn save(&mut self) -> Result<(), AnnotError> {
        let Some(files) = &self.files else { return Ok(()) };
        io::save_masks(&self.canvas.surface, files)?;
        self.status = ImageStatus::Processed;
        self.mark_clean();
        Ok(())
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty() {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

// ============================================================================
// WORKSPACE – one folder of orthoframes
// ============================================================================

/// Result of stepping through the folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavOutcome {
    Moved(usize),
    /// Already at the first (Prev) or last (Next) image; the index is unchanged.
    EndOfFolder(NavDirection),
    Empty,
}

pub struct Workspace {
    dir: PathBuf,
    names: Vec<String>,
    index: usize,
}

impl Workspace {
    pub fn open(dir: &Path) -> Result<Self, AnnotError> {
        let names = io::list_orthoframes(dir)?;
        if names.is_empty() {
            return Err(AnnotError::NoImages(dir.to_path_buf()));
        }
        crate::log_info!("Found {} orthoframes in {}", names.len(), dir.display());
        Ok(Self { dir: dir.to_path_buf(), names, index: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_name(&self) -> Option<&str> {
        self.names.get(self.index).map(String::as_str)
    }

    pub fn companion(&self, name: &str) -> CompanionFiles {
        CompanionFiles::new(&self.dir, name)
    }

    pub fn current_files(&self) -> Option<CompanionFiles> {
        self.current_name().map(|name| self.companion(name))
    }

    pub fn step(&mut self, dir: NavDirection) -> NavOutcome {
        if self.is_empty() {
            return NavOutcome::Empty;
        }
        let next = match dir {
            NavDirection::Prev => self.index.checked_sub(1),
            NavDirection::Next => Some(self.index + 1).filter(|&i| i < self.names.len()),
        };
        match next {
            Some(i) => {
                self.index = i;
                NavOutcome::Moved(i)
            }
            None => NavOutcome::EndOfFolder(dir),
        }
    }
}

// ============================================================================
// SESSION – workspace plus the image currently open in it
// ============================================================================

#[derive(Default)]
pub struct Session {
    pub workspace: Option<Workspace>,
    pub project: Option<Project>,
    /// Open `NAME.marked.jpg` instead of `NAME.jpg` as the base image.
    pub load_marked: bool,
}

impl Session {
    pub fn new(load_marked: bool) -> Self {
        Self { workspace: None, project: None, load_marked }
    }

    /// Switch to a new folder and open its first image. The image open so far
    /// is saved first.
    pub fn open_folder(&mut self, dir: &Path) -> Result<usize, AnnotError> {
        let workspace = Workspace::open(dir)?;
        self.save_current()?;
        let count = workspace.len();
        self.workspace = Some(workspace);
        self.project = None;
        self.open_current()?;
        Ok(count)
    }

    /// Load the workspace's current image, replacing the open project.
    pub fn open_current(&mut self) -> Result<(), AnnotError> {
        let Some(files) = self.workspace.as_ref().and_then(Workspace::current_files) else {
            return Ok(());
        };
        self.project = Some(Project::open(files, self.load_marked)?);
        Ok(())
    }

    pub fn save_current(&mut self) -> Result<(), AnnotError> {
        match self.project.as_mut() {
            Some(project) => project.save(),
            None => Ok(()),
        }
    }

    /// Leave the current image for its neighbour. Masks are written before
    /// moving, including when the folder end is reached. A failed save does
    /// not block the move; errors are collected in the report.
    pub fn navigate(&mut self, dir: NavDirection) -> NavReport {
        let mut errors = Vec::new();
        if let Err(e) = self.save_current() {
            crate::log_err!("Saving masks failed: {}", e);
            errors.push(e);
        }
        let Some(workspace) = self.workspace.as_mut() else {
            return NavReport { outcome: NavOutcome::Empty, errors };
        };
        let outcome = workspace.step(dir);
        match outcome {
            NavOutcome::Moved(_) => {
                if let Err(e) = self.open_current() {
                    crate::log_err!("Loading image failed: {}", e);
                    errors.push(e);
                }
            }
            NavOutcome::EndOfFolder(_) => {
                crate::log_warn!("Reached the end of the folder");
            }
            NavOutcome::Empty => {}
        }
        NavReport { outcome, errors }
    }
}

/// What a navigation request did.
#[derive(Debug)]
pub struct NavReport {
    pub outcome: NavOutcome,
    pub errors: Vec<AnnotError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{LayerKind, MARK_COLOR_DEFECT};
    use image::{Rgb, RgbImage, RgbaImage};

    fn folder(tag: &str, names: &[&str]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("datmant_project_{}_{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        for name in names {
            RgbImage::from_pixel(6, 4, Rgb([90, 90, 90]))
                .save(dir.join(format!("{}.marked.jpg", name)))
                .unwrap();
        }
        dir
    }

    #[test]
    fn dirty_tracks_mask_generations() {
        let mut p = Project::new("mem", RasterSurface::new(RgbaImage::new(4, 4)));
        assert!(!p.is_dirty());
        p.canvas.surface.set_pixel(LayerKind::Defect, 1, 1, MARK_COLOR_DEFECT);
        assert!(p.is_dirty());
        assert_eq!(p.display_title(), "mem*");
        // Nothing to write for an in-memory image, so it stays dirty.
        p.save().unwrap();
        assert!(p.is_dirty());
        p.mark_clean();
        assert!(!p.is_dirty());
    }

    #[test]
    fn workspace_steps_and_stops_at_ends() {
        let dir = folder("steps", &["a", "b"]);
        let mut ws = Workspace::open(&dir).unwrap();
        assert_eq!(ws.step(NavDirection::Prev), NavOutcome::EndOfFolder(NavDirection::Prev));
        assert_eq!(ws.step(NavDirection::Next), NavOutcome::Moved(1));
        assert_eq!(ws.current_name(), Some("b"));
        assert_eq!(ws.step(NavDirection::Next), NavOutcome::EndOfFolder(NavDirection::Next));
        assert_eq!(ws.index(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_folder_is_reported() {
        let dir = folder("empty", &[]);
        assert!(matches!(Workspace::open(&dir), Err(AnnotError::NoImages(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn navigating_saves_the_image_left_behind() {
        let dir = folder("nav", &["first", "second"]);
        let mut session = Session::new(true);
        assert_eq!(session.open_folder(&dir).unwrap(), 2);

        let project = session.project.as_mut().unwrap();
        assert_eq!(project.name, "first");
        assert_eq!(project.status, ImageStatus::New);
        project.canvas.surface.set_pixel(LayerKind::Defect, 2, 2, MARK_COLOR_DEFECT);

        assert_eq!(session.navigate(NavDirection::Next).outcome, NavOutcome::Moved(1));
        assert_eq!(session.project.as_ref().unwrap().name, "second");
        let first = CompanionFiles::new(&dir, "first");
        assert_eq!(first.status(), ImageStatus::Processed);

        // Last image: still saved, stays open.
        let report = session.navigate(NavDirection::Next);
        assert!(report.errors.is_empty());
        assert_eq!(report.outcome, NavOutcome::EndOfFolder(NavDirection::Next));
        assert_eq!(CompanionFiles::new(&dir, "second").status(), ImageStatus::Processed);
        assert_eq!(session.project.as_ref().unwrap().name, "second");

        // Coming back restores the saved defect.
        session.navigate(NavDirection::Prev);
        let project = session.project.as_ref().unwrap();
        assert_eq!(project.status, ImageStatus::Processed);
        assert!(project.canvas.surface.layer(LayerKind::Defect).is_painted(2, 2));
        let _ = std::fs::remove_dir_all(&dir);
    }
}

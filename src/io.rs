use std::path::{Path, PathBuf};

use image::{GrayImage, ImageError};

use crate::canvas::{LayerKind, MaskLayer, RasterSurface};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum AnnotError {
    Io(std::io::Error),
    Image(ImageError),
    DimensionMismatch {
        path: PathBuf,
        expected: (u32, u32),
        found: (u32, u32),
    },
    NoImages(PathBuf),
}

impl std::fmt::Display for AnnotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnnotError::Io(e) => write!(f, "I/O error: {}", e),
            AnnotError::Image(e) => write!(f, "Image error: {}", e),
            AnnotError::DimensionMismatch { path, expected, found } => write!(
                f,
                "{} is {}x{}, expected {}x{}",
                path.display(),
                found.0,
                found.1,
                expected.0,
                expected.1
            ),
            AnnotError::NoImages(dir) => write!(f, "No orthoframes found in {}", dir.display()),
        }
    }
}

impl std::error::Error for AnnotError {}

impl From<std::io::Error> for AnnotError {
    fn from(e: std::io::Error) -> Self {
        AnnotError::Io(e)
    }
}

impl From<ImageError> for AnnotError {
    fn from(e: ImageError) -> Self {
        AnnotError::Image(e)
    }
}

// ============================================================================
// COMPANION FILES
// ============================================================================

/// Suffix that marks an orthoframe in a folder listing.
pub const MARKED_SUFFIX: &str = ".marked.jpg";
/// Look-alike suffix that must not be listed.
pub const CUT_MARKED_SUFFIX: &str = ".cut.marked.jpg";

/// Pixel values of the paved-area mask files: 0 = not paved (painted), 255 = paved.
const CUT_NOT_PAVED: u8 = 0;
const CUT_PAVED: u8 = 255;
/// Pixel values of the defect mask file: 255 = defect, 0 = none.
const DEFECT_ON: u8 = 255;
const DEFECT_OFF: u8 = 0;

/// Annotation progress of one orthoframe, derived from which files exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageStatus {
    /// A defect mask has been written.
    Processed,
    /// Only the corrected paved-area mask exists.
    SeenBefore,
    New,
}

impl ImageStatus {
    pub fn label(self) -> &'static str {
        match self {
            ImageStatus::Processed => "processed",
            ImageStatus::SeenBefore => "seen before",
            ImageStatus::New => "new",
        }
    }
}

/// Paths of every file that belongs to orthoframe `NAME` in a folder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompanionFiles {
    dir: PathBuf,
    name: String,
}

impl CompanionFiles {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self { dir: dir.into(), name: name.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn path(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{}", self.name, suffix))
    }

    pub fn base_image(&self) -> PathBuf {
        self.path(".jpg")
    }

    pub fn marked_image(&self) -> PathBuf {
        self.path(MARKED_SUFFIX)
    }

    pub fn cut_mask(&self) -> PathBuf {
        self.path(".cut.mask.png")
    }

    pub fn cut_mask_v2(&self) -> PathBuf {
        self.path(".cut.mask_v2.png")
    }

    pub fn defect_mask(&self) -> PathBuf {
        self.path(".defect.mask.png")
    }

    pub fn status(&self) -> ImageStatus {
        if self.defect_mask().exists() {
            ImageStatus::Processed
        } else if self.cut_mask_v2().exists() {
            ImageStatus::SeenBefore
        } else {
            ImageStatus::New
        }
    }

    /// Every companion path with a short label, for status reports.
    pub fn all(&self) -> [(&'static str, PathBuf); 5] {
        [
            ("image", self.base_image()),
            ("marked", self.marked_image()),
            ("cut mask", self.cut_mask()),
            ("cut mask v2", self.cut_mask_v2()),
            ("defect mask", self.defect_mask()),
        ]
    }
}

/// Orthoframe base names in `dir`, sorted. A name is the file name up to its
/// first `.` for every `*.marked.jpg` that is not a `*.cut.marked.jpg`.
pub fn list_orthoframes(dir: &Path) -> Result<Vec<String>, AnnotError> {
    if !dir.is_dir() {
        return Err(AnnotError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", dir.display()),
        )));
    }
    let pattern = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{}/*{}", pattern, MARKED_SUFFIX);

    let mut names: Vec<String> = match glob::glob(&pattern) {
        Ok(entries) => entries
            .flatten()
            .filter_map(|path| {
                let file = path.file_name()?.to_str()?.to_string();
                if file.ends_with(CUT_MARKED_SUFFIX) {
                    return None;
                }
                let name = file.split('.').next()?.to_string();
                (!name.is_empty()).then_some(name)
            })
            .collect(),
        Err(e) => {
            crate::log_warn!("Invalid folder pattern {}: {}", pattern, e);
            Vec::new()
        }
    };
    names.sort();
    names.dedup();
    Ok(names)
}

// ============================================================================
// LOAD / SAVE
// ============================================================================

/// Decode a grayscale companion mask. `Ok(None)` when the file does not exist.
fn read_seed(path: &Path, width: u32, height: u32) -> Result<Option<GrayImage>, AnnotError> {
    if !path.exists() {
        return Ok(None);
    }
    let gray = image::open(path)?.into_luma8();
    if gray.dimensions() != (width, height) {
        return Err(AnnotError::DimensionMismatch {
            path: path.to_path_buf(),
            expected: (width, height),
            found: gray.dimensions(),
        });
    }
    Ok(Some(gray))
}

/// Unreadable or wrongly sized seeds count as missing, with a warning.
fn load_seed(path: &Path, width: u32, height: u32) -> Option<GrayImage> {
    match read_seed(path, width, height) {
        Ok(seed) => seed,
        Err(e) => {
            crate::log_warn!("{}; ignoring it", e);
            None
        }
    }
}

/// Open an orthoframe with its seed masks.
///
/// The base is `NAME.marked.jpg` when `use_marked` is set, else `NAME.jpg`,
/// falling back to the other when the preferred one is missing. The paved-area
/// layer is seeded from `cut.mask_v2` if present, else `cut.mask`; the defect
/// layer from `defect.mask`. Absent seeds leave the layer blank.
pub fn load_orthoframe(files: &CompanionFiles, use_marked: bool) -> Result<RasterSurface, AnnotError> {
    let (preferred, fallback) = if use_marked {
        (files.marked_image(), files.base_image())
    } else {
        (files.base_image(), files.marked_image())
    };
    let base_path = if preferred.exists() || !fallback.exists() {
        preferred
    } else {
        crate::log_warn!("{} missing, using {}", preferred.display(), fallback.display());
        fallback
    };

    let base = image::open(&base_path)?.into_rgba8();
    let (w, h) = base.dimensions();
    let mut surface = RasterSurface::new(base);

    let cut = load_seed(&files.cut_mask_v2(), w, h).or_else(|| load_seed(&files.cut_mask(), w, h));
    match cut {
        Some(gray) => {
            let layer = MaskLayer::from_gray(&gray, LayerKind::Mask.color(), |v| v == CUT_NOT_PAVED);
            surface.load_mask(LayerKind::Mask, layer);
        }
        None => {
            crate::log_warn!("No paved-area mask for {}, starting blank", files.name());
        }
    }
    if let Some(gray) = load_seed(&files.defect_mask(), w, h) {
        let layer = MaskLayer::from_gray(&gray, LayerKind::Defect.color(), |v| v == DEFECT_ON);
        surface.load_mask(LayerKind::Defect, layer);
    }

    crate::log_info!("Loaded {} ({}x{}) from {}", files.name(), w, h, base_path.display());
    Ok(surface)
}

/// Write the corrected paved-area mask (`cut.mask_v2`) and the defect mask.
pub fn save_masks(surface: &RasterSurface, files: &CompanionFiles) -> Result<(), AnnotError> {
    std::fs::create_dir_all(files.dir())?;

    let cut = surface.layer(LayerKind::Mask).to_gray(CUT_NOT_PAVED, CUT_PAVED);
    cut.save(files.cut_mask_v2())?;

    let defect = surface.layer(LayerKind::Defect).to_gray(DEFECT_ON, DEFECT_OFF);
    defect.save(files.defect_mask())?;

    crate::log_info!("Saved masks for {}", files.name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    /// Fresh, empty directory unique to one test.
    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("datmant_io_{}_{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_jpg(path: &Path, w: u32, h: u32) {
        RgbImage::from_pixel(w, h, Rgb([120, 120, 120])).save(path).unwrap();
    }

    #[test]
    fn companion_names() {
        let f = CompanionFiles::new("/data", "F0001");
        assert_eq!(f.base_image(), PathBuf::from("/data/F0001.jpg"));
        assert_eq!(f.marked_image(), PathBuf::from("/data/F0001.marked.jpg"));
        assert_eq!(f.cut_mask(), PathBuf::from("/data/F0001.cut.mask.png"));
        assert_eq!(f.cut_mask_v2(), PathBuf::from("/data/F0001.cut.mask_v2.png"));
        assert_eq!(f.defect_mask(), PathBuf::from("/data/F0001.defect.mask.png"));
    }

    #[test]
    fn listing_skips_cut_marked_and_sorts() {
        let dir = temp_dir("list");
        for file in ["b.marked.jpg", "a.marked.jpg", "a.cut.marked.jpg", "c.jpg", "notes.txt"] {
            std::fs::write(dir.join(file), b"x").unwrap();
        }
        assert_eq!(list_orthoframes(&dir).unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert!(list_orthoframes(&dir.join("missing")).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn status_follows_existing_files() {
        let dir = temp_dir("status");
        let f = CompanionFiles::new(&dir, "x");
        assert_eq!(f.status(), ImageStatus::New);
        std::fs::write(f.cut_mask_v2(), b"x").unwrap();
        assert_eq!(f.status(), ImageStatus::SeenBefore);
        std::fs::write(f.defect_mask(), b"x").unwrap();
        assert_eq!(f.status(), ImageStatus::Processed);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_seeds_layers_and_save_writes_them_back() {
        let dir = temp_dir("load_save");
        let f = CompanionFiles::new(&dir, "frame");
        write_jpg(&f.marked_image(), 8, 6);

        let mut cut = GrayImage::from_pixel(8, 6, Luma([CUT_PAVED]));
        cut.put_pixel(1, 1, Luma([CUT_NOT_PAVED]));
        cut.save(f.cut_mask()).unwrap();

        let surface = load_orthoframe(&f, true).unwrap();
        assert_eq!((surface.width(), surface.height()), (8, 6));
        assert!(surface.layer(LayerKind::Mask).is_painted(1, 1));
        assert_eq!(surface.layer(LayerKind::Mask).painted_count(), 1);
        assert_eq!(surface.layer(LayerKind::Defect).painted_count(), 0);

        save_masks(&surface, &f).unwrap();
        let v2 = image::open(f.cut_mask_v2()).unwrap().into_luma8();
        assert_eq!(v2.get_pixel(1, 1)[0], CUT_NOT_PAVED);
        assert_eq!(v2.get_pixel(0, 0)[0], CUT_PAVED);
        let defect = image::open(f.defect_mask()).unwrap().into_luma8();
        assert!(defect.pixels().all(|p| p[0] == DEFECT_OFF));
        assert_eq!(f.status(), ImageStatus::Processed);

        // The corrected v2 mask takes precedence on the next load.
        let reloaded = load_orthoframe(&f, false).unwrap();
        assert_eq!(reloaded.layer(LayerKind::Mask).painted_count(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn mismatched_seed_is_treated_as_missing() {
        let dir = temp_dir("mismatch");
        let f = CompanionFiles::new(&dir, "frame");
        write_jpg(&f.base_image(), 8, 6);
        GrayImage::from_pixel(4, 4, Luma([DEFECT_ON])).save(f.defect_mask()).unwrap();

        assert!(matches!(
            read_seed(&f.defect_mask(), 8, 6),
            Err(AnnotError::DimensionMismatch { found: (4, 4), .. })
        ));
        let surface = load_orthoframe(&f, false).unwrap();
        assert_eq!(surface.layer(LayerKind::Defect).painted_count(), 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_base_is_an_error() {
        let dir = temp_dir("missing_base");
        let f = CompanionFiles::new(&dir, "ghost");
        assert!(load_orthoframe(&f, true).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}

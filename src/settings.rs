use std::path::{Path, PathBuf};

use crate::components::tools::{DEFAULT_BRUSH_RADIUS, MAX_BRUSH_RADIUS, MIN_BRUSH_RADIUS};

const SETTINGS_FILE: &str = "datmant_settings.cfg";

/// User preferences persisted between sessions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppSettings {
    /// Show the log console panel.
    pub show_log: bool,
    /// Folder opened on startup (empty = none).
    pub image_directory: String,
    /// Open `NAME.marked.jpg` instead of `NAME.jpg` as the base image.
    pub load_marked_image: bool,
    pub brush_radius: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            show_log: false,
            image_directory: String::new(),
            load_marked_image: true,
            brush_radius: DEFAULT_BRUSH_RADIUS,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/datmant/datmant_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\DATMant\datmant_settings.cfg
    /// On macOS:   ~/Library/Application Support/DATMant/datmant_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("datmant");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).unwrap_or_else(|_| {
                std::env::current_exe()
                    .ok()
                    .and_then(|p| p.parent().map(|d| d.to_string_lossy().into_owned()))
                    .unwrap_or_default()
            });
            let config_dir = PathBuf::from(appdata).join("DATMant");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("DATMant");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join(SETTINGS_FILE)))
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "show_log={}\n\
             image_directory={}\n\
             load_marked_image={}\n\
             brush_radius={}\n",
            self.show_log, self.image_directory, self.load_marked_image, self.brush_radius,
        )
    }

    /// Parse `key=value` lines. Unknown keys and malformed values keep their defaults.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "show_log" => s.show_log = val == "true",
                "image_directory" => s.image_directory = val.to_string(),
                "load_marked_image" => s.load_marked_image = val != "false",
                "brush_radius" => {
                    s.brush_radius = val
                        .parse::<u32>()
                        .map(|r| r.clamp(MIN_BRUSH_RADIUS, MAX_BRUSH_RADIUS))
                        .unwrap_or(DEFAULT_BRUSH_RADIUS);
                }
                _ => {}
            }
        }
        s
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_config_string())
    }

    /// Missing or unreadable file gives the defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_str(&content),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            crate::log_warn!("Could not write settings to {}: {}", path.display(), e);
        }
    }

    /// Write to `path` only when something differs from `last_saved`, which is
    /// updated on success. Returns whether the file was written.
    pub fn save_changed_to(&self, path: &Path, last_saved: &mut Self) -> std::io::Result<bool> {
        if self == last_saved {
            return Ok(false);
        }
        self.save_to(path)?;
        *last_saved = self.clone();
        Ok(true)
    }

    pub fn save_if_changed(&self, last_saved: &mut Self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_changed_to(&path, last_saved) {
            crate::log_warn!("Could not write settings to {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Startup folder, if one is remembered and still exists.
    pub fn image_dir(&self) -> Option<PathBuf> {
        let dir = PathBuf::from(self.image_directory.trim());
        (!self.image_directory.trim().is_empty() && dir.is_dir()).then_some(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_file() {
        let dir = std::env::temp_dir().join(format!("datmant_settings_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(SETTINGS_FILE);

        let settings = AppSettings {
            show_log: true,
            image_directory: "/data/frames".into(),
            load_marked_image: false,
            brush_radius: 40,
        };
        settings.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path), settings);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let s = AppSettings::from_config_str("brush_radius=huge\nshow_log=true\nnonsense\nfoo=bar\n");
        assert_eq!(s.brush_radius, DEFAULT_BRUSH_RADIUS);
        assert!(s.show_log);
        assert!(s.load_marked_image);

        let s = AppSettings::from_config_str("brush_radius=9000");
        assert_eq!(s.brush_radius, MAX_BRUSH_RADIUS);
    }

    #[test]
    fn unchanged_settings_are_not_rewritten() {
        let dir = std::env::temp_dir().join(format!("datmant_settings_changed_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(SETTINGS_FILE);

        let mut settings = AppSettings::default();
        let mut saved = settings.clone();
        assert!(!settings.save_changed_to(&path, &mut saved).unwrap());
        assert!(!path.exists());

        // A run of radius changes only reaches disk once, with the final value.
        for radius in 26..=40 {
            settings.brush_radius = radius;
        }
        assert!(settings.save_changed_to(&path, &mut saved).unwrap());
        assert_eq!(saved, settings);
        assert_eq!(AppSettings::load_from(&path).brush_radius, 40);
        assert!(!settings.save_changed_to(&path, &mut saved).unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("datmant_settings_does_not_exist.cfg");
        assert_eq!(AppSettings::load_from(&path), AppSettings::default());
    }
}

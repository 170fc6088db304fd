use camino::{Utf8Path, Utf8PathBuf};
use image::GrayImage;
use indexmap::IndexMap;
use regex::Regex;
use std::fs;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// A reference image the matcher searches for.
///
/// Pixels are stored as 8-bit grayscale; colour is discarded at load time.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    image: GrayImage,
}

impl Template {
    pub fn new(name: impl Into<String>, image: GrayImage) -> Self {
        Self {
            name: name.into(),
            image,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Templates in load order, keyed by file name.
///
/// Iteration order is the tie-break order used by the matcher.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: IndexMap<String, Template>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a template. A template with the same name replaces the old one in place.
    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl FromIterator<Template> for TemplateSet {
    fn from_iter<I: IntoIterator<Item = Template>>(iter: I) -> Self {
        let mut set = TemplateSet::new();
        for template in iter {
            set.insert(template);
        }
        set
    }
}

/// Errors raised while scanning the template folder
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Template folder not found: {0}")]
    FolderNotFound(Utf8PathBuf),

    #[error("Failed to read template folder {path}: {source}")]
    FolderUnreadable {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode template {path}: {source}")]
    Decode {
        path: Utf8PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Loads reference images from a folder and holds the active set.
///
/// The active set is swapped as a whole behind an `Arc`, so a cycle that
/// grabbed the previous set keeps a consistent view while a reload happens.
pub struct TemplateStore {
    /// Matches `.png`, `.jpg` and `.jpeg` file names, case-insensitively
    extension_pattern: Regex,

    active: RwLock<Arc<TemplateSet>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self {
            extension_pattern: Regex::new(r"(?i)\.(png|jpe?g)$")
                .expect("Invalid template extension regex"),
            active: RwLock::new(Arc::new(TemplateSet::new())),
        }
    }

    /// Check whether a file name has an accepted image extension.
    pub fn is_template_file(&self, file_name: &str) -> bool {
        self.extension_pattern.is_match(file_name)
    }

    /// Scan `folder` and decode every accepted image into a new set.
    ///
    /// Files are loaded in lexicographic order of their names. Files that
    /// fail to decode are logged and skipped.
    pub fn load(&self, folder: &Utf8Path) -> Result<TemplateSet, LoadError> {
        if !folder.is_dir() {
            return Err(LoadError::FolderNotFound(folder.to_path_buf()));
        }

        let entries = folder
            .read_dir_utf8()
            .map_err(|source| LoadError::FolderUnreadable {
                path: folder.to_path_buf(),
                source,
            })?;

        let mut paths: Vec<Utf8PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.into_path()),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {}: {}", folder, e);
                    None
                }
            })
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| self.is_template_file(name))
            })
            .collect();
        paths.sort();

        let mut set = TemplateSet::new();
        for path in paths {
            match Self::decode(&path) {
                Ok(template) => {
                    tracing::info!(
                        "Template '{}' loaded ({}x{})",
                        template.name(),
                        template.width(),
                        template.height()
                    );
                    set.insert(template);
                }
                Err(e) => tracing::error!("{}", e),
            }
        }

        tracing::info!("Loaded {} templates from {}", set.len(), folder);
        Ok(set)
    }

    /// Replace the active set with the contents of `folder`.
    ///
    /// On failure the active set becomes empty, so stale templates never
    /// survive a reload. The error is returned for the caller to report.
    pub fn reload(&self, folder: &Utf8Path) -> Result<usize, LoadError> {
        let result = self.load(folder);

        let (set, outcome) = match result {
            Ok(set) => {
                let count = set.len();
                if count == 0 {
                    tracing::warn!("No templates found in {}", folder);
                }
                (set, Ok(count))
            }
            Err(e) => {
                tracing::warn!("{} - continuing with no templates", e);
                (TemplateSet::new(), Err(e))
            }
        };

        self.replace(set);
        outcome
    }

    /// Install a prepared set as the active one.
    pub fn replace(&self, set: TemplateSet) {
        let mut active = self.active.write().unwrap();
        *active = Arc::new(set);
    }

    /// Shared handle to the current set.
    pub fn active(&self) -> Arc<TemplateSet> {
        Arc::clone(&self.active.read().unwrap())
    }

    fn decode(path: &Utf8Path) -> Result<Template, LoadError> {
        let image = image::open(path).map_err(|source| LoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        let name = path.file_name().unwrap_or(path.as_str()).to_string();
        Ok(Template::new(name, image.to_luma8()))
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use tempfile::TempDir;

    fn utf8_dir(temp_dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap()
    }

    fn write_png(dir: &Utf8Path, name: &str, size: u32) {
        let image = GrayImage::from_fn(size, size, |x, y| Luma([((x * 31 + y * 17) % 256) as u8]));
        image.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_extension_filter() {
        let store = TemplateStore::new();
        assert!(store.is_template_file("button.png"));
        assert!(store.is_template_file("BUTTON.PNG"));
        assert!(store.is_template_file("photo.Jpg"));
        assert!(store.is_template_file("photo.jpeg"));
        assert!(!store.is_template_file("notes.txt"));
        assert!(!store.is_template_file("image.png.bak"));
        assert!(!store.is_template_file("gif.gif"));
    }

    #[test]
    fn test_load_missing_folder() {
        let store = TemplateStore::new();
        let result = store.load(Utf8Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(LoadError::FolderNotFound(_))));
    }

    #[test]
    fn test_load_skips_corrupt_and_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = utf8_dir(&temp_dir);

        write_png(&dir, "b_ok.png", 8);
        write_png(&dir, "a_ok.PNG", 6);
        fs::write(dir.join("broken.png"), b"not really a png").unwrap();
        fs::write(dir.join("readme.txt"), b"ignored").unwrap();

        let store = TemplateStore::new();
        let set = store.load(&dir).unwrap();

        let names: Vec<&str> = set.names().collect();
        assert_eq!(names, vec!["a_ok.PNG", "b_ok.png"]);
        assert_eq!(set.get("a_ok.PNG").unwrap().width(), 6);
    }

    #[test]
    fn test_reload_replaces_previous_set() {
        let temp_dir = TempDir::new().unwrap();
        let dir = utf8_dir(&temp_dir);
        write_png(&dir, "one.png", 4);
        write_png(&dir, "two.png", 4);

        let store = TemplateStore::new();
        assert_eq!(store.reload(&dir).unwrap(), 2);

        fs::remove_file(dir.join("one.png")).unwrap();
        assert_eq!(store.reload(&dir).unwrap(), 1);

        let active = store.active();
        assert!(active.get("one.png").is_none());
        assert!(active.get("two.png").is_some());
    }

    #[test]
    fn test_reload_failure_empties_active_set() {
        let temp_dir = TempDir::new().unwrap();
        let dir = utf8_dir(&temp_dir);
        write_png(&dir, "one.png", 4);

        let store = TemplateStore::new();
        store.reload(&dir).unwrap();
        assert_eq!(store.active().len(), 1);

        let missing = dir.join("missing");
        assert!(store.reload(&missing).is_err());
        assert!(store.active().is_empty());
    }

    #[test]
    fn test_held_set_survives_reload() {
        let temp_dir = TempDir::new().unwrap();
        let dir = utf8_dir(&temp_dir);
        write_png(&dir, "one.png", 4);

        let store = TemplateStore::new();
        store.reload(&dir).unwrap();
        let held = store.active();

        store.replace(TemplateSet::new());

        assert_eq!(held.len(), 1);
        assert!(store.active().is_empty());
    }

    #[test]
    fn test_template_set_preserves_insertion_order() {
        let set: TemplateSet = ["z.png", "a.png", "m.png"]
            .into_iter()
            .map(|name| Template::new(name, GrayImage::new(1, 1)))
            .collect();

        let names: Vec<&str> = set.iter().map(Template::name).collect();
        assert_eq!(names, vec!["z.png", "a.png", "m.png"]);
    }
}

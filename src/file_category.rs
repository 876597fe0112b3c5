//! File categorization by extension.
//!
//! This module maps file extensions to broad categories (e.g. "Images",
//! "Audio", "Documents"), each of which owns an output directory under the
//! scanned root.
//!
//! # Examples
//!
//! ```
//! use blusort::file_category::{Category, FileMapper};
//!
//! let mapper = FileMapper::default();
//! assert_eq!(mapper.extension_to_category("png"), Some(Category::Image));
//! assert_eq!(mapper.extension_to_category("MP3"), Some(Category::Audio));
//! assert_eq!(mapper.extension_to_category("txt"), None);
//! ```
use std::collections::HashMap;

/// Represents a broad file category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Image files (PNG, JPG, GIF, etc.)
    Image,
    /// Audio files (MP3, WAV, FLAC, etc.)
    Audio,
    /// Video files (MP4, MKV, AVI, etc.)
    Video,
    /// Document files (PDF, DOCX, MD, etc.)
    Document,
    /// Archive files (ZIP, RAR, 7Z, etc.)
    Archive,
    /// Code/Source files (Rust, Python, JavaScript, etc.)
    Code,
    /// Spreadsheet files (XLSX, CSV, ODS, etc.)
    Spreadsheet,
    /// Presentation files (PPTX, ODP, etc.)
    Presentation,
    /// Font files (TTF, OTF, WOFF, etc.)
    Font,
    /// Unknown or uncategorized files
    Other,
}

impl Category {
    /// Every category, in a fixed order.
    pub const ALL: [Category; 10] = [
        Category::Image,
        Category::Audio,
        Category::Video,
        Category::Document,
        Category::Archive,
        Category::Code,
        Category::Spreadsheet,
        Category::Presentation,
        Category::Font,
        Category::Other,
    ];

    /// Returns the output directory name for this category.
    ///
    /// # Examples
    ///
    /// ```
    /// use blusort::file_category::Category;
    ///
    /// assert_eq!(Category::Image.dir_name(), "Images");
    /// assert_eq!(Category::Other.dir_name(), "Other");
    /// ```
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Image => "Images",
            Category::Audio => "Audio",
            Category::Video => "Videos",
            Category::Document => "Documents",
            Category::Archive => "Archives",
            Category::Code => "Code",
            Category::Spreadsheet => "Spreadsheets",
            Category::Presentation => "Presentations",
            Category::Font => "Fonts",
            Category::Other => "Other",
        }
    }

    /// Parses a category from its configuration name.
    ///
    /// Accepts the output directory name in any case ("images", "Images").
    pub fn from_name(name: &str) -> Option<Category> {
        Self::ALL
            .into_iter()
            .find(|category| category.dir_name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Maps file extensions to categories.
///
/// Lookups are case-insensitive. The standard table can be extended with
/// custom mappings from the configuration file.
#[derive(Debug, Clone)]
pub struct FileMapper {
    extension_map: HashMap<String, Category>,
}

impl FileMapper {
    /// Creates a new `FileMapper` with all standard mappings.
    pub fn new() -> Self {
        let mut mapper = Self {
            extension_map: HashMap::new(),
        };
        mapper.populate_standard_mappings();
        mapper
    }

    fn populate_standard_mappings(&mut self) {
        let table: [(Category, &[&str]); 9] = [
            (
                Category::Image,
                &[
                    "png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "tiff", "ico", "heic",
                ],
            ),
            (
                Category::Audio,
                &["mp3", "wav", "ogg", "flac", "aac", "m4a", "wma"],
            ),
            (
                Category::Video,
                &["mp4", "mkv", "avi", "mov", "flv", "wmv", "webm", "3gp"],
            ),
            // No "txt": plain text lands in Other.
            (
                Category::Document,
                &["pdf", "doc", "docx", "html", "htm", "md", "rtf", "odt", "epub"],
            ),
            (
                Category::Archive,
                &["zip", "rar", "7z", "tar", "gz", "bz2", "xz"],
            ),
            (
                Category::Code,
                &[
                    "py", "java", "c", "cpp", "h", "hpp", "js", "ts", "rs", "go", "sh", "bash",
                    "json", "xml", "yaml", "yml", "toml",
                ],
            ),
            (Category::Spreadsheet, &["csv", "xls", "xlsx", "ods"]),
            (Category::Presentation, &["ppt", "pptx", "odp"]),
            (Category::Font, &["ttf", "otf", "woff", "woff2"]),
        ];

        for (category, extensions) in table {
            for ext in extensions {
                self.add_extension_mapping(ext, category);
            }
        }
    }

    /// Adds (or overrides) a file extension to category mapping.
    pub fn add_extension_mapping(&mut self, ext: &str, category: Category) {
        self.extension_map
            .insert(ext.trim_start_matches('.').to_lowercase(), category);
    }

    /// Maps a file extension to a category.
    pub fn extension_to_category(&self, ext: &str) -> Option<Category> {
        self.extension_map.get(&ext.to_lowercase()).copied()
    }

    /// Determines the category for an optional extension, defaulting to
    /// `Category::Other`.
    pub fn categorize(&self, ext: Option<&str>) -> Category {
        ext.and_then(|e| self.extension_to_category(e))
            .unwrap_or(Category::Other)
    }
}

impl Default for FileMapper {
    fn default() -> Self {
        Self::new()
    }
}

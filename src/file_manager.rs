//! # File Management Module
//!
//! Questo modulo gestisce la discovery ricorsiva dei file HEIC/HEIF.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva di file HEIC/HEIF in directory e sottodirectory
//! - Match case-insensitive sulle estensioni (`.heic`, `.HEIC`, `.heif`, `.HEIF`)
//! - Tolleranza agli errori di traversal: un sottopercorso illeggibile viene
//!   loggato e saltato, la discovery continua con quello che riesce a leggere
//!
//! ## Esempio:
//! ```rust,ignore
//! let files = FileManager::find_heic_files(Path::new("/photos"));
//! for file in files {
//!     // convert file
//! }
//! ```

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Manages file discovery for conversion
pub struct FileManager;

impl FileManager {
    /// Find all HEIC/HEIF files under a directory, recursing into subdirectories.
    ///
    /// Traversal errors (e.g. permission denied on a subpath) are logged and
    /// skipped; the function returns whatever it could collect.
    pub fn find_heic_files(input_dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for entry in WalkDir::new(input_dir) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error traversing {}: {}", input_dir.display(), e);
                    continue;
                }
            };

            if entry.file_type().is_file() && Self::is_heic(entry.path()) {
                debug!("Found HEIC file: {}", entry.path().display());
                files.push(entry.path().to_path_buf());
            }
        }

        files
    }

    /// Check if a file has a HEIC/HEIF extension (case-insensitive)
    pub fn is_heic(path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            matches!(ext_lower.as_str(), "heic" | "heif")
        } else {
            false
        }
    }
}

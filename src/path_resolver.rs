//! # Path Resolution Module
//!
//! Centralizza tutta la logica di calcolo dei path di output.
//! Evita duplicazione tra la conversione singola e il batch.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Utility per calcolare i path di output in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// Calcola il path di output per un file sorgente: `<stem>.jpg` nella
    /// cartella di output indicata, oppure accanto al sorgente.
    pub fn output_path(source_path: &Path, output_folder: Option<&Path>) -> Result<PathBuf> {
        let file_stem = source_path.file_stem()
            .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", source_path.display()))?
            .to_string_lossy();

        let filename = format!("{}.jpg", file_stem);

        match output_folder {
            Some(folder) => Ok(folder.join(filename)),
            None => Ok(source_path.with_file_name(filename)),
        }
    }

    /// Calcola la cartella di output per-file in modalità mirror: la directory
    /// relativa del sorgente rispetto alla root di input, riprodotta sotto la
    /// root di output.
    pub fn mirrored_output_folder(
        source_path: &Path,
        input_base_dir: &Path,
        output_root: &Path,
    ) -> PathBuf {
        let relative_dir = match source_path.strip_prefix(input_base_dir) {
            Ok(rel) => rel.parent().unwrap_or(Path::new("")),
            Err(e) => {
                debug!("Strip prefix failed for {}: {} - fallback to parent", source_path.display(), e);
                source_path.parent().unwrap_or(Path::new(""))
            }
        };

        let result = output_root.join(relative_dir);
        debug!("Resolved output folder: {} -> {}", source_path.display(), result.display());
        result
    }

    /// Crea la cartella di output (incluse le directory intermedie) se assente
    pub async fn ensure_output_folder(folder: &Path) -> Result<()> {
        tokio::fs::create_dir_all(folder).await
            .map_err(|e| anyhow::anyhow!("Failed to create output folder {}: {}", folder.display(), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_path_beside_source() {
        let path = PathResolver::output_path(Path::new("/photos/trip/IMG_0001.HEIC"), None).unwrap();
        assert_eq!(path, Path::new("/photos/trip/IMG_0001.jpg"));
    }

    #[test]
    fn test_output_path_in_output_folder() {
        let path = PathResolver::output_path(
            Path::new("/photos/trip/IMG_0001.heic"),
            Some(Path::new("/converted/trip")),
        )
        .unwrap();
        assert_eq!(path, Path::new("/converted/trip/IMG_0001.jpg"));
    }

    #[test]
    fn test_mirrored_output_folder() {
        let folder = PathResolver::mirrored_output_folder(
            Path::new("/photos/2023/vacation/IMG_0001.heic"),
            Path::new("/photos"),
            Path::new("/converted"),
        );
        assert_eq!(folder, Path::new("/converted/2023/vacation"));
    }

    #[test]
    fn test_mirrored_output_folder_root_level_file() {
        let folder = PathResolver::mirrored_output_folder(
            Path::new("/photos/IMG_0001.heic"),
            Path::new("/photos"),
            Path::new("/converted"),
        );
        assert_eq!(folder, Path::new("/converted"));
    }

    #[tokio::test]
    async fn test_ensure_output_folder_creates_intermediate_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b").join("c");

        PathResolver::ensure_output_folder(&nested).await.unwrap();
        assert!(nested.is_dir());

        // Idempotent on existing folders
        PathResolver::ensure_output_folder(&nested).await.unwrap();
    }
}

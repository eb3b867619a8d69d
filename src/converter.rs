//! # HEIC Converter Module
//!
//! Questo è il modulo principale che orchestra tutto il processo di conversione.
//!
//! ## Responsabilità:
//! - Conversione singolo file: decode HEIC → RGB → encode JPEG → attach metadata
//! - Orchestrazione batch: discovery → loop sequenziale → statistiche
//! - Skip idempotente quando l'output esiste già
//! - Verifica metadata post-conversione in modalità verbose
//!
//! ## Flusso di esecuzione per file:
//! 1. Calcola il path di output (`<stem>.jpg`, accanto al sorgente o nella
//!    cartella di output, creata se assente)
//! 2. Se l'output esiste già: skip, successo, file non toccato
//! 3. Decode del sorgente via libheif richiedendo RGB interleaved
//! 4. Estrazione `MetadataBundle` (best-effort, mai fatale)
//! 5. Encode JPEG alla qualità configurata
//! 6. Attach EXIF (catena di priorità), ICC, XMP, blocchi ausiliari
//! 7. Scrittura output; verifica opzionale in verbose
//!
//! ## Error handling:
//! - Qualsiasi errore nella conversione di un file viene catturato, loggato
//!   con il path sorgente, e riportato come `false`: il batch continua
//! - Solo input inesistente / non-directory sono fatali per l'intero batch
//!
//! ## Esempio:
//! ```rust,ignore
//! let converter = HeicConverter::new(ConversionConfig::default())?;
//! let stats = converter.convert_folder(&input_dir, None).await?;
//! ```

use crate::{
    config::ConversionConfig,
    error::ConvertError,
    file_manager::FileManager,
    metadata,
    path_resolver::PathResolver,
    progress::{ProgressManager, RunStats},
};
use anyhow::Result;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use img_parts::jpeg::Jpeg;
use img_parts::Bytes;
use libheif_rs::{ColorSpace, HeifContext, ImageHandle, LibHeif, RgbChroma};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Outcome of a single file conversion. An existing destination is an
/// idempotent skip and is reported as success to callers.
#[derive(Debug)]
enum ConversionOutcome {
    Converted(PathBuf),
    Skipped(PathBuf),
}

/// HEIC/HEIF to JPEG converter
pub struct HeicConverter {
    config: ConversionConfig,
    lib_heif: LibHeif,
}

impl HeicConverter {
    /// Create a new converter with a validated configuration
    pub fn new(config: ConversionConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            lib_heif: LibHeif::new(),
        })
    }

    /// Convert a single HEIC file to JPEG.
    ///
    /// Returns `true` on success (including the idempotent skip when the
    /// output already exists), `false` on any failure. Errors never
    /// propagate: they are logged with the source path and swallowed.
    pub async fn convert_single_file(
        &self,
        source_path: &Path,
        output_folder: Option<&Path>,
    ) -> bool {
        match self.try_convert(source_path, output_folder).await {
            Ok(ConversionOutcome::Converted(output_path)) => {
                info!("Successfully converted: {}", output_path.display());
                true
            }
            Ok(ConversionOutcome::Skipped(_)) => true,
            Err(e) => {
                error!("Error converting {}: {:#}", source_path.display(), e);
                false
            }
        }
    }

    async fn try_convert(
        &self,
        source_path: &Path,
        output_folder: Option<&Path>,
    ) -> Result<ConversionOutcome> {
        if let Some(folder) = output_folder {
            PathResolver::ensure_output_folder(folder).await?;
        }

        let output_path = PathResolver::output_path(source_path, output_folder)?;

        if output_path.exists() {
            info!(
                "Skipping {} - output already exists",
                source_path.file_name().unwrap_or_default().to_string_lossy()
            );
            return Ok(ConversionOutcome::Skipped(output_path));
        }

        info!(
            "Converting: {} -> {}",
            source_path.file_name().unwrap_or_default().to_string_lossy(),
            output_path.file_name().unwrap_or_default().to_string_lossy()
        );

        let source_data = tokio::fs::read(source_path).await?;
        let context = HeifContext::read_from_bytes(&source_data)?;
        let handle = context.primary_image_handle()?;

        // Metadata first: extraction is best-effort and never fails
        let bundle = metadata::extract_metadata(&handle, source_path);
        if bundle.is_empty() {
            debug!("No metadata found in {}", source_path.display());
        }

        let rgb = self.decode_to_rgb(&handle)?;
        let encoded = self.encode_jpeg(&rgb)?;

        let mut jpeg = Jpeg::from_bytes(Bytes::from(encoded))
            .map_err(|e| ConvertError::Metadata(format!("Failed to parse encoded JPEG: {e}")))?;
        metadata::attach_metadata(&mut jpeg, &bundle);

        tokio::fs::write(&output_path, jpeg.encoder().bytes()).await?;

        if self.config.verbose {
            self.log_verification(source_path, &output_path);
        }

        Ok(ConversionOutcome::Converted(output_path))
    }

    /// Decode the primary image to an interleaved RGB buffer. libheif performs
    /// the color conversion for sources that are not already RGB.
    fn decode_to_rgb(&self, handle: &ImageHandle) -> Result<RgbImage, ConvertError> {
        let decoded = self
            .lib_heif
            .decode(handle, ColorSpace::Rgb(RgbChroma::Rgb), None)?;

        let planes = decoded.planes();
        let plane = planes.interleaved.ok_or_else(|| {
            ConvertError::Validation("Decoded image has no interleaved RGB plane".to_string())
        })?;

        let width = plane.width;
        let height = plane.height;
        let row_bytes = width as usize * 3;

        // The decoder may pad rows; copy row by row honoring the stride
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * plane.stride;
            pixels.extend_from_slice(&plane.data[start..start + row_bytes]);
        }

        RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
            ConvertError::Validation("Decoded pixel buffer has unexpected size".to_string())
        })
    }

    fn encode_jpeg(&self, rgb: &RgbImage) -> Result<Vec<u8>, ConvertError> {
        let mut buf = Vec::new();
        // quality is validated to 1-100 at construction, the cast cannot truncate
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, self.config.quality as u8);
        encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)?;
        Ok(buf)
    }

    /// Re-open source and destination and log what survived. Informational
    /// only: the conversion result is already decided at this point.
    fn log_verification(&self, source_path: &Path, output_path: &Path) {
        let verification = metadata::verify_preservation(source_path, output_path);

        if verification.exif_preserved {
            info!("✓ EXIF preserved: {} tags", verification.preserved_tags.len());
            debug!("Preserved EXIF tags: {:04X?}", verification.preserved_tags);
        } else {
            warn!("✗ No EXIF data preserved");
        }

        if verification.icc_profile_preserved {
            info!("✓ ICC color profile preserved");
        } else {
            debug!("No ICC profile to preserve");
        }

        debug!(
            "Verification: original metadata blocks: {}, converted segments: {}",
            verification.metadata_count_original, verification.metadata_count_converted
        );
    }

    /// Convert all HEIC files under a folder, sequentially.
    ///
    /// When an output root is given, the input subdirectory structure is
    /// mirrored under it; otherwise outputs are written beside their sources.
    /// Per-file failures are counted and never stop the batch.
    pub async fn convert_folder(
        &self,
        input_folder: &Path,
        output_folder: Option<&Path>,
    ) -> Result<RunStats> {
        if !input_folder.exists() {
            return Err(ConvertError::InvalidInput(format!(
                "Input folder does not exist: {}",
                input_folder.display()
            ))
            .into());
        }

        if !input_folder.is_dir() {
            return Err(ConvertError::InvalidInput(format!(
                "Input path is not a directory: {}",
                input_folder.display()
            ))
            .into());
        }

        let heic_files = FileManager::find_heic_files(input_folder);

        if heic_files.is_empty() {
            warn!("No HEIC files found in {}", input_folder.display());
            return Ok(RunStats::default());
        }

        info!("Found {} HEIC files to convert", heic_files.len());

        let progress = ProgressManager::new(heic_files.len() as u64);
        let mut stats = RunStats::new(heic_files.len());

        for heic_file in &heic_files {
            let file_output_folder = output_folder.map(|root| {
                PathResolver::mirrored_output_folder(heic_file, input_folder, root)
            });

            let success = self
                .convert_single_file(heic_file, file_output_folder.as_deref())
                .await;

            let name = heic_file.file_name().unwrap_or_default().to_string_lossy();
            if success {
                stats.add_converted();
                progress.update(&format!("✅ {}", name));
            } else {
                stats.add_failed();
                progress.update(&format!("❌ {}", name));
            }
        }

        progress.finish(&stats.format_summary());

        info!("=== Conversion Complete ===");
        info!("Total files: {}", stats.total);
        info!("Converted: {}", stats.converted);
        info!("Failed: {}", stats.failed);
        info!("Success rate: {:.1}%", stats.success_rate_percent());

        Ok(stats)
    }
}

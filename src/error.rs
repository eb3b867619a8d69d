//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `ConvertError` enum per categorizzare tutti gli errori possibili
//! - Fornisce messaggi di errore descrittivi e strutturati
//! - Integra con `thiserror` per automatic error conversion
//! - Supporta error chaining per mantenere il contesto degli errori
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, etc.)
//! - `Decode`: Errori di decodifica HEIC/HEIF (libheif)
//! - `Encode`: Errori di encoding JPEG
//! - `Metadata`: Errori di preservazione metadata EXIF/ICC/XMP
//! - `InvalidInput`: Percorso di input mancante o non directory
//! - `Validation`: Errori di validazione input
//!
//! ## Esempio:
//! ```rust,ignore
//! if !input.is_dir() {
//!     return Err(ConvertError::InvalidInput(format!(
//!         "Input path is not a directory: {}", input.display()
//!     )));
//! }
//! ```

/// Custom error types for HEIC conversion
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HEIC decode error: {0}")]
    Decode(#[from] libheif_rs::HeifError),

    #[error("JPEG encode error: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Metadata preservation error: {0}")]
    Metadata(String),

    #[error("Invalid input location: {0}")]
    InvalidInput(String),

    #[error("File validation error: {0}")]
    Validation(String),
}

//! # HEIC to JPEG Converter Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom per diverse operazioni
//! - `file_manager`: Discovery ricorsiva dei file HEIC/HEIF
//! - `path_resolver`: Calcolo dei path di output e mirroring directory
//! - `metadata`: Estrazione e reinserimento best-effort dei metadata
//! - `converter`: Conversione singolo file e orchestrazione batch
//! - `progress`: Progress tracking e statistiche per run
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use heic2jpg::{ConversionConfig, HeicConverter};
//!
//! let config = ConversionConfig::default();
//! let converter = HeicConverter::new(config)?;
//! let stats = converter.convert_folder(&path, None).await?;
//! ```

pub mod config;
pub mod converter;
pub mod error;
pub mod file_manager;
pub mod metadata;
pub mod path_resolver;
pub mod progress;

pub use config::ConversionConfig;
pub use converter::HeicConverter;
pub use error::ConvertError;
pub use metadata::{MetadataBundle, MetadataVerification};
pub use progress::RunStats;

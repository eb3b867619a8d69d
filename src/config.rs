//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `ConversionConfig` con i parametri di conversione
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `quality`: Qualità JPEG (1-100, default: 95)
//! - `verbose`: Logging dettagliato + verifica metadata post-conversione (default: false)
//!
//! ## Validazione:
//! - Controlla che quality sia 1-100
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = ConversionConfig {
//!     quality: 85,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for HEIC to JPEG conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// JPEG quality (1-100). Wider than the encoder's range so that any
    /// out-of-range user input reaches `validate` instead of failing earlier
    /// at the parsing boundary.
    pub quality: u32,
    /// Verbose logging and post-conversion metadata verification
    pub verbose: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            quality: 95,
            verbose: false,
        }
    }
}

impl ConversionConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.quality == 0 || self.quality > 100 {
            return Err(anyhow::anyhow!("JPEG quality must be between 1 and 100"));
        }

        Ok(())
    }

    /// Load configuration from file
    pub async fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: ConversionConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = ConversionConfig::default();
        assert!(config.validate().is_ok());

        config.quality = 0;
        assert!(config.validate().is_err());

        config.quality = 101;
        assert!(config.validate().is_err());

        // Values that overflow the encoder's byte range must still be
        // rejected by validation, not by an earlier integer conversion
        config.quality = 300;
        assert!(config.validate().is_err());

        config.quality = 1;
        assert!(config.validate().is_ok());

        config.quality = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_default() {
        let config = ConversionConfig::default();
        assert_eq!(config.quality, 95);
        assert!(!config.verbose);
    }

    #[test]
    fn test_config_stores_values_unchanged() {
        for quality in [1u32, 50, 95, 100] {
            for verbose in [false, true] {
                let config = ConversionConfig { quality, verbose };
                assert_eq!(config.quality, quality);
                assert_eq!(config.verbose, verbose);
                assert!(config.validate().is_ok());
            }
        }
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = ConversionConfig {
            quality: 85,
            verbose: true,
        };

        // Save config
        original_config.save_to_file(&config_path).await.unwrap();

        // Load config
        let loaded_config = ConversionConfig::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.quality, 85);
        assert!(loaded_config.verbose);
    }

    #[tokio::test]
    async fn test_config_load_missing_file_gives_default() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("missing.json");

        let loaded = ConversionConfig::from_file(&config_path).await.unwrap();
        assert_eq!(loaded.quality, 95);
        assert!(!loaded.verbose);
    }
}

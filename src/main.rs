//! # HEIC to JPEG Converter - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Validazione della configurazione prima di qualsiasi conversione
//! - Mapping delle statistiche del run sull'exit code
//!
//! ## Exit codes:
//! - 0: tutti i file convertiti (incluso il caso "nessun file trovato")
//! - 1: almeno un fallimento ma almeno un successo
//! - 2: fallimento totale (tutte le conversioni tentate sono fallite)
//! - 3: errore top-level inatteso (es. percorso di input invalido)
//! - 4: configurazione invalida (quality fuori range)
//!
//! ## Esempio di utilizzo:
//! ```bash
//! heic2jpg /path/to/photos --output /path/to/converted --quality 90 --verbose
//! ```

use clap::Parser;
use std::path::PathBuf;

use heic2jpg::{ConversionConfig, HeicConverter, RunStats};

#[derive(Parser)]
#[command(name = "heic2jpg")]
#[command(about = "Convert HEIC images to JPEG format while preserving metadata")]
struct Args {
    /// Path to folder containing HEIC images
    input_folder: PathBuf,

    /// Output folder (default: write beside each source file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JPEG quality (1-100)
    #[arg(short, long, default_value = "95")]
    quality: u32,

    /// Verbose logging and metadata preservation verification
    #[arg(short, long)]
    verbose: bool,
}

fn exit_code_for(stats: &RunStats) -> i32 {
    if stats.failed == 0 {
        0
    } else if stats.converted > 0 {
        1
    } else {
        2
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging - only the binary touches global logging state
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error: failed to initialize logging: {e}");
        std::process::exit(3);
    }

    let config = ConversionConfig {
        quality: args.quality,
        verbose: args.verbose,
    };

    // Reject bad configuration before any file I/O
    let converter = match HeicConverter::new(config) {
        Ok(converter) => converter,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(4);
        }
    };

    match converter
        .convert_folder(&args.input_folder, args.output.as_deref())
        .await
    {
        Ok(stats) => std::process::exit(exit_code_for(&stats)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(3);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        let all_ok = RunStats {
            total: 3,
            converted: 3,
            failed: 0,
            skipped: 0,
        };
        assert_eq!(exit_code_for(&all_ok), 0);

        let none_found = RunStats::default();
        assert_eq!(exit_code_for(&none_found), 0);

        let partial = RunStats {
            total: 3,
            converted: 1,
            failed: 2,
            skipped: 0,
        };
        assert_eq!(exit_code_for(&partial), 1);

        let total_failure = RunStats {
            total: 2,
            converted: 0,
            failed: 2,
            skipped: 0,
        };
        assert_eq!(exit_code_for(&total_failure), 2);
    }

    #[test]
    fn test_out_of_range_quality_parses_and_fails_validation() {
        // Parsing must accept the value so that configuration validation,
        // not the argument parser, decides the exit code
        let args = Args::try_parse_from(["heic2jpg", "/photos", "--quality", "300"]).unwrap();
        assert_eq!(args.quality, 300);

        let config = ConversionConfig {
            quality: args.quality,
            verbose: args.verbose,
        };
        assert!(HeicConverter::new(config).is_err());
    }
}

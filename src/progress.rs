//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche di conversione.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per feedback real-time
//! - Tracking statistiche di conversione (file convertiti, falliti)
//! - Report finale con percentuale di successo
//!
//! ## Statistiche tracciate:
//! - **total**: Totale file HEIC trovati
//! - **converted**: File convertiti con successo (inclusi gli skip idempotenti)
//! - **failed**: File la cui conversione è fallita
//! - **skipped**: Riservato per compatibilità di formato, mai incrementato
//!   separatamente (uno skip per output già esistente conta come converted)
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [========================================] 150/150 (100%) ✅ IMG_0042.heic
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

/// Manages progress reporting for batch conversion
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Statistics for one batch conversion run.
///
/// Invariant at batch completion: `converted + failed == total`. A file whose
/// output already existed is an idempotent skip and counts as `converted`;
/// the `skipped` counter exists for shape compatibility and stays at zero.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunStats {
    pub total: usize,
    pub converted: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn add_converted(&mut self) {
        self.converted += 1;
    }

    pub fn add_failed(&mut self) {
        self.failed += 1;
    }

    pub fn success_rate_percent(&self) -> f64 {
        if self.total > 0 {
            (self.converted as f64 / self.total as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Total: {} | Converted: {} | Failed: {} | Success rate: {:.1}%",
            self.total,
            self.converted,
            self.failed,
            self.success_rate_percent()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_invariant() {
        let mut stats = RunStats::new(5);
        stats.add_converted();
        stats.add_converted();
        stats.add_converted();
        stats.add_failed();
        stats.add_failed();

        assert_eq!(stats.converted + stats.failed, stats.total);
        assert_eq!(stats.skipped, 0);
    }

    #[test]
    fn test_success_rate() {
        let mut stats = RunStats::new(4);
        stats.add_converted();
        stats.add_converted();
        stats.add_converted();
        stats.add_failed();
        assert!((stats.success_rate_percent() - 75.0).abs() < f64::EPSILON);

        let empty = RunStats::new(0);
        assert_eq!(empty.success_rate_percent(), 0.0);
    }

    #[test]
    fn test_format_summary() {
        let mut stats = RunStats::new(2);
        stats.add_converted();
        stats.add_failed();
        let summary = stats.format_summary();
        assert!(summary.contains("Total: 2"));
        assert!(summary.contains("Converted: 1"));
        assert!(summary.contains("Failed: 1"));
        assert!(summary.contains("50.0%"));
    }
}

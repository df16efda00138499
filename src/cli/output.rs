//! Terminal output for batch runs and single results

use colorful::Colorful;

use crate::batch::BatchSummary;
use crate::io::FilterResponseExport;

/// Print the per-run summary: counts, then failures and skipped files.
pub fn print_summary(summary: &BatchSummary, verbose: bool) {
    let total = summary.processed.len() + summary.failed.len() + summary.skipped.len();
    if total == 0 {
        println!("{}", "No input files found!".red());
        return;
    }

    let status = if summary.is_success() {
        format!("✓ {} of {} file(s) processed", summary.processed.len(), total).green()
    } else {
        format!("✗ {} of {} file(s) processed", summary.processed.len(), total).red()
    };
    println!("{} in {:.2}s", status, summary.elapsed_secs());

    if verbose {
        for done in &summary.processed {
            for out in &done.outputs {
                println!("  {} -> {}", done.input.display(), out.display().to_string().cyan());
            }
        }
    }
    for failure in &summary.failed {
        println!(
            "  {} {}: {}",
            "failed".red().bold(),
            failure.input.display(),
            failure.error
        );
    }
    for skipped in &summary.skipped {
        println!("  {} {}", "skipped".yellow(), skipped.display());
    }
}

/// Print a short description of an exported filter response
pub fn print_filter_response(export: &FilterResponseExport, path: &std::path::Path) {
    println!("{}", export.filter.to_string().bold());
    println!("  Sampling rate: {} Hz", export.fs);
    println!("  Grid points:   {}", export.frequency_grid.len());
    let peak = export
        .magnitude_db
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    println!("  Peak gain:     {:.2} dB", peak);
    println!("  Saved to:      {}", path.display().to_string().cyan());
}

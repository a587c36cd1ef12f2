use serde::Serialize;

/// Aggregate counts produced by a replay run.
#[derive(Debug, Default, Serialize)]
pub struct ReplaySummary {
    /// Non-blank lines read.
    pub lines: usize,
    /// Notifications projected into the store.
    pub applied: usize,
    /// Lines that could not be decoded and were skipped.
    pub discarded: usize,
    /// Notifications whose projection failed.
    pub failed: usize,
    /// Documents in the store after the run.
    pub documents: u64,
    /// Wall-clock time for the run in seconds.
    pub elapsed_secs: f64,
}

/// Print a summary of the replay run.
///
/// - `json = true`: emit a pretty-printed JSON object to stdout.
/// - `json = false`: emit a human-readable summary to stdout.
///
/// If `summary.failed > 0`, a warning line is written to **stderr** so that
/// the stdout stream remains clean for downstream JSON consumers.
pub fn print_summary(summary: &ReplaySummary, json: bool) {
    if json {
        match serde_json::to_string_pretty(summary) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("error serialising summary: {}", e),
        }
    } else {
        println!(
            "Replayed {} notifications in {:.2}s",
            summary.lines, summary.elapsed_secs
        );
        println!(
            "  {} applied, {} discarded, {} failed",
            summary.applied, summary.discarded, summary.failed
        );
        println!("  {} documents in store", summary.documents);
    }

    if summary.failed > 0 {
        eprintln!("  {} notifications failed to apply", summary.failed);
    }
}

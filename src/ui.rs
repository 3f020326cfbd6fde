//! Console output for the CLI: the run banner, the final summary, and the
//! degraded-mode warning block. Structured diagnostics go through tracing;
//! this module is only the human-facing surface.

use crate::illustrate::IllustrationOutcome;
use crate::pipeline::{RunOutcome, RunReport};
use crate::store::ArtifactStore;
use console::style;

pub fn print_run_banner(topic: &str, persona: &str, start_pass: u8) {
    println!();
    println!("{}", style("quill — pass pipeline").bold().cyan());
    println!("  topic:   {}", style(topic).bold());
    println!("  persona: {}", persona);
    if start_pass > 1 {
        println!("  resume:  from pass {}", style(start_pass).yellow());
    }
    println!();
}

pub fn print_report(report: &RunReport) {
    println!();
    match report.outcome {
        RunOutcome::Complete => {
            println!("{}", style("✓ Run complete").green().bold());
        }
        RunOutcome::Degraded => {
            println!("{}", style("⚠ Run complete — DEGRADED").yellow().bold());
            println!(
                "{}",
                style("  The final article was produced, but these steps fell back:").yellow()
            );
            for note in &report.degraded {
                println!("  {} {}", style("•").yellow(), note);
            }
            println!(
                "{}",
                style("  Review the artifacts above before publishing.").yellow()
            );
        }
    }
    for pass in &report.skipped {
        println!("  {} {} skipped", style("-").dim(), pass);
    }
    if report.illustration == IllustrationOutcome::Failed {
        println!("  {} cover illustration failed", style("•").yellow());
    }
    println!();
}

/// The `status` subcommand body: artifact inventory for a topic directory.
pub fn print_inventory(store: &ArtifactStore) {
    let artifacts = store.list();
    if artifacts.is_empty() {
        println!("{}", style("No artifacts yet.").dim());
        return;
    }
    println!("{}", style(format!("Artifacts in {}:", store.root().display())).bold());
    for (key, size) in artifacts {
        println!("  {:<28} {:>8} bytes", key, size);
    }
}

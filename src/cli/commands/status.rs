//! Backlog progress without touching the network.

use anyhow::Context;
use console::style;

use artacquire::batch::{Backlog, ProcessedSet, Pull};

use super::Paths;

pub fn cmd_status(paths: &Paths) -> anyhow::Result<()> {
    let backlog = Backlog::from_file(&paths.input)?;
    let processed = ProcessedSet::scan(&paths.output)
        .with_context(|| format!("Failed to scan {}", paths.output.display()))?;

    let mut done = 0usize;
    let mut pending = 0usize;
    let mut malformed = Vec::new();
    let mut cursor = backlog.pending();
    while let Some(pull) = cursor.next_pull(&processed) {
        match pull {
            Pull::Skipped(_) => done += 1,
            Pull::Runnable(_) => pending += 1,
            Pull::Malformed(raw) => malformed.push(raw),
        }
    }

    let separator = "─".repeat(50);
    println!();
    println!("{}", style("artacquire status").bold());
    println!("{}", separator);
    println!("Backlog: {}", paths.input.display());
    println!("Output:  {}", paths.output.display());
    println!();
    println!("  {:<20} {:>10}", "URLs:", backlog.len());
    println!("  {:<20} {:>10}", "Processed:", style(done).green());
    println!("  {:<20} {:>10}", "Pending:", style(pending).yellow());
    println!("  {:<20} {:>10}", "Malformed:", style(malformed.len()).red());
    println!("  {:<20} {:>10}", "Artworks on disk:", processed.len());

    if !malformed.is_empty() {
        println!();
        println!("{}", style("MALFORMED").red().bold());
        for raw in &malformed {
            println!("  {}", raw);
        }
    }
    println!();

    Ok(())
}

//! Identifier lookup for a single URL.

use console::style;

use artacquire::models::ArtworkUrl;

pub fn cmd_id(url: &str) -> anyhow::Result<()> {
    match ArtworkUrl::parse(url) {
        Ok(parsed) => {
            println!("{}", parsed.id());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), e);
            std::process::exit(1);
        }
    }
}

//! Man page generator for rusbasp
//!
//! Writes `rusbasp.1` plus one `rusbasp-<command>.1` page per subcommand
//! (probe, read, write, verify, erase, list-programmers, list-parts), so the
//! memory and programmer options of each device command are documented on
//! their own page.
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::path::PathBuf;

#[path = "../cli.rs"]
mod cli;

/// Render the top-level page followed by one page per subcommand
fn render_pages(cmd: clap::Command) -> std::io::Result<Vec<(String, Vec<u8>)>> {
    let mut pages = Vec::new();

    for sub in cmd.get_subcommands().filter(|s| !s.is_hide_set()) {
        let name = format!("{}-{}", cmd.get_name(), sub.get_name());
        let mut buffer = Vec::new();
        clap_mangen::Man::new(sub.clone())
            .title(name.to_uppercase())
            .render(&mut buffer)?;
        pages.push((format!("{}.1", name), buffer));
    }

    let mut buffer = Vec::new();
    let top = format!("{}.1", cmd.get_name());
    clap_mangen::Man::new(cmd).render(&mut buffer)?;
    pages.insert(0, (top, buffer));

    Ok(pages)
}

fn main() -> std::io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));

    fs::create_dir_all(&output_dir)?;

    let pages = render_pages(cli::Cli::command())?;
    for (file_name, content) in &pages {
        let path = output_dir.join(file_name);
        fs::write(&path, content)?;
        println!("Man page generated at: {}", path.display());
    }

    println!("\nTo view the main page:");
    println!("  man -l {}", output_dir.join("rusbasp.1").display());
    println!("\nTo install system-wide (requires sudo):");
    println!("  sudo cp {}/*.1 /usr/local/share/man/man1/", output_dir.display());
    println!("  sudo mandb");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_page_per_command() {
        let pages = render_pages(cli::Cli::command()).unwrap();
        let names: Vec<&str> = pages.iter().map(|(name, _)| name.as_str()).collect();

        assert_eq!(names[0], "rusbasp.1");
        for expected in [
            "rusbasp-probe.1",
            "rusbasp-read.1",
            "rusbasp-write.1",
            "rusbasp-verify.1",
            "rusbasp-erase.1",
            "rusbasp-list-programmers.1",
            "rusbasp-list-parts.1",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
        assert!(pages.iter().all(|(_, content)| !content.is_empty()));
    }
}

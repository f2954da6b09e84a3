//! `mmd build`: compile a Markdown file into one standalone HTML page.
//!
//! The page embeds its stylesheet, so the output file can be opened or
//! served on its own. `--watch` keeps rebuilding it on every save.

use anyhow::{Context, Result};
use colored::Colorize;
use notify::{EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::config::MmdConfig;
use crate::{line_info, read_source};

/// `notes.md` → `notes.html`, next to the input.
pub fn default_output(file: &Path) -> PathBuf {
    file.with_extension("html")
}

pub fn handle_build(file: &str, out: &Path, config: &MmdConfig, quiet: bool) -> Result<()> {
    let content = read_source(file, config.max_input_bytes)?;
    let result = mini_markdown_ast::parse(&content);

    for diag in &result.diagnostics {
        eprintln!("{}: {}", line_info(file, diag), diag.message);
    }

    let html = result.root.to_html_page(&config.page, &config.render);

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create '{}'", parent.display()))?;
    }
    std::fs::write(out, &html).with_context(|| format!("Failed to write '{}'", out.display()))?;

    tracing::debug!(bytes = html.len(), out = %out.display(), "page written");
    if !quiet {
        println!("{} {}", "Built".green().bold(), out.display());
    }

    Ok(())
}

/// Watch the source file for changes and rebuild on each save.
///
/// Debounces rapid events (editors that write in stages) with a 200ms window.
/// Ctrl+C exits.
pub fn watch_and_rebuild(file: &str, out: &Path, config: &MmdConfig, quiet: bool) -> Result<()> {
    let file_path =
        std::fs::canonicalize(file).with_context(|| format!("Cannot resolve path '{file}'"))?;

    let watch_dir = file_path
        .parent()
        .with_context(|| format!("Cannot determine parent directory of '{file}'"))?;

    println!(
        "{} {} for changes (Ctrl+C to stop)",
        "Watching".cyan().bold(),
        file
    );

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;

    let mut last_rebuild = Instant::now();
    let debounce = Duration::from_millis(200);

    loop {
        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(event) => {
                let is_write = matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_));
                let affects_source = event
                    .paths
                    .iter()
                    .any(|p| p.canonicalize().ok().as_ref() == Some(&file_path));

                if is_write && affects_source && last_rebuild.elapsed() > debounce {
                    // Let the editor finish writing.
                    std::thread::sleep(Duration::from_millis(50));

                    match handle_build(file, out, config, quiet) {
                        Ok(()) => last_rebuild = Instant::now(),
                        Err(e) => eprintln!("{} {:#}", "Build error:".red().bold(), e),
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_swaps_extension() {
        assert_eq!(default_output(Path::new("docs/notes.md")), PathBuf::from("docs/notes.html"));
        assert_eq!(default_output(Path::new("README")), PathBuf::from("README.html"));
    }

    #[test]
    fn build_writes_page_with_config_title() {
        let dir = std::env::temp_dir().join(format!("mmd-build-unit-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("in.md");
        std::fs::write(&input, "# Heading\n\nBody.\n").unwrap();
        let out = dir.join("nested/out.html");

        let mut config = MmdConfig::default();
        config.page.title = Some("From Config".into());
        handle_build(&input.display().to_string(), &out, &config, true).unwrap();

        let html = std::fs::read_to_string(&out).unwrap();
        assert!(html.contains("<title>From Config</title>"));
        assert!(html.contains("<h1>Heading</h1>"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}

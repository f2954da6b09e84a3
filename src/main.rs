use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use mini_markdown_ast::{Diagnostic, Node, Severity};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

mod build;
mod config;

use config::MmdConfig;

/// Environment variable holding the log filter directive.
const LOG_ENV: &str = "MMD_LOG";

#[derive(Parser)]
#[command(name = "mmd", version, about = "Parse, check and render Markdown")]
struct Cli {
    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: mmd.json in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum RenderFormat {
    Html,
    Page,
    Terminal,
    Ast,
    Tree,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a Markdown file
    Render {
        /// Path to the Markdown file, or `-` for stdin
        file: String,

        /// Output format
        #[arg(long, value_enum, default_value = "html")]
        format: RenderFormat,

        /// CSS class prefix for links, images and code blocks
        #[arg(long)]
        class_prefix: Option<String>,

        /// Do not add target="_blank" to links
        #[arg(long)]
        no_link_target: bool,

        /// Page title (with --format page)
        #[arg(long)]
        title: Option<String>,
    },

    /// Check Markdown file(s) and directories for problems
    Check {
        /// Files or directories to check
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Treat warnings as failures
        #[arg(long)]
        strict: bool,
    },

    /// Build a standalone HTML page from a Markdown file
    Build {
        /// Path to the Markdown file
        file: String,

        /// Output file (default: input with an .html extension)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Page title (default: first heading)
        #[arg(long)]
        title: Option<String>,

        /// Rebuild when the file changes
        #[arg(long)]
        watch: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            file,
            format,
            class_prefix,
            no_link_target,
            title,
        } => {
            if let Some(prefix) = class_prefix {
                config.render.class_prefix = prefix;
            }
            if no_link_target {
                config.render.link_target = false;
            }
            if title.is_some() {
                config.page.title = title;
            }
            config
                .render
                .validate()
                .context("Invalid --class-prefix")?;
            handle_render(&file, format, &config, cli.quiet)?;
        }
        Commands::Check { paths, strict } => {
            let failed = handle_check(&paths, strict, &config, cli.quiet)?;
            if failed {
                std::process::exit(1);
            }
        }
        Commands::Build {
            file,
            out,
            title,
            watch,
        } => {
            if title.is_some() {
                config.page.title = title;
            }
            let out = out.unwrap_or_else(|| build::default_output(Path::new(&file)));
            build::handle_build(&file, &out, &config, cli.quiet)?;
            if watch {
                build::watch_and_rebuild(&file, &out, &config, cli.quiet)?;
            }
        }
    }

    Ok(())
}

/// Install the stderr subscriber. `MMD_LOG` wins unless `--verbose` is given.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Read a source file (or stdin for `-`), refusing anything over the limit.
pub(crate) fn read_source(file: &str, max_bytes: usize) -> Result<String> {
    let content = if file == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(file).with_context(|| format!("Failed to read '{file}'"))?
    };

    if content.len() > max_bytes {
        anyhow::bail!(
            "'{}' is {} bytes, over the {} byte limit (maxInputBytes)",
            file,
            content.len(),
            max_bytes
        );
    }
    Ok(content)
}

/// `file:line` prefix for a diagnostic.
pub(crate) fn line_info(file: &str, diag: &Diagnostic) -> String {
    match diag.span {
        Some(span) => format!("{}:{}", file, span.start_line),
        None => file.to_string(),
    }
}

fn handle_render(file: &str, format: RenderFormat, config: &MmdConfig, quiet: bool) -> Result<()> {
    let content = read_source(file, config.max_input_bytes)?;
    let result = mini_markdown_ast::parse(&content);

    if !quiet {
        for diag in &result.diagnostics {
            eprintln!("{}: {}", line_info(file, diag), diag.message);
        }
    }

    let output = match format {
        RenderFormat::Html => result.root.to_html(&config.render),
        RenderFormat::Page => result.root.to_html_page(&config.page, &config.render),
        RenderFormat::Terminal => result.root.to_terminal(),
        RenderFormat::Ast => serde_json::to_string_pretty(&result.root)?,
        RenderFormat::Tree => result.root.to_tree(),
    };

    println!("{output}");
    Ok(())
}

/// Expand directories into their Markdown files, keeping explicit files.
fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry =
                    entry.with_context(|| format!("Failed to walk '{}'", path.display()))?;
                if entry.file_type().is_file() && is_markdown(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn is_markdown(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("md" | "markdown")
    )
}

/// Diagnostics for one file. `.json` files are read as a serialized tree.
fn check_file(path: &Path, config: &MmdConfig) -> Result<Vec<Diagnostic>> {
    let file = path.display().to_string();
    let content = read_source(&file, config.max_input_bytes)?;

    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        let root: Node = serde_json::from_str(&content)
            .with_context(|| format!("'{file}' is not a serialized document tree"))?;
        return Ok(root.validate());
    }

    Ok(mini_markdown_ast::parse(&content).all_diagnostics())
}

/// Print diagnostics for every file. Returns whether the check failed.
fn handle_check(paths: &[PathBuf], strict: bool, config: &MmdConfig, quiet: bool) -> Result<bool> {
    let files = collect_files(paths)?;
    tracing::debug!(count = files.len(), "checking files");
    let mut failed = false;

    for path in &files {
        let file = path.display().to_string();
        let diagnostics = check_file(path, config)?;

        if diagnostics.is_empty() {
            if !quiet {
                println!("{}: {}", file, "OK".green());
            }
            continue;
        }

        for diag in &diagnostics {
            let severity_str = match diag.severity {
                Severity::Error => {
                    failed = true;
                    format!("{}", "error".red().bold())
                }
                Severity::Warning => {
                    failed |= strict;
                    format!("{}", "warning".yellow().bold())
                }
                Severity::Info => format!("{}", "info".cyan().bold()),
            };

            let code_str = match &diag.code {
                Some(c) => format!("[{c}] "),
                None => String::new(),
            };

            println!(
                "{}: {severity_str}: {code_str}{}",
                line_info(&file, diag),
                diag.message
            );
        }
    }

    Ok(failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn markdown_extensions() {
        assert!(is_markdown(Path::new("a/b.md")));
        assert!(is_markdown(Path::new("notes.markdown")));
        assert!(!is_markdown(Path::new("notes.txt")));
        assert!(!is_markdown(Path::new("README")));
    }

    #[test]
    fn oversized_input_rejected() {
        let dir = std::env::temp_dir().join(format!("mmd-read-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("big.md");
        std::fs::write(&path, "x".repeat(64)).unwrap();

        let file = path.display().to_string();
        let err = read_source(&file, 10).unwrap_err();
        assert!(err.to_string().contains("10 byte limit"));
        assert_eq!(read_source(&file, 64).unwrap().len(), 64);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn json_tree_is_validated() {
        let dir = std::env::temp_dir().join(format!("mmd-json-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tree.json");
        std::fs::write(
            &path,
            r#"{"kind":"document","children":[{"kind":"heading","level":9,"children":[]}]}"#,
        )
        .unwrap();

        let diags = check_file(&path, &MmdConfig::default()).unwrap();
        let codes: Vec<_> = diags.iter().filter_map(|d| d.code.as_deref()).collect();
        assert_eq!(codes, vec!["V001"]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}

#![deny(unsafe_code)]

mod exit_code;
mod mirror;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use veil_core::{ControlDevice, Engine, EngineConfig, Inode, Vfs, resolve};

const PROMPT: &str = "Enter path of the file you want to hide:";
const HIDDEN_MESSAGE: &str = "Your file has been hidden.";

/// Conceal files of a mirrored directory tree from listings
#[derive(Parser)]
#[command(name = "veil")]
#[command(author, version)]
#[command(after_help = "EXAMPLES:
    # Hide one file and show what its directory lists
    veil --mirror ./tree --hide /root/secret.txt

    # Prompt for the path on stdin
    echo /root/secret.txt | veil --mirror ./tree

    # Limit the registry through a config file
    veil --mirror ./tree --config veil.toml --hide /a --hide /b
")]
struct Cli {
    /// Host directory copied into the filesystem as `/`
    #[arg(long, value_name = "DIR")]
    mirror: PathBuf,

    /// Absolute path to conceal (repeatable; prompts on stdin when absent)
    #[arg(long, value_name = "PATH")]
    hide: Vec<String>,

    /// Directory to list while concealment is active (defaults to the parents of hidden paths)
    #[arg(long, value_name = "DIR")]
    list: Vec<String>,

    /// Engine configuration file (TOML)
    #[arg(long, value_name = "FILE", env = "VEIL_CONFIG")]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code::GENERAL_ERROR)
        }
    }
}

fn run(cli: &Cli) -> Result<u8> {
    let config = load_config(cli.config.as_deref())?;

    let vfs = Arc::new(Vfs::new());
    let summary = mirror::mirror_into(&vfs, &cli.mirror)?;
    tracing::info!(dirs = summary.dirs, files = summary.files, "Mirror ready");

    let engine = Arc::new(Engine::start(Arc::clone(&vfs), config));
    let device = ControlDevice::new(Arc::clone(&engine));

    let paths = if cli.hide.is_empty() {
        vec![prompt_for_path()?]
    } else {
        cli.hide.clone()
    };

    let mut failed = 0usize;
    {
        let mut session = device
            .open()
            .map_err(|e| io::Error::from_raw_os_error(e.to_errno()))
            .context("Failed to open control channel")?;
        for path in &paths {
            let status = session.write(path.as_bytes());
            if status < 0 {
                eprintln!("Failed to hide {}: status {status}", path.trim_end());
                failed += 1;
            } else {
                println!("{HIDDEN_MESSAGE}");
            }
        }
    }

    let listings = if cli.list.is_empty() {
        default_listings(&paths)
    } else {
        cli.list.clone()
    };
    for dir in &listings {
        if let Err(e) = print_listing(&vfs, dir) {
            eprintln!("Error: {e:#}");
        }
    }

    let report = engine.shutdown();
    if !cli.quiet {
        println!(
            "Restored {} concealed objects ({} tables, {} vanished)",
            report.records, report.restored_tables, report.vanished_objects
        );
    }

    Ok(if failed == 0 {
        exit_code::SUCCESS
    } else {
        exit_code::HIDE_FAILED
    })
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config: {}", path.display()))
}

/// Prompts on stdout and returns one line from stdin, newline included.
fn prompt_for_path() -> Result<String> {
    print!("{PROMPT} ");
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read path from stdin")?;
    Ok(line)
}

/// Parent directories of `paths`, without duplicates, in first-seen order.
fn default_listings(paths: &[String]) -> Vec<String> {
    let mut dirs: Vec<String> = Vec::new();
    for path in paths {
        let path = path.trim_end();
        let parent = match path.trim_end_matches('/').rsplit_once('/') {
            Some(("", _)) | None => "/",
            Some((parent, _)) => parent,
        };
        if !dirs.iter().any(|d| d == parent) {
            dirs.push(parent.to_owned());
        }
    }
    dirs
}

fn open_dir(vfs: &Vfs, path: &str) -> Result<Arc<Inode>> {
    if path.trim_matches('/').is_empty() {
        return Ok(vfs.root());
    }
    let resolved = resolve(vfs, "/", path).with_context(|| format!("Cannot list {path}"))?;
    Ok(resolved.target)
}

fn print_listing(vfs: &Vfs, path: &str) -> Result<()> {
    let dir = open_dir(vfs, path)?;
    let entries = vfs
        .read_dir(&dir)
        .with_context(|| format!("Failed to list {path}"))?;

    println!("{path}:");
    for entry in entries {
        println!("  {}", entry.name);
    }
    Ok(())
}

fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listings_dedups_parents() {
        let paths = vec![
            "/root/a.txt".to_owned(),
            "/root/b.txt\n".to_owned(),
            "/top.txt".to_owned(),
            "/srv/data/".to_owned(),
        ];
        assert_eq!(default_listings(&paths), ["/root", "/", "/srv"]);
    }

    #[test]
    fn test_load_config_defaults_without_file() {
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_cli_parses_repeated_flags() {
        let cli = Cli::try_parse_from([
            "veil", "--mirror", "/tmp/x", "--hide", "/a", "--hide", "/b", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.hide, ["/a", "/b"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.list.is_empty());
    }
}

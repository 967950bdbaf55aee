//! Command-line interface for confstore
//!
//! Read-only inspection of persisted option files. Nothing here loads into
//! or saves a registry.

pub mod inspect;

use crate::config::PersistenceConfig;
use crate::Result;
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use inspect::{inspect, FileSummary};

/// confstore command-line interface
#[derive(Parser)]
#[command(name = "confstore")]
#[command(about = "Inspect persisted option files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct ConfstoreCli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable JSON output for machine-readable results
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show where the option file is read from and written to
    Path,

    /// List the sections of an option file
    Sections {
        /// File to inspect (defaults to the configured file)
        file: Option<PathBuf>,
    },

    /// Show the entries of an option file
    Show {
        /// File to inspect (defaults to the configured file)
        file: Option<PathBuf>,

        /// Only show this section
        #[arg(short, long)]
        section: Option<String>,

        /// Include commented-out default values
        #[arg(short, long)]
        all: bool,
    },

    /// Report lines the loader would skip as syntax errors
    Check {
        /// File to inspect (defaults to the configured file)
        file: Option<PathBuf>,
    },
}

/// CLI command executor
pub struct CliExecutor {
    config: PersistenceConfig,
    json_output: bool,
}

impl CliExecutor {
    pub fn new(mut config: PersistenceConfig, config_override: Option<PathBuf>, json_output: bool) -> Self {
        if config_override.is_some() {
            config.config_path = config_override;
        }
        Self {
            config,
            json_output,
        }
    }

    /// Execute a CLI command
    pub fn execute(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Path => self.execute_path(),
            Commands::Sections { file } => self.execute_sections(file),
            Commands::Show { file, section, all } => self.execute_show(file, section, all),
            Commands::Check { file } => self.execute_check(file),
        }
    }

    fn execute_path(&self) -> Result<()> {
        let path = self.config.config_file();
        let exists = path.exists();

        if self.json_output {
            let output = json!({
                "config_path": path,
                "exists": exists,
                "legacy_path": self.config.legacy_path,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Configuration file: {}{}",
                path.display(),
                if exists { "" } else { " (not created yet)" }
            );
            if let Some(legacy) = &self.config.legacy_path {
                println!("Legacy location:    {}", legacy.display());
            }
        }
        Ok(())
    }

    fn execute_sections(&self, file: Option<PathBuf>) -> Result<()> {
        let summary = self.summarize(file)?;

        if self.json_output {
            let sections: Vec<_> = summary
                .sections
                .iter()
                .map(|section| {
                    json!({
                        "name": section.name,
                        "display_name": section.display_name,
                        "entries": section.entries.len(),
                        "changed": section.active_entries().count(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&sections)?);
        } else if summary.sections.is_empty() {
            println!("No sections found.");
        } else {
            println!("Sections:");
            for section in &summary.sections {
                println!(
                    "  [{}]{} - {} options, {} changed",
                    section.name,
                    section
                        .display_name
                        .as_ref()
                        .map(|d| format!(" {}", d))
                        .unwrap_or_default(),
                    section.entries.len(),
                    section.active_entries().count()
                );
            }
        }
        Ok(())
    }

    fn execute_show(&self, file: Option<PathBuf>, section: Option<String>, all: bool) -> Result<()> {
        let summary = self.summarize(file)?;

        let sections: Vec<_> = match &section {
            Some(name) => {
                let found = summary
                    .section(name)
                    .with_context(|| format!("Section not found: {}", name))?;
                vec![found.clone()]
            }
            None => summary.sections.clone(),
        };

        if self.json_output {
            println!("{}", serde_json::to_string_pretty(&sections)?);
            return Ok(());
        }

        for section in &sections {
            println!("[{}]", section.name);
            for entry in section.entries.iter().filter(|e| all || !e.commented) {
                let marker = if entry.commented { "#" } else { "" };
                println!("  {}{} = {}", marker, entry.key, entry.value);
            }
        }
        Ok(())
    }

    fn execute_check(&self, file: Option<PathBuf>) -> Result<()> {
        let summary = self.summarize(file)?;

        if self.json_output {
            let output = json!({
                "utf8_bom": summary.utf8_bom,
                "syntax_errors": summary.syntax_errors,
                "unsectioned": summary.unsectioned,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!(
            "Encoding: {}",
            if summary.utf8_bom {
                "UTF-8 (byte order mark)"
            } else {
                "legacy (no byte order mark)"
            }
        );
        if summary.syntax_errors.is_empty() {
            println!("No syntax errors.");
        } else {
            println!("Syntax errors:");
            for issue in &summary.syntax_errors {
                println!("  line {}: {}", issue.line, issue.text);
            }
        }
        if !summary.unsectioned.is_empty() {
            println!(
                "{} option(s) appear before the first section header",
                summary.unsectioned.len()
            );
        }
        Ok(())
    }

    fn summarize(&self, file: Option<PathBuf>) -> Result<FileSummary> {
        let path = file.unwrap_or_else(|| self.config.config_file());
        info!("Inspecting {}", path.display());
        summarize_file(&path)
    }
}

pub fn summarize_file(path: &Path) -> Result<FileSummary> {
    let file =
        File::open(path).with_context(|| format!("Cannot open option file {}", path.display()))?;
    let summary = inspect(&mut BufReader::new(file))
        .with_context(|| format!("Cannot read option file {}", path.display()))?;
    debug!(sections = summary.sections.len(), "Inspected option file");
    Ok(summary)
}

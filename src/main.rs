//! templint CLI
//!
//! Lints HTML and Handlebars templates for accessibility problems.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use glob::glob;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use templint::config::{ColorMode, Config, OutputFormat, RuleLevel};
use templint::engine::Linter;
use templint::output;
use templint::rules;

#[derive(Parser)]
#[command(
    name = "templint",
    version,
    about = "Template accessibility linter",
    long_about = "Lints HTML and Handlebars templates. Files may be given as paths, directories or glob patterns."
)]
struct Cli {
    /// Files, directories or glob patterns to lint
    files: Vec<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Set a rule level, e.g. require-valid-alt-text=warning (repeatable)
    #[arg(long = "rule", value_name = "ID=LEVEL")]
    rules: Vec<String>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// List available rules and exit
    #[arg(long)]
    list_rules: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            std::process::exit(2);
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load_default().context("Failed to load config")?,
    };

    for entry in &cli.rules {
        let (id, level) = parse_rule_override(entry)?;
        config.set_rule_level(&id, level);
    }
    if let Some(format) = cli.format {
        config.output.format = format.into();
    }
    if let Some(jobs) = cli.jobs {
        config.engine.jobs = jobs;
    }

    if cli.list_rules {
        print_rules(&config);
        return Ok(0);
    }

    let colored = match config.output.color {
        ColorMode::Never => false,
        ColorMode::Always => {
            colored::control::set_override(!cli.no_color);
            !cli.no_color
        }
        ColorMode::Auto => !cli.no_color,
    };

    let patterns = if cli.files.is_empty() {
        config.include_patterns()
    } else {
        cli.files.clone()
    };
    let files = expand_paths(&patterns, &config)?;
    if files.is_empty() {
        bail!("No files found to lint");
    }

    let format = config.output.format;
    let linter = Linter::new(config)?;
    let result = linter.lint(&files);

    let formatter = output::formatter(format, colored);
    print!("{}", formatter.format(&result));

    Ok(result.exit_code())
}

/// Parse `ID=LEVEL`
fn parse_rule_override(entry: &str) -> Result<(String, RuleLevel)> {
    let Some((id, level)) = entry.split_once('=') else {
        bail!("Invalid --rule '{}': expected ID=LEVEL", entry);
    };
    let id = id.trim();
    if rules::find(id).is_none() {
        bail!("Unknown rule '{}'", id);
    }
    let level = level
        .trim()
        .parse::<RuleLevel>()
        .map_err(anyhow::Error::msg)?;
    Ok((id.to_string(), level))
}

fn print_rules(config: &Config) {
    println!("{}", "Available rules:".bold());
    println!();
    for rule in rules::builtin_rules() {
        let meta = rule.meta();
        let level = config.rule_level(rule.as_ref());
        let marker = if meta.recommended { "*" } else { " " };
        println!(
            "  {} {} [{}] ({})",
            marker,
            meta.id.cyan(),
            meta.category,
            level
        );
        println!("      {}", meta.description.dimmed());
    }
    println!();
    println!("  * recommended");
}

/// Expand paths, directories and glob patterns to a de-duplicated file list
fn expand_paths(patterns: &[String], config: &Config) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |path: PathBuf, files: &mut Vec<PathBuf>| {
        if path.is_file() && seen.insert(path.clone()) {
            files.push(path);
        }
    };

    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            push(path.to_path_buf(), &mut files);
            continue;
        }

        let globs: Vec<String> = if path.is_dir() {
            config
                .include_patterns()
                .iter()
                .map(|p| path.join(p).to_string_lossy().into_owned())
                .collect()
        } else {
            vec![pattern.clone()]
        };

        for g in globs {
            let entries = glob(&g).with_context(|| format!("Invalid pattern '{}'", g))?;
            for entry in entries.flatten() {
                push(entry, &mut files);
            }
        }
    }

    Ok(files)
}

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use registry_core::table::{merge_tables, normalize_column};
use registry_core::{KeyOptions, MergeRequest, Table};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

use registry_tools::config::Config;
use registry_tools::{logging, metrics, report, web};

#[derive(Parser)]
#[command(name = "registry_tools")]
#[command(about = "Archive number normalization and spreadsheet merging for the registry office")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web front end
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Normalize archive numbers given as arguments, or read from stdin
    Normalize {
        tokens: Vec<String>,
    },
    /// Add a normalized copy of one column to a CSV/TSV file
    NormalizeTable {
        #[arg(long)]
        input: PathBuf,
        /// Column to normalize (guessed when omitted)
        #[arg(long)]
        column: Option<String>,
        /// Where to write the result (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also write a before/after mapping file
        #[arg(long)]
        mapping: Option<PathBuf>,
    },
    /// Look up a label from SOURCE for every row of TARGET
    Merge {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        target: PathBuf,
        #[arg(long)]
        source_key: Option<String>,
        #[arg(long)]
        source_label: Option<String>,
        #[arg(long)]
        target_key: Option<String>,
        #[command(flatten)]
        options: KeyOptionArgs,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Overrides for the configured merge defaults.
#[derive(Args, Debug, Default)]
struct KeyOptionArgs {
    #[arg(long)]
    no_trim: bool,
    #[arg(long)]
    no_lowercase: bool,
    #[arg(long)]
    remove_punctuation: bool,
    #[arg(long)]
    no_collapse_whitespace: bool,
    #[arg(long)]
    no_fix_trailing_float: bool,
    /// Disable the base-key fallback lookup
    #[arg(long)]
    no_fallback: bool,
}

impl KeyOptionArgs {
    fn apply(&self, defaults: KeyOptions) -> KeyOptions {
        KeyOptions {
            trim: defaults.trim && !self.no_trim,
            lowercase: defaults.lowercase && !self.no_lowercase,
            remove_punctuation: defaults.remove_punctuation || self.remove_punctuation,
            collapse_whitespace: defaults.collapse_whitespace && !self.no_collapse_whitespace,
            fix_trailing_float: defaults.fix_trailing_float && !self.no_fix_trailing_float,
            use_base_key_fallback: defaults.use_base_key_fallback && !self.no_fallback,
        }
    }
}

fn read_table(path: &Path) -> Result<Table> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read '{}'", path.display()))?;
    Table::parse(&bytes).with_context(|| format!("Failed to parse '{}'", path.display()))
}

fn write_table(table: &Table, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => fs::write(path, report::encode_table(table))
            .with_context(|| format!("Failed to write '{}'", path.display())),
        None => {
            print!("{}", table.to_delimited(report::OUTPUT_DELIMITER));
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if config.metrics.enabled {
                metrics::init_metrics();
            }
            web::start_server(config).await?;
        }
        Commands::Normalize { tokens } => {
            let result = if tokens.is_empty() {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .context("Failed to read stdin")?;
                report::normalize_text(&text, &config.normalize.query_label)
            } else {
                report::normalize_tokens(&tokens, &config.normalize.query_label)
            };

            for (before, after) in &result.pairs {
                println!("{before} → {after}");
            }
            if !result.query.is_empty() {
                println!();
                println!("{}", result.query);
            }
        }
        Commands::NormalizeTable { input, column, output, mapping } => {
            let table = read_table(&input)?;
            let normalized = normalize_column(&table, column.as_deref(), mapping.is_some())?;
            info!(
                "Normalized column '{}' into '{}' ({} of {} rows changed)",
                normalized.source_column,
                normalized.normalized_column,
                normalized.changed,
                table.len()
            );
            write_table(&normalized.table, output.as_deref())?;
            if let (Some(path), Some(mapping_table)) = (mapping.as_deref(), normalized.mapping.as_ref()) {
                write_table(mapping_table, Some(path))?;
            }
        }
        Commands::Merge {
            source,
            target,
            source_key,
            source_label,
            target_key,
            options,
            output,
        } => {
            let source_table = read_table(&source)?;
            let target_table = read_table(&target)?;
            let request = MergeRequest {
                source_key,
                source_label,
                target_key,
                options: options.apply(config.merge),
            };

            let outcome = merge_tables(&source_table, &target_table, &request)?;
            report::record_merge(&outcome);
            write_table(&outcome.table, output.as_deref())?;

            eprintln!("📊 Merge results:");
            eprintln!("   Total rows: {}", outcome.stats.total);
            eprintln!("   Matched: {} ({} exact, {} via base key)", outcome.stats.matched, outcome.stats.exact, outcome.stats.fallback);
            eprintln!("   Unmatched: {}", outcome.stats.unmatched);
            if outcome.shadowed_duplicates > 0 {
                eprintln!("   ⚠️  {} duplicate source keys ignored (first label kept)", outcome.shadowed_duplicates);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_option_flags_override_defaults() {
        let args = KeyOptionArgs {
            no_lowercase: true,
            remove_punctuation: true,
            no_fallback: true,
            ..Default::default()
        };
        let opts = args.apply(KeyOptions::default());
        assert!(!opts.lowercase);
        assert!(opts.remove_punctuation);
        assert!(!opts.use_base_key_fallback);
        assert!(opts.trim);
    }
}

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlward_core::SqlwardConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::cache_key::CategoryArg;
use commands::scan::FamilyArg;

#[derive(Parser, Debug)]
#[command(name = "sqlward", version, about = "SQL injection guard and query cache toolkit")]
struct Cli {
    /// Configuration file (YAML, or TOML when the extension is .toml)
    #[arg(long, short = 'c', global = true, env = "SQLWARD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset. Defaults to the configured level.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check text for injection patterns. Exits with status 1 when flagged.
    Scan {
        /// Text to inspect
        text: String,

        /// Pattern families to apply (repeatable)
        #[arg(long = "family", value_enum, default_values_t = vec![FamilyArg::All])]
        families: Vec<FamilyArg>,

        /// Print the verdict as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Rewrite WHERE fragments into placeholder form.
    Parameterize {
        /// Clause fragments, joined with AND
        #[arg(required = true)]
        fragments: Vec<String>,

        /// Also print the clause with parameters substituted back
        #[arg(long, default_value_t = false)]
        inline: bool,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the cache key a call would use.
    CacheKey {
        #[arg(long, value_enum)]
        category: CategoryArg,

        /// Key name, e.g. a table name or `table_names`
        #[arg(long)]
        name: String,

        /// Call parameter as name=JSON (repeatable); invalid JSON is taken as a string
        #[arg(long = "param")]
        params: Vec<String>,

        /// Unordered parameter as name=JSON array (repeatable)
        #[arg(long = "set-param")]
        set_params: Vec<String>,
    },

    /// Validate the configuration file and print a summary.
    CheckConfig,

    /// Connect to the configured database and report what it sees.
    Probe {
        /// Also describe and count this table
        #[arg(long)]
        table: Option<String>,

        /// Skip the cache store even if enabled in configuration
        #[arg(long, default_value_t = false)]
        no_cache: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Scan {
            text,
            families,
            json,
        } => {
            if commands::scan::run(&text, &families, json)? {
                std::process::exit(1);
            }
        }

        Command::Parameterize {
            fragments,
            inline,
            json,
        } => commands::parameterize::run(&fragments, inline, json)?,

        Command::CacheKey {
            category,
            name,
            params,
            set_params,
        } => {
            let key = commands::cache_key::derive(&config, category, &name, &params, &set_params)?;
            println!("{}", key);
        }

        Command::CheckConfig => {
            let path = cli
                .config
                .as_deref()
                .context("check-config needs --config <file> or SQLWARD_CONFIG")?;
            commands::check::run(path, &config)?;
        }

        Command::Probe { table, no_cache } => {
            commands::probe::run(&config, table.as_deref(), no_cache).await?
        }
    }

    Ok(())
}

/// Load configuration from `path`, or defaults when no file is given.
fn load_config(path: Option<&Path>) -> anyhow::Result<SqlwardConfig> {
    let Some(path) = path else {
        return Ok(SqlwardConfig::default());
    };

    if path.extension().map(|e| e == "toml").unwrap_or(false) {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: SqlwardConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    } else {
        SqlwardConfig::from_file(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }
}

//! `sqlward probe`: connect to the configured database through the full
//! stack (cache included) and print what it reports.

use anyhow::{Context, Result};
use sqlward_adapter_mysql::MySqlAdapter;
use sqlward_cache::{KeyValueStore, store_from_config};
use sqlward_core::{ColumnDescription, Filter, SqlwardConfig};
use sqlward_runtime::CacheOrchestrator;
use sqlward_sanitize::SystemClock;
use std::sync::Arc;
use tracing::info;

pub async fn run(config: &SqlwardConfig, table: Option<&str>, no_cache: bool) -> Result<()> {
    let adapter = Arc::new(
        MySqlAdapter::connect(&config.database)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to {}",
                    config.database.redacted_connection_string()
                )
            })?,
    );

    let store: Option<Arc<dyn KeyValueStore>> = if no_cache || !config.cache.enabled {
        None
    } else {
        info!(backend = ?config.cache.backend, "Using cache store");
        Some(store_from_config(config))
    };

    let orchestrator =
        CacheOrchestrator::from_parts(adapter.clone(), store, config, Arc::new(SystemClock));
    let outcome = report(&orchestrator, table).await;
    adapter.close().await;
    outcome
}

async fn report(orchestrator: &CacheOrchestrator, table: Option<&str>) -> Result<()> {
    let version = orchestrator
        .get_database_version(None)
        .await
        .context("Failed to read server version")?;
    println!("server version: {}", version);

    let tables = orchestrator
        .get_table_names(None)
        .await
        .context("Failed to list tables")?;
    println!("tables ({}):", tables.len());
    for name in &tables {
        println!("  {}", name);
    }

    let Some(table) = table else {
        return Ok(());
    };

    let columns = orchestrator
        .describe_table(table, None)
        .await
        .with_context(|| format!("Failed to describe {}", table))?;
    println!("{}:", table);
    for line in column_lines(&columns) {
        println!("  {}", line);
    }

    let rows = orchestrator
        .get_table_size(table, "*", &Filter::None, None)
        .await
        .with_context(|| format!("Failed to count rows in {}", table))?;
    println!("rows: {}", rows);
    Ok(())
}

fn column_lines(columns: &[ColumnDescription]) -> Vec<String> {
    let width = columns.iter().map(|c| c.field.len()).max().unwrap_or(0);
    columns
        .iter()
        .map(|c| {
            let mut line = format!("{:<width$}  {}", c.field, c.column_type, width = width);
            if !c.nullable {
                line.push_str(" NOT NULL");
            }
            if !c.key.is_empty() {
                line.push_str(&format!(" [{}]", c.key));
            }
            if let Some(default) = &c.default {
                line.push_str(&format!(" DEFAULT {}", default));
            }
            if !c.extra.is_empty() {
                line.push(' ');
                line.push_str(&c.extra);
            }
            line
        })
        .collect()
}

//! sqlpool - run a statement through a connection pool from the command line
//!
//! Usage:
//!   sqlpool --config pool.toml --sql "SELECT x FROM t WHERE id = ?" -p int:1
//!   sqlpool --config pool.toml                      (print pool statistics)

mod logging;
mod params;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use comfy_table::{Table as ComfyTable, presets::UTF8_FULL};
use sqlpool_connection::{ConnectionPool, PooledConnection};
use sqlpool_core::{Param, PoolSettings, Table};
use sqlpool_drivers::DriverRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "sqlpool", version, about = "Run SQL through a pooled connection")]
struct Cli {
    /// Path to the pool settings TOML file
    #[arg(short, long, env = "SQLPOOL_CONFIG")]
    config: PathBuf,

    /// Statement to run; omit to print pool statistics
    #[arg(short, long)]
    sql: Option<String>,

    /// Positional parameter as TAG:VALUE (repeatable), e.g. int:5 or null:long
    #[arg(short = 'p', long = "param", value_parser = params::parse_param)]
    params: Vec<Param>,

    /// Output format for query results
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.json_logs)?;

    let settings = PoolSettings::load(&cli.config)
        .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?;
    let pool = ConnectionPool::create(settings, &DriverRegistry::with_defaults())
        .await
        .context("Failed to create connection pool")?;

    let result = match &cli.sql {
        Some(sql) => run_statement(&pool, sql, &cli.params, cli.output).await,
        None => print_stats(&pool, cli.output).await,
    };

    pool.destroy().await;
    result
}

async fn run_statement(
    pool: &ConnectionPool,
    sql: &str,
    params: &[Param],
    output: OutputFormat,
) -> anyhow::Result<()> {
    let conn = pool.acquire().await?;
    let result = execute(&conn, sql, params, output).await;

    match &result {
        Ok(()) => conn.commit().await.context("Failed to commit")?,
        Err(e) => {
            if let Err(rollback_err) = conn.rollback().await {
                tracing::warn!(error = %rollback_err, "Rollback after failed statement failed");
            }
            tracing::debug!(error = %e, "Statement failed");
        }
    }

    pool.release(&conn);
    result
}

async fn execute(
    conn: &PooledConnection,
    sql: &str,
    params: &[Param],
    output: OutputFormat,
) -> anyhow::Result<()> {
    if params::returns_rows(sql) {
        let table = conn.query(sql, params).await?;
        print_table(&table, output)?;
    } else {
        let affected = conn.execute(sql, params).await?;
        match output {
            OutputFormat::Table => println!("{} row(s) affected", affected),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({ "rows_affected": affected }))
            }
        }
    }
    Ok(())
}

fn print_table(table: &Table, output: OutputFormat) -> anyhow::Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(table)?),
        OutputFormat::Table => {
            let mut rendered = ComfyTable::new();
            rendered.load_preset(UTF8_FULL).set_header(table.columns());
            for row in table {
                rendered.add_row(row.iter().map(|value| value.to_string()));
            }
            println!("{rendered}");
            println!("({} row(s))", table.len());
        }
    }
    Ok(())
}

async fn print_stats(pool: &ConnectionPool, output: OutputFormat) -> anyhow::Result<()> {
    let stats = pool.stats().await;
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Table => {
            let mut rendered = ComfyTable::new();
            rendered
                .load_preset(UTF8_FULL)
                .set_header(vec!["connection", "total", "idle", "active", "utilization"]);
            rendered.add_row(vec![
                pool.connection_string().to_string(),
                stats.total().to_string(),
                stats.idle().to_string(),
                stats.active().to_string(),
                format!("{:.0}%", stats.utilization() * 100.0),
            ]);
            println!("{rendered}");
        }
    }
    Ok(())
}

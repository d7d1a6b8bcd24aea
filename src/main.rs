//! pgview - PostgreSQL dashboard from the command line
//!
//! Each invocation opens one session, runs a short sequence of dashboard
//! actions and prints the result as tab-separated text.

use anyhow::Result;
use clap::{Parser, Subcommand};
use pgview::app::{Action, Dashboard, StatusLevel};
use pgview::config::{self, ConnectionConfig, Settings, load_settings};
use pgview::db::{QueryResults, SqlParam};
use pgview::pivot::Aggregate;
use std::path::PathBuf;
use std::process::ExitCode;

/// Widest a cell is printed before truncation
const MAX_CELL_WIDTH: usize = 60;

#[derive(Parser)]
#[command(name = "pgview", version, about = "Browse a PostgreSQL database")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect and report the server version
    Ping,
    /// List tables in the configured schema
    Tables,
    /// Show a table's columns
    Columns { table: String },
    /// Show the first rows of a table
    Rows {
        table: String,
        /// Maximum rows to fetch
        #[arg(short, long)]
        limit: Option<usize>,
        /// Only show rows containing this text
        #[arg(short, long)]
        search: Option<String>,
        /// Restrict the search to one column
        #[arg(short, long, requires = "search")]
        column: Option<String>,
        /// Save the rows as CSV (default file name when no path is given)
        #[arg(short, long, num_args = 0..=1)]
        export: Option<Option<PathBuf>>,
    },
    /// Run a statement with positional parameters ($1, $2, ...)
    Query {
        sql: String,
        /// Value for the next placeholder, in order
        #[arg(short, long = "param")]
        params: Vec<String>,
        /// Save the result as CSV (default file name when no path is given)
        #[arg(short, long, num_args = 0..=1)]
        export: Option<Option<PathBuf>>,
    },
    /// Crosstab the result of a statement
    Pivot {
        sql: String,
        /// Column identifying an output row (repeatable)
        #[arg(short, long = "index", required = true)]
        index: Vec<String>,
        /// Column whose values become output columns
        #[arg(short, long)]
        column: String,
        /// Column whose values fill the cells
        #[arg(short, long)]
        value: String,
        /// Add up values instead of keeping the first one
        #[arg(long)]
        sum: bool,
        /// Value for the next placeholder, in order
        #[arg(short, long = "param")]
        params: Vec<String>,
        /// Save the crosstab as CSV (default file name when no path is given)
        #[arg(short, long, num_args = 0..=1)]
        export: Option<Option<PathBuf>>,
    },
    /// Count NULL or blank values per column of a table's first rows
    Coverage {
        table: String,
        /// Maximum rows to inspect
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    dotenv::dotenv().ok();
    let loaded = load_settings();
    let log_level = match &loaded {
        Ok(settings) => settings.log_level.clone(),
        Err(_) => Settings::default().log_level,
    };
    pgview::logging::init(&log_level);
    let settings = config::or_default(loaded);
    let config = ConnectionConfig::from_env()?;

    let mut dash: Dashboard = Dashboard::new(config, settings);
    let ok = run(&mut dash, cli.command).await;
    dash.handle(Action::Disconnect).await;

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Drive the dashboard for one command. `false` once an action fails.
async fn run(dash: &mut Dashboard, command: Command) -> bool {
    if !step(dash, Action::Connect).await {
        return false;
    }

    match command {
        Command::Ping => step(dash, Action::TestConnection).await,
        Command::Tables => {
            for table in &dash.tables {
                println!("{}", table);
            }
            true
        }
        Command::Columns { table } => {
            if !step(dash, Action::DescribeTable(table)).await {
                return false;
            }
            println!("column\ttype\tnullable");
            for column in &dash.columns {
                let declared = match column.max_length {
                    Some(n) => format!("{}({})", column.declared_type, n),
                    None => column.declared_type.clone(),
                };
                println!(
                    "{}\t{}\t{}",
                    column.name,
                    declared,
                    if column.nullable { "YES" } else { "NO" }
                );
            }
            true
        }
        Command::Rows {
            table,
            limit,
            search,
            column,
            export,
        } => {
            if let Some(limit) = limit {
                if !step(dash, Action::SetRowLimit(limit)).await {
                    return false;
                }
            }
            if !step(dash, Action::SelectTable(table)).await {
                return false;
            }
            if let Some(text) = search {
                if !step(dash, Action::Search { text, column }).await {
                    return false;
                }
            }
            show(dash, export).await
        }
        Command::Query {
            sql,
            params,
            export,
        } => {
            let params = params.into_iter().map(SqlParam::Text).collect();
            if !step(dash, Action::RunQuery { sql, params }).await {
                return false;
            }
            show(dash, export).await
        }
        Command::Pivot {
            sql,
            index,
            column,
            value,
            sum,
            params,
            export,
        } => {
            let params = params.into_iter().map(SqlParam::Text).collect();
            let aggregate = if sum { Aggregate::Sum } else { Aggregate::First };
            if !step(dash, Action::RunQuery { sql, params }).await
                || !step(
                    dash,
                    Action::Pivot {
                        index,
                        column,
                        value,
                        aggregate,
                    },
                )
                .await
            {
                return false;
            }
            show(dash, export).await
        }
        Command::Coverage { table, limit } => {
            if let Some(limit) = limit {
                if !step(dash, Action::SetRowLimit(limit)).await {
                    return false;
                }
            }
            if !step(dash, Action::SelectTable(table)).await
                || !step(dash, Action::Coverage).await
            {
                return false;
            }
            show(dash, None).await
        }
    }
}

/// Print the visible rows, then export them if asked
async fn show(dash: &mut Dashboard, export: Option<Option<PathBuf>>) -> bool {
    if let Some(results) = dash.visible_results() {
        print_results(&results);
    }
    match export {
        Some(path) => step(dash, Action::Export(path)).await,
        None => true,
    }
}

/// Perform one action and print its status. `false` on an Error status.
async fn step(dash: &mut Dashboard, action: Action) -> bool {
    dash.handle(action).await;
    report(dash)
}

fn report(dash: &Dashboard) -> bool {
    match &dash.status_message {
        Some(status) if status.level == StatusLevel::Error => {
            eprintln!("error: {}", status.message);
            false
        }
        Some(status) => {
            eprintln!("{}", status.message);
            true
        }
        None => true,
    }
}

fn print_results(results: &QueryResults) {
    println!("{}", results.column_names().join("\t"));
    for row in &results.rows {
        let cells: Vec<String> = row
            .values
            .iter()
            .map(|cell| cell.display_string(MAX_CELL_WIDTH))
            .collect();
        println!("{}", cells.join("\t"));
    }
}

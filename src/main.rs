//! orawatch - batch Oracle query runner with threshold alerts.

use orawatch::batch::{
    BatchOptions, BatchOrchestrator, BatchSummary, ExecutionOutcome, ProgressReporter, ResultSink,
};
use orawatch::cli::{parse_param, Cli, Command, ConnCommand, QueryCommand};
use orawatch::config::{self, Config};
use orawatch::db::{rewrite, Connector, OracleConnector};
use orawatch::error::{OrawatchError, Result};
use orawatch::persistence::{self, QueryDefinition, SavedConnection, StateDb};
use orawatch::resolver::{ConnectionDescriptor, Resolver};
use orawatch::tns::TnsTable;
use orawatch::{export, logging, monitor};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    let config = Config::load_from_file(&config_path)?;
    let tns = load_tns_table(&cli, &config)?;

    match cli.command {
        Command::Run { ref ids } => {
            let db = open_state_db(&cli, &config).await?;
            let result = cmd_run(&db, &config, tns, ids).await;
            db.close().await;
            result
        }
        Command::Exec {
            ref sql,
            ref dsn,
            ref connection,
            tns: ref tns_alias,
            ref user,
            ref password,
            ref params,
            limit,
            ref csv,
            json,
        } => {
            let descriptor = resolve_adhoc_target(
                &cli,
                &config,
                &tns,
                dsn.as_deref(),
                connection.as_deref(),
                tns_alias.as_deref(),
                user.as_deref(),
                password.as_deref(),
            )
            .await?;
            cmd_exec(
                &config, descriptor, sql, params, limit, csv.as_deref(), json,
            )
            .await
        }
        Command::Conn(ref conn_cmd) => {
            let db = open_state_db(&cli, &config).await?;
            let result = cmd_conn(&db, conn_cmd).await;
            db.close().await;
            result
        }
        Command::Query(ref query_cmd) => {
            let db = open_state_db(&cli, &config).await?;
            let result = cmd_query(&db, query_cmd).await;
            db.close().await;
            result
        }
        Command::Monitor { ref hosts } => cmd_monitor(&config, hosts).await,
        Command::Tns => cmd_tns(&tns),
    }
}

/// TNS table from --tnsnames, config, or empty.
fn load_tns_table(cli: &Cli, config: &Config) -> Result<TnsTable> {
    let path = cli
        .tnsnames
        .clone()
        .or_else(|| config.settings.tnsnames_path.clone());
    match path {
        Some(path) => TnsTable::load(&path),
        None => Ok(TnsTable::empty()),
    }
}

/// State database at --state-db, the configured path, or the default.
async fn open_state_db(cli: &Cli, config: &Config) -> Result<StateDb> {
    let path = cli
        .state_db
        .clone()
        .or_else(|| config.settings.state_db_path.clone());
    match path {
        Some(path) => StateDb::open(&path).await,
        None => StateDb::open_default().await,
    }
}

/// Sink rendering one line per completed query.
struct PrintSink;

impl ResultSink for PrintSink {
    fn on_result(&mut self, def: &QueryDefinition, outcome: &ExecutionOutcome) {
        match (&outcome.result, &outcome.error) {
            (Some(result), _) => println!(
                "  {}: OK, {} row(s) in {:.3}s",
                def.name,
                result.row_count,
                outcome.elapsed.as_secs_f64()
            ),
            (None, Some(message)) => println!("  {}: FAILED, {}", def.name, message),
            (None, None) => println!("  {}: FAILED", def.name),
        }
    }
}

/// Reporter echoing batch progress to the terminal.
struct PrintProgress;

impl ProgressReporter for PrintProgress {
    fn on_progress(&mut self, message: &str) {
        println!("{message}");
    }
}

async fn cmd_run(db: &StateDb, config: &Config, tns: TnsTable, ids: &[i64]) -> Result<()> {
    let mut defs = persistence::queries::list_enabled(db.pool()).await?;
    if !ids.is_empty() {
        defs.retain(|def| ids.contains(&def.id));
    }
    if defs.is_empty() {
        println!("No query definitions to run.");
        return Ok(());
    }

    let connections =
        persistence::connections::list_connections_with_passwords(db.pool(), db.secrets()).await?;

    info!("Starting batch of {} queries", defs.len());
    let connector = OracleConnector::new(config.settings.max_rows);
    let options = BatchOptions {
        query_timeout: config.settings.batch_timeout(),
    };
    let orchestrator = BatchOrchestrator::new(&connector, connections, tns, options);

    let summary = orchestrator
        .run(&defs, &mut PrintSink, &mut PrintProgress)
        .await;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    println!();
    println!(
        "Batch finished: {} succeeded, {} failed ({:.3}s, started {})",
        summary.succeeded,
        summary.failed,
        summary.total_elapsed.as_secs_f64(),
        summary.started_at.format("%Y-%m-%d %H:%M:%S")
    );

    if !summary.notifications.is_empty() {
        println!();
        println!("Notifications:");
        for notification in &summary.notifications {
            println!("  ! {notification}");
        }
    }

    println!();
    println!("Execution log:");
    for line in &summary.log {
        println!("  {line}");
    }
}

/// Builds the connection descriptor for the ad-hoc path: DSN, saved
/// connection, or TNS alias with explicit credentials.
#[allow(clippy::too_many_arguments)]
async fn resolve_adhoc_target(
    cli: &Cli,
    config: &Config,
    tns: &TnsTable,
    dsn: Option<&str>,
    connection: Option<&str>,
    tns_alias: Option<&str>,
    user: Option<&str>,
    password: Option<&str>,
) -> Result<ConnectionDescriptor> {
    if let Some(dsn) = dsn {
        return config::descriptor_from_dsn(dsn);
    }

    // Both remaining forms reuse the batch resolver over a synthetic
    // definition, so priority and validation stay in one place.
    let mut def = QueryDefinition::new("adhoc", "");
    def.username = user.map(str::to_string);
    def.password = password.map(str::to_string);

    let connections: Vec<SavedConnection> = if let Some(name) = connection {
        let db = open_state_db(cli, config).await?;
        let all = persistence::connections::list_connections_with_passwords(
            db.pool(),
            db.secrets(),
        )
        .await?;
        db.close().await;

        let saved = all
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| {
                OrawatchError::not_found(format!("Saved connection '{name}' does not exist"))
            })?;
        def.saved_connection_id = Some(saved.id);
        all
    } else if let Some(alias) = tns_alias {
        def.tns_alias = Some(alias.to_string());
        Vec::new()
    } else {
        return Err(OrawatchError::config(
            "Specify a target with --dsn, --connection or --tns",
        ));
    };

    Resolver::new(&connections, tns).resolve(&def)
}

async fn cmd_exec(
    config: &Config,
    descriptor: ConnectionDescriptor,
    sql: &str,
    params: &[String],
    limit: Option<usize>,
    csv: Option<&std::path::Path>,
    json: bool,
) -> Result<()> {
    let params: Vec<(String, String)> = params
        .iter()
        .map(|raw| parse_param(raw))
        .collect::<Result<_>>()?;

    let mut sql = rewrite::substitute_params(sql, &params);
    if let Some(limit) = limit {
        sql = rewrite::apply_row_limit(&sql, limit);
    }

    info!("Executing ad-hoc statement against {}", descriptor.display_string());
    let connector = OracleConnector::new(config.settings.max_rows);
    let client = connector.connect(&descriptor).await?;
    let result = client
        .execute(&sql, config.settings.adhoc_timeout())
        .await;
    let close_result = client.close().await;
    let result = result?;
    close_result?;

    if let Some(path) = csv {
        export::write_csv(&result, path)?;
        println!("Wrote {} row(s) to {}", result.row_count, path.display());
    } else if json {
        println!("{}", export::to_json_string(&result)?);
    } else {
        print!("{}", export::to_text_table(&result));
        if let Some(warning) = result.truncation_warning() {
            println!("{warning}");
        }
        println!(
            "{} row(s) in {:.3}s",
            result.row_count,
            result.execution_time.as_secs_f64()
        );
    }

    Ok(())
}

async fn cmd_conn(db: &StateDb, cmd: &ConnCommand) -> Result<()> {
    match cmd {
        ConnCommand::List => {
            let connections = persistence::connections::list_connections(db.pool()).await?;
            if connections.is_empty() {
                println!("No saved connections.");
                return Ok(());
            }
            for conn in connections {
                println!("  [{}] {}", conn.id, conn.display_string());
            }
            Ok(())
        }
        ConnCommand::Add {
            name,
            user,
            password,
            tns,
            host,
            port,
            service,
        } => {
            let mut conn = SavedConnection::new(name.clone(), user.clone());
            conn.tns_alias = tns.clone();
            conn.host = host.clone();
            conn.service = service.clone();
            if host.is_some() {
                conn.port = Some(*port);
            }

            if conn.tns_alias.is_none() && conn.host.is_none() {
                return Err(OrawatchError::config(
                    "Specify an endpoint with --tns or --host/--service",
                ));
            }

            let id = persistence::connections::create_connection(
                db.pool(),
                &conn,
                password.as_deref(),
                db.secrets(),
            )
            .await?;
            println!("Saved connection '{}' with id {}", name, id);
            Ok(())
        }
        ConnCommand::Remove { id } => {
            persistence::connections::delete_connection(db.pool(), *id, db.secrets()).await?;
            println!("Removed connection {id}");
            Ok(())
        }
    }
}

async fn cmd_query(db: &StateDb, cmd: &QueryCommand) -> Result<()> {
    match cmd {
        QueryCommand::List => {
            let defs = persistence::queries::list_queries(db.pool()).await?;
            if defs.is_empty() {
                println!("No query definitions.");
                return Ok(());
            }
            for def in defs {
                let flags = format!(
                    "{}{}",
                    if def.enabled { "" } else { " [disabled]" },
                    if def.notify { " [notify]" } else { "" }
                );
                println!("  [{}] {}{}", def.id, def.name, flags);
            }
            Ok(())
        }
        QueryCommand::Add {
            name,
            sql,
            file,
            saved_id,
            tns,
            host,
            port,
            service,
            user,
            password,
            notify,
            at_least,
            equals,
            at_most,
            check_columns,
            check_values,
            order,
        } => {
            let sql_text = match (sql, file) {
                (Some(sql), _) => sql.clone(),
                (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                    OrawatchError::config(format!(
                        "Failed to read SQL file {}: {e}",
                        path.display()
                    ))
                })?,
                (None, None) => {
                    return Err(OrawatchError::config("Specify SQL with --sql or --file"))
                }
            };

            let mut def = QueryDefinition::new(name.clone(), sql_text);
            def.saved_connection_id = *saved_id;
            def.tns_alias = tns.clone();
            def.host = host.clone();
            def.port = *port;
            def.service = service.clone();
            def.username = user.clone();
            def.password = password.clone();
            def.notify = *notify;
            def.count_at_least = at_least.clone();
            def.count_equals = equals.clone();
            def.count_at_most = at_most.clone();
            def.check_columns = check_columns.clone();
            def.check_values = check_values.clone();
            def.sort_order = *order;

            let id = persistence::queries::create_query(db.pool(), &def).await?;
            println!("Saved query '{}' with id {}", name, id);
            Ok(())
        }
        QueryCommand::Remove { id } => {
            persistence::queries::delete_query(db.pool(), *id).await?;
            println!("Removed query {id}");
            Ok(())
        }
        QueryCommand::Enable { id } => {
            persistence::queries::set_enabled(db.pool(), *id, true).await?;
            println!("Enabled query {id}");
            Ok(())
        }
        QueryCommand::Disable { id } => {
            persistence::queries::set_enabled(db.pool(), *id, false).await?;
            println!("Disabled query {id}");
            Ok(())
        }
    }
}

async fn cmd_monitor(config: &Config, hosts: &[String]) -> Result<()> {
    let endpoints: Vec<String> = if hosts.is_empty() {
        config.monitor.hosts.clone()
    } else {
        hosts.to_vec()
    };

    if endpoints.is_empty() {
        println!("No hosts to probe. Pass endpoints or set [monitor] hosts in the config.");
        return Ok(());
    }

    let statuses = monitor::probe_all(&endpoints, config.monitor.probe_timeout()).await;
    for status in &statuses {
        match status.latency {
            Some(latency) => println!(
                "  {:<30} {:<3} ({} ms)",
                status.endpoint,
                status.label(),
                latency.as_millis()
            ),
            None => println!(
                "  {:<30} {:<3} ({})",
                status.endpoint,
                status.label(),
                status.error.as_deref().unwrap_or("unreachable")
            ),
        }
    }

    let online = statuses.iter().filter(|s| s.online).count();
    println!("{} of {} host(s) online", online, statuses.len());
    Ok(())
}

fn cmd_tns(tns: &TnsTable) -> Result<()> {
    if tns.is_empty() {
        println!(
            "No TNS aliases loaded. Set [settings] tnsnames_path or pass --tnsnames."
        );
        return Ok(());
    }

    println!("Aliases from {}:", tns.source_path().display());
    for entry in tns.entries() {
        println!("  {:<20} {}", entry.name, entry.connect_string());
    }
    Ok(())
}

//! qcwatch - launch data quality checks and follow them live
//!
//! Talks to the governance backend: QC tasks stream their progress over
//! SSE, administration listings come from the REST API.

use chrono::{NaiveDate, Utc};
use clap::Parser;
use qcwatch::{
    admin::{self, InMemoryAdminRepository},
    api::{ApiClient, Page, PageQuery},
    auth::{AuthGuard, GuardOutcome, TokenStorage, LOGIN_PATH},
    config::AppConfig,
    execution::{ExecutionStore, TrackerEvent},
    log_error, log_info, log_warn, logging,
    progress::Reconciliation,
    qc::{QcCategory, QcLaunchRequest, QcLauncher},
    sse::HttpTransport,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Launch a QC task and follow its progress
    Run {
        /// completeness, consistency, accuracy, timeliness, core-data or flow
        category: QcCategory,
        /// Data source to check
        #[arg(long)]
        source: String,
        /// Restrict to these tables (repeatable)
        #[arg(long = "table")]
        tables: Vec<String>,
        /// First day to check (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day to check (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// List the results of a finished task
    Results {
        category: QcCategory,
        /// Task id printed by `run`
        #[arg(long)]
        task_id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
    },
    /// List users
    Users {
        /// Filter by user name
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
        /// Use the built-in demo data instead of the backend
        #[arg(long)]
        offline: bool,
    },
    /// List roles
    Roles {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
        #[arg(long)]
        offline: bool,
    },
    /// List dictionary types
    Dicts {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        size: u32,
        #[arg(long)]
        offline: bool,
    },
    /// Show the steps of a QC category
    Steps { category: QcCategory },
}

#[derive(Parser, Debug)]
#[command(name = "qcwatch")]
#[command(version)]
#[command(about = "Launch data quality checks and follow their progress", long_about = None)]
struct Args {
    /// Configuration file path (overrides defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let app_config = AppConfig::load(args.config.as_deref())?;
    init_logging(args.verbose, app_config.debug);
    log_info!("Backend: {}", app_config.api.base_url);

    match args.command {
        Command::Steps { category } => {
            print_steps(category);
            Ok(())
        }
        Command::Users {
            name,
            page,
            size,
            offline: true,
        } => {
            let repo = InMemoryAdminRepository::seeded()?;
            print_users(&repo.list_users(name.as_deref(), PageQuery::new(page, size)));
            Ok(())
        }
        Command::Roles {
            page,
            size,
            offline: true,
        } => {
            let repo = InMemoryAdminRepository::seeded()?;
            print_roles(&repo.list_roles(PageQuery::new(page, size)));
            Ok(())
        }
        Command::Dicts {
            page,
            size,
            offline: true,
        } => {
            let repo = InMemoryAdminRepository::seeded()?;
            print_dicts(&repo.list_dict_types(PageQuery::new(page, size)));
            Ok(())
        }
        command => {
            let api = authorized_client(&app_config, &route_of(&command))?;
            run_online(command, api, &app_config).await
        }
    }
}

/// Console route a command corresponds to, used by the auth guard
fn route_of(command: &Command) -> String {
    match command {
        Command::Run { category, .. } | Command::Results { category, .. } => {
            format!("/quality/{}", category)
        }
        Command::Users { .. } => "/system/user".to_string(),
        Command::Roles { .. } => "/system/role".to_string(),
        Command::Dicts { .. } => "/system/dict".to_string(),
        Command::Steps { .. } => LOGIN_PATH.to_string(),
    }
}

/// Check the stored token and build an API client carrying it
fn authorized_client(config: &AppConfig, route: &str) -> anyhow::Result<ApiClient> {
    let token_file = config.auth.token_file();
    let mut storage = TokenStorage::load(&token_file)?;

    if let GuardOutcome::RedirectToLogin { redirect } =
        AuthGuard::new(&mut storage).check(route, Utc::now())?
    {
        log_warn!("No valid token for {}", redirect);
        anyhow::bail!(
            "Not logged in: sign in at {}?redirect={} and store the token in {}",
            LOGIN_PATH,
            redirect,
            token_file.display()
        );
    }

    let mut api = ApiClient::new(&config.api.base_url, config.api.request_timeout_secs)?;
    if let Some((token_type, token)) = storage.authorization() {
        api = api.with_bearer_token(&token_type, &token);
    }
    Ok(api)
}

async fn run_online(command: Command, api: ApiClient, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Run {
            category,
            source,
            tables,
            from,
            to,
        } => {
            let request = QcLaunchRequest::new(source)
                .with_tables(tables)
                .with_date_range(from, to);
            run_task(category, request, api, config).await
        }
        Command::Results {
            category,
            task_id,
            page,
            size,
        } => {
            let launcher = launcher(api, config)?;
            let rows = launcher
                .results(category, &task_id, PageQuery::new(page, size))
                .await?;
            println!("{} result rows for task {}", rows.total, task_id);
            for row in &rows.rows {
                println!(
                    "  {:<24} {:<20} {:<24} errors {:>6} / {:<8} pass {}",
                    row.table_name.as_deref().unwrap_or("-"),
                    row.field_name.as_deref().unwrap_or("-"),
                    row.rule_name.as_deref().unwrap_or("-"),
                    row.error_count.unwrap_or(0),
                    row.total_count.unwrap_or(0),
                    row.pass_rate
                        .map(|r| format!("{:.2}%", r))
                        .unwrap_or_else(|| "-".to_string()),
                );
            }
            Ok(())
        }
        Command::Users {
            name, page, size, ..
        } => {
            let users =
                admin::remote::list_users(&api, PageQuery::new(page, size), name.as_deref()).await?;
            print_users(&users);
            Ok(())
        }
        Command::Roles { page, size, .. } => {
            print_roles(&admin::remote::list_roles(&api, PageQuery::new(page, size)).await?);
            Ok(())
        }
        Command::Dicts { page, size, .. } => {
            print_dicts(&admin::remote::list_dict_types(&api, PageQuery::new(page, size)).await?);
            Ok(())
        }
        Command::Steps { category } => {
            print_steps(category);
            Ok(())
        }
    }
}

fn launcher(api: ApiClient, config: &AppConfig) -> anyhow::Result<QcLauncher> {
    let transport = Arc::new(HttpTransport::new(config.api.connect_timeout())?);
    Ok(QcLauncher::new(api, transport, ExecutionStore::shared(), config))
}

/// Launch one task and render its events until the stream is done
async fn run_task(
    category: QcCategory,
    request: QcLaunchRequest,
    api: ApiClient,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let launcher = launcher(api, config)?;
    let mut task = launcher.launch(category, &request).await?;
    log_info!("Launched {} QC as {}", category, task.temporary_id);
    println!("Launching {} QC on {}...", category, request.data_source_id);

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nInterrupted, disconnecting");
                task.handle.disconnect();
                break;
            }
            event = task.events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            TrackerEvent::Opened => println!("Connected, waiting for progress"),
            TrackerEvent::TaskIdAssigned { assigned, .. } => {
                log_info!("Task id assigned: {}", assigned);
                println!("Task id: {}", assigned);
            }
            TrackerEvent::Progress(reconciliation) => render_progress(&reconciliation),
            TrackerEvent::StepFailed { step } => println!("Step {} failed", step),
            TrackerEvent::Completed => println!("All steps completed"),
            TrackerEvent::Reconnecting(reason) => {
                log_warn!("Stream error: {}", reason);
                println!("Connection lost ({}), retrying", reason);
            }
            TrackerEvent::Failed(reason) => {
                log_error!("Task failed: {}", reason);
                eprintln!("{}", reason);
                break;
            }
            TrackerEvent::Closed => break,
        }
    }

    let task_id = task.task_id().await;
    let store = launcher.store();
    let store = store.lock().await;
    if let Some(execution) = store.select_execution_by_task_id(&task_id) {
        log_info!(
            "Task {} finished as {} after {} messages",
            task_id,
            execution.status,
            execution.messages.len()
        );
        println!(
            "Task {}: {} ({} messages)",
            task_id,
            execution.status,
            execution.messages.len()
        );
    }
    Ok(())
}

fn render_progress(reconciliation: &Reconciliation) {
    let Some(step) = reconciliation.current_step() else {
        return;
    };
    let mut line = format!(
        "[{}/{}] {:<14} {:<12} {:>5.1}%",
        step.descriptor.step_index + 1,
        reconciliation.total,
        step.descriptor.title,
        step.state.label(),
        step.progress
    );
    if step.total_quantity > 0 {
        line.push_str(&format!(
            "  {}/{} tables",
            step.completed_quantity, step.total_quantity
        ));
    }
    if let Some(table) = step.table_name.as_deref().or(step.table.as_deref()) {
        line.push_str(&format!("  {}", table));
    }
    println!("{}", line);
}

fn print_steps(category: QcCategory) {
    println!("{} QC:", category);
    for step in category.steps() {
        println!(
            "  {}. {:<14} {}",
            step.step_index + 1,
            step.title,
            step.description
        );
    }
}

fn print_users(page: &Page<admin::User>) {
    println!("{} users", page.total);
    for user in &page.rows {
        println!(
            "  {:>4} {:<16} {:<16} {}",
            user.user_id,
            user.user_name,
            user.nick_name.as_deref().unwrap_or("-"),
            user.email.as_deref().unwrap_or("-")
        );
    }
}

fn print_roles(page: &Page<admin::Role>) {
    println!("{} roles", page.total);
    for role in &page.rows {
        println!("  {:>4} {:<20} {}", role.role_id, role.role_name, role.role_key);
    }
}

fn print_dicts(page: &Page<admin::DictType>) {
    println!("{} dictionary types", page.total);
    for dict in &page.rows {
        println!("  {:>4} {:<20} {}", dict.dict_id, dict.dict_name, dict.dict_type);
    }
}

/// Session log file plus tracing on stderr
fn init_logging(verbose: bool, debug_mode: bool) {
    if let Err(e) = logging::init_logger() {
        eprintln!(
            "Cannot open log file {}: {}",
            logging::get_log_path_display(),
            e
        );
    }
    logging::set_debug_mode(verbose || debug_mode);

    let filter = if verbose || debug_mode {
        "qcwatch=debug,info"
    } else {
        "qcwatch=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

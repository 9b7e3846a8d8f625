mod tui;

use anyhow::{Context, Result, bail};
use apptrack::auth::AuthProvider;
use apptrack::config::{Config, LogFormat};
use apptrack::logging::{self, LogTarget};
use apptrack::models::{Status, User};
use apptrack::{
    ApplicationFormController, ApplicationListModel, DashboardAggregator, Database, Notice, SubmitOutcome,
    delete_application,
};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "apptrack")]
#[command(about = "Job application tracker - record, search, and chart where every application stands")]
struct Cli {
    /// Database file (overrides APPTRACK_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log output format (overrides APPTRACK_LOG_FORMAT)
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Create an account and sign in
    Signup {
        #[arg(short, long)]
        email: String,

        /// Password (prompted without echo when omitted)
        #[arg(short, long, env = "APPTRACK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign in to an existing account
    Login {
        #[arg(short, long)]
        email: String,

        /// Password (prompted without echo when omitted)
        #[arg(short, long, env = "APPTRACK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Record a new application
    Add {
        /// Company name
        #[arg(short, long)]
        company: String,

        /// Position applied for
        #[arg(short, long)]
        position: String,

        /// Status label or slug (submitted, oa-received, oa-completed, interview, rejected, offer)
        #[arg(short, long)]
        status: Status,
    },

    /// Change an application's fields
    Edit {
        /// Application ID (a unique prefix is enough)
        id: String,

        #[arg(short, long)]
        company: Option<String>,

        #[arg(short, long)]
        position: Option<String>,

        #[arg(short, long)]
        status: Option<Status>,
    },

    /// Delete an application
    Delete {
        /// Application ID (a unique prefix is enough)
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// List applications, newest first
    List {
        /// Only companies whose name contains this text
        #[arg(short, long)]
        search: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show application counts per status
    Dashboard {
        /// Print JSON instead of a chart
        #[arg(long)]
        json: bool,
    },

    /// List the selectable statuses
    Statuses,

    /// Browse applications interactively
    Browse,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?.with_overrides(cli.db, cli.log_format);

    let target = match cli.command {
        Commands::Browse => LogTarget::File(config.log_file()),
        _ => LogTarget::Stderr,
    };
    logging::init(&config, &target)?;

    let db = Database::open(&config.database_path)
        .with_context(|| format!("Failed to open database at {}", config.database_path.display()))?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Signup { email, password } => {
            db.ensure_initialized()?;
            let password = read_password(password)?;
            let user = db.sign_up(&email, &password).await?;
            println!("Account created. Signed in as {}", user.email);
        }

        Commands::Login { email, password } => {
            db.ensure_initialized()?;
            let password = read_password(password)?;
            let user = db.sign_in(&email, &password).await?;
            println!("Signed in as {}", user.email);
        }

        Commands::Logout => {
            db.ensure_initialized()?;
            db.sign_out().await?;
            println!("Signed out.");
        }

        Commands::Whoami => {
            db.ensure_initialized()?;
            match db.current_user()? {
                Some(user) => println!("{} ({})", user.email, user.id),
                None => println!("Not signed in."),
            }
        }

        Commands::Add {
            company,
            position,
            status,
        } => {
            db.ensure_initialized()?;
            let user = db.current_user()?;

            let mut form = ApplicationFormController::new();
            form.open_for_create();
            form.set_name(company);
            form.set_position(position);
            form.select_status(status);

            let result = form.submit(&db, user.as_ref().map(|u| u.id.as_str())).await;
            let notice = Notice::for_submit(&result);
            if notice.is_error() {
                bail!("{notice}");
            }
            if let Ok(outcome) = result {
                println!("{notice} ({})", outcome_id(&outcome));
            }
        }

        Commands::Edit {
            id,
            company,
            position,
            status,
        } => {
            db.ensure_initialized()?;
            let user = require_user(&db)?;
            let mut list = load_list(&db, &user).await?;
            let record = list.resolve(&id)?.clone();
            list.deactivate();

            let mut form = ApplicationFormController::new();
            form.open_for_edit(&record);
            if let Some(company) = company {
                form.set_name(company);
            }
            if let Some(position) = position {
                form.set_position(position);
            }
            if let Some(status) = status {
                form.select_status(status);
            }

            let result = form.submit(&db, Some(&user.id)).await;
            let notice = Notice::for_submit(&result);
            if notice.is_error() {
                bail!("{notice}");
            }
            println!("{notice}");
        }

        Commands::Delete { id, yes } => {
            db.ensure_initialized()?;
            let user = require_user(&db)?;
            let mut list = load_list(&db, &user).await?;
            let record = list.resolve(&id)?.clone();
            list.deactivate();

            if !yes && !confirm(&format!("Delete {} ({}, {})?", record.name, record.position, record.status))? {
                println!("Cancelled.");
                return Ok(());
            }

            let result = delete_application(&db, Some(&user.id), &record.id).await;
            let notice = Notice::for_delete(&result);
            if notice.is_error() {
                bail!("{notice}");
            }
            println!("{notice}");
        }

        Commands::List { search, json } => {
            db.ensure_initialized()?;
            let user = require_user(&db)?;
            let list = load_list(&db, &user).await?;
            let records = list.filter(search.as_deref().unwrap_or(""));

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No applications found.");
            } else {
                println!("{:<10} {:<12} {:<22} {:<26} {:<24}", "ID", "DATE", "STATUS", "COMPANY", "POSITION");
                println!("{}", "-".repeat(98));
                for record in records {
                    println!(
                        "{:<10} {:<12} {:<22} {:<26} {:<24}",
                        short_id(&record.id),
                        record.local_date().format("%Y-%m-%d"),
                        record.status.label(),
                        truncate(&record.name, 24),
                        truncate(&record.position, 24)
                    );
                }
            }
        }

        Commands::Dashboard { json } => {
            db.ensure_initialized()?;
            let user = require_user(&db)?;
            let mut dashboard = DashboardAggregator::new();
            dashboard.activate(&db, &user.id).await?;
            dashboard.sync().await;
            let stats = dashboard.stats();

            if json {
                let (labels, counts) = stats.chart_series();
                let report = serde_json::json!({
                    "state": dashboard.state(),
                    "total": stats.total(),
                    "offers": stats.offers(),
                    "labels": labels,
                    "counts": counts,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if !stats.has_data() {
                println!("No applications yet. Add one with 'apptrack add'.");
            } else {
                println!("Total applications: {}", stats.total());
                println!("Offers:             {}", stats.offers());
                println!();
                let widest = stats.histogram().map(|(_, n)| n).max().unwrap_or(0).max(1);
                for (status, count) in stats.histogram() {
                    let bar = "#".repeat(count * 40 / widest);
                    println!("{:<22} {:>4} {}", status.label(), count, bar);
                }
            }
            dashboard.deactivate();
        }

        Commands::Statuses => {
            println!("{:<14} {:<22} {}", "SLUG", "LABEL", "COLOR");
            for status in Status::ALL {
                println!("{:<14} {:<22} {}", status.slug(), status.label(), status.color());
            }
        }

        Commands::Browse => {
            db.ensure_initialized()?;
            let user = require_user(&db)?;
            tui::run_browse(&db, &user).await?;
        }
    }

    Ok(())
}

fn require_user(db: &Database) -> Result<User> {
    match db.current_user()? {
        Some(user) => Ok(user),
        None => bail!("Not signed in. Run 'apptrack login --email <address>' first."),
    }
}

/// Subscribes a list model and waits for the first snapshot.
async fn load_list(db: &Database, user: &User) -> Result<ApplicationListModel> {
    let mut list = ApplicationListModel::new();
    list.activate(db, &user.id).await?;
    if !list.sync().await {
        bail!("Subscription closed before any data arrived");
    }
    if let Some(reason) = list.last_error() {
        bail!("{}", Notice::for_subscription(reason));
    }
    Ok(list)
}

fn read_password(given: Option<String>) -> Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }

    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        let mut line = String::new();
        stdin.lock().read_line(&mut line).context("Failed to read password")?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    print!("Password: ");
    std::io::stdout().flush()?;
    enable_raw_mode()?;
    let password = read_hidden();
    disable_raw_mode()?;
    println!();
    password
}

#[derive(Debug, PartialEq, Eq)]
enum PasswordKey {
    Continue,
    Done,
    Cancelled,
}

/// Applies one key press to a password being typed with echo off.
fn password_key(buffer: &mut String, key: KeyEvent) -> PasswordKey {
    match key.code {
        KeyCode::Enter => PasswordKey::Done,
        KeyCode::Esc => PasswordKey::Cancelled,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => PasswordKey::Cancelled,
        KeyCode::Backspace => {
            buffer.pop();
            PasswordKey::Continue
        }
        KeyCode::Char(c) if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            buffer.push(c);
            PasswordKey::Continue
        }
        _ => PasswordKey::Continue,
    }
}

fn read_hidden() -> Result<String> {
    let mut buffer = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match password_key(&mut buffer, key) {
            PasswordKey::Continue => {}
            PasswordKey::Done => return Ok(buffer),
            PasswordKey::Cancelled => bail!("Password entry cancelled"),
        }
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn outcome_id(outcome: &SubmitOutcome) -> &str {
    match outcome {
        SubmitOutcome::Created(id) | SubmitOutcome::Updated(id) => short_id(id),
    }
}

fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(end, _)| &id[..end])
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

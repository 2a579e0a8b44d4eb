use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::bail;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use licman::auth::{PasswordHasher, generate_password, generate_secret};
use licman::config::ServerConfig;
use licman::server::{AppState, create_router};
use licman::store::{SqliteStore, Store};
use licman::sync::{FileCollector, run_refresh, spawn_daily};
use licman::types::{Credential, DEFAULT_LICENSE_LIMIT, Role, School, User, is_compliant_email};

/// Status values in the users import that mean "currently licensed".
const ACTIVE_STATUS_VALUES: &[&str] = &[
    "licenciado", "sim", "true", "1", "ativa", "ativo", "yes", "y", "active", "licença", "canva",
];

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "licman")]
#[command(about = "A school license management server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for database and snapshots
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },

    /// Run the allocation refresh once and exit
    Sync {
        /// Data directory for database and snapshots
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database, signing secret, and admin credential)
    Init {
        /// Data directory for database and snapshots
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Skip interactive prompts
        #[arg(long)]
        non_interactive: bool,
    },

    /// Seed schools and users from ;-separated CSV files
    Import {
        /// Data directory for database and snapshots
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Schools CSV (id;name;status;cluster;carteira_saf;city;state;region;...)
        #[arg(long)]
        schools: Option<PathBuf>,

        /// Users CSV (email;name;school_id;status_licenca)
        #[arg(long)]
        users: Option<PathBuf>,
    },
}

fn config_for(data_dir: String) -> ServerConfig {
    ServerConfig {
        data_dir: data_dir.into(),
        ..Default::default()
    }
}

fn run_init(data_dir: String, non_interactive: bool) -> anyhow::Result<()> {
    let config = config_for(data_dir);
    fs::create_dir_all(&config.data_dir)?;

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    if store.has_admin_credential()? {
        bail!(
            "Server already initialized. Admin credential exists in: {}",
            config.db_path().display()
        );
    }

    let secret_path = config.jwt_secret_path();
    if !secret_path.exists() {
        fs::write(&secret_path, generate_secret())?;
        #[cfg(unix)]
        set_restrictive_permissions(&secret_path);
    }

    let password = generate_password();
    let hasher = PasswordHasher::new();
    let now = Utc::now();
    store.create_credential(&Credential {
        username: "admin".to_string(),
        name: "Administrador".to_string(),
        role: Role::Admin,
        password_hash: hasher.hash(&password)?,
        created_at: now,
        updated_at: now,
    })?;

    let password_file = config.admin_password_path();
    fs::write(&password_file, &password)?;
    #[cfg(unix)]
    set_restrictive_permissions(&password_file);

    println!();
    println!("========================================");
    println!("Admin password (save this, it won't be shown again):");
    println!();
    println!("  {password}");
    println!();
    println!("Password also written to: {}", password_file.display());
    println!("========================================");
    println!();

    if !non_interactive {
        create_staff_user_prompt(&store, &hasher)?;
    }

    Ok(())
}

fn create_staff_user_prompt(store: &SqliteStore, hasher: &PasswordHasher) -> anyhow::Result<()> {
    let create_user = inquire::Confirm::new("Would you like to create a staff user?")
        .with_default(false)
        .prompt()?;

    if !create_user {
        return Ok(());
    }

    let username = inquire::Text::new("Username:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Err("Username cannot be empty".into())
            } else if input.contains(char::is_whitespace) {
                Err("Username cannot contain whitespace".into())
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;

    let name = inquire::Text::new("Display name:").prompt()?;
    let role_choice = inquire::Select::new(
        "Role:",
        vec![
            Role::Agent.as_str(),
            Role::Coordinator.as_str(),
            Role::Admin.as_str(),
        ],
    )
    .prompt()?;
    let role = Role::parse(role_choice)
        .ok_or_else(|| anyhow::anyhow!("unknown role: {role_choice}"))?;
    let password = inquire::Password::new("Password:").prompt()?;

    let now = Utc::now();
    store.create_credential(&Credential {
        username: username.trim().to_lowercase(),
        name,
        role,
        password_hash: hasher.hash(&password)?,
        created_at: now,
        updated_at: now,
    })?;

    println!();
    println!("Created user '{}' with role '{}'", username.trim().to_lowercase(), role);
    println!();

    Ok(())
}

#[derive(Debug, Deserialize)]
struct SchoolRow {
    id: String,
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    cluster: String,
    #[serde(default)]
    carteira_saf: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    neighborhood: String,
    #[serde(default)]
    contact_phone: String,
    #[serde(default)]
    contact_email: String,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    email: String,
    #[serde(default)]
    name: String,
    school_id: String,
    #[serde(default)]
    status_licenca: String,
}

fn has_active_license(status: &str) -> bool {
    let status = status.trim().to_lowercase();
    ACTIVE_STATUS_VALUES.contains(&status.as_str())
}

fn import_schools(store: &SqliteStore, path: &Path) -> anyhow::Result<usize> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut count = 0;
    for result in rdr.deserialize::<SchoolRow>() {
        let row = result?;
        if row.id.trim().is_empty() {
            continue;
        }

        store.upsert_school(&School {
            id: row.id.trim().to_string(),
            name: row.name,
            city: row.city,
            state: row.state,
            region: row.region,
            cluster: row.cluster,
            carteira_saf: row.carteira_saf,
            license_limit: DEFAULT_LICENSE_LIMIT,
            status: row.status,
            contact_email: row.contact_email,
            contact_phone: row.contact_phone,
            address: row.address,
            neighborhood: row.neighborhood,
        })?;
        count += 1;
    }

    Ok(count)
}

fn import_users(store: &SqliteStore, path: &Path) -> anyhow::Result<(usize, usize)> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut count = 0;
    let mut skipped = 0;
    for result in rdr.deserialize::<UserRow>() {
        let row = result?;
        let email = row.email.trim().to_lowercase();
        let school_id = row.school_id.trim();

        if email.is_empty() || school_id.is_empty() {
            skipped += 1;
            continue;
        }
        if store.get_school(school_id)?.is_none() {
            warn!("skipping user {email}: unknown school {school_id}");
            skipped += 1;
            continue;
        }

        store.upsert_user(&User {
            id: Uuid::new_v4().to_string(),
            school_id: school_id.to_string(),
            email: email.clone(),
            name: row.name,
            has_canva: has_active_license(&row.status_licenca),
            is_compliant: is_compliant_email(&email),
        })?;
        count += 1;
    }

    Ok((count, skipped))
}

fn run_import(
    data_dir: String,
    schools: Option<PathBuf>,
    users: Option<PathBuf>,
) -> anyhow::Result<()> {
    if schools.is_none() && users.is_none() {
        bail!("Nothing to import. Pass --schools and/or --users.");
    }

    let config = config_for(data_dir);
    fs::create_dir_all(&config.data_dir)?;
    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    if let Some(path) = schools {
        let count = import_schools(&store, &path)?;
        println!("Imported {count} schools from {}", path.display());
    }
    if let Some(path) = users {
        let (count, skipped) = import_users(&store, &path)?;
        println!(
            "Imported {count} users from {} ({skipped} skipped)",
            path.display()
        );
    }

    Ok(())
}

fn load_jwt_secret(config: &ServerConfig) -> anyhow::Result<Vec<u8>> {
    if let Ok(secret) = std::env::var("JWT_SECRET") {
        if !secret.is_empty() {
            return Ok(secret.into_bytes());
        }
    }

    let path = config.jwt_secret_path();
    if !path.exists() {
        bail!(
            "Server not initialized. Run 'licman admin init' first to create the database and signing secret."
        );
    }
    Ok(fs::read_to_string(&path)?.trim().to_string().into_bytes())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("licman=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                non_interactive,
            } => {
                run_init(data_dir, non_interactive)?;
            }
            AdminCommands::Import {
                data_dir,
                schools,
                users,
            } => {
                run_import(data_dir, schools, users)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
            };

            let secret = load_jwt_secret(&config)?;

            let store = SqliteStore::new(config.db_path())?;
            if !store.has_admin_credential()? {
                bail!(
                    "Server not initialized. Run 'licman admin init' first to create the admin credential."
                );
            }

            let state = Arc::new(AppState::new(Arc::new(store), config.clone(), secret));

            let _refresh_task = spawn_daily(state.store.clone(), config.clone());

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
        Commands::Sync { data_dir } => {
            let config = config_for(data_dir);
            let store = SqliteStore::new(config.db_path())?;
            store.initialize()?;

            let collector = FileCollector::new(config.raw_metrics_path());
            let summary = run_refresh(
                &collector,
                &config.schools_csv_path(),
                &config.snapshot_path(),
                Some(&store as &dyn Store),
            )
            .await?;

            println!(
                "Refresh complete: {} schools, {} users allocated, {} unallocated",
                summary.schools, summary.allocated, summary.unallocated
            );
        }
    }

    Ok(())
}

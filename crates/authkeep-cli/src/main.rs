use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use authkeep_core::{
    redirect_persistence_type, BackendKind, BackendType, LogicalKey, Persistence, SessionStore,
    StoreConfig, User, UserMetadata,
};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "authkeep", about = "Inspect and migrate persisted sign-in sessions")]
struct Cli {
    /// Config file (defaults to <config dir>/authkeep/authkeep.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the config's API key
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Override the config's app name
    #[arg(long, global = true)]
    app_name: Option<String>,

    /// Override the directory holding file-backed stores
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the active backend and the signed-in user
    Status,
    /// Store a user as the current session
    SignIn {
        #[arg(long)]
        uid: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        anonymous: bool,
    },
    /// Remove the current session
    SignOut,
    /// Move the current session to another backend
    Switch {
        #[arg(value_enum)]
        backend: BackendArg,
    },
    /// Record the active backend so it can be found after a redirect
    MarkRedirect,
    /// Look up the backend recorded by `mark-redirect`
    RedirectMarker {
        /// Remove the marker after reading it
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    /// In-memory, gone when the process exits
    None,
    /// Durable local file
    Local,
    /// Durable session file
    Session,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::None => BackendKind::None,
            BackendArg::Local => BackendKind::Local,
            BackendArg::Session => BackendKind::Session,
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("authkeep_core=debug,info"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<StoreConfig> {
    let path = cli.config.clone().or_else(StoreConfig::default_path);
    let mut config = match path {
        Some(path) if path.exists() => StoreConfig::load(&path)?,
        Some(path) if cli.config.is_some() => bail!("config file not found: {}", path.display()),
        _ => match &cli.api_key {
            Some(api_key) => StoreConfig::new(api_key.clone()),
            None => bail!("no config file found; pass --config or --api-key"),
        },
    };
    if let Some(api_key) = &cli.api_key {
        config.api_key = api_key.clone();
    }
    if let Some(app_name) = &cli.app_name {
        config.app_name = app_name.clone();
    }
    if let Some(dir) = &cli.storage_dir {
        config.storage_dir = Some(dir.clone());
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let hierarchy = config
        .build_hierarchy()
        .context("failed to set up storage backends")?;
    let mut store = SessionStore::<User>::create(config.coordinates(), hierarchy).await;

    match cli.command {
        Command::Status => {
            println!("backend: {}", store.backend_type());
            match store.current_user().await.context("failed to read current user")? {
                Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
                None => println!("signed out"),
            }
        }
        Command::SignIn {
            uid,
            email,
            display_name,
            anonymous,
        } => {
            let now = chrono::Utc::now();
            let created_at = store
                .current_user()
                .await
                .context("failed to read current user")?
                .filter(|u| u.uid == uid)
                .and_then(|u| u.metadata.created_at)
                .unwrap_or(now);
            let user = User {
                email,
                display_name,
                is_anonymous: anonymous,
                metadata: UserMetadata {
                    created_at: Some(created_at),
                    last_login_at: Some(now),
                },
                ..User::new(uid)
            };
            if store.backend_type() == BackendType::None {
                // Nothing on disk yet: sign in to the highest-priority durable backend.
                if let Some(&kind) = config.hierarchy.first() {
                    store.set_persistence(config.build_backend(kind)?).await?;
                }
            }
            store
                .set_current_user(&user)
                .await
                .context("failed to store user")?;
            println!("signed in {} ({})", user.uid, store.backend_type());
        }
        Command::SignOut => {
            store
                .remove_current_user()
                .await
                .context("failed to remove user")?;
            println!("signed out");
        }
        Command::Switch { backend } => {
            let kind = BackendKind::from(backend);
            let from = store.backend_type();
            store
                .set_persistence(config.build_backend(kind)?)
                .await
                .with_context(|| format!("failed to switch from {from} to {}", kind.name()))?;
            println!("{from} -> {}", store.backend_type());
        }
        Command::MarkRedirect => {
            store
                .save_persistence_for_redirect()
                .await
                .context("failed to write redirect marker")?;
            println!("marked {}", store.backend_type());
        }
        Command::RedirectMarker { clear } => {
            let coordinates = config.coordinates();
            let mut found = None;
            for backend in config.build_hierarchy()? {
                if let Some(marker) = redirect_persistence_type(&backend, &coordinates).await? {
                    found = Some(marker);
                    if clear {
                        backend
                            .remove(&coordinates.key(LogicalKey::Persistence))
                            .await?;
                    }
                    break;
                }
            }
            match found {
                Some(marker) => println!("{marker}"),
                None => println!("no marker"),
            }
        }
    }
    Ok(())
}


#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

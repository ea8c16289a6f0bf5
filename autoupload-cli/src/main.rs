//! Autoupload CLI
//!
//! Usage from the install directory:
//!   autoupload              # run the publishing loop forever
//!   autoupload once         # a single pass, report printed as JSON
//!   autoupload due          # today's and tomorrow's codes for this channel
//!   autoupload stage V001   # stage one code's media folder
//!   autoupload config       # print the resolved configuration

use anyhow::{bail, Context, Result};
use autoupload::cache::{RowCache, DEFAULT_CACHE_TTL};
use autoupload::config::{DEFAULT_LOG_FILE, DEFAULT_SERVER_ROOT, DEFAULT_SPREADSHEET};
use autoupload::job::INPUT_SHEET;
use autoupload::queue::purpose;
use autoupload::selector::{due_today, due_tomorrow};
use autoupload::{
    Clock, Config, FileStager, GoogleSheets, Orchestrator, PassOutcome, QueueClient, SystemClock,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

mod logging;

#[derive(Parser)]
#[command(name = "autoupload", version)]
#[command(about = "Publishes scheduled videos by driving the upload page on screen")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Everything detected from the install layout can be overridden here.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Install directory (defaults to the directory of this executable)
    #[arg(long, env = "AUTOUPLOAD_INSTALL_DIR", global = true)]
    install_dir: Option<PathBuf>,

    #[arg(long, env = "AUTOUPLOAD_CHANNEL", global = true)]
    channel: Option<String>,

    /// Browser executable for this channel
    #[arg(long, env = "AUTOUPLOAD_BROWSER", global = true)]
    browser: Option<PathBuf>,

    #[arg(long, env = "AUTOUPLOAD_SPREADSHEET", global = true)]
    spreadsheet: Option<String>,

    /// Spreadsheet id, skips the lookup by name
    #[arg(long, env = "AUTOUPLOAD_SPREADSHEET_ID", global = true)]
    spreadsheet_id: Option<String>,

    #[arg(long, env = "AUTOUPLOAD_LOCAL_ROOT", global = true)]
    local_root: Option<PathBuf>,

    #[arg(long, env = "AUTOUPLOAD_SERVER_ROOT", global = true)]
    server_root: Option<PathBuf>,

    #[arg(long, env = "AUTOUPLOAD_TEMPLATES", global = true)]
    templates: Option<PathBuf>,

    #[arg(long, env = "AUTOUPLOAD_CREDENTIALS", global = true)]
    credentials: Option<PathBuf>,

    #[arg(long, env = "AUTOUPLOAD_UPLOAD_URL", global = true)]
    upload_url: Option<String>,

    /// Leave the server copy in place after staging
    #[arg(long, env = "AUTOUPLOAD_KEEP_SERVER_COPY", global = true)]
    keep_server_copy: bool,

    #[arg(long, env = "AUTOUPLOAD_UPDATE_VERSION_URL", global = true)]
    update_version_url: Option<String>,

    #[arg(long, env = "AUTOUPLOAD_UPDATE_ARCHIVE_URL", global = true)]
    update_archive_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the publishing loop forever (default)
    Run,
    /// Run a single pass and print its report
    Once,
    /// Print the codes due today and tomorrow
    Due,
    /// Make sure one code's media folder is staged locally
    Stage {
        /// Job code
        code: String,
    },
    /// Print the resolved configuration as JSON
    Config,
}

fn install_dir_for(overrides: &Overrides, exe: &Path) -> Result<PathBuf> {
    match &overrides.install_dir {
        Some(dir) => Ok(dir.clone()),
        None => exe
            .parent()
            .map(Path::to_path_buf)
            .context("executable has no parent directory"),
    }
}

fn resolve_config(overrides: Overrides, install_dir: PathBuf) -> Result<Config> {
    let mut config = match Config::detect(&install_dir) {
        Ok(config) => config,
        Err(e) => match (&overrides.channel, &overrides.browser, &overrides.local_root) {
            (Some(channel), Some(browser), Some(local_root)) => Config::with_roots(
                channel.clone(),
                browser.clone(),
                DEFAULT_SPREADSHEET,
                local_root.clone(),
                DEFAULT_SERVER_ROOT,
                install_dir.clone(),
            ),
            _ => {
                return Err(e).with_context(|| {
                    format!(
                        "could not detect the install layout of {} \
                         (pass --channel, --browser and --local-root)",
                        install_dir.display()
                    )
                })
            }
        },
    };

    if let Some(channel) = overrides.channel {
        config.channel_code = channel;
    }
    if let Some(browser) = overrides.browser {
        config.browser_exe = browser;
    }
    if let Some(name) = overrides.spreadsheet {
        config.spreadsheet_name = name;
    }
    if overrides.spreadsheet_id.is_some() {
        config.spreadsheet_id = overrides.spreadsheet_id;
    }
    if let Some(root) = overrides.local_root {
        config.local_root = root;
    }
    if let Some(root) = overrides.server_root {
        config.server_root = root;
    }
    if let Some(dir) = overrides.templates {
        config.template_dir = dir;
    }
    if let Some(path) = overrides.credentials {
        config.credential_path = path;
    }
    if let Some(url) = overrides.upload_url {
        config.upload_url = url;
    }
    if overrides.keep_server_copy {
        config.delete_server_after_copy = false;
    }
    if overrides.update_version_url.is_some() {
        config.update.version_url = overrides.update_version_url;
    }
    if overrides.update_archive_url.is_some() {
        config.update.archive_url = overrides.update_archive_url;
    }
    Ok(config)
}

fn queue_client(config: &Config) -> Result<QueueClient> {
    let sheets = GoogleSheets::from_credential_file(
        &config.credential_path,
        config.spreadsheet_name.clone(),
        config.spreadsheet_id.clone(),
    )?;
    let cache = Arc::new(RowCache::new(Arc::new(SystemClock), DEFAULT_CACHE_TTL));
    Ok(QueueClient::new(Arc::new(sheets), cache))
}

/// Starts the freshly installed binary with the same arguments.
fn relaunch(exe: &Path) -> Result<()> {
    let args: Vec<_> = std::env::args_os().skip(1).collect();
    std::process::Command::new(exe)
        .args(&args)
        .spawn()
        .with_context(|| format!("failed to relaunch {}", exe.display()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    // Resolved before any update renames the running image.
    let exe = std::env::current_exe().context("cannot locate the running executable")?;

    let install_dir = install_dir_for(&cli.overrides, &exe)?;
    let _guard = logging::init_logging(&install_dir, DEFAULT_LOG_FILE)?;
    let config = resolve_config(cli.overrides, install_dir)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            info!(
                "Starting autoupload {} for {}",
                autoupload::update::VERSION,
                config.channel_code
            );
            let orchestrator = Orchestrator::from_config(&config)?;
            let version = orchestrator.run_forever().await;
            info!("Updated to {version}, restarting...");
            relaunch(&exe)?;
        }
        Commands::Once => {
            let orchestrator = Orchestrator::from_config(&config)?;
            match orchestrator.run_once().await {
                Ok(PassOutcome::Completed(report)) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                Ok(PassOutcome::RestartRequired { version }) => {
                    info!("Updated to {version}, restarting...");
                    relaunch(&exe)?;
                }
                Err(e) => {
                    error!("Pass failed: {e}");
                    return Err(e.into());
                }
            }
        }
        Commands::Due => {
            let queue = queue_client(&config)?;
            let rows = queue.fetch(INPUT_SHEET, purpose::ROWS).await?;
            let now = SystemClock.now();
            let today = due_today(&rows, &config.channel_code, now);
            let tomorrow = due_tomorrow(&rows, &config.channel_code, now);
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "channel": config.channel_code,
                    "today": today,
                    "tomorrow": tomorrow,
                }))?
            );
        }
        Commands::Stage { code } => {
            if code.trim().is_empty() {
                bail!("code must not be empty");
            }
            let stager = FileStager::new(&config.local_root, &config.server_root)
                .delete_server_after_copy(config.delete_server_after_copy);
            let outcome = stager.ensure_local(code.trim())?;
            let folder = stager.local_folder(code.trim());
            println!("{code}: {outcome:?} -> {}", folder.display());
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

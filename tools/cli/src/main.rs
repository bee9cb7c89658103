//! Veil CLI - hide folders behind a master password.
//!
//! This tool is the stand-in collaborator for the graphical surfaces:
//! it consumes the vault strictly through the session API and never
//! touches the manifest blob or key material itself.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroizing;

use veil_common::{Error as VaultError, FolderId};
use veil_crypto::KdfParams;
use veil_storage::{Settings, Theme, VaultLayout};
use veil_vault::{format_size, VaultSession};

#[derive(Parser)]
#[command(name = "veil")]
#[command(about = "Veil - hide folders behind a master password")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Vault root directory (default: the platform data directory).
    #[arg(long)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up a new vault with a master password.
    Init {
        /// KDF strength: "interactive", "moderate", or "sensitive".
        #[arg(short, long, default_value = "interactive")]
        strength: String,
    },

    /// List hidden folders.
    List,

    /// Hide a folder inside the vault.
    Hide {
        /// Folder to hide.
        path: PathBuf,
    },

    /// Unhide a folder back to its original location.
    Unhide {
        /// Folder identifier (see `veil list`).
        id: String,

        /// Replace the destination if it already exists.
        #[arg(long)]
        overwrite: bool,
    },

    /// Restore a folder to its original location by moving it.
    Restore {
        /// Folder identifier.
        id: String,
    },

    /// Permanently delete a hidden folder.
    #[command(alias = "delete")]
    Remove {
        /// Folder identifier.
        id: String,

        /// Skip the confirmation requirement.
        #[arg(long)]
        force: bool,
    },

    /// Print the storage path of a hidden folder for browsing.
    Open {
        /// Folder identifier.
        id: String,
    },

    /// Change the master password.
    Passwd,

    /// Show or set the UI theme.
    Theme {
        /// Theme name; omit to print the current one.
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let layout = resolve_layout(cli.root)?;

    match cli.command {
        Commands::Init { strength } => cmd_init(layout, &strength).await,
        Commands::List => cmd_list(layout).await,
        Commands::Hide { path } => cmd_hide(layout, &path).await,
        Commands::Unhide { id, overwrite } => cmd_unhide(layout, &id, overwrite).await,
        Commands::Restore { id } => cmd_restore(layout, &id).await,
        Commands::Remove { id, force } => cmd_remove(layout, &id, force).await,
        Commands::Open { id } => cmd_open(layout, &id).await,
        Commands::Passwd => cmd_passwd(layout).await,
        Commands::Theme { name } => cmd_theme(layout, name.as_deref()),
    }
}

fn resolve_layout(root: Option<PathBuf>) -> Result<VaultLayout> {
    let root = match root {
        Some(root) => root,
        None => VaultLayout::default_root()
            .context("no platform data directory; pass --root explicitly")?,
    };
    Ok(VaultLayout::new(root))
}

/// Prompt for a password without echoing it.
fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    let password = rpassword::prompt_password(prompt).context("failed to read password")?;
    Ok(Zeroizing::new(password))
}

/// Unlock a session for the vault at `layout`.
async fn unlock_session(layout: VaultLayout) -> Result<VaultSession> {
    let session = VaultSession::new(layout);
    if !session.is_initialized() {
        anyhow::bail!("no vault found; run `veil init` first");
    }

    let password = prompt_password("Master password: ")?;
    session
        .unlock(&password)
        .await
        .context("unlock failed")?;
    Ok(session)
}

/// Surface vault errors, with explicit warnings for the classes where
/// the filesystem already changed.
fn finish<T>(result: std::result::Result<T, VaultError>) -> Result<T> {
    match result {
        Err(e @ VaultError::Persistence(_)) => {
            eprintln!(
                "WARNING: the folder was moved, but the catalog could not be saved."
            );
            eprintln!("The vault listing is out of date; retry the operation or check the vault directory.");
            Err(e.into())
        }
        Err(e @ VaultError::Cleanup { .. }) => {
            eprintln!("WARNING: the copy completed, but the old location could not be deleted.");
            eprintln!("The data currently exists in both places; remove the duplicate manually.");
            Err(e.into())
        }
        other => other.map_err(Into::into),
    }
}

async fn cmd_init(layout: VaultLayout, strength: &str) -> Result<()> {
    let kdf = match strength {
        "interactive" => KdfParams::interactive(),
        "moderate" => KdfParams::moderate(),
        "sensitive" => KdfParams::sensitive(),
        _ => anyhow::bail!("invalid strength; use: interactive, moderate, or sensitive"),
    };

    let session = VaultSession::new(layout);
    if session.is_initialized() {
        anyhow::bail!("a vault already exists at {}", session.layout().root().display());
    }

    let password = prompt_password("Choose a master password: ")?;
    let confirm = prompt_password("Confirm password: ")?;
    if *password != *confirm {
        anyhow::bail!("passwords do not match");
    }

    session.initialize(&password, kdf).await?;

    println!("Vault created at {}", session.layout().root().display());
    println!("Run `veil hide <folder>` to hide your first folder.");
    Ok(())
}

async fn cmd_list(layout: VaultLayout) -> Result<()> {
    let session = unlock_session(layout).await?;
    let folders = session.list_folders().await?;

    if folders.is_empty() {
        println!("No hidden folders.");
        return Ok(());
    }

    println!(
        "{:<18} {:<24} {:>10}  {:<17} {}",
        "ID", "NAME", "SIZE", "HIDDEN AT", "ORIGINAL PATH"
    );
    for entry in folders {
        println!(
            "{:<18} {:<24} {:>10}  {:<17} {}",
            entry.id,
            entry.name,
            format_size(entry.size_bytes),
            entry.hidden_at.format("%Y-%m-%d %H:%M"),
            entry.original_path.display()
        );
    }
    Ok(())
}

async fn cmd_hide(layout: VaultLayout, path: &PathBuf) -> Result<()> {
    let path = std::fs::canonicalize(path)
        .with_context(|| format!("cannot resolve {}", path.display()))?;

    let session = unlock_session(layout).await?;
    let id = finish(session.hide_folder(&path).await)?;

    println!("Hidden {} as {}", path.display(), id);
    Ok(())
}

async fn cmd_unhide(layout: VaultLayout, id: &str, overwrite: bool) -> Result<()> {
    let id = FolderId::new(id)?;
    let session = unlock_session(layout).await?;

    match session.unhide_folder(&id, overwrite).await {
        Err(VaultError::DestinationExists(path)) => {
            anyhow::bail!(
                "{} already exists; rerun with --overwrite to replace it",
                path.display()
            );
        }
        result => finish(result)?,
    }

    println!("Folder {} is back in its original location.", id);
    Ok(())
}

async fn cmd_restore(layout: VaultLayout, id: &str) -> Result<()> {
    let id = FolderId::new(id)?;
    let session = unlock_session(layout).await?;

    finish(session.restore_folder(&id).await)?;

    println!("Folder {} restored.", id);
    Ok(())
}

async fn cmd_remove(layout: VaultLayout, id: &str, force: bool) -> Result<()> {
    if !force {
        anyhow::bail!("permanent deletion cannot be undone; rerun with --force to confirm");
    }

    let id = FolderId::new(id)?;
    let session = unlock_session(layout).await?;

    finish(session.remove_folder(&id).await)?;

    println!("Folder {} permanently deleted.", id);
    Ok(())
}

async fn cmd_open(layout: VaultLayout, id: &str) -> Result<()> {
    let id = FolderId::new(id)?;
    let session = unlock_session(layout).await?;

    let path = session.storage_path_for(&id).await?;
    println!("{}", path.display());
    Ok(())
}

async fn cmd_passwd(layout: VaultLayout) -> Result<()> {
    let session = VaultSession::new(layout);
    if !session.is_initialized() {
        anyhow::bail!("no vault found; run `veil init` first");
    }

    // The unlock password doubles as the old password to replace.
    let old = prompt_password("Current password: ")?;
    session.unlock(&old).await.context("unlock failed")?;

    let new = prompt_password("New password: ")?;
    let confirm = prompt_password("Confirm new password: ")?;
    if *new != *confirm {
        anyhow::bail!("passwords do not match");
    }

    session.change_password(&old, &new).await?;

    println!("Master password changed.");
    Ok(())
}

fn cmd_theme(layout: VaultLayout, name: Option<&str>) -> Result<()> {
    let settings_path = layout.settings_file();
    let mut settings = Settings::load(&settings_path);

    match name {
        None => println!("{}", settings.theme.name()),
        Some(name) => {
            let theme = Theme::parse(name).with_context(|| {
                "unknown theme; valid names: light, dark, neon-dark, forest, ocean".to_string()
            })?;
            settings.theme = theme;
            settings.save(&settings_path)?;
            println!("Theme set to {}.", theme.name());
        }
    }
    Ok(())
}

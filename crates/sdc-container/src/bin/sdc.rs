//! sdc: command-line tool for secure document containers.
//!
//! Containers live in a directory store (`--store` or `SDC_STORE_DIR`).
//! Results are printed as JSON on stdout; logs and errors go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use sdc_container::access::{access_state, AccessState};
use sdc_container::{codec, verify_container, ContainerService, DirStore, ShareLocator};
use sdc_core::{ContainerStore, CreateOptions, Credentials, MetadataFields, SdcConfig};
use sdc_crypto::{load_private_key, save_private_key, save_public_key, KdfParams, PrivateKey};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "sdc")]
#[command(author, version, about = "Secure document containers")]
#[command(propagate_version = true)]
struct Cli {
    /// Container store directory
    #[arg(long, global = true, env = "SDC_STORE_DIR")]
    store: Option<PathBuf>,

    /// Actor id recorded in audit events
    #[arg(long, global = true, env = "SDC_ACTOR", default_value = "cli")]
    actor: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file into a new container
    Create {
        /// File to protect
        #[arg(short, long)]
        input: PathBuf,

        /// Title (default: the file name)
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        author: Option<String>,

        /// Tag (can specify multiple)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Expire this many hours after creation
        #[arg(long, conflicts_with = "expires_at")]
        expires_in_hours: Option<i64>,

        /// Expiry timestamp (RFC 3339)
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,

        /// Maximum number of successful reads
        #[arg(long)]
        max_views: Option<u32>,

        /// Also allow opening with this password (min 12 characters)
        #[arg(long, env = "SDC_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Store the payload unencrypted (signed only)
        #[arg(long, conflicts_with = "password")]
        no_encrypt: bool,

        /// PBKDF2 rounds (default: SDC_KDF_ROUNDS)
        #[arg(long)]
        rounds: Option<u32>,

        /// Compression level to record (0-9)
        #[arg(long)]
        compression_level: Option<u8>,

        /// Save the private key to this file instead of printing it
        #[arg(long, requires = "key_passphrase")]
        key_out: Option<PathBuf>,

        /// Passphrase protecting the saved private key (min 12 characters)
        #[arg(long, env = "SDC_KEY_PASSPHRASE", hide_env_values = true)]
        key_passphrase: Option<String>,

        /// Protect the key file with 32 MiB Argon2id instead of 64 MiB
        #[arg(long, requires = "key_out")]
        low_memory: bool,

        /// Print a share locator
        #[arg(long)]
        share: bool,
    },

    /// Decrypt a container to a file (records a view)
    Read {
        id: Uuid,

        /// Output file for the plaintext
        #[arg(short, long)]
        output: PathBuf,

        /// Password
        #[arg(long, env = "SDC_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Private key (base64)
        #[arg(long, conflicts_with_all = ["password", "key_file"])]
        key: Option<String>,

        /// Private key file written by `create --key-out`
        #[arg(long, requires = "key_passphrase", conflicts_with = "password")]
        key_file: Option<PathBuf>,

        /// Passphrase for the private key file
        #[arg(long, env = "SDC_KEY_PASSPHRASE", hide_env_values = true)]
        key_passphrase: Option<String>,
    },

    /// Show metadata and access state without decrypting
    Inspect { id: Uuid },

    /// Check framing and signature of an exported container file
    Verify {
        /// Exported container file
        path: PathBuf,

        /// Share locator the container must match
        #[arg(long)]
        locator: Option<String>,
    },

    /// Print the share locator for a container
    Share { id: Uuid },

    /// Write a container's exported form to a file
    Export {
        id: Uuid,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Verify and store an exported container file
    Import { path: PathBuf },

    /// Delete a container from the store
    Delete { id: Uuid },

    /// List stored container ids
    List,
}

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors
    //   RUST_LOG    - standard env filter (default: "sdc=info,sdc_container=info")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sdc=info,sdc_container=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("sdc.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // stdout carries command output
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = SdcConfig::from_env().context("Invalid configuration")?;
    if let Some(store) = cli.store {
        config.store_dir = store;
    }

    let store = DirStore::open(&config.store_dir).await?;
    info!(store = %store.root().display(), "Opened container store");
    let service = ContainerService::new(store, config);
    let actor = cli.actor.as_str();

    let output = match cli.command {
        Commands::Create {
            input,
            title,
            description,
            author,
            tags,
            expires_in_hours,
            expires_at,
            max_views,
            password,
            no_encrypt,
            rounds,
            compression_level,
            key_out,
            key_passphrase,
            low_memory,
            share,
        } => {
            let plaintext = std::fs::read(&input)
                .with_context(|| format!("Cannot read {}", input.display()))?;
            let filename = input
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or("document");

            let expires_at = match expires_in_hours {
                Some(hours) => {
                    let ttl = Duration::try_hours(hours)
                        .with_context(|| format!("Expiry of {} hours is out of range", hours))?;
                    Some(Utc::now() + ttl)
                }
                None => expires_at,
            };

            let details = MetadataFields {
                title: title.unwrap_or_default(),
                description,
                author,
                tags,
                ..Default::default()
            };
            let options = CreateOptions {
                compression_level: compression_level
                    .unwrap_or(service.config().compression_level),
                encryption_enabled: !no_encrypt,
                key_derivation_rounds: rounds,
                expires_at,
                max_views,
                requires_password: password.is_some(),
                password,
                generate_share_locator: share,
            };

            let created = service
                .create_container(actor, &plaintext, filename, details, options)
                .await?;
            let container = &created.container;

            let mut out = serde_json::json!({
                "id": container.id,
                "name": container.name,
                "encrypted": container.is_encrypted(),
                "dataSize": container.data_size(),
                "publicKey": container.public_key,
            });

            match (key_out, key_passphrase) {
                (Some(path), Some(passphrase)) => {
                    let params = if low_memory {
                        KdfParams::low_memory()
                    } else {
                        KdfParams::default()
                    };
                    save_private_key(&created.private_key, &path, &passphrase, &params)?;
                    let public_path = path.with_extension("pub");
                    save_public_key(
                        &container.public_key,
                        &public_path,
                        Some(container.name.as_str()),
                    )?;
                    out["privateKeyPath"] = path.to_string_lossy().into();
                    out["publicKeyPath"] = public_path.to_string_lossy().into();
                }
                _ => {
                    out["privateKey"] = created.private_key.to_base64().into();
                }
            }

            if let Some(locator) = created.share_locator {
                out["shareLocator"] = locator.to_string().into();
                out["shareUrl"] = service.share_url(&locator).into();
            }
            out
        }

        Commands::Read {
            id,
            output,
            password,
            key,
            key_file,
            key_passphrase,
        } => {
            let credentials = match (key, key_file, key_passphrase, password) {
                (Some(encoded), _, _, _) => {
                    Credentials::PrivateKey(PrivateKey::from_base64(&encoded)?)
                }
                (None, Some(path), Some(passphrase), _) => {
                    Credentials::PrivateKey(load_private_key(&path, &passphrase)?)
                }
                (None, None, _, Some(password)) => Credentials::Password(password),
                _ => Credentials::None,
            };

            let outcome = service.read_container(actor, id, credentials).await?;
            std::fs::write(&output, &outcome.plaintext)
                .with_context(|| format!("Cannot write {}", output.display()))?;

            serde_json::json!({
                "id": id,
                "output": output.to_string_lossy(),
                "bytes": outcome.plaintext.len(),
                "viewsRemaining": outcome.views_remaining,
            })
        }

        Commands::Inspect { id } => {
            let container = service.store().fetch(id).await?;
            serde_json::json!({
                "id": container.id,
                "name": container.name,
                "originalFormat": container.original_format,
                "createdAt": container.created_at,
                "lastModified": container.last_modified,
                "dataSize": container.data_size(),
                "signatureValid": verify_container(&container),
                "accessState": access_state_name(access_state(
                    &container.metadata.access,
                    Utc::now()
                )),
                "viewsRemaining": container.views_remaining(),
                "metadata": container.metadata,
            })
        }

        Commands::Verify { path, locator } => {
            let bytes =
                std::fs::read(&path).with_context(|| format!("Cannot read {}", path.display()))?;
            let container = codec::decode(&bytes)?;
            let signature_valid = verify_container(&container);

            let locator_matches = locator
                .map(|s| {
                    ShareLocator::parse(&s).map(|loc| {
                        loc.file_id() == container.id
                            && loc.matches_public_key(&container.public_key)
                    })
                })
                .transpose()?;

            let out = serde_json::json!({
                "id": container.id,
                "signatureValid": signature_valid,
                "locatorMatches": locator_matches,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);

            if !signature_valid || locator_matches == Some(false) {
                bail!("Verification failed for {}", path.display());
            }
            return Ok(());
        }

        Commands::Share { id } => {
            let container = service.store().fetch(id).await?;
            let locator = service.share_locator(container.id, &container.public_key);
            serde_json::json!({
                "id": id,
                "shareLocator": locator.to_string(),
                "shareUrl": service.share_url(&locator),
            })
        }

        Commands::Export { id, output } => {
            let bytes = service.export_container(actor, id).await?;
            std::fs::write(&output, &bytes)
                .with_context(|| format!("Cannot write {}", output.display()))?;
            serde_json::json!({
                "id": id,
                "output": output.to_string_lossy(),
                "bytes": bytes.len(),
            })
        }

        Commands::Import { path } => {
            let bytes =
                std::fs::read(&path).with_context(|| format!("Cannot read {}", path.display()))?;
            let container = service.import_container(actor, &bytes).await?;
            serde_json::json!({
                "id": container.id,
                "name": container.name,
            })
        }

        Commands::Delete { id } => {
            service.delete_container(actor, id).await?;
            serde_json::json!({ "id": id, "deleted": true })
        }

        Commands::List => {
            let ids = service.store().list_ids().await?;
            serde_json::json!({ "containers": ids })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn access_state_name(state: AccessState) -> &'static str {
    match state {
        AccessState::Unrestricted => "unrestricted",
        AccessState::Available => "available",
        AccessState::Expired => "expired",
        AccessState::Exhausted => "exhausted",
    }
}

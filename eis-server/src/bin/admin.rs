//! EIS Admin - operator tooling for seeding master data and testing the
//! SIMPUS webhook.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use eis::auth::{hash_password, RoleCode};
use eis::store::NewUser;
use eis::webhook::{signature_header, FacilityRef, SIGNATURE_HEADER};
use eis::Store;

#[derive(Parser)]
#[command(name = "eis-admin")]
#[command(about = "Operator tooling for the EIS dashboard")]
struct Cli {
    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "eis.db", global = true)]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a puskesmas
    AddPuskesmas {
        /// External code used by SIMPUS (e.g. PKM-SKM)
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        /// Region the puskesmas belongs to
        #[arg(long)]
        wilayah: Option<String>,
    },
    /// Create a user account
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// Role code, e.g. KEPALA_DINAS or STAFF_PUSKESMAS
        #[arg(long)]
        role: RoleCode,
        #[arg(long, env = "EIS_ADMIN_PASSWORD")]
        password: String,
        /// Puskesmas code; required for puskesmas roles
        #[arg(long)]
        puskesmas: Option<String>,
        #[arg(long)]
        wilayah: Option<String>,
    },
    /// Print an Argon2 hash for a password
    HashPassword {
        #[arg(long, env = "EIS_ADMIN_PASSWORD")]
        password: String,
    },
    /// Print the signature header for a webhook body file
    SignWebhook {
        /// File containing the exact body to send
        #[arg(long)]
        body: PathBuf,
        #[arg(long, env = "SIMPUS_WEBHOOK_SECRET", hide_env_values = true)]
        secret: String,
        /// Unix timestamp to sign with; defaults to now
        #[arg(long)]
        timestamp: Option<i64>,
    },
}

fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to read .env");
        }
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::AddPuskesmas {
            code,
            name,
            wilayah,
        } => {
            let store = open_store(&cli.database)?;
            let puskesmas = store
                .insert_puskesmas(&code, &name, wilayah.as_deref())
                .with_context(|| format!("Failed to add puskesmas {}", code))?;
            println!("{}", puskesmas.id);
        }
        Commands::CreateUser {
            email,
            name,
            role,
            password,
            puskesmas,
            wilayah,
        } => {
            let store = open_store(&cli.database)?;

            let puskesmas_id = match puskesmas {
                Some(code) => {
                    let found = store
                        .find_puskesmas(&FacilityRef::Code(code.clone()))?
                        .with_context(|| format!("Unknown puskesmas code {}", code))?;
                    Some(found.id)
                }
                None => None,
            };
            if !role.is_district_level() && puskesmas_id.is_none() {
                bail!("Role {} requires --puskesmas", role);
            }

            let password_hash = hash_password(&password)?;
            let id = store
                .create_user(NewUser {
                    email,
                    name,
                    password_hash,
                    role_code: role,
                    puskesmas_id,
                    wilayah_id: wilayah,
                })
                .context("Failed to create user")?;
            println!("{}", id);
        }
        Commands::HashPassword { password } => {
            println!("{}", hash_password(&password)?);
        }
        Commands::SignWebhook {
            body,
            secret,
            timestamp,
        } => {
            let raw = fs::read(&body).with_context(|| format!("Failed to read {}", body.display()))?;
            let timestamp = timestamp.unwrap_or_else(|| Utc::now().timestamp());
            let header = signature_header(secret.as_bytes(), timestamp, &raw)?;
            println!("{}: {}", SIGNATURE_HEADER, header);
        }
    }

    Ok(())
}

fn open_store(path: &Path) -> Result<Store> {
    Store::open(path).with_context(|| format!("Failed to open database {}", path.display()))
}

use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use server_api::{ApiContext, StaffAccount};
use shared::{domain::StaffId, error::ApiError};
use storage::Storage;
use transfer::{MatchKey, TransferError};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/inventory.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a staff account that can log in to the dashboard.
    CreateStaff {
        username: String,
        password: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long, default_value = "")]
        email: String,
    },
    /// Enable or disable a staff account.
    SetActive {
        staff_id: i64,
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },
    ImportProducts {
        path: PathBuf,
        #[arg(long, default_value = "id", value_parser = parse_match_key)]
        match_key: MatchKey,
    },
    ExportProducts {
        path: PathBuf,
    },
}

fn parse_match_key(raw: &str) -> Result<MatchKey, String> {
    raw.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = ApiContext {
        storage: Storage::new(&cli.database_url).await?,
        import_key: MatchKey::default(),
    };

    match cli.command {
        Command::CreateStaff {
            username,
            password,
            first_name,
            last_name,
            email,
        } => {
            let staff_id = server_api::create_staff(
                &ctx,
                &StaffAccount {
                    username,
                    password,
                    first_name,
                    last_name,
                    email,
                },
            )
            .await
            .map_err(cli_error)?;
            println!("created staff_id={}", staff_id.0);
        }
        Command::SetActive { staff_id, active } => {
            server_api::set_staff_active(&ctx, StaffId(staff_id), active)
                .await
                .map_err(cli_error)?;
            println!("staff_id={staff_id} active={active}");
        }
        Command::ImportProducts { path, match_key } => {
            let bytes =
                fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
            match transfer::import_products(&ctx.storage, &bytes, match_key).await {
                Ok(summary) => println!(
                    "imported {} row(s): {} inserted, {} updated",
                    summary.total(),
                    summary.inserted,
                    summary.updated
                ),
                Err(TransferError::InvalidRows(rows)) => {
                    for row in &rows {
                        eprintln!("{row}");
                    }
                    bail!("import aborted, {} row(s) had errors; nothing was changed", rows.len());
                }
                Err(other) => return Err(other.into()),
            }
        }
        Command::ExportProducts { path } => {
            let bytes = transfer::export_products(&ctx.storage).await?;
            fs::write(&path, &bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {} bytes to {}", bytes.len(), path.display());
        }
    }

    Ok(())
}

fn cli_error(err: ApiError) -> anyhow::Error {
    if err.fields.is_empty() {
        anyhow::anyhow!(err.message)
    } else {
        anyhow::anyhow!(err.fields.summary())
    }
}

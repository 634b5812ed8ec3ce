use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use server_api::{
    attend, delete_attendance, list_attendances,
    session::{mint_token, SessionConfig},
    ApiContext,
};
use shared::{
    domain::{AttendeeId, GigId},
    protocol::AttendanceDto,
};
use storage::Storage;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/gighub.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mark `attendee_id` as attending `gig_id`.
    Attend { gig_id: i64, attendee_id: String },
    /// Remove the attendance of `attendee_id` at `gig_id`.
    Remove { gig_id: i64, attendee_id: String },
    List { attendee_id: String },
    /// Print a bearer token for local testing.
    MintToken {
        /// Defaults to a fresh random id.
        attendee_id: Option<String>,
        #[arg(long, default_value = "devsecret")]
        secret: String,
        #[arg(long, default_value = "gighub")]
        issuer: String,
        #[arg(long, default_value_t = 3600)]
        ttl_seconds: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Attend {
            gig_id,
            attendee_id,
        } => {
            let ctx = open(&cli.database_url).await?;
            attend(
                &ctx,
                &AttendeeId::new(attendee_id),
                &AttendanceDto {
                    gig_id: GigId(gig_id),
                },
            )
            .await?;
            println!("attending gig_id={gig_id}");
        }
        Command::Remove {
            gig_id,
            attendee_id,
        } => {
            let ctx = open(&cli.database_url).await?;
            let removed =
                delete_attendance(&ctx, &AttendeeId::new(attendee_id), GigId(gig_id)).await?;
            println!("removed attendance gig_id={removed}");
        }
        Command::List { attendee_id } => {
            let ctx = open(&cli.database_url).await?;
            for attendance in list_attendances(&ctx, &AttendeeId::new(attendee_id)).await? {
                println!("gig_id={}", attendance.gig_id);
            }
        }
        Command::MintToken {
            attendee_id,
            secret,
            issuer,
            ttl_seconds,
        } => {
            let attendee_id = attendee_id
                .map(AttendeeId::new)
                .unwrap_or_else(|| AttendeeId::new(Uuid::new_v4().to_string()));
            let token = mint_token(
                &SessionConfig {
                    secret,
                    issuer,
                    ttl_seconds,
                },
                &attendee_id,
            )
            .context("failed to mint token")?;
            println!("attendee_id={attendee_id}");
            println!("{token}");
        }
    }

    Ok(())
}

async fn open(database_url: &str) -> Result<ApiContext> {
    let storage = Storage::new(database_url)
        .await
        .with_context(|| format!("failed to open database '{database_url}'"))?;
    Ok(ApiContext::new(storage))
}

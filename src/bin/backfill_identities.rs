//! Identity backfill script
//!
//! Rewrites historical records whose identity fields (ride driver/riders,
//! chat participants and message senders, report updated_by) hold a username
//! instead of the stable user id. Values that resolve neither way are flagged
//! for manual review and the record is left in legacy form.
//!
//! ## Usage
//!
//! ```bash
//! # Dry run (default) - classifies and reports without writing
//! cargo run --bin backfill-identities -- --seed dump.json
//!
//! # Actually perform the conversion and write the result
//! cargo run --bin backfill-identities -- --seed dump.json --execute --out converted.json
//! ```
//!
//! The seed file is a JSON dump with `users`, `rides`, `chats` and
//! `error_reports` arrays.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;

use ride_sync_service::config::Config;
use ride_sync_service::identity::IdentityStore;
use ride_sync_service::migration::{BackfillConfig, IdentityBackfill, MigrationState};
use ride_sync_service::models::{Chat, ErrorReport, Ride, User};
use ride_sync_service::store::Store;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SeedData {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    rides: Vec<Ride>,
    #[serde(default)]
    chats: Vec<Chat>,
    #[serde(default)]
    error_reports: Vec<ErrorReport>,
}

struct CliOptions {
    seed_path: Option<String>,
    out_path: Option<String>,
    batch_size: Option<usize>,
    dry_run: bool,
    fail_fast: bool,
}

impl CliOptions {
    fn parse(args: &[String]) -> anyhow::Result<Option<Self>> {
        let mut options = Self {
            seed_path: None,
            out_path: None,
            batch_size: None,
            dry_run: true,
            fail_fast: false,
        };

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--execute" | "-e" => options.dry_run = false,
                "--dry-run" | "-d" => options.dry_run = true,
                "--fail-fast" | "-f" => options.fail_fast = true,
                "--seed" | "-s" => {
                    i += 1;
                    options.seed_path =
                        Some(args.get(i).context("--seed requires a file path")?.clone());
                }
                "--out" | "-o" => {
                    i += 1;
                    options.out_path =
                        Some(args.get(i).context("--out requires a file path")?.clone());
                }
                "--batch-size" | "-b" => {
                    i += 1;
                    let size: usize = args
                        .get(i)
                        .context("--batch-size requires a number")?
                        .parse()
                        .context("--batch-size must be a positive integer")?;
                    if size == 0 {
                        bail!("--batch-size must be greater than zero");
                    }
                    options.batch_size = Some(size);
                }
                "--help" | "-h" => {
                    println!(
                        r#"Identity Backfill Script

Converts legacy username references in rides, chats and error reports
to stable user ids.

USAGE:
    backfill-identities --seed <FILE> [OPTIONS]

OPTIONS:
    --seed, -s <FILE>       JSON dump to process (required)
    --out, -o <FILE>        Where to write the converted dump (execute mode)
    --batch-size, -b <N>    Records per scan batch
                            (default: MIGRATION_BATCH_SIZE env var, or 100)
    --dry-run, -d           Classify and report without writing (default)
    --execute, -e           Actually perform the conversion
    --fail-fast, -f         Abort on the first unresolved reference
    --help, -h              Show this help message
"#
                    );
                    return Ok(None);
                }
                other => bail!("Unknown argument: {}", other),
            }
            i += 1;
        }

        Ok(Some(options))
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(options) = CliOptions::parse(&args)? else {
        return Ok(());
    };
    let seed_path = options
        .seed_path
        .as_deref()
        .context("--seed <FILE> is required (see --help)")?;
    let config = Config::from_env().context("failed to load configuration")?;
    let batch_size = options.batch_size.unwrap_or(config.migration_batch_size);

    println!("=== Identity Backfill ===");
    println!("Seed: {}", seed_path);
    println!("Batch size: {}", batch_size);
    println!(
        "Mode: {}",
        if options.dry_run { "DRY RUN" } else { "EXECUTE" }
    );
    println!();

    let raw = fs::read_to_string(seed_path)
        .with_context(|| format!("failed to read seed file {}", seed_path))?;
    let seed: SeedData = serde_json::from_str(&raw).context("failed to parse seed file")?;

    let identity = IdentityStore::new();
    for user in &seed.users {
        identity
            .create_user(user.clone())
            .with_context(|| format!("duplicate user in seed: {}", user.id))?;
    }

    let store = Store::new();
    for ride in &seed.rides {
        store
            .rides
            .insert_legacy(ride.clone())
            .with_context(|| format!("duplicate ride in seed: {}", ride.id))?;
    }
    for chat in &seed.chats {
        store
            .chats
            .insert_legacy(chat.clone())
            .with_context(|| format!("duplicate chat in seed: {}", chat.id))?;
    }
    for report in &seed.error_reports {
        store
            .reports
            .insert_legacy(report.clone())
            .with_context(|| format!("duplicate report in seed: {}", report.id))?;
    }

    println!(
        "Loaded {} users, {} rides, {} chats, {} error reports",
        seed.users.len(),
        seed.rides.len(),
        seed.chats.len(),
        seed.error_reports.len()
    );

    let backfill = IdentityBackfill::new(
        store.clone(),
        identity,
        BackfillConfig {
            batch_size,
            dry_run: options.dry_run,
            fail_fast: options.fail_fast,
        },
    );
    let report = backfill.run();

    println!("\n=== Backfill Summary ===");
    println!("Records scanned: {}", report.scanned);
    println!(
        "{}: {}",
        if options.dry_run {
            "Would convert"
        } else {
            "Converted"
        },
        report.converted
    );
    println!("Already stable: {}", report.already_stable);
    println!("Unresolved references: {}", report.unresolved.len());
    for reference in &report.unresolved {
        println!(
            "  FLAG: {} {} field {} value \"{}\"",
            reference.collection, reference.record_id, reference.field, reference.value
        );
    }
    if report.state == MigrationState::Failed {
        println!("\nAborted on the first unresolved reference (--fail-fast); re-run to resume.");
    }

    if !options.dry_run {
        if let Some(out_path) = &options.out_path {
            let converted = SeedData {
                users: seed.users,
                rides: store.rides.snapshot_filtered(|_| true),
                chats: store.chats.snapshot_filtered(|_| true),
                error_reports: store.reports.snapshot_filtered(|_| true),
            };
            let json = serde_json::to_string_pretty(&converted)?;
            fs::write(out_path, json)
                .with_context(|| format!("failed to write {}", out_path))?;
            println!("\nConverted dump written to {}", out_path);
        } else {
            println!("\nNo --out file given; converted data was not persisted.");
        }
    } else {
        println!("\n** This was a dry run. Use --execute to actually convert records. **");
    }

    Ok(())
}

use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;
use std::sync::Arc;

use hub_sync::{
    load_journal_csv, load_ledger_json, validate_batch, HubConfig, HubError, SqliteStore,
    SyncEngine, DEFAULT_LOG_FILTER,
};

const USAGE: &str =
    "usage: hub-sync <init | status | import-journals <csv> | import-ledger <json>>";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let config = HubConfig::from_env()?;

    match args.get(1).map(String::as_str) {
        Some("init") => run_init(&config),
        Some("status") => run_status(&config),
        Some("import-journals") => match args.get(2) {
            Some(path) => run_import_journals(&config, Path::new(path)),
            None => bail!("import-journals needs a CSV path\n{USAGE}"),
        },
        Some("import-ledger") => match args.get(2) {
            Some(path) => run_import_ledger(&config, Path::new(path)),
            None => bail!("import-ledger needs a JSON path\n{USAGE}"),
        },
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
}

fn open_store(config: &HubConfig) -> Result<SqliteStore> {
    let path = &config.database_path;
    SqliteStore::open(path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn open_engine(config: &HubConfig) -> Result<SyncEngine> {
    let store = Arc::new(open_store(config)?);
    Ok(SyncEngine::new(store.clone(), store).with_max_error_details(config.max_error_details))
}

fn run_init(config: &HubConfig) -> Result<()> {
    println!("🗄️  Hub Sync - initialising store");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    open_store(config)?;
    println!("✓ Schema ready at {} (WAL mode)", config.database_path.display());
    Ok(())
}

fn run_status(config: &HubConfig) -> Result<()> {
    let stats = open_engine(config)?.stats()?;

    println!("📊 Hub Sync status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("   Ledgers:  {}", stats.ledgers);
    println!("   Journals: {}", stats.journals);
    Ok(())
}

fn run_import_journals(config: &HubConfig, csv_path: &Path) -> Result<()> {
    println!("📂 Loading {}...", csv_path.display());
    let inputs = load_journal_csv(csv_path)?;
    println!("✓ Loaded {} journal rows", inputs.len());

    let entries = match validate_batch(inputs) {
        Ok(entries) => entries,
        Err(details) => {
            eprintln!("❌ Validation failed, nothing imported:");
            for d in &details {
                eprintln!("   {}: {}", d.journal_external_id, d.error);
            }
            return Err(HubError::Validation(details).into());
        }
    };

    let result = open_engine(config)?.sync_journals(entries)?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Created: {}", result.created);
    println!("✓ Updated: {}", result.updated);
    println!("✓ Skipped: {}", result.skipped);
    if result.errors > 0 {
        println!("⚠️  Errors:  {}", result.errors);
        for d in &result.error_details {
            println!("   {}: {}", d.journal_external_id, d.error);
        }
    }
    Ok(())
}

fn run_import_ledger(config: &HubConfig, json_path: &Path) -> Result<()> {
    let summary = load_ledger_json(json_path)?.validate()?;
    let (record, action) = open_engine(config)?.submit_ledger(summary)?;

    println!(
        "✓ Ledger {} {:?} (internal id {})",
        record.ledger_external_id, action, record.id
    );
    Ok(())
}

use billbird::{
    config::{self, database},
    core::{snapshot, totals::format_totals_summary, updates::format_update_summary},
    errors::Result,
};
use chrono::Local;
use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Connect and make sure the tables exist
    let db = database::create_connection()
        .await
        .inspect(|_| info!("Database connection established."))
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    // 4. Load the persisted store, seeding an empty one from config.toml
    let mut store = snapshot::load_store(&db)
        .await
        .inspect_err(|e| error!("Failed to load stored datagroups: {}", e))?;
    if store.datagroups().is_empty() {
        match config::load_default_config() {
            Ok(seed) => {
                seed.seed(&mut store)?;
            }
            Err(e) => warn!("No seed datagroups loaded: {}", e),
        }
    }
    if let Some(saved) = snapshot::last_saved(&db).await? {
        info!("Last saved at {}", saved);
    }

    // 5. Apply pending updates once per day
    let today = Local::now().date_naive();
    let update_run = if snapshot::last_update_run(&db).await? == Some(today) {
        info!("Pending updates already applied today.");
        None
    } else {
        let run = store.apply_pending_updates(today);
        info!("{}", format_update_summary(&run));
        Some(run.update_date)
    };

    info!("{}", format_totals_summary(&store.totals()));

    // 6. Persist the session, marking the update run done in the same transaction
    match update_run {
        Some(run_date) => snapshot::save_store_with_update_run(&db, &store, run_date).await,
        None => snapshot::save_store(&db, &store).await,
    }
    .inspect_err(|e| error!("Failed to save datagroups: {}", e))?;

    Ok(())
}

use card_perks::{
    config::{catalog, database},
    core::{catalog::seed_catalog, clock::Clock, clock::SystemClock, summary},
    errors::Result,
};
use chrono::Datelike;
use dotenvy::dotenv;
use std::env;
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

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 4. Seed the catalog, if a catalog file is present
    match catalog::load_default_catalog() {
        Ok(catalog) => {
            seed_catalog(&db, &catalog)
                .await
                .inspect_err(|e| error!("Failed to seed catalog: {}", e))?;
        }
        Err(e) => warn!("Skipping catalog seeding: {}", e),
    }

    // 5. Optionally log one user's dashboard
    let Ok(user_id) = env::var("REPORT_USER_ID") else {
        info!("REPORT_USER_ID not set, nothing to report.");
        return Ok(());
    };

    let clock = SystemClock;
    let available = summary::load_available_benefits(&db, &clock, &user_id, false).await?;
    info!("{} benefits available for {}", available.len(), user_id);
    for status in &available {
        info!(
            "  {} on card {}: {} left in {}, resets {}",
            status.benefit.name,
            status.user_card.id,
            status.amount_remaining,
            status.period,
            status
                .resets_at
                .map_or_else(|| "never".to_string(), |d| d.to_string())
        );
    }

    let year = clock.today().year();
    let annual = summary::load_annual_summary(&db, &user_id, year).await?;
    info!(
        "{} summary for {}: redeemed {} of {} ({} outstanding), {}/{} periods, fees {}",
        year,
        user_id,
        annual.total_redeemed,
        annual.total_available,
        annual.outstanding,
        annual.redeemed_count,
        annual.total_count,
        annual.total_annual_fees
    );

    Ok(())
}

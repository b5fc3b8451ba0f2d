//! Load demo users and parking lots into the configured database.

use anyhow::Context;
use miparqueo::{seed, Config, Database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;
    let db = Database::open(&config.database)
        .await
        .with_context(|| format!("opening {} database", config.database.kind()))?;

    let report = seed::load_demo_data(&db)
        .await
        .context("inserting demo data")?;
    db.close().await;

    println!(
        "Inserted {} users and {} parking lots",
        report.users_inserted, report.parking_lots_inserted
    );
    for user in &seed::DEMO_USERS {
        println!("  {} / {} ({})", user.email, user.password, user.role);
    }
    Ok(())
}

use superstore_pipeline::config::PipelineConfig;
use superstore_pipeline::db::SalesDatabase;

fn main() -> anyhow::Result<()> {
    let config = PipelineConfig::load(None)?;

    println!(
        "⚠️  WARNING: This will delete ALL rows from table 'sales' in '{}'!",
        config.database_path().display()
    );
    println!("Press Enter to continue or Ctrl+C to cancel...");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    println!("🗑️  Clearing database...");
    let db = SalesDatabase::open(&config)?;
    db.provision(false)?;
    let removed = db.clear()?;

    println!("✅ Removed {removed} rows");
    Ok(())
}

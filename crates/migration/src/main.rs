use sea_orm::Database;
use sea_orm_migration::prelude::*;

const DEFAULT_DATABASE_URL: &str = "sqlite:./wallet.db?mode=rwc";

fn usage() -> ! {
    eprintln!("Usage: migration [up|down|fresh|status] [database-url]");
    eprintln!("       the url falls back to DATABASE_URL, then {DEFAULT_DATABASE_URL}");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut args = std::env::args().skip(1);
    let cmd = args.next().unwrap_or_else(|| "up".to_string());
    let db_url = match args.next() {
        Some(url) => url,
        None => std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
    };

    let db = Database::connect(&db_url).await?;

    match cmd.as_str() {
        "up" => {
            migration::Migrator::up(&db, None).await?;
            println!("ledger schema is up to date");
        }
        // Rolls back one step at a time: the ledger tables hold money.
        "down" => migration::Migrator::down(&db, Some(1)).await?,
        "fresh" => migration::Migrator::fresh(&db).await?,
        "status" => migration::Migrator::status(&db).await?,
        _ => usage(),
    }

    Ok(())
}

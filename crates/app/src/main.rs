use std::{
    error::Error,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use engine::{
    BulkTransferCmd, BulkTransferStatus, DepositCmd, Engine, Money, NotificationFilter,
    PageRequest, RecipientSpec, TransactionFilter, TransactionKind, TransactionStatus,
    TransferCmd, WithdrawCmd,
};
use migration::{Migrator, MigratorTrait};
use serde::{Deserialize, Serialize};
use settings::Database;

mod settings;

type AppResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// How long a connection waits for another writer before `database is locked`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "wallet")]
#[command(about = "Operate the wallet ledger: accounts, transfers and history")]
struct Cli {
    /// Settings file, the `.toml` extension may be omitted.
    #[arg(long, env = "WALLET_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(UserArgs),
    /// Print the balance of a user.
    Balance {
        #[arg(long)]
        user: i32,
    },
    Deposit(MovementArgs),
    Withdraw(MovementArgs),
    Transfer(TransferArgs),
    Bulk(BulkArgs),
    /// List the transactions of a user, newest first.
    History(HistoryArgs),
    Notifications(NotificationArgs),
}

#[derive(Args, Debug)]
struct UserArgs {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    Show {
        #[arg(long)]
        id: i32,
    },
}

#[derive(Args, Debug)]
struct MovementArgs {
    #[arg(long)]
    user: i32,
    #[arg(long, value_parser = parse_money)]
    amount: Money,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
struct TransferArgs {
    #[arg(long)]
    from: i32,
    #[arg(long)]
    to: i32,
    #[arg(long, value_parser = parse_money)]
    amount: Money,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page: u64,
    #[arg(long, default_value_t = engine::DEFAULT_PER_PAGE)]
    per_page: u64,
}

impl From<&PageArgs> for PageRequest {
    fn from(args: &PageArgs) -> Self {
        PageRequest::new(args.page, args.per_page)
    }
}

#[derive(Args, Debug)]
struct BulkArgs {
    #[command(subcommand)]
    command: BulkCommand,
}

#[derive(Subcommand, Debug)]
enum BulkCommand {
    /// Pay every `recipient_id,amount` row of a CSV file.
    Send {
        #[arg(long)]
        from: i32,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        description: Option<String>,
    },
    /// Compute the total of a CSV file without moving money.
    Quote {
        #[arg(long)]
        file: PathBuf,
    },
    History {
        #[arg(long)]
        user: i32,
        #[arg(long, value_parser = parse_bulk_status)]
        status: Option<BulkTransferStatus>,
        #[command(flatten)]
        page: PageArgs,
    },
    Show {
        #[arg(long)]
        user: i32,
        #[arg(long)]
        id: i32,
    },
}

#[derive(Args, Debug)]
struct HistoryArgs {
    #[arg(long)]
    user: i32,
    #[arg(long, value_parser = parse_kind)]
    kind: Option<TransactionKind>,
    #[arg(long, value_parser = parse_status)]
    status: Option<TransactionStatus>,
    /// Inclusive start, RFC 3339 or YYYY-MM-DD.
    #[arg(long, value_parser = parse_instant)]
    from: Option<DateTime<Utc>>,
    /// Exclusive end, RFC 3339 or YYYY-MM-DD.
    #[arg(long, value_parser = parse_instant)]
    to: Option<DateTime<Utc>>,
    #[command(flatten)]
    page: PageArgs,
}

#[derive(Args, Debug)]
struct NotificationArgs {
    #[command(subcommand)]
    command: NotificationCommand,
}

#[derive(Subcommand, Debug)]
enum NotificationCommand {
    List {
        #[arg(long)]
        user: i32,
        #[arg(long)]
        unread: bool,
        #[arg(long)]
        kind: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    Read {
        #[arg(long)]
        user: i32,
        #[arg(long)]
        id: i32,
    },
    ReadAll {
        #[arg(long)]
        user: i32,
    },
}

/// One row of a bulk transfer CSV file.
#[derive(Debug, Deserialize)]
struct BulkRow {
    recipient_id: i32,
    amount: String,
}

fn parse_money(raw: &str) -> Result<Money, String> {
    raw.parse::<Money>().map_err(|err| err.to_string())
}

fn parse_kind(raw: &str) -> Result<TransactionKind, String> {
    TransactionKind::try_from(raw).map_err(|err| err.to_string())
}

fn parse_status(raw: &str) -> Result<TransactionStatus, String> {
    TransactionStatus::try_from(raw).map_err(|err| err.to_string())
}

fn parse_bulk_status(raw: &str) -> Result<BulkTransferStatus, String> {
    BulkTransferStatus::try_from(raw).map_err(|err| err.to_string())
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| format!("invalid date: {raw}"))
}

fn read_recipients(path: &Path) -> AppResult<Vec<RecipientSpec>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut recipients = Vec::new();
    for row in reader.deserialize::<BulkRow>() {
        let row = row?;
        recipients.push(RecipientSpec::new(row.recipient_id, row.amount.parse()?));
    }
    Ok(recipients)
}

fn print<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "wallet={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;
    let engine = Engine::builder()
        .database(db)
        .currency_symbol(settings.app.currency_symbol.as_str())
        .reference_attempts(settings.ledger.reference_attempts)
        .bulk_policy(settings.ledger.bulk_sender_policy)
        .build()
        .await?;

    run(&engine, cli.command).await
}

async fn run(engine: &Engine, command: Command) -> AppResult<()> {
    match command {
        Command::User(args) => match args.command {
            UserCommand::Create { name, email } => print(&engine.create_user(&name, &email).await?),
            UserCommand::Show { id } => print(&engine.user(id).await?),
        },
        Command::Balance { user } => {
            let balance = engine.balance(user).await?;
            println!("{balance}");
            Ok(())
        }
        Command::Deposit(args) => {
            let mut cmd = DepositCmd::new(args.user, args.amount);
            if let Some(description) = args.description {
                cmd = cmd.description(description);
            }
            print(&engine.deposit(cmd).await?)
        }
        Command::Withdraw(args) => {
            let mut cmd = WithdrawCmd::new(args.user, args.amount);
            if let Some(description) = args.description {
                cmd = cmd.description(description);
            }
            print(&engine.withdraw(cmd).await?)
        }
        Command::Transfer(args) => {
            let mut cmd = TransferCmd::new(args.from, args.to, args.amount);
            if let Some(description) = args.description {
                cmd = cmd.description(description);
            }
            print(&engine.transfer(cmd).await?)
        }
        Command::Bulk(args) => run_bulk(engine, args.command).await,
        Command::History(args) => {
            let mut filter = TransactionFilter::default().between(args.from, args.to);
            if let Some(kind) = args.kind {
                filter = filter.kind(kind);
            }
            if let Some(status) = args.status {
                filter = filter.status(status);
            }
            print(
                &engine
                    .transaction_history(args.user, filter, (&args.page).into())
                    .await?,
            )
        }
        Command::Notifications(args) => match args.command {
            NotificationCommand::List {
                user,
                unread,
                kind,
                page,
            } => {
                let filter = NotificationFilter {
                    kind,
                    is_read: unread.then_some(false),
                };
                print(&engine.notifications(user, filter, (&page).into()).await?)
            }
            NotificationCommand::Read { user, id } => {
                print(&engine.mark_notification_read(user, id).await?)
            }
            NotificationCommand::ReadAll { user } => {
                let marked = engine.mark_all_notifications_read(user).await?;
                println!("{marked} notifications marked as read");
                Ok(())
            }
        },
    }
}

async fn run_bulk(engine: &Engine, command: BulkCommand) -> AppResult<()> {
    match command {
        BulkCommand::Send {
            from,
            file,
            description,
        } => {
            let mut cmd = BulkTransferCmd::new(from, read_recipients(&file)?);
            if let Some(description) = description {
                cmd = cmd.description(description);
            }
            let batch = engine.process_bulk_transfer(cmd).await?;
            print(&engine.bulk_transfer_details(from, batch.id).await?)
        }
        BulkCommand::Quote { file } => {
            print(&engine.quote_bulk_transfer(&read_recipients(&file)?)?)
        }
        BulkCommand::History { user, status, page } => print(
            &engine
                .bulk_transfer_history(user, status, (&page).into())
                .await?,
        ),
        BulkCommand::Show { user, id } => print(&engine.bulk_transfer_details(user, id).await?),
    }
}

async fn parse_database(config: &Database) -> AppResult<sea_orm::DatabaseConnection> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let mut options = sea_orm::ConnectOptions::new(url);
    options.map_sqlx_sqlite_opts(|opts| opts.busy_timeout(BUSY_TIMEOUT));
    let database = sea_orm::Database::connect(options).await?;
    Migrator::up(&database, None).await?;
    tracing::debug!("database ready");
    Ok(database)
}

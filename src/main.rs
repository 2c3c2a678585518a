use clap::{Parser, Subcommand, ValueEnum};
use dealerpay::application::engine::{PaymentEngine, Stores};
use dealerpay::application::reconciliation::{GatewayAck, ReconciliationResult};
use dealerpay::application::session_builder::PaymentRequest;
use dealerpay::config::{GatewayConfig, Payer};
use dealerpay::domain::ports::{SharedAlertSink, SharedClock};
use dealerpay::domain::response_code;
use dealerpay::domain::session::PaymentPurpose;
use dealerpay::infrastructure::alerts::TracingAlertSink;
use dealerpay::infrastructure::clock::SystemClock;
use dealerpay::infrastructure::in_memory::{
    InMemoryOrderStore, InMemoryProductStore, InMemorySessionStore,
};
use dealerpay::interfaces::csv::catalog_reader::CatalogReader;
use dealerpay::interfaces::query::parse_params;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Gateway configuration JSON file. Falls back to DEALERPAY_* variables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Orders and products CSV loaded before the command runs.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or reset a payment session and print the gateway redirect URL.
    Pay {
        #[arg(long)]
        order: u64,
        #[arg(long, value_enum)]
        purpose: PurposeArg,
        /// The payment is started by dealer staff rather than the customer.
        #[arg(long)]
        staff: bool,
        #[arg(long)]
        ip: String,
        #[arg(long)]
        bank: Option<String>,
        #[arg(long)]
        locale: Option<String>,
    },
    /// Process a gateway callback given as a query string.
    Callback { query: String },
    /// Confirm delivery of an order's vehicle.
    Deliver {
        #[arg(long)]
        order: u64,
    },
    /// Print the message for a gateway response code.
    DescribeCode { code: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum PurposeArg {
    Deposit,
    FinalBalance,
}

impl From<PurposeArg> for PaymentPurpose {
    fn from(arg: PurposeArg) -> Self {
        match arg {
            PurposeArg::Deposit => PaymentPurpose::Deposit,
            PurposeArg::FinalBalance => PaymentPurpose::FinalBalance,
        }
    }
}

#[derive(Serialize)]
struct CallbackOutput {
    result: ReconciliationResult,
    #[serde(flatten)]
    ack: GatewayAck,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::DescribeCode { code } = &cli.command {
        println!("{}", response_code::describe(code));
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => GatewayConfig::from_path(path)?,
        None => GatewayConfig::from_env()?,
    };
    let stores = open_stores(cli.db_path.as_ref())?;

    if let Some(catalog) = &cli.catalog {
        let file = File::open(catalog).into_diagnostic()?;
        let summary = CatalogReader::new(file)
            .load_into(stores.orders.as_ref(), stores.products.as_ref())
            .await?;
        tracing::info!(
            loaded = summary.loaded,
            skipped = summary.skipped,
            "catalog loaded"
        );
    }

    let alerts: SharedAlertSink = Arc::new(TracingAlertSink);
    let clock: SharedClock = Arc::new(SystemClock);
    let engine = PaymentEngine::new(config, stores, alerts, clock)?;

    match cli.command {
        Command::Pay {
            order,
            purpose,
            staff,
            ip,
            bank,
            locale,
        } => {
            let payer = if staff {
                Payer::DealerStaff
            } else {
                Payer::Customer
            };
            let mut request = PaymentRequest::new(order, purpose.into(), payer, ip);
            if let Some(bank) = bank {
                request = request.with_bank_code(bank);
            }
            if let Some(locale) = locale {
                request = request.with_locale(locale);
            }
            let redirect = engine.create_or_reset_session(request).await?;
            println!("{}", redirect.url);
        }
        Command::Callback { query } => {
            let result = engine.handle_callback(parse_params(&query)).await?;
            let output = CallbackOutput {
                result,
                ack: result.acknowledgement(),
            };
            println!("{}", serde_json::to_string(&output).into_diagnostic()?);
        }
        Command::Deliver { order } => {
            let report = engine.confirm_delivery(order).await?;
            println!("{}", serde_json::to_string(&report).into_diagnostic()?);
        }
        Command::DescribeCode { .. } => {}
    }

    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(db_path: Option<&PathBuf>) -> Result<Stores> {
    use dealerpay::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            let store = RocksDBStore::open(path)?;
            Ok(Stores {
                sessions: Arc::new(store.clone()),
                orders: Arc::new(store.clone()),
                products: Arc::new(store),
            })
        }
        None => Ok(in_memory_stores()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(db_path: Option<&PathBuf>) -> Result<Stores> {
    if db_path.is_some() {
        miette::bail!("--db-path requires a build with the storage-rocksdb feature");
    }
    Ok(in_memory_stores())
}

fn in_memory_stores() -> Stores {
    Stores {
        sessions: Arc::new(InMemorySessionStore::new()),
        orders: Arc::new(InMemoryOrderStore::new()),
        products: Arc::new(InMemoryProductStore::new()),
    }
}

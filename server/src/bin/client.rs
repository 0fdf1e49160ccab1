use std::io::Write;
use std::time::Duration;

use clap::Parser;
use querystream::client::QueryClient;
use querystream::format::Format;
use querystream::types::{AuthContext, QuerySpec};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "querystream-client")]
#[command(about = "Run one query against a querystream server and print its output", long_about = None)]
struct Args {
    /// The query to execute
    query: String,

    /// Server endpoint
    #[arg(long, default_value = "ws://127.0.0.1:9001/query")]
    url: String,

    #[arg(short, long, default_value = "default")]
    user: String,

    /// Password or HS256 token
    #[arg(short, long, default_value = "")]
    password: String,

    /// Quota class to charge the call to
    #[arg(long, default_value = "default")]
    quota: String,

    /// Output format (TabSeparated, TabSeparatedWithNames, CSV, CSVWithNames)
    #[arg(short, long, default_value = "TabSeparated")]
    format: String,

    /// Query id; generated when omitted
    #[arg(long)]
    query_id: Option<String>,

    /// Minimum milliseconds between streamed chunks
    #[arg(long, default_value = "0")]
    interactive_delay_ms: u64,

    /// Abort the query after this many milliseconds
    #[arg(long)]
    max_execution_time_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let format = match Format::parse(&args.format) {
        Ok(format) => format,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };
    let mut spec = QuerySpec::new(args.query);
    spec.format = format;
    spec.interactive_delay = Duration::from_millis(args.interactive_delay_ms);
    spec.max_execution_time = args.max_execution_time_ms.map(Duration::from_millis);
    if let Some(query_id) = args.query_id {
        spec.query_id = query_id;
    }
    let auth = AuthContext::new(args.user, args.password).with_quota(args.quota);

    let mut client = match QueryClient::connect(&args.url).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("failed to connect to {}: {e}", args.url);
            std::process::exit(1);
        }
    };

    let mut stdout = std::io::stdout();
    let outcome = client
        .execute_with(&auth, &spec, |chunk| {
            let _ = stdout.write_all(chunk.as_bytes());
            let _ = stdout.flush();
        })
        .await;

    match outcome.and_then(querystream::client::CallOutcome::into_result) {
        Ok(_) => {
            let _ = client.close().await;
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

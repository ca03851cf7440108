use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "service-cli")]
#[command(about = "Operator CLI for the resilient API service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// API prefix the service was configured with
    #[arg(long, default_value = "/api")]
    prefix: String,

    /// Correlation id to send with the request
    #[arg(long)]
    correlation_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service health
    Health {
        /// Include pool, breaker and system details
        #[arg(long)]
        detailed: bool,
    },
    /// List circuit breaker states
    Breakers,
    /// Check readiness (bus round trip)
    Readiness,
    /// Request an analytics report
    Analytics {
        #[arg(long)]
        tenant: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(id) = &cli.correlation_id {
        headers.insert("x-correlation-id", HeaderValue::from_str(id)?);
    }

    let url = match &cli.command {
        Commands::Health { detailed: false } => format!("{}/health", base),
        Commands::Health { detailed: true } => format!("{}/health/detailed", base),
        Commands::Breakers => format!("{}/health/circuit-breakers", base),
        Commands::Readiness => format!("{}/health/readiness", base),
        Commands::Analytics { tenant } => {
            if let Some(tenant) = tenant {
                headers.insert("x-tenant-id", HeaderValue::from_str(tenant)?);
            }
            format!("{}{}/products/analytics/report", base, cli.prefix.trim_end_matches('/'))
        }
    };

    let res = client.get(url).headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let correlation = res
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
    }
    if let Some(id) = correlation {
        eprintln!("Correlation ID: {}", id);
    }

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}

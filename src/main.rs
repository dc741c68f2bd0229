use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::error;
use tracing_subscriber::EnvFilter;

use finsim::api::{self, ApiError};
use finsim::core::MonteCarloRequest;

#[derive(Parser, Debug)]
#[command(
    name = "finsim",
    about = "Household financial projection and Monte Carlo simulator"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Run the HTTP API")]
    Serve {
        #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
        host: IpAddr,
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    #[command(about = "Deterministic projection of a scenario file")]
    Project {
        #[arg(long)]
        scenario: PathBuf,
        #[arg(long, help = "Pretty-print the JSON output")]
        pretty: bool,
    },
    #[command(about = "Monte Carlo simulation of a scenario file")]
    MonteCarlo {
        #[arg(long)]
        scenario: PathBuf,
        #[arg(long, default_value_t = 500, help = "Number of runs, clamped to 1..=1000")]
        runs: i64,
        #[arg(long, default_value_t = 0.15, help = "Annual stock volatility as a fraction")]
        stock_volatility: f64,
        #[arg(
            long,
            default_value_t = 0.05,
            help = "Annual real estate volatility as a fraction"
        )]
        real_estate_volatility: f64,
        #[arg(long, default_value_t = 0.0, help = "Annual inflation volatility as a fraction")]
        inflation_volatility: f64,
        #[arg(long, help = "Base seed; random when omitted")]
        seed: Option<u64>,
        #[arg(long, help = "Pretty-print the JSON output")]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Serve { host, port } => {
            let addr = SocketAddr::new(host, port);
            if let Err(e) = api::run_http_server(addr).await {
                error!("server error: {e}");
                process::exit(1);
            }
            Ok(())
        }
        Command::Project { scenario, pretty } => api::load_scenario(&scenario)
            .and_then(|scenario| api::simulate(&scenario))
            .and_then(|result| print_json(&result, pretty)),
        Command::MonteCarlo {
            scenario,
            runs,
            stock_volatility,
            real_estate_volatility,
            inflation_volatility,
            seed,
            pretty,
        } => api::load_scenario(&scenario)
            .map(|params| MonteCarloRequest {
                params,
                num_runs: runs,
                stock_volatility,
                real_estate_volatility,
                inflation_volatility,
                seed,
            })
            .and_then(|request| api::monte_carlo(&request))
            .and_then(|result| print_json(&result, pretty)),
    };

    if let Err(e) = outcome {
        error!("{e}");
        process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), ApiError> {
    let json = api::to_json(value, pretty)?;
    println!("{json}");
    Ok(())
}

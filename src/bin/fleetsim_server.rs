//! fleetsim gRPC server
//!
//! A standalone server binary exposing the single-vehicle bus contract.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal;
use tonic::transport::Server;

use fleetsim::transport::BusServiceImpl;
use fleetsim::{FleetConfig, FleetEngine};

/// Server configuration
struct Config {
    /// Address to bind to
    addr: SocketAddr,
    /// Optional fleet configuration file (JSON)
    fleet_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:50051".parse().unwrap(),
            fleet_path: None,
        }
    }
}

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    let port: u16 = args[i + 1].parse().unwrap_or_else(|_| {
                        eprintln!("error: invalid port number: {}", args[i + 1]);
                        std::process::exit(1);
                    });
                    config.addr.set_port(port);
                    i += 2;
                } else {
                    eprintln!("error: --port requires a value");
                    std::process::exit(1);
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config.fleet_path = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("error: --config requires a value");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                println!("fleetsim-server - simulated bus tracking backend");
                println!();
                println!("USAGE:");
                println!("    fleetsim-server [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -p, --port <PORT>         Port to listen on [default: 50051]");
                println!("    -c, --config <FILE>       Fleet config JSON [default: built-in single-bus route]");
                println!("    -h, --help                Print help information");
                std::process::exit(0);
            }
            arg => {
                eprintln!("error: unknown argument: {}", arg);
                std::process::exit(1);
            }
        }
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = parse_args();

    println!("fleetsim-server v{}", env!("CARGO_PKG_VERSION"));

    let fleet = match &config.fleet_path {
        Some(path) => {
            println!("Loading fleet config from: {}", path.display());
            FleetConfig::from_path(path)?
        }
        None => FleetConfig::demo_single(),
    };

    let bus_name = fleet.vehicles[0].name.clone();
    let engine = Arc::new(FleetEngine::new(fleet)?);
    let svc = BusServiceImpl::new(engine)?.into_server();

    println!("Serving '{bus_name}' on {}", config.addr);
    println!("Press Ctrl+C to stop");

    Server::builder()
        .add_service(svc)
        .serve_with_shutdown(config.addr, async {
            let _ = signal::ctrl_c().await;
        })
        .await?;

    println!("Shut down");
    Ok(())
}

use clap::Parser;
use std::env;

use retire::api::{Cli, run_cli, run_http_server};
use retire::logging::init_logging;

#[tokio::main]
async fn main() {
    let raw_args: Vec<String> = env::args().collect();
    if raw_args.get(1).map(|s| s.as_str()) == Some("serve") {
        init_logging("info");
        let port = raw_args
            .get(2)
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);
        if let Err(e) = run_http_server(port).await {
            tracing::error!(error = %e, "server error");
            std::process::exit(1);
        }
        return;
    }

    let cli = Cli::parse();
    init_logging(&cli.log_level);
    if let Err(e) = run_cli(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

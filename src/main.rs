use clap::Parser;
use coolify_mcp::app::App;
use std::path::PathBuf;

/// MCP server exposing a Coolify instance as tools over stdio.
#[derive(Debug, Parser)]
#[command(name = "coolify-mcp", version)]
struct Cli {
    /// Local JSON config (defaults to ./coolify.config.local.json when present)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Check connectivity to the Coolify API and exit
    #[arg(long)]
    check: bool,
}

async fn check(config: Option<&std::path::Path>) -> Result<(), String> {
    let app = App::initialize(config).map_err(|err| err.message().to_string())?;
    app.client
        .validate_connection()
        .await
        .map_err(|err| err.message().to_string())?;
    eprintln!("coolify-mcp: connected to {}", app.client.base_url());
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = if cli.check {
        check(config).await
    } else {
        coolify_mcp::mcp::server::run_stdio(config)
            .await
            .map_err(|err| err.to_string())
    };

    if let Err(err) = result {
        eprintln!("coolify-mcp: {}", err);
        std::process::exit(1);
    }
}

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "node-cli")]
#[command(about = "Management CLI for a cluster node server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(long, default_value = "cluster")]
    user: String,

    #[arg(short, long, env = "NODE_CLI_PASSWORD", default_value = "cluster")]
    password: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show node status
    Status,
    /// List peers and their heartbeat state
    Peers,
    /// List mounted handlers
    Handlers,
    /// List registered jobs and transformations
    Executions,
}

impl Commands {
    fn path(&self) -> &'static str {
        match self {
            Commands::Status => "/api/status",
            Commands::Peers => "/api/peers",
            Commands::Handlers => "/api/handlers",
            Commands::Executions => "/api/executions",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let url = format!("{}{}", cli.url.trim_end_matches('/'), cli.command.path());
    let res = client
        .get(url)
        .basic_auth(&cli.user, Some(&cli.password))
        .send()
        .await?;
    print_response(res).await?;

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: node returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the dynamic route gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "GATEWAY_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show table version and route counts
    Status,
    /// List all stored routes
    List,
    /// Show one route
    Get { id: String },
    /// Add a route from a JSON file
    Add { file: PathBuf },
    /// Insert or replace a route from a JSON file
    Update { file: PathBuf },
    /// Delete a route
    Delete { id: String },
    /// Replace every route with the JSON array in a file
    Replace { file: PathBuf },
    /// Recompile and republish the current routes
    Refresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = |method: Method, path: &str| -> RequestBuilder {
        client
            .request(method, format!("{}{}", cli.url, path))
            .headers(headers.clone())
    };

    let req = match cli.command {
        Commands::Status => request(Method::GET, "/admin/status"),
        Commands::List => request(Method::GET, "/admin/routes"),
        Commands::Get { id } => request(Method::GET, &format!("/admin/route/{}", id)),
        Commands::Add { file } => request(Method::POST, "/admin/route").json(&read_json(&file)?),
        Commands::Update { file } => request(Method::PUT, "/admin/route").json(&read_json(&file)?),
        Commands::Delete { id } => request(Method::DELETE, &format!("/admin/route/{}", id)),
        Commands::Replace { file } => request(Method::PUT, "/admin/routes").json(&read_json(&file)?),
        Commands::Refresh => request(Method::POST, "/admin/refresh"),
    };

    print_response(req.send().await?).await
}

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        eprintln!("Response: {}", text);
        std::process::exit(1);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}

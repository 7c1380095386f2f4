use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "social-admin")]
#[command(about = "Operator CLI for the social API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(long, default_value = "admin", env = "SOCIAL_ADMIN_USER")]
    username: String,

    #[arg(long, env = "SOCIAL_ADMIN_PASSWORD")]
    password: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API status and uptime
    Status,
    /// Show rate limiter windows and settings
    Limiter,
    /// Show identity cache backend and size
    Cache,
    /// Drop every identity cache entry
    FlushCache,
    /// Delete a user and evict it from the cache
    DeleteUser { id: i64 },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let request = match cli.command {
        Commands::Status => client.get(format!("{base}/v1/admin/status")),
        Commands::Limiter => client.get(format!("{base}/v1/admin/limiter")),
        Commands::Cache => client.get(format!("{base}/v1/admin/cache")),
        Commands::FlushCache => client.delete(format!("{base}/v1/admin/cache")),
        Commands::DeleteUser { id } => client.delete(format!("{base}/v1/admin/users/{id}")),
    };

    let res = request
        .basic_auth(&cli.username, Some(&cli.password))
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    if status == reqwest::StatusCode::NO_CONTENT {
        println!("{}", status);
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

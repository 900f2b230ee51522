use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Command-line client for the inference relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API key (only needed for `status`).
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message and print the generated reply
    Chat {
        /// Message to send
        message: String,
    },
    /// Show dispatcher queue and restart counters
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Chat { message } => {
            let res = client
                .post(format!("{}/api/chat/", cli.url))
                .json(&serde_json::json!({ "message": message }))
                .send()
                .await?;
            let status = res.status();
            let json: Value = res.json().await?;
            match (json.get("response"), json.get("error")) {
                (Some(Value::String(text)), _) => println!("{}", text),
                (_, Some(Value::String(error))) => eprintln!("Error ({}): {}", status, error),
                _ => println!("{}", serde_json::to_string_pretty(&json)?),
            }
        }
        Commands::Status => {
            let key = cli.key.ok_or("`status` needs the admin key (--key)")?;
            let mut headers = HeaderMap::new();
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key))?,
            );
            let res = client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

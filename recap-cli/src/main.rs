//! recap-cli — terminal client for the Recap summary API
//!
//! # Subcommands
//! - `list [--search S] [--start D] [--end D] [--json]` — list stored summaries
//! - `show <id> [--json]`                                — show one summary
//! - `create --title T --url U --summary S [--json]`     — store a summary
//! - `delete <id>`                                       — delete a summary
//! - `emails [--json]`                                   — fetch normalized email summaries
//! - `status`                                            — show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";
const PREVIEW_CHARS: usize = 160;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "recap-cli",
    version,
    about = "Recap summary dashboard — command-line client"
)]
struct Cli {
    /// Recap HTTP server URL (overrides RECAP_HTTP_URL env var)
    #[arg(long, env = "RECAP_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List stored summaries, newest first
    List {
        /// Case-insensitive text to match in title, summary or url
        #[arg(long)]
        search: Option<String>,

        /// Earliest creation date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        start: Option<String>,

        /// Latest creation date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        end: Option<String>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show a single summary
    Show {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Store a new summary
    Create {
        #[arg(long)]
        title: String,

        #[arg(long)]
        url: String,

        /// Summary text
        #[arg(long)]
        summary: String,

        #[arg(long)]
        json: bool,
    },

    /// Delete a summary by id
    Delete { id: String },

    /// Fetch email summaries from the upstream webhook via the server
    Emails {
        #[arg(long)]
        json: bool,
    },

    /// Show Recap server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

/// A stored summary as returned by the Recap HTTP API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub summary_text: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct SummaryListResponse {
    pub summaries: Vec<SummaryRecord>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryResponse {
    pub summary: SummaryRecord,
}

/// A normalized email summary from POST /api/summarize-emails
#[derive(Debug, Deserialize)]
pub struct EmailRecord {
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub summary: String,
    pub timestamp: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailListResponse {
    pub summaries: Vec<EmailRecord>,
}

// ============================================================================
// Text Output
// ============================================================================

/// Collapse whitespace and cut to `max` characters, appending "…" when cut.
pub fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let mut cut: String = flat.chars().take(max).collect();
        cut.push('…');
        cut
    }
}

/// Multi-line block for one stored summary.
pub fn format_summary(s: &SummaryRecord) -> String {
    format!(
        "{}  {}\n  {}\n  {}\n  id: {}",
        s.created_at,
        s.title,
        s.url,
        preview(&s.summary_text, PREVIEW_CHARS),
        s.id
    )
}

/// Multi-line block for one email summary.
pub fn format_email(e: &EmailRecord) -> String {
    let mut out = format!(
        "{}  {}\n  From: {}\n  {}",
        e.timestamp,
        e.subject,
        e.sender,
        preview(&e.summary, PREVIEW_CHARS)
    );
    if let Some(url) = &e.url {
        out.push_str(&format!("\n  {}", url));
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?)
}

/// Send a request and return the JSON body, turning non-success statuses
/// into errors carrying the server's `error` message.
fn send(req: reqwest::blocking::RequestBuilder) -> anyhow::Result<serde_json::Value> {
    let resp = req.send()?;
    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();

    if !status.is_success() {
        let message = body["error"].as_str().unwrap_or("no details");
        anyhow::bail!("server returned {}: {}", status, message);
    }
    Ok(body)
}

fn print_json(body: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(body)?);
    Ok(())
}

fn do_list(
    server: &str,
    search: Option<String>,
    start: Option<String>,
    end: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    let mut params = Vec::new();
    if let Some(s) = search {
        params.push(("search", s));
    }
    if let Some(s) = start {
        params.push(("startDate", s));
    }
    if let Some(e) = end {
        params.push(("endDate", e));
    }

    let body = send(client()?.get(format!("{}/api/summaries", server)).query(&params))?;
    if json_output {
        return print_json(&body);
    }

    let list: SummaryListResponse = serde_json::from_value(body)?;
    if list.summaries.is_empty() {
        eprintln!("No summaries found");
        return Ok(());
    }
    for s in &list.summaries {
        println!("{}\n", format_summary(s));
    }
    Ok(())
}

fn do_show(server: &str, id: &str, json_output: bool) -> anyhow::Result<()> {
    let body = send(client()?.get(format!("{}/api/summaries/{}", server, id)))?;
    if json_output {
        return print_json(&body);
    }
    let resp: SummaryResponse = serde_json::from_value(body)?;
    println!("{}", format_summary(&resp.summary));
    Ok(())
}

fn do_create(
    server: &str,
    title: String,
    url: String,
    summary: String,
    json_output: bool,
) -> anyhow::Result<()> {
    let payload = serde_json::json!({
        "title": title,
        "url": url,
        "summaryText": summary,
    });
    let body = send(client()?.post(format!("{}/api/summaries", server)).json(&payload))?;
    if json_output {
        return print_json(&body);
    }
    let resp: SummaryResponse = serde_json::from_value(body)?;
    println!("Created {}", resp.summary.id);
    Ok(())
}

fn do_delete(server: &str, id: &str) -> anyhow::Result<()> {
    send(client()?.delete(format!("{}/api/summaries/{}", server, id)))?;
    println!("Deleted {}", id);
    Ok(())
}

fn do_emails(server: &str, json_output: bool) -> anyhow::Result<()> {
    let body = send(client()?.post(format!("{}/api/summarize-emails", server)))?;
    if json_output {
        return print_json(&body);
    }
    let list: EmailListResponse = serde_json::from_value(body)?;
    if list.summaries.is_empty() {
        eprintln!("No email summaries available");
        return Ok(());
    }
    for e in &list.summaries {
        println!("{}\n", format_email(e));
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let resp = client()?
        .get(&url)
        .timeout(std::time::Duration::from_secs(10))
        .send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Recap server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:      {}", body["version"].as_str().unwrap_or("?"));
            println!("Store:        {}", body["store"].as_str().unwrap_or("?"));
            println!("Backend:      {}", body["backend"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            let status = r.status();
            eprintln!("recap-cli: server unhealthy (HTTP {})", status);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("recap-cli: cannot reach {} — {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::List {
            search,
            start,
            end,
            json,
        } => do_list(&server, search, start, end, json),
        Commands::Show { id, json } => do_show(&server, &id, json),
        Commands::Create {
            title,
            url,
            summary,
            json,
        } => do_create(&server, title, url, summary, json),
        Commands::Delete { id } => do_delete(&server, &id),
        Commands::Emails { json } => do_emails(&server, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("recap-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

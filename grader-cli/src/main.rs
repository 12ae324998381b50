//! grader-cli: command-line client for the grader HTTP API
//!
//! # Subcommands
//! - `status`                                                  server health
//! - `score --student <text> --ideal <text> [--keywords a,b] [--json]`
//!   score a text answer without going through the audio pipeline

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "grader-cli", version, about = "Spoken answer grader client")]
struct Cli {
    /// Grader HTTP server URL (overrides GRADER_HTTP_URL env var)
    #[arg(long, env = "GRADER_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Score a student answer against an ideal answer
    Score {
        /// Student answer text
        #[arg(long)]
        student: String,

        /// Reference answer text
        #[arg(long)]
        ideal: String,

        /// Required keywords, comma separated
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show grader server status
    Status,
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ScoreRequest {
    pub student_text: String,
    pub ideal_text: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct Breakdown {
    pub sem_sim: f64,
    pub key_score: f64,
    pub ngram_score: f64,
}

#[derive(Debug, Deserialize)]
pub struct ScoreResponse {
    pub score: f64,
    pub breakdown: Breakdown,
    pub embedding_backend: Option<String>,
    pub took_ms: Option<u64>,
}

pub fn build_score_request(student: &str, ideal: &str, keywords: &[String]) -> ScoreRequest {
    ScoreRequest {
        student_text: student.to_string(),
        ideal_text: ideal.to_string(),
        keywords: keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
    }
}

/// Human-readable rendering of a score response.
pub fn format_score(resp: &ScoreResponse) -> String {
    let b = &resp.breakdown;
    let mut out = format!(
        "Score:     {:.0}%\nSemantic:  {:.3}\nKeywords:  {:.3}\nN-gram:    {:.3}",
        resp.score * 100.0,
        b.sem_sim,
        b.key_score,
        b.ngram_score
    );
    if let Some(backend) = &resp.embedding_backend {
        out.push_str(&format!("\nBackend:   {}", backend));
    }
    if let Some(ms) = resp.took_ms {
        out.push_str(&format!("\nTook:      {} ms", ms));
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn do_score(server: &str, req: &ScoreRequest, json_output: bool) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()?;

    let url = format!("{}/score", server);
    let resp = match client.post(&url).json(req).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("grader-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("grader-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }

    let body: serde_json::Value = resp.json()?;
    if json_output {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let parsed: ScoreResponse = match serde_json::from_value(body) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("grader-cli: failed to parse score response: {}", e);
            std::process::exit(1);
        }
    };
    println!("{}", format_score(&parsed));
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let url = format!("{}/health", server);
    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Grader server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
            println!("Database:      {}", body["database"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("grader-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("grader-cli: cannot reach {}: {}", url, e);
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
        Commands::Score {
            student,
            ideal,
            keywords,
            json,
        } => do_score(&server, &build_score_request(&student, &ideal, &keywords), json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("grader-cli: {}", e);
        std::process::exit(1);
    }
}

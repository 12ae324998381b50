use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use grader_core::GradeConfig;
use grader_ingest::import::DEFAULT_DISCIPLINE_TITLE;
use grader_ingest::{
    import_answers, import_questions, load_json_file, PgImportStore, Sheet, SheetsClient,
};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "grader-import", author, version, about = "Import questions and answers into the grader database")]
struct Cli {
    #[arg(short, long, default_value = "grader.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import or update questions
    Questions(SourceArgs),
    /// Import historical answers as submissions
    Answers(SourceArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// JSON file with an array of row objects or a values grid
    #[arg(long, conflicts_with = "sheet")]
    file: Option<PathBuf>,

    /// Google Sheets spreadsheet id
    #[arg(long)]
    sheet: Option<String>,

    /// A1 range to read from the spreadsheet
    #[arg(long, default_value = "Sheet1")]
    range: String,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    /// Discipline title for rows that do not name one
    #[arg(long, env = "DEFAULT_DISCIPLINE_TITLE", default_value = DEFAULT_DISCIPLINE_TITLE)]
    default_discipline: String,

    #[arg(long, value_enum, default_value_t = Output::Text)]
    output: Output,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Output {
    Text,
    Json,
}

async fn load_sheet(args: &SourceArgs) -> anyhow::Result<Sheet> {
    if let Some(path) = &args.file {
        return Ok(load_json_file(path).await?);
    }
    let Some(sheet_id) = &args.sheet else {
        anyhow::bail!("either --file or --sheet is required");
    };
    let Some(api_key) = args.google_api_key.as_deref().filter(|k| !k.is_empty()) else {
        anyhow::bail!("GOOGLE_API_KEY not set");
    };
    let client = SheetsClient::new(api_key)?;
    Ok(client.fetch(sheet_id, &args.range).await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = match GradeConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", cli.config, e);
            std::process::exit(1);
        }
    };
    if config.database.url.trim().is_empty() {
        eprintln!("DATABASE_URL not set");
        std::process::exit(1);
    }

    let pool = match grader_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };
    grader_core::db::run_migrations(&pool).await?;
    let store = PgImportStore::new(pool);

    let (args, report) = match &cli.command {
        Command::Questions(args) => {
            let sheet = load_sheet(args).await?;
            let report = import_questions(&store, &sheet, &args.default_discipline).await?;
            (args, report)
        }
        Command::Answers(args) => {
            let sheet = load_sheet(args).await?;
            let report = import_answers(&store, &sheet, &args.default_discipline).await?;
            (args, report)
        }
    };

    match args.output {
        Output::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Output::Text => {
            println!(
                "created: {}, updated: {}, skipped: {}",
                report.created, report.updated, report.skipped
            );
            for line in &report.errors {
                println!("  {}", line);
            }
        }
    }

    Ok(())
}

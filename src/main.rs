use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc::UnboundedReceiver;

use picseek_lib::backend::HttpBackend;
use picseek_lib::cache::ResultSnapshot;
use picseek_lib::config::{self, ClientConfig};
use picseek_lib::error::GalleryError;
use picseek_lib::events::{EventSink, GalleryEvent, NotificationLevel};
use picseek_lib::gallery::{ClearOutcome, DeleteOutcome};
use picseek_lib::models::{GalleryImage, SourceFile};
use picseek_lib::pipeline::SearchOutcome;
use picseek_lib::{ConfirmRequest, ConfirmationGate, GalleryClient};

#[derive(Parser)]
#[command(name = "picseek", version)]
#[command(about = "Upload, browse and search a natural-language image gallery", long_about = None)]
struct Cli {
    /// Gallery server base URL (overrides PICSEEK_SERVER_URL)
    #[arg(short, long, global = true)]
    server: Option<String>,

    /// Print every client event as one JSON object per line
    #[arg(long, global = true)]
    json: bool,

    /// Print results as HTML cards instead of plain text
    #[arg(long, global = true)]
    html: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every image in the gallery
    List,
    /// Search by description; results are ranked
    Search {
        /// Free-text query, e.g. "receipt from the hardware store"
        query: Vec<String>,
    },
    /// Show one image with its full keyword set
    Show { id: String },
    /// Upload image files, one at a time
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Delete one image
    Delete {
        id: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Delete every image
    Clear {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

/// Asks on the terminal unless `--yes` was given.
struct TerminalGate {
    assume_yes: bool,
}

impl ConfirmationGate for TerminalGate {
    fn confirm(&self, request: &ConfirmRequest) -> bool {
        if self.assume_yes {
            return true;
        }
        eprint!("{} [y/N] ", request.message());
        let _ = std::io::stderr().flush();

        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    picseek_lib::init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// How results are written to stdout.
#[derive(Clone, Copy)]
struct Output {
    json: bool,
    html: bool,
}

async fn run(cli: Cli) -> Result<ExitCode, GalleryError> {
    let Cli {
        server,
        json,
        html,
        command,
    } = cli;
    let output = Output { json, html };

    let mut client_config = ClientConfig::from_env()?;
    if let Some(server) = &server {
        client_config.server_url = config::parse_server_url(server)?;
    }

    let assume_yes = match &command {
        Commands::Delete { yes, .. } | Commands::Clear { yes } => *yes,
        _ => false,
    };

    let (events, rx) = EventSink::channel();
    let printer = tokio::spawn(print_events(rx, json));
    let client = GalleryClient::connect(&client_config, TerminalGate { assume_yes }, events)?;

    let ok = match command {
        Commands::List => show_outcome(&client, client.load().await, output),
        Commands::Search { query } => {
            show_outcome(&client, client.search(&query.join(" ")).await, output)
        }
        Commands::Show { id } => {
            client.load().await;
            match client.image(&id) {
                Some(_) if html => match client.detail(&id) {
                    Some(card) => {
                        println!("{}", card.to_html());
                        true
                    }
                    None => false,
                },
                Some(img) => {
                    print_detail(&img, &client.image_url(&img.filename));
                    true
                }
                None => {
                    eprintln!("No image with id {id}");
                    false
                }
            }
        }
        Commands::Upload { paths } => {
            let mut files = Vec::with_capacity(paths.len());
            for path in &paths {
                match SourceFile::read(path) {
                    Ok(file) => files.push(file),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable file")
                    }
                }
            }
            match client.upload(files).await {
                Ok(outcome) => outcome.is_complete(),
                Err(GalleryError::NoValidFiles) => false,
                Err(e) => return Err(e),
            }
        }
        Commands::Delete { id, .. } => {
            client.load().await;
            matches!(client.delete_image(&id).await, DeleteOutcome::Deleted)
        }
        Commands::Clear { .. } => {
            client.load().await;
            matches!(client.clear_all().await, ClearOutcome::Cleared)
        }
    };

    // Closing the last sender lets the printer drain and exit.
    drop(client);
    let _ = printer.await;

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn show_outcome(client: &GalleryClient<HttpBackend>, outcome: SearchOutcome, output: Output) -> bool {
    match outcome {
        SearchOutcome::Applied(_) => {
            if output.html {
                println!("{}", client.view().to_html());
            } else if !output.json {
                print_snapshot(&client.current());
            }
            true
        }
        SearchOutcome::Superseded => true,
        SearchOutcome::Failed(_) => false,
    }
}

fn print_snapshot(snapshot: &ResultSnapshot) {
    println!("{}", snapshot.label());
    for img in &snapshot.images {
        let keywords = img.effective_keywords().join(", ");
        match img.relevance {
            Some(score) => println!(
                "{score:>8.1}  {}  {}  [{keywords}]",
                img.id,
                img.display_name()
            ),
            None => println!("{}  {}  [{}]", img.id, img.display_name(), keywords),
        }
    }
}

/// Plain-text detail view, straight from the record (no markup escaping).
fn print_detail(img: &GalleryImage, url: &str) {
    println!("{}  {}", img.id, img.display_name());
    println!("keywords: {}", img.effective_keywords().join(", "));
    if !img.colors.is_empty() {
        println!("colors:   {}", img.colors.join(", "));
    }
    if let Some(kind) = &img.image_type {
        println!("type:     {kind}");
    }
    if img.is_processing() {
        println!("status:   reading text…");
    }
    println!("{url}");
}

async fn print_events(mut rx: UnboundedReceiver<GalleryEvent>, json: bool) {
    while let Some(event) = rx.recv().await {
        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
            }
            continue;
        }
        match event {
            GalleryEvent::UploadProgress(p) => {
                eprintln!("[{}/{} {:>3}%] {}", p.current, p.total, p.percent, p.file_name);
            }
            GalleryEvent::Notification(n) => {
                let tag = match n.level {
                    NotificationLevel::Success => "ok",
                    NotificationLevel::Info => "info",
                    NotificationLevel::Error => "error",
                };
                eprintln!("{tag}: {}", n.message);
            }
            GalleryEvent::ResultsRendered(_) | GalleryEvent::ScrollToResults => {}
        }
    }
}

use clap::{Arg, ArgAction, Command};
use log::LevelFilter;
use sentimo::analysis::HttpAnalysisClient;
use sentimo::config::Config;
use sentimo::entry::{JournalEntry, SentimentTone};
use sentimo::orchestrator::{SubmissionOrchestrator, SubmissionOutcome};
use sentimo::resources::ResourceBundle;
use sentimo::risk::RiskClassifier;
use sentimo::session::Session;
use sentimo::store::{EntryStore, FileBlobStore};
use std::io::Read;
use std::process;
use std::sync::Arc;

const DEFAULT_CONFIG_PATH: &str = "sentimo.yaml";

#[tokio::main]
async fn main() {
    let matches = Command::new("sentimo")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Private journal with local risk screening and AI reflections")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("write")
                .short('w')
                .long("write")
                .value_name("TEXT")
                .help("Submit a journal entry ('-' reads it from stdin)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .value_name("TEXT")
                .help("Screen text locally without saving it")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("list")
                .short('l')
                .long("list")
                .help("List saved entries, newest first")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("show")
                .long("show")
                .value_name("ID")
                .help("Show one saved entry in full")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .help("Summarise saved entries")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("clear")
                .long("clear")
                .help("Delete every saved entry (requires --yes)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("yes")
                .long("yes")
                .help("Confirm a destructive operation")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);
    let config_found = std::path::Path::new(config_path).exists();
    let config = if config_found {
        match Config::from_file(config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading configuration: {e}");
                process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        config.log_level()
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if !config_found {
        log::warn!("Configuration file '{config_path}' not found, using default configuration");
    }

    if let Some(text) = matches.get_one::<String>("check") {
        check_text(text);
        return;
    }

    let client = match HttpAnalysisClient::new(&config.analysis) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error creating analysis client: {e}");
            process::exit(1);
        }
    };
    let store = EntryStore::open(Box::new(FileBlobStore::new(&config.storage.path)));
    let store = Arc::new(tokio::sync::Mutex::new(store));
    let mut session = Session::new(SubmissionOrchestrator::new(Arc::new(client), store));
    for warning in session.load_warnings().await {
        println!("⚠️  {warning}");
    }

    if matches.get_flag("clear") {
        match session.clear_all(matches.get_flag("yes")).await {
            Ok(()) => println!("🗑️  All journal entries deleted"),
            Err(e) => {
                eprintln!("❌ {e}. Re-run with --clear --yes to delete every entry.");
                process::exit(1);
            }
        }
        return;
    }

    if matches.get_flag("stats") {
        show_stats(&session).await;
        return;
    }

    if matches.get_flag("list") {
        list_entries(&session.entries().await);
        return;
    }

    if let Some(id) = matches.get_one::<String>("show") {
        match session.select_entry(id).await {
            Ok(entry) => {
                print_entry(&entry);
                if let Some(bundle) = session.resources_for(&entry) {
                    print_resources(&bundle);
                }
            }
            Err(e) => {
                eprintln!("❌ {e}");
                process::exit(1);
            }
        }
        return;
    }

    if let Some(text) = matches.get_one::<String>("write") {
        let text = if text == "-" {
            read_stdin()
        } else {
            text.clone()
        };
        session.set_draft(text);
        if let Some(category) = session.advisory() {
            log::debug!("Draft matched {category}");
        }
        match session.submit().await {
            Ok(outcome) => print_outcome(outcome),
            Err(e) => {
                eprintln!("❌ {e}");
                process::exit(1);
            }
        }
        return;
    }

    list_entries(&session.entries().await);
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}

fn read_stdin() -> String {
    let mut text = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut text) {
        eprintln!("❌ Error reading entry from stdin: {e}");
        process::exit(1);
    }
    text
}

fn check_text(text: &str) {
    let categories = RiskClassifier::new().categories(text);
    if categories.is_empty() {
        println!("✅ No concerning language found");
    } else {
        println!("⚠️  Concerning language found:");
        for category in categories {
            println!("  • {category}");
        }
    }
}

fn truncate_string(s: &str, max_chars: usize) -> String {
    let single_line = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let kept: String = single_line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn sentiment_label(entry: &JournalEntry) -> String {
    let marker = match entry.tone() {
        SentimentTone::Positive => "🟢",
        SentimentTone::Negative => "🔴",
        SentimentTone::Neutral => "🔵",
    };
    format!("{marker} {}", entry.sentiment.as_deref().unwrap_or("unrated"))
}

fn list_entries(entries: &[JournalEntry]) {
    println!("📔 Previous Entries");
    println!("═══════════════════════════════════════");
    if entries.is_empty() {
        println!("No previous entries yet");
        return;
    }
    for entry in entries {
        let flag = if entry.is_concerning { " ⚠️" } else { "" };
        println!(
            "{}  {}  {}{}",
            entry.id,
            entry.created_at,
            sentiment_label(entry),
            flag
        );
        println!("    {}", truncate_string(&entry.content, 72));
    }
}

fn print_entry(entry: &JournalEntry) {
    println!("📔 Journal Entry {}", entry.id);
    println!("═══════════════════════════════════════");
    println!("{}  {}", entry.created_at, sentiment_label(entry));
    if entry.is_concerning {
        println!("⚠️  Contains concerning content");
    }
    println!();
    println!("Your entry:");
    println!("{}", entry.content);
    println!();
    println!("Response:");
    println!("{}", entry.ai_response);
    println!();
    println!("Suggested actions:");
    for action in entry.displayed_suggestions() {
        println!("  • [{}] {}: {}", action.icon_key, action.title, action.description);
    }
}

fn print_resources(bundle: &ResourceBundle) {
    println!();
    println!("💚 {}", bundle.message);
    for hotline in &bundle.hotlines {
        if hotline.website.is_empty() {
            println!("  • {}: {}", hotline.name, hotline.phone);
        } else {
            println!("  • {}: {} ({})", hotline.name, hotline.phone, hotline.website);
        }
    }
    if !bundle.advice.is_empty() {
        println!("{}", bundle.advice);
    }
}

fn print_outcome(outcome: &SubmissionOutcome) {
    if let Some(reason) = &outcome.remote_failure {
        println!("⚠️  Could not reach the analysis service ({reason})");
        println!();
    }
    print_entry(&outcome.entry);
    if let Some(bundle) = &outcome.resources {
        print_resources(bundle);
    }
    for warning in &outcome.warnings {
        println!();
        println!("⚠️  {warning}");
    }
}

async fn show_stats(session: &Session) {
    let summary = session.summary().await;

    println!("📊 Journal Statistics");
    println!("═══════════════════════════════════════");
    println!("  Total entries: {}", summary.total);
    if summary.total == 0 {
        return;
    }
    let pct = summary.concerning as f64 / summary.total as f64 * 100.0;
    println!("  Concerning entries: {} ({pct:.1}%)", summary.concerning);
    println!();
    println!("  By sentiment:");
    for (label, count) in &summary.by_sentiment {
        println!("  ├─ {label}: {count}");
    }
}

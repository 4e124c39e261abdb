use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use vocab_categorizer::memory::read_jsonl;
use vocab_categorizer::{
    CategorizationResult, CategorizerConfig, CentralizedMatch, ConfiguredBackend,
    ConfiguredFallback, ReviewDecision, StoredVocabularyItem, VocabularyCategorizer,
    VocabularyItem, analytics, categorize_in_chunks, categorize_stored, pending_review,
    record_decision,
};

type Categorizer = VocabularyCategorizer<ConfiguredBackend, ConfiguredFallback>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let config = CategorizerConfig::load().context("Failed to load configuration")?;
    let command = args[1].as_str();
    let rest = &args[2..];

    let backend =
        ConfiguredBackend::from_config(&config.backend).context("Failed to open backend")?;

    match command {
        "categorize" => {
            let [input, output @ ..] = rest else {
                eprintln!("Usage: categorize-vocab categorize <input.jsonl> [output.jsonl]");
                return Err(anyhow!("Missing arguments for 'categorize' command"));
            };
            let output = output.first().map(PathBuf::from);
            let categorizer = build_categorizer(backend, &config)?;
            categorize_file(&categorizer, &config, Path::new(input), output.as_deref()).await?;
        }
        "categorize-stored" => {
            let [teacher_id, flags @ ..] = rest else {
                eprintln!("Usage: categorize-vocab categorize-stored <teacher_id> [--all]");
                return Err(anyhow!("Missing arguments for 'categorize-stored' command"));
            };
            let only_uncategorized = !flags.iter().any(|flag| flag == "--all");
            let categorizer = build_categorizer(backend, &config)?;
            let cancel = cancel_on_ctrl_c();
            let summary = categorize_stored(
                &categorizer,
                categorizer.reference(),
                teacher_id,
                only_uncategorized,
                &config.chunking.policy(),
                &cancel,
            )
            .await?;
            categorizer.reference().flush(&config.backend)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        "pending" => {
            let [teacher_id] = rest else {
                eprintln!("Usage: categorize-vocab pending <teacher_id>");
                return Err(anyhow!("Missing arguments for 'pending' command"));
            };
            let pending = pending_review(&backend, teacher_id).await?;
            print_pending(&pending);
        }
        "analytics" => {
            let [teacher_id] = rest else {
                eprintln!("Usage: categorize-vocab analytics <teacher_id>");
                return Err(anyhow!("Missing arguments for 'analytics' command"));
            };
            let analytics = analytics(&backend, teacher_id).await?;
            println!("{}", serde_json::to_string_pretty(&analytics)?);
        }
        "review" => {
            let (item_id, decision) = parse_review_args(rest)?;
            record_decision(&backend, item_id, decision).await?;
            backend.flush(&config.backend)?;
            println!("Recorded {decision:?} for item {item_id}");
        }
        "import-reference" | "import-items" => {
            let [path] = rest else {
                eprintln!("Usage: categorize-vocab {command} <rows.jsonl>");
                return Err(anyhow!("Missing arguments for '{command}' command"));
            };
            let ConfiguredBackend::Sqlite(db) = &backend else {
                bail!("'{command}' needs the sqlite backend (set CATEGORIZER_SQLITE_PATH)");
            };
            let path = Path::new(path);
            if command == "import-reference" {
                let rows: Vec<CentralizedMatch> = read_jsonl(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                db.insert_reference_rows(&rows)?;
                println!("Imported {} reference rows", rows.len());
            } else {
                let items: Vec<StoredVocabularyItem> = read_jsonl(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                db.insert_items(&items)?;
                println!("Imported {} items", items.len());
            }
        }
        _ => {
            eprintln!("Error: Unknown command '{command}'");
            print_usage();
            return Err(anyhow!("Unknown command"));
        }
    }

    Ok(())
}

fn print_usage() {
    eprintln!("Usage: categorize-vocab <command> [args...]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  categorize <input.jsonl> [output.jsonl]   Categorize a vocabulary list");
    eprintln!("  categorize-stored <teacher_id> [--all]    Categorize a teacher's stored items");
    eprintln!("  pending <teacher_id>                      List items awaiting review");
    eprintln!("  analytics <teacher_id>                    Show categorization statistics");
    eprintln!("  review <item_id> approve|reject           Record a review decision");
    eprintln!("  review <item_id> override <category> <subcategory>");
    eprintln!("  import-reference <rows.jsonl>             Load reference rows (sqlite)");
    eprintln!("  import-items <items.jsonl>                Load teacher items (sqlite)");
    eprintln!();
    eprintln!("Configuration comes from CATEGORIZER_CONFIG (a JSON file) and the");
    eprintln!("CATEGORIZER_* / SUPABASE_* environment variables.");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  categorize-vocab categorize year9.jsonl results.jsonl");
    eprintln!("  categorize-vocab review 42 override \"Descriptions\" \"Colors\"");
}

fn build_categorizer(
    backend: ConfiguredBackend,
    config: &CategorizerConfig,
) -> anyhow::Result<Categorizer> {
    let fallback = ConfiguredFallback::from_config(&config.fallback, config.language)
        .context("Failed to set up fallback categorizer")?;
    Ok(VocabularyCategorizer::from_config(backend, fallback, config))
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; finishing with defaults for the remaining items");
            trigger.cancel();
        }
    });
    cancel
}

async fn categorize_file(
    categorizer: &Categorizer,
    config: &CategorizerConfig,
    input: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let items: Vec<VocabularyItem> =
        read_jsonl(input).with_context(|| format!("Failed to read {}", input.display()))?;
    log::info!("Loaded {} items from {}", items.len(), input.display());

    let pb = ProgressBar::new(items.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} items ({per_sec}, {eta})")?
            .progress_chars("#>-"),
    );

    let cancel = cancel_on_ctrl_c();
    let results = categorize_in_chunks(
        categorizer,
        &items,
        &config.chunking.policy(),
        &cancel,
        |done, _| pb.set_position(done as u64),
    )
    .await;
    pb.finish_and_clear();

    let flagged = results.iter().filter(|result| result.needs_review()).count();
    write_results(&results, output)?;
    eprintln!(
        "Categorized {} items, {flagged} need review",
        results.len()
    );
    Ok(())
}

fn write_results(results: &[CategorizationResult], output: Option<&Path>) -> anyhow::Result<()> {
    let mut writer: Box<dyn std::io::Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    for result in results {
        serde_json::to_writer(&mut writer, result)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

fn print_pending(pending: &[StoredVocabularyItem]) {
    if pending.is_empty() {
        println!("Nothing to review");
        return;
    }
    for item in pending {
        let labels = item
            .effective_labels()
            .map(|labels| format!("{} / {}", labels.category, labels.subcategory))
            .unwrap_or_else(|| "-".to_string());
        let confidence = item
            .category_confidence
            .map(|confidence| format!("{confidence:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let flag = if item.needs_review() { "!" } else { " " };
        println!(
            "{flag} {:<10} {:<24} {:<20} {confidence:>5}  {labels}",
            item.id, item.term, item.translation
        );
    }
}

fn parse_review_args(args: &[String]) -> anyhow::Result<(&str, ReviewDecision)> {
    let decision = match args {
        [_, action] if action == "approve" => ReviewDecision::Approve,
        [_, action] if action == "reject" => ReviewDecision::Reject,
        [_, action, category, subcategory] if action == "override" => ReviewDecision::Override {
            category: category.parse()?,
            subcategory: subcategory.parse()?,
        },
        _ => {
            eprintln!("Usage: categorize-vocab review <item_id> approve|reject");
            eprintln!("       categorize-vocab review <item_id> override <category> <subcategory>");
            bail!("Invalid arguments for 'review' command");
        }
    };
    Ok((args[0].as_str(), decision))
}

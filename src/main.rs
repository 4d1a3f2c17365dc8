use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use newsrec::config::AppConfig;
use newsrec::embeddings::EmbeddingClient;
use newsrec::ner::EntityAggregator;
use newsrec::oracle::ProviderManager;
use newsrec::recommend::RecommendPipeline;
use newsrec::store::DocumentStore;
use newsrec::store::PgStore;
use newsrec::Result;
use tracing::info;

#[derive(Parser)]
#[command(name = "newsrec")]
#[command(about = "newsrec CLI for the news recommendation pipeline")]
#[command(version)]
struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute embeddings for articles that lack one
    Backfill,
    /// Aggregate named entities for every user
    Ner,
    /// Regenerate preference summaries for every user
    Analyze,
    /// Generate and persist recommendations
    Recommend {
        /// Restrict to a single user by email
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Run every stage: backfill, NER, summaries, ranking
    Pipeline,
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        newsrec::logging::init_logging_with_level("debug")?;
    } else {
        newsrec::logging::init_logging()?;
    }

    // Load configuration
    let config = AppConfig::load()?;
    info!("Configuration loaded successfully");

    if let Commands::Config = cli.command {
        return handle_config_command(&config);
    }

    // Connect to the store and initialize the schema
    let store = Arc::new(PgStore::from_config(&config).await?);
    store.init_schema(config.embedding_dimension()).await?;
    info!("Database schema initialized");

    let embedder = Arc::new(EmbeddingClient::from_config(&config)?);
    let providers = Arc::new(ProviderManager::from_config(&config)?);

    match cli.command {
        Commands::Backfill => {
            println!("🧠 Backfilling article embeddings...");
            let stats =
                newsrec::embeddings::backfill_article_embeddings(store.clone(), embedder).await?;
            println!(
                "✅ Backfill complete: {} updated, {} failed of {} missing ({:.1}% success)",
                stats.updated,
                stats.failed,
                stats.total,
                stats.success_rate()
            );
        }
        Commands::Ner => {
            println!("🔍 Aggregating named entities for all users...");
            let aggregator = EntityAggregator::new(store.clone(), providers);
            let run = aggregator.run_for_all_users().await?;
            println!(
                "✅ NER complete: {} users, {} updated, {} failed",
                run.users, run.updated, run.failed
            );
        }
        Commands::Analyze => {
            println!("📝 Regenerating preference summaries...");
            let summarizer =
                newsrec::analysis::PreferenceSummarizer::new(store.clone(), providers);
            let run = summarizer.run_for_all_users().await?;
            println!(
                "✅ Analysis complete: {} users, {} updated, {} skipped",
                run.users, run.updated, run.skipped
            );
        }
        Commands::Recommend { user } => {
            let pipeline = RecommendPipeline::from_services(
                store.clone(),
                embedder,
                providers,
                config.top_n(),
                config.top_m(),
            );

            if let Some(email) = user {
                println!("🎯 Generating recommendations for {email}...");
                match pipeline.run_for_user(&email).await? {
                    Some(articles) => {
                        println!("✅ Persisted {} recommendations:", articles.len());
                        for (idx, article) in articles.iter().enumerate() {
                            println!(
                                "  {}. {} (id: {}, similarity: {:.4})",
                                idx + 1,
                                article.title,
                                article.article_id,
                                article.similarity
                            );
                        }
                    }
                    None => {
                        println!("⚠️  No recommendations generated (missing summary or no embedded articles)");
                    }
                }
            } else {
                println!("🎯 Generating recommendations for all users...");
                let users = store.list_users().await?;
                let mut persisted = 0;
                for user in &users {
                    if pipeline.run_for_user(&user.email).await?.is_some() {
                        persisted += 1;
                    }
                }
                println!("✅ Recommendations persisted for {persisted}/{} users", users.len());
            }
        }
        Commands::Pipeline => {
            println!("🚀 Running the full recommendation pipeline...");
            let pipeline = RecommendPipeline::from_services(
                store,
                embedder,
                providers,
                config.top_n(),
                config.top_m(),
            );
            let report = pipeline.run().await?;

            println!();
            println!("📊 Pipeline report:");
            println!(
                "  Backfill:  {} updated, {} failed of {} missing",
                report.backfill.updated, report.backfill.failed, report.backfill.total
            );
            println!(
                "  NER:       {} users, {} updated, {} failed",
                report.ner.users, report.ner.updated, report.ner.failed
            );
            println!(
                "  Summaries: {} users, {} updated, {} skipped",
                report.summaries.users, report.summaries.updated, report.summaries.skipped
            );
            println!(
                "  Ranking:   {} processed, {} skipped, {} failed",
                report.ranking.processed, report.ranking.skipped, report.ranking.failed
            );
        }
        Commands::Config => unreachable!("handled above"),
    }

    Ok(())
}

fn handle_config_command(config: &AppConfig) -> Result<()> {
    println!("📋 newsrec configuration:");
    println!();

    println!("🗄️  Database:");
    println!("  URL: {}", mask_database_url(config.database_url()));
    println!("  Max connections: {}", config.max_connections());
    println!("  Min connections: {}", config.min_connections());
    println!("  Connection timeout: {}s", config.connection_timeout());
    println!();

    println!("📝 Logging:");
    println!("  Level: {}", config.logging.level);
    println!("  Backtrace: {}", config.logging.backtrace);
    println!();

    println!("🧠 Embeddings:");
    println!("  Provider: {}", config.embeddings.provider);
    println!("  Dimension: {}", config.embedding_dimension());
    println!("  Model: {}", config.embedding_model());
    println!("  Endpoint: {}", config.embedding_endpoint());
    println!();

    println!("🤖 Oracle providers:");
    println!(
        "  Primary: {} ({}, model {})",
        config.primary_provider().name,
        config.primary_provider().endpoint,
        config.primary_provider().model
    );
    println!(
        "  Secondary: {} ({}, model {})",
        config.secondary_provider().name,
        config.secondary_provider().endpoint,
        config.secondary_provider().model
    );
    println!("  Timeout: {}s", config.oracle_timeout_secs());
    println!();

    println!("🎯 Recommendation:");
    println!("  Candidate shortlist (top_n): {}", config.top_n());
    println!("  Final list size (top_m): {}", config.top_m());

    Ok(())
}

/// Mask database URL for logging (hide password)
fn mask_database_url(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        if let Some(host) = parsed.host_str() {
            format!(
                "{}://{}@{}:{}",
                parsed.scheme(),
                parsed.username(),
                host,
                parsed.port().unwrap_or(5432)
            )
        } else {
            "***masked***".to_string()
        }
    } else {
        "***invalid***".to_string()
    }
}

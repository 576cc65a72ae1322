use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use newsprism::analysis::inference::InferenceClient;
use newsprism::analysis::traits::{SummaryLanguage, SummaryModel, SummaryOptions};
use newsprism::config::Config;
use newsprism::news::client::{Category, NewsClient};
use newsprism::pipeline::digest::{self, AnalysisServices, DigestOptions, SentimentFilter};
use newsprism::topics::grouping::{TopicGrouping, TopicPipeline};
use newsprism::topics::{download, embeddings};

/// newsprism: live news headlines grouped into topics.
///
/// Fetches top headlines, embeds each article, clusters them with k-means
/// and lays them out on a 2-D topic map. The digest command adds
/// summaries, sentiment and named entities per article.
#[derive(Parser)]
#[command(name = "newsprism", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Group current headlines into topic clusters
    Cluster {
        #[command(flatten)]
        feed: FeedArgs,

        /// Write the topic map (title, url, cluster, x, y) as JSON
        #[arg(long)]
        map: Option<PathBuf>,
    },

    /// Summarize, classify and extract entities for clustered headlines
    Digest {
        #[command(flatten)]
        feed: FeedArgs,

        /// Keep only articles whose title or summary contains this text
        #[arg(long)]
        search: Option<String>,

        /// Keep only articles with this sentiment
        #[arg(long, value_enum, default_value = "all")]
        sentiment: SentimentFilter,

        /// Summarization model
        #[arg(long, value_enum, default_value = "bart-large-cnn")]
        model: SummaryModel,

        /// Summary language (multilingual model only)
        #[arg(long, value_enum, default_value = "english")]
        language: SummaryLanguage,

        /// Maximum summary length in tokens
        #[arg(long, default_value = "130")]
        max_length: usize,

        /// Minimum summary length in tokens
        #[arg(long, default_value = "30")]
        min_length: usize,

        /// Skip sentiment classification
        #[arg(long)]
        no_sentiment: bool,

        /// Skip named-entity extraction and the trending list
        #[arg(long)]
        no_entities: bool,

        /// Number of articles analyzed in parallel (default: 4)
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },

    /// Download the sentence embedding model (~90 MB)
    DownloadModel,

    /// Show configuration and model status
    Status,
}

#[derive(clap::Args)]
struct FeedArgs {
    /// Two-letter country code (default: NEWSPRISM_COUNTRY or "us")
    #[arg(long)]
    country: Option<String>,

    /// News category (default: NEWSPRISM_CATEGORY or technology)
    #[arg(long, value_enum)]
    category: Option<Category>,

    /// Number of topic clusters
    #[arg(long, default_value = "5")]
    clusters: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("newsprism=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Cluster { feed, map } => {
            let config = Config::load()?;
            config.require_news()?;
            config.require_embedder()?;

            let grouping = fetch_and_group(&config, &feed).await?;
            newsprism::output::terminal::display_topic_groups(&grouping);

            if let Some(path) = map {
                newsprism::output::map::write_topic_map(&grouping.table, &path)?;
                println!("Topic map written to {}", path.display());
            }
        }

        Commands::Digest {
            feed,
            search,
            sentiment,
            model,
            language,
            max_length,
            min_length,
            no_sentiment,
            no_entities,
            concurrency,
        } => {
            let config = Config::load()?;
            config.require_news()?;
            config.require_embedder()?;
            config.require_inference()?;

            if no_sentiment && sentiment != SentimentFilter::All {
                anyhow::bail!("--sentiment filtering needs sentiment classification; drop --no-sentiment");
            }

            let grouping = fetch_and_group(&config, &feed).await?;

            let client = InferenceClient::new(
                &config.inference_api_url,
                &config.inference_token,
                &config.sentiment_model,
                &config.ner_model,
                config.inference_qps,
            )?;
            let services = AnalysisServices {
                summarizer: &client,
                sentiment: &client,
                entities: &client,
            };
            let options = DigestOptions {
                summary: SummaryOptions {
                    model,
                    language,
                    max_length,
                    min_length,
                },
                search,
                sentiment_filter: sentiment,
                classify_sentiment: !no_sentiment,
                extract_entities: !no_entities,
                concurrency,
                progress: true,
            };

            println!(
                "Analyzing {} articles with {}...",
                grouping.grouped.len(),
                model.model_id()
            );
            let result = digest::run(&grouping.grouped, services, &options).await;

            newsprism::output::terminal::display_digest(&result, !no_sentiment, !no_entities);
            if !no_entities {
                newsprism::output::terminal::display_trending(&result.trending);
            }
        }

        Commands::DownloadModel => {
            let config = Config::load()?;
            let model_dir = download::embedding_model_dir(&config.model_dir);

            println!("Downloading sentence embedding model...");
            println!("  Destination: {}", model_dir.display());

            download::download_model(&config.model_dir).await?;

            println!("\n{}", "Model downloaded successfully.".bold());
            println!("You can now run `newsprism cluster` or `newsprism digest`.");
        }

        Commands::Status => {
            let config = Config::load()?;
            newsprism::status::show(&config);
        }
    }

    Ok(())
}

/// Fetch headlines and group them by topic, bounded by the configured
/// pipeline timeout.
async fn fetch_and_group(config: &Config, feed: &FeedArgs) -> Result<TopicGrouping> {
    let country = feed.country.as_deref().unwrap_or(&config.country);
    let category = feed.category.unwrap_or(config.category);

    let work = async {
        let client = NewsClient::new(&config.news_api_url, &config.news_api_key)?;
        println!(
            "Fetching top {} headlines for {}...",
            category,
            country.to_uppercase()
        );
        let articles = client.top_headlines(country, Some(category)).await?;
        info!(count = articles.len(), "Fetched articles");

        if articles.is_empty() {
            println!("{}", "No articles returned for this country and category.".yellow());
            return Ok(TopicGrouping::default());
        }

        let embedder =
            embeddings::shared_embedder(&download::embedding_model_dir(&config.model_dir))?;
        println!(
            "Grouping {} articles into {} topics...",
            articles.len(),
            feed.clusters
        );
        let grouping = TopicPipeline::new(feed.clusters)
            .run(&*embedder, &articles)
            .await?;
        Ok::<_, anyhow::Error>(grouping)
    };

    tokio::time::timeout(config.pipeline_timeout, work)
        .await
        .with_context(|| {
            format!(
                "Timed out after {}s fetching and grouping headlines",
                config.pipeline_timeout.as_secs()
            )
        })?
}

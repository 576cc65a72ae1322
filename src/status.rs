// System status display: configured keys, defaults and model presence.

use colored::Colorize;

use crate::config::Config;
use crate::topics::download;

/// Display system status to the terminal.
pub fn show(config: &Config) {
    println!("{}", "=== newsprism status ===".bold());

    println!(
        "NewsAPI key: {}  ({})",
        presence(!config.news_api_key.is_empty()),
        config.news_api_url
    );
    println!(
        "Inference token: {}  ({})",
        presence(!config.inference_token.is_empty()),
        config.inference_api_url
    );

    let embed_dir = download::embedding_model_dir(&config.model_dir);
    if download::embedding_files_present(&config.model_dir) {
        let size = dir_size(&embed_dir)
            .map(format_bytes)
            .unwrap_or_else(|| "unknown size".to_string());
        println!(
            "Embedding model: {}  {} ({})",
            "present".green(),
            embed_dir.display(),
            size
        );
    } else {
        println!("Embedding model: {}", "missing".red());
        println!("  Run `newsprism download-model` to download it");
    }

    println!(
        "Defaults: country={} category={}",
        config.country, config.category
    );
    println!(
        "Analysis models: sentiment={} ner={}",
        config.sentiment_model, config.ner_model
    );
    if config.inference_qps > 0.0 {
        println!("Inference pacing: {} requests/sec", config.inference_qps);
    } else {
        println!("Inference pacing: off");
    }
    println!(
        "Pipeline timeout: {}s",
        config.pipeline_timeout.as_secs()
    );
}

fn presence(set: bool) -> colored::ColoredString {
    if set {
        "set".green()
    } else {
        "not set".yellow()
    }
}

fn dir_size(dir: &std::path::Path) -> Option<u64> {
    let entries = std::fs::read_dir(dir).ok()?;
    Some(
        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.metadata().ok())
            .filter(|m| m.is_file())
            .map(|m| m.len())
            .sum(),
    )
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

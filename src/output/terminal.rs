// Colored terminal output for topic groups, digests and trending entities.
//
// Cluster ids are zero-based internally and shown one-based here.

use colored::Colorize;

use crate::analysis::traits::{Entity, Sentiment, SentimentLabel};
use crate::pipeline::digest::{Digest, DigestEntry};
use crate::topics::grouping::TopicGrouping;

/// Display articles grouped by topic cluster, with their map coordinates.
pub fn display_topic_groups(grouping: &TopicGrouping) {
    if grouping.grouped.is_empty() {
        println!("No articles to group.");
        return;
    }

    println!(
        "\n{}",
        format!(
            "=== {} articles in {} topic clusters ===",
            grouping.grouped.len(),
            grouping.clusters
        )
        .bold()
    );

    let mut current: Option<usize> = None;
    for ((cluster, article), point) in grouping.grouped.iter().zip(&grouping.grouped_points) {
        if current != Some(*cluster) {
            let size = grouping
                .grouped
                .iter()
                .filter(|(c, _)| c == cluster)
                .count();
            println!(
                "\n{} {}",
                format!("Topic Cluster {}", cluster + 1).bold().cyan(),
                format!("({size} articles)").dimmed()
            );
            current = Some(*cluster);
        }

        println!(
            "  • {} {}",
            super::truncate_chars(&article.title, 100),
            format!("({})", article.source.name).dimmed()
        );
        println!(
            "    {}  {}",
            article.url.dimmed(),
            format!("[{:>7.2}, {:>7.2}]", point.0, point.1).dimmed()
        );
    }
    println!();
}

/// Display analyzed articles grouped by cluster.
pub fn display_digest(digest: &Digest, show_sentiment: bool, show_entities: bool) {
    if digest.entries.is_empty() {
        println!("No articles matched the current filters.");
        return;
    }

    println!("\n{}", "=== Summarized News ===".bold());

    let mut current: Option<usize> = None;
    for entry in &digest.entries {
        if current != Some(entry.cluster) {
            println!(
                "\n{}",
                format!("## Topic Cluster {}", entry.cluster + 1).bold().cyan()
            );
            current = Some(entry.cluster);
        }
        display_entry(entry, show_sentiment, show_entities);
    }
}

fn display_entry(entry: &DigestEntry, show_sentiment: bool, show_entities: bool) {
    let article = &entry.article;
    println!(
        "\n  {} {}",
        article.title.bold(),
        format!("({})", article.source.name).dimmed()
    );
    println!("    {}", article.url.dimmed());

    if !entry.has_body() {
        println!(
            "    {}",
            "No content available for summarization.".yellow()
        );
        return;
    }

    if show_sentiment {
        if let Some(sentiment) = &entry.sentiment {
            println!("    Sentiment: {}", format_sentiment(sentiment));
        }
    }

    if entry.summary.is_empty() {
        println!("    {}", "Summary unavailable.".yellow());
    } else {
        println!("    Summary: {}", entry.summary.green());
    }

    if show_entities {
        if entry.entities.is_empty() {
            println!("    Entities: {}", "No named entities found.".dimmed());
        } else {
            println!("    Entities: {}", format_entities(&entry.entities));
        }
    }
}

/// Display the most-mentioned entities as a ranked list with bars.
pub fn display_trending(trending: &[(String, usize)]) {
    if trending.is_empty() {
        return;
    }

    println!("\n{}", "=== Trending Topics ===".bold());
    let widest = trending.iter().map(|(_, n)| *n).max().unwrap_or(1);
    for (i, (text, count)) in trending.iter().enumerate() {
        let bar_len = (count * 20).div_ceil(widest);
        println!(
            "  {:>2}. {:<32} {:>3} {}",
            i + 1,
            super::truncate_chars(text, 30),
            count,
            "█".repeat(bar_len).cyan()
        );
    }
    println!();
}

fn format_sentiment(sentiment: &Sentiment) -> String {
    let text = format!("{} ({:.2})", sentiment.label, sentiment.score);
    match sentiment.label {
        SentimentLabel::Positive => text.green().to_string(),
        SentimentLabel::Negative => text.red().to_string(),
        SentimentLabel::Neutral => text.normal().to_string(),
    }
}

/// "Name (KIND), Name (KIND)" as carried by each digest entry.
pub fn format_entities(entities: &[Entity]) -> String {
    entities
        .iter()
        .map(|e| format!("{} ({})", e.text, e.kind))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::traits::EntityKind;

    #[test]
    fn test_format_entities() {
        let entities = vec![
            Entity {
                text: "Ada Lovelace".to_string(),
                kind: EntityKind::Person,
            },
            Entity {
                text: "London".to_string(),
                kind: EntityKind::Place,
            },
        ];
        assert_eq!(
            format_entities(&entities),
            "Ada Lovelace (PERSON), London (GPE)"
        );
    }
}

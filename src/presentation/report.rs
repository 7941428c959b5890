// Terminal rendering for the admin CLI
use crate::application::cache::CacheLookup;
use crate::domain::entities::{extract, EntityKind};
use crate::domain::key::semantic_key;
use crate::domain::model::{CacheStats, VideoStats, VideoSummary};
use crate::domain::normalize::normalize;
use crate::domain::response::ResponseEnvelope;
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::fmt::Write;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

fn bucket_label(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Company => "companies",
        EntityKind::TimePeriod => "time_periods",
        EntityKind::Location => "locations",
        EntityKind::Number => "numbers",
        EntityKind::Action => "actions",
        EntityKind::Topic => "topics",
        EntityKind::Keyword => "keywords",
    }
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn format_explain(query: &str, intent: &str) -> String {
    let mut output = String::new();
    let entities = extract(query);

    writeln!(output, "{} {}", "Query".green().bold(), query).ok();
    writeln!(output, "  {:<14}{}", "intent", intent).ok();
    writeln!(output, "  {:<14}{}", "normalized", normalize(query)).ok();
    for kind in EntityKind::PRECEDENCE {
        let bucket = entities.bucket(kind);
        if !bucket.is_empty() {
            let values: Vec<&str> = bucket.iter().map(String::as_str).collect();
            writeln!(output, "  {:<14}{}", bucket_label(kind), values.join(", ").cyan()).ok();
        }
    }
    writeln!(output, "  {:<14}{}", "semantic key", semantic_key(query, intent).dimmed()).ok();
    output
}

fn format_response(output: &mut String, response: &ResponseEnvelope) {
    if let Some(body) = response.body() {
        writeln!(output).ok();
        writeln!(output, "  {}", body.text()).ok();
    }
    if let Some(market_data) = response.market_data() {
        writeln!(output).ok();
        writeln!(output, "  {}", "market data".cyan()).ok();
        if let Ok(pretty) = serde_json::to_string_pretty(market_data) {
            for line in pretty.lines() {
                writeln!(output, "    {}", line).ok();
            }
        }
    }
}

pub fn format_lookup(query: &str, lookup: &CacheLookup) -> String {
    let mut output = String::new();

    match lookup {
        CacheLookup::Exact(response) => {
            writeln!(output, "{} {}", query.bold(), "[cache: exact]".cyan()).ok();
            format_response(&mut output, response);
        }
        CacheLookup::Semantic {
            response,
            similarity,
            matched_query,
        } => {
            writeln!(
                output,
                "{} {}",
                query.bold(),
                format!("[cache: semantic {:.2}]", similarity).cyan()
            )
            .ok();
            writeln!(output, "  matched {}", matched_query.italic()).ok();
            format_response(&mut output, response);
        }
        CacheLookup::Miss => {
            writeln!(output, "{} {}", query.bold(), "[cache: miss]".yellow()).ok();
        }
    }

    writeln!(output).ok();
    output
}

pub fn format_cache_stats(stats: &CacheStats) -> String {
    let mut output = String::new();
    writeln!(output, "{}", "Query Cache".green().bold()).ok();
    writeln!(output, "{}", RULE).ok();
    writeln!(output, "Entries: {}", stats.total_entries).ok();
    for (intent, count) in &stats.intent_distribution {
        writeln!(output, "  {:<24}{}", intent, count).ok();
    }
    writeln!(output, "Oldest: {}", format_time(stats.oldest_entry)).ok();
    writeln!(output, "Newest: {}", format_time(stats.newest_entry)).ok();
    writeln!(output, "TTL: {}s", stats.ttl_seconds).ok();
    output
}

pub fn format_video_stats(stats: &VideoStats) -> String {
    let mut output = String::new();
    writeln!(output, "{}", "Video Cache".green().bold()).ok();
    writeln!(output, "{}", RULE).ok();
    writeln!(output, "Videos: {}", stats.total_videos).ok();
    writeln!(
        output,
        "Transcripts: {} chars, {} words",
        stats.total_transcript_length, stats.total_word_count
    )
    .ok();
    writeln!(output, "Average duration: {:.1}s", stats.avg_duration).ok();
    if !stats.top_channels.is_empty() {
        writeln!(output, "Top channels:").ok();
        for channel in &stats.top_channels {
            writeln!(output, "  {:<24}{}", channel.channel, channel.count).ok();
        }
    }
    writeln!(output, "Oldest: {}", format_time(stats.oldest_entry)).ok();
    writeln!(output, "Newest: {}", format_time(stats.newest_entry)).ok();
    writeln!(output, "TTL: {}s", stats.ttl_seconds).ok();
    output
}

pub fn format_video_results(results: &[VideoSummary]) -> String {
    let mut output = String::new();
    if results.is_empty() {
        writeln!(output, "{}", "No cached videos matched".yellow()).ok();
        return output;
    }
    for (i, video) in results.iter().enumerate() {
        writeln!(
            output,
            "{}. {} {}",
            i + 1,
            video.title.bold(),
            format!("({})", video.channel).cyan()
        )
        .ok();
        writeln!(
            output,
            "   {}  {:.0}s  {}",
            video.video_url,
            video.duration,
            format_time(video.created_at)
        )
        .ok();
    }
    output
}

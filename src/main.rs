// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use std::env;
use std::time::Instant;
use the_stepwood::config::{load_and_validate_config, EngineConfig, RuntimeBuilder};
use the_stepwood::demo::video_summary::{
    self, Summary, Transcription, YoutubeUrl, CLASSIFY, SUMMARIZE_INTERVIEW, SUMMARIZE_SALES, TRANSCRIBE,
};
use the_stepwood::engine::SessionState;
use the_stepwood::observability::init_tracing;

const DEFAULT_URL: &str = "https://www.youtube.com/watch?v=gjHv4pM8WEQ";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        eprintln!("Usage: {} [config.yaml|config.toml] [youtube_url]", args[0]);
        eprintln!("Example: {} configs/remote-poll.yaml {}", args[0], DEFAULT_URL);
        return Ok(());
    }

    let config = match args.get(1) {
        Some(path) => load_and_validate_config(path).with_context(|| format!("loading {}", path))?,
        None => EngineConfig::default(),
    };
    let url = args.get(2).map(String::as_str).unwrap_or(DEFAULT_URL);

    run_video_summary(&config, url).await
}

async fn run_video_summary(config: &EngineConfig, url: &str) -> Result<()> {
    let start_time = Instant::now();
    let settings = config.executor_settings();

    println!("🚀 Stepwood Video Summarizer");
    println!("═══════════════════════════════════");
    println!("🔗 Video: {}", url);
    println!("🔧 Mode: {}", config.mode);
    println!("⚙️  Max Concurrency: {}", settings.max_concurrency);
    println!("🔁 Retry Attempts: {}", settings.retry_attempts);

    let graph = video_summary::create_graph().context("building graph")?;
    let runtime = RuntimeBuilder::from_config(config, graph)?;

    let invocation_id = runtime.run(YoutubeUrl::new(url), config.block_until_done).await;
    let state = runtime.wait(invocation_id).await?;
    println!("\n📊 Invocation {}: {}", invocation_id, state);
    println!("⏱️  Execution Time: {:?}", start_time.elapsed());

    if let SessionState::Failed(error) = &state {
        anyhow::bail!("invocation failed: {}", error);
    }

    let session = runtime.session(invocation_id).await?;
    println!("\n🔄 Node Chain:");
    for (i, node) in session.committed().iter().enumerate() {
        let record = session.records().iter().find(|r| &r.node == node);
        match record {
            Some(r) => println!(
                "  {}. {} → {} output(s), {} call(s), {:?}",
                i + 1,
                node,
                r.outputs,
                r.calls,
                r.duration
            ),
            None => println!("  {}. {}", i + 1, node),
        }
    }
    for node in session.pruned() {
        println!("  ✂️  {} (pruned)", node);
    }

    let transcription: Vec<Transcription> = runtime.output_as(invocation_id, TRANSCRIBE).await?;
    if let Some(transcription) = transcription.first() {
        println!("\n📝 Transcription:");
        for segment in &transcription.segments {
            println!("  {:>6.2} - {:>6.2}: {}", segment.start_ts, segment.end_ts, segment.text);
        }
    }

    let classified: Vec<Transcription> = runtime.output_as(invocation_id, CLASSIFY).await?;
    let intent = classified.first().map(|t| t.intent().to_string()).unwrap_or_default();
    println!("\n🏷️  Classification: {}", intent);

    let mut summaries: Vec<Summary> = runtime.output_as(invocation_id, SUMMARIZE_INTERVIEW).await?;
    summaries.extend(runtime.output_as::<Summary>(invocation_id, SUMMARIZE_SALES).await?);
    match summaries.first() {
        Some(summary) => println!("\n🎯 Summary:\n   {}", summary.summary),
        None => println!("\n🎯 No suitable summarizer for this classification."),
    }

    println!("\n⏱️  Total Time: {:?}", start_time.elapsed());
    Ok(())
}

// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Video summarization graph with simulated steps.
//!
//! ```text
//! download ─▶ extract_audio ─▶ transcribe ─▶ classify ─▶ route_summarizer
//!                                                          ├─▶ summarize_job_interview
//!                                                          └─▶ summarize_sales_call
//! ```
//!
//! Downloading, audio extraction and transcription are simulated against a
//! small built-in catalogue so the graph runs offline; classification is a
//! keyword vote and the summarizers are extractive. Each unit still carries
//! the container image a real worker would run it in.

use serde::{Deserialize, Serialize};

use crate::errors::{StructuralError, UnitError};
use crate::graph::Graph;
use crate::units::{FunctionUnit, Image, Route, RouterUnit};

pub const GRAPH_NAME: &str = "youtube-video-summarizer";

pub const DOWNLOAD: &str = "download_youtube_video";
pub const EXTRACT_AUDIO: &str = "extract_audio_from_video";
pub const TRANSCRIBE: &str = "transcribe_audio";
pub const CLASSIFY: &str = "classify_meeting_intent";
pub const ROUTE: &str = "route_transcription_to_summarizer";
pub const SUMMARIZE_INTERVIEW: &str = "summarize_job_interview";
pub const SUMMARIZE_SALES: &str = "summarize_sales_call";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YoutubeUrl {
    pub url: String,
    #[serde(default = "default_resolution")]
    pub resolution: String,
}

fn default_resolution() -> String {
    "480p".to_string()
}

impl YoutubeUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            resolution: default_resolution(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechSegment {
    pub speaker: Option<String>,
    pub text: String,
    pub start_ts: f64,
    pub end_ts: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechClassification {
    pub classification: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub segments: Vec<SpeechSegment>,
    #[serde(default)]
    pub classification: Option<SpeechClassification>,
}

impl Transcription {
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn intent(&self) -> &str {
        self.classification
            .as_ref()
            .map(|c| c.classification.as_str())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
}

/// Intents that route to the sales summarizer.
pub const SALES_INTENTS: [&str; 3] = ["sales-call", "marketing-call", "product-call"];

const INTENT_KEYWORDS: [(&str, &[&str]); 5] = [
    ("job-interview", &["candidate", "role", "experience", "hiring", "resume", "salary expectations"]),
    ("sales-call", &["pricing", "contract", "discount", "demo", "purchase", "quote"]),
    ("customer-support-call", &["refund", "complaint", "order", "replacement"]),
    ("technical-support-call", &["error", "crash", "reboot", "install", "bug"]),
    ("financial-call", &["quarter", "revenue", "forecast", "earnings"]),
];

/// Canned recordings standing in for the video service.
const CATALOGUE: [(&str, &str); 3] = [
    (
        "https://www.youtube.com/watch?v=gjHv4pM8WEQ",
        "Thanks for joining, we are excited to talk about the senior engineer role.\n\
         Tell me about your experience leading a platform team.\n\
         I led a team of six and we cut deploy times in half.\n\
         What are your salary expectations for this role?\n\
         Our hiring panel will follow up with the candidate by Friday.",
    ),
    (
        "https://www.youtube.com/watch?v=sales-demo-01",
        "Thanks for taking the demo today.\n\
         The pricing for fifty seats comes with a volume discount.\n\
         Procurement needs the contract reviewed before purchase.\n\
         I will send a formal quote and schedule a follow up next week.",
    ),
    (
        "https://www.youtube.com/watch?v=support-42",
        "The app shows an error right after install.\n\
         Please reboot the device and try again.\n\
         If the crash continues we will file a bug.",
    ),
];

const SEGMENT_SECONDS: f64 = 7.5;

fn recording_for(url: &str) -> Option<&'static str> {
    CATALOGUE
        .iter()
        .find(|(known, _)| *known == url)
        .map(|(_, transcript)| *transcript)
}

pub async fn download_youtube_video(url: YoutubeUrl) -> Result<Vec<MediaFile>, UnitError> {
    let recording = recording_for(&url.url)
        .ok_or_else(|| UnitError::failed(format!("video not available: {}", url.url)))?;
    Ok(vec![MediaFile {
        name: format!("{}.mp4", url.url.rsplit('=').next().unwrap_or("video")),
        mime_type: "video/mp4".to_string(),
        data: recording.as_bytes().to_vec(),
    }])
}

pub async fn extract_audio_from_video(file: MediaFile) -> Result<MediaFile, UnitError> {
    if file.mime_type != "video/mp4" {
        return Err(UnitError::InvalidInput(format!("expected video/mp4, got {}", file.mime_type)));
    }
    let stem = file.name.trim_end_matches(".mp4");
    Ok(MediaFile {
        name: format!("{}.wav", stem),
        mime_type: "audio/wav".to_string(),
        data: file.data,
    })
}

pub async fn transcribe_audio(file: MediaFile) -> Result<Transcription, UnitError> {
    let text = String::from_utf8(file.data).map_err(|e| UnitError::InvalidInput(e.to_string()))?;
    let segments = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| SpeechSegment {
            speaker: Some(format!("speaker_{}", i % 2)),
            text: line.to_string(),
            start_ts: i as f64 * SEGMENT_SECONDS,
            end_ts: (i + 1) as f64 * SEGMENT_SECONDS,
        })
        .collect();
    Ok(Transcription {
        segments,
        classification: None,
    })
}

pub async fn classify_meeting_intent(mut speech: Transcription) -> Result<Transcription, UnitError> {
    let text = speech.text().to_lowercase();
    let words = text.split_whitespace().count().max(1) as f64;

    let best = INTENT_KEYWORDS
        .iter()
        .map(|(intent, keywords)| (*intent, keywords.iter().filter(|k| text.contains(*k)).count()))
        .max_by_key(|(_, hits)| *hits)
        .filter(|(_, hits)| *hits > 0);

    speech.classification = Some(match best {
        Some((intent, hits)) => SpeechClassification {
            classification: intent.to_string(),
            confidence: (hits as f64 * 10.0 / words).min(1.0),
        },
        None => SpeechClassification {
            classification: "unknown".to_string(),
            confidence: 0.0,
        },
    });
    Ok(speech)
}

/// Pick the summarizer for a classified transcription.
pub fn route_transcription_to_summarizer(speech: Transcription) -> Route {
    match speech.intent() {
        "job-interview" => Route::to(SUMMARIZE_INTERVIEW),
        intent if SALES_INTENTS.contains(&intent) => Route::to(SUMMARIZE_SALES),
        _ => Route::halt(),
    }
}

fn key_lines<'a>(speech: &'a Transcription, cues: &[&str]) -> Vec<&'a str> {
    speech
        .segments
        .iter()
        .map(|s| s.text.as_str())
        .filter(|text| {
            let lower = text.to_lowercase();
            cues.iter().any(|cue| lower.contains(cue))
        })
        .collect()
}

pub async fn summarize_job_interview(speech: Transcription) -> Result<Summary, UnitError> {
    let highlights = key_lines(&speech, &["experience", "led", "role", "follow up"]);
    Ok(Summary {
        summary: format!(
            "Job interview ({} segments). Highlights: {}",
            speech.segments.len(),
            highlights.join(" ")
        ),
    })
}

pub async fn summarize_sales_call(speech: Transcription) -> Result<Summary, UnitError> {
    let details = key_lines(&speech, &["pricing", "discount", "contract"]);
    let next_steps = key_lines(&speech, &["follow up", "send", "schedule"]);
    Ok(Summary {
        summary: format!(
            "Sales call. Key details: {} Next steps: {}",
            details.join(" "),
            next_steps.join(" ")
        ),
    })
}

/// Build the video summarization graph.
pub fn create_graph() -> Result<Graph, StructuralError> {
    let yt_downloader_image = Image::new("yt-image-1").run("pip install pytubefix");
    let audio_image = Image::new("audio-image-1").run("pip install pydub");
    let transcribe_image = Image::new("transcribe-image-1").run("pip install faster_whisper");
    let llama_cpp_image = || {
        Image::new("classify-image-1")
            .run("apt-get update && apt-get install -y build-essential")
            .run("pip install llama-cpp-python")
            .run("apt-get purge -y build-essential && apt-get autoremove -y")
    };

    let mut graph = Graph::new(
        GRAPH_NAME,
        FunctionUnit::fan_out(DOWNLOAD, download_youtube_video).with_environment(yt_downloader_image),
    );
    graph.add_node(FunctionUnit::step(EXTRACT_AUDIO, extract_audio_from_video).with_environment(audio_image))?;
    graph.add_node(FunctionUnit::step(TRANSCRIBE, transcribe_audio).with_environment(transcribe_image))?;
    graph.add_node(FunctionUnit::step(CLASSIFY, classify_meeting_intent).with_environment(llama_cpp_image()))?;
    graph.add_node(RouterUnit::new(ROUTE, route_transcription_to_summarizer))?;
    graph.add_node(
        FunctionUnit::step(SUMMARIZE_INTERVIEW, summarize_job_interview).with_environment(llama_cpp_image()),
    )?;
    graph.add_node(FunctionUnit::step(SUMMARIZE_SALES, summarize_sales_call).with_environment(llama_cpp_image()))?;

    graph.add_edge(DOWNLOAD, EXTRACT_AUDIO)?;
    graph.add_edge(EXTRACT_AUDIO, TRANSCRIBE)?;
    graph.add_edge(TRANSCRIBE, CLASSIFY)?;
    graph.add_edge(CLASSIFY, ROUTE)?;
    graph.route(ROUTE, [SUMMARIZE_INTERVIEW, SUMMARIZE_SALES])?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Runtime, SessionState};
    use crate::errors::ExecutionError;

    #[tokio::test]
    async fn interview_is_routed_to_interview_summarizer() {
        let runtime = Runtime::local(create_graph().unwrap()).unwrap();
        let id = runtime.run(YoutubeUrl::new(CATALOGUE[0].0), true).await;

        assert_eq!(runtime.status(id).await.unwrap(), SessionState::Completed);
        let classified: Vec<Transcription> = runtime.output_as(id, CLASSIFY).await.unwrap();
        assert_eq!(classified[0].intent(), "job-interview");

        let summaries: Vec<Summary> = runtime.output_as(id, SUMMARIZE_INTERVIEW).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].summary.contains("platform team"));
        assert!(runtime.output(id, SUMMARIZE_SALES).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sales_call_is_routed_to_sales_summarizer() {
        let runtime = Runtime::local(create_graph().unwrap()).unwrap();
        let id = runtime.run(YoutubeUrl::new(CATALOGUE[1].0), true).await;

        let summaries: Vec<Summary> = runtime.output_as(id, SUMMARIZE_SALES).await.unwrap();
        assert!(summaries[0].summary.contains("volume discount"));
        assert!(runtime.output(id, SUMMARIZE_INTERVIEW).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_intent_halts_without_summary() {
        let runtime = Runtime::local(create_graph().unwrap()).unwrap();
        let id = runtime.run(YoutubeUrl::new(CATALOGUE[2].0), true).await;

        assert_eq!(runtime.status(id).await.unwrap(), SessionState::Completed);
        let classified: Vec<Transcription> = runtime.output_as(id, CLASSIFY).await.unwrap();
        assert_eq!(classified[0].intent(), "technical-support-call");
        assert!(runtime.output(id, SUMMARIZE_INTERVIEW).await.unwrap().is_empty());
        assert!(runtime.output(id, SUMMARIZE_SALES).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_video_fails_at_download() {
        let runtime = Runtime::local(create_graph().unwrap()).unwrap();
        let id = runtime.run(YoutubeUrl::new("https://example.invalid/v"), true).await;

        assert!(matches!(
            runtime.error(id).await.unwrap(),
            Some(ExecutionError::UnitExecution { ref node, .. }) if node == DOWNLOAD
        ));
        assert!(runtime.output(id, TRANSCRIBE).await.unwrap().is_empty());
    }

    #[test]
    fn every_worker_unit_declares_an_image() {
        let graph = create_graph().unwrap();
        for unit in graph.units().filter(|u| u.name() != ROUTE) {
            assert!(unit.environment().is_some(), "{} has no image", unit.name());
        }
        assert_eq!(
            graph.node(CLASSIFY).and_then(|u| u.environment()).map(|e| e.name.as_str()),
            Some("classify-image-1")
        );
    }
}

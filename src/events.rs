//! Typed progress events for a deliberation run.
//!
//! The pipeline reports progress through an injected [`EventSink`]; transport
//! (streaming to a browser, writing a file, collecting in memory) is the
//! sink's business. Events serialize with a `type` tag so a JSONL file or an
//! SSE stream carries self-describing objects.

use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{mpsc, Mutex};

use serde::{Deserialize, Serialize};

use crate::council::{AggregateRankingEntry, FinalAnswer, ModelAnswer, RankingResult};

/// Metadata attached to `stage2_complete`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stage2Metadata {
    pub label_to_model: BTreeMap<String, String>,
    pub aggregate_rankings: Vec<AggregateRankingEntry>,
}

/// Payload of the best-effort `title_complete` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TitleData {
    pub title: String,
}

/// One progress event, in the order a run emits them. Wire form is an
/// internally tagged object: `{"type":"stage1_start"}`,
/// `{"type":"stage1_complete","data":[...]}` and so on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouncilEvent {
    Stage1Start,
    Stage1Complete {
        data: Vec<ModelAnswer>,
    },
    Stage2Start,
    Stage2Complete {
        data: Vec<RankingResult>,
        metadata: Stage2Metadata,
    },
    Stage3Start,
    Stage3Complete {
        data: FinalAnswer,
    },
    TitleComplete {
        data: TitleData,
    },
    Complete,
    Error {
        message: String,
    },
}

impl CouncilEvent {
    /// The wire tag, handy for logs and assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            CouncilEvent::Stage1Start => "stage1_start",
            CouncilEvent::Stage1Complete { .. } => "stage1_complete",
            CouncilEvent::Stage2Start => "stage2_start",
            CouncilEvent::Stage2Complete { .. } => "stage2_complete",
            CouncilEvent::Stage3Start => "stage3_start",
            CouncilEvent::Stage3Complete { .. } => "stage3_complete",
            CouncilEvent::TitleComplete { .. } => "title_complete",
            CouncilEvent::Complete => "complete",
            CouncilEvent::Error { .. } => "error",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("event channel closed")]
    Closed,
    #[error("event worker failed: {0}")]
    Join(String),
}

/// Where the pipeline reports progress. A sink failure is fatal to the run:
/// a caller who asked for events must not silently lose them.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CouncilEvent) -> Result<(), EventError>;
}

/// Discards every event.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: CouncilEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// Collects events in memory, in emission order.
#[derive(Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<CouncilEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CouncilEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: CouncilEvent) -> Result<(), EventError> {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
        Ok(())
    }
}

/// Streams events to a JSONL file through a dedicated writer thread, so
/// emission never blocks the pipeline on disk.
#[derive(Clone)]
pub struct JsonlEventSink {
    sender: mpsc::Sender<CouncilEvent>,
}

pub struct EventWorker {
    handle: Option<std::thread::JoinHandle<Result<(), EventError>>>,
}

impl EventWorker {
    /// Wait for the writer to drain and flush. Call after dropping every
    /// clone of the sink, or this blocks forever.
    pub fn join(mut self) -> Result<(), EventError> {
        let handle = self.handle.take();
        match handle {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(EventError::Join("event worker panicked".to_string())),
            },
            None => Ok(()),
        }
    }
}

impl JsonlEventSink {
    pub fn new(path: impl AsRef<Path>) -> Result<(Self, EventWorker), EventError> {
        let file = std::fs::File::create(path)?;
        let (sender, receiver) = mpsc::channel::<CouncilEvent>();
        let handle = std::thread::spawn(move || write_event_loop(file, receiver));
        Ok((
            Self { sender },
            EventWorker {
                handle: Some(handle),
            },
        ))
    }
}

impl EventSink for JsonlEventSink {
    fn emit(&self, event: CouncilEvent) -> Result<(), EventError> {
        self.sender.send(event).map_err(|_| EventError::Closed)
    }
}

fn write_event_loop(
    file: std::fs::File,
    receiver: mpsc::Receiver<CouncilEvent>,
) -> Result<(), EventError> {
    let mut writer = BufWriter::new(file);
    for event in receiver {
        let line = serde_json::to_string(&event).map_err(|e| EventError::Serde(e.to_string()))?;
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_type_tags() {
        let json = serde_json::to_value(CouncilEvent::Stage1Start).unwrap();
        assert_eq!(json, serde_json::json!({"type": "stage1_start"}));

        let json = serde_json::to_value(CouncilEvent::Complete).unwrap();
        assert_eq!(json, serde_json::json!({"type": "complete"}));

        let json = serde_json::to_value(CouncilEvent::Error {
            message: "chairman failed".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "chairman failed");
    }

    #[test]
    fn stage1_complete_carries_answers_under_data() {
        let event = CouncilEvent::Stage1Complete {
            data: vec![ModelAnswer::ok("m/a", "hello")],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stage1_complete");
        assert_eq!(json["data"][0]["model"], "m/a");
    }

    #[test]
    fn stage2_complete_metadata_uses_snake_case_keys() {
        let mut label_to_model = BTreeMap::new();
        label_to_model.insert("Response A".to_string(), "m/a".to_string());
        let event = CouncilEvent::Stage2Complete {
            data: vec![],
            metadata: Stage2Metadata {
                label_to_model,
                aggregate_rankings: vec![AggregateRankingEntry {
                    model: "m/a".into(),
                    average_rank: 1.0,
                    rankings_count: 1,
                }],
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["metadata"]["label_to_model"]["Response A"], "m/a");
        assert_eq!(
            json["metadata"]["aggregate_rankings"][0]["averageRank"],
            1.0
        );
    }

    #[test]
    fn title_complete_payload_shape() {
        let event = CouncilEvent::TitleComplete {
            data: TitleData {
                title: "Tides Explained".into(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "title_complete");
        assert_eq!(json["data"]["title"], "Tides Explained");
    }

    #[test]
    fn events_round_trip_through_serde() {
        let event = CouncilEvent::Stage3Complete {
            data: FinalAnswer {
                model: "m/chair".into(),
                content: "final".into(),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: CouncilEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn memory_sink_preserves_emission_order() {
        let sink = MemoryEventSink::new();
        sink.emit(CouncilEvent::Stage1Start).unwrap();
        sink.emit(CouncilEvent::Complete).unwrap();
        let kinds: Vec<_> = sink.events().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["stage1_start", "complete"]);
    }
}

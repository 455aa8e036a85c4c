#![forbid(unsafe_code)]

//! # conclave
//!
//! Multi-model deliberation over a single question.
//!
//! Instead of trusting one model's answer, conclave convenes a council:
//! every member model answers the question independently, then ranks the
//! anonymized answers of its peers, and finally a chairman model synthesizes
//! one answer informed by the whole exchange. The caller observes the run as
//! an ordered stream of typed events and receives the full transcript
//! (answers, rankings, aggregate standings, final answer) at the end.

pub mod config;
pub mod council;
pub mod events;
pub mod gateway;
pub mod prompts;

pub use config::{CouncilConfig, DEFAULT_CHAIRMAN_MODEL, DEFAULT_COUNCIL_MODELS};
pub use council::{
    deliberate, AggregateRankingEntry, CouncilError, CouncilMember, CouncilOutcome,
    CouncilRequest, FinalAnswer, ModelAnswer, RankingResult,
};
pub use events::{
    CouncilEvent, EventError, EventSink, EventWorker, JsonlEventSink, MemoryEventSink,
    NullEventSink, Stage2Metadata, TitleData,
};
pub use gateway::{Attribution, ChatGateway, ProviderGateway, UsageSink};

//! The three-stage deliberation pipeline.
//!
//! Stage 1 collects an independent answer from every council member, stage 2
//! has every member rank the anonymized answers, stage 3 asks the chairman
//! for one synthesized final answer. Progress is reported through an
//! injected [`EventSink`] as a fixed event sequence; a best-effort title
//! task may run alongside the stages and is joined before `complete`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::CouncilConfig;
use crate::events::{CouncilEvent, EventError, EventSink, Stage2Metadata, TitleData};
use crate::gateway::{Attribution, ChatGateway, ChatModel, ChatRequest};
use crate::prompts;

use super::labels::LabelTable;
use super::ranking::{aggregate_rankings, parse_ranking};
use super::types::{
    AggregateRankingEntry, CouncilMember, CouncilOutcome, CouncilRequest, FinalAnswer,
    ModelAnswer, RankingResult,
};

/// Timeout for the chairman's synthesis call. Council members run on the
/// gateway default; the chairman reads every answer and every ranking, so it
/// gets longer.
pub const CHAIRMAN_TIMEOUT: Duration = Duration::from_secs(240);

#[derive(Debug, thiserror::Error)]
pub enum CouncilError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Chairman synthesis failed: {0}")]
    Synthesis(crate::gateway::ProviderError),
    #[error("Event sink error: {0}")]
    Event(#[from] EventError),
    #[error("Deliberation cancelled")]
    Cancelled,
}

// ===== Event sequencer =====

/// Run states, in the order a healthy run passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum RunState {
    Idle,
    Stage1Running,
    Stage1Done,
    Stage2Running,
    Stage2Done,
    Stage3Running,
    Stage3Done,
    Complete,
    Failed,
}

/// Emits the event for each transition before entering the next state.
struct Sequencer<'a> {
    sink: &'a dyn EventSink,
    state: RunState,
}

impl<'a> Sequencer<'a> {
    fn new(sink: &'a dyn EventSink) -> Self {
        Self {
            sink,
            state: RunState::Idle,
        }
    }

    fn advance(&mut self, next: RunState, event: CouncilEvent) -> Result<(), EventError> {
        debug_assert!(next > self.state, "sequencer must move forward");
        debug!(from = ?self.state, to = ?next, event = event.kind(), "pipeline transition");
        self.sink.emit(event)?;
        self.state = next;
        Ok(())
    }

    /// Emit one error event and park in `Failed`.
    fn fail(&mut self, message: String) -> Result<(), EventError> {
        debug!(from = ?self.state, "pipeline failed");
        self.sink.emit(CouncilEvent::Error { message })?;
        self.state = RunState::Failed;
        Ok(())
    }

    /// Emit an event without leaving the current state (title resolution).
    fn emit(&self, event: CouncilEvent) -> Result<(), EventError> {
        self.sink.emit(event)
    }
}

// ===== Request sanitization =====

/// The council that will actually sit: the caller's list when it contains
/// anything usable, otherwise the configured roster. Model ids and system
/// prompts are trimmed; whitespace-only entries are dropped.
fn effective_council(
    req: &CouncilRequest,
    config: &CouncilConfig,
) -> Result<Vec<CouncilMember>, CouncilError> {
    let mut members = Vec::new();
    match req.council_models.as_deref() {
        Some(list) if !list.is_empty() => {
            for member in list {
                if member.model.is_empty() {
                    return Err(CouncilError::InvalidRequest(
                        "Model identifier cannot be empty.".into(),
                    ));
                }
                let model = member.model.trim();
                if model.is_empty() {
                    continue;
                }
                let system_prompt = member
                    .system_prompt
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                members.push(CouncilMember {
                    model: model.to_string(),
                    system_prompt,
                });
            }
        }
        _ => {
            members = config
                .council_models
                .iter()
                .map(|m| CouncilMember::new(m.clone()))
                .collect();
        }
    }
    if members.is_empty() {
        return Err(CouncilError::InvalidRequest(
            "At least one council model must be provided.".into(),
        ));
    }
    Ok(members)
}

fn effective_chairman(req: &CouncilRequest, config: &CouncilConfig) -> String {
    req.chairman_model
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| config.chairman_model.clone())
}

// ===== Cancellation =====

fn ensure_live(cancel_flag: Option<&AtomicBool>) -> Result<(), CouncilError> {
    if let Some(flag) = cancel_flag {
        if flag.load(AtomicOrdering::Relaxed) {
            return Err(CouncilError::Cancelled);
        }
    }
    Ok(())
}

/// Resolves when the flag is raised; pends forever without a flag. Raced
/// against each stage so in-flight calls are dropped on cancellation.
async fn wait_cancelled(cancel_flag: Option<&AtomicBool>) {
    match cancel_flag {
        Some(flag) => {
            while !flag.load(AtomicOrdering::Relaxed) {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

// ===== Stage fan-outs =====

/// Stage 1: every member answers the question independently. Output order
/// matches seating order regardless of completion order; a failed call
/// becomes a `failed` answer, never an error.
async fn collect_answers(
    gateway: &Arc<dyn ChatGateway>,
    members: &[CouncilMember],
    question: &str,
    attribution: &Attribution,
) -> Vec<ModelAnswer> {
    let tasks = members.iter().enumerate().map(|(idx, member)| {
        let gateway = gateway.clone();
        let attribution = attribution.clone();
        let messages = prompts::answer_messages(question, member.system_prompt.as_deref());
        let model = member.model.clone();
        async move {
            let request =
                ChatRequest::new(ChatModel::openrouter(model.clone()), messages, attribution);
            let answer = match gateway.chat(request).await {
                Ok(response) => ModelAnswer::ok(model, response.content),
                Err(err) => {
                    warn!(model = %model, error = %err, "council member failed to answer");
                    ModelAnswer::failure(model, err.to_string())
                }
            };
            (idx, answer)
        }
    });

    let results = stream::iter(tasks)
        .buffer_unordered(members.len().max(1))
        .collect::<Vec<_>>()
        .await;

    let mut slots: Vec<Option<ModelAnswer>> = members.iter().map(|_| None).collect();
    for (idx, answer) in results {
        slots[idx] = Some(answer);
    }
    slots.into_iter().flatten().collect()
}

/// Stage 2: every member is asked to rank the anonymized answers, including
/// members whose own stage-1 call failed. A member whose ranking call fails
/// contributes no RankingResult.
async fn collect_rankings(
    gateway: &Arc<dyn ChatGateway>,
    members: &[CouncilMember],
    question: &str,
    table: &LabelTable,
    attribution: &Attribution,
) -> Vec<RankingResult> {
    let messages = prompts::ranking_messages(question, table.answers());

    let tasks = members.iter().enumerate().map(|(idx, member)| {
        let gateway = gateway.clone();
        let attribution = attribution.clone();
        let messages = messages.clone();
        let model = member.model.clone();
        async move {
            let request =
                ChatRequest::new(ChatModel::openrouter(model.clone()), messages, attribution);
            let ranking = match gateway.chat(request).await {
                Ok(response) => {
                    let parsed = parse_ranking(&response.content, table);
                    if parsed.is_empty() {
                        warn!(model = %model, "no labels extracted from ranking text");
                    }
                    Some(RankingResult {
                        model,
                        ranking_text: response.content,
                        parsed_ranking: parsed,
                    })
                }
                Err(err) => {
                    warn!(model = %model, error = %err, "council member failed to rank");
                    None
                }
            };
            (idx, ranking)
        }
    });

    let results = stream::iter(tasks)
        .buffer_unordered(members.len().max(1))
        .collect::<Vec<_>>()
        .await;

    let mut slots: Vec<Option<RankingResult>> = members.iter().map(|_| None).collect();
    for (idx, ranking) in results {
        slots[idx] = ranking;
    }
    slots.into_iter().flatten().collect()
}

/// Stage 3: one synthesis call to the chairman. Failure here is fatal.
async fn synthesize(
    gateway: &Arc<dyn ChatGateway>,
    chairman: &str,
    question: &str,
    answers: &[ModelAnswer],
    table: &LabelTable,
    rankings: &[RankingResult],
    attribution: &Attribution,
) -> Result<FinalAnswer, CouncilError> {
    let messages = prompts::synthesis_messages(question, answers, table.answers(), rankings);
    let request = ChatRequest::new(
        ChatModel::openrouter(chairman),
        messages,
        attribution.clone(),
    )
    .timeout(CHAIRMAN_TIMEOUT);
    let response = gateway
        .chat(request)
        .await
        .map_err(CouncilError::Synthesis)?;
    Ok(FinalAnswer {
        model: chairman.to_string(),
        content: response.content,
    })
}

// ===== Title side task =====

/// Normalize a raw title completion: first non-blank line, trimmed, one
/// layer of surrounding quotes removed. `None` when nothing usable remains.
fn clean_title(raw: &str) -> Option<String> {
    let line = raw.lines().find(|l| !l.trim().is_empty())?;
    let mut title = line.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('\u{201c}', '\u{201d}')] {
        if title.len() >= open.len_utf8() + close.len_utf8()
            && title.starts_with(open)
            && title.ends_with(close)
        {
            title = title[open.len_utf8()..title.len() - close.len_utf8()].trim();
        }
    }
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

fn spawn_title_task(
    gateway: Arc<dyn ChatGateway>,
    model: String,
    question: String,
    attribution: Attribution,
) -> tokio::task::JoinHandle<Option<String>> {
    tokio::spawn(async move {
        let request = ChatRequest::new(
            ChatModel::openrouter(model),
            prompts::title_messages(&question),
            attribution,
        );
        match gateway.chat(request).await {
            Ok(response) => {
                let title = clean_title(&response.content);
                if title.is_none() {
                    warn!("title generation returned no usable text");
                }
                title
            }
            Err(err) => {
                warn!(error = %err, "title generation failed");
                None
            }
        }
    })
}

// ===== Pipeline driver =====

struct StageOutputs {
    answers: Vec<ModelAnswer>,
    rankings: Vec<RankingResult>,
    label_to_model: BTreeMap<String, String>,
    aggregate: Vec<AggregateRankingEntry>,
    final_answer: FinalAnswer,
}

async fn run_stages(
    gateway: &Arc<dyn ChatGateway>,
    members: &[CouncilMember],
    chairman: &str,
    question: &str,
    attribution: &Attribution,
    sequencer: &mut Sequencer<'_>,
    cancel_flag: Option<&AtomicBool>,
) -> Result<StageOutputs, CouncilError> {
    ensure_live(cancel_flag)?;
    sequencer.advance(RunState::Stage1Running, CouncilEvent::Stage1Start)?;
    let answers = tokio::select! {
        answers = collect_answers(gateway, members, question, attribution) => answers,
        _ = wait_cancelled(cancel_flag) => return Err(CouncilError::Cancelled),
    };
    ensure_live(cancel_flag)?;
    sequencer.advance(
        RunState::Stage1Done,
        CouncilEvent::Stage1Complete {
            data: answers.clone(),
        },
    )?;

    sequencer.advance(RunState::Stage2Running, CouncilEvent::Stage2Start)?;
    let table = LabelTable::assign(&answers);
    let rankings = if table.is_empty() {
        warn!("no usable stage-1 answers, skipping ranking dispatch");
        Vec::new()
    } else {
        tokio::select! {
            rankings = collect_rankings(gateway, members, question, &table, attribution) => rankings,
            _ = wait_cancelled(cancel_flag) => return Err(CouncilError::Cancelled),
        }
    };
    ensure_live(cancel_flag)?;
    let aggregate = aggregate_rankings(&rankings, &table);
    sequencer.advance(
        RunState::Stage2Done,
        CouncilEvent::Stage2Complete {
            data: rankings.clone(),
            metadata: Stage2Metadata {
                label_to_model: table.label_to_model().clone(),
                aggregate_rankings: aggregate.clone(),
            },
        },
    )?;

    sequencer.advance(RunState::Stage3Running, CouncilEvent::Stage3Start)?;
    let final_answer = tokio::select! {
        result = synthesize(gateway, chairman, question, &answers, &table, &rankings, attribution) => result?,
        _ = wait_cancelled(cancel_flag) => return Err(CouncilError::Cancelled),
    };
    ensure_live(cancel_flag)?;
    sequencer.advance(
        RunState::Stage3Done,
        CouncilEvent::Stage3Complete {
            data: final_answer.clone(),
        },
    )?;

    Ok(StageOutputs {
        answers,
        rankings,
        label_to_model: table.label_to_model().clone(),
        aggregate,
        final_answer,
    })
}

/// Run one full deliberation.
///
/// Validates the request before any network call, then drives stage 1
/// through stage 3, emitting `stage*_start` / `stage*_complete` events in
/// order, a `title_complete` event if a requested title resolves, and a
/// final `complete`. A chairman failure emits one `error` event and returns
/// [`CouncilError::Synthesis`]; per-member failures are absorbed into the
/// data. Raising `cancel_flag` aborts in-flight calls and returns
/// [`CouncilError::Cancelled`] without further events.
pub async fn deliberate(
    gateway: Arc<dyn ChatGateway>,
    config: &CouncilConfig,
    req: CouncilRequest,
    sink: &dyn EventSink,
    cancel_flag: Option<&AtomicBool>,
) -> Result<CouncilOutcome, CouncilError> {
    if req.content.trim().is_empty() {
        return Err(CouncilError::InvalidRequest(
            "Message content cannot be empty.".into(),
        ));
    }
    let members = effective_council(&req, config)?;
    let chairman = effective_chairman(&req, config);
    ensure_live(cancel_flag)?;

    let run_id = Uuid::new_v4();
    let attribution = Attribution::new("council").with_run(run_id);
    debug!(run_id = %run_id, members = members.len(), chairman = %chairman, "deliberation starting");

    let title_task = if req.want_title {
        Some(spawn_title_task(
            gateway.clone(),
            chairman.clone(),
            req.content.clone(),
            Attribution::new("title").with_run(run_id),
        ))
    } else {
        None
    };

    let mut sequencer = Sequencer::new(sink);
    let staged = match run_stages(
        &gateway,
        &members,
        &chairman,
        &req.content,
        &attribution,
        &mut sequencer,
        cancel_flag,
    )
    .await
    {
        Ok(staged) => staged,
        Err(err) => {
            if let Some(handle) = title_task {
                handle.abort();
            }
            if matches!(err, CouncilError::Synthesis(_)) {
                if let Err(sink_err) = sequencer.fail(err.to_string()) {
                    warn!(error = %sink_err, "could not report failure to event sink");
                }
            }
            return Err(err);
        }
    };

    let title = match title_task {
        Some(mut handle) => tokio::select! {
            joined = &mut handle => match joined {
                Ok(title) => title,
                Err(err) => {
                    warn!(error = %err, "title task did not complete");
                    None
                }
            },
            _ = wait_cancelled(cancel_flag) => {
                handle.abort();
                return Err(CouncilError::Cancelled);
            }
        },
        None => None,
    };
    if let Some(title) = &title {
        sequencer.emit(CouncilEvent::TitleComplete {
            data: TitleData {
                title: title.clone(),
            },
        })?;
    }

    sequencer.advance(RunState::Complete, CouncilEvent::Complete)?;

    Ok(CouncilOutcome {
        answers: staged.answers,
        rankings: staged.rankings,
        label_to_model: staged.label_to_model,
        aggregate_rankings: staged.aggregate,
        final_answer: staged.final_answer,
        title,
    })
}

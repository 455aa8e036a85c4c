//! Prompt construction for each deliberation stage.
//!
//! Builders return ready-to-send message lists. The ranking prompt is the
//! sensitive one: it must never leak model identities, only anonymizing
//! labels.

use crate::council::{AnonymizedAnswer, ModelAnswer, RankingResult};
use crate::gateway::Message;

/// Stage-1 messages for one council member: optional member-specific system
/// prompt plus the user's question, verbatim.
pub fn answer_messages(question: &str, system_prompt: Option<&str>) -> Vec<Message> {
    let mut messages = Vec::new();
    if let Some(system) = system_prompt {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(question));
    messages
}

/// Stage-2 ranking prompt. Every answer appears under its label only; the
/// ranker is asked for an ordered line it can emit mechanically.
pub fn ranking_messages(question: &str, answers: &[AnonymizedAnswer]) -> Vec<Message> {
    let mut block = String::new();
    for answer in answers {
        block.push_str(&format!(
            "### {}\n```\n{}\n```\n\n",
            answer.label, answer.content
        ));
    }

    let format_line = answers
        .iter()
        .map(|a| a.label.as_str())
        .collect::<Vec<_>>()
        .join(" > ");

    let user_prompt = format!(
        "You are evaluating anonymous answers to the same question. You do not \
         know which model wrote which answer.\n\n\
         ## Question\n\n{question}\n\n\
         ## Answers\n\n{block}\
         ## Instructions\n\n\
         Evaluate each answer for accuracy, completeness, and clarity. Explain \
         your reasoning briefly, then end your reply with one final line ranking \
         every answer from best to worst, in exactly this format:\n\n\
         Ranking: {format_line}"
    );

    vec![Message::user(user_prompt)]
}

/// Stage-3 synthesis prompt for the chairman: the question, every usable
/// answer keyed by its label with the attribution restored, and every peer
/// ranking verdict. Verdicts talk in labels, so the answers must keep them.
pub fn synthesis_messages(
    question: &str,
    answers: &[ModelAnswer],
    labeled: &[AnonymizedAnswer],
    rankings: &[RankingResult],
) -> Vec<Message> {
    let system = "You are the chairman of an AI council. Several models have \
                  answered the same question and then ranked each other's \
                  answers anonymously. Synthesize the single best final answer, \
                  favoring points the peer rankings agree are strong and \
                  resolving contradictions in favor of higher-ranked answers.";

    let mut answers_section = String::new();
    for answer in labeled {
        answers_section.push_str(&format!(
            "### {} ({})\n```\n{}\n```\n\n",
            answer.label, answer.model, answer.content
        ));
    }
    let failed: Vec<&str> = answers
        .iter()
        .filter(|a| a.failed)
        .map(|a| a.model.as_str())
        .collect();
    if !failed.is_empty() {
        answers_section.push_str(&format!(
            "(No answer was received from: {}.)\n\n",
            failed.join(", ")
        ));
    }

    let mut rankings_section = String::new();
    for ranking in rankings {
        rankings_section.push_str(&format!(
            "### Verdict from {}\n```\n{}\n```\n\n",
            ranking.model, ranking.ranking_text
        ));
    }
    if rankings.is_empty() {
        rankings_section.push_str("(No peer rankings were produced.)\n\n");
    }

    let user_prompt = format!(
        "## Original Question\n\n{question}\n\n\
         ## Council Answers\n\n{answers_section}\
         ## Peer Rankings\n\n{rankings_section}\
         ## Instructions\n\n\
         Write the single best answer to the original question, drawing on the \
         strongest material above. Produce ONLY the final answer, with no \
         commentary about the council process.",
    );

    vec![Message::system(system), Message::user(user_prompt)]
}

/// One-shot title prompt, independent of the deliberation stages.
pub fn title_messages(question: &str) -> Vec<Message> {
    let user_prompt = format!(
        "Generate a concise title, at most five words, for the following \
         question. Reply with the title only: no quotes, no trailing \
         punctuation.\n\n{question}"
    );
    vec![Message::user(user_prompt)]
}

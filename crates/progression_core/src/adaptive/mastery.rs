//! crates/progression_core/src/adaptive/mastery.rs
//!
//! The mastery tracker: topic-mastery bookkeeping, round creation and the
//! round-progression state machine. Everything here mutates an owned
//! `LearnerProfile`; persisting it is the caller's job.

use tracing::{debug, info};

use crate::domain::{
    Difficulty, LearnerProfile, Phase, Round, RoundKind, RoundQuestion, Topic, TopicMastery,
};
use crate::error::{EngineError, EngineResult};
use crate::ports::QuestionRepository;

/// A topic at or above this score no longer needs focused practice.
pub const MASTERY_THRESHOLD: f64 = 0.7;
pub const ROUND_ONE_PER_TOPIC: usize = 2;
pub const WEAK_TOPIC_ROUND_SIZE: usize = 3;
pub const MAX_ATTEMPTS: u8 = 3;

const CORRECT_DELTA: f64 = 0.05;
const INCORRECT_DELTA: f64 = 0.02;

/// What to do after a round has been analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StartWeakTopicRound,
    Finish,
    Stay,
}

//=========================================================================================
// Pure helpers
//=========================================================================================

/// Position of the round still being answered, if any.
///
/// At most one round may be open and it must be the last one; anything else
/// means two writers raced on the profile.
pub fn active_round_index(profile: &LearnerProfile) -> EngineResult<Option<usize>> {
    let open: Vec<usize> = profile
        .rounds
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.completed)
        .map(|(i, _)| i)
        .collect();

    match open.as_slice() {
        [] => Ok(None),
        [i] if *i + 1 == profile.rounds.len() => Ok(Some(*i)),
        _ => Err(EngineError::InvariantViolation(format!(
            "learner {} has open rounds at positions {:?}",
            profile.learner_id, open
        ))),
    }
}

/// First topic, in fixed order, holding the strictly lowest score.
pub fn weakest_topic(mastery: &TopicMastery) -> Topic {
    let mut weakest = Topic::ALL[0];
    let mut lowest = mastery.get(weakest);
    for (topic, score) in mastery.iter() {
        if score < lowest {
            weakest = topic;
            lowest = score;
        }
    }
    weakest
}

fn adjusted(score: f64, correct: bool) -> f64 {
    let raw = if correct {
        score + CORRECT_DELTA
    } else {
        score - INCORRECT_DELTA
    };
    // Four decimals keep repeated 0.05 steps from drifting around the threshold.
    (raw.clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0
}

/// Applies one mastery adjustment per question and closes the round.
pub fn analyze_completed_round(mastery: &mut TopicMastery, round: &mut Round) -> EngineResult<()> {
    if round.completed {
        return Err(EngineError::InvariantViolation(format!(
            "round {} was already analyzed",
            round.round_number
        )));
    }
    for question in &round.questions {
        let before = mastery.get(question.topic);
        mastery.set(question.topic, adjusted(before, question.correct));
        debug!(
            question_id = question.question_id,
            topic = %question.topic,
            correct = question.correct,
            before,
            after = mastery.get(question.topic),
            "Mastery adjusted"
        );
    }
    round.completed = true;
    Ok(())
}

/// The phase transition taken when `completed` has just been analyzed.
pub fn next_step(phase: Phase, completed: &Round, mastery: &TopicMastery) -> (Phase, Action) {
    match (phase, completed.kind) {
        (Phase::RoundOne, _) => (Phase::WeakTopic, Action::StartWeakTopicRound),
        (Phase::WeakTopic, RoundKind::WeakTopic(topic))
            if mastery.get(topic) >= MASTERY_THRESHOLD =>
        {
            if mastery.iter().any(|(_, score)| score < MASTERY_THRESHOLD) {
                (Phase::WeakTopic, Action::StartWeakTopicRound)
            } else {
                (Phase::Done, Action::Finish)
            }
        }
        (Phase::WeakTopic, _) => (Phase::WeakTopic, Action::StartWeakTopicRound),
        (Phase::Done, _) => (Phase::Done, Action::Stay),
    }
}

/// Points for a correct answer given how many wrong attempts preceded it.
pub fn points_for_attempt(previous_attempts: u8) -> u32 {
    match previous_attempts {
        0 => 10,
        1 => 5,
        2 => 2,
        _ => 0,
    }
}

/// Records one judged answer against an open round question. Returns the points earned.
pub fn record_attempt(question: &mut RoundQuestion, correct: bool) -> u32 {
    if correct {
        question.correct = true;
        question.done = true;
        points_for_attempt(question.attempts)
    } else {
        question.attempts += 1;
        if question.attempts >= MAX_ATTEMPTS {
            question.done = true;
        }
        0
    }
}

//=========================================================================================
// Round creation
//=========================================================================================

async fn sample_exact(
    questions: &dyn QuestionRepository,
    topic: Topic,
    count: usize,
) -> EngineResult<Vec<RoundQuestion>> {
    let batch = questions
        .sample(Some(topic), Difficulty::Medium, count)
        .await?;
    if batch.len() < count {
        return Err(EngineError::InsufficientQuestions {
            scope: topic.to_string(),
            difficulty: Difficulty::Medium,
            wanted: count,
            got: batch.len(),
        });
    }
    Ok(batch.iter().take(count).map(RoundQuestion::new).collect())
}

fn next_round_number(profile: &LearnerProfile) -> u32 {
    profile.rounds.len() as u32 + 1
}

/// Appends the diagnostic round: two medium questions for every topic.
pub async fn start_round_one(
    profile: &mut LearnerProfile,
    questions: &dyn QuestionRepository,
) -> EngineResult<()> {
    let mut picked = Vec::with_capacity(Topic::ALL.len() * ROUND_ONE_PER_TOPIC);
    for topic in Topic::ALL {
        picked.extend(sample_exact(questions, topic, ROUND_ONE_PER_TOPIC).await?);
    }

    let round_number = next_round_number(profile);
    profile.rounds.push(Round {
        round_number,
        kind: RoundKind::Diagnostic,
        questions: picked,
        completed: false,
    });
    profile.phase = Phase::RoundOne;
    info!(learner_id = %profile.learner_id, round_number, "Started diagnostic round");
    Ok(())
}

/// Appends a round on the globally weakest topic. Returns `None` when every
/// topic already meets the threshold and nothing was started.
pub async fn start_weak_topic_round(
    profile: &mut LearnerProfile,
    questions: &dyn QuestionRepository,
) -> EngineResult<Option<Topic>> {
    let topic = weakest_topic(&profile.mastery);
    if profile.mastery.get(topic) >= MASTERY_THRESHOLD {
        return Ok(None);
    }

    let picked = sample_exact(questions, topic, WEAK_TOPIC_ROUND_SIZE).await?;
    let round_number = next_round_number(profile);
    profile.rounds.push(Round {
        round_number,
        kind: RoundKind::WeakTopic(topic),
        questions: picked,
        completed: false,
    });
    info!(learner_id = %profile.learner_id, round_number, topic = %topic, "Started weak-topic round");
    Ok(Some(topic))
}

/// Analyzes the active round and moves the learner to the next phase.
pub async fn complete_active_round(
    profile: &mut LearnerProfile,
    questions: &dyn QuestionRepository,
) -> EngineResult<()> {
    let index = active_round_index(profile)?.ok_or_else(|| {
        EngineError::InvariantViolation(format!(
            "learner {} has no round to complete",
            profile.learner_id
        ))
    })?;

    let round = &mut profile.rounds[index];
    analyze_completed_round(&mut profile.mastery, round)?;

    let (phase, action) = next_step(profile.phase, &profile.rounds[index], &profile.mastery);
    profile.phase = phase;
    match action {
        Action::StartWeakTopicRound => {
            if start_weak_topic_round(profile, questions).await?.is_none() {
                profile.phase = Phase::Done;
            }
        }
        Action::Finish => {
            info!(learner_id = %profile.learner_id, "All topics mastered");
        }
        Action::Stay => {}
    }
    Ok(())
}

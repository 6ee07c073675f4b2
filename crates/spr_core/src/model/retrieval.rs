//! Retrieval practice model: quiz, reconstruction and calibration scoring.
//!
//! # Responsibility
//! - Define the quiz/reconstruction records stored in session state.
//! - Score attempts and compare rebuilt outlines against the skeleton.
//!
//! # Invariants
//! - Scores are integer percentages in `0..=100`.
//! - Per-node statistics are keyed by node path like all other node state.

use crate::model::skeleton::{all_labels, percentage_of, SkeletonNode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Calibration error magnitude still considered well calibrated.
pub const CALIBRATION_TOLERANCE: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuizQuestionType {
    FillBlank,
    TrueFalse,
    ShortAnswer,
    ConceptMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuizQuestionType,
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    pub related_node_path: String,
    /// 1 (easy) to 3 (hard).
    pub difficulty: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswer {
    pub question_id: String,
    pub user_answer: String,
    pub is_correct: bool,
    /// Seconds spent answering.
    pub time_taken: u32,
}

/// Verdict returned by the assessment service for one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEvaluation {
    pub is_correct: bool,
    pub feedback: String,
    pub score: f64,
}

/// Self-prediction made before a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationPrediction {
    #[serde(rename = "90+")]
    Above90,
    #[serde(rename = "70-90")]
    From70To90,
    #[serde(rename = "50-70")]
    From50To70,
    #[serde(rename = "50-")]
    Below50,
}

impl CalibrationPrediction {
    /// Representative score used to compute calibration error.
    pub fn midpoint(self) -> i32 {
        match self {
            Self::Above90 => 95,
            Self::From70To90 => 80,
            Self::From50To70 => 60,
            Self::Below50 => 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationVerdict {
    Calibrated,
    Overconfident,
    Underconfident,
}

impl CalibrationVerdict {
    pub fn from_error(error: i32) -> Self {
        if error.abs() <= CALIBRATION_TOLERANCE {
            Self::Calibrated
        } else if error > 0 {
            Self::Overconfident
        } else {
            Self::Underconfident
        }
    }
}

/// Node of an outline rebuilt from memory by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconstructedNode {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ReconstructedNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconstructionResult {
    pub matched_nodes: Vec<String>,
    pub missed_nodes: Vec<String>,
    pub extra_nodes: Vec<String>,
    pub completion_rate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalKind {
    Quiz,
    Reconstruction,
}

/// One finished practice attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalSession {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RetrievalKind,
    pub created_at: i64,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub predicted_score: Option<CalibrationPrediction>,
    pub actual_score: u32,
    /// Predicted midpoint minus actual score.
    pub calibration_error: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<QuizQuestion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<UserAnswer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconstructed_tree: Option<ReconstructedNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconstruction_result: Option<ReconstructionResult>,
    #[serde(default)]
    pub weak_nodes: Vec<String>,
}

/// Practice history for one node path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeRetrievalStats {
    pub last_quiz_score: Option<u32>,
    #[serde(rename = "lastReconScore")]
    pub last_reconstruction_score: Option<u32>,
    pub quiz_count: u32,
    #[serde(rename = "reconCount")]
    pub reconstruction_count: u32,
    pub last_test_time: Option<i64>,
}

impl NodeRetrievalStats {
    /// Folds one finished session into the counters.
    pub fn record(&mut self, session: &RetrievalSession, now_ms: i64) {
        match session.kind {
            RetrievalKind::Quiz => {
                self.quiz_count += 1;
                self.last_quiz_score = Some(session.actual_score);
            }
            RetrievalKind::Reconstruction => {
                self.reconstruction_count += 1;
                self.last_reconstruction_score = Some(session.actual_score);
            }
        }
        self.last_test_time = Some(now_ms);
    }
}

/// Percentage of correct answers, `0` when nothing was answered.
pub fn quiz_score(answers: &[UserAnswer]) -> u32 {
    let correct = answers.iter().filter(|answer| answer.is_correct).count();
    percentage_of(correct as u32, answers.len() as u32)
}

pub fn calibration_error(prediction: CalibrationPrediction, actual_score: u32) -> i32 {
    prediction.midpoint() - actual_score as i32
}

/// Builds the session record for a finished quiz.
///
/// Weak nodes are the related paths of wrongly answered questions.
pub fn quiz_session(
    questions: &[QuizQuestion],
    answers: &[UserAnswer],
    prediction: CalibrationPrediction,
    now_ms: i64,
) -> RetrievalSession {
    let actual_score = quiz_score(answers);
    let weak_nodes = answers
        .iter()
        .filter(|answer| !answer.is_correct)
        .filter_map(|answer| {
            questions
                .iter()
                .find(|question| question.id == answer.question_id)
                .map(|question| question.related_node_path.clone())
        })
        .filter(|path| !path.is_empty())
        .collect();

    RetrievalSession {
        id: format!("quiz-{}", Uuid::new_v4()),
        kind: RetrievalKind::Quiz,
        created_at: now_ms,
        completed_at: Some(now_ms),
        predicted_score: Some(prediction),
        actual_score,
        calibration_error: calibration_error(prediction, actual_score),
        questions: Some(questions.to_vec()),
        answers: Some(answers.to_vec()),
        reconstructed_tree: None,
        reconstruction_result: None,
        weak_nodes,
    }
}

/// Builds the session record for a finished reconstruction.
pub fn reconstruction_session(
    rebuilt: ReconstructedNode,
    result: ReconstructionResult,
    now_ms: i64,
) -> RetrievalSession {
    RetrievalSession {
        id: format!("recon-{}", Uuid::new_v4()),
        kind: RetrievalKind::Reconstruction,
        created_at: now_ms,
        completed_at: Some(now_ms),
        predicted_score: None,
        actual_score: result.completion_rate,
        calibration_error: 0,
        questions: None,
        answers: None,
        reconstructed_tree: Some(rebuilt),
        weak_nodes: result.missed_nodes.clone(),
        reconstruction_result: Some(result),
    }
}

/// Compares a rebuilt outline with the original skeleton by label similarity.
///
/// Two labels match when, case-insensitively, either contains the first five
/// characters of the other.
pub fn compare_reconstruction(
    original: &SkeletonNode,
    rebuilt: &ReconstructedNode,
) -> ReconstructionResult {
    let original_labels = all_labels(original);
    let mut rebuilt_labels = Vec::new();
    collect_rebuilt_labels(rebuilt, &mut rebuilt_labels);

    let (matched_nodes, missed_nodes): (Vec<String>, Vec<String>) = original_labels
        .iter()
        .cloned()
        .partition(|label| rebuilt_labels.iter().any(|other| labels_match(label, other)));
    let extra_nodes = rebuilt_labels
        .iter()
        .filter(|label| !original_labels.iter().any(|other| labels_match(other, label)))
        .cloned()
        .collect();

    ReconstructionResult {
        completion_rate: percentage_of(matched_nodes.len() as u32, original_labels.len() as u32),
        matched_nodes,
        missed_nodes,
        extra_nodes,
    }
}

fn collect_rebuilt_labels(node: &ReconstructedNode, out: &mut Vec<String>) {
    if !node.label.is_empty() {
        out.push(node.label.clone());
    }
    for child in &node.children {
        collect_rebuilt_labels(child, out);
    }
}

fn labels_match(original: &str, rebuilt: &str) -> bool {
    let original = original.to_lowercase();
    let rebuilt = rebuilt.to_lowercase();
    rebuilt.contains(&prefix_chars(&original, 5)) || original.contains(&prefix_chars(&rebuilt, 5))
}

fn prefix_chars(value: &str, count: usize) -> String {
    value.chars().take(count).collect()
}

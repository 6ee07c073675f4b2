//! Retrieval practice over the assessment service, with offline fallbacks.
//!
//! # Invariants
//! - Question generation never fails; a failure yields one open question.
//! - Answer evaluation never fails; a failure falls back to prefix matching.

use crate::logging::error_summary;
use crate::model::retrieval::{AnswerEvaluation, QuizQuestion, QuizQuestionType};
use crate::model::skeleton::SkeletonNode;
use crate::service::collaborators::AssessmentService;
use log::warn;
use std::sync::Arc;

const FALLBACK_PREFIX_CHARS: usize = 10;
const FALLBACK_CORRECT_SCORE: f64 = 80.0;
const FALLBACK_WRONG_SCORE: f64 = 20.0;

pub struct PracticeService {
    assessment: Arc<dyn AssessmentService>,
}

impl PracticeService {
    pub fn new(assessment: Arc<dyn AssessmentService>) -> Self {
        Self { assessment }
    }

    pub async fn generate_questions(
        &self,
        markdown: &str,
        skeleton: &SkeletonNode,
        count: usize,
    ) -> Vec<QuizQuestion> {
        match self
            .assessment
            .generate_questions(markdown, skeleton, count)
            .await
        {
            Ok(questions) if !questions.is_empty() => questions,
            Ok(_) => vec![fallback_question(skeleton)],
            Err(err) => {
                warn!(
                    "event=quiz_generate module=service status=error fallback=open_question error={}",
                    error_summary(&err)
                );
                vec![fallback_question(skeleton)]
            }
        }
    }

    pub async fn evaluate(&self, question: &QuizQuestion, user_answer: &str) -> AnswerEvaluation {
        match self.assessment.evaluate(question, user_answer).await {
            Ok(evaluation) => evaluation,
            Err(err) => {
                warn!(
                    "event=answer_evaluate module=service status=error fallback=prefix_match question_id={} error={}",
                    question.id,
                    error_summary(&err)
                );
                fallback_evaluation(question, user_answer)
            }
        }
    }
}

/// Single open question about the whole document.
pub fn fallback_question(skeleton: &SkeletonNode) -> QuizQuestion {
    QuizQuestion {
        id: "fallback-1".to_string(),
        kind: QuizQuestionType::ShortAnswer,
        question: "Summarize the core idea of this material in your own words.".to_string(),
        answer: "(open question)".to_string(),
        hints: Vec::new(),
        related_node_path: skeleton.label.clone(),
        difficulty: 2,
    }
}

/// Correct when the answer contains the first ten characters of the expected one.
pub fn fallback_evaluation(question: &QuizQuestion, user_answer: &str) -> AnswerEvaluation {
    let expected: String = question
        .answer
        .to_lowercase()
        .chars()
        .take(FALLBACK_PREFIX_CHARS)
        .collect();
    let is_correct = user_answer.to_lowercase().contains(&expected);
    AnswerEvaluation {
        is_correct,
        feedback: if is_correct {
            "Mostly correct".to_string()
        } else {
            "Needs review".to_string()
        },
        score: if is_correct {
            FALLBACK_CORRECT_SCORE
        } else {
            FALLBACK_WRONG_SCORE
        },
    }
}

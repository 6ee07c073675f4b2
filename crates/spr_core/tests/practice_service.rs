mod support;

use async_trait::async_trait;
use spr_core::model::retrieval::{AnswerEvaluation, QuizQuestionType};
use spr_core::{
    AssessmentService, PracticeService, QuizQuestion, ServiceError, ServiceResult, SkeletonNode,
};
use std::sync::{Arc, Mutex};
use support::sample_skeleton;

/// Assessment backend replaying fixed results.
struct ScriptedAssessment {
    questions: Mutex<ServiceResult<Vec<QuizQuestion>>>,
    evaluation: Mutex<ServiceResult<AnswerEvaluation>>,
}

impl ScriptedAssessment {
    fn new(
        questions: ServiceResult<Vec<QuizQuestion>>,
        evaluation: ServiceResult<AnswerEvaluation>,
    ) -> Arc<Self> {
        Arc::new(Self {
            questions: Mutex::new(questions),
            evaluation: Mutex::new(evaluation),
        })
    }

    fn failing() -> Arc<Self> {
        Self::new(
            Err(ServiceError::Transport("connection reset".to_string())),
            Err(ServiceError::Provider {
                status: 500,
                message: "upstream down".to_string(),
            }),
        )
    }
}

#[async_trait]
impl AssessmentService for ScriptedAssessment {
    async fn generate_questions(
        &self,
        _markdown: &str,
        _skeleton: &SkeletonNode,
        _count: usize,
    ) -> ServiceResult<Vec<QuizQuestion>> {
        self.questions.lock().unwrap().clone()
    }

    async fn evaluate(
        &self,
        _question: &QuizQuestion,
        _user_answer: &str,
    ) -> ServiceResult<AnswerEvaluation> {
        self.evaluation.lock().unwrap().clone()
    }
}

fn question(id: &str, answer: &str) -> QuizQuestion {
    QuizQuestion {
        id: id.to_string(),
        kind: QuizQuestionType::FillBlank,
        question: "What comes before B?".to_string(),
        answer: answer.to_string(),
        hints: Vec::new(),
        related_node_path: "root > chapter > A".to_string(),
        difficulty: 1,
    }
}

#[tokio::test]
async fn failed_generation_yields_one_open_question() {
    let practice = PracticeService::new(ScriptedAssessment::failing());

    let questions = practice
        .generate_questions("# root", &sample_skeleton(), 5)
        .await;

    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].id, "fallback-1");
    assert_eq!(questions[0].kind, QuizQuestionType::ShortAnswer);
    assert_eq!(questions[0].related_node_path, "root");
}

#[tokio::test]
async fn empty_generation_yields_one_open_question() {
    let practice = PracticeService::new(ScriptedAssessment::new(
        Ok(Vec::new()),
        Err(ServiceError::Other("unused".to_string())),
    ));

    let questions = practice
        .generate_questions("# root", &sample_skeleton(), 5)
        .await;

    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].id, "fallback-1");
}

#[tokio::test]
async fn generated_questions_pass_through() {
    let generated = vec![question("q1", "A"), question("q2", "B")];
    let practice = PracticeService::new(ScriptedAssessment::new(
        Ok(generated.clone()),
        Err(ServiceError::Other("unused".to_string())),
    ));

    let questions = practice
        .generate_questions("# root", &sample_skeleton(), 2)
        .await;

    assert_eq!(questions, generated);
}

#[tokio::test]
async fn failed_evaluation_falls_back_to_prefix_match() {
    let practice = PracticeService::new(ScriptedAssessment::failing());
    let question = question("q1", "Photosynthesis converts light");

    let hit = practice
        .evaluate(&question, "I think photosynthesis is the answer")
        .await;
    assert!(hit.is_correct);
    assert_eq!(hit.score, 80.0);
    assert_eq!(hit.feedback, "Mostly correct");

    let miss = practice.evaluate(&question, "respiration").await;
    assert!(!miss.is_correct);
    assert_eq!(miss.score, 20.0);
    assert_eq!(miss.feedback, "Needs review");
}

#[tokio::test]
async fn provider_evaluation_is_returned_as_is() {
    let evaluation = AnswerEvaluation {
        is_correct: false,
        feedback: "Close, but B comes after A".to_string(),
        score: 45.0,
    };
    let practice = PracticeService::new(ScriptedAssessment::new(
        Ok(Vec::new()),
        Ok(evaluation.clone()),
    ));

    let result = practice
        .evaluate(&question("q1", "A"), "B")
        .await;

    assert_eq!(result, evaluation);
}

//! Contracts for the host record, skeleton generation and assessment services.
//!
//! # Responsibility
//! - Define the async seams the session controller depends on.
//! - Normalize raw collaborator payloads (document bytes, AI JSON text).
//!
//! # Invariants
//! - Collaborator failures are `ServiceError`s; classification happens upstream.

use crate::error::{ServiceError, ServiceResult};
use crate::model::retrieval::{AnswerEvaluation, QuizQuestion};
use crate::model::skeleton::SkeletonNode;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").expect("valid code fence regex")
});

/// Host table access: current record identity and its attached document.
#[async_trait]
pub trait RecordAttachmentService: Send + Sync {
    /// Fails with `NoActiveSession` when no record is selected.
    async fn current_session_id(&self) -> ServiceResult<String>;
    /// Raw bytes of the Markdown attachment of the current record.
    async fn document_bytes(&self) -> ServiceResult<Vec<u8>>;
}

#[async_trait]
pub trait SkeletonGenerator: Send + Sync {
    async fn generate(&self, markdown: &str) -> ServiceResult<SkeletonNode>;
}

#[async_trait]
pub trait AssessmentService: Send + Sync {
    async fn generate_questions(
        &self,
        markdown: &str,
        skeleton: &SkeletonNode,
        count: usize,
    ) -> ServiceResult<Vec<QuizQuestion>>;

    async fn evaluate(
        &self,
        question: &QuizQuestion,
        user_answer: &str,
    ) -> ServiceResult<AnswerEvaluation>;
}

/// Parses a skeleton from AI response text, tolerating a Markdown code fence.
pub fn parse_skeleton_response(text: &str) -> ServiceResult<SkeletonNode> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::MalformedResponse("empty AI response".to_string()));
    }
    let body = CODE_FENCE_RE
        .captures(trimmed)
        .and_then(|captures| captures.get(1))
        .map_or(trimmed, |inner| inner.as_str());
    Ok(serde_json::from_str(body)?)
}

/// Decodes attachment bytes as UTF-8 text, dropping a leading BOM.
pub fn decode_document(bytes: &[u8]) -> String {
    let decoded = String::from_utf8_lossy(bytes);
    let text: &str = &decoded;
    text.strip_prefix('\u{feff}').unwrap_or(text).to_string()
}

#[cfg(test)]
mod tests {
    use super::{decode_document, parse_skeleton_response};
    use crate::error::ServiceError;
    use crate::model::skeleton::NodeKind;

    #[test]
    fn parses_fenced_json() {
        let text = "```json\n{\"label\":\"Doc\",\"type\":\"root\",\"children\":[{\"label\":\"A\",\"type\":\"slot_concept\"}]}\n```";
        let root = parse_skeleton_response(text).expect("fenced json should parse");
        assert_eq!(root.label, "Doc");
        assert_eq!(root.children[0].kind, NodeKind::ConceptSlot);
    }

    #[test]
    fn parses_bare_json() {
        let root = parse_skeleton_response(r#" {"label":"Doc","type":"root"} "#)
            .expect("bare json should parse");
        assert!(root.children.is_empty());
    }

    #[test]
    fn empty_and_invalid_responses_are_malformed() {
        assert!(matches!(
            parse_skeleton_response("   "),
            Err(ServiceError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_skeleton_response("not json"),
            Err(ServiceError::MalformedResponse(_))
        ));
    }

    #[test]
    fn decode_strips_bom_and_replaces_invalid_bytes() {
        assert_eq!(decode_document(b"\xEF\xBB\xBF# Title"), "# Title");
        assert_eq!(decode_document(b"ok\xFF"), "ok\u{FFFD}");
    }
}

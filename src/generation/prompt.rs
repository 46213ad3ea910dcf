//! Prompt templates for retrieval-augmented generation

/// Prompt builder for RAG queries.
///
/// Selection between the two templates is a hard branch on whether any
/// context was retrieved: the grounded template is never used with empty
/// context, which would force the model to answer from nothing.
pub struct PromptBuilder;

impl PromptBuilder {
    /// Grounded prompt: answer only from the supplied knowledge-base context
    pub fn grounded(context: &str, question: &str) -> String {
        format!(
            r#"You are a corporate AI assistant. Use the provided information from the company knowledge base to answer the question.

CONTEXT FROM THE COMPANY KNOWLEDGE BASE:
{context}

USER QUESTION:
{question}

ANSWER (be precise and use only information from the context):"#
        )
    }

    /// General-knowledge prompt: no retrieved context available
    pub fn general(question: &str) -> String {
        format!(
            r#"You are a corporate AI assistant. Answer the question based on your general knowledge of business processes.

QUESTION: {question}

ANSWER:"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grounded_contains_context_and_question() {
        let prompt = PromptBuilder::grounded("Travel is reimbursed.", "What is reimbursed?");
        assert!(prompt.contains("CONTEXT FROM THE COMPANY KNOWLEDGE BASE:"));
        assert!(prompt.contains("Travel is reimbursed."));
        assert!(prompt.contains("What is reimbursed?"));
    }

    #[test]
    fn test_general_has_no_context_section() {
        let prompt = PromptBuilder::general("What is a KPI?");
        assert!(!prompt.contains("CONTEXT"));
        assert!(prompt.contains("What is a KPI?"));
    }
}

//! Grounded answer prompt.

const INSTRUCTIONS: &str = "You are an expert at answering questions based on PDF documents.\n\
I will provide you with context information extracted from a PDF, and you should answer the \
question using ONLY this information.";

const GUIDELINES: &str = "Instructions:\n\
1. Answer the question thoroughly using the provided context.\n\
2. If the answer is explicitly stated in the context, provide it precisely.\n\
3. Include specific numbers, percentages, and statistics from the context if relevant.\n\
4. If the information to answer the question is not in the context, state clearly that you \
cannot find this information in the provided document.";

/// Assemble the answer prompt from grounding passages and the question.
pub fn build_answer_prompt(context: &[String], question: &str) -> String {
    let context = if context.is_empty() {
        "(no context retrieved)".to_string()
    } else {
        context.join("\n\n")
    };
    format!(
        "{INSTRUCTIONS}\n\nContext information:\n{context}\n\nQuestion: {}\n\n{GUIDELINES}\n\nYour answer:",
        question.trim()
    )
}

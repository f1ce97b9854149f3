use crate::config::PromptLanguage;
use crate::models::RetrievalResult;

/// Chat-template control tokens that must never reach the model from user
/// text or corpus content.
const CONTROL_TOKENS: &[&str] = &["<|im_start|>", "<|im_end|>", "<|endoftext|>"];

/// Remove chat-template control tokens from untrusted text.
///
/// Repeats until a full pass removes nothing, since stripping one token can
/// join the text around it into another.
pub fn sanitize_for_prompt(text: &str) -> String {
    let mut clean = text.to_string();
    loop {
        let mut stripped = false;
        for token in CONTROL_TOKENS {
            if clean.contains(token) {
                clean = clean.replace(token, "");
                stripped = true;
            }
        }
        if !stripped {
            return clean;
        }
    }
}

/// Join retrieved passages in rank order, separated by a blank line.
pub fn build_context(results: &[RetrievalResult]) -> String {
    results
        .iter()
        .map(|r| r.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prompt asking for a concise answer grounded in `context`.
pub fn build_answer_prompt(language: PromptLanguage, context: &str, question: &str) -> String {
    let context = sanitize_for_prompt(context);
    let question = sanitize_for_prompt(question);
    match language {
        PromptLanguage::English => format!(
            "Answer the question using only the information below:\n\
             {context}\n\n\
             Question:\n\
             {question}\n\n\
             Identify the core of the question and answer concisely in 1-2 sentences. \
             Do not add anything unnecessary.\n\n\
             Answer:"
        ),
        PromptLanguage::Korean => format!(
            "다음 정보를 바탕으로 질문에 답하세요:\n\
             {context}\n\n\
             질문:\n\
             {question}\n\n\
             질문의 핵심만 파악하여 간결하게 1-2문장으로 답변하고, 불필요한 대답은 하지 마세요.\n\n\
             답변:"
        ),
    }
}

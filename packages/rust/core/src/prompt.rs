//! Prompt assembly for the chat and ask flows.

use faqbot_shared::{ChunkMatch, Faq};

use crate::openai::ChatMessage;

const CHAT_INSTRUCTIONS: &[&str] = &[
    "You are a helpful support bot for this business.",
    "Answer concisely.",
    "Prefer using the FAQ answers below.",
    "If not found in FAQs, use the WEBSITE EXCERPTS.",
    "If still unsure, say: \"I'm not sure, please contact support.\"",
];

const ASK_INSTRUCTIONS: &str = "Answer using only the FAQ context. If unsure, say you do not know.";

/// Separator between entries of the chat prompt's context blocks.
const ENTRY_SEPARATOR: &str = "\n---\n";

fn faq_entry(faq: &Faq) -> String {
    format!("Q: {}\nA: {}", faq.question, faq.answer)
}

/// FAQ context block for the chat prompt (empty when there are no FAQs).
pub fn faq_context(faqs: &[Faq]) -> String {
    faqs.iter()
        .map(faq_entry)
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR)
}

/// Website excerpt block for the chat prompt (empty when nothing matched).
pub fn website_context(matches: &[ChunkMatch]) -> String {
    matches
        .iter()
        .map(|m| format!("Source: {}\n{}", m.url, m.content))
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR)
}

/// System prompt that prefers FAQ answers, then website excerpts.
pub fn chat_system_prompt(faq_context: &str, website_context: &str) -> String {
    let faq_block = if faq_context.is_empty() {
        "(no FAQs yet)"
    } else {
        faq_context
    };
    let website_block = if website_context.is_empty() {
        "(no website content indexed yet)"
    } else {
        website_context
    };

    let mut lines: Vec<&str> = CHAT_INSTRUCTIONS.to_vec();
    lines.extend(["", "FAQ ANSWERS:", faq_block, "", "WEBSITE EXCERPTS:", website_block]);
    lines.join("\n")
}

/// Messages for the retrieval-augmented chat flow.
pub fn chat_messages(question: &str, faq_context: &str, website_context: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(chat_system_prompt(faq_context, website_context)),
        ChatMessage::user(question),
    ]
}

/// Messages for the FAQ-only ask flow.
pub fn ask_messages(question: &str, faqs: &[Faq]) -> Vec<ChatMessage> {
    let context = faqs.iter().map(faq_entry).collect::<Vec<_>>().join("\n\n");
    let context = if context.is_empty() {
        "(no FAQs)".to_string()
    } else {
        context
    };

    vec![
        ChatMessage::system(ASK_INSTRUCTIONS),
        ChatMessage::user(format!("Question: {question}\n\nFAQ:\n{context}")),
    ]
}

//! Prompts sent to language models.
//!
//! Two kinds of request leave this crate: the OCR transcription of a rendered
//! page and the summarization call. Both live here so that the retry and error
//! handling code in [`crate::pipeline::ocr`] and [`crate::summarize`] never
//! embeds prompt text.

/// System prompt for transcribing a scanned page image to plain text.
pub const OCR_SYSTEM_PROMPT: &str = r#"You are an OCR engine. Transcribe every piece of text visible in the page image exactly as written.

Rules:
- Preserve reading order: top to bottom, left to right, column by column.
- Keep section numbers, dates, amounts and citations verbatim.
- Separate paragraphs with a blank line.
- Do NOT summarise, translate, correct or comment.
- Do NOT add Markdown formatting or code fences.
- If the page contains no text, output nothing."#;

/// Separator between the user's prompt and the document body.
pub const TEXT_TO_SUMMARIZE_HEADER: &str = "\n\nText to summarize:\n";

/// Build the single user message sent to a summarization backend.
pub fn summary_message(custom_prompt: &str, text: &str) -> String {
    let mut message =
        String::with_capacity(custom_prompt.len() + TEXT_TO_SUMMARIZE_HEADER.len() + text.len());
    message.push_str(custom_prompt);
    message.push_str(TEXT_TO_SUMMARIZE_HEADER);
    message.push_str(text);
    message
}

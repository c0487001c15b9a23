/// Character sequences stripped from user input before it reaches a prompt.
const PROMPT_DELIMITERS: &[&str] = &["<|", "|>", "<<", ">>"];

/// Trims the input and removes prompt delimiter sequences.
pub fn sanitize_text(text: &str) -> String {
    let mut cleaned = text.trim().to_string();
    for pattern in PROMPT_DELIMITERS {
        cleaned = cleaned.replace(pattern, "");
    }
    cleaned
}

const OPTIMIZE_INSTRUCTIONS: &str = "You are an expert prompt engineer for AI image generation.
Rewrite the following prompt to be more descriptive, detailed, and artistic, suitable for a high-quality image generation model.
Enhance lighting, texture, and style descriptors.
Keep the original intent.
Return ONLY the improved prompt text, no explanations.";

const ORIGINAL_PROMPT_MARKER: &str = "Original Prompt: \"";

/// Text-model input used to rewrite `prompt` into a richer image prompt.
pub fn optimization_contents(prompt: &str) -> String {
    format!("{OPTIMIZE_INSTRUCTIONS}\n\n{ORIGINAL_PROMPT_MARKER}{prompt}\"")
}

/// Recovers the user prompt from [`optimization_contents`] output.
pub fn original_prompt_from_contents(contents: &str) -> Option<&str> {
    let start = contents.find(ORIGINAL_PROMPT_MARKER)? + ORIGINAL_PROMPT_MARKER.len();
    let tail = contents[start..].strip_suffix('"')?;
    Some(tail)
}

//! Fixed prompts sent to the inference service.

/// Instruction sent with every sampled frame.
pub const VISION_PROMPT: &str = "Describe the software interface in this image. List any visible buttons, text inputs, headers, or specific words like 'Chat', 'Model', 'AI', or code.";

/// Build the synthesis prompt from frame descriptions in offset order.
pub fn synthesis_prompt(descriptions: &[String]) -> String {
    let combined = descriptions
        .iter()
        .enumerate()
        .map(|(i, desc)| format!("- Frame {}: {}", i + 1, desc))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a visual analysis AI. Here are descriptions of three frames from a video:\n\n\
         {combined}\n\n\
         Task: Identify the subject matter and write a 3-sentence summary.\n\
         1. Analyze the visual cues. Are they organic (nature, people) or digital (screens, games)?\n\
         2. If the descriptions mention 'flowers', 'sun', or 'nature', describe it as a vlog or nature clip.\n\
         3. If the descriptions mention 'code', 'text', or 'interface', describe it as a technical video.\n\
         4. DO NOT hallucinate details not present in the descriptions.\n\n\
         Final Summary:"
    )
}

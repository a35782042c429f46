// Shared prompt fragments.
// Each module that needs LLM calls defines its own prompts.rs alongside it.

/// Appended to every prompt that answers from retrieved resume data.
pub const GROUNDING_INSTRUCTION: &str = "\
    Answer ONLY from the data provided. Never guess names, dates, skills or employers. \
    If the data does not contain the answer, say so plainly.";

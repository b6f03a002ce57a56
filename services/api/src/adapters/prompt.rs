//! services/api/src/adapters/prompt.rs
//!
//! Builds the instruction payload sent to every provider. The text depends only
//! on the request and the output format, so the same request always produces
//! the same prompt.

use activity_planner_core::GenerationRequest;

/// How a provider is asked to shape its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// A single JSON object (JSON mode or schema-constrained output).
    Json,
    /// Plain text split into labeled sections, for vendors without JSON mode.
    LabeledText,
}

pub const SYSTEM_PROMPT: &str = "You are an expert speech-language therapist working in the Chilean healthcare system. \
You design evidence-based therapy activities and always answer in Spanish.";

/// Minimal prompt used by key validation probes.
pub const PROBE_PROMPT: &str = "Test";

const JSON_SHAPE: &str = r#"Respond ONLY with one valid JSON object with exactly this shape:
{
  "title": "Activity title",
  "smartObjective": "Specific, measurable SMART objective",
  "description": "General description of the activity",
  "materials": ["Material 1", "Material 2"],
  "procedure": [
    { "name": "Warm-up phase", "time": 10, "description": "What happens in this phase" },
    { "name": "Main phase", "time": 25, "description": "What happens in this phase" },
    { "name": "Closing phase", "time": 10, "description": "What happens in this phase" }
  ],
  "evaluation": {
    "criteria": "Success criteria",
    "methods": ["Method 1", "Method 2"],
    "feedback": "Feedback given to the patient"
  },
  "adaptations": ["Adaptation 1", "Adaptation 2"],
  "theoreticalFoundation": "Evidence-based theoretical foundation"
}
"time" is a whole number of minutes and the phase times must add up to the session duration."#;

const LABELED_SHAPE: &str = r#"Respond in plain text using exactly these section labels, in this order, each on its own line:
TITLE:
SMART OBJECTIVE:
DESCRIPTION:
MATERIALS:
PROCEDURE:
EVALUATION:
ADAPTATIONS:
THEORETICAL FOUNDATION:
List materials and adaptations one per line starting with "- ".
Write each procedure phase as "- Phase name (N min): description"; the minutes must add up to the session duration.
Under EVALUATION write the lines "Criteria:", "Methods:" (comma separated) and "Feedback:"."#;

/// Renders the user prompt for one generation request.
pub fn build_prompt(request: &GenerationRequest, format: OutputFormat) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str("Design a detailed, professional speech therapy activity.\n\n");
    prompt.push_str("PATIENT DATA:\n");
    prompt.push_str(&format!("- Age: {} years\n", request.patient_age));
    prompt.push_str(&format!("- Description: {}\n", request.patient_description.trim()));
    prompt.push_str(&format!(
        "- Specific objective: {}\n",
        request.specific_objective.trim()
    ));
    prompt.push_str(&format!("- Duration: {} minutes\n", request.duration));
    prompt.push_str(&format!("- Session type: {}\n", request.session_type.as_str()));
    prompt.push_str(&format!(
        "- Pediatric session: {}\n",
        if request.is_pediatric { "yes" } else { "no" }
    ));
    if let Some(context) = request
        .custom_context
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        prompt.push_str(&format!("- Additional context: {}\n", context));
    }

    if let Some(pdfs) = request.pdf_contents.as_ref().filter(|p| !p.is_empty()) {
        prompt.push_str("\nREFERENCE MATERIAL (extracted from uploaded PDFs):\n");
        prompt.push_str(&pdfs.join("\n\n"));
        prompt.push_str("\nUse these references to ground and enrich the activity.\n");
    }

    prompt.push_str("\nINSTRUCTIONS:\n");
    if request.is_child() {
        prompt.push_str("1. Use playful, motivating language suitable for children.\n");
    } else {
        prompt.push_str("1. Use professional language suitable for adults.\n");
    }
    prompt.push_str("2. Take the Chilean sociocultural context and healthcare system into account.\n");
    prompt.push_str("3. Use appropriate speech-language pathology terminology.\n");
    prompt.push_str(&format!(
        "4. Plan phases whose times add up to {} minutes.\n\n",
        request.duration
    ));

    match format {
        OutputFormat::Json => prompt.push_str(JSON_SHAPE),
        OutputFormat::LabeledText => prompt.push_str(LABELED_SHAPE),
    }
    prompt
}

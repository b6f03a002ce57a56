//! crates/activity_planner_core/src/demo.rs
//!
//! Offline activity builder for demo mode. Output is clearly labelled and never
//! produced unless demo mode was switched on explicitly.

use crate::domain::{
    split_duration, Evaluation, GeneratedActivity, GenerationRequest, ProcedurePhase,
};

pub const DEMO_TITLE_PREFIX: &str = "[DEMO]";

/// Builds a deterministic placeholder activity from the request alone.
pub fn demo_activity(request: &GenerationRequest) -> GeneratedActivity {
    let child = request.is_child();
    let objective = request.specific_objective.trim();
    let times = split_duration(request.duration, 3);

    let names = if child {
        ["Warm-up game", "Main mission", "Celebration"]
    } else {
        ["Warm-up", "Core practice", "Wrap-up"]
    };
    let descriptions = if child {
        [
            "Playful warm-up to get ready for the session",
            "Guided games practising the target skill",
            "Review achievements together and celebrate progress",
        ]
    } else {
        [
            "Preparatory exercises",
            "Systematic practice of the target technique",
            "Summary and feedback",
        ]
    };

    let procedure = names
        .iter()
        .zip(descriptions.iter())
        .zip(times)
        .map(|((name, description), time)| ProcedurePhase {
            name: name.to_string(),
            time,
            description: description.to_string(),
        })
        .collect();

    GeneratedActivity {
        title: format!("{} Activity: {}", DEMO_TITLE_PREFIX, objective),
        smart_objective: format!(
            "The patient will {} with 80% accuracy within a {}-minute session.",
            objective, request.duration
        ),
        description: format!(
            "Demo content generated offline for a {}-minute {} session. Not clinical advice.",
            request.duration,
            request.session_type.as_str()
        ),
        materials: if child {
            vec![
                "Colourful picture cards".to_string(),
                "Interactive games".to_string(),
                "Record sheet".to_string(),
            ]
        } else {
            vec![
                "Structured visual material".to_string(),
                "Assessment protocol".to_string(),
                "Record sheet".to_string(),
            ]
        },
        procedure,
        evaluation: Evaluation {
            criteria: "80% correct responses".to_string(),
            methods: vec![
                "Quantitative tally".to_string(),
                "Qualitative observation".to_string(),
            ],
            feedback: "Feedback on strengths and areas to improve".to_string(),
        },
        adaptations: vec![
            "Reduce task difficulty when accuracy drops below 50%".to_string(),
            "Add visual cues for attention support".to_string(),
        ],
        theoretical_foundation: "Demo placeholder: no evidence base was consulted.".to_string(),
    }
}

//! services/api/src/adapters/parsing.rs
//!
//! Turns raw vendor output into a validated `GeneratedActivity`.
//!
//! Two strategies share one contract: JSON output (JSON mode or a response
//! schema) is decoded directly, while plain text is split into labeled
//! sections. Either way the result passes `GeneratedActivity::validate` or the
//! call fails; a partially filled activity is never returned.

use activity_planner_core::{
    split_duration, Evaluation, GeneratedActivity, GenerationCause, ProcedurePhase,
    MAX_PHASE_MINUTES,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

use super::prompt::OutputFormat;

/// Parses vendor output according to the format that was requested.
pub fn parse_activity(
    content: &str,
    format: OutputFormat,
    duration: u32,
) -> Result<GeneratedActivity, GenerationCause> {
    if content.trim().is_empty() {
        return Err(GenerationCause::EmptyResponse);
    }
    let activity = match format {
        OutputFormat::Json => parse_json_activity(content, duration)?,
        OutputFormat::LabeledText => parse_labeled_activity(content, duration)?,
    };
    activity
        .validate()
        .map_err(GenerationCause::InvalidStructure)?;
    Ok(activity)
}

/// Fills in phase times the vendor left out.
///
/// With no times at all the session is split by the phase ratios; otherwise the
/// minutes not yet assigned are shared evenly by the phases lacking a time.
pub fn fill_missing_times(times: &[Option<u32>], duration: u32) -> Vec<u32> {
    if times.iter().all(Option::is_none) {
        return split_duration(duration, times.len());
    }
    let known = times
        .iter()
        .flatten()
        .fold(0u32, |total, t| total.saturating_add(*t));
    let missing = times.iter().filter(|t| t.is_none()).count() as u32;
    if missing == 0 {
        return times.iter().flatten().copied().collect();
    }
    let remaining = duration.saturating_sub(known);
    let (base, mut extra) = (remaining / missing, remaining % missing);
    times
        .iter()
        .map(|t| {
            t.unwrap_or_else(|| {
                if extra > 0 {
                    extra -= 1;
                    base + 1
                } else {
                    base
                }
            })
        })
        .collect()
}

//=========================================================================================
// JSON Strategy
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "objective", alias = "smart_objective")]
    smart_objective: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    materials: Option<Vec<String>>,
    #[serde(default)]
    procedure: Option<Vec<PhasePayload>>,
    #[serde(default)]
    evaluation: Option<EvaluationPayload>,
    #[serde(default)]
    adaptations: Option<Vec<String>>,
    #[serde(default, alias = "theoretical_foundation")]
    theoretical_foundation: Option<String>,
}

#[derive(Deserialize)]
struct PhasePayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    time: Option<Value>,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct EvaluationPayload {
    #[serde(default)]
    criteria: String,
    #[serde(default)]
    methods: Vec<String>,
    #[serde(default)]
    feedback: String,
}

/// Drops Markdown code fences and any prose around the outermost object.
fn json_body(content: &str) -> &str {
    let trimmed = content.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn phase_minutes(index: usize, value: Option<&Value>) -> Result<Option<u32>, GenerationCause> {
    let minutes = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s
            .trim()
            .trim_end_matches(|c: char| c.is_alphabetic() || c.is_whitespace())
            .replace(',', ".")
            .parse::<f64>()
            .ok(),
        Some(_) => None,
    };
    match minutes {
        Some(m) if m.is_finite() && m >= 0.0 && m <= f64::from(MAX_PHASE_MINUTES) => {
            Ok(Some(m.round() as u32))
        }
        Some(m) if m.is_finite() && m >= 0.0 => Err(GenerationCause::InvalidStructure(format!(
            "procedure phase {} lasts longer than a day",
            index + 1
        ))),
        Some(_) => Err(GenerationCause::InvalidStructure(format!(
            "procedure phase {} has a negative time",
            index + 1
        ))),
        None => Err(GenerationCause::InvalidStructure(format!(
            "procedure phase {} has a non-numeric time",
            index + 1
        ))),
    }
}

pub fn parse_json_activity(
    content: &str,
    duration: u32,
) -> Result<GeneratedActivity, GenerationCause> {
    let value: Value = serde_json::from_str(json_body(content))
        .map_err(|e| GenerationCause::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(GenerationCause::Malformed(
            "expected a JSON object".to_string(),
        ));
    }
    let payload: ActivityPayload = serde_json::from_value(value)
        .map_err(|e| GenerationCause::InvalidStructure(e.to_string()))?;

    let materials = payload.materials.ok_or_else(|| {
        GenerationCause::InvalidStructure("materials must be a list".to_string())
    })?;
    let phases = payload.procedure.ok_or_else(|| {
        GenerationCause::InvalidStructure("procedure is missing".to_string())
    })?;

    let times = phases
        .iter()
        .enumerate()
        .map(|(i, p)| phase_minutes(i, p.time.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    let times = fill_missing_times(&times, duration);

    let procedure = phases
        .into_iter()
        .zip(times)
        .map(|(p, time)| ProcedurePhase {
            name: p.name.trim().to_string(),
            time,
            description: p.description.trim().to_string(),
        })
        .collect();

    let evaluation = payload
        .evaluation
        .map(|e| Evaluation {
            criteria: e.criteria,
            methods: e.methods,
            feedback: e.feedback,
        })
        .unwrap_or_default();

    Ok(GeneratedActivity {
        title: payload.title.unwrap_or_default().trim().to_string(),
        smart_objective: payload.smart_objective.unwrap_or_default().trim().to_string(),
        description: payload.description.unwrap_or_default(),
        materials,
        procedure,
        evaluation,
        adaptations: payload.adaptations.unwrap_or_default(),
        theoretical_foundation: payload.theoretical_foundation.unwrap_or_default(),
    })
}

//=========================================================================================
// Labeled Text Strategy
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Section {
    Title,
    Objective,
    Description,
    Materials,
    Procedure,
    Evaluation,
    Adaptations,
    Foundation,
}

/// Accepted labels per section, already accent-folded and upper-cased.
const SECTION_LABELS: &[(Section, &[&str])] = &[
    (Section::Title, &["TITLE", "ACTIVITY TITLE", "TITULO", "TITULO DE LA ACTIVIDAD"]),
    (
        Section::Objective,
        &["SMART OBJECTIVE", "OBJECTIVE", "OBJETIVO SMART", "OBJETIVO"],
    ),
    (
        Section::Description,
        &["DESCRIPTION", "GENERAL DESCRIPTION", "DESCRIPCION", "DESCRIPCION GENERAL"],
    ),
    (
        Section::Materials,
        &["MATERIALS", "MATERIALS NEEDED", "MATERIALES", "MATERIALES NECESARIOS"],
    ),
    (
        Section::Procedure,
        &[
            "PROCEDURE",
            "STEP-BY-STEP PROCEDURE",
            "STEP BY STEP PROCEDURE",
            "PROCEDIMIENTO",
            "PROCEDIMIENTO PASO A PASO",
        ],
    ),
    (
        Section::Evaluation,
        &["EVALUATION", "PROGRESS EVALUATION", "EVALUACION", "EVALUACION DEL PROGRESO"],
    ),
    (
        Section::Adaptations,
        &["ADAPTATIONS", "SUGGESTED ADAPTATIONS", "ADAPTACIONES", "ADAPTACIONES SUGERIDAS"],
    ),
    (
        Section::Foundation,
        &[
            "THEORETICAL FOUNDATION",
            "THEORETICAL BASIS",
            "FUNDAMENTACION TEORICA",
            "FUNDAMENTO TEORICO",
        ],
    ),
];

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•·–—+]\s*|\d{1,2}[.)]\s+)").expect("list marker pattern is valid")
});

static TIMED_PHASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<name>.+?)\s*\(\s*(?P<min>\d+(?:[.,]\d+)?)\s*(?:min(?:utos|utes|s)?\.?)?\s*\)\s*[:.\-–]?\s*(?P<rest>.*)$",
    )
    .expect("timed phase pattern is valid")
});

/// Upper-cases and strips Spanish accents so labels compare loosely.
fn fold(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' | 'Á' | 'À' | 'Ä' | 'Â' => 'A',
            'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => 'E',
            'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
            'ó' | 'ò' | 'ö' | 'ô' | 'Ó' | 'Ò' | 'Ö' | 'Ô' => 'O',
            'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
            'ñ' | 'Ñ' => 'N',
            other => other,
        })
        .collect::<String>()
        .to_uppercase()
}

/// Removes Markdown emphasis and heading marks.
fn clean_inline(line: &str) -> String {
    line.replace("**", "")
        .replace("__", "")
        .trim()
        .trim_start_matches('#')
        .trim()
        .to_string()
}

/// Removes a leading bullet or enumeration. Returns whether one was present.
fn strip_marker(line: &str) -> (bool, String) {
    match LIST_MARKER.find(line) {
        Some(m) => (true, line[m.end()..].trim().to_string()),
        None => (false, line.trim().to_string()),
    }
}

fn section_for(label: &str) -> Option<Section> {
    let folded = fold(label.trim().trim_end_matches(':').trim());
    SECTION_LABELS
        .iter()
        .find(|(_, labels)| labels.contains(&folded.as_str()))
        .map(|(section, _)| *section)
}

/// Recognises `LABEL:` or `LABEL: inline content` header lines.
fn header(line: &str) -> Option<(Section, String)> {
    let (_, cleaned) = strip_marker(&clean_inline(line));
    if cleaned.is_empty() {
        return None;
    }
    match cleaned.find(':') {
        Some(idx) => {
            section_for(&cleaned[..idx]).map(|s| (s, cleaned[idx + 1..].trim().to_string()))
        }
        None => section_for(&cleaned).map(|s| (s, String::new())),
    }
}

fn paragraph(lines: &[String]) -> String {
    lines
        .iter()
        .map(|l| clean_inline(l))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn list_items(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .map(|l| strip_marker(&clean_inline(l)).1)
        .filter(|l| !l.is_empty())
        .collect()
}

fn split_name(text: &str) -> (String, String) {
    match text.split_once(':') {
        Some((name, rest)) if !name.trim().is_empty() && name.len() <= 80 => {
            (name.trim().to_string(), rest.trim().to_string())
        }
        _ => (text.trim().to_string(), String::new()),
    }
}

fn append(target: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

/// Parses phases written as `Name (N min): description`. Phases without any
/// stated time are still accepted and receive their time later.
fn parse_procedure(lines: &[String]) -> Vec<(String, Option<u32>, String)> {
    let cleaned: Vec<(bool, String)> = lines
        .iter()
        .map(|l| strip_marker(&clean_inline(l)))
        .filter(|(_, l)| !l.is_empty())
        .collect();

    let timed = cleaned.iter().any(|(_, l)| TIMED_PHASE.is_match(l));
    let mut phases: Vec<(String, Option<u32>, String)> = Vec::new();

    for (bulleted, line) in cleaned {
        if timed {
            if let Some(caps) = TIMED_PHASE.captures(&line) {
                let minutes = caps["min"]
                    .replace(',', ".")
                    .parse::<f64>()
                    .map(|m| m.round() as u32)
                    .ok();
                let name = caps["name"].trim().trim_end_matches(':').trim().to_string();
                phases.push((name, minutes, caps["rest"].trim().to_string()));
            } else if let Some(phase) = phases.last_mut() {
                append(&mut phase.2, &line);
            }
            continue;
        }

        let starts_phase = bulleted || phases.is_empty() || line.contains(':');
        if starts_phase {
            let (name, description) = split_name(&line);
            phases.push((name, None, description));
        } else if let Some(phase) = phases.last_mut() {
            append(&mut phase.2, &line);
        }
    }
    phases
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EvaluationField {
    Criteria,
    Methods,
    Feedback,
}

fn evaluation_field(label: &str) -> Option<EvaluationField> {
    let folded = fold(label.trim());
    if folded.contains("CRITERI") {
        Some(EvaluationField::Criteria)
    } else if folded.contains("METOD") || folded.contains("METHOD") {
        Some(EvaluationField::Methods)
    } else if folded.contains("RETROALIMENTACION") || folded.contains("FEEDBACK") {
        Some(EvaluationField::Feedback)
    } else {
        None
    }
}

fn push_methods(methods: &mut Vec<String>, text: &str) {
    methods.extend(
        text.split([',', ';'])
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string),
    );
}

fn parse_evaluation(lines: &[String]) -> Evaluation {
    let mut evaluation = Evaluation::default();
    let mut unlabeled = String::new();
    let mut current: Option<EvaluationField> = None;

    for line in lines {
        let (_, text) = strip_marker(&clean_inline(line));
        if text.is_empty() {
            continue;
        }
        let labeled = text
            .split_once(':')
            .and_then(|(label, rest)| evaluation_field(label).map(|f| (f, rest.trim().to_string())));

        let (field, body) = match labeled {
            Some((field, rest)) => {
                current = Some(field);
                (Some(field), rest)
            }
            None => (current, text),
        };

        match field {
            Some(EvaluationField::Criteria) => append(&mut evaluation.criteria, &body),
            Some(EvaluationField::Feedback) => append(&mut evaluation.feedback, &body),
            Some(EvaluationField::Methods) => push_methods(&mut evaluation.methods, &body),
            None => append(&mut unlabeled, &body),
        }
    }

    if evaluation.criteria.is_empty() {
        evaluation.criteria = unlabeled;
    }
    evaluation
}

/// Splits free-form text into its labeled sections.
///
/// Labels may appear in English or Spanish, with Markdown decoration and in a
/// slightly different order. A label seen a second time is treated as content
/// of the current section.
pub fn parse_labeled_activity(
    content: &str,
    duration: u32,
) -> Result<GeneratedActivity, GenerationCause> {
    let mut sections: HashMap<Section, Vec<String>> = HashMap::new();
    let mut preamble: Vec<String> = Vec::new();
    let mut current: Option<Section> = None;

    for line in content.lines() {
        if let Some((section, inline)) = header(line) {
            // Inside the procedure a listed `Label: text` line is a phase.
            let listed_phase = current == Some(Section::Procedure)
                && !inline.is_empty()
                && strip_marker(&clean_inline(line)).0;
            if !listed_phase && !sections.contains_key(&section) {
                let body = sections.entry(section).or_default();
                if !inline.is_empty() {
                    body.push(inline);
                }
                current = Some(section);
                continue;
            }
        }
        match current {
            Some(section) => sections.entry(section).or_default().push(line.to_string()),
            None => preamble.push(line.to_string()),
        }
    }

    if sections.is_empty() {
        return Err(GenerationCause::Malformed(
            "no labeled sections found in vendor output".to_string(),
        ));
    }

    let take = |section: Section| sections.get(&section).cloned().unwrap_or_default();

    let title = sections
        .get(&Section::Title)
        .and_then(|lines| lines.iter().map(|l| clean_inline(l)).find(|l| !l.is_empty()))
        .or_else(|| preamble.iter().map(|l| clean_inline(l)).find(|l| !l.is_empty()))
        .unwrap_or_default();

    let materials = sections
        .get(&Section::Materials)
        .map(|lines| list_items(lines))
        .ok_or_else(|| {
            GenerationCause::InvalidStructure("materials section is missing".to_string())
        })?;

    let phases = parse_procedure(&take(Section::Procedure));
    let times: Vec<Option<u32>> = phases.iter().map(|p| p.1).collect();
    let procedure = phases
        .into_iter()
        .zip(fill_missing_times(&times, duration))
        .map(|((name, _, description), time)| ProcedurePhase {
            name,
            time,
            description,
        })
        .collect();

    Ok(GeneratedActivity {
        title,
        smart_objective: paragraph(&take(Section::Objective)),
        description: paragraph(&take(Section::Description)),
        materials,
        procedure,
        evaluation: parse_evaluation(&take(Section::Evaluation)),
        adaptations: list_items(&take(Section::Adaptations)),
        theoretical_foundation: paragraph(&take(Section::Foundation)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_missing_times_uses_ratios_when_nothing_is_known() {
        assert_eq!(fill_missing_times(&[None, None, None], 45), vec![7, 29, 9]);
    }

    #[test]
    fn fill_missing_times_shares_the_remainder() {
        assert_eq!(fill_missing_times(&[Some(10), None, None], 45), vec![10, 18, 17]);
        assert_eq!(fill_missing_times(&[Some(50), None], 45), vec![50, 0]);
        assert_eq!(fill_missing_times(&[Some(5), Some(6)], 45), vec![5, 6]);
    }

    #[test]
    fn json_is_extracted_from_code_fences() {
        let content = "```json\n{\"title\":\"T\",\"smartObjective\":\"O\",\"materials\":[],\"procedure\":[{\"name\":\"P\",\"time\":\"12 min\",\"description\":\"d\"}]}\n```";
        let activity = parse_activity(content, OutputFormat::Json, 12).unwrap();
        assert_eq!(activity.title, "T");
        assert_eq!(activity.procedure[0].time, 12);
    }

    #[test]
    fn negative_phase_time_is_rejected() {
        let content = r#"{"title":"T","smartObjective":"O","materials":[],"procedure":[{"name":"P","time":-3}]}"#;
        let err = parse_activity(content, OutputFormat::Json, 30).unwrap_err();
        assert!(matches!(err, GenerationCause::InvalidStructure(_)));
    }

    #[test]
    fn oversized_phase_time_is_rejected_without_overflow() {
        let content = r#"{"title":"T","smartObjective":"O","materials":[],"procedure":[
            {"name":"A","time":4000000000},{"name":"B","time":4000000000},{"name":"C"}]}"#;
        let err = parse_activity(content, OutputFormat::Json, 45).unwrap_err();
        assert!(matches!(err, GenerationCause::InvalidStructure(_)));

        let text = "TITLE: T\nOBJECTIVE: O\nMATERIALS:\n- Cards\nPROCEDURE:\n\
                    1. A (4000000000 min): x\n2. B (4000000000 min): y\n3. C (5 min): z";
        let err = parse_activity(text, OutputFormat::LabeledText, 45).unwrap_err();
        assert!(matches!(err, GenerationCause::InvalidStructure(_)));
    }

    #[test]
    fn fill_missing_times_saturates_known_minutes() {
        assert_eq!(fill_missing_times(&[Some(u32::MAX), Some(1), None], 45), vec![u32::MAX, 1, 0]);
    }

    #[test]
    fn listed_phase_named_like_a_section_stays_in_the_procedure() {
        let text = "TITLE: Repaso\nOBJECTIVE: O\nMATERIALS:\n- Cards\nPROCEDURE:\n\
                    - Inicio: saludo\n- Evaluación: repaso final\nEVALUATION:\nCriterios: 80%";
        let activity = parse_activity(text, OutputFormat::LabeledText, 20).unwrap();
        let names: Vec<&str> = activity.procedure.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Inicio", "Evaluación"]);
        assert_eq!(activity.procedure[1].description, "repaso final");
        assert_eq!(activity.evaluation.criteria, "80%");
    }

    #[test]
    fn labels_fold_accents_and_case() {
        assert_eq!(section_for("Fundamentación Teórica"), Some(Section::Foundation));
        assert_eq!(section_for("**OBJETIVO SMART**"), None);
        assert_eq!(header("**OBJETIVO SMART:** lograr"), Some((Section::Objective, "lograr".to_string())));
        assert_eq!(header("## Materiales"), Some((Section::Materials, String::new())));
        assert_eq!(header("Objetivo específico: algo"), None);
    }

    #[test]
    fn timed_phase_headers_are_parsed() {
        let lines: Vec<String> = [
            "1. Calentamiento (10 min): praxias linguales",
            "   con espejo",
            "2. Desarrollo (25 minutos) - juego de tarjetas",
            "3. Cierre (7.5 min): refuerzo",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let phases = parse_procedure(&lines);
        assert_eq!(phases.len(), 3);
        assert_eq!(phases[0], ("Calentamiento".to_string(), Some(10), "praxias linguales con espejo".to_string()));
        assert_eq!(phases[1].1, Some(25));
        assert_eq!(phases[1].2, "juego de tarjetas");
        assert_eq!(phases[2].1, Some(8));
    }
}

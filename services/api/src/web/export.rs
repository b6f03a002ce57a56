//! services/api/src/web/export.rs
//!
//! Plain-text rendering of a stored activity for download.

use activity_planner_core::StoredActivity;
use regex::Regex;
use std::fmt::Write;
use std::sync::LazyLock;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\s]").expect("unsafe chars pattern is valid"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Download name derived from the activity title.
pub fn export_filename(title: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(title.trim(), "");
    let name = WHITESPACE.replace_all(cleaned.trim(), "_");
    if name.is_empty() {
        "actividad.txt".to_string()
    } else {
        format!("{}.txt", name)
    }
}

fn bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("• {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders the activity the way clinicians print it.
pub fn render_activity_text(stored: &StoredActivity) -> String {
    let activity = &stored.generated_activity;
    let mut out = String::new();

    // `write!` into a String cannot fail.
    let _ = writeln!(out, "GENERADOR DE ACTIVIDADES FONOAUDIOLÓGICAS");
    let _ = writeln!(out, "========================================\n");
    let _ = writeln!(out, "{}\n", activity.title);
    let _ = writeln!(out, "OBJETIVO SMART:\n{}\n", activity.smart_objective);
    let _ = writeln!(out, "DESCRIPCIÓN GENERAL:\n{}\n", activity.description);
    let _ = writeln!(out, "MATERIALES NECESARIOS:\n{}\n", bullets(&activity.materials));

    let phases = activity
        .procedure
        .iter()
        .map(|p| format!("{} ({} min): {}", p.name, p.time, p.description))
        .collect::<Vec<_>>()
        .join("\n\n");
    let _ = writeln!(out, "PROCEDIMIENTO PASO A PASO:\n{}\n", phases);

    let _ = writeln!(out, "EVALUACIÓN DEL PROGRESO:");
    let _ = writeln!(out, "Criterios de éxito: {}", activity.evaluation.criteria);
    let _ = writeln!(
        out,
        "Métodos de evaluación: {}",
        activity.evaluation.methods.join(", ")
    );
    let _ = writeln!(out, "Retroalimentación: {}\n", activity.evaluation.feedback);

    let _ = writeln!(out, "ADAPTACIONES SUGERIDAS:\n{}\n", bullets(&activity.adaptations));
    let _ = writeln!(
        out,
        "FUNDAMENTACIÓN TEÓRICA:\n{}\n",
        activity.theoretical_foundation
    );

    let _ = writeln!(
        out,
        "Fecha de generación: {}",
        stored.created_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = write!(out, "Proveedor: {}", stored.provider.display_name());
    out
}

//! Plain-text rendering of controller state.

use review_client::{
    diagnosis::{CurrentDiagnosis, DiagnosisWorkflow, SubResource},
    PatientView, QueryController, SummaryListState,
};
use shared::protocol::{Patient, Summary};

pub fn summary_line(summary: &Summary, active_tag: Option<&str>) -> String {
    let keywords: Vec<String> = summary
        .keywords
        .iter()
        .map(|keyword| {
            if Some(keyword.as_str()) == active_tag {
                format!("[{keyword}]")
            } else {
                keyword.clone()
            }
        })
        .collect();
    format!(
        "{}  {}  {}  {}",
        summary.id,
        summary.created_date(),
        summary.file_name,
        keywords.join(", ")
    )
}

pub fn list(controller: &QueryController, state: &SummaryListState) -> String {
    let query = controller.state();
    let mut out = String::new();

    let filter = match query.filter() {
        Some(filter) => format!("{} = \"{}\"", filter.field.label(), filter.term),
        None => "no filter".to_string(),
    };
    out.push_str(&format!("-- {filter}"));
    if let Some(tag) = query.active_tag() {
        out.push_str(&format!(" (tag: {tag})"));
    }
    out.push('\n');

    if let Some(err) = state.last_failure() {
        out.push_str(&format!("!! last fetch failed: {err}\n"));
    }
    if state.is_loading() && state.items().is_empty() {
        out.push_str("loading...\n");
        return out;
    }
    if state.is_empty_result() {
        out.push_str("No summaries found.\n");
        return out;
    }

    for summary in state.items() {
        out.push_str(&summary_line(summary, query.active_tag()));
        out.push('\n');
    }
    if controller.pagination_visible() {
        let range = controller
            .visible_range()
            .map(|(start, end)| format!("{start}-{end} of {}", state.total()))
            .unwrap_or_default();
        out.push_str(&format!(
            "page {} of {}  {range}\n",
            query.page(),
            query.total_pages()
        ));
    }
    out
}

pub fn document(workflow: &DiagnosisWorkflow) -> String {
    let mut out = String::new();
    let Some(summary) = workflow.summary() else {
        let reason = workflow
            .summary_error()
            .map(ToString::to_string)
            .unwrap_or_else(|| "not loaded".into());
        return format!("Summary unavailable: {reason}\n");
    };

    out.push_str(&summary.export_text());
    out.push_str("\n\nDiagnosis:\n");
    match workflow.current() {
        CurrentDiagnosis::None => out.push_str("  (none yet)\n"),
        CurrentDiagnosis::Stored(version) => {
            out.push_str(&format!("  {}\n", version.result));
        }
        CurrentDiagnosis::Failed(message) => out.push_str(&format!("  {message}\n")),
    }

    if workflow.history().len() > 1 {
        out.push_str("\nHistory (newest first):\n");
        for version in workflow.history() {
            out.push_str(&format!(
                "  {}  {}\n",
                version.created_at.format("%Y-%m-%d %H:%M"),
                version.result
            ));
        }
    }

    if let Some(feedback) = workflow.existing_feedback() {
        let verdict = if feedback.helpful { "helpful" } else { "not helpful" };
        out.push_str(&format!("\nFeedback: {verdict}"));
        if let Some(comment) = feedback.comment.as_deref().filter(|c| !c.is_empty()) {
            out.push_str(&format!(" ({comment})"));
        }
        out.push('\n');
    }

    for resource in workflow.degraded() {
        let name = match resource {
            SubResource::Diagnosis => "current diagnosis",
            SubResource::Feedback => "feedback",
            SubResource::History => "diagnosis history",
        };
        out.push_str(&format!("!! {name} could not be loaded\n"));
    }
    out
}

pub fn patient_line(patient: &Patient) -> String {
    let mut line = format!("{}  {}", patient.id, patient.name);
    if let Some(age) = patient.age {
        line.push_str(&format!("  age {age}"));
    }
    if let Some(gender) = &patient.gender {
        line.push_str(&format!("  {gender}"));
    }
    line
}

pub fn patient(view: &PatientView) -> String {
    let mut out = patient_line(&view.patient);
    if let Some(contact) = &view.patient.contact {
        out.push_str(&format!("\ncontact: {contact}"));
    }
    out.push_str(&format!("\n\nDocuments ({}):\n", view.summaries.total));
    if let Some(err) = &view.summaries_error {
        out.push_str(&format!("!! documents could not be loaded: {err}\n"));
    }
    for summary in &view.summaries.summaries {
        out.push_str(&summary_line(summary, None));
        out.push('\n');
    }
    out
}

//! Prompt builders for every generation stage.
//!
//! Prompts that expect machine-readable output spell out the JSON shape and
//! forbid surrounding prose; [`strip_code_fences`] removes the markdown
//! fencing some models add anyway.

use cbp_core::{Designation, Document, OrgType, RoleMapping};

/// Remove a surrounding ```json ... ``` (or plain ```) fence, if present.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

fn org_label(org_type: OrgType) -> &'static str {
    match org_type {
        OrgType::Ministry => "central ministry",
        OrgType::State => "state government organization",
    }
}

fn scope_description(
    org_type: OrgType,
    state_center_name: &str,
    department_name: Option<&str>,
) -> String {
    match department_name {
        Some(dept) => format!(
            "the {dept} department of the {} \"{state_center_name}\"",
            org_label(org_type)
        ),
        None => format!("the {} \"{state_center_name}\"", org_label(org_type)),
    }
}

fn summaries_context(summaries: &[Document]) -> String {
    if summaries.is_empty() {
        return String::new();
    }
    let mut out = String::from(
        "\n\nUse the following summaries of official documents as authoritative context:\n",
    );
    for doc in summaries {
        if let Some(text) = doc.summary_text.as_deref() {
            out.push_str(&format!("\n--- {} ---\n{}\n", doc.filename, text));
        }
    }
    out
}

/// Pass 1: designation extraction.
pub fn designation_extraction(
    org_type: OrgType,
    state_center_name: &str,
    department_name: Option<&str>,
    instruction: Option<&str>,
    summaries: &[Document],
) -> String {
    let scope = scope_description(org_type, state_center_name, department_name);
    let instruction_block = instruction
        .map(|i| format!("\n\nAdditional instruction from the requester: {i}"))
        .unwrap_or_default();
    format!(
        "List every officer designation in {scope}, ordered from the most senior \
         position to the most junior. Cover the full administrative hierarchy, \
         including supervisory and field-level positions.\
         {}{instruction_block}\n\n\
         Respond with JSON only, exactly this shape and nothing else:\n\
         {{\"designations\": [{{\"sort_order\": 1, \"designation\": \"<name>\"}}]}}\n\
         sort_order starts at 1 for the most senior designation.",
        summaries_context(summaries)
    )
}

/// Pass 2: FRAC generation for one batch of designations.
pub fn frac_batch(
    org_type: OrgType,
    state_center_name: &str,
    department_name: Option<&str>,
    batch: &[Designation],
    taxonomy_json: &str,
    summaries: &[Document],
) -> String {
    let scope = scope_description(org_type, state_center_name, department_name);
    let designation_list = batch
        .iter()
        .map(|d| format!("{}. {}", d.sort_order, d.designation))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "For each designation below from {scope}, produce its Function, Role, \
         Activity and Competency mapping.\n\nDesignations:\n{designation_list}\n\n\
         Competency rules: behavioral and functional competencies must be chosen \
         verbatim from this taxonomy (theme and sub_theme exactly as written); \
         domain competencies may be synthesized from the organizational context. \
         Give at least 4 behavioral, 4 functional and 6 domain competencies per \
         designation.\n\nTaxonomy:\n{taxonomy_json}\
         {}\n\n\
         Respond with a JSON array only. Each element:\n\
         {{\"designation_name\": \"...\", \"wing_division_section\": \"...\", \
         \"role_responsibilities\": [\"...\"], \"activities\": [\"...\"], \
         \"sort_order\": <number from the list above>, \
         \"competencies\": [{{\"type\": \"Behavioral|Functional|Domain\", \
         \"theme\": \"...\", \"sub_theme\": \"...\", \"source\": \"...\"}}], \
         \"source\": [\"...\"]}}",
        summaries_context(summaries)
    )
}

/// Single-document summarization; the document itself rides along as an
/// attachment.
pub fn document_summary(filename: &str) -> String {
    format!(
        "Summarize the attached document \"{filename}\" for use as planning \
         context. Capture the organization's mandate, functions, schemes, \
         reporting structure and any role or competency information. Write a \
         thorough narrative summary in plain prose, without markdown headings."
    )
}

/// Fan-in narrative over several completed document summaries.
pub fn meta_summary(summaries: &[Document]) -> String {
    let mut sections = String::new();
    for doc in summaries {
        if let Some(text) = doc.summary_text.as_deref() {
            sections.push_str(&format!("\n--- {} ---\n{}\n", doc.filename, text));
        }
    }
    format!(
        "The following are summaries of official documents belonging to one \
         organization. Combine them into a single coherent narrative covering \
         the organization's mandate, structure, functions and schemes. Resolve \
         overlaps, keep all substantive detail, and write plain prose.\n{sections}"
    )
}

fn role_profile(mapping: &RoleMapping) -> String {
    format!(
        "Designation: {}\nOrganization: {}{}\nResponsibilities:\n{}\nActivities:\n{}\nCompetencies: {}",
        mapping.designation_name,
        mapping.state_center_name,
        mapping
            .department_name
            .as_deref()
            .map(|d| format!(" / {d}"))
            .unwrap_or_default(),
        mapping
            .role_responsibilities
            .iter()
            .map(|r| format!("- {r}"))
            .collect::<Vec<_>>()
            .join("\n"),
        mapping
            .activities
            .iter()
            .map(|a| format!("- {a}"))
            .collect::<Vec<_>>()
            .join("\n"),
        mapping.competencies
    )
}

/// System text for search-query generation.
pub fn vector_query_system() -> &'static str {
    "You are an expert vector query generator. Your task is to generate a \
     query based on the provided data that helps to fetch relevant courses \
     from the vector database."
}

/// Search-query generation for the course catalog.
pub fn vector_query(mapping: &RoleMapping) -> String {
    format!(
        "Given this officer's role profile, write one dense search query (a \
         single sentence, no quotes, no preamble) describing the skills and \
         topics of training courses that would benefit them most.\n\n{}",
        role_profile(mapping)
    )
}

/// System text for catalog ranking.
pub fn course_ranking_system() -> &'static str {
    "You are an expert in analyzing professional development needs and \
     recommending relevant training. Your task is to assess the relevancy \
     of courses to a specific role within a government administration \
     context."
}

/// Rank catalog candidates against the role profile.
pub fn course_ranking(mapping: &RoleMapping, candidates_json: &str) -> String {
    format!(
        "You are matching training courses to an officer's role.\n\n\
         Role profile:\n{}\n\nCandidate courses (from the internal catalog):\n{candidates_json}\n\n\
         Select and rank the courses most relevant to this role. Respond with a \
         JSON array only. Each element:\n\
         {{\"identifier\": \"<identifier from the candidate list>\", \
         \"course\": \"<course name>\", \"relevancy\": <0-100>, \
         \"rationale\": \"<one sentence>\"}}\n\
         Omit candidates that are not relevant.",
        role_profile(mapping)
    )
}

/// System text for public-web discovery.
pub fn public_discovery_system() -> &'static str {
    "You are an expert in civil service training and development. Recommend \
     only active, publicly accessible courses that exist on credible \
     learning platforms; never invent course names or links."
}

/// Discover publicly available courses on the open web.
pub fn public_discovery(mapping: &RoleMapping) -> String {
    format!(
        "Find publicly available online training courses (government platforms, \
         MOOCs, reputable providers) relevant to this officer's role.\n\n{}\n\n\
         Respond with a JSON array only. Each element:\n\
         {{\"course\": \"<name>\", \"relevancy\": <0-100>, \
         \"rationale\": \"<one sentence>\", \"platform\": \"<provider>\", \
         \"public_link\": \"<url>\", \"language\": \"<language>\"}}",
        role_profile(mapping)
    )
}

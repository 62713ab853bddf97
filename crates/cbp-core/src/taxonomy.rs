//! Fixed competency taxonomy dataset.
//!
//! Behavioral and functional competencies in generated FRAC mappings must be
//! selected verbatim from this dataset (no invention by the model). The
//! dataset is loaded once at startup from a JSON file and rendered into the
//! Pass-2 prompt.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One taxonomy theme with its allowed sub-themes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyTheme {
    pub theme: String,
    pub sub_themes: Vec<String>,
}

/// The full taxonomy: allowed themes per competency area.
///
/// Keys are competency areas ("Behavioral", "Functional"); domain
/// competencies are synthesized from context and carry no fixed list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetencyTaxonomy {
    #[serde(flatten)]
    pub areas: BTreeMap<String, Vec<TaxonomyTheme>>,
}

impl CompetencyTaxonomy {
    /// Parse the taxonomy from a JSON string.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let taxonomy: CompetencyTaxonomy = serde_json::from_str(raw)?;
        if taxonomy.areas.is_empty() {
            return Err(Error::Config(
                "competency taxonomy dataset is empty".to_string(),
            ));
        }
        Ok(taxonomy)
    }

    /// Load the taxonomy from a file path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read taxonomy dataset {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&raw)
    }

    /// Render the dataset as pretty JSON for prompt embedding.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.areas).unwrap_or_else(|_| "{}".to_string())
    }

    /// Total number of themes across all areas.
    pub fn theme_count(&self) -> usize {
        self.areas.values().map(|themes| themes.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Behavioral": [
            {"theme": "Leadership", "sub_themes": ["Leading Others", "Vision Setting"]},
            {"theme": "Communication", "sub_themes": ["Written Communication"]}
        ],
        "Functional": [
            {"theme": "Financial Management", "sub_themes": ["Budgeting", "Audit"]}
        ]
    }"#;

    #[test]
    fn test_parse_sample_taxonomy() {
        let taxonomy = CompetencyTaxonomy::from_json_str(SAMPLE).unwrap();
        assert_eq!(taxonomy.areas.len(), 2);
        assert_eq!(taxonomy.theme_count(), 3);
        assert_eq!(taxonomy.areas["Behavioral"][0].theme, "Leadership");
    }

    #[test]
    fn test_empty_taxonomy_rejected() {
        let err = CompetencyTaxonomy::from_json_str("{}").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_prompt_json_round_trips() {
        let taxonomy = CompetencyTaxonomy::from_json_str(SAMPLE).unwrap();
        let rendered = taxonomy.to_prompt_json();
        let back = CompetencyTaxonomy::from_json_str(&rendered).unwrap();
        assert_eq!(back.theme_count(), taxonomy.theme_count());
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = CompetencyTaxonomy::load("/nonexistent/competencies.json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}

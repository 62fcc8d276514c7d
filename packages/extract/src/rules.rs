//! Extraction rule table.
//!
//! Contractor names and field labels are data, not code: a [`RuleSet`] is
//! compiled from a TOML document so new contractors or label variants can
//! be added without touching the extractor. The default table in
//! `rules/default.toml` is baked into the binary via [`include_str!`].

use std::collections::BTreeSet;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use task_orders_models::Field;

/// The built-in rule table.
pub const DEFAULT_RULES: &str = include_str!("../rules/default.toml");

/// Errors raised while loading or compiling a rule table.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// The rules file could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Rules file path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML document is malformed.
    #[error("Invalid rules TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// A pattern failed to compile.
    #[error("Invalid regex pattern '{pattern}': {source}")]
    Regex {
        /// Offending pattern.
        pattern: String,
        /// Compiler error.
        source: regex::Error,
    },

    /// A field pattern has no capture group for the value token.
    #[error("Pattern for {field} has no capture group: {pattern}")]
    MissingCaptureGroup {
        /// Field the rule is for.
        field: Field,
        /// Offending pattern.
        pattern: String,
    },

    /// The same field has more than one rule.
    #[error("Duplicate rule for {0}")]
    DuplicateField(Field),

    /// A labeled rule targets the contractor field.
    #[error("Contractor is resolved from [[contractors]], not [[fields]]")]
    ContractorField,
}

/// Serialized form of a rule table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleDefinitions {
    /// Contractor rules, in precedence order.
    #[serde(default)]
    pub contractors: Vec<ContractorDefinition>,
    /// Labeled field rules.
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// One known contractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractorDefinition {
    /// Canonical name stored when the pattern matches. When omitted, the
    /// matched text is stored instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Pattern matched anywhere in the text.
    pub pattern: String,
}

/// One labeled field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Schema field the value is stored under.
    pub field: Field,
    /// Label pattern; capture group 1 is the value token.
    pub pattern: String,
}

/// A compiled contractor rule.
#[derive(Debug, Clone)]
pub struct ContractorRule {
    name: Option<String>,
    regex: Regex,
}

impl ContractorRule {
    /// Returns the contractor name if the rule matches `text`.
    #[must_use]
    pub fn resolve(&self, text: &str) -> Option<String> {
        let caps = self.regex.captures(text)?;
        if let Some(name) = &self.name {
            return Some(name.clone());
        }
        let matched = caps.get(1).or_else(|| caps.get(0))?;
        Some(matched.as_str().trim().to_owned())
    }
}

/// A compiled field rule.
#[derive(Debug, Clone)]
pub struct FieldRule {
    field: Field,
    regex: Regex,
}

impl FieldRule {
    /// Field this rule extracts.
    #[must_use]
    pub const fn field(&self) -> Field {
        self.field
    }

    /// Raw value token of the first match in `text`.
    #[must_use]
    pub fn find<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
    }
}

/// A compiled, validated rule table.
#[derive(Debug, Clone)]
pub struct RuleSet {
    contractors: Vec<ContractorRule>,
    fields: Vec<FieldRule>,
}

impl RuleSet {
    /// Parses and compiles a TOML rule table.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] if the TOML is malformed or any rule is
    /// invalid.
    pub fn parse(toml_str: &str) -> Result<Self, RuleError> {
        let definitions: RuleDefinitions = toml::from_str(toml_str)?;
        Self::compile(&definitions)
    }

    /// Reads and compiles a TOML rule table from disk.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let contents = std::fs::read_to_string(path).map_err(|e| RuleError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let rules = Self::parse(&contents)?;
        log::info!(
            "Loaded {} contractor and {} field rules from {}",
            rules.contractors.len(),
            rules.fields.len(),
            path.display()
        );
        Ok(rules)
    }

    /// Compiles rule definitions. Every pattern is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] if a pattern fails to compile, a field pattern
    /// lacks a capture group, a field is listed twice, or a field rule
    /// targets the contractor.
    pub fn compile(definitions: &RuleDefinitions) -> Result<Self, RuleError> {
        let contractors = definitions
            .contractors
            .iter()
            .map(|def| {
                Ok(ContractorRule {
                    name: def.name.clone(),
                    regex: build_regex(&def.pattern)?,
                })
            })
            .collect::<Result<Vec<_>, RuleError>>()?;

        let mut seen = BTreeSet::new();
        let mut fields = Vec::with_capacity(definitions.fields.len());

        for def in &definitions.fields {
            if def.field == Field::Contractor {
                return Err(RuleError::ContractorField);
            }
            if !seen.insert(def.field) {
                return Err(RuleError::DuplicateField(def.field));
            }
            let regex = build_regex(&def.pattern)?;
            if regex.captures_len() < 2 {
                return Err(RuleError::MissingCaptureGroup {
                    field: def.field,
                    pattern: def.pattern.clone(),
                });
            }
            fields.push(FieldRule {
                field: def.field,
                regex,
            });
        }

        Ok(Self {
            contractors,
            fields,
        })
    }

    /// The built-in rule table.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `rules/default.toml` is invalid (covered by
    /// this crate's tests).
    #[must_use]
    pub fn default_rules() -> Self {
        Self::parse(DEFAULT_RULES)
            .unwrap_or_else(|e| panic!("Failed to compile rules/default.toml: {e}"))
    }

    /// Contractor rules, in precedence order.
    #[must_use]
    pub fn contractors(&self) -> &[ContractorRule] {
        &self.contractors
    }

    /// Field rules, in table order.
    #[must_use]
    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    /// Converts the compiled table back to its serializable form.
    #[must_use]
    pub fn to_definitions(&self) -> RuleDefinitions {
        RuleDefinitions {
            contractors: self
                .contractors
                .iter()
                .map(|rule| ContractorDefinition {
                    name: rule.name.clone(),
                    pattern: rule.regex.as_str().to_owned(),
                })
                .collect(),
            fields: self
                .fields
                .iter()
                .map(|rule| FieldDefinition {
                    field: rule.field,
                    pattern: rule.regex.as_str().to_owned(),
                })
                .collect(),
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::default_rules()
    }
}

fn build_regex(pattern: &str) -> Result<Regex, RuleError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| RuleError::Regex {
            pattern: pattern.to_owned(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_compile() {
        let rules = RuleSet::default_rules();
        assert_eq!(rules.contractors().len(), 3);
        assert_eq!(rules.fields().len(), Field::ALL.len() - 1);
    }

    #[test]
    fn default_rules_cover_every_labeled_field() {
        let rules = RuleSet::default_rules();
        let covered: BTreeSet<Field> = rules.fields().iter().map(FieldRule::field).collect();
        for field in Field::ALL.iter().filter(|f| **f != Field::Contractor) {
            assert!(covered.contains(field), "no rule for {field}");
        }
    }

    #[test]
    fn rejects_invalid_regex() {
        let toml = r#"
            [[fields]]
            field = "feeder_id"
            pattern = 'Feeder ID: ((\d+'
        "#;
        assert!(matches!(RuleSet::parse(toml), Err(RuleError::Regex { .. })));
    }

    #[test]
    fn rejects_pattern_without_capture_group() {
        let toml = r#"
            [[fields]]
            field = "feeder_id"
            pattern = 'Feeder ID:\s*\d{4}-\d{2}'
        "#;
        assert!(matches!(
            RuleSet::parse(toml),
            Err(RuleError::MissingCaptureGroup {
                field: Field::FeederId,
                ..
            })
        ));
    }

    #[test]
    fn rejects_duplicate_field() {
        let toml = r#"
            [[fields]]
            field = "feeder_id"
            pattern = '(\d{4}-\d{2})'

            [[fields]]
            field = "feeder_id"
            pattern = 'Feeder:\s*(\d{4}-\d{2})'
        "#;
        assert!(matches!(
            RuleSet::parse(toml),
            Err(RuleError::DuplicateField(Field::FeederId))
        ));
    }

    #[test]
    fn rejects_contractor_field_rule() {
        let toml = r#"
            [[fields]]
            field = "contractor"
            pattern = 'Contractor:\s*(.+)'
        "#;
        assert!(matches!(
            RuleSet::parse(toml),
            Err(RuleError::ContractorField)
        ));
    }

    #[test]
    fn rejects_unknown_field_name() {
        let toml = r#"
            [[fields]]
            field = "crew_size"
            pattern = 'Crew:\s*(\d+)'
        "#;
        assert!(matches!(RuleSet::parse(toml), Err(RuleError::Toml(_))));
    }

    #[test]
    fn contractor_rule_without_name_keeps_matched_text() {
        let toml = r#"
            [[contractors]]
            pattern = 'Acme Line Works'
        "#;
        let rules = RuleSet::parse(toml).unwrap();
        assert_eq!(
            rules.contractors()[0].resolve("issued to ACME LINE WORKS today"),
            Some("ACME LINE WORKS".to_owned())
        );
    }

    #[test]
    fn definitions_survive_a_toml_round_trip() {
        let rules = RuleSet::default_rules();
        let rendered = toml::to_string(&rules.to_definitions()).unwrap();
        let reparsed = RuleSet::parse(&rendered).unwrap();
        assert_eq!(reparsed.fields().len(), rules.fields().len());
        assert_eq!(reparsed.contractors().len(), rules.contractors().len());
    }
}

//! Prompt rendering for synthesis and repair
//!
//! Both builders are pure string rendering. The synthesis prompt spells out
//! the transformation contract the backend has to follow; the repair prompt
//! adds guidance chosen by the diagnosis category.

use super::classifier::{ErrorCategory, ErrorDiagnosis};
use super::normalizer::{FALLBACK_DESTINATION, canonical_prefix};
use super::schema::TransformationRequest;
use sql_patterns::statement::creation_target;

const SYNTHESIS_TEMPLATE: &str = r#"You are an expert BigQuery SQL engineer. Write one GoogleSQL statement that loads the destination table from the source table, matching the destination schema exactly.

Source table: `{source}`
Destination table: `{destination}`
Destination schema (fields in order):
{schema}

Follow every rule below:

1. Output a single statement that starts with `{prefix}` and selects from `{source}`. Output nothing else: no prose, no markdown fences, no second statement.
2. Project every field of the destination schema, in schema order, and nothing else. If a field does not exist in the source table, project NULL (or a typed empty value) for it instead of failing.
3. Convert mismatched types explicitly with CAST. Defaults for NULL values must match the destination type: IFNULL(text_col, ""), IFNULL(array_col, []), IFNULL(number_col, 0).
4. Build RECORD and REPEATED destination fields explicitly from the available source data with STRUCT(...), ARRAY(...), [ ... ] or SPLIT(...). For example: [STRUCT(IFNULL(uri, "") AS uri, 800 AS height, 500 AS width)].
5. Add a WHERE clause only when the mapping cannot be expressed without one. Do not filter by default.
6. Quote table references with backticks. Never put backticks around a dotted field path: write source.priceInfo.cost, not `source.priceInfo.cost`. Always leave a space between a keyword and a backticked identifier: TABLE `a.b.c` AS, not TABLE`a.b.c`AS.

End the statement with a single semicolon."#;

const MISSING_FIELD_TEMPLATE: &str = r#"The field '{field}' does not exist in the source. Fix it this way:

1. Replace any construct that reads or iterates '{field}' (UNNEST, ARRAY subqueries, dotted access) with a static default of the destination type, for example ARRAY(SELECT CAST('Default' AS STRING)) for an array.
2. If '{field}' is part of a STRUCT, keep the field name in the output and give it the default value.
3. Sibling fields in the same STRUCT may be missing too. Wrap them with IFNULL and guard their UNNEST calls: UNNEST(IFNULL(colors, ['Default'])).

Example for a missing colorFamilies field:

-- before
STRUCT(
    ARRAY(SELECT CAST(colorFamily AS STRING) FROM UNNEST(colorFamilies) AS colorFamily) AS colorFamilies,
    ARRAY(SELECT CAST(color AS STRING) FROM UNNEST(colors) AS color) AS colors
) AS colorInfo

-- after
STRUCT(
    ARRAY(SELECT CAST('Default Color' AS STRING)) AS colorFamilies,
    ARRAY(SELECT CAST(IFNULL(color, 'Unknown') AS STRING) FROM UNNEST(IFNULL(colors, ['Default'])) AS color) AS colors
) AS colorInfo"#;

const CHECKLIST: &str = "Work through this checklist:
1. Every referenced column exists in the source table.
2. Every segment of a nested path such as attribute.value.text exists.
3. UNNEST and ARRAY subqueries do not iterate a collection that may be absent; use NULL or a typed default instead.
4. Backticks, parentheses and brackets are balanced, and table names are backticked.
5. No comma is missing or left over in the SELECT list.";

const REPAIR_CLOSING: &str = "\n\nReturn only the corrected script, starting with `{prefix}`. \
                              No explanations, no markdown fences.";

/// Renders the first synthesis request
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, request: &TransformationRequest) -> String {
        SYNTHESIS_TEMPLATE
            .replace("{schema}", &request.destination_schema.to_pretty_json())
            .replace("{prefix}", &canonical_prefix(&request.destination_ref))
            .replace("{source}", &request.source_ref)
            .replace("{destination}", &request.destination_ref)
    }
}

/// Renders a repair request for one failed script
#[derive(Debug, Clone, Copy, Default)]
pub struct RepairPromptBuilder;

impl RepairPromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Destination named by the script's creation statement, or a placeholder
    pub fn recover_destination(script: &str) -> String {
        creation_target(script).unwrap_or_else(|| FALLBACK_DESTINATION.to_string())
    }

    pub fn build(&self, script: &str, diagnostic_text: &str, diagnosis: &ErrorDiagnosis) -> String {
        let destination = Self::recover_destination(script);
        let mut prompt = String::from(
            "You are an expert BigQuery SQL engineer. The script below failed. Fix it.\n\n",
        );
        prompt.push_str(&format!("ERROR MESSAGE:\n{}\n\n", diagnostic_text.trim()));
        prompt.push_str(&format!("ORIGINAL SCRIPT:\n{}\n\n", script.trim()));

        let details = &diagnosis.details;
        if let Some(location) = &details.location {
            prompt.push_str(&format!("The error is reported at line:column {}.\n", location));
        }
        if let Some(name) = &details.unrecognized_name {
            prompt.push_str(&format!("The name `{}` is not recognized in the source.\n", name));
        }
        if let Some(name) = &details.invalid_field {
            prompt.push_str(&format!("\"{}\" is not a valid field name.\n", name));
        }
        if !details.is_empty() {
            prompt.push('\n');
        }

        match (diagnosis.category, diagnosis.offending_field.as_deref()) {
            (ErrorCategory::MissingFieldReference, Some(field)) => {
                prompt.push_str(&MISSING_FIELD_TEMPLATE.replace("{field}", field));
            }
            _ => prompt.push_str(CHECKLIST),
        }

        prompt.push_str(&REPAIR_CLOSING.replace("{prefix}", &canonical_prefix(&destination)));
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::classifier::classify;
    use crate::synthesis::schema::{SchemaDescriptor, SchemaField};

    fn request() -> TransformationRequest {
        let schema = SchemaDescriptor::new(vec![
            SchemaField::new("id", "STRING"),
            SchemaField::new("title", "STRING"),
        ]);
        TransformationRequest::new("proj.ds.src", "proj.ds.dst", schema).unwrap()
    }

    #[test]
    fn test_synthesis_prompt_embeds_request() {
        let prompt = PromptBuilder::new().build(&request());

        assert!(prompt.contains("Source table: `proj.ds.src`"));
        assert!(prompt.contains("CREATE OR REPLACE TABLE `proj.ds.dst` AS"));
        assert!(prompt.contains("\"name\": \"title\""));
        assert!(!prompt.contains("{schema}"));
        for rule in 1..=6 {
            assert!(prompt.contains(&format!("\n{}. ", rule)), "rule {} missing", rule);
        }
    }

    #[test]
    fn test_synthesis_prompt_is_deterministic() {
        let builder = PromptBuilder::new();
        assert_eq!(builder.build(&request()), builder.build(&request()));
    }

    #[test]
    fn test_missing_field_repair_prompt() {
        let script =
            "CREATE OR REPLACE TABLE `proj.ds.dst` AS SELECT colorFamilies FROM `proj.ds.src`;";
        let error = "Invalid field reference 'colorFamilies'. Field does not exist [at 2:8]";
        let prompt = RepairPromptBuilder::new().build(script, error, &classify(error));

        assert!(prompt.contains("The field 'colorFamilies' does not exist"));
        assert!(prompt.contains("-- after"));
        assert!(prompt.contains("line:column 2:8"));
        assert!(prompt.contains(script));
        assert!(!prompt.contains("checklist"));
        assert!(prompt.ends_with(
            "starting with `CREATE OR REPLACE TABLE `proj.ds.dst` AS`. \
             No explanations, no markdown fences."
        ));
    }

    #[test]
    fn test_generic_repair_prompt_uses_checklist() {
        let error = "Syntax error: Unexpected \")\" [at 9:3]";
        let prompt = RepairPromptBuilder::new().build("SELECT (1))", error, &classify(error));

        assert!(prompt.contains("checklist"));
        assert!(!prompt.contains("-- before"));
        assert!(prompt.contains("`CREATE OR REPLACE TABLE `destination_table` AS`"));
    }

    #[test]
    fn test_recover_destination() {
        assert_eq!(
            RepairPromptBuilder::recover_destination("create or replace table p.d.t as select 1"),
            "p.d.t"
        );
        assert_eq!(RepairPromptBuilder::recover_destination("SELECT 1"), "destination_table");
    }
}

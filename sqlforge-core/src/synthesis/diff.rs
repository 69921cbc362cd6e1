//! Line diff between a failed script and its repair

use serde::Serialize;
use similar::{ChangeTag, TextDiff};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptDiff {
    pub unified: String,
    pub lines_added: usize,
    pub lines_removed: usize,
}

impl ScriptDiff {
    pub fn between(before: &str, after: &str) -> Self {
        let diff = TextDiff::from_lines(before, after);

        let mut lines_added = 0;
        let mut lines_removed = 0;
        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => lines_added += 1,
                ChangeTag::Delete => lines_removed += 1,
                ChangeTag::Equal => {}
            }
        }

        let unified = diff
            .unified_diff()
            .context_radius(3)
            .header("failed.sql", "repaired.sql")
            .to_string();

        Self { unified, lines_added, lines_removed }
    }

    pub fn is_empty(&self) -> bool {
        self.lines_added == 0 && self.lines_removed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_changed_lines() {
        let before = "CREATE OR REPLACE TABLE `a.b.c` AS\nSELECT\n  colorFamilies\nFROM `a.b.s`;\n";
        let after = "CREATE OR REPLACE TABLE `a.b.c` AS\nSELECT\n  \
                     ['Default'] AS colorFamilies\nFROM `a.b.s`;\n";
        let diff = ScriptDiff::between(before, after);

        assert_eq!(diff.lines_added, 1);
        assert_eq!(diff.lines_removed, 1);
        assert!(diff.unified.contains("--- failed.sql"));
        assert!(diff.unified.contains("+  ['Default'] AS colorFamilies"));
    }

    #[test]
    fn test_identical_scripts() {
        let diff = ScriptDiff::between("SELECT 1;\n", "SELECT 1;\n");
        assert!(diff.is_empty());
        assert!(diff.unified.is_empty());
    }
}

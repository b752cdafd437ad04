//! Reference integrity checks over a loaded step set.

use std::collections::HashSet;
use std::fmt;

use stagehand_types::step::StepDefinition;

/// One reference integrity violation.
///
/// The validator never raises; it returns the full list so callers can
/// render or ignore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// The step containing the bad reference.
    pub step_id: String,
    /// "next" or "fallback.{code}".
    pub field: String,
    /// The target step id that was referenced.
    pub reference: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {}: {} references '{}' -- {}",
            self.step_id, self.field, self.reference, self.message
        )
    }
}

/// Checks that every `next` and `fallback` value points to an existing step
/// id and that `next` is not a self-loop. Empty `next` is legal (terminal).
pub fn validate_references(steps: &[StepDefinition]) -> Vec<ValidationIssue> {
    let known: HashSet<&str> = steps.iter().map(|s| s.id()).collect();

    let mut issues = Vec::new();

    for step in steps {
        let sid = step.id();
        let fm = &step.frontmatter;

        if !fm.next.is_empty() {
            if !known.contains(fm.next.as_str()) {
                issues.push(ValidationIssue {
                    step_id: sid.to_string(),
                    field: "next".to_string(),
                    reference: fm.next.clone(),
                    message: "target step does not exist".to_string(),
                });
            }
            if fm.next == sid {
                issues.push(ValidationIssue {
                    step_id: sid.to_string(),
                    field: "next".to_string(),
                    reference: fm.next.clone(),
                    message: "self-loop detected".to_string(),
                });
            }
        }

        for (code, target) in &fm.fallback {
            if target.is_empty() {
                continue;
            }
            if !known.contains(target.as_str()) {
                issues.push(ValidationIssue {
                    step_id: sid.to_string(),
                    field: format!("fallback.{code}"),
                    reference: target.clone(),
                    message: "target step does not exist".to_string(),
                });
            }
        }
    }

    issues
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_types::step::Frontmatter;

    fn step(id: &str, next: &str, fallback: &[(&str, &str)]) -> StepDefinition {
        StepDefinition {
            path: format!("{id}.md"),
            frontmatter: Frontmatter {
                step: id.to_string(),
                next: next.to_string(),
                fallback: fallback
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                ..Default::default()
            },
            body: String::new(),
        }
    }

    #[test]
    fn test_valid_references_no_issues() {
        let steps = vec![
            step("1.1", "1.2", &[]),
            step("1.2", "2.1", &[("default", "1.1")]),
            step("2.1", "", &[]),
        ];
        assert!(validate_references(&steps).is_empty());
    }

    #[test]
    fn test_dangling_next() {
        let steps = vec![step("1.1", "9.9", &[])];
        let issues = validate_references(&steps);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "next");
        assert_eq!(issues[0].reference, "9.9");
        assert_eq!(issues[0].message, "target step does not exist");
    }

    #[test]
    fn test_dangling_fallback() {
        let steps = vec![step("1.1", "", &[("compile_error", "8.8")])];
        let issues = validate_references(&steps);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "fallback.compile_error");
        assert_eq!(issues[0].reference, "8.8");
    }

    #[test]
    fn test_next_self_loop() {
        let steps = vec![step("1.1", "1.1", &[])];
        let issues = validate_references(&steps);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "self-loop detected");
    }

    #[test]
    fn test_empty_next_is_terminal() {
        let steps = vec![step("1.1", "", &[])];
        assert!(validate_references(&steps).is_empty());
    }

    #[test]
    fn test_empty_fallback_target_ignored() {
        let steps = vec![step("1.1", "", &[("timeout", "")])];
        assert!(validate_references(&steps).is_empty());
    }

    #[test]
    fn test_multiple_issues_collected() {
        let steps = vec![
            step("1.1", "9.9", &[("default", "8.8")]),
            step("1.2", "1.2", &[]),
        ];
        let issues = validate_references(&steps);
        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn test_issue_display() {
        let issue = ValidationIssue {
            step_id: "1.1".to_string(),
            field: "next".to_string(),
            reference: "9.9".to_string(),
            message: "target step does not exist".to_string(),
        };
        assert_eq!(
            issue.to_string(),
            "step 1.1: next references '9.9' -- target step does not exist"
        );
    }
}

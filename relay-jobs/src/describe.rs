// ABOUTME: Job metadata and its chat rendering.
// ABOUTME: Renders name, description and parameter definitions as markdown.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// A single build parameter accepted by a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    /// Remote type name, e.g. `StringParameterDefinition`
    pub kind: String,
    pub description: String,
    /// Default value rendered as text
    pub default: String,
}

/// Everything the catalog knows about a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetails {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterDefinition>,
}

impl JobDetails {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterDefinition) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Chat-ready description:
    ///
    /// ```text
    /// `name`: description
    /// Parameters:
    /// - *PARAM* (Type): description (Default: `value`)
    /// ```
    pub fn render(&self) -> String {
        let mut out = format!("`{}`: {}\nParameters:\n", self.name, self.description);
        for param in &self.parameters {
            // Writing to a String cannot fail
            let _ = writeln!(
                out,
                "- *{}* ({}): {} (Default: `{}`)",
                param.name,
                param.kind,
                trim_newlines(&param.description),
                param.default
            );
        }
        out
    }
}

/// Strip one leading and one trailing newline, leaving inner ones alone
fn trim_newlines(text: &str) -> &str {
    let text = text.strip_suffix('\n').unwrap_or(text);
    text.strip_prefix('\n').unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_without_parameters() {
        let details = JobDetails::new("myjob", "myjob does something");
        assert_eq!(details.render(), "`myjob`: myjob does something\nParameters:\n");
    }

    #[test]
    fn test_render_with_parameter() {
        let details = JobDetails::new("myjob", "myjob does something").with_parameter(
            ParameterDefinition {
                name: "myParam".to_string(),
                kind: "StringParameterDefinition".to_string(),
                description: "\nmyParam helps parametrize myjob\n".to_string(),
                default: "all".to_string(),
            },
        );
        assert_eq!(
            details.render(),
            "`myjob`: myjob does something\nParameters:\n\
             - *myParam* (StringParameterDefinition): myParam helps parametrize myjob (Default: `all`)\n"
        );
    }

    #[test]
    fn test_trim_newlines_keeps_inner_lines() {
        assert_eq!(trim_newlines("\na\nb\n"), "a\nb");
        assert_eq!(trim_newlines("plain"), "plain");
    }
}

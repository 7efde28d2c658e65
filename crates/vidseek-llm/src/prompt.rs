//! Named prompt templates with `{{name}}` placeholders.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    QueryParser,
    Reranking,
    TranscriptReranking,
}

impl TemplateName {
    pub const ALL: [TemplateName; 3] = [TemplateName::QueryParser, TemplateName::Reranking, TemplateName::TranscriptReranking];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateName::QueryParser => "query_parser",
            TemplateName::Reranking => "reranking",
            TemplateName::TranscriptReranking => "transcript_reranking",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.md", self.as_str())
    }

    fn builtin(&self) -> &'static str {
        match self {
            TemplateName::QueryParser => include_str!("../prompts/query_parser.md"),
            TemplateName::Reranking => include_str!("../prompts/reranking.md"),
            TemplateName::TranscriptReranking => include_str!("../prompts/transcript_reranking.md"),
        }
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct PromptTemplates {
    templates: HashMap<TemplateName, String>,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptTemplates {
    pub fn builtin() -> Self {
        let templates = TemplateName::ALL.iter().map(|t| (*t, t.builtin().to_string())).collect();
        Self { templates }
    }

    /// Built-ins, each overridden by `<dir>/<name>.md` when that file reads.
    pub fn load(dir: Option<&Path>) -> Self {
        let mut out = Self::builtin();
        let Some(dir) = dir else { return out };
        for name in TemplateName::ALL {
            let path = dir.join(name.file_name());
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    debug!(template = %name, path = %path.display(), "prompt template override");
                    out.templates.insert(name, text);
                }
                Err(e) => warn!(template = %name, path = %path.display(), error = %e, "using built-in prompt template"),
            }
        }
        out
    }

    pub fn with_template(mut self, name: TemplateName, text: impl Into<String>) -> Self {
        self.templates.insert(name, text.into());
        self
    }

    pub fn raw(&self, name: TemplateName) -> &str {
        self.templates.get(&name).map_or_else(|| name.builtin(), String::as_str)
    }

    pub fn render(&self, name: TemplateName, vars: &[(&str, &str)]) -> String {
        render(self.raw(name), vars)
    }
}

/// Single left-to-right pass. Unknown placeholders stay verbatim and
/// substituted values are not scanned again.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = after[..end].trim();
        match vars.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::render;

    #[test]
    fn values_are_not_rescanned() {
        let out = render("Q: {{query}} / {{ other }}", &[("query", "{{other}}"), ("other", "x")]);
        assert_eq!(out, "Q: {{other}} / x");
    }

    #[test]
    fn unknown_and_unclosed_placeholders_stay() {
        assert_eq!(render("a {{missing}} b", &[]), "a {{missing}} b");
        assert_eq!(render("a {{query", &[("query", "q")]), "a {{query");
    }
}

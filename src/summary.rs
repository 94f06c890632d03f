use std::{collections::HashMap, fmt};

use crate::{entry::LogEntry, template_set::TemplateSet};

/// Running count of entries per template label. Entries whose template has
/// no label are only counted in the total.
#[derive(Debug, Default, Clone)]
pub struct LabelCounts {
    total: usize,
    by_label: HashMap<String, usize>,
}

impl LabelCounts {
    pub fn record(&mut self, entry: &LogEntry) {
        self.total += 1;
        if let Some(label) = entry.label() {
            *self.by_label.entry(label.to_string()).or_insert(0) += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn get(&self, label: &str) -> usize {
        self.by_label.get(label).copied().unwrap_or(0)
    }

    pub fn summary(&self, templates: &TemplateSet) -> Summary {
        let mut matched: Vec<(String, usize)> = self
            .by_label
            .iter()
            .map(|(label, count)| (label.clone(), *count))
            .collect();
        matched.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut unmatched: Vec<(String, String)> = templates
            .iter()
            .filter_map(|template| {
                let label = template.label()?;
                if self.by_label.contains_key(label) {
                    return None;
                }
                Some((label.to_string(), template.id().to_string()))
            })
            .collect();
        unmatched.sort();

        Summary {
            total: self.total,
            matched,
            unmatched,
        }
    }
}

/// What the session has recognized so far, for people writing templates.
#[derive(Debug, PartialEq)]
pub struct Summary {
    pub total: usize,
    /// `(label, count)`, most frequent first.
    pub matched: Vec<(String, usize)>,
    /// `(label, id)` of labelled templates that never matched, by label.
    pub unmatched: Vec<(String, String)>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total entries: {}", self.total)?;
        writeln!(f)?;
        writeln!(f, "--- Templates with matches ---")?;
        for (label, count) in &self.matched {
            writeln!(f, "  {}: {}", label, count)?;
        }
        writeln!(f)?;
        writeln!(f, "--- Templates with zero matches ---")?;
        let unmatched: Vec<String> = self
            .unmatched
            .iter()
            .map(|(label, id)| format!("{} (id: {})", label, id))
            .collect();
        write!(f, "{}", unmatched.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{overflow::MemoryOverflow, parser::ParserStateMachine, template::TemplateDefinition};

    #[test]
    fn test_counts_and_unmatched_labels() {
        let templates = TemplateSet::compile(&[
            TemplateDefinition::single_line("login", "login {user}").with_label("Login"),
            TemplateDefinition::single_line("logout", "logout {user}").with_label("Logout"),
            TemplateDefinition::single_line("crash", "crash {reason}").with_label("Crash"),
            TemplateDefinition::single_line("plain", "plain {x}"),
            TemplateDefinition::single_line("bye", "bye {x}").with_label("Bye"),
        ])
        .unwrap();
        let mut parser = ParserStateMachine::new(templates.clone(), MemoryOverflow::new());

        let mut counts = LabelCounts::default();
        for message in ["login a", "login b", "logout a", "plain 1"] {
            let line = format!("<2024-01-01T00:00:00.000Z> {}", message);
            let entry = parser.handle_line(&line).unwrap().unwrap();
            counts.record(&entry);
        }

        assert_eq!(counts.total(), 4);
        assert_eq!(counts.get("Login"), 2);
        assert_eq!(counts.get("Crash"), 0);

        let summary = counts.summary(&templates);
        assert_eq!(
            summary.matched,
            vec![("Login".to_string(), 2), ("Logout".to_string(), 1)]
        );
        assert_eq!(
            summary.unmatched,
            vec![
                ("Bye".to_string(), "bye".to_string()),
                ("Crash".to_string(), "crash".to_string())
            ]
        );

        let text = summary.to_string();
        assert!(text.starts_with("Total entries: 4\n"));
        assert!(text.contains("  Login: 2\n"));
        assert!(text.ends_with("Bye (id: bye), Crash (id: crash)"));
    }
}

//! Collaborator boundaries
//!
//! The coordinator needs two capabilities it does not implement itself:
//! turning a free-text intent into a domain label, and executing a task.
//! Both are traits so a real classifier or executor can replace the
//! keyword and placeholder versions here.

use async_trait::async_trait;

/// Maps free-text intent to a domain label. Total: always returns a label.
pub trait DomainClassifier: Send + Sync {
    fn classify(&self, intent: &str) -> String;
}

/// Domain used when no keyword matches
pub const GENERAL_DOMAIN: &str = "General";

/// Keyword classifier: first rule with a matching keyword wins
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    rules: Vec<(String, Vec<String>)>,
    fallback: String,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(GENERAL_DOMAIN)
            .rule("DataAnalysis", &["data", "analyze"])
            .rule("CodeGeneration", &["code", "program"])
            .rule("SecurityAudit", &["security", "audit"])
            .rule("Research", &["research", "find"])
    }
}

impl KeywordClassifier {
    /// Empty classifier that always answers `fallback`
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            fallback: fallback.into(),
        }
    }

    /// Add a rule; rules are checked in insertion order
    pub fn rule(mut self, domain: &str, keywords: &[&str]) -> Self {
        self.rules.push((
            domain.to_string(),
            keywords.iter().map(|k| k.to_lowercase()).collect(),
        ));
        self
    }
}

impl DomainClassifier for KeywordClassifier {
    fn classify(&self, intent: &str) -> String {
        let intent = intent.to_lowercase();
        self.rules
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| intent.contains(k.as_str())))
            .map(|(domain, _)| domain.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Produces a text result for a task, or fails
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, domain: &str, task: &str) -> anyhow::Result<String>;
}

/// Stand-in executor that acknowledges the task without doing work
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderExecutor;

#[async_trait]
impl TaskExecutor for PlaceholderExecutor {
    async fn execute(&self, domain: &str, task: &str) -> anyhow::Result<String> {
        Ok(format!("Processed: {} in domain: {}", task, domain))
    }
}

//! Parsed `prefix/name` chat model spec (spec.md §4.1, §6).
//!
//! Unlike the embed side's bare-name fallback, every chat spec the system
//! recognizes carries an explicit prefix (`cc`, `a`, `or`, `ollama`,
//! `lmstudio`); `or/` specs keep everything after the first `/` as the
//! downstream model id (e.g. `or/openai/gpt-4o` -> model `openai/gpt-4o`).

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatModelSpec {
    pub raw: String,
    pub namespace: String,
    pub model: String,
}

impl ChatModelSpec {
    pub fn parse(spec: &str) -> Self {
        match spec.split_once('/') {
            Some((namespace, model)) if is_known_namespace(namespace) => ChatModelSpec {
                raw: spec.to_string(),
                namespace: namespace.to_string(),
                model: model.to_string(),
            },
            _ => ChatModelSpec {
                raw: spec.to_string(),
                namespace: "cc".to_string(),
                model: spec.to_string(),
            },
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.namespace.as_str(), "ollama" | "lmstudio" | "local")
    }
}

fn is_known_namespace(namespace: &str) -> bool {
    matches!(
        namespace,
        "cc" | "a" | "or" | "ollama" | "lmstudio" | "local"
    )
}

/// USD price per million tokens, used when a provider's usage record has no
/// explicit cost (spec.md §4.1 cost accounting). Overridable via
/// `claudemem_config::ClaudememConfig::pricing_overrides`.
pub fn price_per_million(spec: &ChatModelSpec) -> (f64, f64) {
    match spec.raw.as_str() {
        "cc/sonnet" => (3.0, 15.0),
        "cc/haiku" => (0.8, 4.0),
        "a/opus" => (15.0, 75.0),
        "a/sonnet" => (3.0, 15.0),
        _ if spec.is_local() => (0.0, 0.0),
        _ if spec.namespace == "or" => (1.0, 3.0),
        _ => (DEFAULT_PROMPT_PRICE, DEFAULT_COMPLETION_PRICE),
    }
}

const DEFAULT_PROMPT_PRICE: f64 = 1.0;
const DEFAULT_COMPLETION_PRICE: f64 = 3.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cc_prefix() {
        let spec = ChatModelSpec::parse("cc/sonnet");
        assert_eq!(spec.namespace, "cc");
        assert_eq!(spec.model, "sonnet");
    }

    #[test]
    fn openrouter_keeps_nested_model_path() {
        let spec = ChatModelSpec::parse("or/openai/gpt-4o");
        assert_eq!(spec.namespace, "or");
        assert_eq!(spec.model, "openai/gpt-4o");
    }

    #[test]
    fn unrecognized_prefix_falls_back_to_cc() {
        let spec = ChatModelSpec::parse("sonnet");
        assert_eq!(spec.namespace, "cc");
    }

    #[test]
    fn local_namespaces_are_free() {
        assert_eq!(price_per_million(&ChatModelSpec::parse("ollama/llama3.2")), (0.0, 0.0));
        assert_eq!(price_per_million(&ChatModelSpec::parse("lmstudio/local")), (0.0, 0.0));
    }
}

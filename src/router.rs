//! Client-side intent routing
//!
//! An ordered list of keyword rules, evaluated first-match, with an
//! explicit fallback to the knowledge tool. Matching is plain substring
//! search: `"blog"` contains `"log"` and routes to history.

use serde_json::{json, Value};

pub const KNOWLEDGE_TOOL: &str = "query_knowledge_base";
pub const CALCULATION_TOOL: &str = "perform_complex_calculation";
pub const HISTORY_TOOL: &str = "get_interaction_history";

/// Domain sent with every routed knowledge query
pub const DEFAULT_DOMAIN: &str = "general";

/// Inputs that end the interactive session (compared lower-cased)
pub const EXIT_KEYWORDS: &[&str] = &["exit", "quit"];

/// A routing decision: which tool to call and with what arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub tool: &'static str,
    pub arguments: Value,
}

/// One keyword rule
pub struct RouteRule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub tool: &'static str,
    pub build_arguments: fn(&str) -> Value,
}

/// Ordered rules plus the fallback
pub struct Router {
    rules: Vec<RouteRule>,
    fallback: RouteRule,
}

fn is_calculation(input: &str) -> bool {
    input.contains("calculate") || input.contains('+') || input.contains('*')
}

fn calculation_arguments(input: &str) -> Value {
    json!({"expression": input.replace("calculate", "").trim()})
}

fn is_history(input: &str) -> bool {
    input.contains("history") || input.contains("log")
}

fn no_arguments(_input: &str) -> Value {
    json!({})
}

fn always(_input: &str) -> bool {
    true
}

fn knowledge_arguments(input: &str) -> Value {
    json!({"query": input, "domain": DEFAULT_DOMAIN})
}

impl Router {
    pub fn new(rules: Vec<RouteRule>, fallback: RouteRule) -> Self {
        Self { rules, fallback }
    }

    /// Route `input` to the first matching rule, else the fallback
    pub fn route(&self, input: &str) -> Route {
        let rule = self
            .rules
            .iter()
            .find(|rule| (rule.matches)(input))
            .unwrap_or(&self.fallback);

        tracing::debug!(rule = rule.name, tool = rule.tool, "Routed input");

        Route {
            tool: rule.tool,
            arguments: (rule.build_arguments)(input),
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(
            vec![
                RouteRule {
                    name: "calculation",
                    matches: is_calculation,
                    tool: CALCULATION_TOOL,
                    build_arguments: calculation_arguments,
                },
                RouteRule {
                    name: "history",
                    matches: is_history,
                    tool: HISTORY_TOOL,
                    build_arguments: no_arguments,
                },
            ],
            RouteRule {
                name: "knowledge",
                matches: always,
                tool: KNOWLEDGE_TOOL,
                build_arguments: knowledge_arguments,
            },
        )
    }
}

/// True when the input asks to leave the session
pub fn is_exit(input: &str) -> bool {
    let lowered = input.trim().to_lowercase();
    EXIT_KEYWORDS.contains(&lowered.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_arithmetic_routes_to_calculation() {
        let router = Router::default();
        assert_eq!(
            router.route("2 + 2"),
            Route {
                tool: CALCULATION_TOOL,
                arguments: json!({"expression": "2 + 2"}),
            }
        );
        assert_eq!(router.route("3 * 7").tool, CALCULATION_TOOL);
    }

    #[test]
    fn test_calculate_keyword_is_stripped() {
        let router = Router::default();
        assert_eq!(
            router.route("calculate sqrt(16)").arguments,
            json!({"expression": "sqrt(16)"})
        );
    }

    #[test]
    fn test_calculation_wins_over_history() {
        let router = Router::default();
        assert_eq!(router.route("log 2 + 2").tool, CALCULATION_TOOL);
    }

    #[test]
    fn test_history_keywords() {
        let router = Router::default();
        assert_eq!(
            router.route("show history"),
            Route {
                tool: HISTORY_TOOL,
                arguments: json!({}),
            }
        );
        assert_eq!(router.route("open the log").tool, HISTORY_TOOL);
        // Substring match, not word match
        assert_eq!(router.route("latest blog posts").tool, HISTORY_TOOL);
    }

    #[test]
    fn test_fallback_is_knowledge() {
        let router = Router::default();
        assert_eq!(
            router.route("what is quantum entanglement"),
            Route {
                tool: KNOWLEDGE_TOOL,
                arguments: json!({"query": "what is quantum entanglement", "domain": "general"}),
            }
        );
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let router = Router::default();
        assert_eq!(router.route("Show HISTORY").tool, KNOWLEDGE_TOOL);
    }

    #[test]
    fn test_exit_keywords() {
        assert!(is_exit("exit"));
        assert!(is_exit("  QUIT "));
        assert!(!is_exit("exit now"));
        assert!(!is_exit(""));
    }
}

//! Request preprocessing ahead of cache lookup and selection

use tracing::debug;

use crate::config::RoutingRule;
use crate::task::{TaskRequest, TaskType};

/// System prompt injected when the caller supplies none
pub fn default_system_prompt(task_type: TaskType) -> Option<&'static str> {
    match task_type {
        TaskType::Generation => Some("You are a helpful assistant. Respond clearly and accurately."),
        TaskType::Chat => Some("You are a friendly conversational assistant."),
        TaskType::Code => Some(
            "You are an expert software engineer. Write correct, idiomatic code and explain only what is necessary.",
        ),
        TaskType::Reasoning => Some("Think through the problem step by step before giving a final answer."),
        TaskType::Classification => Some("Classify the input. Answer with the label only."),
        TaskType::Summarization => Some("Summarize the input concisely, keeping the key facts."),
        TaskType::Translation => Some("Translate the input faithfully, preserving meaning and tone."),
        TaskType::Qa => Some("Answer the question accurately. Say so when you do not know."),
        TaskType::SystemPrompt => Some("You write clear, effective system prompts for language models."),
        TaskType::Embedding => None,
    }
}

/// Apply default system prompts and static routing rules
///
/// The first matching rule pins its provider/model unless the request
/// already pins a provider.
pub fn prepare(mut request: TaskRequest, rules: &[RoutingRule]) -> TaskRequest {
    if request.system_prompt.is_none() {
        request.system_prompt = default_system_prompt(request.task_type).map(str::to_string);
    }

    if request.preferred_provider.is_none()
        && let Some(rule) = rules
            .iter()
            .find(|rule| rule.matches(request.task_type, &request.prompt))
    {
        debug!(
            request_id = %request.request_id,
            provider = %rule.provider,
            model = %rule.model,
            "Routing rule pinned candidate"
        );
        request.preferred_provider = Some(rule.provider.clone());
        request.preferred_model = Some(rule.model.clone());
    }

    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Candidate;

    fn rule(task_type: Option<TaskType>, contains: Option<&str>, model: &str) -> RoutingRule {
        RoutingRule {
            task_type,
            prompt_contains: contains.map(str::to_string),
            provider: "anthropic".to_string(),
            model: model.to_string(),
        }
    }

    #[test]
    fn test_injects_default_system_prompt() {
        let prepared = prepare(TaskRequest::new(TaskType::Code, "fn main"), &[]);
        assert!(prepared.system_prompt.unwrap().contains("software engineer"));

        let prepared = prepare(
            TaskRequest::new(TaskType::Code, "fn main").with_system_prompt("custom"),
            &[],
        );
        assert_eq!(prepared.system_prompt.as_deref(), Some("custom"));

        let prepared = prepare(TaskRequest::new(TaskType::Embedding, "vector me"), &[]);
        assert!(prepared.system_prompt.is_none());
    }

    #[test]
    fn test_first_matching_rule_pins_candidate() {
        let rules = vec![
            rule(Some(TaskType::Chat), None, "claude-3-5-haiku"),
            rule(None, Some("LEGAL"), "claude-opus-4"),
            rule(Some(TaskType::Code), None, "claude-sonnet-4"),
        ];

        let prepared = prepare(TaskRequest::new(TaskType::Code, "review this legal contract"), &rules);
        assert_eq!(
            prepared.pinned_candidate(),
            Some(Candidate::new("anthropic", "claude-opus-4"))
        );
    }

    #[test]
    fn test_rules_do_not_override_caller_preference() {
        let rules = vec![rule(Some(TaskType::Chat), None, "claude-3-5-haiku")];
        let prepared = prepare(
            TaskRequest::new(TaskType::Chat, "hi").with_preferred("openai", None),
            &rules,
        );

        assert_eq!(prepared.preferred_provider.as_deref(), Some("openai"));
        assert!(prepared.preferred_model.is_none());
    }
}

//! `RoutingRule` / `RoutingRules` and the rule-matching scoring algorithm
//! of §4.1.

use crate::model::{Priority, RoutingRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    Regex,
}

/// A condition's comparison value: a single string, or a list (for
/// `in` / `notIn`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: ConditionValue,
}

impl Condition {
    /// Evaluate this condition against a request. Unknown fields never
    /// satisfy a condition (the rule simply scores lower).
    pub fn is_satisfied(&self, request: &RoutingRequest) -> bool {
        let Some(actual) = field_value(request, &self.field) else {
            return false;
        };
        match (&self.operator, &self.value) {
            (Operator::Equals, ConditionValue::Single(v)) => &actual == v,
            (Operator::NotEquals, ConditionValue::Single(v)) => &actual != v,
            (Operator::Contains, ConditionValue::Single(v)) => actual.contains(v.as_str()),
            (Operator::NotContains, ConditionValue::Single(v)) => !actual.contains(v.as_str()),
            (Operator::StartsWith, ConditionValue::Single(v)) => actual.starts_with(v.as_str()),
            (Operator::EndsWith, ConditionValue::Single(v)) => actual.ends_with(v.as_str()),
            (Operator::In, ConditionValue::Multiple(values)) => values.contains(&actual),
            (Operator::NotIn, ConditionValue::Multiple(values)) => !values.contains(&actual),
            (Operator::Regex, ConditionValue::Single(pattern)) => {
                regex::Regex::new(pattern)
                    .map(|re| re.is_match(&actual))
                    .unwrap_or(false)
            }
            // Operator/value shape mismatch (e.g. `in` with a single string):
            // treat the list as a one-element list rather than failing closed.
            (Operator::In, ConditionValue::Single(v)) => &actual == v,
            (Operator::NotIn, ConditionValue::Single(v)) => &actual != v,
            _ => false,
        }
    }
}

fn field_value(request: &RoutingRequest, field: &str) -> Option<String> {
    match field {
        "model" => Some(request.model.clone()),
        "category" => request.category.clone(),
        "priority" => Some(match request.priority {
            Priority::High => "high".to_string(),
            Priority::Normal => "normal".to_string(),
            Priority::Low => "low".to_string(),
        }),
        "session_id" => request.metadata.session_id.clone(),
        "user_id" => request.metadata.user_id.clone(),
        "trace_id" => request.metadata.trace_id.clone(),
        other => request.metadata.custom_attributes.get(other).cloned(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub target_providers: Vec<String>,
    #[serde(default)]
    pub weights: Option<HashMap<String, f64>>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl RoutingRule {
    /// Base score (50) adjusted by priority bonus and condition
    /// satisfaction/violation, floored at 0. Caller applies any
    /// rule-category bonus (+20 model rule / +10 category rule) on top.
    pub fn score(&self, request: &RoutingRequest) -> i32 {
        let mut score = 50 + request.priority.score_bonus();
        for condition in &self.conditions {
            if condition.is_satisfied(request) {
                score += 15;
            } else {
                score -= 10;
            }
        }
        score.max(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRules {
    pub version: String,
    pub default_rule: RoutingRule,
    #[serde(default)]
    pub category_rules: HashMap<String, RoutingRule>,
    #[serde(default)]
    pub model_rules: HashMap<String, RoutingRule>,
    #[serde(default)]
    pub custom_rules: Vec<RoutingRule>,
}

impl RoutingRules {
    /// Validate the §3.1 invariant: the default rule exists and is enabled,
    /// and every declared target provider is referenced by at least one rule.
    pub fn validate(&self) -> Result<(), String> {
        if !self.default_rule.enabled {
            return Err("default rule must be enabled".to_string());
        }
        Ok(())
    }

    /// Accumulate matched rules per the §4.1 algorithm and return the
    /// top-scored one, breaking ties by lowest `priority` then
    /// lexicographic id.
    pub fn best_match<'a>(&'a self, request: &RoutingRequest) -> Option<(&'a RoutingRule, i32)> {
        let mut candidates: Vec<(&RoutingRule, i32)> = Vec::new();

        if let Some(rule) = self.model_rules.get(&request.model) {
            if rule.enabled {
                candidates.push((rule, rule.score(request) + 20));
            }
        }

        if let Some(category) = &request.category {
            if let Some(rule) = self.category_rules.get(category) {
                if rule.enabled {
                    candidates.push((rule, rule.score(request) + 10));
                }
            }
        }

        for rule in &self.custom_rules {
            if rule.enabled {
                candidates.push((rule, rule.score(request)));
            }
        }

        if candidates.is_empty() && self.default_rule.enabled {
            candidates.push((&self.default_rule, 1));
        }

        candidates.into_iter().max_by(|a, b| {
            a.1.cmp(&b.1)
                .then_with(|| b.0.priority.cmp(&a.0.priority))
                .then_with(|| b.0.id.cmp(&a.0.id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(model: &str, category: Option<&str>) -> RoutingRequest {
        let mut req = RoutingRequest::new("req-1".into(), model.into()).unwrap();
        if let Some(c) = category {
            req = req.with_category(c);
        }
        req
    }

    fn rule(id: &str, providers: &[&str]) -> RoutingRule {
        RoutingRule {
            id: id.to_string(),
            name: id.to_string(),
            enabled: true,
            priority: 10,
            conditions: vec![],
            target_providers: providers.iter().map(|s| s.to_string()).collect(),
            weights: None,
            description: None,
            tags: vec![],
        }
    }

    #[test]
    fn equals_condition() {
        let cond = Condition {
            field: "model".to_string(),
            operator: Operator::Equals,
            value: ConditionValue::Single("gpt-4".to_string()),
        };
        assert!(cond.is_satisfied(&request("gpt-4", None)));
        assert!(!cond.is_satisfied(&request("gpt-3", None)));
    }

    #[test]
    fn in_condition() {
        let cond = Condition {
            field: "model".to_string(),
            operator: Operator::In,
            value: ConditionValue::Multiple(vec!["a".into(), "b".into()]),
        };
        assert!(cond.is_satisfied(&request("a", None)));
        assert!(!cond.is_satisfied(&request("c", None)));
    }

    #[test]
    fn regex_condition() {
        let cond = Condition {
            field: "model".to_string(),
            operator: Operator::Regex,
            value: ConditionValue::Single("^claude-.*".to_string()),
        };
        assert!(cond.is_satisfied(&request("claude-3-5-sonnet", None)));
        assert!(!cond.is_satisfied(&request("gpt-4", None)));
    }

    #[test]
    fn falls_back_to_default_when_nothing_matches() {
        let rules = RoutingRules {
            version: "1".to_string(),
            default_rule: rule("default", &["lmstudio"]),
            category_rules: HashMap::new(),
            model_rules: HashMap::new(),
            custom_rules: vec![],
        };
        let (matched, score) = rules.best_match(&request("anything", None)).unwrap();
        assert_eq!(matched.id, "default");
        assert_eq!(score, 1);
    }

    #[test]
    fn model_rule_outscores_default() {
        let mut model_rules = HashMap::new();
        model_rules.insert("claude-3-5-sonnet".to_string(), rule("model-rule", &["a"]));
        let rules = RoutingRules {
            version: "1".to_string(),
            default_rule: rule("default", &["lmstudio"]),
            category_rules: HashMap::new(),
            model_rules,
            custom_rules: vec![],
        };
        let (matched, _) = rules
            .best_match(&request("claude-3-5-sonnet", None))
            .unwrap();
        assert_eq!(matched.id, "model-rule");
    }

    #[test]
    fn disabled_default_rule_fails_validation() {
        let mut default_rule = rule("default", &["lmstudio"]);
        default_rule.enabled = false;
        let rules = RoutingRules {
            version: "1".to_string(),
            default_rule,
            category_rules: HashMap::new(),
            model_rules: HashMap::new(),
            custom_rules: vec![],
        };
        assert!(rules.validate().is_err());
    }

    #[test]
    fn ties_break_by_lowest_priority_then_id() {
        let mut r1 = rule("zzz", &["a"]);
        r1.priority = 5;
        let mut r2 = rule("aaa", &["a"]);
        r2.priority = 5;
        let rules = RoutingRules {
            version: "1".to_string(),
            default_rule: rule("default", &["lmstudio"]),
            category_rules: HashMap::new(),
            model_rules: HashMap::new(),
            custom_rules: vec![r1, r2],
        };
        let (matched, _) = rules.best_match(&request("m", None)).unwrap();
        assert_eq!(matched.id, "aaa");
    }
}

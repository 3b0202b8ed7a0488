//! Structured flag rules.
//!
//! A rule is a tree of `all` / `any` / `not` combinators over typed
//! conditions. Rules are stored as JSON on the flag row:
//!
//! ```json
//! { "all": [
//!     { "fact": "plan_tier", "op": "gte", "value": "hobby" },
//!     { "not": { "fact": "subdomain_length", "op": "lt", "value": 3 } }
//! ] }
//! ```
//!
//! A condition whose fact is absent from the context evaluates to false.

use crate::domain::PlanTier;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Name of the fact the evaluator always fills from the tenant record
pub const PLAN_TIER_FACT: &str = "plan_tier";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum Rule {
    All {
        #[schema(no_recursion)]
        all: Vec<Rule>,
    },
    Any {
        #[schema(no_recursion)]
        any: Vec<Rule>,
    },
    Not {
        #[schema(no_recursion)]
        not: Box<Rule>,
    },
    Condition(Condition),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Condition {
    pub fact: String,
    pub op: Operator,
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Ne => ordering != Ordering::Equal,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Gte => ordering != Ordering::Less,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Lte => ordering != Ordering::Greater,
        }
    }
}

/// A single fact value supplied to rule evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FactValue {
    Tier(PlanTier),
    Number(f64),
    Text(String),
}

impl FactValue {
    /// Interpret a raw query-string value: numbers when they parse, text otherwise
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => FactValue::Number(n),
            _ => FactValue::Text(raw.to_string()),
        }
    }

    /// Order this fact against a rule literal; `None` when the types do not line up
    fn compare(&self, literal: &serde_json::Value) -> Option<Ordering> {
        match self {
            FactValue::Tier(tier) => {
                let other = literal.as_str()?.parse::<PlanTier>().ok()?;
                Some(tier.cmp(&other))
            }
            FactValue::Number(n) => n.partial_cmp(&literal.as_f64()?),
            FactValue::Text(s) => Some(s.as_str().cmp(literal.as_str()?)),
        }
    }
}

/// Facts available to a rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facts(BTreeMap<String, FactValue>);

impl Facts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FactValue) {
        self.0.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: FactValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FactValue> {
        self.0.get(name)
    }

    /// Build facts from string pairs such as query parameters
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut facts = Self::new();
        for (name, raw) in pairs {
            facts.insert(name.clone(), FactValue::from_raw(raw));
        }
        facts
    }
}

impl Rule {
    pub fn evaluate(&self, facts: &Facts) -> bool {
        match self {
            Rule::All { all } => all.iter().all(|rule| rule.evaluate(facts)),
            Rule::Any { any } => any.iter().any(|rule| rule.evaluate(facts)),
            Rule::Not { not } => !not.evaluate(facts),
            Rule::Condition(condition) => condition.evaluate(facts),
        }
    }
}

impl Condition {
    pub fn evaluate(&self, facts: &Facts) -> bool {
        facts
            .get(&self.fact)
            .and_then(|fact| fact.compare(&self.value))
            .map(|ordering| self.op.accepts(ordering))
            .unwrap_or(false)
    }
}

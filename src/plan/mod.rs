//! Structured query plan - the semi-trusted output of the reasoning step
//!
//! The wire shapes are deliberately lenient: the upstream reasoner is an LLM
//! and gets field shapes wrong in predictable ways (scalar where a list is
//! expected, strings for numbers, missing keys). Deserialization absorbs
//! those instead of failing; the validator cleans up the rest.

pub mod validator;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

pub use validator::{PlanValidator, ValidatedPlan};

/// Column descriptor carried inside a plan (may be reasoner-invented until
/// the validator reconciles it against schema metadata)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(default, alias = "type")]
    pub data_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JoinSpec {
    /// "INNER", "LEFT", ... - absent defaults to LEFT during validation
    #[serde(default, rename = "type", alias = "join_type")]
    pub join_type: Option<String>,
    #[serde(default)]
    pub left_table: String,
    #[serde(default, alias = "left_key")]
    pub left_column: String,
    #[serde(default)]
    pub right_table: String,
    #[serde(default, alias = "right_key")]
    pub right_column: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub column: String,
    /// Full SQL condition, e.g. `orders.status != 'cancelled'`
    #[serde(default)]
    pub condition: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Aggregation {
    #[serde(default, alias = "expr")]
    pub expression: String,
    #[serde(default)]
    pub alias: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct HavingCondition {
    pub condition: String,
}

impl<'de> Deserialize<'de> for HavingCondition {
    // Emitted both as bare condition strings and as {condition} objects.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct HavingVisitor;

        impl<'de> Visitor<'de> for HavingVisitor {
            type Value = HavingCondition;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a condition string or {condition} object")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(HavingCondition {
                    condition: value.to_string(),
                })
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut condition = String::new();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "condition" => condition = map.next_value()?,
                        _ => {
                            let _: serde_json::Value = map.next_value()?;
                        }
                    }
                }
                Ok(HavingCondition { condition })
            }
        }

        deserializer.deserialize_any(HavingVisitor)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderBySpec {
    #[serde(default)]
    pub column: String,
    #[serde(default)]
    pub direction: String,
}

/// The authoritative SELECT list entry: raw column, aggregation alias, or a
/// calculated expression carrying its own alias
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectColumn {
    #[serde(default)]
    pub expression: String,
    #[serde(default)]
    pub alias: String,
}

/// An open question the reasoner could not resolve unilaterally
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ambiguity {
    pub question: String,
    pub suggestion: String,
}

impl<'de> Deserialize<'de> for Ambiguity {
    // The reasoner sometimes emits bare question strings instead of objects.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AmbiguityVisitor;

        impl<'de> Visitor<'de> for AmbiguityVisitor {
            type Value = Ambiguity;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a question string or {question, suggestion} object")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Ambiguity {
                    question: value.to_string(),
                    suggestion: String::new(),
                })
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let mut question = String::new();
                let mut suggestion = String::new();
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "question" => question = map.next_value()?,
                        "suggestion" => suggestion = map.next_value()?,
                        _ => {
                            let _: serde_json::Value = map.next_value()?;
                        }
                    }
                }
                Ok(Ambiguity {
                    question,
                    suggestion,
                })
            }
        }

        deserializer.deserialize_any(AmbiguityVisitor)
    }
}

/// Structured query plan consumed by the SQL compiler.
///
/// Every field defaults, so a plan missing keys deserializes to empty
/// containers of the right shape instead of failing.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryPlan {
    #[serde(default)]
    pub tables: Vec<String>,

    /// table -> ordered column descriptors
    #[serde(default)]
    pub columns: HashMap<String, Vec<ColumnDescriptor>>,

    #[serde(default)]
    pub joins: Vec<JoinSpec>,

    #[serde(default)]
    pub filters: Vec<FilterSpec>,

    #[serde(default, alias = "drill_down", alias = "group_by")]
    pub group_by_columns: Vec<String>,

    #[serde(default)]
    pub aggregations: Vec<Aggregation>,

    #[serde(default)]
    pub having_conditions: Vec<HavingCondition>,

    /// Accepts a single spec or a list of specs on the wire
    #[serde(default, alias = "order_by", deserialize_with = "one_or_many_order_by")]
    pub order_by_spec: Vec<OrderBySpec>,

    /// Lenient: non-numeric input becomes None with a warning
    #[serde(default, alias = "limit", deserialize_with = "lenient_limit")]
    pub limit_count: Option<i64>,

    #[serde(default)]
    pub select_columns: Vec<SelectColumn>,

    #[serde(default)]
    pub ambiguities: Vec<Ambiguity>,
}

impl QueryPlan {
    /// Aliases the plan's aggregations introduce into the namespace
    pub fn aggregation_aliases(&self) -> Vec<&str> {
        self.aggregations
            .iter()
            .map(|a| a.alias.as_str())
            .filter(|a| !a.is_empty())
            .collect()
    }
}

/// Accept either `{"column": ...}` or `[{"column": ...}, ...]`.
fn one_or_many_order_by<'de, D>(deserializer: D) -> Result<Vec<OrderBySpec>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(OrderBySpec),
        Many(Vec<OrderBySpec>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(spec) => vec![spec],
        OneOrMany::Many(specs) => specs,
    })
}

/// Accept integers, numeric strings, floats with integral value; anything
/// else is dropped with a warning rather than failing the whole plan.
fn lenient_limit<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(match raw {
        serde_json::Value::Null => None,
        serde_json::Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        serde_json::Value::String(s) => match s.trim().parse::<i64>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(value = %s, "Ignoring non-numeric limit_count");
                None
            }
        },
        other => {
            warn!(value = %other, "Ignoring non-numeric limit_count");
            None
        }
    })
}

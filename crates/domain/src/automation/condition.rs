//! Condition — the clause list a record must satisfy for a rule to fire.
//!
//! Administrators author conditions as a form-encoded string of repeated
//! clause groups:
//!
//! ```text
//! path=status&operator=equal&value=open&logic=and&path=priority&operator=ge&value=3
//! ```
//!
//! Clauses are folded strictly left to right: each clause after the first
//! combines with the running result through its own connector. There is no
//! operator precedence, so `a or b and c` means `(a or b) and c`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConditionSyntaxError;
use crate::record::FieldValue;

/// Comparison applied between a resolved attribute and a clause literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Equal,
    NotEqual,
    Lt,
    Gt,
    Le,
    Ge,
    IContains,
}

impl Operator {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "notequal",
            Self::Lt => "lt",
            Self::Gt => "gt",
            Self::Le => "le",
            Self::Ge => "ge",
            Self::IContains => "icontains",
        }
    }

    /// Whether the resolved attribute satisfies this operator against `literal`.
    ///
    /// Collections hold when any element holds, except `notequal` which
    /// requires that no element equals. A missing value only equals the
    /// empty literal, `none` or `null`.
    #[must_use]
    pub fn holds(self, resolved: &ResolvedValue, literal: &str) -> bool {
        match resolved {
            ResolvedValue::Missing => self.holds_missing(literal),
            ResolvedValue::Many(values) if values.is_empty() => self.holds_missing(literal),
            ResolvedValue::One(value) => self.holds_one(value, literal),
            ResolvedValue::Many(values) => match self {
                Self::NotEqual => !values.iter().any(|v| Self::Equal.holds_one(v, literal)),
                _ => values.iter().any(|v| self.holds_one(v, literal)),
            },
        }
    }

    fn holds_missing(self, literal: &str) -> bool {
        let blank = is_blank_literal(literal);
        match self {
            Self::Equal => blank,
            Self::NotEqual => !blank,
            _ => false,
        }
    }

    fn holds_one(self, value: &FieldValue, literal: &str) -> bool {
        if value.is_null() {
            return self.holds_missing(literal);
        }
        match self {
            Self::Equal => values_equal(value, literal),
            Self::NotEqual => !values_equal(value, literal),
            Self::IContains => value
                .to_string()
                .to_lowercase()
                .contains(&literal.to_lowercase()),
            Self::Lt => compare(value, literal) == Some(Ordering::Less),
            Self::Gt => compare(value, literal) == Some(Ordering::Greater),
            Self::Le => matches!(
                compare(value, literal),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::Ge => matches!(
                compare(value, literal),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ConditionSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "equal" => Ok(Self::Equal),
            "notequal" => Ok(Self::NotEqual),
            "lt" => Ok(Self::Lt),
            "gt" => Ok(Self::Gt),
            "le" => Ok(Self::Le),
            "ge" => Ok(Self::Ge),
            "icontains" => Ok(Self::IContains),
            other => Err(ConditionSyntaxError::UnknownOperator(other.to_string())),
        }
    }
}

/// How a clause combines with the result of the clauses before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connector {
    #[default]
    And,
    Or,
}

impl Connector {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

impl FromStr for Connector {
    type Err = ConditionSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            _ => Err(ConditionSyntaxError::UnknownConnector(s.to_string())),
        }
    }
}

/// One `{path, operator, value, connector}` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub path: String,
    pub operator: Operator,
    pub value: String,
    #[serde(default)]
    pub connector: Connector,
}

impl Clause {
    #[must_use]
    pub fn new(path: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operator,
            value: value.into(),
            connector: Connector::And,
        }
    }

    #[must_use]
    pub fn or(mut self) -> Self {
        self.connector = Connector::Or;
        self
    }
}

/// Ordered clause list. Serialized as its form-encoded expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Condition {
    clauses: Vec<Clause>,
}

impl Condition {
    /// The empty condition, which always holds.
    #[must_use]
    pub fn always() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }

    /// Parse a form-encoded condition expression.
    ///
    /// # Errors
    ///
    /// Returns a [`ConditionSyntaxError`] for unknown keys, operators or
    /// connectors, keys before the first `path`, empty paths, and clauses
    /// without an operator.
    pub fn parse(raw: &str) -> Result<Self, ConditionSyntaxError> {
        let raw = raw.trim().trim_start_matches('?');
        let mut clauses = Vec::new();
        let mut pending: Option<PendingClause> = None;

        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            if key == "path" {
                if let Some(done) = pending.take() {
                    clauses.push(done.finish()?);
                }
                let path = value.trim();
                if path.is_empty() {
                    return Err(ConditionSyntaxError::EmptyPath);
                }
                pending = Some(PendingClause::new(path));
                continue;
            }
            let current = pending
                .as_mut()
                .ok_or_else(|| ConditionSyntaxError::OrphanKey(key.to_string()))?;
            match key.as_ref() {
                "operator" => current.operator = Some(value.parse()?),
                "value" => current.value = value.into_owned(),
                "logic" => current.connector = value.parse()?,
                other => return Err(ConditionSyntaxError::UnknownKey(other.to_string())),
            }
        }
        if let Some(done) = pending {
            clauses.push(done.finish()?);
        }
        Ok(Self { clauses })
    }

    /// Render back to the form-encoded expression.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut out = url::form_urlencoded::Serializer::new(String::new());
        for clause in &self.clauses {
            out.append_pair("path", &clause.path)
                .append_pair("operator", clause.operator.as_str())
                .append_pair("value", &clause.value)
                .append_pair("logic", clause.connector.as_str());
        }
        out.finish()
    }

    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_query_string())
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

struct PendingClause {
    path: String,
    operator: Option<Operator>,
    value: String,
    connector: Connector,
}

impl PendingClause {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            operator: None,
            value: String::new(),
            connector: Connector::And,
        }
    }

    fn finish(self) -> Result<Clause, ConditionSyntaxError> {
        let operator = self
            .operator
            .ok_or(ConditionSyntaxError::MissingOperator(self.path.clone()))?;
        Ok(Clause {
            path: self.path,
            operator,
            value: self.value,
            connector: self.connector,
        })
    }
}

/// Value an attribute path resolved to on one record.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    /// Unset relation, dangling reference, or lookup failure.
    Missing,
    One(FieldValue),
    /// Path crossed a many-to-many relation.
    Many(Vec<FieldValue>),
}

impl ResolvedValue {
    /// Order-insensitive form used to detect changes between two states.
    #[must_use]
    pub fn canonical(&self) -> Canonical {
        match self {
            Self::Missing | Self::One(FieldValue::Null) => Canonical::Missing,
            Self::One(value) => Canonical::One(value.to_string()),
            Self::Many(values) => {
                let mut set: Vec<String> = values.iter().map(ToString::to_string).collect();
                set.sort();
                set.dedup();
                Canonical::Set(set)
            }
        }
    }
}

/// Comparable form of a [`ResolvedValue`]; sets are sorted and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Canonical {
    Missing,
    One(String),
    Set(Vec<String>),
}

/// Left-to-right fold over clause results.
///
/// Call [`needs`](Self::needs) before evaluating a clause: when the running
/// result already decides the clause's contribution (`and` after `false`,
/// `or` after `true`) the clause can be skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fold {
    running: Option<bool>,
}

impl Fold {
    #[must_use]
    pub fn needs(&self, connector: Connector) -> bool {
        match (self.running, connector) {
            (None, _) | (Some(true), Connector::And) | (Some(false), Connector::Or) => true,
            (Some(false), Connector::And) | (Some(true), Connector::Or) => false,
        }
    }

    /// Combine one clause result. The first clause ignores its connector.
    pub fn push(&mut self, connector: Connector, value: bool) {
        self.running = Some(match (self.running, connector) {
            (None, _) => value,
            (Some(acc), Connector::And) => acc && value,
            (Some(acc), Connector::Or) => acc || value,
        });
    }

    /// Final result; the empty fold holds.
    #[must_use]
    pub fn result(&self) -> bool {
        self.running.unwrap_or(true)
    }
}

fn is_blank_literal(literal: &str) -> bool {
    let trimmed = literal.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") || trimmed.eq_ignore_ascii_case("null")
}

fn parse_bool(literal: &str) -> Option<bool> {
    match literal.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn values_equal(value: &FieldValue, literal: &str) -> bool {
    match value {
        FieldValue::Bool(b) => parse_bool(literal) == Some(*b),
        FieldValue::Int(_) | FieldValue::Float(_) => {
            compare(value, literal) == Some(Ordering::Equal)
        }
        FieldValue::Ref { id } => id.to_string().eq_ignore_ascii_case(literal.trim()),
        other => other.to_string() == literal,
    }
}

fn compare(value: &FieldValue, literal: &str) -> Option<Ordering> {
    let numeric = match value {
        FieldValue::Int(i) => Some(*i as f64),
        FieldValue::Float(x) => Some(*x),
        FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match (numeric, literal.trim().parse::<f64>()) {
        (Some(lhs), Ok(rhs)) => lhs.partial_cmp(&rhs),
        _ => Some(value.to_string().as_str().cmp(literal)),
    }
}

//! Typed condition, update and key condition expressions.
//!
//! Expressions are passed to a [`Store`](crate::Store) as data. Stores backed
//! by a real service render them with [`Expression::build`] into the
//! placeholder syntax of that service, the in-memory store evaluates them
//! directly.

use {
    crate::attribute::{AttributeMap, AttributeValue},
    std::{cmp::Ordering, collections::BTreeMap, fmt::Write as _},
};

/// Comparison operator of a [`Condition::Compare`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum Comparator {
    #[display("=")]
    Eq,

    #[display("<")]
    Lt,

    #[display("<=")]
    Le,

    #[display(">")]
    Gt,

    #[display(">=")]
    Ge,
}

impl Comparator {
    fn matches(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord.is_eq(),
            Self::Lt => ord.is_lt(),
            Self::Le => ord.is_le(),
            Self::Gt => ord.is_gt(),
            Self::Ge => ord.is_ge(),
        }
    }
}

/// Boolean condition over the attributes of a single item.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    AttributeExists(String),
    AttributeNotExists(String),
    Compare {
        name: String,
        op: Comparator,
        value: AttributeValue,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    pub fn exists(name: impl Into<String>) -> Self {
        Self::AttributeExists(name.into())
    }

    pub fn not_exists(name: impl Into<String>) -> Self {
        Self::AttributeNotExists(name.into())
    }

    pub fn compare(name: impl Into<String>, op: Comparator, value: impl Into<AttributeValue>) -> Self {
        Self::Compare {
            name: name.into(),
            op,
            value: value.into(),
        }
    }

    pub fn and(self, other: Condition) -> Self {
        match self {
            Self::And(mut conds) => {
                conds.push(other);
                Self::And(conds)
            }
            this => Self::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Condition) -> Self {
        match self {
            Self::Or(mut conds) => {
                conds.push(other);
                Self::Or(conds)
            }
            this => Self::Or(vec![this, other]),
        }
    }

    /// Evaluates the condition against an item. A missing item is evaluated
    /// as an item without attributes.
    pub fn evaluate(&self, item: &AttributeMap) -> bool {
        match self {
            Self::AttributeExists(name) => item.contains_key(name),
            Self::AttributeNotExists(name) => !item.contains_key(name),
            Self::Compare { name, op, value } => item
                .get(name)
                .and_then(|attr| compare(attr, value))
                .is_some_and(|ord| op.matches(ord)),
            Self::And(conds) => conds.iter().all(|c| c.evaluate(item)),
            Self::Or(conds) => conds.iter().any(|c| c.evaluate(item)),
        }
    }
}

/// Compares two attributes of the same scalar type.
///
/// Numbers are compared numerically, strings and binaries lexicographically
/// by bytes. Any other combination is incomparable.
pub fn compare(a: &AttributeValue, b: &AttributeValue) -> Option<Ordering> {
    use AttributeValue as V;

    match (a, b) {
        (V::S(a), V::S(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        (V::B(a), V::B(b)) => Some(a.cmp(b)),
        (V::N(a), V::N(b)) => compare_numbers(a, b),
        _ => None,
    }
}

fn compare_numbers(a: &str, b: &str) -> Option<Ordering> {
    if let (Ok(a), Ok(b)) = (a.parse::<i128>(), b.parse::<i128>()) {
        return Some(a.cmp(&b));
    }

    a.parse::<f64>().ok()?.partial_cmp(&b.parse::<f64>().ok()?)
}

/// Single action of an [`Update`].
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateAction {
    /// Adds a number to a numeric attribute, initializing a missing one.
    Add { name: String, value: AttributeValue },

    /// Sets an attribute.
    Set { name: String, value: AttributeValue },

    /// Removes an attribute, a no-op if it is missing.
    Remove { name: String },
}

impl UpdateAction {
    pub fn name(&self) -> &str {
        match self {
            Self::Add { name, .. } | Self::Set { name, .. } | Self::Remove { name } => name,
        }
    }
}

/// Error of applying an [`Update`] to an item.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid operand for ADD {name}: {reason}")]
pub struct InvalidOperand {
    pub name: String,
    pub reason: &'static str,
}

/// Ordered list of [`UpdateAction`]s.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update {
    pub actions: Vec<UpdateAction>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.actions.push(UpdateAction::Add {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.actions.push(UpdateAction::Set {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn remove(mut self, name: impl Into<String>) -> Self {
        self.actions.push(UpdateAction::Remove { name: name.into() });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Applies the actions in order to an item.
    pub fn apply(&self, item: &mut AttributeMap) -> Result<(), InvalidOperand> {
        for action in &self.actions {
            match action {
                UpdateAction::Set { name, value } => {
                    item.insert(name.clone(), value.clone());
                }
                UpdateAction::Remove { name } => {
                    item.remove(name);
                }
                UpdateAction::Add { name, value } => {
                    let sum = add(item.get(name), value).map_err(|reason| InvalidOperand {
                        name: name.clone(),
                        reason,
                    })?;
                    item.insert(name.clone(), sum);
                }
            }
        }

        Ok(())
    }
}

fn add(current: Option<&AttributeValue>, delta: &AttributeValue) -> Result<AttributeValue, &'static str> {
    let delta = delta.as_i64().ok_or("operand is not an integer")?;

    let current = match current {
        None => 0,
        Some(attr) => attr.as_i64().ok_or("attribute is not an integer")?,
    };

    current
        .checked_add(delta)
        .map(AttributeValue::number)
        .ok_or("integer overflow")
}

/// Key condition of a query: an exact partition key and an optional sort key
/// prefix.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyCondition {
    pub partition_key: String,
    pub partition: AttributeValue,
    pub sort_prefix: Option<(String, String)>,
}

impl KeyCondition {
    pub fn new(partition_key: impl Into<String>, partition: impl Into<AttributeValue>) -> Self {
        Self {
            partition_key: partition_key.into(),
            partition: partition.into(),
            sort_prefix: None,
        }
    }

    /// Restricts the query to sort keys starting with `prefix`.
    pub fn with_sort_prefix(mut self, sort_key: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.sort_prefix = Some((sort_key.into(), prefix.into()));
        self
    }

    pub fn matches(&self, item: &AttributeMap) -> bool {
        if item.get(&self.partition_key) != Some(&self.partition) {
            return false;
        }

        match &self.sort_prefix {
            None => true,
            Some((name, prefix)) => item
                .get(name)
                .and_then(AttributeValue::as_s)
                .is_some_and(|s| s.starts_with(prefix.as_str())),
        }
    }
}

/// Expressions rendered into the `#name` / `:value` placeholder syntax.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Expression {
    pub condition: Option<String>,
    pub update: Option<String>,
    pub key_condition: Option<String>,

    /// Placeholder to attribute name mapping.
    pub names: BTreeMap<String, String>,

    /// Placeholder to attribute value mapping.
    pub values: AttributeMap,
}

impl Expression {
    /// Starts building an [`Expression`].
    pub fn builder() -> ExpressionBuilder {
        ExpressionBuilder::default()
    }
}

/// Builder of an [`Expression`], sharing placeholders between its parts.
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    expr: Expression,
}

impl ExpressionBuilder {
    pub fn condition(mut self, cond: &Condition) -> Self {
        let mut out = String::new();
        self.write_condition(&mut out, cond);
        self.expr.condition = Some(out);
        self
    }

    pub fn update(mut self, update: &Update) -> Self {
        let mut add = Vec::new();
        let mut set = Vec::new();
        let mut remove = Vec::new();

        for action in &update.actions {
            match action {
                UpdateAction::Add { name, value } => {
                    add.push(format!("{} {}", self.name(name), self.value(value)))
                }
                UpdateAction::Set { name, value } => {
                    set.push(format!("{} = {}", self.name(name), self.value(value)))
                }
                UpdateAction::Remove { name } => remove.push(self.name(name)),
            }
        }

        let clauses: Vec<_> = [("ADD", add), ("SET", set), ("REMOVE", remove)]
            .into_iter()
            .filter(|(_, parts)| !parts.is_empty())
            .map(|(keyword, parts)| format!("{keyword} {}", parts.join(", ")))
            .collect();

        self.expr.update = (!clauses.is_empty()).then(|| clauses.join(" "));
        self
    }

    pub fn key_condition(mut self, cond: &KeyCondition) -> Self {
        let mut out = format!(
            "{} = {}",
            self.name(&cond.partition_key),
            self.value(&cond.partition)
        );

        if let Some((name, prefix)) = &cond.sort_prefix {
            let name = self.name(name);
            let prefix = self.value(&AttributeValue::S(prefix.clone()));
            let _ = write!(out, " AND begins_with({name}, {prefix})");
        }

        self.expr.key_condition = Some(out);
        self
    }

    pub fn build(self) -> Expression {
        self.expr
    }

    fn name(&mut self, name: &str) -> String {
        if let Some((placeholder, _)) = self.expr.names.iter().find(|(_, n)| *n == name) {
            return placeholder.clone();
        }

        let placeholder = format!("#{}", self.expr.names.len());
        self.expr.names.insert(placeholder.clone(), name.to_owned());
        placeholder
    }

    fn value(&mut self, value: &AttributeValue) -> String {
        let placeholder = format!(":{}", self.expr.values.len());
        self.expr.values.insert(placeholder.clone(), value.clone());
        placeholder
    }

    fn write_condition(&mut self, out: &mut String, cond: &Condition) {
        match cond {
            Condition::AttributeExists(name) => {
                let name = self.name(name);
                let _ = write!(out, "attribute_exists({name})");
            }
            Condition::AttributeNotExists(name) => {
                let name = self.name(name);
                let _ = write!(out, "attribute_not_exists({name})");
            }
            Condition::Compare { name, op, value } => {
                let name = self.name(name);
                let value = self.value(value);
                let _ = write!(out, "{name} {op} {value}");
            }
            Condition::And(conds) => self.write_group(out, conds, " AND "),
            Condition::Or(conds) => self.write_group(out, conds, " OR "),
        }
    }

    fn write_group(&mut self, out: &mut String, conds: &[Condition], sep: &str) {
        out.push('(');
        for (i, cond) in conds.iter().enumerate() {
            if i > 0 {
                out.push_str(sep);
            }
            self.write_condition(out, cond);
        }
        out.push(')');
    }
}

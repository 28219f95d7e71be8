//! Builders for projection, key-condition, and update expressions.
//!
//! Every attribute name that appears in a generated expression goes through a
//! `#name` placeholder, so reserved words never reach the store unaliased.
//! Filter expressions are written by the caller; this module only merges the
//! caller's placeholder maps with the generated ones.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::str::FromStr;

use aws_sdk_dynamodb::types::AttributeValue;

use crate::dynamodb::codec::{self, WireItem};
use crate::dynamodb::error::{Error, Result};
use crate::dynamodb::{Item, Value};

const PARTITION_NAME: &str = "#PK";
const PARTITION_VALUE: &str = ":PartitionKey";
const SORT_NAME: &str = "#SK";
const SORT_VALUE: &str = ":SortKey";
const BETWEEN_START: &str = ":start";
const BETWEEN_END: &str = ":end";

/// A projection expression with its name placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub expression: String,
    pub names: HashMap<String, String>,
}

/// A key-condition expression with its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: WireItem,
}

/// A `SET` update expression with its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateExpression {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: WireItem,
}

/// A condition on the range key of a query.
///
/// `operation` is one of `between`, `gt`, `lt`, `ge`, `le`, `begins_with`,
/// or `equals`. `between` takes a two-element list; `begins_with` takes a
/// string.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeCondition {
    pub operation: String,
    pub value: Value,
}

impl RangeCondition {
    pub fn new(operation: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            operation: operation.into(),
            value: value.into(),
        }
    }

    pub fn between(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self::new("between", Value::List(vec![start.into(), end.into()]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeOperator {
    Between,
    BeginsWith,
    Compare(Comparison),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Gt,
    Lt,
    Ge,
    Le,
    Equals,
}

impl FromStr for RangeOperator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "between" => Ok(RangeOperator::Between),
            "begins_with" => Ok(RangeOperator::BeginsWith),
            "gt" => Ok(RangeOperator::Compare(Comparison::Gt)),
            "lt" => Ok(RangeOperator::Compare(Comparison::Lt)),
            "ge" => Ok(RangeOperator::Compare(Comparison::Ge)),
            "le" => Ok(RangeOperator::Compare(Comparison::Le)),
            "equals" | "eq" => Ok(RangeOperator::Compare(Comparison::Equals)),
            _ => Err(Error::validation(format!(
                "unknown range operation '{s}'"
            ))),
        }
    }
}

impl Comparison {
    fn symbol(self) -> &'static str {
        match self {
            Comparison::Gt => ">",
            Comparison::Lt => "<",
            Comparison::Ge => ">=",
            Comparison::Le => "<=",
            Comparison::Equals => "=",
        }
    }
}

/// Allocates `#name` placeholders for attribute names.
///
/// The same attribute always gets the same placeholder. Two different
/// attributes never share one: characters a placeholder cannot hold are
/// replaced by `_`, and a numeric suffix is added when the cleaned name is
/// already taken.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    names: HashMap<String, String>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the placeholder for `attribute`, allocating one if needed.
    pub fn alias(&mut self, attribute: &str) -> String {
        let base = format!("#{}", sanitize(attribute));
        let mut candidate = base.clone();
        let mut suffix = 1;
        loop {
            match self.names.get(&candidate) {
                None => {
                    self.names.insert(candidate.clone(), attribute.to_string());
                    return candidate;
                }
                Some(existing) if existing == attribute => return candidate,
                Some(_) => {
                    candidate = format!("{base}_{suffix}");
                    suffix += 1;
                }
            }
        }
    }

    /// Binds a caller-chosen placeholder. Rebinding a placeholder to a
    /// different attribute is an error.
    pub fn bind(&mut self, placeholder: &str, attribute: &str) -> Result<()> {
        match self.names.entry(placeholder.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(attribute.to_string());
                Ok(())
            }
            Entry::Occupied(slot) if slot.get() == attribute => Ok(()),
            Entry::Occupied(slot) => Err(Error::validation(format!(
                "placeholder '{placeholder}' bound to both '{}' and '{attribute}'",
                slot.get()
            ))),
        }
    }

    /// Merges a placeholder map into this one.
    pub fn merge(&mut self, names: &HashMap<String, String>) -> Result<()> {
        for (placeholder, attribute) in names {
            self.bind(placeholder, attribute)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn into_map(self) -> HashMap<String, String> {
        self.names
    }
}

impl From<HashMap<String, String>> for Placeholders {
    fn from(names: HashMap<String, String>) -> Self {
        Self { names }
    }
}

fn sanitize(attribute: &str) -> String {
    let cleaned: String = attribute
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Merges `extra` value placeholders into `values`. The same placeholder with
/// two different values is an error.
pub fn merge_values(values: &mut WireItem, extra: WireItem) -> Result<()> {
    for (placeholder, value) in extra {
        match values.entry(placeholder) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(slot) if *slot.get() == value => {}
            Entry::Occupied(slot) => {
                return Err(Error::validation(format!(
                    "value placeholder '{}' bound twice with different values",
                    slot.key()
                )))
            }
        }
    }
    Ok(())
}

/// Builds a projection from a comma-separated field list.
///
/// ```
/// use dynamo_data_layer::dynamodb::expression::build_projection;
///
/// let projection = build_projection("title, date").unwrap();
/// assert_eq!(projection.expression, "#title, #date");
/// assert_eq!(projection.names["#date"], "date");
/// ```
pub fn build_projection(fields: &str) -> Result<Projection> {
    let mut placeholders = Placeholders::new();
    let expression = build_projection_with(fields, &mut placeholders)?;
    Ok(Projection {
        expression,
        names: placeholders.into_map(),
    })
}

/// Builds a projection expression, allocating aliases from `placeholders`
/// so they cannot collide with names already in use.
pub fn build_projection_with(fields: &str, placeholders: &mut Placeholders) -> Result<String> {
    let aliases: Vec<String> = fields
        .split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(|field| placeholders.alias(field))
        .collect();

    if aliases.is_empty() {
        return Err(Error::validation("projection lists no fields"));
    }
    Ok(aliases.join(", "))
}

/// Builds a key-condition expression.
///
/// The partition-key equality clause is always present. A range condition
/// needs the name of the range attribute it applies to.
pub fn build_key_condition(
    hash_attr: &str,
    hash_value: &Value,
    range_attr: Option<&str>,
    range: Option<&RangeCondition>,
) -> Result<KeyCondition> {
    let mut expression = format!("{PARTITION_NAME} = {PARTITION_VALUE}");
    let mut names = HashMap::from([(PARTITION_NAME.to_string(), hash_attr.to_string())]);
    let mut values = HashMap::from([(
        PARTITION_VALUE.to_string(),
        codec::encode_value(hash_value)?,
    )]);

    if let Some(range) = range {
        let range_attr = range_attr.ok_or_else(|| {
            Error::validation(format!(
                "range condition given but '{hash_attr}' has no range key"
            ))
        })?;
        let operator: RangeOperator = range.operation.parse()?;
        names.insert(SORT_NAME.to_string(), range_attr.to_string());

        match operator {
            RangeOperator::Between => {
                let (start, end) = between_bounds(&range.value)?;
                expression.push_str(&format!(
                    " AND {SORT_NAME} BETWEEN {BETWEEN_START} AND {BETWEEN_END}"
                ));
                values.insert(BETWEEN_START.to_string(), start);
                values.insert(BETWEEN_END.to_string(), end);
            }
            RangeOperator::BeginsWith => {
                if !matches!(range.value, Value::String(_)) {
                    return Err(Error::validation(
                        "begins_with requires a string value",
                    ));
                }
                expression.push_str(&format!(" AND begins_with({SORT_NAME}, {SORT_VALUE})"));
                values.insert(SORT_VALUE.to_string(), codec::encode_value(&range.value)?);
            }
            RangeOperator::Compare(comparison) => {
                let comparator = comparison.symbol();
                expression.push_str(&format!(" AND {SORT_NAME} {comparator} {SORT_VALUE}"));
                values.insert(SORT_VALUE.to_string(), codec::encode_value(&range.value)?);
            }
        }
    }

    Ok(KeyCondition {
        expression,
        names,
        values,
    })
}

fn between_bounds(value: &Value) -> Result<(AttributeValue, AttributeValue)> {
    match value {
        Value::List(bounds) if bounds.len() == 2 => Ok((
            codec::encode_value(&bounds[0])?,
            codec::encode_value(&bounds[1])?,
        )),
        _ => Err(Error::validation(
            "between requires exactly two values",
        )),
    }
}

/// Builds a single `SET` clause assigning every attribute in `delta`.
///
/// Only assignments are generated; `REMOVE`, `ADD`, and `DELETE` clauses are
/// not supported. An empty delta is rejected.
pub fn build_update(delta: &Item) -> Result<UpdateExpression> {
    if delta.is_empty() {
        return Err(Error::validation("update has no attributes to set"));
    }

    let mut attributes: Vec<(&String, &Value)> = delta.iter().collect();
    attributes.sort_by(|a, b| a.0.cmp(b.0));

    let mut placeholders = Placeholders::new();
    let mut values = HashMap::new();
    let mut assignments = Vec::with_capacity(attributes.len());
    for (attribute, value) in attributes {
        let name = placeholders.alias(attribute);
        let value_placeholder = format!(":{}", &name[1..]);
        assignments.push(format!("{name} = {value_placeholder}"));
        values.insert(value_placeholder, codec::encode_value(value)?);
    }

    Ok(UpdateExpression {
        expression: format!("SET {}", assignments.join(", ")),
        names: placeholders.into_map(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_between_key_condition() {
        let condition = build_key_condition(
            "userId",
            &Value::from("u1"),
            Some("date"),
            Some(&RangeCondition::new(
                "between",
                Value::List(vec![Value::from(1), Value::from(2)]),
            )),
        )
        .unwrap();

        assert_eq!(
            condition.expression,
            "#PK = :PartitionKey AND #SK BETWEEN :start AND :end"
        );
        assert_eq!(condition.values[":start"], AttributeValue::N("1".into()));
        assert_eq!(condition.values[":end"], AttributeValue::N("2".into()));
        assert_eq!(
            condition.values[":PartitionKey"],
            AttributeValue::S("u1".into())
        );
        assert_eq!(condition.names["#PK"], "userId");
        assert_eq!(condition.names["#SK"], "date");
    }

    #[test]
    fn test_hash_only_condition() {
        let condition = build_key_condition("userId", &Value::from("u1"), Some("date"), None).unwrap();
        assert_eq!(condition.expression, "#PK = :PartitionKey");
        assert_eq!(condition.names.len(), 1);
        assert_eq!(condition.values.len(), 1);
    }

    #[test]
    fn test_comparison_operators() {
        for (op, symbol) in [("gt", ">"), ("lt", "<"), ("ge", ">="), ("le", "<="), ("equals", "=")] {
            let condition = build_key_condition(
                "userId",
                &Value::from("u1"),
                Some("date"),
                Some(&RangeCondition::new(op, 5)),
            )
            .unwrap();
            assert_eq!(
                condition.expression,
                format!("#PK = :PartitionKey AND #SK {symbol} :SortKey")
            );
            assert_eq!(condition.values[":SortKey"], AttributeValue::N("5".into()));
        }
    }

    #[test]
    fn test_eq_is_an_alias_for_equals() {
        for op in ["eq", "EQ", "equals"] {
            let condition = build_key_condition(
                "userId",
                &Value::from("u1"),
                Some("date"),
                Some(&RangeCondition::new(op, 5)),
            )
            .unwrap();
            assert_eq!(condition.expression, "#PK = :PartitionKey AND #SK = :SortKey");
        }
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("Between".parse::<RangeOperator>().unwrap(), RangeOperator::Between);
        assert_eq!(
            "ge".parse::<RangeOperator>().unwrap(),
            RangeOperator::Compare(Comparison::Ge)
        );
        assert!(matches!("near".parse::<RangeOperator>(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_begins_with() {
        let condition = build_key_condition(
            "userId",
            &Value::from("u1"),
            Some("slug"),
            Some(&RangeCondition::new("begins_with", "2024-")),
        )
        .unwrap();
        assert_eq!(
            condition.expression,
            "#PK = :PartitionKey AND begins_with(#SK, :SortKey)"
        );

        let err = build_key_condition(
            "userId",
            &Value::from("u1"),
            Some("slug"),
            Some(&RangeCondition::new("begins_with", 2024)),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_between_needs_a_pair() {
        for value in [
            Value::from(1),
            Value::List(vec![Value::from(1)]),
            Value::List(vec![Value::from(1), Value::from(2), Value::from(3)]),
        ] {
            let err = build_key_condition(
                "userId",
                &Value::from("u1"),
                Some("date"),
                Some(&RangeCondition::new("between", value)),
            )
            .unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
    }

    #[test]
    fn test_unknown_operation_is_named() {
        let err = build_key_condition(
            "userId",
            &Value::from("u1"),
            Some("date"),
            Some(&RangeCondition::new("around", 1)),
        )
        .unwrap_err();
        match err {
            Error::Validation(msg) => assert!(msg.contains("around")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_range_condition_without_range_key() {
        assert!(matches!(
            build_key_condition(
                "userId",
                &Value::from("u1"),
                None,
                Some(&RangeCondition::new("gt", 1)),
            ),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_projection_aliases_every_field() {
        let projection = build_projection("name, status ,  date").unwrap();
        assert_eq!(projection.expression, "#name, #status, #date");
        assert_eq!(projection.names["#status"], "status");
        assert_eq!(projection.names.len(), 3);
        assert!(matches!(build_projection(" , "), Err(Error::Validation(_))));
    }

    #[test]
    fn test_projection_avoids_collisions() {
        let projection = build_projection("first-name, first_name, first-name").unwrap();
        assert_eq!(projection.expression, "#first_name, #first_name_1, #first_name");
        assert_eq!(projection.names["#first_name"], "first-name");
        assert_eq!(projection.names["#first_name_1"], "first_name");
    }

    #[test]
    fn test_projection_after_key_condition() {
        let condition = build_key_condition("userId", &Value::from("u1"), None, None).unwrap();
        let mut placeholders = Placeholders::from(condition.names);
        let expression = build_projection_with("PK, userId", &mut placeholders).unwrap();
        assert_eq!(expression, "#PK_1, #userId");
        let names = placeholders.into_map();
        assert_eq!(names["#PK"], "userId");
        assert_eq!(names["#PK_1"], "PK");
    }

    #[test]
    fn test_update_sets_every_attribute() {
        let delta = Item::new().set_string("title", "Hello").set_number("views", 10);
        let update = build_update(&delta).unwrap();
        assert_eq!(update.expression, "SET #title = :title, #views = :views");
        assert_eq!(update.names["#views"], "views");
        assert_eq!(update.values[":title"], AttributeValue::S("Hello".into()));
        assert_eq!(update.values[":views"], AttributeValue::N("10".into()));
    }

    #[test]
    fn test_empty_update_is_rejected() {
        assert!(matches!(build_update(&Item::new()), Err(Error::Validation(_))));
    }

    #[test]
    fn test_caller_placeholders_merge() {
        let mut placeholders = Placeholders::new();
        placeholders.alias("status");
        placeholders
            .merge(&HashMap::from([
                ("#status".to_string(), "status".to_string()),
                ("#n".to_string(), "name".to_string()),
            ]))
            .unwrap();

        let clash = HashMap::from([("#status".to_string(), "state".to_string())]);
        assert!(matches!(placeholders.merge(&clash), Err(Error::Validation(_))));
    }

    #[test]
    fn test_value_placeholders_merge() {
        let mut values = HashMap::from([(":a".to_string(), AttributeValue::N("1".into()))]);
        merge_values(
            &mut values,
            HashMap::from([
                (":a".to_string(), AttributeValue::N("1".into())),
                (":b".to_string(), AttributeValue::S("x".into())),
            ]),
        )
        .unwrap();
        assert_eq!(values.len(), 2);

        let clash = HashMap::from([(":a".to_string(), AttributeValue::N("2".into()))]);
        assert!(matches!(merge_values(&mut values, clash), Err(Error::Validation(_))));
    }
}

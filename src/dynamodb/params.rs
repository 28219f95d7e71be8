use std::collections::HashMap;

use aws_sdk_dynamodb::types::ReturnValue;

use crate::dynamodb::error::{Error, Result};
use crate::dynamodb::expression::RangeCondition;
use crate::dynamodb::{Item, Value};

/// Optional request settings shared by the read and write operations.
///
/// `names` and `values` are placeholder maps for the caller's own filter or
/// condition expressions. Values are native and encoded by shape. A
/// placeholder that clashes with a generated one is rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestExtras {
    /// Comma-separated attribute names to return.
    pub projection: Option<String>,
    pub filter_expression: Option<String>,
    pub condition_expression: Option<String>,
    pub names: HashMap<String, String>,
    pub values: Item,
    pub return_values: Option<ReturnValue>,
    pub consistent_read: Option<bool>,
    /// Page size for queries and scans.
    pub limit: Option<i32>,
}

impl RequestExtras {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn projection(mut self, fields: impl Into<String>) -> Self {
        self.projection = Some(fields.into());
        self
    }

    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.filter_expression = Some(expression.into());
        self
    }

    pub fn condition(mut self, expression: impl Into<String>) -> Self {
        self.condition_expression = Some(expression.into());
        self
    }

    pub fn name(mut self, placeholder: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.names.insert(placeholder.into(), attribute.into());
        self
    }

    pub fn value(mut self, placeholder: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(placeholder, value);
        self
    }

    pub fn return_values(mut self, return_values: ReturnValue) -> Self {
        self.return_values = Some(return_values);
        self
    }

    pub fn consistent_read(mut self, consistent: bool) -> Self {
        self.consistent_read = Some(consistent);
        self
    }

    pub fn limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Fails if an option that only applies to reads is set.
    pub(crate) fn reject_read_options(&self, operation: &str) -> Result<()> {
        reject_options(
            operation,
            &[
                ("projection", self.projection.is_some()),
                ("filter_expression", self.filter_expression.is_some()),
                ("consistent_read", self.consistent_read.is_some()),
                ("limit", self.limit.is_some()),
            ],
        )
    }

    /// Fails if an option that only applies to writes is set.
    pub(crate) fn reject_write_options(&self, operation: &str) -> Result<()> {
        reject_options(
            operation,
            &[
                ("condition_expression", self.condition_expression.is_some()),
                ("return_values", self.return_values.is_some()),
            ],
        )
    }
}

fn reject_options(operation: &str, options: &[(&str, bool)]) -> Result<()> {
    let set: Vec<&str> = options
        .iter()
        .filter(|(_, is_set)| *is_set)
        .map(|(name, _)| *name)
        .collect();
    if set.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "{operation} does not accept {}",
            set.join(", ")
        )))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetParams {
    pub key: Item,
    pub projection: Option<String>,
    pub consistent_read: Option<bool>,
}

impl GetParams {
    pub fn new(key: Item) -> Self {
        Self {
            key,
            projection: None,
            consistent_read: None,
        }
    }

    pub fn projection(mut self, fields: impl Into<String>) -> Self {
        self.projection = Some(fields.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    pub hash_value: Value,
    pub range_condition: Option<RangeCondition>,
    pub index_name: Option<String>,
    pub extra: RequestExtras,
}

impl QueryParams {
    pub fn new(hash_value: impl Into<Value>) -> Self {
        Self {
            hash_value: hash_value.into(),
            range_condition: None,
            index_name: None,
            extra: RequestExtras::default(),
        }
    }

    pub fn range(mut self, condition: RangeCondition) -> Self {
        self.range_condition = Some(condition);
        self
    }

    pub fn index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    pub fn extra(mut self, extra: RequestExtras) -> Self {
        self.extra = extra;
        self
    }
}

/// Scan parameters. The filter expression is written by the caller; its
/// placeholders go in `names` and `values`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanParams {
    pub filter_expression: Option<String>,
    pub names: HashMap<String, String>,
    pub values: Item,
    pub index_name: Option<String>,
    pub extra: RequestExtras,
}

impl ScanParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.filter_expression = Some(expression.into());
        self
    }

    pub fn name(mut self, placeholder: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.names.insert(placeholder.into(), attribute.into());
        self
    }

    pub fn value(mut self, placeholder: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(placeholder, value);
        self
    }

    pub fn extra(mut self, extra: RequestExtras) -> Self {
        self.extra = extra;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateParams {
    pub key: Item,
    pub updates: Item,
    pub extra: RequestExtras,
}

impl UpdateParams {
    pub fn new(key: Item, updates: Item) -> Self {
        Self {
            key,
            updates,
            extra: RequestExtras::default(),
        }
    }

    pub fn extra(mut self, extra: RequestExtras) -> Self {
        self.extra = extra;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteParams {
    pub key: Item,
    pub extra: RequestExtras,
}

impl DeleteParams {
    pub fn new(key: Item) -> Self {
        Self {
            key,
            extra: RequestExtras::default(),
        }
    }

    pub fn extra(mut self, extra: RequestExtras) -> Self {
        self.extra = extra;
        self
    }
}

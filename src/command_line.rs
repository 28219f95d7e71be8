use anyhow::{anyhow, bail, Result};
use dynamo_data_layer::dynamodb::{
    DeleteParams, DynamoDb, GetParams, Item, Number, QueryParams, RangeCondition, RequestExtras,
    ScanParams, UpdateParams, Value,
};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::io::{self, Write};
use tracing::error;

/// Runs the operator console over every table in the registry.
///
/// The supported commands are:
/// - tables: List the registered tables and their keys
/// - put: Write an item
/// - get: Read an item by key
/// - query: Query by partition key, with an optional range condition
/// - scan: Scan a table with an optional filter
/// - update: Set attributes on an item
/// - delete: Delete an item
/// - exit: Exit the program
///
/// Items, keys and values are entered as JSON. A failed command is reported
/// and the loop carries on.
pub async fn run(ddb: &DynamoDb) -> Result<()> {
    loop {
        let command = prompt(
            "Enter command (tables/put/get/query/scan/update/delete/exit)",
            None,
        )?;
        let outcome = match command.as_str() {
            "tables" => {
                print_tables(ddb);
                Ok(())
            }
            "put" => put_item(ddb).await,
            "get" => get_item(ddb).await,
            "query" => query_items(ddb).await,
            "scan" => scan_items(ddb).await,
            "update" => update_item(ddb).await,
            "delete" => delete_item(ddb).await,
            "exit" => break,
            _ => {
                println!("Unknown command. Please try again.");
                Ok(())
            }
        };
        if let Err(e) = outcome {
            error!("Command '{}' failed: {:#}", command, e);
        }
    }
    Ok(())
}

fn print_tables(ddb: &DynamoDb) {
    println!("\n--- Tables ---");
    for name in ddb.registry().logical_names() {
        let Ok(table) = ddb.registry().table(name) else {
            continue;
        };
        let range = table.range_key_attr().unwrap_or("-");
        println!(
            "{} ({}): hash={} range={}",
            name,
            table.physical_name(),
            table.hash_key_attr(),
            range
        );
        for (index, schema) in table.indexes() {
            println!(
                "  index {}: hash={} range={}",
                index,
                schema.hash_key_attr(),
                schema.range_key_attr().unwrap_or("-")
            );
        }
    }
    println!("--------------\n");
}

async fn put_item(ddb: &DynamoDb) -> Result<()> {
    let table = prompt("Enter table", Some("Posts"))?;
    let item = prompt_item("Enter item JSON", r#"{"userId": "u1", "date": 20240101}"#)?;
    ddb.put(&table, item, true).await?;
    println!("Item added.");
    Ok(())
}

async fn get_item(ddb: &DynamoDb) -> Result<()> {
    let table = prompt("Enter table", Some("Posts"))?;
    let key = prompt_item("Enter key JSON", r#"{"userId": "u1", "date": 20240101}"#)?;
    let mut params = GetParams::new(key);
    if let Some(fields) = prompt_optional("Enter projection (optional)", Some("title, date"))? {
        params = params.projection(fields);
    }

    match ddb.get(&table, params, true).await? {
        Some(item) => print_items("Item", &[item]),
        None => println!("Item not found."),
    }
    Ok(())
}

async fn query_items(ddb: &DynamoDb) -> Result<()> {
    let table = prompt("Enter table", Some("Posts"))?;
    let hash_value = prompt_value("Enter partition key value JSON", r#""u1""#)?;
    let mut params = QueryParams::new(hash_value);

    if let Some(index) = prompt_optional("Enter index name (optional)", Some("byTitle"))? {
        params = params.index(index);
    }
    if let Some(operation) = prompt_optional(
        "Enter range operation (optional: equals/lt/le/gt/ge/begins_with/between)",
        None,
    )? {
        let condition = if operation.eq_ignore_ascii_case("between") {
            let start = prompt_value("Enter start value JSON", "20240101")?;
            let end = prompt_value("Enter end value JSON", "20241231")?;
            RangeCondition::between(start, end)
        } else {
            RangeCondition::new(operation, prompt_value("Enter range value JSON", "20240101")?)
        };
        params = params.range(condition);
    }

    let mut extra = RequestExtras::new();
    if let Some(filter) = prompt_optional("Enter filter expression (optional)", Some("#t = :t"))? {
        extra = filter_placeholders(extra.filter(filter))?;
    }
    if let Some(limit) = prompt_optional("Enter page limit (optional)", Some("10"))? {
        extra = extra.limit(limit.parse()?);
    }

    let items = ddb.query(&table, params.extra(extra), true).await?;
    print_items("Query Results", &items);
    Ok(())
}

async fn scan_items(ddb: &DynamoDb) -> Result<()> {
    let table = prompt("Enter table", Some("Posts"))?;
    let mut extra = RequestExtras::new();
    if let Some(filter) = prompt_optional("Enter filter expression (optional)", Some("#t = :t"))? {
        extra = filter_placeholders(extra.filter(filter))?;
    }
    if let Some(fields) = prompt_optional("Enter projection (optional)", Some("title, date"))? {
        extra = extra.projection(fields);
    }

    let items = ddb
        .scan(&table, ScanParams::new().extra(extra), true)
        .await?;
    print_items("Scan Results", &items);
    Ok(())
}

async fn update_item(ddb: &DynamoDb) -> Result<()> {
    let table = prompt("Enter table", Some("Posts"))?;
    let key = prompt_item("Enter key JSON", r#"{"userId": "u1", "date": 20240101}"#)?;
    let updates = prompt_item("Enter updates JSON", r#"{"title": "Updated"}"#)?;

    let updated = ddb
        .update(&table, UpdateParams::new(key, updates), true)
        .await?;
    print_items("Updated Item", &[updated]);
    Ok(())
}

async fn delete_item(ddb: &DynamoDb) -> Result<()> {
    let table = prompt("Enter table", Some("Posts"))?;
    let key = prompt_item("Enter key JSON", r#"{"userId": "u1", "date": 20240101}"#)?;
    if !prompt_bool("Delete this item?", false)? {
        println!("Delete cancelled.");
        return Ok(());
    }

    ddb.delete(&table, DeleteParams::new(key), true).await?;
    println!("Item deleted.");
    Ok(())
}

/// Prompts for the name and value placeholders a filter expression uses.
fn filter_placeholders(mut extra: RequestExtras) -> Result<RequestExtras> {
    if let Some(names) = prompt_optional("Enter name placeholders JSON (optional)", Some(r##"{"#t": "title"}"##))? {
        let names: HashMap<String, String> = serde_json::from_str(&names)?;
        extra.names.extend(names);
    }
    if let Some(values) = prompt_optional("Enter value placeholders JSON (optional)", Some(r#"{":t": "Hello"}"#))? {
        for (placeholder, value) in parse_item(&values)? {
            extra.values.insert(placeholder, value);
        }
    }
    Ok(extra)
}

fn prompt(message: &str, example: Option<&str>) -> Result<String> {
    let full_message = if let Some(ex) = example {
        format!("{} (e.g., {}): ", message, ex)
    } else {
        format!("{}: ", message)
    };
    print!("{}", full_message);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_optional(message: &str, example: Option<&str>) -> Result<Option<String>> {
    let input = prompt(message, example)?;
    Ok(if input.is_empty() { None } else { Some(input) })
}

fn prompt_bool(message: &str, default: bool) -> Result<bool> {
    let input = prompt(
        &format!("{} (y/n)", message),
        Some(if default { "y" } else { "n" }),
    )?;
    Ok(input.to_lowercase().starts_with('y') || (input.is_empty() && default))
}

fn prompt_item(message: &str, example: &str) -> Result<Item> {
    parse_item(&prompt(message, Some(example))?)
}

fn prompt_value(message: &str, example: &str) -> Result<Value> {
    let input = prompt(message, Some(example))?;
    json_to_value(serde_json::from_str(&input)?)
}

fn print_items(title: &str, items: &[Item]) {
    println!("\n--- {} ---", title);
    for item in items {
        println!("{}", item_to_json(item));
    }
    println!("{}", "-".repeat(title.len() + 8));
}

/// Parses a JSON object into an item.
fn parse_item(input: &str) -> Result<Item> {
    match json_to_value(serde_json::from_str(input)?)? {
        Value::Map(item) => Ok(item),
        _ => bail!("expected a JSON object"),
    }
}

/// Converts JSON to a native value: strings, numbers, booleans and null map
/// directly, arrays become lists and objects become maps.
fn json_to_value(json: Json) -> Result<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Number(Number::Int(i)),
            None => Value::Number(Number::Float(
                n.as_f64().ok_or_else(|| anyhow!("unsupported number {n}"))?,
            )),
        },
        Json::String(s) => Value::String(s),
        Json::Array(values) => Value::List(
            values
                .into_iter()
                .map(json_to_value)
                .collect::<Result<Vec<_>>>()?,
        ),
        Json::Object(fields) => {
            let mut item = Item::new();
            for (name, value) in fields {
                item.insert(name, json_to_value(value)?);
            }
            Value::Map(item)
        }
    })
}

fn number_to_json(n: Number) -> Json {
    match n {
        Number::Int(i) => Json::from(i),
        Number::Float(f) => serde_json::Number::from_f64(f).map_or(Json::Null, Json::Number),
    }
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::String(s) => Json::from(s.as_str()),
        Value::Number(n) => number_to_json(*n),
        Value::Bool(b) => Json::from(*b),
        Value::Null => Json::Null,
        Value::StringSet(set) => Json::from(set.clone()),
        Value::NumberSet(set) => Json::Array(set.iter().copied().map(number_to_json).collect()),
        Value::BinarySet(set) => Json::Array(set.iter().map(|b| Json::from(b.clone())).collect()),
        Value::List(values) => Json::Array(values.iter().map(value_to_json).collect()),
        Value::Map(item) => item_to_json(item),
        Value::Binary(bytes) => Json::from(bytes.clone()),
    }
}

fn item_to_json(item: &Item) -> Json {
    Json::Object(
        item.iter()
            .map(|(name, value)| (name.clone(), value_to_json(value)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item() {
        let item = parse_item(
            r#"{"userId": "u1", "date": 20240101, "score": 4.5, "tags": ["a", 1], "meta": {"draft": true, "note": null}}"#,
        )
        .unwrap();

        assert_eq!(item.get_string("userId"), Some("u1"));
        assert_eq!(item.get_number("date"), Some(Number::Int(20240101)));
        assert_eq!(item.get_number("score"), Some(Number::Float(4.5)));
        assert_eq!(
            item.get("tags"),
            Some(&Value::List(vec![Value::from("a"), Value::from(1)]))
        );
        let meta = item.get("meta").and_then(Value::as_map).unwrap();
        assert_eq!(meta.get("draft"), Some(&Value::Bool(true)));
        assert_eq!(meta.get("note"), Some(&Value::Null));
    }

    #[test]
    fn test_parse_item_requires_object() {
        assert!(parse_item(r#"["not", "an", "item"]"#).is_err());
        assert!(parse_item("{ broken").is_err());
    }

    #[test]
    fn test_item_to_json() {
        let item = Item::new()
            .set_string("id", "a")
            .set("tags", Value::StringSet(vec!["x".into(), "y".into()]))
            .set_number("n", 2.5);
        assert_eq!(
            item_to_json(&item),
            serde_json::json!({ "id": "a", "tags": ["x", "y"], "n": 2.5 })
        );
    }
}

//! Multi-table batch requests: splitting writes into store-sized chunks and
//! mapping batch responses back to logical table names.

use std::collections::{BTreeMap, HashMap};

use aws_sdk_dynamodb::types::{DeleteRequest, PutRequest, WriteRequest};

use crate::dynamodb::codec::{self, WireItem};
use crate::dynamodb::error::{Error, Result};
use crate::dynamodb::Item;

/// Most write requests the store accepts in one `BatchWriteItem` call.
pub const MAX_BATCH_WRITE: usize = 25;

/// Keys to read from one logical table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableKeys {
    pub keys: Vec<Item>,
    pub projection: Option<String>,
    pub consistent_read: Option<bool>,
}

impl TableKeys {
    pub fn new(keys: Vec<Item>) -> Self {
        Self {
            keys,
            ..Self::default()
        }
    }
}

/// A multi-table batch read, keyed by logical table name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetRequest {
    pub tables: BTreeMap<String, TableKeys>,
}

impl BatchGetRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, logical_name: impl Into<String>, keys: TableKeys) -> Self {
        self.tables.insert(logical_name.into(), keys);
        self
    }
}

/// Puts and deletes for one logical table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableWrites {
    pub put: Vec<Item>,
    pub delete: Vec<Item>,
}

impl TableWrites {
    pub fn len(&self) -> usize {
        self.put.len() + self.delete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A multi-table batch write, keyed by logical table name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteRequest {
    pub tables: BTreeMap<String, TableWrites>,
}

impl BatchWriteRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(mut self, logical_name: impl Into<String>, item: Item) -> Self {
        self.tables.entry(logical_name.into()).or_default().put.push(item);
        self
    }

    pub fn delete(mut self, logical_name: impl Into<String>, key: Item) -> Self {
        self.tables.entry(logical_name.into()).or_default().delete.push(key);
        self
    }

    /// Total number of write requests across every table.
    pub fn len(&self) -> usize {
        self.tables.values().map(TableWrites::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decoded outcome of a batch read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetOutput {
    pub items: HashMap<String, Vec<Item>>,
    pub unprocessed_keys: HashMap<String, Vec<Item>>,
}

/// Decoded outcome of a batch write: requests the store did not process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteOutput {
    pub unprocessed: HashMap<String, TableWrites>,
}

impl BatchWriteOutput {
    pub fn is_complete(&self) -> bool {
        self.unprocessed.values().all(TableWrites::is_empty)
    }
}

/// Splits an ordered list into chunks of at most [`MAX_BATCH_WRITE`],
/// preserving order.
pub fn chunk_writes<T>(requests: Vec<T>) -> Vec<Vec<T>> {
    let mut chunks = Vec::with_capacity(requests.len().div_ceil(MAX_BATCH_WRITE));
    let mut current = Vec::with_capacity(MAX_BATCH_WRITE);
    for request in requests {
        current.push(request);
        if current.len() == MAX_BATCH_WRITE {
            chunks.push(std::mem::replace(
                &mut current,
                Vec::with_capacity(MAX_BATCH_WRITE),
            ));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

enum WriteOp {
    Put(Item),
    Delete(Item),
}

/// Splits a batch write into requests the store accepts in one call each.
///
/// Requests are taken table by table (in name order), puts before deletes,
/// and the chunks preserve that order. Chunks are independent: running them
/// gives no atomicity across chunks.
pub fn partition_writes(request: BatchWriteRequest) -> Vec<BatchWriteRequest> {
    let flat: Vec<(String, WriteOp)> = request
        .tables
        .into_iter()
        .flat_map(|(table, writes)| {
            let puts = writes.put.into_iter().map(WriteOp::Put);
            let deletes = writes.delete.into_iter().map(WriteOp::Delete);
            puts.chain(deletes)
                .map(move |op| (table.clone(), op))
                .collect::<Vec<_>>()
        })
        .collect();

    chunk_writes(flat)
        .into_iter()
        .map(|chunk| {
            chunk
                .into_iter()
                .fold(BatchWriteRequest::new(), |batch, (table, op)| match op {
                    WriteOp::Put(item) => batch.put(table, item),
                    WriteOp::Delete(key) => batch.delete(table, key),
                })
        })
        .collect()
}

pub(crate) fn put_request(item: WireItem) -> Result<WriteRequest> {
    Ok(WriteRequest::builder()
        .put_request(PutRequest::builder().set_item(Some(item)).build()?)
        .build())
}

pub(crate) fn delete_request(key: WireItem) -> Result<WriteRequest> {
    Ok(WriteRequest::builder()
        .delete_request(DeleteRequest::builder().set_key(Some(key)).build()?)
        .build())
}

/// Decodes unprocessed write requests back into puts and deletes.
pub(crate) fn decode_unprocessed(requests: Vec<WriteRequest>) -> Result<TableWrites> {
    let mut writes = TableWrites::default();
    for request in requests {
        if let Some(put) = request.put_request {
            writes.put.push(codec::decode(put.item)?);
        }
        if let Some(delete) = request.delete_request {
            writes.delete.push(codec::decode(delete.key)?);
        }
    }
    Ok(writes)
}

/// Re-keys a per-physical-table response map by logical table name.
pub(crate) fn demultiplex<V>(
    by_physical: HashMap<String, V>,
    physical_to_logical: &HashMap<String, String>,
) -> Result<HashMap<String, V>> {
    by_physical
        .into_iter()
        .map(|(physical, value)| {
            let logical = physical_to_logical.get(&physical).ok_or_else(|| {
                Error::decode(format!("batch response names unrequested table '{physical}'"))
            })?;
            Ok((logical.clone(), value))
        })
        .collect()
}

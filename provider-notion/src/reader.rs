//! Flat rows over a record store
//!
//! [`RecordTableReader`] drains a query through the shared
//! [`PaginatedLister`], decodes every property and attaches the reserved
//! `_id`/`_url` keys. Query failures never escape [`RecordTableReader::rows`]:
//! they come back inside the [`RowSet`].

use core_sync::pagination::{Page, PageRequest, PaginatedLister};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::client::{RecordStore, MAX_PAGE_SIZE};
use crate::decoder::{decode, decode_absent};
use crate::error::{NotionError, Result};
use crate::types::{DatabaseSchema, Record, RecordQuery, Row};

/// Default cap on records read by one call
pub const DEFAULT_MAX_ITEMS: usize = 1000;

/// Rows plus the error that cut the read short, if any
#[derive(Debug, Default)]
pub struct RowSet {
    pub rows: Vec<Row>,
    pub error: Option<NotionError>,
}

impl RowSet {
    fn failed(error: NotionError) -> Self {
        Self {
            rows: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct RecordTableReader {
    store: Arc<dyn RecordStore>,
    lister: PaginatedLister,
    query: RecordQuery,
    max_items: usize,
}

impl RecordTableReader {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            lister: PaginatedLister::new(MAX_PAGE_SIZE),
            query: RecordQuery::default(),
            max_items: DEFAULT_MAX_ITEMS,
        }
    }

    /// Filter and sort forwarded with every request
    pub fn with_query(mut self, query: RecordQuery) -> Self {
        self.query = query;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn query(&self) -> &RecordQuery {
        &self.query
    }

    /// Raw records, in store order.
    ///
    /// Falls back to a single direct request when the paginated endpoint is
    /// unavailable.
    #[instrument(skip(self), fields(max_items = self.max_items))]
    pub async fn records(&self) -> Result<Vec<Record>> {
        let store = &self.store;
        let query = &self.query;

        let drained = self
            .lister
            .drain(
                |request: PageRequest| async move {
                    let page = store
                        .query(query, request.cursor, request.page_size)
                        .await?;
                    let next = page.continuation();
                    Ok::<_, NotionError>(Page::new(page.records, next))
                },
                self.max_items,
            )
            .await;

        match drained {
            Ok(records) => Ok(records),
            Err(primary) if primary.is_unavailable() => {
                warn!(error = %primary, "Paginated query unavailable, retrying as a direct request");
                match self.store.query_direct(query).await {
                    Ok(mut records) => {
                        records.truncate(self.max_items);
                        Ok(records)
                    }
                    Err(fallback) => Err(NotionError::FallbackFailed {
                        primary: Box::new(primary),
                        fallback: Box::new(fallback),
                    }),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Every record as a [`Row`].
    ///
    /// With `columns`, each row holds exactly those columns; a column the
    /// record lacks gets the default for its schema kind. Without, each row
    /// holds every schema column plus any extra property the record carries.
    #[instrument(skip(self, columns), fields(all_columns = columns.is_none()))]
    pub async fn rows(&self, columns: Option<&[String]>) -> RowSet {
        let records = match self.records().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Record query failed, returning no rows");
                return RowSet::failed(e);
            }
        };

        let schema = match self.store.describe_schema().await {
            Ok(schema) => Some(schema),
            Err(e) => {
                warn!(error = %e, "Schema unavailable, rows cover record properties only");
                None
            }
        };

        let rows: Vec<Row> = records
            .iter()
            .map(|record| build_row(record, schema.as_ref(), columns))
            .collect();

        info!(rows = rows.len(), "Read rows");
        RowSet { rows, error: None }
    }

    pub async fn columns(&self, names: &[String]) -> RowSet {
        self.rows(Some(names)).await
    }

    pub async fn schema(&self) -> Result<DatabaseSchema> {
        self.store.describe_schema().await
    }
}

fn build_row(record: &Record, schema: Option<&DatabaseSchema>, columns: Option<&[String]>) -> Row {
    let mut row = Row::new(&record.id, record.url.as_deref());
    let value_of = |column: &str| match record.properties.get(column) {
        Some(value) => decode(value),
        None => decode_absent(schema.and_then(|s| s.kind_of(column))),
    };

    match columns {
        Some(columns) => {
            for column in columns {
                row.insert_column(column, value_of(column.as_str()));
            }
        }
        None => {
            if let Some(schema) = schema {
                for column in schema.columns.keys() {
                    row.insert_column(column, value_of(column.as_str()));
                }
            }
            for (column, value) in &record.properties {
                if row.column(column).is_none() {
                    row.insert_column(column, decode(value));
                }
            }
        }
    }
    row
}

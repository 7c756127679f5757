//! # Query Layer — find / having / order_by / fetch
//!
//! A small builder over [`ObservationLog::scan`]. Every query is a linear
//! scan of the log; there are no indexes.
//!
//! ## Semantics
//!
//! - **Filters** (`find`): every filter field must be present and equal.
//!   A record missing a filter field does not match. Integers and floats
//!   compare numerically.
//! - **`having`**: listed fields must be present.
//! - **`order_by`**: stable multi-key sort, one direction for the whole sort.
//!   Sorting fails if a matched record lacks a sort key or two values have
//!   no defined order; pair sort keys with `having` to avoid that.
//! - **`fetch`**: materializes the ordered result. Malformed log lines are
//!   skipped with a warning.

use std::cmp::Ordering;

use webwatch_core::MetaInfo;

use crate::error::StoreError;
use crate::log::{ObservationLog, StoredRecord};

/// Direction of an `order_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// A query under construction.
#[derive(Debug, Clone)]
pub struct StorageQuery<'a> {
    log: &'a ObservationLog,
    filters: MetaInfo,
    required: Vec<String>,
    order_fields: Vec<String>,
    order: SortOrder,
}

impl<'a> StorageQuery<'a> {
    pub fn new(log: &'a ObservationLog, filters: MetaInfo) -> Self {
        Self {
            log,
            filters,
            required: Vec::new(),
            order_fields: Vec::new(),
            order: SortOrder::Ascending,
        }
    }

    /// Require every field in `fields` to be present.
    pub fn having<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Sort by `fields`, in priority order.
    pub fn order_by<I, S>(mut self, fields: I, order: SortOrder) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_fields = fields.into_iter().map(Into::into).collect();
        self.order = order;
        self
    }

    /// Whether `record` passes the filters and `having` requirements.
    pub fn matches(&self, record: &StoredRecord) -> bool {
        self.filters
            .iter()
            .all(|(field, wanted)| record.get(field).is_some_and(|v| v.same_value(wanted)))
            && self.required.iter().all(|field| record.meta.contains_key(field))
    }

    /// Run the query.
    ///
    /// # Errors
    ///
    /// I/O failures reading the log, and the sort failures described in the
    /// module docs.
    pub fn fetch(&self) -> Result<Vec<StoredRecord>, StoreError> {
        let mut matched = Vec::new();
        for item in self.log.scan()? {
            match item {
                Ok(record) => {
                    if self.matches(&record) {
                        matched.push(record);
                    }
                }
                Err(StoreError::MalformedRecord { line, reason }) => {
                    tracing::warn!(
                        path = %self.log.path().display(),
                        line,
                        %reason,
                        "skipping malformed record"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        self.sort(&mut matched)?;
        tracing::debug!(matched = matched.len(), "query fetched");
        Ok(matched)
    }

    /// The first result of [`fetch`](Self::fetch), if any.
    pub fn first(&self) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self.fetch()?.into_iter().next())
    }

    fn sort(&self, records: &mut [StoredRecord]) -> Result<(), StoreError> {
        if self.order_fields.is_empty() {
            return Ok(());
        }
        for record in records.iter() {
            if let Some(field) = self
                .order_fields
                .iter()
                .find(|f| !record.meta.contains_key(f.as_str()))
            {
                return Err(StoreError::MissingSortKey {
                    field: field.clone(),
                });
            }
        }

        let mut failure = None;
        records.sort_by(|a, b| {
            let ordering = self.compare(a, b, &mut failure);
            match self.order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn compare(
        &self,
        a: &StoredRecord,
        b: &StoredRecord,
        failure: &mut Option<StoreError>,
    ) -> Ordering {
        for field in &self.order_fields {
            let (Some(left), Some(right)) = (a.get(field), b.get(field)) else {
                continue;
            };
            if left.same_value(right) {
                continue;
            }
            match left.try_cmp(right) {
                Some(Ordering::Equal) => continue,
                Some(ordering) => return ordering,
                None => {
                    if failure.is_none() {
                        *failure = Some(StoreError::Incomparable {
                            field: field.clone(),
                            left: left.kind_name(),
                            right: right.kind_name(),
                        });
                    }
                    return Ordering::Equal;
                }
            }
        }
        Ordering::Equal
    }
}

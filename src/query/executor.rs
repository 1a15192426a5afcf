//! Paginated query execution over an already-loaded set of rows.

use crate::config::ColumnType;
use crate::query::{is_deleted_flag, parse_filters, parse_order, AllowList, FieldPath, FieldValue, OrderKey, Record};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::num::IntErrorKind;
use std::sync::Arc;

/// Per-listing configuration handed to the executor at construction.
#[derive(Clone, Debug)]
pub struct QueryConfig {
    pub allowed: AllowList,
    /// Boolean column; rows where it is true are never returned.
    pub soft_delete: Option<String>,
    /// Order used when the request supplies no usable order keys.
    pub default_order: Vec<OrderKey>,
    /// Applied after every other key so page boundaries are stable.
    pub tie_break: OrderKey,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl QueryConfig {
    pub fn new(allowed: AllowList, primary_key: &str, primary_key_type: ColumnType) -> Self {
        QueryConfig {
            allowed,
            soft_delete: None,
            default_order: Vec::new(),
            tie_break: OrderKey::ascending(primary_key, FieldPath::column(primary_key), primary_key_type),
            default_page_size: 10,
            max_page_size: 1000,
        }
    }
}

/// Raw listing parameters exactly as received in the query string.
#[derive(Clone, Debug, Default)]
pub struct ListParams {
    pub filter: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
}

impl ListParams {
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        ListParams {
            filter: params.get("filter").cloned(),
            order: params.get("order").cloned(),
            page: params.get("page").cloned(),
            size: params.get("size").cloned(),
        }
    }
}

/// Effective page number and size. Values below 1 mark an unusable request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
}

impl PageRequest {
    /// Missing or blank values take the defaults; unparseable values become 0; size is capped at `max_page_size`.
    pub fn resolve(page: Option<&str>, size: Option<&str>, config: &QueryConfig) -> Self {
        let page = parse_number(page, 1);
        let size = parse_number(size, i64::from(config.default_page_size)).min(i64::from(config.max_page_size));
        PageRequest { page, size }
    }

    pub fn is_valid(&self) -> bool {
        self.page >= 1 && self.size >= 1
    }

    /// At least one page, even for an empty result. One page when size is unusable.
    pub fn total_pages(&self, count: usize) -> u64 {
        if self.size < 1 {
            return 1;
        }
        (count as u64).div_ceil(self.size as u64).max(1)
    }

    fn bounds(&self, count: usize) -> Option<(usize, usize)> {
        if !self.is_valid() || self.page as u64 > self.total_pages(count) {
            return None;
        }
        let start = usize::try_from((self.page - 1).checked_mul(self.size)?).ok()?;
        let end = start.saturating_add(self.size as usize).min(count);
        Some((start, end))
    }
}

/// Numbers too large for i64 saturate, so an oversized size is still clamped rather than rejected.
fn parse_number(raw: Option<&str>, default: i64) -> i64 {
    match raw.map(str::trim) {
        None | Some("") => default,
        Some(s) => match s.parse::<i64>() {
            Ok(n) => n,
            Err(e) => match e.kind() {
                IntErrorKind::PosOverflow => i64::MAX,
                IntErrorKind::NegOverflow => i64::MIN,
                _ => 0,
            },
        },
    }
}

/// One page of results plus metadata.
#[derive(Clone, Debug, Serialize)]
pub struct Page<R> {
    pub items: Vec<R>,
    pub total_pages: u64,
    pub page: i64,
    pub size: i64,
    /// Rows remaining after soft-delete exclusion and filtering.
    pub count: usize,
}

#[derive(Clone, Debug)]
pub struct QueryExecutor {
    config: Arc<QueryConfig>,
}

impl QueryExecutor {
    pub fn new(config: Arc<QueryConfig>) -> Self {
        QueryExecutor { config }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Soft-delete exclusion, filters, ordering, then slicing. Bad input degrades to an empty page.
    pub fn execute<R: Record>(&self, records: Vec<R>, params: &ListParams) -> Page<R> {
        let config = &*self.config;
        let loaded = records.len();

        let mut rows: Vec<R> = match &config.soft_delete {
            Some(column) => {
                let path = FieldPath::column(column.as_str());
                records.into_iter().filter(|r| !is_deleted_flag(r.field(&path))).collect()
            }
            None => records,
        };

        let predicates = params
            .filter
            .as_deref()
            .map(|raw| parse_filters(&config.allowed, raw))
            .unwrap_or_default();
        if !predicates.is_empty() {
            rows.retain(|r| predicates.iter().all(|p| p.matches(r)));
        }

        let keys = self.order_keys(params.order.as_deref());
        let rows = sort_rows(rows, &keys);

        let request = PageRequest::resolve(params.page.as_deref(), params.size.as_deref(), config);
        let count = rows.len();
        let total_pages = request.total_pages(count);
        let items: Vec<R> = match request.bounds(count) {
            Some((start, end)) => rows.into_iter().skip(start).take(end - start).collect(),
            None => Vec::new(),
        };

        tracing::debug!(
            loaded,
            matched = count,
            predicates = predicates.len(),
            order_keys = keys.len(),
            page = request.page,
            size = request.size,
            returned = items.len(),
            "paginated query"
        );

        Page {
            items,
            total_pages,
            page: request.page,
            size: request.size,
            count,
        }
    }

    fn order_keys(&self, raw: Option<&str>) -> Vec<OrderKey> {
        let config = &*self.config;
        let mut keys = raw
            .map(|raw| parse_order(&config.allowed, raw))
            .unwrap_or_default();
        if keys.is_empty() {
            keys = config.default_order.clone();
        }
        keys.push(config.tie_break.clone());
        keys
    }
}

/// Stable sort on precomputed key values. Missing values sort after present ones in ascending order.
fn sort_rows<R: Record>(rows: Vec<R>, keys: &[OrderKey]) -> Vec<R> {
    let mut decorated: Vec<(Vec<Option<FieldValue>>, R)> = rows
        .into_iter()
        .map(|row| (keys.iter().map(|k| k.value_of(&row)).collect(), row))
        .collect();
    decorated.sort_by(|(a, _), (b, _)| {
        for (i, key) in keys.iter().enumerate() {
            let ord = compare_optional(&a[i], &b[i]);
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    decorated.into_iter().map(|(_, row)| row).collect()
}

fn compare_optional(a: &Option<FieldValue>, b: &Option<FieldValue>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

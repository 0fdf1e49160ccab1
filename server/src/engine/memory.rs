//! In-memory engine.
//!
//! Tables live in a catalog behind an `RwLock`. Each table keeps its rows in
//! an `Arc<Vec<Row>>`: inserts copy-on-write, and a SELECT clones the `Arc`
//! so its cursor streams from an immutable snapshot without holding any lock.
//!
//! # Invariants
//!
//! - Every stored row has exactly one value per table column, already coerced
//!   to the column type.
//! - A cursor observes the table as it was when the statement started.
//! - Lock hold times are bounded by one statement's catalog work, never by a
//!   client's read speed.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::statement::{
    self, CompareOp, Comparison, InsertSource, OrderKey, Select, SelectItem, Source, Statement,
};
use super::{Column, DataType, EngineError, Execution, Row, RowCursor, Value};

struct Table {
    columns: Vec<Column>,
    rows: Arc<Vec<Row>>,
}

/// The embedded in-memory engine.
pub struct MemoryEngine {
    tables: RwLock<BTreeMap<String, Table>>,
    max_block_size: usize,
}

impl MemoryEngine {
    /// Create an empty engine whose cursors yield at most `max_block_size` rows per block.
    /// A zero block size is treated as one.
    #[must_use]
    pub fn new(max_block_size: usize) -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
            max_block_size: max_block_size.max(1),
        }
    }

    fn create_table(
        &self,
        name: String,
        columns: Vec<(String, DataType)>,
        if_not_exists: bool,
    ) -> Result<Execution, EngineError> {
        if name.starts_with("system.") {
            return Err(EngineError::Unsupported(format!("creating {name}")));
        }
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        if tables.contains_key(&name) {
            if if_not_exists {
                return Ok(Execution::Done);
            }
            return Err(EngineError::TableExists(name));
        }
        let columns = columns
            .into_iter()
            .map(|(name, data_type)| Column::new(name, data_type))
            .collect();
        tracing::info!("created table {name}");
        tables.insert(
            name,
            Table {
                columns,
                rows: Arc::new(Vec::new()),
            },
        );
        Ok(Execution::Done)
    }

    fn drop_table(&self, name: &str, if_exists: bool) -> Result<Execution, EngineError> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        if tables.remove(name).is_none() && !if_exists {
            return Err(EngineError::UnknownTable(name.to_owned()));
        }
        tracing::info!("dropped table {name}");
        Ok(Execution::Done)
    }

    fn truncate(&self, name: &str) -> Result<Execution, EngineError> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let table = tables
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownTable(name.to_owned()))?;
        table.rows = Arc::new(Vec::new());
        Ok(Execution::Done)
    }

    fn insert(
        &self,
        name: &str,
        columns: Option<&[String]>,
        source: InsertSource,
    ) -> Result<Execution, EngineError> {
        // Resolve the target layout under a read lock, convert rows without
        // any lock, then append under the write lock.
        let layout = {
            let tables = self.tables.read().map_err(|_| poisoned())?;
            let table = tables
                .get(name)
                .ok_or_else(|| EngineError::UnknownTable(name.to_owned()))?;
            InsertLayout::new(&table.columns, columns)?
        };

        let rows = match source {
            InsertSource::Values(rows) => rows
                .into_iter()
                .map(|row| layout.row_from_literals(row))
                .collect::<Result<Vec<Row>, EngineError>>()?,
            InsertSource::Formatted { format, data } => format
                .read_rows(&data)
                .map_err(EngineError::InvalidValue)?
                .iter()
                .map(|fields| layout.row_from_text(fields))
                .collect::<Result<Vec<Row>, EngineError>>()?,
        };

        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let table = tables
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownTable(name.to_owned()))?;
        if table.columns != layout.table_columns {
            return Err(EngineError::Internal(format!(
                "table {name} changed during insert"
            )));
        }
        let inserted = rows.len();
        Arc::make_mut(&mut table.rows).extend(rows);
        tracing::debug!("inserted {inserted} rows into {name}");
        Ok(Execution::Done)
    }

    fn show_tables(&self, format: Option<String>) -> Result<Execution, EngineError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        let rows: Vec<Row> = tables
            .keys()
            .map(|name| vec![Value::String(name.clone())])
            .collect();
        Ok(Execution::Rows {
            cursor: Box::new(BufferedCursor::new(
                vec![Column::new("name", DataType::String)],
                rows,
                self.max_block_size,
            )),
            format,
        })
    }

    fn select(&self, select: Select) -> Result<Execution, EngineError> {
        let (source_columns, source) = self.open_source(&select.from)?;
        let filter = resolve_filter(&source_columns, select.filter)?;
        let format = select.format;
        let limit = select.limit;

        if select.items == [SelectItem::Count] {
            let columns = vec![Column::new("count()", DataType::UInt64)];
            if source.is_unbounded() {
                return Err(EngineError::Unsupported(
                    "count() over an unbounded source".to_owned(),
                ));
            }
            // An unfiltered range is counted without scanning it.
            let exact = match &source {
                RowSource::Numbers {
                    next,
                    end: Some(end),
                } if filter.is_empty() => Some(end.saturating_sub(*next)),
                _ => None,
            };
            let cursor: Box<dyn RowCursor> = match (limit, exact) {
                (Some(0), _) => Box::new(BufferedCursor::new(columns, Vec::new(), 1)),
                (_, Some(count)) => Box::new(BufferedCursor::new(
                    columns,
                    vec![vec![Value::UInt(count)]],
                    1,
                )),
                _ => Box::new(CountCursor {
                    columns,
                    source,
                    filter,
                    counted: 0,
                    block_size: self.max_block_size,
                    done: false,
                }),
            };
            return Ok(Execution::Rows { cursor, format });
        }

        let (columns, projection) = resolve_projection(&source_columns, select.items)?;

        if select.order_by.is_empty() {
            let cursor = StreamingCursor {
                columns,
                source,
                filter,
                projection,
                remaining: limit,
                block_size: self.max_block_size,
            };
            return Ok(Execution::Rows {
                cursor: Box::new(cursor),
                format,
            });
        }

        if source.is_unbounded() {
            return Err(EngineError::Unsupported(
                "ORDER BY over an unbounded source".to_owned(),
            ));
        }
        let cursor = SortingCursor {
            columns,
            source,
            filter,
            keys: resolve_order(&source_columns, &select.order_by)?,
            projection,
            limit: limit.map(|limit| usize::try_from(limit).unwrap_or(usize::MAX)),
            block_size: self.max_block_size,
            rows: Vec::new(),
            cutoff: None,
            sorted: None,
        };
        Ok(Execution::Rows {
            cursor: Box::new(cursor),
            format,
        })
    }

    fn open_source(&self, source: &Source) -> Result<(Vec<Column>, RowSource), EngineError> {
        match source {
            Source::One => Ok((
                vec![Column::new("dummy", DataType::UInt8)],
                RowSource::One { done: false },
            )),
            Source::Numbers { offset, count } => Ok((
                vec![Column::new("number", DataType::UInt64)],
                RowSource::Numbers {
                    next: *offset,
                    end: count.map(|count| offset.saturating_add(count)),
                },
            )),
            Source::Table(name) => {
                let tables = self.tables.read().map_err(|_| poisoned())?;
                let table = tables
                    .get(name)
                    .ok_or_else(|| EngineError::UnknownTable(name.clone()))?;
                Ok((
                    table.columns.clone(),
                    RowSource::Snapshot {
                        rows: Arc::clone(&table.rows),
                        position: 0,
                    },
                ))
            }
        }
    }
}

impl super::QueryEngine for MemoryEngine {
    fn execute(&self, user: &str, query: &str) -> Result<Execution, EngineError> {
        let statement = statement::parse(query)?;
        tracing::debug!("user {user} executing {statement:?}");
        match statement {
            Statement::Select(select) => self.select(select),
            Statement::CreateTable {
                name,
                columns,
                if_not_exists,
            } => self.create_table(name, columns, if_not_exists),
            Statement::DropTable { name, if_exists } => self.drop_table(&name, if_exists),
            Statement::Truncate { name } => self.truncate(&name),
            Statement::Insert {
                table,
                columns,
                source,
            } => self.insert(&table, columns.as_deref(), source),
            Statement::ShowTables { format } => self.show_tables(format),
        }
    }
}

fn poisoned() -> EngineError {
    EngineError::Internal("catalog lock poisoned".to_owned())
}

/// Where each inserted field lands in the stored row.
struct InsertLayout {
    table_columns: Vec<Column>,
    /// For each provided field, the index of the table column it fills.
    targets: Vec<usize>,
}

impl InsertLayout {
    fn new(table_columns: &[Column], names: Option<&[String]>) -> Result<Self, EngineError> {
        let targets = match names {
            None => (0..table_columns.len()).collect(),
            Some(names) => {
                let mut targets = Vec::with_capacity(names.len());
                for name in names {
                    let index = column_index(table_columns, name)?;
                    if targets.contains(&index) {
                        return Err(EngineError::InvalidValue(format!(
                            "column {name} listed twice"
                        )));
                    }
                    targets.push(index);
                }
                targets
            }
        };
        Ok(Self {
            table_columns: table_columns.to_vec(),
            targets,
        })
    }

    fn check_width(&self, width: usize) -> Result<(), EngineError> {
        if width == self.targets.len() {
            return Ok(());
        }
        Err(EngineError::InvalidValue(format!(
            "expected {} values per row, got {width}",
            self.targets.len()
        )))
    }

    /// A row with every column at its type's default, filled in by `targets`.
    fn default_row(&self) -> Row {
        self.table_columns
            .iter()
            .map(|column| match column.data_type {
                DataType::String => Value::String(String::new()),
                DataType::Float32 | DataType::Float64 => Value::Float(0.0),
                DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
                    Value::Int(0)
                }
                _ => Value::UInt(0),
            })
            .collect()
    }

    fn row_from_literals(&self, literals: Vec<Value>) -> Result<Row, EngineError> {
        self.check_width(literals.len())?;
        let mut row = self.default_row();
        for (literal, &target) in literals.into_iter().zip(&self.targets) {
            row[target] = self.table_columns[target].data_type.coerce(literal)?;
        }
        Ok(row)
    }

    fn row_from_text(&self, fields: &[String]) -> Result<Row, EngineError> {
        self.check_width(fields.len())?;
        let mut row = self.default_row();
        for (field, &target) in fields.iter().zip(&self.targets) {
            row[target] = self.table_columns[target].data_type.parse_text(field)?;
        }
        Ok(row)
    }
}

fn column_index(columns: &[Column], name: &str) -> Result<usize, EngineError> {
    columns
        .iter()
        .position(|column| column.name == name)
        .ok_or_else(|| EngineError::UnknownColumn(name.to_owned()))
}

struct Predicate {
    column: usize,
    op: CompareOp,
    value: Value,
}

impl Predicate {
    fn matches(&self, row: &Row) -> bool {
        let ordering = row[self.column].total_cmp(&self.value);
        match self.op {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::NotEq => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::LtEq => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::GtEq => ordering != Ordering::Less,
        }
    }
}

fn resolve_filter(
    columns: &[Column],
    comparisons: Vec<Comparison>,
) -> Result<Vec<Predicate>, EngineError> {
    comparisons
        .into_iter()
        .map(|comparison| {
            Ok(Predicate {
                column: column_index(columns, &comparison.column)?,
                op: comparison.op,
                value: comparison.value,
            })
        })
        .collect()
}

fn matches_all(filter: &[Predicate], row: &Row) -> bool {
    filter.iter().all(|predicate| predicate.matches(row))
}

enum Projected {
    Column(usize),
    Literal(Value),
}

fn resolve_projection(
    source_columns: &[Column],
    items: Vec<SelectItem>,
) -> Result<(Vec<Column>, Vec<Projected>), EngineError> {
    let mut columns = Vec::new();
    let mut projection = Vec::new();
    for item in items {
        match item {
            SelectItem::Wildcard => {
                for (index, column) in source_columns.iter().enumerate() {
                    columns.push(column.clone());
                    projection.push(Projected::Column(index));
                }
            }
            SelectItem::Column(name) => {
                let index = column_index(source_columns, &name)?;
                columns.push(source_columns[index].clone());
                projection.push(Projected::Column(index));
            }
            SelectItem::Literal(value, text) => {
                columns.push(Column::new(text, value.literal_type()));
                projection.push(Projected::Literal(value));
            }
            SelectItem::Count => {
                return Err(EngineError::Unsupported(
                    "count() combined with other select items".to_owned(),
                ));
            }
        }
    }
    Ok((columns, projection))
}

fn project(row: &Row, projection: &[Projected]) -> Row {
    projection
        .iter()
        .map(|item| match item {
            Projected::Column(index) => row[*index].clone(),
            Projected::Literal(value) => value.clone(),
        })
        .collect()
}

fn resolve_order(columns: &[Column], keys: &[OrderKey]) -> Result<Vec<(usize, bool)>, EngineError> {
    keys.iter()
        .map(|key| Ok((column_index(columns, &key.column)?, key.descending)))
        .collect()
}

fn compare_by_keys(a: &Row, b: &Row, keys: &[(usize, bool)]) -> Ordering {
    for &(index, descending) in keys {
        let ordering = a[index].total_cmp(&b[index]);
        let ordering = if descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Source rows before filtering and projection.
enum RowSource {
    One { done: bool },
    Numbers { next: u64, end: Option<u64> },
    Snapshot { rows: Arc<Vec<Row>>, position: usize },
}

impl RowSource {
    /// Scan up to `budget` source rows, pushing those that pass `filter`.
    /// Returns `false` once the source is exhausted.
    fn scan(&mut self, budget: usize, filter: &[Predicate], out: &mut Vec<Row>) -> bool {
        match self {
            Self::One { done } => {
                if *done {
                    return false;
                }
                *done = true;
                let row = vec![Value::UInt(0)];
                if matches_all(filter, &row) {
                    out.push(row);
                }
                false
            }
            Self::Numbers { next, end } => {
                for _ in 0..budget {
                    if end.is_some_and(|end| *next >= end) {
                        return false;
                    }
                    let row = vec![Value::UInt(*next)];
                    if matches_all(filter, &row) {
                        out.push(row);
                    }
                    match next.checked_add(1) {
                        Some(value) => *next = value,
                        None => {
                            *end = Some(*next);
                            return false;
                        }
                    }
                }
                end.is_none_or(|end| *next < end)
            }
            Self::Snapshot { rows, position } => {
                let stop = position.saturating_add(budget).min(rows.len());
                out.extend(
                    rows[*position..stop]
                        .iter()
                        .filter(|row| matches_all(filter, row))
                        .cloned(),
                );
                *position = stop;
                *position < rows.len()
            }
        }
    }

    const fn is_unbounded(&self) -> bool {
        matches!(self, Self::Numbers { end: None, .. })
    }
}

/// Streams filtered, projected rows straight from the source.
struct StreamingCursor {
    columns: Vec<Column>,
    source: RowSource,
    filter: Vec<Predicate>,
    projection: Vec<Projected>,
    remaining: Option<u64>,
    block_size: usize,
}

impl RowCursor for StreamingCursor {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn next_block(&mut self) -> Result<Option<Vec<Row>>, EngineError> {
        if self.remaining == Some(0) {
            return Ok(None);
        }
        let mut matched = Vec::new();
        let more = self.source.scan(self.block_size, &self.filter, &mut matched);
        if matched.is_empty() && !more {
            return Ok(None);
        }
        if let Some(remaining) = self.remaining.as_mut() {
            let keep = usize::try_from(*remaining).unwrap_or(usize::MAX);
            matched.truncate(keep);
            *remaining -= matched.len() as u64;
        }
        if !more {
            // Drain cleanly next time even if the limit was not reached.
            self.remaining = Some(0);
        }
        Ok(Some(
            matched
                .iter()
                .map(|row| project(row, &self.projection))
                .collect(),
        ))
    }
}

/// Counts matching rows one block per call. Calls before the end of the
/// source return empty blocks; the last one returns the single count row.
struct CountCursor {
    columns: Vec<Column>,
    source: RowSource,
    filter: Vec<Predicate>,
    counted: u64,
    block_size: usize,
    done: bool,
}

impl RowCursor for CountCursor {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn next_block(&mut self) -> Result<Option<Vec<Row>>, EngineError> {
        if self.done {
            return Ok(None);
        }
        let mut matched = Vec::new();
        let more = self.source.scan(self.block_size, &self.filter, &mut matched);
        self.counted += matched.len() as u64;
        if more {
            return Ok(Some(Vec::new()));
        }
        self.done = true;
        Ok(Some(vec![vec![Value::UInt(self.counted)]]))
    }
}

/// Buffers matching rows one block per call, then serves them in order.
///
/// Under a LIMIT only the best `limit` rows survive each pruning, so memory
/// stays near `limit + block_size` rows.
struct SortingCursor {
    columns: Vec<Column>,
    source: RowSource,
    filter: Vec<Predicate>,
    keys: Vec<(usize, bool)>,
    projection: Vec<Projected>,
    limit: Option<usize>,
    block_size: usize,
    rows: Vec<Row>,
    /// Last kept row once `limit` rows are kept. Later rows must sort before it.
    cutoff: Option<Row>,
    sorted: Option<std::vec::IntoIter<Row>>,
}

impl SortingCursor {
    /// Stable sort, so ties keep their source order.
    fn sort(&mut self) {
        self.rows.sort_by(|a, b| compare_by_keys(a, b, &self.keys));
    }

    fn prune(&mut self, limit: usize) {
        self.sort();
        self.rows.truncate(limit);
        if limit > 0 && self.rows.len() == limit {
            self.cutoff = self.rows.last().cloned();
        }
    }
}

impl RowCursor for SortingCursor {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn next_block(&mut self) -> Result<Option<Vec<Row>>, EngineError> {
        if let Some(sorted) = self.sorted.as_mut() {
            let block: Vec<Row> = sorted
                .by_ref()
                .take(self.block_size)
                .map(|row| project(&row, &self.projection))
                .collect();
            return Ok((!block.is_empty()).then_some(block));
        }

        let mut fresh = Vec::new();
        let more = self.source.scan(self.block_size, &self.filter, &mut fresh);
        if let Some(cutoff) = &self.cutoff {
            fresh.retain(|row| compare_by_keys(row, cutoff, &self.keys) == Ordering::Less);
        }
        self.rows.append(&mut fresh);
        if let Some(limit) = self.limit {
            if self.rows.len() > limit.saturating_add(self.block_size) {
                self.prune(limit);
            }
        }
        if more {
            return Ok(Some(Vec::new()));
        }

        match self.limit {
            Some(limit) => self.prune(limit),
            None => self.sort(),
        }
        self.sorted = Some(std::mem::take(&mut self.rows).into_iter());
        self.next_block()
    }
}

/// Serves rows that were materialised up front.
struct BufferedCursor {
    columns: Vec<Column>,
    rows: std::vec::IntoIter<Row>,
    block_size: usize,
}

impl BufferedCursor {
    fn new(columns: Vec<Column>, rows: Vec<Row>, block_size: usize) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
            block_size,
        }
    }
}

impl RowCursor for BufferedCursor {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn next_block(&mut self) -> Result<Option<Vec<Row>>, EngineError> {
        let block: Vec<Row> = self.rows.by_ref().take(self.block_size).collect();
        if block.is_empty() {
            return Ok(None);
        }
        Ok(Some(block))
    }
}

//! Statement lowering for the memory engine.
//!
//! Text is parsed by `sqlparser` with the ClickHouse dialect and the
//! resulting AST is lowered into the few statement shapes the memory engine
//! executes. Text that does not parse is [`EngineError::Syntax`]; valid SQL
//! the engine cannot run is [`EngineError::Unsupported`].
//!
//! Two ClickHouse clauses never reach the parser as written:
//!
//! - a trailing `FORMAT <name>` on a query is cut off the token stream;
//! - the raw body of `INSERT ... FORMAT <name>` is split off the text before
//!   tokenizing, since it is row data rather than SQL.

use sqlparser::ast::{
    self as sql, BinaryOperator, CreateTableOptions, DataType as SqlDataType, Expr, FunctionArg,
    FunctionArgExpr, FunctionArguments, GroupByExpr, LimitClause, ObjectName, ObjectNamePart,
    ObjectType, OrderByKind, SetExpr, SqlOption, TableFactor, TableObject, UnaryOperator,
};
use sqlparser::dialect::ClickHouseDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};

use super::{DataType, EngineError, Value};
use crate::format::Format;

const RECURSION_LIMIT: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    CreateTable {
        name: String,
        columns: Vec<(String, DataType)>,
        if_not_exists: bool,
    },
    DropTable {
        name: String,
        if_exists: bool,
    },
    Truncate {
        name: String,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        source: InsertSource,
    },
    ShowTables {
        format: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Value>>),
    /// Raw body following `FORMAT <name>`.
    Formatted { format: Format, data: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub items: Vec<SelectItem>,
    pub from: Source,
    pub filter: Vec<Comparison>,
    pub order_by: Vec<OrderKey>,
    pub limit: Option<u64>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Wildcard,
    Column(String),
    /// A literal and its SQL rendering, which becomes its column name.
    Literal(Value, String),
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    One,
    /// `numbers(...)` or `system.numbers`; `count` is `None` when unbounded.
    Numbers { offset: u64, count: Option<u64> },
    Table(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub column: String,
    pub op: CompareOp,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub column: String,
    pub descending: bool,
}

/// Parse exactly one statement. Trailing `;` are allowed.
pub fn parse(text: &str) -> Result<Statement, EngineError> {
    if let Some(insert) = FormattedInsert::split(text) {
        return insert.lower();
    }
    let dialect = ClickHouseDialect {};
    let mut tokens = Tokenizer::new(&dialect, text).tokenize()?;
    let format = take_format_tail(&mut tokens);
    lower(parse_tokens(tokens)?, format)
}

fn parse_tokens(tokens: Vec<Token>) -> Result<sql::Statement, EngineError> {
    let dialect = ClickHouseDialect {};
    let mut statements = Parser::new(&dialect)
        .with_recursion_limit(RECURSION_LIMIT)
        .with_tokens(tokens)
        .parse_statements()?;
    if statements.len() > 1 {
        return Err(syntax(format!(
            "expected one statement, found {}",
            statements.len()
        )));
    }
    statements.pop().ok_or_else(|| syntax("empty query"))
}

fn syntax(message: impl Into<String>) -> EngineError {
    EngineError::Syntax(message.into())
}

fn unsupported(message: impl Into<String>) -> EngineError {
    EngineError::Unsupported(message.into())
}

fn trim_end(tokens: &mut Vec<Token>) {
    while matches!(tokens.last(), Some(Token::Whitespace(_) | Token::SemiColon)) {
        tokens.pop();
    }
}

/// Cut a trailing `FORMAT <name>` off the token stream and return the name.
fn take_format_tail(tokens: &mut Vec<Token>) -> Option<String> {
    trim_end(tokens);
    let name = match tokens.last() {
        Some(Token::Word(word)) => word.value.clone(),
        _ => return None,
    };
    let keyword_at = tokens[..tokens.len() - 1]
        .iter()
        .rposition(|token| !matches!(token, Token::Whitespace(_)))?;
    match &tokens[keyword_at] {
        Token::Word(word)
            if word.quote_style.is_none() && word.value.eq_ignore_ascii_case("FORMAT") => {}
        _ => return None,
    }
    tokens.truncate(keyword_at);
    Some(name)
}

/// `INSERT ... FORMAT <name> <body>` split at the end of the format name.
#[derive(Debug, PartialEq, Eq)]
struct FormattedInsert<'a> {
    /// Statement text up to and including the format name.
    head: &'a str,
    format: &'a str,
    body: &'a str,
}

impl<'a> FormattedInsert<'a> {
    /// Find the `FORMAT` keyword of an INSERT, skipping quoted text.
    /// Returns `None` for anything else, including `INSERT ... VALUES`.
    fn split(text: &'a str) -> Option<Self> {
        let bytes = text.as_bytes();
        let mut quote = None;
        let mut position = 0;
        let mut first_word = true;
        while position < bytes.len() {
            let byte = bytes[position];
            if let Some(open) = quote {
                if byte == b'\\' {
                    position += 1;
                } else if byte == open {
                    quote = None;
                }
                position += 1;
                continue;
            }
            if matches!(byte, b'\'' | b'"' | b'`') {
                quote = Some(byte);
                position += 1;
                continue;
            }
            if !is_word_byte(byte) {
                position += 1;
                continue;
            }

            let start = position;
            position = word_end(bytes, position);
            let word = &text[start..position];
            if first_word {
                if !word.eq_ignore_ascii_case("INSERT") {
                    return None;
                }
                first_word = false;
            } else if word.eq_ignore_ascii_case("VALUES") || word.eq_ignore_ascii_case("SELECT") {
                return None;
            } else if word.eq_ignore_ascii_case("FORMAT") {
                let rest = &text[position..];
                let name_start = position + (rest.len() - rest.trim_start().len());
                let name_end = word_end(bytes, name_start);
                if name_end == name_start {
                    return None;
                }
                return Some(Self {
                    head: &text[..name_end],
                    format: &text[name_start..name_end],
                    body: text[name_end..].trim_start(),
                });
            }
        }
        None
    }

    fn lower(self) -> Result<Statement, EngineError> {
        let format = Format::parse(self.format).map_err(syntax)?;
        let tokens = Tokenizer::new(&ClickHouseDialect {}, self.head).tokenize()?;
        let sql::Statement::Insert(insert) = parse_tokens(tokens)? else {
            return Err(syntax("expected INSERT before FORMAT"));
        };
        let (table, columns) = insert_target(&insert)?;
        Ok(Statement::Insert {
            table,
            columns,
            source: InsertSource::Formatted {
                format,
                data: self.body.to_owned(),
            },
        })
    }
}

const fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

fn word_end(bytes: &[u8], mut position: usize) -> usize {
    while position < bytes.len() && is_word_byte(bytes[position]) {
        position += 1;
    }
    position
}

fn lower(statement: sql::Statement, format: Option<String>) -> Result<Statement, EngineError> {
    let lowered = match statement {
        sql::Statement::Query(query) => return Ok(Statement::Select(select(*query, format)?)),
        sql::Statement::ShowTables { .. } => return Ok(Statement::ShowTables { format }),
        sql::Statement::CreateTable(create) => create_table(&create)?,
        sql::Statement::Drop {
            object_type: ObjectType::Table,
            if_exists,
            names,
            ..
        } => Statement::DropTable {
            name: only_table(names.iter())?,
            if_exists,
        },
        sql::Statement::Truncate { table_names, .. } => Statement::Truncate {
            name: only_table(table_names.iter().map(|target| &target.name))?,
        },
        sql::Statement::Insert(insert) => insert_values(insert)?,
        other => return Err(unsupported(format!("statement {other}"))),
    };
    if format.is_some() {
        return Err(syntax("FORMAT on a statement that returns no rows"));
    }
    Ok(lowered)
}

/// A possibly qualified name. `default.` is dropped; other prefixes stay.
fn table_name(name: &ObjectName) -> Result<String, EngineError> {
    let parts = name
        .0
        .iter()
        .map(|part| match part {
            ObjectNamePart::Identifier(ident) => Ok(ident.value.as_str()),
            other => Err(unsupported(format!("table name {other}"))),
        })
        .collect::<Result<Vec<&str>, EngineError>>()?;
    match parts.as_slice() {
        [table] | ["default", table] => Ok((*table).to_owned()),
        [database, table] => Ok(format!("{database}.{table}")),
        _ => Err(syntax(format!("malformed table name {name}"))),
    }
}

fn only_table<'a>(mut names: impl Iterator<Item = &'a ObjectName>) -> Result<String, EngineError> {
    match (names.next(), names.next()) {
        (Some(name), None) => table_name(name),
        (None, _) => Err(syntax("expected a table name")),
        (Some(_), Some(_)) => Err(unsupported("statements over several tables")),
    }
}

fn create_table(create: &sql::CreateTable) -> Result<Statement, EngineError> {
    if create.query.is_some() {
        return Err(unsupported("CREATE TABLE ... AS SELECT"));
    }
    if !create.constraints.is_empty() {
        return Err(unsupported("table constraints"));
    }
    check_engine(&create.table_options)?;
    if create.columns.is_empty() {
        return Err(syntax(format!("table {} has no columns", create.name)));
    }

    let mut columns: Vec<(String, DataType)> = Vec::with_capacity(create.columns.len());
    for column in &create.columns {
        let name = &column.name.value;
        if !column.options.is_empty() {
            return Err(unsupported(format!("options on column {name}")));
        }
        if columns.iter().any(|(existing, _)| existing == name) {
            return Err(syntax(format!("duplicate column {name}")));
        }
        columns.push((name.clone(), column_type(&column.data_type)?));
    }

    Ok(Statement::CreateTable {
        name: table_name(&create.name)?,
        columns,
        if_not_exists: create.if_not_exists,
    })
}

/// Only `ENGINE = Memory` is accepted, and it is also the default.
fn check_engine(options: &CreateTableOptions) -> Result<(), EngineError> {
    let options = match options {
        CreateTableOptions::None => return Ok(()),
        CreateTableOptions::Plain(options) => options,
        _ => return Err(unsupported("table options")),
    };
    for option in options {
        match option {
            SqlOption::NamedParenthesizedList(engine)
                if engine.key.value.eq_ignore_ascii_case("ENGINE") =>
            {
                let name = engine
                    .name
                    .as_ref()
                    .map_or("", |name| name.value.as_str());
                if name != "Memory" || !engine.values.is_empty() {
                    return Err(unsupported(format!("table engine {name}")));
                }
            }
            other => return Err(unsupported(format!("table option {other}"))),
        }
    }
    Ok(())
}

fn column_type(data_type: &SqlDataType) -> Result<DataType, EngineError> {
    Ok(match data_type {
        SqlDataType::UInt8 => DataType::UInt8,
        SqlDataType::UInt16 => DataType::UInt16,
        SqlDataType::UInt32 => DataType::UInt32,
        SqlDataType::UInt64 => DataType::UInt64,
        SqlDataType::Int8(None) => DataType::Int8,
        SqlDataType::Int16 => DataType::Int16,
        SqlDataType::Int32 => DataType::Int32,
        SqlDataType::Int64 => DataType::Int64,
        SqlDataType::Float32 => DataType::Float32,
        SqlDataType::Float64 => DataType::Float64,
        SqlDataType::String(None) => DataType::String,
        SqlDataType::Custom(name, modifiers) if modifiers.is_empty() => {
            DataType::parse(&name.to_string())?
        }
        other => return Err(EngineError::UnknownType(other.to_string())),
    })
}

fn insert_target(insert: &sql::Insert) -> Result<(String, Option<Vec<String>>), EngineError> {
    let TableObject::TableName(name) = &insert.table else {
        return Err(unsupported("INSERT into a table function"));
    };
    let columns = if insert.columns.is_empty() {
        None
    } else {
        Some(
            insert
                .columns
                .iter()
                .map(|ident| ident.value.clone())
                .collect(),
        )
    };
    Ok((table_name(name)?, columns))
}

fn insert_values(insert: sql::Insert) -> Result<Statement, EngineError> {
    let (table, columns) = insert_target(&insert)?;
    let Some(source) = insert.source else {
        return Err(syntax("INSERT needs VALUES or FORMAT"));
    };
    let SetExpr::Values(values) = *source.body else {
        return Err(unsupported("INSERT ... SELECT"));
    };
    let rows = values
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|expr| literal(expr).map(|(value, _)| value))
                .collect::<Result<Vec<Value>, EngineError>>()
        })
        .collect::<Result<Vec<_>, EngineError>>()?;
    Ok(Statement::Insert {
        table,
        columns,
        source: InsertSource::Values(rows),
    })
}

fn select(query: sql::Query, format: Option<String>) -> Result<Select, EngineError> {
    if query.with.is_some() {
        return Err(unsupported("WITH"));
    }
    let order_by = order_keys(query.order_by.as_ref())?;
    let limit = limit(query.limit_clause.as_ref())?;
    let SetExpr::Select(body) = *query.body else {
        return Err(unsupported("set operations and subqueries"));
    };

    let grouped = !matches!(
        &body.group_by,
        GroupByExpr::Expressions(exprs, modifiers) if exprs.is_empty() && modifiers.is_empty()
    );
    if body.distinct.is_some() || body.having.is_some() || grouped {
        return Err(unsupported("DISTINCT, GROUP BY and HAVING"));
    }

    let items = body
        .projection
        .iter()
        .map(select_item)
        .collect::<Result<Vec<_>, EngineError>>()?;
    if items.contains(&SelectItem::Count) && items.len() > 1 {
        return Err(unsupported("count() combined with other select items"));
    }

    let mut filter = Vec::new();
    if let Some(selection) = &body.selection {
        conjuncts(selection, &mut filter)?;
    }

    Ok(Select {
        items,
        from: source(&body.from)?,
        filter,
        order_by,
        limit,
        format,
    })
}

fn select_item(item: &sql::SelectItem) -> Result<SelectItem, EngineError> {
    match item {
        sql::SelectItem::Wildcard(_) => Ok(SelectItem::Wildcard),
        sql::SelectItem::UnnamedExpr(expr) => projected(expr),
        sql::SelectItem::ExprWithAlias { .. } => Err(unsupported("column aliases")),
        other => Err(unsupported(format!("select item {other}"))),
    }
}

fn projected(expr: &Expr) -> Result<SelectItem, EngineError> {
    match expr {
        Expr::Identifier(ident) if !is_float_word(ident) => Ok(SelectItem::Column(ident.value.clone())),
        Expr::Function(function) => {
            let name = function.name.to_string();
            if !name.eq_ignore_ascii_case("count") {
                return Err(unsupported(format!("function {name}")));
            }
            let bare = match &function.args {
                FunctionArguments::None => true,
                FunctionArguments::List(list) => matches!(
                    list.args.as_slice(),
                    [] | [FunctionArg::Unnamed(FunctionArgExpr::Wildcard)]
                ),
                _ => false,
            };
            if !bare {
                return Err(unsupported(format!("{function}")));
            }
            Ok(SelectItem::Count)
        }
        _ => {
            let (value, text) = literal(expr)?;
            Ok(SelectItem::Literal(value, text))
        }
    }
}

/// `inf` and `nan` parse as identifiers but are float literals.
fn is_float_word(ident: &sql::Ident) -> bool {
    ident.quote_style.is_none() && matches!(ident.value.as_str(), "inf" | "nan")
}

fn literal(expr: &Expr) -> Result<(Value, String), EngineError> {
    let value = match expr {
        Expr::Value(value) => match &value.value {
            sql::Value::Number(number, _) => Value::parse_number(number)
                .ok_or_else(|| syntax(format!("malformed number {number}")))?,
            sql::Value::SingleQuotedString(text) => Value::String(text.clone()),
            other => return Err(unsupported(format!("literal {other}"))),
        },
        Expr::Identifier(ident) if is_float_word(ident) => Value::parse_number(&ident.value)
            .ok_or_else(|| syntax(format!("malformed number {}", ident.value)))?,
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: operand,
        } => {
            let (value, _) = literal(operand)?;
            value
                .negate()
                .ok_or_else(|| syntax(format!("{expr} is not a representable number")))?
        }
        other => return Err(unsupported(format!("expression {other}"))),
    };
    Ok((value, expr.to_string()))
}

fn column_name(expr: &Expr) -> Result<String, EngineError> {
    match expr {
        Expr::Identifier(ident) => Ok(ident.value.clone()),
        other => Err(unsupported(format!("expression {other}"))),
    }
}

fn unsigned(expr: &Expr) -> Result<u64, EngineError> {
    if let Expr::Value(value) = expr {
        if let sql::Value::Number(number, _) = &value.value {
            return number
                .parse()
                .map_err(|_| syntax(format!("expected an unsigned integer, found {number}")));
        }
    }
    Err(syntax(format!("expected an unsigned integer, found {expr}")))
}

/// Flatten a WHERE clause of `column <op> literal` terms joined by AND.
fn conjuncts(expr: &Expr, out: &mut Vec<Comparison>) -> Result<(), EngineError> {
    match expr {
        Expr::Nested(inner) => conjuncts(inner, out),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            conjuncts(left, out)?;
            conjuncts(right, out)
        }
        Expr::BinaryOp { left, op, right } => {
            let op = match op {
                BinaryOperator::Eq => CompareOp::Eq,
                BinaryOperator::NotEq => CompareOp::NotEq,
                BinaryOperator::Lt => CompareOp::Lt,
                BinaryOperator::LtEq => CompareOp::LtEq,
                BinaryOperator::Gt => CompareOp::Gt,
                BinaryOperator::GtEq => CompareOp::GtEq,
                other => return Err(unsupported(format!("operator {other} in WHERE"))),
            };
            out.push(Comparison {
                column: column_name(left)?,
                op,
                value: literal(right)?.0,
            });
            Ok(())
        }
        other => Err(unsupported(format!("WHERE {other}"))),
    }
}

fn order_keys(order_by: Option<&sql::OrderBy>) -> Result<Vec<OrderKey>, EngineError> {
    let Some(order_by) = order_by else {
        return Ok(Vec::new());
    };
    let OrderByKind::Expressions(keys) = &order_by.kind else {
        return Err(unsupported("ORDER BY ALL"));
    };
    keys.iter()
        .map(|key| {
            Ok(OrderKey {
                column: column_name(&key.expr)?,
                descending: key.options.asc == Some(false),
            })
        })
        .collect()
}

fn limit(clause: Option<&LimitClause>) -> Result<Option<u64>, EngineError> {
    match clause {
        None => Ok(None),
        Some(LimitClause::LimitOffset {
            limit,
            offset: None,
            limit_by,
        }) if limit_by.is_empty() => limit.as_ref().map(unsigned).transpose(),
        Some(_) => Err(unsupported("OFFSET and LIMIT BY")),
    }
}

fn source(from: &[sql::TableWithJoins]) -> Result<Source, EngineError> {
    let relation = match from {
        [] => return Ok(Source::One),
        [table] if table.joins.is_empty() => &table.relation,
        _ => return Err(unsupported("joins and multiple tables")),
    };
    let TableFactor::Table {
        name, alias, args, ..
    } = relation
    else {
        return Err(unsupported(format!("FROM {relation}")));
    };
    if alias.is_some() {
        return Err(unsupported("table aliases"));
    }
    let name = table_name(name)?;

    if let Some(args) = args {
        if !name.eq_ignore_ascii_case("numbers") {
            return Err(unsupported(format!("table function {name}")));
        }
        let args = args
            .args
            .iter()
            .map(|arg| match arg {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => unsigned(expr),
                other => Err(syntax(format!("expected an unsigned integer, found {other}"))),
            })
            .collect::<Result<Vec<u64>, EngineError>>()?;
        return match args.as_slice() {
            [count] => Ok(Source::Numbers {
                offset: 0,
                count: Some(*count),
            }),
            [offset, count] => Ok(Source::Numbers {
                offset: *offset,
                count: Some(*count),
            }),
            _ => Err(syntax("numbers() takes one or two arguments")),
        };
    }

    Ok(match name.as_str() {
        "system.one" => Source::One,
        "system.numbers" => Source::Numbers {
            offset: 0,
            count: None,
        },
        _ => Source::Table(name),
    })
}

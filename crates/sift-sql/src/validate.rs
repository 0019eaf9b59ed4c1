//! The SQL safety gate
//!
//! Parses a candidate statement and resolves every table and column
//! reference against the manifest before the SQL is allowed anywhere near
//! a database. Problems are reported structurally, never raised: parse
//! failures short-circuit, policy violations are errors, ambiguity is a
//! warning.

use crate::manifest::TableManifest;
use serde::{Deserialize, Serialize};
use sqlparser::ast::{
    Expr, FromTable, FunctionArg, FunctionArgExpr, FunctionArguments, ObjectName, Query,
    SelectItem, SetExpr, Statement, TableFactor, TableObject, TableWithJoins,
};
use sqlparser::dialect::{dialect_from_str, GenericDialect};
use sqlparser::parser::Parser;
use std::collections::{BTreeSet, HashMap};

/// Outcome of validating one SQL statement
///
/// `ok` is true exactly when `errors` is empty; a result with only
/// warnings still passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub tables: Vec<String>,
    pub columns: Vec<String>,
}

impl ValidationResult {
    fn parse_failure(message: String) -> Self {
        Self {
            ok: false,
            errors: vec![message],
            warnings: Vec::new(),
            tables: Vec::new(),
            columns: Vec::new(),
        }
    }
}

/// Validator policy knobs
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    pub allow_writes: bool,
    pub dialect: String,
}

impl ValidationOptions {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_allow_writes(mut self, allow: bool) -> Self {
        self.allow_writes = allow;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect = dialect.into();
        self
    }
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            allow_writes: false,
            dialect: "postgres".to_string(),
        }
    }
}

/// Validate one SQL statement against the manifest
#[must_use]
pub fn validate_sql(
    sql_text: &str,
    manifest: &[TableManifest],
    options: &ValidationOptions,
) -> ValidationResult {
    let dialect = dialect_from_str(&options.dialect).unwrap_or_else(|| Box::new(GenericDialect {}));
    let statements = match Parser::parse_sql(&*dialect, sql_text) {
        Ok(statements) => statements,
        Err(err) => return ValidationResult::parse_failure(format!("SQL parse error: {err}")),
    };

    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    if statements.len() != 1 {
        errors.push("Only a single SQL statement is allowed.".to_string());
    }
    let Some(statement) = statements.first() else {
        return ValidationResult {
            ok: false,
            errors,
            warnings,
            tables: Vec::new(),
            columns: Vec::new(),
        };
    };

    if is_write_statement(statement) {
        if !options.allow_writes {
            errors.push("Write operations require allow_writes=true.".to_string());
        }
    } else if !options.allow_writes && !matches!(statement, Statement::Query { .. }) {
        warnings.push("Statement is not a typical read-only query.".to_string());
    }

    let refs = collect_references(statement);

    let by_name: HashMap<&str, &TableManifest> = manifest
        .iter()
        .map(|table| (table.name.as_str(), table))
        .collect();

    // Resolve table references first; aliases qualify columns later.
    let mut alias_map: HashMap<String, &TableManifest> = HashMap::new();
    let mut tables_used: BTreeSet<String> = BTreeSet::new();
    for table in &refs.tables {
        if table.parts.is_empty() {
            continue;
        }
        let display = table.parts.join(".");
        let bare = table.parts[table.parts.len() - 1].as_str();
        let matched = by_name
            .get(display.as_str())
            .or_else(|| by_name.get(bare))
            .copied();
        match matched {
            Some(entry) => {
                tables_used.insert(entry.name.clone());
                if let Some(alias) = &table.alias {
                    alias_map.insert(alias.clone(), entry);
                }
            }
            None => errors.push(format!("Unknown table referenced: {display}")),
        }
    }

    let mut columns_used: BTreeSet<String> = BTreeSet::new();
    for column in &refs.columns {
        match &column.qualifier {
            Some(qualifier) => {
                let resolved = alias_map
                    .get(qualifier.as_str())
                    .copied()
                    .or_else(|| by_name.get(qualifier.as_str()).copied());
                match resolved {
                    Some(table) => {
                        if !table.columns.iter().any(|col| col == &column.name) {
                            errors.push(format!(
                                "Column {} not found in table {}",
                                column.name, table.name
                            ));
                        }
                        columns_used.insert(format!("{}.{}", table.name, column.name));
                    }
                    None => {
                        check_unqualified(&column.name, manifest, &mut errors, &mut warnings);
                        columns_used.insert(format!("{}.{}", qualifier, column.name));
                    }
                }
            }
            None => {
                check_unqualified(&column.name, manifest, &mut errors, &mut warnings);
                columns_used.insert(column.name.clone());
            }
        }
    }

    ValidationResult {
        ok: errors.is_empty(),
        errors,
        warnings,
        tables: tables_used.into_iter().collect(),
        columns: columns_used.into_iter().collect(),
    }
}

/// Search the whole manifest for an unqualified (or unresolvable) column
fn check_unqualified(
    name: &str,
    manifest: &[TableManifest],
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    let matches: Vec<&str> = manifest
        .iter()
        .filter(|table| table.columns.iter().any(|col| col == name))
        .map(|table| table.name.as_str())
        .collect();
    if matches.is_empty() {
        errors.push(format!("Unknown column referenced: {name}"));
    } else if matches.len() > 1 {
        warnings.push(format!(
            "Column {name} is ambiguous across tables {matches:?}"
        ));
    }
}

fn is_write_statement(statement: &Statement) -> bool {
    matches!(
        statement,
        Statement::Insert { .. } | Statement::Update { .. } | Statement::Delete { .. }
    )
}

#[derive(Debug)]
struct TableRef {
    parts: Vec<String>,
    alias: Option<String>,
}

#[derive(Debug)]
struct ColumnRef {
    qualifier: Option<String>,
    name: String,
}

#[derive(Debug, Default)]
struct SqlReferences {
    tables: Vec<TableRef>,
    columns: Vec<ColumnRef>,
}

fn collect_references(statement: &Statement) -> SqlReferences {
    let mut collector = ReferenceCollector::default();
    collector.walk_statement(statement);
    collector.refs
}

/// Hand-rolled AST walk covering queries, CTEs, subqueries, and the write
/// statements the policy check cares about
#[derive(Default)]
struct ReferenceCollector {
    refs: SqlReferences,
}

impl ReferenceCollector {
    fn walk_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Query(query) => self.walk_query(query),
            Statement::Insert(insert) => {
                if let TableObject::TableName(name) = &insert.table {
                    self.push_table(name, None);
                }
                if let Some(source) = &insert.source {
                    self.walk_query(source);
                }
            }
            Statement::Update {
                table,
                assignments,
                selection,
                ..
            } => {
                self.walk_table_with_joins(table);
                for assignment in assignments {
                    self.walk_expr(&assignment.value);
                }
                if let Some(selection) = selection {
                    self.walk_expr(selection);
                }
            }
            Statement::Delete(delete) => {
                let tables = match &delete.from {
                    FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
                };
                for table in tables {
                    self.walk_table_with_joins(table);
                }
                if let Some(selection) = &delete.selection {
                    self.walk_expr(selection);
                }
            }
            _ => {}
        }
    }

    fn walk_query(&mut self, query: &Query) {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.walk_query(&cte.query);
            }
        }
        self.walk_set_expr(&query.body);
    }

    fn walk_set_expr(&mut self, set_expr: &SetExpr) {
        match set_expr {
            SetExpr::Select(select) => {
                for item in &select.projection {
                    match item {
                        SelectItem::UnnamedExpr(expr) => self.walk_expr(expr),
                        SelectItem::ExprWithAlias { expr, .. } => self.walk_expr(expr),
                        SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(_, _) => {}
                    }
                }
                for table in &select.from {
                    self.walk_table_with_joins(table);
                }
                if let Some(selection) = &select.selection {
                    self.walk_expr(selection);
                }
                if let Some(having) = &select.having {
                    self.walk_expr(having);
                }
            }
            SetExpr::Query(query) => self.walk_query(query),
            SetExpr::SetOperation { left, right, .. } => {
                self.walk_set_expr(left);
                self.walk_set_expr(right);
            }
            _ => {}
        }
    }

    fn walk_table_with_joins(&mut self, table: &TableWithJoins) {
        self.walk_table_factor(&table.relation);
        for join in &table.joins {
            self.walk_table_factor(&join.relation);
        }
    }

    fn walk_table_factor(&mut self, factor: &TableFactor) {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                let alias = alias.as_ref().map(|alias| alias.name.value.clone());
                self.push_table(name, alias);
            }
            TableFactor::Derived { subquery, .. } => self.walk_query(subquery),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.walk_table_with_joins(table_with_joins),
            _ => {}
        }
    }

    fn push_table(&mut self, name: &ObjectName, alias: Option<String>) {
        let parts: Vec<String> = name
            .0
            .iter()
            .map(|part| match part.as_ident() {
                Some(ident) => ident.value.clone(),
                None => part.to_string(),
            })
            .collect();
        self.refs.tables.push(TableRef { parts, alias });
    }

    fn push_column(&mut self, qualifier: Option<String>, name: String) {
        self.refs.columns.push(ColumnRef { qualifier, name });
    }

    fn walk_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Identifier(ident) => {
                self.push_column(None, ident.value.clone());
            }
            Expr::CompoundIdentifier(idents) => {
                if let Some((last, qualifier)) = idents.split_last() {
                    let qualifier = qualifier
                        .iter()
                        .map(|ident| ident.value.clone())
                        .collect::<Vec<_>>()
                        .join(".");
                    self.push_column(
                        (!qualifier.is_empty()).then_some(qualifier),
                        last.value.clone(),
                    );
                }
            }
            Expr::BinaryOp { left, right, .. } => {
                self.walk_expr(left);
                self.walk_expr(right);
            }
            Expr::UnaryOp { expr, .. } => self.walk_expr(expr),
            Expr::Cast { expr, .. } => self.walk_expr(expr),
            Expr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => {
                if let Some(operand) = operand {
                    self.walk_expr(operand);
                }
                for case_when in conditions {
                    self.walk_expr(&case_when.condition);
                    self.walk_expr(&case_when.result);
                }
                if let Some(else_result) = else_result {
                    self.walk_expr(else_result);
                }
            }
            Expr::Function(func) => {
                if let FunctionArguments::List(arg_list) = &func.args {
                    for arg in &arg_list.args {
                        match arg {
                            FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => {
                                self.walk_expr(expr)
                            }
                            FunctionArg::Named {
                                arg: FunctionArgExpr::Expr(expr),
                                ..
                            } => self.walk_expr(expr),
                            _ => {}
                        }
                    }
                }
            }
            Expr::Subquery(query) => self.walk_query(query),
            Expr::InList { expr, list, .. } => {
                self.walk_expr(expr);
                for item in list {
                    self.walk_expr(item);
                }
            }
            Expr::InSubquery { expr, subquery, .. } => {
                self.walk_expr(expr);
                self.walk_query(subquery);
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.walk_expr(expr);
                self.walk_expr(low);
                self.walk_expr(high);
            }
            Expr::IsNull(expr) | Expr::IsNotNull(expr) => self.walk_expr(expr),
            Expr::Like { expr, pattern, .. }
            | Expr::ILike { expr, pattern, .. }
            | Expr::SimilarTo { expr, pattern, .. } => {
                self.walk_expr(expr);
                self.walk_expr(pattern);
            }
            Expr::Exists { subquery, .. } => self.walk_query(subquery),
            Expr::IsDistinctFrom(left, right) | Expr::IsNotDistinctFrom(left, right) => {
                self.walk_expr(left);
                self.walk_expr(right);
            }
            Expr::Nested(expr) => self.walk_expr(expr),
            Expr::Extract { expr, .. } => self.walk_expr(expr),
            Expr::Substring {
                expr,
                substring_from,
                substring_for,
                ..
            } => {
                self.walk_expr(expr);
                if let Some(from) = substring_from {
                    self.walk_expr(from);
                }
                if let Some(for_expr) = substring_for {
                    self.walk_expr(for_expr);
                }
            }
            Expr::Trim { expr, trim_what, .. } => {
                self.walk_expr(expr);
                if let Some(what) = trim_what {
                    self.walk_expr(what);
                }
            }
            Expr::Collate { expr, .. } => self.walk_expr(expr),
            Expr::Tuple(exprs) => {
                for expr in exprs {
                    self.walk_expr(expr);
                }
            }
            Expr::Interval(interval) => self.walk_expr(&interval.value),
            _ => {}
        }
    }
}

//! Narrow facts extracted from a parsed SQL statement.
//!
//! `StatementSummary` is the only surface the validators see: statement
//! kind, referenced tables, referenced columns, function-call names, and
//! per-SELECT shape facts. The rest of the pipeline never touches
//! `sqlparser` types directly.

use crate::error::{Result, WardError};
use sqlparser::ast::{
    Expr, Function, FunctionArg, FunctionArgExpr, GroupByExpr, Join, JoinConstraint,
    JoinOperator, ObjectName, Query, Select, SelectItem, SetExpr, Statement, TableFactor,
    TableWithJoins, WindowSpec, WindowType,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::collections::BTreeSet;

/// Coarse classification of a single statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Truncate,
    Other,
}

/// One column reference, optionally qualified. Alias qualifiers are kept
/// literally; no alias resolution happens here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn unqualified(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    /// `table.column` for qualified references, the bare name otherwise.
    pub fn label(&self) -> String {
        match &self.table {
            Some(table) => format!("{}.{}", table, self.column),
            None => self.column.clone(),
        }
    }
}

/// Shape facts for one SELECT node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectFacts {
    pub projection_count: usize,
    pub has_wildcard: bool,
    pub has_from: bool,
    pub has_into: bool,
}

#[derive(Debug, Clone)]
pub struct StatementSummary {
    pub kind: StatementKind,
    /// Final identifier of every referenced object name. CTE names
    /// referenced in FROM count literally as table references.
    pub tables: BTreeSet<String>,
    pub columns: BTreeSet<ColumnRef>,
    /// Lowercased names of every function call in the tree.
    pub functions: BTreeSet<String>,
    /// Facts for the statement's top-level body when it is a plain SELECT.
    pub top_select: Option<SelectFacts>,
    /// Facts for every SELECT node in the tree, subqueries included.
    pub selects: Vec<SelectFacts>,
}

impl StatementSummary {
    /// Parse exactly one statement in the Postgres dialect and collect its
    /// facts. Zero or multiple statements and parser failures are
    /// `WardError::Syntax`.
    pub fn parse(sql: &str) -> Result<Self> {
        let dialect = PostgreSqlDialect {};
        let statements = Parser::parse_sql(&dialect, sql)
            .map_err(|e| WardError::Syntax(e.to_string()))?;
        if statements.len() != 1 {
            return Err(WardError::Syntax(
                "expected exactly one SQL statement".to_string(),
            ));
        }
        let statement = &statements[0];

        let top_select = match statement {
            Statement::Query(query) => match query.body.as_ref() {
                SetExpr::Select(select) => Some(select_facts(select)),
                _ => None,
            },
            _ => None,
        };

        let mut summary = Self {
            kind: classify(statement),
            tables: BTreeSet::new(),
            columns: BTreeSet::new(),
            functions: BTreeSet::new(),
            top_select,
            selects: Vec::new(),
        };
        summary.collect_statement(statement);
        Ok(summary)
    }

    fn add_object_name(&mut self, name: &ObjectName) {
        if let Some(last) = name.0.last() {
            self.tables.insert(last.value.clone());
        }
    }

    /// Compound identifier path: the last part is the column, the part
    /// before it the qualifier.
    fn add_ident_path(&mut self, parts: &[sqlparser::ast::Ident]) {
        match parts {
            [] => {}
            [column] => {
                self.columns.insert(ColumnRef::unqualified(column.value.clone()));
            }
            [.., table, column] => {
                self.columns
                    .insert(ColumnRef::qualified(table.value.clone(), column.value.clone()));
            }
        }
    }

    fn collect_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Query(query) => self.collect_query(query),
            Statement::Insert {
                table_name,
                columns,
                source,
                ..
            } => {
                self.add_object_name(table_name);
                for column in columns {
                    self.columns.insert(ColumnRef::unqualified(column.value.clone()));
                }
                self.collect_query(source);
            }
            Statement::Update {
                table,
                assignments,
                from,
                selection,
                ..
            } => {
                self.collect_table_with_joins(table);
                for assignment in assignments {
                    self.add_ident_path(&assignment.id);
                    self.collect_expr(&assignment.value);
                }
                if let Some(from) = from {
                    self.collect_table_with_joins(from);
                }
                if let Some(selection) = selection {
                    self.collect_expr(selection);
                }
            }
            Statement::Delete {
                tables,
                from,
                using,
                selection,
                ..
            } => {
                for name in tables {
                    self.add_object_name(name);
                }
                for twj in from {
                    self.collect_table_with_joins(twj);
                }
                if let Some(using) = using {
                    for twj in using {
                        self.collect_table_with_joins(twj);
                    }
                }
                if let Some(selection) = selection {
                    self.collect_expr(selection);
                }
            }
            Statement::CreateTable { name, query, .. } => {
                self.add_object_name(name);
                if let Some(query) = query {
                    self.collect_query(query);
                }
            }
            Statement::CreateView { name, query, .. } => {
                self.add_object_name(name);
                self.collect_query(query);
            }
            Statement::CreateIndex { table_name, .. } => {
                self.add_object_name(table_name);
            }
            Statement::Drop { names, .. } => {
                for name in names {
                    self.add_object_name(name);
                }
            }
            Statement::AlterTable { name, .. } => {
                self.add_object_name(name);
            }
            Statement::Truncate { table_name, .. } => {
                self.add_object_name(table_name);
            }
            _ => {}
        }
    }

    fn collect_query(&mut self, query: &Query) {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.collect_query(&cte.query);
            }
        }
        self.collect_set_expr(&query.body);
        for order_by in &query.order_by {
            self.collect_expr(&order_by.expr);
        }
        if let Some(limit) = &query.limit {
            self.collect_expr(limit);
        }
        if let Some(offset) = &query.offset {
            self.collect_expr(&offset.value);
        }
    }

    fn collect_set_expr(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => self.collect_select(select),
            SetExpr::Query(query) => self.collect_query(query),
            SetExpr::SetOperation { left, right, .. } => {
                self.collect_set_expr(left);
                self.collect_set_expr(right);
            }
            SetExpr::Values(values) => {
                for row in &values.rows {
                    for expr in row {
                        self.collect_expr(expr);
                    }
                }
            }
            SetExpr::Insert(statement) | SetExpr::Update(statement) => {
                self.collect_statement(statement);
            }
            _ => {}
        }
    }

    fn collect_select(&mut self, select: &Select) {
        self.selects.push(select_facts(select));

        if let Some(into) = &select.into {
            self.add_object_name(&into.name);
        }
        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                    self.collect_expr(expr);
                }
                SelectItem::QualifiedWildcard(..) | SelectItem::Wildcard(..) => {}
            }
        }
        for twj in &select.from {
            self.collect_table_with_joins(twj);
        }
        if let Some(selection) = &select.selection {
            self.collect_expr(selection);
        }
        match &select.group_by {
            GroupByExpr::Expressions(exprs) => {
                for expr in exprs {
                    self.collect_expr(expr);
                }
            }
            GroupByExpr::All => {}
        }
        for expr in &select.cluster_by {
            self.collect_expr(expr);
        }
        for expr in &select.distribute_by {
            self.collect_expr(expr);
        }
        for expr in &select.sort_by {
            self.collect_expr(expr);
        }
        if let Some(having) = &select.having {
            self.collect_expr(having);
        }
        if let Some(qualify) = &select.qualify {
            self.collect_expr(qualify);
        }
    }

    fn collect_table_with_joins(&mut self, twj: &TableWithJoins) {
        self.collect_table_factor(&twj.relation);
        for join in &twj.joins {
            self.collect_join(join);
        }
    }

    fn collect_join(&mut self, join: &Join) {
        self.collect_table_factor(&join.relation);
        match &join.join_operator {
            JoinOperator::Inner(constraint)
            | JoinOperator::LeftOuter(constraint)
            | JoinOperator::RightOuter(constraint)
            | JoinOperator::FullOuter(constraint)
            | JoinOperator::LeftSemi(constraint)
            | JoinOperator::RightSemi(constraint)
            | JoinOperator::LeftAnti(constraint)
            | JoinOperator::RightAnti(constraint) => match constraint {
                JoinConstraint::On(expr) => self.collect_expr(expr),
                JoinConstraint::Using(columns) => {
                    for column in columns {
                        self.columns.insert(ColumnRef::unqualified(column.value.clone()));
                    }
                }
                JoinConstraint::Natural | JoinConstraint::None => {}
            },
            _ => {}
        }
    }

    fn collect_table_factor(&mut self, factor: &TableFactor) {
        match factor {
            TableFactor::Table { name, args, .. } => {
                self.add_object_name(name);
                if let Some(args) = args {
                    for arg in args {
                        self.collect_function_arg(arg);
                    }
                }
            }
            TableFactor::Derived { subquery, .. } => self.collect_query(subquery),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.collect_table_with_joins(table_with_joins),
            _ => {}
        }
    }

    fn collect_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Identifier(ident) => {
                self.columns.insert(ColumnRef::unqualified(ident.value.clone()));
            }
            Expr::CompoundIdentifier(parts) => self.add_ident_path(parts),
            Expr::BinaryOp { left, right, .. } => {
                self.collect_expr(left);
                self.collect_expr(right);
            }
            Expr::UnaryOp { expr, .. }
            | Expr::Nested(expr)
            | Expr::IsNull(expr)
            | Expr::IsNotNull(expr)
            | Expr::IsTrue(expr)
            | Expr::IsNotTrue(expr)
            | Expr::IsFalse(expr)
            | Expr::IsNotFalse(expr)
            | Expr::IsUnknown(expr)
            | Expr::IsNotUnknown(expr) => self.collect_expr(expr),
            Expr::IsDistinctFrom(left, right) | Expr::IsNotDistinctFrom(left, right) => {
                self.collect_expr(left);
                self.collect_expr(right);
            }
            Expr::InList { expr, list, .. } => {
                self.collect_expr(expr);
                for item in list {
                    self.collect_expr(item);
                }
            }
            Expr::InSubquery { expr, subquery, .. } => {
                self.collect_expr(expr);
                self.collect_query(subquery);
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.collect_expr(expr);
                self.collect_expr(low);
                self.collect_expr(high);
            }
            Expr::Like { expr, pattern, .. }
            | Expr::ILike { expr, pattern, .. }
            | Expr::SimilarTo { expr, pattern, .. } => {
                self.collect_expr(expr);
                self.collect_expr(pattern);
            }
            Expr::Cast { expr, .. } | Expr::TryCast { expr, .. } => self.collect_expr(expr),
            Expr::Extract { expr, .. } => self.collect_expr(expr),
            Expr::Function(function) => self.collect_function(function),
            Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => {
                if let Some(operand) = operand {
                    self.collect_expr(operand);
                }
                for condition in conditions {
                    self.collect_expr(condition);
                }
                for result in results {
                    self.collect_expr(result);
                }
                if let Some(else_result) = else_result {
                    self.collect_expr(else_result);
                }
            }
            Expr::Exists { subquery, .. } => self.collect_query(subquery),
            Expr::Subquery(query) => self.collect_query(query),
            Expr::Tuple(exprs) => {
                for expr in exprs {
                    self.collect_expr(expr);
                }
            }
            _ => {}
        }
    }

    fn collect_function(&mut self, function: &Function) {
        if let Some(last) = function.name.0.last() {
            self.functions.insert(last.value.to_lowercase());
        }
        for arg in &function.args {
            self.collect_function_arg(arg);
        }
        if let Some(filter) = &function.filter {
            self.collect_expr(filter);
        }
        if let Some(WindowType::WindowSpec(spec)) = &function.over {
            self.collect_window_spec(spec);
        }
        for order_by in &function.order_by {
            self.collect_expr(&order_by.expr);
        }
    }

    fn collect_function_arg(&mut self, arg: &FunctionArg) {
        match arg {
            FunctionArg::Named { arg, .. } | FunctionArg::Unnamed(arg) => match arg {
                FunctionArgExpr::Expr(expr) => self.collect_expr(expr),
                // count(*)'s wildcard is not a projection wildcard.
                FunctionArgExpr::QualifiedWildcard(_) | FunctionArgExpr::Wildcard => {}
            },
        }
    }

    fn collect_window_spec(&mut self, spec: &WindowSpec) {
        for expr in &spec.partition_by {
            self.collect_expr(expr);
        }
        for order_by in &spec.order_by {
            self.collect_expr(&order_by.expr);
        }
    }
}

fn select_facts(select: &Select) -> SelectFacts {
    SelectFacts {
        projection_count: select.projection.len(),
        has_wildcard: select
            .projection
            .iter()
            .any(|item| matches!(item, SelectItem::Wildcard(..) | SelectItem::QualifiedWildcard(..))),
        has_from: !select.from.is_empty(),
        has_into: select.into.is_some(),
    }
}

fn classify(statement: &Statement) -> StatementKind {
    match statement {
        Statement::Query(_) => StatementKind::Select,
        Statement::Insert { .. } => StatementKind::Insert,
        Statement::Update { .. } => StatementKind::Update,
        Statement::Delete { .. } => StatementKind::Delete,
        Statement::CreateTable { .. }
        | Statement::CreateView { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. } => StatementKind::Create,
        Statement::Drop { .. } => StatementKind::Drop,
        Statement::AlterTable { .. } | Statement::AlterIndex { .. } | Statement::AlterView { .. } => {
            StatementKind::Alter
        }
        Statement::Truncate { .. } => StatementKind::Truncate,
        _ => StatementKind::Other,
    }
}

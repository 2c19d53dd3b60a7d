//! Query compatibility checks
//!
//! Best-effort check of SQL statements against a target schema. Statements are
//! tokenized, not parsed into a full AST: table names are picked up from table
//! positions (`FROM`, `JOIN`, `INTO`, `UPDATE`, `TABLE`) and column references from
//! two-part `table.column` identifiers. Aliases, CTE names and subquery scopes are
//! not resolved.

use crate::analysis::schema::SchemaDocument;
use crate::analysis::types::QueryValidationResult;
use indexmap::IndexSet;
use sqlparser::dialect::GenericDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer, Word};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::info;

/// Table and column names referenced by one statement, in first-seen order
#[derive(Debug, Default, PartialEq, Eq)]
pub struct References {
    pub tables: IndexSet<String>,
    pub columns: IndexSet<(String, String)>,
}

pub struct QueryValidator;

impl QueryValidator {
    /// Validate each query against the schema; one result per query, same order
    pub fn validate_queries(queries: &[String], schema: &SchemaDocument) -> Vec<QueryValidationResult> {
        Self::validate_queries_timed(queries, schema, |_| {})
    }

    /// Like `validate_queries`, reporting how long each query took to `observe`
    pub fn validate_queries_timed(
        queries: &[String],
        schema: &SchemaDocument,
        mut observe: impl FnMut(Duration),
    ) -> Vec<QueryValidationResult> {
        let index = SchemaIndex::new(schema);

        let results: Vec<_> = queries
            .iter()
            .map(|query| {
                let started = Instant::now();
                let result = Self::validate_query(query, &index);
                observe(started.elapsed());
                result
            })
            .collect();

        info!(
            num_queries = queries.len(),
            num_invalid = results.iter().filter(|r| !r.is_valid).count(),
            "Completed query validation"
        );

        results
    }

    fn validate_query(query: &str, index: &SchemaIndex<'_>) -> QueryValidationResult {
        let mut errors = Vec::new();

        match tokenize_statement(query) {
            Ok(tokens) => {
                let refs = extract_references(&tokens);

                for table in &refs.tables {
                    if !index.has_table(table) {
                        errors.push(format!("Referenced table not found: {}", table));
                    }
                }

                for (table, column) in &refs.columns {
                    // unknown tables were either reported above or are aliases
                    if index.has_table(table) && !index.has_column(table, column) {
                        errors.push(format!("Referenced column not found: {}.{}", table, column));
                    }
                }
            }
            Err(problem) => errors.push(format!("Query parsing error: {}", problem)),
        }

        QueryValidationResult {
            query: query.to_string(),
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Table name -> column names, last definition wins
struct SchemaIndex<'a> {
    tables: HashMap<&'a str, HashSet<&'a str>>,
}

impl<'a> SchemaIndex<'a> {
    fn new(schema: &'a SchemaDocument) -> Self {
        let tables = schema
            .tables
            .iter()
            .map(|t| (t.name.as_str(), t.columns.iter().map(|c| c.name.as_str()).collect()))
            .collect();
        Self { tables }
    }

    fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(table)
            .is_some_and(|columns| columns.contains(column))
    }
}

/// Tokenize a single statement, dropping whitespace and comments
pub fn tokenize_statement(query: &str) -> Result<Vec<Token>, String> {
    let dialect = GenericDialect {};
    let mut tokens: Vec<Token> = Tokenizer::new(&dialect, query)
        .tokenize()
        .map_err(|e| e.to_string())?
        .into_iter()
        .filter(|t| !matches!(t, Token::Whitespace(_) | Token::EOF))
        .collect();

    while matches!(tokens.last(), Some(Token::SemiColon)) {
        tokens.pop();
    }

    if tokens.is_empty() {
        return Err("empty statement".to_string());
    }

    if tokens.iter().any(|t| matches!(t, Token::SemiColon)) {
        return Err("multi-statement batches are not supported".to_string());
    }

    let mut depth = 0i32;
    for token in &tokens {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth < 0 {
                    return Err("unbalanced parentheses".to_string());
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unbalanced parentheses".to_string());
    }

    Ok(tokens)
}

/// Pull table and column references out of a token stream
pub fn extract_references(tokens: &[Token]) -> References {
    let mut refs = References::default();

    // next name is in table position
    let mut expect_table = false;
    // inside a FROM list, where a comma introduces another table
    let mut in_from_list = false;
    // per paren level: has this level seen SELECT/DELETE/UPDATE, so FROM means a table
    let mut frames: Vec<bool> = vec![false];

    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            // FOR UPDATE, ON DUPLICATE KEY UPDATE, DO UPDATE: a clause, not a statement
            Token::Word(word)
                if is_bare_keyword(word)
                    && word.keyword == Keyword::UPDATE
                    && follows_clause_keyword(tokens, i) =>
            {
                expect_table = false;
                in_from_list = false;
                i += 1;
            }
            Token::Word(word) if is_bare_keyword(word) && introduces_statement(word.keyword) => {
                if let Some(frame) = frames.last_mut() {
                    *frame = true;
                }
                if word.keyword == Keyword::UPDATE {
                    expect_table = true;
                }
                in_from_list = false;
                i += 1;
            }
            Token::Word(word) if is_bare_keyword(word) && word.keyword == Keyword::FROM => {
                let is_table_from = frames.last().copied().unwrap_or(false);
                expect_table = is_table_from;
                in_from_list = is_table_from;
                i += 1;
            }
            Token::Word(word) if is_bare_keyword(word) && introduces_table(word.keyword) => {
                expect_table = true;
                in_from_list = false;
                i += 1;
            }
            Token::Word(word) if is_bare_keyword(word) && expect_table && is_table_modifier(word.keyword) => {
                i += 1;
            }
            Token::Word(word) if is_bare_keyword(word) && ends_table_list(word.keyword) => {
                expect_table = false;
                in_from_list = false;
                i += 1;
            }
            Token::Word(_) => {
                let path = read_path(tokens, i);
                i = path.next;

                if expect_table {
                    // INSERT INTO t (a, b) puts a paren right after the table name
                    if let Some(table) = path.parts.last() {
                        refs.tables.insert(table.to_string());
                    }
                    expect_table = false;
                } else if path.is_call {
                    continue;
                } else if !path.wildcard && path.parts.len() == 2 {
                    refs.columns
                        .insert((path.parts[0].to_string(), path.parts[1].to_string()));
                }
            }
            Token::Comma => {
                if in_from_list {
                    expect_table = true;
                }
                i += 1;
            }
            Token::LParen => {
                frames.push(false);
                expect_table = false;
                in_from_list = false;
                i += 1;
            }
            Token::RParen => {
                if frames.len() > 1 {
                    frames.pop();
                }
                expect_table = false;
                in_from_list = false;
                i += 1;
            }
            _ => i += 1,
        }
    }

    refs
}

/// A dotted name such as `a`, `a.b` or `a.*`
struct NamePath<'t> {
    parts: Vec<&'t str>,
    wildcard: bool,
    /// followed by `(`: a function name, not a reference
    is_call: bool,
    next: usize,
}

fn read_path(tokens: &[Token], start: usize) -> NamePath<'_> {
    let mut parts = Vec::new();
    let mut wildcard = false;
    let mut j = start;

    if let Some(Token::Word(word)) = tokens.get(j) {
        parts.push(word.value.as_str());
        j += 1;
    }

    while let Some(Token::Period) = tokens.get(j) {
        match tokens.get(j + 1) {
            Some(Token::Word(word)) => {
                parts.push(word.value.as_str());
                j += 2;
            }
            Some(Token::Mul) => {
                wildcard = true;
                j += 2;
                break;
            }
            _ => break,
        }
    }

    let is_call = matches!(tokens.get(j), Some(Token::LParen));

    NamePath {
        parts,
        wildcard,
        is_call,
        next: j,
    }
}

fn is_bare_keyword(word: &Word) -> bool {
    word.quote_style.is_none() && word.keyword != Keyword::NoKeyword
}

fn follows_clause_keyword(tokens: &[Token], i: usize) -> bool {
    match i.checked_sub(1).and_then(|p| tokens.get(p)) {
        Some(Token::Word(prev)) => {
            is_bare_keyword(prev) && matches!(prev.keyword, Keyword::FOR | Keyword::KEY | Keyword::DO)
        }
        _ => false,
    }
}

fn introduces_statement(keyword: Keyword) -> bool {
    matches!(keyword, Keyword::SELECT | Keyword::DELETE | Keyword::UPDATE)
}

fn introduces_table(keyword: Keyword) -> bool {
    matches!(keyword, Keyword::JOIN | Keyword::INTO | Keyword::TABLE)
}

fn is_table_modifier(keyword: Keyword) -> bool {
    matches!(
        keyword,
        Keyword::ONLY | Keyword::LATERAL | Keyword::IF | Keyword::NOT | Keyword::EXISTS
    )
}

fn ends_table_list(keyword: Keyword) -> bool {
    matches!(
        keyword,
        Keyword::WHERE
            | Keyword::GROUP
            | Keyword::ORDER
            | Keyword::LIMIT
            | Keyword::HAVING
            | Keyword::ON
            | Keyword::USING
            | Keyword::UNION
            | Keyword::EXCEPT
            | Keyword::INTERSECT
            | Keyword::WINDOW
            | Keyword::OFFSET
            | Keyword::FETCH
            | Keyword::RETURNING
            | Keyword::SET
            | Keyword::VALUES
            | Keyword::INNER
            | Keyword::LEFT
            | Keyword::RIGHT
            | Keyword::FULL
            | Keyword::CROSS
            | Keyword::NATURAL
            | Keyword::OUTER
            | Keyword::FOR
            | Keyword::NOWAIT
            | Keyword::SKIP
    )
}

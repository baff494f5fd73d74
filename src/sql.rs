//! SQL `SELECT` 부분집합을 `doQuery` 파라미터로 번역합니다.
//!
//! ```text
//! SELECT cols | * | count(*) FROM table
//!     [WHERE f = 'v' {AND|OR f <> 'v'}]
//!     [ORDER BY f, ... [ASC|DESC]]
//!     [LIMIT n] [OFFSET n]
//! ```
//!
//! 공백이 들어간 필드 이름은 `[Record ID#]`처럼 대괄호로 감쌉니다.
//! 숫자 이름은 같은 라벨의 필드가 없으면 field id로 해석합니다.

use tracing::debug;

use crate::client::Client;
use crate::encoding::is_base32_id;
use crate::error::{QdbError, Result};
use crate::query::QueryOptions;
use crate::schema::{NameCase, Schema};
use crate::transport::Transport;
use crate::types::{FieldValues, Selector};

/// 조회할 열
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlColumns {
    /// `*`
    All,
    /// `count(*)`
    Count,
    Named(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `=` → `TV`
    Eq,
    /// `<>`, `!=` → `XTV`
    NotEq,
}

/// `WHERE` 조건 하나. 첫 조건의 `connector`는 `None`입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlCondition {
    pub connector: Option<Connector>,
    pub field: String,
    pub op: Comparison,
    pub value: String,
}

/// 해석된 `SELECT` 문
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlSelect {
    pub columns: SqlColumns,
    pub table: String,
    pub conditions: Vec<SqlCondition>,
    pub order_by: Vec<String>,
    pub descending: bool,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// 스키마로 번역한 `doQuery` 파라미터
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParts {
    /// 결과 열 이름 (요청 순서)
    pub names: Vec<String>,
    pub criteria: Option<String>,
    pub clist: Option<String>,
    pub slist: Option<String>,
    pub options: Option<String>,
}

impl QueryParts {
    pub fn selector(&self) -> Selector {
        match &self.criteria {
            Some(criteria) => Selector::criteria(criteria.clone()),
            None => Selector::All,
        }
    }
}

/// [`Client::do_sql_query`] 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlResult {
    Count(u64),
    Rows(FieldValues),
}

/// SQL 문을 해석합니다.
///
/// # 예시
///
/// ```
/// use qdbapi::sql::{parse_select, SqlColumns};
///
/// let select = parse_select("SELECT Customer, Amount FROM Orders WHERE Status = 'Open' LIMIT 10").unwrap();
/// assert_eq!(select.columns, SqlColumns::Named(vec!["Customer".into(), "Amount".into()]));
/// assert_eq!(select.table, "Orders");
/// assert_eq!(select.limit, Some(10));
/// ```
///
/// # 에러
///
/// - [`QdbError::SqlSyntax`]: 구문 오류 (위치는 바이트 오프셋)
pub fn parse_select(input: &str) -> Result<SqlSelect> {
    let mut parser = SqlParser::new(input);
    let select = parser.parse_select()?;
    parser.expect_end()?;
    Ok(select)
}

impl SqlSelect {
    /// 필드 이름을 field id로 바꿔 criteria, clist, slist, options를 만듭니다.
    ///
    /// # 에러
    ///
    /// - [`QdbError::UnknownField`]: 스키마에 없는 필드 이름
    pub fn to_query_parts(&self, schema: &Schema) -> Result<QueryParts> {
        let resolve = |name: &str| -> Result<u32> {
            let name = self.unqualified(name);
            schema
                .resolve_field_id(name)
                .ok_or_else(|| QdbError::UnknownField {
                    table_id: schema.table_id.clone(),
                    name: name.to_string(),
                })
        };

        let mut parts = QueryParts::default();
        match &self.columns {
            SqlColumns::Count => {}
            SqlColumns::All => {
                parts.names = schema.field_names(false, NameCase::AsIs);
                parts.clist = Some(join_ids(schema.field_ids(false)));
            }
            SqlColumns::Named(columns) => {
                let mut ids = Vec::new();
                for column in columns {
                    let fid = resolve(column.as_str())?;
                    let name = self.unqualified(column);
                    // NOTE: a literal field id is reported under its label
                    let label = match schema.field_id(name) {
                        Some(_) => name.to_string(),
                        None => schema.field_label(fid).unwrap_or(name).to_string(),
                    };
                    parts.names.push(label);
                    ids.push(fid);
                }
                parts.clist = Some(join_ids(ids));
            }
        }

        if !self.conditions.is_empty() {
            let mut criteria = String::new();
            for condition in &self.conditions {
                match condition.connector {
                    Some(Connector::And) => criteria.push_str("AND"),
                    Some(Connector::Or) => criteria.push_str("OR"),
                    None => {}
                }
                let op = match condition.op {
                    Comparison::Eq => "TV",
                    Comparison::NotEq => "XTV",
                };
                let fid = resolve(condition.field.as_str())?;
                criteria.push_str(&format!("{{'{fid}'.{op}.'{}'}}", condition.value));
            }
            parts.criteria = Some(criteria);
        }

        if !self.order_by.is_empty() {
            let ids = self
                .order_by
                .iter()
                .map(|name| resolve(name.as_str()))
                .collect::<Result<Vec<_>>>()?;
            parts.slist = Some(join_ids(ids));
        }

        let mut options = Vec::new();
        if let Some(limit) = self.limit {
            options.push(format!("num-{limit}"));
        }
        if let Some(offset) = self.offset {
            options.push(format!("skp-{offset}"));
        }
        if self.descending {
            options.push("sortorder-D".to_string());
        }
        if !options.is_empty() {
            parts.options = Some(options.join("."));
        }
        Ok(parts)
    }

    /// `Orders.Customer` → `Customer` (FROM 테이블 이름이 접두어일 때만)
    fn unqualified<'a>(&self, name: &'a str) -> &'a str {
        match name.split_once('.') {
            Some((prefix, rest)) if prefix.eq_ignore_ascii_case(&self.table) => rest,
            _ => name,
        }
    }
}

fn join_ids(ids: impl IntoIterator<Item = u32>) -> String {
    ids.into_iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

impl<T: Transport> Client<T> {
    /// SQL `SELECT`를 실행합니다.
    ///
    /// FROM 이름은 활성 스키마의 자식 테이블 이름, base32 테이블 ID 순으로 해석하고,
    /// 둘 다 아니면 활성 테이블을 씁니다. `count(*)`는 `doQueryCount` 한 번으로 처리합니다.
    ///
    /// # 예시
    ///
    /// ```no_run
    /// use qdbapi::sql::SqlResult;
    /// # async fn example(client: &mut qdbapi::Client<qdbapi::transport::HttpTransport>) -> qdbapi::Result<()> {
    /// client.get_schema("bdb5rjd6h").await?;
    /// if let SqlResult::Rows(rows) = client
    ///     .do_sql_query("SELECT Customer FROM Orders WHERE Status <> 'Closed' ORDER BY Customer")
    ///     .await?
    /// {
    ///     println!("{} open orders", rows.len());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn do_sql_query(&mut self, sql: &str) -> Result<SqlResult> {
        let select = parse_select(sql)?;
        let table_id = self.sql_table_id(&select.table)?;
        let schema = self.get_schema(&table_id).await?;
        let parts = select.to_query_parts(&schema)?;
        debug!(table_id = %table_id, criteria = ?parts.criteria, "translated SQL query");

        let selector = parts.selector();
        if select.columns == SqlColumns::Count {
            return self
                .do_query_count(&table_id, &selector)
                .await
                .map(SqlResult::Count);
        }
        let options = QueryOptions {
            clist: None,
            slist: parts.slist.clone(),
            options: parts.options.clone(),
        };
        self.fetch_with_schema(&schema, &table_id, &parts.names, &selector, &options)
            .await
            .map(SqlResult::Rows)
    }

    fn sql_table_id(&self, name: &str) -> Result<String> {
        let child = self
            .schema()
            .and_then(|schema| schema.child_table_id(name))
            .map(str::to_string);
        if let Some(id) = child {
            return Ok(id);
        }
        if is_base32_id(name) {
            return Ok(name.to_string());
        }
        self.active_table()
            .map(str::to_string)
            .ok_or_else(|| QdbError::NoActiveTable {
                operation: "doSQLQuery".to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// parser

struct SqlParser<'a> {
    lexer: SqlLexer<'a>,
    lookahead: Option<(usize, SqlToken)>,
}

impl<'a> SqlParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            lexer: SqlLexer::new(input),
            lookahead: None,
        }
    }

    fn parse_select(&mut self) -> Result<SqlSelect> {
        self.expect_keyword("SELECT")?;
        let columns = self.parse_columns()?;
        self.expect_keyword("FROM")?;
        let table = self.expect_name()?;

        let mut select = SqlSelect {
            columns,
            table,
            conditions: Vec::new(),
            order_by: Vec::new(),
            descending: false,
            limit: None,
            offset: None,
        };

        if self.peek_is_keyword("WHERE")? {
            self.next_token()?;
            select.conditions.push(self.parse_condition(None)?);
            loop {
                let connector = if self.peek_is_keyword("AND")? {
                    Connector::And
                } else if self.peek_is_keyword("OR")? {
                    Connector::Or
                } else {
                    break;
                };
                self.next_token()?;
                select.conditions.push(self.parse_condition(Some(connector))?);
            }
        }

        if self.peek_is_keyword("ORDER")? {
            self.next_token()?;
            self.expect_keyword("BY")?;
            select.order_by = self.parse_name_list()?;
            if self.peek_is_keyword("DESC")? {
                self.next_token()?;
                select.descending = true;
            } else if self.peek_is_keyword("ASC")? {
                self.next_token()?;
            }
        }

        if self.peek_is_keyword("LIMIT")? {
            self.next_token()?;
            select.limit = Some(self.expect_count()?);
        }
        if self.peek_is_keyword("OFFSET")? {
            self.next_token()?;
            select.offset = Some(self.expect_count()?);
        }
        Ok(select)
    }

    fn parse_columns(&mut self) -> Result<SqlColumns> {
        if matches!(self.peek_token()?, Some((_, SqlToken::Star))) {
            self.next_token()?;
            return Ok(SqlColumns::All);
        }
        if self.peek_is_keyword("COUNT")? {
            let (position, token) = self.next_token()?.ok_or_else(|| self.eof_error("column"))?;
            if matches!(self.peek_token()?, Some((_, SqlToken::LParen))) {
                self.next_token()?;
                self.expect_token(&SqlToken::Star)?;
                self.expect_token(&SqlToken::RParen)?;
                return Ok(SqlColumns::Count);
            }
            // NOTE: a column literally named "count"
            let SqlToken::Ident(first) = token else {
                return Err(syntax_error(position, "expected column"));
            };
            let mut names = vec![first];
            if matches!(self.peek_token()?, Some((_, SqlToken::Comma))) {
                self.next_token()?;
                names.extend(self.parse_name_list()?);
            }
            return Ok(SqlColumns::Named(names));
        }
        self.parse_name_list().map(SqlColumns::Named)
    }

    fn parse_name_list(&mut self) -> Result<Vec<String>> {
        let mut names = vec![self.expect_name()?];
        while matches!(self.peek_token()?, Some((_, SqlToken::Comma))) {
            self.next_token()?;
            names.push(self.expect_name()?);
        }
        Ok(names)
    }

    fn parse_condition(&mut self, connector: Option<Connector>) -> Result<SqlCondition> {
        let field = self.expect_name()?;
        let op = match self.next_token()? {
            Some((_, SqlToken::Eq)) => Comparison::Eq,
            Some((_, SqlToken::NotEq)) => Comparison::NotEq,
            Some((position, token)) => {
                return Err(syntax_error(
                    position,
                    format!("expected '=' or '<>', found {token:?}"),
                ));
            }
            None => return Err(self.eof_error("comparison operator")),
        };
        let value = match self.next_token()? {
            Some((_, SqlToken::Str(value) | SqlToken::Number(value))) => value,
            Some((position, token)) => {
                return Err(syntax_error(position, format!("expected value, found {token:?}")));
            }
            None => return Err(self.eof_error("value")),
        };
        Ok(SqlCondition {
            connector,
            field,
            op,
            value,
        })
    }

    /// 필드 또는 테이블 이름. 숫자는 field id 리터럴로 받습니다.
    fn expect_name(&mut self) -> Result<String> {
        match self.next_token()? {
            Some((_, SqlToken::Ident(name) | SqlToken::Quoted(name) | SqlToken::Number(name))) => {
                Ok(name)
            }
            Some((position, token)) => {
                Err(syntax_error(position, format!("expected name, found {token:?}")))
            }
            None => Err(self.eof_error("name")),
        }
    }

    fn expect_count(&mut self) -> Result<u64> {
        match self.next_token()? {
            Some((position, SqlToken::Number(n))) => n
                .parse()
                .map_err(|_| syntax_error(position, format!("expected a whole number, found {n}"))),
            Some((position, token)) => {
                Err(syntax_error(position, format!("expected number, found {token:?}")))
            }
            None => Err(self.eof_error("number")),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        match self.next_token()? {
            Some((_, SqlToken::Ident(word))) if word.eq_ignore_ascii_case(keyword) => Ok(()),
            Some((position, token)) => {
                Err(syntax_error(position, format!("expected {keyword}, found {token:?}")))
            }
            None => Err(self.eof_error(keyword)),
        }
    }

    fn expect_token(&mut self, expected: &SqlToken) -> Result<()> {
        match self.next_token()? {
            Some((_, token)) if &token == expected => Ok(()),
            Some((position, token)) => Err(syntax_error(
                position,
                format!("expected {expected:?}, found {token:?}"),
            )),
            None => Err(self.eof_error(&format!("{expected:?}"))),
        }
    }

    fn peek_is_keyword(&mut self, keyword: &str) -> Result<bool> {
        Ok(matches!(
            self.peek_token()?,
            Some((_, SqlToken::Ident(word))) if word.eq_ignore_ascii_case(keyword)
        ))
    }

    fn peek_token(&mut self) -> Result<Option<(usize, SqlToken)>> {
        if self.lookahead.is_none() {
            self.lookahead = self.lexer.next_token()?;
        }
        Ok(self.lookahead.clone())
    }

    fn next_token(&mut self) -> Result<Option<(usize, SqlToken)>> {
        match self.lookahead.take() {
            Some(token) => Ok(Some(token)),
            None => self.lexer.next_token(),
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        match self.next_token()? {
            Some((position, token)) => Err(syntax_error(
                position,
                format!("unexpected trailing input {token:?}"),
            )),
            None => Ok(()),
        }
    }

    fn eof_error(&self, expected: &str) -> QdbError {
        syntax_error(self.lexer.input.len(), format!("expected {expected}, found end of input"))
    }
}

fn syntax_error(position: usize, message: impl Into<String>) -> QdbError {
    QdbError::SqlSyntax {
        position,
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// lexer

#[derive(Debug, Clone, PartialEq, Eq)]
enum SqlToken {
    /// 키워드 포함 (대소문자 무시 비교)
    Ident(String),
    /// `[이름 with spaces]`
    Quoted(String),
    Str(String),
    Number(String),
    Star,
    Comma,
    LParen,
    RParen,
    Eq,
    NotEq,
}

struct SqlLexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    index: usize,
}

impl<'a> SqlLexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            index: 0,
        }
    }

    /// 다음 토큰과 시작 위치
    fn next_token(&mut self) -> Result<Option<(usize, SqlToken)>> {
        self.skip_whitespace();
        let start = self.index;
        let Some(&ch) = self.bytes.get(self.index) else {
            return Ok(None);
        };
        let token = match ch {
            b'*' => self.single(SqlToken::Star),
            b',' => self.single(SqlToken::Comma),
            b'(' => self.single(SqlToken::LParen),
            b')' => self.single(SqlToken::RParen),
            b'=' => self.single(SqlToken::Eq),
            b'<' | b'!' => self.lex_not_equal()?,
            b'\'' | b'"' => self.lex_string(ch)?,
            b'[' => self.lex_bracketed()?,
            b'-' | b'0'..=b'9' => self.lex_number()?,
            _ => self.lex_identifier()?,
        };
        Ok(Some((start, token)))
    }

    fn single(&mut self, token: SqlToken) -> SqlToken {
        self.index += 1;
        token
    }

    fn skip_whitespace(&mut self) {
        while self.index < self.bytes.len() && self.bytes[self.index].is_ascii_whitespace() {
            self.index += 1;
        }
    }

    fn lex_not_equal(&mut self) -> Result<SqlToken> {
        let rest = &self.bytes[self.index..];
        if rest.starts_with(b"<>") || rest.starts_with(b"!=") {
            self.index += 2;
            Ok(SqlToken::NotEq)
        } else {
            Err(syntax_error(self.index, "unsupported operator"))
        }
    }

    /// 따옴표 문자열. 같은 따옴표 두 개는 따옴표 하나입니다.
    fn lex_string(&mut self, quote: u8) -> Result<SqlToken> {
        let start = self.index;
        self.index += 1;
        let mut out = String::new();
        loop {
            let rest = &self.input[self.index..];
            let Some(end) = rest.find(quote as char) else {
                return Err(syntax_error(start, "unterminated string"));
            };
            out.push_str(&rest[..end]);
            self.index += end + 1;
            if self.bytes.get(self.index) == Some(&quote) {
                out.push(quote as char);
                self.index += 1;
            } else {
                return Ok(SqlToken::Str(out));
            }
        }
    }

    fn lex_bracketed(&mut self) -> Result<SqlToken> {
        let start = self.index;
        let rest = &self.input[self.index + 1..];
        let end = rest
            .find(']')
            .ok_or_else(|| syntax_error(start, "unterminated [name]"))?;
        let name = rest[..end].trim().to_string();
        self.index += end + 2;
        Ok(SqlToken::Quoted(name))
    }

    fn lex_number(&mut self) -> Result<SqlToken> {
        let start = self.index;
        if self.bytes[self.index] == b'-' {
            self.index += 1;
        }
        let digits_start = self.index;
        let mut seen_dot = false;
        while let Some(&ch) = self.bytes.get(self.index) {
            if ch == b'.' && !seen_dot {
                seen_dot = true;
            } else if !ch.is_ascii_digit() {
                break;
            }
            self.index += 1;
        }
        if self.index == digits_start {
            return Err(syntax_error(start, "expected digits after '-'"));
        }
        Ok(SqlToken::Number(self.input[start..self.index].to_string()))
    }

    /// 문자, 숫자, `_`, `#`, `.`로 이루어진 이름 (한글 라벨 포함)
    fn lex_identifier(&mut self) -> Result<SqlToken> {
        let start = self.index;
        for ch in self.input[start..].chars() {
            if ch.is_alphanumeric() || matches!(ch, '_' | '#' | '.') {
                self.index += ch.len_utf8();
            } else {
                break;
            }
        }
        if self.index == start {
            let ch = self.input[start..].chars().next().unwrap_or_default();
            return Err(syntax_error(start, format!("unexpected character '{ch}'")));
        }
        Ok(SqlToken::Ident(self.input[start..self.index].to_string()))
    }
}

//! Declarative query model.
//!
//! A [`Query`] names a remote source, the format of its payload
//! ([`QueryType`]) and where that payload gets parsed ([`ParserMode`]).
//! Queries are validated when built, so a constructed `Query` always names a
//! type/parser pair that exactly one route can serve.

use crate::error::{FrameError, Result};
use serde::{Deserialize, Serialize};

/// SQL run by the `sqlite` parser when the query leaves it blank.
pub const DEFAULT_SQLITE_QUERY: &str = "SELECT * FROM input";

/// Declared payload format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryType {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "csv")]
    Csv,
    #[serde(rename = "tsv")]
    Tsv,
    #[serde(rename = "xml")]
    Xml,
    #[serde(rename = "html")]
    Html,
    #[serde(rename = "graphql")]
    GraphQl,
    #[serde(rename = "google-sheets")]
    GoogleSheets,
}

impl QueryType {
    /// Wire name of the type.
    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::Json => "json",
            QueryType::Csv => "csv",
            QueryType::Tsv => "tsv",
            QueryType::Xml => "xml",
            QueryType::Html => "html",
            QueryType::GraphQl => "graphql",
            QueryType::GoogleSheets => "google-sheets",
        }
    }

    /// Types whose response body is JSON.
    pub fn is_json_family(self) -> bool {
        matches!(
            self,
            QueryType::Json | QueryType::GraphQl | QueryType::GoogleSheets
        )
    }

    pub fn is_delimited(self) -> bool {
        matches!(self, QueryType::Csv | QueryType::Tsv)
    }

    pub fn is_markup(self) -> bool {
        matches!(self, QueryType::Xml | QueryType::Html)
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the payload is parsed.
///
/// `Simple`, `Uql` and `Groq` are client-side modes: the server only fetches
/// and the raw payload travels to the caller in the frame diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserMode {
    #[default]
    Simple,
    Uql,
    Groq,
    Backend,
    Sqlite,
}

impl ParserMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ParserMode::Simple => "simple",
            ParserMode::Uql => "uql",
            ParserMode::Groq => "groq",
            ParserMode::Backend => "backend",
            ParserMode::Sqlite => "sqlite",
        }
    }

    /// Whether parsing happens outside this crate.
    pub fn is_client_side(self) -> bool {
        matches!(self, ParserMode::Simple | ParserMode::Uql | ParserMode::Groq)
    }
}

impl std::fmt::Display for ParserMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared type of an output column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    String,
    Number,
    Boolean,
    Timestamp,
}

/// A column picked out of each decoded row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Dot path inside a row (e.g. `user.name`).
    pub selector: String,
    /// Display name. Falls back to the selector when empty.
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: String::new(),
            column_type: ColumnType::default(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = column_type;
        self
    }

    /// Name the column gets in the frame.
    pub fn display_name(&self) -> &str {
        if self.text.trim().is_empty() {
            &self.selector
        } else {
            &self.text
        }
    }
}

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "equals")]
    Equals,
    #[serde(rename = "notequals")]
    NotEquals,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "notcontains")]
    NotContains,
    #[serde(rename = "startswith")]
    StartsWith,
    #[serde(rename = "endswith")]
    EndsWith,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "notin")]
    NotIn,
    #[serde(rename = "=")]
    NumberEquals,
    #[serde(rename = "!=")]
    NumberNotEquals,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
}

impl FilterOperator {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            FilterOperator::NumberEquals
                | FilterOperator::NumberNotEquals
                | FilterOperator::LessThan
                | FilterOperator::LessThanOrEqual
                | FilterOperator::GreaterThan
                | FilterOperator::GreaterThanOrEqual
        )
    }
}

/// Row filter applied during post-processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Frame column the filter reads.
    pub field: String,
    pub operator: FilterOperator,
    /// Operands. Most operators use only the first; `in`/`notin` use all.
    #[serde(default)]
    pub value: Vec<String>,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: vec![value.into()],
        }
    }

    pub fn any_of(field: impl Into<String>, operator: FilterOperator, values: Vec<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: values,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// A key/value pair, kept ordered so URLs reconstruct deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Request shaping for URL sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UrlOptions {
    pub method: HttpMethod,
    pub params: Vec<KeyValue>,
    pub headers: Vec<KeyValue>,
    /// Raw request body, sent on POST.
    pub body: Option<String>,
    /// GraphQL document, wrapped as `{"query": ...}` on POST.
    pub graphql_query: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CsvOptions {
    /// Overrides the type's default delimiter. Must be ASCII.
    pub delimiter: Option<char>,
    /// Lines starting with this character are skipped. Must be ASCII.
    pub comment: Option<char>,
    /// Allow rows with a different number of cells than the header.
    pub relax_column_count: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpreadsheetOptions {
    pub sheet_name: Option<String>,
    /// A1 range, e.g. `A1:D100`.
    pub range: Option<String>,
}

/// One data request.
///
/// Build with [`Query::builder`] or deserialize from the camelCase wire
/// model; both paths reject type/parser pairs no route can serve.
///
/// # Example
///
/// ```
/// use query_frames::query::{ParserMode, Query, QueryType};
///
/// let query = Query::builder(QueryType::Json, "https://example.com/users.json")
///     .ref_id("A")
///     .parser(ParserMode::Backend)
///     .root_selector("data.users")
///     .build()
///     .unwrap();
/// assert_eq!(query.root_selector(), "data.users");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QueryModel")]
pub struct Query {
    #[serde(rename = "refId")]
    pub(crate) ref_id: String,
    #[serde(rename = "type")]
    pub(crate) kind: QueryType,
    pub(crate) parser: ParserMode,
    pub(crate) url: String,
    #[serde(rename = "urlOptions")]
    pub(crate) url_options: UrlOptions,
    #[serde(rename = "rootSelector")]
    pub(crate) root_selector: String,
    #[serde(rename = "sqliteQuery")]
    pub(crate) sqlite_query: String,
    pub(crate) columns: Vec<Column>,
    pub(crate) filters: Vec<Filter>,
    #[serde(rename = "csvOptions")]
    pub(crate) csv_options: CsvOptions,
    pub(crate) spreadsheet: SpreadsheetOptions,
}

impl Query {
    /// Start building a query for `url` (the spreadsheet id for Google Sheets).
    pub fn builder(kind: QueryType, url: impl Into<String>) -> QueryBuilder {
        QueryBuilder {
            query: Query {
                ref_id: String::new(),
                kind,
                parser: ParserMode::default(),
                url: url.into(),
                url_options: UrlOptions::default(),
                root_selector: String::new(),
                sqlite_query: String::new(),
                columns: Vec::new(),
                filters: Vec::new(),
                csv_options: CsvOptions::default(),
                spreadsheet: SpreadsheetOptions::default(),
            },
        }
    }

    pub fn ref_id(&self) -> &str {
        &self.ref_id
    }

    pub fn kind(&self) -> QueryType {
        self.kind
    }

    pub fn parser(&self) -> ParserMode {
        self.parser
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn url_options(&self) -> &UrlOptions {
        &self.url_options
    }

    pub fn root_selector(&self) -> &str {
        &self.root_selector
    }

    /// The SQL as written, possibly blank.
    pub fn sqlite_query(&self) -> &str {
        &self.sqlite_query
    }

    /// The SQL the `sqlite` parser runs: the query's own, or
    /// [`DEFAULT_SQLITE_QUERY`] when blank.
    pub fn resolved_sqlite_query(&self) -> &str {
        if self.sqlite_query.trim().is_empty() {
            DEFAULT_SQLITE_QUERY
        } else {
            &self.sqlite_query
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn csv_options(&self) -> &CsvOptions {
        &self.csv_options
    }

    pub fn spreadsheet(&self) -> &SpreadsheetOptions {
        &self.spreadsheet
    }

    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(FrameError::InvalidQuery("url is required".to_string()));
        }
        if self.parser == ParserMode::Sqlite && self.kind != QueryType::Json {
            return Err(FrameError::InvalidQuery(format!(
                "the sqlite parser only supports json, not {}",
                self.kind
            )));
        }
        for (name, ch) in [
            ("delimiter", self.csv_options.delimiter),
            ("comment", self.csv_options.comment),
        ] {
            if let Some(c) = ch {
                if !c.is_ascii() {
                    return Err(FrameError::InvalidQuery(format!(
                        "csv {} must be an ASCII character, got {:?}",
                        name, c
                    )));
                }
            }
        }
        if self.columns.iter().any(|c| c.selector.trim().is_empty()) {
            return Err(FrameError::InvalidQuery(
                "column selector must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`Query`] with validation.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn ref_id(mut self, ref_id: impl Into<String>) -> Self {
        self.query.ref_id = ref_id.into();
        self
    }

    pub fn parser(mut self, parser: ParserMode) -> Self {
        self.query.parser = parser;
        self
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.query.url_options.method = method;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.url_options.params.push(KeyValue::new(key, value));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.url_options.headers.push(KeyValue::new(key, value));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.query.url_options.body = Some(body.into());
        self
    }

    pub fn graphql_query(mut self, document: impl Into<String>) -> Self {
        self.query.url_options.graphql_query = Some(document.into());
        self
    }

    pub fn root_selector(mut self, selector: impl Into<String>) -> Self {
        self.query.root_selector = selector.into();
        self
    }

    pub fn sqlite_query(mut self, sql: impl Into<String>) -> Self {
        self.query.sqlite_query = sql.into();
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.query.columns.push(column);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.query.filters.push(filter);
        self
    }

    pub fn csv_options(mut self, options: CsvOptions) -> Self {
        self.query.csv_options = options;
        self
    }

    pub fn spreadsheet(mut self, options: SpreadsheetOptions) -> Self {
        self.query.spreadsheet = options;
        self
    }

    /// Validate and build the query.
    pub fn build(self) -> Result<Query> {
        self.query.validate()?;
        Ok(self.query)
    }
}

/// Wire shape of a query, before validation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryModel {
    #[serde(default)]
    ref_id: String,
    #[serde(rename = "type")]
    kind: QueryType,
    #[serde(default)]
    parser: ParserMode,
    url: String,
    #[serde(default)]
    url_options: UrlOptions,
    #[serde(default)]
    root_selector: String,
    #[serde(default)]
    sqlite_query: String,
    #[serde(default)]
    columns: Vec<Column>,
    #[serde(default)]
    filters: Vec<Filter>,
    #[serde(default)]
    csv_options: CsvOptions,
    #[serde(default)]
    spreadsheet: SpreadsheetOptions,
}

impl TryFrom<QueryModel> for Query {
    type Error = FrameError;

    fn try_from(model: QueryModel) -> Result<Self> {
        let query = Query {
            ref_id: model.ref_id,
            kind: model.kind,
            parser: model.parser,
            url: model.url,
            url_options: model.url_options,
            root_selector: model.root_selector,
            sqlite_query: model.sqlite_query,
            columns: model.columns,
            filters: model.filters,
            csv_options: model.csv_options,
            spreadsheet: model.spreadsheet,
        };
        query.validate()?;
        Ok(query)
    }
}

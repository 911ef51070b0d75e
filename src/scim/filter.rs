//! SCIM 2.0 Filter Expressions
//!
//! This module defines the filter expression tree consumed by the evaluator
//! and a parser for the RFC 7644 Section 3.4.2.2 filter grammar.
//!
//! ## Grammar
//!
//! ```text
//! filter     = logExpr
//! logExpr    = andExpr { "or" andExpr }
//! andExpr    = notExpr { "and" notExpr }
//! notExpr    = "not" "(" filter ")" | "(" filter ")" | attrExpr | valuePath
//! attrExpr   = attrPath "pr" | attrPath compareOp compValue
//! valuePath  = ATTRNAME "[" filter "]"
//! attrPath   = [URI ":"] ATTRNAME ["[" filter "]"] ["." ATTRNAME]
//! compareOp  = "eq" | "ne" | "co" | "sw" | "ew" | "gt" | "ge" | "lt" | "le"
//! compValue  = "true" | "false" | "null" | NUMBER | STRING
//! ```
//!
//! Operators and keywords are case-insensitive.
//!
//! ## Examples
//!
//! ```text
//! userName eq "john"
//! name.familyName co "doe"
//! emails[type eq "work"]
//! emails[type eq "work"].value sw "john"
//! urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:employeeNumber eq "42"
//! not (active eq false)
//! ```
//!
//! ## Security Limits
//!
//! To bound parse cost for hostile input, filters are limited to
//! [`MAX_FILTER_LENGTH`] bytes and [`MAX_FILTER_DEPTH`] nesting levels by
//! default. Both are configurable through [`FilterLimits`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ScimError;

/// Default maximum length of a filter expression (bytes).
pub const MAX_FILTER_LENGTH: usize = 4096;

/// Default maximum nesting depth of a filter expression.
pub const MAX_FILTER_DEPTH: usize = 32;

/// A parsed SCIM filter expression.
///
/// The evaluator matches on this enum exhaustively; adding a variant forces
/// every consumer to handle it.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Attribute comparison (e.g., `userName eq "john"`)
    Compare {
        attr: AttrPath,
        op: CompareOp,
        value: FilterValue,
    },
    /// Attribute presence check (e.g., `name pr`)
    Present { attr: AttrPath },
    /// Element selection on a multi-valued attribute (e.g., `emails[type eq "work"]`)
    ValuePath { attr: AttrPath, filter: Box<Filter> },
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn and(left: Filter, right: Filter) -> Self {
        Filter::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Filter, right: Filter) -> Self {
        Filter::Or(Box::new(left), Box::new(right))
    }

    pub fn not(inner: Filter) -> Self {
        Filter::Not(Box::new(inner))
    }

    pub fn compare(attr: AttrPath, op: CompareOp, value: impl Into<FilterValue>) -> Self {
        Filter::Compare {
            attr,
            op,
            value: value.into(),
        }
    }

    pub fn present(attr: AttrPath) -> Self {
        Filter::Present { attr }
    }

    pub fn value_path(attr: AttrPath, filter: Filter) -> Self {
        Filter::ValuePath {
            attr,
            filter: Box::new(filter),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Compare { attr, op, value } => write!(f, "{} {} {}", attr, op, value),
            Filter::Present { attr } => write!(f, "{} pr", attr),
            Filter::ValuePath { attr, filter } => write!(f, "{}[{}]", attr, filter),
            Filter::And(left, right) => write!(f, "({} and {})", left, right),
            Filter::Or(left, right) => write!(f, "({} or {})", left, right),
            Filter::Not(inner) => write!(f, "not ({})", inner),
        }
    }
}

/// An attribute path, optionally schema-qualified, with sub-attribute and
/// value filter.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrPath {
    /// Schema URI prefix (e.g., the Enterprise User extension URN)
    pub schema: Option<String>,
    /// Main attribute name (e.g., "userName", "emails")
    pub attr: String,
    /// Sub-attribute for complex types (e.g., "familyName" in "name.familyName")
    pub sub_attr: Option<String>,
    /// Value filter for multi-valued attributes (e.g., `[type eq "work"]`)
    pub value_filter: Option<Box<Filter>>,
}

impl AttrPath {
    pub fn simple(attr: impl Into<String>) -> Self {
        Self {
            schema: None,
            attr: attr.into(),
            sub_attr: None,
            value_filter: None,
        }
    }

    pub fn nested(attr: impl Into<String>, sub_attr: impl Into<String>) -> Self {
        Self {
            sub_attr: Some(sub_attr.into()),
            ..Self::simple(attr)
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_value_filter(mut self, filter: Filter) -> Self {
        self.value_filter = Some(Box::new(filter));
        self
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{}:", schema)?;
        }
        write!(f, "{}", self.attr)?;
        if let Some(filter) = &self.value_filter {
            write!(f, "[{}]", filter)?;
        }
        if let Some(sub) = &self.sub_attr {
            write!(f, ".{}", sub)?;
        }
        Ok(())
    }
}

/// Comparison operators per RFC 7644.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Contains
    Co,
    /// Starts with
    Sw,
    /// Ends with
    Ew,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Co => "co",
            CompareOp::Sw => "sw",
            CompareOp::Ew => "ew",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
        }
    }

    /// Whether this is one of the ordering operators (gt/ge/lt/le).
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le
        )
    }

    fn parse(s: &str) -> Option<Self> {
        [
            CompareOp::Eq,
            CompareOp::Ne,
            CompareOp::Co,
            CompareOp::Sw,
            CompareOp::Ew,
            CompareOp::Gt,
            CompareOp::Ge,
            CompareOp::Lt,
            CompareOp::Le,
        ]
        .into_iter()
        .find(|op| op.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter comparison values.
///
/// Numbers keep their source literal so that `co`/`sw`/`ew` on numeric
/// attributes compare against what the client actually wrote.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Bool(bool),
    Number(String),
    Null,
}

impl FilterValue {
    pub fn number(n: impl fmt::Display) -> Self {
        FilterValue::Number(n.to_string())
    }

    /// Textual form used by the substring operators.
    pub fn as_text(&self) -> String {
        match self {
            FilterValue::String(s) | FilterValue::Number(s) => s.clone(),
            FilterValue::Bool(b) => b.to_string(),
            FilterValue::Null => "null".to_string(),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        FilterValue::String(s)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        FilterValue::Bool(b)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        FilterValue::number(n)
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        FilterValue::number(n)
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            FilterValue::Bool(b) => write!(f, "{}", b),
            FilterValue::Number(n) => write!(f, "{}", n),
            FilterValue::Null => write!(f, "null"),
        }
    }
}

/// Filter parsing error.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParseError {
    pub message: String,
    pub position: usize,
}

impl fmt::Display for FilterParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)
    }
}

impl std::error::Error for FilterParseError {}

impl From<FilterParseError> for ScimError {
    fn from(e: FilterParseError) -> Self {
        ScimError::InvalidFilter(e.to_string())
    }
}

/// Parser resource limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterLimits {
    pub max_length: usize,
    pub max_depth: usize,
}

impl Default for FilterLimits {
    fn default() -> Self {
        Self {
            max_length: MAX_FILTER_LENGTH,
            max_depth: MAX_FILTER_DEPTH,
        }
    }
}

/// Parse a SCIM filter expression with the default limits.
///
/// # Examples
///
/// ```
/// use hadrian_scim::scim::filter::parse_filter;
///
/// let filter = parse_filter("userName eq \"john\"").unwrap();
/// let filter = parse_filter("active eq true and emails pr").unwrap();
/// ```
pub fn parse_filter(input: &str) -> Result<Filter, FilterParseError> {
    parse_filter_with_limits(input, FilterLimits::default())
}

/// Parse a SCIM filter expression.
///
/// # Errors
///
/// Returns an error if the input exceeds `limits`, or is not a well-formed
/// filter.
pub fn parse_filter_with_limits(
    input: &str,
    limits: FilterLimits,
) -> Result<Filter, FilterParseError> {
    let mut parser = Parser::new(input, limits)?;
    let filter = parser.filter()?;
    parser.expect_end()?;
    Ok(filter)
}

/// Parse a standalone attribute path, as used by PATCH operations.
pub fn parse_attr_path(input: &str) -> Result<AttrPath, FilterParseError> {
    let mut parser = Parser::new(input, FilterLimits::default())?;
    let path = parser.attr_path()?;
    parser.expect_end()?;
    Ok(path)
}

// =============================================================================
// Parser Implementation
// =============================================================================

struct Parser<'a> {
    input: &'a str,
    position: usize,
    depth: usize,
    limits: FilterLimits,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, limits: FilterLimits) -> Result<Self, FilterParseError> {
        if input.len() > limits.max_length {
            return Err(FilterParseError {
                message: format!(
                    "Filter exceeds maximum length ({} bytes, max {})",
                    input.len(),
                    limits.max_length
                ),
                position: 0,
            });
        }
        Ok(Self {
            input,
            position: 0,
            depth: 0,
            limits,
        })
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, FilterParseError> {
        Err(FilterParseError {
            message: message.into(),
            position: self.position,
        })
    }

    fn expect_end(&mut self) -> Result<(), FilterParseError> {
        self.skip_whitespace();
        if self.position < self.input.len() {
            let rest = &self.input[self.position..];
            return self.error(format!("Unexpected input: '{}'", rest));
        }
        Ok(())
    }

    /// Run `inner` one nesting level deeper, enforcing the depth limit.
    fn nested<T>(
        &mut self,
        inner: impl FnOnce(&mut Self) -> Result<T, FilterParseError>,
    ) -> Result<T, FilterParseError> {
        self.depth += 1;
        if self.depth > self.limits.max_depth {
            return self.error(format!(
                "Filter exceeds maximum nesting depth ({})",
                self.limits.max_depth
            ));
        }
        let result = inner(self);
        self.depth -= 1;
        result
    }

    fn expect_char(&mut self, c: char, context: &str) -> Result<(), FilterParseError> {
        self.skip_whitespace();
        if self.try_char(c) {
            Ok(())
        } else {
            self.error(format!("Expected '{}' {}", c, context))
        }
    }

    fn filter(&mut self) -> Result<Filter, FilterParseError> {
        let mut left = self.and_expr()?;
        while self.try_keyword("or") {
            let right = self.and_expr()?;
            left = Filter::or(left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Filter, FilterParseError> {
        let mut left = self.not_expr()?;
        while self.try_keyword("and") {
            let right = self.not_expr()?;
            left = Filter::and(left, right);
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Filter, FilterParseError> {
        self.skip_whitespace();

        if self.try_keyword("not") {
            self.expect_char('(', "after 'not'")?;
            let inner = self.nested(Self::filter)?;
            self.expect_char(')', "to close 'not' expression")?;
            return Ok(Filter::not(inner));
        }

        if self.try_char('(') {
            let inner = self.nested(Self::filter)?;
            self.expect_char(')', "to close grouped expression")?;
            return Ok(inner);
        }

        self.attr_expr()
    }

    fn attr_expr(&mut self) -> Result<Filter, FilterParseError> {
        let mut attr = self.attr_path()?;

        if self.try_keyword("pr") {
            return Ok(Filter::Present { attr });
        }

        // A bracketed path with nothing comparable after it is a value path.
        if attr.sub_attr.is_none()
            && !self.at_compare_op()
            && let Some(filter) = attr.value_filter.take()
        {
            return Ok(Filter::ValuePath { attr, filter });
        }

        let op = self.compare_op()?;
        let value = self.value()?;
        Ok(Filter::Compare { attr, op, value })
    }

    fn attr_path(&mut self) -> Result<AttrPath, FilterParseError> {
        self.skip_whitespace();

        let (schema, attr, mut sub_attr) = if self.at_uri() {
            self.qualified_name()?
        } else {
            (None, self.attr_name()?, None)
        };

        let mut value_filter = None;
        if sub_attr.is_none() && self.try_char('[') {
            let filter = self.nested(Self::filter)?;
            self.expect_char(']', "to close value filter")?;
            value_filter = Some(Box::new(filter));
        }

        if sub_attr.is_none() && self.try_char('.') {
            sub_attr = Some(self.attr_name()?);
        }

        Ok(AttrPath {
            schema,
            attr,
            sub_attr,
            value_filter,
        })
    }

    fn at_uri(&self) -> bool {
        self.input[self.position..]
            .get(..4)
            .is_some_and(|p| p.eq_ignore_ascii_case("urn:"))
    }

    /// `urn:...:Schema:attr[.sub]`: the attribute follows the last colon.
    fn qualified_name(
        &mut self,
    ) -> Result<(Option<String>, String, Option<String>), FilterParseError> {
        let start = self.position;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && !matches!(c, '[' | ']' | '(' | ')'))
        {
            self.advance();
        }
        let token = &self.input[start..self.position];

        let Some((schema, rest)) = token.rsplit_once(':') else {
            return self.error("Expected attribute name after schema URI");
        };
        let (attr, sub) = match rest.split_once('.') {
            Some((attr, sub)) => (attr, Some(sub)),
            None => (rest, None),
        };
        if !is_attr_name(attr) || sub.is_some_and(|s| !is_attr_name(s)) {
            return self.error(format!("Invalid attribute name in '{}'", token));
        }

        Ok((
            Some(schema.to_string()),
            attr.to_string(),
            sub.map(str::to_string),
        ))
    }

    fn attr_name(&mut self) -> Result<String, FilterParseError> {
        self.skip_whitespace();
        let start = self.position;

        // `$ref` is the one attribute name RFC 7643 allows to start with '$'
        if !self.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == '$') {
            return self.error("Expected attribute name");
        }
        self.advance();
        while self.peek().is_some_and(is_name_char) {
            self.advance();
        }

        Ok(self.input[start..self.position].to_string())
    }

    fn at_compare_op(&mut self) -> bool {
        let saved = self.position;
        let found = self.compare_op().is_ok();
        self.position = saved;
        found
    }

    fn compare_op(&mut self) -> Result<CompareOp, FilterParseError> {
        self.skip_whitespace();
        let start = self.position;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.advance();
        }
        let word = &self.input[start..self.position];

        match CompareOp::parse(word) {
            Some(op) => Ok(op),
            None => {
                self.position = start;
                self.error(format!("Unknown operator: '{}'", word))
            }
        }
    }

    fn value(&mut self) -> Result<FilterValue, FilterParseError> {
        self.skip_whitespace();

        if self.peek() == Some('"') {
            return self.string_value();
        }
        if self.try_keyword("true") {
            return Ok(FilterValue::Bool(true));
        }
        if self.try_keyword("false") {
            return Ok(FilterValue::Bool(false));
        }
        if self.try_keyword("null") {
            return Ok(FilterValue::Null);
        }
        if self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '+')
        {
            return self.number_value();
        }

        self.error("Expected value (string, boolean, number, or null)")
    }

    fn string_value(&mut self) -> Result<FilterValue, FilterParseError> {
        self.advance();
        let mut value = String::new();

        loop {
            match self.peek() {
                None => return self.error("Unterminated string"),
                Some('"') => {
                    self.advance();
                    return Ok(FilterValue::String(value));
                }
                Some('\\') => {
                    self.advance();
                    let unescaped = match self.peek() {
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some('/') => '/',
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        _ => return self.error("Invalid escape sequence"),
                    };
                    value.push(unescaped);
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    fn number_value(&mut self) -> Result<FilterValue, FilterParseError> {
        let start = self.position;

        if matches!(self.peek(), Some('-' | '+')) {
            self.advance();
        }
        self.skip_digits();
        if self.peek() == Some('.') {
            self.advance();
            self.skip_digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek(), Some('-' | '+')) {
                self.advance();
            }
            self.skip_digits();
        }

        let literal = &self.input[start..self.position];
        if literal.parse::<f64>().is_err() {
            self.position = start;
            return self.error(format!("Invalid number: '{}'", literal));
        }
        Ok(FilterValue::Number(
            literal.strip_prefix('+').unwrap_or(literal).to_string(),
        ))
    }

    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.position += c.len_utf8();
        }
    }

    fn skip_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn try_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn try_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        let remaining = &self.input[self.position..];

        let Some(head) = remaining.get(..keyword.len()) else {
            return false;
        };
        if !head.eq_ignore_ascii_case(keyword) {
            return false;
        }
        // Keyword must not be the prefix of a longer identifier
        if remaining[keyword.len()..]
            .chars()
            .next()
            .is_some_and(is_name_char)
        {
            return false;
        }
        self.position += keyword.len();
        true
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_attr_name(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '$')
        && chars.all(is_name_char)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn compare_parts(filter: Filter) -> (AttrPath, CompareOp, FilterValue) {
        match filter {
            Filter::Compare { attr, op, value } => (attr, op, value),
            other => panic!("Expected Compare filter, got {other:?}"),
        }
    }

    #[test]
    fn test_simple_equality() {
        let (attr, op, value) = compare_parts(parse_filter("userName eq \"john\"").unwrap());
        assert_eq!(attr, AttrPath::simple("userName"));
        assert_eq!(op, CompareOp::Eq);
        assert_eq!(value, FilterValue::from("john"));
    }

    #[test]
    fn test_literal_values() {
        let (_, _, v) = compare_parts(parse_filter("active eq TRUE").unwrap());
        assert_eq!(v, FilterValue::Bool(true));
        let (_, _, v) = compare_parts(parse_filter("manager eq null").unwrap());
        assert_eq!(v, FilterValue::Null);
        let (_, _, v) = compare_parts(parse_filter("age gt 21").unwrap());
        assert_eq!(v, FilterValue::Number("21".into()));
        let (_, _, v) = compare_parts(parse_filter("score le -5.5").unwrap());
        assert_eq!(v, FilterValue::Number("-5.5".into()));
    }

    #[test]
    fn test_presence_operator() {
        assert_eq!(
            parse_filter("title pr").unwrap(),
            Filter::present(AttrPath::simple("title"))
        );
    }

    #[test]
    fn test_nested_attribute() {
        let (attr, _, _) = compare_parts(parse_filter("name.familyName eq \"Doe\"").unwrap());
        assert_eq!(attr, AttrPath::nested("name", "familyName"));
    }

    #[test]
    fn test_standalone_value_path() {
        let filter = parse_filter("emails[type eq \"work\"]").unwrap();
        let inner = Filter::compare(AttrPath::simple("type"), CompareOp::Eq, "work");
        assert_eq!(filter, Filter::value_path(AttrPath::simple("emails"), inner));
    }

    #[test]
    fn test_value_path_joined_with_and() {
        let filter =
            parse_filter("emails[type eq \"work\" and value co \"@example.com\"] or userType eq \"Employee\"")
                .unwrap();
        let Filter::Or(left, _) = filter else {
            panic!("Expected Or");
        };
        let Filter::ValuePath { filter, .. } = *left else {
            panic!("Expected ValuePath");
        };
        assert!(matches!(*filter, Filter::And(_, _)));
    }

    #[test]
    fn test_value_filter_with_sub_attribute_compare() {
        let (attr, op, _) = compare_parts(
            parse_filter("emails[type eq \"work\"].value eq \"john@example.com\"").unwrap(),
        );
        assert_eq!(attr.attr, "emails");
        assert_eq!(attr.sub_attr.as_deref(), Some("value"));
        assert!(attr.value_filter.is_some());
        assert_eq!(op, CompareOp::Eq);
    }

    #[test]
    fn test_schema_qualified_path() {
        let (attr, _, _) = compare_parts(
            parse_filter(
                "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:manager.value eq \"26118915-6090-4610-87e4-49d8ca9f808d\"",
            )
            .unwrap(),
        );
        assert_eq!(
            attr.schema.as_deref(),
            Some("urn:ietf:params:scim:schemas:extension:enterprise:2.0:User")
        );
        assert_eq!(attr.attr, "manager");
        assert_eq!(attr.sub_attr.as_deref(), Some("value"));
    }

    #[test]
    fn test_ref_sub_attribute() {
        let (attr, _, _) = compare_parts(parse_filter("members.$ref sw \"https\"").unwrap());
        assert_eq!(attr.sub_attr.as_deref(), Some("$ref"));
    }

    #[test]
    fn test_precedence_and_grouping() {
        let filter = parse_filter("a eq \"1\" or b eq \"2\" and c eq \"3\"").unwrap();
        let Filter::Or(_, right) = filter else {
            panic!("Expected Or at the root");
        };
        assert!(matches!(*right, Filter::And(_, _)));

        let filter = parse_filter("(a eq \"1\" or b eq \"2\") and c eq \"3\"").unwrap();
        let Filter::And(left, _) = filter else {
            panic!("Expected And at the root");
        };
        assert!(matches!(*left, Filter::Or(_, _)));
    }

    #[test]
    fn test_not_operator() {
        let filter = parse_filter("NOT (active eq false)").unwrap();
        assert!(matches!(filter, Filter::Not(_)));
    }

    #[test]
    fn test_all_comparison_operators() {
        for op in ["eq", "ne", "co", "sw", "ew", "gt", "ge", "lt", "le"] {
            let (_, parsed, _) = compare_parts(parse_filter(&format!("x {} \"y\"", op)).unwrap());
            assert_eq!(parsed.as_str(), op);
        }
    }

    #[test]
    fn test_syntax_errors() {
        for bad in [
            "",
            "userName",
            "userName xx \"a\"",
            "userName eq",
            "userName eq \"unterminated",
            "not active eq true",
            "(userName eq \"a\"",
            "emails[type eq \"work\"",
            "userName eq \"a\" extra",
            "userName eq \"bad\\q\"",
        ] {
            assert!(parse_filter(bad).is_err(), "should reject: {bad}");
        }
    }

    #[test]
    fn test_keyword_prefix_of_identifier_is_not_keyword() {
        // "order" starts with "or" but is an attribute name
        let filter = parse_filter("a eq \"1\" and order pr").unwrap();
        let Filter::And(_, right) = filter else {
            panic!("Expected And");
        };
        assert_eq!(*right, Filter::present(AttrPath::simple("order")));
    }

    #[test]
    fn test_length_limit() {
        let long = format!("userName eq \"{}\"", "a".repeat(MAX_FILTER_LENGTH));
        let err = parse_filter(&long).unwrap_err();
        assert!(err.message.contains("maximum length"));
    }

    #[test]
    fn test_depth_limit() {
        let limits = FilterLimits {
            max_depth: 3,
            ..FilterLimits::default()
        };
        let ok = "not (not (not (a pr)))";
        assert!(parse_filter_with_limits(ok, limits).is_ok());
        let too_deep = "not (not (not (not (a pr))))";
        let err = parse_filter_with_limits(too_deep, limits).unwrap_err();
        assert!(err.message.contains("nesting depth"));
    }

    #[test]
    fn test_display_reparses_to_same_tree() {
        for src in [
            "userName eq \"john\"",
            "emails[type eq \"work\"]",
            "not (active eq false) and title pr",
            "emails[primary eq true].value ew \"@example.com\"",
        ] {
            let parsed = parse_filter(src).unwrap();
            assert_eq!(parse_filter(&parsed.to_string()).unwrap(), parsed);
        }
    }

    #[test]
    fn test_parse_attr_path() {
        let path = parse_attr_path("emails[type eq \"work\"].value").unwrap();
        assert_eq!(path.attr, "emails");
        assert_eq!(path.sub_attr.as_deref(), Some("value"));
        assert!(path.value_filter.is_some());

        assert!(parse_attr_path("").is_err());
        assert!(parse_attr_path("name.").is_err());
        assert!(parse_attr_path("emails[type eq \"work\"] trailing").is_err());
    }

    #[test]
    fn test_parse_error_converts_to_invalid_filter() {
        let err: ScimError = parse_filter("userName zz 1").unwrap_err().into();
        assert!(matches!(err, ScimError::InvalidFilter(_)));
    }
}

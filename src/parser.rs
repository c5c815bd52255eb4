//! Argument parsers: the capability that turns raw tokens into typed [`Value`]s.
//!
//! Parsers are shared between parameters as [`ParserRef`] handles. The identity
//! of the shared allocation matters: two overloads are only considered
//! ambiguous when they use the *same* parser instances, see [`same_parser`].

use crate::error::ParseError;
use crate::value::Value;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

/// Converts a bounded run of tokens into a [`Value`].
pub trait ArgumentParser: Send + Sync {
    /// Parse exactly [`arity`](Self::arity) tokens, or every remaining token when
    /// the parameter is greedy.
    fn parse(&self, tokens: &[String]) -> Result<Value, ParseError>;

    /// Candidates completing a partially typed token.
    fn autocomplete(&self, _partial: &str) -> Vec<String> {
        Vec::new()
    }

    /// Number of tokens a single value occupies.
    fn arity(&self) -> usize {
        1
    }

    /// Short name shown in usage strings, e.g. `int`.
    fn type_name(&self) -> &str;
}

/// Shared handle to a parser instance.
pub type ParserRef = Arc<dyn ArgumentParser>;

/// Wrap a parser into a shareable handle.
pub fn parser<P: ArgumentParser + 'static>(p: P) -> ParserRef {
    Arc::new(p)
}

/// Identity comparison of two parser handles.
///
/// Only the data pointer is compared; vtable pointers for the same type may
/// differ between codegen units.
pub fn same_parser(a: &ParserRef, b: &ParserRef) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

fn single<'a>(tokens: &'a [String], what: &str) -> Result<&'a str, ParseError> {
    match tokens {
        [token] => Ok(token.as_str()),
        _ => Err(ParseError::new(format!(
            "expected one {} token, got {}",
            what,
            tokens.len()
        ))),
    }
}

fn complete_from<'a>(options: impl IntoIterator<Item = &'a str>, partial: &str) -> Vec<String> {
    options
        .into_iter()
        .filter(|o| o.starts_with(partial))
        .map(str::to_string)
        .collect()
}

/// Accepts any single token verbatim.
#[derive(Debug, Default)]
pub struct StringParser;

impl ArgumentParser for StringParser {
    fn parse(&self, tokens: &[String]) -> Result<Value, ParseError> {
        single(tokens, "string").map(Value::from)
    }

    fn type_name(&self) -> &str {
        "string"
    }
}

/// Joins every remaining token with a single space. Meant for greedy parameters.
#[derive(Debug, Default)]
pub struct GreedyStringParser;

impl ArgumentParser for GreedyStringParser {
    fn parse(&self, tokens: &[String]) -> Result<Value, ParseError> {
        Ok(Value::Str(tokens.join(" ")))
    }

    fn type_name(&self) -> &str {
        "text"
    }
}

/// Signed 64-bit integer, optionally restricted to an inclusive range.
#[derive(Debug)]
pub struct IntParser {
    min: i64,
    max: i64,
}

impl IntParser {
    /// Accepts any `i64`.
    pub fn new() -> Self {
        Self {
            min: i64::MIN,
            max: i64::MAX,
        }
    }

    /// Accepts integers in `min..=max`.
    pub fn in_range(min: i64, max: i64) -> Self {
        Self { min, max }
    }
}

impl Default for IntParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ArgumentParser for IntParser {
    fn parse(&self, tokens: &[String]) -> Result<Value, ParseError> {
        let token = single(tokens, "integer")?;
        let n: i64 = token
            .parse()
            .map_err(|_| ParseError::new(format!("'{}' is not an integer", token)))?;
        if n < self.min || n > self.max {
            return Err(ParseError::new(format!(
                "{} is outside {}..={}",
                n, self.min, self.max
            )));
        }
        Ok(Value::Int(n))
    }

    fn type_name(&self) -> &str {
        "int"
    }
}

#[derive(Debug, Default)]
pub struct FloatParser;

impl ArgumentParser for FloatParser {
    fn parse(&self, tokens: &[String]) -> Result<Value, ParseError> {
        let token = single(tokens, "number")?;
        token
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .map(Value::Float)
            .ok_or_else(|| ParseError::new(format!("'{}' is not a number", token)))
    }

    fn type_name(&self) -> &str {
        "float"
    }
}

const TRUTHY: [&str; 3] = ["true", "yes", "on"];
const FALSY: [&str; 3] = ["false", "no", "off"];

#[derive(Debug, Default)]
pub struct BoolParser;

impl ArgumentParser for BoolParser {
    fn parse(&self, tokens: &[String]) -> Result<Value, ParseError> {
        let token = single(tokens, "boolean")?.to_ascii_lowercase();
        if TRUTHY.contains(&token.as_str()) {
            Ok(Value::Bool(true))
        } else if FALSY.contains(&token.as_str()) {
            Ok(Value::Bool(false))
        } else {
            Err(ParseError::new(format!("'{}' is not a boolean", token)))
        }
    }

    fn autocomplete(&self, partial: &str) -> Vec<String> {
        complete_from(TRUTHY.into_iter().chain(FALSY), partial)
    }

    fn type_name(&self) -> &str {
        "bool"
    }
}

/// One of a fixed set of literal words.
#[derive(Debug)]
pub struct ChoiceParser {
    choices: Vec<String>,
}

impl ChoiceParser {
    pub fn new<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }
}

impl ArgumentParser for ChoiceParser {
    fn parse(&self, tokens: &[String]) -> Result<Value, ParseError> {
        let token = single(tokens, "choice")?;
        if self.choices.iter().any(|c| c == token) {
            Ok(Value::from(token))
        } else {
            Err(ParseError::new(format!(
                "'{}' is not one of: {}",
                token,
                self.choices.join(", ")
            )))
        }
    }

    fn autocomplete(&self, partial: &str) -> Vec<String> {
        complete_from(self.choices.iter().map(String::as_str), partial)
    }

    fn type_name(&self) -> &str {
        "choice"
    }
}

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(ms|s|m|h)$").expect("duration pattern is valid"));

/// Durations written as `<digits><unit>`, unit one of `ms`, `s`, `m`, `h`.
#[derive(Debug, Default)]
pub struct DurationParser;

impl ArgumentParser for DurationParser {
    fn parse(&self, tokens: &[String]) -> Result<Value, ParseError> {
        let token = single(tokens, "duration")?;
        let caps = DURATION_RE
            .captures(token)
            .ok_or_else(|| ParseError::new(format!("'{}' is not a duration", token)))?;
        let amount: u64 = caps[1]
            .parse()
            .map_err(|_| ParseError::new(format!("'{}' is too large", &caps[1])))?;
        let millis = match &caps[2] {
            "ms" => Some(amount),
            "s" => amount.checked_mul(1_000),
            "m" => amount.checked_mul(60_000),
            _ => amount.checked_mul(3_600_000),
        }
        .ok_or_else(|| ParseError::new(format!("'{}' is too large", token)))?;
        Ok(Value::Duration(Duration::from_millis(millis)))
    }

    fn autocomplete(&self, partial: &str) -> Vec<String> {
        if partial.is_empty() || !partial.chars().all(|c| c.is_ascii_digit()) {
            return Vec::new();
        }
        ["ms", "s", "m", "h"]
            .iter()
            .map(|unit| format!("{}{}", partial, unit))
            .collect()
    }

    fn type_name(&self) -> &str {
        "duration"
    }
}

/// Three floats forming a point, `x y z`.
#[derive(Debug, Default)]
pub struct PointParser;

impl ArgumentParser for PointParser {
    fn parse(&self, tokens: &[String]) -> Result<Value, ParseError> {
        if tokens.len() != 3 {
            return Err(ParseError::new(format!(
                "expected 3 coordinates, got {}",
                tokens.len()
            )));
        }
        let coords = tokens
            .iter()
            .map(|t| FloatParser.parse(std::slice::from_ref(t)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::List(coords))
    }

    fn arity(&self) -> usize {
        3
    }

    fn type_name(&self) -> &str {
        "x y z"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_same_parser_is_identity_not_type() {
        let a = parser(IntParser::new());
        let b = parser(IntParser::new());
        let a2 = a.clone();
        assert!(same_parser(&a, &a2));
        assert!(!same_parser(&a, &b));
    }

    #[test]
    fn test_int_parser_range() {
        let p = IntParser::in_range(1, 10);
        assert_eq!(p.parse(&toks(&["7"])), Ok(Value::Int(7)));
        assert!(p.parse(&toks(&["11"])).is_err());
        assert!(p.parse(&toks(&["seven"])).is_err());
        assert!(p.parse(&toks(&["1", "2"])).is_err());
    }

    #[test]
    fn test_float_parser_rejects_non_finite() {
        assert_eq!(FloatParser.parse(&toks(&["2.5"])), Ok(Value::Float(2.5)));
        assert!(FloatParser.parse(&toks(&["inf"])).is_err());
        assert!(FloatParser.parse(&toks(&["NaN"])).is_err());
    }

    #[test]
    fn test_bool_parser_and_completion() {
        assert_eq!(BoolParser.parse(&toks(&["Yes"])), Ok(Value::Bool(true)));
        assert_eq!(BoolParser.parse(&toks(&["off"])), Ok(Value::Bool(false)));
        assert!(BoolParser.parse(&toks(&["maybe"])).is_err());
        assert_eq!(BoolParser.autocomplete("o"), vec!["on", "off"]);
    }

    #[test]
    fn test_duration_parser_units() {
        let p = DurationParser;
        assert_eq!(
            p.parse(&toks(&["250ms"])),
            Ok(Value::Duration(Duration::from_millis(250)))
        );
        assert_eq!(
            p.parse(&toks(&["2m"])),
            Ok(Value::Duration(Duration::from_secs(120)))
        );
        assert!(p.parse(&toks(&["2 m"])).is_err());
        assert!(p.parse(&toks(&["1d"])).is_err());
        assert_eq!(p.autocomplete("5"), vec!["5ms", "5s", "5m", "5h"]);
        assert!(p.autocomplete("x").is_empty());
    }

    #[test]
    fn test_point_parser_consumes_three_tokens() {
        let p = PointParser;
        assert_eq!(p.arity(), 3);
        assert_eq!(
            p.parse(&toks(&["1", "2", "3.5"])),
            Ok(Value::List(vec![
                Value::Float(1.0),
                Value::Float(2.0),
                Value::Float(3.5)
            ]))
        );
        assert!(p.parse(&toks(&["1", "2"])).is_err());
        assert!(p.parse(&toks(&["1", "b", "3"])).is_err());
    }

    #[test]
    fn test_choice_parser() {
        let p = ChoiceParser::new(["red", "green", "grey"]);
        assert_eq!(p.parse(&toks(&["red"])), Ok(Value::from("red")));
        assert!(p.parse(&toks(&["blue"])).is_err());
        assert_eq!(p.autocomplete("gr"), vec!["green", "grey"]);
    }

    #[test]
    fn test_greedy_string_joins() {
        assert_eq!(
            GreedyStringParser.parse(&toks(&["a", "b", "c"])),
            Ok(Value::from("a b c"))
        );
        assert_eq!(GreedyStringParser.parse(&[]), Ok(Value::from("")));
    }
}

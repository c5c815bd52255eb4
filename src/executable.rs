//! Leaf commands: an invocable handler together with its formal parameters.

use crate::error::{CreationError, ExecutionError, ParseError};
use crate::parser::{ParserRef, same_parser};
use crate::value::Value;
use log::trace;
use std::fmt;
use std::sync::Arc;

/// Callback run once every parameter has been parsed.
pub type Handler = Arc<dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync>;

/// One formal argument of an [`Executable`].
#[derive(Clone)]
pub struct Parameter {
    parser: ParserRef,
    arity: usize,
    greedy: bool,
}

impl Parameter {
    /// A parameter consuming as many tokens as `parser` declares (at least one).
    pub fn new(parser: ParserRef) -> Self {
        let arity = parser.arity().max(1);
        Self {
            parser,
            arity,
            greedy: false,
        }
    }

    /// A parameter that swallows every remaining token as one value.
    pub fn greedy(parser: ParserRef) -> Self {
        Self {
            greedy: true,
            ..Self::new(parser)
        }
    }

    /// The shared parser instance; its identity matters for ambiguity checks.
    pub fn parser(&self) -> &ParserRef {
        &self.parser
    }

    /// Number of tokens this parameter consumes when it is not greedy.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Whether this parameter takes every remaining token.
    pub fn is_greedy(&self) -> bool {
        self.greedy
    }

    /// Parse this parameter starting at `offset`, returning the value and the
    /// offset of the next parameter.
    fn parse_at(&self, tokens: &[String], offset: usize) -> Result<(Value, usize), ParseError> {
        let end = if self.greedy {
            tokens.len()
        } else {
            offset + self.arity
        };
        let run = tokens.get(offset..end).ok_or_else(|| {
            ParseError::new(format!(
                "expected {} more token(s)",
                end.saturating_sub(tokens.len())
            ))
        })?;
        Ok((self.parser.parse(run)?, end))
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("type", &self.parser.type_name())
            .field("arity", &self.arity)
            .field("greedy", &self.greedy)
            .finish()
    }
}

/// A single invocable command.
///
/// Build one with [`Executable::builder`]:
///
/// ```
/// use cmdtree::parser::{IntParser, parser};
/// use cmdtree::{Executable, Value};
///
/// let double = Executable::builder("double")
///     .description("doubles a number")
///     .param(parser(IntParser::new()))
///     .handler(|args| Ok(Value::Int(args[0].as_int().unwrap_or_default() * 2)))
///     .build()
///     .unwrap();
/// assert_eq!(double.arity(), 1);
/// assert_eq!(double.invoke(&["21".to_string()]).unwrap(), Value::Int(42));
/// ```
pub struct Executable {
    names: Vec<String>,
    description: Option<String>,
    parameters: Vec<Parameter>,
    arity: usize,
    greedy: bool,
    handler: Handler,
}

impl Executable {
    /// Start building an executable whose canonical name is `name`.
    pub fn builder(name: impl Into<String>) -> ExecutableBuilder {
        ExecutableBuilder {
            names: vec![name.into()],
            description: None,
            parameters: Vec::new(),
            handler: None,
        }
    }

    /// Every name of this executable, canonical name first.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Canonical (first) name.
    pub fn name(&self) -> &str {
        &self.names[0]
    }

    /// Text shown next to the names in help output.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Formal parameters in the order they consume tokens.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Total number of tokens consumed by all parameters.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Whether the last parameter is greedy, so any token count is accepted.
    pub fn is_greedy(&self) -> bool {
        self.greedy
    }

    /// Whether both executables would claim exactly the same token sequences:
    /// equal arity and parser-for-parser identical parameter lists.
    pub fn conflicts_with(&self, other: &Executable) -> bool {
        self.arity == other.arity
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| same_parser(a.parser(), b.parser()))
    }

    /// Parse every parameter left to right. Fails on the first parameter that
    /// does not parse, reporting its index.
    pub fn parse_args(&self, tokens: &[String]) -> Result<Vec<Value>, (usize, ParseError)> {
        let mut offset = 0;
        let mut values = Vec::with_capacity(self.parameters.len());
        for (index, param) in self.parameters.iter().enumerate() {
            let (value, next) = param.parse_at(tokens, offset).map_err(|e| (index, e))?;
            trace!("{}: parameter #{} parsed as {:?}", self.name(), index, value);
            values.push(value);
            offset = next;
        }
        if offset != tokens.len() {
            return Err((
                self.parameters.len(),
                ParseError::new(format!("{} unexpected token(s)", tokens.len() - offset)),
            ));
        }
        Ok(values)
    }

    /// Run the handler on already parsed values.
    pub fn call(&self, values: &[Value]) -> Result<Value, ExecutionError> {
        (self.handler)(values).map_err(ExecutionError::Handler)
    }

    /// Parse raw tokens and run the handler.
    pub fn invoke(&self, tokens: &[String]) -> Result<Value, ExecutionError> {
        let values = self
            .parse_args(tokens)
            .map_err(|(index, e)| ExecutionError::InvalidArgument {
                name: self.name().to_string(),
                index,
                message: e.to_string(),
            })?;
        self.call(&values)
    }

    /// Usage line such as `greet <string> <string>`.
    pub fn usage(&self) -> String {
        let mut out = self.name().to_string();
        for param in &self.parameters {
            out.push_str(" <");
            out.push_str(param.parser().type_name());
            if param.is_greedy() {
                out.push_str("...");
            }
            out.push('>');
        }
        out
    }
}

impl fmt::Debug for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executable")
            .field("names", &self.names)
            .field("parameters", &self.parameters)
            .field("arity", &self.arity)
            .field("greedy", &self.greedy)
            .finish()
    }
}

/// Collects the pieces of an [`Executable`]; created by [`Executable::builder`].
///
/// [`build`](Self::build) fails unless a handler was supplied.
pub struct ExecutableBuilder {
    names: Vec<String>,
    description: Option<String>,
    parameters: Vec<Parameter>,
    handler: Option<Handler>,
}

impl ExecutableBuilder {
    /// Add another name, used when registering with
    /// [`CommandTree::add`](crate::CommandTree::add).
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Set the help description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a parameter parsed by `parser`.
    pub fn param(mut self, parser: ParserRef) -> Self {
        self.parameters.push(Parameter::new(parser));
        self
    }

    /// Append a greedy parameter. It must be the last one.
    pub fn greedy(mut self, parser: ParserRef) -> Self {
        self.parameters.push(Parameter::greedy(parser));
        self
    }

    /// Set the callback invoked with the parsed argument values.
    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(f));
        self
    }

    /// Validate and produce the executable.
    ///
    /// Fails when a greedy parameter is not the last one, or when no handler
    /// was set.
    pub fn build(self) -> Result<Executable, CreationError> {
        let name = self.names.first().cloned().ok_or(CreationError::NoNames)?;
        if let Some(pos) = self.parameters.iter().position(Parameter::is_greedy) {
            if pos + 1 != self.parameters.len() {
                return Err(CreationError::GreedyNotLast { name });
            }
        }
        let handler = self.handler.ok_or(CreationError::NoHandler { name })?;
        let arity = self.parameters.iter().map(Parameter::arity).sum();
        let greedy = self.parameters.last().is_some_and(Parameter::is_greedy);
        Ok(Executable {
            names: self.names,
            description: self.description,
            parameters: self.parameters,
            arity,
            greedy,
            handler,
        })
    }
}

//! Resolution of a token sequence to exactly one handler.

use crate::error::ExecutionError;
use crate::executable::Executable;
use crate::node::{NodeRef, single_tree};
use crate::tree::{CommandTree, DEFAULT_KEY};
use crate::value::Value;
use log::{debug, trace};

impl CommandTree {
    /// Execute a full command line: path segments followed by raw arguments.
    ///
    /// Overloads are filtered by arity (greedy ones always pass). A single
    /// survivor is invoked directly and parses its own arguments. Several
    /// survivors are tried in registration order, and the first whose
    /// parameters all parse wins. When nothing fits the result is
    /// [`ExecutionError::NotFound`], whatever the reason.
    ///
    /// ```
    /// use cmdtree::parser::{StringParser, parser};
    /// use cmdtree::{CommandTree, Executable, Value};
    ///
    /// let mut root = CommandTree::new(["root"]).unwrap();
    /// root.put(
    ///     "hello",
    ///     Executable::builder("hello")
    ///         .param(parser(StringParser))
    ///         .handler(|args| Ok(Value::from(format!("hello, {}", args[0]))))
    ///         .build()
    ///         .unwrap(),
    /// )
    /// .unwrap();
    /// root.init().unwrap();
    /// assert_eq!(root.execute(&["hello", "Bob"]).unwrap(), Value::from("hello, Bob"));
    /// assert!(root.execute(&["hello"]).is_err());
    /// ```
    pub fn execute<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Value, ExecutionError> {
        let tokens: Vec<String> = if tokens.is_empty() {
            vec![DEFAULT_KEY.to_string()]
        } else {
            tokens.iter().map(|t| t.as_ref().to_string()).collect()
        };
        let not_found = || ExecutionError::NotFound {
            path: tokens.join(" "),
        };

        let (nodes, args) = self.get_with_args(tokens.as_slice());
        let nodes = nodes.filter(|n| !n.is_empty()).ok_or_else(not_found)?;
        let candidates = matching_arity(nodes, args.len());
        debug!(
            "{:?}: {} of {} overloads accept {} argument(s)",
            tokens,
            candidates.len(),
            nodes.len(),
            args.len()
        );

        match candidates.as_slice() {
            [] => Err(not_found()),
            [only] => only.invoke(args),
            _ => {
                for exe in &candidates {
                    match exe.parse_args(args) {
                        Ok(values) => {
                            debug!("selected overload '{}'", exe.usage());
                            return exe.call(&values);
                        }
                        Err((index, e)) => trace!(
                            "'{}' rejected at parameter #{}: {}",
                            exe.usage(),
                            index,
                            e
                        ),
                    }
                }
                Err(not_found())
            }
        }
    }

    /// Completion candidates for the last token of `tokens`, which may be
    /// partially typed (or empty).
    pub fn complete<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<String> {
        let Some((partial, head)) = tokens.split_last() else {
            return self.complete_segment("");
        };
        let partial = partial.as_ref();
        let mut out = Vec::new();

        let mut current = self;
        let mut walked = 0;
        while let Some(tree) = head
            .get(walked)
            .and_then(move |segment| current.get(segment.as_ref()))
            .and_then(single_tree)
        {
            current = tree;
            walked += 1;
        }
        if walked == head.len() {
            out.extend(current.complete_segment(partial));
        }

        let (nodes, args) = if head.is_empty() {
            (self.get(DEFAULT_KEY), head)
        } else {
            self.get_with_args(head)
        };
        for exe in nodes.unwrap_or_default().iter().filter_map(|n| n.as_executable()) {
            out.extend(complete_parameter(exe, args.len(), partial));
        }

        out.sort();
        out.dedup();
        out
    }

    fn complete_segment(&self, partial: &str) -> Vec<String> {
        self.children()
            .keys()
            .filter(|k| !k.is_empty() && k.starts_with(partial))
            .cloned()
            .collect()
    }
}

fn matching_arity(nodes: &[NodeRef], count: usize) -> Vec<&Executable> {
    nodes
        .iter()
        .filter_map(|n| n.as_executable())
        .filter(|exe| exe.arity() == count || exe.is_greedy())
        .collect()
}

/// Ask the parser of whichever parameter covers token `position`.
fn complete_parameter(exe: &Executable, position: usize, partial: &str) -> Vec<String> {
    let mut offset = 0;
    for param in exe.parameters() {
        if position >= offset && (param.is_greedy() || position < offset + param.arity()) {
            return param.parser().autocomplete(partial);
        }
        offset += param.arity();
    }
    Vec::new()
}

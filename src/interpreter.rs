use crate::builtin::{self, BuiltinContext};
use crate::error::{CreationError, ExecutionError};
use crate::lexer;
use crate::tree::CommandTree;
use crate::value::Value;
use log::{debug, warn};
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper, Result};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Runs command lines against a frozen command registry.
///
/// Example
/// ```
/// use cmdtree::{Interpreter, Value};
/// let sh = Interpreter::with_builtins().unwrap();
/// assert_eq!(sh.run(&["greet", "Bob"]).unwrap(), Value::from("Hello, Bob!"));
/// assert_eq!(sh.run_line("math.add 1 2.5").unwrap(), Value::Float(3.5));
/// ```
pub struct Interpreter {
    root: Arc<CommandTree>,
    exit: Arc<AtomicBool>,
}

impl Interpreter {
    /// Freeze `root` and wrap it in an interpreter.
    pub fn new(root: CommandTree) -> std::result::Result<Self, CreationError> {
        root.init()?;
        Ok(Self {
            root: Arc::new(root),
            exit: Arc::new(AtomicBool::new(false)),
        })
    }

    /// An interpreter with the built-in command set registered at its root.
    pub fn with_builtins() -> std::result::Result<Self, CreationError> {
        let ctx = BuiltinContext::default();
        let mut root = CommandTree::new(["cmdtree"])?.with_description("built-in commands");
        builtin::register(&mut root, &ctx)?;
        root.init()?;
        let root = Arc::new(root);
        // Only ever set here, right after the tree is shared.
        let _ = ctx.root.set(Arc::downgrade(&root));
        Ok(Self {
            root,
            exit: ctx.exit,
        })
    }

    /// The frozen registry commands are dispatched through.
    pub fn root(&self) -> &Arc<CommandTree> {
        &self.root
    }

    /// Whether a command asked the interactive loop to stop.
    pub fn should_exit(&self) -> bool {
        self.exit.load(Ordering::SeqCst)
    }

    /// Dispatch one already tokenized command.
    pub fn run<S: AsRef<str>>(&self, tokens: &[S]) -> std::result::Result<Value, ExecutionError> {
        self.root.execute(tokens)
    }

    /// Tokenize and dispatch one line. The first word may use `a.b` path syntax.
    pub fn run_line(&self, line: &str) -> anyhow::Result<Value> {
        let tokens = self.expand_dotted_head(lexer::split_command_line(line)?);
        debug!("tokens = {:?}", tokens);
        Ok(self.run(tokens.as_slice())?)
    }

    /// Split a first word such as `math.add` into path segments.
    ///
    /// Only applies when the first segment names a child of the root and no
    /// segment is empty. Anything else, such as `2.5` or `.`, stays a single
    /// token.
    pub fn expand_dotted_head(&self, mut tokens: Vec<String>) -> Vec<String> {
        let Some(head) = tokens.first() else {
            return tokens;
        };
        let segments: Vec<&str> = head.split('.').collect();
        if segments.len() < 2
            || segments.iter().any(|s| s.is_empty())
            || self.root.get(segments[0]).is_none()
        {
            return tokens;
        }
        let segments: Vec<String> = segments.into_iter().map(str::to_string).collect();
        tokens.splice(0..1, segments);
        tokens
    }

    /// Interactive loop with history and tab completion.
    pub fn repl(&self, prompt: &str, history: Option<&Path>) -> Result<()> {
        let mut rl: Editor<CompletionHelper, DefaultHistory> = Editor::new()?;
        rl.set_helper(Some(CompletionHelper {
            root: self.root.clone(),
        }));
        if let Some(path) = history {
            if let Err(err) = rl.load_history(path) {
                debug!("no history loaded from {}: {}", path.display(), err);
            }
        }

        loop {
            match rl.readline(prompt) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line.as_str())?;
                    match self.run_line(&line) {
                        Ok(value) if value.is_unit() => {}
                        Ok(value) => println!("{}", value),
                        Err(err) => eprintln!("{}", err),
                    }
                    if self.should_exit() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        if let Some(path) = history {
            if let Err(err) = rl.save_history(path) {
                warn!("failed to save history to {}: {}", path.display(), err);
            }
        }
        Ok(())
    }
}

/// Forwards rustyline completion requests to [`CommandTree::complete`].
struct CompletionHelper {
    root: Arc<CommandTree>,
}

impl CompletionHelper {
    /// Replacement offset into `prefix` and the candidates for the word there.
    fn candidates(&self, prefix: &str) -> (usize, Vec<String>) {
        let Ok(tokens) = lexer::split_partial(prefix) else {
            return (prefix.len(), Vec::new());
        };
        let start = tokens.last().map_or(prefix.len(), |t| t.start);
        let words: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        (start, self.root.complete(words.as_slice()))
    }
}

impl Completer for CompletionHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> Result<(usize, Vec<String>)> {
        Ok(self.candidates(&line[..pos]))
    }
}

impl Hinter for CompletionHelper {
    type Hint = String;
}

impl Highlighter for CompletionHelper {}

impl Validator for CompletionHelper {}

impl Helper for CompletionHelper {}

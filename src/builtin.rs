//! Built-in command set installed by
//! [`Interpreter::with_builtins`](crate::Interpreter::with_builtins).

use crate::error::CreationError;
use crate::executable::Executable;
use crate::node::Node;
use crate::parser::{
    BoolParser, ChoiceParser, DurationParser, FloatParser, GreedyStringParser, IntParser,
    PointParser, StringParser, parser,
};
use crate::tree::CommandTree;
use crate::value::Value;
use anyhow::{Context, anyhow};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

/// Longest list `math range` will produce.
const MAX_RANGE: i64 = 1_000;

const FLAGS: [&str; 3] = ["color", "verbose", "confirm"];

/// State shared between the interpreter and the built-in handlers.
#[derive(Clone, Default)]
pub(crate) struct BuiltinContext {
    /// Filled in once the root tree is frozen and shared.
    pub root: Arc<OnceLock<Weak<CommandTree>>>,
    pub exit: Arc<AtomicBool>,
    pub flags: Arc<Mutex<BTreeMap<String, bool>>>,
}

impl BuiltinContext {
    fn root(&self) -> anyhow::Result<Arc<CommandTree>> {
        self.root
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| anyhow!("command registry is not available"))
    }
}

/// Register every built-in command under `root`.
pub(crate) fn register(root: &mut CommandTree, ctx: &BuiltinContext) -> Result<(), CreationError> {
    let text = parser(GreedyStringParser);
    let word = parser(StringParser);

    let help_ctx = ctx.clone();
    root.add(
        Executable::builder("help")
            .alias("?")
            .description("show commands, or the commands under a path")
            .greedy(text.clone())
            .handler(move |args| help(&help_ctx, args))
            .build()?,
    )?;

    root.add(
        Executable::builder("echo")
            .description("print the arguments separated by spaces")
            .greedy(text)
            .handler(|args| Ok(args[0].clone()))
            .build()?,
    )?;

    root.put(
        "greet",
        Executable::builder("greet")
            .description("greet someone by name")
            .param(word.clone())
            .handler(|args| Ok(Value::from(format!("Hello, {}!", args[0]))))
            .build()?,
    )?;
    root.put(
        "greet",
        Executable::builder("greet")
            .description("greet someone by first and last name")
            .param(word.clone())
            .param(word)
            .handler(|args| Ok(Value::from(format!("Hello, {} {}!", args[0], args[1]))))
            .build()?,
    )?;

    root.add_tree(math_tree()?)?;
    root.add_tree(settings_tree(ctx)?)?;

    root.add(
        Executable::builder("sleep")
            .description("pause for a duration such as 250ms or 2s")
            .param(parser(DurationParser))
            .handler(|args| {
                let duration = args[0].as_duration().context("sleep: expected a duration")?;
                std::thread::sleep(duration);
                Ok(Value::Unit)
            })
            .build()?,
    )?;

    root.add(
        Executable::builder("move")
            .alias("tp")
            .description("move to a point")
            .param(parser(PointParser))
            .handler(|args| Ok(Value::from(format!("moved to {}", args[0]))))
            .build()?,
    )?;

    let exit = ctx.exit.clone();
    root.add(
        Executable::builder("exit")
            .alias("quit")
            .description("leave the interactive loop")
            .handler(move |_| {
                exit.store(true, Ordering::SeqCst);
                Ok(Value::Unit)
            })
            .build()?,
    )?;

    Ok(())
}

fn help(ctx: &BuiltinContext, args: &[Value]) -> anyhow::Result<Value> {
    let root = ctx.root()?;
    let path: Vec<&str> = args[0].as_str().unwrap_or_default().split_whitespace().collect();
    if path.is_empty() {
        return Ok(Value::from(root.get_help().join("\n")));
    }
    let nodes = root
        .get_path(path.as_slice())
        .ok_or_else(|| anyhow!("help: no such command: {}", path.join(" ")))?;
    let mut lines = Vec::new();
    for node in nodes {
        match node.as_ref() {
            Node::Tree(tree) => lines.extend(tree.get_help().iter().cloned()),
            Node::Executable(exe) => lines.push(match exe.description() {
                Some(d) => format!("{}: {}", exe.usage(), d),
                None => exe.usage(),
            }),
        }
    }
    Ok(Value::from(lines.join("\n")))
}

fn math_tree() -> Result<CommandTree, CreationError> {
    let mut math = CommandTree::new(["math", "m"])?.with_description("arithmetic helpers");
    let int = parser(IntParser::new());
    let float = parser(FloatParser);

    math.put(
        "add",
        Executable::builder("add")
            .description("add two integers")
            .param(int.clone())
            .param(int.clone())
            .handler(|args| {
                let (a, b) = (args[0].as_int(), args[1].as_int());
                a.zip(b)
                    .and_then(|(a, b)| a.checked_add(b))
                    .map(Value::Int)
                    .ok_or_else(|| anyhow!("add: integer overflow"))
            })
            .build()?,
    )?;
    math.put(
        "add",
        Executable::builder("add")
            .description("add two numbers")
            .param(float.clone())
            .param(float)
            .handler(|args| {
                let a = args[0].as_float().unwrap_or_default();
                let b = args[1].as_float().unwrap_or_default();
                Ok(Value::Float(a + b))
            })
            .build()?,
    )?;

    math.put(
        "range",
        Executable::builder("range")
            .description("list the integers from lo to hi")
            .param(int.clone())
            .param(int)
            .handler(|args| {
                let lo = args[0].as_int().unwrap_or_default();
                let hi = args[1].as_int().unwrap_or_default();
                if hi.saturating_sub(lo) >= MAX_RANGE {
                    return Err(anyhow!("range: at most {} values", MAX_RANGE));
                }
                Ok(Value::List((lo..=hi).map(Value::Int).collect()))
            })
            .build()?,
    )?;

    Ok(math)
}

fn settings_tree(ctx: &BuiltinContext) -> Result<CommandTree, CreationError> {
    let mut settings = CommandTree::new(["settings", "set"])?.with_description("toggle flags");

    let flags = ctx.flags.clone();
    settings.put(
        "main",
        Executable::builder("show")
            .description("show every flag")
            .handler(move |_| {
                let flags = flags.lock().map_err(|_| anyhow!("settings are poisoned"))?;
                let lines: Vec<String> = FLAGS
                    .iter()
                    .map(|f| format!("{} = {}", f, flags.get(*f).copied().unwrap_or(false)))
                    .collect();
                Ok(Value::from(lines.join("\n")))
            })
            .build()?,
    )?;

    let flags = ctx.flags.clone();
    settings.put(
        "main",
        Executable::builder("flag")
            .description("set a flag")
            .param(parser(ChoiceParser::new(FLAGS)))
            .param(parser(BoolParser))
            .handler(move |args| {
                let name = args[0].as_str().unwrap_or_default().to_string();
                let value = args[1].as_bool().unwrap_or_default();
                flags
                    .lock()
                    .map_err(|_| anyhow!("settings are poisoned"))?
                    .insert(name.clone(), value);
                Ok(Value::from(format!("{} = {}", name, value)))
            })
            .build()?,
    )?;

    Ok(settings)
}

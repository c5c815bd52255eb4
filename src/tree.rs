//! Branch nodes of the registry.
//!
//! A [`CommandTree`] is built with `&mut self` calls to [`put`](CommandTree::put)
//! and friends, then frozen with [`init`](CommandTree::init). After that it is
//! only read, so a frozen tree can be shared between threads behind an `Arc`.
//! The help text and the deduplicated child view are computed lazily and
//! published through `ArcSwapOption` slots; two readers racing on an empty slot
//! may both compute it, and whichever value lands first is kept.

use crate::error::CreationError;
use crate::executable::Executable;
use crate::node::{Node, NodeRef, single_tree};
use arc_swap::ArcSwapOption;
use log::{debug, warn};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Key holding a tree's default command.
pub const DEFAULT_KEY: &str = "";

/// Registration-time spelling of [`DEFAULT_KEY`].
const MAIN_ALIAS: &str = "main";

/// Children by key. A key holds either one sub-tree or a list of overloads.
pub type ChildMap = BTreeMap<String, Vec<NodeRef>>;

fn normalize(segment: &str) -> &str {
    if segment == MAIN_ALIAS {
        DEFAULT_KEY
    } else {
        segment
    }
}

struct HelpCache {
    /// Description the lines were rendered from, compared by pointer.
    description: Option<Arc<String>>,
    /// Help of each sub-tree in render order, compared by pointer.
    sub_help: Vec<Arc<Vec<String>>>,
    lines: Arc<Vec<String>>,
}

/// A named container of sub-commands.
pub struct CommandTree {
    names: Vec<String>,
    description: ArcSwapOption<String>,
    children: ChildMap,
    deduped: ArcSwapOption<ChildMap>,
    help: ArcSwapOption<HelpCache>,
    initialized: AtomicBool,
}

impl CommandTree {
    /// An empty, mutable tree. The first name is canonical, the rest are
    /// aliases used by [`add_tree`](Self::add_tree).
    pub fn new<I, S>(names: I) -> Result<Self, CreationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(CreationError::NoNames);
        }
        Ok(Self {
            names,
            description: ArcSwapOption::empty(),
            children: BTreeMap::new(),
            deduped: ArcSwapOption::empty(),
            help: ArcSwapOption::empty(),
            initialized: AtomicBool::new(false),
        })
    }

    /// Builder-style [`set_description`](Self::set_description).
    pub fn with_description(self, description: impl Into<String>) -> Self {
        self.set_description(description);
        self
    }

    /// Every name of this tree, canonical name first.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Canonical (first) name.
    pub fn name(&self) -> &str {
        &self.names[0]
    }

    pub fn description(&self) -> Option<Arc<String>> {
        self.description.load_full()
    }

    /// Replace the description. Allowed after `init`; drops the cached help.
    pub fn set_description(&self, description: impl Into<String>) {
        self.description.store(Some(Arc::new(description.into())));
        self.help.store(None);
    }

    /// Whether [`init`](Self::init) has frozen this tree.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Every child key with its nodes. Aliases appear under each of their keys.
    pub fn children(&self) -> &ChildMap {
        &self.children
    }

    fn ensure_mutable(&self, key: &str) -> Result<(), CreationError> {
        if self.is_initialized() {
            warn!(
                "rejected registration of '{}' on frozen tree '{}'",
                key,
                self.name()
            );
            return Err(CreationError::Initialized);
        }
        Ok(())
    }

    fn check_executable_slot(&self, key: &str) -> Result<(), CreationError> {
        match self.children.get(key) {
            Some(nodes) if nodes.iter().any(|n| n.as_tree().is_some()) => {
                Err(CreationError::TreeConflict {
                    key: key.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn check_tree_slot(&self, key: &str) -> Result<(), CreationError> {
        if self.children.contains_key(key) {
            return Err(CreationError::TreeConflict {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    /// Append an overload under `segment`.
    pub fn put(&mut self, segment: &str, executable: Executable) -> Result<(), CreationError> {
        let key = normalize(segment);
        self.ensure_mutable(key)?;
        self.check_executable_slot(key)?;
        debug!(
            "{}: register executable '{}' at '{}'",
            self.name(),
            executable.name(),
            key
        );
        self.children
            .entry(key.to_string())
            .or_default()
            .push(Arc::new(Node::Executable(executable)));
        Ok(())
    }

    /// Register an executable under each of its names.
    pub fn add(&mut self, executable: Executable) -> Result<(), CreationError> {
        let keys: Vec<String> = executable
            .names()
            .iter()
            .map(|n| normalize(n).to_string())
            .collect();
        for key in &keys {
            self.ensure_mutable(key)?;
            self.check_executable_slot(key)?;
        }
        debug!("{}: register executable under {:?}", self.name(), keys);
        let node = Arc::new(Node::Executable(executable));
        for key in keys {
            let slot = self.children.entry(key).or_default();
            if !slot.iter().any(|n| Arc::ptr_eq(n, &node)) {
                slot.push(node.clone());
            }
        }
        Ok(())
    }

    /// Insert a sub-tree under `segment`. Sub-trees cannot be overloaded.
    pub fn put_tree(&mut self, segment: &str, tree: CommandTree) -> Result<(), CreationError> {
        let key = normalize(segment);
        self.ensure_mutable(key)?;
        self.check_tree_slot(key)?;
        debug!(
            "{}: register tree '{}' at '{}'",
            self.name(),
            tree.name(),
            key
        );
        self.children
            .insert(key.to_string(), vec![Arc::new(Node::Tree(tree))]);
        Ok(())
    }

    /// Insert a sub-tree under every one of its names.
    pub fn add_tree(&mut self, tree: CommandTree) -> Result<(), CreationError> {
        let mut keys: Vec<String> = tree
            .names()
            .iter()
            .map(|n| normalize(n).to_string())
            .collect();
        keys.dedup();
        for key in &keys {
            self.ensure_mutable(key)?;
            self.check_tree_slot(key)?;
        }
        debug!("{}: register tree under {:?}", self.name(), keys);
        let node = Arc::new(Node::Tree(tree));
        for key in keys {
            self.children.insert(key, vec![node.clone()]);
        }
        Ok(())
    }

    /// Freeze this tree and every sub-tree, rejecting ambiguous overload sets.
    ///
    /// Two overloads are ambiguous when they have the same arity and use the
    /// very same parser instances in the same order. A second call is a no-op.
    pub fn init(&self) -> Result<(), CreationError> {
        if self.is_initialized() {
            return Ok(());
        }
        for (key, nodes) in &self.children {
            let mut executables = Vec::with_capacity(nodes.len());
            for node in nodes {
                match node.as_ref() {
                    Node::Tree(tree) => tree.init()?,
                    Node::Executable(exe) => executables.push(exe),
                }
            }
            for (i, a) in executables.iter().enumerate() {
                if let Some(b) = executables[i + 1..].iter().find(|b| a.conflicts_with(b)) {
                    return Err(CreationError::Ambiguous {
                        key: key.clone(),
                        name: b.name().to_string(),
                    });
                }
            }
        }
        self.initialized.store(true, Ordering::Release);
        debug!(
            "initialized tree '{}' with {} keys",
            self.name(),
            self.children.len()
        );
        Ok(())
    }

    /// Direct lookup of one segment.
    pub fn get(&self, segment: &str) -> Option<&[NodeRef]> {
        self.children.get(segment).map(Vec::as_slice)
    }

    /// Follow `path` through nested trees.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&[NodeRef]> {
        let (first, rest) = path.split_first()?;
        let mut nodes = self.get(first.as_ref())?;
        for segment in rest {
            nodes = single_tree(nodes)?.get(segment.as_ref())?;
        }
        Some(nodes)
    }

    /// Resolve the longest command prefix of `path`, returning the matched
    /// nodes and the tokens left over as arguments.
    ///
    /// A segment that is not a child falls back to the tree's default entry
    /// (and becomes the first argument) as long as nothing has matched yet. A
    /// walk ending on a single sub-tree routes to that sub-tree's default entry.
    pub fn get_with_args<'a, S: AsRef<str>>(
        &'a self,
        path: &'a [S],
    ) -> (Option<&'a [NodeRef]>, &'a [S]) {
        let mut current = self;
        let mut matched: Option<&'a [NodeRef]> = None;
        let mut consumed = 0;
        for (i, segment) in path.iter().enumerate() {
            match current.get(segment.as_ref()) {
                Some(nodes) => {
                    matched = Some(nodes);
                    consumed = i + 1;
                    match single_tree(nodes) {
                        Some(tree) => current = tree,
                        None => break,
                    }
                }
                None => {
                    if matched.is_none() {
                        if let Some(default) = current.get(DEFAULT_KEY) {
                            matched = Some(default);
                            consumed = i;
                        }
                    }
                    break;
                }
            }
        }
        if let Some(default) = matched
            .and_then(single_tree)
            .and_then(|tree| tree.get(DEFAULT_KEY))
        {
            matched = Some(default);
        }
        (matched, &path[consumed..])
    }

    /// Children with nodes that appear under several keys kept only at the
    /// first key (in key order). Display only; dispatch uses
    /// [`children`](Self::children).
    pub fn deduped_children(&self) -> Arc<ChildMap> {
        if let Some(cached) = self.deduped.load_full() {
            return cached;
        }
        let mut seen: HashSet<*const Node> = HashSet::new();
        let mut map = ChildMap::new();
        for (key, nodes) in &self.children {
            let kept: Vec<NodeRef> = nodes
                .iter()
                .filter(|n| seen.insert(Arc::as_ptr(n)))
                .cloned()
                .collect();
            if !kept.is_empty() {
                map.insert(key.clone(), kept);
            }
        }
        let computed = Arc::new(map);
        self.deduped
            .rcu(|current| current.clone().or_else(|| Some(computed.clone())));
        self.deduped.load_full().unwrap_or(computed)
    }

    /// Help text, one entry per line.
    ///
    /// The first line is the tree header, then every deduplicated child
    /// indented by two spaces. Sub-trees contribute their own help, so the
    /// cached text is rebuilt when this tree's description or the help of any
    /// sub-tree changes.
    pub fn get_help(&self) -> Arc<Vec<String>> {
        let description = self.description.load_full();
        let children = self.deduped_children();
        let sub_help: Vec<Arc<Vec<String>>> = children
            .values()
            .flatten()
            .filter_map(|node| node.as_tree())
            .map(CommandTree::get_help)
            .collect();
        if let Some(cache) = self.help.load_full() {
            if same_description(&cache.description, &description)
                && same_help(&cache.sub_help, &sub_help)
            {
                return cache.lines.clone();
            }
        }
        let lines = self.render_help(description.as_deref(), &children, &sub_help);
        let lines = Arc::new(lines);
        self.help.store(Some(Arc::new(HelpCache {
            description,
            sub_help,
            lines: lines.clone(),
        })));
        lines
    }

    fn render_help(
        &self,
        description: Option<&String>,
        children: &ChildMap,
        sub_help: &[Arc<Vec<String>>],
    ) -> Vec<String> {
        let mut lines = vec![format!(
            "Help for /{}{}",
            self.names.join("|"),
            describe(description.map(String::as_str))
        )];
        let mut sub_help = sub_help.iter();
        for node in children.values().flatten() {
            match node.as_ref() {
                Node::Executable(exe) => lines.push(format!(
                    "  {}{}",
                    exe.names().join("|"),
                    describe(exe.description())
                )),
                Node::Tree(_) => {
                    if let Some(help) = sub_help.next() {
                        lines.extend(help.iter().map(|l| format!("  {}", l)));
                    }
                }
            }
        }
        lines
    }

    /// Write the full help dump to `out`.
    pub fn print_full(&self, out: &mut dyn Write) -> io::Result<()> {
        for line in self.get_help().iter() {
            writeln!(out, "{}", line)?;
        }
        Ok(())
    }
}

fn describe(description: Option<&str>) -> String {
    match description {
        Some(d) => format!(": {}", d),
        None => String::new(),
    }
}

fn same_description(a: &Option<Arc<String>>, b: &Option<Arc<String>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn same_help(a: &[Arc<Vec<String>>], b: &[Arc<Vec<String>>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| Arc::ptr_eq(a, b))
}

impl fmt::Debug for CommandTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTree")
            .field("names", &self.names)
            .field("description", &self.description.load_full())
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{FloatParser, IntParser, StringParser, parser};
    use crate::value::Value;

    fn unit(_: &[Value]) -> anyhow::Result<Value> {
        Ok(Value::Unit)
    }

    fn exe(name: &str) -> Executable {
        Executable::builder(name).handler(unit).build().unwrap()
    }

    fn tree(name: &str) -> CommandTree {
        CommandTree::new([name]).unwrap()
    }

    #[test]
    fn test_new_requires_a_name() {
        let err = CommandTree::new(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, CreationError::NoNames));
    }

    #[test]
    fn test_put_after_init_is_rejected_and_tree_unchanged() {
        let mut root = tree("root");
        root.put("a", exe("a")).unwrap();
        root.init().unwrap();

        assert!(matches!(root.put("b", exe("b")), Err(CreationError::Initialized)));
        assert!(matches!(root.put("a", exe("a2")), Err(CreationError::Initialized)));
        assert!(matches!(root.put_tree("t", tree("t")), Err(CreationError::Initialized)));
        assert!(matches!(root.add(exe("c")), Err(CreationError::Initialized)));
        assert!(matches!(root.add_tree(tree("t")), Err(CreationError::Initialized)));
        assert_eq!(root.children().keys().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(root.get("a").unwrap().len(), 1);
    }

    #[test]
    fn test_second_tree_under_same_key_fails_before_init() {
        let mut root = tree("root");
        root.put_tree("sub", tree("sub")).unwrap();
        let err = root.put_tree("sub", tree("other")).unwrap_err();
        assert!(matches!(err, CreationError::TreeConflict { key } if key == "sub"));
        assert!(!root.is_initialized());
    }

    #[test]
    fn test_tree_and_executables_do_not_share_a_key() {
        let mut root = tree("root");
        root.put("x", exe("x")).unwrap();
        assert!(root.put_tree("x", tree("x")).is_err());

        root.put_tree("y", tree("y")).unwrap();
        assert!(root.put("y", exe("y")).is_err());
    }

    #[test]
    fn test_main_is_the_default_key() {
        let mut root = tree("root");
        root.put("main", exe("main")).unwrap();
        assert!(root.get(DEFAULT_KEY).is_some());
        assert!(root.get("main").is_none());
    }

    #[test]
    fn test_add_registers_every_alias_once() {
        let mut root = tree("root");
        let list = Executable::builder("list")
            .alias("ls")
            .handler(unit)
            .build()
            .unwrap();
        root.add(list).unwrap();
        let a = &root.get("list").unwrap()[0];
        let b = &root.get("ls").unwrap()[0];
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn test_init_detects_identical_parser_sequences() {
        let int = parser(IntParser::new());
        let mut root = tree("root");
        let n1 = Executable::builder("n1")
            .param(int.clone())
            .handler(unit)
            .build()
            .unwrap();
        let n2 = Executable::builder("n2")
            .param(int)
            .handler(unit)
            .build()
            .unwrap();
        root.put("n", n1).unwrap();
        root.put("n", n2).unwrap();
        let err = root.init().unwrap_err();
        assert!(matches!(
            err,
            CreationError::Ambiguous { ref key, ref name } if key == "n" && name == "n2"
        ));
        assert!(!root.is_initialized());
    }

    #[test]
    fn test_init_accepts_distinct_arity_or_parser_identity() {
        let int = parser(IntParser::new());
        let overloads = [
            Executable::builder("one").param(int.clone()),
            Executable::builder("two").param(int.clone()).param(int.clone()),
            Executable::builder("other-int").param(parser(IntParser::new())),
            Executable::builder("float").param(parser(FloatParser)),
        ];
        let mut root = tree("root");
        for builder in overloads {
            root.put("n", builder.handler(unit).build().unwrap()).unwrap();
        }
        root.init().unwrap();
        root.init().unwrap();
        assert!(root.is_initialized());
    }

    #[test]
    fn test_init_recurses_into_sub_trees() {
        let s = parser(StringParser);
        let mut sub = tree("sub");
        for name in ["x1", "x2"] {
            let x = Executable::builder(name)
                .param(s.clone())
                .handler(unit)
                .build()
                .unwrap();
            sub.put("x", x).unwrap();
        }
        let mut root = tree("root");
        root.add_tree(sub).unwrap();
        assert!(root.init().is_err());

        let mut ok = tree("ok");
        ok.add_tree(tree("leaf")).unwrap();
        ok.init().unwrap();
        assert!(single_tree(ok.get("leaf").unwrap()).unwrap().is_initialized());
    }

    #[test]
    fn test_get_path_walks_trees() {
        let mut b = tree("b");
        b.put("c", exe("c")).unwrap();
        let mut a = tree("a");
        a.add_tree(b).unwrap();
        let mut root = tree("root");
        root.add_tree(a).unwrap();
        root.init().unwrap();

        let found = root.get_path(&["a", "b", "c"]).unwrap();
        assert_eq!(found[0].names(), ["c"]);
        assert!(root.get_path(&["a", "x"]).is_none());
        assert!(root.get_path(&["a", "b", "c", "d"]).is_none());
        assert!(root.get_path::<&str>(&[]).is_none());
    }

    #[test]
    fn test_get_with_args_uses_defaults() {
        let mut b = tree("b");
        b.put(DEFAULT_KEY, exe("b-main")).unwrap();
        let mut a = tree("a");
        a.add_tree(b).unwrap();
        let mut root = tree("root");
        root.add_tree(a).unwrap();
        root.put("main", exe("root-main")).unwrap();
        root.init().unwrap();

        let path = ["a", "b"];
        let (nodes, rest) = root.get_with_args(&path);
        assert_eq!(nodes.unwrap()[0].names(), ["b-main"]);
        assert!(rest.is_empty());

        let path = ["a", "b", "x", "y"];
        let (nodes, rest) = root.get_with_args(&path);
        assert_eq!(nodes.unwrap()[0].names(), ["b-main"]);
        assert_eq!(rest, ["x", "y"]);

        let path = ["unknown", "arg"];
        let (nodes, rest) = root.get_with_args(&path);
        assert_eq!(nodes.unwrap()[0].names(), ["root-main"]);
        assert_eq!(rest, ["unknown", "arg"]);

        let path = ["a"];
        let (nodes, rest) = root.get_with_args(&path);
        assert!(nodes.unwrap()[0].as_tree().is_some());
        assert!(rest.is_empty());
    }

    #[test]
    fn test_help_for_empty_tree() {
        let t = CommandTree::new(["test"]).unwrap().with_description("desc");
        assert_eq!(*t.get_help(), vec!["Help for /test: desc".to_string()]);
    }

    #[test]
    fn test_help_is_sorted_deduped_and_indented() {
        let mut sub = CommandTree::new(["sub", "s"]).unwrap().with_description("nested");
        let leaf = Executable::builder("leaf")
            .description("a leaf")
            .handler(unit)
            .build()
            .unwrap();
        sub.put("leaf", leaf).unwrap();
        let mut root = CommandTree::new(["root"]).unwrap();
        root.add_tree(sub).unwrap();
        let zed = Executable::builder("zed")
            .alias("alpha")
            .handler(unit)
            .build()
            .unwrap();
        root.add(zed).unwrap();
        root.init().unwrap();

        let expected = vec![
            "Help for /root",
            "  zed|alpha",
            "  Help for /sub|s: nested",
            "    leaf: a leaf",
        ];
        assert_eq!(*root.get_help(), expected);

        let deduped = root.deduped_children();
        assert_eq!(deduped.keys().collect::<Vec<_>>(), vec!["alpha", "s"]);
        assert_eq!(root.children().len(), 4);
    }

    #[test]
    fn test_caches_are_stable_across_reads() {
        let mut root = tree("root");
        let x = Executable::builder("x")
            .alias("y")
            .handler(unit)
            .build()
            .unwrap();
        root.add(x).unwrap();
        root.add_tree(tree("sub")).unwrap();
        root.init().unwrap();

        let first = root.get_help();
        let deduped = root.deduped_children();
        let _ = root.get_path(&["x"]);
        assert_eq!(first, root.get_help());
        assert!(Arc::ptr_eq(&first, &root.get_help()));
        assert!(Arc::ptr_eq(&deduped, &root.deduped_children()));
    }

    #[test]
    fn test_description_change_recomputes_help() {
        let t = tree("t");
        t.init().unwrap();
        assert_eq!(*t.get_help(), vec!["Help for /t"]);
        t.set_description("now described");
        assert_eq!(*t.get_help(), vec!["Help for /t: now described"]);
    }

    #[test]
    fn test_sub_tree_description_change_reaches_parent_help() {
        let mut mid = tree("mid");
        mid.add_tree(CommandTree::new(["sub"]).unwrap().with_description("old"))
            .unwrap();
        let mut root = tree("root");
        root.add_tree(mid).unwrap();
        root.init().unwrap();
        assert!(root.get_help().contains(&"    Help for /sub: old".to_string()));

        let mid = single_tree(root.get("mid").unwrap()).unwrap();
        let sub = single_tree(mid.get("sub").unwrap()).unwrap();
        sub.set_description("new");
        let help = root.get_help();
        assert!(help.contains(&"    Help for /sub: new".to_string()));
        assert!(!help.contains(&"    Help for /sub: old".to_string()));
        assert!(mid.get_help().contains(&"  Help for /sub: new".to_string()));
    }

    #[test]
    fn test_print_full_writes_lines() {
        let t = CommandTree::new(["p"]).unwrap().with_description("d");
        let mut out = Vec::new();
        t.print_full(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Help for /p: d\n");
    }

    #[test]
    fn test_frozen_tree_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CommandTree>();
    }
}

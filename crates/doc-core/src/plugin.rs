use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::Editor;
use crate::error::{CommandError, RegistryError};
use crate::markup::{MarkupElement, MarkupNode};
use crate::node::{Document, ElementKind, ElementNode, Node, TextNode};
use crate::ops::{Op, Transaction};
use crate::plugins;

/// Parent name used by rules for nodes sitting directly under the document.
pub const DOCUMENT: &str = "document";

/// Paragraphs and headings: blocks whose content is inline text.
pub const TEXT_BLOCKS: &[&str] = &["paragraph", "heading"];

pub type CommandHandler =
    Arc<dyn Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync>;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<Value>,
    pub handler: CommandHandler,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: Value) -> Self {
        self.args_example = Some(args_example);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Block,
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    /// Void: exactly one empty text.
    None,
    BlockOnly,
    InlineOnly,
}

/// A set of node type names.
#[derive(Debug, Clone, Copy)]
pub enum Allowed {
    Only(&'static [&'static str]),
    Except(&'static [&'static str]),
}

impl Allowed {
    pub fn permits(&self, type_name: &str) -> bool {
        match self {
            Allowed::Only(names) => names.contains(&type_name),
            Allowed::Except(names) => !names.contains(&type_name),
        }
    }
}

/// Constrains one neighbour slot of an element (first child, next sibling, ...).
#[derive(Debug, Clone, Copy)]
pub struct SlotRule {
    pub allowed: Allowed,
    /// Synthesized when the slot is empty or holds a disallowed node.
    pub default: fn() -> Node,
    /// When set, a disallowed non-void element is retyped instead.
    pub coerce: Option<fn() -> ElementKind>,
}

impl SlotRule {
    pub fn new(allowed: Allowed, default: fn() -> Node) -> Self {
        Self {
            allowed,
            default,
            coerce: None,
        }
    }

    pub fn coerce(mut self, coerce: fn() -> ElementKind) -> Self {
        self.coerce = Some(coerce);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ParentRepair {
    /// Wrap the run of misplaced siblings in a new element.
    Wrap(fn() -> Node),
    Coerce(fn() -> ElementKind),
    /// Replace the element with its children.
    Unwrap,
}

#[derive(Debug, Clone, Copy)]
pub struct ParentRule {
    pub allowed: Allowed,
    pub repair: ParentRepair,
}

/// Constrains every child of an element.
#[derive(Debug, Clone, Copy)]
pub struct ChildrenRule {
    pub allowed: Allowed,
    /// Wrapper for disallowed runs that cannot simply be unwrapped.
    pub wrap: Option<fn() -> Node>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NodeRules {
    pub first_child: Option<SlotRule>,
    pub last_child: Option<SlotRule>,
    pub previous_sibling: Option<SlotRule>,
    pub next_sibling: Option<SlotRule>,
    pub parent: Option<ParentRule>,
    pub children: Option<ChildrenRule>,
}

#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub kind: &'static str,
    pub role: NodeRole,
    pub is_void: bool,
    pub children: ChildConstraint,
    /// Receives an id during identity assignment.
    pub addressable: bool,
    /// Child synthesized for an empty block container; `None` leaves it empty.
    pub fill: Option<fn() -> Node>,
    pub rules: NodeRules,
}

fn empty_paragraph() -> Node {
    Node::paragraph("")
}

impl NodeSpec {
    /// An addressable block element with block content.
    pub fn block(kind: &'static str) -> Self {
        Self {
            kind,
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::BlockOnly,
            addressable: true,
            fill: Some(empty_paragraph),
            rules: NodeRules::default(),
        }
    }

    /// An addressable block element with inline content.
    pub fn text_block(kind: &'static str) -> Self {
        Self {
            children: ChildConstraint::InlineOnly,
            fill: None,
            ..Self::block(kind)
        }
    }

    pub fn inline(kind: &'static str) -> Self {
        Self {
            role: NodeRole::Inline,
            ..Self::text_block(kind)
        }
    }

    pub fn void(mut self) -> Self {
        self.is_void = true;
        self.children = ChildConstraint::None;
        self.fill = None;
        self
    }

    pub fn not_addressable(mut self) -> Self {
        self.addressable = false;
        self
    }

    pub fn no_fill(mut self) -> Self {
        self.fill = None;
        self
    }

    pub fn rules(mut self, rules: NodeRules) -> Self {
        self.rules = rules;
        self
    }
}

/// A plugin-specific structural check. Returns `None` when `el` is valid, or
/// the operations of exactly one repair.
pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn normalize(
        &self,
        doc: &Document,
        el: &ElementNode,
        path: &[usize],
        registry: &PluginRegistry,
    ) -> Option<Vec<Op>>;
}

pub trait TransactionTransform: Send + Sync {
    fn id(&self) -> &'static str;
    fn transform(&self, editor: &Editor, tx: &Transaction) -> Option<Transaction>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Enter,
    Backspace,
}

/// A key handler. The first handler returning a transaction wins.
pub trait ShortcutHandler: Send + Sync {
    fn id(&self) -> &'static str;
    fn key(&self) -> Key;
    fn handle(&self, editor: &Editor) -> Option<Transaction>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SerializeOutcome {
    /// Not this plugin's node; ask the next one.
    Pass,
    /// Drop the node and its subtree from the output.
    Omit,
    Emit(Vec<MarkupNode>),
}

pub trait DocPlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn serialize(&self, _el: &ElementNode, _children: &[MarkupNode]) -> SerializeOutcome {
        SerializeOutcome::Pass
    }
    /// Wraps an already rendered text leaf, e.g. in mark tags.
    fn serialize_text(&self, _text: &TextNode, markup: MarkupNode) -> MarkupNode {
        markup
    }
    /// Claims a markup element. `children` are the already converted children.
    fn deserialize(&self, _el: &MarkupElement, _children: &[Node]) -> Option<Vec<Node>> {
        None
    }
    fn transaction_transforms(&self) -> Vec<Box<dyn TransactionTransform>> {
        Vec::new()
    }
    fn shortcuts(&self) -> Vec<Box<dyn ShortcutHandler>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn DocPlugin>>,
    node_specs: HashMap<&'static str, NodeSpec>,
    transaction_transforms: Vec<Box<dyn TransactionTransform>>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    shortcuts: Vec<Box<dyn ShortcutHandler>>,
    commands: HashMap<String, CommandSpec>,
}

impl PluginRegistry {
    pub fn new(plugins: impl IntoIterator<Item = Box<dyn DocPlugin>>) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    /// Sections, text blocks, quotes, lists, links and marks.
    pub fn core() -> Self {
        Self::new(plugins::core_plugins()).expect("core registry must be valid")
    }

    /// Everything `core` has plus details, tables, symbols, math and embeds.
    pub fn learning_resource() -> Self {
        Self::new(plugins::learning_resource_plugins())
            .expect("learning resource registry must be valid")
    }

    /// Short explanatory texts: no lists, quotes, tables or details.
    pub fn concept() -> Self {
        Self::new(plugins::concept_plugins()).expect("concept registry must be valid")
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn DocPlugin>) -> Result<(), RegistryError> {
        for spec in plugin.node_specs() {
            if self.node_specs.contains_key(spec.kind) {
                return Err(RegistryError::DuplicateNodeType(spec.kind.to_string()));
            }
            self.node_specs.insert(spec.kind, spec);
        }

        for cmd in plugin.commands() {
            if self.commands.contains_key(&cmd.id) {
                return Err(RegistryError::DuplicateCommand(cmd.id));
            }
            self.commands.insert(cmd.id.clone(), cmd);
        }

        self.transaction_transforms
            .extend(plugin.transaction_transforms());
        self.normalize_passes.extend(plugin.normalize_passes());
        self.shortcuts.extend(plugin.shortcuts());
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn plugins(&self) -> &[Box<dyn DocPlugin>] {
        &self.plugins
    }

    pub fn node_spec(&self, type_name: &str) -> Option<&NodeSpec> {
        self.node_specs.get(type_name)
    }

    pub fn is_known_kind(&self, type_name: &str) -> bool {
        self.node_specs.contains_key(type_name)
    }

    pub fn is_void(&self, type_name: &str) -> bool {
        self.node_spec(type_name).is_some_and(|spec| spec.is_void)
    }

    pub fn is_inline(&self, type_name: &str) -> bool {
        self.node_spec(type_name)
            .is_some_and(|spec| spec.role == NodeRole::Inline)
    }

    pub fn is_addressable(&self, type_name: &str) -> bool {
        self.node_spec(type_name).is_some_and(|spec| spec.addressable)
    }

    /// Text and inline elements.
    pub fn is_inline_node(&self, node: &Node) -> bool {
        match node {
            Node::Text(_) => true,
            Node::Element(el) => self.is_inline(el.type_name()),
        }
    }

    pub fn transaction_transforms(&self) -> &[Box<dyn TransactionTransform>] {
        &self.transaction_transforms
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn shortcuts(&self, key: Key) -> impl Iterator<Item = &dyn ShortcutHandler> {
        self.shortcuts
            .iter()
            .filter(move |handler| handler.key() == key)
            .map(|handler| &**handler)
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }
}

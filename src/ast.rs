//! The parsed form of a template.
//!
//! Nodes are plain data: they are built once by the parser and never change
//! afterwards, so a tree can be shared between threads and rendered any
//! number of times. Consumers walk the tree through [`Visitor`]; every
//! `visit_*` method has a default that keeps walking, so an analysis only
//! overrides the nodes it cares about.

use serde_json::Value;

use crate::function::{Associativity, Operation};

/// An ordered list of child nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockNode {
    pub pos: usize,
    pub nodes: Vec<Node>,
}

impl BlockNode {
    pub const fn new(pos: usize) -> Self {
        Self {
            pos,
            nodes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(TextNode),
    ExpressionList(ExpressionListNode),
    ForArray(ForArrayStatementNode),
    ForObject(ForObjectStatementNode),
    If(IfStatementNode),
    Include(IncludeStatementNode),
}

/// Literal text, stored as a byte span into the owning template's source.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextNode {
    pub pos: usize,
    pub length: usize,
}

impl TextNode {
    /// The text this node covers in `source`.
    pub fn content<'s>(&self, source: &'s str) -> &'s str {
        source
            .get(self.pos..self.pos.saturating_add(self.length))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    Literal(LiteralNode),
    Json(JsonNode),
    Function(FunctionNode),
}

impl ExpressionNode {
    pub const fn pos(&self) -> usize {
        match self {
            Self::Literal(node) => node.pos,
            Self::Json(node) => node.pos,
            Self::Function(node) => node.pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiteralNode {
    pub pos: usize,
    pub value: Value,
}

/// A reference to data, e.g. `user.name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonNode {
    pub pos: usize,
    /// The name as written in the template.
    pub name: String,
    /// JSON pointer form of `name`, e.g. `/user/name`.
    pub ptr: String,
}

impl JsonNode {
    pub fn new<N: Into<String>>(name: N, pos: usize) -> Self {
        let name = name.into();
        let mut ptr = String::with_capacity(name.len().saturating_add(1));
        for part in name.split('.') {
            ptr.push('/');
            ptr.push_str(part);
        }
        Self { pos, name, ptr }
    }
}

/// An operator or a function call. Precedence and associativity are fixed by
/// the operation when the node is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionNode {
    pub pos: usize,
    pub operation: Operation,
    /// The operator symbol or function name as written.
    pub name: String,
    pub number_args: usize,
    precedence: u8,
    associativity: Associativity,
}

impl FunctionNode {
    pub fn new<N: Into<String>>(operation: Operation, name: N, number_args: usize, pos: usize) -> Self {
        Self {
            pos,
            operation,
            name: name.into(),
            number_args,
            precedence: operation.precedence(),
            associativity: operation.associativity(),
        }
    }

    pub const fn precedence(&self) -> u8 {
        self.precedence
    }

    pub const fn associativity(&self) -> Associativity {
        self.associativity
    }
}

/// An expression in postfix order: operands come before the operator that
/// consumes them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpressionListNode {
    pub pos: usize,
    pub rpn_output: Vec<ExpressionNode>,
}

/// `{% for value in condition %}`
#[derive(Debug, Clone, PartialEq)]
pub struct ForArrayStatementNode {
    pub pos: usize,
    pub value: String,
    pub condition: ExpressionListNode,
    pub body: BlockNode,
}

/// `{% for key, value in condition %}`
#[derive(Debug, Clone, PartialEq)]
pub struct ForObjectStatementNode {
    pub pos: usize,
    pub key: String,
    pub value: String,
    pub condition: ExpressionListNode,
    pub body: BlockNode,
}

/// `{% if %}` with optional `{% else %}`. An `{% else if %}` is stored as a
/// nested node (`is_nested`) that is the only child of `false_statement`.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStatementNode {
    pub pos: usize,
    pub condition: ExpressionListNode,
    pub true_statement: BlockNode,
    pub false_statement: BlockNode,
    pub has_false_statement: bool,
    pub is_nested: bool,
}

impl IfStatementNode {
    pub const fn new(condition: ExpressionListNode, is_nested: bool, pos: usize) -> Self {
        Self {
            pos,
            condition,
            true_statement: BlockNode::new(pos),
            false_statement: BlockNode::new(pos),
            has_false_statement: false,
            is_nested,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeStatementNode {
    pub pos: usize,
    pub file: String,
}

pub trait Visitor {
    type Error;

    fn visit_block(&mut self, node: &BlockNode) -> Result<(), Self::Error> {
        walk_block(self, node)
    }

    fn visit_text(&mut self, _node: &TextNode) -> Result<(), Self::Error> {
        Ok(())
    }

    fn visit_expression_list(&mut self, node: &ExpressionListNode) -> Result<(), Self::Error> {
        walk_expression_list(self, node)
    }

    fn visit_literal(&mut self, _node: &LiteralNode) -> Result<(), Self::Error> {
        Ok(())
    }

    fn visit_json(&mut self, _node: &JsonNode) -> Result<(), Self::Error> {
        Ok(())
    }

    fn visit_function(&mut self, _node: &FunctionNode) -> Result<(), Self::Error> {
        Ok(())
    }

    fn visit_for_array(&mut self, node: &ForArrayStatementNode) -> Result<(), Self::Error> {
        self.visit_expression_list(&node.condition)?;
        self.visit_block(&node.body)
    }

    fn visit_for_object(&mut self, node: &ForObjectStatementNode) -> Result<(), Self::Error> {
        self.visit_expression_list(&node.condition)?;
        self.visit_block(&node.body)
    }

    fn visit_if(&mut self, node: &IfStatementNode) -> Result<(), Self::Error> {
        self.visit_expression_list(&node.condition)?;
        self.visit_block(&node.true_statement)?;
        self.visit_block(&node.false_statement)
    }

    fn visit_include(&mut self, _node: &IncludeStatementNode) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub fn walk_block<V: Visitor + ?Sized>(visitor: &mut V, node: &BlockNode) -> Result<(), V::Error> {
    for child in &node.nodes {
        child.accept(visitor)?;
    }
    Ok(())
}

pub fn walk_expression_list<V: Visitor + ?Sized>(
    visitor: &mut V,
    node: &ExpressionListNode,
) -> Result<(), V::Error> {
    for child in &node.rpn_output {
        child.accept(visitor)?;
    }
    Ok(())
}

impl Node {
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> Result<(), V::Error> {
        match self {
            Self::Text(node) => visitor.visit_text(node),
            Self::ExpressionList(node) => visitor.visit_expression_list(node),
            Self::ForArray(node) => visitor.visit_for_array(node),
            Self::ForObject(node) => visitor.visit_for_object(node),
            Self::If(node) => visitor.visit_if(node),
            Self::Include(node) => visitor.visit_include(node),
        }
    }
}

impl ExpressionNode {
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> Result<(), V::Error> {
        match self {
            Self::Literal(node) => visitor.visit_literal(node),
            Self::Json(node) => visitor.visit_json(node),
            Self::Function(node) => visitor.visit_function(node),
        }
    }
}

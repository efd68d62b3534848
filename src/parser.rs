use serde_json::Value;

use crate::{
    ast::{
        BlockNode, ExpressionListNode, ExpressionNode, ForArrayStatementNode,
        ForObjectStatementNode, FunctionNode, IfStatementNode, IncludeStatementNode, JsonNode,
        LiteralNode, Node, TextNode,
    },
    config::LexerConfig,
    error::{ParseError, ParseErrorKind, SourceLocation},
    function::{Associativity, FunctionRegistry},
    lexer::Lexer,
    token::{Token, TokenKind},
};

type ParseResult<T> = Result<T, ParseError>;

/// A statement block whose closing tag has not been seen yet.
enum OpenBlock {
    If(IfStatementNode),
    ForArray(ForArrayStatementNode),
    ForObject(ForObjectStatementNode),
}

impl OpenBlock {
    /// The block new nodes are appended to.
    fn body_mut(&mut self) -> &mut BlockNode {
        match self {
            Self::If(node) => {
                if node.has_false_statement {
                    &mut node.false_statement
                } else {
                    &mut node.true_statement
                }
            }
            Self::ForArray(node) => &mut node.body,
            Self::ForObject(node) => &mut node.body,
        }
    }

    const fn closer(&self) -> &'static str {
        match self {
            Self::If(_) => "endif",
            Self::ForArray(_) | Self::ForObject(_) => "endfor",
        }
    }

    const fn opener(&self) -> &'static str {
        match self {
            Self::If(_) => "if",
            Self::ForArray(_) | Self::ForObject(_) => "for",
        }
    }
}

/// Entries of the operator stack while converting an expression to postfix.
enum Pending<'a> {
    Operator(FunctionNode),
    Paren { pos: usize },
    /// A call whose closing parenthesis has not been reached. `args` counts the
    /// arguments started so far.
    Call { name: &'a str, pos: usize, args: usize },
}

struct Parser<'a> {
    input: &'a str,
    config: &'a LexerConfig,
    registry: &'a FunctionRegistry,
    lexer: Lexer<'a>,
    /// The next token to be processed.
    tok: Token<'a>,
    peek_tok: Option<Token<'a>>,
    open_blocks: Vec<OpenBlock>,
    root: BlockNode,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, config: &'a LexerConfig, registry: &'a FunctionRegistry) -> Self {
        Parser {
            input,
            config,
            registry,
            lexer: Lexer::new(config, input),
            tok: Token::new(TokenKind::Eof, "", 0),
            peek_tok: None,
            open_blocks: Vec::new(),
            root: BlockNode::new(0),
        }
    }

    #[inline]
    fn error_at(&self, pos: usize, kind: ParseErrorKind) -> ParseError {
        ParseError::at(SourceLocation::of(self.input, pos), kind)
    }

    #[inline]
    fn make_error(&self, kind: ParseErrorKind) -> ParseError {
        self.error_at(self.tok.offset, kind)
    }

    /// Error for the current token when `expected` was wanted instead.
    fn unexpected(&self, expected: &str) -> ParseError {
        if self.tok.kind == TokenKind::Eof {
            self.make_error(ParseErrorKind::UnexpectedEOF {
                expected_what: format!(" (expected {})", expected),
            })
        } else {
            self.make_error(ParseErrorKind::unexpected_token(
                expected,
                self.tok.describe(),
            ))
        }
    }

    fn get_next_token(&mut self) {
        self.tok = match self.peek_tok.take() {
            Some(tok) => tok,
            None => self.lexer.scan(),
        };
    }

    fn peek(&mut self) -> Token<'a> {
        if let Some(tok) = self.peek_tok {
            return tok;
        }
        let tok = self.lexer.scan();
        self.peek_tok = Some(tok);
        tok
    }

    fn current_block(&mut self) -> &mut BlockNode {
        match self.open_blocks.last_mut() {
            Some(block) => block.body_mut(),
            None => &mut self.root,
        }
    }

    fn parse(mut self) -> ParseResult<BlockNode> {
        loop {
            self.get_next_token();
            match self.tok.kind {
                TokenKind::Eof => {
                    if let Some(block) = self.open_blocks.last() {
                        return Err(self.make_error(ParseErrorKind::Unmatched {
                            statement: block.opener().to_string(),
                        }));
                    }
                    return Ok(self.root);
                }
                TokenKind::Text => {
                    let node = TextNode {
                        pos: self.tok.offset,
                        length: self.tok.text.len(),
                    };
                    self.current_block().nodes.push(Node::Text(node));
                }
                TokenKind::StatementOpen => {
                    self.get_next_token();
                    self.parse_statement()?;
                    if self.tok.kind != TokenKind::StatementClose {
                        return Err(self.unexpected(&format!("'{}'", self.config.statement_close)));
                    }
                }
                TokenKind::LineStatementOpen => {
                    self.get_next_token();
                    self.parse_statement()?;
                    // A line statement on the last line has no newline to end it.
                    if !matches!(
                        self.tok.kind,
                        TokenKind::LineStatementClose | TokenKind::Eof
                    ) {
                        return Err(self.unexpected("end of line"));
                    }
                }
                TokenKind::ExpressionOpen => {
                    self.get_next_token();
                    let expression = self.parse_expression_list()?;
                    if self.tok.kind != TokenKind::ExpressionClose {
                        return Err(self.unexpected(&format!("'{}'", self.config.expression_close)));
                    }
                    self.current_block()
                        .nodes
                        .push(Node::ExpressionList(expression));
                }
                TokenKind::CommentOpen => {
                    self.get_next_token();
                    if self.tok.kind != TokenKind::CommentClose {
                        return Err(self.unexpected(&format!("'{}'", self.config.comment_close)));
                    }
                }
                _ => return Err(self.unexpected("text or a tag")),
            }
        }
    }

    /// Parses the statement starting at the current token. Leaves the token
    /// after the statement (normally its closing delimiter) as current.
    fn parse_statement(&mut self) -> ParseResult<()> {
        if self.tok.kind != TokenKind::Id {
            return Err(self.unexpected("a statement"));
        }

        let pos = self.tok.offset;
        match self.tok.text {
            "if" => {
                self.get_next_token();
                let condition = self.parse_expression_list()?;
                self.open_blocks
                    .push(OpenBlock::If(IfStatementNode::new(condition, false, pos)));
            }
            "else" => {
                match self.open_blocks.last_mut() {
                    Some(OpenBlock::If(node)) if !node.has_false_statement => {
                        node.has_false_statement = true;
                    }
                    Some(OpenBlock::If(_)) => {
                        return Err(self.make_error(ParseErrorKind::unexpected_token(
                            "'endif'", "else",
                        )));
                    }
                    Some(block) => {
                        let expected = format!("'{}'", block.closer());
                        return Err(
                            self.make_error(ParseErrorKind::unexpected_token(expected, "else"))
                        );
                    }
                    None => {
                        return Err(self.make_error(ParseErrorKind::Unmatched {
                            statement: "else".to_string(),
                        }));
                    }
                }

                self.get_next_token();
                if self.tok.kind == TokenKind::Id && self.tok.text == "if" {
                    let pos = self.tok.offset;
                    self.get_next_token();
                    let condition = self.parse_expression_list()?;
                    self.open_blocks
                        .push(OpenBlock::If(IfStatementNode::new(condition, true, pos)));
                }
            }
            "endif" => {
                let mut node = match self.close_block("endif")? {
                    OpenBlock::If(node) => node,
                    other => return Err(self.mismatched(&other, "endif")),
                };
                // Fold the `else if` chain back into its outermost `if`.
                while node.is_nested {
                    match self.open_blocks.pop() {
                        Some(OpenBlock::If(mut parent)) => {
                            parent.false_statement.nodes.push(Node::If(node));
                            node = parent;
                        }
                        _ => {
                            return Err(self.make_error(ParseErrorKind::Unmatched {
                                statement: "else if".to_string(),
                            }));
                        }
                    }
                }
                self.current_block().nodes.push(Node::If(node));
                self.get_next_token();
            }
            "for" => {
                self.get_next_token();
                if self.tok.kind != TokenKind::Id {
                    return Err(self.unexpected("a loop variable"));
                }
                let first = self.tok.text;
                self.get_next_token();

                let (key, value) = if self.tok.kind == TokenKind::Comma {
                    self.get_next_token();
                    if self.tok.kind != TokenKind::Id {
                        return Err(self.unexpected("a loop variable"));
                    }
                    let value = self.tok.text;
                    self.get_next_token();
                    (Some(first), value)
                } else {
                    (None, first)
                };

                if self.tok.kind != TokenKind::Id || self.tok.text != "in" {
                    return Err(self.unexpected("'in'"));
                }
                self.get_next_token();
                let condition = self.parse_expression_list()?;

                let block = match key {
                    Some(key) => OpenBlock::ForObject(ForObjectStatementNode {
                        pos,
                        key: key.to_string(),
                        value: value.to_string(),
                        condition,
                        body: BlockNode::new(pos),
                    }),
                    None => OpenBlock::ForArray(ForArrayStatementNode {
                        pos,
                        value: value.to_string(),
                        condition,
                        body: BlockNode::new(pos),
                    }),
                };
                self.open_blocks.push(block);
            }
            "endfor" => {
                let node = match self.close_block("endfor")? {
                    OpenBlock::ForArray(node) => Node::ForArray(node),
                    OpenBlock::ForObject(node) => Node::ForObject(node),
                    other => return Err(self.mismatched(&other, "endfor")),
                };
                self.current_block().nodes.push(node);
                self.get_next_token();
            }
            "include" => {
                self.get_next_token();
                if self.tok.kind != TokenKind::String {
                    return Err(self.unexpected("a template name"));
                }
                let file: String = serde_json::from_str(self.tok.text).map_err(|_| {
                    self.make_error(ParseErrorKind::InvalidLiteral {
                        literal: self.tok.text.to_string(),
                    })
                })?;
                self.current_block()
                    .nodes
                    .push(Node::Include(IncludeStatementNode { pos, file }));
                self.get_next_token();
            }
            keyword => {
                return Err(self.make_error(ParseErrorKind::UnknownStatement {
                    keyword: keyword.to_string(),
                }));
            }
        }
        Ok(())
    }

    fn close_block(&mut self, keyword: &str) -> ParseResult<OpenBlock> {
        match self.open_blocks.pop() {
            Some(block) => Ok(block),
            None => Err(self.make_error(ParseErrorKind::Unmatched {
                statement: keyword.to_string(),
            })),
        }
    }

    fn mismatched(&self, block: &OpenBlock, keyword: &str) -> ParseError {
        self.make_error(ParseErrorKind::unexpected_token(
            format!("'{}'", block.closer()),
            keyword,
        ))
    }

    fn operator(&self, symbol: &str, arity: usize) -> ParseResult<FunctionNode> {
        self.function(symbol, arity, self.tok.offset)
    }

    /// Whether `name` is a word operator written before its operand, like `not`.
    fn is_prefix_operator(&self, name: &str) -> bool {
        self.registry
            .find(name, 1)
            .is_some_and(|data| data.operation.is_prefix())
    }

    fn function(&self, name: &str, arity: usize, pos: usize) -> ParseResult<FunctionNode> {
        match self.registry.find(name, arity) {
            Some(data) => Ok(FunctionNode::new(data.operation, name, arity, pos)),
            None => Err(self.error_at(
                pos,
                ParseErrorKind::UnknownFunction {
                    name: name.to_string(),
                    arity,
                },
            )),
        }
    }

    fn parse_literal(&self) -> ParseResult<ExpressionNode> {
        let value: Value = serde_json::from_str(self.tok.text).map_err(|_| {
            self.make_error(ParseErrorKind::InvalidLiteral {
                literal: self.tok.text.to_string(),
            })
        })?;
        Ok(ExpressionNode::Literal(LiteralNode {
            pos: self.tok.offset,
            value,
        }))
    }

    /// Parses a `[...]` or `{...}` literal. The current token is the opening
    /// bracket; on return it is the matching closing one.
    fn parse_json_literal(&mut self) -> ParseResult<ExpressionNode> {
        let start = self.tok.offset;
        let mut level = 0_usize;
        loop {
            match self.tok.kind {
                TokenKind::LeftBracket | TokenKind::LeftBrace => {
                    level = level.saturating_add(1);
                }
                TokenKind::RightBracket | TokenKind::RightBrace => {
                    level = level.saturating_sub(1);
                    if level == 0 {
                        break;
                    }
                }
                TokenKind::ExpressionClose
                | TokenKind::StatementClose
                | TokenKind::LineStatementClose
                | TokenKind::Unknown
                | TokenKind::Eof => return Err(self.unexpected("a closing bracket")),
                _ => {}
            }
            self.get_next_token();
        }

        let literal = self.input.get(start..self.tok.end()).unwrap_or_default();
        let value: Value = serde_json::from_str(literal).map_err(|_| {
            self.error_at(
                start,
                ParseErrorKind::InvalidLiteral {
                    literal: literal.to_string(),
                },
            )
        })?;
        Ok(ExpressionNode::Literal(LiteralNode { pos: start, value }))
    }

    /// Converts the expression starting at the current token into postfix
    /// order. Stops at the first token that cannot continue the expression
    /// and leaves it as current.
    fn parse_expression_list(&mut self) -> ParseResult<ExpressionListNode> {
        let pos = self.tok.offset;
        let mut output: Vec<ExpressionNode> = Vec::new();
        let mut pending: Vec<Pending<'a>> = Vec::new();
        let mut expect_operand = true;

        loop {
            let tok = self.tok;
            match tok.kind {
                TokenKind::Number | TokenKind::String => {
                    self.check_operand_position(expect_operand)?;
                    output.push(self.parse_literal()?);
                    expect_operand = false;
                }
                TokenKind::LeftBracket | TokenKind::LeftBrace => {
                    self.check_operand_position(expect_operand)?;
                    output.push(self.parse_json_literal()?);
                    expect_operand = false;
                }
                TokenKind::Id => match tok.text {
                    "and" | "or" | "in" => {
                        self.check_operator_position(expect_operand)?;
                        let node = self.operator(tok.text, 2)?;
                        push_operator(&mut pending, &mut output, node);
                        expect_operand = true;
                    }
                    "true" | "false" | "null" => {
                        self.check_operand_position(expect_operand)?;
                        output.push(self.parse_literal()?);
                        expect_operand = false;
                    }
                    name if self.is_prefix_operator(name) => {
                        self.check_operand_position(expect_operand)?;
                        pending.push(Pending::Operator(self.operator(name, 1)?));
                    }
                    name => {
                        self.check_operand_position(expect_operand)?;
                        if self.peek().kind == TokenKind::LeftParen {
                            self.get_next_token();
                            if self.peek().kind == TokenKind::RightParen {
                                self.get_next_token();
                                let node = self.function(name, 0, tok.offset)?;
                                output.push(ExpressionNode::Function(node));
                                expect_operand = false;
                            } else {
                                pending.push(Pending::Call {
                                    name,
                                    pos: tok.offset,
                                    args: 1,
                                });
                            }
                        } else {
                            output.push(ExpressionNode::Json(JsonNode::new(name, tok.offset)));
                            expect_operand = false;
                        }
                    }
                },
                TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Times
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::Power
                | TokenKind::Equal
                | TokenKind::NotEqual
                | TokenKind::GreaterThan
                | TokenKind::GreaterEqual
                | TokenKind::LessThan
                | TokenKind::LessEqual => {
                    self.check_operator_position(expect_operand)?;
                    let node = self.operator(tok.text, 2)?;
                    push_operator(&mut pending, &mut output, node);
                    expect_operand = true;
                }
                TokenKind::LeftParen => {
                    self.check_operand_position(expect_operand)?;
                    pending.push(Pending::Paren { pos: tok.offset });
                }
                TokenKind::Comma => {
                    self.check_operator_position(expect_operand)?;
                    flush_operators(&mut pending, &mut output);
                    match pending.last_mut() {
                        Some(Pending::Call { args, .. }) => *args = args.saturating_add(1),
                        _ => return Err(self.unexpected("an operator")),
                    }
                    expect_operand = true;
                }
                TokenKind::RightParen => {
                    self.check_operator_position(expect_operand)?;
                    flush_operators(&mut pending, &mut output);
                    match pending.pop() {
                        Some(Pending::Paren { .. }) => {}
                        Some(Pending::Call { name, pos, args }) => {
                            let node = self.function(name, args, pos)?;
                            output.push(ExpressionNode::Function(node));
                        }
                        _ => return Err(self.unexpected("an operator")),
                    }
                    expect_operand = false;
                }
                _ => break,
            }
            self.get_next_token();
        }

        if expect_operand {
            return Err(if output.is_empty() && pending.is_empty() {
                self.unexpected("an expression")
            } else {
                self.unexpected("an operand")
            });
        }

        while let Some(entry) = pending.pop() {
            match entry {
                Pending::Operator(node) => output.push(ExpressionNode::Function(node)),
                Pending::Paren { pos } | Pending::Call { pos, .. } => {
                    return Err(self.error_at(
                        pos,
                        ParseErrorKind::Unmatched {
                            statement: "'('".to_string(),
                        },
                    ));
                }
            }
        }

        Ok(ExpressionListNode {
            pos,
            rpn_output: output,
        })
    }

    #[inline]
    fn check_operand_position(&self, expect_operand: bool) -> ParseResult<()> {
        if expect_operand {
            Ok(())
        } else {
            Err(self.unexpected("an operator"))
        }
    }

    #[inline]
    fn check_operator_position(&self, expect_operand: bool) -> ParseResult<()> {
        if expect_operand {
            Err(self.unexpected("an operand"))
        } else {
            Ok(())
        }
    }
}

/// Pushes a binary operator, first moving every stacked operator that binds
/// at least as tightly to the output.
fn push_operator(
    pending: &mut Vec<Pending<'_>>,
    output: &mut Vec<ExpressionNode>,
    node: FunctionNode,
) {
    while let Some(Pending::Operator(top)) = pending.last() {
        let pops = top.precedence() > node.precedence()
            || (top.precedence() == node.precedence()
                && node.associativity() == Associativity::Left);
        if !pops {
            break;
        }
        if let Some(Pending::Operator(top)) = pending.pop() {
            output.push(ExpressionNode::Function(top));
        }
    }
    pending.push(Pending::Operator(node));
}

/// Moves operators to the output up to the innermost parenthesis or call.
fn flush_operators(pending: &mut Vec<Pending<'_>>, output: &mut Vec<ExpressionNode>) {
    while let Some(Pending::Operator(_)) = pending.last() {
        if let Some(Pending::Operator(top)) = pending.pop() {
            output.push(ExpressionNode::Function(top));
        }
    }
}

pub(crate) fn parse(
    input: &str,
    config: &LexerConfig,
    registry: &FunctionRegistry,
) -> Result<BlockNode, ParseError> {
    Parser::new(input, config, registry).parse()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::function::Operation;

    fn parse_str(input: &str) -> ParseResult<BlockNode> {
        parse(input, &LexerConfig::default(), &FunctionRegistry::new())
    }

    /// The postfix form of a single expression, one entry per node.
    fn rpn(expression: &str) -> Vec<String> {
        let input = format!("{{{{ {} }}}}", expression);
        let root = parse_str(&input).unwrap();
        let Some(Node::ExpressionList(list)) = root.nodes.first() else {
            panic!("expected an expression, got {:?}", root.nodes);
        };
        list.rpn_output
            .iter()
            .map(|node| match node {
                ExpressionNode::Literal(literal) => literal.value.to_string(),
                ExpressionNode::Json(json) => json.name.clone(),
                ExpressionNode::Function(function) => function.name.clone(),
            })
            .collect()
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_empty_input() {
        assert_eq!(parse_str(""), Ok(BlockNode::new(0)));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_text_node_span() {
        let root = parse_str("Hello {{ name }}!").unwrap();
        assert_eq!(
            root.nodes[0],
            Node::Text(TextNode { pos: 0, length: 6 })
        );
        assert_eq!(
            root.nodes[2],
            Node::Text(TextNode { pos: 16, length: 1 })
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_variable_pointer() {
        let root = parse_str("{{ user.name }}").unwrap();
        let Node::ExpressionList(list) = &root.nodes[0] else {
            panic!("expected an expression");
        };
        assert_eq!(
            list.rpn_output,
            vec![ExpressionNode::Json(JsonNode {
                pos: 3,
                name: "user.name".to_string(),
                ptr: "/user/name".to_string(),
            })]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_precedence() {
        assert_eq!(rpn("1 + 2 * 3"), ["1", "2", "3", "*", "+"]);
        assert_eq!(rpn("(1 + 2) * 3"), ["1", "2", "+", "3", "*"]);
        assert_eq!(rpn("1 - 2 + 3"), ["1", "2", "-", "3", "+"]);
        assert_eq!(rpn("a == 1 or b"), ["a", "1", "==", "b", "or"]);
        assert_eq!(rpn("a or b and c"), ["a", "b", "or", "c", "and"]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_power_is_right_associative() {
        assert_eq!(rpn("2 ^ 3 ^ 2"), ["2", "3", "2", "^", "^"]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_not_is_prefix() {
        assert_eq!(rpn("not a and b"), ["a", "not", "b", "and"]);
        assert_eq!(rpn("not not a"), ["a", "not", "not"]);
        assert_eq!(rpn("a and not b"), ["a", "b", "not", "and"]);
        assert_eq!(rpn("not (a or b)"), ["a", "b", "or", "not"]);
        assert_eq!(rpn("not(a)"), ["a", "not"]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_not_needs_an_operand_position() {
        let err = parse_str("{{ a not b }}").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::unexpected_token("an operator", "not"));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_negative_number_after_operator() {
        assert_eq!(rpn("1 - -2"), ["1", "-2", "-"]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_function_calls() {
        assert_eq!(rpn("upper(name)"), ["name", "upper"]);
        assert_eq!(rpn("round(1.5, 0)"), ["1.5", "0", "round"]);
        assert_eq!(rpn("max(range(3 + 1))"), ["3", "1", "+", "range", "max"]);
        assert_eq!(
            rpn("length(items) > 2 and even(x)"),
            ["items", "length", "2", ">", "x", "even", "and"]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_comma_flushes_only_to_enclosing_call() {
        assert_eq!(
            rpn("at(items, 1 + 1) * 2"),
            ["items", "1", "1", "+", "at", "2", "*"]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_zero_argument_callback() {
        let mut registry = FunctionRegistry::new();
        registry
            .add_callback("now", 0, |_| Ok(Value::from(0)))
            .unwrap();
        let root = parse("{{ now() }}", &LexerConfig::default(), &registry).unwrap();
        let Node::ExpressionList(list) = &root.nodes[0] else {
            panic!("expected an expression");
        };
        assert_eq!(
            list.rpn_output,
            vec![ExpressionNode::Function(FunctionNode::new(
                Operation::Callback,
                "now",
                0,
                3
            ))]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_literals() {
        assert_eq!(rpn("\"a\\\"b\""), ["\"a\\\"b\""]);
        assert_eq!(rpn("true"), ["true"]);
        assert_eq!(rpn("null"), ["null"]);
        assert_eq!(rpn("1.5e3"), ["1500.0"]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_json_literals() {
        let root = parse_str(r#"{{ [1, "two", {"three": 3}] }}"#).unwrap();
        let Node::ExpressionList(list) = &root.nodes[0] else {
            panic!("expected an expression");
        };
        assert_eq!(
            list.rpn_output,
            vec![ExpressionNode::Literal(LiteralNode {
                pos: 3,
                value: json!([1, "two", {"three": 3}]),
            })]
        );
        assert_eq!(rpn("2 in [1, 2]"), ["2", "[1,2]", "in"]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_if_else_if_else_chain() {
        let root = parse_str("{% if a %}A{% else if b %}B{% else %}C{% endif %}").unwrap();
        assert_eq!(root.nodes.len(), 1);
        let Node::If(outer) = &root.nodes[0] else {
            panic!("expected an if");
        };
        assert!(!outer.is_nested);
        assert!(outer.has_false_statement);
        assert_eq!(outer.true_statement.nodes.len(), 1);
        assert_eq!(outer.false_statement.nodes.len(), 1);

        let Node::If(inner) = &outer.false_statement.nodes[0] else {
            panic!("expected a nested if");
        };
        assert!(inner.is_nested);
        assert!(inner.has_false_statement);
        assert_eq!(
            inner.false_statement.nodes,
            vec![Node::Text(TextNode { pos: 37, length: 1 })]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_else_branch_collects_following_nodes() {
        let root = parse_str("{% if a %}A{% else %}B{{ b }}C{% endif %}D").unwrap();
        assert_eq!(root.nodes.len(), 2);
        let Node::If(node) = &root.nodes[0] else {
            panic!("expected an if");
        };
        assert_eq!(
            node.true_statement.nodes,
            vec![Node::Text(TextNode { pos: 10, length: 1 })]
        );
        assert_eq!(node.false_statement.nodes.len(), 3);
        assert_eq!(root.nodes[1], Node::Text(TextNode { pos: 41, length: 1 }));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_for_loops() {
        let root = parse_str("{% for x in xs %}{{ x }}{% endfor %}").unwrap();
        let Node::ForArray(node) = &root.nodes[0] else {
            panic!("expected an array loop");
        };
        assert_eq!(node.value, "x");
        assert_eq!(node.body.nodes.len(), 1);

        let root = parse_str("{% for k, v in map %}{{ k }}{% endfor %}").unwrap();
        let Node::ForObject(node) = &root.nodes[0] else {
            panic!("expected an object loop");
        };
        assert_eq!(node.key, "k");
        assert_eq!(node.value, "v");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_include_and_comment() {
        let root = parse_str("{# hi #}{% include \"header.txt\" %}").unwrap();
        assert_eq!(
            root.nodes,
            vec![Node::Include(IncludeStatementNode {
                pos: 11,
                file: "header.txt".to_string(),
            })]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_line_statements() {
        let root = parse_str("## for x in xs\n{{ x }}\n## endfor").unwrap();
        let Node::ForArray(node) = &root.nodes[0] else {
            panic!("expected an array loop");
        };
        assert_eq!(node.body.nodes.len(), 2);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unknown_function() {
        let err = parse_str("line\n{{ shout(name) }}").unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::UnknownFunction {
                name: "shout".to_string(),
                arity: 1
            }
        );
        assert_eq!((err.line, err.column), (2, 4));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_wrong_arity() {
        let err = parse_str("{{ upper(a, b) }}").unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::UnknownFunction {
                name: "upper".to_string(),
                arity: 2
            }
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unmatched_blocks() {
        let err = parse_str("{% if a %}x").unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::Unmatched {
                statement: "if".to_string()
            }
        );

        let err = parse_str("{% for x in y %}").unwrap_err();
        assert_eq!(err.to_string(), "Parse error at line 1, column 17: unmatched for");

        let err = parse_str("{% endif %}").unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::Unmatched {
                statement: "endif".to_string()
            }
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_crossed_blocks() {
        let err = parse_str("{% for x in y %}{% if x %}{% endfor %}{% endif %}").unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::unexpected_token("'endif'", "endfor")
        );

        let err = parse_str("{% for x in y %}{% else %}{% endfor %}").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::unexpected_token("'endfor'", "else"));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_else_after_else() {
        let err = parse_str("{% if a %}{% else %}{% else %}{% endif %}").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::unexpected_token("'endif'", "else"));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_missing_in() {
        let err = parse_str("{% for x ins items %}{% endfor %}").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::unexpected_token("'in'", "ins"));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unknown_statement() {
        let err = parse_str("{% while x %}").unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::UnknownStatement {
                keyword: "while".to_string()
            }
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_malformed_expressions() {
        let err = parse_str("{{ }}").unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::unexpected_token("an expression", "}}")
        );

        let err = parse_str("{{ a b }}").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::unexpected_token("an operator", "b"));

        let err = parse_str("{{ 1 + }}").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::unexpected_token("an operand", "}}"));

        let err = parse_str("{{ (1 + 2 }}").unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::Unmatched {
                statement: "'('".to_string()
            }
        );

        let err = parse_str("{{ a, b }}").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::unexpected_token("an operator", ","));

        let err = parse_str("{{ a § b }}").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::unexpected_token("'}}'", "§"));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_invalid_number_literal() {
        let err = parse_str("{{ 1.2.3 }}").unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::InvalidLiteral {
                literal: "1.2.3".to_string()
            }
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_unclosed_expression() {
        let err = parse_str("{{ name").unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::UnexpectedEOF {
                expected_what: " (expected '}}')".to_string()
            }
        );
    }
}

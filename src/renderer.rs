use std::{borrow::Cow, cmp::Ordering};

use serde_json::{Map, Value};

use crate::{
    ast::{
        ExpressionListNode, ExpressionNode, ForArrayStatementNode, ForObjectStatementNode,
        FunctionNode, IfStatementNode, IncludeStatementNode, JsonNode, TextNode, Visitor,
    },
    config::RenderConfig,
    error::{RenderError, RenderErrorKind, SourceLocation},
    function::{FunctionRegistry, Operation},
    interface::IncludeResolver,
    template::Template,
};

type RenderResult<T> = Result<T, RenderError>;

/// Names bound by one loop iteration.
struct Scope {
    bindings: Vec<(String, Value)>,
}

impl Scope {
    fn get(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }
}

/// An operand on the evaluation stack. A variable that could not be resolved
/// stays `Missing` until something consumes it; only `default` and `exists`
/// accept it.
enum Slot<'a> {
    Value(Cow<'a, Value>),
    /// A variable that resolved.
    Variable(&'a Value),
    Missing { name: &'a str, pos: usize },
}

#[derive(Debug, Copy, Clone)]
enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    fn of(value: &Value) -> Option<Self> {
        let Value::Number(number) = value else {
            return None;
        };
        match number.as_i64() {
            Some(int) => Some(Self::Int(int)),
            None => number.as_f64().map(Self::Float),
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        reason = "Mixed integer and float arithmetic happens in f64."
    )]
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(int) => int as f64,
            Self::Float(float) => float,
        }
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `false`, `null`, zero and empty strings, arrays and objects are false.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|float| float != 0.0),
        Value::String(string) => !string.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
    }
}

/// JSON equality, except that numbers compare by value so `1 == 1.0`.
fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (Numeric::of(lhs), Numeric::of(rhs)) {
        (Some(Numeric::Int(a)), Some(Numeric::Int(b))) => a == b,
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        _ => lhs == rhs,
    }
}

const fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order used by `sort`, `min` and `max`. Values of different types
/// order by type; arrays and objects are not compared further.
fn order(lhs: &Value, rhs: &Value) -> Ordering {
    match (lhs, rhs) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(_), Value::Number(_)) => match (Numeric::of(lhs), Numeric::of(rhs)) {
            (Some(Numeric::Int(a)), Some(Numeric::Int(b))) => a.cmp(&b),
            (Some(a), Some(b)) => a.as_f64().total_cmp(&b.as_f64()),
            _ => Ordering::Equal,
        },
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => type_rank(lhs).cmp(&type_rank(rhs)),
    }
}

/// Strings are written raw, everything else as compact JSON.
fn write_value(output: &mut String, value: &Value) {
    match value {
        Value::String(string) => output.push_str(string),
        other => output.push_str(&other.to_string()),
    }
}

fn loop_object(index: usize, len: usize, parent: Option<&Value>) -> Value {
    let mut object = Map::new();
    object.insert("index".to_string(), Value::from(index));
    object.insert("index1".to_string(), Value::from(index.saturating_add(1)));
    object.insert("is_first".to_string(), Value::Bool(index == 0));
    object.insert(
        "is_last".to_string(),
        Value::Bool(index.saturating_add(1) == len),
    );
    if let Some(parent) = parent {
        object.insert("parent".to_string(), parent.clone());
    }
    Value::Object(object)
}

/// Everything expression evaluation reads. Kept apart from the output so
/// an evaluated value can borrow from it while the output is written.
struct Env<'r> {
    source: &'r str,
    data: &'r Value,
    registry: &'r FunctionRegistry,
    resolver: &'r dyn IncludeResolver,
    config: &'r RenderConfig,
    /// Innermost loop last.
    scopes: Vec<Scope>,
    depth: usize,
}

impl Env<'_> {
    fn error(&self, pos: usize, kind: RenderErrorKind) -> RenderError {
        RenderError::at(SourceLocation::of(self.source, pos), kind)
    }

    fn missing(&self, name: &str, pos: usize) -> RenderError {
        self.error(
            pos,
            RenderErrorKind::MissingVariable {
                variable_name: name.to_string(),
            },
        )
    }

    fn mismatch<M: Into<String>>(&self, function: &FunctionNode, message: M) -> RenderError {
        self.error(
            function.pos,
            RenderErrorKind::TypeMismatch {
                operation: function.name.clone(),
                message: message.into(),
            },
        )
    }

    /// Resolves a variable. The first segment of the name is looked up in
    /// the loop scopes, innermost first, and the rest of the path inside the
    /// bound value. Names no loop binds resolve against the data.
    fn lookup(&self, node: &JsonNode) -> Option<&Value> {
        let first = node
            .name
            .split_once('.')
            .map_or(node.name.as_str(), |(first, _)| first);
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(first) {
                let rest = node.ptr.get(first.len().saturating_add(1)..).unwrap_or_default();
                return if rest.is_empty() {
                    Some(value)
                } else {
                    value.pointer(rest)
                };
            }
        }
        self.data.pointer(&node.ptr)
    }

    fn current_loop(&self) -> Option<Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get("loop"))
            .cloned()
    }

    /// JSON has no infinities or NaN, so such results are errors.
    fn float(&self, function: &FunctionNode, float: f64) -> RenderResult<Value> {
        serde_json::Number::from_f64(float)
            .map(Value::Number)
            .ok_or_else(|| {
                self.error(
                    function.pos,
                    RenderErrorKind::NumberOutOfRange {
                        operation: function.name.clone(),
                    },
                )
            })
    }

    fn eval_value<'s>(&'s self, list: &'s ExpressionListNode) -> RenderResult<Cow<'s, Value>> {
        match self.eval(list)? {
            Slot::Value(value) => Ok(value),
            Slot::Variable(value) => Ok(Cow::Borrowed(value)),
            Slot::Missing { name, pos } => Err(self.missing(name, pos)),
        }
    }

    fn eval<'s>(&'s self, list: &'s ExpressionListNode) -> RenderResult<Slot<'s>> {
        let mut stack: Vec<Slot<'s>> = Vec::with_capacity(list.rpn_output.len());
        for node in &list.rpn_output {
            match node {
                ExpressionNode::Literal(literal) => {
                    stack.push(Slot::Value(Cow::Borrowed(&literal.value)));
                }
                ExpressionNode::Json(json) => stack.push(match self.lookup(json) {
                    Some(value) => Slot::Variable(value),
                    None => Slot::Missing {
                        name: &json.name,
                        pos: json.pos,
                    },
                }),
                ExpressionNode::Function(function) => {
                    let split = stack
                        .len()
                        .checked_sub(function.number_args)
                        .ok_or_else(|| {
                            self.error(function.pos, RenderErrorKind::MalformedExpression)
                        })?;
                    let args = stack.split_off(split);
                    stack.push(self.call(function, args)?);
                }
            }
        }

        match stack.pop() {
            Some(slot) if stack.is_empty() => Ok(slot),
            _ => Err(self.error(list.pos, RenderErrorKind::MalformedExpression)),
        }
    }

    fn call<'s>(&'s self, function: &FunctionNode, args: Vec<Slot<'s>>) -> RenderResult<Slot<'s>> {
        match function.operation {
            Operation::Default => {
                let mut args = args.into_iter();
                return match (args.next(), args.next()) {
                    (Some(Slot::Missing { .. }), Some(fallback)) => Ok(fallback),
                    (Some(value), Some(_)) => Ok(value),
                    _ => Err(self.error(function.pos, RenderErrorKind::MalformedExpression)),
                };
            }
            Operation::Exists => {
                let exists = match args.first() {
                    Some(Slot::Missing { .. }) => false,
                    Some(Slot::Variable(_)) => true,
                    Some(Slot::Value(value)) => match &**value {
                        Value::String(name) => {
                            self.lookup(&JsonNode::new(name.as_str(), function.pos)).is_some()
                        }
                        other => {
                            return Err(self.mismatch(
                                function,
                                format!("expected a variable name, got {}", type_name(other)),
                            ));
                        }
                    },
                    None => {
                        return Err(self.error(function.pos, RenderErrorKind::MalformedExpression));
                    }
                };
                return Ok(Slot::Value(Cow::Owned(Value::Bool(exists))));
            }
            _ => {}
        }

        let mut values = Vec::with_capacity(args.len());
        for slot in args {
            match slot {
                Slot::Value(value) => values.push(value),
                Slot::Variable(value) => values.push(Cow::Borrowed(value)),
                Slot::Missing { name, pos } => return Err(self.missing(name, pos)),
            }
        }

        let result = if function.operation == Operation::Callback {
            self.call_callback(function, values)?
        } else {
            self.apply(function, &values)?
        };
        Ok(Slot::Value(Cow::Owned(result)))
    }

    fn call_callback(&self, function: &FunctionNode, values: Vec<Cow<'_, Value>>) -> RenderResult<Value> {
        let callback = self
            .registry
            .find(&function.name, function.number_args)
            .and_then(|data| data.callback.as_ref())
            .ok_or_else(|| {
                self.error(
                    function.pos,
                    RenderErrorKind::MissingFunction {
                        name: function.name.clone(),
                        arity: function.number_args,
                    },
                )
            })?;

        let values: Vec<Value> = values.into_iter().map(Cow::into_owned).collect();
        callback(&values).map_err(|message| {
            self.error(
                function.pos,
                RenderErrorKind::Callback {
                    name: function.name.clone(),
                    message,
                },
            )
        })
    }

    fn apply(&self, function: &FunctionNode, args: &[Cow<'_, Value>]) -> RenderResult<Value> {
        match (function.operation, args) {
            (Operation::Not, [value]) => Ok(Value::Bool(!truthy(value))),
            (Operation::And, [lhs, rhs]) => Ok(Value::Bool(truthy(lhs) && truthy(rhs))),
            (Operation::Or, [lhs, rhs]) => Ok(Value::Bool(truthy(lhs) || truthy(rhs))),
            (Operation::In, [needle, haystack]) => match &**haystack {
                Value::Array(items) => Ok(Value::Bool(
                    items.iter().any(|item| values_equal(item, needle)),
                )),
                Value::Object(entries) => match &**needle {
                    Value::String(key) => Ok(Value::Bool(entries.contains_key(key))),
                    other => Err(self.mismatch(
                        function,
                        format!("object keys are strings, got {}", type_name(other)),
                    )),
                },
                other => Err(self.mismatch(
                    function,
                    format!("expected an array or object, got {}", type_name(other)),
                )),
            },
            (Operation::Equal, [lhs, rhs]) => Ok(Value::Bool(values_equal(lhs, rhs))),
            (Operation::NotEqual, [lhs, rhs]) => Ok(Value::Bool(!values_equal(lhs, rhs))),
            (Operation::Greater, [lhs, rhs]) => {
                Ok(Value::Bool(self.compare(function, lhs, rhs)?.is_gt()))
            }
            (Operation::GreaterEqual, [lhs, rhs]) => {
                Ok(Value::Bool(self.compare(function, lhs, rhs)?.is_ge()))
            }
            (Operation::Less, [lhs, rhs]) => {
                Ok(Value::Bool(self.compare(function, lhs, rhs)?.is_lt()))
            }
            (Operation::LessEqual, [lhs, rhs]) => {
                Ok(Value::Bool(self.compare(function, lhs, rhs)?.is_le()))
            }
            (
                Operation::Add
                | Operation::Subtract
                | Operation::Multiplication
                | Operation::Division
                | Operation::Modulo
                | Operation::Power,
                [lhs, rhs],
            ) => self.arithmetic(function, lhs, rhs),
            (Operation::At, [container, key]) => match (&**container, &**key) {
                (Value::Array(items), Value::Number(index)) => index
                    .as_u64()
                    .and_then(|index| usize::try_from(index).ok())
                    .and_then(|index| items.get(index))
                    .cloned()
                    .ok_or_else(|| self.mismatch(function, format!("index {} out of range", index))),
                (Value::Object(entries), Value::String(key)) => {
                    entries.get(key).cloned().ok_or_else(|| {
                        self.mismatch(function, format!("key '{}' not found", key))
                    })
                }
                (container, key) => Err(self.mismatch(
                    function,
                    format!(
                        "cannot index {} with {}",
                        type_name(container),
                        type_name(key)
                    ),
                )),
            },
            (Operation::DivisibleBy, [dividend, divisor]) => {
                let (dividend, divisor) = (self.integer(function, dividend)?, self.integer(function, divisor)?);
                Ok(Value::Bool(
                    divisor != 0 && dividend.checked_rem(divisor).is_none_or(|rem| rem == 0),
                ))
            }
            (Operation::Even, [value]) => Ok(Value::Bool(self.integer(function, value)? & 1 == 0)),
            (Operation::Odd, [value]) => Ok(Value::Bool(self.integer(function, value)? & 1 == 1)),
            (Operation::ExistsIn, [object, key]) => match (&**object, &**key) {
                (Value::Object(entries), Value::String(key)) => {
                    Ok(Value::Bool(entries.contains_key(key)))
                }
                (object, key) => Err(self.mismatch(
                    function,
                    format!(
                        "expected an object and a string, got {} and {}",
                        type_name(object),
                        type_name(key)
                    ),
                )),
            },
            (Operation::First, [value]) => {
                Ok(self.array(function, value)?.first().cloned().unwrap_or_default())
            }
            (Operation::Last, [value]) => {
                Ok(self.array(function, value)?.last().cloned().unwrap_or_default())
            }
            (Operation::Float, [value]) => match &**value {
                Value::Number(_) => match Numeric::of(value) {
                    Some(number) => self.float(function, number.as_f64()),
                    None => Ok(Value::Null),
                },
                Value::String(string) => {
                    let parsed = string.trim().parse::<f64>().map_err(|_| {
                        self.mismatch(function, format!("'{}' is not a number", string))
                    })?;
                    self.float(function, parsed)
                }
                other => Err(self.mismatch(
                    function,
                    format!("expected a number or string, got {}", type_name(other)),
                )),
            },
            (Operation::Int, [value]) => match &**value {
                Value::Number(_) => match Numeric::of(value) {
                    Some(Numeric::Int(int)) => Ok(Value::from(int)),
                    Some(Numeric::Float(float)) => Ok(truncate(float)),
                    None => Ok(Value::Null),
                },
                Value::String(string) => {
                    let string = string.trim();
                    string
                        .parse::<i64>()
                        .map(Value::from)
                        .or_else(|_| string.parse::<f64>().map(truncate))
                        .map_err(|_| self.mismatch(function, format!("'{}' is not a number", string)))
                }
                other => Err(self.mismatch(
                    function,
                    format!("expected a number or string, got {}", type_name(other)),
                )),
            },
            (Operation::IsArray, [value]) => Ok(Value::Bool(value.is_array())),
            (Operation::IsBoolean, [value]) => Ok(Value::Bool(value.is_boolean())),
            (Operation::IsFloat, [value]) => Ok(Value::Bool(value.is_f64())),
            (Operation::IsInteger, [value]) => Ok(Value::Bool(value.is_i64() || value.is_u64())),
            (Operation::IsNumber, [value]) => Ok(Value::Bool(value.is_number())),
            (Operation::IsObject, [value]) => Ok(Value::Bool(value.is_object())),
            (Operation::IsString, [value]) => Ok(Value::Bool(value.is_string())),
            (Operation::Join, [items, separator]) => {
                let items = self.array(function, items)?;
                let separator = self.string(function, separator)?;
                let mut joined = String::new();
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        joined.push_str(separator);
                    }
                    write_value(&mut joined, item);
                }
                Ok(Value::String(joined))
            }
            (Operation::Length, [value]) => match &**value {
                Value::String(string) => Ok(Value::from(string.chars().count())),
                Value::Array(items) => Ok(Value::from(items.len())),
                Value::Object(entries) => Ok(Value::from(entries.len())),
                other => Err(self.mismatch(
                    function,
                    format!("{} has no length", type_name(other)),
                )),
            },
            (Operation::Lower, [value]) => {
                Ok(Value::String(self.string(function, value)?.to_lowercase()))
            }
            (Operation::Upper, [value]) => {
                Ok(Value::String(self.string(function, value)?.to_uppercase()))
            }
            (Operation::Max, [value]) => Ok(self
                .array(function, value)?
                .iter()
                .max_by(|a, b| order(a, b))
                .cloned()
                .unwrap_or_default()),
            (Operation::Min, [value]) => Ok(self
                .array(function, value)?
                .iter()
                .min_by(|a, b| order(a, b))
                .cloned()
                .unwrap_or_default()),
            (Operation::Range, [value]) => {
                let end = self.integer(function, value)?;
                Ok(Value::Array((0..end.max(0)).map(Value::from).collect()))
            }
            (Operation::Round, [value, precision]) => {
                let number = Numeric::of(value).ok_or_else(|| {
                    self.mismatch(function, format!("expected a number, got {}", type_name(value)))
                })?;
                let precision = self.integer(function, precision)?;
                let digits = i32::try_from(precision)
                    .map_err(|_| self.mismatch(function, "precision out of range"))?;
                let factor = 10_f64.powi(digits);
                let rounded = (number.as_f64() * factor).round() / factor;
                if precision == 0 {
                    Ok(truncate(rounded))
                } else {
                    self.float(function, rounded)
                }
            }
            (Operation::Sort, [value]) => {
                let mut items = self.array(function, value)?.clone();
                items.sort_by(order);
                Ok(Value::Array(items))
            }
            _ => Err(self.error(function.pos, RenderErrorKind::MalformedExpression)),
        }
    }

    fn compare(&self, function: &FunctionNode, lhs: &Value, rhs: &Value) -> RenderResult<Ordering> {
        match (lhs, rhs) {
            (Value::Number(_), Value::Number(_)) => Ok(order(lhs, rhs)),
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            _ => Err(self.mismatch(
                function,
                format!(
                    "cannot compare {} with {}",
                    type_name(lhs),
                    type_name(rhs)
                ),
            )),
        }
    }

    fn arithmetic(&self, function: &FunctionNode, lhs: &Value, rhs: &Value) -> RenderResult<Value> {
        let (Some(a), Some(b)) = (Numeric::of(lhs), Numeric::of(rhs)) else {
            if let (Operation::Add, Value::String(a), Value::String(b)) = (function.operation, lhs, rhs) {
                let mut joined = String::with_capacity(a.len().saturating_add(b.len()));
                joined.push_str(a);
                joined.push_str(b);
                return Ok(Value::String(joined));
            }
            return Err(self.mismatch(
                function,
                format!(
                    "expected numbers, got {} and {}",
                    type_name(lhs),
                    type_name(rhs)
                ),
            ));
        };

        match function.operation {
            Operation::Add => self.int_or_float(function, a, b, i64::checked_add, |x, y| x + y),
            Operation::Subtract => self.int_or_float(function, a, b, i64::checked_sub, |x, y| x - y),
            Operation::Multiplication => {
                self.int_or_float(function, a, b, i64::checked_mul, |x, y| x * y)
            }
            Operation::Division => {
                let divisor = b.as_f64();
                if divisor == 0.0 {
                    return Err(self.error(function.pos, RenderErrorKind::DivisionByZero));
                }
                self.float(function, a.as_f64() / divisor)
            }
            Operation::Modulo => match (a, b) {
                (Numeric::Int(_), Numeric::Int(0)) => {
                    Err(self.error(function.pos, RenderErrorKind::DivisionByZero))
                }
                // Only i64::MIN % -1 overflows, and its remainder is zero.
                (Numeric::Int(x), Numeric::Int(y)) => {
                    Ok(Value::from(x.checked_rem(y).unwrap_or_default()))
                }
                _ => Err(self.mismatch(function, "expected integers")),
            },
            Operation::Power => {
                if let (Numeric::Int(base), Numeric::Int(exponent)) = (a, b) {
                    let power = u32::try_from(exponent)
                        .ok()
                        .and_then(|exponent| base.checked_pow(exponent));
                    if let Some(power) = power {
                        return Ok(Value::from(power));
                    }
                }
                self.float(function, a.as_f64().powf(b.as_f64()))
            }
            _ => Err(self.error(function.pos, RenderErrorKind::MalformedExpression)),
        }
    }

    /// Stays an integer unless `int_op` overflows.
    fn int_or_float(
        &self,
        function: &FunctionNode,
        a: Numeric,
        b: Numeric,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> RenderResult<Value> {
        if let (Numeric::Int(x), Numeric::Int(y)) = (a, b) {
            if let Some(result) = int_op(x, y) {
                return Ok(Value::from(result));
            }
        }
        self.float(function, float_op(a.as_f64(), b.as_f64()))
    }

    fn integer(&self, function: &FunctionNode, value: &Value) -> RenderResult<i64> {
        match Numeric::of(value) {
            Some(Numeric::Int(int)) => Ok(int),
            _ => Err(self.mismatch(
                function,
                format!("expected an integer, got {}", type_name(value)),
            )),
        }
    }

    fn string<'v>(&self, function: &FunctionNode, value: &'v Value) -> RenderResult<&'v str> {
        value.as_str().ok_or_else(|| {
            self.mismatch(function, format!("expected a string, got {}", type_name(value)))
        })
    }

    fn array<'v>(&self, function: &FunctionNode, value: &'v Value) -> RenderResult<&'v Vec<Value>> {
        value.as_array().ok_or_else(|| {
            self.mismatch(function, format!("expected an array, got {}", type_name(value)))
        })
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "Saturating float to integer conversion is the intent."
)]
fn truncate(float: f64) -> Value {
    Value::from(float.trunc() as i64)
}

/// Walks a template and writes its output.
pub(crate) struct Renderer<'r> {
    output: &'r mut String,
    env: Env<'r>,
}

impl<'r> Renderer<'r> {
    pub(crate) fn new(
        output: &'r mut String,
        template: &'r Template,
        data: &'r Value,
        registry: &'r FunctionRegistry,
        resolver: &'r dyn IncludeResolver,
        config: &'r RenderConfig,
    ) -> Self {
        Self {
            output,
            env: Env {
                source: template.content(),
                data,
                registry,
                resolver,
                config,
                scopes: Vec::new(),
                depth: 0,
            },
        }
    }

    fn push_scope(&mut self, bindings: Vec<(String, Value)>) {
        self.env.scopes.push(Scope { bindings });
    }
}

impl Visitor for Renderer<'_> {
    type Error = RenderError;

    fn visit_text(&mut self, node: &TextNode) -> RenderResult<()> {
        self.output.push_str(node.content(self.env.source));
        Ok(())
    }

    fn visit_expression_list(&mut self, node: &ExpressionListNode) -> RenderResult<()> {
        let value = self.env.eval_value(node)?;
        write_value(self.output, &value);
        Ok(())
    }

    fn visit_for_array(&mut self, node: &ForArrayStatementNode) -> RenderResult<()> {
        let items = match self.env.eval_value(&node.condition)?.into_owned() {
            Value::Array(items) => items,
            other => {
                return Err(self.env.error(
                    node.condition.pos,
                    RenderErrorKind::NotAnArray {
                        found: type_name(&other).to_string(),
                    },
                ));
            }
        };

        let parent = self.env.current_loop();
        let len = items.len();
        for (index, item) in items.into_iter().enumerate() {
            self.push_scope(vec![
                (node.value.clone(), item),
                (
                    "loop".to_string(),
                    loop_object(index, len, parent.as_ref()),
                ),
            ]);
            let result = self.visit_block(&node.body);
            self.env.scopes.pop();
            result?;
        }
        Ok(())
    }

    fn visit_for_object(&mut self, node: &ForObjectStatementNode) -> RenderResult<()> {
        let entries = match self.env.eval_value(&node.condition)?.into_owned() {
            Value::Object(entries) => entries,
            other => {
                return Err(self.env.error(
                    node.condition.pos,
                    RenderErrorKind::NotAnObject {
                        found: type_name(&other).to_string(),
                    },
                ));
            }
        };

        let parent = self.env.current_loop();
        let len = entries.len();
        for (index, (key, value)) in entries.into_iter().enumerate() {
            self.push_scope(vec![
                (node.key.clone(), Value::String(key)),
                (node.value.clone(), value),
                (
                    "loop".to_string(),
                    loop_object(index, len, parent.as_ref()),
                ),
            ]);
            let result = self.visit_block(&node.body);
            self.env.scopes.pop();
            result?;
        }
        Ok(())
    }

    fn visit_if(&mut self, node: &IfStatementNode) -> RenderResult<()> {
        let condition = self.env.eval_value(&node.condition)?;
        if truthy(&condition) {
            self.visit_block(&node.true_statement)
        } else if node.has_false_statement {
            self.visit_block(&node.false_statement)
        } else {
            Ok(())
        }
    }

    fn visit_include(&mut self, node: &IncludeStatementNode) -> RenderResult<()> {
        let limit = self.env.config.max_include_depth;
        if self.env.depth >= limit {
            return Err(self.env.error(
                node.pos,
                RenderErrorKind::IncludeDepthExceeded {
                    template_name: node.file.clone(),
                    limit,
                },
            ));
        }

        tracing::trace!(name = %node.file, depth = self.env.depth, "including template");
        let template = self
            .env
            .resolver
            .resolve(&node.file)
            .map_err(|kind| self.env.error(node.pos, kind))?;

        // The included template sees the loop variables of the include site.
        let mut child = Renderer {
            output: &mut *self.output,
            env: Env {
                source: template.content(),
                data: self.env.data,
                registry: self.env.registry,
                resolver: self.env.resolver,
                config: self.env.config,
                scopes: std::mem::take(&mut self.env.scopes),
                depth: self.env.depth.saturating_add(1),
            },
        };
        let result = child.visit_block(template.root());
        self.env.scopes = child.env.scopes;
        result
    }
}

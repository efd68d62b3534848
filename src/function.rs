use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};

use serde_json::Value;

use crate::error::{StencilError, StencilResult};

/// A user supplied function. It receives the evaluated arguments in call
/// order and returns either a value or a message describing the failure.
pub type CallbackFunction = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Everything a [`crate::ast::FunctionNode`] can evaluate to.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    Not,
    And,
    Or,
    In,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Add,
    Subtract,
    Multiplication,
    Division,
    Power,
    Modulo,
    At,
    Default,
    DivisibleBy,
    Even,
    Exists,
    ExistsIn,
    First,
    Float,
    Int,
    IsArray,
    IsBoolean,
    IsFloat,
    IsInteger,
    IsNumber,
    IsObject,
    IsString,
    Join,
    Last,
    Length,
    Lower,
    Max,
    Min,
    Odd,
    Range,
    Round,
    Sort,
    Upper,
    Callback,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Associativity {
    Left,
    Right,
}

impl Operation {
    /// Binding strength when used as an infix/prefix operator. Function calls
    /// are always delimited by parentheses so their value only matters for
    /// consistency.
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Or | Self::And => 1,
            Self::In
            | Self::Equal
            | Self::NotEqual
            | Self::Greater
            | Self::GreaterEqual
            | Self::Less
            | Self::LessEqual => 2,
            Self::Add | Self::Subtract => 3,
            Self::Not | Self::Multiplication | Self::Division | Self::Modulo => 4,
            Self::Power
            | Self::At
            | Self::Default
            | Self::DivisibleBy
            | Self::Even
            | Self::Exists
            | Self::ExistsIn
            | Self::First
            | Self::Float
            | Self::Int
            | Self::IsArray
            | Self::IsBoolean
            | Self::IsFloat
            | Self::IsInteger
            | Self::IsNumber
            | Self::IsObject
            | Self::IsString
            | Self::Join
            | Self::Last
            | Self::Length
            | Self::Lower
            | Self::Max
            | Self::Min
            | Self::Odd
            | Self::Range
            | Self::Round
            | Self::Sort
            | Self::Upper
            | Self::Callback => 5,
        }
    }

    pub const fn associativity(self) -> Associativity {
        match self {
            Self::Power => Associativity::Right,
            _ => Associativity::Left,
        }
    }

    /// Prefix operators take their operand from the right and never force
    /// pending operators off the stack.
    pub const fn is_prefix(self) -> bool {
        matches!(self, Self::Not)
    }
}

#[derive(Clone)]
pub struct FunctionData {
    pub operation: Operation,
    pub callback: Option<CallbackFunction>,
}

impl std::fmt::Debug for FunctionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionData")
            .field("operation", &self.operation)
            .field("callback", &self.callback.as_ref().map(|_| ".."))
            .finish()
    }
}

const BUILTINS: &[(&str, usize, Operation)] = &[
    ("not", 1, Operation::Not),
    ("and", 2, Operation::And),
    ("or", 2, Operation::Or),
    ("in", 2, Operation::In),
    ("==", 2, Operation::Equal),
    ("!=", 2, Operation::NotEqual),
    (">", 2, Operation::Greater),
    (">=", 2, Operation::GreaterEqual),
    ("<", 2, Operation::Less),
    ("<=", 2, Operation::LessEqual),
    ("+", 2, Operation::Add),
    ("-", 2, Operation::Subtract),
    ("*", 2, Operation::Multiplication),
    ("/", 2, Operation::Division),
    ("^", 2, Operation::Power),
    ("%", 2, Operation::Modulo),
    ("at", 2, Operation::At),
    ("default", 2, Operation::Default),
    ("divisibleBy", 2, Operation::DivisibleBy),
    ("even", 1, Operation::Even),
    ("exists", 1, Operation::Exists),
    ("existsIn", 2, Operation::ExistsIn),
    ("first", 1, Operation::First),
    ("float", 1, Operation::Float),
    ("int", 1, Operation::Int),
    ("isArray", 1, Operation::IsArray),
    ("isBoolean", 1, Operation::IsBoolean),
    ("isFloat", 1, Operation::IsFloat),
    ("isInteger", 1, Operation::IsInteger),
    ("isNumber", 1, Operation::IsNumber),
    ("isObject", 1, Operation::IsObject),
    ("isString", 1, Operation::IsString),
    ("join", 2, Operation::Join),
    ("last", 1, Operation::Last),
    ("length", 1, Operation::Length),
    ("lower", 1, Operation::Lower),
    ("max", 1, Operation::Max),
    ("min", 1, Operation::Min),
    ("odd", 1, Operation::Odd),
    ("range", 1, Operation::Range),
    ("round", 2, Operation::Round),
    ("sort", 1, Operation::Sort),
    ("upper", 1, Operation::Upper),
];

/// Maps a name and an argument count to an operation.
///
/// A new registry already knows every operator (`and`, `==`, `+`, ...) and
/// the builtin functions (`length`, `upper`, `range`, ...). Callers extend
/// it with [`FunctionRegistry::add_callback`] before parsing; builtins cannot
/// be replaced.
///
/// # Examples
///
/// ```
/// use stencil::{FunctionRegistry, Operation};
///
/// let mut registry = FunctionRegistry::new();
/// registry
///     .add_callback("double", 1, |args| {
///         let n = args[0].as_i64().ok_or("expected an integer")?;
///         Ok((n * 2).into())
///     })
///     .unwrap();
///
/// assert_eq!(registry.find("double", 1).unwrap().operation, Operation::Callback);
/// assert!(registry.find("double", 2).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, HashMap<usize, FunctionData>>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        let mut functions: HashMap<String, HashMap<usize, FunctionData>> = HashMap::new();
        for (name, arity, operation) in BUILTINS {
            functions.entry((*name).to_string()).or_default().insert(
                *arity,
                FunctionData {
                    operation: *operation,
                    callback: None,
                },
            );
        }
        Self { functions }
    }

    /// Registers `callback` under `name` taking exactly `arity` arguments.
    ///
    /// # Errors
    /// - If the name and arity are already taken, by a builtin or an earlier
    ///   callback.
    pub fn add_callback<N, F>(&mut self, name: N, arity: usize, callback: F) -> StencilResult<()>
    where
        N: AsRef<str>,
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        let name = name.as_ref();
        let overloads = self.functions.entry(name.to_string()).or_default();
        if overloads.contains_key(&arity) {
            return Err(StencilError::FunctionExists {
                name: name.to_string(),
                arity,
            });
        }

        tracing::debug!(name, arity, "registered callback");
        overloads.insert(
            arity,
            FunctionData {
                operation: Operation::Callback,
                callback: Some(Arc::new(callback)),
            },
        );
        Ok(())
    }

    pub fn find(&self, name: &str, arity: usize) -> Option<&FunctionData> {
        self.functions.get(name)?.get(&arity)
    }

    /// Whether any overload exists for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.get(name).is_some_and(|overloads| !overloads.is_empty())
    }
}

static BUILTIN_REGISTRY: LazyLock<FunctionRegistry> = LazyLock::new(FunctionRegistry::new);

/// A shared registry holding only the builtins.
pub(crate) fn builtin_registry() -> &'static FunctionRegistry {
    &BUILTIN_REGISTRY
}

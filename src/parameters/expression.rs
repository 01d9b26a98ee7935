//! Expression parsing and evaluation for parameter constraints
//!
//! Constraint expressions are small arithmetic formulas over parameter names,
//! e.g. `"hbar * diff * q^2 / (1 + tau * diff * q^2)"`. They are parsed once with
//! `nom` into an [`Expression`] tree and evaluated against an
//! [`EvaluationContext`] that supplies variable values.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{map, not, opt, peek, recognize, value},
    multi::{fold_many0, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated},
    IResult, Parser,
};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Error that can occur during expression parsing or evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse expression: {message}")]
    ParseError { message: String },

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Undefined function: {name}")]
    UndefinedFunction { name: String },
}

/// Result type for expression evaluation
type ExprResult<T> = Result<T, ExpressionError>;

/// Functions understood by the evaluator.
const FUNCTIONS: &[&str] = &[
    "sin", "cos", "tan", "exp", "log", "ln", "log10", "sqrt", "abs", "min", "max",
];

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant number
    Number(f64),

    /// Variable reference
    Variable(String),

    /// Unary operations
    Unary(UnaryOp, Box<Expression>),

    /// Binary operations
    Binary(BinaryOp, Box<Expression>, Box<Expression>),

    /// Function call
    Function(String, Vec<Expression>),
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
}

/// Binary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    /// Addition (+)
    Add,

    /// Subtraction (-)
    Sub,

    /// Multiplication (*)
    Mul,

    /// Division (/)
    Div,

    /// Power (^ or **)
    Pow,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }
}

/// Context for expression evaluation, providing variable values
pub trait EvaluationContext {
    /// Get the value of a variable
    fn get_variable(&self, name: &str) -> ExprResult<f64>;

    /// Check if a variable exists
    fn has_variable(&self, name: &str) -> bool;
}

/// Simple implementation of EvaluationContext using a HashMap
#[derive(Debug, Clone, Default)]
pub struct SimpleContext {
    variables: HashMap<String, f64>,
}

impl SimpleContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable value
    pub fn set_variable(&mut self, name: &str, value: f64) {
        self.variables.insert(name.to_string(), value);
    }

    /// Create a new context with the given variables
    pub fn with_variables(variables: HashMap<String, f64>) -> Self {
        Self { variables }
    }
}

impl EvaluationContext for SimpleContext {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.variables.get_variable(name)
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }
}

impl EvaluationContext for HashMap<String, f64> {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.get(name)
            .copied()
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn has_variable(&self, name: &str) -> bool {
        self.contains_key(name)
    }
}

/// Value of a named constant, used when no variable shadows the name.
pub fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "inf" => Some(f64::INFINITY),
        _ => None,
    }
}

impl Expression {
    /// Parse an expression from a string
    ///
    /// # Examples
    ///
    /// ```
    /// use qef_rs::parameters::expression::{Expression, SimpleContext};
    ///
    /// let expr = Expression::parse("2 * a - b ** 2").unwrap();
    /// let mut ctx = SimpleContext::new();
    /// ctx.set_variable("a", 3.0);
    /// ctx.set_variable("b", 2.0);
    /// assert_eq!(expr.evaluate(&ctx).unwrap(), 2.0);
    /// ```
    pub fn parse(input: &str) -> ExprResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ExpressionError::ParseError {
                message: "empty expression".to_string(),
            });
        }

        let expr = match expr_parser(trimmed) {
            Ok((remainder, expr)) if remainder.trim().is_empty() => expr,
            Ok((remainder, _)) => {
                return Err(ExpressionError::ParseError {
                    message: format!("Unexpected trailing characters: '{}'", remainder),
                })
            }
            Err(e) => {
                return Err(ExpressionError::ParseError {
                    message: format!("{:?}", e),
                })
            }
        };

        expr.check_functions()?;
        Ok(expr)
    }

    fn check_functions(&self) -> ExprResult<()> {
        match self {
            Self::Number(_) | Self::Variable(_) => Ok(()),
            Self::Unary(_, inner) => inner.check_functions(),
            Self::Binary(_, left, right) => {
                left.check_functions()?;
                right.check_functions()
            }
            Self::Function(name, args) => {
                if !FUNCTIONS.contains(&name.as_str()) {
                    return Err(ExpressionError::UndefinedFunction { name: name.clone() });
                }
                args.iter().try_for_each(Expression::check_functions)
            }
        }
    }

    /// Evaluate the expression with the given context
    ///
    /// Names missing from the context fall back to the constants `pi` and `inf`.
    pub fn evaluate<C: EvaluationContext>(&self, context: &C) -> ExprResult<f64> {
        match self {
            Self::Number(n) => Ok(*n),

            Self::Variable(name) => {
                if context.has_variable(name) {
                    context.get_variable(name)
                } else {
                    constant(name).ok_or_else(|| ExpressionError::UndefinedVariable {
                        name: name.clone(),
                    })
                }
            }

            Self::Unary(UnaryOp::Neg, expr) => Ok(-expr.evaluate(context)?),

            Self::Binary(op, left, right) => {
                let lhs = left.evaluate(context)?;
                let rhs = right.evaluate(context)?;

                match op {
                    BinaryOp::Add => Ok(lhs + rhs),
                    BinaryOp::Sub => Ok(lhs - rhs),
                    BinaryOp::Mul => Ok(lhs * rhs),
                    BinaryOp::Div if rhs == 0.0 => Err(ExpressionError::DivisionByZero),
                    BinaryOp::Div => Ok(lhs / rhs),
                    BinaryOp::Pow => Ok(lhs.powf(rhs)),
                }
            }

            Self::Function(name, args) => {
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(context))
                    .collect::<ExprResult<Vec<f64>>>()?;
                call_function(name, &args)
            }
        }
    }

    /// Find all variable names used in the expression, sorted and deduplicated
    pub fn variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars.sort();
        vars.dedup();
        vars
    }

    fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Self::Number(_) => {}
            Self::Variable(name) => vars.push(name.clone()),
            Self::Unary(_, expr) => expr.collect_variables(vars),
            Self::Binary(_, left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }
            Self::Function(_, args) => {
                for arg in args {
                    arg.collect_variables(vars);
                }
            }
        }
    }

    /// Return a copy with variables renamed through `mapping`.
    ///
    /// Names absent from the mapping are kept as they are.
    pub fn rename_variables(&self, mapping: &HashMap<String, String>) -> Expression {
        match self {
            Self::Number(n) => Self::Number(*n),
            Self::Variable(name) => {
                Self::Variable(mapping.get(name).cloned().unwrap_or_else(|| name.clone()))
            }
            Self::Unary(op, expr) => Self::Unary(*op, Box::new(expr.rename_variables(mapping))),
            Self::Binary(op, left, right) => Self::Binary(
                *op,
                Box::new(left.rename_variables(mapping)),
                Box::new(right.rename_variables(mapping)),
            ),
            Self::Function(name, args) => Self::Function(
                name.clone(),
                args.iter().map(|arg| arg.rename_variables(mapping)).collect(),
            ),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Variable(name) => write!(f, "{}", name),
            Self::Unary(UnaryOp::Neg, expr) => write!(f, "(-{})", expr),
            Self::Binary(op, left, right) => write!(f, "({} {} {})", left, op.symbol(), right),
            Self::Function(name, args) => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn call_function(name: &str, args: &[f64]) -> ExprResult<f64> {
    let single = |f: fn(f64) -> f64| -> ExprResult<f64> {
        match args {
            [x] => Ok(f(*x)),
            _ => Err(ExpressionError::InvalidOperation {
                message: format!("{}() requires 1 argument, got {}", name, args.len()),
            }),
        }
    };

    match name {
        "sin" => single(f64::sin),
        "cos" => single(f64::cos),
        "tan" => single(f64::tan),
        "exp" => single(f64::exp),
        "log" | "ln" => single(f64::ln),
        "log10" => single(f64::log10),
        "sqrt" => single(f64::sqrt),
        "abs" => single(f64::abs),
        "max" | "min" => {
            if args.len() < 2 {
                return Err(ExpressionError::InvalidOperation {
                    message: format!(
                        "{}() requires at least 2 arguments, got {}",
                        name,
                        args.len()
                    ),
                });
            }
            let folded = if name == "max" {
                args.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            } else {
                args.iter().copied().fold(f64::INFINITY, f64::min)
            };
            Ok(folded)
        }
        _ => Err(ExpressionError::UndefinedFunction {
            name: name.to_string(),
        }),
    }
}

// Parser functions using nom
//
// Grammar, loosest binding first:
//   expr    := term (('+' | '-') term)*
//   term    := unary (('*' | '/') unary)*
//   unary   := '-' unary | '+' unary | power
//   power   := primary (('^' | '**') unary)?
//   primary := number | call | identifier | '(' expr ')'

type PResult<'a, T> = IResult<&'a str, T>;

fn ws(input: &str) -> PResult<'_, &str> {
    multispace0(input)
}

fn symbol<'a>(c: char) -> impl FnMut(&'a str) -> PResult<'a, char> {
    move |input| delimited(ws, char(c), ws).parse(input)
}

/// Parse an identifier (variable or function name)
fn identifier(input: &str) -> PResult<'_, String> {
    map(
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        )),
        str::to_string,
    )
    .parse(input)
}

/// Parse a number; only inputs starting with a digit or '.' are numeric,
/// so identifiers such as `inf_width` are never read as floats.
fn number(input: &str) -> PResult<'_, Expression> {
    let (input, _) = peek(numeric_start).parse(input)?;
    map(double, Expression::Number).parse(input)
}

fn numeric_start(input: &str) -> PResult<'_, char> {
    satisfy(|c: char| c.is_ascii_digit() || c == '.').parse(input)
}

fn function_call(input: &str) -> PResult<'_, Expression> {
    map(
        pair(
            identifier,
            delimited(
                symbol('('),
                separated_list0(symbol(','), expr_parser),
                symbol(')'),
            ),
        ),
        |(name, args)| Expression::Function(name, args),
    )
    .parse(input)
}

fn variable(input: &str) -> PResult<'_, Expression> {
    map(identifier, Expression::Variable).parse(input)
}

fn parens(input: &str) -> PResult<'_, Expression> {
    delimited(symbol('('), expr_parser, symbol(')')).parse(input)
}

fn primary(input: &str) -> PResult<'_, Expression> {
    delimited(ws, alt((number, function_call, variable, parens)), ws).parse(input)
}

fn pow_op(input: &str) -> PResult<'_, &str> {
    delimited(ws, alt((tag("**"), tag("^"))), ws).parse(input)
}

fn power(input: &str) -> PResult<'_, Expression> {
    let (input, base) = primary(input)?;
    let (input, exponent) = opt(preceded(pow_op, unary)).parse(input)?;
    let expr = match exponent {
        Some(exponent) => Expression::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
        None => base,
    };
    Ok((input, expr))
}

fn unary(input: &str) -> PResult<'_, Expression> {
    alt((
        map(preceded(symbol('-'), unary), |expr| {
            Expression::Unary(UnaryOp::Neg, Box::new(expr))
        }),
        preceded(symbol('+'), unary),
        power,
    ))
    .parse(input)
}

fn mul_op(input: &str) -> PResult<'_, BinaryOp> {
    delimited(
        ws,
        alt((
            value(BinaryOp::Mul, terminated(char('*'), not(char('*')))),
            value(BinaryOp::Div, char('/')),
        )),
        ws,
    )
    .parse(input)
}

fn add_op(input: &str) -> PResult<'_, BinaryOp> {
    delimited(
        ws,
        alt((
            value(BinaryOp::Add, char('+')),
            value(BinaryOp::Sub, char('-')),
        )),
        ws,
    )
    .parse(input)
}

/// Left-associative multiplicative level
fn term(input: &str) -> PResult<'_, Expression> {
    let (input, first) = unary(input)?;
    fold_many0(
        pair(mul_op, unary),
        move || first.clone(),
        |acc, (op, rhs)| Expression::Binary(op, Box::new(acc), Box::new(rhs)),
    )
    .parse(input)
}

/// Left-associative additive level
fn expr_parser(input: &str) -> PResult<'_, Expression> {
    let (input, first) = term(input)?;
    fold_many0(
        pair(add_op, term),
        move || first.clone(),
        |acc, (op, rhs)| Expression::Binary(op, Box::new(acc), Box::new(rhs)),
    )
    .parse(input)
}

//! Restricted math expression evaluator
//!
//! Recursive-descent parser over a fixed grammar. The only names an
//! expression can reach are the constants and functions in the allow-list
//! below; there is no dynamic evaluation.
//!
//! Numbers follow Python's numeric rules closely enough that results read
//! the same: integer arithmetic stays integral (`7 // 2` is `3`), true
//! division and most functions produce floats (`sqrt(16)` is `4.0`).

use std::fmt;

use crate::error::{ResearchError, Result};

/// Named constants callers may reference
pub const ALLOWED_CONSTANTS: &[&str] = &["e", "inf", "nan", "pi", "tau"];

/// Functions callers may invoke.
///
/// The scalar functions of a standard math library. Functions that take or
/// return sequences (`fsum`, `prod`, `dist`, `frexp`, `modf`) have no
/// syntax in this grammar and are left out.
pub const ALLOWED_FUNCTIONS: &[&str] = &[
    "acos", "acosh", "asin", "asinh", "atan", "atan2", "atanh", "cbrt", "ceil", "comb",
    "copysign", "cos", "cosh", "degrees", "erf", "erfc", "exp", "exp2", "expm1", "fabs",
    "factorial", "floor", "fmod", "gamma", "gcd", "hypot", "isclose", "isfinite", "isinf",
    "isnan", "isqrt", "lcm", "ldexp", "lgamma", "log", "log10", "log1p", "log2", "nextafter",
    "perm", "pow", "radians", "remainder", "sin", "sinh", "sqrt", "tan", "tanh", "trunc", "ulp",
];

/// Relative tolerance `isclose` uses
const ISCLOSE_REL_TOL: f64 = 1e-9;

/// Nesting bound for parentheses and unary chains
const MAX_DEPTH: usize = 64;

/// A numeric result
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    /// Result of a predicate such as `isnan`; counts as 0 or 1 in arithmetic
    Bool(bool),
}

impl Value {
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Int(i) => i as f64,
            Value::Float(f) => f,
            Value::Bool(b) => f64::from(u8::from(b)),
        }
    }

    /// Booleans become integers; numbers pass through
    fn numeric(self) -> Value {
        match self {
            Value::Bool(b) => Value::Int(i64::from(b)),
            other => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
        }
    }
}

/// Shortest round-trip repr with a signed, two-digit exponent (`1e-05`,
/// `1.5e+16`).
///
/// Debug already switches to exponent form outside `[1e-4, 1e16)` and keeps
/// the trailing `.0` on integral floats; only the exponent needs rewriting.
fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let repr = format!("{:?}", x);
    match repr.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => repr,
    }
}

/// Evaluate an expression
pub fn evaluate(expr: &str) -> Result<Value> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser::new(&tokens);
    let value = parser.parse_expr()?;
    if let Some(tok) = parser.peek() {
        return Err(calc_error(format!("unexpected token {}", tok)));
    }
    Ok(value)
}

/// Evaluate and render the way the calculation tool reports results
pub fn evaluate_to_string(expr: &str) -> Result<String> {
    evaluate(expr).map(|v| v.to_string())
}

fn calc_error(message: impl Into<String>) -> ResearchError {
    ResearchError::Calculation(message.into())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Name(String),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(i) => write!(f, "'{}'", i),
            Token::Float(x) => write!(f, "'{}'", x),
            Token::Name(n) => write!(f, "'{}'", n),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::DoubleStar => write!(f, "'**'"),
            Token::Slash => write!(f, "'/'"),
            Token::DoubleSlash => write!(f, "'//'"),
            Token::Percent => write!(f, "'%'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::DoubleStar);
                i += 2;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let (token, next) = lex_number(&chars, i)?;
                tokens.push(token);
                i = next;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
            }
            c => return Err(calc_error(format!("invalid character '{}'", c))),
        }
    }

    Ok(tokens)
}

/// Lex an integer or float literal starting at `start`; returns the next index
fn lex_number(chars: &[char], start: usize) -> Result<(Token, usize)> {
    let mut i = start;
    let mut is_float = false;

    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        is_float = true;
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
    if text == "." {
        return Err(calc_error("invalid syntax"));
    }

    let token = if is_float {
        Token::Float(
            text.parse()
                .map_err(|_| calc_error(format!("invalid number '{}'", text)))?,
        )
    } else {
        match text.parse::<i64>() {
            Ok(n) => Token::Int(n),
            // Too large for i64: keep going as a float
            Err(_) => Token::Float(
                text.parse()
                    .map_err(|_| calc_error(format!("invalid number '{}'", text)))?,
            ),
        }
    };

    Ok((token, i))
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(calc_error("expression nested too deeply"));
        }
        Ok(())
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<Value> {
        let mut left = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.next();
                    left = add(left, self.parse_term()?);
                }
                Some(Token::Minus) => {
                    self.next();
                    left = sub(left, self.parse_term()?);
                }
                _ => return Ok(left),
            }
        }
    }

    // term = unary (('*' | '/' | '//' | '%') unary)*
    fn parse_term(&mut self) -> Result<Value> {
        let mut left = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.next();
                    left = mul(left, self.parse_unary()?);
                }
                Some(Token::Slash) => {
                    self.next();
                    left = true_div(left, self.parse_unary()?)?;
                }
                Some(Token::DoubleSlash) => {
                    self.next();
                    left = floor_div(left, self.parse_unary()?)?;
                }
                Some(Token::Percent) => {
                    self.next();
                    left = modulo(left, self.parse_unary()?)?;
                }
                _ => return Ok(left),
            }
        }
    }

    // unary = ('-' | '+') unary | power
    fn parse_unary(&mut self) -> Result<Value> {
        match self.peek() {
            Some(Token::Minus) => {
                self.next();
                self.enter()?;
                let v = self.parse_unary()?;
                self.depth -= 1;
                Ok(neg(v))
            }
            Some(Token::Plus) => {
                self.next();
                self.enter()?;
                let v = self.parse_unary()?;
                self.depth -= 1;
                Ok(v)
            }
            _ => self.parse_power(),
        }
    }

    // power = primary ('**' unary)?   (right-associative, binds tighter than unary on the left)
    fn parse_power(&mut self) -> Result<Value> {
        let base = self.parse_primary()?;
        if let Some(Token::DoubleStar) = self.peek() {
            self.next();
            self.enter()?;
            let exponent = self.parse_unary()?;
            self.depth -= 1;
            return power(base, exponent);
        }
        Ok(base)
    }

    // primary = NUMBER | NAME | NAME '(' args ')' | '(' expr ')'
    fn parse_primary(&mut self) -> Result<Value> {
        match self.next() {
            Some(Token::Int(n)) => Ok(Value::Int(*n)),
            Some(Token::Float(x)) => Ok(Value::Float(*x)),
            Some(Token::LParen) => {
                self.enter()?;
                let v = self.parse_expr()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token::RParen) => Ok(v),
                    _ => Err(calc_error("expected ')'")),
                }
            }
            Some(Token::Name(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.next();
                    self.enter()?;
                    let args = self.parse_args()?;
                    self.depth -= 1;
                    call_function(name, &args)
                } else {
                    constant(name)
                }
            }
            Some(tok) => Err(calc_error(format!("unexpected token {}", tok))),
            None => Err(calc_error("unexpected end of expression")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Value>> {
        let mut args = Vec::new();
        if let Some(Token::RParen) = self.peek() {
            self.next();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err(calc_error("expected ',' or ')'")),
            }
        }
    }
}

fn constant(name: &str) -> Result<Value> {
    match name {
        "pi" => Ok(Value::Float(std::f64::consts::PI)),
        "e" => Ok(Value::Float(std::f64::consts::E)),
        "tau" => Ok(Value::Float(std::f64::consts::TAU)),
        "inf" => Ok(Value::Float(f64::INFINITY)),
        "nan" => Ok(Value::Float(f64::NAN)),
        _ if ALLOWED_FUNCTIONS.contains(&name) => {
            Err(calc_error(format!("'{}' must be called", name)))
        }
        _ => Err(calc_error(format!("name '{}' is not defined", name))),
    }
}

fn add(a: Value, b: Value) -> Value {
    let (a, b) = (a.numeric(), b.numeric());
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_add(y)
            .map(Value::Int)
            .unwrap_or(Value::Float(x as f64 + y as f64)),
        _ => Value::Float(a.as_f64() + b.as_f64()),
    }
}

fn sub(a: Value, b: Value) -> Value {
    let (a, b) = (a.numeric(), b.numeric());
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_sub(y)
            .map(Value::Int)
            .unwrap_or(Value::Float(x as f64 - y as f64)),
        _ => Value::Float(a.as_f64() - b.as_f64()),
    }
}

fn mul(a: Value, b: Value) -> Value {
    let (a, b) = (a.numeric(), b.numeric());
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x
            .checked_mul(y)
            .map(Value::Int)
            .unwrap_or(Value::Float(x as f64 * y as f64)),
        _ => Value::Float(a.as_f64() * b.as_f64()),
    }
}

fn neg(a: Value) -> Value {
    match a {
        Value::Int(x) => x
            .checked_neg()
            .map(Value::Int)
            .unwrap_or(Value::Float(-(x as f64))),
        Value::Float(x) => Value::Float(-x),
        Value::Bool(b) => Value::Int(-i64::from(b)),
    }
}

fn is_zero(v: Value) -> bool {
    match v {
        Value::Int(x) => x == 0,
        Value::Float(x) => x == 0.0,
        Value::Bool(b) => !b,
    }
}

fn true_div(a: Value, b: Value) -> Result<Value> {
    let (a, b) = (a.numeric(), b.numeric());
    if is_zero(b) {
        return Err(calc_error("division by zero"));
    }
    Ok(Value::Float(a.as_f64() / b.as_f64()))
}

fn floor_div(a: Value, b: Value) -> Result<Value> {
    let (a, b) = (a.numeric(), b.numeric());
    if is_zero(b) {
        return Err(calc_error("integer division or modulo by zero"));
    }
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x
            .checked_div_euclid(y)
            .map(|_| Value::Int(x.div_euclid(y) - i64::from(y < 0 && x.rem_euclid(y) != 0)))
            .unwrap_or(Value::Float((x as f64 / y as f64).floor()))),
        _ => Ok(Value::Float((a.as_f64() / b.as_f64()).floor())),
    }
}

fn modulo(a: Value, b: Value) -> Result<Value> {
    let (a, b) = (a.numeric(), b.numeric());
    if is_zero(b) {
        return Err(calc_error("integer division or modulo by zero"));
    }
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => {
            // Result takes the sign of the divisor
            let r = x.checked_rem(y).unwrap_or(0);
            Ok(Value::Int(if r != 0 && (r < 0) != (y < 0) { r + y } else { r }))
        }
        _ => {
            let (x, y) = (a.as_f64(), b.as_f64());
            let r = x % y;
            Ok(Value::Float(if r != 0.0 && (r < 0.0) != (y < 0.0) {
                r + y
            } else {
                r
            }))
        }
    }
}

fn power(base: Value, exponent: Value) -> Result<Value> {
    let (base, exponent) = (base.numeric(), exponent.numeric());
    match (base, exponent) {
        (Value::Int(b), Value::Int(e)) if e >= 0 => {
            let result = u32::try_from(e).ok().and_then(|e| b.checked_pow(e));
            Ok(result
                .map(Value::Int)
                .unwrap_or(Value::Float((b as f64).powf(e as f64))))
        }
        (Value::Int(0), Value::Int(_)) => Err(calc_error(
            "0.0 cannot be raised to a negative power",
        )),
        _ => {
            let (b, e) = (base.as_f64(), exponent.as_f64());
            if b == 0.0 && e < 0.0 {
                return Err(calc_error("0.0 cannot be raised to a negative power"));
            }
            let r = b.powf(e);
            if r.is_nan() && !b.is_nan() && !e.is_nan() {
                return Err(calc_error("math domain error"));
            }
            Ok(Value::Float(r))
        }
    }
}

fn expect_args(name: &str, args: &[Value], count: usize) -> Result<()> {
    if args.len() != count {
        return Err(calc_error(format!(
            "{}() takes exactly {} argument{} ({} given)",
            name,
            count,
            if count == 1 { "" } else { "s" },
            args.len()
        )));
    }
    Ok(())
}

fn expect_int(name: &str, v: Value) -> Result<i64> {
    match v {
        Value::Int(i) => Ok(i),
        Value::Bool(b) => Ok(i64::from(b)),
        Value::Float(_) => Err(calc_error(format!(
            "{}() only accepts integral values",
            name
        ))),
    }
}

/// Float result that must stay inside the function's domain
fn domain_checked(x: f64) -> Result<Value> {
    if x.is_nan() {
        return Err(calc_error("math domain error"));
    }
    Ok(Value::Float(x))
}

fn float_to_int(x: f64) -> Result<Value> {
    if x.is_nan() {
        return Err(calc_error("cannot convert float NaN to integer"));
    }
    if x.is_infinite() {
        return Err(calc_error("cannot convert float infinity to integer"));
    }
    if x >= i64::MIN as f64 && x < i64::MAX as f64 {
        Ok(Value::Int(x as i64))
    } else {
        Ok(Value::Float(x))
    }
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    a = a.checked_abs().unwrap_or(i64::MAX);
    b = b.checked_abs().unwrap_or(i64::MAX);
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// n! / (n-k)! as an integer if it fits
fn falling_factorial(n: i64, k: i64) -> Option<i64> {
    (0..k).try_fold(1_i64, |acc, i| acc.checked_mul(n - i))
}

/// n!, promoted to float once it leaves i64 like the arithmetic operators
fn factorial_value(name: &str, n: i64) -> Result<Value> {
    if n < 0 {
        return Err(calc_error(format!("{}() not defined for negative values", name)));
    }
    if let Some(exact) = falling_factorial(n, n) {
        return Ok(Value::Int(exact));
    }

    let mut acc = 1.0_f64;
    for i in 2..=n {
        acc *= i as f64;
        if acc.is_infinite() {
            return Err(calc_error("int too large to convert to float"));
        }
    }
    Ok(Value::Float(acc))
}

/// Finite float result; overflow to infinity is a range error
fn range_checked(x: f64) -> Result<Value> {
    if x.is_infinite() {
        return Err(calc_error("math range error"));
    }
    domain_checked(x)
}

fn is_nonpositive_integer(x: f64) -> bool {
    x <= 0.0 && x.fract() == 0.0
}

fn ulp(x: f64) -> f64 {
    let x = x.abs();
    if !x.is_finite() {
        return x;
    }
    let up = libm::nextafter(x, f64::INFINITY);
    if up.is_infinite() {
        // Largest finite value: measure the gap below instead
        return x - libm::nextafter(x, 0.0);
    }
    up - x
}

fn call_function(name: &str, raw_args: &[Value]) -> Result<Value> {
    let normalized: Vec<Value> = raw_args.iter().map(|v| v.numeric()).collect();
    let args = normalized.as_slice();

    let unary = |f: fn(f64) -> f64| -> Result<Value> {
        expect_args(name, args, 1)?;
        domain_checked(f(args[0].as_f64()))
    };

    match name {
        "sqrt" => {
            expect_args(name, args, 1)?;
            let x = args[0].as_f64();
            if x < 0.0 {
                return Err(calc_error("math domain error"));
            }
            Ok(Value::Float(x.sqrt()))
        }
        "exp" => unary(f64::exp),
        "exp2" => unary(f64::exp2),
        "cbrt" => unary(f64::cbrt),
        "erf" => unary(libm::erf),
        "erfc" => unary(libm::erfc),
        "gamma" => {
            expect_args(name, args, 1)?;
            let x = args[0].as_f64();
            if is_nonpositive_integer(x) || x == f64::NEG_INFINITY {
                return Err(calc_error("math domain error"));
            }
            range_checked(libm::tgamma(x))
        }
        "lgamma" => {
            expect_args(name, args, 1)?;
            let x = args[0].as_f64();
            if is_nonpositive_integer(x) {
                return Err(calc_error("math domain error"));
            }
            domain_checked(libm::lgamma(x))
        }
        "isnan" | "isinf" | "isfinite" => {
            expect_args(name, args, 1)?;
            let x = args[0].as_f64();
            Ok(Value::Bool(match name {
                "isnan" => x.is_nan(),
                "isinf" => x.is_infinite(),
                _ => x.is_finite(),
            }))
        }
        "isclose" => {
            expect_args(name, args, 2)?;
            let (a, b) = (args[0].as_f64(), args[1].as_f64());
            let close = a == b
                || (a.is_finite()
                    && b.is_finite()
                    && (a - b).abs() <= ISCLOSE_REL_TOL * a.abs().max(b.abs()));
            Ok(Value::Bool(close))
        }
        "ldexp" => {
            expect_args(name, args, 2)?;
            let x = args[0].as_f64();
            let exp = expect_int(name, args[1])?;
            let exp = i32::try_from(exp).unwrap_or(if exp > 0 { i32::MAX } else { i32::MIN });
            let r = libm::ldexp(x, exp);
            if r.is_infinite() && x.is_finite() {
                return Err(calc_error("math range error"));
            }
            Ok(Value::Float(r))
        }
        "remainder" => {
            expect_args(name, args, 2)?;
            let (x, y) = (args[0].as_f64(), args[1].as_f64());
            if y == 0.0 || x.is_infinite() {
                return Err(calc_error("math domain error"));
            }
            Ok(Value::Float(libm::remainder(x, y)))
        }
        "nextafter" => {
            expect_args(name, args, 2)?;
            Ok(Value::Float(libm::nextafter(
                args[0].as_f64(),
                args[1].as_f64(),
            )))
        }
        "ulp" => {
            expect_args(name, args, 1)?;
            Ok(Value::Float(ulp(args[0].as_f64())))
        }
        "expm1" => unary(f64::exp_m1),
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "asin" => unary(f64::asin),
        "acos" => unary(f64::acos),
        "atan" => unary(f64::atan),
        "sinh" => unary(f64::sinh),
        "cosh" => unary(f64::cosh),
        "tanh" => unary(f64::tanh),
        "asinh" => unary(f64::asinh),
        "acosh" => unary(f64::acosh),
        "atanh" => unary(f64::atanh),
        "degrees" => unary(f64::to_degrees),
        "radians" => unary(f64::to_radians),
        "fabs" => unary(f64::abs),
        "log10" | "log2" | "log1p" => {
            expect_args(name, args, 1)?;
            let x = args[0].as_f64();
            let bound = if name == "log1p" { -1.0 } else { 0.0 };
            if x <= bound {
                return Err(calc_error("math domain error"));
            }
            Ok(Value::Float(match name {
                "log10" => x.log10(),
                "log2" => x.log2(),
                _ => x.ln_1p(),
            }))
        }
        "log" => {
            if args.is_empty() || args.len() > 2 {
                return Err(calc_error(format!(
                    "log() expected 1 or 2 arguments, got {}",
                    args.len()
                )));
            }
            let x = args[0].as_f64();
            if x <= 0.0 {
                return Err(calc_error("math domain error"));
            }
            match args.get(1) {
                None => Ok(Value::Float(x.ln())),
                Some(base) => {
                    let b = base.as_f64();
                    if b <= 0.0 || b == 1.0 {
                        return Err(calc_error("math domain error"));
                    }
                    Ok(Value::Float(x.ln() / b.ln()))
                }
            }
        }
        "pow" => {
            expect_args(name, args, 2)?;
            let (b, e) = (args[0].as_f64(), args[1].as_f64());
            if b == 0.0 && e < 0.0 {
                return Err(calc_error("math domain error"));
            }
            domain_checked(b.powf(e))
        }
        "atan2" => {
            expect_args(name, args, 2)?;
            Ok(Value::Float(args[0].as_f64().atan2(args[1].as_f64())))
        }
        "hypot" => Ok(Value::Float(
            args.iter()
                .map(|v| v.as_f64() * v.as_f64())
                .sum::<f64>()
                .sqrt(),
        )),
        "copysign" => {
            expect_args(name, args, 2)?;
            Ok(Value::Float(args[0].as_f64().copysign(args[1].as_f64())))
        }
        "fmod" => {
            expect_args(name, args, 2)?;
            let (x, y) = (args[0].as_f64(), args[1].as_f64());
            if y == 0.0 {
                return Err(calc_error("math domain error"));
            }
            Ok(Value::Float(x % y))
        }
        "floor" | "ceil" | "trunc" => {
            expect_args(name, args, 1)?;
            match args[0] {
                Value::Int(i) => Ok(Value::Int(i)),
                Value::Bool(b) => Ok(Value::Int(i64::from(b))),
                Value::Float(x) => float_to_int(match name {
                    "floor" => x.floor(),
                    "ceil" => x.ceil(),
                    _ => x.trunc(),
                }),
            }
        }
        "factorial" => {
            expect_args(name, args, 1)?;
            factorial_value(name, expect_int(name, args[0])?)
        }
        // perm(n) is n!
        "perm" if args.len() == 1 => factorial_value(name, expect_int(name, args[0])?),
        "isqrt" => {
            expect_args(name, args, 1)?;
            let n = expect_int(name, args[0])?;
            if n < 0 {
                return Err(calc_error("isqrt() argument must be nonnegative"));
            }
            let mut r = (n as f64).sqrt() as i64;
            while r.checked_mul(r).map_or(true, |sq| sq > n) {
                r -= 1;
            }
            while (r + 1).checked_mul(r + 1).map_or(false, |sq| sq <= n) {
                r += 1;
            }
            Ok(Value::Int(r))
        }
        "gcd" => {
            let ints = args
                .iter()
                .map(|v| expect_int(name, *v))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Int(ints.into_iter().fold(0, gcd)))
        }
        "lcm" => {
            let ints = args
                .iter()
                .map(|v| expect_int(name, *v))
                .collect::<Result<Vec<_>>>()?;
            let mut acc: i64 = 1;
            for n in ints {
                if n == 0 {
                    return Ok(Value::Int(0));
                }
                let g = gcd(acc, n);
                acc = (acc / g)
                    .checked_mul(n.checked_abs().unwrap_or(i64::MAX))
                    .ok_or_else(|| calc_error("integer overflow in lcm()"))?;
            }
            Ok(Value::Int(acc))
        }
        "perm" | "comb" => {
            expect_args(name, args, 2)?;
            let n = expect_int(name, args[0])?;
            let k = expect_int(name, args[1])?;
            if n < 0 || k < 0 {
                return Err(calc_error(format!(
                    "{}() arguments must be non-negative",
                    name
                )));
            }
            if k > n {
                return Ok(Value::Int(0));
            }
            let k = if name == "comb" { k.min(n - k) } else { k };
            let mut acc: i64 = 1;
            for i in 0..k {
                acc = acc
                    .checked_mul(n - i)
                    .ok_or_else(|| calc_error(format!("integer overflow in {}()", name)))?;
                if name == "comb" {
                    acc /= i + 1;
                }
            }
            Ok(Value::Int(acc))
        }
        _ if ALLOWED_CONSTANTS.contains(&name) => {
            Err(calc_error(format!("'{}' object is not callable", name)))
        }
        _ => Err(calc_error(format!("name '{}' is not defined", name))),
    }
}

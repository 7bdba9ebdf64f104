/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

/* Permutation formulas are tiny integer expressions over two variables:
 *   W - number of candidate tracks in the destination
 *   t - position of the source track among its own candidates
 * A formula is compiled once into reverse-polish notation (shunting-yard) and
 * then evaluated on a small operand stack for every candidate connection.
 */

use std::str::FromStr;


/// Values bound to the formula variables.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FormulaData {
    /// `W`
    pub dest_w: i64,
    /// `t`
    pub track: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormulaErrorKind {
    Empty,
    UnknownCharacter { ch: char, pos: usize },
    InvalidNumber(String),
    MismatchedBrackets,
    MissingOperand,
    TrailingOperand,
    DivisionByZero,
    Overflow,
}

impl std::fmt::Display for FormulaErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "formula is empty"),
            Self::UnknownCharacter { ch, pos } =>
                write!(f, "unsupported character '{}' at position {}", ch, pos),
            Self::InvalidNumber(num) => write!(f, "number {} does not fit an integer", num),
            Self::MismatchedBrackets => write!(f, "mismatched brackets"),
            Self::MissingOperand => write!(f, "operator is missing an operand"),
            Self::TrailingOperand => write!(f, "operand without an operator"),
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::Overflow => write!(f, "integer overflow"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormulaError {
    pub formula: String,
    pub kind: FormulaErrorKind,
}

impl FormulaError {
    fn new(formula: &str, kind: FormulaErrorKind) -> Self {
        Self { formula: formula.to_string(), kind }
    }
}

impl std::fmt::Display for FormulaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "in formula \"{}\": {}", self.formula, self.kind)
    }
}

impl std::error::Error for FormulaError {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    /* Higher binds tighter */
    pub fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => 2,
            Self::Mul | Self::Div => 3,
        }
    }

    /* There is no right-associative operator (no exponentiation) */
    pub fn is_left_associative(self) -> bool {
        true
    }

    /* Division truncates toward zero */
    fn apply(self, lhs: i64, rhs: i64) -> Result<i64, FormulaErrorKind> {
        match self {
            Self::Add => lhs.checked_add(rhs).ok_or(FormulaErrorKind::Overflow),
            Self::Sub => lhs.checked_sub(rhs).ok_or(FormulaErrorKind::Overflow),
            Self::Mul => lhs.checked_mul(rhs).ok_or(FormulaErrorKind::Overflow),
            Self::Div => {
                if rhs == 0 {
                    return Err(FormulaErrorKind::DivisionByZero);
                }
                lhs.checked_div(rhs).ok_or(FormulaErrorKind::Overflow)
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FormulaToken {
    Number(i64),
    DestWidth,
    Track,
    Op(Operator),
    LeftBracket,
    RightBracket,
}

pub fn tokenize(formula: &str) -> Result<Vec<FormulaToken>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = formula.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        let token = match ch {
            c if c.is_whitespace() => continue,
            '0' ..= '9' => {
                let mut digits = String::from(ch);
                while let Some((_, next)) = chars.peek() {
                    if !next.is_ascii_digit() { break; }
                    digits.push(*next);
                    chars.next();
                }
                let num = digits.parse::<i64>().map_err(|_| {
                    FormulaError::new(formula, FormulaErrorKind::InvalidNumber(digits.clone()))
                })?;
                FormulaToken::Number(num)
            },
            'W' => FormulaToken::DestWidth,
            't' => FormulaToken::Track,
            '+' => FormulaToken::Op(Operator::Add),
            '-' => FormulaToken::Op(Operator::Sub),
            '*' => FormulaToken::Op(Operator::Mul),
            '/' => FormulaToken::Op(Operator::Div),
            '(' => FormulaToken::LeftBracket,
            ')' => FormulaToken::RightBracket,
            _ => return Err(FormulaError::new(
                formula,
                FormulaErrorKind::UnknownCharacter { ch, pos }
            )),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

/* Items of the compiled reverse-polish program */
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RpnItem {
    Number(i64),
    DestWidth,
    Track,
    Op(Operator),
}

/* Operator stack entries of the shunting-yard parser */
#[derive(Copy, Clone, Debug)]
enum StackItem {
    Op(Operator),
    LeftBracket,
}

/// A parsed permutation formula, ready to be evaluated many times.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Formula {
    text: String,
    rpn: Vec<RpnItem>,
}

impl Formula {
    pub fn parse(text: &str) -> Result<Self, FormulaError> {
        let err = |kind| FormulaError::new(text, kind);

        let mut rpn = Vec::new();
        let mut op_stack: Vec<StackItem> = Vec::new();

        for token in tokenize(text)? {
            match token {
                FormulaToken::Number(num) => rpn.push(RpnItem::Number(num)),
                FormulaToken::DestWidth => rpn.push(RpnItem::DestWidth),
                FormulaToken::Track => rpn.push(RpnItem::Track),
                FormulaToken::Op(op) => {
                    /* Pop operators that bind at least as tightly */
                    while let Some(StackItem::Op(top)) = op_stack.last() {
                        let top = *top;
                        let pops = (op.is_left_associative()
                            && op.precedence() == top.precedence())
                            || op.precedence() < top.precedence();
                        if !pops { break; }
                        rpn.push(RpnItem::Op(top));
                        op_stack.pop();
                    }
                    op_stack.push(StackItem::Op(op));
                },
                FormulaToken::LeftBracket => op_stack.push(StackItem::LeftBracket),
                FormulaToken::RightBracket => loop {
                    match op_stack.pop() {
                        Some(StackItem::Op(op)) => rpn.push(RpnItem::Op(op)),
                        Some(StackItem::LeftBracket) => break,
                        None => return Err(err(FormulaErrorKind::MismatchedBrackets)),
                    }
                },
            }
        }

        while let Some(item) = op_stack.pop() {
            match item {
                StackItem::Op(op) => rpn.push(RpnItem::Op(op)),
                StackItem::LeftBracket => return Err(err(FormulaErrorKind::MismatchedBrackets)),
            }
        }

        /* Check operand arity up front, so that evaluation can only fail on arithmetic */
        let mut depth = 0usize;
        for item in &rpn {
            match item {
                RpnItem::Op(_) => {
                    if depth < 2 {
                        return Err(err(FormulaErrorKind::MissingOperand));
                    }
                    depth -= 1;
                },
                _ => depth += 1,
            }
        }
        match depth {
            0 => return Err(err(FormulaErrorKind::Empty)),
            1 => (),
            _ => return Err(err(FormulaErrorKind::TrailingOperand)),
        }

        Ok(Self { text: text.to_string(), rpn })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn eval(&self, data: &FormulaData) -> Result<i64, FormulaError> {
        let mut stack: Vec<i64> = Vec::with_capacity(self.rpn.len());

        for item in &self.rpn {
            let value = match item {
                RpnItem::Number(num) => *num,
                RpnItem::DestWidth => data.dest_w,
                RpnItem::Track => data.track,
                RpnItem::Op(op) => {
                    let (rhs, lhs) = match (stack.pop(), stack.pop()) {
                        (Some(rhs), Some(lhs)) => (rhs, lhs),
                        _ => return Err(FormulaError::new(
                            &self.text,
                            FormulaErrorKind::MissingOperand
                        )),
                    };
                    op.apply(lhs, rhs).map_err(|kind| FormulaError::new(&self.text, kind))?
                },
            };
            stack.push(value);
        }

        match stack.as_slice() {
            [result] => Ok(*result),
            [] => Err(FormulaError::new(&self.text, FormulaErrorKind::Empty)),
            _ => Err(FormulaError::new(&self.text, FormulaErrorKind::TrailingOperand)),
        }
    }
}

impl FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Parses and evaluates `formula` in one go.
pub fn eval_formula(formula: &str, data: &FormulaData) -> Result<i64, FormulaError> {
    Formula::parse(formula)?.eval(data)
}

/// Wraps a formula result into `[0, dest_w)`. Negative results wrap like a
/// floor modulo, so `-1` selects the last candidate.
pub fn wrap_formula_result(result: i64, dest_w: usize) -> Option<usize> {
    if dest_w == 0 {
        return None;
    }
    let wrapped = result.rem_euclid(dest_w as i64);
    usize::try_from(wrapped).ok().filter(|idx| *idx < dest_w)
}

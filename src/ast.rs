use std::fmt;

use crate::visitor::Visitor;

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOperator {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(BinaryOperator::Add),
            '-' => Some(BinaryOperator::Sub),
            '*' => Some(BinaryOperator::Mul),
            '/' => Some(BinaryOperator::Div),
            '%' => Some(BinaryOperator::Mod),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            BinaryOperator::Add => '+',
            BinaryOperator::Sub => '-',
            BinaryOperator::Mul => '*',
            BinaryOperator::Div => '/',
            BinaryOperator::Mod => '%',
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct NumberLiteral {
    pub value: f64,
}

#[derive(Debug, PartialEq, Clone)]
pub struct VariableRef {
    pub name: String,
}

#[derive(Debug, PartialEq, Clone)]
pub struct BinaryOp {
    pub operator: BinaryOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Call {
    pub callee: String,
    pub args: Vec<Expression>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Conditional {
    pub condition: Box<Expression>,
    pub then_branch: Box<Expression>,
    pub else_branch: Box<Expression>,
}

/// An expression tree. Every child is owned by its parent.
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Number(NumberLiteral),
    Variable(VariableRef),
    Binary(BinaryOp),
    Call(Call),
    Conditional(Conditional),
}

impl Expression {
    pub fn number(value: f64) -> Self {
        Expression::Number(NumberLiteral { value })
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable(VariableRef { name: name.into() })
    }

    pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::Binary(BinaryOp {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Call(Call {
            callee: callee.into(),
            args,
        })
    }

    pub fn conditional(
        condition: Expression,
        then_branch: Expression,
        else_branch: Expression,
    ) -> Self {
        Expression::Conditional(Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    /// Calls the handler on `visitor` that matches this node's variant.
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> V::ExprOutput {
        match self {
            Expression::Number(node) => visitor.visit_number(node),
            Expression::Variable(node) => visitor.visit_variable(node),
            Expression::Binary(node) => visitor.visit_binary(node),
            Expression::Call(node) => visitor.visit_call(node),
            Expression::Conditional(node) => visitor.visit_conditional(node),
        }
    }
}

/// A top-level function: either a definition with a body, or an `extern`
/// declaration without one. Bare top-level expressions are wrapped in an
/// anonymous definition with an empty name.
///
/// The fields are private so that "declaration only" and "has no body" can
/// never disagree.
#[derive(Debug, PartialEq, Clone)]
pub struct Function {
    name: String,
    params: Vec<String>,
    body: Option<Expression>,
}

impl Function {
    pub fn definition(name: impl Into<String>, params: Vec<String>, body: Expression) -> Self {
        Self {
            name: name.into(),
            params,
            body: Some(body),
        }
    }

    pub fn declaration(name: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            name: name.into(),
            params,
            body: None,
        }
    }

    pub fn anonymous(body: Expression) -> Self {
        Self::definition(String::new(), Vec::new(), body)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn body(&self) -> Option<&Expression> {
        self.body.as_ref()
    }

    pub fn is_declaration_only(&self) -> bool {
        self.body.is_none()
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty() && self.body.is_some()
    }

    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) -> V::FunctionOutput {
        visitor.visit_function(self)
    }
}

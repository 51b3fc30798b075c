//! Double-dispatch traversal over the AST.
//!
//! A node's `accept` picks the handler for its own variant; the handler then
//! decides whether and when to descend into the node's children. Consumers
//! add new traversals by implementing this trait, without touching the node
//! types.

use crate::ast::{BinaryOp, Call, Conditional, Function, NumberLiteral, VariableRef};

pub trait Visitor {
    /// Result of visiting an expression node.
    type ExprOutput;
    /// Result of visiting a top-level function.
    type FunctionOutput;

    fn visit_number(&mut self, node: &NumberLiteral) -> Self::ExprOutput;
    fn visit_variable(&mut self, node: &VariableRef) -> Self::ExprOutput;
    fn visit_binary(&mut self, node: &BinaryOp) -> Self::ExprOutput;
    fn visit_call(&mut self, node: &Call) -> Self::ExprOutput;
    fn visit_conditional(&mut self, node: &Conditional) -> Self::ExprOutput;
    fn visit_function(&mut self, node: &Function) -> Self::FunctionOutput;
}

//! Renders the AST as S-expressions, e.g. `(def f (a b) (+ a b))`.

use crate::{
    ast::{BinaryOp, Call, Conditional, Function, NumberLiteral, VariableRef},
    visitor::Visitor,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(function: &Function) -> String {
        function.accept(&mut AstPrinter)
    }
}

impl Visitor for AstPrinter {
    type ExprOutput = String;
    type FunctionOutput = String;

    fn visit_number(&mut self, node: &NumberLiteral) -> String {
        node.value.to_string()
    }

    fn visit_variable(&mut self, node: &VariableRef) -> String {
        node.name.clone()
    }

    fn visit_binary(&mut self, node: &BinaryOp) -> String {
        format!(
            "({} {} {})",
            node.operator,
            node.left.accept(self),
            node.right.accept(self)
        )
    }

    fn visit_call(&mut self, node: &Call) -> String {
        let mut out = format!("(call {}", node.callee);
        for arg in &node.args {
            out.push(' ');
            out.push_str(&arg.accept(self));
        }
        out.push(')');
        out
    }

    fn visit_conditional(&mut self, node: &Conditional) -> String {
        format!(
            "(if {} {} {})",
            node.condition.accept(self),
            node.then_branch.accept(self),
            node.else_branch.accept(self)
        )
    }

    fn visit_function(&mut self, node: &Function) -> String {
        let params = node.params().join(" ");
        match node.body() {
            Some(body) if node.is_anonymous() => format!("(lambda {})", body.accept(self)),
            Some(body) => format!("(def {} ({}) {})", node.name(), params, body.accept(self)),
            None => format!("(extern {} ({}))", node.name(), params),
        }
    }
}

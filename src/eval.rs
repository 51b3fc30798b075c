use std::{collections::HashMap, fmt::Write, rc::Rc};

use lazy_static::lazy_static;

use crate::{
    ast::{
        BinaryOp, BinaryOperator, Call, Conditional, Expression, Function, NumberLiteral,
        VariableRef,
    },
    visitor::Visitor,
};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum EvalError {
    #[error("unknown variable referenced {0}")]
    UnknownVariable(String),
    #[error("unknown function {0}")]
    UnknownFunction(String),
    #[error("invalid number of args in call {0} expected {1} found {2}")]
    InvalidCall(String, usize, usize),
    #[error("function {0} cannot be redefined")]
    Redefinition(String),
    #[error("function {0} was declared with {1} parameters, found {2}")]
    SignatureMismatch(String, usize, usize),
    #[error("extern {0} has no definition")]
    UnresolvedExtern(String),
    #[error("maximum call depth of {0} exceeded")]
    CallDepthExceeded(usize),
}

/// A built-in function. Anything it prints goes to `output`, which the
/// interpreter hands back through `take_output`.
#[derive(Clone, Copy)]
pub struct Native {
    arity: usize,
    call: fn(args: &[f64], output: &mut String) -> f64,
}

lazy_static! {
    /// Functions an `extern` can bind to.
    static ref NATIVES: HashMap<&'static str, Native> = {
        let mut map = HashMap::new();
        map.insert("sin", Native { arity: 1, call: |args, _| args[0].sin() });
        map.insert("cos", Native { arity: 1, call: |args, _| args[0].cos() });
        map.insert("tan", Native { arity: 1, call: |args, _| args[0].tan() });
        map.insert("sqrt", Native { arity: 1, call: |args, _| args[0].sqrt() });
        map.insert("exp", Native { arity: 1, call: |args, _| args[0].exp() });
        map.insert("log", Native { arity: 1, call: |args, _| args[0].ln() });
        map.insert("fabs", Native { arity: 1, call: |args, _| args[0].abs() });
        map.insert("floor", Native { arity: 1, call: |args, _| args[0].floor() });
        map.insert("ceil", Native { arity: 1, call: |args, _| args[0].ceil() });
        map.insert("pow", Native { arity: 2, call: |args, _| args[0].powf(args[1]) });
        map.insert("fmod", Native { arity: 2, call: |args, _| args[0] % args[1] });
        map.insert("atan2", Native { arity: 2, call: |args, _| args[0].atan2(args[1]) });
        map.insert("putchard", Native {
            arity: 1,
            call: |args, output| {
                output.push(char::from(args[0] as u8));
                0.0
            },
        });
        map.insert("printd", Native {
            arity: 1,
            call: |args, output| {
                let _ = writeln!(output, "{}", args[0]);
                0.0
            },
        });
        map
    };
}

#[derive(Clone)]
enum Callable {
    Native(Native),
    /// An `extern` with no native behind it, waiting for a `def`.
    Prototype(usize),
    Defined {
        params: Rc<[String]>,
        body: Rc<Expression>,
    },
}

impl Callable {
    fn arity(&self) -> usize {
        match self {
            Callable::Native(native) => native.arity,
            Callable::Prototype(arity) => *arity,
            Callable::Defined { params, .. } => params.len(),
        }
    }
}

/// What handing a top-level function to the interpreter did.
#[derive(Debug, PartialEq, Clone)]
pub enum Outcome {
    Defined(String),
    Declared(String),
    Evaluated(f64),
}

/// Tree-walking evaluator. Every value is an `f64`; a condition is true when
/// it is not `0.0`.
pub struct Interpreter {
    functions: HashMap<String, Callable>,
    named_values: HashMap<String, f64>,
    output: String,
    depth: usize,
    max_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CALL_DEPTH)
    }
}

impl Interpreter {
    pub fn new(max_depth: usize) -> Self {
        Self {
            functions: HashMap::new(),
            named_values: HashMap::new(),
            output: String::new(),
            depth: 0,
            max_depth,
        }
    }

    pub fn run(&mut self, function: &Function) -> Result<Outcome, EvalError> {
        function.accept(self)
    }

    /// Drains whatever `putchard`/`printd` wrote since the last call.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    fn resolve(&self, function: &Function) -> Result<(), EvalError> {
        function.accept(&mut Resolver {
            functions: &self.functions,
            name: function.name(),
            params: function.params(),
        })
    }

    fn eval_in_frame(
        &mut self,
        frame: HashMap<String, f64>,
        body: &Expression,
    ) -> Result<f64, EvalError> {
        let saved = std::mem::replace(&mut self.named_values, frame);
        self.depth += 1;
        let result = body.accept(self);
        self.depth -= 1;
        self.named_values = saved;
        result
    }

    fn declare(&mut self, name: &str, params: &[String]) -> Result<(), EvalError> {
        match self.functions.get(name) {
            Some(Callable::Defined { .. }) => Err(EvalError::Redefinition(name.to_string())),
            Some(existing) if existing.arity() != params.len() => Err(
                EvalError::SignatureMismatch(name.to_string(), existing.arity(), params.len()),
            ),
            Some(_) => Ok(()),
            None => {
                let callable = match NATIVES.get(name) {
                    Some(native) if native.arity != params.len() => {
                        return Err(EvalError::SignatureMismatch(
                            name.to_string(),
                            native.arity,
                            params.len(),
                        ))
                    }
                    Some(native) => Callable::Native(*native),
                    None => Callable::Prototype(params.len()),
                };
                self.functions.insert(name.to_string(), callable);
                Ok(())
            }
        }
    }

    fn define(&mut self, function: &Function, body: &Expression) -> Result<(), EvalError> {
        let (name, params) = (function.name(), function.params());
        match self.functions.get(name) {
            Some(Callable::Prototype(arity)) if *arity != params.len() => {
                return Err(EvalError::SignatureMismatch(name.to_string(), *arity, params.len()))
            }
            Some(Callable::Prototype(_)) | None => (),
            Some(_) => return Err(EvalError::Redefinition(name.to_string())),
        }
        self.resolve(function)?;

        self.functions.insert(
            name.to_string(),
            Callable::Defined {
                params: params.into(),
                body: Rc::new(body.clone()),
            },
        );
        Ok(())
    }
}

impl Visitor for Interpreter {
    type ExprOutput = Result<f64, EvalError>;
    type FunctionOutput = Result<Outcome, EvalError>;

    fn visit_number(&mut self, node: &NumberLiteral) -> Result<f64, EvalError> {
        Ok(node.value)
    }

    fn visit_variable(&mut self, node: &VariableRef) -> Result<f64, EvalError> {
        match self.named_values.get(&node.name) {
            Some(value) => Ok(*value),
            None => Err(EvalError::UnknownVariable(node.name.clone())),
        }
    }

    fn visit_binary(&mut self, node: &BinaryOp) -> Result<f64, EvalError> {
        let lhs = node.left.accept(self)?;
        let rhs = node.right.accept(self)?;

        Ok(match node.operator {
            BinaryOperator::Add => lhs + rhs,
            BinaryOperator::Sub => lhs - rhs,
            BinaryOperator::Mul => lhs * rhs,
            BinaryOperator::Div => lhs / rhs,
            BinaryOperator::Mod => lhs % rhs,
        })
    }

    fn visit_call(&mut self, node: &Call) -> Result<f64, EvalError> {
        let callee = match self.functions.get(&node.callee) {
            Some(callee) => callee.clone(),
            None => return Err(EvalError::UnknownFunction(node.callee.clone())),
        };

        if callee.arity() != node.args.len() {
            return Err(EvalError::InvalidCall(
                node.callee.clone(),
                callee.arity(),
                node.args.len(),
            ));
        }

        let mut args = Vec::with_capacity(node.args.len());
        for arg in &node.args {
            args.push(arg.accept(self)?);
        }

        match callee {
            Callable::Native(native) => Ok((native.call)(&args, &mut self.output)),
            Callable::Prototype(_) => Err(EvalError::UnresolvedExtern(node.callee.clone())),
            Callable::Defined { params, body } => {
                if self.depth >= self.max_depth {
                    return Err(EvalError::CallDepthExceeded(self.max_depth));
                }
                let frame = params.iter().cloned().zip(args).collect();
                self.eval_in_frame(frame, &body)
            }
        }
    }

    fn visit_conditional(&mut self, node: &Conditional) -> Result<f64, EvalError> {
        let condition = node.condition.accept(self)?;
        if condition != 0.0 && !condition.is_nan() {
            node.then_branch.accept(self)
        } else {
            node.else_branch.accept(self)
        }
    }

    fn visit_function(&mut self, node: &Function) -> Result<Outcome, EvalError> {
        let name = node.name().to_string();
        match node.body() {
            Some(body) if node.is_anonymous() => {
                self.resolve(node)?;
                self.eval_in_frame(HashMap::new(), body).map(Outcome::Evaluated)
            }
            Some(body) => self.define(node, body).map(|_| Outcome::Defined(name)),
            None => self
                .declare(&name, node.params())
                .map(|_| Outcome::Declared(name)),
        }
    }
}

/// Checks that a body only names its own parameters and functions that are
/// already known, called with the right number of arguments.
struct Resolver<'a> {
    functions: &'a HashMap<String, Callable>,
    name: &'a str,
    params: &'a [String],
}

impl Visitor for Resolver<'_> {
    type ExprOutput = Result<(), EvalError>;
    type FunctionOutput = Result<(), EvalError>;

    fn visit_number(&mut self, _: &NumberLiteral) -> Result<(), EvalError> {
        Ok(())
    }

    fn visit_variable(&mut self, node: &VariableRef) -> Result<(), EvalError> {
        if self.params.contains(&node.name) {
            Ok(())
        } else {
            Err(EvalError::UnknownVariable(node.name.clone()))
        }
    }

    fn visit_binary(&mut self, node: &BinaryOp) -> Result<(), EvalError> {
        node.left.accept(self)?;
        node.right.accept(self)
    }

    fn visit_call(&mut self, node: &Call) -> Result<(), EvalError> {
        // a function may call itself before it is stored
        let arity = if node.callee == self.name {
            self.params.len()
        } else {
            match self.functions.get(&node.callee) {
                Some(callee) => callee.arity(),
                None => return Err(EvalError::UnknownFunction(node.callee.clone())),
            }
        };
        if arity != node.args.len() {
            return Err(EvalError::InvalidCall(node.callee.clone(), arity, node.args.len()));
        }
        node.args.iter().try_for_each(|arg| arg.accept(self))
    }

    fn visit_conditional(&mut self, node: &Conditional) -> Result<(), EvalError> {
        node.condition.accept(self)?;
        node.then_branch.accept(self)?;
        node.else_branch.accept(self)
    }

    fn visit_function(&mut self, node: &Function) -> Result<(), EvalError> {
        match node.body() {
            Some(body) => body.accept(self),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;
    use pretty_assertions::assert_eq;

    fn run_all(interpreter: &mut Interpreter, source: &str) -> Vec<Result<Outcome, EvalError>> {
        let (functions, errors) = parse_str(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        functions.iter().map(|function| interpreter.run(function)).collect()
    }

    fn eval(source: &str) -> Result<Outcome, EvalError> {
        let mut interpreter = Interpreter::default();
        run_all(&mut interpreter, source)
            .pop()
            .expect("source has at least one item")
    }

    #[test]
    fn evaluates_arithmetic() {
        assert_eq!(eval("1 + 2 * 3"), Ok(Outcome::Evaluated(7.0)));
        assert_eq!(eval("7 % 4"), Ok(Outcome::Evaluated(3.0)));
        assert_eq!(eval("9 / 2"), Ok(Outcome::Evaluated(4.5)));
        // parses as 1 - (2 + 3)
        assert_eq!(eval("1 - 2 + 3"), Ok(Outcome::Evaluated(-4.0)));
    }

    #[test]
    fn defines_and_calls_functions() {
        let mut interpreter = Interpreter::default();
        let outcomes = run_all(&mut interpreter, "def add(a b) a + b; add(2, 3)");
        assert_eq!(
            outcomes,
            vec![Ok(Outcome::Defined("add".to_string())), Ok(Outcome::Evaluated(5.0))]
        );
        assert_eq!(run_all(&mut interpreter, "add(1, 1)"), vec![Ok(Outcome::Evaluated(2.0))]);
    }

    #[test]
    fn recursion_through_conditionals() {
        assert_eq!(
            eval(
                "def fib(n) if n - 1 then if n then fib(n - 1) + fib(n - 2) else 0 else 1; \
                 fib(10)"
            ),
            Ok(Outcome::Evaluated(55.0))
        );
    }

    #[test]
    fn only_the_chosen_branch_runs() {
        assert_eq!(
            eval("extern later(); if 0 then later() else 2"),
            Ok(Outcome::Evaluated(2.0))
        );
        assert_eq!(
            eval("extern later(); if 1 then 1 else later()"),
            Ok(Outcome::Evaluated(1.0))
        );
    }

    #[test]
    fn nan_condition_takes_else_branch() {
        assert_eq!(eval("if 0 / 0 then 1 else 2"), Ok(Outcome::Evaluated(2.0)));
        assert_eq!(eval("if 0 - 1 then 1 else 2"), Ok(Outcome::Evaluated(1.0)));
    }

    #[test]
    fn bodies_are_resolved_when_defined() {
        let mut interpreter = Interpreter::default();
        let outcomes = run_all(
            &mut interpreter,
            "def f(x) y; def g(x) h(x); def one() 1; def k() one(2); f(1)",
        );
        assert_eq!(
            outcomes,
            vec![
                Err(EvalError::UnknownVariable("y".to_string())),
                Err(EvalError::UnknownFunction("h".to_string())),
                Ok(Outcome::Defined("one".to_string())),
                Err(EvalError::InvalidCall("one".to_string(), 0, 2)),
                // a rejected body leaves the name undefined
                Err(EvalError::UnknownFunction("f".to_string())),
            ]
        );
    }

    #[test]
    fn natives_print_into_the_buffer() {
        let mut interpreter = Interpreter::default();
        let outcomes = run_all(
            &mut interpreter,
            "extern printd(x); extern putchard(c); printd(1.5) + putchard(72)",
        );
        assert_eq!(outcomes[2], Ok(Outcome::Evaluated(0.0)));
        assert_eq!(interpreter.take_output(), "1.5\nH");
        assert_eq!(interpreter.take_output(), "");
    }

    #[test]
    fn unknown_names_are_errors() {
        assert_eq!(eval("x"), Err(EvalError::UnknownVariable("x".to_string())));
        assert_eq!(eval("f(1)"), Err(EvalError::UnknownFunction("f".to_string())));
    }

    #[test]
    fn parameters_do_not_leak() {
        assert_eq!(
            eval("def id(x) x; id(1); x"),
            Err(EvalError::UnknownVariable("x".to_string()))
        );
    }

    #[test]
    fn call_arity_is_checked() {
        assert_eq!(
            eval("def f(a b) a; f(1)"),
            Err(EvalError::InvalidCall("f".to_string(), 2, 1))
        );
    }

    #[test]
    fn bodies_cannot_be_redefined() {
        assert_eq!(
            eval("def f(x) x; def f(x) x + 1"),
            Err(EvalError::Redefinition("f".to_string()))
        );
        assert_eq!(
            eval("def f(x) x; extern f(x)"),
            Err(EvalError::Redefinition("f".to_string()))
        );
    }

    #[test]
    fn extern_binds_natives() {
        assert_eq!(eval("extern sqrt(x); sqrt(16)"), Ok(Outcome::Evaluated(4.0)));
        assert_eq!(eval("extern pow(x y); pow(2, 10)"), Ok(Outcome::Evaluated(1024.0)));
        assert_eq!(
            eval("extern sqrt(x y)"),
            Err(EvalError::SignatureMismatch("sqrt".to_string(), 1, 2))
        );
    }

    #[test]
    fn extern_forward_declares() {
        let mut interpreter = Interpreter::default();
        let outcomes = run_all(
            &mut interpreter,
            "extern twice(x); twice(1); def twice(x) x * 2; twice(4)",
        );
        assert_eq!(
            outcomes,
            vec![
                Ok(Outcome::Declared("twice".to_string())),
                Err(EvalError::UnresolvedExtern("twice".to_string())),
                Ok(Outcome::Defined("twice".to_string())),
                Ok(Outcome::Evaluated(8.0)),
            ]
        );
    }

    #[test]
    fn extern_of_unknown_name_is_a_declaration() {
        let mut interpreter = Interpreter::default();
        let outcomes = run_all(&mut interpreter, "extern nosuchfn(x); nosuchfn(1)");
        assert_eq!(
            outcomes,
            vec![
                Ok(Outcome::Declared("nosuchfn".to_string())),
                Err(EvalError::UnresolvedExtern("nosuchfn".to_string())),
            ]
        );
    }

    #[test]
    fn definition_must_match_declaration() {
        assert_eq!(
            eval("extern g(a); def g(a b) a"),
            Err(EvalError::SignatureMismatch("g".to_string(), 1, 2))
        );
    }

    #[test]
    fn runaway_recursion_is_bounded() {
        let mut interpreter = Interpreter::new(16);
        let outcomes = run_all(&mut interpreter, "def loop(x) loop(x + 1); loop(0)");
        assert_eq!(outcomes[1], Err(EvalError::CallDepthExceeded(16)));
        // the interpreter stays usable afterwards
        let outcomes = run_all(&mut interpreter, "def one() 1; one()");
        assert_eq!(outcomes[1], Ok(Outcome::Evaluated(1.0)));
    }
}

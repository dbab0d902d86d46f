//! Tree-walking evaluator
//!
//! Evaluation is async because `delay()` suspends the whole call stack
//! of the sketch. Recursive evaluation goes through boxed futures.

use core::cell::Cell;
use core::future::Future;
use core::pin::Pin;
use std::rc::Rc;

use super::ast::{BinaryOp, Expr, ExprKind, FunctionDecl, LogicalOp, Program, Stmt};
use super::scope::Scope;
use super::value::{self, Closure, Value};
use crate::capabilities::{self, call_method};
use crate::context::RunContext;
use crate::error::{CallError, SimError};

/// Why evaluation stopped early
#[derive(Debug, Clone, PartialEq)]
pub enum Interrupt {
    Fault(SimError),
    /// The run was replaced by a newer one
    Superseded,
}

impl Interrupt {
    fn runtime(line: u32, message: impl Into<String>) -> Self {
        Self::Fault(SimError::runtime(line, message))
    }

    /// Attach the script line to a native failure
    fn from_call(line: u32, error: CallError) -> Self {
        match error {
            CallError::Strip(source) => Self::Fault(SimError::Strip { line, source }),
            CallError::Color(source) => Self::Fault(SimError::Color { line, source }),
            CallError::Type(message) => Self::runtime(line, message),
            CallError::Superseded => Self::Superseded,
        }
    }
}

/// How a statement completed
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

type Eval<'a, T> = Pin<Box<dyn Future<Output = Result<T, Interrupt>> + 'a>>;

/// Deepest nesting of script function calls
const MAX_CALL_DEPTH: u32 = 100;

/// Assignable location
enum Place {
    Var(Rc<str>),
    Element(Value, usize),
}

pub struct Interpreter {
    ctx: RunContext,
    globals: Scope,
    dispatching: Cell<bool>,
    call_depth: Cell<u32>,
}

impl Interpreter {
    /// Interpreter whose global scope holds only the capability set
    pub fn new(ctx: RunContext) -> Self {
        let globals = Scope::new();
        capabilities::install(&globals);
        Self {
            ctx,
            globals,
            dispatching: Cell::new(false),
            call_depth: Cell::new(0),
        }
    }

    pub const fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Evaluate top-level code, binding the sketch's globals and functions
    pub async fn run_program(&self, program: &Program) -> Result<(), Interrupt> {
        match self.exec_block(&program.body, &self.globals).await? {
            Flow::Normal => Ok(()),
            Flow::Return(_) => Err(Interrupt::runtime(0, "return outside of a function")),
            Flow::Break | Flow::Continue => {
                Err(Interrupt::runtime(0, "break or continue outside of a loop"))
            }
        }
    }

    /// A global bound to a function, such as `setup` or `loop`
    pub fn entry_point(&self, name: &str) -> Option<Value> {
        self.globals
            .get(name)
            .filter(|value| matches!(value, Value::Function(_)))
    }

    /// Call a function value with already evaluated arguments
    pub fn call<'a>(&'a self, callee: Value, args: Vec<Value>, line: u32) -> Eval<'a, Value> {
        Box::pin(async move {
            match callee {
                Value::Function(closure) => self.call_closure(&closure, args, line).await,
                Value::Builtin(builtin) => {
                    let result = capabilities::call_builtin(&self.ctx, builtin, &args)
                        .await
                        .map_err(|error| Interrupt::from_call(line, error))?;
                    if builtin.suspends() {
                        self.dispatch_clicks().await?;
                    }
                    Ok(result)
                }
                other => Err(Interrupt::runtime(
                    line,
                    format!("{} is not a function", other.type_name()),
                )),
            }
        })
    }

    async fn call_closure(
        &self,
        closure: &Closure,
        args: Vec<Value>,
        line: u32,
    ) -> Result<Value, Interrupt> {
        let depth = self.call_depth.get();
        if depth >= MAX_CALL_DEPTH {
            return Err(Interrupt::runtime(line, "call stack exhausted"));
        }
        self.call_depth.set(depth + 1);
        let result = self.invoke(closure, args, line).await;
        self.call_depth.set(depth);
        result
    }

    async fn invoke(
        &self,
        closure: &Closure,
        args: Vec<Value>,
        line: u32,
    ) -> Result<Value, Interrupt> {
        let decl: &FunctionDecl = &closure.decl;
        let Some(parent) = closure.scope.upgrade() else {
            return Err(Interrupt::runtime(
                line,
                format!("function {} outlived its scope", decl.name),
            ));
        };
        let scope = parent.child();
        let mut args = args.into_iter();
        for param in &decl.params {
            let value = match (args.next(), &param.default) {
                (Some(value), _) => value,
                (None, Some(default)) => self.eval(default, &scope).await?,
                (None, None) => Value::Undefined,
            };
            scope.declare(param.name.clone(), value);
        }

        match self.exec_block(&decl.body, &scope).await? {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Break | Flow::Continue => Ok(Value::Undefined),
        }
    }

    /// Run the handlers of pending button clicks
    ///
    /// Handlers that delay reach this again; nested calls return at once so
    /// clicks are handled one at a time, in order.
    pub async fn dispatch_clicks(&self) -> Result<(), Interrupt> {
        if self.dispatching.replace(true) {
            return Ok(());
        }
        let result = async {
            while let Some((_, callback)) = self.ctx.next_click() {
                self.ctx
                    .token()
                    .check()
                    .map_err(|error| Interrupt::from_call(0, error))?;
                let line = match &callback {
                    Value::Function(closure) => closure.decl.line,
                    _ => 0,
                };
                self.call(callback, Vec::new(), line).await?;
            }
            Ok::<(), Interrupt>(())
        }
        .await;
        self.dispatching.set(false);
        result
    }

    fn exec_block<'a>(&'a self, body: &'a [Stmt], scope: &'a Scope) -> Eval<'a, Flow> {
        Box::pin(async move {
            // Function declarations are visible in the whole block
            for stmt in body {
                if let Stmt::Function(decl) = stmt {
                    let closure = Closure {
                        decl: decl.clone(),
                        scope: scope.downgrade(),
                    };
                    scope.declare(decl.name.clone(), Value::Function(Rc::new(closure)));
                }
            }
            for stmt in body {
                match self.exec(stmt, scope).await? {
                    Flow::Normal => {}
                    flow => return Ok(flow),
                }
            }
            Ok(Flow::Normal)
        })
    }

    fn exec<'a>(&'a self, stmt: &'a Stmt, scope: &'a Scope) -> Eval<'a, Flow> {
        Box::pin(async move {
            match stmt {
                Stmt::Let { declarators, .. } => {
                    for declarator in declarators {
                        let value = match &declarator.init {
                            Some(init) => self.eval(init, scope).await?,
                            None => Value::Undefined,
                        };
                        scope.declare(declarator.name.clone(), value);
                    }
                    Ok(Flow::Normal)
                }
                Stmt::Function(_) | Stmt::Empty => Ok(Flow::Normal),
                Stmt::Expr(expr) => {
                    self.eval(expr, scope).await?;
                    Ok(Flow::Normal)
                }
                Stmt::Block(body) => {
                    let inner = scope.child();
                    self.exec_block(body, &inner).await
                }
                Stmt::If {
                    test,
                    then,
                    otherwise,
                } => {
                    if self.eval(test, scope).await?.truthy() {
                        self.exec(then, scope).await
                    } else if let Some(otherwise) = otherwise {
                        self.exec(otherwise, scope).await
                    } else {
                        Ok(Flow::Normal)
                    }
                }
                Stmt::While { test, body } => {
                    while self.eval(test, scope).await?.truthy() {
                        match self.exec(body, scope).await? {
                            Flow::Break => break,
                            Flow::Return(value) => return Ok(Flow::Return(value)),
                            Flow::Normal | Flow::Continue => {}
                        }
                    }
                    Ok(Flow::Normal)
                }
                Stmt::DoWhile { body, test } => {
                    loop {
                        match self.exec(body, scope).await? {
                            Flow::Break => break,
                            Flow::Return(value) => return Ok(Flow::Return(value)),
                            Flow::Normal | Flow::Continue => {}
                        }
                        if !self.eval(test, scope).await?.truthy() {
                            break;
                        }
                    }
                    Ok(Flow::Normal)
                }
                Stmt::For {
                    init,
                    test,
                    step,
                    body,
                } => {
                    let scope = &scope.child();
                    if let Some(init) = init {
                        self.exec(init, scope).await?;
                    }
                    loop {
                        if let Some(test) = test
                            && !self.eval(test, scope).await?.truthy()
                        {
                            break;
                        }
                        match self.exec(body, scope).await? {
                            Flow::Break => break,
                            Flow::Return(value) => return Ok(Flow::Return(value)),
                            Flow::Normal | Flow::Continue => {}
                        }
                        for expr in step {
                            self.eval(expr, scope).await?;
                        }
                    }
                    Ok(Flow::Normal)
                }
                Stmt::Switch {
                    discriminant,
                    cases,
                } => {
                    let value = self.eval(discriminant, scope).await?;
                    let mut start = None;
                    for (i, case) in cases.iter().enumerate() {
                        if let Some(test) = &case.test
                            && self.eval(test, scope).await? == value
                        {
                            start = Some(i);
                            break;
                        }
                    }
                    let start =
                        start.or_else(|| cases.iter().position(|case| case.test.is_none()));
                    let Some(start) = start else {
                        return Ok(Flow::Normal);
                    };

                    // Matching case onwards, falling through until `break`
                    let scope = &scope.child();
                    for case in &cases[start..] {
                        match self.exec_block(&case.body, scope).await? {
                            Flow::Normal => {}
                            Flow::Break => return Ok(Flow::Normal),
                            flow => return Ok(flow),
                        }
                    }
                    Ok(Flow::Normal)
                }
                Stmt::Return { value, .. } => {
                    let value = match value {
                        Some(expr) => self.eval(expr, scope).await?,
                        None => Value::Undefined,
                    };
                    Ok(Flow::Return(value))
                }
                Stmt::Break(_) => Ok(Flow::Break),
                Stmt::Continue(_) => Ok(Flow::Continue),
            }
        })
    }

    fn eval<'a>(&'a self, expr: &'a Expr, scope: &'a Scope) -> Eval<'a, Value> {
        Box::pin(async move {
            let line = expr.line;
            let fault = |error| Interrupt::from_call(line, error);
            match &expr.kind {
                ExprKind::Int(n) => Ok(Value::Int(*n)),
                ExprKind::Float(x) => Ok(Value::Float(*x)),
                ExprKind::Str(s) => Ok(Value::Str(s.clone())),
                ExprKind::Bool(b) => Ok(Value::Bool(*b)),
                ExprKind::Undefined => Ok(Value::Undefined),
                ExprKind::Ident(name) => scope
                    .get(name)
                    .ok_or_else(|| Interrupt::runtime(line, format!("`{name}` is not defined"))),
                ExprKind::Array(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        values.push(self.eval(item, scope).await?);
                    }
                    Ok(Value::array(values))
                }
                ExprKind::Unary(op, operand) => {
                    let operand = self.eval(operand, scope).await?;
                    value::unary(*op, &operand).map_err(fault)
                }
                ExprKind::Binary(op, left, right) => {
                    let left = self.eval(left, scope).await?;
                    let right = self.eval(right, scope).await?;
                    value::binary(*op, &left, &right).map_err(fault)
                }
                ExprKind::Logical(op, left, right) => {
                    let left = self.eval(left, scope).await?.truthy();
                    let result = match op {
                        LogicalOp::And if !left => false,
                        LogicalOp::Or if left => true,
                        _ => self.eval(right, scope).await?.truthy(),
                    };
                    Ok(Value::Bool(result))
                }
                ExprKind::Conditional {
                    test,
                    then,
                    otherwise,
                } => {
                    if self.eval(test, scope).await?.truthy() {
                        self.eval(then, scope).await
                    } else {
                        self.eval(otherwise, scope).await
                    }
                }
                ExprKind::Assign { op, target, value } => {
                    let place = self.place(target, scope).await?;
                    let mut result = self.eval(value, scope).await?;
                    if let Some(op) = op {
                        let current = self.read(&place, scope, line)?;
                        result = value::binary(*op, &current, &result).map_err(fault)?;
                    }
                    self.write(&place, scope, result.clone(), line)?;
                    Ok(result)
                }
                ExprKind::Update {
                    increment,
                    prefix,
                    target,
                } => {
                    let place = self.place(target, scope).await?;
                    let current = self.read(&place, scope, line)?;
                    let op = if *increment {
                        BinaryOp::Add
                    } else {
                        BinaryOp::Sub
                    };
                    let updated = value::binary(op, &current, &Value::Int(1)).map_err(fault)?;
                    self.write(&place, scope, updated.clone(), line)?;
                    Ok(if *prefix { updated } else { current })
                }
                ExprKind::Cast(kind, operand) => {
                    let operand = self.eval(operand, scope).await?;
                    value::cast(*kind, &operand).map_err(fault)
                }
                // Calls already run to completion
                ExprKind::Await(operand) => self.eval(operand, scope).await,
                ExprKind::Call { callee, args } => self.eval_call(callee, args, scope, line).await,
                ExprKind::Member { object, name } => {
                    match self.eval(object, scope).await? {
                        Value::Array(items) if name.as_ref() == "length" => {
                            Ok(length_value(items.borrow().len()))
                        }
                        Value::Str(text) if name.as_ref() == "length" => {
                            Ok(length_value(text.len()))
                        }
                        other => Err(Interrupt::runtime(
                            line,
                            format!("cannot read `{name}` of {}", other.type_name()),
                        )),
                    }
                }
                ExprKind::Index { .. } => {
                    let place = self.place(expr, scope).await?;
                    self.read(&place, scope, line)
                }
            }
        })
    }

    async fn eval_call(
        &self,
        callee: &Expr,
        args: &[Expr],
        scope: &Scope,
        line: u32,
    ) -> Result<Value, Interrupt> {
        let method = match &callee.kind {
            ExprKind::Member { object, name } => Some((self.eval(object, scope).await?, name)),
            _ => None,
        };
        let function = match &method {
            Some(_) => None,
            None => Some(self.eval(callee, scope).await?),
        };

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, scope).await?);
        }

        match (method, function) {
            (Some((Value::Object(handle), name)), _) => {
                call_method(&self.ctx, handle, name, &values)
                    .map_err(|error| Interrupt::from_call(line, error))
            }
            (Some((other, name)), _) => Err(Interrupt::runtime(
                line,
                format!("{} has no method `{name}`", other.type_name()),
            )),
            (None, Some(function)) => self.call(function, values, line).await,
            (None, None) => Err(Interrupt::runtime(line, "nothing to call")),
        }
    }

    /// Resolve an assignment target, evaluating its sub-expressions once
    fn place<'a>(&'a self, target: &'a Expr, scope: &'a Scope) -> Eval<'a, Place> {
        Box::pin(async move {
            let line = target.line;
            match &target.kind {
                ExprKind::Ident(name) => Ok(Place::Var(name.clone())),
                ExprKind::Index { object, index } => {
                    let object = self.eval(object, scope).await?;
                    let index = self
                        .eval(index, scope)
                        .await?
                        .as_i64()
                        .map_err(|error| Interrupt::from_call(line, error))?;
                    let Value::Array(items) = &object else {
                        return Err(Interrupt::runtime(
                            line,
                            format!("cannot index {}", object.type_name()),
                        ));
                    };
                    let len = items.borrow().len();
                    match usize::try_from(index) {
                        Ok(index) if index < len => Ok(Place::Element(object, index)),
                        _ => Err(Interrupt::runtime(
                            line,
                            format!("index {index} out of range for array of length {len}"),
                        )),
                    }
                }
                _ => Err(Interrupt::runtime(line, "invalid assignment target")),
            }
        })
    }

    fn read(&self, place: &Place, scope: &Scope, line: u32) -> Result<Value, Interrupt> {
        match place {
            Place::Var(name) => scope
                .get(name)
                .ok_or_else(|| Interrupt::runtime(line, format!("`{name}` is not defined"))),
            Place::Element(Value::Array(items), index) => {
                Ok(items.borrow().get(*index).cloned().unwrap_or_default())
            }
            Place::Element(..) => Err(Interrupt::runtime(line, "invalid element")),
        }
    }

    fn write(&self, place: &Place, scope: &Scope, value: Value, line: u32) -> Result<(), Interrupt> {
        match place {
            Place::Var(name) => {
                if scope.set(name, value) {
                    Ok(())
                } else {
                    Err(Interrupt::runtime(
                        line,
                        format!("assignment to undeclared variable `{name}`"),
                    ))
                }
            }
            Place::Element(Value::Array(items), index) => {
                if let Some(slot) = items.borrow_mut().get_mut(*index) {
                    *slot = value;
                }
                Ok(())
            }
            Place::Element(..) => Err(Interrupt::runtime(line, "invalid element")),
        }
    }
}

fn length_value(len: usize) -> Value {
    Value::Int(i64::try_from(len).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use core::cell::RefCell;
    use std::sync::Arc;

    use embassy_futures::block_on;

    use super::*;
    use crate::channel::ClickChannel;
    use crate::config::SimulatorConfig;
    use crate::context::RunToken;
    use crate::script::parse;
    use crate::{ButtonId, RenderSink, Rgb, StripId};

    #[derive(Default)]
    struct SerialSink {
        lines: Vec<String>,
    }

    impl RenderSink for SerialSink {
        fn reset(&mut self) {}
        fn strip_created(&mut self, _: StripId, _: i64, _: usize) {}
        fn write(&mut self, _: StripId, _: &[Rgb]) {}
        fn button_created(&mut self, _: ButtonId, _: &str) {}
        fn serial(&mut self, line: &str) {
            self.lines.push(line.to_owned());
        }
    }

    /// Run `source` and call its `main()`, returning the printed lines
    fn run(source: &str) -> Result<Vec<String>, Interrupt> {
        let sink = Rc::new(RefCell::new(SerialSink::default()));
        let ctx = RunContext::new(
            &SimulatorConfig::deterministic(1),
            RunToken::new(Rc::new(Cell::new(0)), 0),
            sink.clone(),
            Arc::new(ClickChannel::new()),
        );
        let interpreter = Interpreter::new(ctx);
        let program = parse(source).map_err(|error| Interrupt::Fault(error.into()))?;
        block_on(async {
            interpreter.run_program(&program).await?;
            if let Some(main) = interpreter.entry_point("main") {
                interpreter.call(main, Vec::new(), 0).await?;
            }
            Ok::<_, Interrupt>(())
        })?;
        let lines = sink.borrow().lines.clone();
        Ok(lines)
    }

    #[test]
    fn test_integer_division() {
        let lines = run("async function main() { Serial.println(7 / 2); Serial.println(7.0 / 2); }");
        assert_eq!(lines, Ok(vec!["3".to_owned(), "3.50".to_owned()]));
    }

    #[test]
    fn test_switch_falls_through() {
        let lines = run(r#"
            async function main() {
                let mode = 1;
                switch (mode) {
                    case 0: Serial.println("zero");
                    case 1: Serial.println("one");
                    case 2: Serial.println("two"); break;
                    default: Serial.println("other");
                }
            }
        "#);
        assert_eq!(lines, Ok(vec!["one".to_owned(), "two".to_owned()]));
    }

    #[test]
    fn test_functions_are_hoisted_with_defaults() {
        let lines = run(r"
            async function main() { Serial.println(add(2)); }
            async function add(a, b = 40) { return a + b; }
        ");
        assert_eq!(lines, Ok(vec!["42".to_owned()]));
    }

    #[test]
    fn test_loops_and_arrays() {
        let lines = run(r"
            let values = [1, 2, 3];
            async function main() {
                let sum = 0;
                for (let i = 0; i < values.length; i++) {
                    if (i == 1) continue;
                    sum += values[i];
                }
                let n = 0;
                do { n++; } while (n < 5);
                while (true) { if (n-- == 3) break; }
                Serial.print(sum);
                Serial.println(n);
            }
        ");
        assert_eq!(lines, Ok(vec!["42".to_owned()]));
    }

    #[test]
    fn test_undefined_name_reports_line() {
        let result = run("async function main() {\n  missing();\n}");
        assert_eq!(
            result,
            Err(Interrupt::Fault(SimError::runtime(2, "`missing` is not defined")))
        );
    }

    #[test]
    fn test_recursion_within_the_call_limit() {
        let lines = run(r"
            async function fact(n) { return n <= 1 ? 1 : n * fact(n - 1); }
            async function main() { Serial.println(fact(10)); }
        ");
        assert_eq!(lines, Ok(vec!["3628800".to_owned()]));
    }

    #[test]
    fn test_unbounded_recursion_is_a_runtime_error() {
        let result = run("async function down(n) {\n  return down(n + 1);\n}\nasync function main() { down(0); }");
        assert_eq!(
            result,
            Err(Interrupt::Fault(SimError::runtime(2, "call stack exhausted")))
        );
    }

    #[test]
    fn test_array_index_out_of_range() {
        let result = run("let a = array(2);\nasync function main() { a[2] = 1; }");
        assert!(matches!(
            result,
            Err(Interrupt::Fault(SimError::Runtime { line: 2, .. }))
        ));
    }
}

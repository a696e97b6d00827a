/// Builds the scope forest of a parsed unit.
///
/// The walk visits declarations and statements in source order.  Every
/// function body, method body, closure and arrow function opens a child
/// scope.  Bindings are recorded where variables are introduced:
///
///   - Parameters and `$this` at the start of their scope
///   - Assignments (`$x = …`, `[$a, $b] = …`) once the assignment ends
///   - `foreach` key/value variables at the start of the loop body
///   - `catch` variables at the start of the catch block
///   - `global` / `static` declarations
///   - Closure `use` variables, with the type they have outside
///
/// Assignment types are inferred as the walk goes, so a right-hand side
/// sees exactly the bindings that precede it.
use mago_span::HasSpan;
use mago_syntax::ast::*;

use crate::parser::{hint_text, range_of};
use crate::reflector::{ReflectedUnit, Reflector};
use crate::types::{ClassName, InferredType, OffsetRange, ReflectedClass};

use super::infer::{NameContext, method_return_type, property_type, type_from_hint};
use super::scope::{ScopeForest, ScopeId, ScopeKind};

pub(crate) struct ScopeBuilder<'r> {
    reflector: &'r Reflector,
    unit: &'r ReflectedUnit,
    content: &'r str,
    forest: ScopeForest,
}

/// The class whose code is being walked, if any.
type Frame<'r> = Option<&'r ReflectedClass>;

impl<'r> ScopeBuilder<'r> {
    pub(crate) fn new(reflector: &'r Reflector, unit: &'r ReflectedUnit, content: &'r str) -> Self {
        Self {
            reflector,
            unit,
            content,
            forest: ScopeForest::new(content.len() as u32),
        }
    }

    pub(crate) fn build(mut self, program: &Program<'_>) -> ScopeForest {
        let file = self.forest.file_scope();
        self.statements(program.statements.iter(), file, None);
        self.forest
    }

    fn name_context(&self, frame: Frame<'r>, offset: u32) -> NameContext<'r> {
        match frame {
            Some(class) => NameContext::of_class(class),
            None => {
                let (namespace, imports) = self.unit.name_context(offset);
                NameContext {
                    namespace,
                    imports,
                    self_class: None,
                    static_class: None,
                    parent_class: None,
                }
            }
        }
    }

    fn reflected_class(&self, name_span: OffsetRange) -> Frame<'r> {
        self.unit.classes.iter().find(|c| c.name_span == name_span)
    }

    fn statements<'a>(
        &mut self,
        statements: impl Iterator<Item = &'a Statement<'a>>,
        scope: ScopeId,
        frame: Frame<'r>,
    ) {
        for stmt in statements {
            self.statement(stmt, scope, frame);
        }
    }

    fn statement(&mut self, stmt: &Statement<'_>, scope: ScopeId, frame: Frame<'r>) {
        match stmt {
            Statement::Namespace(ns) => {
                self.statements(ns.statements().iter(), scope, None);
            }
            Statement::Class(class) => {
                let frame = self.reflected_class(range_of(&class.name));
                self.members(class.members.iter(), scope, frame);
            }
            Statement::Interface(iface) => {
                let frame = self.reflected_class(range_of(&iface.name));
                self.members(iface.members.iter(), scope, frame);
            }
            Statement::Trait(trait_def) => {
                let frame = self.reflected_class(range_of(&trait_def.name));
                self.members(trait_def.members.iter(), scope, frame);
            }
            Statement::Enum(enum_def) => {
                self.members(enum_def.members.iter(), scope, None);
            }
            Statement::Function(func) => {
                let range = OffsetRange::new(
                    func.body.left_brace.start.offset,
                    func.body.right_brace.end.offset,
                );
                let inner = self.forest.open(scope, ScopeKind::Function, range);
                self.bind_parameters(&func.parameter_list, inner, range.start, frame);
                self.statements(func.body.statements.iter(), inner, frame);
            }
            Statement::Expression(expr_stmt) => {
                self.expression(expr_stmt.expression, scope, frame);
            }
            Statement::Block(block) => {
                self.statements(block.statements.iter(), scope, frame);
            }
            Statement::If(if_stmt) => {
                self.expression(if_stmt.condition, scope, frame);
                match &if_stmt.body {
                    IfBody::Statement(body) => {
                        self.statement(body.statement, scope, frame);
                        for else_if in body.else_if_clauses.iter() {
                            self.expression(else_if.condition, scope, frame);
                            self.statement(else_if.statement, scope, frame);
                        }
                        if let Some(else_clause) = &body.else_clause {
                            self.statement(else_clause.statement, scope, frame);
                        }
                    }
                    IfBody::ColonDelimited(body) => {
                        self.statements(body.statements.iter(), scope, frame);
                        for else_if in body.else_if_clauses.iter() {
                            self.expression(else_if.condition, scope, frame);
                            self.statements(else_if.statements.iter(), scope, frame);
                        }
                        if let Some(else_clause) = &body.else_clause {
                            self.statements(else_clause.statements.iter(), scope, frame);
                        }
                    }
                }
            }
            Statement::Foreach(foreach) => {
                self.expression(foreach.expression, scope, frame);
                let at = foreach.body.span().start.offset;
                if let Some(key) = foreach.target.key() {
                    self.bind_target(key, scope, at);
                }
                self.bind_target(foreach.target.value(), scope, at);
                self.statements(foreach.body.statements().iter(), scope, frame);
            }
            Statement::For(for_stmt) => {
                for expr in for_stmt
                    .initializations
                    .iter()
                    .chain(for_stmt.conditions.iter())
                    .chain(for_stmt.increments.iter())
                {
                    self.expression(expr, scope, frame);
                }
                match &for_stmt.body {
                    ForBody::Statement(inner) => self.statement(inner, scope, frame),
                    ForBody::ColonDelimited(body) => {
                        self.statements(body.statements.iter(), scope, frame)
                    }
                }
            }
            Statement::While(while_stmt) => {
                self.expression(while_stmt.condition, scope, frame);
                match &while_stmt.body {
                    WhileBody::Statement(inner) => self.statement(inner, scope, frame),
                    WhileBody::ColonDelimited(body) => {
                        self.statements(body.statements.iter(), scope, frame)
                    }
                }
            }
            Statement::DoWhile(dw) => {
                self.statement(dw.statement, scope, frame);
                self.expression(dw.condition, scope, frame);
            }
            Statement::Unset(unset) => {
                for value in unset.values.iter() {
                    self.expression(value, scope, frame);
                }
            }
            Statement::Try(try_stmt) => {
                self.statements(try_stmt.block.statements.iter(), scope, frame);
                for catch in try_stmt.catch_clauses.iter() {
                    if let Some(ref var) = catch.variable {
                        // Multi-catch hints are unions and resolve to Unknown.
                        let at = catch.block.left_brace.start.offset;
                        let hint = hint_text(&catch.hint, self.content);
                        let ty = type_from_hint(&hint, &self.name_context(frame, at));
                        self.forest.bind(scope, var.name, at, ty);
                    }
                    self.statements(catch.block.statements.iter(), scope, frame);
                }
                if let Some(finally) = &try_stmt.finally_clause {
                    self.statements(finally.block.statements.iter(), scope, frame);
                }
            }
            Statement::Global(global) => {
                let at = stmt.span().end.offset;
                for var in global.variables.iter() {
                    if let Variable::Direct(dv) = var {
                        self.forest.bind(scope, dv.name, at, InferredType::Unknown);
                    }
                }
            }
            Statement::Static(static_stmt) => {
                let at = stmt.span().end.offset;
                for item in static_stmt.items.iter() {
                    self.forest
                        .bind(scope, item.variable().name, at, InferredType::Unknown);
                }
            }
            Statement::Return(ret) => {
                if let Some(expr) = ret.value {
                    self.expression(expr, scope, frame);
                }
            }
            Statement::Echo(echo) => {
                for expr in echo.values.iter() {
                    self.expression(expr, scope, frame);
                }
            }
            Statement::Switch(switch) => {
                self.expression(switch.expression, scope, frame);
                match &switch.body {
                    SwitchBody::BraceDelimited(body) => {
                        for case in body.cases.iter() {
                            self.statements(case.statements().iter(), scope, frame);
                        }
                    }
                    SwitchBody::ColonDelimited(body) => {
                        for case in body.cases.iter() {
                            self.statements(case.statements().iter(), scope, frame);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn members<'a>(
        &mut self,
        members: impl Iterator<Item = &'a ClassLikeMember<'a>>,
        scope: ScopeId,
        frame: Frame<'r>,
    ) {
        for member in members {
            let ClassLikeMember::Method(method) = member else {
                continue;
            };
            let MethodBody::Concrete(block) = &method.body else {
                continue;
            };

            let range = OffsetRange::new(
                block.left_brace.start.offset,
                block.right_brace.end.offset,
            );
            let inner = self.forest.open(scope, ScopeKind::Method, range);

            let is_static = method
                .modifiers
                .iter()
                .any(|m| matches!(m, Modifier::Static(_)));
            if !is_static && let Some(class) = frame {
                self.forest.bind(
                    inner,
                    "$this",
                    range.start,
                    InferredType::Class(class.name.clone()),
                );
            }
            self.bind_parameters(&method.parameter_list, inner, range.start, frame);
            self.statements(block.statements.iter(), inner, frame);
        }
    }

    fn bind_parameters(
        &mut self,
        parameter_list: &FunctionLikeParameterList<'_>,
        scope: ScopeId,
        at: u32,
        frame: Frame<'r>,
    ) {
        let ctx = self.name_context(frame, at);
        for param in parameter_list.parameters.iter() {
            let ty = if param.ellipsis.is_some() {
                InferredType::Scalar("array".to_string())
            } else {
                param
                    .hint
                    .as_ref()
                    .map(|h| type_from_hint(&hint_text(h, self.content), &ctx))
                    .unwrap_or_default()
            };
            self.forest.bind(scope, param.variable.name, at, ty);
        }
    }

    /// Bind every variable in an assignment target with an unknown type.
    fn bind_target(&mut self, target: &Expression<'_>, scope: ScopeId, at: u32) {
        match target {
            Expression::Variable(Variable::Direct(dv)) => {
                self.forest.bind(scope, dv.name, at, InferredType::Unknown);
            }
            Expression::List(list) => {
                for element in list.elements.iter() {
                    self.bind_element(element, scope, at);
                }
            }
            Expression::Array(arr) => {
                for element in arr.elements.iter() {
                    self.bind_element(element, scope, at);
                }
            }
            _ => {}
        }
    }

    fn bind_element(&mut self, element: &ArrayElement<'_>, scope: ScopeId, at: u32) {
        match element {
            ArrayElement::KeyValue(kv) => self.bind_target(kv.value, scope, at),
            ArrayElement::Value(val) => self.bind_target(val.value, scope, at),
            _ => {}
        }
    }

    /// Record bindings made by an expression and open scopes for any
    /// closures inside it.
    fn expression(&mut self, expr: &Expression<'_>, scope: ScopeId, frame: Frame<'r>) {
        match expr {
            Expression::Assignment(assignment) => {
                self.expression(assignment.rhs, scope, frame);
                let at = assignment.span().end.offset;
                match assignment.lhs {
                    Expression::Variable(Variable::Direct(dv)) => {
                        let ty = self.infer(assignment.rhs, scope, frame);
                        self.forest.bind(scope, dv.name, at, ty);
                    }
                    lhs => self.bind_target(lhs, scope, at),
                }
            }
            Expression::Closure(closure) => {
                let range = OffsetRange::new(
                    closure.body.left_brace.start.offset,
                    closure.body.right_brace.end.offset,
                );
                let inner = self.forest.open(scope, ScopeKind::Closure, range);
                self.bind_parameters(&closure.parameter_list, inner, range.start, frame);
                if let Some(ref use_clause) = closure.use_clause {
                    let outside = closure.span().start.offset;
                    for use_var in use_clause.variables.iter() {
                        let name = use_var.variable.name;
                        let ty = self.forest.lookup(scope, name, outside);
                        self.forest.bind(inner, name, range.start, ty);
                    }
                }
                self.statements(closure.body.statements.iter(), inner, frame);
            }
            Expression::ArrowFunction(arrow) => {
                let range = range_of(arrow);
                let inner = self.forest.open(scope, ScopeKind::ArrowFunction, range);
                self.bind_parameters(&arrow.parameter_list, inner, range.start, frame);
                self.expression(arrow.expression, inner, frame);
            }
            Expression::Parenthesized(p) => self.expression(p.expression, scope, frame),
            Expression::Binary(bin) => {
                self.expression(bin.lhs, scope, frame);
                self.expression(bin.rhs, scope, frame);
            }
            Expression::Call(call) => match call {
                Call::Function(fc) => self.arguments(&fc.argument_list, scope, frame),
                Call::Method(mc) => {
                    self.expression(mc.object, scope, frame);
                    self.arguments(&mc.argument_list, scope, frame);
                }
                Call::NullSafeMethod(mc) => {
                    self.expression(mc.object, scope, frame);
                    self.arguments(&mc.argument_list, scope, frame);
                }
                Call::StaticMethod(sc) => self.arguments(&sc.argument_list, scope, frame),
            },
            Expression::Instantiation(inst) => {
                if let Some(ref args) = inst.argument_list {
                    self.arguments(args, scope, frame);
                }
            }
            Expression::Array(arr) => {
                for element in arr.elements.iter() {
                    self.element(element, scope, frame);
                }
            }
            Expression::LegacyArray(arr) => {
                for element in arr.elements.iter() {
                    self.element(element, scope, frame);
                }
            }
            Expression::Access(Access::Property(pa)) => self.expression(pa.object, scope, frame),
            Expression::Access(Access::NullSafeProperty(pa)) => {
                self.expression(pa.object, scope, frame)
            }
            Expression::Clone(c) => self.expression(c.object, scope, frame),
            Expression::Conditional(cond) => {
                self.expression(cond.condition, scope, frame);
                if let Some(then) = cond.then {
                    self.expression(then, scope, frame);
                }
                self.expression(cond.r#else, scope, frame);
            }
            Expression::Match(m) => {
                self.expression(m.expression, scope, frame);
                for arm in m.arms.iter() {
                    if let MatchArm::Expression(arm) = arm {
                        for condition in arm.conditions.iter() {
                            self.expression(condition, scope, frame);
                        }
                    }
                    self.expression(arm.expression(), scope, frame);
                }
            }
            Expression::UnaryPrefix(u) => self.expression(u.operand, scope, frame),
            Expression::UnaryPostfix(u) => self.expression(u.operand, scope, frame),
            Expression::Throw(t) => self.expression(t.exception, scope, frame),
            Expression::Yield(y) => match y {
                Yield::Value(yv) => {
                    if let Some(value) = yv.value {
                        self.expression(value, scope, frame);
                    }
                }
                Yield::Pair(yp) => {
                    self.expression(yp.key, scope, frame);
                    self.expression(yp.value, scope, frame);
                }
                Yield::From(yf) => self.expression(yf.iterator, scope, frame),
            },
            Expression::Construct(Construct::Print(print)) => {
                self.expression(print.value, scope, frame)
            }
            Expression::ArrayAccess(aa) => {
                self.expression(aa.array, scope, frame);
                self.expression(aa.index, scope, frame);
            }
            Expression::Pipe(pipe) => {
                self.expression(pipe.input, scope, frame);
                self.expression(pipe.callable, scope, frame);
            }
            _ => {}
        }
    }

    fn arguments(&mut self, args: &ArgumentList<'_>, scope: ScopeId, frame: Frame<'r>) {
        for arg in args.arguments.iter() {
            let value = match arg {
                Argument::Positional(pos) => pos.value,
                Argument::Named(named) => named.value,
            };
            self.expression(value, scope, frame);
        }
    }

    fn element(&mut self, element: &ArrayElement<'_>, scope: ScopeId, frame: Frame<'r>) {
        match element {
            ArrayElement::KeyValue(kv) => {
                self.expression(kv.key, scope, frame);
                self.expression(kv.value, scope, frame);
            }
            ArrayElement::Value(v) => self.expression(v.value, scope, frame),
            ArrayElement::Variadic(v) => self.expression(v.value, scope, frame),
            _ => {}
        }
    }

    /// Infer the type of an expression from the bindings recorded so far.
    fn infer(&self, expr: &Expression<'_>, scope: ScopeId, frame: Frame<'r>) -> InferredType {
        let at = expr.span().start.offset;
        match expr {
            Expression::Variable(Variable::Direct(dv)) => self.forest.lookup(scope, dv.name, at),
            Expression::Instantiation(inst) => self.class_reference(inst.class, frame, at),
            Expression::Access(Access::Property(pa)) => {
                let receiver = self.infer(pa.object, scope, frame);
                self.fetch_property(&receiver, &pa.property)
            }
            Expression::Access(Access::NullSafeProperty(pa)) => {
                let receiver = self.infer(pa.object, scope, frame);
                self.fetch_property(&receiver, &pa.property)
            }
            Expression::Call(Call::Method(mc)) => {
                let receiver = self.infer(mc.object, scope, frame);
                self.call_method(&receiver, &mc.method)
            }
            Expression::Call(Call::NullSafeMethod(mc)) => {
                let receiver = self.infer(mc.object, scope, frame);
                self.call_method(&receiver, &mc.method)
            }
            Expression::Call(Call::StaticMethod(sc)) => {
                let class = self.class_reference(sc.class, frame, at);
                self.call_method(&class, &sc.method)
            }
            Expression::Literal(Literal::String(_)) => InferredType::Scalar("string".to_string()),
            Expression::Literal(Literal::Integer(_)) => InferredType::Scalar("int".to_string()),
            Expression::Literal(Literal::Float(_)) => InferredType::Scalar("float".to_string()),
            Expression::Array(_) | Expression::LegacyArray(_) => {
                InferredType::Scalar("array".to_string())
            }
            Expression::Parenthesized(p) => self.infer(p.expression, scope, frame),
            Expression::Clone(c) => self.infer(c.object, scope, frame),
            _ => InferredType::Unknown,
        }
    }

    /// The class named by `new X`, `X::m()`, `self`, `static` or `parent`.
    fn class_reference(&self, class: &Expression<'_>, frame: Frame<'r>, at: u32) -> InferredType {
        let ctx = self.name_context(frame, at);
        match class {
            Expression::Identifier(ident) => type_from_hint(ident.value(), &ctx),
            Expression::Self_(_) => type_from_hint("self", &ctx),
            Expression::Static(_) => type_from_hint("static", &ctx),
            Expression::Parent(_) => type_from_hint("parent", &ctx),
            _ => InferredType::Unknown,
        }
    }

    fn fetch_property(
        &self,
        receiver: &InferredType,
        selector: &ClassLikeMemberSelector<'_>,
    ) -> InferredType {
        match (receiver.class_name(), selector) {
            (Some(class), ClassLikeMemberSelector::Identifier(ident)) => {
                self.property_type(class, ident.value)
            }
            _ => InferredType::Unknown,
        }
    }

    fn call_method(
        &self,
        receiver: &InferredType,
        selector: &ClassLikeMemberSelector<'_>,
    ) -> InferredType {
        match (receiver.class_name(), selector) {
            (Some(class), ClassLikeMemberSelector::Identifier(ident)) => {
                method_return_type(self.reflector, class, ident.value, Some(self.unit))
            }
            _ => InferredType::Unknown,
        }
    }

    fn property_type(&self, class: &ClassName, name: &str) -> InferredType {
        property_type(self.reflector, class, name, Some(self.unit))
    }
}

//! The semantic actions a parser calls while it walks a Cog source file.
//!
//! A [`CompilationUnit`] owns everything needed to compile one file: the
//! backend being emitted into, the type registry, the scope stack and the
//! collected diagnostics. Top level statements are emitted into an implicit
//! entry function (`_start` by default).

use num_bigint::BigInt;

use crate::{
    backend::{Backend, BlockRef, FunctionRef, ValueRef},
    diagnostics::{Boundary, Diagnostics, Position, SemanticError, Severity, internal_inconsistency},
    intern::InternedSymbol,
    middle::{
        conversion,
        literal::{Literal, LiteralError},
        primitive::{PrimitiveError, PrimitiveType},
        registry::{ResolveError, TypeRegistry},
        scope::{LoopHeader, ScopeKind, ScopeStack, SymbolId},
        ty::{CompositeId, CompositeType, Declaration, Typename},
    },
};

/// How implicit conversions that lose precision are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LossyConversion {
    #[default]
    Warn,
    Deny,
}

#[derive(Debug, Clone)]
pub struct UnitOptions {
    /// Name of the function top level statements are emitted into
    pub entry_point: String,
    pub lossy_conversion: LossyConversion,
}

impl Default for UnitOptions {
    fn default() -> Self {
        Self {
            entry_point: "_start".to_string(),
            lossy_conversion: LossyConversion::default(),
        }
    }
}

/// The result of an expression: its type, the value holding it (`None` for
/// void and for expressions that failed to type check) and the symbol it was
/// read from, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprResult {
    pub ty: Typename,
    pub value: Option<ValueRef>,
    pub symbol: Option<SymbolId>,
}

impl ExprResult {
    pub const UNSET: Self = Self {
        ty: Typename::UNSET,
        value: None,
        symbol: None,
    };

    pub fn new(ty: Typename, value: Option<ValueRef>) -> Self {
        Self {
            ty,
            value,
            symbol: None,
        }
    }

    pub fn is_unset(&self) -> bool {
        self.ty.is_unset()
    }
}

#[derive(Debug)]
struct FunctionContext {
    handle: FunctionRef,
    return_type: Typename,
    /// Where the enclosing function was emitting before this body started
    saved_insertion_point: Option<BlockRef>,
    construct_depth: usize,
}

#[derive(Debug)]
enum Construct {
    If { has_else: bool },
    While { header: LoopHeader, exit: Option<BlockRef> },
}

#[derive(Debug)]
pub struct CompilationUnit<B: Backend> {
    pub(crate) backend: B,
    pub(crate) registry: TypeRegistry,
    pub(crate) scopes: ScopeStack,
    pub(crate) diagnostics: Diagnostics,
    options: UnitOptions,
    functions: Vec<FunctionContext>,
    constructs: Vec<Construct>,
}

impl<B: Backend> CompilationUnit<B> {
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, UnitOptions::default())
    }

    pub fn with_options(mut backend: B, options: UnitOptions) -> Self {
        let mut registry = TypeRegistry::new();

        let entry = registry.intern(
            &mut backend,
            CompositeType::function(&options.entry_point, vec![], Typename::VOID, Typename::VOID),
        );
        registry.mark_defined(entry);

        let Some(handle) = registry.function_handle(entry) else {
            internal_inconsistency("entry point was not declared as a function");
        };

        let block = backend.create_block(handle, "entry");
        backend.set_insertion_point(block);

        let mut scopes = ScopeStack::new();
        scopes.push_function(block);

        log::debug!("starting unit with entry point {}", options.entry_point);

        Self {
            backend,
            registry,
            scopes,
            diagnostics: Diagnostics::new(),
            options,
            functions: vec![FunctionContext {
                handle,
                return_type: Typename::VOID,
                saved_insertion_point: None,
                construct_depth: 0,
            }],
            constructs: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn entry_function(&self) -> FunctionRef {
        self.functions[0].handle
    }

    /// Name of a type for diagnostics
    pub fn type_name(&self, ty: Typename) -> String {
        ty.name(&self.registry)
    }

    fn current_function(&self) -> &FunctionContext {
        match self.functions.last() {
            Some(function) => function,
            None => internal_inconsistency("no function is being compiled"),
        }
    }

    #[track_caller]
    pub(crate) fn report(&mut self, error: SemanticError, position: Position) {
        self.diagnostics.error(error, position);
    }

    fn report_lossy(&mut self, from: Typename, to: Typename, bits: u32, position: Position) {
        let error = SemanticError::LossyConversion {
            from: self.type_name(from),
            to: self.type_name(to),
            bits,
        };

        let severity = match self.options.lossy_conversion {
            LossyConversion::Warn => Severity::Warning,
            LossyConversion::Deny => Severity::Error,
        };

        self.diagnostics.push(error, severity, position);
    }

    fn new_block(&mut self, label: &str) -> BlockRef {
        let function = self.current_function().handle;
        self.backend.create_block(function, label)
    }

    /// Converts `expr` to `expected`, reporting when that isn't allowed
    /// implicitly. Returns `None` when no converted value could be produced.
    pub(crate) fn coerce(
        &mut self,
        expr: ExprResult,
        expected: Typename,
        boundary: Boundary,
        position: Position,
    ) -> Option<ValueRef> {
        if expr.is_unset() || expected.is_unset() {
            return None;
        }

        if expr.ty.is_void() {
            self.report(
                SemanticError::InvalidType {
                    ty: self.type_name(expr.ty),
                    reason: format!("{} needs a value", boundary.usage()),
                },
                position,
            );
            return None;
        }

        if expr.ty == expected {
            return expr.value;
        }

        if expr.ty.as_primitive().is_none() || expected.as_primitive().is_none() {
            self.report(
                SemanticError::UnsupportedPromotion {
                    ty: self.type_name(expr.ty),
                    usage: format!("{} expecting {}", boundary.usage(), self.type_name(expected)),
                },
                position,
            );
            return None;
        }

        match conversion::distance(&self.registry, expr.ty, expected) {
            Some(bits) => {
                if bits > 0 {
                    self.report_lossy(expr.ty, expected, bits, position);
                }

                let value = expr.value?;
                Some(conversion::cast(&mut self.backend, value, expr.ty, expected))
            }
            None => {
                self.report(
                    SemanticError::TypeMismatch {
                        boundary,
                        expected: self.type_name(expected),
                        actual: self.type_name(expr.ty),
                    },
                    position,
                );
                None
            }
        }
    }

    /// Brings two operands to a common type by converting whichever side
    /// converts more cheaply, the left one on a tie
    pub(crate) fn unify(
        &mut self,
        lhs: ExprResult,
        rhs: ExprResult,
        position: Position,
    ) -> Option<(Typename, ValueRef, ValueRef)> {
        if lhs.is_unset() || rhs.is_unset() {
            return None;
        }

        for operand in [lhs, rhs] {
            if operand.ty.is_void() {
                self.report(
                    SemanticError::InvalidType {
                        ty: self.type_name(operand.ty),
                        reason: "a binary operation needs a value".to_string(),
                    },
                    position,
                );
                return None;
            }
        }

        let (left, right) = (lhs.value?, rhs.value?);

        if lhs.ty == rhs.ty {
            return Some((lhs.ty, left, right));
        }

        if let Some(composite) = [lhs.ty, rhs.ty].into_iter().find(|ty| ty.as_primitive().is_none()) {
            self.report(
                SemanticError::UnsupportedPromotion {
                    ty: self.type_name(composite),
                    usage: Boundary::BinaryOperation.usage().to_string(),
                },
                position,
            );
            return None;
        }

        let left_to_right = conversion::distance(&self.registry, lhs.ty, rhs.ty);
        let right_to_left = conversion::distance(&self.registry, rhs.ty, lhs.ty);

        let convert_left = match (left_to_right, right_to_left) {
            (Some(l), Some(r)) => l <= r,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => {
                self.report(
                    SemanticError::TypeMismatch {
                        boundary: Boundary::BinaryOperation,
                        expected: self.type_name(lhs.ty),
                        actual: self.type_name(rhs.ty),
                    },
                    position,
                );
                return None;
            }
        };

        if convert_left {
            let bits = left_to_right.unwrap_or_default();
            if bits > 0 {
                self.report_lossy(lhs.ty, rhs.ty, bits, position);
            }

            let left = conversion::cast(&mut self.backend, left, lhs.ty, rhs.ty);
            Some((rhs.ty, left, right))
        } else {
            let bits = right_to_left.unwrap_or_default();
            if bits > 0 {
                self.report_lossy(rhs.ty, lhs.ty, bits, position);
            }

            let right = conversion::cast(&mut self.backend, right, rhs.ty, lhs.ty);
            Some((lhs.ty, left, right))
        }
    }

    pub fn literal(&mut self, text: &str, position: Position) -> ExprResult {
        match Literal::parse(text) {
            Ok(Literal::Boolean(value)) => {
                let constant = self
                    .backend
                    .constant_u64(PrimitiveType::BOOLEAN.raw_type(), value.into());

                ExprResult::new(Typename::BOOLEAN, Some(constant))
            }
            Ok(Literal::Numeric(numeric)) => {
                if numeric.inexact {
                    self.diagnostics.warning(
                        SemanticError::InexactLiteral {
                            text: text.to_string(),
                        },
                        position,
                    );
                }

                let ty = numeric.ty();
                let constant = self
                    .backend
                    .constant_int(ty.raw_type(), &BigInt::from(numeric.mantissa));

                ExprResult::new(ty.into(), Some(constant))
            }
            Err(error) => {
                self.report_invalid_literal(text, error, position);
                ExprResult::UNSET
            }
        }
    }

    fn report_invalid_literal(&mut self, text: &str, error: LiteralError, position: Position) {
        self.report(
            SemanticError::InvalidType {
                ty: text.to_string(),
                reason: error.to_string(),
            },
            position,
        );
    }

    /// Resolves a type name. A trailing `@` adds a level of pointer
    /// indirection.
    pub fn typename(&mut self, text: &str, position: Position) -> Typename {
        let base = text.trim_end_matches('@');
        let pointer_count = (text.len() - base.len()) as u32;

        let kind = match base.parse::<PrimitiveType>() {
            Ok(primitive) => Typename::primitive(primitive).kind,
            Err(PrimitiveError::UnknownName(_)) => match self.registry.find_structure(base) {
                Some(id) => Typename::composite(id).kind,
                None => {
                    self.report(
                        SemanticError::UndefinedType {
                            name: base.to_string(),
                        },
                        position,
                    );
                    return Typename::UNSET;
                }
            },
            Err(error) => {
                self.report(
                    SemanticError::InvalidType {
                        ty: base.to_string(),
                        reason: error.to_string(),
                    },
                    position,
                );
                return Typename::UNSET;
            }
        };

        Typename {
            kind,
            pointer_count,
        }
    }

    pub fn identifier(&mut self, name: &str, position: Position) -> ExprResult {
        let Some(id) = self.scopes.lookup(InternedSymbol::new(name)) else {
            self.report(
                SemanticError::UndefinedVariable {
                    name: name.to_string(),
                },
                position,
            );
            return ExprResult::UNSET;
        };

        ExprResult {
            ty: self.scopes.symbol(id).ty,
            value: Some(self.scopes.read(id)),
            symbol: Some(id),
        }
    }

    /// An explicit conversion. Unlike implicit ones it may lose range or
    /// change signedness.
    pub fn cast_to(&mut self, expr: ExprResult, ty: Typename, position: Position) -> ExprResult {
        if expr.is_unset() || ty.is_unset() {
            return ExprResult::UNSET;
        }

        if expr.ty == ty {
            return ExprResult::new(ty, expr.value);
        }

        match (expr.ty.as_primitive(), ty.as_primitive(), expr.value) {
            (Some(from), Some(to), Some(value)) if !from.is_void() && !to.is_void() => {
                let value = conversion::cast_primitive(&mut self.backend, value, from, to);
                ExprResult::new(ty, Some(value))
            }
            (Some(from), Some(to), _) if from.is_void() || to.is_void() => {
                self.report(
                    SemanticError::InvalidType {
                        ty: PrimitiveType::VOID.to_string(),
                        reason: "void values cannot be cast".to_string(),
                    },
                    position,
                );
                ExprResult::UNSET
            }
            _ => {
                self.report(
                    SemanticError::TypeMismatch {
                        boundary: Boundary::Cast,
                        expected: self.type_name(ty),
                        actual: self.type_name(expr.ty),
                    },
                    position,
                );
                ExprResult::UNSET
            }
        }
    }

    pub fn declare_symbol(
        &mut self,
        ty: Typename,
        name: &str,
        initializer: Option<ExprResult>,
        position: Position,
    ) -> Option<SymbolId> {
        let ty = if ty.is_void() {
            self.report(
                SemanticError::InvalidType {
                    ty: self.type_name(ty),
                    reason: format!("variable `{name}` cannot have type void"),
                },
                position,
            );
            // Still declared so later uses don't report it as undefined
            Typename::UNSET
        } else {
            ty
        };

        let raw = self.registry.raw_type(ty);

        let value = initializer
            .and_then(|init| self.coerce(init, ty, Boundary::Initializer, position))
            .unwrap_or_else(|| self.backend.undefined_value(raw));

        match self.scopes.declare(InternedSymbol::new(name), ty, raw, value) {
            Ok(id) => Some(id),
            Err(error) => {
                self.report(error, position);
                None
            }
        }
    }

    pub fn assign_symbol(&mut self, name: &str, value: ExprResult, position: Position) {
        let Some(id) = self.scopes.lookup(InternedSymbol::new(name)) else {
            self.report(
                SemanticError::UndefinedVariable {
                    name: name.to_string(),
                },
                position,
            );
            return;
        };

        let ty = self.scopes.symbol(id).ty;

        // A failed conversion leaves the symbol's previous value in place
        if let Some(value) = self.coerce(value, ty, Boundary::Assignment, position) {
            self.scopes.assign(id, value);
        }
    }

    pub fn declare_structure(&mut self, name: &str, members: Vec<Declaration>, position: Position) -> Typename {
        if members.iter().any(|m| m.ty.is_unset()) {
            return Typename::UNSET;
        }

        if let Some(member) = members.iter().find(|m| m.ty.is_void()) {
            self.report(
                SemanticError::InvalidType {
                    ty: self.type_name(member.ty),
                    reason: format!("member `{}` of `{name}` cannot have type void", member.name),
                },
                position,
            );
            return Typename::UNSET;
        }

        let candidate = CompositeType::structure(name, members);

        if let Some(existing) = self.registry.find_structure(name) {
            if *self.registry.composite(existing) == candidate {
                return Typename::composite(existing);
            }

            self.report(
                SemanticError::AlreadyDeclared {
                    name: name.to_string(),
                },
                position,
            );
            return Typename::UNSET;
        }

        Typename::composite(self.registry.intern(&mut self.backend, candidate))
    }

    pub fn declare_function(
        &mut self,
        name: &str,
        parameters: Vec<Declaration>,
        return_type: Typename,
        receiver: Typename,
        position: Position,
    ) -> Option<CompositeId> {
        if return_type.is_unset() || receiver.is_unset() || parameters.iter().any(|p| p.ty.is_unset()) {
            return None;
        }

        if let Some(parameter) = parameters.iter().find(|p| p.ty.is_void()) {
            self.report(
                SemanticError::InvalidType {
                    ty: self.type_name(parameter.ty),
                    reason: format!("parameter `{}` of `{name}` cannot have type void", parameter.name),
                },
                position,
            );
            return None;
        }

        let candidate = CompositeType::function(name, parameters, return_type, receiver);
        Some(self.registry.intern(&mut self.backend, candidate))
    }

    /// Starts emitting the body of a declared function. Statements go into it
    /// until the matching [`CompilationUnit::end_function`].
    pub fn begin_function(&mut self, id: CompositeId, position: Position) {
        let CompositeType::Function {
            parameters,
            return_type,
            receiver,
            ..
        } = self.registry.composite(id).clone()
        else {
            internal_inconsistency("began a function body for a structure type");
        };

        let Some(handle) = self.registry.function_handle(id) else {
            internal_inconsistency("function type has no backend function");
        };

        if self.registry.mark_defined(id) {
            self.report(
                SemanticError::AlreadyDeclared {
                    name: self.registry.composite(id).name(&self.registry),
                },
                position,
            );
        }

        let saved_insertion_point = self.backend.insertion_point();
        let entry = self.backend.create_block(handle, "entry");
        self.backend.set_insertion_point(entry);
        self.scopes.push_function(entry);

        let receiver = (!receiver.is_void()).then(|| Declaration::new(receiver, "self"));

        for (index, parameter) in receiver.into_iter().chain(parameters).enumerate() {
            let value = self.backend.function_parameter(handle, index);
            let raw = self.registry.raw_type(parameter.ty);

            if let Err(error) = self.scopes.declare(parameter.name, parameter.ty, raw, value) {
                self.report(error, position);
            }
        }

        self.functions.push(FunctionContext {
            handle,
            return_type,
            saved_insertion_point,
            construct_depth: self.constructs.len(),
        });
    }

    pub fn end_function(&mut self, position: Position) {
        if self.functions.len() < 2 {
            internal_inconsistency("ended a function body that was never begun");
        }

        if self.constructs.len() != self.current_function().construct_depth {
            internal_inconsistency("ended a function body inside an open if or while");
        }

        self.terminate_function(position);
        self.scopes.pop_function();

        if let Some(function) = self.functions.pop()
            && let Some(block) = function.saved_insertion_point
        {
            self.backend.set_insertion_point(block);
        }
    }

    /// Ends the current path of the function being compiled: an implicit
    /// return for void functions, `unreachable` otherwise
    fn terminate_function(&mut self, position: Position) {
        let block = self.scopes.current_block();

        if self.backend.is_terminated(block) {
            return;
        }

        self.backend.set_insertion_point(block);

        let return_type = self.current_function().return_type;

        if !self.scopes.is_live() {
            self.backend.emit_unreachable();
        } else if return_type.is_void() || return_type.is_unset() {
            self.backend.emit_return(None);
        } else {
            self.report(
                SemanticError::TypeMismatch {
                    boundary: Boundary::Return,
                    expected: self.type_name(return_type),
                    actual: PrimitiveType::VOID.to_string(),
                },
                position,
            );
            self.backend.emit_unreachable();
        }
    }

    pub fn call(&mut self, name: &str, arguments: Vec<ExprResult>, position: Position) -> ExprResult {
        if arguments.iter().any(ExprResult::is_unset) {
            return ExprResult::UNSET;
        }

        let types = arguments.iter().map(|a| a.ty).collect::<Vec<_>>();
        let resolution = self.registry.resolve_call(name, &types);

        self.finish_call(resolution, None, name, arguments, position)
    }

    /// A call to a function declared with a receiver, which is passed as the
    /// first argument
    pub fn call_method(
        &mut self,
        receiver: ExprResult,
        name: &str,
        arguments: Vec<ExprResult>,
        position: Position,
    ) -> ExprResult {
        if receiver.is_unset() || arguments.iter().any(ExprResult::is_unset) {
            return ExprResult::UNSET;
        }

        let types = arguments.iter().map(|a| a.ty).collect::<Vec<_>>();
        let resolution = self.registry.resolve_method_call(&receiver.ty, name, &types);

        self.finish_call(resolution, Some(receiver), name, arguments, position)
    }

    fn call_signature(&self, receiver: Option<&ExprResult>, name: &str, arguments: &[ExprResult]) -> String {
        let receiver = receiver
            .map(|r| format!("{}::", self.type_name(r.ty)))
            .unwrap_or_default();

        let arguments = arguments
            .iter()
            .map(|a| self.type_name(a.ty))
            .collect::<Vec<_>>()
            .join(",");

        format!("{receiver}{name}({arguments})")
    }

    fn finish_call(
        &mut self,
        resolution: Result<CompositeId, ResolveError>,
        receiver: Option<ExprResult>,
        name: &str,
        arguments: Vec<ExprResult>,
        position: Position,
    ) -> ExprResult {
        let id = match resolution {
            Ok(id) => id,
            Err(ResolveError::Undefined) => {
                self.report(
                    SemanticError::UndefinedFunction {
                        signature: self.call_signature(receiver.as_ref(), name, &arguments),
                    },
                    position,
                );
                return ExprResult::UNSET;
            }
            Err(ResolveError::Ambiguous(candidates)) => {
                self.report(
                    SemanticError::AmbiguousOverload {
                        signature: self.call_signature(receiver.as_ref(), name, &arguments),
                        candidates: candidates
                            .iter()
                            .map(|id| self.registry.composite(*id).name(&self.registry))
                            .collect(),
                    },
                    position,
                );
                return ExprResult::UNSET;
            }
        };

        let CompositeType::Function {
            parameters,
            return_type,
            ..
        } = self.registry.composite(id).clone()
        else {
            internal_inconsistency("call resolved to a structure type");
        };

        let Some(handle) = self.registry.function_handle(id) else {
            internal_inconsistency("function type has no backend function");
        };

        let mut values = Vec::with_capacity(arguments.len() + 1);
        values.extend(receiver.and_then(|r| r.value));

        for (argument, parameter) in arguments.into_iter().zip(&parameters) {
            let value = match self.coerce(argument, parameter.ty, Boundary::Argument, position) {
                Some(value) => value,
                None => {
                    let raw = self.registry.raw_type(parameter.ty);
                    self.backend.undefined_value(raw)
                }
            };

            values.push(value);
        }

        let value = self.backend.emit_call(handle, &values);
        ExprResult::new(return_type, value)
    }

    pub fn return_value(&mut self, expr: ExprResult, position: Position) {
        let return_type = self.current_function().return_type;

        if return_type.is_void() {
            if !expr.is_unset() {
                self.report(
                    SemanticError::TypeMismatch {
                        boundary: Boundary::Return,
                        expected: self.type_name(return_type),
                        actual: self.type_name(expr.ty),
                    },
                    position,
                );
            }

            self.backend.emit_return(None);
        } else {
            let value = match self.coerce(expr, return_type, Boundary::Return, position) {
                Some(value) => value,
                None => {
                    let raw = self.registry.raw_type(return_type);
                    self.backend.undefined_value(raw)
                }
            };

            self.backend.emit_return(Some(value));
        }

        self.continue_after_return();
    }

    pub fn return_void(&mut self, position: Position) {
        let return_type = self.current_function().return_type;

        if !return_type.is_void() && !return_type.is_unset() {
            self.report(
                SemanticError::TypeMismatch {
                    boundary: Boundary::Return,
                    expected: self.type_name(return_type),
                    actual: PrimitiveType::VOID.to_string(),
                },
                position,
            );
        }

        self.backend.emit_return(None);
        self.continue_after_return();
    }

    /// Statements after a return are still emitted, into a block nothing
    /// jumps to
    fn continue_after_return(&mut self) {
        let dead = self.new_block("dead");

        self.backend.set_insertion_point(dead);
        self.scopes.mark_dead(dead);
    }

    /// Evaluates a branch condition. Errors still produce a value so the
    /// control flow can be built.
    fn condition(&mut self, condition: ExprResult, position: Position) -> ValueRef {
        match self.coerce(condition, Typename::BOOLEAN, Boundary::Condition, position) {
            Some(value) => value,
            None => {
                let raw = PrimitiveType::BOOLEAN.raw_type();
                self.backend.undefined_value(raw)
            }
        }
    }

    /// Branches to a new arm when `condition` holds and to the block of the
    /// next arm otherwise
    fn branch_into_arm(&mut self, condition: ValueRef) -> (BlockRef, BlockRef) {
        let then = self.new_block("if.then");
        let next = self.new_block("if.else");

        self.backend.emit_branch(condition, then, next);
        (then, next)
    }

    fn open_arm(&mut self) {
        self.scopes.push_child(ScopeKind::Arm);
        let block = self.scopes.current_block();
        self.backend.set_insertion_point(block);
    }

    pub fn if_condition(&mut self, condition: ExprResult, position: Position) {
        let condition = self.condition(condition, position);
        let (then, next) = self.branch_into_arm(condition);

        self.scopes.enter_branch_set(&[then, next]);
        self.open_arm();

        self.constructs.push(Construct::If { has_else: false });
    }

    pub fn elseif_keyword(&mut self) {
        match self.constructs.last() {
            Some(Construct::If { has_else: false }) => {}
            _ => internal_inconsistency("elseif without an open if"),
        }

        self.scopes.pop_child();
        self.scopes.advance_path();

        let block = self.scopes.current_block();
        self.backend.set_insertion_point(block);
    }

    pub fn elseif_condition(&mut self, condition: ExprResult, position: Position) {
        let condition = self.condition(condition, position);
        let (then, next) = self.branch_into_arm(condition);

        self.scopes.set_current_block(then);
        self.scopes.append_path(next);
        self.open_arm();
    }

    pub fn else_condition(&mut self) {
        match self.constructs.last_mut() {
            Some(Construct::If { has_else }) if !*has_else => *has_else = true,
            _ => internal_inconsistency("else without an open if"),
        }

        self.scopes.pop_child();
        self.scopes.advance_path();
        self.open_arm();
    }

    pub fn end_if(&mut self) {
        let Some(Construct::If { has_else }) = self.constructs.pop() else {
            internal_inconsistency("end of if without an open if");
        };

        self.scopes.pop_child();

        // Without an else the last path falls through the condition untouched
        if !has_else {
            self.scopes.advance_path();
        }

        let merge = self.new_block("if.end");
        self.scopes.merge(&mut self.backend, merge);
    }

    pub fn while_keyword(&mut self) {
        let condition = self.new_block("while.cond");
        let header = self.scopes.enter_loop(&mut self.backend, condition);

        self.constructs.push(Construct::While { header, exit: None });
    }

    pub fn while_condition(&mut self, condition: ExprResult, position: Position) {
        let condition = self.condition(condition, position);

        let body = self.new_block("while.body");
        let exit = self.new_block("while.end");

        match self.constructs.last_mut() {
            Some(Construct::While { exit: slot @ None, .. }) => *slot = Some(exit),
            _ => internal_inconsistency("while condition without a while keyword"),
        }

        self.backend.emit_branch(condition, body, exit);

        self.scopes.set_current_block(body);
        self.scopes.push_child(ScopeKind::LoopBody);
        self.backend.set_insertion_point(body);
    }

    pub fn end_while(&mut self) {
        let Some(Construct::While {
            header,
            exit: Some(exit),
        }) = self.constructs.pop()
        else {
            internal_inconsistency("end of while without an open while body");
        };

        self.scopes.pop_child();
        self.scopes.close_loop(&mut self.backend, header, exit);
    }

    /// Terminates the entry function and hands back the backend along with
    /// everything that was reported
    pub fn finish(mut self) -> (B, Diagnostics) {
        if self.functions.len() != 1 {
            internal_inconsistency("finished a unit inside a function body");
        }

        if !self.constructs.is_empty() {
            internal_inconsistency("finished a unit inside an open if or while");
        }

        self.terminate_function(Position::default());

        log::debug!(
            "finished unit with {} error(s) and {} warning(s)",
            self.diagnostics.errors().count(),
            self.diagnostics.warnings().count()
        );

        (self.backend, self.diagnostics)
    }
}

use cogc::{
    backend::lir::{self, Instruction},
    diagnostics::{Position, SemanticError},
    middle::{
        ty::{CompositeId, Declaration, Typename},
        unit::CompilationUnit,
    },
};

const AT: Position = Position::new(2, 5);

fn declare_f(unit: &mut CompilationUnit<lir::Module>, parameter: &str) -> CompositeId {
    let ty = unit.typename(parameter, AT);

    unit.declare_function("f", vec![Declaration::new(ty, "n")], Typename::VOID, Typename::VOID, AT)
        .unwrap()
}

fn called_function(module: &lir::Module) -> Option<cogc::backend::FunctionRef> {
    module.blocks.iter().flat_map(|b| &b.instructions).find_map(|i| match i {
        Instruction::Call { function, .. } => Some(*function),
        _ => None,
    })
}

#[test]
fn narrowest_widening_wins() {
    let mut unit = CompilationUnit::new(lir::Module::new());
    let wide = declare_f(&mut unit, "int32");
    let narrow = declare_f(&mut unit, "int16");

    let int8 = unit.typename("int8", AT);
    unit.declare_symbol(int8, "x", None, AT);
    let x = unit.identifier("x", AT);
    let result = unit.call("f", vec![x], AT);

    assert_eq!(result.ty, Typename::VOID);
    assert_ne!(wide, narrow);

    let expected = unit.registry().function_handle(narrow);
    let (module, diagnostics) = unit.finish();

    assert!(diagnostics.is_empty());
    assert_eq!(called_function(&module), expected);
}

#[test]
fn equal_rank_is_ambiguous() {
    let mut unit = CompilationUnit::new(lir::Module::new());
    declare_f(&mut unit, "int16");
    declare_f(&mut unit, "uint16");

    let uint8 = unit.typename("uint8", AT);
    unit.declare_symbol(uint8, "x", None, AT);
    let x = unit.identifier("x", AT);
    let result = unit.call("f", vec![x], AT);

    assert!(result.is_unset());

    let (module, diagnostics) = unit.finish();
    let errors = diagnostics.errors().cloned().collect::<Vec<_>>();

    assert_eq!(
        errors,
        vec![SemanticError::AmbiguousOverload {
            signature: "f(uint8)".to_string(),
            candidates: vec!["f(int16)->void".to_string(), "f(uint16)->void".to_string()],
        }]
    );
    assert_eq!(called_function(&module), None);
}

#[test]
fn signed_arguments_never_pick_unsigned_parameters() {
    let mut unit = CompilationUnit::new(lir::Module::new());
    declare_f(&mut unit, "uint16");

    let int8 = unit.typename("int8", AT);
    unit.declare_symbol(int8, "x", None, AT);
    let x = unit.identifier("x", AT);
    unit.call("f", vec![x], AT);

    let errors = unit.diagnostics().errors().map(ToString::to_string).collect::<Vec<_>>();
    assert_eq!(errors, vec!["no function matches the call `f(int8)`"]);
}

#[test]
fn arguments_are_converted_to_the_parameter_type() {
    let mut unit = CompilationUnit::new(lir::Module::new());
    let int16 = unit.typename("int16", AT);
    let id = unit
        .declare_function("twice", vec![Declaration::new(int16, "n")], int16, Typename::VOID, AT)
        .unwrap();

    let five = unit.literal("5", AT);
    let result = unit.call("twice", vec![five], AT);

    assert_eq!(result.ty, int16);
    assert!(result.value.is_some());

    let handle = unit.registry().function_handle(id).unwrap();
    let (module, diagnostics) = unit.finish();
    assert!(diagnostics.is_empty());

    let Some(Instruction::Call { function, arguments, .. }) = module
        .blocks
        .iter()
        .flat_map(|b| &b.instructions)
        .find(|i| matches!(i, Instruction::Call { .. }))
    else {
        panic!("expected a call");
    };

    assert_eq!(*function, handle);
    assert!(matches!(
        module.definition(arguments[0]),
        Some(Instruction::Cast { .. })
    ));
}

#[test]
fn redeclaring_an_identical_function_reuses_it() {
    let mut unit = CompilationUnit::new(lir::Module::new());

    let first = declare_f(&mut unit, "int8");
    let second = declare_f(&mut unit, "int8");

    assert_eq!(first, second);
    assert_eq!(unit.registry().functions_named("f").len(), 1);
}

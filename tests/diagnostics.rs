use cogc::{
    backend::{lir, verify::verify_module},
    diagnostics::{Position, SemanticError},
    middle::{operators::BinaryOperator, unit::CompilationUnit},
};

fn plain(s: String) -> String {
    String::from_utf8(strip_ansi_escapes::strip(s)).unwrap()
}

#[test]
fn undefined_variables_do_not_cascade() {
    let mut unit = CompilationUnit::new(lir::Module::new());
    let int8 = unit.typename("int8", Position::new(1, 1));

    // int8 z = y + 1
    let y = unit.identifier("y", Position::new(1, 10));
    let one = unit.literal("1", Position::new(1, 14));
    let sum = unit.binary(y, BinaryOperator::Add, one, Position::new(1, 12));
    unit.declare_symbol(int8, "z", Some(sum), Position::new(1, 1));

    // int8 w = z + 1
    let z = unit.identifier("z", Position::new(2, 10));
    let one = unit.literal("1", Position::new(2, 14));
    let sum = unit.binary(z, BinaryOperator::Add, one, Position::new(2, 12));
    unit.declare_symbol(int8, "w", Some(sum), Position::new(2, 1));

    let (module, diagnostics) = unit.finish();

    let errors = diagnostics.errors().cloned().collect::<Vec<_>>();
    assert_eq!(
        errors,
        vec![SemanticError::UndefinedVariable {
            name: "y".to_string()
        }]
    );
    assert_eq!(diagnostics.iter().next().unwrap().position, Position::new(1, 10));
    assert_eq!(verify_module(&module), Ok(()));
}

#[test]
fn rendered_diagnostics_point_at_the_source() {
    let mut unit = CompilationUnit::new(lir::Module::new());
    let uint8 = unit.typename("uint8", Position::new(4, 1));

    let negative = unit.literal("1", Position::new(4, 11));
    let negative = unit.unary(
        cogc::middle::operators::UnaryOperator::Negate,
        negative,
        Position::new(4, 10),
    );
    unit.declare_symbol(uint8, "u", Some(negative), Position::new(4, 1));

    let (_, diagnostics) = unit.finish();
    let rendered = plain(diagnostics.iter().next().unwrap().render("demo.cog"));

    assert!(rendered.contains(
        "error: initializer type int2 does not match declared type uint8 (at demo.cog:4:1)"
    ));
}

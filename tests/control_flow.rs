use cogc::{
    backend::{
        BlockRef,
        lir::{self, Instruction},
        pretty_print::pretty_print_function,
        verify::verify_module,
    },
    diagnostics::Position,
    middle::{
        operators::BinaryOperator,
        ty::{Declaration, Typename},
        unit::CompilationUnit,
    },
};
use indoc::indoc;

const AT: Position = Position::new(1, 1);

fn plain(s: String) -> String {
    String::from_utf8(strip_ansi_escapes::strip(s)).unwrap()
}

fn label(module: &lir::Module, block: BlockRef) -> &str {
    &module.blocks[block].label
}

/// Declares and begins `name(bool c, bool d, int8 a, int8 b, int8 e) -> int8`
fn begin(unit: &mut CompilationUnit<lir::Module>, name: &str) {
    let bool = unit.typename("bool", AT);
    let int8 = unit.typename("int8", AT);

    let parameters = vec![
        Declaration::new(bool, "c"),
        Declaration::new(bool, "d"),
        Declaration::new(int8, "a"),
        Declaration::new(int8, "b"),
        Declaration::new(int8, "e"),
    ];

    let id = unit
        .declare_function(name, parameters, int8, Typename::VOID, AT)
        .unwrap();
    unit.begin_function(id, AT);
}

fn assign_from(unit: &mut CompilationUnit<lir::Module>, target: &str, source: &str) {
    let value = unit.identifier(source, AT);
    unit.assign_symbol(target, value, AT);
}

#[test]
fn if_else_joins_both_arms_in_order() {
    let mut unit = CompilationUnit::new(lir::Module::new());
    begin(&mut unit, "choose");

    let int8 = unit.typename("int8", AT);
    let a = unit.identifier("a", AT);
    unit.declare_symbol(int8, "r", Some(a), AT);

    let c = unit.identifier("c", AT);
    unit.if_condition(c, AT);
    assign_from(&mut unit, "r", "b");
    unit.else_condition();
    assign_from(&mut unit, "r", "e");
    unit.end_if();

    let r = unit.identifier("r", AT);
    unit.return_value(r, AT);
    unit.end_function(AT);

    let (module, diagnostics) = unit.finish();
    assert!(diagnostics.is_empty());
    assert_eq!(verify_module(&module), Ok(()));

    // One join per symbol in the function scope, `r` being the last declared
    let joins = module.joins().collect::<Vec<_>>();
    assert_eq!(joins.len(), 6);

    let function = module.function_named("choose").unwrap();
    let incoming = module.incoming(joins[5].id);

    assert_eq!(incoming.len(), 2);
    assert_eq!(label(&module, incoming[0].0), "if.then_2");
    assert_eq!(label(&module, incoming[1].0), "if.else_3");
    assert_eq!(incoming[0].1, function.parameters[3]);
    assert_eq!(incoming[1].1, function.parameters[4]);
}

#[test]
fn if_without_else_falls_through_the_condition() {
    let mut unit = CompilationUnit::new(lir::Module::new());
    begin(&mut unit, "pick");

    let int8 = unit.typename("int8", AT);
    let a = unit.identifier("a", AT);
    unit.declare_symbol(int8, "r", Some(a), AT);

    let c = unit.identifier("c", AT);
    unit.if_condition(c, AT);
    assign_from(&mut unit, "r", "b");
    unit.end_if();

    let r = unit.identifier("r", AT);
    unit.return_value(r, AT);
    unit.end_function(AT);

    let (module, diagnostics) = unit.finish();
    assert!(diagnostics.is_empty());
    assert_eq!(verify_module(&module), Ok(()));

    let function = module.function_named("pick").unwrap();

    assert_eq!(
        plain(pretty_print_function(&module, function.id)),
        indoc! {"
            fn pick(%0: i1, %1: i1, %2: i8, %3: i8, %4: i8) -> i8 {
            entry_1:
                br %0, if.then_2, if.else_3
            if.then_2:
                jmp if.end_4
            if.else_3:
                jmp if.end_4
            if.end_4:
                %5 = join i1 [%0, if.then_2], [%0, if.else_3]
                %6 = join i1 [%1, if.then_2], [%1, if.else_3]
                %7 = join i8 [%2, if.then_2], [%2, if.else_3]
                %8 = join i8 [%3, if.then_2], [%3, if.else_3]
                %9 = join i8 [%4, if.then_2], [%4, if.else_3]
                %10 = join i8 [%3, if.then_2], [%2, if.else_3]
                ret %10
            dead_5:
                unreachable
            }
        "}
    );
}

#[test]
fn elseif_chains_join_every_arm() {
    let mut unit = CompilationUnit::new(lir::Module::new());
    begin(&mut unit, "select3");

    let int8 = unit.typename("int8", AT);
    unit.declare_symbol(int8, "r", None, AT);

    let c = unit.identifier("c", AT);
    unit.if_condition(c, AT);
    assign_from(&mut unit, "r", "a");
    unit.elseif_keyword();
    let d = unit.identifier("d", AT);
    unit.elseif_condition(d, AT);
    assign_from(&mut unit, "r", "b");
    unit.else_condition();
    assign_from(&mut unit, "r", "e");
    unit.end_if();

    let r = unit.identifier("r", AT);
    unit.return_value(r, AT);
    unit.end_function(AT);

    let (module, diagnostics) = unit.finish();
    assert!(diagnostics.is_empty());
    assert_eq!(verify_module(&module), Ok(()));

    let function = module.function_named("select3").unwrap();
    assert_eq!(module.joins().count(), 6);

    let join = module.joins().last().unwrap();
    let incoming = module.incoming(join.id);

    let labels = incoming.iter().map(|(block, _)| label(&module, *block)).collect::<Vec<_>>();
    assert_eq!(labels, vec!["if.then_2", "if.then_4", "if.else_5"]);

    let values = incoming.iter().map(|(_, value)| *value).collect::<Vec<_>>();
    assert_eq!(
        values,
        vec![function.parameters[2], function.parameters[3], function.parameters[4]]
    );

    // The second condition is evaluated on the first condition's false edge
    assert!(matches!(
        module.block_labeled(function.id, "if.else_3").unwrap().terminator(),
        Some(Instruction::Branch { condition, .. }) if *condition == function.parameters[1]
    ));
}

#[test]
fn returning_arms_do_not_reach_the_merge() {
    let mut unit = CompilationUnit::new(lir::Module::new());
    begin(&mut unit, "early");

    let int8 = unit.typename("int8", AT);
    let a = unit.identifier("a", AT);
    unit.declare_symbol(int8, "r", Some(a), AT);

    let c = unit.identifier("c", AT);
    unit.if_condition(c, AT);
    let b = unit.identifier("b", AT);
    unit.return_value(b, AT);
    unit.else_condition();
    assign_from(&mut unit, "r", "e");
    unit.end_if();

    let r = unit.identifier("r", AT);
    unit.return_value(r, AT);
    unit.end_function(AT);

    let (module, diagnostics) = unit.finish();
    assert!(diagnostics.is_empty());
    assert_eq!(verify_module(&module), Ok(()));

    let function = module.function_named("early").unwrap();

    // Only the else arm reaches the merge, so every join has a single edge
    let merge = module.block_labeled(function.id, "if.end_5").unwrap();
    assert_eq!(merge.predecessors.len(), 1);
    assert_eq!(merge.joins.len(), 6);
    assert!(merge.joins.iter().all(|join| module.incoming(*join).len() == 1));

    let Some(Instruction::Return { value: Some(returned) }) = merge.terminator() else {
        panic!("merge block should return `r`");
    };

    let incoming = module.incoming(*returned);
    assert_eq!(label(&module, incoming[0].0), "if.else_3");
    assert_eq!(incoming[0].1, function.parameters[4]);

    let dead = module.block_labeled(function.id, "dead_4").unwrap();
    assert!(matches!(dead.terminator(), Some(Instruction::Unreachable)));
}

#[test]
fn while_loop_joins_pre_header_and_body_end() {
    let mut unit = CompilationUnit::new(lir::Module::new());

    let int8 = unit.typename("int8", AT);
    let zero = unit.literal("0", AT);
    unit.declare_symbol(int8, "x", Some(zero), AT);

    unit.while_keyword();
    let x = unit.identifier("x", AT);
    let nine = unit.literal("9", AT);
    let condition = unit.binary(x, BinaryOperator::LessThan, nine, AT);
    unit.while_condition(condition, AT);

    let x = unit.identifier("x", AT);
    let one = unit.literal("1", AT);
    let incremented = unit.binary(x, BinaryOperator::Add, one, AT);
    unit.assign_symbol("x", incremented, AT);
    unit.end_while();

    let (module, diagnostics) = unit.finish();
    assert!(diagnostics.is_empty());
    assert_eq!(verify_module(&module), Ok(()));

    let entry = module.function_named("_start").unwrap();

    assert_eq!(
        plain(pretty_print_function(&module, entry.id)),
        indoc! {"
            fn _start() -> void {
            entry_0:
                %1 = zext 0 to i8
                jmp while.cond_1
            while.cond_1:
                %2 = join i8 [%1, entry_0], [%8, while.body_2]
                %4 = zext 9 to i8
                %5 = cmp slt %2, %4
                br %5, while.body_2, while.end_3
            while.body_2:
                %7 = zext 1 to i8
                %8 = add %2, %7
                jmp while.cond_1
            while.end_3:
                ret
            }
        "}
    );
}

#[test]
fn loops_nest_inside_arms() {
    let mut unit = CompilationUnit::new(lir::Module::new());
    begin(&mut unit, "nested");

    let int8 = unit.typename("int8", AT);
    let a = unit.identifier("a", AT);
    unit.declare_symbol(int8, "r", Some(a), AT);

    let c = unit.identifier("c", AT);
    unit.if_condition(c, AT);

    unit.while_keyword();
    let d = unit.identifier("d", AT);
    unit.while_condition(d, AT);
    let r = unit.identifier("r", AT);
    let b = unit.identifier("b", AT);
    let sum = unit.binary(r, BinaryOperator::Add, b, AT);
    unit.assign_symbol("r", sum, AT);
    unit.end_while();

    unit.end_if();

    let r = unit.identifier("r", AT);
    unit.return_value(r, AT);
    unit.end_function(AT);

    let (module, diagnostics) = unit.finish();
    assert!(diagnostics.is_empty());
    assert_eq!(verify_module(&module), Ok(()));

    let function = module.function_named("nested").unwrap();
    let exit = module.block_labeled(function.id, "while.end_6").unwrap();
    let merge = module.block_labeled(function.id, "if.end_7").unwrap();

    // The loop exit is the end of the then arm, where every symbol holds its
    // loop join, so each one is joined again with the else arm
    assert!(merge.predecessors.contains(&exit.id));
    assert_eq!(merge.joins.len(), 6);
    assert!(merge.joins.iter().all(|join| module.incoming(*join).len() == 2));
}

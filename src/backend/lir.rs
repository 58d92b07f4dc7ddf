//! LIR (Low-level Intermediate Representation). An in-memory SSA module with
//! explicit basic blocks and join nodes, built through the [`Backend`] trait.
//! It is never lowered any further, it exists so the output of the semantic
//! core can be inspected, printed and verified.

use std::collections::BTreeSet;

use num_bigint::BigInt;

use crate::{
    backend::{
        Backend, BinaryOp, BlockRef, CastKind, ComparePredicate, FunctionRef, FunctionSignature,
        RawType, StructRef, UnaryOp, ValueRef,
    },
    diagnostics::internal_inconsistency,
    index::{Index, IndexVec},
    intern::InternedSymbol,
};

#[derive(Debug, Default)]
pub struct Module {
    pub functions: IndexVec<FunctionRef, Function>,
    pub structures: IndexVec<StructRef, Structure>,
    pub blocks: IndexVec<BlockRef, Block>,
    pub values: IndexVec<ValueRef, Value>,
    insertion_point: Option<BlockRef>,
}

#[derive(Debug)]
pub struct Function {
    pub id: FunctionRef,
    pub signature: FunctionSignature,
    pub parameters: Vec<ValueRef>,
    /// Blocks in creation order, the first one is the entry block
    pub blocks: Vec<BlockRef>,
}

#[derive(Debug)]
pub struct Structure {
    pub id: StructRef,
    pub name: InternedSymbol,
    pub members: Vec<RawType>,
}

#[derive(Debug)]
pub struct Block {
    pub id: BlockRef,
    pub function: FunctionRef,
    pub label: String,
    /// Join nodes live at the top of the block, before any instruction
    pub joins: Vec<ValueRef>,
    pub instructions: Vec<Instruction>,
    pub predecessors: BTreeSet<BlockRef>,
}

impl Block {
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.is_terminator())
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator().is_some()
    }

    pub fn returns(&self) -> bool {
        matches!(self.terminator(), Some(Instruction::Return { .. }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Binary {
        destination: ValueRef,
        operator: BinaryOp,
        lhs: ValueRef,
        rhs: ValueRef,
    },
    Unary {
        destination: ValueRef,
        operator: UnaryOp,
        operand: ValueRef,
    },
    Compare {
        destination: ValueRef,
        predicate: ComparePredicate,
        lhs: ValueRef,
        rhs: ValueRef,
    },
    Cast {
        destination: ValueRef,
        kind: CastKind,
        operand: ValueRef,
        ty: RawType,
    },
    Select {
        destination: ValueRef,
        condition: ValueRef,
        if_true: ValueRef,
        if_false: ValueRef,
    },
    Call {
        destination: Option<ValueRef>,
        function: FunctionRef,
        arguments: Vec<ValueRef>,
    },
    Branch {
        condition: ValueRef,
        positive: BlockRef,
        negative: BlockRef,
    },
    Jump {
        destination: BlockRef,
    },
    Return {
        value: Option<ValueRef>,
    },
    Unreachable,
}

impl Instruction {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Branch { .. }
                | Instruction::Jump { .. }
                | Instruction::Return { .. }
                | Instruction::Unreachable
        )
    }

    pub fn destination(&self) -> Option<ValueRef> {
        match self {
            Instruction::Binary { destination, .. }
            | Instruction::Unary { destination, .. }
            | Instruction::Compare { destination, .. }
            | Instruction::Cast { destination, .. }
            | Instruction::Select { destination, .. } => Some(*destination),
            Instruction::Call { destination, .. } => *destination,
            _ => None,
        }
    }

    pub fn successors(&self) -> Vec<BlockRef> {
        match self {
            Instruction::Branch {
                positive, negative, ..
            } => vec![*positive, *negative],
            Instruction::Jump { destination } => vec![*destination],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Immediate {
    Int(BigInt),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub id: ValueRef,
    pub ty: RawType,
    pub kind: ValueKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Constant(Immediate),
    Undefined,
    Parameter {
        function: FunctionRef,
        index: usize,
    },
    Instruction {
        block: BlockRef,
    },
    Join {
        block: BlockRef,
        arity: usize,
        incoming: Vec<(BlockRef, ValueRef)>,
    },
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function_named(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.signature.symbol.value() == name)
    }

    pub fn block_labeled(&self, function: FunctionRef, label: &str) -> Option<&Block> {
        self.functions[function]
            .blocks
            .iter()
            .map(|id| &self.blocks[*id])
            .find(|b| b.label == label)
    }

    /// Every join node in the module, in creation order
    pub fn joins(&self) -> impl Iterator<Item = &Value> {
        self.values
            .iter()
            .filter(|v| matches!(v.kind, ValueKind::Join { .. }))
    }

    pub fn incoming(&self, join: ValueRef) -> &[(BlockRef, ValueRef)] {
        match &self.values[join].kind {
            ValueKind::Join { incoming, .. } => incoming,
            _ => &[],
        }
    }

    /// The instruction producing `value`, if it is an instruction result
    pub fn definition(&self, value: ValueRef) -> Option<&Instruction> {
        let ValueKind::Instruction { block } = self.values[value].kind else {
            return None;
        };

        self.blocks[block]
            .instructions
            .iter()
            .find(|i| i.destination() == Some(value))
    }

    fn current_block(&self) -> BlockRef {
        match self.insertion_point {
            Some(block) => block,
            None => internal_inconsistency("LIR instruction emitted without an insertion point"),
        }
    }

    fn new_value(&mut self, ty: RawType, kind: ValueKind) -> ValueRef {
        let id = self.values.next_index();
        self.values.push(Value { id, ty, kind })
    }

    /// Allocates a result value in the current block and appends the
    /// instruction producing it
    fn push_with_result(
        &mut self,
        ty: RawType,
        build: impl FnOnce(ValueRef) -> Instruction,
    ) -> ValueRef {
        let block = self.current_block();
        let destination = self.new_value(ty, ValueKind::Instruction { block });

        self.blocks[block].instructions.push(build(destination));
        destination
    }

    fn push_terminator(&mut self, instruction: Instruction) {
        let block = self.current_block();

        for successor in instruction.successors() {
            self.blocks[successor].predecessors.insert(block);
        }

        self.blocks[block].instructions.push(instruction);
    }
}

impl Backend for Module {
    fn declare_function(&mut self, signature: FunctionSignature) -> FunctionRef {
        let id = self.functions.next_index();

        let parameters = signature
            .parameters
            .iter()
            .enumerate()
            .map(|(index, ty)| {
                self.new_value(
                    *ty,
                    ValueKind::Parameter {
                        function: id,
                        index,
                    },
                )
            })
            .collect();

        log::trace!("declared function {} as {id:?}", signature.symbol);

        self.functions.push(Function {
            id,
            signature,
            parameters,
            blocks: Vec::new(),
        })
    }

    fn function_parameter(&self, function: FunctionRef, index: usize) -> ValueRef {
        match self.functions[function].parameters.get(index) {
            Some(value) => *value,
            None => internal_inconsistency(format!(
                "function {} has no parameter {index}",
                self.functions[function].signature.symbol
            )),
        }
    }

    fn declare_structure(&mut self, name: InternedSymbol, members: Vec<RawType>) -> StructRef {
        let id = self.structures.next_index();
        self.structures.push(Structure { id, name, members })
    }

    fn create_block(&mut self, function: FunctionRef, label: &str) -> BlockRef {
        let id = self.blocks.next_index();

        self.blocks.push(Block {
            id,
            function,
            label: format!("{label}_{}", id.index()),
            joins: Vec::new(),
            instructions: Vec::new(),
            predecessors: BTreeSet::new(),
        });
        self.functions[function].blocks.push(id);

        id
    }

    fn set_insertion_point(&mut self, block: BlockRef) {
        self.insertion_point = Some(block);
    }

    fn insertion_point(&self) -> Option<BlockRef> {
        self.insertion_point
    }

    fn is_terminated(&self, block: BlockRef) -> bool {
        self.blocks[block].is_terminated()
    }

    fn value_type(&self, value: ValueRef) -> RawType {
        self.values[value].ty
    }

    fn undefined_value(&mut self, ty: RawType) -> ValueRef {
        self.new_value(ty, ValueKind::Undefined)
    }

    fn constant_int(&mut self, ty: RawType, value: &BigInt) -> ValueRef {
        self.new_value(ty, ValueKind::Constant(Immediate::Int(value.clone())))
    }

    fn constant_float(&mut self, ty: RawType, value: f64) -> ValueRef {
        self.new_value(ty, ValueKind::Constant(Immediate::Float(value)))
    }

    fn emit_binary(&mut self, operator: BinaryOp, lhs: ValueRef, rhs: ValueRef) -> ValueRef {
        let ty = self.value_type(lhs);

        self.push_with_result(ty, |destination| Instruction::Binary {
            destination,
            operator,
            lhs,
            rhs,
        })
    }

    fn emit_unary(&mut self, operator: UnaryOp, operand: ValueRef) -> ValueRef {
        let ty = self.value_type(operand);

        self.push_with_result(ty, |destination| Instruction::Unary {
            destination,
            operator,
            operand,
        })
    }

    fn emit_compare(&mut self, predicate: ComparePredicate, lhs: ValueRef, rhs: ValueRef) -> ValueRef {
        self.push_with_result(RawType::Integer(1), |destination| Instruction::Compare {
            destination,
            predicate,
            lhs,
            rhs,
        })
    }

    fn emit_cast(&mut self, kind: CastKind, operand: ValueRef, ty: RawType) -> ValueRef {
        self.push_with_result(ty, |destination| Instruction::Cast {
            destination,
            kind,
            operand,
            ty,
        })
    }

    fn emit_select(&mut self, condition: ValueRef, if_true: ValueRef, if_false: ValueRef) -> ValueRef {
        let ty = self.value_type(if_true);

        self.push_with_result(ty, |destination| Instruction::Select {
            destination,
            condition,
            if_true,
            if_false,
        })
    }

    fn emit_call(&mut self, function: FunctionRef, arguments: &[ValueRef]) -> Option<ValueRef> {
        let return_type = self.functions[function].signature.return_type;
        let arguments = arguments.to_vec();

        if return_type == RawType::Void {
            let block = self.current_block();
            self.blocks[block].instructions.push(Instruction::Call {
                destination: None,
                function,
                arguments,
            });

            return None;
        }

        Some(self.push_with_result(return_type, |destination| Instruction::Call {
            destination: Some(destination),
            function,
            arguments,
        }))
    }

    fn emit_branch(&mut self, condition: ValueRef, positive: BlockRef, negative: BlockRef) {
        self.push_terminator(Instruction::Branch {
            condition,
            positive,
            negative,
        });
    }

    fn emit_jump(&mut self, destination: BlockRef) {
        self.push_terminator(Instruction::Jump { destination });
    }

    fn emit_return(&mut self, value: Option<ValueRef>) {
        self.push_terminator(Instruction::Return { value });
    }

    fn emit_unreachable(&mut self) {
        self.push_terminator(Instruction::Unreachable);
    }

    fn create_join_node(&mut self, ty: RawType, arity: usize) -> ValueRef {
        let block = self.current_block();
        let join = self.new_value(
            ty,
            ValueKind::Join {
                block,
                arity,
                incoming: Vec::with_capacity(arity),
            },
        );

        self.blocks[block].joins.push(join);
        join
    }

    fn add_incoming(&mut self, join: ValueRef, value: ValueRef, predecessor: BlockRef) {
        match &mut self.values[join].kind {
            ValueKind::Join { incoming, .. } => incoming.push((predecessor, value)),
            _ => internal_inconsistency(format!("{join:?} is not a join node")),
        }
    }
}

//! Structural checks over a finished LIR module. These are the guarantees the
//! semantic core makes about the SSA it emits.

use thiserror::Error;

use crate::{
    backend::{
        BlockRef, ValueRef,
        lir::{self, ValueKind},
    },
    index::Index,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("block {label} has no terminator")]
    MissingTerminator { label: String },

    #[error("block {label} has an instruction after its terminator")]
    InstructionAfterTerminator { label: String },

    #[error("join %{join} in {label} has {incoming} incoming edge(s) but {predecessors} predecessor(s)")]
    JoinPredecessorMismatch {
        join: usize,
        label: String,
        incoming: usize,
        predecessors: usize,
    },

    #[error("join %{join} in {label} has {incoming} incoming edge(s) but only reserved {arity}")]
    JoinOverfilled {
        join: usize,
        label: String,
        incoming: usize,
        arity: usize,
    },

    #[error("join %{join} in {label} has an incoming edge from {from}, which is not a predecessor")]
    JoinUnknownPredecessor {
        join: usize,
        label: String,
        from: String,
    },
}

fn check_join(
    module: &lir::Module,
    block: &lir::Block,
    join: ValueRef,
    errors: &mut Vec<VerifyError>,
) {
    let ValueKind::Join {
        arity, incoming, ..
    } = &module.values[join].kind
    else {
        return;
    };

    if incoming.len() > *arity {
        errors.push(VerifyError::JoinOverfilled {
            join: join.index(),
            label: block.label.clone(),
            incoming: incoming.len(),
            arity: *arity,
        });
    }

    if incoming.len() != block.predecessors.len() {
        errors.push(VerifyError::JoinPredecessorMismatch {
            join: join.index(),
            label: block.label.clone(),
            incoming: incoming.len(),
            predecessors: block.predecessors.len(),
        });
    }

    for (from, _) in incoming {
        if !block.predecessors.contains(from) {
            errors.push(VerifyError::JoinUnknownPredecessor {
                join: join.index(),
                label: block.label.clone(),
                from: label_of(module, *from),
            });
        }
    }
}

fn label_of(module: &lir::Module, block: BlockRef) -> String {
    module.blocks[block].label.clone()
}

/// Checks that every block ends in exactly one terminator and that every join
/// node has one incoming edge per predecessor of its block
pub fn verify_module(module: &lir::Module) -> Result<(), Vec<VerifyError>> {
    let mut errors = Vec::new();

    for block in module.blocks.iter() {
        match block.instructions.iter().position(|i| i.is_terminator()) {
            None => errors.push(VerifyError::MissingTerminator {
                label: block.label.clone(),
            }),
            Some(position) if position + 1 != block.instructions.len() => {
                errors.push(VerifyError::InstructionAfterTerminator {
                    label: block.label.clone(),
                })
            }
            Some(_) => {}
        }

        for join in &block.joins {
            check_join(module, block, *join, &mut errors);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        for error in &errors {
            log::debug!("verification failed: {error}");
        }

        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{Backend, FunctionSignature, RawType},
        intern::InternedSymbol,
    };

    fn module_with_function() -> (lir::Module, crate::backend::FunctionRef) {
        let mut module = lir::Module::new();
        let f = module.declare_function(FunctionSignature {
            symbol: InternedSymbol::new("verify_me"),
            parameters: vec![],
            return_type: RawType::Void,
        });

        (module, f)
    }

    #[test]
    fn unterminated_block_is_reported() {
        let (mut module, f) = module_with_function();
        module.create_block(f, "entry");

        assert_eq!(
            verify_module(&module),
            Err(vec![VerifyError::MissingTerminator {
                label: "entry_0".to_string()
            }])
        );
    }

    #[test]
    fn join_must_match_predecessors() {
        let (mut module, f) = module_with_function();
        let entry = module.create_block(f, "entry");
        let exit = module.create_block(f, "exit");

        module.set_insertion_point(entry);
        module.emit_jump(exit);

        module.set_insertion_point(exit);
        module.create_join_node(RawType::Integer(8), 1);
        module.emit_return(None);

        let errors = verify_module(&module).unwrap_err();
        assert!(matches!(
            errors.as_slice(),
            [VerifyError::JoinPredecessorMismatch {
                incoming: 0,
                predecessors: 1,
                ..
            }]
        ));
    }

    #[test]
    fn well_formed_module_passes() {
        let (mut module, f) = module_with_function();
        let entry = module.create_block(f, "entry");
        let exit = module.create_block(f, "exit");
        let zero = module.constant_u64(RawType::Integer(8), 0);

        module.set_insertion_point(entry);
        module.emit_jump(exit);

        module.set_insertion_point(exit);
        let join = module.create_join_node(RawType::Integer(8), 1);
        module.add_incoming(join, zero, entry);
        module.emit_return(None);

        assert_eq!(verify_module(&module), Ok(()));
    }
}

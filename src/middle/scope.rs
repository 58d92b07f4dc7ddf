//! Builds SSA form for named symbols while statements are being emitted.
//!
//! Every scope tracks the blocks of the control paths that are currently open
//! (one normally, one per arm inside an `if`), and every symbol stores one
//! value per open path. When the arms of a construct come back together the
//! per-path values are combined into join nodes.
//!
//! A child scope (the body of an arm or loop) starts as a snapshot of its
//! parent holding the parent's current value for every visible symbol. When it
//! closes, symbols it declared itself are dropped and the rest are written back
//! into the parent's current path.

use crate::{
    backend::{Backend, BlockRef, RawType, ValueRef},
    diagnostics::{SemanticError, internal_inconsistency},
    index::{IndexVec, simple_index},
    intern::InternedSymbol,
    middle::ty::Typename,
};

simple_index! {
    /// Handle to a symbol in the innermost scope. Handles of inherited symbols
    /// stay valid in child scopes.
    pub struct SymbolId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Function,
    Arm,
    LoopBody,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: InternedSymbol,
    pub ty: Typename,
    pub raw: RawType,
    /// One value per open path of the owning scope
    pub values: Vec<ValueRef>,
}

/// The block a control path is currently emitting into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenBlock {
    pub block: BlockRef,
    /// Cleared once the path has returned. Code emitted afterwards goes into a
    /// block nothing jumps to.
    pub live: bool,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub symbols: IndexVec<SymbolId, Symbol>,
    /// Symbols before this index were inherited from the parent
    own_from: usize,
    paths: Vec<OpenBlock>,
    cursor: usize,
}

impl Scope {
    fn new(kind: ScopeKind, block: OpenBlock) -> Self {
        Self {
            kind,
            symbols: IndexVec::new(),
            own_from: 0,
            paths: vec![block],
            cursor: 0,
        }
    }

    pub fn paths(&self) -> &[OpenBlock] {
        &self.paths
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_branching(&self) -> bool {
        self.paths.len() > 1
    }

    fn check_paths(&self) {
        for symbol in self.symbols.iter() {
            if symbol.values.len() != self.paths.len() {
                internal_inconsistency(format!(
                    "symbol {} has {} path value(s) but its scope has {} open block(s)",
                    symbol.name,
                    symbol.values.len(),
                    self.paths.len()
                ));
            }
        }
    }
}

/// Produced by [`ScopeStack::enter_loop`] and consumed by
/// [`ScopeStack::close_loop`]
#[derive(Debug, Clone)]
pub struct LoopHeader {
    pub condition: BlockRef,
    pub joins: Vec<(SymbolId, ValueRef)>,
    /// Whether the loop was entered from a live path
    pub live: bool,
}

#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn top(&self) -> &Scope {
        match self.scopes.last() {
            Some(scope) => scope,
            None => internal_inconsistency("no scope is open"),
        }
    }

    fn top_mut(&mut self) -> &mut Scope {
        match self.scopes.last_mut() {
            Some(scope) => scope,
            None => internal_inconsistency("no scope is open"),
        }
    }

    /// Opens the root scope of a function body. It does not see any symbols
    /// of the function it is nested in.
    pub fn push_function(&mut self, entry: BlockRef) {
        self.scopes.push(Scope::new(
            ScopeKind::Function,
            OpenBlock {
                block: entry,
                live: true,
            },
        ));
    }

    pub fn pop_function(&mut self) {
        match self.scopes.pop() {
            Some(scope) if scope.kind == ScopeKind::Function => {}
            _ => internal_inconsistency("popped a function scope while a block scope was open"),
        }
    }

    /// Opens an arm or loop body scope as a snapshot of the current path
    pub fn push_child(&mut self, kind: ScopeKind) {
        let parent = self.top();
        parent.check_paths();

        let cursor = parent.cursor;
        let symbols = parent
            .symbols
            .iter()
            .map(|symbol| Symbol {
                values: vec![symbol.values[cursor]],
                ..symbol.clone()
            })
            .collect::<IndexVec<SymbolId, Symbol>>();

        let child = Scope {
            kind,
            own_from: symbols.len(),
            symbols,
            paths: vec![parent.paths[cursor]],
            cursor: 0,
        };

        self.scopes.push(child);
    }

    /// Closes a child scope, writing its values and current block back into
    /// the parent's current path
    pub fn pop_child(&mut self) {
        let Some(mut child) = self.scopes.pop() else {
            internal_inconsistency("no scope is open");
        };

        if child.kind == ScopeKind::Function {
            internal_inconsistency("popped a function scope as a block scope");
        }

        if child.is_branching() {
            internal_inconsistency("closed a scope with unmerged control paths");
        }

        child.symbols.truncate(child.own_from);

        let parent = self.top_mut();

        if child.symbols.len() != parent.symbols.len() {
            internal_inconsistency(format!(
                "child scope carries {} inherited symbol(s) but its parent has {}",
                child.symbols.len(),
                parent.symbols.len()
            ));
        }

        let cursor = parent.cursor;

        for (symbol, written) in parent.symbols.iter_mut().zip(child.symbols.iter()) {
            symbol.values[cursor] = written.values[0];
        }

        parent.paths[cursor] = child.paths[0];
    }

    pub fn declare(
        &mut self,
        name: InternedSymbol,
        ty: Typename,
        raw: RawType,
        value: ValueRef,
    ) -> Result<SymbolId, SemanticError> {
        let scope = self.top_mut();

        // Shadowing an inherited symbol is fine
        if scope.symbols.raw[scope.own_from..].iter().any(|s| s.name == name) {
            return Err(SemanticError::AlreadyDeclared {
                name: name.value().to_string(),
            });
        }

        let values = vec![value; scope.paths.len()];

        Ok(scope.symbols.push(Symbol {
            name,
            ty,
            raw,
            values,
        }))
    }

    /// Most recently declared visible symbol with this name
    pub fn lookup(&self, name: InternedSymbol) -> Option<SymbolId> {
        self.top()
            .symbols
            .enumerate()
            .filter(|(_, symbol)| symbol.name == name)
            .last()
            .map(|(id, _)| id)
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.top().symbols[id]
    }

    /// The symbol's value on the current path
    pub fn read(&self, id: SymbolId) -> ValueRef {
        let scope = self.top();
        scope.symbols[id].values[scope.cursor]
    }

    pub fn assign(&mut self, id: SymbolId, value: ValueRef) {
        let scope = self.top_mut();
        let cursor = scope.cursor;

        scope.symbols[id].values[cursor] = value;
    }

    pub fn current_block(&self) -> BlockRef {
        let scope = self.top();
        scope.paths[scope.cursor].block
    }

    pub fn is_live(&self) -> bool {
        let scope = self.top();
        scope.paths[scope.cursor].live
    }

    /// Moves the current path on to `block`, e.g. once a condition has been
    /// branched on and the path continues in the body
    pub fn set_current_block(&mut self, block: BlockRef) {
        let scope = self.top_mut();
        let cursor = scope.cursor;

        scope.paths[cursor].block = block;
    }

    /// Marks the current path as returned. Anything emitted afterwards goes to
    /// `dead_block`.
    pub fn mark_dead(&mut self, dead_block: BlockRef) {
        let scope = self.top_mut();
        let cursor = scope.cursor;

        scope.paths[cursor] = OpenBlock {
            block: dead_block,
            live: false,
        };
    }

    /// Replaces the single open path with one path per arm block. Every
    /// symbol starts each arm with the value it had at the branch point.
    pub fn enter_branch_set(&mut self, blocks: &[BlockRef]) {
        let scope = self.top_mut();

        if scope.is_branching() {
            internal_inconsistency("entered a branch set while already branching");
        }

        let live = scope.paths[0].live;

        scope.paths = blocks.iter().map(|block| OpenBlock { block: *block, live }).collect();
        scope.cursor = 0;

        for symbol in scope.symbols.iter_mut() {
            symbol.values = vec![symbol.values[0]; blocks.len()];
        }
    }

    /// Splits the current path in two: the current path keeps its block and a
    /// new path emitting into `block` is inserted right after it with the same
    /// symbol values
    pub fn append_path(&mut self, block: BlockRef) {
        let scope = self.top_mut();
        let cursor = scope.cursor;
        let live = scope.paths[cursor].live;

        scope.paths.insert(cursor + 1, OpenBlock { block, live });

        for symbol in scope.symbols.iter_mut() {
            let value = symbol.values[cursor];
            symbol.values.insert(cursor + 1, value);
        }
    }

    /// Moves on to the next arm without merging
    pub fn advance_path(&mut self) {
        let scope = self.top_mut();

        if scope.cursor + 1 >= scope.paths.len() {
            internal_inconsistency("advanced past the last open path");
        }

        scope.cursor += 1;
    }

    /// Joins every open path into `merge_block`. Live paths that have not been
    /// terminated jump to the merge block and contribute one incoming edge per
    /// join, in path order. Dead paths are sealed with `unreachable`.
    pub fn merge<B: Backend>(&mut self, backend: &mut B, merge_block: BlockRef) {
        let scope = self.top_mut();
        scope.check_paths();

        let mut live_arms = Vec::new();

        for (index, path) in scope.paths.iter().enumerate() {
            if backend.is_terminated(path.block) {
                continue;
            }

            backend.set_insertion_point(path.block);

            if path.live {
                backend.emit_jump(merge_block);
                live_arms.push(index);
            } else {
                backend.emit_unreachable();
            }
        }

        backend.set_insertion_point(merge_block);

        log::trace!(
            "merging {} path(s), {} live, into {merge_block:?}",
            scope.paths.len(),
            live_arms.len()
        );

        for symbol in scope.symbols.iter_mut() {
            let merged = match live_arms.as_slice() {
                [] => backend.undefined_value(symbol.raw),
                _ if symbol.raw == RawType::Void => symbol.values[live_arms[0]],
                arms => {
                    let join = backend.create_join_node(symbol.raw, arms.len());

                    for arm in arms {
                        backend.add_incoming(join, symbol.values[*arm], scope.paths[*arm].block);
                    }

                    join
                }
            };

            symbol.values = vec![merged];
        }

        scope.paths = vec![OpenBlock {
            block: merge_block,
            live: !live_arms.is_empty(),
        }];
        scope.cursor = 0;
    }

    /// Jumps from the current block into a loop's condition block and gives
    /// every symbol a provisional join there. The edge from the end of the
    /// body is added by [`ScopeStack::close_loop`].
    pub fn enter_loop<B: Backend>(&mut self, backend: &mut B, condition: BlockRef) -> LoopHeader {
        let scope = self.top_mut();
        scope.check_paths();

        if scope.is_branching() {
            internal_inconsistency("entered a loop while branching");
        }

        let pre_header = scope.paths[0].block;
        let live = scope.paths[0].live;

        if !backend.is_terminated(pre_header) {
            backend.set_insertion_point(pre_header);
            backend.emit_jump(condition);
        }

        backend.set_insertion_point(condition);

        let mut joins = Vec::new();

        for (index, symbol) in scope.symbols.iter_mut().enumerate() {
            if symbol.raw == RawType::Void {
                continue;
            }

            let join = backend.create_join_node(symbol.raw, 2);
            backend.add_incoming(join, symbol.values[0], pre_header);

            symbol.values[0] = join;
            joins.push((SymbolId(index as u32), join));
        }

        scope.paths[0].block = condition;

        LoopHeader {
            condition,
            joins,
            live,
        }
    }

    /// Adds the back edge from the current block (the end of the loop body)
    /// to the condition block and continues in `exit`, where every symbol
    /// holds its condition block join
    pub fn close_loop<B: Backend>(&mut self, backend: &mut B, header: LoopHeader, exit: BlockRef) {
        let scope = self.top_mut();

        if scope.is_branching() {
            internal_inconsistency("closed a loop while branching");
        }

        let body_end = scope.paths[0];

        if body_end.live && !backend.is_terminated(body_end.block) {
            backend.set_insertion_point(body_end.block);
            backend.emit_jump(header.condition);

            for (id, join) in &header.joins {
                backend.add_incoming(*join, scope.symbols[*id].values[0], body_end.block);
            }
        } else if !backend.is_terminated(body_end.block) {
            backend.set_insertion_point(body_end.block);
            backend.emit_unreachable();
        }

        for (id, join) in header.joins {
            scope.symbols[id].values[0] = join;
        }

        // The exit is reached from the condition block, so it is live exactly
        // when the loop was entered from a live path
        scope.paths[0] = OpenBlock {
            block: exit,
            live: header.live,
        };

        backend.set_insertion_point(exit);
    }
}

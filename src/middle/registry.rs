//! Owns every function and structure type. Composites are interned by
//! structural equality so the rest of the compiler can compare them by handle.

use hashbrown::HashMap;
use itertools::Itertools;
use thiserror::Error;

use crate::{
    backend::{Backend, FunctionRef, FunctionSignature, RawType, StructRef},
    index::IndexVec,
    intern::InternedSymbol,
    middle::{
        conversion,
        ty::{CompositeId, CompositeType, Typename, TypenameKind},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendHandle {
    Function(FunctionRef),
    Structure(StructRef),
}

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub ty: CompositeType,
    pub handle: BackendHandle,
    /// Whether a body has been emitted for this function
    pub defined: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no viable candidate")]
    Undefined,

    #[error("{} equally good candidates", .0.len())]
    Ambiguous(Vec<CompositeId>),
}

#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: IndexVec<CompositeId, RegistryEntry>,
    by_key: HashMap<String, Vec<CompositeId>>,
    by_name: HashMap<InternedSymbol, Vec<CompositeId>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, id: CompositeId) -> &RegistryEntry {
        &self.entries[id]
    }

    pub fn composite(&self, id: CompositeId) -> &CompositeType {
        &self.entries[id].ty
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn function_handle(&self, id: CompositeId) -> Option<FunctionRef> {
        match self.entries[id].handle {
            BackendHandle::Function(function) => Some(function),
            BackendHandle::Structure(_) => None,
        }
    }

    /// Marks a function as having a body. Returns whether it already had one.
    pub fn mark_defined(&mut self, id: CompositeId) -> bool {
        std::mem::replace(&mut self.entries[id].defined, true)
    }

    /// Returns the existing entry if a structurally equal composite was
    /// interned before. Otherwise the candidate is declared on the backend and
    /// stored.
    pub fn intern<B: Backend>(&mut self, backend: &mut B, candidate: CompositeType) -> CompositeId {
        let key = candidate.mangled(self);

        if let Some(existing) = self
            .by_key
            .get(&key)
            .and_then(|ids| ids.iter().find(|id| self.entries[**id].ty == candidate))
        {
            return *existing;
        }

        let handle = match &candidate {
            CompositeType::Function {
                name,
                parameters,
                return_type,
                receiver,
            } => {
                let parameters = (!receiver.is_void())
                    .then_some(receiver)
                    .into_iter()
                    .chain(parameters.iter().map(|p| &p.ty))
                    .map(|ty| self.raw_type(*ty))
                    .collect();

                BackendHandle::Function(backend.declare_function(FunctionSignature {
                    symbol: *name,
                    parameters,
                    return_type: self.raw_type(*return_type),
                }))
            }
            CompositeType::Structure { name, members } => {
                let members = members.iter().map(|m| self.raw_type(m.ty)).collect();

                BackendHandle::Structure(backend.declare_structure(*name, members))
            }
        };

        let symbol = candidate.symbol();
        let id = self.entries.push(RegistryEntry {
            ty: candidate,
            handle,
            defined: false,
        });

        log::debug!("interned composite {key} as {id:?}");

        self.by_key.entry(key).or_default().push(id);
        self.by_name.entry(symbol).or_default().push(id);

        id
    }

    /// The most recently declared structure with this name
    pub fn find_structure(&self, name: &str) -> Option<CompositeId> {
        let symbol = InternedSymbol::new(name);

        self.by_name.get(&symbol)?.iter().rev().copied().find(|id| {
            matches!(self.entries[*id].ty, CompositeType::Structure { .. })
        })
    }

    /// Every function declared with this name, in declaration order
    pub fn functions_named(&self, name: &str) -> Vec<CompositeId> {
        let symbol = InternedSymbol::new(name);

        self.by_name
            .get(&symbol)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|id| self.entries[*id].ty.is_function())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn raw_type(&self, ty: Typename) -> RawType {
        if ty.is_pointer() {
            return RawType::Pointer;
        }

        match ty.kind {
            TypenameKind::Unset => RawType::Void,
            TypenameKind::Primitive(primitive) => primitive.raw_type(),
            TypenameKind::Composite(id) => match self.entries[id].handle {
                BackendHandle::Structure(structure) => RawType::Struct(structure),
                // Function values are code pointers
                BackendHandle::Function(_) => RawType::Pointer,
            },
        }
    }

    /// Picks the free function `name` the arguments convert to most cheaply.
    ///
    /// Candidates are ranked by total conversion distance first and total
    /// width change second, so `f(int8)` prefers `f(int16)` over `f(int32)`.
    /// Candidates with equal rank are ambiguous regardless of declaration order.
    pub fn resolve_call(&self, name: &str, arguments: &[Typename]) -> Result<CompositeId, ResolveError> {
        self.resolve(name, &Typename::VOID, arguments)
    }

    /// Like [`TypeRegistry::resolve_call`], but for functions declared with
    /// the given receiver type
    pub fn resolve_method_call(
        &self,
        receiver: &Typename,
        name: &str,
        arguments: &[Typename],
    ) -> Result<CompositeId, ResolveError> {
        self.resolve(name, receiver, arguments)
    }

    fn resolve(
        &self,
        name: &str,
        receiver: &Typename,
        arguments: &[Typename],
    ) -> Result<CompositeId, ResolveError> {
        let ranked = self
            .functions_named(name)
            .into_iter()
            .filter_map(|id| {
                let CompositeType::Function {
                    parameters,
                    receiver: candidate_receiver,
                    ..
                } = &self.entries[id].ty
                else {
                    return None;
                };

                if candidate_receiver != receiver || parameters.len() != arguments.len() {
                    return None;
                }

                let mut distance = 0;
                let mut widening = 0;

                for (argument, parameter) in arguments.iter().zip(parameters) {
                    distance += conversion::distance(self, *argument, parameter.ty)?;
                    widening += width_change(*argument, parameter.ty);
                }

                Some(((distance, widening), id))
            })
            .collect_vec();

        let Some(best) = ranked.iter().map(|(rank, _)| *rank).min() else {
            return Err(ResolveError::Undefined);
        };

        let winners = ranked
            .into_iter()
            .filter(|(rank, _)| *rank == best)
            .map(|(_, id)| id)
            .collect_vec();

        match winners.as_slice() {
            [id] => Ok(*id),
            _ => Err(ResolveError::Ambiguous(winners)),
        }
    }
}

fn width_change(from: Typename, to: Typename) -> u32 {
    match (from.as_primitive(), to.as_primitive()) {
        (Some(from), Some(to)) => from.bitwidth().abs_diff(to.bitwidth()),
        _ => 0,
    }
}

use itertools::Itertools;

use crate::{
    index::simple_index,
    intern::InternedSymbol,
    middle::{primitive::PrimitiveType, registry::TypeRegistry},
};

simple_index! {
    /// Handle to a function or structure type owned by the [`TypeRegistry`]
    pub struct CompositeId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypenameKind {
    /// The type of an expression that could not be computed. An error has
    /// already been reported, so operations on it are skipped silently.
    Unset,
    Primitive(PrimitiveType),
    Composite(CompositeId),
}

/// A fully resolved type as seen by expressions and symbols. Composites are
/// interned, so comparing handles is structural equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Typename {
    pub kind: TypenameKind,
    pub pointer_count: u32,
}

impl Typename {
    pub const UNSET: Self = Self {
        kind: TypenameKind::Unset,
        pointer_count: 0,
    };

    pub const VOID: Self = Self::primitive(PrimitiveType::VOID);

    pub const BOOLEAN: Self = Self::primitive(PrimitiveType::BOOLEAN);

    pub const fn primitive(primitive: PrimitiveType) -> Self {
        Self {
            kind: TypenameKind::Primitive(primitive),
            pointer_count: 0,
        }
    }

    pub const fn composite(id: CompositeId) -> Self {
        Self {
            kind: TypenameKind::Composite(id),
            pointer_count: 0,
        }
    }

    #[must_use]
    pub fn pointer_to(self) -> Self {
        Self {
            pointer_count: self.pointer_count + 1,
            ..self
        }
    }

    pub fn is_unset(&self) -> bool {
        self.kind == TypenameKind::Unset
    }

    pub fn is_void(&self) -> bool {
        *self == Self::VOID
    }

    pub fn is_pointer(&self) -> bool {
        self.pointer_count > 0
    }

    /// The primitive this typename names, as long as it isn't behind a pointer
    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self.kind {
            TypenameKind::Primitive(primitive) if self.pointer_count == 0 => Some(primitive),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<CompositeId> {
        match self.kind {
            TypenameKind::Composite(id) if self.pointer_count == 0 => Some(id),
            _ => None,
        }
    }

    pub fn name(&self, registry: &TypeRegistry) -> String {
        let base = match self.kind {
            TypenameKind::Unset => "<unset>".to_string(),
            TypenameKind::Primitive(primitive) => primitive.to_string(),
            TypenameKind::Composite(id) => registry.composite(id).name(registry),
        };

        format!("{base}{}", "@".repeat(self.pointer_count as usize))
    }
}

impl From<PrimitiveType> for Typename {
    fn from(value: PrimitiveType) -> Self {
        Self::primitive(value)
    }
}

/// A named, typed slot: a parameter or a structure member
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Declaration {
    pub ty: Typename,
    pub name: InternedSymbol,
}

impl Declaration {
    pub fn new(ty: Typename, name: &str) -> Self {
        Self {
            ty,
            name: InternedSymbol::new(name),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CompositeType {
    Function {
        name: InternedSymbol,
        parameters: Vec<Declaration>,
        return_type: Typename,
        /// Void for free functions
        receiver: Typename,
    },
    Structure {
        name: InternedSymbol,
        members: Vec<Declaration>,
    },
}

impl CompositeType {
    pub fn function(
        name: &str,
        parameters: Vec<Declaration>,
        return_type: Typename,
        receiver: Typename,
    ) -> Self {
        Self::Function {
            name: InternedSymbol::new(name),
            parameters,
            return_type,
            receiver,
        }
    }

    pub fn structure(name: &str, members: Vec<Declaration>) -> Self {
        Self::Structure {
            name: InternedSymbol::new(name),
            members,
        }
    }

    pub fn symbol(&self) -> InternedSymbol {
        match self {
            CompositeType::Function { name, .. } | CompositeType::Structure { name, .. } => *name,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, CompositeType::Function { .. })
    }

    /// Human readable name. Functions print as `recv::name(p1,p2)->ret`, with
    /// the receiver omitted for free functions.
    pub fn name(&self, registry: &TypeRegistry) -> String {
        match self {
            CompositeType::Function {
                name,
                parameters,
                return_type,
                receiver,
            } => {
                let receiver = if receiver.is_void() {
                    String::new()
                } else {
                    format!("{}::", receiver.name(registry))
                };

                format!(
                    "{receiver}{name}({})->{}",
                    parameters.iter().map(|p| p.ty.name(registry)).join(","),
                    return_type.name(registry)
                )
            }
            CompositeType::Structure { name, .. } => name.value().to_string(),
        }
    }

    /// Lookup key for the registry. Covers every type that takes part in
    /// structural equality, and nothing else.
    pub fn mangled(&self, registry: &TypeRegistry) -> String {
        match self {
            CompositeType::Function { .. } => self.name(registry),
            CompositeType::Structure { name, members } => format!(
                "{name}{{{}}}",
                members.iter().map(|m| m.ty.name(registry)).join(",")
            ),
        }
    }
}

impl PartialEq for CompositeType {
    /// Declaration names don't take part in equality
    fn eq(&self, other: &Self) -> bool {
        let types = |declarations: &[Declaration]| declarations.iter().map(|d| d.ty).collect_vec();

        match (self, other) {
            (
                CompositeType::Function {
                    name: a_name,
                    parameters: a_parameters,
                    return_type: a_return,
                    receiver: a_receiver,
                },
                CompositeType::Function {
                    name: b_name,
                    parameters: b_parameters,
                    return_type: b_return,
                    receiver: b_receiver,
                },
            ) => {
                a_name == b_name
                    && a_return == b_return
                    && a_receiver == b_receiver
                    && types(a_parameters) == types(b_parameters)
            }
            (
                CompositeType::Structure {
                    name: a_name,
                    members: a_members,
                },
                CompositeType::Structure {
                    name: b_name,
                    members: b_members,
                },
            ) => a_name == b_name && types(a_members) == types(b_members),
            _ => false,
        }
    }
}

impl Eq for CompositeType {}

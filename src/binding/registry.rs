//! Type descriptor registry - one process-wide id per native type
//!
//! Maps Rust `TypeId`s to compact descriptors the foreign side can use to
//! decide how to read and produce wire slots. Entries are created lazily on
//! first use and never removed.

use crate::logging::trace;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::{type_name, TypeId};

/// Global registry shared by every runtime in the process
static REGISTRY: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::new);

/// Process-wide identifier of a native type
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeDescriptor(u32);

impl TypeDescriptor {
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Registered metadata for this descriptor
    #[inline]
    pub fn info(self) -> Option<TypeInfo> {
        REGISTRY.info(self)
    }
}

/// How a type travels through wire slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireKind {
    /// No payload (method return only)
    Void,
    /// 0 or 1 in the first word
    Bool,
    /// Sign-extended to 32 bits when `bytes <= 4`, full 64-bit pattern otherwise
    Integer { signed: bool, bytes: u8 },
    /// `f32` in the first word or a full `f64`
    Float { bytes: u8 },
    /// Address bits
    Pointer,
    /// Foreign reference; ownership passes with the slot
    Value,
    /// String handle outbound, runtime-owned buffer inbound
    Text,
    /// Descriptor word pair followed by a data pointer
    MemoryView,
    /// Filter type for capability checks; never carried in slots
    Interface,
}

impl WireKind {
    /// Slots occupied by one value of this kind
    pub const fn slots(self) -> usize {
        match self {
            Self::Void | Self::Interface => 0,
            Self::MemoryView => 2,
            _ => 1,
        }
    }
}

/// Metadata recorded for a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub descriptor: TypeDescriptor,
    pub name: &'static str,
    pub kind: WireKind,
}

/// Append-only `TypeId` -> descriptor table
pub struct TypeRegistry {
    by_type: DashMap<TypeId, TypeDescriptor>,
    infos: RwLock<Vec<TypeInfo>>,
}

impl TypeRegistry {
    fn new() -> Self {
        Self {
            by_type: DashMap::with_capacity(64),
            infos: RwLock::new(Vec::with_capacity(64)),
        }
    }

    /// The process-wide registry
    #[inline]
    pub fn global() -> &'static Self {
        &REGISTRY
    }

    /// Descriptor for `K`, registering it with `kind` on first use
    ///
    /// The kind passed on later calls is ignored; the first registration wins.
    pub fn descriptor_for<K: ?Sized + 'static>(&self, kind: WireKind) -> TypeDescriptor {
        let key = TypeId::of::<K>();

        // Fast path: already registered
        if let Some(descriptor) = self.by_type.get(&key) {
            return *descriptor;
        }

        // Slow path: the entry lock keeps concurrent first uses from
        // assigning two ids to one type
        *self.by_type.entry(key).or_insert_with(|| {
            let mut infos = self.infos.write();
            let descriptor = TypeDescriptor(infos.len() as u32 + 1);
            let name = type_name::<K>();
            infos.push(TypeInfo { descriptor, name, kind });

            trace!(event = "type_registered", descriptor = descriptor.0, name, ?kind);
            descriptor
        })
    }

    /// Metadata for `descriptor`, if it was issued by this registry
    pub fn info(&self, descriptor: TypeDescriptor) -> Option<TypeInfo> {
        let index = (descriptor.0 as usize).checked_sub(1)?;
        self.infos.read().get(index).copied()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.infos.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Descriptor of an interface type used as a `has_function` filter
pub fn interface_descriptor<I: ?Sized + 'static>() -> TypeDescriptor {
    REGISTRY.descriptor_for::<I>(WireKind::Interface)
}

/// Force registry initialisation
pub(crate) fn init() {
    Lazy::force(&REGISTRY);
}

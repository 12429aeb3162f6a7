//! Argument lists - tuples as heterogeneous, statically-typed call arguments
//!
//! Design: the descriptor list and the slot layout are both derived from the
//! same tuple type, so a call site can never hand the runtime a pack that
//! disagrees with the signature it announced.

use super::{BindingType, FromWire, IntoWire};
use crate::boundary::{Boundary, Descriptors};
use crate::wire::{WirePack, WireValue};

/// An ordered argument list that can be encoded into a `WirePack`
pub trait ArgList {
    /// Number of arguments
    const LEN: usize;

    /// Total slots occupied by the encoded arguments
    const SLOTS: usize;

    /// Descriptors in argument order
    fn descriptors() -> Descriptors;

    /// Convert every argument and write the slots in argument order
    fn encode(self, boundary: &dyn Boundary) -> WirePack;
}

/// Descriptor list for a method stub: return type first, then arguments
pub fn signature<R: FromWire, A: ArgList>() -> Descriptors {
    let mut descriptors = Descriptors::with_capacity(A::LEN + 1);
    descriptors.push(R::descriptor());
    descriptors.extend(A::descriptors());
    descriptors
}

macro_rules! count {
    () => { 0usize };
    ($head:ident $($tail:ident)*) => { 1usize + count!($($tail)*) };
}

macro_rules! arg_list_tuples {
    ($( ( $($name:ident),* ) ),* $(,)?) => {$(
        impl<$($name: IntoWire),*> ArgList for ($($name,)*) {
            const LEN: usize = count!($($name)*);
            const SLOTS: usize = 0 $(+ <<$name as BindingType>::Wire as WireValue>::SLOTS)*;

            #[allow(unused_mut)]
            fn descriptors() -> Descriptors {
                let mut descriptors = Descriptors::new();
                $(descriptors.push($name::descriptor());)*
                descriptors
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn encode(self, boundary: &dyn Boundary) -> WirePack {
                let ($($name,)*) = self;
                let mut pack = WirePack::with_capacity(<Self as ArgList>::SLOTS);
                $($name.into_wire(boundary).write(&mut pack);)*
                debug_assert_eq!(pack.len(), <Self as ArgList>::SLOTS);
                pack
            }
        }
    )*};
}

arg_list_tuples! {
    (),
    (A1),
    (A1, A2),
    (A1, A2, A3),
    (A1, A2, A3, A4),
    (A1, A2, A3, A4, A5),
    (A1, A2, A3, A4, A5, A6),
    (A1, A2, A3, A4, A5, A6, A7),
    (A1, A2, A3, A4, A5, A6, A7, A8),
    (A1, A2, A3, A4, A5, A6, A7, A8, A9),
    (A1, A2, A3, A4, A5, A6, A7, A8, A9, A10),
}

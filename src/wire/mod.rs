//! Wire layer - fixed-size slots and argument packs
//!
//! Architecture:
//! - `slot.rs` - the 8-byte `WireSlot` union
//! - `pack.rs` - `WirePack` buffers and the `WireValue` writing protocol
//! - `repr.rs` - composite representations (text, memory views)

mod slot;
mod pack;
mod repr;

pub use slot::WireSlot;
pub use pack::{SingleSlot, WirePack, WireValue};
pub use repr::{MemoryViewWire, TextWire, ViewElementKind, WireBuffer};

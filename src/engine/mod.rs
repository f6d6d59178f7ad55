//! Движок снимков: кодек RDB, пакетный обход значений и пул отложенного
//! освобождения.

pub mod iterator;
pub mod lazyfree;
pub mod rdb;

pub use iterator::{slots_per_element, BatchIterator, Slot, SlotIter};
pub use lazyfree::{FreeEffort, LazyFreePool};
pub use rdb::*;

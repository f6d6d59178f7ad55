//! Контейнеры в памяти, в которые материализуются объекты снимка.

pub mod element;
pub mod intset;
pub mod quicklist;
pub mod skiplist;
pub mod types;
pub mod ziplist;
pub mod zset;

pub use element::*;
pub use intset::*;
pub use quicklist::*;
pub use skiplist::*;
pub use types::*;
pub use ziplist::*;
pub use zset::*;

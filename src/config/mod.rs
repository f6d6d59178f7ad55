//! Пороги кодирования и параметры пула отложенного освобождения.

pub mod settings;

pub use settings::*;

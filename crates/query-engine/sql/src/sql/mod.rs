//! A find query plan, and the conversion of that plan to a parameterized SQL string.

pub mod ast;
pub mod convert;
pub mod error;
pub mod helpers;
pub mod string;

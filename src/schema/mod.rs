//! Plain data types shared by the graph, the parser and the interpreter.

pub mod design;
pub mod instruction;
pub mod node;

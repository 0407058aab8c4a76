// src/core/mod.rs

pub mod corpus;
pub mod trie;
pub mod types;

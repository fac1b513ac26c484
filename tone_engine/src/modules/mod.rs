pub mod assembler;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod recognizer;
pub mod resolver;
pub mod selector;
pub mod synthesizer;
pub mod tables;
pub mod text;

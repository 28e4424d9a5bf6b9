pub mod embedder;
pub mod predict;
pub mod retrieve;
pub mod teach;

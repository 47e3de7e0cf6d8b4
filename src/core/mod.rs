pub mod classify;
pub mod graph;
pub mod inference;
pub mod record;
pub mod rules;
pub mod types;

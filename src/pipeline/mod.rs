//! Gate Pipeline Module
//!
//! The three stages a SQL change script passes through before anyone runs it:
//!
//! 1. **Rules**: lexical screening of the SQL text into findings
//! 2. **Decision**: approve or block, and on approval back up the snapshot
//!    and write a rollback stub
//! 3. **Orchestrator**: run a batch, record it in the history log

pub mod artifacts;
pub mod decision;
pub mod history;
pub mod orchestrator;
pub mod rules;
pub mod types;

// Re-export main types for convenient access
pub use orchestrator::Orchestrator;
pub use rules::RulesEngine;

// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # hdkb
//!
//! A theory-driven symbolic knowledge base. Facts are typed relational
//! statements encoded as hyperdimensional vectors; relation semantics
//! (transitivity, symmetry, inheritance, exclusion, inverses) come from
//! declarative theory text and from facts asserted at runtime.
//!
//! ## Architecture
//!
//! - **VSA core** (`vsa`): bit-packed hypervectors, bind/bundle/similarity, vocabulary
//! - **DSL** (`dsl`): statement AST and a line-oriented parser
//! - **Semantic index** (`semantic`): relation properties from theories and live facts
//! - **Canonicalizer** (`canonical`): synonym closure and surface rewrites
//! - **Fact store** (`kb`): ordered fact log with rebuildable exact-match indices
//! - **Contradiction engine** (`contradiction`): direct and derived conflict checks
//! - **Reasoners** (`reason`): backward chaining over relations and `Implies` rules
//! - **Executor** (`exec`): the per-statement pipeline
//! - **Solve** (`solve`): constraint problems and plans over KB facts
//! - **Session** (`session`): atomic `learn`, `query`, `prove`
//!
//! ## Library usage
//!
//! ```no_run
//! use hdkb::config::SessionConfig;
//! use hdkb::session::Session;
//!
//! let mut session = Session::new(SessionConfig::default()).unwrap();
//! let learned = session.learn(
//!     "__TransitiveRelation isA\nisA Poodle Dog\nisA Dog Animal",
//! );
//! assert!(learned.success);
//! let proof = session.prove("isA Poodle Animal").unwrap();
//! assert!(proof.valid());
//! ```

pub mod canonical;
pub mod config;
pub mod contradiction;
pub mod dsl;
pub mod error;
pub mod exec;
pub mod kb;
pub mod proof;
pub mod reason;
pub mod scope;
pub mod semantic;
pub mod session;
pub mod solve;
pub mod vsa;

pub use error::{KbError, KbResult};
pub use session::Session;

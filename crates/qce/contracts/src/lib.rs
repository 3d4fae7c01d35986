//! Contract Resolver for QCE
//!
//! A [`Contract`] binds a question to its ordered analysis methods, the
//! evidence shape it expects, and its validation and failure policy.
//! Contracts come from a [`ContractStore`] as raw JSON, are validated once,
//! and are then shared read-only as `Arc<Contract>` through the
//! [`ContractResolver`] cache.
//!
//! Ordering rules:
//!
//! - `pipeline` contracts reject two methods with the same priority.
//! - `ensemble` contracts accept ties and break them by declaration order.
//! - `single` contracts declare exactly one method.

#![deny(unsafe_code)]

pub mod error;
pub mod model;
pub mod resolver;
pub mod store;

pub use error::{ContractError, ContractResult};
pub use model::{
    AssemblyRule, Contract, ExpectedEvidence, FailurePolicy, FieldType, MergeStrategy, MethodSpec,
    MustContain, NaPolicy, NumericRange, Orchestration, ShouldContain, ValidationRule,
    REQUIRED_FIELDS,
};
pub use resolver::ContractResolver;
pub use store::{ContractStore, DirectoryContractStore, InMemoryContractStore};

//! A generic repository abstraction over typed entity data sources.
//!
//! This crate is the core of the repolayer project and provides:
//!
//! - **Entity model** ([`entity`]) - The [`Entity`](entity::Entity) trait and record id conventions
//! - **Repository** ([`repository`]) - The validated CRUD and query surface shared by every backend
//! - **Backend abstraction** ([`backend`]) - Traits for implementing staging and persistence backends
//! - **Specifications** ([`specification`]) - Composable query trees with sort, cap and include hints
//! - **Visitors** ([`visitor`]) - Conversion of specification trees into executable predicates
//! - **Queries** ([`query`]) - Compiled specifications handed to backends
//! - **Sorting** ([`sort`]) - Sort keys and prioritized sort rules
//! - **Equality** ([`equality`]) - Record id and reference equality helpers
//! - **Validation** ([`validation`]) - Pluggable validators run before staging
//! - **Data source overrides** ([`source`]) - Per-call backend configuration
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use repolayer_core::entity::{Entity, RecordId};
//!
//! #[derive(Debug, Clone, Default)]
//! pub struct Customer {
//!     pub record_id: RecordId,
//!     pub name: String,
//! }
//!
//! impl Entity for Customer {
//!     fn record_id(&self) -> RecordId {
//!         self.record_id
//!     }
//!
//!     fn set_record_id(&mut self, record_id: RecordId) {
//!         self.record_id = record_id;
//!     }
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as repolayer_core;

pub mod backend;
pub mod entity;
pub mod equality;
pub mod error;
pub mod query;
pub mod repository;
pub mod sort;
pub mod source;
pub mod specification;
pub mod validation;
pub mod visitor;

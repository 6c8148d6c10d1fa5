//! Service layer for the items resource.
//! - `items`: request descriptor in, response descriptor out; owns all business rules.
//! - `storage`: key-value store abstraction with atomic conditional writes.
//! - `errors`: error taxonomy and its HTTP status mapping.

pub mod errors;
pub mod items;
pub mod storage;

//! Application layer: the mutation coordinator that ties the ledger, the
//! task engine, the snapshot store, and the update broadcast together.

pub mod engine;

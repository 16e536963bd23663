//! Entity Store: durable users, medications, alarms and dose history

mod schema;
mod store;

pub use store::EntityStore;

//! Infrastructure adapters for the reconciliation ports.

#![forbid(unsafe_code)]

mod console_confirmation_gate;
mod in_memory_role_store;
mod mongo_connection;
mod mongo_role_store;
mod mongo_team_source;
mod postgres_role_store;

pub use console_confirmation_gate::ConsoleConfirmationGate;
pub use in_memory_role_store::InMemoryRoleStore;
pub use mongo_connection::MongoConnection;
pub use mongo_role_store::MongoRoleStore;
pub use mongo_team_source::MongoTeamSource;
pub use postgres_role_store::PostgresRoleStore;

//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_automation_repository;
mod in_memory_object_store;
mod postgres_automation_repository;
mod postgres_object_store;
mod redis_scheduler_lease_coordinator;

pub use in_memory_automation_repository::InMemoryAutomationRepository;
pub use in_memory_object_store::{InMemoryObjectStore, ObjectSeed};
pub use postgres_automation_repository::PostgresAutomationRepository;
pub use postgres_object_store::PostgresObjectStore;
pub use redis_scheduler_lease_coordinator::RedisSchedulerLeaseCoordinator;

/// Builds a case-insensitive `LIKE` pattern matching `value` as a literal substring.
pub(crate) fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for character in value.chars() {
        if matches!(character, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(character);
    }
    escaped.push('%');
    escaped
}

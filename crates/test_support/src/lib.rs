//! Container helpers for integration tests.
//!
//! Tests call [`runtime::ensure_container_runtime`] first and skip when no
//! Docker or Podman socket is reachable.

pub mod postgres;
pub mod runtime;

use uuid::Uuid;

/// Docker network shared by the containers of one test.
#[derive(Debug, Clone)]
pub struct TestNetwork {
    name: String,
}

impl TestNetwork {
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        Self {
            name: unique_name(prefix),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

use crate::error::{Operation, WorkflowError};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Single-flight gate: at most one permit exists at a time.
#[derive(Debug, Clone)]
pub struct SingleFlight {
    op: Operation,
    gate: Arc<Semaphore>,
}

/// Held for the lifetime of one in-flight request; dropping it reopens the gate.
#[derive(Debug)]
pub struct FlightPermit {
    _permit: OwnedSemaphorePermit,
}

impl SingleFlight {
    pub fn new(op: Operation) -> Self {
        Self {
            op,
            gate: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn try_acquire(&self) -> Result<FlightPermit, WorkflowError> {
        self.gate
            .clone()
            .try_acquire_owned()
            .map(|permit| FlightPermit { _permit: permit })
            .map_err(|_| WorkflowError::Busy(self.op))
    }

    pub fn is_busy(&self) -> bool {
        self.gate.available_permits() == 0
    }
}

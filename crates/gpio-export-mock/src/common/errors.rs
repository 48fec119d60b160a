//! Error injection framework for the mock collaborators.
//!
//! Enables deterministic failures at any step of setup or access so that
//! skip, rollback and fault paths can be driven from tests.

use gpio_export_core::{LineId, ProviderError, PublishError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Error injection configuration shared by the mock collaborators.
#[derive(Clone, Debug, Default)]
pub struct ErrorConfig {
    /// Failure scenarios, checked in order
    scenarios: Arc<Vec<ErrorScenario>>,
    /// Operation counters for FailAfterN scenarios
    counts: Arc<Mutex<HashMap<&'static str, u32>>>,
}

/// A single injected failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorScenario {
    /// `acquire` of `line` reports the line as already in use
    Busy { line: LineId },
    /// `acquire` of `line` reports the provider as not ready yet
    Deferred { line: LineId },
    /// `acquire` of `line` fails while configuring it
    AcquireFault { line: LineId },
    /// `read` of `line` fails
    ReadFault { line: LineId },
    /// `write` of `line` fails
    WriteFault { line: LineId },
    /// Operation `"read"`/`"write"` succeeds `count` times, then fails
    FailAfterN { operation: &'static str, count: u32 },
    /// Any namespace node or link called `name` is refused
    RejectNode { name: String },
}

impl ErrorConfig {
    /// Create error config with no errors (default)
    pub fn none() -> Self {
        Self::default()
    }

    /// Create error config with a single scenario
    pub fn scenario(scenario: ErrorScenario) -> Self {
        Self::scenarios(vec![scenario])
    }

    /// Create error config with multiple scenarios
    pub fn scenarios(scenarios: Vec<ErrorScenario>) -> Self {
        Self {
            scenarios: Arc::new(scenarios),
            counts: Arc::default(),
        }
    }

    /// Check whether acquiring `line` should fail.
    pub fn check_acquire(&self, line: LineId) -> Result<(), ProviderError> {
        for scenario in self.scenarios.iter() {
            match scenario {
                ErrorScenario::Busy { line: l } if *l == line => {
                    return Err(ProviderError::Busy { line });
                }
                ErrorScenario::Deferred { line: l } if *l == line => {
                    return Err(ProviderError::Deferred {
                        reason: format!("controller of line {} not ready yet", line),
                    });
                }
                ErrorScenario::AcquireFault { line: l } if *l == line => {
                    return Err(ProviderError::Fault {
                        line,
                        message: "injected configuration fault".into(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Check whether a `"read"` or `"write"` of `line` should fail.
    pub fn check_access(&self, operation: &'static str, line: LineId) -> Result<(), ProviderError> {
        let mut counts = self.counts.lock();

        for scenario in self.scenarios.iter() {
            match scenario {
                ErrorScenario::ReadFault { line: l } if operation == "read" && *l == line => {
                    return Err(fault(line, "injected read fault"));
                }
                ErrorScenario::WriteFault { line: l } if operation == "write" && *l == line => {
                    return Err(fault(line, "injected write fault"));
                }
                ErrorScenario::FailAfterN {
                    operation: op,
                    count,
                } if *op == operation => {
                    let current = counts.entry(operation).or_insert(0);
                    *current += 1;
                    if *current > *count {
                        return Err(fault(
                            line,
                            &format!("injected failure after {} operations", count),
                        ));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Check whether creating a node or link called `name` should fail.
    pub fn check_publish(&self, name: &str) -> Result<(), PublishError> {
        let rejected = self
            .scenarios
            .iter()
            .any(|s| matches!(s, ErrorScenario::RejectNode { name: n } if n == name));

        if rejected {
            return Err(PublishError::Rejected {
                name: name.to_string(),
                reason: "injected publish failure".into(),
            });
        }
        Ok(())
    }

    /// Reset error state (clear counters)
    pub fn reset(&self) {
        self.counts.lock().clear();
    }
}

fn fault(line: LineId, message: &str) -> ProviderError {
    ProviderError::Fault {
        line,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_errors() {
        let config = ErrorConfig::none();
        for i in 0..100 {
            assert!(config.check_acquire(LineId(i)).is_ok());
            assert!(config.check_access("read", LineId(i)).is_ok());
        }
        assert!(config.check_publish("gpio").is_ok());
    }

    #[test]
    fn test_acquire_scenarios() {
        let config = ErrorConfig::scenarios(vec![
            ErrorScenario::Busy { line: LineId(1) },
            ErrorScenario::Deferred { line: LineId(2) },
            ErrorScenario::AcquireFault { line: LineId(3) },
        ]);

        assert!(matches!(
            config.check_acquire(LineId(1)),
            Err(ProviderError::Busy { .. })
        ));
        assert!(config.check_acquire(LineId(2)).unwrap_err().is_deferred());
        assert!(matches!(
            config.check_acquire(LineId(3)),
            Err(ProviderError::Fault { .. })
        ));
        assert!(config.check_acquire(LineId(4)).is_ok());
    }

    #[test]
    fn test_fail_after_n() {
        let config = ErrorConfig::scenario(ErrorScenario::FailAfterN {
            operation: "read",
            count: 3,
        });

        for i in 0..3 {
            assert!(
                config.check_access("read", LineId(0)).is_ok(),
                "Operation {} should succeed",
                i + 1
            );
        }
        assert!(config.check_access("read", LineId(0)).is_err());
        assert!(config.check_access("write", LineId(0)).is_ok());

        config.reset();
        assert!(config.check_access("read", LineId(0)).is_ok());
    }

    #[test]
    fn test_reject_node() {
        let config = ErrorConfig::scenario(ErrorScenario::RejectNode {
            name: "led1".into(),
        });
        assert!(matches!(
            config.check_publish("led1"),
            Err(PublishError::Rejected { .. })
        ));
        assert!(config.check_publish("led2").is_ok());
    }
}

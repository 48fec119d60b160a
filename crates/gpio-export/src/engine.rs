//! Acquisition & publication engine.
//!
//! [`Exporter::setup`] walks a [`LineSpecificationSet`] in order and, for
//! each entry:
//!
//! 1. resolves the source reference
//! 2. acquires the line with its initial direction/level
//! 3. publishes it as a leaf under the group root
//! 4. records the new [`AcquiredLine`] on the rollback ledger
//!
//! A failure in steps 1-3 is reported and the entry skipped. The one
//! exception is a provider that answers "not ready yet": the whole group is
//! rolled back and the caller gets a retryable [`SetupError::AcquireDeferred`].
//! If nothing was exported at the end, the group is rolled back and setup
//! fails with [`SetupError::NoLinesExported`].
//!
//! The engine never retries on its own.

use gpio_export_core::{
    DecodeError, EntryError, LineProvider, LineSpec, LineSpecificationSet, NamespacePublisher,
    ProviderError, PublishError, SetupError,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::group::{AcquiredLine, ExportGroup, SkippedLine};
use crate::ledger::{publish_or_release, Ledger, Resource};

/// Class registered for the group when none is configured.
pub const DEFAULT_CLASS: &str = "xbrother";

/// Name of the group root node when none is configured.
pub const DEFAULT_ROOT: &str = "gpio";

/// Alias the root is linked under when none is given.
pub const DEFAULT_ALIAS: &str = "xbrother";

/// Outcome of exporting one entry.
enum LineFailure {
    /// Report and continue
    Skip(EntryError),
    /// Roll back the whole group
    Defer(ProviderError),
}

/// Sets up export groups against a provider and a publisher.
pub struct Exporter {
    provider: Arc<dyn LineProvider>,
    publisher: Arc<dyn NamespacePublisher>,
    class_name: String,
    root_name: String,
}

impl Exporter {
    /// Create an exporter with the default class and root names.
    pub fn new(provider: Arc<dyn LineProvider>, publisher: Arc<dyn NamespacePublisher>) -> Self {
        Self {
            provider,
            publisher,
            class_name: DEFAULT_CLASS.to_string(),
            root_name: DEFAULT_ROOT.to_string(),
        }
    }

    /// Register the group under a different class.
    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    /// Name the group root node differently.
    pub fn with_root(mut self, root_name: impl Into<String>) -> Self {
        self.root_name = root_name.into();
        self
    }

    /// Acquire and publish every line in `specs`.
    ///
    /// `alias_name` defaults to [`DEFAULT_ALIAS`]. On error nothing created
    /// by this call remains visible.
    pub fn setup(
        &self,
        specs: LineSpecificationSet,
        alias_name: Option<&str>,
    ) -> Result<ExportGroup, SetupError> {
        let declared = specs.declared();
        let (specs, rejected) = specs.into_parts();
        let mut skipped: Vec<SkippedLine> = rejected
            .into_iter()
            .map(|r| SkippedLine {
                name: r.label,
                error: EntryError::SpecInvalid(r.error),
            })
            .collect();

        if specs.is_empty() {
            error!(declared, "No valid line declarations, nothing to export");
            return Err(SetupError::NoLinesExported {
                declared,
                skipped: skipped.len(),
            });
        }

        let alias_name = alias_name.unwrap_or(DEFAULT_ALIAS);
        let mut ledger = Ledger::new(Arc::clone(&self.publisher));

        if let Err(err) = self.publish_scaffold(&mut ledger, alias_name) {
            error!(class = %self.class_name, error = %err, "Failed to create export namespace");
            ledger.unwind();
            return Err(err.into());
        }
        let root_path = ledger
            .last_node()
            .map(|root| root.path().to_string())
            .unwrap_or_default();

        let mut lines = Vec::with_capacity(specs.len());
        for spec in specs {
            match self.export_line(&mut ledger, &spec) {
                Ok(line) => lines.push(line),
                Err(LineFailure::Skip(err)) => {
                    warn!(line = spec.name(), error = %err, "Skipping line");
                    skipped.push(SkippedLine {
                        name: Some(spec.name().to_string()),
                        error: err,
                    });
                }
                Err(LineFailure::Defer(cause)) => {
                    warn!(
                        line = spec.name(),
                        error = %cause,
                        acquired = lines.len(),
                        "Line provider not ready, rolling back export group"
                    );
                    ledger.unwind();
                    return Err(SetupError::AcquireDeferred {
                        line: spec.name().to_string(),
                        cause,
                    });
                }
            }
        }

        if lines.is_empty() {
            error!(declared, "No lines exported");
            ledger.unwind();
            return Err(SetupError::NoLinesExported {
                declared,
                skipped: skipped.len(),
            });
        }

        info!(
            exported = lines.len(),
            skipped = skipped.len(),
            alias = alias_name,
            "{} GPIO(s) exported",
            lines.len()
        );

        Ok(ExportGroup::new(
            alias_name.to_string(),
            root_path,
            lines,
            skipped,
            ledger,
        ))
    }

    /// Class node, root node under it, alias link to the root.
    fn publish_scaffold(&self, ledger: &mut Ledger, alias_name: &str) -> Result<(), PublishError> {
        let class = self.publisher.create_class(&self.class_name)?;
        let root = self.publisher.create_node(&class, &self.root_name);
        ledger.push(Resource::Node(class));

        let root = root?;
        let link = self.publisher.create_link(alias_name, &root);
        ledger.push(Resource::Node(root));

        ledger.push(Resource::Link(link?));
        debug!(
            class = %self.class_name,
            root = %self.root_name,
            alias = alias_name,
            "Export namespace created"
        );
        Ok(())
    }

    fn export_line(
        &self,
        ledger: &mut Ledger,
        spec: &LineSpec,
    ) -> Result<Arc<AcquiredLine>, LineFailure> {
        let line = self.provider.resolve(spec.source()).map_err(|cause| {
            LineFailure::Skip(EntryError::SpecInvalid(DecodeError::Unresolved {
                label: spec.name().to_string(),
                source_ref: spec.source().clone(),
                cause,
            }))
        })?;

        let handle = self
            .provider
            .acquire(line, spec.direction(), spec.name())
            .map_err(|err| {
                if err.is_deferred() {
                    LineFailure::Defer(err)
                } else {
                    LineFailure::Skip(EntryError::AcquireFailed(err))
                }
            })?;
        debug!(line = spec.name(), id = %line, direction = %spec.direction(), "Line acquired");

        let Some(root) = ledger.last_node() else {
            self.provider.release(handle);
            return Err(LineFailure::Skip(EntryError::PublishFailed(
                PublishError::NotFound(self.root_name.clone()),
            )));
        };

        let (handle, node) = publish_or_release(
            self.provider.as_ref(),
            self.publisher.as_ref(),
            root,
            spec.name(),
            handle,
            spec.direction_mutable(),
        )
        .map_err(|err| LineFailure::Skip(EntryError::PublishFailed(err)))?;
        debug!(line = spec.name(), path = node.path(), "Line published");

        let acquired = Arc::new(AcquiredLine::new(
            spec.clone(),
            handle,
            node,
            Arc::clone(&self.provider),
            Arc::clone(&self.publisher),
        ));
        ledger.push(Resource::Line(Arc::clone(&acquired)));
        Ok(acquired)
    }
}

/// Set up a group with the default class and root names.
pub fn setup(
    provider: Arc<dyn LineProvider>,
    publisher: Arc<dyn NamespacePublisher>,
    specs: LineSpecificationSet,
    alias_name: Option<&str>,
) -> Result<ExportGroup, SetupError> {
    Exporter::new(provider, publisher).setup(specs, alias_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpio_export_core::{LineDeclaration, LineId, SourceRef};
    use gpio_export_mock::{ErrorConfig, ErrorScenario, MockLineProvider, MockNamespace};
    use tracing_test::traced_test;

    fn decl(label: &str, offset: u32) -> LineDeclaration {
        LineDeclaration {
            label: Some(label.into()),
            gpios: Some(SourceRef::new("gpiochip0", offset)),
            ..Default::default()
        }
    }

    #[traced_test]
    #[test]
    fn test_skips_are_logged() {
        let group = setup(
            Arc::new(MockLineProvider::new()),
            Arc::new(MockNamespace::new()),
            LineSpecificationSet::decode(&[decl("good", 1), decl("gone", 99)]),
            None,
        )
        .unwrap();

        assert_eq!(group.len(), 1);
        assert!(logs_contain("Skipping line"));
        assert!(logs_contain("gone"));
        assert!(logs_contain("1 GPIO(s) exported"));
    }

    #[traced_test]
    #[test]
    fn test_deferred_is_logged() {
        let provider = MockLineProvider::builder()
            .chip("gpiochip0", 0, 8)
            .errors(ErrorConfig::scenario(ErrorScenario::Deferred { line: LineId(2) }))
            .build();

        let err = Exporter::new(Arc::new(provider), Arc::new(MockNamespace::new()))
            .setup(LineSpecificationSet::decode(&[decl("a", 1), decl("b", 2)]), None)
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(logs_contain("rolling back export group"));
    }
}

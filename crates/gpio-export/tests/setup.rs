//! Setup and rollback tests for the exporter, driven through the mocks.

use gpio_export::{Exporter, SetupError};
use gpio_export_core::{
    Direction, EntryError, LineDeclaration, LineId, LineSpecificationSet, ProviderError,
    PublishError, SourceRef,
};
use gpio_export_mock::{Call, CallLog, ErrorConfig, ErrorScenario, MockLineProvider, MockNamespace};
use std::sync::Arc;

fn decl(label: &str, offset: u32, direction: Option<&str>) -> LineDeclaration {
    LineDeclaration {
        label: Some(label.to_string()),
        gpios: Some(SourceRef::new("gpiochip0", offset)),
        direction: direction.map(str::to_string),
        direction_may_change: false,
    }
}

struct Rig {
    log: CallLog,
    provider: Arc<MockLineProvider>,
    namespace: Arc<MockNamespace>,
}

impl Rig {
    fn new() -> Self {
        Self::with_errors(ErrorConfig::none(), ErrorConfig::none())
    }

    fn with_errors(provider_errors: ErrorConfig, namespace_errors: ErrorConfig) -> Self {
        let log = CallLog::new();
        let provider = MockLineProvider::builder()
            .chip("gpiochip0", 0, 32)
            .errors(provider_errors)
            .log(log.clone())
            .build();
        let namespace = MockNamespace::with_log(log.clone()).with_errors(namespace_errors);
        Self {
            log,
            provider: Arc::new(provider),
            namespace: Arc::new(namespace),
        }
    }

    fn exporter(&self) -> Exporter {
        Exporter::new(self.provider.clone(), self.namespace.clone())
    }

    fn setup(&self, decls: &[LineDeclaration]) -> Result<gpio_export::ExportGroup, SetupError> {
        self.exporter()
            .setup(LineSpecificationSet::decode(decls), None)
    }
}

/// Scenario A: two valid lines, both exported
#[test]
fn test_two_valid_lines_exported() {
    let rig = Rig::new();
    let group = rig
        .setup(&[decl("led1", 17, Some("low")), decl("btn1", 4, Some("input"))])
        .unwrap();

    assert_eq!(group.len(), 2);
    assert!(group.skipped().is_empty());
    assert_eq!(group.alias_name(), "xbrother");
    assert_eq!(group.root_path(), "class/xbrother/gpio");

    assert!(rig.namespace.contains("class/xbrother"));
    assert!(rig.namespace.contains("class/xbrother/gpio/led1"));
    assert!(rig.namespace.contains("class/xbrother/gpio/btn1"));
    assert_eq!(
        rig.namespace.link_target("xbrother").as_deref(),
        Some("class/xbrother/gpio")
    );
    assert_eq!(
        rig.namespace.leaf_line("class/xbrother/gpio/led1"),
        Some(LineId(17))
    );
    assert_eq!(rig.provider.direction(LineId(17)), Some(Direction::OutputLow));
}

/// Lines count equals entries that were not skipped
#[test]
fn test_line_count_excludes_skipped_entries() {
    let rig = Rig::with_errors(
        ErrorConfig::scenario(ErrorScenario::Busy { line: LineId(3) }),
        ErrorConfig::scenario(ErrorScenario::RejectNode {
            name: "bad_leaf".into(),
        }),
    );

    let decls = vec![
        decl("led1", 1, Some("high")),
        decl("unresolvable", 99, None),
        decl("busy", 3, None),
        decl("weird", 5, Some("sideways")),
        decl("bad_leaf", 6, None),
        decl("led1", 7, None),
        decl("btn1", 8, None),
    ];
    let group = rig.setup(&decls).unwrap();

    let names: Vec<&str> = group.lines().iter().map(|l| l.name()).collect();
    assert_eq!(names, ["led1", "btn1"]);
    assert_eq!(group.skipped().len(), 5);

    assert!(matches!(
        group.skipped()[0].error,
        EntryError::SpecInvalid(_)
    ));
    let reasons: Vec<(&str, &EntryError)> = group
        .skipped()
        .iter()
        .map(|s| (s.name.as_deref().unwrap_or(""), &s.error))
        .collect();
    assert!(reasons.iter().any(|(n, e)| *n == "busy"
        && matches!(e, EntryError::AcquireFailed(ProviderError::Busy { .. }))));
    assert!(reasons.iter().any(|(n, e)| *n == "unresolvable"
        && matches!(e, EntryError::SpecInvalid(_))));
    assert!(reasons.iter().any(|(n, e)| *n == "bad_leaf"
        && matches!(e, EntryError::PublishFailed(PublishError::Rejected { .. }))));
}

/// Publication failure gives the handle straight back
#[test]
fn test_publish_failure_releases_handle() {
    let rig = Rig::with_errors(
        ErrorConfig::none(),
        ErrorConfig::scenario(ErrorScenario::RejectNode {
            name: "orphan".into(),
        }),
    );

    let group = rig
        .setup(&[decl("orphan", 2, Some("high")), decl("kept", 3, None)])
        .unwrap();

    assert_eq!(group.len(), 1);
    assert!(!rig.provider.is_acquired(LineId(2)));
    assert_eq!(
        rig.log.count(&Call::Release {
            line: LineId(2),
            label: "orphan".into()
        }),
        1
    );
    assert!(!rig.namespace.contains("class/xbrother/gpio/orphan"));
}

/// Scenario B: nothing valid, nothing left behind
#[test]
fn test_single_invalid_line_fails() {
    let rig = Rig::new();
    let decls = vec![LineDeclaration {
        label: Some("x".into()),
        gpios: Some(SourceRef::new("gpiochip7", 0)),
        direction: None,
        direction_may_change: false,
    }];

    let err = rig.setup(&decls).unwrap_err();
    assert!(matches!(
        err,
        SetupError::NoLinesExported {
            declared: 1,
            skipped: 1
        }
    ));
    assert!(!err.is_retryable());
    assert_eq!(rig.namespace.node_count(), 0);
    assert_eq!(rig.namespace.nesting_violations(), 0);
}

/// Every entry unacquirable: root is rolled back
#[test]
fn test_all_unacquirable_rolls_back_root() {
    let rig = Rig::with_errors(
        ErrorConfig::scenarios(vec![
            ErrorScenario::Busy { line: LineId(1) },
            ErrorScenario::AcquireFault { line: LineId(2) },
        ]),
        ErrorConfig::none(),
    );

    let err = rig
        .setup(&[decl("a", 1, None), decl("b", 2, None)])
        .unwrap_err();

    assert!(matches!(err, SetupError::NoLinesExported { declared: 2, .. }));
    assert_eq!(rig.namespace.node_count(), 0);
    assert_eq!(rig.provider.acquired_count(), 0);
    assert!(rig
        .log
        .position(&Call::RemoveNode {
            path: "class/xbrother/gpio".into()
        })
        .is_some());
}

/// Rejected declarations never touch the namespace
#[test]
fn test_empty_specification_set() {
    let rig = Rig::new();
    let decls = vec![LineDeclaration::default(), decl("q", 1, Some("bogus"))];

    let err = rig.setup(&decls).unwrap_err();
    assert!(matches!(
        err,
        SetupError::NoLinesExported {
            declared: 2,
            skipped: 2
        }
    ));
    assert!(rig.log.calls().is_empty());
}

/// Scenario C: deferred provider rolls back earlier lines first
#[test]
fn test_deferred_acquire_rolls_back() {
    let rig = Rig::with_errors(
        ErrorConfig::scenario(ErrorScenario::Deferred { line: LineId(9) }),
        ErrorConfig::none(),
    );

    let err = rig
        .setup(&[decl("a", 1, Some("high")), decl("b", 9, None)])
        .unwrap_err();

    assert!(err.is_retryable());
    match &err {
        SetupError::AcquireDeferred { line, cause } => {
            assert_eq!(line, "b");
            assert!(cause.is_deferred());
        }
        other => panic!("unexpected error: {other}"),
    }

    let released_a = rig
        .log
        .position(&Call::Release {
            line: LineId(1),
            label: "a".into(),
        })
        .unwrap();
    let removed_root = rig
        .log
        .position(&Call::RemoveNode {
            path: "class/xbrother/gpio".into(),
        })
        .unwrap();
    assert!(released_a < removed_root);

    assert_eq!(rig.log.released_labels(), ["a"]);
    assert!(!rig.log.calls().iter().any(|c| matches!(
        c,
        Call::Acquire { label, .. } | Call::Release { label, .. } if label == "b"
    )));
    assert_eq!(rig.namespace.node_count(), 0);
    assert_eq!(rig.namespace.nesting_violations(), 0);
}

/// Rollback releases lines in reverse acquisition order
#[test]
fn test_rollback_order_is_reversed() {
    let rig = Rig::with_errors(
        ErrorConfig::scenario(ErrorScenario::Deferred { line: LineId(20) }),
        ErrorConfig::none(),
    );

    let decls = vec![
        decl("l0", 10, None),
        decl("l1", 11, None),
        decl("l2", 12, None),
        decl("later", 20, None),
        decl("never", 21, None),
    ];
    let err = rig.setup(&decls).unwrap_err();
    assert!(matches!(err, SetupError::AcquireDeferred { .. }));

    assert_eq!(rig.log.released_labels(), ["l2", "l1", "l0"]);

    let leaf_removed = |name: &str| {
        rig.log
            .position(&Call::RemoveNode {
                path: format!("class/xbrother/gpio/{name}"),
            })
            .unwrap()
    };
    let release = |name: &str, line: u32| {
        rig.log
            .position(&Call::Release {
                line: LineId(line),
                label: name.into(),
            })
            .unwrap()
    };
    assert!(leaf_removed("l2") < release("l2", 12));
    assert!(release("l2", 12) < leaf_removed("l1"));

    let link_removed = rig
        .log
        .position(&Call::RemoveLink {
            alias: "xbrother".into(),
        })
        .unwrap();
    let root_removed = rig
        .log
        .position(&Call::RemoveNode {
            path: "class/xbrother/gpio".into(),
        })
        .unwrap();
    let class_removed = rig
        .log
        .position(&Call::RemoveNode {
            path: "class/xbrother".into(),
        })
        .unwrap();
    assert!(release("l0", 10) < link_removed);
    assert!(link_removed < root_removed);
    assert!(root_removed < class_removed);
    assert!(!rig.log.calls().iter().any(|c| matches!(c, Call::Resolve { offset: 21, .. })));
}

/// Failing to create the alias is fatal and leaves nothing behind
#[test]
fn test_namespace_failure_is_fatal() {
    let rig = Rig::with_errors(
        ErrorConfig::none(),
        ErrorConfig::scenario(ErrorScenario::RejectNode {
            name: "board".into(),
        }),
    );

    let err = rig
        .exporter()
        .setup(
            LineSpecificationSet::decode(&[decl("a", 1, None)]),
            Some("board"),
        )
        .unwrap_err();

    assert!(matches!(err, SetupError::Namespace(PublishError::Rejected { .. })));
    assert_eq!(rig.namespace.node_count(), 0);
    assert_eq!(rig.provider.acquired_count(), 0);
}

/// Custom class, root and alias names end up in the namespace
#[test]
fn test_custom_names() {
    let rig = Rig::new();
    let group = rig
        .exporter()
        .with_class("board-io")
        .with_root("lines")
        .setup(LineSpecificationSet::decode(&[decl("a", 1, None)]), Some("io"))
        .unwrap();

    assert_eq!(group.alias_name(), "io");
    assert_eq!(group.root_path(), "class/board-io/lines");
    assert!(rig.namespace.contains("class/board-io/lines/a"));
    assert_eq!(
        rig.namespace.link_target("io").as_deref(),
        Some("class/board-io/lines")
    );
}

/// Teardown twice releases each line exactly once
#[test]
fn test_teardown_idempotent() {
    let rig = Rig::new();
    let mut group = rig
        .setup(&[decl("a", 1, None), decl("b", 2, Some("high"))])
        .unwrap();

    group.teardown();
    let after_first = rig.log.calls().len();
    group.teardown();

    assert!(group.is_torn_down());
    assert_eq!(rig.log.calls().len(), after_first);
    assert_eq!(rig.log.released_labels(), ["b", "a"]);
    assert_eq!(rig.namespace.node_count(), 0);
    assert_eq!(rig.namespace.nesting_violations(), 0);
    assert_eq!(rig.provider.acquired_count(), 0);
}

/// Dropping the group tears it down
#[test]
fn test_drop_tears_down() {
    let rig = Rig::new();
    {
        let group = rig.setup(&[decl("a", 1, None)]).unwrap();
        assert_eq!(rig.provider.acquired_count(), 1);
        drop(group);
    }
    assert_eq!(rig.provider.acquired_count(), 0);
    assert_eq!(rig.namespace.node_count(), 0);
    assert_eq!(rig.log.released_labels(), ["a"]);
}

/// A second group cannot register the same class while the first lives
#[test]
fn test_second_group_conflicts() {
    let rig = Rig::new();
    let _first = rig.setup(&[decl("a", 1, None)]).unwrap();

    let err = rig.setup(&[decl("b", 2, None)]).unwrap_err();
    assert!(matches!(err, SetupError::Namespace(PublishError::Exists(_))));
    assert_eq!(rig.provider.acquired_count(), 1);
    assert!(rig.namespace.contains("class/xbrother/gpio/a"));
}

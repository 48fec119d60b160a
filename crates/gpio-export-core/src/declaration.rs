//! Line declarations and the validated Line Specification Set.
//!
//! A [`LineDeclaration`] is one entry of the hardware description as it
//! arrives from configuration: every field optional, nothing checked.
//! [`LineSpecificationSet::decode`] turns the ordered list of declarations
//! into [`LineSpec`]s, rejecting entries that can never be exported:
//!
//! - no label, or a label that cannot be a node name
//! - no `gpios` reference
//! - a direction token other than `input`, `output`, `low`, `high`
//! - a label already used by an earlier entry
//!
//! Rejected entries are reported and kept in [`LineSpecificationSet::rejected`];
//! the rest of the set is unaffected. An entry with no direction is an input.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use crate::error::DecodeError;
use crate::line::{Direction, LineSpec, SourceRef};

/// One line entry of the hardware description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDeclaration {
    /// Exported name of the line
    #[serde(default)]
    pub label: Option<String>,

    /// Controller and offset of the line
    #[serde(default)]
    pub gpios: Option<SourceRef>,

    /// `input`, `output`, `low` or `high`; input when absent
    #[serde(default)]
    pub direction: Option<String>,

    /// Allow the direction to be changed after export
    #[serde(default)]
    pub direction_may_change: bool,
}

/// A declaration that did not make it into the set.
#[derive(Debug)]
pub struct RejectedDeclaration {
    /// Position in the declaration list
    pub index: usize,
    /// Label, if the entry had one
    pub label: Option<String>,
    /// Why it was rejected
    pub error: DecodeError,
}

/// Ordered, validated set of line specs with unique names.
#[derive(Debug, Default)]
pub struct LineSpecificationSet {
    specs: Vec<LineSpec>,
    rejected: Vec<RejectedDeclaration>,
}

impl LineSpecificationSet {
    /// Decode declarations in order, rejecting invalid and duplicate entries.
    pub fn decode(declarations: &[LineDeclaration]) -> Self {
        let mut set = Self::default();
        let mut names = HashSet::new();

        for (index, decl) in declarations.iter().enumerate() {
            let decoded = decode_one(decl).and_then(|spec| {
                if names.insert(spec.name().to_string()) {
                    Ok(spec)
                } else {
                    Err(DecodeError::DuplicateLabel {
                        label: spec.name().to_string(),
                    })
                }
            });

            match decoded {
                Ok(spec) => set.specs.push(spec),
                Err(error) => set.reject(index, decl.label.clone(), error),
            }
        }

        set
    }

    /// Build a set from already constructed specs. Later duplicates are
    /// rejected the same way [`decode`](Self::decode) rejects them.
    pub fn from_specs(specs: impl IntoIterator<Item = LineSpec>) -> Self {
        let mut set = Self::default();
        let mut names = HashSet::new();

        for (index, spec) in specs.into_iter().enumerate() {
            if names.insert(spec.name().to_string()) {
                set.specs.push(spec);
            } else {
                let label = spec.name().to_string();
                set.reject(
                    index,
                    Some(label.clone()),
                    DecodeError::DuplicateLabel { label },
                );
            }
        }

        set
    }

    fn reject(&mut self, index: usize, label: Option<String>, error: DecodeError) {
        warn!(index, label = ?label, error = %error, "Rejecting line declaration");
        self.rejected.push(RejectedDeclaration {
            index,
            label,
            error,
        });
    }

    /// Accepted specs, in declaration order.
    pub fn specs(&self) -> &[LineSpec] {
        &self.specs
    }

    /// Entries rejected while decoding.
    pub fn rejected(&self) -> &[RejectedDeclaration] {
        &self.rejected
    }

    /// Number of accepted specs.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// True if no spec was accepted.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Number of entries seen, accepted or not.
    pub fn declared(&self) -> usize {
        self.specs.len() + self.rejected.len()
    }

    /// Split into accepted specs and rejections.
    pub fn into_parts(self) -> (Vec<LineSpec>, Vec<RejectedDeclaration>) {
        (self.specs, self.rejected)
    }
}

fn decode_one(decl: &LineDeclaration) -> Result<LineSpec, DecodeError> {
    let label = decl.label.as_deref().ok_or(DecodeError::MissingLabel)?;

    let source = decl
        .gpios
        .clone()
        .ok_or_else(|| DecodeError::MissingSource {
            label: label.to_string(),
        })?;

    let direction = match decl.direction.as_deref() {
        None => Direction::Input,
        Some(token) => {
            Direction::from_declared(token).ok_or_else(|| DecodeError::InvalidDirection {
                label: label.to_string(),
                token: token.to_string(),
            })?
        }
    };

    LineSpec::new(label, source, direction, decl.direction_may_change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn decl(label: &str, offset: u32, direction: Option<&str>) -> LineDeclaration {
        LineDeclaration {
            label: Some(label.to_string()),
            gpios: Some(SourceRef::new("gpiochip0", offset)),
            direction: direction.map(str::to_string),
            direction_may_change: false,
        }
    }

    #[test]
    fn test_decode_keeps_declaration_order() {
        let set = LineSpecificationSet::decode(&[
            decl("led1", 1, Some("low")),
            decl("btn1", 2, None),
            decl("relay", 3, Some("high")),
        ]);

        let names: Vec<_> = set.specs().iter().map(|s| s.name()).collect();
        assert_eq!(names, ["led1", "btn1", "relay"]);
        assert_eq!(set.specs()[1].direction(), Direction::Input);
        assert_eq!(set.specs()[2].direction(), Direction::OutputHigh);
        assert_eq!(set.declared(), 3);
    }

    #[test]
    #[traced_test]
    fn test_decode_rejects_invalid_entries() {
        let set = LineSpecificationSet::decode(&[
            LineDeclaration::default(),
            LineDeclaration {
                label: Some("nosrc".into()),
                ..Default::default()
            },
            decl("bad", 4, Some("sideways")),
            decl("ok", 5, Some("output")),
        ]);

        assert_eq!(set.len(), 1);
        assert_eq!(set.specs()[0].direction(), Direction::OutputLow);

        let rejected = set.rejected();
        assert_eq!(rejected.len(), 3);
        assert!(matches!(rejected[0].error, DecodeError::MissingLabel));
        assert!(matches!(rejected[1].error, DecodeError::MissingSource { .. }));
        assert!(matches!(
            rejected[2].error,
            DecodeError::InvalidDirection { ref token, .. } if token == "sideways"
        ));
        assert_eq!(rejected[2].index, 2);
        assert!(logs_contain("Rejecting line declaration"));
    }

    #[test]
    fn test_decode_rejects_later_duplicate() {
        let set = LineSpecificationSet::decode(&[
            decl("led", 1, Some("low")),
            decl("led", 2, Some("high")),
        ]);

        assert_eq!(set.len(), 1);
        assert_eq!(set.specs()[0].source().offset, 1);
        assert!(matches!(
            set.rejected()[0].error,
            DecodeError::DuplicateLabel { .. }
        ));
    }

    #[test]
    fn test_from_specs_rejects_duplicates() {
        let a = LineSpec::new("a", SourceRef::new("c", 0), Direction::Input, false).unwrap();
        let set = LineSpecificationSet::from_specs([a.clone(), a]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.rejected().len(), 1);
    }

    #[test]
    fn test_declaration_from_toml() {
        let decl: LineDeclaration = toml::from_str(
            r#"
            label = "led1"
            gpios = { chip = "gpiochip0", offset = 17 }
            direction = "high"
            direction_may_change = true
            "#,
        )
        .unwrap();

        assert_eq!(decl.gpios, Some(SourceRef::new("gpiochip0", 17)));
        assert!(decl.direction_may_change);

        let minimal: LineDeclaration = toml::from_str(r#"label = "x""#).unwrap();
        assert!(minimal.gpios.is_none());
        assert!(!minimal.direction_may_change);
    }
}

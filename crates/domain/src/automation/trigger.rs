//! Trigger — the mutation kind that activates a rule.

use serde::{Deserialize, Serialize};

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Created,
    Updated,
    Deleted,
}

/// Describes which mutation a rule listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    OnCreate,
    OnUpdate,
    OnDelete,
}

impl Trigger {
    /// Check whether this trigger fires for a mutation of the given kind.
    #[must_use]
    pub fn matches(self, kind: MutationKind) -> bool {
        matches!(
            (self, kind),
            (Self::OnCreate, MutationKind::Created)
                | (Self::OnUpdate, MutationKind::Updated)
                | (Self::OnDelete, MutationKind::Deleted)
        )
    }

    /// Update triggers only fire when a tracked value actually changed.
    #[must_use]
    pub fn requires_change(self) -> bool {
        matches!(self, Self::OnUpdate)
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::OnCreate => "on_create",
            Self::OnUpdate => "on_update",
            Self::OnDelete => "on_delete",
        })
    }
}

impl std::str::FromStr for Trigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_create" => Ok(Self::OnCreate),
            "on_update" => Ok(Self::OnUpdate),
            "on_delete" => Ok(Self::OnDelete),
            other => Err(format!("unknown trigger `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_match_only_the_corresponding_mutation() {
        assert!(Trigger::OnCreate.matches(MutationKind::Created));
        assert!(!Trigger::OnCreate.matches(MutationKind::Updated));
        assert!(Trigger::OnUpdate.matches(MutationKind::Updated));
        assert!(!Trigger::OnUpdate.matches(MutationKind::Deleted));
        assert!(Trigger::OnDelete.matches(MutationKind::Deleted));
    }

    #[test]
    fn should_require_change_only_for_updates() {
        assert!(Trigger::OnUpdate.requires_change());
        assert!(!Trigger::OnCreate.requires_change());
        assert!(!Trigger::OnDelete.requires_change());
    }

    #[test]
    fn should_use_snake_case_names_in_json_and_display() {
        let json = serde_json::to_string(&Trigger::OnUpdate).unwrap();
        assert_eq!(json, "\"on_update\"");
        assert_eq!(Trigger::OnDelete.to_string(), "on_delete");
        assert_eq!("on_create".parse::<Trigger>(), Ok(Trigger::OnCreate));
    }
}

//! Authorization result shapes.
//!
//! # Design Decisions
//! - Check results are values, never exceptions: the message in a denial
//!   is always safe to show to the end user
//! - `ListValidResult` is a three-variant enum internally; the easy-to-
//!   invert null/empty/array convention survives only at the wire encoding

use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Outcome of a single authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    Allowed,
    Denied {
        /// Always safe to show to the end user.
        message: String,
    },
}

impl AuthResult {
    pub fn allowed() -> Self {
        Self::Allowed
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self::Denied {
            message: message.into(),
        }
    }

    /// Generic denial used when a scope handler failed internally; the
    /// real detail stays in the server log.
    pub fn denied_internal() -> Self {
        Self::denied("internal server error")
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

impl Serialize for AuthResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Allowed => {
                let mut s = serializer.serialize_struct("AuthResult", 1)?;
                s.serialize_field("success", &true)?;
                s.end()
            }
            Self::Denied { message } => {
                let mut s = serializer.serialize_struct("AuthResult", 2)?;
                s.serialize_field("success", &false)?;
                s.serialize_field("errorMessage", message)?;
                s.end()
            }
        }
    }
}

/// Outcome of an enumeration query: which objects would pass a check.
///
/// The three variants mean three different things and must never be
/// collapsed into one another:
/// - `Unbounded`: anyone qualifies, or the set is unknowable. UI choices
///   must not be restricted based on this.
/// - `NoneValid`: definitively no object qualifies.
/// - `Valid(set)`: exactly this enumerable set qualifies; false negatives
///   are not permitted (false positives are acceptable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListValidResult {
    Unbounded,
    NoneValid,
    Valid(Vec<String>),
}

impl ListValidResult {
    /// Wire-compatible constructor from the null/array convention.
    pub fn from_wire(valid_objects: Option<Vec<String>>) -> Self {
        match valid_objects {
            None => Self::Unbounded,
            Some(objects) if objects.is_empty() => Self::NoneValid,
            Some(objects) => Self::Valid(objects),
        }
    }
}

impl Serialize for ListValidResult {
    /// Encodes as `{"validObjects": null | [] | [...]}` for compatibility.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ListValidResult", 1)?;
        match self {
            Self::Unbounded => s.serialize_field("validObjects", &None::<Vec<String>>)?,
            Self::NoneValid => s.serialize_field("validObjects", &Vec::<String>::new())?,
            Self::Valid(objects) => s.serialize_field("validObjects", objects)?,
        }
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_result_wire_shapes() {
        assert_eq!(
            serde_json::to_value(AuthResult::allowed()).unwrap(),
            serde_json::json!({"success": true})
        );
        assert_eq!(
            serde_json::to_value(AuthResult::denied("not feed owner")).unwrap(),
            serde_json::json!({"success": false, "errorMessage": "not feed owner"})
        );
    }

    #[test]
    fn tri_state_wire_shapes_are_distinct() {
        assert_eq!(
            serde_json::to_value(ListValidResult::Unbounded).unwrap(),
            serde_json::json!({"validObjects": null})
        );
        assert_eq!(
            serde_json::to_value(ListValidResult::NoneValid).unwrap(),
            serde_json::json!({"validObjects": []})
        );
        assert_eq!(
            serde_json::to_value(ListValidResult::Valid(vec!["acme".into()])).unwrap(),
            serde_json::json!({"validObjects": ["acme"]})
        );
    }

    #[test]
    fn from_wire_round_trips_all_three() {
        assert_eq!(ListValidResult::from_wire(None), ListValidResult::Unbounded);
        assert_eq!(
            ListValidResult::from_wire(Some(vec![])),
            ListValidResult::NoneValid
        );
        assert_eq!(
            ListValidResult::from_wire(Some(vec!["a".into()])),
            ListValidResult::Valid(vec!["a".into()])
        );
    }
}

use serde::{Deserialize, Serialize};

/// A typed scalar value carried by a device operation, per SPEC_FULL.md's
/// data model addendum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedValue {
    StringVal(String),
    IntVal(i64),
    BoolVal(bool),
    BytesVal(Vec<u8>),
    FloatVal(f64),
}

/// The kind of change applied to a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    Create,
    Update,
    Delete,
}

/// One entry of a `DeviceChangeSpec`'s operation list (spec.md §4.2, §3).
///
/// `value` carries the new value for `Create`/`Update`; `pre_image` carries
/// the value being replaced or removed, and is what makes the operation
/// invertible for `ROLLBACK` without needing to re-read the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedValueOp {
    pub path: String,
    pub kind: OpKind,
    pub value: Option<TypedValue>,
    pub pre_image: Option<TypedValue>,
}

/// Derives the inverse operation set for a ROLLBACK phase dispatch
/// (spec.md §4.2): create↔delete, update restored to its pre-image.
pub fn invert_ops(ops: &[TypedValueOp]) -> Vec<TypedValueOp> {
    ops.iter()
        .map(|op| match op.kind {
            OpKind::Create => TypedValueOp {
                path: op.path.clone(),
                kind: OpKind::Delete,
                value: None,
                pre_image: op.value.clone(),
            },
            OpKind::Delete => TypedValueOp {
                path: op.path.clone(),
                kind: OpKind::Create,
                value: op.pre_image.clone(),
                pre_image: None,
            },
            OpKind::Update => TypedValueOp {
                path: op.path.clone(),
                kind: OpKind::Update,
                value: op.pre_image.clone(),
                pre_image: op.value.clone(),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_op(kind: OpKind, value: Option<&str>, pre: Option<&str>) -> TypedValueOp {
        TypedValueOp {
            path: "/a/b".into(),
            kind,
            value: value.map(|v| TypedValue::StringVal(v.into())),
            pre_image: pre.map(|v| TypedValue::StringVal(v.into())),
        }
    }

    #[test]
    fn create_inverts_to_delete() {
        let op = string_op(OpKind::Create, Some("hello"), None);
        let inv = invert_ops(&[op]);
        assert_eq!(inv[0].kind, OpKind::Delete);
        assert_eq!(inv[0].value, None);
        assert_eq!(inv[0].pre_image, Some(TypedValue::StringVal("hello".into())));
    }

    #[test]
    fn delete_inverts_to_create() {
        let op = string_op(OpKind::Delete, None, Some("was-here"));
        let inv = invert_ops(&[op]);
        assert_eq!(inv[0].kind, OpKind::Create);
        assert_eq!(inv[0].value, Some(TypedValue::StringVal("was-here".into())));
    }

    #[test]
    fn update_swaps_value_and_pre_image() {
        let op = string_op(OpKind::Update, Some("new"), Some("old"));
        let inv = invert_ops(&[op]);
        assert_eq!(inv[0].kind, OpKind::Update);
        assert_eq!(inv[0].value, Some(TypedValue::StringVal("old".into())));
        assert_eq!(inv[0].pre_image, Some(TypedValue::StringVal("new".into())));
    }

    #[test]
    fn inverting_twice_is_identity() {
        let ops = vec![
            string_op(OpKind::Create, Some("hello"), None),
            string_op(OpKind::Update, Some("new"), Some("old")),
            string_op(OpKind::Delete, None, Some("gone")),
        ];
        let roundtrip = invert_ops(&invert_ops(&ops));
        assert_eq!(roundtrip, ops);
    }
}

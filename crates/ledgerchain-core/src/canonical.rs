//! Canonical JSON rendering.
//!
//! Both transactions and blocks are hashed/signed over a byte-exact JSON
//! form: a fixed field order, explicit `null` for absent optional fields,
//! and millisecond-precision UTC timestamps. `serde_json`'s own
//! `to_string` cannot be used directly on a `#[derive(Serialize)]` struct
//! for this because struct-field order would silently become part of the
//! ABI and drift under refactors — instead every canonical payload is
//! built as an explicit ordered list of `(name, value)` pairs and
//! rendered here.
//!
//! Nested opaque objects (`transaction_data`, `document_hashes`) are
//! rendered through `serde_json::Value`'s own object serialization, which
//! — with the `preserve_order` feature *not* enabled — is backed by a
//! `BTreeMap` and therefore always emits nested keys in sorted order,
//! regardless of insertion order. That gives callers of the core a
//! deterministic hash even if two logically-identical payloads were
//! built by inserting keys in a different sequence.

use serde_json::Value;

/// An explicitly ordered field list for a canonical payload.
pub type OrderedFields<'a> = Vec<(&'a str, Value)>;

/// Render an ordered field list to the exact canonical JSON byte string.
pub fn canonical_json_to_string(fields: &OrderedFields) -> String {
    let mut out = String::from("{");
    for (i, (key, value)) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('"');
        out.push_str(key);
        out.push_str("\":");
        // `Value`'s Display/to_string never panics for a well-formed Value.
        out.push_str(&serde_json::to_string(value).expect("Value serialization is infallible"));
    }
    out.push('}');
    out
}

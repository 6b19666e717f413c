//! Canonical structured encoding and content hashing.
//!
//! Every entity encodes to a JSON object tagged with a `"node"`
//! discriminator and decodes back exactly. serde_json's default map keeps
//! keys sorted, so the rendered text is reproducible and serves as the
//! input to the SHA-256 content hash callers use for deduplication.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::error::KastError;

use super::label::Label;
use super::sort::Sort;
use super::term::Term;

type Dict = serde_json::Map<String, Value>;

impl Sort {
    pub fn to_dict(&self) -> Value {
        json!({ "node": "KSort", "name": self.name })
    }

    pub fn from_dict(value: &Value) -> Result<Sort, KastError> {
        let dict = expect_node(value, "KSort")?;
        Ok(Sort::new(str_field(dict, "name")?))
    }
}

impl Label {
    pub fn to_dict(&self) -> Value {
        json!({
            "node": "KLabel",
            "name": self.name,
            "params": self.params.iter().map(Sort::to_dict).collect::<Vec<_>>(),
        })
    }

    pub fn from_dict(value: &Value) -> Result<Label, KastError> {
        let dict = expect_node(value, "KLabel")?;
        let params = array_field(dict, "params")?
            .iter()
            .map(Sort::from_dict)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Label::parametric(str_field(dict, "name")?, params))
    }
}

impl Term {
    pub fn to_dict(&self) -> Value {
        match self {
            Term::Token { token, sort } => json!({
                "node": "KToken",
                "token": token,
                "sort": sort.to_dict(),
            }),
            Term::Variable { name, sort } => {
                let mut dict = Dict::new();
                dict.insert("node".into(), Value::from("KVariable"));
                dict.insert("name".into(), Value::from(name.clone()));
                if let Some(sort) = sort {
                    dict.insert("sort".into(), sort.to_dict());
                }
                Value::Object(dict)
            }
            Term::Apply { label, args } => json!({
                "node": "KApply",
                "label": label.to_dict(),
                "args": args.iter().map(Term::to_dict).collect::<Vec<_>>(),
                "arity": args.len(),
            }),
            Term::As { pattern, alias } => json!({
                "node": "KAs",
                "pattern": pattern.to_dict(),
                "alias": alias.to_dict(),
            }),
            Term::Rewrite { lhs, rhs } => json!({
                "node": "KRewrite",
                "lhs": lhs.to_dict(),
                "rhs": rhs.to_dict(),
            }),
            Term::Sequence { items } => json!({
                "node": "KSequence",
                "items": items.iter().map(Term::to_dict).collect::<Vec<_>>(),
                "arity": items.len(),
            }),
        }
    }

    pub fn from_dict(value: &Value) -> Result<Term, KastError> {
        let dict = value
            .as_object()
            .ok_or_else(|| KastError::Decode("expected a JSON object".into()))?;
        let node = dict
            .get("node")
            .and_then(Value::as_str)
            .ok_or_else(|| KastError::Decode("missing \"node\" tag".into()))?;
        match node {
            "KToken" => Ok(Term::Token {
                token: str_field(dict, "token")?,
                sort: Sort::from_dict(field(dict, "sort")?)?,
            }),
            "KVariable" => {
                let sort = match dict.get("sort") {
                    None | Some(Value::Null) => None,
                    Some(sort) => Some(Sort::from_dict(sort)?),
                };
                Ok(Term::Variable {
                    name: str_field(dict, "name")?,
                    sort,
                })
            }
            "KApply" => {
                let label = Label::from_dict(field(dict, "label")?)?;
                let args = array_field(dict, "args")?
                    .iter()
                    .map(Term::from_dict)
                    .collect::<Result<Vec<_>, _>>()?;
                check_arity(dict, args.len())?;
                Ok(Term::Apply { label, args })
            }
            "KAs" => Ok(Term::alias(
                Term::from_dict(field(dict, "pattern")?)?,
                Term::from_dict(field(dict, "alias")?)?,
            )),
            "KRewrite" => Ok(Term::rewrite(
                Term::from_dict(field(dict, "lhs")?)?,
                Term::from_dict(field(dict, "rhs")?)?,
            )),
            "KSequence" => {
                let items = array_field(dict, "items")?
                    .iter()
                    .map(Term::from_dict)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Term::sequence(items))
            }
            other => Err(KastError::Decode(format!("unknown node tag: {other}"))),
        }
    }

    /// The canonical JSON text of this term, with sorted keys.
    pub fn to_json(&self) -> String {
        self.to_dict().to_string()
    }

    pub fn from_json(text: &str) -> Result<Term, KastError> {
        let value: Value =
            serde_json::from_str(text).map_err(|err| KastError::Decode(err.to_string()))?;
        Term::from_dict(&value)
    }

    /// Content hash of the canonical JSON text.
    pub fn hash(&self) -> TermHash {
        TermHash::of(self.to_json().as_bytes())
    }
}

/// A SHA-256 digest identifying a term by content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermHash([u8; 32]);

impl TermHash {
    fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex of the full digest.
    pub fn hex(&self) -> String {
        self.0.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    /// First eight hex characters; enough to name fresh variables
    /// deterministically.
    pub fn short(&self) -> String {
        self.hex()[..8].to_string()
    }
}

impl std::fmt::Display for TermHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hex())
    }
}

fn expect_node<'a>(value: &'a Value, tag: &str) -> Result<&'a Dict, KastError> {
    let dict = value
        .as_object()
        .ok_or_else(|| KastError::Decode(format!("expected a JSON object for {tag}")))?;
    match dict.get("node").and_then(Value::as_str) {
        Some(node) if node == tag => Ok(dict),
        Some(node) => Err(KastError::Decode(format!(
            "expected node tag {tag}, found {node}"
        ))),
        None => Err(KastError::Decode("missing \"node\" tag".into())),
    }
}

fn field<'a>(dict: &'a Dict, key: &str) -> Result<&'a Value, KastError> {
    dict.get(key)
        .ok_or_else(|| KastError::Decode(format!("missing field \"{key}\"")))
}

fn str_field(dict: &Dict, key: &str) -> Result<String, KastError> {
    field(dict, key)?
        .as_str()
        .map(String::from)
        .ok_or_else(|| KastError::Decode(format!("non-string field \"{key}\"")))
}

fn array_field<'a>(dict: &'a Dict, key: &str) -> Result<&'a Vec<Value>, KastError> {
    field(dict, key)?
        .as_array()
        .ok_or_else(|| KastError::Decode(format!("non-array field \"{key}\"")))
}

fn check_arity(dict: &Dict, actual: usize) -> Result<(), KastError> {
    match dict.get("arity").and_then(Value::as_u64) {
        Some(arity) if arity as usize != actual => Err(KastError::Decode(format!(
            "arity {arity} does not match {actual} children"
        ))),
        _ => Ok(()),
    }
}

impl Serialize for Term {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_dict().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Term {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Term::from_dict(&value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Sort {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_dict().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Sort {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Sort::from_dict(&value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_dict().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Label::from_dict(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Sort {
        Sort::new("Int")
    }

    fn round_trip(term: &Term) {
        assert_eq!(&Term::from_dict(&term.to_dict()).unwrap(), term);
        assert_eq!(&Term::from_json(&term.to_json()).unwrap(), term);
    }

    #[test]
    fn round_trip_every_variant() {
        round_trip(&Term::token("42", int()));
        round_trip(&Term::var("X"));
        round_trip(&Term::sorted_var("X", int()));
        round_trip(&Term::apply(Label::new("f"), vec![]));
        round_trip(&Term::apply(
            Label::parametric("#Equals", vec![int(), Sort::new("K")]),
            vec![Term::var("X"), Term::token("1", int())],
        ));
        round_trip(&Term::alias(Term::var("X"), Term::token("1", int())));
        round_trip(&Term::rewrite(Term::var("X"), Term::var("Y")));
        round_trip(&Term::sequence(vec![]));
        round_trip(&Term::sequence(vec![Term::var("X")]));
        round_trip(&Term::sequence(vec![
            Term::var("X"),
            Term::var("Y"),
            Term::var("Z"),
        ]));
    }

    #[test]
    fn decode_reflattens_sequences() {
        let inner = json!({
            "node": "KSequence",
            "items": [Term::var("B").to_dict(), Term::var("C").to_dict()],
            "arity": 2,
        });
        let outer = json!({
            "node": "KSequence",
            "items": [Term::var("A").to_dict(), inner],
            "arity": 2,
        });
        let decoded = Term::from_dict(&outer).unwrap();
        assert_eq!(
            decoded,
            Term::sequence(vec![Term::var("A"), Term::var("B"), Term::var("C")])
        );
    }

    #[test]
    fn decode_errors() {
        assert!(Term::from_dict(&json!("not an object")).is_err());
        assert!(Term::from_dict(&json!({ "name": "X" })).is_err());
        assert!(Term::from_dict(&json!({ "node": "KWhatever" })).is_err());

        let bad_arity = json!({
            "node": "KApply",
            "label": Label::new("f").to_dict(),
            "args": [Term::var("X").to_dict()],
            "arity": 2,
        });
        assert!(Term::from_dict(&bad_arity).is_err());
    }

    #[test]
    fn unsorted_variable_omits_sort_key() {
        let dict = Term::var("X").to_dict();
        assert!(dict.as_object().unwrap().get("sort").is_none());
        let dict = Term::sorted_var("X", int()).to_dict();
        assert!(dict.as_object().unwrap().get("sort").is_some());
    }

    #[test]
    fn json_keys_are_sorted() {
        let json = Term::token("1", int()).to_json();
        assert_eq!(
            json,
            r#"{"node":"KToken","sort":{"name":"Int","node":"KSort"},"token":"1"}"#
        );
    }

    #[test]
    fn hash_is_content_addressed() {
        let term = Term::apply(Label::new("f"), vec![Term::var("X")]);
        assert_eq!(term.hash(), term.clone().hash());
        assert_ne!(
            term.hash(),
            Term::apply(Label::new("f"), vec![Term::var("Y")]).hash()
        );
        assert_eq!(term.hash().hex().len(), 64);
        assert_eq!(term.hash().short(), term.hash().hex()[..8]);
    }

    #[test]
    fn serde_delegates_to_the_dict_form() {
        let term = Term::rewrite(Term::var("X"), Term::token("0", int()));
        let text = serde_json::to_string(&term).unwrap();
        let back: Term = serde_json::from_str(&text).unwrap();
        assert_eq!(back, term);
    }
}

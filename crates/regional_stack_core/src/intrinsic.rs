use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

pub const ACCOUNT_ID_PSEUDO_PARAMETER: &str = "AWS::AccountId";
pub const REGION_PSEUDO_PARAMETER: &str = "AWS::Region";

/// A property value that is either a plain string or resolved by the
/// deployment engine (`Ref`, `Fn::GetAtt`, `Fn::Join`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Literal(String),
    Ref(String),
    GetAtt {
        logical_id: String,
        attribute: String,
    },
    Join {
        delimiter: String,
        parts: Vec<Intrinsic>,
    },
}

impl Intrinsic {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::Ref(name.into())
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::GetAtt {
            logical_id: logical_id.into(),
            attribute: attribute.into(),
        }
    }

    /// `Fn::Join` with an empty delimiter, the only form the generator emits.
    pub fn concat(parts: Vec<Intrinsic>) -> Self {
        Self::Join {
            delimiter: String::new(),
            parts,
        }
    }
}

impl Serialize for Intrinsic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Literal(value) => serializer.serialize_str(value),
            Self::Ref(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Ref", name)?;
                map.end()
            }
            Self::GetAtt {
                logical_id,
                attribute,
            } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::GetAtt", &[logical_id, attribute])?;
                map.end()
            }
            Self::Join { delimiter, parts } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::Join", &(delimiter, parts))?;
                map.end()
            }
        }
    }
}

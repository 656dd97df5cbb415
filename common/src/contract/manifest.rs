use serde::{Deserialize, Serialize};

// ABI surface of a contract as exposed to wallets and RPC clients.
// For native contracts the manifest is built once at startup from the
// method table and never changes afterwards.

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Any,
    Boolean,
    Integer,
    ByteString,
    Hash,
    PublicKey,
    Array,
    Void,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: String,
    pub parameters: Vec<ParamType>,
    pub return_type: ParamType,
    // A safe method is read-only: it may be invoked under any trigger and
    // callers need no state-mutation scope for it
    pub safe: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContractManifest {
    pub name: String,
    pub methods: Vec<MethodSignature>,
}

impl ContractManifest {
    pub fn new(name: String, methods: Vec<MethodSignature>) -> Self {
        ContractManifest { name, methods }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_json_roundtrip() {
        let manifest = ContractManifest::new(
            "Governance".into(),
            vec![
                MethodSignature {
                    name: "balanceOf".into(),
                    parameters: vec![ParamType::Hash],
                    return_type: ParamType::Integer,
                    safe: true,
                },
                MethodSignature {
                    name: "transfer".into(),
                    parameters: vec![ParamType::Hash, ParamType::Hash, ParamType::Integer],
                    return_type: ParamType::Boolean,
                    safe: false,
                },
            ],
        );

        let json = manifest.to_json().unwrap();
        let decoded = ContractManifest::from_json(&json).unwrap();
        assert_eq!(decoded, manifest);
    }
}

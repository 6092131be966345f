//! Compiled contract artifacts.
//!
//! An artifact is the creation bytecode, the ABI its constructor arguments are encoded against, and
//! whatever the verification service needs. Artifacts are read from `<dir>/<ContractName>.json` in
//! the Hardhat artifact shape, optionally extended with `compilerVersion` and the solc
//! standard-JSON `input`.

use std::path::PathBuf;

use alloy_core::{
    dyn_abi::{JsonAbiExt, Specifier},
    json_abi::JsonAbi,
    primitives::{Address, Bytes},
};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    chain::DeployTransaction,
    error::LifecycleError,
    record::{ConstructorArg, encode_constructor_args},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(Bytes),
    /// solc / foundry shape: `{"object": "0x..."}`.
    Object { object: Bytes },
}

impl From<RawBytecode> for Bytes {
    fn from(raw: RawBytecode) -> Self {
        match raw {
            RawBytecode::Hex(bytes) | RawBytecode::Object { object: bytes } => bytes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    contract_name: Option<String>,
    source_name: Option<String>,
    bytecode: RawBytecode,
    #[serde(default)]
    abi: Option<JsonAbi>,
    compiler_version: Option<String>,
    input: Option<Value>,
}

/// A compiled contract.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub contract_name: String,
    pub source_name: Option<String>,
    pub bytecode: Bytes,
    pub abi: Option<JsonAbi>,
    pub compiler_version: Option<String>,
    /// solc standard-JSON input, needed for source verification.
    pub standard_json_input: Option<Value>,
}

impl Artifact {
    /// Fully qualified `<source>:<name>` identifier, when the source file is known.
    pub fn contract_path(&self) -> Option<String> {
        self.source_name
            .as_ref()
            .map(|source| format!("{}:{}", source, self.contract_name))
    }

    /// ABI-encode constructor arguments against the artifact's constructor inputs.
    ///
    /// Artifacts without an ABI fall back to types inferred from the argument values.
    pub fn encode_constructor_args(&self, args: &[ConstructorArg]) -> Result<Bytes> {
        let Some(abi) = &self.abi else {
            return Ok(encode_constructor_args(args));
        };

        let Some(constructor) = &abi.constructor else {
            if !args.is_empty() {
                anyhow::bail!(
                    "{} has no constructor but {} argument(s) were given",
                    self.contract_name,
                    args.len()
                );
            }
            return Ok(Bytes::new());
        };

        if constructor.inputs.len() != args.len() {
            anyhow::bail!(
                "{} constructor takes {} argument(s), got {}",
                self.contract_name,
                constructor.inputs.len(),
                args.len()
            );
        }

        let values = constructor
            .inputs
            .iter()
            .zip(args)
            .map(|(input, arg)| {
                let ty = input
                    .resolve()
                    .with_context(|| format!("Could not resolve constructor input {}", input))?;
                arg.coerce(&ty).with_context(|| {
                    format!("Invalid value for constructor input '{}' ({})", input.name, input.ty)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let encoded = constructor
            .abi_encode_input(&values)
            .context("Failed to encode constructor arguments")?;
        Ok(encoded.into())
    }

    /// Creation transaction for this contract with the given constructor arguments.
    pub fn deploy_transaction(
        &self,
        from: Option<Address>,
        args: &[ConstructorArg],
    ) -> Result<DeployTransaction> {
        let mut data = self.bytecode.to_vec();
        data.extend_from_slice(&self.encode_constructor_args(args)?);
        Ok(DeployTransaction {
            from,
            data: data.into(),
            gas: None,
            gas_price: None,
        })
    }
}

/// Directory of artifacts, one JSON file per contract.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn load(&self, contract_name: &str) -> Result<Artifact> {
        let path = self.dir.join(format!("{}.json", contract_name));
        if !path.exists() {
            return Err(LifecycleError::ArtifactNotFound {
                contract: contract_name.to_string(),
                dir: self.dir.clone(),
            }
            .into());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        let raw: RawArtifact = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        let bytecode: Bytes = raw.bytecode.into();
        if bytecode.is_empty() {
            anyhow::bail!(
                "Artifact {} has no creation bytecode (abstract contract or interface?)",
                path.display()
            );
        }

        Ok(Artifact {
            contract_name: raw
                .contract_name
                .unwrap_or_else(|| contract_name.to_string()),
            source_name: raw.source_name,
            bytecode,
            abi: raw.abi,
            compiler_version: raw.compiler_version,
            standard_json_input: raw.input,
        })
    }
}

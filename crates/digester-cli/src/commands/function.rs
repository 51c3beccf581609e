//! Function command - resolve image tags in a manifest stream
//!
//! Reads a KRM `ResourceList` (or a plain multi-document YAML stream) and
//! writes the same shape back with every image pinned. Runs offline by
//! default, like a kpt or kustomize function.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use digester_core::{CredentialStore, Digester, EngineConfig, WorkloadTree};
use digester_kube::{KubeCredentialStore, create_client};
use digester_registry::RegistryDigestResolver;

use crate::error::{CliError, Result};

/// Kind of the KRM function envelope
pub const RESOURCE_LIST_KIND: &str = "ResourceList";

/// Options for the function command
#[derive(Debug, Clone)]
pub struct FunctionOptions {
    pub input: Option<PathBuf>,
    pub offline: bool,
    pub kubeconfig: Option<String>,
    pub skip_prefixes: Option<String>,
    pub platform: Option<String>,
}

/// Parsed function input
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionInput {
    /// A `ResourceList`; `envelope` keeps everything except `items`
    ResourceList {
        envelope: JsonValue,
        items: Vec<WorkloadTree>,
    },
    /// Plain YAML documents
    Stream(Vec<WorkloadTree>),
}

impl FunctionInput {
    /// Parse YAML input
    pub fn parse(input: &str) -> Result<Self> {
        let mut documents = Vec::new();
        for document in serde_yaml::Deserializer::from_str(input) {
            let value = JsonValue::deserialize(document)
                .map_err(|e| CliError::parse(e.to_string()))?;
            if !value.is_null() {
                documents.push(value);
            }
        }

        let is_resource_list = documents.len() == 1
            && documents[0].get("kind").and_then(JsonValue::as_str) == Some(RESOURCE_LIST_KIND);
        if is_resource_list {
            let mut envelope = documents.remove(0);
            let items = envelope
                .as_object_mut()
                .and_then(|list| list.remove("items"))
                .unwrap_or(JsonValue::Array(Vec::new()));
            let JsonValue::Array(items) = items else {
                return Err(CliError::parse("ResourceList items must be a sequence"));
            };
            return Ok(FunctionInput::ResourceList {
                envelope,
                items: into_trees(items)?,
            });
        }

        Ok(FunctionInput::Stream(into_trees(documents)?))
    }

    pub fn items_mut(&mut self) -> &mut [WorkloadTree] {
        match self {
            FunctionInput::ResourceList { items, .. } => items,
            FunctionInput::Stream(items) => items,
        }
    }

    /// Render back to YAML in the shape it was read
    pub fn render(self) -> Result<String> {
        match self {
            FunctionInput::ResourceList {
                mut envelope,
                items,
            } => {
                let items = items.into_iter().map(WorkloadTree::into_value).collect();
                if let Some(list) = envelope.as_object_mut() {
                    list.insert("items".to_string(), JsonValue::Array(items));
                }
                serde_yaml::to_string(&envelope).map_err(|e| CliError::internal(e.to_string()))
            }
            FunctionInput::Stream(items) => {
                let documents = items
                    .iter()
                    .map(|tree| tree.to_yaml())
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(documents.join("---\n"))
            }
        }
    }
}

fn into_trees(values: Vec<JsonValue>) -> Result<Vec<WorkloadTree>> {
    values
        .into_iter()
        .map(|value| {
            if value.is_object() {
                Ok(WorkloadTree::from_value(value))
            } else {
                Err(CliError::parse("every resource must be a mapping"))
            }
        })
        .collect()
}

/// Resolve every item of the input in place
pub async fn process(digester: &Digester, input: &str) -> Result<String> {
    let mut parsed = FunctionInput::parse(input)?;
    let mut pinned = 0;
    for tree in parsed.items_mut() {
        let resolved = digester.resolve_tree(tree).await?;
        tracing::debug!(
            kind = tree.kind().unwrap_or_default(),
            name = tree.name().unwrap_or_default(),
            images = resolved.len(),
            "resolved resource"
        );
        pinned += resolved.len();
    }
    tracing::info!(images = pinned, "pinned images");
    parsed.render()
}

/// Run the function command
pub async fn run(options: FunctionOptions) -> Result<()> {
    tracing::debug!(
        offline = options.offline,
        kubeconfig = options.kubeconfig.as_deref().unwrap_or_default(),
        skip_prefixes = options.skip_prefixes.as_deref().unwrap_or_default(),
        "function options"
    );

    let config = super::engine_config(
        options.skip_prefixes.as_deref(),
        options.platform.as_deref(),
        options.offline,
    );
    let store = credential_store(&config, options.kubeconfig.as_deref()).await?;
    let digester = Digester::builder(Arc::new(RegistryDigestResolver::new()))
        .credential_store(store)
        .config(config)
        .build();

    let input = read_input(options.input.as_deref())?;
    let output = process(&digester, &input).await?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

async fn credential_store(
    config: &EngineConfig,
    kubeconfig: Option<&str>,
) -> Result<Option<Arc<dyn CredentialStore>>> {
    if config.offline {
        return Ok(None);
    }
    let kubeconfig = kubeconfig.and_then(super::first_kubeconfig).map(Path::new);
    match kubeconfig {
        Some(path) => tracing::debug!(kubeconfig = %path.display(), "using kubeconfig file"),
        None => tracing::debug!("using in-cluster config"),
    }
    let client = create_client(kubeconfig)
        .await
        .map_err(|e| CliError::Kube {
            message: format!("could not create k8s client config: {}", e),
        })?;
    Ok(Some(Arc::new(KubeCredentialStore::new(client))))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| CliError::Io {
            message: format!("{}: {}", path.display(), e),
        }),
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            Ok(input)
        }
    }
}

//! Parsed manifest documents and the reference-extraction visitor.
//!
//! Manifests are plain Kubernetes YAML. The controller only understands
//! `kind`, `metadata.name`, `metadata.namespace`, volume lists and
//! `imagePullSecrets`; everything else passes through untouched.

use serde_yaml::Value;

use crate::error::{Error, Result};

/// One parsed manifest file.
///
/// Read lazily, only when a change record requires inspecting or
/// deploying the file. Multi-document YAML is rejected per file and the
/// caller skips it.
#[derive(Debug, Clone)]
pub struct ManifestDocument {
    pub kind: Option<String>,
    pub name: Option<String>,
    pub namespace: Option<String>,
    raw: Value,
}

impl ManifestDocument {
    /// Parse a single YAML document.
    pub fn from_str(content: &str) -> Result<ManifestDocument> {
        let raw: Value = serde_yaml::from_str(content)
            .map_err(|e| Error::InvalidManifest(format!("YAML parse error: {e}")))?;

        let metadata = raw.get("metadata");
        let string_at = |parent: Option<&Value>, key: &str| {
            parent
                .and_then(|v| v.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Ok(ManifestDocument {
            kind: string_at(Some(&raw), "kind"),
            name: string_at(metadata, "name"),
            namespace: string_at(metadata, "namespace"),
            raw,
        })
    }

    /// Every entry of every `volumes` sequence anywhere in the document,
    /// in document order.
    pub fn volumes(&self) -> Vec<&Value> {
        let mut out = Vec::new();
        collect_volumes(&self.raw, &mut out);
        out
    }

    /// Names of volume-mounted ConfigMaps: `volumes[].configMap.name`.
    pub fn config_map_refs(&self) -> Vec<&str> {
        self.volumes()
            .iter()
            .filter_map(|volume| volume.get("configMap"))
            .filter_map(|cm| cm.get("name"))
            .filter_map(Value::as_str)
            .collect()
    }

    /// Names of volume-mounted Secrets: `volumes[].secret.secretName`.
    pub fn secret_refs(&self) -> Vec<&str> {
        self.volumes()
            .iter()
            .filter_map(|volume| volume.get("secret"))
            .filter_map(|secret| secret.get("secretName"))
            .filter_map(Value::as_str)
            .collect()
    }

    /// Names of image pull secrets found in any pod-template spec:
    /// `template.spec.imagePullSecrets[].name`.
    pub fn image_pull_secret_refs(&self) -> Vec<&str> {
        let mut specs = Vec::new();
        collect_template_specs(&self.raw, &mut specs);
        specs
            .iter()
            .filter_map(|spec| spec.get("imagePullSecrets"))
            .filter_map(Value::as_sequence)
            .flatten()
            .filter_map(|entry| entry.get("name"))
            .filter_map(Value::as_str)
            .collect()
    }
}

/// Depth-first walk collecting every `volumes` sequence entry.
fn collect_volumes<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Mapping(mapping) => {
            for (key, child) in mapping {
                if key.as_str() == Some("volumes") {
                    if let Some(entries) = child.as_sequence() {
                        out.extend(entries.iter());
                    }
                }
                collect_volumes(child, out);
            }
        }
        Value::Sequence(sequence) => {
            for child in sequence {
                collect_volumes(child, out);
            }
        }
        _ => {}
    }
}

/// Depth-first walk collecting every `template.spec` mapping.
fn collect_template_specs<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Mapping(mapping) => {
            for (key, child) in mapping {
                if key.as_str() == Some("template") {
                    if let Some(spec) = child.get("spec") {
                        out.push(spec);
                    }
                }
                collect_template_specs(child, out);
            }
        }
        Value::Sequence(sequence) => {
            for child in sequence {
                collect_template_specs(child, out);
            }
        }
        _ => {}
    }
}

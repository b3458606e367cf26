use kubernetes::ListParams;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::validate_namespace;
use crate::{Error, K8sConfig, ResourceKind, Result};

const API_VERSION: &str = "apiVersion";
const KIND: &str = "kind";
const METADATA: &str = "metadata";

/// A local description of one Kubernetes object.
///
/// Nothing is sent to the cluster while the object is built or modified,
/// only [`K8sObject::list`] talks to the API server.
#[derive(Clone, Debug)]
pub struct K8sObject {
    obj_type: ResourceKind,
    config: K8sConfig,
    metadata: Map<String, Value>,
    /// Everything besides `apiVersion`, `kind` and `metadata`
    body: Map<String, Value>,
}

/// Builder for [`K8sObject`], see [`K8sObject::builder`].
#[derive(Debug, Default)]
pub struct K8sObjectBuilder {
    name: Option<String>,
    obj_type: Option<Result<ResourceKind>>,
    config: Option<K8sConfig>,
}

impl K8sObjectBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn obj_type(mut self, obj_type: ResourceKind) -> Self {
        self.obj_type = Some(Ok(obj_type));
        self
    }

    /// Same as [`obj_type`](Self::obj_type), the string is validated by
    /// [`build`](Self::build).
    pub fn obj_type_str(mut self, obj_type: &str) -> Self {
        self.obj_type = Some(obj_type.parse());
        self
    }

    /// Defaults to [`K8sConfig::new`] when not set.
    pub fn config(mut self, config: K8sConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<K8sObject> {
        let obj_type = self
            .obj_type
            .ok_or_else(|| Error::invalid("obj_type is required"))??;

        let mut metadata = Map::new();
        if let Some(name) = self.name {
            metadata.insert("name".to_string(), Value::String(non_empty("name", name)?));
        }

        Ok(K8sObject {
            obj_type,
            config: self.config.unwrap_or_default(),
            metadata,
            body: obj_type.skeleton(),
        })
    }
}

impl K8sObject {
    pub fn builder() -> K8sObjectBuilder {
        K8sObjectBuilder::default()
    }

    /// Shortcut for a named object of `obj_type` with the inferred config.
    pub fn new(obj_type: &str, name: &str) -> Result<Self> {
        K8sObject::builder()
            .obj_type_str(obj_type)
            .name(name)
            .build()
    }

    /// Rebuilds an object from a manifest, for example one returned by
    /// [`as_dict`](Self::as_dict) or [`list`](Self::list).
    pub fn from_dict(value: &Value, config: K8sConfig) -> Result<Self> {
        let Value::Object(dict) = value else {
            return Err(Error::invalid(format!("expected an object, got {value}")));
        };

        let obj_type = ResourceKind::try_from(dict.get(KIND).unwrap_or(&Value::Null))?;

        match dict.get(API_VERSION) {
            None => {}
            Some(Value::String(version)) if *version == obj_type.api_version() => {}
            Some(other) => {
                return Err(Error::invalid(format!(
                    "apiVersion: {other} does not match {}",
                    obj_type.api_version()
                )));
            }
        }

        let metadata = match dict.get(METADATA) {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(metadata)) => metadata.clone(),
            Some(other) => {
                return Err(Error::invalid(format!(
                    "metadata: {other} must be an object"
                )));
            }
        };

        match metadata.get("name") {
            None => {}
            Some(Value::String(name)) if !name.is_empty() => {}
            Some(other) => {
                return Err(Error::invalid(format!(
                    "metadata.name: {other} must be a non-empty string"
                )));
            }
        }

        match metadata.get("namespace") {
            None => {}
            Some(Value::String(namespace)) => validate_namespace(namespace)?,
            Some(other) => {
                return Err(Error::invalid(format!(
                    "metadata.namespace: {other} must be a string"
                )));
            }
        }

        let body = dict
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), API_VERSION | KIND | METADATA))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(K8sObject {
            obj_type,
            config,
            metadata,
            body,
        })
    }

    pub fn obj_type(&self) -> ResourceKind {
        self.obj_type
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.get("name").and_then(Value::as_str)
    }

    pub fn config(&self) -> &K8sConfig {
        &self.config
    }

    /// The namespace `list` reads from: the object's own when set, the
    /// config's otherwise.
    pub fn namespace(&self) -> &str {
        self.metadata
            .get("namespace")
            .and_then(Value::as_str)
            .unwrap_or_else(|| self.config.namespace())
    }

    pub fn with_config(mut self, config: K8sConfig) -> Self {
        self.config = config;
        self
    }

    /// The whole object as a JSON mapping.
    pub fn as_dict(&self) -> Map<String, Value> {
        let mut dict = Map::with_capacity(self.body.len() + 3);
        dict.insert(
            API_VERSION.to_string(),
            Value::String(self.obj_type.api_version()),
        );
        dict.insert(
            KIND.to_string(),
            Value::String(self.obj_type.as_str().to_string()),
        );
        dict.insert(METADATA.to_string(), Value::Object(self.metadata.clone()));
        dict.extend(self.body.clone());
        dict
    }

    pub fn as_json(&self) -> String {
        Value::Object(self.as_dict()).to_string()
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.set_metadata("name", name)
    }

    pub fn set_namespace(&mut self, namespace: impl Into<String>) -> Result<()> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;
        self.set_metadata("namespace", namespace)
    }

    pub fn add_label(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.insert_nested("labels", key.into(), value.into())
    }

    pub fn add_annotation(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.insert_nested("annotations", key.into(), value.into())
    }

    fn set_metadata(&mut self, field: &str, value: impl Into<String>) -> Result<()> {
        let value = non_empty(field, value.into())?;
        self.metadata.insert(field.to_string(), Value::String(value));
        Ok(())
    }

    fn insert_nested(&mut self, field: &str, key: String, value: String) -> Result<()> {
        let key = non_empty(field, key)?;

        let entry = self
            .metadata
            .entry(field.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(map) = entry {
            map.insert(key, Value::String(value));
        }

        Ok(())
    }

    /// Every object of this kind in the namespace, in server order.
    pub async fn list(&self) -> Result<Vec<Map<String, Value>>> {
        self.list_with(&ListParams::default()).await
    }

    /// Like [`list`](Self::list), with selectors and paging. Chunked
    /// responses are followed until the server stops sending a continue
    /// token.
    pub async fn list_with(&self, params: &ListParams) -> Result<Vec<Map<String, Value>>> {
        let client = self.config.client()?;
        let resource = self.obj_type.api_resource();
        let namespace = self.namespace();
        // kubeconfig and in-cluster namespaces are not checked on load
        validate_namespace(namespace)?;

        let mut params = params.clone();
        let mut items = Vec::new();
        let mut pages = 0usize;
        loop {
            let list = client
                .list::<Value>(&resource, Some(namespace), &params)
                .await?;
            pages += 1;

            for item in list.items {
                match item {
                    Value::Object(item) => items.push(item),
                    other => {
                        return Err(Error::ServerResponse(format!(
                            "list item is not an object: {other}"
                        )));
                    }
                }
            }

            match list.metadata.r#continue {
                Some(token) if !token.is_empty() => {
                    if params.continue_token.as_deref() == Some(token.as_str()) {
                        return Err(Error::ServerResponse(format!(
                            "continue token {token:?} repeated on page {pages}"
                        )));
                    }
                    params.continue_token = Some(token);
                }
                _ => break,
            }
        }

        debug!(
            message = "list objects",
            kind = %self.obj_type,
            namespace,
            pages,
            items = items.len()
        );

        Ok(items)
    }
}

fn non_empty(field: &str, value: String) -> Result<String> {
    if value.is_empty() {
        return Err(Error::invalid(format!("{field} must not be empty")));
    }

    Ok(value)
}

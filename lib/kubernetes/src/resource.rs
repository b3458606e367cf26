use serde::de::{Deserialize, DeserializeOwned, Deserializer};

/// Describes where a kind of object lives in the API server, so that collection
/// URLs can be built without a compile time type for the object itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ApiResource {
    /// The group of the resource, or the empty string for the core group.
    pub group: &'static str,

    /// The version of the resource.
    pub version: &'static str,

    /// The kind, e.g. `Pod` or `Service`.
    pub kind: &'static str,

    /// The plural of this resource, which is used to construct URLS
    pub plural: &'static str,
}

impl ApiResource {
    /// The `apiVersion` field of objects of this resource, e.g. `v1` or `apps/v1`
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Creates a url path for http requests for this resource
    pub fn url_path(&self, namespace: Option<&str>) -> String {
        let group = if self.group.is_empty() { "api" } else { "apis" };
        let api_version = self.api_version();
        let namespace = match namespace {
            Some(namespace) => format!("namespaces/{namespace}/"),
            None => String::new(),
        };
        let plural = self.plural;

        format!("/{group}/{api_version}/{namespace}{plural}")
    }
}

/// ListMeta describes metadata that synthetic resources must have, including
/// lists and various status objects.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ListMeta {
    /// Set when the server chunked the result, pass it back as
    /// `ListParams::continue_token` to fetch the next page.
    #[serde(default, rename = "continue")]
    pub r#continue: Option<String>,

    #[serde(default, rename = "resourceVersion")]
    pub resource_version: Option<String>,

    #[serde(default, rename = "remainingItemCount")]
    pub remaining_item_count: Option<i64>,
}

/// A generic Kubernetes object list, as returned by list calls on a collection.
#[derive(Debug, serde::Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct ObjectList<T> {
    #[serde(default)]
    pub metadata: ListMeta,

    /// The items we are actually interested in. Older API servers send `null`
    /// instead of an empty array.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<T>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

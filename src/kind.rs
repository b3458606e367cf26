use std::fmt;
use std::str::FromStr;

use kubernetes::ApiResource;
use serde_json::{Map, Value, json};

use crate::Error;

/// The kinds of object a [`K8sObject`](crate::K8sObject) can describe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Pod,
    ReplicationController,
    Secret,
    Service,
    ConfigMap,
    Deployment,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Pod,
        ResourceKind::ReplicationController,
        ResourceKind::Secret,
        ResourceKind::Service,
        ResourceKind::ConfigMap,
        ResourceKind::Deployment,
    ];

    pub const fn as_str(&self) -> &'static str {
        self.api_resource().kind
    }

    pub const fn api_resource(&self) -> ApiResource {
        match self {
            ResourceKind::Pod => core("Pod", "pods"),
            ResourceKind::ReplicationController => {
                core("ReplicationController", "replicationcontrollers")
            }
            ResourceKind::Secret => core("Secret", "secrets"),
            ResourceKind::Service => core("Service", "services"),
            ResourceKind::ConfigMap => core("ConfigMap", "configmaps"),
            ResourceKind::Deployment => ApiResource {
                group: "apps",
                version: "v1",
                kind: "Deployment",
                plural: "deployments",
            },
        }
    }

    /// `v1` for the core group, `<group>/<version>` otherwise
    pub fn api_version(&self) -> String {
        self.api_resource().api_version()
    }

    /// The fields an empty object of this kind carries next to `apiVersion`,
    /// `kind` and `metadata`.
    pub(crate) fn skeleton(&self) -> Map<String, Value> {
        let value = match self {
            ResourceKind::Pod => json!({
                "spec": {
                    "containers": [],
                    "dnsPolicy": "ClusterFirst",
                    "restartPolicy": "Always",
                },
            }),
            ResourceKind::ReplicationController => json!({
                "spec": {
                    "replicas": 0,
                    "selector": {},
                    "template": {
                        "metadata": { "labels": {} },
                        "spec": { "containers": [] },
                    },
                },
            }),
            ResourceKind::Secret => json!({
                "data": {},
                "type": "Opaque",
            }),
            ResourceKind::Service => json!({
                "spec": {
                    "ports": [],
                    "selector": {},
                    "sessionAffinity": "None",
                    "type": "ClusterIP",
                },
            }),
            ResourceKind::ConfigMap => json!({
                "data": {},
            }),
            ResourceKind::Deployment => json!({
                "spec": {
                    "replicas": 1,
                    "selector": { "matchLabels": {} },
                    "template": {
                        "metadata": { "labels": {} },
                        "spec": { "containers": [] },
                    },
                },
            }),
        };

        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

const fn core(kind: &'static str, plural: &'static str) -> ApiResource {
    ApiResource {
        group: "",
        version: "v1",
        kind,
        plural,
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                Error::invalid(format!(
                    "obj_type: {s:?} is not one of {}",
                    ResourceKind::ALL.map(|kind| kind.as_str()).join(", ")
                ))
            })
    }
}

impl TryFrom<&Value> for ResourceKind {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => s.parse(),
            Value::Null => Err(Error::invalid("obj_type is required")),
            other => Err(Error::invalid(format!(
                "obj_type: {other} must be a string"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), kind.as_str());
        }

        assert_eq!(
            "ReplicationController".parse::<ResourceKind>().unwrap(),
            ResourceKind::ReplicationController
        );
    }

    #[test]
    fn parse_unknown() {
        for input in ["yomama", "pod", "", "Pods", " Pod"] {
            let err = input.parse::<ResourceKind>().unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{input:?}");
        }
    }

    #[test]
    fn from_value() {
        assert_eq!(
            ResourceKind::try_from(&json!("Secret")).unwrap(),
            ResourceKind::Secret
        );

        for value in [json!(666), json!(null), json!({}), json!(["Pod"]), json!(true)] {
            let err = ResourceKind::try_from(&value).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{value}");
        }
    }

    #[test]
    fn api_paths() {
        assert_eq!(
            ResourceKind::Service
                .api_resource()
                .url_path(Some("default")),
            "/api/v1/namespaces/default/services"
        );
        assert_eq!(
            ResourceKind::ReplicationController
                .api_resource()
                .url_path(Some("default")),
            "/api/v1/namespaces/default/replicationcontrollers"
        );
        assert_eq!(
            ResourceKind::Deployment
                .api_resource()
                .url_path(Some("web")),
            "/apis/apps/v1/namespaces/web/deployments"
        );
        assert_eq!(ResourceKind::Deployment.api_version(), "apps/v1");
        assert_eq!(ResourceKind::Pod.api_version(), "v1");
    }

    #[test]
    fn skeleton_never_carries_identity() {
        for kind in ResourceKind::ALL {
            let skeleton = kind.skeleton();
            assert!(!skeleton.is_empty());
            for key in ["apiVersion", "kind", "metadata"] {
                assert!(!skeleton.contains_key(key), "{kind} {key}");
            }
        }
    }
}

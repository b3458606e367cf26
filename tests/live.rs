//! Runs against whatever cluster the environment points at. Every test
//! returns early when no api server is configured or it does not answer
//! within a second.

mod util;

use kubeobject::{K8sConfig, K8sObject, ResourceKind};
use testify::random::random_name;

fn live_config() -> Option<K8sConfig> {
    let config = K8sConfig::new();
    let api_host = config.api_host()?;

    if !testify::is_reachable(api_host) {
        tracing::warn!(message = "api server is not reachable, skipping", api_host);
        return None;
    }

    Some(config)
}

fn object(kind: ResourceKind, config: K8sConfig) -> K8sObject {
    K8sObject::builder()
        .obj_type(kind)
        .name(random_name("kubeobject"))
        .config(config)
        .build()
        .unwrap()
}

#[tokio::test]
async fn list_every_kind() {
    util::trace_init();

    let Some(config) = live_config() else {
        return;
    };

    for kind in ResourceKind::ALL {
        let items = object(kind, config.clone()).list().await.unwrap();
        for item in items {
            assert!(item["metadata"]["name"].is_string(), "{kind}");
        }
    }
}

#[tokio::test]
async fn kubernetes_service_in_default_namespace() {
    let Some(config) = live_config() else {
        return;
    };

    let mut obj = object(ResourceKind::Service, config);
    obj.set_namespace("default").unwrap();

    let items = obj.list().await.unwrap();
    let service = items
        .iter()
        .find(|item| item["metadata"]["name"] == "kubernetes")
        .expect("every cluster has the kubernetes service in default");

    let metadata = service["metadata"].as_object().unwrap();
    for key in ["creationTimestamp", "name", "namespace", "resourceVersion", "uid"] {
        assert!(metadata[key].is_string(), "metadata.{key}");
    }
    assert!(metadata["labels"].is_object());

    let spec = &service["spec"];
    for key in ["clusterIP", "sessionAffinity", "type"] {
        assert!(spec[key].is_string(), "spec.{key}");
    }

    let ports = spec["ports"].as_array().unwrap();
    assert!(!ports.is_empty());
    for port in ports {
        let port = port.as_object().unwrap();
        assert_eq!(port.len(), 4, "{port:?}");
        assert!(port["name"].is_string());
        assert!(port["port"].is_u64());
        assert!(port["protocol"].is_string());
        assert!(port["targetPort"].is_u64());
    }
}

#[tokio::test]
async fn secrets_keep_their_shape() {
    let Some(config) = live_config() else {
        return;
    };

    let items = object(ResourceKind::Secret, config).list().await.unwrap();
    for item in items {
        assert!(item.contains_key("metadata"));
        assert!(item["type"].is_string());
    }
}

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use kubeobject::{ConfigOptions, K8sConfig};
use tracing::Level;

pub fn trace_init() {
    let level = std::env::var("TEST_LOG")
        .ok()
        .and_then(|level| Level::from_str(&level).ok())
        .unwrap_or(Level::WARN);

    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_test_writer()
        .try_init();
}

/// A kubeconfig with a single context and no credentials, so tests never
/// pick up the developer's own cluster.
pub fn anonymous_kubeconfig(server: &str) -> PathBuf {
    let path = testify::temp::temp_file();
    let content = format!(
        r#"
apiVersion: v1
kind: Config
clusters:
- name: mock
  cluster:
    server: {server}
contexts:
- name: mock
  context:
    cluster: mock
    user: anonymous
users:
- name: anonymous
  user: {{}}
current-context: mock
"#
    );
    std::fs::write(&path, content).unwrap();
    path
}

pub fn options(addr: SocketAddr) -> ConfigOptions {
    let api_host = format!("http://{addr}");

    ConfigOptions {
        kubeconfig: Some(anonymous_kubeconfig(&api_host)),
        ..Default::default()
    }
}

pub fn config(addr: SocketAddr) -> K8sConfig {
    K8sConfig::with_options(options(addr)).unwrap()
}

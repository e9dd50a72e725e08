//! Cluster operations via kube-rs
//!
//! Everything kubectl would do for chart testing, done natively: no `kubectl`
//! binary is required.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentCondition};
use k8s_openapi::api::core::v1::{Namespace, Pod, PodCondition};
use kube::api::{Api, DeleteParams, ListParams, LogParams};
use kube::Client;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use tokio::sync::OnceCell;
use tracing::{debug, info, trace, warn};

use ct_common::{Error, Result};

const CONDITION_READY: &str = "Ready";
const CONDITION_AVAILABLE: &str = "Available";
const STATUS_TRUE: &str = "True";
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const NAMESPACE_DELETE_TIMEOUT: Duration = Duration::from_secs(300);

/// Cluster operations needed to verify and tear down test installs.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait Kubectl: Send + Sync {
    /// Delete a namespace and wait for it to disappear. Failures are logged only.
    async fn delete_namespace(&self, namespace: &str);

    /// Wait until every deployment matching `selector` is available and its pods ready.
    async fn wait_for_deployments(&self, namespace: &str, selector: &str) -> Result<()>;

    /// Names of pods matching `selector`.
    async fn get_pods(&self, namespace: &str, selector: &str) -> Result<Vec<String>>;

    /// Human-readable description of a pod.
    async fn describe_pod(&self, namespace: &str, pod: &str) -> Result<String>;

    /// Logs of one container.
    async fn logs(&self, namespace: &str, pod: &str, container: &str) -> Result<String>;

    /// Init container names of a pod.
    async fn get_init_containers(&self, namespace: &str, pod: &str) -> Result<Vec<String>>;

    /// Container names of a pod.
    async fn get_containers(&self, namespace: &str, pod: &str) -> Result<Vec<String>>;
}

/// Types with a Kubernetes-style condition (type + status)
trait HasConditionFields {
    fn type_field(&self) -> &str;
    fn status_field(&self) -> &str;
}

impl HasConditionFields for DeploymentCondition {
    fn type_field(&self) -> &str {
        &self.type_
    }
    fn status_field(&self) -> &str {
        &self.status
    }
}

impl HasConditionFields for PodCondition {
    fn type_field(&self) -> &str {
        &self.type_
    }
    fn status_field(&self) -> &str {
        &self.status
    }
}

/// Whether a condition of `condition_type` has status "True".
fn has_condition<T: HasConditionFields>(conditions: Option<&[T]>, condition_type: &str) -> bool {
    conditions
        .map(|conds| {
            conds
                .iter()
                .any(|c| c.type_field() == condition_type && c.status_field() == STATUS_TRUE)
        })
        .unwrap_or(false)
}

/// Poll `check_fn` until it returns `Ok(true)`, an error, or `timeout` passes.
async fn poll_until<F, Fut>(
    timeout: Duration,
    interval: Duration,
    timeout_msg: impl Into<String>,
    mut check_fn: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let timeout_msg = timeout_msg.into();

    loop {
        if check_fn().await? {
            return Ok(());
        }
        if start.elapsed() > timeout {
            return Err(Error::cluster(timeout_msg));
        }
        trace!("Polling condition not yet met, retrying...");
        tokio::time::sleep(interval).await;
    }
}

fn deployment_ready(deployment: &Deployment) -> bool {
    let Some(status) = deployment.status.as_ref() else {
        return false;
    };
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    let observed_current = match (deployment.metadata.generation, status.observed_generation) {
        (Some(generation), Some(observed)) => observed >= generation,
        _ => true,
    };

    observed_current
        && status.updated_replicas.unwrap_or(0) >= desired
        && status.available_replicas.unwrap_or(0) >= desired
        && has_condition(status.conditions.as_deref(), CONDITION_AVAILABLE)
}

fn pod_ready(pod: &Pod) -> bool {
    has_condition(
        pod.status.as_ref().and_then(|s| s.conditions.as_deref()),
        CONDITION_READY,
    )
}

/// Every pod that is not being deleted reports Ready.
fn pods_ready(pods: &[Pod]) -> bool {
    pods.iter()
        .filter(|pod| pod.metadata.deletion_timestamp.is_none())
        .all(pod_ready)
}

/// `k1=v1,k2=v2` from a label map
fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

fn list_params(selector: &str) -> ListParams {
    if selector.is_empty() {
        ListParams::default()
    } else {
        ListParams::default().labels(selector)
    }
}

fn kube_err(context: &str, e: kube::Error) -> Error {
    Error::cluster(format!("{}: {}", context, e))
}

/// kube-rs backed cluster client; the connection is created on first use.
pub struct KubeCluster {
    client: OnceCell<Client>,
    deployment_timeout: Duration,
}

impl KubeCluster {
    /// Create a cluster client that waits up to `deployment_timeout` for rollouts.
    pub fn new(deployment_timeout: Duration) -> Self {
        Self {
            client: OnceCell::new(),
            deployment_timeout,
        }
    }

    async fn client(&self) -> Result<Client> {
        self.client
            .get_or_try_init(|| async {
                Client::try_default()
                    .await
                    .map_err(|e| kube_err("failed to create kubernetes client", e))
            })
            .await
            .cloned()
    }

    async fn get_pod(&self, namespace: &str, pod: &str) -> Result<Pod> {
        let pods: Api<Pod> = Api::namespaced(self.client().await?, namespace);
        pods.get(pod)
            .await
            .map_err(|e| kube_err(&format!("failed to get pod {}/{}", namespace, pod), e))
    }

    async fn wait_for_deployment(&self, deployments: &Api<Deployment>, name: &str) -> Result<()> {
        info!(deployment = %name, "Waiting for deployment rollout");
        poll_until(
            self.deployment_timeout,
            POLL_INTERVAL,
            format!("timeout waiting for deployment {} to roll out", name),
            || async move {
                match deployments.get(name).await {
                    Ok(deployment) => Ok(deployment_ready(&deployment)),
                    Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
                    Err(e) => Err(kube_err(&format!("failed to get deployment {}", name), e)),
                }
            },
        )
        .await
    }

    /// Old pods may still be terminating right after a rollout, so readiness is polled.
    async fn wait_for_pods(&self, pods: &Api<Pod>, deployment: &str, selector: &str) -> Result<()> {
        let params = &list_params(selector);
        poll_until(
            self.deployment_timeout,
            POLL_INTERVAL,
            format!("timeout waiting for pods of deployment {} to become ready", deployment),
            || async move {
                let list = pods
                    .list(params)
                    .await
                    .map_err(|e| kube_err(&format!("failed to list pods of {}", deployment), e))?;
                Ok(pods_ready(&list.items))
            },
        )
        .await
    }
}

#[async_trait]
impl Kubectl for KubeCluster {
    async fn delete_namespace(&self, namespace: &str) {
        info!(%namespace, "Deleting namespace");
        let client = match self.client().await {
            Ok(client) => client,
            Err(e) => {
                warn!(%namespace, error = %e, "Error deleting namespace");
                return;
            }
        };
        let namespaces: Api<Namespace> = Api::all(client);

        match namespaces.delete(namespace, &DeleteParams::default()).await {
            Ok(_) => {}
            Err(kube::Error::Api(e)) if e.code == 404 => return,
            Err(e) => {
                warn!(%namespace, error = %e, "Error deleting namespace");
                return;
            }
        }

        let start = Instant::now();
        loop {
            match namespaces.get_opt(namespace).await {
                Ok(None) => {
                    debug!(%namespace, "Namespace deleted");
                    return;
                }
                Ok(Some(_)) if start.elapsed() < NAMESPACE_DELETE_TIMEOUT => {
                    trace!(%namespace, "Namespace still terminating");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Ok(Some(_)) => {
                    warn!(%namespace, "Timeout waiting for namespace deletion, proceeding anyway");
                    return;
                }
                // Can't determine state; don't block the run on it
                Err(_) => return,
            }
        }
    }

    async fn wait_for_deployments(&self, namespace: &str, selector: &str) -> Result<()> {
        let client = self.client().await?;
        let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);
        let pods: Api<Pod> = Api::namespaced(client, namespace);

        let list = deployments
            .list(&list_params(selector))
            .await
            .map_err(|e| kube_err(&format!("failed to list deployments in {}", namespace), e))?;

        for deployment in &list.items {
            let Some(name) = deployment.metadata.name.as_deref() else {
                continue;
            };
            self.wait_for_deployment(&deployments, name).await?;

            // A finished rollout can still leave crash-looping pods behind.
            let match_labels = deployment
                .spec
                .as_ref()
                .and_then(|s| s.selector.match_labels.as_ref());
            let Some(match_labels) = match_labels else {
                continue;
            };
            self.wait_for_pods(&pods, name, &label_selector(match_labels))
                .await?;
        }
        Ok(())
    }

    async fn get_pods(&self, namespace: &str, selector: &str) -> Result<Vec<String>> {
        let pods: Api<Pod> = Api::namespaced(self.client().await?, namespace);
        let list = pods
            .list(&list_params(selector))
            .await
            .map_err(|e| kube_err(&format!("failed to list pods in {}", namespace), e))?;
        Ok(list
            .items
            .into_iter()
            .filter_map(|pod| pod.metadata.name)
            .collect())
    }

    async fn describe_pod(&self, namespace: &str, pod: &str) -> Result<String> {
        let mut pod = self.get_pod(namespace, pod).await?;
        pod.metadata.managed_fields = None;
        Ok(serde_yaml::to_string(&pod)?)
    }

    async fn logs(&self, namespace: &str, pod: &str, container: &str) -> Result<String> {
        let pods: Api<Pod> = Api::namespaced(self.client().await?, namespace);
        let params = LogParams {
            container: Some(container.to_string()),
            ..Default::default()
        };
        pods.logs(pod, &params).await.map_err(|e| {
            kube_err(
                &format!("failed to get logs of {}/{}/{}", namespace, pod, container),
                e,
            )
        })
    }

    async fn get_init_containers(&self, namespace: &str, pod: &str) -> Result<Vec<String>> {
        let pod = self.get_pod(namespace, pod).await?;
        Ok(pod
            .spec
            .and_then(|s| s.init_containers)
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    async fn get_containers(&self, namespace: &str, pod: &str) -> Result<Vec<String>> {
        let pod = self.get_pod(namespace, pod).await?;
        Ok(pod
            .spec
            .map(|s| s.containers)
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.name)
            .collect())
    }
}

//! Pod descriptions and container logs printed before a release is torn down

use ct_common::delimiter_line;
use tracing::warn;

use crate::testing::Testing;

impl Testing {
    /// Print every matching pod's description and container logs.
    ///
    /// Best effort: errors are logged and never surface to the caller.
    pub async fn print_pod_details_and_logs(&self, namespace: &str, selector: &str) {
        let kubectl = &self.tools.kubectl;
        let pods = match kubectl.get_pods(namespace, selector).await {
            Ok(pods) => pods,
            Err(e) => {
                warn!(%namespace, error = %e, "Error printing logs");
                return;
            }
        };

        println!("{}", delimiter_line('='));
        for pod in &pods {
            match kubectl.describe_pod(namespace, pod).await {
                Ok(description) => print_section("Description of pod", pod, '~', &description),
                Err(e) => warn!(%pod, error = %e, "Error describing pod"),
            }

            let init_containers = match kubectl.get_init_containers(namespace, pod).await {
                Ok(containers) => containers,
                Err(e) => {
                    warn!(%pod, error = %e, "Error printing logs");
                    return;
                }
            };
            self.print_container_logs(namespace, pod, "Logs of init container", &init_containers)
                .await;

            let containers = match kubectl.get_containers(namespace, pod).await {
                Ok(containers) => containers,
                Err(e) => {
                    warn!(%pod, error = %e, "Error printing logs");
                    return;
                }
            };
            self.print_container_logs(namespace, pod, "Logs of container", &containers)
                .await;
        }
        println!("{}", delimiter_line('='));
    }

    async fn print_container_logs(&self, namespace: &str, pod: &str, title: &str, containers: &[String]) {
        for container in containers {
            match self.tools.kubectl.logs(namespace, pod, container).await {
                Ok(logs) => print_section(title, container, '-', &logs),
                Err(e) => warn!(%pod, %container, error = %e, "Error getting container logs"),
            }
        }
    }
}

fn print_section(title: &str, item: &str, delimiter: char, body: &str) {
    println!("{}", delimiter_line(delimiter));
    println!(" {} {}", title, item);
    println!("{}", delimiter_line(delimiter));
    println!("{}", body);
}

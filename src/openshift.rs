//! OpenShift cluster operations
//!
//! Thin wrappers over `oc` run on the master node through SSH. Object
//! creation pipes a JSON manifest through `oc create -f -`; queries use
//! `-o json`/`-o jsonpath` and parse with serde_json. Anything
//! eventually-consistent (PVC binding, pod readiness, resource deletion)
//! is a [`Waiter`] loop that swallows transient errors until its deadline
//! and then reports a timeout naming the resource.

use crate::error::{HarnessError, IsTransient, Result};
use crate::remote::{CommandOutput, Executor};
use crate::utils::{shell_quote, unique_name};
use crate::waiter::Waiter;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, info};

/// A glusterfs pod backing one brick of a volume, and the node it runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlusterPod {
    pub pod_name: String,
    pub host_name: String,
}

/// Handle to one OpenShift cluster, addressed through its master node.
#[derive(Debug, Clone)]
pub struct Cluster {
    exec: Executor,
    master: String,
}

impl Cluster {
    pub fn new(exec: Executor, master: impl Into<String>) -> Self {
        Self {
            exec,
            master: master.into(),
        }
    }

    pub fn master(&self) -> &str {
        &self.master
    }

    pub fn executor(&self) -> &Executor {
        &self.exec
    }

    /// Run a raw `oc` (or any other) command on the master.
    pub async fn cmd_run(&self, command: &str) -> Result<String> {
        self.exec.run_ok(&self.master, command).await
    }

    async fn create_from_manifest(&self, manifest: &Value) -> Result<()> {
        let command = format!("oc create -f - <<'EOF'\n{}\nEOF", manifest);
        self.cmd_run(&command).await?;
        Ok(())
    }

    /// Create a secret holding the heketi admin key, returning its name.
    pub async fn create_secret(
        &self,
        namespace: &str,
        key: &str,
        secret_type: &str,
    ) -> Result<String> {
        let name = unique_name("autotests-secret");
        let command = format!(
            "oc create secret generic {} --type={} --from-literal=key={} -n {}",
            name,
            secret_type,
            shell_quote(key),
            namespace
        );
        self.cmd_run(&command).await?;
        info!(secret = %name, namespace, "created secret");
        Ok(name)
    }

    /// Create a glusterfs storage class, returning its generated name.
    ///
    /// `volume_name_prefix` maps to the provisioner's `volumenameprefix`
    /// parameter; heketi then names backing volumes
    /// `<prefix>_<namespace>_<pvc>_<uuid>`.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_storage_class(
        &self,
        provisioner: &str,
        resturl: &str,
        restuser: &str,
        secret_namespace: &str,
        secret_name: &str,
        volume_name_prefix: Option<&str>,
    ) -> Result<String> {
        let name = unique_name("autotests-sc");
        let mut parameters = json!({
            "resturl": resturl,
            "restuser": restuser,
            "secretnamespace": secret_namespace,
            "secretname": secret_name,
        });
        if let Some(prefix) = volume_name_prefix {
            parameters["volumenameprefix"] = json!(prefix);
        }
        let manifest = json!({
            "apiVersion": "storage.k8s.io/v1",
            "kind": "StorageClass",
            "metadata": { "name": name },
            "provisioner": provisioner,
            "parameters": parameters,
        });
        self.create_from_manifest(&manifest).await?;
        info!(sc = %name, "created storage class");
        Ok(name)
    }

    /// Create a PVC against `sc_name`, returning its generated name.
    pub async fn create_pvc(&self, sc_name: &str, prefix: &str, size_gi: u32) -> Result<String> {
        let name = unique_name(prefix);
        let manifest = json!({
            "apiVersion": "v1",
            "kind": "PersistentVolumeClaim",
            "metadata": { "name": name },
            "spec": {
                "accessModes": ["ReadWriteOnce"],
                "storageClassName": sc_name,
                "resources": { "requests": { "storage": format!("{}Gi", size_gi) } },
            },
        });
        self.create_from_manifest(&manifest).await?;
        info!(pvc = %name, sc = sc_name, "created pvc");
        Ok(name)
    }

    /// Create a DC whose pod continuously writes to the mounted volume,
    /// returning the DC name.
    pub async fn create_app_dc_with_io(&self, pvc_name: &str) -> Result<String> {
        let name = unique_name("autotests-dc");
        let io_loop = "while true; do \
            dd if=/dev/urandom of=/mnt/random-data.log bs=1K count=100 conv=fsync; \
            sleep 2; done";
        let manifest = json!({
            "apiVersion": "apps.openshift.io/v1",
            "kind": "DeploymentConfig",
            "metadata": { "name": name },
            "spec": {
                "replicas": 1,
                "selector": { "name": name },
                "template": {
                    "metadata": { "labels": { "name": name } },
                    "spec": {
                        "containers": [{
                            "name": "app",
                            "image": "busybox",
                            "command": ["sh", "-c", io_loop],
                            "volumeMounts": [{ "name": "data", "mountPath": "/mnt" }],
                        }],
                        "volumes": [{
                            "name": "data",
                            "persistentVolumeClaim": { "claimName": pvc_name },
                        }],
                    },
                },
            },
        });
        self.create_from_manifest(&manifest).await?;
        info!(dc = %name, pvc = pvc_name, "created app dc");
        Ok(name)
    }

    /// Create a minimal pod mounting `pvc_name` at `mount_path`, returning
    /// the pod name.
    pub async fn create_tiny_pod_with_volume(
        &self,
        pvc_name: &str,
        prefix: &str,
        mount_path: &str,
    ) -> Result<String> {
        let name = unique_name(prefix);
        let manifest = json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": name },
            "spec": {
                "containers": [{
                    "name": "app",
                    "image": "busybox",
                    "command": ["sleep", "3600"],
                    "volumeMounts": [{ "name": "data", "mountPath": mount_path }],
                }],
                "volumes": [{
                    "name": "data",
                    "persistentVolumeClaim": { "claimName": pvc_name },
                }],
            },
        });
        self.create_from_manifest(&manifest).await?;
        info!(pod = %name, pvc = pvc_name, "created tiny pod");
        Ok(name)
    }

    /// Delete a named resource. With `ignore_absent`, deleting something
    /// that is already gone is not an error.
    pub async fn delete(&self, kind: &str, name: &str, ignore_absent: bool) -> Result<()> {
        let mut command = format!("oc delete {} {}", kind, name);
        if ignore_absent {
            command.push_str(" --ignore-not-found");
        }
        self.cmd_run(&command).await?;
        Ok(())
    }

    /// Like [`delete`](Self::delete) but in an explicit namespace.
    pub async fn delete_in(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
        ignore_absent: bool,
    ) -> Result<()> {
        let mut command = format!("oc delete {} {} -n {}", kind, name, namespace);
        if ignore_absent {
            command.push_str(" --ignore-not-found");
        }
        self.cmd_run(&command).await?;
        Ok(())
    }

    /// Run a command inside a pod. Non-zero exits are returned, not raised,
    /// so callers can assert on them.
    pub async fn rsh(&self, pod: &str, command: &str) -> Result<CommandOutput> {
        let full = format!("oc rsh {} sh -c {}", pod, shell_quote(command));
        self.exec.run(&self.master, &full).await
    }

    /// Like [`rsh`](Self::rsh) but in an explicit namespace.
    pub async fn exec_in(
        &self,
        namespace: &str,
        pod: &str,
        command: &str,
    ) -> Result<CommandOutput> {
        let full = format!(
            "oc exec -n {} {} -- sh -c {}",
            namespace,
            pod,
            shell_quote(command)
        );
        self.exec.run(&self.master, &full).await
    }

    /// Current phase of a PVC ("Pending", "Bound", "Lost").
    pub async fn pvc_status(&self, name: &str) -> Result<String> {
        let out = self
            .cmd_run(&format!(
                "oc get pvc {} -o jsonpath='{{.status.phase}}'",
                name
            ))
            .await?;
        Ok(out.trim().to_string())
    }

    /// Name of the PV bound to a PVC, once bound.
    pub async fn pv_name_for_pvc(&self, pvc: &str) -> Result<String> {
        let out = self
            .cmd_run(&format!(
                "oc get pvc {} -o jsonpath='{{.spec.volumeName}}'",
                pvc
            ))
            .await?;
        let name = out.trim().to_string();
        if name.is_empty() {
            return Err(HarnessError::Heketi(format!(
                "pvc {} has no bound volume",
                pvc
            )));
        }
        Ok(name)
    }

    /// Gluster volume name backing a PVC (the PV's `glusterfs.path`).
    pub async fn gluster_volume_for_pvc(&self, pvc: &str) -> Result<String> {
        let pv = self.pv_name_for_pvc(pvc).await?;
        let out = self
            .cmd_run(&format!(
                "oc get pv {} -o jsonpath='{{.spec.glusterfs.path}}'",
                pv
            ))
            .await?;
        Ok(out.trim().to_string())
    }

    /// Poll until a PVC reaches the Bound phase.
    pub async fn wait_for_pvc_bound(&self, name: &str, timeout: u64, interval: u64) -> Result<()> {
        let mut w = Waiter::from_secs(timeout, interval);
        while w.next().await {
            match self.pvc_status(name).await {
                Ok(status) if status == "Bound" => {
                    info!(pvc = name, "pvc bound");
                    return Ok(());
                }
                Ok(status) => debug!(pvc = name, %status, "pvc not bound yet"),
                Err(e) if e.is_transient() => debug!(pvc = name, error = %e, "pvc status check failed, retrying"),
                Err(e) => return Err(e),
            }
        }
        Err(HarnessError::Timeout {
            what: format!("pvc {} to be bound", name),
            seconds: timeout,
        })
    }

    /// Resolve the (non-terminating) pod spawned by a DC, polling until the
    /// deployment has produced one.
    pub async fn pod_name_from_dc(&self, dc: &str, timeout: u64, interval: u64) -> Result<String> {
        let command = format!("oc get pods -o json -l deploymentconfig={}", dc);
        let mut w = Waiter::from_secs(timeout, interval);
        while w.next().await {
            match self.cmd_run(&command).await {
                Ok(out) => {
                    let Some(parsed) = parse_oc_json(&out) else {
                        continue;
                    };
                    if let Some(name) = live_pod_names(&parsed).into_iter().next() {
                        return Ok(name);
                    }
                    debug!(dc, "no pod for dc yet");
                }
                Err(e) if e.is_transient() => debug!(dc, error = %e, "pod lookup failed, retrying"),
                Err(e) => return Err(e),
            }
        }
        Err(HarnessError::Timeout {
            what: format!("a pod of dc {}", dc),
            seconds: timeout,
        })
    }

    /// Poll until a pod is Running with all containers ready.
    pub async fn wait_for_pod_ready(&self, pod: &str, timeout: u64, interval: u64) -> Result<()> {
        self.wait_for_pod_ready_impl(None, pod, timeout, interval)
            .await
    }

    /// Like [`wait_for_pod_ready`](Self::wait_for_pod_ready) but in an
    /// explicit namespace.
    pub async fn wait_for_pod_ready_in(
        &self,
        namespace: &str,
        pod: &str,
        timeout: u64,
        interval: u64,
    ) -> Result<()> {
        self.wait_for_pod_ready_impl(Some(namespace), pod, timeout, interval)
            .await
    }

    async fn wait_for_pod_ready_impl(
        &self,
        namespace: Option<&str>,
        pod: &str,
        timeout: u64,
        interval: u64,
    ) -> Result<()> {
        let ns_flag = namespace.map(|n| format!(" -n {}", n)).unwrap_or_default();
        let command = format!("oc get pod {}{} -o json", pod, ns_flag);
        let mut w = Waiter::from_secs(timeout, interval);
        while w.next().await {
            match self.cmd_run(&command).await {
                Ok(out) => {
                    let Some(parsed) = parse_oc_json(&out) else {
                        continue;
                    };
                    if pod_is_ready(&parsed) {
                        info!(pod, "pod ready");
                        return Ok(());
                    }
                    debug!(pod, "pod not ready yet");
                }
                Err(e) if e.is_transient() => debug!(pod, error = %e, "pod check failed, retrying"),
                Err(e) => return Err(e),
            }
        }
        Err(HarnessError::Timeout {
            what: format!("pod {} to become ready", pod),
            seconds: timeout,
        })
    }

    /// Poll until a named resource no longer exists.
    pub async fn wait_for_resource_absence(
        &self,
        kind: &str,
        name: &str,
        timeout: u64,
        interval: u64,
    ) -> Result<()> {
        let command = format!("oc get {} {}", kind, name);
        let mut w = Waiter::from_secs(timeout, interval);
        while w.next().await {
            let out = self.exec.run(&self.master, &command).await;
            match out {
                Ok(out) if !out.success() && out.stderr.contains("NotFound") => {
                    info!(kind, name, "resource gone");
                    return Ok(());
                }
                Ok(_) => debug!(kind, name, "resource still present"),
                Err(e) if e.is_transient() => debug!(kind, name, error = %e, "absence check failed, retrying"),
                Err(e) => return Err(e),
            }
        }
        Err(HarnessError::Timeout {
            what: format!("{} {} to be deleted", kind, name),
            seconds: timeout,
        })
    }

    /// Scale a DC and wait for its pod count to settle at `replicas`.
    pub async fn scale_dc_and_wait(
        &self,
        dc: &str,
        replicas: u32,
        namespace: Option<&str>,
    ) -> Result<()> {
        let ns_flag = namespace.map(|n| format!(" -n {}", n)).unwrap_or_default();
        self.cmd_run(&format!(
            "oc scale --replicas={} dc/{}{}",
            replicas, dc, ns_flag
        ))
        .await?;

        let list_cmd = format!("oc get pods -o json -l deploymentconfig={}{}", dc, ns_flag);
        let timeout = 180;
        let mut w = Waiter::from_secs(timeout, 5);
        while w.next().await {
            match self.cmd_run(&list_cmd).await {
                Ok(out) => {
                    let Some(parsed) = parse_oc_json(&out) else {
                        continue;
                    };
                    let live = live_pod_names(&parsed);
                    let ready = pods_ready_count(&parsed);
                    if live.len() == replicas as usize && ready == replicas as usize {
                        info!(dc, replicas, "dc scaled");
                        return Ok(());
                    }
                    debug!(dc, live = live.len(), ready, "dc still scaling");
                }
                Err(e) if e.is_transient() => debug!(dc, error = %e, "scale check failed, retrying"),
                Err(e) => return Err(e),
            }
        }
        Err(HarnessError::Timeout {
            what: format!("dc {} to scale to {} pods", dc, replicas),
            seconds: timeout,
        })
    }

    /// Map a PVC to the glusterfs pods (and their nodes) that hold its
    /// bricks. `namespace` is where the glusterfs daemon pods live.
    pub async fn gluster_pods_for_pvc(
        &self,
        namespace: &str,
        pvc: &str,
    ) -> Result<Vec<GlusterPod>> {
        let volume = self.gluster_volume_for_pvc(pvc).await?;

        let out = self
            .cmd_run(&format!(
                "oc get pods -n {} -o json -l glusterfs-node=pod",
                namespace
            ))
            .await?;
        let parsed: Value = serde_json::from_str(&out)?;
        let gluster_pods = gluster_pod_hosts(&parsed);
        if gluster_pods.is_empty() {
            return Err(HarnessError::Heketi(format!(
                "no glusterfs pods found in namespace {}",
                namespace
            )));
        }

        // Any gluster pod can report the brick layout.
        let info = self
            .exec_in(
                namespace,
                &gluster_pods[0].0,
                &format!("gluster volume info {}", volume),
            )
            .await?;
        if !info.success() {
            return Err(HarnessError::Heketi(format!(
                "gluster volume info {} failed: {}",
                volume,
                info.stderr.trim()
            )));
        }
        let brick_hosts = parse_brick_hosts(&info.stdout);

        let matched: Vec<GlusterPod> = gluster_pods
            .into_iter()
            .filter(|(_, host_ip, node)| {
                brick_hosts.iter().any(|b| b == host_ip || b == node)
            })
            .map(|(pod_name, _, node)| GlusterPod {
                pod_name,
                host_name: node,
            })
            .collect();
        if matched.is_empty() {
            return Err(HarnessError::Heketi(format!(
                "no glusterfs pod matches bricks of volume {}",
                volume
            )));
        }
        Ok(matched)
    }
}

/// Parse `oc ... -o json` output. `oc` emits truncated or garbled JSON
/// when its apiserver connection drops mid-read, so wait loops treat a
/// failed parse as one more transient miss instead of aborting.
fn parse_oc_json(out: &str) -> Option<Value> {
    match serde_json::from_str(out) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(error = %e, "unparseable oc json output");
            None
        }
    }
}

/// Names of listed pods that are not being torn down.
fn live_pod_names(pod_list: &Value) -> Vec<String> {
    pod_list["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|p| p["metadata"]["deletionTimestamp"].is_null())
                .filter_map(|p| p["metadata"]["name"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn pods_ready_count(pod_list: &Value) -> usize {
    pod_list["items"]
        .as_array()
        .map(|items| items.iter().filter(|p| pod_is_ready(p)).count())
        .unwrap_or(0)
}

fn pod_is_ready(pod: &Value) -> bool {
    if pod["status"]["phase"].as_str() != Some("Running") {
        return false;
    }
    pod["status"]["containerStatuses"]
        .as_array()
        .map(|cs| !cs.is_empty() && cs.iter().all(|c| c["ready"] == json!(true)))
        .unwrap_or(false)
}

/// (pod name, host IP, node name) for each listed glusterfs pod.
fn gluster_pod_hosts(pod_list: &Value) -> Vec<(String, String, String)> {
    pod_list["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|p| {
                    let name = p["metadata"]["name"].as_str()?;
                    let host_ip = p["status"]["hostIP"].as_str().unwrap_or_default();
                    let node = p["spec"]["nodeName"].as_str().unwrap_or_default();
                    Some((name.to_string(), host_ip.to_string(), node.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Brick hosts out of `gluster volume info` output
/// (`Brick1: 10.0.0.5:/var/lib/heketi/...`).
fn parse_brick_hosts(volume_info: &str) -> Vec<String> {
    let re = Regex::new(r"(?m)^Brick\d+:\s*([^:\s]+):").expect("static regex");
    re.captures_iter(volume_info)
        .map(|c| c[1].to_string())
        .collect()
}

//! Workflow lookup against the Kubernetes API.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;

use super::Workflow;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Source of `Workflow` resources.
#[async_trait]
pub trait WorkflowSource: Send + Sync {
    async fn get_workflow(&self, namespace: &str, name: &str) -> Result<Workflow>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Auth {
    None,
    Bearer(String),
    Basic { username: String, password: String },
}

/// PEM material given either as a file or inline in the kubeconfig.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pem {
    File(PathBuf),
    Inline(Vec<u8>),
}

impl Pem {
    /// `data` (base64, `*-data` keys) wins over `file`, as in kubectl.
    fn select(
        field: &str,
        file: Option<&String>,
        data: Option<&String>,
        base_dir: Option<&Path>,
    ) -> Result<Option<Self>> {
        if let Some(data) = data {
            let pem = STANDARD
                .decode(data.trim())
                .with_context(|| format!("Invalid base64 in {}-data", field))?;
            return Ok(Some(Pem::Inline(pem)));
        }
        // Relative paths are resolved against the kubeconfig's directory.
        Ok(file.map(|file| {
            let file = PathBuf::from(file);
            match base_dir {
                Some(dir) if file.is_relative() => Pem::File(dir.join(file)),
                _ => Pem::File(file),
            }
        }))
    }

    fn read(&self) -> Result<Vec<u8>> {
        match self {
            Pem::File(path) => std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display())),
            Pem::Inline(data) => Ok(data.clone()),
        }
    }
}

/// Everything needed to reach the API server, before an HTTP client is built.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Connection {
    server: String,
    auth: Auth,
    ca: Option<Pem>,
    /// Client certificate and key.
    identity: Option<(Pem, Pem)>,
    insecure: bool,
}

#[derive(Debug, Deserialize)]
struct KubeConfig {
    #[serde(rename = "current-context", default)]
    current_context: String,
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    contexts: Vec<NamedContext>,
    #[serde(default)]
    users: Vec<NamedUser>,
}

#[derive(Debug, Deserialize)]
struct NamedCluster {
    name: String,
    cluster: Cluster,
}

#[derive(Debug, Deserialize)]
struct Cluster {
    server: String,
    #[serde(rename = "certificate-authority")]
    certificate_authority: Option<String>,
    #[serde(rename = "certificate-authority-data")]
    certificate_authority_data: Option<String>,
    #[serde(rename = "insecure-skip-tls-verify", default)]
    insecure_skip_tls_verify: bool,
}

#[derive(Debug, Deserialize)]
struct NamedContext {
    name: String,
    context: ContextEntry,
}

#[derive(Debug, Deserialize)]
struct ContextEntry {
    cluster: String,
    #[serde(default)]
    user: String,
}

#[derive(Debug, Deserialize)]
struct NamedUser {
    name: String,
    #[serde(default)]
    user: UserEntry,
}

#[derive(Debug, Default, Deserialize)]
struct UserEntry {
    token: Option<String>,
    #[serde(rename = "tokenFile")]
    token_file: Option<String>,
    username: Option<String>,
    password: Option<String>,
    #[serde(rename = "client-certificate")]
    client_certificate: Option<String>,
    #[serde(rename = "client-certificate-data")]
    client_certificate_data: Option<String>,
    #[serde(rename = "client-key")]
    client_key: Option<String>,
    #[serde(rename = "client-key-data")]
    client_key_data: Option<String>,
}

fn connection_from_kubeconfig(path: &Path) -> Result<Connection> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
    let config: KubeConfig = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse kubeconfig {}", path.display()))?;

    let context = config
        .contexts
        .iter()
        .find(|c| c.name == config.current_context)
        .ok_or_else(|| anyhow!("context '{}' not found in kubeconfig", config.current_context))?;
    let cluster = config
        .clusters
        .iter()
        .find(|c| c.name == context.context.cluster)
        .ok_or_else(|| anyhow!("cluster '{}' not found in kubeconfig", context.context.cluster))?;
    let user = config.users.iter().find(|u| u.name == context.context.user);

    let auth = match user.map(|u| &u.user) {
        Some(UserEntry { token: Some(token), .. }) => Auth::Bearer(token.clone()),
        Some(UserEntry { token_file: Some(file), .. }) => Auth::Bearer(
            std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read token file {}", file))?
                .trim()
                .to_string(),
        ),
        Some(UserEntry {
            username: Some(username),
            password: Some(password),
            ..
        }) => Auth::Basic {
            username: username.clone(),
            password: password.clone(),
        },
        _ => Auth::None,
    };

    let base_dir = path.parent();
    let ca = Pem::select(
        "certificate-authority",
        cluster.cluster.certificate_authority.as_ref(),
        cluster.cluster.certificate_authority_data.as_ref(),
        base_dir,
    )?;

    let identity = match user {
        Some(named) => {
            let entry = &named.user;
            let cert = Pem::select(
                "client-certificate",
                entry.client_certificate.as_ref(),
                entry.client_certificate_data.as_ref(),
                base_dir,
            )?;
            let key = Pem::select(
                "client-key",
                entry.client_key.as_ref(),
                entry.client_key_data.as_ref(),
                base_dir,
            )?;
            match (cert, key) {
                (Some(cert), Some(key)) => Some((cert, key)),
                (None, None) => None,
                _ => bail!(
                    "user '{}' needs both a client certificate and a client key",
                    named.name
                ),
            }
        }
        None => None,
    };

    Ok(Connection {
        server: cluster.cluster.server.trim_end_matches('/').to_string(),
        auth,
        ca,
        identity,
        insecure: cluster.cluster.insecure_skip_tls_verify,
    })
}

fn connection_in_cluster(sa_dir: &Path, host: &str, port: &str) -> Result<Connection> {
    let token = std::fs::read_to_string(sa_dir.join("token"))
        .context("Failed to read service account token")?;
    let ca = sa_dir.join("ca.crt");
    let host = if host.contains(':') { format!("[{}]", host) } else { host.to_string() };
    Ok(Connection {
        server: format!("https://{}:{}", host, port),
        auth: Auth::Bearer(token.trim().to_string()),
        ca: ca.exists().then_some(Pem::File(ca)),
        identity: None,
        insecure: false,
    })
}

/// Reads workflows through the `argoproj.io/v1alpha1` REST API.
pub struct KubeWorkflowSource {
    client: reqwest::Client,
    server: String,
    auth: Auth,
}

impl KubeWorkflowSource {
    /// Pick credentials the way kubectl does: an explicit kubeconfig, then the
    /// in-cluster service account, then `~/.kube/config`.
    pub fn load(kubeconfig: Option<&Path>) -> Result<Self> {
        let connection = match kubeconfig {
            Some(path) => connection_from_kubeconfig(path)?,
            None => match (
                std::env::var("KUBERNETES_SERVICE_HOST"),
                std::env::var("KUBERNETES_SERVICE_PORT"),
            ) {
                (Ok(host), Ok(port)) => {
                    connection_in_cluster(Path::new(SERVICE_ACCOUNT_DIR), &host, &port)?
                }
                _ => {
                    let path = dirs::home_dir()
                        .map(|home| home.join(".kube").join("config"))
                        .ok_or_else(|| anyhow!("no kubeconfig given and no home directory"))?;
                    connection_from_kubeconfig(&path)?
                }
            },
        };
        tracing::info!(server = %connection.server, "using Kubernetes API server");
        Self::connect(connection)
    }

    fn connect(connection: Connection) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(30));
        if let Some(ca) = &connection.ca {
            let cert =
                reqwest::Certificate::from_pem(&ca.read()?).context("Invalid CA certificate")?;
            builder = builder.add_root_certificate(cert);
        }
        if let Some((cert, key)) = &connection.identity {
            let mut pem = cert.read()?;
            pem.push(b'\n');
            pem.extend(key.read()?);
            let identity =
                reqwest::Identity::from_pem(&pem).context("Invalid client certificate or key")?;
            builder = builder.identity(identity);
        }
        if connection.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().context("Failed to build Kubernetes HTTP client")?;
        Ok(Self {
            client,
            server: connection.server,
            auth: connection.auth,
        })
    }

    fn workflow_url(&self, namespace: &str, name: &str) -> String {
        format!(
            "{}/apis/argoproj.io/v1alpha1/namespaces/{}/workflows/{}",
            self.server, namespace, name
        )
    }
}

#[async_trait]
impl WorkflowSource for KubeWorkflowSource {
    async fn get_workflow(&self, namespace: &str, name: &str) -> Result<Workflow> {
        let mut req = self.client.get(self.workflow_url(namespace, name));
        req = match &self.auth {
            Auth::None => req,
            Auth::Bearer(token) => req.bearer_auth(token),
            Auth::Basic { username, password } => req.basic_auth(username, Some(password)),
        };
        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to request workflow {}/{}", namespace, name))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("failed to find workflow {}/{}: {} - {}", namespace, name, status, text);
        }
        resp.json::<Workflow>()
            .await
            .with_context(|| format!("Failed to decode workflow {}/{}", namespace, name))
    }
}

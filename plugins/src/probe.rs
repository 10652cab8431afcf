use std::time::Duration;

use adminkit_core::preflight::ReachabilityProbe;
use async_trait::async_trait;
use reqwest::Url;
use tokio::net::TcpStream;

/// Reachability by TCP connect. Targets are `host:port` or a URL; a URL
/// without a port uses its scheme's default.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProbe;

impl TcpProbe {
    pub fn new() -> Self {
        Self
    }
}

fn socket_target(target: &str) -> Result<String, String> {
    let target = target.trim();
    if target.contains("://") {
        let url = Url::parse(target).map_err(|e| format!("invalid url: {e}"))?;
        let host = url.host_str().ok_or_else(|| "url has no host".to_string())?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| format!("no port known for scheme {}", url.scheme()))?;
        return Ok(format!("{host}:{port}"));
    }
    if target.rsplit_once(':').is_some_and(|(_, p)| p.parse::<u16>().is_ok()) {
        return Ok(target.to_string());
    }
    Err(format!("'{target}' is neither host:port nor a url"))
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn probe(&self, target: &str, timeout: Duration) -> Result<(), String> {
        let addr = socket_target(target)?;
        match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(_)) => {
                tracing::debug!(target: "adminkit.preflight", %addr, "probe connected");
                Ok(())
            }
            Ok(Err(e)) => Err(format!("connect {addr}: {e}")),
            Err(_) => Err(format!("connect {addr}: timed out")),
        }
    }
}

use std::{path::PathBuf, sync::Arc, time::Duration};

use russh::{client, ChannelMsg};
use tokio::sync::mpsc;

use crate::error::AdapterError;
use crate::pool::AdapterPool;

/// A named SSH target resolved from the profile's host table.
#[derive(Clone, Debug)]
pub struct HostEntry {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub user: String,
    pub identity_file: Option<PathBuf>,
}

pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

struct ClientHandler;

#[async_trait::async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Host key pinning is configuration the core does not own (§1: out
        // of scope); a deployment that needs strict pinning supplies a
        // wrapping Handler. Accept here so pooled sessions can be opened
        // non-interactively.
        Ok(true)
    }
}

struct SshConnection {
    handle: client::Handle<ClientHandler>,
}

/// Executes commands and streams output over pooled SSH sessions.
pub struct SshAdapter {
    pool: AdapterPool<SshConnection>,
}

impl SshAdapter {
    pub fn new(max_per_host: usize, acquire_timeout: Duration) -> Self {
        Self {
            pool: AdapterPool::new(max_per_host, acquire_timeout),
        }
    }

    async fn connect(host: &HostEntry) -> Result<SshConnection, AdapterError> {
        let config = Arc::new(client::Config::default());
        let addr = (host.address.as_str(), host.port);
        let mut handle = client::connect(config, addr, ClientHandler)
            .await
            .map_err(|e| AdapterError::Unreachable(format!("{}: {e}", host.name)))?;

        let authenticated = if let Some(identity_file) = &host.identity_file {
            let key_pair = russh_keys::load_secret_key(identity_file, None)
                .map_err(|e| AdapterError::Permanent(format!("loading identity: {e}")))?;
            handle
                .authenticate_publickey(&host.user, Arc::new(key_pair))
                .await
                .map_err(|e| AdapterError::Unauthorized(format!("{}: {e}", host.name)))?
        } else {
            handle
                .authenticate_none(&host.user)
                .await
                .map_err(|e| AdapterError::Unauthorized(format!("{}: {e}", host.name)))?
        };

        if !authenticated {
            return Err(AdapterError::Unauthorized(format!(
                "authentication rejected for {}",
                host.name
            )));
        }

        Ok(SshConnection { handle })
    }

    /// Runs `command` to completion, bounded by `timeout`.
    pub async fn execute(
        &self,
        host: &HostEntry,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, AdapterError> {
        let mut lease = self
            .pool
            .acquire(&host.name, || Self::connect(host))
            .await?;

        let run = async {
            let mut channel = lease
                .get_mut()
                .handle
                .channel_open_session()
                .await
                .map_err(|e| AdapterError::Transient(format!("channel_open_session: {e}")))?;
            channel
                .exec(true, command)
                .await
                .map_err(|e| AdapterError::Transient(format!("exec: {e}")))?;

            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            let mut exit_code = 0i32;
            loop {
                match channel
                    .wait()
                    .await
                    .ok_or_else(|| AdapterError::Unreachable("ssh channel closed".into()))?
                {
                    ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
                    ChannelMsg::ExtendedData { data, .. } => stderr.extend_from_slice(&data),
                    ChannelMsg::ExitStatus { exit_status } => exit_code = exit_status as i32,
                    ChannelMsg::Eof | ChannelMsg::Close => break,
                    _ => {}
                }
            }
            Ok::<_, AdapterError>(ExecOutput { stdout, stderr, exit_code })
        };

        match tokio::time::timeout(timeout, run).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(err)) => {
                if matches!(err, AdapterError::Unreachable(_)) {
                    lease.discard();
                }
                Err(err)
            }
            Err(_) => {
                lease.discard();
                Err(AdapterError::Timeout(timeout))
            }
        }
    }

    /// Streams stdout lines until `cancel` resolves; the remote exec channel
    /// is closed when the returned receiver (or the future itself) is dropped.
    pub async fn stream(
        &self,
        host: &HostEntry,
        command: &str,
        mut cancel: mpsc::Receiver<()>,
    ) -> Result<mpsc::Receiver<String>, AdapterError> {
        let mut lease = self
            .pool
            .acquire(&host.name, || Self::connect(host))
            .await?;
        let mut channel = lease
            .get_mut()
            .handle
            .channel_open_session()
            .await
            .map_err(|e| AdapterError::Transient(format!("channel_open_session: {e}")))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| AdapterError::Transient(format!("exec: {e}")))?;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut partial = Vec::new();
            loop {
                tokio::select! {
                    _ = cancel.recv() => {
                        let _ = channel.eof().await;
                        let _ = channel.close().await;
                        break;
                    }
                    msg = channel.wait() => {
                        match msg {
                            Some(ChannelMsg::Data { data }) => {
                                partial.extend_from_slice(&data);
                                while let Some(pos) = partial.iter().position(|&b| b == b'\n') {
                                    let line = partial.drain(..=pos).collect::<Vec<_>>();
                                    let line = String::from_utf8_lossy(&line).trim_end().to_string();
                                    if tx.send(line).await.is_err() {
                                        return;
                                    }
                                }
                            }
                            Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                            _ => {}
                        }
                    }
                }
            }
        });
        Ok(rx)
    }
}

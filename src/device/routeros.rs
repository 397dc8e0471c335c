//! RouterOS API session.
//!
//! Commands run one at a time: a command sentence is written, then replies
//! are read until `!done`. A `!trap` fails the command but the remaining
//! replies are still drained so the session stays usable.

use async_trait::async_trait;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tracing::{debug, trace};
use zeroize::Zeroizing;

use super::protocol::{read_sentence, write_sentence, Reply, ReplyKind};
use super::{AddressListDevice, DeviceConnector, TaggedList};
use crate::config::{Config, SecureString};
use crate::error::{Result, SyncError};

const PRINT: &str = "/ip/firewall/address-list/print";
const REMOVE: &str = "/ip/firewall/address-list/remove";
const ADD: &str = "/ip/firewall/address-list/add";

/// Opens authenticated RouterOS API sessions (plain or TLS)
#[derive(Debug, Clone)]
pub struct RouterOsConnector {
    host: String,
    port: u16,
    user: String,
    password: SecureString,
    ssl: bool,
    tls_insecure: bool,
    timeout: Option<Duration>,
}

impl RouterOsConnector {
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.router.clone(),
            port: config.device_port(),
            user: config.user.clone(),
            password: config.get_password(),
            ssl: config.ssl,
            tls_insecure: config.tls_insecure,
            timeout: config.device_timeout(),
        }
    }

    async fn open_tcp(&self) -> Result<TcpStream> {
        let target = format!("{}:{}", self.host, self.port);
        debug!("Connecting to RouterOS API at {}", target);
        within(self.timeout, TcpStream::connect((self.host.as_str(), self.port)))
            .await
            .map_err(|e| SyncError::Connection(format!("{}: {}", target, e)))
    }

    async fn open_tls(&self, tcp: TcpStream) -> Result<tokio_native_tls::TlsStream<TcpStream>> {
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(self.tls_insecure)
            .danger_accept_invalid_hostnames(self.tls_insecure)
            .build()
            .map_err(|e| SyncError::Connection(format!("TLS setup failed: {}", e)))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);

        let handshake = async {
            connector
                .connect(&self.host, tcp)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        };
        within(self.timeout, handshake).await.map_err(|e| {
            SyncError::Connection(format!("TLS handshake with {} failed: {}", self.host, e))
        })
    }
}

#[async_trait]
impl DeviceConnector for RouterOsConnector {
    async fn connect(&self) -> Result<Box<dyn AddressListDevice>> {
        let tcp = self.open_tcp().await?;
        if self.ssl {
            let tls = self.open_tls(tcp).await?;
            let mut session = RouterOsSession::new(tls, self.timeout);
            session.login(&self.user, &self.password).await?;
            Ok(Box::new(session))
        } else {
            let mut session = RouterOsSession::new(tcp, self.timeout);
            session.login(&self.user, &self.password).await?;
            Ok(Box::new(session))
        }
    }
}

/// Replies to one command
#[derive(Debug)]
pub struct Response {
    /// `!re` rows in arrival order
    pub rows: Vec<Reply>,
    /// The closing `!done`
    pub done: Reply,
}

/// An API session over any byte stream
pub struct RouterOsSession<S> {
    stream: BufStream<S>,
    timeout: Option<Duration>,
}

impl<S> RouterOsSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, timeout: Option<Duration>) -> Self {
        Self {
            stream: BufStream::new(stream),
            timeout,
        }
    }

    /// Authenticate with the post-6.43 plain login
    pub async fn login(&mut self, user: &str, password: &SecureString) -> Result<()> {
        let name = format!("=name={}", user);
        let password = Zeroizing::new(format!("=password={}", password.as_str()));

        let response = match self.run(&["/login", name.as_str(), password.as_str()]).await {
            Ok(response) => response,
            Err(SyncError::Protocol(msg)) => {
                return Err(SyncError::Connection(format!("login failed: {}", msg)))
            }
            Err(e) => return Err(e),
        };

        if response.done.get("ret").is_some() {
            return Err(SyncError::Connection(
                "device requested challenge login (RouterOS before 6.43), which is not supported"
                    .to_string(),
            ));
        }
        debug!("Logged in as {}", user);
        Ok(())
    }

    /// Run one command and collect its replies
    pub async fn run<W: AsRef<str> + Sync>(&mut self, words: &[W]) -> Result<Response> {
        let command = words.first().map(|w| w.as_ref()).unwrap_or_default().to_string();
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.exchange(words))
                .await
                .map_err(|_| {
                    SyncError::Protocol(format!(
                        "{}: no reply within {}s",
                        command,
                        limit.as_secs()
                    ))
                })?,
            None => self.exchange(words).await,
        }
    }

    async fn exchange<W: AsRef<str> + Sync>(&mut self, words: &[W]) -> Result<Response> {
        if let Some(command) = words.first() {
            trace!("-> {}", command.as_ref());
        }
        write_sentence(&mut self.stream, words)
            .await
            .map_err(transport_error)?;

        let mut rows = Vec::new();
        let mut trap: Option<String> = None;
        loop {
            let sentence = read_sentence(&mut self.stream)
                .await
                .map_err(transport_error)?;
            if sentence.is_empty() {
                continue;
            }
            let reply = Reply::parse(sentence).map_err(transport_error)?;
            trace!("<- {:?}", reply.kind);

            match reply.kind {
                ReplyKind::Re => rows.push(reply),
                ReplyKind::Empty => {}
                ReplyKind::Trap => {
                    if trap.is_none() {
                        trap = Some(reply.message());
                    }
                }
                ReplyKind::Fatal => {
                    return Err(SyncError::Protocol(format!(
                        "device closed the session: {}",
                        reply.message()
                    )))
                }
                ReplyKind::Done => {
                    return match trap {
                        Some(message) => Err(SyncError::Protocol(message)),
                        None => Ok(Response { rows, done: reply }),
                    }
                }
            }
        }
    }
}

#[async_trait]
impl<S> AddressListDevice for RouterOsSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn list_tagged(&mut self, scope: &TaggedList) -> Result<Vec<String>> {
        let list = format!("?list={}", scope.list);
        let comment = format!("?comment={}", scope.tag);
        let response = self
            .run(&[PRINT, list.as_str(), comment.as_str(), "=.proplist=address"])
            .await?;

        Ok(response
            .rows
            .iter()
            .filter_map(|row| row.get("address"))
            .map(with_prefix_len)
            .collect())
    }

    async fn find_ids(&mut self, scope: &TaggedList, address: &str) -> Result<Vec<String>> {
        let list = format!("?list={}", scope.list);
        let comment = format!("?comment={}", scope.tag);

        let mut ids = Vec::new();
        // Single hosts are printed without their /32
        let spellings = match address.strip_suffix("/32") {
            Some(host) => vec![address, host],
            None => vec![address],
        };
        for spelling in spellings {
            let query = format!("?address={}", spelling);
            let response = self
                .run(&[
                    PRINT,
                    list.as_str(),
                    comment.as_str(),
                    query.as_str(),
                    "=.proplist=.id",
                ])
                .await?;
            ids.extend(
                response
                    .rows
                    .iter()
                    .filter_map(|row| row.get(".id"))
                    .map(str::to_string),
            );
            if !ids.is_empty() {
                break;
            }
        }
        Ok(ids)
    }

    async fn remove(&mut self, id: &str) -> Result<()> {
        let id = format!("=.id={}", id);
        self.run(&[REMOVE, id.as_str()]).await?;
        Ok(())
    }

    async fn add(&mut self, scope: &TaggedList, address: &str) -> Result<()> {
        let list = format!("=list={}", scope.list);
        let address = format!("=address={}", address);
        let comment = format!("=comment={}", scope.tag);
        self.run(&[ADD, list.as_str(), address.as_str(), comment.as_str()])
            .await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        within(self.timeout, self.stream.shutdown())
            .await
            .map_err(transport_error)
    }
}

/// Bare IPv4 host addresses as `/32` prefixes
fn with_prefix_len(address: &str) -> String {
    if address.contains('/') {
        address.to_string()
    } else {
        format!("{}/32", address)
    }
}

async fn within<T, F>(limit: Option<Duration>, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!("timed out after {}s", limit.as_secs()),
            )
        })?,
        None => fut.await,
    }
}

fn transport_error(e: io::Error) -> SyncError {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            SyncError::Protocol("connection closed by device".to_string())
        }
        _ => SyncError::Protocol(e.to_string()),
    }
}

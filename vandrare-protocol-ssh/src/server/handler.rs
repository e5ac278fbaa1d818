//! The per-connection `russh::server::Handler`, implementing the connection
//! state machine from auth through teardown. One `GatewayHandler` is
//! constructed per accepted TCP
//! connection by [`super::run_server`] and handed to
//! `russh::server::run_stream`, mirroring `warpgate-protocol-ssh`'s own
//! `_run_stream(config, socket, handler)` bootstrap — but, unlike
//! `warpgate-protocol-ssh`'s `ServerHandler`, which only forwards every
//! callback as an event to a separate session actor, this handler acts
//! directly: there is no target selection, recording, or ticket machinery
//! left to delegate to.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{SystemTime, UNIX_EPOCH};

use russh::keys::PublicKey;
use russh::server::{Auth, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec, Pty};
use tracing::{debug, warn};
use vandrare_db::AuthResult;

use crate::admin_session::{AdminOutcome, AdminSession, SessionCommand, classify_command};
use crate::cleanup::CleanupStack;
use crate::common::{endpoint_key, BoxedIo};
use crate::error::SshError;
use crate::state::GatewayState;

/// What a connection has proven about itself so far.
#[derive(Clone)]
enum ConnAuth {
    None,
    Authenticated {
        is_admin: bool,
        fingerprint: String,
        pubkey_openssh: String,
    },
}

/// State of one open session channel (the kind opened for `exec`/shell
/// requests, as opposed to `direct-tcpip` channels which are bridged and
/// forgotten immediately).
enum SessionChannelState {
    /// An admin evaluator session is live on this channel.
    Admin {
        session: AdminSession,
        output: Arc<StdMutex<Vec<String>>>,
    },
    /// The channel already wrote its one response (whoami/refusal) and is
    /// closing; nothing more to do with it.
    Done,
}

pub struct GatewayHandler {
    state: Arc<GatewayState>,
    peer_addr: Option<SocketAddr>,
    username: String,
    auth: ConnAuth,
    cleanup: Arc<CleanupStack>,
    sessions: HashMap<ChannelId, SessionChannelState>,
}

impl GatewayHandler {
    pub fn new(state: Arc<GatewayState>, peer_addr: Option<SocketAddr>) -> Self {
        Self {
            state,
            peer_addr,
            username: String::new(),
            auth: ConnAuth::None,
            cleanup: Arc::new(CleanupStack::new()),
            sessions: HashMap::new(),
        }
    }

    async fn run_command(&mut self, channel: ChannelId, cmd: &str, session: &mut Session) {
        match classify_command(cmd) {
            SessionCommand::Admin => {
                let is_admin = matches!(self.auth, ConnAuth::Authenticated { is_admin: true, .. });
                if !is_admin {
                    refuse(channel, session);
                    self.sessions.insert(channel, SessionChannelState::Done);
                    return;
                }
                let output = Arc::new(StdMutex::new(Vec::new()));
                let output_for_engine = output.clone();
                let engine = vandrare_core::admin::build_engine(
                    self.state.services.store.clone(),
                    move |line| {
                        output_for_engine
                            .lock()
                            .unwrap_or_else(|poison| poison.into_inner())
                            .push(line);
                    },
                );
                self.sessions.insert(
                    channel,
                    SessionChannelState::Admin {
                        session: AdminSession::new(engine),
                        output,
                    },
                );
            }
            SessionCommand::Whoami => {
                let doc = whoami_document(&self.username, &self.auth);
                write_line(channel, session, &doc);
                session.exit_status_request(channel, 0);
                session.eof(channel);
                session.close(channel);
                self.sessions.insert(channel, SessionChannelState::Done);
            }
            SessionCommand::Refused => {
                refuse(channel, session);
                self.sessions.insert(channel, SessionChannelState::Done);
            }
        }
    }

    async fn authenticate_user_key(&self, fingerprint: &str) -> Result<AuthResult, SshError> {
        let store = self.state.services.store.lock().await;
        let mut ops = store.ops(false).await?;
        let result = ops.keydb().authn(fingerprint, now_unixms()).await?;
        ops.close().await?;
        Ok(result)
    }

    async fn authorize_expose(&self, fingerprint: &str, endpoint: &str) -> Result<AuthResult, SshError> {
        let store = self.state.services.store.lock().await;
        let mut ops = store.ops(false).await?;
        let result = ops.keydb().authz(fingerprint, "expose-endpoint", endpoint).await?;
        ops.close().await?;
        Ok(result)
    }
}

fn now_unixms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn keys_equal(a: &PublicKey, b: &PublicKey) -> bool {
    matches!((a.to_openssh(), b.to_openssh()), (Ok(a), Ok(b)) if a == b)
}

fn write_line(channel: ChannelId, session: &mut Session, line: &str) {
    let mut bytes = line.as_bytes().to_vec();
    bytes.push(b'\n');
    session.data(channel, CryptoVec::from_slice(&bytes));
}

fn refuse(channel: ChannelId, session: &mut Session) {
    write_line(channel, session, "vandrare: command not recognized");
    session.exit_status_request(channel, 0);
    session.eof(channel);
    session.close(channel);
}

fn flush_admin_output(channel: ChannelId, session: &mut Session, output: &StdMutex<Vec<String>>) {
    let lines = std::mem::take(
        &mut *output.lock().unwrap_or_else(|poison| poison.into_inner()),
    );
    for line in lines {
        write_line(channel, session, &line);
    }
}

fn whoami_document(username: &str, auth: &ConnAuth) -> String {
    let (key, fingerprint) = match auth {
        ConnAuth::Authenticated {
            pubkey_openssh,
            fingerprint,
            ..
        } => (pubkey_openssh.clone(), fingerprint.clone()),
        ConnAuth::None => (String::new(), String::new()),
    };
    let now = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default();
    serde_json::json!({
        "user": username,
        "key": key,
        "fingerprint": fingerprint,
        "now": now,
    })
    .to_string()
}

impl russh::server::Handler for GatewayHandler {
    type Error = SshError;

    async fn auth_publickey(&mut self, user: &str, key: &PublicKey) -> Result<Auth, Self::Error> {
        self.username = user.to_string();

        if keys_equal(key, &self.state.admin_key) {
            let pubkey_openssh = key.to_openssh().unwrap_or_default();
            let fingerprint = key.fingerprint(Default::default()).to_string();
            self.auth = ConnAuth::Authenticated {
                is_admin: true,
                fingerprint,
                pubkey_openssh,
            };
            debug!(user, peer = ?self.peer_addr, "admin key accepted");
            return Ok(Auth::Accept);
        }

        if key.algorithm() != russh::keys::Algorithm::Ed25519 {
            return Ok(Auth::Reject {
                proceed_with_methods: None,
            });
        }

        let fingerprint = key.fingerprint(Default::default()).to_string();
        match self.authenticate_user_key(&fingerprint).await? {
            AuthResult::Ok => {
                let pubkey_openssh = key.to_openssh().unwrap_or_default();
                self.auth = ConnAuth::Authenticated {
                    is_admin: false,
                    fingerprint,
                    pubkey_openssh,
                };
                Ok(Auth::Accept)
            }
            AuthResult::NotAuthorized => Ok(Auth::Reject {
                proceed_with_methods: None,
            }),
        }
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(matches!(self.auth, ConnAuth::Authenticated { .. }))
    }

    async fn pty_request(
        &mut self,
        channel: ChannelId,
        _term: &str,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        session.channel_failure(channel);
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        session.channel_success(channel);
        self.run_command(channel, "", session).await;
        Ok(())
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let cmd = String::from_utf8_lossy(data).into_owned();
        session.channel_success(channel);
        self.run_command(channel, &cmd, session).await;
        Ok(())
    }

    async fn data(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let chunk = String::from_utf8_lossy(data).into_owned();
        let mut terminate_with_error = None;
        if let Some(SessionChannelState::Admin { session: admin, output }) =
            self.sessions.get_mut(&channel)
        {
            match admin.feed(&chunk).await {
                AdminOutcome::NeedMoreInput => {}
                AdminOutcome::Evaluated(Ok(())) => {
                    flush_admin_output(channel, session, output);
                }
                AdminOutcome::Evaluated(Err(message)) => {
                    flush_admin_output(channel, session, output);
                    terminate_with_error = Some(message);
                }
            }
        }
        if let Some(message) = terminate_with_error {
            write_line(channel, session, &format!("error: {message}"));
            session.exit_status_request(channel, 1);
            session.eof(channel);
            session.close(channel);
            self.sessions.insert(channel, SessionChannelState::Done);
        }
        Ok(())
    }

    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.sessions.remove(&channel);
        Ok(())
    }

    async fn channel_eof(
        &mut self,
        _channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn channel_open_direct_tcpip(
        &mut self,
        channel: Channel<Msg>,
        host_to_connect: &str,
        port_to_connect: u32,
        originator_address: &str,
        originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        if !matches!(self.auth, ConnAuth::Authenticated { .. }) {
            return Ok(false);
        }

        let endpoint = endpoint_key(host_to_connect, port_to_connect);
        if !self.state.registry.has_endpoint(&endpoint).await {
            return Ok(false);
        }

        let to_host = host_to_connect.to_string();
        let from_host = originator_address.to_string();
        let registry = self.state.registry.clone();
        tokio::spawn(async move {
            let io: BoxedIo = Box::new(channel.into_stream());
            let conn = vandrare_core::ConnData {
                io,
                to_host,
                to_port: port_to_connect,
                from_host,
                from_port: originator_port,
            };
            if let Err(error) = registry.offer(&endpoint, conn).await {
                warn!(%endpoint, ?error, "direct-tcpip consumer dropped: no workers");
            }
        });

        Ok(true)
    }

    async fn tcpip_forward(
        &mut self,
        address: &str,
        port: &mut u32,
        session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let fingerprint = match &self.auth {
            ConnAuth::Authenticated { fingerprint, .. } => fingerprint.clone(),
            ConnAuth::None => {
                session.request_failure();
                return Ok(false);
            }
        };

        let endpoint = endpoint_key(address, *port);
        let authorized = matches!(
            self.authorize_expose(&fingerprint, &endpoint).await?,
            AuthResult::Ok
        );
        if !authorized {
            session.request_failure();
            return Ok(false);
        }

        let worker = self.state.registry.new_worker(&endpoint).await;
        let cleanup = self.cleanup.register(&endpoint);
        crate::forward::spawn_forward_worker(
            self.state.registry.clone(),
            worker,
            session.handle(),
            cleanup,
        );

        session.request_success();
        Ok(true)
    }

    async fn cancel_tcpip_forward(
        &mut self,
        address: &str,
        port: u32,
        session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let endpoint = endpoint_key(address, port);
        self.cleanup.fire(&endpoint);
        session.request_success();
        Ok(true)
    }
}

impl Drop for GatewayHandler {
    fn drop(&mut self) {
        self.cleanup.fire_all();
    }
}

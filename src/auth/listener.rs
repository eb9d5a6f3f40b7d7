//! One-shot loopback listener for the provider's authorization redirect
//!
//! The listener binds a plain-HTTP TCP socket on the redirect URI's loopback
//! host/port, accepts exactly one inbound request, extracts the `code` or
//! `error` query parameter, answers the browser with a fixed confirmation
//! page, and hands the outcome to the orchestrator over a oneshot channel.
//!
//! State machine: `Idle -> Listening -> RequestReceived -> Stopped`.  The
//! bound socket stays open after the request is handled (the orchestrator
//! stops the listener only once the chained resource fetch concludes) and is
//! released exactly once by [`LoopbackAuthListener::stop`], which is
//! idempotent and safe to call even when the listener was never started.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Result, TrackvaultError};

/// The confirmation page served to the browser on every outcome.
///
/// The `Content-Length` header is set to exactly the UTF-8 byte length of
/// this string, so the browser tab is never left with a hanging request.
pub const CONFIRMATION_BODY: &str = "<html><body> You can close this window now </body></html>";

// ---------------------------------------------------------------------------
// AuthorizationResult
// ---------------------------------------------------------------------------

/// Outcome of the provider redirect, produced exactly once per flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationResult {
    /// The provider issued an authorization code.
    Code(String),

    /// The provider redirected back with an `error` query parameter (or the
    /// callback request was malformed).  No code is ever produced for this
    /// flow instance.
    Error(String),
}

// ---------------------------------------------------------------------------
// ListenerState
// ---------------------------------------------------------------------------

/// Lifecycle states of the loopback listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Constructed but not yet bound.
    Idle,
    /// Socket bound, one accept pending.
    Listening,
    /// The single request has been handled; the socket remains bound until
    /// [`LoopbackAuthListener::stop`] is called.
    RequestReceived,
    /// Socket released.  Terminal.
    Stopped,
}

// ---------------------------------------------------------------------------
// LoopbackAuthListener
// ---------------------------------------------------------------------------

/// A one-shot local HTTP server bound to the OAuth redirect URI.
///
/// # Examples
///
/// ```no_run
/// use trackvault::auth::listener::{AuthorizationResult, LoopbackAuthListener};
/// use url::Url;
///
/// # async fn example() -> trackvault::error::Result<()> {
/// let redirect_uri = Url::parse("http://127.0.0.1:3000/callback")?;
/// let mut listener = LoopbackAuthListener::new();
/// let rx = listener.start(&redirect_uri).await?;
///
/// match rx.await {
///     Ok(AuthorizationResult::Code(code)) => println!("got code: {code}"),
///     Ok(AuthorizationResult::Error(e)) => eprintln!("denied: {e}"),
///     Err(_) => eprintln!("listener dropped"),
/// }
/// listener.stop();
/// # Ok(())
/// # }
/// ```
pub struct LoopbackAuthListener {
    state: Arc<Mutex<ListenerState>>,
    shutdown: CancellationToken,
    local_addr: Option<SocketAddr>,
}

impl Default for LoopbackAuthListener {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackAuthListener {
    /// Creates a listener in the `Idle` state.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ListenerState::Idle)),
            shutdown: CancellationToken::new(),
            local_addr: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        *self.state.lock().expect("listener state lock poisoned")
    }

    /// The address the socket is actually bound to.  Useful when the
    /// redirect URI carries port `0` and the OS picks a free port.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Binds the redirect URI's host/port and registers exactly one pending
    /// accept on a background task.
    ///
    /// The returned receiver yields the [`AuthorizationResult`] once the
    /// provider redirects the user's browser to the callback.  The accept
    /// runs off the caller's task; the caller awaits the channel instead of
    /// blocking.
    ///
    /// # Errors
    ///
    /// Returns [`TrackvaultError::Listener`] when the listener was already
    /// started, when the redirect URI has no usable host/port, or when the
    /// socket cannot be bound.
    pub async fn start(
        &mut self,
        redirect_uri: &Url,
    ) -> Result<oneshot::Receiver<AuthorizationResult>> {
        {
            let mut state = self.state.lock().expect("listener state lock poisoned");
            if *state != ListenerState::Idle {
                return Err(TrackvaultError::Listener(format!(
                    "listener already started (state: {:?})",
                    *state
                ))
                .into());
            }
            *state = ListenerState::Listening;
        }

        let host = redirect_uri
            .host_str()
            .ok_or_else(|| TrackvaultError::Listener("redirect URI has no host".to_string()))?;
        let port = redirect_uri.port_or_known_default().ok_or_else(|| {
            TrackvaultError::Listener("redirect URI has no usable port".to_string())
        })?;

        let listener = TcpListener::bind((host, port)).await.map_err(|e| {
            TrackvaultError::Listener(format!("failed to bind {host}:{port}: {e}"))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TrackvaultError::Listener(format!("failed to get local address: {e}")))?;
        self.local_addr = Some(local_addr);
        debug!(addr = %local_addr, "loopback auth listener bound");

        let (tx, rx) = oneshot::channel();
        let state = Arc::clone(&self.state);
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = shutdown.cancelled() => {
                    debug!("listener stopped before any redirect arrived");
                    return;
                }
            };

            let result = match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "redirect connection accepted");
                    handle_connection(stream).await
                }
                Err(e) => AuthorizationResult::Error(format!("accept failed: {e}")),
            };

            {
                let mut state = state.lock().expect("listener state lock poisoned");
                if *state == ListenerState::Listening {
                    *state = ListenerState::RequestReceived;
                }
            }

            if tx.send(result).is_err() {
                warn!("authorization result receiver dropped before delivery");
            }

            // Keep the socket bound until the orchestrator calls stop(); no
            // second connection is ever accepted.
            shutdown.cancelled().await;
        });

        Ok(rx)
    }

    /// Releases the bound socket.
    ///
    /// Idempotent: safe to call exactly once per flow, again after that, and
    /// even when the listener was never started (no-op).
    pub fn stop(&mut self) {
        let mut state = self.state.lock().expect("listener state lock poisoned");
        if *state == ListenerState::Stopped {
            return;
        }
        debug!(previous = ?*state, "stopping loopback auth listener");
        *state = ListenerState::Stopped;
        self.shutdown.cancel();
    }
}

// ---------------------------------------------------------------------------
// Connection handling
// ---------------------------------------------------------------------------

/// Reads the single callback request, answers it with the confirmation page,
/// and extracts the authorization outcome from the query string.
async fn handle_connection(stream: TcpStream) -> AuthorizationResult {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut request_line = String::new();
    if let Err(e) = reader.read_line(&mut request_line).await {
        return AuthorizationResult::Error(format!("failed to read callback request: {e}"));
    }

    // Drain the headers; they end at the first empty line.
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) if line.trim_end().is_empty() => break,
            Ok(_) => {}
            Err(e) => {
                return AuthorizationResult::Error(format!("failed to read callback headers: {e}"));
            }
        }
    }

    // Answer the browser before completing the request so the tab is
    // servable regardless of outcome.
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        CONFIRMATION_BODY.len(),
        CONFIRMATION_BODY
    );
    if let Err(e) = write_half.write_all(response.as_bytes()).await {
        warn!(error = %e, "failed to write confirmation page to browser");
    }
    let _ = write_half.shutdown().await;

    // Parse request line: "GET /callback?code=...&error=... HTTP/1.1"
    let path = request_line.split_whitespace().nth(1).unwrap_or("/");
    let query_string = path.split_once('?').map(|x| x.1).unwrap_or("");
    let params = parse_query_string(query_string);

    if let Some(error) = params.get("error") {
        return AuthorizationResult::Error(error.clone());
    }
    match params.get("code") {
        Some(code) => AuthorizationResult::Code(code.clone()),
        None => AuthorizationResult::Error("authorization code missing from callback".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Query string parsing
// ---------------------------------------------------------------------------

/// Parses a URL query string into a key-value map.
///
/// Values are percent-decoded.  Duplicate keys are overwritten by the last
/// occurrence.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for pair in query.split('&') {
        let mut iter = pair.splitn(2, '=');
        let key = iter.next().unwrap_or("").to_string();
        let value = iter.next().unwrap_or("").to_string();
        if !key.is_empty() {
            map.insert(key, percent_decode(&value));
        }
    }
    map
}

/// Performs minimal percent-decoding of a URL query parameter value.
///
/// Converts `+` to space and `%XX` sequences to the corresponding byte.
/// Decoding happens at the byte level so multi-byte UTF-8 sequences come out
/// intact; invalid sequences are replaced rather than rejected.
fn percent_decode(s: &str) -> String {
    let mut out = Vec::with_capacity(s.len());
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'+' {
            out.push(b' ');
            i += 1;
        } else if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
            out.push(bytes[i]);
            i += 1;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

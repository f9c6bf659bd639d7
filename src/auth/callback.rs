//! Loopback receiver for the provider redirect.
//!
//! The provider redirects the browser to `http://localhost:<port>/<path>`
//! with `code`, `state` and/or `error` in the query string. We accept one
//! such request, answer with a small HTML page and hand the parameters back.

use std::collections::HashMap;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Query parameters delivered by the provider redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Parse from a raw query string (without the leading `?`).
    pub fn from_query(query: &str) -> Self {
        let mut params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        let mut take = |name: &str| params.remove(name).filter(|v| !v.is_empty());
        Self {
            code: take("code"),
            state: take("state"),
            error: take("error"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.state.is_none() && self.error.is_none()
    }

    /// The root-route location the callback re-dispatches to.
    ///
    /// With neither `code` nor `error` this is `/?error=missing_code`. The
    /// prompt has no root page, so this only appears in the callback log
    /// line; the parameters themselves go straight to the flow.
    pub fn redirect_location(&self) -> String {
        if self.code.is_none() && self.error.is_none() {
            return "/?error=missing_code".to_string();
        }

        let pairs: Vec<String> = [
            ("error", &self.error),
            ("code", &self.code),
            ("state", &self.state),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_ref()
                .map(|v| format!("{}={}", name, urlencoding::encode(v)))
        })
        .collect();

        format!("/?{}", pairs.join("&"))
    }
}

/// One-shot HTTP listener bound to the loopback interface.
pub struct CallbackServer {
    listener: TcpListener,
    path: String,
}

impl CallbackServer {
    /// Bind `127.0.0.1:<port>`. Port 0 picks a free port.
    pub async fn bind(port: u16, path: impl Into<String>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        Ok(Self { listener, path })
    }

    pub fn port(&self) -> std::io::Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// The URL to register as `callback_url`.
    pub fn callback_url(&self) -> std::io::Result<String> {
        Ok(format!("http://localhost:{}{}", self.port()?, self.path))
    }

    /// Wait for the redirect on the configured path.
    ///
    /// Requests for other paths (favicon probes and the like) get a 404 and
    /// are otherwise ignored.
    pub async fn wait(&self) -> std::io::Result<CallbackParams> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;
            tracing::debug!(%peer, "callback connection");

            let target = match read_request_target(&mut stream).await {
                Ok(Some(target)) => target,
                Ok(None) => {
                    respond(&mut stream, "400 Bad Request", "<p>Bad request</p>").await;
                    continue;
                }
                Err(e) => {
                    tracing::warn!("failed to read callback request: {e}");
                    continue;
                }
            };

            let (path, query) = target.split_once('?').unwrap_or((target.as_str(), ""));
            if path != self.path {
                respond(&mut stream, "404 Not Found", "<p>Not found</p>").await;
                continue;
            }

            let params = CallbackParams::from_query(query);
            let body = if params.code.is_some() {
                "<html><body><h2>&#10003; Authorization received</h2>\
                 <p>You may close this tab and return to the terminal.</p></body></html>"
            } else {
                "<html><body><h2>&#10007; Authorization failed</h2>\
                 <p>No authorization code received. You may close this tab.</p></body></html>"
            };
            respond(&mut stream, "200 OK", body).await;

            tracing::debug!(location = %params.redirect_location(), "callback received");
            return Ok(params);
        }
    }
}

/// Read the request head and return the request target of a GET.
async fn read_request_target(stream: &mut TcpStream) -> std::io::Result<Option<String>> {
    let mut buf = vec![0u8; 8192];
    let mut len = 0;

    // Only the request line matters; stop once it is complete.
    while len < buf.len() {
        let n = stream.read(&mut buf[len..]).await?;
        if n == 0 {
            break;
        }
        len += n;
        if buf[..len].contains(&b'\n') {
            break;
        }
    }

    let head = String::from_utf8_lossy(&buf[..len]);
    Ok(parse_request_line(head.lines().next().unwrap_or("")))
}

/// `GET /oauth/callback?code=X&state=Y HTTP/1.1` -> `/oauth/callback?code=X&state=Y`
fn parse_request_line(line: &str) -> Option<String> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Some(target.to_string()),
        _ => None,
    }
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::debug!("failed to write callback response: {e}");
    }
    let _ = stream.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_query_decodes_values() {
        let params = CallbackParams::from_query("code=abc%2F123&state=s+t&extra=1");
        assert_eq!(params.code.as_deref(), Some("abc/123"));
        assert_eq!(params.state.as_deref(), Some("s t"));
        assert!(params.error.is_none());
    }

    #[test]
    fn test_from_query_empty_values_are_absent() {
        let params = CallbackParams::from_query("code=&state=");
        assert!(params.is_empty());
        assert!(CallbackParams::from_query("").is_empty());
    }

    #[test]
    fn test_from_query_invalid_utf8_is_lossy() {
        let params = CallbackParams::from_query("code=ab%FFcd&state=s");
        let code = params.code.unwrap();
        assert!(code.starts_with("ab"));
        assert!(code.ends_with("cd"));
        assert_eq!(params.state.as_deref(), Some("s"));
    }

    #[test]
    fn test_redirect_location() {
        let params = CallbackParams::from_query("code=abc&state=xyz");
        assert_eq!(params.redirect_location(), "/?code=abc&state=xyz");

        let params = CallbackParams::from_query("error=access_denied");
        assert_eq!(params.redirect_location(), "/?error=access_denied");

        let params = CallbackParams::from_query("state=xyz");
        assert_eq!(params.redirect_location(), "/?error=missing_code");
    }

    #[test]
    fn test_parse_request_line() {
        assert_eq!(
            parse_request_line("GET /oauth/callback?code=1 HTTP/1.1").as_deref(),
            Some("/oauth/callback?code=1")
        );
        assert!(parse_request_line("POST /oauth/callback HTTP/1.1").is_none());
        assert!(parse_request_line("").is_none());
    }

    #[tokio::test]
    async fn test_server_receives_callback() {
        let server = CallbackServer::bind(0, "/oauth/callback").await.unwrap();
        let port = server.port().unwrap();
        assert!(server
            .callback_url()
            .unwrap()
            .ends_with(&format!(":{port}/oauth/callback")));

        let client = tokio::spawn(async move {
            // A stray request first, then the real redirect.
            let miss = reqwest::get(format!("http://127.0.0.1:{port}/favicon.ico"))
                .await
                .unwrap();
            assert_eq!(miss.status().as_u16(), 404);

            reqwest::get(format!(
                "http://127.0.0.1:{port}/oauth/callback?code=the-code&state=the-state"
            ))
            .await
            .unwrap()
            .status()
        });

        let params = server.wait().await.unwrap();
        assert_eq!(params.code.as_deref(), Some("the-code"));
        assert_eq!(params.state.as_deref(), Some("the-state"));
        assert!(client.await.unwrap().is_success());
    }
}

//! Clamd `INSTREAM` client.
//!
//! Speaks the clamd TCP protocol: a `zINSTREAM\0` command followed by
//! length-prefixed chunks (`u32` big-endian length, then that many
//! bytes), terminated by a zero-length chunk. The engine replies with a
//! single NUL-terminated line: `stream: OK`, `stream: <name> FOUND`, or
//! `... ERROR`.
//!
//! The payload is written chunk by chunk rather than as one buffer, and
//! a mid-stream rejection from the engine (it closes the write side once
//! it has seen enough) is turned into a verdict read instead of an I/O
//! failure.

use std::io::ErrorKind;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::ScanError;
use crate::scanner::{MalwareScanner, ScanVerdict};

/// Connection settings for a clamd engine.
#[derive(Debug, Clone)]
pub struct ClamdConfig {
    /// Engine hostname or address.
    pub host: String,
    /// Engine TCP port (clamd default is 3310).
    pub port: u16,
    /// Bound on the whole scan call, connect included. A timeout is a
    /// failure, never a pass.
    pub timeout: Duration,
    /// Bytes per `INSTREAM` chunk.
    pub chunk_size: usize,
}

impl Default for ClamdConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 3310,
            timeout: Duration::from_secs(30),
            chunk_size: 64 * 1024,
        }
    }
}

/// [`MalwareScanner`] backed by a clamd engine over TCP.
#[derive(Debug)]
pub struct ClamdScanner {
    config: ClamdConfig,
}

impl ClamdScanner {
    /// Create a scanner for the given engine.
    pub fn new(config: ClamdConfig) -> Self {
        Self { config }
    }

    async fn scan_stream(&self, data: &[u8]) -> Result<ScanVerdict, ScanError> {
        let mut stream = self.connect().await?;

        stream
            .write_all(b"zINSTREAM\0")
            .await
            .map_err(|e| ScanError::Connection(e.to_string()))?;

        for chunk in data.chunks(self.config.chunk_size.max(1)) {
            #[allow(clippy::cast_possible_truncation)]
            let len = (chunk.len() as u32).to_be_bytes();
            let mut frame = Vec::with_capacity(4 + chunk.len());
            frame.extend_from_slice(&len);
            frame.extend_from_slice(chunk);

            match stream.write_all(&frame).await {
                Ok(()) => {}
                // The engine aborts the stream once it has a verdict
                // (size limit hit or signature matched mid-stream). The
                // verdict is sitting in the read half.
                Err(e) if is_stream_abort(&e) => {
                    return read_verdict(&mut stream).await;
                }
                Err(e) => return Err(ScanError::Connection(e.to_string())),
            }
        }

        match stream.write_all(&0u32.to_be_bytes()).await {
            Ok(()) => {}
            Err(e) if is_stream_abort(&e) => {
                return read_verdict(&mut stream).await;
            }
            Err(e) => return Err(ScanError::Connection(e.to_string())),
        }

        read_verdict(&mut stream).await
    }

    async fn connect(&self) -> Result<TcpStream, ScanError> {
        TcpStream::connect((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| ScanError::Connection(e.to_string()))
    }
}

fn is_stream_abort(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
    )
}

/// Read the engine's NUL-terminated reply and parse it into a verdict.
async fn read_verdict(stream: &mut TcpStream) -> Result<ScanVerdict, ScanError> {
    let mut raw = Vec::with_capacity(128);
    stream
        .read_to_end(&mut raw)
        .await
        .map_err(|e| ScanError::Connection(e.to_string()))?;
    let reply = String::from_utf8_lossy(&raw);
    parse_reply(reply.trim_end_matches(['\0', '\n']).trim())
}

/// Parse a clamd reply line.
fn parse_reply(reply: &str) -> Result<ScanVerdict, ScanError> {
    if reply.ends_with("OK") {
        return Ok(ScanVerdict::Clean);
    }
    if let Some(found) = reply.strip_suffix(" FOUND") {
        let signature = found
            .rsplit_once(": ")
            .map_or(found, |(_, sig)| sig)
            .to_owned();
        return Ok(ScanVerdict::Infected { signature });
    }
    Err(ScanError::Protocol(format!(
        "unexpected engine reply: {reply}"
    )))
}

#[async_trait::async_trait]
impl MalwareScanner for ClamdScanner {
    fn name(&self) -> &str {
        "clamd"
    }

    async fn scan(&self, data: &[u8]) -> Result<ScanVerdict, ScanError> {
        let verdict = tokio::time::timeout(self.config.timeout, self.scan_stream(data))
            .await
            .map_err(|_| ScanError::Timeout(self.config.timeout))??;
        if let ScanVerdict::Infected { ref signature } = verdict {
            tracing::debug!(signature = %signature, "engine reported a match");
        }
        Ok(verdict)
    }

    async fn health_check(&self) -> Result<(), ScanError> {
        let check = async {
            let mut stream = self.connect().await?;
            stream
                .write_all(b"zPING\0")
                .await
                .map_err(|e| ScanError::Connection(e.to_string()))?;
            let mut raw = Vec::with_capacity(8);
            stream
                .read_to_end(&mut raw)
                .await
                .map_err(|e| ScanError::Connection(e.to_string()))?;
            let reply = String::from_utf8_lossy(&raw);
            if reply.trim_end_matches(['\0', '\n']) == "PONG" {
                Ok(())
            } else {
                Err(ScanError::Protocol(format!(
                    "unexpected ping reply: {reply}"
                )))
            }
        };
        tokio::time::timeout(self.config.timeout, check)
            .await
            .map_err(|_| ScanError::Timeout(self.config.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn parse_clean_reply() {
        assert_eq!(parse_reply("stream: OK").unwrap(), ScanVerdict::Clean);
    }

    #[test]
    fn parse_found_reply_extracts_signature() {
        let verdict = parse_reply("stream: Win.Test.EICAR_HDB-1 FOUND").unwrap();
        assert_eq!(
            verdict,
            ScanVerdict::Infected {
                signature: "Win.Test.EICAR_HDB-1".into()
            }
        );
    }

    #[test]
    fn parse_error_reply_is_protocol_error() {
        let err = parse_reply("INSTREAM size limit exceeded. ERROR").unwrap_err();
        assert!(matches!(err, ScanError::Protocol(_)));
    }

    /// Minimal in-process clamd double: reads the INSTREAM framing and
    /// replies FOUND when the payload contains the EICAR marker.
    async fn spawn_fake_clamd() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut command = [0u8; 10];
                    if socket.read_exact(&mut command).await.is_err() {
                        return;
                    }
                    assert_eq!(&command, b"zINSTREAM\0");

                    let mut payload = Vec::new();
                    loop {
                        let mut len_buf = [0u8; 4];
                        if socket.read_exact(&mut len_buf).await.is_err() {
                            return;
                        }
                        let len = u32::from_be_bytes(len_buf) as usize;
                        if len == 0 {
                            break;
                        }
                        let mut chunk = vec![0u8; len];
                        if socket.read_exact(&mut chunk).await.is_err() {
                            return;
                        }
                        payload.extend_from_slice(&chunk);
                    }

                    let reply: &[u8] = if payload.windows(5).any(|w| w == b"EICAR") {
                        b"stream: Win.Test.EICAR_HDB-1 FOUND\0"
                    } else {
                        b"stream: OK\0"
                    };
                    let _ = socket.write_all(reply).await;
                });
            }
        });

        port
    }

    fn scanner_for(port: u16) -> ClamdScanner {
        ClamdScanner::new(ClamdConfig {
            host: "127.0.0.1".into(),
            port,
            timeout: Duration::from_secs(5),
            chunk_size: 8,
        })
    }

    #[tokio::test]
    async fn clean_payload_scans_clean() {
        let port = spawn_fake_clamd().await;
        let scanner = scanner_for(port);
        let verdict = scanner.scan(b"just an ordinary document").await.unwrap();
        assert_eq!(verdict, ScanVerdict::Clean);
    }

    #[tokio::test]
    async fn infected_payload_is_reported_with_signature() {
        let port = spawn_fake_clamd().await;
        let scanner = scanner_for(port);
        let verdict = scanner.scan(b"prefix EICAR suffix").await.unwrap();
        assert_eq!(
            verdict,
            ScanVerdict::Infected {
                signature: "Win.Test.EICAR_HDB-1".into()
            }
        );
    }

    #[tokio::test]
    async fn empty_payload_scans_clean() {
        let port = spawn_fake_clamd().await;
        let scanner = scanner_for(port);
        assert_eq!(scanner.scan(b"").await.unwrap(), ScanVerdict::Clean);
    }

    #[tokio::test]
    async fn unreachable_engine_is_a_connection_error() {
        // Bind-then-drop to get a port nothing is listening on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let scanner = scanner_for(port);
        let err = scanner.scan(b"anything").await.unwrap_err();
        assert!(matches!(err, ScanError::Connection(_)), "got {err:?}");
    }
}

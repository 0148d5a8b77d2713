//! The submission client: one SMTP dialogue per outbound message.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::error::{ClientError, Result};
use crate::reply::{Reply, ReplyReader};

/// Anything the dialogue can run over: a bare socket or a TLS session.
trait Connection: AsyncRead + AsyncWrite + Send + Unpin + std::fmt::Debug {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + std::fmt::Debug> Connection for T {}

type BoxedConnection = Box<dyn Connection>;

/// Check a reply against the single code the protocol step expects.
fn expect(command: &'static str, expected: u16, reply: Reply) -> Result<Reply> {
    if reply.code == expected {
        Ok(reply)
    } else {
        Err(ClientError::UnexpectedReply {
            command,
            code: reply.code,
            message: reply.message(),
        })
    }
}

/// An open connection to a submission server.
///
/// The caller drives the protocol in order: [`Self::greeting`],
/// [`Self::ehlo`], [`Self::auth_login`], [`Self::mail_from`],
/// [`Self::rcpt_to`], [`Self::data`], [`Self::send_message`],
/// [`Self::quit`]. Any unexpected reply code aborts the dialogue with
/// the offending command and code attached.
#[derive(Debug)]
pub struct SubmissionClient {
    reader: ReplyReader<BufReader<ReadHalf<BoxedConnection>>>,
    writer: WriteHalf<BoxedConnection>,
}

impl SubmissionClient {
    /// Connect to `host:port`, wrapping the socket in TLS from the first
    /// byte when `require_tls` is set (implicit-TLS submission).
    ///
    /// # Errors
    /// [`ClientError::Io`] on connect failure, [`ClientError::Tls`] on
    /// handshake failure.
    pub async fn connect(host: &str, port: u16, require_tls: bool) -> Result<Self> {
        let tcp = TcpStream::connect((host, port)).await?;

        let stream: BoxedConnection = if require_tls {
            Box::new(tls_handshake(host, tcp).await?)
        } else {
            Box::new(tcp)
        };

        let (read_half, write_half) = tokio::io::split(stream);
        Ok(Self {
            reader: ReplyReader::new(BufReader::new(read_half)),
            writer: write_half,
        })
    }

    /// Read the server greeting, expecting 220.
    ///
    /// # Errors
    /// [`ClientError::UnexpectedReply`] on any other code.
    pub async fn greeting(&mut self) -> Result<Reply> {
        let reply = self.reader.read_reply().await?;
        expect("greeting", 220, reply)
    }

    /// `EHLO`, expecting 250.
    ///
    /// # Errors
    /// [`ClientError::UnexpectedReply`] on any other code.
    pub async fn ehlo(&mut self, local_identity: &str) -> Result<Reply> {
        let reply = self.command(&format!("EHLO {local_identity}")).await?;
        expect("EHLO", 250, reply)
    }

    /// `AUTH LOGIN` with base64-encoded credentials: 334 for the
    /// challenge and the username, 235 after the password.
    ///
    /// # Errors
    /// [`ClientError::UnexpectedReply`] at whichever step diverges.
    pub async fn auth_login(&mut self, username: &str, password: &str) -> Result<()> {
        let reply = self.command("AUTH LOGIN").await?;
        expect("AUTH LOGIN", 334, reply)?;

        let reply = self.command(&STANDARD.encode(username)).await?;
        expect("AUTH LOGIN username", 334, reply)?;

        let reply = self.command(&STANDARD.encode(password)).await?;
        expect("AUTH LOGIN password", 235, reply)?;

        Ok(())
    }

    /// `MAIL FROM`, expecting 250.
    ///
    /// # Errors
    /// [`ClientError::UnexpectedReply`] on any other code.
    pub async fn mail_from(&mut self, address: &str) -> Result<Reply> {
        let reply = self.command(&format!("MAIL FROM:<{address}>")).await?;
        expect("MAIL FROM", 250, reply)
    }

    /// `RCPT TO`, expecting 250.
    ///
    /// # Errors
    /// [`ClientError::UnexpectedReply`] on any other code.
    pub async fn rcpt_to(&mut self, address: &str) -> Result<Reply> {
        let reply = self.command(&format!("RCPT TO:<{address}>")).await?;
        expect("RCPT TO", 250, reply)
    }

    /// `DATA`, expecting the 354 go-ahead.
    ///
    /// # Errors
    /// [`ClientError::UnexpectedReply`] on any other code.
    pub async fn data(&mut self) -> Result<Reply> {
        let reply = self.command("DATA").await?;
        expect("DATA", 354, reply)
    }

    /// Transmit the formatted message and the `.` terminator, expecting
    /// 250.
    ///
    /// # Errors
    /// [`ClientError::UnexpectedReply`] if the server rejects the
    /// message.
    pub async fn send_message(&mut self, message: &str) -> Result<Reply> {
        self.writer.write_all(message.as_bytes()).await?;
        if !message.ends_with("\r\n") {
            self.writer.write_all(b"\r\n").await?;
        }
        self.writer.write_all(b".\r\n").await?;
        self.writer.flush().await?;

        let reply = self.reader.read_reply().await?;
        expect("DATA terminator", 250, reply)
    }

    /// `QUIT`, expecting 221. Callers treat failures here as advisory —
    /// a completed send stays completed.
    ///
    /// # Errors
    /// [`ClientError::UnexpectedReply`] on any other code.
    pub async fn quit(&mut self) -> Result<Reply> {
        let reply = self.command("QUIT").await?;
        expect("QUIT", 221, reply)
    }

    async fn command(&mut self, line: &str) -> Result<Reply> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        self.reader.read_reply().await
    }
}

async fn tls_handshake(
    host: &str,
    tcp: TcpStream,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>> {
    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for cert in native.certs {
        roots
            .add(cert)
            .map_err(|e| ClientError::Tls(format!("failed to add certificate: {e}")))?;
    }
    if !native.errors.is_empty() {
        tracing::warn!(errors = ?native.errors, "some native certificates could not be loaded");
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let connector = TlsConnector::from(Arc::new(config));
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| ClientError::Tls(format!("invalid server name: {e}")))?;

    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| ClientError::Tls(e.to_string()))
}

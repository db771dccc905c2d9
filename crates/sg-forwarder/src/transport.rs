// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Raw log intake over UDP.
//!
//! Every datagram is one JSON log payload handed to [`LogHandler::handle`]. Parse failures are
//! contained by the handler; the listener only stops on cancellation.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_aux::prelude::deserialize_bool_from_anything;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::bus::EventPublisher;
use crate::logs::LogHandler;

// Largest possible UDP payload
const BUFFER_SIZE: usize = 65_535;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::module_name_repetitions)]
pub struct TransportConfig {
    /// `host:port` the UDP socket binds to.
    pub address: String,
    /// Publish parse failures as error events.
    #[serde(deserialize_with = "deserialize_bool_from_anything")]
    pub report_errors: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            address: "127.0.0.1:30000".to_string(),
            report_errors: false,
        }
    }
}

enum BufferReader {
    UdpSocket(tokio::net::UdpSocket),

    /// Replays a fixed payload.
    #[allow(dead_code)]
    MirrorTest(Vec<u8>, SocketAddr),
}

impl BufferReader {
    async fn read(&self) -> std::io::Result<(Vec<u8>, SocketAddr)> {
        match self {
            BufferReader::UdpSocket(socket) => {
                let mut buf = vec![0; BUFFER_SIZE];
                let (amt, src) = socket.recv_from(&mut buf).await?;
                buf.truncate(amt);
                Ok((buf, src))
            }
            BufferReader::MirrorTest(data, src) => Ok((data.clone(), *src)),
        }
    }
}

pub struct LogListener {
    cancel_token: CancellationToken,
    handler: Arc<LogHandler>,
    publisher: Arc<dyn EventPublisher>,
    report_errors: bool,
    buffer_reader: BufferReader,
}

impl LogListener {
    /// Binds the UDP socket described by `config`.
    pub async fn bind(
        config: &TransportConfig,
        handler: Arc<LogHandler>,
        publisher: Arc<dyn EventPublisher>,
        cancel_token: CancellationToken,
    ) -> std::io::Result<Self> {
        let socket = tokio::net::UdpSocket::bind(&config.address).await?;
        debug!(address = %socket.local_addr()?, "listening for logs");
        Ok(LogListener {
            cancel_token,
            handler,
            publisher,
            report_errors: config.report_errors,
            buffer_reader: BufferReader::UdpSocket(socket),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.buffer_reader {
            BufferReader::UdpSocket(socket) => socket.local_addr().ok(),
            BufferReader::MirrorTest(..) => None,
        }
    }

    /// Receives and handles datagrams until cancelled.
    pub async fn spin(self) {
        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => break,
                read = self.buffer_reader.read() => match read {
                    Ok((payload, src)) => self.consume(&payload, src),
                    Err(e) => error!(error = %e, "failed to receive log datagram"),
                },
            }
        }
        debug!("log listener stopped");
    }

    fn consume(&self, payload: &[u8], src: SocketAddr) {
        trace!(%src, bytes = payload.len(), "received log");
        if let Err(e) = self
            .handler
            .handle(payload, self.report_errors, self.publisher.as_ref())
        {
            debug!(%src, error = %e, "dropped log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, EventKind};
    use crate::logs::LogConfig;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Mutex;
    use std::time::Duration;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Collector {
        events: Mutex<Vec<Event>>,
    }

    impl EventPublisher for Collector {
        fn publish_event(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn handler() -> Arc<LogHandler> {
        Arc::new(LogHandler::new(LogConfig {
            message_field: "msg".to_string(),
            timestamp_field: "ts".to_string(),
            hostname_field: "host".to_string(),
            ..LogConfig::default()
        }))
    }

    fn mirror(payload: &str, collector: Arc<Collector>, report_errors: bool) -> LogListener {
        LogListener {
            cancel_token: CancellationToken::new(),
            handler: handler(),
            publisher: collector,
            report_errors,
            buffer_reader: BufferReader::MirrorTest(
                payload.as_bytes().to_vec(),
                SocketAddr::new(IpAddr::V4(Ipv4Addr::new(111, 112, 113, 114)), 0),
            ),
        }
    }

    #[tokio::test]
    async fn test_consume_publishes_event() {
        let collector = Arc::new(Collector::default());
        let listener = mirror(
            r#"{"msg":"m","host":"h1","ts":"2024-01-02T03:04:05Z"}"#,
            collector.clone(),
            false,
        );

        let (payload, src) = listener.buffer_reader.read().await.unwrap();
        listener.consume(&payload, src);

        let events = collector.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].destination_key, "logs-h1-2024-1-2");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_consume_reports_parse_errors() {
        let collector = Arc::new(Collector::default());
        let listener = mirror("garbage", collector.clone(), true);

        let (payload, src) = listener.buffer_reader.read().await.unwrap();
        listener.consume(&payload, src);

        assert!(logs_contain("failed to parse log - disregarding"));
        let events = collector.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Error);
    }

    #[tokio::test]
    async fn test_udp_round_trip_and_cancel() {
        let collector = Arc::new(Collector::default());
        let cancel = CancellationToken::new();
        let config = TransportConfig {
            address: "127.0.0.1:0".to_string(),
            report_errors: false,
        };
        let listener = LogListener::bind(&config, handler(), collector.clone(), cancel.clone())
            .await
            .unwrap();
        let address = listener.local_addr().unwrap();
        let task = tokio::spawn(listener.spin());

        let sender = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(
                br#"{"msg":"m","host":"h9","ts":"2024-01-02T03:04:05Z"}"#,
                address,
            )
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while collector.events.lock().unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            collector.events.lock().unwrap()[0].destination_key,
            "logs-h9-2024-1-2"
        );
    }
}

use crate::error::ProtocolError;
use futures::{SinkExt, StreamExt};
use nodeflow_core::{ExecutedRecord, GraphPayload};
use nodeflow_runtime::RunFailure;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

/// Controller to host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value", rename_all = "snake_case")]
pub enum ControlMessage {
    Start(GraphPayload),
}

/// Host to controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value", rename_all = "snake_case")]
pub enum HostMessage {
    /// Acknowledges `start`; not terminal
    #[serde(rename = "start")]
    Started,
    Finish(Vec<ExecutedRecord>),
    Error(RunFailure),
}

/// Ordered message channel, one JSON document per line
pub struct Channel<R, W> {
    reader: FramedRead<R, LinesCodec>,
    writer: FramedWrite<W, LinesCodec>,
}

impl<R, W> Channel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: FramedRead::new(reader, LinesCodec::new()),
            writer: FramedWrite::new(writer, LinesCodec::new()),
        }
    }

    /// Send one message and flush it
    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), ProtocolError> {
        let line = serde_json::to_string(message)?;
        self.writer.send(line).await?;
        Ok(())
    }

    /// Next message, or `None` once the peer has closed its side
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<Option<T>, ProtocolError> {
        loop {
            match self.reader.next().await {
                None => return Ok(None),
                Some(line) => {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Ok(Some(serde_json::from_str(&line)?));
                }
            }
        }
    }
}

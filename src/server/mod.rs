use std::sync::Arc;

use log::{debug, error, info};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::tenor::TenorManager;

pub use tools::ToolServer;

pub mod rpc;
pub mod tools;

use rpc::{RpcRequest, RpcResponse};

/// Newline delimited JSON-RPC. Every request runs on its own task, replies
/// funnel through one writer so lines never interleave. Returns the writer
/// once input is exhausted and every in-flight request has answered
pub async fn serve<R, W>(server: Arc<ToolServer>, reader: R, writer: W) -> anyhow::Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (sender, mut receiver) = mpsc::unbounded_channel::<RpcResponse>();
    let output = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(response) = receiver.recv().await {
            let mut line = serde_json::to_string(&response)?;
            line.push('\n');
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
        }
        Ok::<W, anyhow::Error>(writer)
    });

    let mut reader = reader;
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                error!("Could not read from input, shutting down: {}", err);
                break;
            }
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        // from_slice rejects invalid utf-8 the same way it rejects bad json
        let request = match serde_json::from_slice::<RpcRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                error!("Could not parse incoming message: {}", err);
                let _ = sender.send(RpcResponse::parse_error(err.to_string()));
                continue;
            }
        };
        let server = Arc::clone(&server);
        let sender = sender.clone();
        tokio::spawn(async move {
            if let Some(response) = server.handle(request).await {
                if sender.send(response).is_err() {
                    debug!("Output closed before a reply could be written");
                }
            }
        });
    }
    drop(sender);
    output.await?
}

/// Speak the protocol over this process' stdin and stdout
pub async fn run_stdio(manager: Arc<TenorManager>) -> anyhow::Result<()> {
    info!("Serving tenor tools over stdio");
    let server = Arc::new(ToolServer::new(manager));
    serve(server, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
    info!("stdin closed, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use crate::request::mock::MockTransport;
    use crate::request::HttpTransport;
    use crate::tenor::TenorSettings;

    use super::*;

    fn server(transport: Arc<MockTransport>) -> Arc<ToolServer> {
        let settings = TenorSettings {
            api_key: Some("k".to_owned()),
            ..TenorSettings::default()
        };
        let manager = TenorManager::new(settings, transport as Arc<dyn HttpTransport>).unwrap();
        Arc::new(ToolServer::new(Arc::new(manager)))
    }

    async fn replies(input: &'static str, transport: Arc<MockTransport>) -> Vec<Value> {
        raw_replies(input.as_bytes(), transport).await
    }

    async fn raw_replies(input: &'static [u8], transport: Arc<MockTransport>) -> Vec<Value> {
        let output = serve(server(transport), input, Vec::new())
            .await
            .unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn answers_every_request_but_not_notifications() {
        let input = concat!(
            r#"{"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}"#,
            "\n",
            r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc": "2.0", "id": 2, "method": "tools/list"}"#,
            "\n",
        );
        let mut replies = replies(input, Arc::new(MockTransport::new())).await;
        replies.sort_by_key(|reply| reply["id"].as_i64());
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(replies[1]["result"]["tools"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn garbage_gets_a_parse_error() {
        let replies = replies("not json\n", Arc::new(MockTransport::new())).await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["error"]["code"], rpc::PARSE_ERROR);
        assert!(replies[0]["id"].is_null());
    }

    #[tokio::test]
    async fn invalid_utf8_does_not_stop_the_loop() {
        let input: &'static [u8] =
            b"\xff\xfe garbage\n{\"jsonrpc\": \"2.0\", \"id\": 7, \"method\": \"ping\"}\n";
        let mut replies = raw_replies(input, Arc::new(MockTransport::new())).await;
        replies.sort_by_key(|reply| reply["id"].as_i64());
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["error"]["code"], rpc::PARSE_ERROR);
        assert_eq!(replies[1]["id"], 7);
        assert_eq!(replies[1]["result"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn last_line_without_newline_is_still_read() {
        let input = r#"{"jsonrpc": "2.0", "id": 1, "method": "ping"}"#;
        let replies = replies(input, Arc::new(MockTransport::new())).await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["id"], 1);
    }

    #[tokio::test]
    async fn tool_calls_reach_tenor() {
        let transport = Arc::new(MockTransport::new().respond(200, r#"{"results": []}"#));
        let input = concat!(
            r#"{"jsonrpc": "2.0", "id": "t", "method": "tools/call", "params": {"name": "trending"}}"#,
            "\n",
        );
        let replies = replies(input, Arc::clone(&transport)).await;
        assert_eq!(replies[0]["id"], "t");
        assert_eq!(replies[0]["result"]["content"], Value::Array(vec![]));
        assert_eq!(transport.request_count(), 1);
    }
}

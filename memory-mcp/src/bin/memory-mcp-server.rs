//! stdio MCP server binary: wires a [`memory_storage_redb::RedbBackend`] and
//! an [`Engine`] to the [`Dispatcher`], then runs the framed JSON-RPC loop
//! over stdin/stdout.

use std::io;
use std::sync::Arc;

use tracing::{error, info, warn};

use memory_core::registry::ProjectRegistry;
use memory_core::semantic::HashEmbeddingGenerator;
use memory_core::{Error, MemoryConfig};
use memory_mcp::framing::{read_next_message, write_content_length, write_line};
use memory_mcp::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use memory_mcp::Dispatcher;
use memory_storage_redb::RedbBackend;

fn load_config() -> anyhow::Result<MemoryConfig> {
    match std::env::var("MEMORY_CONFIG_PATH") {
        Ok(path) => {
            let contents = std::fs::read_to_string(&path)?;
            Ok(MemoryConfig::from_toml_str(&contents)?)
        }
        Err(_) => Ok(MemoryConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let config = load_config()?;
    std::fs::create_dir_all(&config.data_root)?;

    let registry = ProjectRegistry::new(config.data_root.clone());
    let backend = RedbBackend::open(config.data_root.join("memory.redb"))?;
    let embedder = Arc::new(HashEmbeddingGenerator::new(config.embedding_dim));
    let engine = memory_core::Engine::new(registry, backend, embedder, config);
    let dispatcher = Dispatcher::new(engine);

    info!("memory-mcp-server starting, reading requests from stdin");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();

    loop {
        let next = read_next_message(&mut handle)?;
        let Some((line, is_content_length)) = next else {
            info!("stdin closed, shutting down");
            break;
        };

        let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(request) => dispatcher.handle(request).await,
            Err(err) => {
                warn!(error = %err, "failed to parse JSON-RPC request");
                JsonRpcResponse::err(Error::InvalidArgument(format!("malformed request: {err}")), None)
            }
        };

        let body = serde_json::to_string(&response)?;
        let write_result = if is_content_length {
            write_content_length(&mut stdout, &body)
        } else {
            write_line(&mut stdout, &body)
        };
        if let Err(err) = write_result {
            error!(error = %err, "failed to write response, shutting down");
            break;
        }
    }

    Ok(())
}

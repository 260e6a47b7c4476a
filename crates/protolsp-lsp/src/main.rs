use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // stdout carries JSON-RPC; logs must stay on stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    protolsp_lsp::run_server().await;
}

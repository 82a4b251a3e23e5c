mod stream;
mod utils;

use seq_api_testnet::MockSeqServer;

async fn start_server() -> MockSeqServer {
    utils::init_tracing();
    MockSeqServer::builder()
        .api_key("e2e-secret")
        .instance_name("e2e")
        .start()
        .await
        .unwrap()
}

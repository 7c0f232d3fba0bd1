#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    if let Err(err) = kommo_mcp::mcp::server::run_stdio().await {
        eprintln!("kommo: {}", err);
        std::process::exit(1);
    }
}

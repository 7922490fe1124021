#[tokio::main]
async fn main() {
    if let Err(e) = haccp_lib::run().await {
        eprintln!("haccp-dashboard: {}", e);
        std::process::exit(1);
    }
}

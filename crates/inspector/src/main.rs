#[tokio::main]
async fn main() {
    if let Err(e) = lib_inspector::init().await {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}

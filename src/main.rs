#[tokio::main]
async fn main() {
    let code = softcenter::app::startup::startup().await;
    std::process::exit(code);
}

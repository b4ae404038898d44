use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    storeprobe::cli::run().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tagspeak::run().await
}

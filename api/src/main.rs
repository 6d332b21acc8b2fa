#[tokio::main]
async fn main() -> anyhow::Result<()> {
    moodtunes_api::run().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tictac_lobby::run().await
}

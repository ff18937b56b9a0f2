mod host;
mod hw;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}

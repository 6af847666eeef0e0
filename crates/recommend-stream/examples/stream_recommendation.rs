use std::io::Write as _;

use clap::Parser;
use recommend_stream::observability::init_observability;
use recommend_stream::prelude::*;

/// Streams a recommendation to stdout as it is generated.
#[derive(Parser, Debug)]
#[command(name = "stream_recommendation")]
struct Args {
    /// Free-text preference sent along with the products.
    #[arg(long)]
    query: Option<String>,
    /// Product ids to base the recommendation on.
    #[arg(required = true)]
    product_ids: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), RecommendError> {
    let args = Args::parse();
    init_observability();

    let client = RecommendClient::new(ClientConfig::from_env())?;
    let mut session = client.session();
    session.start(args.product_ids, args.query)?;

    let mut updates = session.subscribe();
    let mut printed = 0;
    loop {
        let snapshot = updates.borrow_and_update().clone();
        if let Some(fresh) = snapshot.text.get(printed..) {
            print!("{fresh}");
            let _ = std::io::stdout().flush();
            printed = snapshot.text.len();
        }
        if snapshot.is_terminal() || updates.changed().await.is_err() {
            break;
        }
    }
    println!();

    session.finish().await?;
    Ok(())
}

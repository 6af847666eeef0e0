use clap::Parser;
use recommend_stream::observability::init_observability;
use recommend_stream::prelude::*;

/// Requests a recommendation and prints it once the stream completes.
#[derive(Parser, Debug)]
#[command(name = "collect_recommendation")]
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
    let text = client.collect_text(args.product_ids, args.query).await?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_optional() {
        let args = Args::try_parse_from(["collect_recommendation", "p1", "p2"]).expect("parse");
        assert_eq!(args.product_ids, ["p1", "p2"]);
        assert_eq!(args.query, None);
    }
}

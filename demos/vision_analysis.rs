use std::time::Duration;

use svector::model::{AnalyzeOptions, BatchImage, BatchOptions, Detail, ImageAnalysisRequest, ImageSource};
use svector::nonempty::nonempty;
use svector::{Client, ClientOptions, FailoverOptions, RequestOptions};
use tracing_subscriber::EnvFilter;

const CAT: &str = "https://upload.wikimedia.org/wikipedia/commons/3/3a/Cat03.jpg";
const DOG: &str = "https://upload.wikimedia.org/wikipedia/commons/d/d9/Collage_of_Nine_Dogs.jpg";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // ============================================================================================
    // Step 1: Configure Failover
    // ============================================================================================
    // Vision requests try the base URL first, then each fallback host. Every host gets
    // `retries_per_endpoint` attempts; a 4xx answer stops immediately.
    let options = ClientOptions::new().with_vision(
        FailoverOptions::default()
            .with_retries_per_endpoint(2)
            .with_timeout(Duration::from_secs(90)),
    );
    let client = Client::new(options)?;

    // ============================================================================================
    // Step 2: Analyze One Image
    // ============================================================================================
    let request = ImageAnalysisRequest::from_source(ImageSource::Url(CAT.to_string()))
        .with_prompt("What animal is this and what is it doing?");
    let result = client.vision().analyze(request, RequestOptions::new()).await?;
    println!("Analysis: {}", result.analysis);

    // ============================================================================================
    // Step 3: Confidence and Comparison
    // ============================================================================================
    let scored = client
        .vision()
        .analyze_with_confidence(
            ImageAnalysisRequest::from_source(ImageSource::Url(DOG.to_string())),
            RequestOptions::new(),
        )
        .await?;
    println!("Dogs: {} (confidence: {:?})", scored.analysis, scored.confidence);

    let comparison = client
        .vision()
        .compare_images(
            nonempty![ImageSource::Url(CAT.to_string()), ImageSource::Url(DOG.to_string())],
            None,
            AnalyzeOptions::default().with_detail(Detail::Low),
        )
        .await?;
    println!("Comparison: {}", comparison.analysis);

    // ============================================================================================
    // Step 4: Batch
    // ============================================================================================
    // Batches run one request at a time. A failed image is reported, not fatal.
    let images = [CAT, DOG]
        .into_iter()
        .map(|url| BatchImage {
            source: ImageSource::Url(url.to_string()),
            prompt: Some("Describe this image in five words.".to_string()),
        })
        .collect();
    for (index, item) in client
        .vision()
        .batch_analyze(images, BatchOptions::default())
        .await
        .into_iter()
        .enumerate()
    {
        match item.error {
            Some(error) => println!("#{index}: failed: {error}"),
            None => println!("#{index}: {}", item.analysis),
        }
    }

    Ok(())
}

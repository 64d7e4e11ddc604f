use futures_util::StreamExt;
use serde::de::DeserializeOwned;

/// Decodes the stored documents of `collection` (all of them, or just the
/// first) so that a schema mismatch fails at startup instead of per request.
pub async fn verify<T>(
    client: &mongodb::Client,
    database: &str,
    collection: &str,
    all: bool,
) -> anyhow::Result<()>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let collection = client.database(database).collection::<T>(collection);
    let mut cursor = collection.find(None, None).await?;

    while let Some(value) = cursor.next().await {
        value?;
        if !all {
            break;
        }
    }

    Ok(())
}

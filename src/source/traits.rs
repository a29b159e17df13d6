use crate::model::{IngestError, RawListing};

#[async_trait::async_trait]
pub trait ListingSource: Send + Sync {
    /// All rows of the input, in a stable order.
    async fn load(&self) -> Result<Vec<RawListing>, IngestError>;

    fn describe(&self) -> String;
}

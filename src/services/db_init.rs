use mongodb::{
    bson::doc,
    options::IndexOptions,
    Database, IndexModel,
};

use crate::errors::StoreResult;
use crate::repositories::mongo::{DECISIONS, HOLDINGS, PRICES};

pub async fn ensure_indexes(db: &Database) -> StoreResult<()> {
    // holdings: one row per symbol; duplicate creates merge instead
    {
        let col = db.collection::<mongodb::bson::Document>(HOLDINGS);
        let model = IndexModel::builder()
            .keys(doc! { "symbol": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        col.create_index(model, None).await?;
    }

    // prices: upsert key, also serves the latest-per-symbol sort
    {
        let col = db.collection::<mongodb::bson::Document>(PRICES);
        let model = IndexModel::builder()
            .keys(doc! { "symbol": 1, "date": -1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        col.create_index(model, None).await?;
    }

    // decisions: listing newest first
    {
        let col = db.collection::<mongodb::bson::Document>(DECISIONS);
        let model = IndexModel::builder()
            .keys(doc! { "created_at": -1 })
            .build();

        col.create_index(model, None).await?;
    }

    // decisions: at most one open-state decision per subject
    {
        let col = db.collection::<mongodb::bson::Document>(DECISIONS);
        let model = IndexModel::builder()
            .keys(doc! { "open_key": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "open_key": { "$exists": true } })
                    .build(),
            )
            .build();

        col.create_index(model, None).await?;
    }

    tracing::info!("mongo indexes ensured");
    Ok(())
}

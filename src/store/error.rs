// SPDX-License-Identifier: MIT

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not open store {name:?}: {source}")]
    Open {
        name: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("could not create schema: {0}")]
    Schema(#[source] rusqlite::Error),
    #[error("could not begin transaction: {0}")]
    Transaction(#[source] rusqlite::Error),
    #[error("could not insert signal {name:?}: {source}")]
    InsertSignal {
        name: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("could not insert value for code {code:?} at timestamp {timestamp}: {source}")]
    InsertValue {
        code: String,
        timestamp: i64,
        #[source]
        source: rusqlite::Error,
    },
    #[error("query failed: {0}")]
    Query(#[source] rusqlite::Error),
}

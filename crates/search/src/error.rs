use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Vector store error: {0}")]
    VectorStoreError(#[from] docdex_vector_store::VectorStoreError),
}

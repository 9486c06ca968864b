pub mod db;
pub mod embedding_llm;
pub mod file_store;
pub mod insight_llm;
pub mod page_fetch;

#[cfg(test)]
mod store_contract;

pub use db::DbAdapter;
pub use embedding_llm::OpenAiEmbeddingAdapter;
pub use file_store::FileArticleStore;
pub use insight_llm::OpenAiInsightAdapter;
pub use page_fetch::HttpMetadataFetcher;

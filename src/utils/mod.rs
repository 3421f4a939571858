pub mod collection_ext;
pub mod domain;
pub mod error;
pub mod rate_limit;
pub mod string_ext;

pub use collection_ext::unique_ordered;
pub use domain::{extract_lt_from_chain, extract_main, is_lithuanian, normalize, same_family};
pub use error::{AnalyzerError, AnalyzerResult};
pub use rate_limit::TokenBucket;
pub use string_ext::{StringExt, clean_optional_string};

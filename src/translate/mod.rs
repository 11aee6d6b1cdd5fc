pub mod client;
pub mod factory;
pub mod interface;
pub mod languages;
#[cfg(test)]
pub mod testing;

pub use factory::TranslatorFactory;
pub use interface::{GenerationOptions, TranslateRequest, TranslatorInterface};

pub mod chunker;
pub mod decode;
pub mod reassembler;
pub mod sentence_divider;

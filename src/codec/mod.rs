/// ADTS AAC header parsing and frame scanning
pub mod aac;

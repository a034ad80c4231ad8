use thiserror::Error;

use crate::{
    DecodingError,
    chain::{address::AddressError, hrc20::ResolutionError},
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("decoding error: {0}")]
    Decoding(#[from] DecodingError),

    #[error("rocksdb error: {0}")]
    Rocks(#[from] rocksdb::Error),

    #[error("node rpc error: {0}")]
    Rpc(#[from] bitcoincore_rpc::Error),

    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("address error: {0}")]
    Address(#[from] AddressError),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("block parse error: {0}")]
    BlockParse(#[from] bitcoin::consensus::encode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn custom(error: Box<dyn std::error::Error>) -> Error {
        Error::Custom(format!("{error}"))
    }
}

impl From<Box<dyn std::error::Error>> for Error {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        Error::custom(err)
    }
}

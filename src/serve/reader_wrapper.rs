use crate::{
    chain::address::{AddressCodec, AddressDescriptor},
    serve::error::ServeError,
    storage::{kv_store::Reader, table::Table},
};

pub trait ServeReaderHelper {
    fn get_or_default<T>(&self, key: &T::Key) -> Result<T::Value, ServeError>
    where
        T: Table,
        T::Value: Default;
}

impl ServeReaderHelper for Reader {
    fn get_or_default<T>(&self, key: &T::Key) -> Result<T::Value, ServeError>
    where
        T: Table,
        T::Value: Default,
    {
        Ok(self.get::<T>(key)?.unwrap_or_default())
    }
}

/// Descriptor of a user supplied address, rejecting it as a malformed request.
pub fn parse_address(
    codec: &impl AddressCodec,
    address: &str,
) -> Result<AddressDescriptor, ServeError> {
    codec
        .address_to_descriptor(address)
        .map_err(ServeError::malformed_request)
}

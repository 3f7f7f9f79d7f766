//! serde adapters for chip state the derive cannot handle on its own.

/// Fixed-size byte arrays of any length, stored as a sequence
pub mod byte_array {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, const N: usize>(arr: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        arr.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        let len = bytes.len();
        bytes
            .try_into()
            .map_err(|_| D::Error::invalid_length(len, &"a byte array of the register file size"))
    }
}

/// `Cell` latches that are cleared by reads
pub mod cell {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::cell::Cell;

    pub fn serialize<S, T>(cell: &Cell<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Copy + Serialize,
    {
        cell.get().serialize(serializer)
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Cell<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        T::deserialize(deserializer).map(Cell::new)
    }
}

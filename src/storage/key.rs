use std::fmt::Debug;
use std::hash::Hash;

/// One fixed-width component of a composite store key (a token or a
/// record identifier). Ordering comes from `Ord`; `MIN` is the smallest
/// value, used to seek to the start of a key prefix.
pub trait KeyComponent:
    Copy + Ord + Eq + Hash + Debug + Send + Sync + 'static
{
    const ENCODED_LEN: usize;
    const MIN: Self;

    fn encode_into(&self, out: &mut Vec<u8>);
    fn decode(bytes: &[u8]) -> Self;
}

macro_rules! key_component_impl {
    ($ty:ty, $len:expr) => {
        impl KeyComponent for $ty {
            const ENCODED_LEN: usize = $len;
            const MIN: Self = <$ty>::MIN;

            fn encode_into(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn decode(bytes: &[u8]) -> Self {
                let mut buf = [0u8; $len];
                buf.copy_from_slice(&bytes[..$len]);
                <$ty>::from_le_bytes(buf)
            }
        }
    };
}

key_component_impl!(u32, 4);
key_component_impl!(u64, 8);
key_component_impl!(i32, 4);
key_component_impl!(i64, 8);
key_component_impl!(u128, 16);

/// A complete, fixed-layout store key. Components serialize in
/// declaration order; the store compares decoded keys, never raw bytes.
pub trait StoreKey: Copy + Ord + Eq + Debug + Send + Sync + 'static {
    const ENCODED_LEN: usize;

    fn encode_into(&self, out: &mut Vec<u8>);
    fn decode(bytes: &[u8]) -> Self;
}

impl<K: KeyComponent> StoreKey for K {
    const ENCODED_LEN: usize = K::ENCODED_LEN;

    fn encode_into(&self, out: &mut Vec<u8>) {
        KeyComponent::encode_into(self, out);
    }

    fn decode(bytes: &[u8]) -> Self {
        KeyComponent::decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_u64() {
        let mut buf = Vec::new();
        KeyComponent::encode_into(&0xdead_beef_u64, &mut buf);
        assert_eq!(buf.len(), 8);
        assert_eq!(<u64 as KeyComponent>::decode(&buf), 0xdead_beef);
    }

    #[test]
    fn signed_minimum() {
        assert_eq!(<i64 as KeyComponent>::MIN, i64::MIN);
        let mut buf = Vec::new();
        KeyComponent::encode_into(&i64::MIN, &mut buf);
        assert_eq!(<i64 as KeyComponent>::decode(&buf), i64::MIN);
    }
}

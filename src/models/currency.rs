use crate::tlb::bigint::VarUInteger32;
use crate::tlb::{AugExtra, Grams, HashmapE, TlbError, TlbResult, VarUInteger};
use serde::Serialize;

/// Widest amount `VarUInteger 32` can hold
const EXTRA_CURRENCY_MAX_BITS: u64 = 31 * 8;

tlb_struct! {
    /// ```text
    /// extra_currencies$_ dict:(HashmapE 32 (VarUInteger 32)) = ExtraCurrencyCollection;
    /// currencies$_ grams:Grams other:ExtraCurrencyCollection = CurrencyCollection;
    /// ```
    #[derive(Debug, Clone, PartialEq, Default, Serialize)]
    pub struct CurrencyCollection {
        pub grams: Grams,
        pub other: HashmapE<u32, VarUInteger32>,
    }
}

impl CurrencyCollection {
    pub fn from_grams(grams: impl Into<Grams>) -> Self {
        Self {
            grams: grams.into(),
            other: HashmapE::default(),
        }
    }

    /// Adds both the grams and every extra currency
    pub fn checked_add(&self, other: &CurrencyCollection) -> TlbResult<CurrencyCollection> {
        let mut sum = self.clone();
        sum.grams = sum.grams.checked_add(other.grams)?;
        for (id, amount) in other.other.iter() {
            let total = match sum.other.get(id) {
                Some(existing) => VarUInteger(&existing.0 + &amount.0),
                None => amount.clone(),
            };
            if total.0.bits() > EXTRA_CURRENCY_MAX_BITS {
                return Err(TlbError::IntOverflow(format!(
                    "extra currency {id} amount does not fit into VarUInteger 32"
                )));
            }
            sum.other.insert(*id, total);
        }
        Ok(sum)
    }
}

impl AugExtra for CurrencyCollection {
    fn aggregate(left: &Self, right: &Self) -> TlbResult<Self> {
        left.checked_add(right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlb::{from_boc_hex, to_boc_hex};

    fn extra(items: &[(u32, u64)]) -> HashmapE<u32, VarUInteger32> {
        items
            .iter()
            .map(|(id, amount)| (*id, VarUInteger32::from(*amount)))
            .collect()
    }

    #[test]
    fn test_checked_add_merges_currencies() {
        let a = CurrencyCollection {
            grams: Grams(10),
            other: extra(&[(1, 5), (7, 1)]),
        };
        let b = CurrencyCollection {
            grams: Grams(32),
            other: extra(&[(7, 2), (100, 9)]),
        };
        let sum = a.checked_add(&b).unwrap();
        assert_eq!(sum.grams, Grams(42));
        assert_eq!(sum.other.get(&1), Some(&VarUInteger32::from(5u64)));
        assert_eq!(sum.other.get(&7), Some(&VarUInteger32::from(3u64)));
        assert_eq!(sum.other.get(&100), Some(&VarUInteger32::from(9u64)));

        let max = CurrencyCollection::from_grams(u64::MAX);
        assert!(max.checked_add(&CurrencyCollection::from_grams(1u64)).is_err());
    }

    #[test]
    fn test_boc_roundtrip() {
        let value = CurrencyCollection {
            grams: Grams(1_000_000_000),
            other: extra(&[(239, 1_000)]),
        };
        let hex = to_boc_hex(&value).unwrap();
        let decoded: CurrencyCollection = from_boc_hex(&hex).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(
            serde_json::to_value(&decoded).unwrap(),
            serde_json::json!({"grams": "1000000000", "other": {"239": "1000"}})
        );
    }
}

//! Dictionary edge labels
//!
//! ```text
//! hml_short$0 {m:#} {n:#} len:(Unary ~n) {n <= m} s:(n * Bit) = HmLabel ~n m;
//! hml_long$10 {m:#} n:(#<= m) s:(n * Bit) = HmLabel ~n m;
//! hml_same$11 {m:#} v:Bit n:(#<= m) = HmLabel ~n m;
//! ```

use crate::cell::{BitString, CellBuilder, Slice, bits_for};
use crate::tlb::error::{TlbError, TlbResult};
use crate::utils::LabelPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelForm {
    Short,
    Long,
    Same,
}

/// Serialized size of `label` in the given form, `None` if the form cannot hold it
pub fn label_size(form: LabelForm, label: &BitString, max_len: usize) -> Option<usize> {
    let n = label.len();
    let len_bits = bits_for(max_len as u64);
    match form {
        LabelForm::Short => Some(2 * n + 2),
        LabelForm::Long => Some(2 + len_bits + n),
        LabelForm::Same => label.uniform_bit().map(|_| 3 + len_bits),
    }
}

/// Picks the form the encoder emits. `hml_short` wins ties with `hml_long`;
/// under [`LabelPolicy::Canonical`] `hml_same` replaces either when strictly shorter.
pub fn choose_label_form(label: &BitString, max_len: usize, policy: LabelPolicy) -> LabelForm {
    let short = 2 * label.len() + 2;
    let long = 2 + bits_for(max_len as u64) + label.len();
    let (form, size) = if short <= long {
        (LabelForm::Short, short)
    } else {
        (LabelForm::Long, long)
    };
    if policy == LabelPolicy::Canonical {
        if let Some(same) = label_size(LabelForm::Same, label, max_len) {
            if same < size {
                return LabelForm::Same;
            }
        }
    }
    form
}

pub fn store_label(
    builder: &mut CellBuilder,
    label: &BitString,
    max_len: usize,
    policy: LabelPolicy,
) -> TlbResult<()> {
    let form = choose_label_form(label, max_len, policy);
    store_label_as(builder, label, max_len, form)
}

pub fn store_label_as(
    builder: &mut CellBuilder,
    label: &BitString,
    max_len: usize,
    form: LabelForm,
) -> TlbResult<()> {
    if label.len() > max_len {
        return Err(TlbError::InvalidData(format!(
            "label of {} bits exceeds {max_len}",
            label.len()
        )));
    }
    let len_bits = bits_for(max_len as u64);
    match form {
        LabelForm::Short => {
            builder.store_bit(false)?;
            builder.store_unary(label.len())?;
            builder.store_bit_string(label)?;
        }
        LabelForm::Long => {
            builder.store_uint(0b10, 2)?;
            builder.store_uint(label.len() as u64, len_bits)?;
            builder.store_bit_string(label)?;
        }
        LabelForm::Same => {
            let bit = label.uniform_bit().ok_or_else(|| {
                TlbError::InvalidData("hml_same needs a non-empty uniform label".to_string())
            })?;
            builder.store_uint(0b11, 2)?;
            builder.store_bit(bit)?;
            builder.store_uint(label.len() as u64, len_bits)?;
        }
    }
    Ok(())
}

fn check_len(len: usize, max_len: usize) -> TlbResult<usize> {
    if len > max_len {
        return Err(TlbError::InvalidData(format!(
            "label length {len} exceeds remaining key length {max_len}"
        )));
    }
    Ok(len)
}

/// Reads a label of at most `max_len` bits in any of the three forms
pub fn load_label(slice: &mut Slice, max_len: usize) -> TlbResult<BitString> {
    if !slice.load_bit()? {
        let len = check_len(slice.load_unary()?, max_len)?;
        return Ok(slice.load_bit_string(len)?);
    }
    if !slice.load_bit()? {
        let len = check_len(slice.load_uint(bits_for(max_len as u64))? as usize, max_len)?;
        return Ok(slice.load_bit_string(len)?);
    }
    let bit = slice.load_bit()?;
    let len = check_len(slice.load_uint(bits_for(max_len as u64))? as usize, max_len)?;
    Ok(BitString::repeat(bit, len))
}

/// Reads only the label length, skipping its bits
pub fn load_label_len(slice: &mut Slice, max_len: usize) -> TlbResult<usize> {
    if !slice.load_bit()? {
        let len = check_len(slice.load_unary()?, max_len)?;
        slice.skip_bits(len)?;
        return Ok(len);
    }
    if !slice.load_bit()? {
        let len = check_len(slice.load_uint(bits_for(max_len as u64))? as usize, max_len)?;
        slice.skip_bits(len)?;
        return Ok(len);
    }
    slice.skip_bits(1)?;
    check_len(slice.load_uint(bits_for(max_len as u64))? as usize, max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(label: &BitString, max_len: usize, form: LabelForm) -> usize {
        let mut builder = CellBuilder::new();
        store_label_as(&mut builder, label, max_len, form).unwrap();
        let cell = builder.build().unwrap();
        let mut slice = cell.as_slice();
        assert_eq!(&load_label(&mut slice, max_len).unwrap(), label);
        assert_eq!(slice.remaining_bits(), 0);
        let mut slice = cell.as_slice();
        assert_eq!(load_label_len(&mut slice, max_len).unwrap(), label.len());
        cell.bit_len()
    }

    #[test]
    fn test_all_forms_decode() {
        let max_len = 32;
        for len in [0usize, 1, 7, 8, 9, 32] {
            let mixed: BitString = (0..len).map(|i| i % 3 == 0).collect();
            assert_eq!(roundtrip(&mixed, max_len, LabelForm::Short), 2 * len + 2);
            assert_eq!(roundtrip(&mixed, max_len, LabelForm::Long), 2 + 6 + len);
            if len > 0 {
                let ones = BitString::repeat(true, len);
                assert_eq!(roundtrip(&ones, max_len, LabelForm::Same), 3 + 6);
                roundtrip(&BitString::repeat(false, len), max_len, LabelForm::Same);
            }
        }
    }

    #[test]
    fn test_form_choice() {
        let label = BitString::from_fift_hex("A").unwrap();
        assert_eq!(choose_label_form(&label, 32, LabelPolicy::ShortOrLong), LabelForm::Short);

        // 12 bits short against 13 bits long
        let label: BitString = (0..5).map(|i| i % 2 == 0).collect();
        assert_eq!(choose_label_form(&label, 32, LabelPolicy::ShortOrLong), LabelForm::Short);
        let label: BitString = (0..7).map(|i| i % 2 == 0).collect();
        assert_eq!(choose_label_form(&label, 32, LabelPolicy::ShortOrLong), LabelForm::Long);

        let zeros = BitString::repeat(false, 20);
        assert_eq!(choose_label_form(&zeros, 32, LabelPolicy::ShortOrLong), LabelForm::Long);
        assert_eq!(choose_label_form(&zeros, 32, LabelPolicy::Canonical), LabelForm::Same);
        // Same is never chosen for an empty label
        assert_eq!(
            choose_label_form(&BitString::new(), 32, LabelPolicy::Canonical),
            LabelForm::Short
        );
    }

    #[test]
    fn test_rejects_overlong_label() {
        let mut builder = CellBuilder::new();
        builder.store_bit(false).unwrap();
        builder.store_unary(5).unwrap();
        builder.store_uint(0, 5).unwrap();
        let cell = builder.build().unwrap();
        assert!(load_label(&mut cell.as_slice(), 4).is_err());
    }
}

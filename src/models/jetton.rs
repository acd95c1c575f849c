//! Jetton transfer bodies and their forward payloads
//!
//! A forward payload starts with a 32-bit op code. Payloads with a known op
//! code are decoded into their own variant; anything else, including a
//! payload too short to carry an op code or a known op code that fails to
//! decode, is kept as the raw cell.

use crate::cell::{CellBuilder, Slice};
use crate::models::address::MsgAddress;
use crate::tlb::bigint::VarUInteger16;
use crate::tlb::{
    Any, Bytes, Decoder, EitherRef, Encoder, Text, TlbDecode, TlbEncode, TlbResult,
};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

pub const TEXT_COMMENT_OP_CODE: u32 = 0x0000_0000;
pub const ENCRYPTED_TEXT_COMMENT_OP_CODE: u32 = 0x2167_da4b;

const OP_CODE_BITS: usize = 32;

type DecodePayload = fn(&mut Slice, &mut Decoder) -> TlbResult<JettonPayload>;

struct JettonOp {
    code: u32,
    name: &'static str,
    decode: DecodePayload,
}

const JETTON_OPS: &[JettonOp] = &[
    JettonOp {
        code: TEXT_COMMENT_OP_CODE,
        name: "TextComment",
        decode: |slice, decoder| {
            TextCommentPayload::decode_tlb(slice, decoder).map(JettonPayload::TextComment)
        },
    },
    JettonOp {
        code: ENCRYPTED_TEXT_COMMENT_OP_CODE,
        name: "EncryptedTextComment",
        decode: |slice, decoder| {
            EncryptedTextCommentPayload::decode_tlb(slice, decoder)
                .map(JettonPayload::EncryptedTextComment)
        },
    },
];

fn known_op(name: &str) -> Option<&'static JettonOp> {
    JETTON_OPS.iter().find(|op| op.name == name)
}

tlb_struct! {
    #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
    pub struct TextCommentPayload {
        #[serde(rename = "Text")]
        pub text: Text,
    }
}

tlb_struct! {
    #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
    pub struct EncryptedTextCommentPayload {
        #[serde(rename = "CipherText")]
        pub cipher_text: Bytes,
    }
}

/// Forward payload of a jetton transfer or notification
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JettonPayload {
    #[default]
    Empty,
    TextComment(TextCommentPayload),
    EncryptedTextComment(EncryptedTextCommentPayload),
    /// Undecoded payload, op code included in `value`
    Cell { op_code: Option<u32>, value: Any },
}

impl JettonPayload {
    pub fn sum_type(&self) -> &'static str {
        match self {
            JettonPayload::Empty => "",
            JettonPayload::TextComment(_) => "TextComment",
            JettonPayload::EncryptedTextComment(_) => "EncryptedTextComment",
            JettonPayload::Cell { .. } => "Cell",
        }
    }

    pub fn op_code(&self) -> Option<u32> {
        match self {
            JettonPayload::Empty => None,
            JettonPayload::Cell { op_code, .. } => *op_code,
            known => known_op(known.sum_type()).map(|op| op.code),
        }
    }

    pub fn text_comment(text: impl Into<String>) -> Self {
        JettonPayload::TextComment(TextCommentPayload {
            text: Text(text.into()),
        })
    }
}

impl TlbDecode for JettonPayload {
    fn decode_tlb(slice: &mut Slice, decoder: &mut Decoder) -> TlbResult<Self> {
        if slice.remaining_bits() == 0 && slice.remaining_refs() == 0 {
            return Ok(JettonPayload::Empty);
        }
        if slice.remaining_bits() < OP_CODE_BITS {
            return Ok(JettonPayload::Cell {
                op_code: None,
                value: Any::decode_tlb(slice, decoder)?,
            });
        }

        let mut body = slice.clone();
        let op_code = body.load_u32()?;
        if let Some(op) = JETTON_OPS.iter().find(|op| op.code == op_code) {
            match (op.decode)(&mut body, decoder) {
                Ok(payload) => {
                    *slice = body;
                    return Ok(payload);
                }
                Err(err) => log::debug!("jetton payload {} kept as cell: {err}", op.name),
            }
        }
        Ok(JettonPayload::Cell {
            op_code: Some(op_code),
            value: Any::decode_tlb(slice, decoder)?,
        })
    }
}

impl TlbEncode for JettonPayload {
    fn encode_tlb(&self, builder: &mut CellBuilder, encoder: &mut Encoder) -> TlbResult<()> {
        match self {
            JettonPayload::Empty => Ok(()),
            JettonPayload::Cell { value, .. } => value.encode_tlb(builder, encoder),
            JettonPayload::TextComment(payload) => {
                builder.store_u32(TEXT_COMMENT_OP_CODE)?;
                payload.encode_tlb(builder, encoder)
            }
            JettonPayload::EncryptedTextComment(payload) => {
                builder.store_u32(ENCRYPTED_TEXT_COMMENT_OP_CODE)?;
                payload.encode_tlb(builder, encoder)
            }
        }
    }
}

/// `{}` when empty, otherwise `{"SumType":..,"OpCode":..,"Value":..}`
impl Serialize for JettonPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let JettonPayload::Empty = self {
            return map.end();
        }
        map.serialize_entry("SumType", self.sum_type())?;
        if let Some(op_code) = self.op_code() {
            map.serialize_entry("OpCode", &op_code)?;
        }
        match self {
            JettonPayload::TextComment(payload) => map.serialize_entry("Value", payload)?,
            JettonPayload::EncryptedTextComment(payload) => map.serialize_entry("Value", payload)?,
            JettonPayload::Cell { value, .. } => map.serialize_entry("Value", value)?,
            JettonPayload::Empty => {}
        }
        map.end()
    }
}

tlb_struct! {
    /// ```text
    /// transfer#0f8a7ea5 query_id:uint64 amount:(VarUInteger 16) destination:MsgAddress
    ///   response_destination:MsgAddress custom_payload:(Maybe ^Cell)
    ///   forward_ton_amount:(VarUInteger 16) forward_payload:(Either Cell ^Cell)
    ///   = JettonMsgBody;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct JettonTransferMsgBody: "transfer#0f8a7ea5" {
        pub query_id: u64,
        pub amount: VarUInteger16,
        pub destination: MsgAddress,
        pub response_destination: MsgAddress,
        pub custom_payload: Option<Any> => "maybe ^",
        pub forward_ton_amount: VarUInteger16,
        pub forward_payload: EitherRef<JettonPayload>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::hex_to_boc;
    use crate::tlb::{from_boc_hex, marshal, to_boc_hex, unmarshal};

    fn decode_hex(hex: &str) -> JettonPayload {
        unmarshal(&hex_to_boc(hex).unwrap()).unwrap()
    }

    #[test]
    fn test_payload_json() {
        let cases = [
            ("b5ee9c72010101010002000000", r#"{}"#),
            (
                "b5ee9c7201010101000b0000120000000048656c6c6f",
                r#"{"SumType":"TextComment","OpCode":0,"Value":{"Text":"Hello"}}"#,
            ),
            (
                "b5ee9c72010101010004000004053d",
                r#"{"SumType":"Cell","Value":"b5ee9c72010101010004000004053d"}"#,
            ),
            (
                "b5ee9c720101010100120000206f6c6f6c6f6c6f6c6f74726f6c6f6c6f",
                r#"{"SumType":"Cell","OpCode":1869377388,"Value":"b5ee9c720101010100120000206f6c6f6c6f6c6f6c6f74726f6c6f6c6f"}"#,
            ),
        ];
        for (boc, json) in cases {
            let payload = decode_hex(boc);
            assert_eq!(serde_json::to_string(&payload).unwrap(), json);
            assert_eq!(to_boc_hex(&payload).unwrap(), boc);
        }
    }

    #[test]
    fn test_known_op_that_fails_is_kept() {
        // op code 0 followed by bytes that are not valid UTF-8
        let mut builder = CellBuilder::new();
        builder.store_u32(TEXT_COMMENT_OP_CODE).unwrap();
        builder.store_bytes(&[0xff, 0xfe]).unwrap();
        let cell = builder.build().unwrap();

        let payload: JettonPayload = unmarshal(&cell).unwrap();
        assert_eq!(payload.sum_type(), "Cell");
        assert_eq!(payload.op_code(), Some(TEXT_COMMENT_OP_CODE));
        assert_eq!(marshal(&payload).unwrap().hash(), cell.hash());
    }

    #[test]
    fn test_encrypted_comment() {
        let payload = JettonPayload::EncryptedTextComment(EncryptedTextCommentPayload {
            cipher_text: Bytes(vec![0xab; 40]),
        });
        let decoded: JettonPayload = from_boc_hex(&to_boc_hex(&payload).unwrap()).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(decoded.op_code(), Some(ENCRYPTED_TEXT_COMMENT_OP_CODE));
    }

    #[test]
    fn test_transfer_body() {
        let boc = "b5ee9c720101020100690001ac0f8a7ea5546de4ef59be1a6b5cdf061db67801465aa59db01447fc9fd217528b27ded0dbc07f3f7b540d3cc8504d52a46973050037ef56fa125ff70327f2f7f19da19210377e2b5908f5b5595f66c3a09c35b22b020301001c0000000031383437333938303832";
        let body: JettonTransferMsgBody = from_boc_hex(boc).unwrap();
        assert_eq!(body.query_id, 6083770388301355627);
        assert_eq!(body.amount, VarUInteger16::from(884501240679u64));
        assert_eq!(
            body.destination.to_string(),
            "0:a32d52ced80a23fe4fe90ba94593ef686de03f9fbdaa069e642826a95234b982"
        );
        assert_eq!(
            body.response_destination.to_string(),
            "0:dfbd5be8497fdc0c9fcbdfc676864840ddf8ad6423d6d5657d9b0e8270d6c8ac"
        );
        assert!(body.custom_payload.is_none());
        assert_eq!(body.forward_ton_amount, VarUInteger16::from(1u64));
        assert!(body.forward_payload.is_ref());
        assert_eq!(
            body.forward_payload.value(),
            &JettonPayload::text_comment("1847398082")
        );
        assert_eq!(to_boc_hex(&body).unwrap(), boc);
    }
}

//! Schema macros
//!
//! ```ignore
//! tlb_struct! {
//!     #[derive(Debug, Clone, PartialEq)]
//!     pub struct BlockIdExt {
//!         pub shard: ShardIdent,
//!         pub seqno: u32,
//!         pub root_hash: Bits256,
//!         pub file_hash: Bits256,
//!     }
//! }
//!
//! tlb_sum! {
//!     #[derive(Debug, Clone, PartialEq)]
//!     pub enum BlkPrevInfo {
//!         Single: "$_" { prev: Ref<ExtBlkRef> => "^" },
//!     }
//! }
//! ```
//!
//! Fields are read and written in declaration order. A field annotation goes
//! after the type (`=> "maybe ^"`), a struct magic after the name
//! (`struct Block: "block#11ef55aa"`), a variant tag after the variant name.
//! Sum types try their variants in declaration order and take the first
//! whose tag matches.

#[doc(hidden)]
#[macro_export]
macro_rules! __tlb_tag {
    () => {
        None
    };
    ($tag:literal) => {
        Some($tag)
    };
}

#[macro_export]
macro_rules! tlb_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident $(: $magic:literal)? {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty $(=> $tag:literal)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::tlb::TlbDecode for $name {
            #[allow(unused_variables)]
            fn decode_tlb(
                slice: &mut $crate::cell::Slice,
                decoder: &mut $crate::tlb::Decoder,
            ) -> $crate::tlb::TlbResult<Self> {
                $( $crate::tlb::expect_magic(slice, $magic)?; )?
                $(
                    let $field = decoder.decode_field::<$ty>(
                        slice,
                        stringify!($field),
                        $crate::__tlb_tag!($($tag)?),
                    )?;
                )*
                Ok(Self { $($field),* })
            }
        }

        impl $crate::tlb::TlbEncode for $name {
            #[allow(unused_variables)]
            fn encode_tlb(
                &self,
                builder: &mut $crate::cell::CellBuilder,
                encoder: &mut $crate::tlb::Encoder,
            ) -> $crate::tlb::TlbResult<()> {
                $( $crate::tlb::write_tag(builder, $magic)?; )?
                $(
                    encoder.encode_field(
                        builder,
                        stringify!($field),
                        &self.$field,
                        $crate::__tlb_tag!($($tag)?),
                    )?;
                )*
                Ok(())
            }
        }
    };
}

#[macro_export]
macro_rules! tlb_sum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident : $vtag:literal $({
                    $(
                        $(#[$fmeta:meta])*
                        $field:ident : $ty:ty $(=> $tag:literal)?
                    ),* $(,)?
                })?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant $({
                    $(
                        $(#[$fmeta])*
                        $field: $ty,
                    )*
                })?,
            )*
        }

        impl $name {
            /// Name of the active variant
            pub fn sum_type(&self) -> &'static str {
                match self {
                    $( Self::$variant { .. } => stringify!($variant), )*
                }
            }
        }

        impl $crate::tlb::TlbDecode for $name {
            #[allow(unused_variables)]
            fn decode_tlb(
                slice: &mut $crate::cell::Slice,
                decoder: &mut $crate::tlb::Decoder,
            ) -> $crate::tlb::TlbResult<Self> {
                $(
                    if $crate::tlb::match_tag(slice, $vtag)? {
                        $($(
                            let $field = decoder.decode_field::<$ty>(
                                slice,
                                concat!(stringify!($variant), ".", stringify!($field)),
                                $crate::__tlb_tag!($($tag)?),
                            )?;
                        )*)?
                        return Ok(Self::$variant { $($($field),*)? });
                    }
                )*
                Err($crate::tlb::TlbError::SumTypeMismatch {
                    type_name: stringify!($name),
                })
            }
        }

        impl $crate::tlb::TlbEncode for $name {
            #[allow(unused_variables)]
            fn encode_tlb(
                &self,
                builder: &mut $crate::cell::CellBuilder,
                encoder: &mut $crate::tlb::Encoder,
            ) -> $crate::tlb::TlbResult<()> {
                match self {
                    $(
                        Self::$variant { $($($field),*)? } => {
                            $crate::tlb::write_tag(builder, $vtag)?;
                            $($(
                                encoder.encode_field(
                                    builder,
                                    concat!(stringify!($variant), ".", stringify!($field)),
                                    $field,
                                    $crate::__tlb_tag!($($tag)?),
                                )?;
                            )*)?
                            Ok(())
                        }
                    )*
                }
            }
        }
    };
}

//! Account state as stored in the shard state

use crate::models::address::MsgAddress;
use crate::models::currency::CurrencyCollection;
use crate::models::message::StateInit;
use crate::models::transaction::StorageUsed;
use crate::tlb::{AugExtra, Bits256, Grams, HashmapAugE, Prunable, TlbResult, Uint};
use serde::Serialize;

tlb_sum! {
    /// ```text
    /// account_none$0 = Account;
    /// account$1 addr:MsgAddressInt storage_stat:StorageInfo
    ///   storage:AccountStorage = Account;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum Account {
        AccountNone: "account_none$0",
        Account: "account$1" {
            addr: MsgAddress,
            storage_stat: StorageInfo,
            storage: AccountStorage,
        },
    }
}

impl Account {
    pub fn status(&self) -> AccountStatus {
        match self {
            Account::AccountNone => AccountStatus::NonExist,
            Account::Account { storage, .. } => match storage.state {
                AccountState::AccountUninit => AccountStatus::Uninit,
                AccountState::AccountActive { .. } => AccountStatus::Active,
                AccountState::AccountFrozen { .. } => AccountStatus::Frozen,
            },
        }
    }

    /// Balance, empty for a missing account
    pub fn balance(&self) -> CurrencyCollection {
        match self {
            Account::AccountNone => CurrencyCollection::default(),
            Account::Account { storage, .. } => storage.balance.clone(),
        }
    }
}

tlb_sum! {
    /// ```text
    /// acc_state_uninit$00 = AccountStatus;
    /// acc_state_frozen$01 = AccountStatus;
    /// acc_state_active$10 = AccountStatus;
    /// acc_state_nonexist$11 = AccountStatus;
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    #[serde(rename_all = "lowercase")]
    pub enum AccountStatus {
        Uninit: "acc_state_uninit$00",
        Frozen: "acc_state_frozen$01",
        Active: "acc_state_active$10",
        NonExist: "acc_state_nonexist$11",
    }
}

tlb_struct! {
    /// ```text
    /// account_storage$_ last_trans_lt:uint64
    ///   balance:CurrencyCollection state:AccountState = AccountStorage;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct AccountStorage {
        pub last_trans_lt: u64,
        pub balance: CurrencyCollection,
        pub state: AccountState,
    }
}

tlb_sum! {
    /// ```text
    /// account_uninit$00 = AccountState;
    /// account_active$1 _:StateInit = AccountState;
    /// account_frozen$01 state_hash:bits256 = AccountState;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub enum AccountState {
        AccountUninit: "account_uninit$00",
        AccountActive: "account_active$1" { state_init: StateInit },
        AccountFrozen: "account_frozen$01" { state_hash: Bits256 },
    }
}

tlb_sum! {
    /// ```text
    /// storage_extra_none$000 = StorageExtraInfo;
    /// storage_extra_info$001 dict_hash:uint256 = StorageExtraInfo;
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub enum StorageExtraInfo {
        StorageExtraNone: "storage_extra_none$000",
        StorageExtraInfo: "storage_extra_info$001" { dict_hash: Bits256 },
    }
}

tlb_struct! {
    /// ```text
    /// storage_info$_ used:StorageUsed storage_extra:StorageExtraInfo
    ///   last_paid:uint32 due_payment:(Maybe Grams) = StorageInfo;
    /// ```
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct StorageInfo {
        pub used: StorageUsed,
        pub storage_extra: StorageExtraInfo,
        pub last_paid: u32,
        pub due_payment: Option<Grams> => "maybe",
    }
}

tlb_struct! {
    /// ```text
    /// account_descr$_ account:^Account last_trans_hash:bits256
    ///   last_trans_lt:uint64 = ShardAccount;
    /// ```
    ///
    /// Proofs often prune the account itself; such a cell is kept and written
    /// back unchanged.
    #[derive(Debug, Clone, PartialEq, Serialize)]
    pub struct ShardAccount {
        pub account: Prunable<Account> => "^",
        pub last_trans_hash: Bits256,
        pub last_trans_lt: u64,
    }
}

tlb_struct! {
    /// `depth_balance$_ split_depth:(#<= 30) balance:CurrencyCollection = DepthBalanceInfo;`
    #[derive(Debug, Clone, PartialEq, Default, Serialize)]
    pub struct DepthBalanceInfo {
        pub split_depth: Uint<5>,
        pub balance: CurrencyCollection,
    }
}

impl AugExtra for DepthBalanceInfo {
    fn aggregate(left: &Self, right: &Self) -> TlbResult<Self> {
        Ok(Self {
            split_depth: left.split_depth.max(right.split_depth),
            balance: left.balance.checked_add(&right.balance)?,
        })
    }
}

/// `_ (HashmapAugE 256 ShardAccount DepthBalanceInfo) = ShardAccounts;`
pub type ShardAccounts = HashmapAugE<Bits256, ShardAccount, DepthBalanceInfo>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Cell, CellBuilder};
    use crate::models::address::AccountId;
    use crate::tlb::bigint::VarUInteger7;
    use crate::tlb::hashmap_aug::AugItem;
    use crate::tlb::{Any, from_boc_hex, marshal, to_boc_hex, unmarshal};

    fn active_account(balance: u64) -> Account {
        Account::Account {
            addr: AccountId::new(0, Bits256([5; 32])).into(),
            storage_stat: StorageInfo {
                used: StorageUsed {
                    cells: VarUInteger7::from(3u64),
                    bits: VarUInteger7::from(1_024u64),
                },
                storage_extra: StorageExtraInfo::StorageExtraNone,
                last_paid: 1_700_000_000,
                due_payment: None,
            },
            storage: AccountStorage {
                last_trans_lt: 46_000_000_000_001,
                balance: CurrencyCollection::from_grams(balance),
                state: AccountState::AccountActive {
                    state_init: StateInit {
                        code: Some(Any(marshal(&0xC0DEu16).unwrap())),
                        ..StateInit::default()
                    },
                },
            },
        }
    }

    #[test]
    fn test_account_status_and_balance() {
        let account = active_account(1_000);
        assert_eq!(account.status(), AccountStatus::Active);
        assert_eq!(account.balance().grams, Grams(1_000));
        assert_eq!(Account::AccountNone.status(), AccountStatus::NonExist);
        assert_eq!(Account::AccountNone.balance(), CurrencyCollection::default());
        assert_eq!(
            serde_json::to_string(&AccountStatus::NonExist).unwrap(),
            r#""nonexist""#
        );

        let decoded: Account = from_boc_hex(&to_boc_hex(&account).unwrap()).unwrap();
        assert_eq!(decoded, account);
    }

    #[test]
    fn test_status_bits() {
        for (status, bits) in [
            (AccountStatus::Uninit, 0b00),
            (AccountStatus::Frozen, 0b01),
            (AccountStatus::Active, 0b10),
            (AccountStatus::NonExist, 0b11),
        ] {
            let cell = marshal(&status).unwrap();
            assert_eq!(cell.bit_len(), 2);
            assert_eq!(cell.as_slice().load_uint(2).unwrap(), bits);
        }
    }

    #[test]
    fn test_pruned_shard_account() {
        let full = ShardAccount {
            account: Prunable::Value(active_account(5)),
            last_trans_hash: Bits256([7; 32]),
            last_trans_lt: 46_000_000_000_001,
        };
        let cell = marshal(&full).unwrap();

        let mut builder = CellBuilder::new();
        builder
            .store_reference(Cell::pruned_branch(cell.reference(0).unwrap()).unwrap())
            .unwrap();
        builder.store_bytes(&[7; 32]).unwrap();
        builder.store_u64(46_000_000_000_001).unwrap();
        let proof = builder.build().unwrap();

        let decoded: ShardAccount = unmarshal(&proof).unwrap();
        assert!(decoded.account.is_pruned());
        assert_eq!(decoded.last_trans_lt, 46_000_000_000_001);
        assert_eq!(marshal(&decoded).unwrap().hash(), proof.hash());
    }

    #[test]
    fn test_shard_accounts_totals() {
        let entry = |byte: u8, balance: u64| {
            let extra = DepthBalanceInfo {
                split_depth: Uint(0),
                balance: CurrencyCollection::from_grams(balance),
            };
            let account = ShardAccount {
                account: Prunable::Value(active_account(balance)),
                last_trans_hash: Bits256::default(),
                last_trans_lt: 0,
            };
            AugItem::new(Bits256([byte; 32]), account, extra)
        };
        let accounts =
            ShardAccounts::from_items(vec![entry(1, 10), entry(2, 20), entry(0x80, 30)]).unwrap();
        assert_eq!(accounts.extra.balance.grams, Grams(60));

        let decoded: ShardAccounts = from_boc_hex(&to_boc_hex(&accounts).unwrap()).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded.extra.balance.grams, Grams(60));
        let count = ShardAccounts::count_leaves(&mut marshal(&accounts).unwrap().as_slice()).unwrap();
        assert_eq!(count, 3);
    }
}

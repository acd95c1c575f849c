//! Scenario tests that walk whole blocks through bags of cells

use crate::cell::CellBuilder;
use crate::models::*;
use crate::tlb::hashmap_aug::AugItem;
use crate::tlb::*;

fn ext_ref(seq_no: u32, end_lt: u64) -> ExtBlkRef {
    ExtBlkRef {
        end_lt,
        seq_no,
        root_hash: Bits256([seq_no as u8; 32]),
        file_hash: Bits256([0xf0 | seq_no as u8; 32]),
    }
}

fn block_info(workchain: i32, shard: u64, prev_ref: BlkPrevInfo) -> BlockInfo {
    let not_master = workchain != -1;
    BlockInfo {
        version: 0,
        not_master,
        after_merge: prev_ref.is_merge(),
        before_split: false,
        after_split: false,
        want_split: false,
        want_merge: true,
        key_block: false,
        vert_seqno_incr: false,
        flags: 1,
        seq_no: 1_000,
        vert_seq_no: 1,
        shard: ShardIdent::from_shard(workchain, shard).unwrap(),
        gen_utime: 1_700_000_000,
        start_lt: 47_000_000_000_000,
        end_lt: 47_000_000_000_010,
        gen_validator_list_hash_short: 0xdead_beef,
        gen_catchain_seqno: 12,
        min_ref_mc_seqno: 900,
        prev_key_block_seqno: 800,
        gen_software: Some(GlobalVersion {
            version: 9,
            capabilities: 0x2e,
        }),
        master_ref: not_master.then(|| BlkMasterInfo {
            master: ext_ref(7, 46_999_999_999_000),
        }),
        prev_ref,
        prev_vert_ref: None,
    }
}

fn storage_transaction(account: u8, lt: u64) -> Transaction {
    Transaction::new(
        Bits256([account; 32]),
        lt,
        Bits256::default(),
        0,
        1_700_000_000,
        AccountStatus::Active,
        AccountStatus::Active,
        TransactionMsgs::default(),
        CurrencyCollection::from_grams(5u64),
        HashUpdate::default(),
        TransactionDescr::TransStorage {
            storage_ph: TrStoragePhase {
                storage_fees_collected: Grams(5),
                storage_fees_due: None,
                status_change: AccStatusChange::Unchanged,
            },
        },
    )
}

fn account_block(account: u8, lts: &[u64]) -> AugItem<Bits256, AccountBlock, CurrencyCollection> {
    let transactions = lts
        .iter()
        .map(|&lt| {
            AugItem::new(
                lt,
                Ref(storage_transaction(account, lt)),
                CurrencyCollection::from_grams(5u64),
            )
        })
        .collect();
    let block = AccountBlock {
        account_addr: Bits256([account; 32]),
        transactions: HashmapAug::from_items(transactions),
        state_update: HashUpdate::default(),
    };
    let fees = CurrencyCollection::from_grams(5 * lts.len() as u64);
    AugItem::new(Bits256([account; 32]), block, fees)
}

/// An augmented dictionary keyed like a message descriptor, for counting
fn fake_descr(entries: u8) -> Any {
    let items = (0..entries)
        .map(|i| AugItem::new(Bits256([i; 32]), i as u64, CurrencyCollection::from_grams(1u64)))
        .collect();
    let descr = HashmapAugE::<Bits256, u64, CurrencyCollection>::from_items(items).unwrap();
    Any(marshal(&descr).unwrap())
}

fn shard_desc(seq_no: u32, shard: u64) -> ShardDesc {
    ShardDesc::New {
        info: ShardDescInfo {
            seq_no,
            reg_mc_seqno: 7,
            start_lt: 0,
            end_lt: 0,
            root_hash: Bits256([seq_no as u8; 32]),
            file_hash: Bits256([seq_no as u8 + 1; 32]),
            before_split: false,
            before_merge: false,
            want_split: false,
            want_merge: false,
            nx_cc_updated: false,
            flags: Uint(0),
            next_catchain_seqno: 0,
            next_validator_shard: shard,
            min_ref_mc_seqno: 0,
            gen_utime: 0,
            split_merge_at: FutureSplitMerge::None,
        },
        fees: ShardDescFees::default(),
    }
}

fn state_update() -> Any {
    let old = Any(marshal(&1u32).unwrap());
    let new = Any(marshal(&2u32).unwrap());
    Any(marshal(&MerkleUpdate::new(old, new).unwrap()).unwrap())
}

fn block(info: BlockInfo, account_blocks: ShardAccountBlocks, custom: Option<McBlockExtra>) -> Block {
    Block {
        global_id: -239,
        info,
        value_flow: ValueFlow::default(),
        state_update: state_update(),
        extra: BlockExtra {
            in_msg_descr: fake_descr(3),
            out_msg_descr: fake_descr(0),
            account_blocks,
            rand_seed: Bits256([0x42; 32]),
            created_by: Bits256([0x24; 32]),
            custom,
        },
    }
}

/// Test parents of a plain, a split and a merged block after a bag of cells round trip
#[test]
fn test_block_info_parents() {
    let info = block_info(0, SHARD_FULL, BlkPrevInfo::PrevBlkInfo {
        prev: ext_ref(3, 100),
    });
    let decoded: BlockInfo = from_boc_hex(&to_boc_hex(&info).unwrap()).unwrap();
    assert_eq!(decoded, info);
    let parents = get_parents(&decoded).unwrap();
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].shard, SHARD_FULL);
    assert_eq!(parents[0].seqno, 3);
    assert_eq!(parents[0].root_hash, Bits256([3; 32]));

    let left = shard_child(SHARD_FULL, true);
    let mut split = block_info(0, left, BlkPrevInfo::PrevBlkInfo {
        prev: ext_ref(4, 200),
    });
    split.after_split = true;
    let decoded: BlockInfo = from_boc_hex(&to_boc_hex(&split).unwrap()).unwrap();
    let parents = get_parents(&decoded).unwrap();
    assert_eq!(parents[0].shard, SHARD_FULL);
    assert_eq!(parents[0].workchain, 0);

    let merged = block_info(0, SHARD_FULL, BlkPrevInfo::PrevBlksInfo {
        prev1: ext_ref(5, 300),
        prev2: ext_ref(6, 301),
    });
    let decoded: BlockInfo = from_boc_hex(&to_boc_hex(&merged).unwrap()).unwrap();
    assert!(decoded.after_merge);
    let parents = get_parents(&decoded).unwrap();
    assert_eq!(parents.len(), 2);
    assert_eq!(parents[0].shard, 0x4000_0000_0000_0000);
    assert_eq!(parents[0].seqno, 5);
    assert_eq!(parents[1].shard, 0xc000_0000_0000_0000);
    assert_eq!(parents[1].seqno, 6);
}

/// Test that flags and the optional tail of a block info must agree
#[test]
fn test_block_info_layout_checks() {
    let mut info = block_info(0, SHARD_FULL, BlkPrevInfo::PrevBlkInfo {
        prev: ext_ref(3, 100),
    });
    info.master_ref = None;
    assert!(marshal(&info).is_err());

    let mut info = block_info(-1, SHARD_FULL, BlkPrevInfo::PrevBlkInfo {
        prev: ext_ref(3, 100),
    });
    assert!(info.master_ref.is_none());
    info.after_merge = true;
    assert!(marshal(&info).is_err());
    assert!(get_parents(&info).is_err());

    info.after_merge = false;
    info.vert_seqno_incr = true;
    info.prev_vert_ref = Some(BlkPrevInfo::PrevBlkInfo {
        prev: ext_ref(2, 50),
    });
    let decoded: BlockInfo = from_boc_hex(&to_boc_hex(&info).unwrap()).unwrap();
    assert_eq!(decoded.prev_vert_ref, info.prev_vert_ref);
}

/// Test transactions of a shard block come back ordered by logical time
#[test]
fn test_block_transactions() {
    let account_blocks = ShardAccountBlocks::from_items(vec![
        account_block(0x10, &[30, 10]),
        account_block(0x80, &[20]),
        account_block(0x11, &[40, 15, 25]),
    ])
    .unwrap();
    let info = block_info(0, SHARD_FULL, BlkPrevInfo::PrevBlkInfo {
        prev: ext_ref(3, 100),
    });
    let source = block(info, account_blocks, None);

    let boc = to_boc(&source, true).unwrap();
    let block: Block = from_boc(&boc).unwrap();
    assert_eq!(block.global_id, -239);
    assert_eq!(block.transactions_quantity(), 6);
    assert_eq!(block.extra.account_blocks.extra.grams, Grams(30));

    let lts: Vec<u64> = block.all_transactions().iter().map(|tx| tx.lt).collect();
    assert_eq!(lts, vec![10, 15, 20, 25, 30, 40]);
    let first = block.all_transactions()[0];
    assert_eq!(first.account_addr, Bits256([0x10; 32]));
    assert_eq!(first.hash(), Bits256(marshal(first).unwrap().hash()));

    assert_eq!(block.extra.in_msg_descr_len().unwrap(), 3);
    assert_eq!(block.extra.out_msg_descr_len().unwrap(), 0);
    assert!(shard_ids(&block).is_empty());
    assert_eq!(to_boc(&block, true).unwrap(), boc);
}

/// Test the state update of a block decodes into both states
#[test]
fn test_block_state_update() {
    let info = block_info(0, SHARD_FULL, BlkPrevInfo::PrevBlkInfo {
        prev: ext_ref(3, 100),
    });
    let source = block(info, ShardAccountBlocks::default(), None);
    let block: Block = from_boc_hex(&to_boc_hex(&source).unwrap()).unwrap();

    let update = block.state_update().unwrap();
    assert_eq!(update.old.cell().hash(), marshal(&1u32).unwrap().hash());
    assert_eq!(update.new.cell().hash(), marshal(&2u32).unwrap().hash());
    assert_eq!(update.old_hash, Bits256(marshal(&1u32).unwrap().hash()));
    assert_eq!(block.transactions_quantity(), 0);
}

/// Test shard block ids referenced by a masterchain block
#[test]
fn test_masterchain_shard_ids() {
    let left = shard_child(SHARD_FULL, true);
    let right = shard_child(SHARD_FULL, false);
    let shard_hashes: ShardHashes = [
        (0, Ref(BinTree(vec![shard_desc(12, left), shard_desc(15, right)]))),
        (1, Ref(BinTree(vec![shard_desc(0, SHARD_FULL)]))),
    ]
    .into_iter()
    .collect();
    let custom = McBlockExtra {
        key_block: false,
        shard_hashes,
        shard_fees: ShardFees::default(),
        other: Some(McExtraOther::default()),
        config: None,
    };
    let info = block_info(-1, SHARD_FULL, BlkPrevInfo::PrevBlkInfo {
        prev: ext_ref(3, 100),
    });
    let source = block(info, ShardAccountBlocks::default(), Some(custom));
    let block: Block = from_boc_hex(&to_boc_hex(&source).unwrap()).unwrap();

    let ids = shard_ids(&block);
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0].id(), BlockId::new(0, left, 12));
    assert_eq!(ids[1].id(), BlockId::new(0, right, 15));
    assert_eq!(ids[1].root_hash, Bits256([15; 32]));

    let shard = ShardId::parse(left).unwrap();
    assert!(shard.match_block_id(&ids[0].id()));
    assert!(!shard.match_block_id(&ids[1].id()));
}

/// Test a jetton transfer body carried inside an internal message body
#[test]
fn test_jetton_transfer_round_trip() {
    let body = JettonTransferMsgBody {
        query_id: 7,
        amount: crate::tlb::bigint::VarUInteger16::from(1_000_000_000u64),
        destination: "0:a32d52ced80a23fe4fe90ba94593ef686de03f9fbdaa069e642826a95234b982"
            .parse()
            .unwrap(),
        response_destination: MsgAddress::None,
        custom_payload: None,
        forward_ton_amount: crate::tlb::bigint::VarUInteger16::from(1u64),
        forward_payload: EitherRef::Inline(JettonPayload::text_comment("thanks")),
    };
    let cell = marshal(&body).unwrap();
    assert_eq!(cell.as_slice().load_u32().unwrap(), 0x0f8a7ea5);

    let decoded: JettonTransferMsgBody = unmarshal(&cell).unwrap();
    assert_eq!(decoded, body);
    let json = serde_json::to_value(&decoded.forward_payload).unwrap();
    assert_eq!(json["SumType"], "TextComment");
    assert_eq!(json["Value"]["Text"], "thanks");

    let mut builder = CellBuilder::new();
    builder.store_u32(0x0f8a7ea5).unwrap();
    builder.store_u64(7).unwrap();
    assert!(unmarshal::<JettonTransferMsgBody>(&builder.build().unwrap()).is_err());
}

/// Test hashes of an external inbound and an internal message decoded from real bags of cells
#[test]
fn test_message_hashes() {
    let cases = [
        (
            "te6ccgEBAgEAqgAB4YgA2ZpktQsYby0n9cV5VWOFINBjScIU2HdondFsK3lDpEAFG8W4Jpf7AeOqfzL9vZ79mX3eM6UEBxZvN6+QmpYwXBq32QOBIrP4lF5ijGgQmZbC6KDeiiptxmTNwl5f59OAGU1NGLsixYlYAAAA2AAcAQBoYgBZQOG7qXmeA/2Tw1pLX2IkcQ5h5fxWzzcBskMJbVVRsKNaTpAAAAAAAAAAAAAAAAAAAA==",
            "ExtInMsgInfo",
            "23ff6f150d573f64d5599a57813f991882b7b4d5ae0550ebd08ea658431e62f6",
        ),
        (
            "te6ccgEBAgEAjAABsUgALXKEDiSWLCdVuhCWy/hYz3hnzF93uwd93pYymUX+v88AGzNMlqFjDeWk/rivKqxwpBoMaThCmw7tE7othW8odIgQBycOAAYdyRAAAEQo20NHEsixYeDAAQBbBRONkQAAAAAAAAAAgBZQOG7qXmeA/2Tw1pLX2IkcQ5h5fxWzzcBskMJbVVRsKA==",
            "IntMsgInfo",
            "b55e0995ab2428b7ccffa4d417ff78caca62dc4d33bc0e33b2d9bcf0c396f08c",
        ),
    ];
    for (boc, sum_type, normalized) in cases {
        let cell = crate::cell::base64_to_boc(boc).unwrap();
        let msg: Message = unmarshal(&cell).unwrap();
        assert_eq!(msg.info.sum_type(), sum_type);
        assert_eq!(msg.hash(), Bits256(cell.hash()));
        assert_eq!(msg.normalized_hash().unwrap().to_hex(), normalized);
        assert_eq!(marshal(&msg).unwrap().hash(), cell.hash());
    }

    let msg: Message = unmarshal(&crate::cell::base64_to_boc(cases[1].0).unwrap()).unwrap();
    assert_eq!(msg.normalized_hash().unwrap(), msg.hash());
}
